// This file is part of Terrella.
//
// Terrella is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// Terrella is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with Terrella.  If not, see <http://www.gnu.org/licenses/>.
use crate::extents::Extents;
use serde::{Deserialize, Serialize};

/// Quadrant positions of a child tile within its parent. Rows grow
/// southward from the top of the grid, so the upper quadrants keep the
/// parent's doubled row and the lower quadrants take the next one.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ChildIndex {
    LowerLeft = 0,
    LowerRight = 1,
    UpperLeft = 2,
    UpperRight = 3,
}

impl ChildIndex {
    pub const ALL: [ChildIndex; 4] = [
        ChildIndex::LowerLeft,
        ChildIndex::LowerRight,
        ChildIndex::UpperLeft,
        ChildIndex::UpperRight,
    ];

    pub fn to_index(self) -> usize {
        self as usize
    }

    pub fn from_index(i: usize) -> Self {
        match i {
            0 => ChildIndex::LowerLeft,
            1 => ChildIndex::LowerRight,
            2 => ChildIndex::UpperLeft,
            3 => ChildIndex::UpperRight,
            _ => panic!("invalid child index: {}", i),
        }
    }
}

/// Vertex dimensions of a tile's mesh.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct GridSize {
    pub rows: u32,
    pub columns: u32,
}

impl GridSize {
    pub fn new(rows: u32, columns: u32) -> Self {
        Self { rows, columns }
    }
}

/// Pixel dimensions of a tile's composited texture.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// The immutable logical identity of a tile: where it sits in the quadtree
/// and what resolution its mesh and texture are built at. `split` is the
/// only producer of child keys; computing child extents any other way would
/// break the bitwise coincidence of sibling edges.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TileKey {
    row: u32,
    column: u32,
    level: u32,
    extents: Extents,
    mesh_size: GridSize,
    image_size: ImageSize,
}

impl TileKey {
    pub fn new(
        row: u32,
        column: u32,
        level: u32,
        extents: Extents,
        mesh_size: GridSize,
        image_size: ImageSize,
    ) -> Self {
        Self {
            row,
            column,
            level,
            extents,
            mesh_size,
            image_size,
        }
    }

    pub fn row(&self) -> u32 {
        self.row
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn extents(&self) -> &Extents {
        &self.extents
    }

    pub fn mesh_size(&self) -> GridSize {
        self.mesh_size
    }

    pub fn image_size(&self) -> ImageSize {
        self.image_size
    }

    /// Child keys in `ChildIndex` order. Children inherit the mesh and
    /// image sizes and take the matching quadrant of the parent extents.
    pub fn split(&self) -> [TileKey; 4] {
        let quadrants = self.extents.split();
        let level = self.level + 1;
        let (r, c) = (self.row * 2, self.column * 2);
        let child = |row, column, extents| {
            TileKey::new(row, column, level, extents, self.mesh_size, self.image_size)
        };
        [
            child(r + 1, c, quadrants[ChildIndex::LowerLeft.to_index()]),
            child(r + 1, c + 1, quadrants[ChildIndex::LowerRight.to_index()]),
            child(r, c, quadrants[ChildIndex::UpperLeft.to_index()]),
            child(r, c + 1, quadrants[ChildIndex::UpperRight.to_index()]),
        ]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn root() -> TileKey {
        TileKey::new(
            0,
            0,
            0,
            Extents::new(-180., -90., 180., 90.),
            GridSize::new(17, 17),
            ImageSize::new(256, 256),
        )
    }

    #[test]
    fn test_split_coordinates() {
        let children = root().split();
        for child in &children {
            assert_eq!(child.level(), 1);
            assert_eq!(child.mesh_size(), GridSize::new(17, 17));
            assert_eq!(child.image_size(), ImageSize::new(256, 256));
        }

        let ul = &children[ChildIndex::UpperLeft.to_index()];
        assert_eq!((ul.row(), ul.column()), (0, 0));
        let ll = &children[ChildIndex::LowerLeft.to_index()];
        assert_eq!((ll.row(), ll.column()), (1, 0));
        let ur = &children[ChildIndex::UpperRight.to_index()];
        assert_eq!((ur.row(), ur.column()), (0, 1));
        let lr = &children[ChildIndex::LowerRight.to_index()];
        assert_eq!((lr.row(), lr.column()), (1, 1));
    }

    #[test]
    fn test_split_extents_union_parent() {
        let parent = root();
        let children = parent.split();
        let mut union = Extents::empty();
        for child in &children {
            union.expand(child.extents());
        }
        assert_eq!(&union, parent.extents());
    }

    #[test]
    fn test_sibling_edges_bitwise_equal_when_deep() {
        // Walk down many levels; at each level all four siblings must agree
        // exactly about the shared midpoint edges.
        let mut key = root();
        for i in 0..20 {
            let children = key.split();
            let ll = children[ChildIndex::LowerLeft.to_index()].extents();
            let lr = children[ChildIndex::LowerRight.to_index()].extents();
            let ul = children[ChildIndex::UpperLeft.to_index()].extents();
            let ur = children[ChildIndex::UpperRight.to_index()].extents();
            assert_eq!(ll.max_lon(), lr.min_lon());
            assert_eq!(ul.max_lon(), ur.min_lon());
            assert_eq!(ll.max_lat(), ul.min_lat());
            assert_eq!(lr.max_lat(), ur.min_lat());
            key = children[i % 4].clone();
        }
    }
}

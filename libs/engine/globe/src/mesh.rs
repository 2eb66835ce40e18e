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
use elevation::ElevationGrid;
use geo::TileKey;
use geodesy::LandModel;
use itertools::iproduct;
use nalgebra::{Point3, Vector3};
use std::sync::atomic::{AtomicBool, Ordering};

/// World-space bounding sphere of one tile's geometry.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingSphere {
    pub center: Point3<f64>,
    pub radius: f64,
}

impl Default for BoundingSphere {
    fn default() -> Self {
        Self {
            center: Point3::origin(),
            radius: 0.,
        }
    }
}

/// The triangulated patch for one tile: a regular grid of vertices over
/// the tile extents, deformed by the elevation grid and projected through
/// the land model, plus the skirt ring that hides cracks against
/// neighboring levels and a line loop drawn while the tile has work
/// outstanding.
///
/// Skirt and border visibility are per-frame toggles on shared meshes, so
/// they live in atomics rather than forcing a rebuild.
pub struct TileMesh {
    rows: u32,
    columns: u32,
    positions: Vec<Point3<f64>>,
    normals: Vec<Vector3<f64>>,
    tex_coords: Vec<[f32; 2]>,
    triangles: Vec<[u32; 3]>,
    skirt_positions: Vec<Point3<f64>>,
    skirt_triangles: Vec<[u32; 3]>,
    border: Vec<Point3<f64>>,
    bounding_sphere: BoundingSphere,
    probes: [Point3<f64>; 5],
    show_skirts: AtomicBool,
    show_border: AtomicBool,
}

/// Skirt depth shrinks as tiles get finer; the epsilon floor keeps the
/// skirt quads from degenerating at very deep levels.
fn skirt_depth(level: u32) -> f64 {
    (3500. - level as f64 * 150.).max(10. * f64::EPSILON)
}

impl TileMesh {
    pub fn build(key: &TileKey, land: &LandModel, elevation: Option<&ElevationGrid>) -> TileMesh {
        let size = key.mesh_size();
        let (rows, columns) = (size.rows.max(2), size.columns.max(2));
        let extents = key.extents();
        let count = (rows * columns) as usize;

        let mut positions = Vec::with_capacity(count);
        let mut normals = Vec::with_capacity(count);
        let mut tex_coords = Vec::with_capacity(count);

        for (row, column) in iproduct!(0..rows, 0..columns) {
            let v = row as f64 / (rows - 1) as f64;
            let u = column as f64 / (columns - 1) as f64;
            let lat = extents.max_lat() - v * extents.height();
            let lon = extents.min_lon() + u * extents.width();
            let height = match elevation {
                Some(grid) => {
                    let sampled = grid.sample(u, v);
                    // Missing samples render at the datum, not at the
                    // sentinel's -9999 meters.
                    if grid.is_no_data(sampled) {
                        0.
                    } else {
                        sampled as f64
                    }
                }
                None => 0.,
            };
            positions.push(land.lat_lon_height_to_xyz(lat, lon, height));
            normals.push(land.up(lat, lon));
            tex_coords.push([u as f32, v as f32]);
        }

        let vertex = |row: u32, column: u32| row * columns + column;
        let mut triangles = Vec::with_capacity(((rows - 1) * (columns - 1) * 2) as usize);
        for (row, column) in iproduct!(0..rows - 1, 0..columns - 1) {
            let a = vertex(row, column);
            let b = vertex(row + 1, column);
            let c = vertex(row + 1, column + 1);
            let d = vertex(row, column + 1);
            triangles.push([a, b, c]);
            triangles.push([a, c, d]);
        }

        // Perimeter ring, clockwise from the northwest corner.
        let mut ring = Vec::new();
        for column in 0..columns {
            ring.push(vertex(0, column));
        }
        for row in 1..rows {
            ring.push(vertex(row, columns - 1));
        }
        for column in (0..columns - 1).rev() {
            ring.push(vertex(rows - 1, column));
        }
        for row in (1..rows - 1).rev() {
            ring.push(vertex(row, 0));
        }

        let depth = skirt_depth(key.level());
        let base = positions.len() as u32;
        let mut skirt_positions = Vec::with_capacity(ring.len());
        let mut skirt_triangles = Vec::with_capacity(ring.len() * 2);
        for &index in &ring {
            let position = positions[index as usize];
            let normal = normals[index as usize];
            skirt_positions.push(position - normal * depth);
        }
        for i in 0..ring.len() {
            let j = (i + 1) % ring.len();
            let top_i = ring[i];
            let top_j = ring[j];
            let bottom_i = base + i as u32;
            let bottom_j = base + j as u32;
            skirt_triangles.push([top_i, bottom_i, top_j]);
            skirt_triangles.push([top_j, bottom_i, bottom_j]);
        }

        let border: Vec<Point3<f64>> = ring.iter().map(|&i| positions[i as usize]).collect();

        let mut center = Vector3::zeros();
        for position in &positions {
            center += position.coords;
        }
        center /= positions.len() as f64;
        let center = Point3::from(center);
        let radius = positions
            .iter()
            .map(|p| (p - center).norm())
            .fold(0., f64::max);

        let probes = [
            positions[vertex(0, 0) as usize],
            positions[vertex(0, columns - 1) as usize],
            positions[vertex(rows - 1, 0) as usize],
            positions[vertex(rows - 1, columns - 1) as usize],
            positions[vertex(rows / 2, columns / 2) as usize],
        ];

        TileMesh {
            rows,
            columns,
            positions,
            normals,
            tex_coords,
            triangles,
            skirt_positions,
            skirt_triangles,
            border,
            bounding_sphere: BoundingSphere { center, radius },
            probes,
            show_skirts: AtomicBool::new(true),
            show_border: AtomicBool::new(false),
        }
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    pub fn normals(&self) -> &[Vector3<f64>] {
        &self.normals
    }

    pub fn tex_coords(&self) -> &[[f32; 2]] {
        &self.tex_coords
    }

    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    pub fn skirt_positions(&self) -> &[Point3<f64>] {
        &self.skirt_positions
    }

    /// Indices into `positions` followed by `skirt_positions`; renderers
    /// concatenate the two vertex runs.
    pub fn skirt_triangles(&self) -> &[[u32; 3]] {
        &self.skirt_triangles
    }

    pub fn border(&self) -> &[Point3<f64>] {
        &self.border
    }

    pub fn bounding_sphere(&self) -> &BoundingSphere {
        &self.bounding_sphere
    }

    /// Squared distance from the eye to the nearest of the four corners
    /// and the center vertex; the input to the split decision.
    pub fn smallest_distance_squared(&self, eye: &Point3<f64>) -> f64 {
        self.probes
            .iter()
            .map(|p| (p - eye).norm_squared())
            .fold(f64::MAX, f64::min)
    }

    /// First intersection of the segment from `p0` to `p1` with the
    /// ground triangles, as (fraction along the segment, world point).
    pub fn intersect_segment(
        &self,
        p0: &Point3<f64>,
        p1: &Point3<f64>,
    ) -> Option<(f64, Point3<f64>)> {
        let direction = p1 - p0;
        let mut best: Option<(f64, Point3<f64>)> = None;
        for triangle in &self.triangles {
            let a = self.positions[triangle[0] as usize];
            let b = self.positions[triangle[1] as usize];
            let c = self.positions[triangle[2] as usize];

            // Moller-Trumbore, restricted to t within the segment.
            let ab = b - a;
            let ac = c - a;
            let p = direction.cross(&ac);
            let det = ab.dot(&p);
            if det.abs() < 1e-12 {
                continue;
            }
            let inv_det = 1. / det;
            let s = p0 - a;
            let u = s.dot(&p) * inv_det;
            if !(0. ..=1.).contains(&u) {
                continue;
            }
            let q = s.cross(&ab);
            let v = direction.dot(&q) * inv_det;
            if v < 0. || u + v > 1. {
                continue;
            }
            let t = ac.dot(&q) * inv_det;
            if !(0. ..=1.).contains(&t) {
                continue;
            }
            if best.map(|(bt, _)| t < bt).unwrap_or(true) {
                best = Some((t, p0 + direction * t));
            }
        }
        best
    }

    pub fn show_skirts(&self) -> bool {
        self.show_skirts.load(Ordering::Relaxed)
    }

    pub fn set_show_skirts(&self, show: bool) {
        self.show_skirts.store(show, Ordering::Relaxed);
    }

    pub fn show_border(&self) -> bool {
        self.show_border.load(Ordering::Relaxed)
    }

    pub fn set_show_border(&self, show: bool) {
        self.show_border.store(show, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{Extents, GridSize, ImageSize};

    fn key(level: u32, extents: Extents) -> TileKey {
        TileKey::new(
            0,
            0,
            level,
            extents,
            GridSize::new(9, 9),
            ImageSize::new(32, 32),
        )
    }

    #[test]
    fn test_flat_mesh_sits_on_the_datum() {
        let land = LandModel::wgs84();
        let mesh = TileMesh::build(&key(0, Extents::new(-10., -10., 10., 10.)), &land, None);
        assert_eq!(mesh.positions().len(), 81);
        assert_eq!(mesh.triangles().len(), 128);
        for position in mesh.positions() {
            let (_, _, height) = land.xyz_to_lat_lon_height(position);
            assert!(height.abs() < 0.01, "height {}", height);
        }
    }

    #[test]
    fn test_elevation_deforms_vertices() {
        let land = LandModel::wgs84();
        let mut grid = ElevationGrid::new(9, 9);
        for row in 0..9 {
            for column in 0..9 {
                grid.set_value(row, column, 1000.);
            }
        }
        let mesh = TileMesh::build(
            &key(0, Extents::new(-10., -10., 10., 10.)),
            &land,
            Some(&grid),
        );
        // Interior vertices sit a kilometer up; the sentinel-free grid
        // leaves no flat spots.
        let center = mesh.positions()[4 * 9 + 4];
        let (_, _, height) = land.xyz_to_lat_lon_height(&center);
        assert_relative_eq!(height, 1000., epsilon = 1.);
    }

    #[test]
    fn test_no_degenerate_triangles() {
        let land = LandModel::wgs84();
        let mut grid = ElevationGrid::new(9, 9);
        for row in 0..9 {
            for column in 0..9 {
                grid.set_value(row, column, if column < 5 { 10. } else { 20. });
            }
        }
        let mesh = TileMesh::build(
            &key(2, Extents::new(0., 0., 4., 4.)),
            &land,
            Some(&grid),
        );
        for triangle in mesh.triangles() {
            let a = mesh.positions()[triangle[0] as usize];
            let b = mesh.positions()[triangle[1] as usize];
            let c = mesh.positions()[triangle[2] as usize];
            assert!((b - a).cross(&(c - a)).norm() > 0.);
        }
    }

    #[test]
    fn test_skirt_hangs_below_the_surface() {
        let land = LandModel::wgs84();
        let tile_key = key(3, Extents::new(0., 0., 2., 2.));
        let mesh = TileMesh::build(&tile_key, &land, None);
        assert!(!mesh.skirt_positions().is_empty());
        let expected = skirt_depth(3);
        let ring_first = mesh.positions()[0];
        let skirt_first = mesh.skirt_positions()[0];
        let drop = (ring_first - skirt_first).norm();
        assert_relative_eq!(drop, expected, epsilon = 1e-6);
    }

    #[test]
    fn test_skirt_depth_shrinks_with_level_but_never_vanishes() {
        assert!(skirt_depth(0) > skirt_depth(5));
        assert!(skirt_depth(1000) > 0.);
    }

    #[test]
    fn test_identical_inputs_give_identical_bounds() {
        let land = LandModel::wgs84();
        let tile_key = key(1, Extents::new(-45., 0., 0., 45.));
        let a = TileMesh::build(&tile_key, &land, None);
        let b = TileMesh::build(&tile_key, &land, None);
        assert_eq!(a.bounding_sphere(), b.bounding_sphere());
    }

    #[test]
    fn test_segment_intersection_hits_the_surface() {
        let land = LandModel::wgs84();
        let mesh = TileMesh::build(&key(8, Extents::new(0., 0., 1., 1.)), &land, None);
        let above = land.lat_lon_height_to_xyz(0.5, 0.5, 10_000.);
        let below = land.lat_lon_height_to_xyz(0.5, 0.5, -10_000.);
        let (_, hit) = mesh
            .intersect_segment(&above, &below)
            .expect("segment crosses the surface");
        let (_, _, height) = land.xyz_to_lat_lon_height(&hit);
        // Within the chord error of a 9x9 grid over one degree.
        assert!(height.abs() < 20., "height {}", height);

        // A segment that stays above the surface misses.
        let east = land.lat_lon_height_to_xyz(0.5, 0.9, 50_000.);
        assert!(mesh.intersect_segment(&above, &east).is_none());
    }

    #[test]
    fn test_distance_probe_prefers_nearest_corner() {
        let land = LandModel::wgs84();
        let mesh = TileMesh::build(&key(0, Extents::new(0., 0., 10., 10.)), &land, None);
        let corner = mesh.positions()[0];
        let eye = Point3::new(corner.x * 1.01, corner.y * 1.01, corner.z * 1.01);
        let d2 = mesh.smallest_distance_squared(&eye);
        assert!(d2 <= (corner - eye).norm_squared() + 1.);
    }
}

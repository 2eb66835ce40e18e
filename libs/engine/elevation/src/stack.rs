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
use crate::{grid::ElevationGrid, layer::ElevationLayer};
use geo::TileKey;
use jobs::JobHandle;
use parking_lot::RwLock;
use raster::FetchError;
use std::sync::Arc;

/// The ordered set of elevation layers feeding a body's meshes. When
/// several layers cover a tile, the first layer to put a real sample in a
/// cell wins it; cells nobody covers keep the sentinel.
#[derive(Default)]
pub struct ElevationStack {
    layers: RwLock<Vec<Arc<ElevationLayer>>>,
}

impl ElevationStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, layer: Arc<ElevationLayer>) {
        self.layers.write().push(layer);
    }

    pub fn remove(&self, layer: &Arc<ElevationLayer>) {
        self.layers.write().retain(|l| !Arc::ptr_eq(l, layer));
    }

    pub fn layers(&self) -> Vec<Arc<ElevationLayer>> {
        self.layers.read().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.read().is_empty()
    }

    /// Merge every eligible layer's grid for one tile. `None` when no
    /// layer contributed at all.
    pub fn build(
        &self,
        key: &TileKey,
        width: u32,
        height: u32,
        handle: &JobHandle,
    ) -> Result<Option<ElevationGrid>, FetchError> {
        let mut merged: Option<ElevationGrid> = None;
        for layer in self.layers() {
            handle.check_canceled().map_err(FetchError::from)?;
            if !layer.visible()
                || !layer.extents().intersects(key.extents())
                || !layer.is_in_level_range(key.level())
            {
                continue;
            }
            let grid = match layer.heights(key, width, height, handle) {
                Ok(Some(grid)) => grid,
                Ok(None) | Err(FetchError::OutOfRange) => continue,
                Err(err) => return Err(err),
            };
            if grid.width() != width || grid.height() != height {
                continue;
            }
            match &mut merged {
                None => merged = Some(grid),
                Some(target) => {
                    for row in 0..height {
                        for column in 0..width {
                            if target.is_no_data(target.value(row, column)) {
                                let value = grid.value(row, column);
                                if !grid.is_no_data(value) {
                                    target.set_value(row, column, value);
                                }
                            }
                        }
                    }
                }
            }
        }
        Ok(merged)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::layer::ElevationSource;
    use crate::NO_DATA;
    use geo::{Extents, GridSize, ImageSize};
    use raster::LayerContext;
    use tile_cache::{MemoryCache, ReaderRegistry};

    fn context() -> LayerContext {
        LayerContext::new(
            Arc::new(MemoryCache::new()),
            Arc::new(ReaderRegistry::empty()),
        )
    }

    fn key() -> TileKey {
        TileKey::new(
            0,
            0,
            0,
            Extents::new(0., 0., 8., 8.),
            GridSize::new(8, 8),
            ImageSize::new(8, 8),
        )
    }

    fn half_grid(west_value: Option<f32>, east_value: Option<f32>) -> ElevationGrid {
        let mut grid = ElevationGrid::new(8, 8);
        for row in 0..8 {
            for column in 0..4 {
                if let Some(v) = west_value {
                    grid.set_value(row, column, v);
                }
            }
            for column in 4..8 {
                if let Some(v) = east_value {
                    grid.set_value(row, column, v);
                }
            }
        }
        grid
    }

    #[test]
    fn test_two_half_coverage_sources_merge_without_holes() {
        let extents = Extents::new(0., 0., 8., 8.);
        let stack = ElevationStack::new();
        stack.append(ElevationLayer::new(
            "west",
            ElevationSource::Static(half_grid(Some(10.), None)),
            extents,
            context(),
        ));
        stack.append(ElevationLayer::new(
            "east",
            ElevationSource::Static(half_grid(None, Some(20.))),
            extents,
            context(),
        ));
        let handle = JobHandle::new();
        let merged = stack.build(&key(), 8, 8, &handle).unwrap().unwrap();
        // Deep interior cells come from their respective sources; the
        // merge never leaves the whole grid at the sentinel.
        assert_eq!(merged.value(4, 1), 10.);
        assert_eq!(merged.value(4, 6), 20.);
        assert!(merged.values().iter().any(|&v| !merged.is_no_data(v)));
    }

    #[test]
    fn test_first_source_wins_overlapping_cells() {
        let extents = Extents::new(0., 0., 8., 8.);
        let stack = ElevationStack::new();
        stack.append(ElevationLayer::new(
            "first",
            ElevationSource::Static(half_grid(Some(1.), Some(1.))),
            extents,
            context(),
        ));
        stack.append(ElevationLayer::new(
            "second",
            ElevationSource::Static(half_grid(Some(2.), Some(2.))),
            extents,
            context(),
        ));
        let handle = JobHandle::new();
        let merged = stack.build(&key(), 8, 8, &handle).unwrap().unwrap();
        assert_eq!(merged.value(3, 3), 1.);
    }

    #[test]
    fn test_empty_stack_returns_none() {
        let stack = ElevationStack::new();
        let handle = JobHandle::new();
        assert!(stack.build(&key(), 8, 8, &handle).unwrap().is_none());
        let _ = NO_DATA;
    }
}

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
use crate::{
    grid::{ElevationGrid, NO_DATA},
    tiles::{decode_grid, encode_grid, grid_from_image},
};
use geo::{Extents, TileKey};
use jobs::JobHandle;
use log::{debug, warn};
use parking_lot::RwLock;
use raster::{FetchError, LayerContext, NetworkFetcher};
use std::{path::PathBuf, sync::Arc};
use tile_cache::{tile_relative_path, LayerKey};

const CACHE_EXTENSION: &str = "tif";

/// Where a layer's heights come from. The fetch transports mirror the
/// raster sources; the payloads are float TIFF tiles, with plain images
/// accepted from servers that only speak 8/16-bit.
pub enum ElevationSource {
    Network(NetworkFetcher),
    /// A directory of float TIFF tiles in the cache's level/extents naming.
    Directory { root: PathBuf },
    /// A fixed grid covering the layer extents; tests and procedural
    /// terrain.
    Static(ElevationGrid),
}

impl ElevationSource {
    fn descriptor(&self) -> String {
        match self {
            ElevationSource::Network(fetcher) => fetcher.descriptor(),
            ElevationSource::Directory { root } => format!("dir:{}", root.display()),
            ElevationSource::Static(grid) => {
                format!("static:{}x{}", grid.width(), grid.height())
            }
        }
    }
}

struct LayerState {
    visible: bool,
    extents: Extents,
    min_level: u32,
    max_level: u32,
}

/// One entry in the elevation stack. Same cache-first contract as a raster
/// layer, producing sentinel-preserving float grids instead of pixels.
pub struct ElevationLayer {
    name: String,
    source: ElevationSource,
    cache_key: LayerKey,
    context: LayerContext,
    no_data: f32,
    state: RwLock<LayerState>,
}

impl ElevationLayer {
    pub fn new<S: Into<String>>(
        name: S,
        source: ElevationSource,
        extents: Extents,
        context: LayerContext,
    ) -> Arc<Self> {
        let name = name.into();
        let id = fxhash_id(&name, &source);
        Arc::new(Self {
            cache_key: LayerKey::new(name.clone(), id),
            name,
            source,
            context,
            no_data: NO_DATA,
            state: RwLock::new(LayerState {
                visible: true,
                extents,
                min_level: 0,
                max_level: u32::MAX,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &ElevationSource {
        &self.source
    }

    pub fn cache_key(&self) -> &LayerKey {
        &self.cache_key
    }

    pub fn no_data(&self) -> f32 {
        self.no_data
    }

    pub fn visible(&self) -> bool {
        self.state.read().visible
    }

    pub fn set_visible(&self, visible: bool) {
        self.state.write().visible = visible;
    }

    pub fn extents(&self) -> Extents {
        self.state.read().extents
    }

    pub fn set_extents(&self, extents: Extents) {
        self.state.write().extents = extents;
    }

    pub fn set_level_range(&self, min_level: u32, max_level: u32) {
        let mut state = self.state.write();
        state.min_level = min_level;
        state.max_level = max_level;
    }

    pub fn is_in_level_range(&self, level: u32) -> bool {
        let state = self.state.read();
        level >= state.min_level && level <= state.max_level
    }

    pub fn delete_cache(&self) {
        if let Err(err) = self.context.store.delete_layer(&self.cache_key) {
            warn!("could not delete cache for layer {}: {}", self.name, err);
        }
    }

    /// Cache-first heights for one tile at the requested grid size.
    pub fn heights(
        &self,
        key: &TileKey,
        width: u32,
        height: u32,
        handle: &JobHandle,
    ) -> Result<Option<ElevationGrid>, FetchError> {
        if !key.extents().is_sane() {
            return Ok(None);
        }
        handle.check_canceled()?;

        let store = self.context.store.as_ref();
        if let Some(bytes) = store.load_raw(&self.cache_key, key, width, height, CACHE_EXTENSION)
        {
            if let Some(grid) = decode_grid(&bytes, self.no_data) {
                return Ok(Some(grid));
            }
            debug!("corrupt cached elevation tile for layer {}", self.name);
        }
        handle.check_canceled()?;

        let fetched = match &self.source {
            ElevationSource::Network(fetcher) => {
                if store.failure_flag(&self.cache_key, key, width, height) {
                    return Ok(None);
                }
                let bytes = match fetcher.fetch_bytes(key, width, height, handle) {
                    Ok(bytes) => bytes,
                    Err(FetchError::Network(message)) => {
                        store.set_failure_flag(&self.cache_key, key, width, height);
                        return Err(FetchError::Network(message));
                    }
                    Err(other) => return Err(other),
                };
                match decode_grid(&bytes, self.no_data) {
                    Some(grid) => Some(grid),
                    // Not a TIFF; maybe an image-typed height payload. A
                    // payload neither decoder understands is a miss.
                    None => match image::load_from_memory(&bytes) {
                        Ok(image) => Some(grid_from_image(&image, self.no_data)),
                        Err(err) => {
                            debug!("undecodable elevation payload: {}", err);
                            None
                        }
                    },
                }
            }
            ElevationSource::Directory { root } => {
                let relative = tile_relative_path(key, width, height, CACHE_EXTENSION)
                    .ok_or(FetchError::OutOfRange)?;
                let path = root.join(relative);
                if !path.is_file() {
                    None
                } else {
                    std::fs::read(&path)
                        .ok()
                        .and_then(|bytes| decode_grid(&bytes, self.no_data))
                }
            }
            ElevationSource::Static(grid) => {
                let extents = self.extents();
                if !extents.intersects(key.extents()) {
                    None
                } else {
                    Some(crate::resample::resample(
                        grid,
                        &extents,
                        key.extents(),
                        width,
                        height,
                    ))
                }
            }
        };

        if let Some(grid) = &fetched {
            if let Some(bytes) = encode_grid(grid) {
                if let Err(err) =
                    store.save_raw(&self.cache_key, key, width, height, CACHE_EXTENSION, &bytes)
                {
                    warn!("could not cache elevation for layer {}: {}", self.name, err);
                }
            }
        }
        Ok(fetched)
    }
}

fn fxhash_id(name: &str, source: &ElevationSource) -> u64 {
    fxhash::hash64(&format!("{}|{}", name, source.descriptor()))
}

#[cfg(test)]
mod test {
    use super::*;
    use geo::{GridSize, ImageSize};
    use tile_cache::{MemoryCache, ReaderRegistry};

    fn context() -> LayerContext {
        LayerContext::new(
            Arc::new(MemoryCache::new()),
            Arc::new(ReaderRegistry::empty()),
        )
    }

    fn key(extents: Extents) -> TileKey {
        TileKey::new(0, 0, 0, extents, GridSize::new(4, 4), ImageSize::new(8, 8))
    }

    fn flat(height: f32) -> ElevationGrid {
        let mut grid = ElevationGrid::new(8, 8);
        for row in 0..8 {
            for column in 0..8 {
                grid.set_value(row, column, height);
            }
        }
        grid
    }

    #[test]
    fn test_static_layer_covers_intersecting_tiles() {
        let extents = Extents::new(-10., -10., 10., 10.);
        let layer = ElevationLayer::new(
            "terrain",
            ElevationSource::Static(flat(100.)),
            extents,
            context(),
        );
        let handle = JobHandle::new();
        let grid = layer
            .heights(&key(extents), 8, 8, &handle)
            .unwrap()
            .unwrap();
        assert_eq!(grid.value(4, 4), 100.);
    }

    #[test]
    fn test_static_layer_declines_outside() {
        let layer = ElevationLayer::new(
            "terrain",
            ElevationSource::Static(flat(100.)),
            Extents::new(-10., -10., 10., 10.),
            context(),
        );
        let handle = JobHandle::new();
        let outside = key(Extents::new(50., 50., 60., 60.));
        assert!(layer.heights(&outside, 8, 8, &handle).unwrap().is_none());
    }

    #[test]
    fn test_heights_round_trip_through_cache() {
        let extents = Extents::new(-10., -10., 10., 10.);
        let layer = ElevationLayer::new(
            "terrain",
            ElevationSource::Static(flat(7.)),
            extents,
            context(),
        );
        let handle = JobHandle::new();
        let first = layer
            .heights(&key(extents), 8, 8, &handle)
            .unwrap()
            .unwrap();
        let second = layer
            .heights(&key(extents), 8, 8, &handle)
            .unwrap()
            .unwrap();
        assert_eq!(first, second);
    }
}

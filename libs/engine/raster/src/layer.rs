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
    composite::AlphaOverrides,
    error::FetchError,
    network::NetworkFetcher,
    source::RasterSource,
};
use geo::{Extents, TileKey};
use image::{DynamicImage, RgbaImage};
use jobs::JobHandle;
use log::warn;
use parking_lot::{Mutex, RwLock};
use std::{path::PathBuf, sync::Arc};
use tile_cache::{LayerKey, ReaderRegistry, TileStore};

/// The services a layer needs to do I/O: where encoded tiles live and how
/// to decode them. Injected at construction; tests hand in a memory store.
#[derive(Clone)]
pub struct LayerContext {
    pub store: Arc<dyn TileStore>,
    pub readers: Arc<ReaderRegistry>,
}

impl LayerContext {
    pub fn new(store: Arc<dyn TileStore>, readers: Arc<ReaderRegistry>) -> Self {
        Self { store, readers }
    }
}

struct LayerState {
    visible: bool,
    extents: Extents,
    min_level: u32,
    max_level: u32,
    alpha: f32,
    overrides: AlphaOverrides,
    cache_extension: String,
}

/// One entry in the raster stack: shared layer state over a tagged source.
/// `texture` is the cache-first fetch protocol; everything it returns is
/// sized exactly as requested.
pub struct RasterLayer {
    name: String,
    source: RasterSource,
    cache_key: LayerKey,
    context: LayerContext,
    state: RwLock<LayerState>,
}

impl RasterLayer {
    pub fn new<S: Into<String>>(
        name: S,
        source: RasterSource,
        extents: Extents,
        context: LayerContext,
    ) -> Arc<Self> {
        let name = name.into();
        let id = fxhash::hash64(&format!("{}|{}", name, source.descriptor()));
        Arc::new(Self {
            cache_key: LayerKey::new(name.clone(), id),
            name,
            source,
            context,
            state: RwLock::new(LayerState {
                visible: true,
                extents,
                min_level: 0,
                max_level: u32::MAX,
                alpha: 1.,
                overrides: AlphaOverrides::default(),
                cache_extension: "png".to_owned(),
            }),
        })
    }

    pub fn network<S: Into<String>>(
        name: S,
        fetcher: NetworkFetcher,
        extents: Extents,
        context: LayerContext,
    ) -> Arc<Self> {
        Self::new(name, RasterSource::Network(fetcher), extents, context)
    }

    pub fn from_file<S: Into<String>>(
        name: S,
        path: PathBuf,
        extents: Extents,
        context: LayerContext,
    ) -> Arc<Self> {
        Self::new(
            name,
            RasterSource::File {
                path,
                loaded: Mutex::new(None),
            },
            extents,
            context,
        )
    }

    pub fn from_directory<S: Into<String>>(
        name: S,
        root: PathBuf,
        extension: String,
        extents: Extents,
        context: LayerContext,
    ) -> Arc<Self> {
        Self::new(
            name,
            RasterSource::Directory { root, extension },
            extents,
            context,
        )
    }

    pub fn from_image<S: Into<String>>(
        name: S,
        image: RgbaImage,
        extents: Extents,
        context: LayerContext,
    ) -> Arc<Self> {
        Self::new(name, RasterSource::Static(image), extents, context)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &RasterSource {
        &self.source
    }

    pub fn cache_key(&self) -> &LayerKey {
        &self.cache_key
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

    pub fn alpha(&self) -> f32 {
        self.state.read().alpha
    }

    pub fn set_alpha(&self, alpha: f32) {
        self.state.write().alpha = alpha.clamp(0., 1.);
    }

    pub fn alpha_overrides(&self) -> AlphaOverrides {
        self.state.read().overrides.clone()
    }

    /// Pixels of exactly (r, g, b) composite with `alpha` instead of the
    /// layer alpha.
    pub fn set_color_alpha(&self, r: u8, g: u8, b: u8, alpha: u8) {
        self.state
            .write()
            .overrides
            .insert(crate::composite::pack_rgb(r, g, b), alpha);
    }

    pub fn level_range(&self) -> (u32, u32) {
        let state = self.state.read();
        (state.min_level, state.max_level)
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

    pub fn cache_extension(&self) -> String {
        self.state.read().cache_extension.clone()
    }

    /// The codec encoded tiles are cached with. PNG by default; lossy
    /// imagery layers switch to JPEG to keep the cache small.
    pub fn set_cache_extension<S: Into<String>>(&self, extension: S) {
        self.state.write().cache_extension = extension.into();
    }

    pub fn delete_cache(&self) {
        if let Err(err) = self.context.store.delete_layer(&self.cache_key) {
            warn!("could not delete cache for layer {}: {}", self.name, err);
        }
    }

    /// Cache-first tile image. Declines with `None` when the tile is
    /// outside this layer's coverage or the source has nothing for it.
    pub fn texture(
        &self,
        key: &TileKey,
        width: u32,
        height: u32,
        handle: &JobHandle,
    ) -> Result<Option<DynamicImage>, FetchError> {
        if !key.extents().is_sane() {
            return Ok(None);
        }
        handle.check_canceled()?;

        let store = self.context.store.as_ref();
        let cache_extension = self.cache_extension();
        if let Some(image) = store.load(
            &self.cache_key,
            key,
            width,
            height,
            &cache_extension,
            &self.context.readers,
        ) {
            return Ok(Some(image));
        }
        handle.check_canceled()?;

        // A previous session may have recorded that this tile cannot be
        // fetched; skip the wire and decline.
        if self.source.is_network() && store.failure_flag(&self.cache_key, key, width, height) {
            return Ok(None);
        }

        let extents = self.extents();
        let fetched = match self.source.fetch(key, width, height, &extents, handle) {
            Ok(fetched) => fetched,
            Err(FetchError::Network(message)) => {
                store.set_failure_flag(&self.cache_key, key, width, height);
                return Err(FetchError::Network(message));
            }
            Err(other) => return Err(other),
        };

        if let Some(image) = &fetched {
            if let Err(err) = store.save(
                &self.cache_key,
                key,
                width,
                height,
                &cache_extension,
                image,
            ) {
                // Cache trouble degrades to a miss next time around.
                warn!("could not cache tile for layer {}: {}", self.name, err);
            }
        }
        Ok(fetched)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use geo::{GridSize, ImageSize};
    use image::Rgba;
    use tile_cache::MemoryCache;

    fn context() -> (LayerContext, Arc<MemoryCache>) {
        let store = Arc::new(MemoryCache::new());
        (
            LayerContext::new(store.clone(), Arc::new(ReaderRegistry::empty())),
            store,
        )
    }

    fn key(level: u32) -> TileKey {
        TileKey::new(
            0,
            0,
            level,
            Extents::new(-10., -10., 10., 10.),
            GridSize::new(2, 2),
            ImageSize::new(4, 4),
        )
    }

    #[test]
    fn test_fetch_populates_cache() {
        let (context, store) = context();
        let image = RgbaImage::from_pixel(4, 4, Rgba([9, 9, 9, 255]));
        let layer = RasterLayer::from_image(
            "static",
            image,
            Extents::new(-10., -10., 10., 10.),
            context,
        );
        let handle = JobHandle::new();
        assert!(store.is_empty());
        let out = layer.texture(&key(0), 4, 4, &handle).unwrap().unwrap();
        assert_eq!(out.to_rgba8().get_pixel(0, 0).0, [9, 9, 9, 255]);
        assert_eq!(store.len(), 1);
        // Second call comes out of the cache.
        assert!(layer.texture(&key(0), 4, 4, &handle).unwrap().is_some());
    }

    #[test]
    fn test_insane_extents_decline() {
        let (context, _) = context();
        let layer = RasterLayer::from_image(
            "static",
            RgbaImage::new(4, 4),
            Extents::new(-10., -10., 10., 10.),
            context,
        );
        let bad = TileKey::new(
            0,
            0,
            0,
            Extents::new(-200., -91., 10., 10.),
            GridSize::new(2, 2),
            ImageSize::new(4, 4),
        );
        let handle = JobHandle::new();
        assert!(layer.texture(&bad, 4, 4, &handle).unwrap().is_none());
    }

    #[test]
    fn test_canceled_fetch_unwinds() {
        let (context, _) = context();
        let layer = RasterLayer::from_image(
            "static",
            RgbaImage::new(4, 4),
            Extents::new(-10., -10., 10., 10.),
            context,
        );
        let handle = JobHandle::new();
        handle.cancel();
        assert!(matches!(
            layer.texture(&key(0), 4, 4, &handle),
            Err(FetchError::Canceled)
        ));
    }

    #[test]
    fn test_level_range() {
        let (context, _) = context();
        let layer = RasterLayer::from_image(
            "static",
            RgbaImage::new(4, 4),
            Extents::new(-10., -10., 10., 10.),
            context,
        );
        layer.set_level_range(2, 5);
        assert!(!layer.is_in_level_range(1));
        assert!(layer.is_in_level_range(2));
        assert!(layer.is_in_level_range(5));
        assert!(!layer.is_in_level_range(6));
    }
}

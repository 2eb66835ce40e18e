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
use crate::{composite::composite_into, error::FetchError, layer::RasterLayer};
use geo::TileKey;
use image::RgbaImage;
use jobs::JobHandle;
use parking_lot::RwLock;
use std::sync::Arc;

/// The ordered set of raster layers feeding a body's tile textures. Order
/// is paint order: the first layer is the base, later layers composite on
/// top.
#[derive(Default)]
pub struct RasterStack {
    layers: RwLock<Vec<Arc<RasterLayer>>>,
}

impl RasterStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, layer: Arc<RasterLayer>) {
        self.layers.write().push(layer);
    }

    pub fn remove(&self, layer: &Arc<RasterLayer>) {
        self.layers.write().retain(|l| !Arc::ptr_eq(l, layer));
    }

    pub fn layers(&self) -> Vec<Arc<RasterLayer>> {
        self.layers.read().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.read().is_empty()
    }

    /// Composite every visible, intersecting, in-level-range layer into a
    /// single RGBA tile texture of exactly (width, height). `None` when no
    /// layer contributed; the tile then renders untextured and lit.
    pub fn build(
        &self,
        key: &TileKey,
        width: u32,
        height: u32,
        handle: &JobHandle,
    ) -> Result<Option<RgbaImage>, FetchError> {
        let mut result: Option<RgbaImage> = None;
        for layer in self.layers() {
            handle.check_canceled().map_err(FetchError::from)?;
            if !layer.visible()
                || !layer.extents().intersects(key.extents())
                || !layer.is_in_level_range(key.level())
            {
                continue;
            }
            match layer.texture(key, width, height, handle) {
                Ok(Some(image)) => {
                    let dst = result.get_or_insert_with(|| RgbaImage::new(width, height));
                    composite_into(dst, &image, &layer.alpha_overrides(), layer.alpha());
                }
                Ok(None) | Err(FetchError::OutOfRange) => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::layer::LayerContext;
    use geo::{Extents, GridSize, ImageSize};
    use image::Rgba;
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
            Extents::new(-10., -10., 10., 10.),
            GridSize::new(2, 2),
            ImageSize::new(4, 4),
        )
    }

    fn solid_layer(name: &str, rgba: [u8; 4]) -> Arc<RasterLayer> {
        RasterLayer::from_image(
            name,
            RgbaImage::from_pixel(4, 4, Rgba(rgba)),
            Extents::new(-10., -10., 10., 10.),
            context(),
        )
    }

    #[test]
    fn test_empty_stack_builds_nothing() {
        let stack = RasterStack::new();
        let handle = JobHandle::new();
        assert!(stack.build(&key(), 4, 4, &handle).unwrap().is_none());
    }

    #[test]
    fn test_no_intersection_builds_nothing() {
        let stack = RasterStack::new();
        let layer = solid_layer("base", [1, 2, 3, 255]);
        layer.set_extents(Extents::new(100., 10., 120., 30.));
        stack.append(layer);
        let handle = JobHandle::new();
        assert!(stack.build(&key(), 4, 4, &handle).unwrap().is_none());
    }

    #[test]
    fn test_output_size_matches_request() {
        let stack = RasterStack::new();
        stack.append(solid_layer("base", [5, 6, 7, 255]));
        let handle = JobHandle::new();
        let image = stack.build(&key(), 32, 16, &handle).unwrap().unwrap();
        assert_eq!(image.dimensions(), (32, 16));
    }

    #[test]
    fn test_layer_order_and_overrides() {
        // Scenario: opaque base, a half-alpha overlay, and a third layer
        // whose red is keyed out and whose green is forced opaque.
        let stack = RasterStack::new();
        stack.append(solid_layer("base", [10, 10, 10, 255]));

        let overlay = solid_layer("overlay", [10, 10, 10, 255]);
        overlay.set_alpha(0.5);
        stack.append(overlay);

        let mut keyed_image = RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255]));
        for x in 0..4 {
            keyed_image.put_pixel(x, 0, Rgba([0, 255, 0, 255]));
        }
        let keyed = RasterLayer::from_image(
            "keyed",
            keyed_image,
            Extents::new(-10., -10., 10., 10.),
            context(),
        );
        keyed.set_color_alpha(255, 0, 0, 0);
        keyed.set_color_alpha(0, 255, 0, 255);
        stack.append(keyed);

        let handle = JobHandle::new();
        let image = stack.build(&key(), 4, 4, &handle).unwrap().unwrap();
        // Red pixels keyed out: base/overlay color shows through.
        assert_eq!(image.get_pixel(0, 2).0, [10, 10, 10, 255]);
        // Green pixels forced opaque: pure green.
        assert_eq!(image.get_pixel(0, 0).0, [0, 255, 0, 255]);
    }

    #[test]
    fn test_invisible_and_out_of_level_layers_skipped() {
        let stack = RasterStack::new();
        let hidden = solid_layer("hidden", [200, 0, 0, 255]);
        hidden.set_visible(false);
        stack.append(hidden);
        let deep = solid_layer("deep", [0, 200, 0, 255]);
        deep.set_level_range(5, 10);
        stack.append(deep);
        let handle = JobHandle::new();
        assert!(stack.build(&key(), 4, 4, &handle).unwrap().is_none());
    }
}

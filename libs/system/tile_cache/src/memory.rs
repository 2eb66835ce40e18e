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
    readers::ReaderRegistry,
    store::{CacheError, LayerKey, TileStore},
};
use geo::TileKey;
use image::DynamicImage;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

type EntryKey = (u64, u32, u32, u32, u32, u32, String);

fn entry_key(
    layer: &LayerKey,
    key: &TileKey,
    width: u32,
    height: u32,
    extension: &str,
) -> EntryKey {
    (
        layer.id(),
        key.level(),
        key.row(),
        key.column(),
        width,
        height,
        extension.to_owned(),
    )
}

/// In-memory stand-in for the disk cache, used by the engine tests. Stores
/// decoded images directly; the codec step is exercised by the disk tests.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<EntryKey, DynamicImage>>,
    raw: Mutex<HashMap<EntryKey, Vec<u8>>>,
    flags: Mutex<HashSet<EntryKey>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl TileStore for MemoryCache {
    fn load(
        &self,
        layer: &LayerKey,
        key: &TileKey,
        width: u32,
        height: u32,
        extension: &str,
        _readers: &ReaderRegistry,
    ) -> Option<DynamicImage> {
        self.entries
            .lock()
            .get(&entry_key(layer, key, width, height, extension))
            .cloned()
    }

    fn save(
        &self,
        layer: &LayerKey,
        key: &TileKey,
        width: u32,
        height: u32,
        extension: &str,
        image: &DynamicImage,
    ) -> Result<(), CacheError> {
        self.entries
            .lock()
            .insert(entry_key(layer, key, width, height, extension), image.clone());
        Ok(())
    }

    fn load_raw(
        &self,
        layer: &LayerKey,
        key: &TileKey,
        width: u32,
        height: u32,
        extension: &str,
    ) -> Option<Vec<u8>> {
        self.raw
            .lock()
            .get(&entry_key(layer, key, width, height, extension))
            .cloned()
    }

    fn save_raw(
        &self,
        layer: &LayerKey,
        key: &TileKey,
        width: u32,
        height: u32,
        extension: &str,
        bytes: &[u8],
    ) -> Result<(), CacheError> {
        self.raw
            .lock()
            .insert(entry_key(layer, key, width, height, extension), bytes.to_vec());
        Ok(())
    }

    fn delete_layer(&self, layer: &LayerKey) -> Result<(), CacheError> {
        self.entries.lock().retain(|k, _| k.0 != layer.id());
        self.raw.lock().retain(|k, _| k.0 != layer.id());
        self.flags.lock().retain(|k| k.0 != layer.id());
        Ok(())
    }

    fn failure_flag(&self, layer: &LayerKey, key: &TileKey, width: u32, height: u32) -> bool {
        self.flags
            .lock()
            .contains(&entry_key(layer, key, width, height, "failed"))
    }

    fn set_failure_flag(&self, layer: &LayerKey, key: &TileKey, width: u32, height: u32) {
        self.flags
            .lock()
            .insert(entry_key(layer, key, width, height, "failed"));
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use geo::{Extents, GridSize, ImageSize};

    #[test]
    fn test_save_load_delete() {
        let cache = MemoryCache::new();
        let readers = ReaderRegistry::empty();
        let layer = LayerKey::new("mem", 5);
        let key = TileKey::new(
            1,
            2,
            3,
            Extents::new(0., 0., 1., 1.),
            GridSize::new(2, 2),
            ImageSize::new(4, 4),
        );
        let image = DynamicImage::new_rgba8(4, 4);
        cache.save(&layer, &key, 4, 4, "png", &image).unwrap();
        assert!(cache.load(&layer, &key, 4, 4, "png", &readers).is_some());
        assert!(cache.load(&layer, &key, 8, 8, "png", &readers).is_none());
        cache.delete_layer(&layer).unwrap();
        assert!(cache.is_empty());
    }
}

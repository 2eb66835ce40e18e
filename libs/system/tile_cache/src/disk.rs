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
    store::{CacheError, CacheStatus, LayerKey, TileStore},
};
use geo::{Extents, TileKey};
use image::DynamicImage;
use log::{debug, warn};
use parking_lot::Mutex;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Content-addressed file store for encoded tile images.
///
/// Layout: `<base>/<name>_<id>/<level>/<extents>_<w>x<h>.<ext>`. The
/// extents string carries fifteen significant digits per component, enough
/// to keep deep neighboring tiles from colliding on a file name.
///
/// Disk traffic is serialized through one reader and one writer mutex; the
/// base directory has its own. The cache holds no other state, so it is
/// freely shared between layers and worker threads.
pub struct DiskCache {
    base: Mutex<PathBuf>,
    reader: Mutex<()>,
    writer: Mutex<()>,
}

impl DiskCache {
    pub fn new<P: Into<PathBuf>>(base: P) -> Self {
        Self {
            base: Mutex::new(base.into()),
            reader: Mutex::new(()),
            writer: Mutex::new(()),
        }
    }

    pub fn base_directory(&self) -> PathBuf {
        self.base.lock().clone()
    }

    pub fn set_base_directory<P: Into<PathBuf>>(&self, base: P) {
        *self.base.lock() = base.into();
    }

    /// Resolve the cache path for a tile and report whether it exists.
    pub fn check(
        &self,
        layer: &LayerKey,
        key: &TileKey,
        width: u32,
        height: u32,
        extension: &str,
    ) -> (CacheStatus, PathBuf) {
        let path = match self.file_path(layer, key, width, height, extension) {
            Some(path) => path,
            None => return (CacheStatus::BadName, PathBuf::new()),
        };
        if path.is_file() {
            (CacheStatus::FileOk, path)
        } else {
            (CacheStatus::FileMissing, path)
        }
    }

    /// Decode an image file through the registry. Corrupt or truncated
    /// files read as `None`; the caller re-fetches.
    pub fn read_image(&self, path: &Path, readers: &ReaderRegistry) -> Option<DynamicImage> {
        let extension = path.extension()?.to_str()?;
        let reader = readers.find(extension)?;
        let _guard = self.reader.lock();
        reader.read(path)
    }

    /// Encode to a temp file and rename into place, so a concurrent reader
    /// never observes a partial file.
    pub fn write_image(&self, path: &Path, image: &DynamicImage) -> Result<(), CacheError> {
        let parent = path
            .parent()
            .ok_or_else(|| CacheError::BadName(path.display().to_string()))?;
        let format = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(image::ImageFormat::from_extension)
            .ok_or_else(|| CacheError::BadName(path.display().to_string()))?;
        let _guard = self.writer.lock();
        fs::create_dir_all(parent)?;
        let temp = path.with_extension("part");
        image
            .save_with_format(&temp, format)
            .map_err(|err| CacheError::Encode(err.to_string()))?;
        fs::rename(&temp, path)?;
        Ok(())
    }

    pub fn layer_directory(&self, layer: &LayerKey) -> Option<PathBuf> {
        let base = self.base.lock().clone();
        if base.as_os_str().is_empty() || layer.name().is_empty() {
            return None;
        }
        Some(base.join(format!("{}_{:016x}", sanitize(layer.name()), layer.id())))
    }

    pub fn file_path(
        &self,
        layer: &LayerKey,
        key: &TileKey,
        width: u32,
        height: u32,
        extension: &str,
    ) -> Option<PathBuf> {
        let dir = self.layer_directory(layer)?;
        Some(dir.join(tile_relative_path(key, width, height, extension)?))
    }

    fn flag_path(
        &self,
        layer: &LayerKey,
        key: &TileKey,
        width: u32,
        height: u32,
    ) -> Option<PathBuf> {
        self.file_path(layer, key, width, height, "failed")
    }
}

impl TileStore for DiskCache {
    fn load(
        &self,
        layer: &LayerKey,
        key: &TileKey,
        width: u32,
        height: u32,
        extension: &str,
        readers: &ReaderRegistry,
    ) -> Option<DynamicImage> {
        match self.check(layer, key, width, height, extension) {
            (CacheStatus::FileOk, path) => self.read_image(&path, readers),
            _ => None,
        }
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
        let (status, path) = self.check(layer, key, width, height, extension);
        if status == CacheStatus::BadName {
            return Err(CacheError::BadName(format!(
                "{}/{}",
                layer.name(),
                key.level()
            )));
        }
        self.write_image(&path, image)
    }

    fn load_raw(
        &self,
        layer: &LayerKey,
        key: &TileKey,
        width: u32,
        height: u32,
        extension: &str,
    ) -> Option<Vec<u8>> {
        let (status, path) = self.check(layer, key, width, height, extension);
        if status != CacheStatus::FileOk {
            return None;
        }
        let _guard = self.reader.lock();
        fs::read(&path).ok()
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
        let (status, path) = self.check(layer, key, width, height, extension);
        if status == CacheStatus::BadName {
            return Err(CacheError::BadName(format!(
                "{}/{}",
                layer.name(),
                key.level()
            )));
        }
        let parent = path
            .parent()
            .ok_or_else(|| CacheError::BadName(path.display().to_string()))?;
        let _guard = self.writer.lock();
        fs::create_dir_all(parent)?;
        let temp = path.with_extension("part");
        fs::write(&temp, bytes)?;
        fs::rename(&temp, &path)?;
        Ok(())
    }

    fn delete_layer(&self, layer: &LayerKey) -> Result<(), CacheError> {
        let dir = self
            .layer_directory(layer)
            .ok_or_else(|| CacheError::BadName(layer.name().to_owned()))?;
        let _guard = self.writer.lock();
        if dir.is_dir() {
            debug!("deleting cache subtree {}", dir.display());
            fs::remove_dir_all(&dir)?;
        }
        Ok(())
    }

    fn failure_flag(&self, layer: &LayerKey, key: &TileKey, width: u32, height: u32) -> bool {
        self.flag_path(layer, key, width, height)
            .map(|p| p.is_file())
            .unwrap_or(false)
    }

    fn set_failure_flag(&self, layer: &LayerKey, key: &TileKey, width: u32, height: u32) {
        if let Some(path) = self.flag_path(layer, key, width, height) {
            let _guard = self.writer.lock();
            if let Some(parent) = path.parent() {
                if let Err(err) = fs::create_dir_all(parent).and_then(|_| fs::write(&path, b"")) {
                    warn!("could not write failure flag {}: {}", path.display(), err);
                }
            }
        }
    }
}

/// Level directory plus file name for one tile, relative to a layer root.
/// Directory-of-tiles layers use the same scheme, so a cache subtree can be
/// served back as a read-only layer.
pub fn tile_relative_path(
    key: &TileKey,
    width: u32,
    height: u32,
    extension: &str,
) -> Option<PathBuf> {
    let extents = extents_string(key.extents())?;
    Some(PathBuf::from(format!("{:02}", key.level())).join(format!(
        "{}_{}x{}.{}",
        extents, width, height, extension
    )))
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Encode the four extents doubles with fifteen significant digits, using
/// characters that are safe in file names on every platform we build for.
fn extents_string(extents: &Extents) -> Option<String> {
    let components = [
        extents.min_lon(),
        extents.min_lat(),
        extents.max_lon(),
        extents.max_lat(),
    ];
    if components.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let encoded = components
        .iter()
        .map(|v| format!("{:.15e}", v).replace('-', "n").replace('+', "p"))
        .collect::<Vec<_>>();
    Some(encoded.join("_"))
}

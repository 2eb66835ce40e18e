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
use crate::readers::ReaderRegistry;
use geo::TileKey;
use image::DynamicImage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache encode: {0}")]
    Encode(String),
    #[error("invalid cache name: {0}")]
    BadName(String),
}

/// Identity of a layer within the cache: a human-readable kind name plus a
/// hash of the layer's defining parameters, so two layers pointed at
/// different servers never share a subtree.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct LayerKey {
    name: String,
    id: u64,
}

impl LayerKey {
    pub fn new<S: Into<String>>(name: S, id: u64) -> Self {
        Self {
            name: name.into(),
            id,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CacheStatus {
    FileOk,
    FileMissing,
    BadName,
}

/// The storage seam between the data pipelines and the filesystem. The
/// production implementation is `DiskCache`; tests substitute
/// `MemoryCache`. Every method keys on (layer, tile, pixel size), so a
/// layer fetched at several sizes caches each size separately.
///
/// A decode failure on load is a miss, never an error: the caller falls
/// through to its source fetch and a later successful fetch overwrites the
/// bad entry.
pub trait TileStore: Send + Sync {
    fn load(
        &self,
        layer: &LayerKey,
        key: &TileKey,
        width: u32,
        height: u32,
        extension: &str,
        readers: &ReaderRegistry,
    ) -> Option<DynamicImage>;

    fn save(
        &self,
        layer: &LayerKey,
        key: &TileKey,
        width: u32,
        height: u32,
        extension: &str,
        image: &DynamicImage,
    ) -> Result<(), CacheError>;

    /// Raw-bytes entries for artifacts that are not 8-bit imagery, such as
    /// float elevation tiles. Same keying and the same miss-on-corruption
    /// policy; the caller owns the encoding.
    fn load_raw(
        &self,
        layer: &LayerKey,
        key: &TileKey,
        width: u32,
        height: u32,
        extension: &str,
    ) -> Option<Vec<u8>>;

    fn save_raw(
        &self,
        layer: &LayerKey,
        key: &TileKey,
        width: u32,
        height: u32,
        extension: &str,
        bytes: &[u8],
    ) -> Result<(), CacheError>;

    fn delete_layer(&self, layer: &LayerKey) -> Result<(), CacheError>;

    /// Persistent marker that a fetch for this tile failed hard, so a later
    /// session does not hammer the same dead URL.
    fn failure_flag(&self, layer: &LayerKey, key: &TileKey, width: u32, height: u32) -> bool;

    fn set_failure_flag(&self, layer: &LayerKey, key: &TileKey, width: u32, height: u32);
}

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
use image::DynamicImage;
use log::debug;
use std::path::Path;

/// A pluggable image decoder selected by file extension. Embedders register
/// readers on the registry they hand to the engine; the built-in set covers
/// the formats the cache writes itself.
pub trait ImageReader: Send + Sync {
    fn can_read(&self, extension: &str) -> bool;

    /// Decode the file. `None` means unreadable; the cache treats that the
    /// same as a missing file.
    fn read(&self, path: &Path) -> Option<DynamicImage>;
}

struct StandardReader {
    extensions: &'static [&'static str],
}

impl ImageReader for StandardReader {
    fn can_read(&self, extension: &str) -> bool {
        let ext = extension.trim_start_matches('.');
        self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
    }

    fn read(&self, path: &Path) -> Option<DynamicImage> {
        match image::open(path) {
            Ok(image) => Some(image),
            Err(err) => {
                debug!("failed to decode {}: {}", path.display(), err);
                None
            }
        }
    }
}

#[derive(Default)]
pub struct ReaderRegistry {
    readers: Vec<Box<dyn ImageReader>>,
}

impl ReaderRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// PNG, JPEG, and TIFF readers.
    pub fn with_default_readers() -> Self {
        let mut registry = Self::default();
        registry.register(Box::new(StandardReader {
            extensions: &["png"],
        }));
        registry.register(Box::new(StandardReader {
            extensions: &["jpg", "jpeg"],
        }));
        registry.register(Box::new(StandardReader {
            extensions: &["tif", "tiff"],
        }));
        registry
    }

    pub fn register(&mut self, reader: Box<dyn ImageReader>) {
        self.readers.push(reader);
    }

    pub fn find(&self, extension: &str) -> Option<&dyn ImageReader> {
        self.readers
            .iter()
            .map(|r| r.as_ref())
            .find(|r| r.can_read(extension))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_find_by_extension() {
        let registry = ReaderRegistry::with_default_readers();
        assert!(registry.find("png").is_some());
        assert!(registry.find(".PNG").is_some());
        assert!(registry.find("jpeg").is_some());
        assert!(registry.find("bmp").is_none());
    }
}

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
use crate::{error::FetchError, network::NetworkFetcher};
use geo::{Extents, TileKey};
use image::{DynamicImage, Rgba, RgbaImage};
use jobs::JobHandle;
use log::debug;
use parking_lot::Mutex;
use std::path::PathBuf;
use tile_cache::tile_relative_path;

/// Where a raster layer's pixels come from. One fetch protocol over four
/// transports; the leaf behaviors compose with the shared layer state
/// rather than subclassing it.
pub enum RasterSource {
    /// Templated HTTP endpoint.
    Network(NetworkFetcher),
    /// One georeferenced image on disk covering the layer extents,
    /// decoded lazily on first use.
    File {
        path: PathBuf,
        loaded: Mutex<Option<Option<RgbaImage>>>,
    },
    /// A directory of pre-tiled images in the cache's level/extents
    /// naming, served read-only.
    Directory { root: PathBuf, extension: String },
    /// An in-memory image; procedural layers and tests.
    Static(RgbaImage),
}

impl RasterSource {
    pub fn is_network(&self) -> bool {
        matches!(self, RasterSource::Network(_))
    }

    /// A stable description of the source, hashed into the cache identity.
    pub fn descriptor(&self) -> String {
        match self {
            RasterSource::Network(fetcher) => fetcher.descriptor(),
            RasterSource::File { path, .. } => format!("file:{}", path.display()),
            RasterSource::Directory { root, extension } => {
                format!("dir:{}:{}", root.display(), extension)
            }
            RasterSource::Static(image) => {
                format!("static:{}x{}", image.width(), image.height())
            }
        }
    }

    /// Produce the layer's pixels for one tile, or decline with `None`.
    /// `layer_extents` is the geographic coverage of the source image for
    /// the file and static variants.
    pub fn fetch(
        &self,
        key: &TileKey,
        width: u32,
        height: u32,
        layer_extents: &Extents,
        handle: &JobHandle,
    ) -> Result<Option<DynamicImage>, FetchError> {
        handle.check_canceled()?;
        match self {
            RasterSource::Network(fetcher) => {
                let bytes = fetcher.fetch_bytes(key, width, height, handle)?;
                handle.check_canceled()?;
                match image::load_from_memory(&bytes) {
                    Ok(image) => Ok(Some(image)),
                    Err(err) => {
                        // A payload we cannot decode is worth no more than
                        // a missing file; decline and cache nothing.
                        debug!("undecodable payload for {:?}: {}", key, err);
                        Ok(None)
                    }
                }
            }
            RasterSource::File { path, loaded } => {
                let mut slot = loaded.lock();
                let image = slot
                    .get_or_insert_with(|| match image::open(path) {
                        Ok(image) => Some(image.to_rgba8()),
                        Err(err) => {
                            debug!("could not open {}: {}", path.display(), err);
                            None
                        }
                    })
                    .clone();
                match image {
                    Some(image) => Ok(extract_region(
                        &image,
                        layer_extents,
                        key.extents(),
                        width,
                        height,
                    )),
                    None => Ok(None),
                }
            }
            RasterSource::Directory { root, extension } => {
                let relative = tile_relative_path(key, width, height, extension)
                    .ok_or(FetchError::OutOfRange)?;
                let path = root.join(relative);
                if !path.is_file() {
                    return Ok(None);
                }
                match image::open(&path) {
                    Ok(image) => Ok(Some(image)),
                    Err(err) => {
                        debug!("could not decode {}: {}", path.display(), err);
                        Ok(None)
                    }
                }
            }
            RasterSource::Static(image) => Ok(extract_region(
                image,
                layer_extents,
                key.extents(),
                width,
                height,
            )),
        }
    }
}

/// Resample the part of `source` (covering `source_extents`) that overlaps
/// `request` into a `width` x `height` image; pixels outside the source
/// stay transparent. Returns `None` when there is no overlap at all.
pub(crate) fn extract_region(
    source: &RgbaImage,
    source_extents: &Extents,
    request: &Extents,
    width: u32,
    height: u32,
) -> Option<DynamicImage> {
    if !source_extents.intersects(request) {
        return None;
    }
    let mut out = RgbaImage::new(width, height);
    for y in 0..height {
        // Image row zero is the northern edge.
        let lat = request.max_lat() - (y as f64 + 0.5) / height as f64 * request.height();
        for x in 0..width {
            let lon = request.min_lon() + (x as f64 + 0.5) / width as f64 * request.width();
            if !source_extents.contains(lon, lat) {
                continue;
            }
            let u = (lon - source_extents.min_lon()) / source_extents.width();
            let v = (source_extents.max_lat() - lat) / source_extents.height();
            out.put_pixel(x, y, sample_bilinear(source, u, v));
        }
    }
    Some(DynamicImage::ImageRgba8(out))
}

/// Bilinear sample at normalized (u, v) with the half-pixel convention.
pub fn sample_bilinear(image: &RgbaImage, u: f64, v: f64) -> Rgba<u8> {
    let (w, h) = (image.width() as i64, image.height() as i64);
    let x = u * w as f64 - 0.5;
    let y = v * h as f64 - 0.5;
    let x0 = (x.floor() as i64).clamp(0, w - 1);
    let y0 = (y.floor() as i64).clamp(0, h - 1);
    let x1 = (x0 + 1).clamp(0, w - 1);
    let y1 = (y0 + 1).clamp(0, h - 1);
    let tx = (x - x0 as f64).clamp(0., 1.);
    let ty = (y - y0 as f64).clamp(0., 1.);

    let p00 = image.get_pixel(x0 as u32, y0 as u32).0;
    let p10 = image.get_pixel(x1 as u32, y0 as u32).0;
    let p01 = image.get_pixel(x0 as u32, y1 as u32).0;
    let p11 = image.get_pixel(x1 as u32, y1 as u32).0;

    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = p00[c] as f64 * (1. - tx) + p10[c] as f64 * tx;
        let bottom = p01[c] as f64 * (1. - tx) + p11[c] as f64 * tx;
        out[c] = (top * (1. - ty) + bottom * ty).round() as u8;
    }
    Rgba(out)
}

#[cfg(test)]
mod test {
    use super::*;
    use geo::{GridSize, ImageSize};

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(rgba))
    }

    #[test]
    fn test_extract_region_full_overlap() {
        let source = solid(8, 8, [10, 20, 30, 255]);
        let extents = Extents::new(-10., -10., 10., 10.);
        let out = extract_region(&source, &extents, &extents, 4, 4)
            .unwrap()
            .to_rgba8();
        assert_eq!(out.dimensions(), (4, 4));
        assert_eq!(out.get_pixel(2, 2).0, [10, 20, 30, 255]);
    }

    #[test]
    fn test_extract_region_disjoint_declines() {
        let source = solid(8, 8, [10, 20, 30, 255]);
        let extents = Extents::new(-10., -10., 10., 10.);
        let request = Extents::new(20., 20., 30., 30.);
        assert!(extract_region(&source, &extents, &request, 4, 4).is_none());
    }

    #[test]
    fn test_extract_region_partial_overlap_leaves_transparent() {
        let source = solid(8, 8, [200, 0, 0, 255]);
        let extents = Extents::new(0., 0., 10., 10.);
        let request = Extents::new(-10., -10., 10., 10.);
        let out = extract_region(&source, &extents, &request, 8, 8)
            .unwrap()
            .to_rgba8();
        // Upper-right quadrant covered, lower-left transparent.
        assert_eq!(out.get_pixel(6, 1).0[3], 255);
        assert_eq!(out.get_pixel(1, 6).0[3], 0);
    }

    #[test]
    fn test_static_source_fetch_declines_out_of_level() {
        let image = solid(4, 4, [1, 2, 3, 255]);
        let source = RasterSource::Static(image);
        let handle = JobHandle::new();
        let key = TileKey::new(
            0,
            0,
            0,
            Extents::new(0., 0., 1., 1.),
            GridSize::new(2, 2),
            ImageSize::new(4, 4),
        );
        let extents = Extents::new(50., 50., 60., 60.);
        assert!(source
            .fetch(&key, 4, 4, &extents, &handle)
            .unwrap()
            .is_none());
    }
}

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
use fxhash::FxHashMap;
use image::{DynamicImage, RgbaImage};
use log::warn;

/// Per-color alpha overrides: a packed RGB triple mapped to the alpha byte
/// that pixels of exactly that color should composite with. The classic
/// use is keying out a server's "no data here" fill color.
pub type AlphaOverrides = FxHashMap<u32, u8>;

pub fn pack_rgb(r: u8, g: u8, b: u8) -> u32 {
    ((r as u32) << 16) | ((g as u32) << 8) | (b as u32)
}

#[inline]
fn blend(dst: &mut [u8; 4], r: u8, g: u8, b: u8, alpha_byte: u8) {
    // An override of 255 must reproduce the source pixel exactly and an
    // override of 0 must leave the destination untouched.
    let a = alpha_byte as f32 / 255.;
    dst[0] = (dst[0] as f32 * (1. - a) + r as f32 * a).round() as u8;
    dst[1] = (dst[1] as f32 * (1. - a) + g as f32 * a).round() as u8;
    dst[2] = (dst[2] as f32 * (1. - a) + b as f32 * a).round() as u8;
    // Alpha was already folded into the color channels; once any source
    // has contributed the output pixel is opaque.
    if alpha_byte > 0 {
        dst[3] = 255;
    }
}

#[inline]
fn effective_alpha(
    overrides: &AlphaOverrides,
    r: u8,
    g: u8,
    b: u8,
    layer_alpha: f32,
    src_alpha: u8,
) -> u8 {
    if !overrides.is_empty() {
        if let Some(&alpha) = overrides.get(&pack_rgb(r, g, b)) {
            return alpha;
        }
    }
    (layer_alpha * src_alpha as f32) as u8
}

/// Blend one layer image onto the accumulator. Sources may be 1-channel
/// (luminance), 2-channel (luminance + alpha), 3-channel (RGB), or
/// 4-channel (RGBA); anything else is converted to RGBA first. Images of
/// the wrong size are rejected, never stretched.
pub fn composite_into(
    dst: &mut RgbaImage,
    src: &DynamicImage,
    overrides: &AlphaOverrides,
    layer_alpha: f32,
) {
    if dst.dimensions() != (src.width(), src.height()) {
        warn!(
            "composite size mismatch: {:?} vs {:?}; layer skipped",
            dst.dimensions(),
            (src.width(), src.height())
        );
        return;
    }

    match src {
        DynamicImage::ImageLuma8(gray) => {
            for (dst_pixel, src_pixel) in dst.pixels_mut().zip(gray.pixels()) {
                let v = src_pixel.0[0];
                let a = effective_alpha(overrides, v, v, v, layer_alpha, 255);
                blend(&mut dst_pixel.0, v, v, v, a);
            }
        }
        DynamicImage::ImageLumaA8(gray) => {
            for (dst_pixel, src_pixel) in dst.pixels_mut().zip(gray.pixels()) {
                let [v, src_a] = src_pixel.0;
                let a = effective_alpha(overrides, v, v, v, layer_alpha, src_a);
                blend(&mut dst_pixel.0, v, v, v, a);
            }
        }
        DynamicImage::ImageRgb8(rgb) => {
            for (dst_pixel, src_pixel) in dst.pixels_mut().zip(rgb.pixels()) {
                let [r, g, b] = src_pixel.0;
                let a = effective_alpha(overrides, r, g, b, layer_alpha, 255);
                blend(&mut dst_pixel.0, r, g, b, a);
            }
        }
        DynamicImage::ImageRgba8(rgba) => {
            for (dst_pixel, src_pixel) in dst.pixels_mut().zip(rgba.pixels()) {
                let [r, g, b, src_a] = src_pixel.0;
                let a = effective_alpha(overrides, r, g, b, layer_alpha, src_a);
                blend(&mut dst_pixel.0, r, g, b, a);
            }
        }
        other => composite_into(
            dst,
            &DynamicImage::ImageRgba8(other.to_rgba8()),
            overrides,
            layer_alpha,
        ),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use image::Rgba;

    fn solid(rgba: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(4, 4, Rgba(rgba))
    }

    fn transparent() -> RgbaImage {
        RgbaImage::new(4, 4)
    }

    #[test]
    fn test_opaque_layer_is_identity() {
        let mut dst = transparent();
        let src = DynamicImage::ImageRgba8(solid([40, 80, 120, 255]));
        composite_into(&mut dst, &src, &AlphaOverrides::default(), 1.);
        assert_eq!(dst.get_pixel(0, 0).0, [40, 80, 120, 255]);
    }

    #[test]
    fn test_half_alpha_overlay() {
        let mut dst = solid([100, 100, 100, 255]);
        let src = DynamicImage::ImageRgba8(solid([200, 200, 200, 255]));
        composite_into(&mut dst, &src, &AlphaOverrides::default(), 0.5);
        let value = dst.get_pixel(0, 0).0[0];
        assert!((149..=151).contains(&value), "got {}", value);
    }

    #[test]
    fn test_per_color_override_zero_hides_color() {
        let mut dst = solid([10, 20, 30, 255]);
        let src = DynamicImage::ImageRgba8(solid([255, 0, 0, 255]));
        let mut overrides = AlphaOverrides::default();
        overrides.insert(pack_rgb(255, 0, 0), 0);
        composite_into(&mut dst, &src, &overrides, 1.);
        assert_eq!(dst.get_pixel(0, 0).0, [10, 20, 30, 255]);
    }

    #[test]
    fn test_per_color_override_full_replaces() {
        let mut dst = solid([10, 20, 30, 255]);
        let src = DynamicImage::ImageRgba8(solid([0, 255, 0, 10]));
        let mut overrides = AlphaOverrides::default();
        overrides.insert(pack_rgb(0, 255, 0), 255);
        composite_into(&mut dst, &src, &overrides, 0.25);
        assert_eq!(dst.get_pixel(0, 0).0, [0, 255, 0, 255]);
    }

    #[test]
    fn test_luminance_broadcasts_to_rgb() {
        let mut dst = transparent();
        let gray = image::GrayImage::from_pixel(4, 4, image::Luma([77]));
        composite_into(
            &mut dst,
            &DynamicImage::ImageLuma8(gray),
            &AlphaOverrides::default(),
            1.,
        );
        assert_eq!(dst.get_pixel(1, 1).0, [77, 77, 77, 255]);
    }

    #[test]
    fn test_transparent_source_leaves_destination() {
        let mut dst = solid([1, 2, 3, 255]);
        let src = DynamicImage::ImageRgba8(solid([200, 200, 200, 0]));
        composite_into(&mut dst, &src, &AlphaOverrides::default(), 1.);
        assert_eq!(dst.get_pixel(0, 0).0, [1, 2, 3, 255]);
    }

    #[test]
    fn test_composite_associativity_up_to_rounding() {
        let base = DynamicImage::ImageRgba8(solid([10, 60, 110, 255]));
        let mid = DynamicImage::ImageRgba8(solid([90, 120, 30, 128]));
        let top = DynamicImage::ImageRgba8(solid([250, 5, 180, 64]));
        let overrides = AlphaOverrides::default();

        let mut all_at_once = transparent();
        for layer in [&base, &mid, &top] {
            composite_into(&mut all_at_once, layer, &overrides, 1.);
        }

        let mut two_then_one = transparent();
        composite_into(&mut two_then_one, &base, &overrides, 1.);
        composite_into(&mut two_then_one, &mid, &overrides, 1.);
        let partial = DynamicImage::ImageRgba8(two_then_one.clone());
        let mut recomposed = transparent();
        composite_into(&mut recomposed, &partial, &overrides, 1.);
        composite_into(&mut recomposed, &top, &overrides, 1.);

        for (a, b) in all_at_once.pixels().zip(recomposed.pixels()) {
            for c in 0..4 {
                assert!((a.0[c] as i32 - b.0[c] as i32).abs() <= 2);
            }
        }
    }
}

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
use crate::grid::ElevationGrid;
use image::DynamicImage;
use log::debug;
use std::io::Cursor;
use tiff::{
    decoder::{Decoder, DecodingResult},
    encoder::{colortype, TiffEncoder},
};

/// Encode a grid as a single-strip 32-bit float grayscale TIFF. This is
/// the wire and cache format for elevation tiles.
pub fn encode_grid(grid: &ElevationGrid) -> Option<Vec<u8>> {
    let mut bytes = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut bytes).ok()?;
        encoder
            .write_image::<colortype::Gray32Float>(grid.width(), grid.height(), grid.values())
            .ok()?;
    }
    Some(bytes.into_inner())
}

/// Decode a float or integer grayscale TIFF into a grid. Anything that
/// does not parse is a miss, reported as `None`.
pub fn decode_grid(bytes: &[u8], no_data: f32) -> Option<ElevationGrid> {
    let mut decoder = Decoder::new(Cursor::new(bytes)).ok()?;
    let (width, height) = decoder.dimensions().ok()?;
    let values = match decoder.read_image().ok()? {
        DecodingResult::F32(values) => values,
        DecodingResult::F64(values) => values.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I16(values) => values.into_iter().map(|v| v as f32).collect(),
        // Heights above 32767 do not occur on bodies we model; servers
        // that hand back u16 are really sending i16.
        DecodingResult::U16(values) => values.into_iter().map(|v| v as i16 as f32).collect(),
        DecodingResult::U8(values) => values.into_iter().map(|v| v as f32).collect(),
        other => {
            debug!("unsupported elevation sample format: {:?}", type_name(&other));
            return None;
        }
    };
    if values.len() != (width * height) as usize {
        return None;
    }
    Some(ElevationGrid::from_values(width, height, no_data, values))
}

fn type_name(result: &DecodingResult) -> &'static str {
    match result {
        DecodingResult::U8(_) => "u8",
        DecodingResult::U16(_) => "u16",
        DecodingResult::U32(_) => "u32",
        DecodingResult::U64(_) => "u64",
        DecodingResult::I8(_) => "i8",
        DecodingResult::I16(_) => "i16",
        DecodingResult::I32(_) => "i32",
        DecodingResult::I64(_) => "i64",
        DecodingResult::F32(_) => "f32",
        DecodingResult::F64(_) => "f64",
    }
}

/// Interpret an 8/16-bit or float image as heights, the escape hatch for
/// elevation served through ordinary image endpoints. 16-bit channels are
/// reinterpreted as signed to survive servers that wrap depths below sea
/// level into large unsigned values.
pub fn grid_from_image(image: &DynamicImage, no_data: f32) -> ElevationGrid {
    let (width, height) = (image.width(), image.height());
    let values: Vec<f32> = match image {
        DynamicImage::ImageLuma8(gray) => gray.pixels().map(|p| p.0[0] as f32).collect(),
        DynamicImage::ImageLumaA8(gray) => gray.pixels().map(|p| p.0[0] as f32).collect(),
        DynamicImage::ImageLuma16(gray) => {
            gray.pixels().map(|p| p.0[0] as i16 as f32).collect()
        }
        DynamicImage::ImageLumaA16(gray) => {
            gray.pixels().map(|p| p.0[0] as i16 as f32).collect()
        }
        DynamicImage::ImageRgb32F(rgb) => rgb.pixels().map(|p| p.0[0]).collect(),
        DynamicImage::ImageRgba32F(rgba) => rgba.pixels().map(|p| p.0[0]).collect(),
        other => other.to_luma8().pixels().map(|p| p.0[0] as f32).collect(),
    };
    ElevationGrid::from_values(width, height, no_data, values)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::grid::NO_DATA;

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut grid = ElevationGrid::new(8, 4);
        for row in 0..4 {
            for column in 0..8 {
                grid.set_value(row, column, row as f32 * 100. - column as f32);
            }
        }
        grid.set_value(2, 2, NO_DATA);
        let bytes = encode_grid(&grid).unwrap();
        let decoded = decode_grid(&bytes, NO_DATA).unwrap();
        assert_eq!(decoded, grid);
        assert!(decoded.is_no_data(decoded.value(2, 2)));
    }

    #[test]
    fn test_garbage_bytes_are_a_miss() {
        assert!(decode_grid(b"definitely not a tiff", NO_DATA).is_none());
    }

    #[test]
    fn test_sixteen_bit_images_read_as_signed() {
        let mut gray = image::ImageBuffer::<image::Luma<u16>, Vec<u16>>::new(2, 1);
        gray.put_pixel(0, 0, image::Luma([100]));
        gray.put_pixel(1, 0, image::Luma([65535])); // -1 as i16
        let grid = grid_from_image(&DynamicImage::ImageLuma16(gray), NO_DATA);
        assert_eq!(grid.value(0, 0), 100.);
        assert_eq!(grid.value(0, 1), -1.);
    }
}

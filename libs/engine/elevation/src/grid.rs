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

/// The default "missing sample" sentinel. It must survive every merge and
/// resample untouched; turning it into a plausible height is how terrain
/// grows ocean-floor spikes.
pub const NO_DATA: f32 = -9999.;

/// A width x height grid of elevation samples in meters, row zero at the
/// northern edge. Samples sit at pixel centers: the half-pixel convention
/// shared with the tile imagery, so a grid and a texture of the same size
/// line up exactly.
#[derive(Clone, Debug, PartialEq)]
pub struct ElevationGrid {
    width: u32,
    height: u32,
    no_data: f32,
    values: Vec<f32>,
}

impl ElevationGrid {
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_no_data(width, height, NO_DATA)
    }

    pub fn with_no_data(width: u32, height: u32, no_data: f32) -> Self {
        Self {
            width,
            height,
            no_data,
            values: vec![no_data; (width * height) as usize],
        }
    }

    pub fn from_values(width: u32, height: u32, no_data: f32, values: Vec<f32>) -> Self {
        assert_eq!(values.len(), (width * height) as usize);
        Self {
            width,
            height,
            no_data,
            values,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn no_data(&self) -> f32 {
        self.no_data
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn is_no_data(&self, value: f32) -> bool {
        value == self.no_data || (value.is_nan() && self.no_data.is_nan())
    }

    pub fn value(&self, row: u32, column: u32) -> f32 {
        self.values[(row * self.width + column) as usize]
    }

    pub fn set_value(&mut self, row: u32, column: u32, value: f32) {
        self.values[(row * self.width + column) as usize] = value;
    }

    pub fn has_no_data_cells(&self) -> bool {
        self.values.iter().any(|&v| self.is_no_data(v))
    }

    /// Bilinear sample at normalized (u, v) over the grid, u to the east
    /// and v to the south. Outside [0, 1] on either axis returns the
    /// sentinel rather than a clamped neighbor; inside, any no-data
    /// neighbor poisons the interpolation to the sentinel.
    pub fn sample(&self, u: f64, v: f64) -> f32 {
        if !(0. ..=1.).contains(&u) || !(0. ..=1.).contains(&v) {
            return self.no_data;
        }
        let x = u * self.width as f64 - 0.5;
        let y = v * self.height as f64 - 0.5;
        let x0 = (x.floor() as i64).clamp(0, self.width as i64 - 1);
        let y0 = (y.floor() as i64).clamp(0, self.height as i64 - 1);
        let x1 = (x0 + 1).clamp(0, self.width as i64 - 1);
        let y1 = (y0 + 1).clamp(0, self.height as i64 - 1);
        let tx = (x - x0 as f64).clamp(0., 1.);
        let ty = (y - y0 as f64).clamp(0., 1.);

        let neighbors = [
            (self.value(y0 as u32, x0 as u32), (1. - tx) * (1. - ty)),
            (self.value(y0 as u32, x1 as u32), tx * (1. - ty)),
            (self.value(y1 as u32, x0 as u32), (1. - tx) * ty),
            (self.value(y1 as u32, x1 as u32), tx * ty),
        ];
        // A query landing exactly on a sample row or column has zero-weight
        // neighbors; those may be missing without poisoning the result.
        let mut accumulated = 0.;
        for (value, weight) in neighbors {
            if weight == 0. {
                continue;
            }
            if self.is_no_data(value) {
                return self.no_data;
            }
            accumulated += value as f64 * weight;
        }
        accumulated as f32
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp(width: u32, height: u32) -> ElevationGrid {
        let mut grid = ElevationGrid::new(width, height);
        for row in 0..height {
            for column in 0..width {
                grid.set_value(row, column, (row * width + column) as f32);
            }
        }
        grid
    }

    #[test]
    fn test_out_of_range_returns_sentinel() {
        let grid = ramp(4, 4);
        assert_eq!(grid.sample(-0.01, 0.5), NO_DATA);
        assert_eq!(grid.sample(0.5, 1.01), NO_DATA);
        assert_ne!(grid.sample(0.5, 0.5), NO_DATA);
    }

    #[test]
    fn test_sample_at_cell_centers() {
        let grid = ramp(4, 4);
        // Center of cell (1, 2): u = (2 + 0.5)/4, v = (1 + 0.5)/4.
        assert_relative_eq!(grid.sample(0.625, 0.375), 6.0);
    }

    #[test]
    fn test_sample_interpolates_between_centers() {
        let mut grid = ElevationGrid::new(2, 1);
        grid.set_value(0, 0, 10.);
        grid.set_value(0, 1, 20.);
        assert_relative_eq!(grid.sample(0.5, 0.5), 15.0);
    }

    #[test]
    fn test_no_data_neighbor_poisons_interpolation() {
        let mut grid = ElevationGrid::new(3, 1);
        grid.set_value(0, 0, 10.);
        grid.set_value(0, 1, 20.);
        // Cell 2 stays at the sentinel: anything interpolating against it
        // comes back as the sentinel...
        assert_eq!(grid.sample(0.9, 0.5), NO_DATA);
        // ...while a sample between the two valid cells interpolates.
        assert_relative_eq!(grid.sample(1. / 3., 0.5), 15.0);
    }
}

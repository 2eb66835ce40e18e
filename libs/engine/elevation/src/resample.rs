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
use geo::Extents;

/// Cut the requested region out of a source grid, bilinearly refined to
/// `width` x `height`, sentinel preserved. This is how a freshly split
/// child keeps a continuous mesh before its own elevation data arrives: a
/// quarter of the parent's samples at the parent's resolution.
pub fn resample(
    parent: &ElevationGrid,
    parent_extents: &Extents,
    request: &Extents,
    width: u32,
    height: u32,
) -> ElevationGrid {
    let mut out = ElevationGrid::with_no_data(width, height, parent.no_data());
    for row in 0..height {
        let lat = request.max_lat() - (row as f64 + 0.5) / height as f64 * request.height();
        let v = (parent_extents.max_lat() - lat) / parent_extents.height();
        for column in 0..width {
            let lon =
                request.min_lon() + (column as f64 + 0.5) / width as f64 * request.width();
            let u = (lon - parent_extents.min_lon()) / parent_extents.width();
            out.set_value(row, column, parent.sample(u, v));
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_constant_parent_resamples_constant() {
        let mut parent = ElevationGrid::new(8, 8);
        for row in 0..8 {
            for column in 0..8 {
                parent.set_value(row, column, 42.);
            }
        }
        let parent_extents = Extents::new(0., 0., 10., 10.);
        let [ll, ..] = parent_extents.split();
        let child = resample(&parent, &parent_extents, &ll, 8, 8);
        assert_eq!(child.width(), 8);
        for row in 0..8 {
            for column in 0..8 {
                assert_relative_eq!(child.value(row, column), 42.0);
            }
        }
    }

    #[test]
    fn test_gradient_parent_resamples_smoothly() {
        // Heights rise to the east; the lower-left child must only see the
        // western half of the range.
        let mut parent = ElevationGrid::new(16, 16);
        for row in 0..16 {
            for column in 0..16 {
                parent.set_value(row, column, column as f32 * 10.);
            }
        }
        let parent_extents = Extents::new(0., 0., 16., 16.);
        let [ll, lr, ..] = parent_extents.split();
        let west = resample(&parent, &parent_extents, &ll, 16, 16);
        let east = resample(&parent, &parent_extents, &lr, 16, 16);
        let west_max = west.values().iter().cloned().fold(f32::MIN, f32::max);
        let east_min = east
            .values()
            .iter()
            .cloned()
            .filter(|v| !east.is_no_data(*v))
            .fold(f32::MAX, f32::min);
        assert!(west_max <= 80.);
        assert!(east_min >= 70.);
    }

    #[test]
    fn test_sentinel_survives_resampling() {
        let mut parent = ElevationGrid::new(4, 4);
        // Only the eastern half has data.
        for row in 0..4 {
            for column in 2..4 {
                parent.set_value(row, column, 5.);
            }
        }
        let parent_extents = Extents::new(0., 0., 4., 4.);
        let [ll, lr, ..] = parent_extents.split();
        let west = resample(&parent, &parent_extents, &ll, 4, 4);
        let east = resample(&parent, &parent_extents, &lr, 4, 4);
        // The western child saw no data at all.
        assert!(west.values().iter().all(|&v| west.is_no_data(v)));
        // The eastern child has data away from the data boundary, and the
        // boundary column interpolating against missing samples stays at
        // the sentinel instead of inventing a height.
        assert_eq!(east.value(0, 2), 5.);
        assert_eq!(east.value(3, 3), 5.);
        assert!(east.is_no_data(east.value(0, 0)));
    }
}

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
use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in degree space: longitude on the first axis,
/// latitude on the second. All interval tests are closed, so neighboring
/// extents that share an edge both contain the shared edge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Extents {
    min_lon: f64,
    min_lat: f64,
    max_lon: f64,
    max_lat: f64,
}

impl Extents {
    pub const WHOLE_GLOBE: Extents = Extents {
        min_lon: -180.,
        min_lat: -90.,
        max_lon: 180.,
        max_lat: 90.,
    };

    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// The all-zero rectangle acts as the "not yet set" value for `expand`.
    pub fn empty() -> Self {
        Self::new(0., 0., 0., 0.)
    }

    pub fn is_empty(&self) -> bool {
        self.min_lon == 0. && self.min_lat == 0. && self.max_lon == 0. && self.max_lat == 0.
    }

    pub fn min_lon(&self) -> f64 {
        self.min_lon
    }

    pub fn min_lat(&self) -> f64 {
        self.min_lat
    }

    pub fn max_lon(&self) -> f64 {
        self.max_lon
    }

    pub fn max_lat(&self) -> f64 {
        self.max_lat
    }

    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lon + self.max_lon) / 2.,
            (self.min_lat + self.max_lat) / 2.,
        )
    }

    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        self.min_lon <= lon && self.min_lat <= lat && self.max_lon >= lon && self.max_lat >= lat
    }

    pub fn intersects(&self, other: &Extents) -> bool {
        self.min_lon.max(other.min_lon) <= self.max_lon.min(other.max_lon)
            && self.min_lat.max(other.min_lat) <= self.max_lat.min(other.max_lat)
    }

    /// True when all four corners are inside the valid degree range.
    pub fn is_sane(&self) -> bool {
        self.min_lon >= -180.
            && self.min_lat >= -90.
            && self.max_lon <= 180.
            && self.max_lat <= 90.
            && self.min_lon <= self.max_lon
            && self.min_lat <= self.max_lat
    }

    pub fn expand(&mut self, other: &Extents) {
        if self.is_empty() {
            *self = *other;
        } else {
            self.min_lon = self.min_lon.min(other.min_lon);
            self.min_lat = self.min_lat.min(other.min_lat);
            self.max_lon = self.max_lon.max(other.max_lon);
            self.max_lat = self.max_lat.max(other.max_lat);
        }
    }

    pub fn expand_point(&mut self, lon: f64, lat: f64) {
        if self.is_empty() {
            *self = Self::new(lon, lat, lon, lat);
        } else {
            self.min_lon = self.min_lon.min(lon);
            self.min_lat = self.min_lat.min(lat);
            self.max_lon = self.max_lon.max(lon);
            self.max_lat = self.max_lat.max(lat);
        }
    }

    /// Split into quadrants about the midpoint, ordered lower-left,
    /// lower-right, upper-left, upper-right. Both halves of a shared edge
    /// are computed from the same midpoint value, so sibling edges are
    /// bitwise coincident.
    pub fn split(&self) -> [Extents; 4] {
        let mid_lon = (self.min_lon + self.max_lon) / 2.;
        let mid_lat = (self.min_lat + self.max_lat) / 2.;
        [
            Extents::new(self.min_lon, self.min_lat, mid_lon, mid_lat),
            Extents::new(mid_lon, self.min_lat, self.max_lon, mid_lat),
            Extents::new(self.min_lon, mid_lat, mid_lon, self.max_lat),
            Extents::new(mid_lon, mid_lat, self.max_lon, self.max_lat),
        ]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_split_edges_are_bitwise_coincident() {
        let e = Extents::new(-180., -90., 180., 90.);
        let [ll, lr, ul, ur] = e.split();
        assert_eq!(ll.max_lon, lr.min_lon);
        assert_eq!(ul.max_lon, ur.min_lon);
        assert_eq!(ll.max_lat, ul.min_lat);
        assert_eq!(lr.max_lat, ur.min_lat);
        assert_eq!(ll.min_lon, e.min_lon);
        assert_eq!(ur.max_lat, e.max_lat);
    }

    #[test]
    fn test_split_edges_stay_coincident_when_deep() {
        // Descend several levels along a zig-zag path and check the
        // cross-sibling edges at each level.
        let mut current = Extents::new(-180., -90., 180., 90.);
        for i in 0..24 {
            let [ll, lr, ul, ur] = current.split();
            assert_eq!(ll.max_lon, lr.min_lon);
            assert_eq!(ll.max_lat, ul.min_lat);
            assert_eq!(ur.min_lon, ul.max_lon);
            current = match i % 4 {
                0 => ll,
                1 => lr,
                2 => ul,
                _ => ur,
            };
        }
    }

    #[test]
    fn test_intersects_is_closed() {
        let a = Extents::new(0., 0., 10., 10.);
        let b = Extents::new(10., 10., 20., 20.);
        let c = Extents::new(10.1, 10.1, 20., 20.);
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_contains_is_closed() {
        let e = Extents::new(-10., -5., 10., 5.);
        assert!(e.contains(-10., -5.));
        assert!(e.contains(10., 5.));
        assert!(e.contains(0., 0.));
        assert!(!e.contains(-10.000001, 0.));
        assert!(!e.contains(0., 5.000001));
    }

    #[test]
    fn test_expand_from_empty() {
        let mut e = Extents::empty();
        e.expand(&Extents::new(-5., -5., 5., 5.));
        assert_eq!(e, Extents::new(-5., -5., 5., 5.));
        e.expand(&Extents::new(0., -10., 20., 0.));
        assert_eq!(e, Extents::new(-5., -10., 20., 5.));
        e.expand_point(-40., 2.);
        assert_eq!(e.min_lon(), -40.);
        assert_eq!(e.max_lat(), 5.);
    }
}

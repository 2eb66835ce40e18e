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
use geo::Extents;

/// Feature geometry in degree space. Heights are meters above the datum;
/// primitives that sit on the ground carry zero and get re-clamped when
/// the elevation under them changes.
#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    Point { lon: f64, lat: f64, height: f64 },
    Line(Vec<(f64, f64)>),
    Polygon(Vec<(f64, f64)>),
}

impl Geometry {
    pub fn extents(&self) -> Extents {
        match self {
            Geometry::Point { lon, lat, .. } => Extents::new(*lon, *lat, *lon, *lat),
            Geometry::Line(points) | Geometry::Polygon(points) => {
                let mut extents = Extents::empty();
                for &(lon, lat) in points {
                    extents.expand_point(lon, lat);
                }
                extents
            }
        }
    }
}

/// One vector feature as delivered by a per-tile vector job.
#[derive(Clone, Debug, PartialEq)]
pub struct Feature {
    id: u64,
    name: String,
    geometry: Geometry,
}

impl Feature {
    pub fn new<S: Into<String>>(id: u64, name: S, geometry: Geometry) -> Self {
        Self {
            id,
            name: name.into(),
            geometry,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn extents(&self) -> Extents {
        self.geometry.extents()
    }

    pub fn intersects(&self, extents: &Extents) -> bool {
        self.extents().intersects(extents)
    }
}

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
use crate::feature::Feature;
use geo::Extents;
use std::sync::Arc;

/// The vector features attached to one tile. A freshly split child starts
/// with a snapshot of its parent's features filtered to its own extents so
/// it draws something immediately; the snapshot is marked inherited and is
/// dropped wholesale the first time the tile's own vector jobs deliver, so
/// stale parent features never linger next to fresh ones.
#[derive(Clone, Debug, Default)]
pub struct TileVectorData {
    features: Vec<Arc<Feature>>,
    inherited: bool,
}

impl TileVectorData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inherited_from(parent: &TileVectorData, extents: &Extents) -> Self {
        Self {
            features: parent
                .features
                .iter()
                .filter(|f| f.intersects(extents))
                .cloned()
                .collect(),
            inherited: true,
        }
    }

    pub fn is_inherited(&self) -> bool {
        self.inherited
    }

    pub fn features(&self) -> &[Arc<Feature>] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn clear(&mut self) {
        self.features.clear();
        self.inherited = false;
    }

    /// Add freshly fetched features. The first add replaces any inherited
    /// snapshot, even when the fetch found nothing.
    pub fn add(&mut self, features: Vec<Arc<Feature>>) {
        if self.inherited {
            self.clear();
        }
        self.features.extend(features);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::feature::Geometry;

    fn point(id: u64, lon: f64, lat: f64) -> Arc<Feature> {
        Arc::new(Feature::new(
            id,
            format!("f{}", id),
            Geometry::Point {
                lon,
                lat,
                height: 0.,
            },
        ))
    }

    #[test]
    fn test_inherit_filters_by_extents() {
        let mut parent = TileVectorData::new();
        parent.add(vec![point(1, -5., -5.), point(2, 5., 5.)]);
        let child = TileVectorData::inherited_from(&parent, &Extents::new(0., 0., 10., 10.));
        assert!(child.is_inherited());
        assert_eq!(child.len(), 1);
        assert_eq!(child.features()[0].id(), 2);
    }

    #[test]
    fn test_first_fresh_add_replaces_inherited() {
        let mut parent = TileVectorData::new();
        parent.add(vec![point(1, 1., 1.)]);
        let mut child = TileVectorData::inherited_from(&parent, &Extents::new(0., 0., 2., 2.));
        assert_eq!(child.len(), 1);

        child.add(vec![point(10, 1., 1.), point(11, 1.5, 1.5)]);
        assert!(!child.is_inherited());
        assert_eq!(child.len(), 2);
        assert!(child.features().iter().all(|f| f.id() >= 10));

        // Later adds accumulate.
        child.add(vec![point(12, 0.5, 0.5)]);
        assert_eq!(child.len(), 3);
    }

    #[test]
    fn test_empty_add_still_replaces_inherited() {
        let mut parent = TileVectorData::new();
        parent.add(vec![point(1, 1., 1.)]);
        let mut child = TileVectorData::inherited_from(&parent, &Extents::new(0., 0., 2., 2.));
        assert!(child.is_inherited());
        assert_eq!(child.len(), 1);

        // A fetch that finds nothing is still authoritative for this
        // tile; the parent's snapshot must not linger.
        child.add(Vec::new());
        assert!(!child.is_inherited());
        assert!(child.is_empty());
    }
}

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
use crate::tile::Tile;
use geo::Extents;

/// Last word on the split decision. The engine computes its suggestion
/// from eye distance, level, and policy; embedders override it to force
/// detail near markers, along paths, or wherever else they care about.
pub trait SplitCallback: Send + Sync {
    fn should_split(&self, suggestion: bool, tile: &Tile) -> bool;
}

/// The default callback accepts the engine's suggestion unchanged.
pub struct PassThrough;

impl SplitCallback for PassThrough {
    fn should_split(&self, suggestion: bool, _tile: &Tile) -> bool {
        suggestion
    }
}

/// Forces subdivision over a region until tiles reach the given level;
/// elsewhere the engine's suggestion stands. This is the usual way to
/// keep detail around a marker or along a path regardless of how far the
/// eye has pulled back.
pub struct ForceDetail {
    extents: Extents,
    level: u32,
}

impl ForceDetail {
    pub fn new(extents: Extents, level: u32) -> Self {
        Self { extents, level }
    }
}

impl SplitCallback for ForceDetail {
    fn should_split(&self, suggestion: bool, tile: &Tile) -> bool {
        if tile.level() < self.level && tile.extents().intersects(&self.extents) {
            return true;
        }
        suggestion
    }
}

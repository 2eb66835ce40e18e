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

//! Terrella is an adaptive tile engine for planetary surfaces: a quadtree
//! of lon/lat tiles whose subdivision follows the camera, fed by
//! cache-first raster and elevation pipelines and per-tile vector ingest,
//! with all fetching and compositing off the render thread.
//!
//! The umbrella crate re-exports the member crates; embedders normally
//! build a [`globe::Body`], append layers, and drive it with
//! `cull` / `update` / `purge_tiles` once per frame.

pub use elevation;
pub use geo;
pub use geodesy;
pub use globe;
pub use jobs;
pub use raster;
pub use tile_cache;
pub use vector;

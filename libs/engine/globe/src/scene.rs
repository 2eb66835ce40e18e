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
use crate::mesh::{BoundingSphere, TileMesh};
use image::RgbaImage;
use std::sync::Arc;
use vector::Feature;

/// View-frustum test supplied by the embedder; the engine only needs a
/// verdict per bounding sphere.
pub trait Culler {
    fn is_culled(&self, sphere: &BoundingSphere) -> bool;
}

/// Accepts everything; useful when the embedder culls downstream.
pub struct NoCull;

impl Culler for NoCull {
    fn is_culled(&self, _sphere: &BoundingSphere) -> bool {
        false
    }
}

/// One tile the renderer should draw this frame. `image` of `None` means
/// no raster layer contributed; the tile draws untextured with lighting
/// on so the surface stays visible.
pub struct DrawTile {
    pub level: u32,
    pub mesh: Arc<TileMesh>,
    pub image: Option<Arc<RgbaImage>>,
    pub features: Vec<Arc<Feature>>,
    pub alpha: f32,
}

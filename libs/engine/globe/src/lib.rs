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
mod body;
mod build;
mod callback;
mod mesh;
mod persist;
mod scene;
mod tile;

pub use crate::{
    body::{Body, BodyConfig},
    callback::{ForceDetail, PassThrough, SplitCallback},
    mesh::{BoundingSphere, TileMesh},
    persist::{body_from_doc, body_to_doc, parse_body, save_body, BodyDoc, LayerDoc, PersistError},
    scene::{Culler, DrawTile, NoCull},
    tile::{DirtyFlags, Tile},
};

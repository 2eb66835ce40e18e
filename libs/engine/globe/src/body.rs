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

// The body: root of the quadtree forest and owner of the layer stacks.
//
// Embedders drive it with three calls per frame: `cull` to collect the
// draw list for the current eye, `update` to apply finished background
// work, and `purge_tiles` at the frame boundary so retired subtrees are
// dropped outside any traversal.

use crate::{
    callback::{PassThrough, SplitCallback},
    scene::{Culler, DrawTile},
    tile::{DirtyFlags, Tile},
};
use elevation::{ElevationLayer, ElevationStack};
use geo::{Extents, GridSize, ImageSize, TileKey};
use geodesy::{LandModel, WGS84_RADIUS_EQUATOR};
use jobs::JobManager;
use nalgebra::{Matrix4, Point3};
use parking_lot::{Mutex, RwLock};
use raster::{RasterLayer, RasterStack};
use std::sync::Arc;
use vector::{VectorSource, VectorStack};

/// Construction-time parameters; everything here can also be adjusted on
/// the live body.
#[derive(Clone, Debug, PartialEq)]
pub struct BodyConfig {
    pub rows: u32,
    pub columns: u32,
    pub extents: Extents,
    pub mesh_size: GridSize,
    pub image_size: ImageSize,
    pub split_distance: f64,
    pub max_level: u32,
    pub use_skirts: bool,
    pub use_borders: bool,
    pub alpha: f32,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            rows: 1,
            columns: 2,
            extents: Extents::WHOLE_GLOBE,
            mesh_size: GridSize::new(17, 17),
            image_size: ImageSize::new(256, 256),
            split_distance: 3. * WGS84_RADIUS_EQUATOR,
            max_level: 50,
            use_skirts: true,
            use_borders: true,
            alpha: 1.,
        }
    }
}

struct BodyState {
    split_distance: f64,
    max_level: u32,
    mesh_size: GridSize,
    image_size: ImageSize,
    use_skirts: bool,
    use_borders: bool,
    allow_split: bool,
    keep_detail: bool,
    alpha: f32,
    needs_redraw: bool,
    rows: u32,
    columns: u32,
    extents: Extents,
}

pub(crate) struct BodyInner {
    land: LandModel,
    jobs: Arc<JobManager>,
    raster: RasterStack,
    elevation: ElevationStack,
    vector: VectorStack,
    split_callback: RwLock<Arc<dyn SplitCallback>>,
    state: Mutex<BodyState>,
    top_tiles: Mutex<Vec<Arc<Tile>>>,
    delete_tiles: Mutex<Vec<Arc<Tile>>>,
}

impl BodyInner {
    pub(crate) fn land(&self) -> &LandModel {
        &self.land
    }

    pub(crate) fn jobs(&self) -> &Arc<JobManager> {
        &self.jobs
    }

    pub(crate) fn raster_stack(&self) -> &RasterStack {
        &self.raster
    }

    pub(crate) fn elevation_stack(&self) -> &ElevationStack {
        &self.elevation
    }

    pub(crate) fn vector_stack(&self) -> &VectorStack {
        &self.vector
    }

    pub(crate) fn alpha(&self) -> f32 {
        self.state.lock().alpha
    }

    pub(crate) fn max_level(&self) -> u32 {
        self.state.lock().max_level
    }

    pub(crate) fn use_skirts(&self) -> bool {
        self.state.lock().use_skirts
    }

    pub(crate) fn use_borders(&self) -> bool {
        self.state.lock().use_borders
    }

    pub(crate) fn allow_split(&self) -> bool {
        self.state.lock().allow_split
    }

    pub(crate) fn keep_detail(&self) -> bool {
        self.state.lock().keep_detail
    }

    pub(crate) fn should_split(&self, suggestion: bool, tile: &Tile) -> bool {
        let callback = self.split_callback.read().clone();
        callback.should_split(suggestion, tile)
    }

    pub(crate) fn set_needs_redraw(&self) {
        self.state.lock().needs_redraw = true;
    }

    pub(crate) fn add_tile_to_delete(&self, tile: Arc<Tile>) {
        self.delete_tiles.lock().push(tile);
    }

    pub(crate) fn notify_elevation_changed(&self, extents: &Extents, level: u32) {
        for source in self.vector.sources() {
            source.elevation_changed(extents, level);
        }
    }
}

pub struct Body {
    inner: Arc<BodyInner>,
}

impl Body {
    pub fn new(land: LandModel, jobs: Arc<JobManager>, config: BodyConfig) -> Self {
        let inner = Arc::new(BodyInner {
            land,
            jobs,
            raster: RasterStack::new(),
            elevation: ElevationStack::new(),
            vector: VectorStack::new(),
            split_callback: RwLock::new(Arc::new(PassThrough) as Arc<dyn SplitCallback>),
            state: Mutex::new(BodyState {
                split_distance: config.split_distance,
                max_level: config.max_level,
                mesh_size: config.mesh_size,
                image_size: config.image_size,
                use_skirts: config.use_skirts,
                use_borders: config.use_borders,
                allow_split: true,
                keep_detail: false,
                alpha: config.alpha,
                needs_redraw: false,
                rows: config.rows,
                columns: config.columns,
                extents: config.extents,
            }),
            top_tiles: Mutex::new(Vec::new()),
            delete_tiles: Mutex::new(Vec::new()),
        });
        let body = Self { inner };
        body.add_tiles(config.rows, config.columns, &config.extents);
        body
    }

    /// Tessellate the global extents into the starting grid of root
    /// tiles, row zero along the northern edge.
    fn add_tiles(&self, rows: u32, columns: u32, extents: &Extents) {
        let delta_lon = extents.width() / columns as f64;
        let delta_lat = extents.height() / rows as f64;
        let (mesh_size, image_size, split_distance) = {
            let state = self.inner.state.lock();
            (state.mesh_size, state.image_size, state.split_distance)
        };
        let mut top_tiles = self.inner.top_tiles.lock();
        for row in 0..rows {
            let max_lat = extents.max_lat() - delta_lat * row as f64;
            let min_lat = max_lat - delta_lat;
            for column in 0..columns {
                let min_lon = extents.min_lon() + delta_lon * column as f64;
                let tile_extents = Extents::new(min_lon, min_lat, min_lon + delta_lon, max_lat);
                let key = TileKey::new(row, column, 0, tile_extents, mesh_size, image_size);
                top_tiles.push(Tile::new(
                    key,
                    split_distance,
                    Arc::downgrade(&self.inner),
                    Default::default(),
                ));
            }
        }
    }

    fn top_tiles_snapshot(&self) -> Vec<Arc<Tile>> {
        self.inner.top_tiles.lock().clone()
    }

    pub fn top_tiles(&self) -> Vec<Arc<Tile>> {
        self.top_tiles_snapshot()
    }

    pub fn land_model(&self) -> &LandModel {
        self.inner.land()
    }

    pub fn jobs(&self) -> &Arc<JobManager> {
        self.inner.jobs()
    }

    // ------------------------------------------------------------------
    // Frame driving.
    // ------------------------------------------------------------------

    /// Apply completed jobs and rebuild stale tile pieces. GUI thread.
    pub fn update(&self) {
        for tile in self.top_tiles_snapshot() {
            tile.update(&self.inner);
        }
    }

    /// Walk the forest against the eye and collect this frame's draw list.
    pub fn cull(&self, eye: &Point3<f64>, culler: &dyn Culler) -> Vec<DrawTile> {
        let mut out = Vec::new();
        for tile in self.top_tiles_snapshot() {
            tile.cull(eye, culler, &self.inner, &mut out);
        }
        out
    }

    /// Drop retired subtrees. Call at the frame boundary, outside both
    /// traversals, so destructors never run mid-walk.
    pub fn purge_tiles(&self) {
        let pending = {
            let mut delete_tiles = self.inner.delete_tiles.lock();
            std::mem::take(&mut *delete_tiles)
        };
        drop(pending);
    }

    pub fn pending_delete_count(&self) -> usize {
        self.inner.delete_tiles.lock().len()
    }

    /// Cancel everything and drop the whole forest. Tiles that outlive the
    /// body inside still-running jobs see their weak reference fail and
    /// unwind quietly.
    pub fn clear(&self) {
        let tiles = std::mem::take(&mut *self.inner.top_tiles.lock());
        for tile in &tiles {
            tile.retire(&self.inner);
        }
        drop(tiles);
        self.inner.delete_tiles.lock().clear();
    }

    pub fn needs_redraw(&self) -> bool {
        self.inner.state.lock().needs_redraw
    }

    pub fn take_needs_redraw(&self) -> bool {
        std::mem::take(&mut self.inner.state.lock().needs_redraw)
    }

    // ------------------------------------------------------------------
    // Layer management.
    // ------------------------------------------------------------------

    pub fn raster_append(&self, layer: Arc<RasterLayer>) {
        let extents = layer.extents();
        self.inner.raster.append(layer);
        self.dirty_textures(&extents);
    }

    pub fn raster_remove(&self, layer: &Arc<RasterLayer>) {
        let extents = layer.extents();
        self.inner.raster.remove(layer);
        self.dirty_textures(&extents);
    }

    /// A layer's parameters changed in place; refetch what it covers.
    pub fn raster_changed(&self, layer: &Arc<RasterLayer>) {
        self.dirty_textures(&layer.extents());
    }

    pub fn raster_layers(&self) -> Vec<Arc<RasterLayer>> {
        self.inner.raster.layers()
    }

    pub fn elevation_append(&self, layer: Arc<ElevationLayer>) {
        let extents = layer.extents();
        self.inner.elevation.append(layer);
        self.dirty_vertices(Some(&extents));
    }

    pub fn elevation_remove(&self, layer: &Arc<ElevationLayer>) {
        let extents = layer.extents();
        self.inner.elevation.remove(layer);
        self.dirty_vertices(Some(&extents));
    }

    pub fn elevation_layers(&self) -> Vec<Arc<ElevationLayer>> {
        self.inner.elevation.layers()
    }

    pub fn vector_append(&self, source: Arc<dyn VectorSource>) {
        let extents = source.extents();
        self.inner.vector.append(source);
        for tile in self.top_tiles_snapshot() {
            tile.dirty(true, DirtyFlags::VECTOR, true, Some(&extents));
        }
    }

    pub fn vector_remove(&self, source: &Arc<dyn VectorSource>) {
        let extents = source.extents();
        self.inner.vector.remove(source);
        for tile in self.top_tiles_snapshot() {
            tile.dirty(true, DirtyFlags::VECTOR, true, Some(&extents));
        }
    }

    fn dirty_textures(&self, extents: &Extents) {
        for tile in self.top_tiles_snapshot() {
            tile.dirty(true, DirtyFlags::IMAGE, true, Some(extents));
        }
    }

    fn dirty_vertices(&self, extents: Option<&Extents>) {
        for tile in self.top_tiles_snapshot() {
            tile.invalidate_elevation(extents);
        }
    }

    // ------------------------------------------------------------------
    // Tuning.
    // ------------------------------------------------------------------

    pub fn split_distance(&self) -> f64 {
        self.inner.state.lock().split_distance
    }

    pub fn set_split_distance(&self, distance: f64) {
        self.inner.state.lock().split_distance = distance;
        for tile in self.top_tiles_snapshot() {
            tile.set_split_distance(distance, true);
        }
    }

    pub fn max_level(&self) -> u32 {
        self.inner.max_level()
    }

    pub fn set_max_level(&self, level: u32) {
        self.inner.state.lock().max_level = level;
    }

    pub fn mesh_size(&self) -> GridSize {
        self.inner.state.lock().mesh_size
    }

    pub fn image_size(&self) -> ImageSize {
        self.inner.state.lock().image_size
    }

    pub fn rows(&self) -> u32 {
        self.inner.state.lock().rows
    }

    pub fn columns(&self) -> u32 {
        self.inner.state.lock().columns
    }

    pub fn use_skirts(&self) -> bool {
        self.inner.use_skirts()
    }

    pub fn set_use_skirts(&self, use_skirts: bool) {
        self.inner.state.lock().use_skirts = use_skirts;
    }

    pub fn use_borders(&self) -> bool {
        self.inner.use_borders()
    }

    pub fn set_use_borders(&self, use_borders: bool) {
        self.inner.state.lock().use_borders = use_borders;
    }

    pub fn allow_split(&self) -> bool {
        self.inner.allow_split()
    }

    pub fn set_allow_split(&self, allow: bool) {
        self.inner.state.lock().allow_split = allow;
    }

    pub fn keep_detail(&self) -> bool {
        self.inner.keep_detail()
    }

    pub fn set_keep_detail(&self, keep: bool) {
        self.inner.state.lock().keep_detail = keep;
    }

    pub fn alpha(&self) -> f32 {
        self.inner.alpha()
    }

    /// Global surface opacity, multiplied into every tile's draw.
    pub fn set_alpha(&self, alpha: f32) {
        self.inner.state.lock().alpha = alpha.clamp(0., 1.);
        self.inner.set_needs_redraw();
    }

    pub fn set_split_callback(&self, callback: Arc<dyn SplitCallback>) {
        *self.inner.split_callback.write() = callback;
    }

    /// Union of the root tiles' extents.
    pub fn extents(&self) -> Extents {
        let mut extents = Extents::empty();
        for tile in self.top_tiles_snapshot() {
            extents.expand(tile.extents());
        }
        extents
    }

    // ------------------------------------------------------------------
    // Planet coordinate and elevation services.
    // ------------------------------------------------------------------

    /// (lon, lat, height) to world cartesian.
    pub fn convert_to_planet(&self, lon: f64, lat: f64, height: f64) -> Point3<f64> {
        self.inner.land().lat_lon_height_to_xyz(lat, lon, height)
    }

    /// World cartesian to (lon, lat, height).
    pub fn convert_from_planet(&self, point: &Point3<f64>) -> (f64, f64, f64) {
        let (lat, lon, height) = self.inner.land().xyz_to_lat_lon_height(point);
        (lon, lat, height)
    }

    pub fn planet_rotation_matrix(
        &self,
        lat: f64,
        lon: f64,
        height: f64,
        heading: f64,
    ) -> Matrix4<f64> {
        self.inner
            .land()
            .planet_rotation_matrix(lat, lon, height, heading)
    }

    /// Nearest intersection of the segment from `p0` to `p1` with the
    /// resident tile geometry, ignoring vector data. Used for picking and
    /// for ground-clamping queries from the embedder.
    pub fn intersect_with_tiles(
        &self,
        p0: &Point3<f64>,
        p1: &Point3<f64>,
    ) -> Option<Point3<f64>> {
        let mut best = None;
        for tile in self.top_tiles_snapshot() {
            tile.intersect(p0, p1, &mut best);
        }
        best.map(|(_, point)| point)
    }

    /// Meters above the datum at (lat, lon): recursive descent to the
    /// finest resident tile, then a tile-local bilinear sample. Zero where
    /// nothing is loaded.
    pub fn elevation_at_lat_long(&self, lat: f64, lon: f64) -> f64 {
        for tile in self.top_tiles_snapshot() {
            if let Some(elevation) = elevation_from_tile(&tile, lat, lon) {
                return elevation;
            }
        }
        0.
    }
}

impl Drop for Body {
    fn drop(&mut self) {
        self.clear();
    }
}

fn elevation_from_tile(tile: &Arc<Tile>, lat: f64, lon: f64) -> Option<f64> {
    if !tile.extents().contains(lon, lat) {
        return None;
    }
    if tile.is_leaf() {
        return Some(tile.elevation(lat, lon));
    }
    for index in 0..4 {
        if let Some(child) = tile.child_at(index) {
            if let Some(elevation) = elevation_from_tile(&child, lat, lon) {
                return Some(elevation);
            }
        }
    }
    Some(tile.elevation(lat, lon))
}

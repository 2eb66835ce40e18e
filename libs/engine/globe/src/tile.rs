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

// A recursive tile.
//
// Each tile is one node of the quadtree: a patch of planet bound to its
// TileKey, drawing either itself (the "low" form) or its four quadrant
// children once a split job has built them. All mutation of the tree shape
// happens in the update tick on the GUI thread; worker jobs deliver their
// results through single-shot channels and never touch the tree.

use crate::{
    body::BodyInner,
    build::{BuildElevation, BuildRaster, BuildTiles},
    mesh::{BoundingSphere, TileMesh},
    scene::{Culler, DrawTile},
};
use bitflags::bitflags;
use crossbeam::channel::Receiver;
use elevation::{resample, ElevationGrid};
use geo::{Extents, TileKey};
use image::RgbaImage;
use jobs::{JobError, JobHandle};
use log::debug;
use nalgebra::Point3;
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};
use vector::{Feature, TileVectorData, TileVectorJob};

bitflags! {
    /// What parts of a tile are stale. Set by the body's broadcasts when
    /// layers change and by local jobs completing; cleared only after the
    /// corresponding data is installed and visible to the next traversal.
    pub struct DirtyFlags: u32 {
        const VERTICES = 0b0001;
        const TEXTURE  = 0b0010;
        const IMAGE    = 0b0100;
        const VECTOR   = 0b1000;
        const ALL = Self::VERTICES.bits
            | Self::TEXTURE.bits
            | Self::IMAGE.bits
            | Self::VECTOR.bits;
    }
}

/// A background job's handle plus the single-shot channel its result
/// arrives on.
pub(crate) struct PendingJob<T> {
    pub(crate) handle: JobHandle,
    pub(crate) output: Receiver<T>,
}

pub(crate) struct TileState {
    split_distance: f64,
    flags: DirtyFlags,
    image: Option<Arc<RgbaImage>>,
    elevation: Option<Arc<ElevationGrid>>,
    elevation_current: bool,
    mesh: Option<Arc<TileMesh>>,
    children: [Option<Arc<Tile>>; 4],
    child_group_attached: bool,
    children_pending_clear: bool,
    image_job: Option<PendingJob<Option<RgbaImage>>>,
    elevation_job: Option<PendingJob<Option<ElevationGrid>>>,
    split_job: Option<PendingJob<[Arc<Tile>; 4]>>,
    vector_jobs: Vec<Arc<dyn TileVectorJob>>,
    vector_data: TileVectorData,
}

pub struct Tile {
    key: TileKey,
    body: RwLock<Weak<BodyInner>>,
    state: Mutex<TileState>,
}

impl Tile {
    pub(crate) fn new(
        key: TileKey,
        split_distance: f64,
        body: Weak<BodyInner>,
        vector_data: TileVectorData,
    ) -> Arc<Self> {
        Arc::new(Self {
            key,
            body: RwLock::new(body),
            state: Mutex::new(TileState {
                split_distance,
                flags: DirtyFlags::ALL,
                image: None,
                elevation: None,
                elevation_current: false,
                mesh: None,
                children: [None, None, None, None],
                child_group_attached: false,
                children_pending_clear: false,
                image_job: None,
                elevation_job: None,
                split_job: None,
                vector_jobs: Vec::new(),
                vector_data,
            }),
        })
    }

    pub fn key(&self) -> &TileKey {
        &self.key
    }

    pub fn level(&self) -> u32 {
        self.key.level()
    }

    pub fn extents(&self) -> &Extents {
        self.key.extents()
    }

    pub fn split_distance(&self) -> f64 {
        self.state.lock().split_distance
    }

    pub fn dirty_flags(&self) -> DirtyFlags {
        self.state.lock().flags
    }

    pub fn image(&self) -> Option<Arc<RgbaImage>> {
        self.state.lock().image.clone()
    }

    pub fn elevation_grid(&self) -> Option<Arc<ElevationGrid>> {
        self.state.lock().elevation.clone()
    }

    pub fn mesh(&self) -> Option<Arc<TileMesh>> {
        self.state.lock().mesh.clone()
    }

    pub fn bounding_sphere(&self) -> Option<BoundingSphere> {
        self.state.lock().mesh.as_ref().map(|m| *m.bounding_sphere())
    }

    pub fn vector_features(&self) -> Vec<Arc<Feature>> {
        self.state.lock().vector_data.features().to_vec()
    }

    /// True while the tile is still showing its parent's features, before
    /// the first result of its own vector jobs has been merged.
    pub fn vector_data_is_inherited(&self) -> bool {
        self.state.lock().vector_data.is_inherited()
    }

    pub fn is_leaf(&self) -> bool {
        self.state.lock().children.iter().any(|c| c.is_none())
    }

    /// Both render children are attached: the tile draws its quadrants.
    pub fn is_parent(&self) -> bool {
        self.state.lock().child_group_attached
    }

    pub fn children_pending_clear(&self) -> bool {
        self.state.lock().children_pending_clear
    }

    pub fn child_at(&self, index: usize) -> Option<Arc<Tile>> {
        self.state.lock().children.get(index).cloned().flatten()
    }

    pub fn has_outstanding_jobs(&self) -> bool {
        let state = self.state.lock();
        state.image_job.is_some()
            || state.elevation_job.is_some()
            || state.split_job.is_some()
            || !state.vector_jobs.is_empty()
    }

    /// Handle of the outstanding split job, if any; embedders use this
    /// for progress display and tests watch cancellation through it.
    pub fn split_job(&self) -> Option<JobHandle> {
        self.state.lock().split_job.as_ref().map(|j| j.handle.clone())
    }

    pub(crate) fn set_split_distance(&self, distance: f64, children: bool) {
        let child_tiles = {
            let mut state = self.state.lock();
            state.split_distance = distance;
            if children {
                state.children.clone()
            } else {
                [None, None, None, None]
            }
        };
        for child in child_tiles.into_iter().flatten() {
            child.set_split_distance(distance / 2., children);
        }
    }

    /// Set or clear dirty bits, optionally recursing, optionally only for
    /// tiles whose extents intersect `within`. This is how a layer change
    /// reaches exactly the affected subtrees.
    pub(crate) fn dirty(
        &self,
        set: bool,
        flags: DirtyFlags,
        recursive: bool,
        within: Option<&Extents>,
    ) {
        if let Some(extents) = within {
            if !extents.intersects(self.key.extents()) {
                return;
            }
        }
        let children = {
            let mut state = self.state.lock();
            if set {
                state.flags.insert(flags);
            } else {
                state.flags.remove(flags);
            }
            if recursive {
                state.children.clone()
            } else {
                [None, None, None, None]
            }
        };
        for child in children.into_iter().flatten() {
            child.dirty(set, flags, recursive, within);
        }
    }

    /// An elevation layer changed under this tile: the current grid no
    /// longer reflects the stack and must be fetched again.
    pub(crate) fn invalidate_elevation(&self, within: Option<&Extents>) {
        if let Some(extents) = within {
            if !extents.intersects(self.key.extents()) {
                return;
            }
        }
        let children = {
            let mut state = self.state.lock();
            state.elevation_current = false;
            state.flags.insert(DirtyFlags::VERTICES);
            state.children.clone()
        };
        for child in children.into_iter().flatten() {
            child.invalidate_elevation(within);
        }
    }

    // ------------------------------------------------------------------
    // Cull traversal.
    // ------------------------------------------------------------------

    /// Per-frame cull and split decision. Appends the tiles to draw this
    /// frame to `out`. Never blocks on a job and never throws; a tile with
    /// no mesh yet simply draws nothing.
    pub(crate) fn cull(
        self: &Arc<Self>,
        eye: &Point3<f64>,
        culler: &dyn Culler,
        body: &Arc<BodyInner>,
        out: &mut Vec<DrawTile>,
    ) {
        let (mesh, split_distance, split_job_active, child_group_attached) = {
            let state = self.state.lock();
            (
                state.mesh.clone(),
                state.split_distance,
                state.split_job.is_some(),
                state.child_group_attached,
            )
        };
        let mesh = match mesh {
            Some(mesh) => mesh,
            None => return,
        };

        if culler.is_culled(mesh.bounding_sphere()) {
            // Off-screen: stop fetching for it, and shed detail unless the
            // embedder asked us to keep it.
            self.cancel_vector_jobs();
            self.cancel_split_job(body);
            if !body.keep_detail() {
                self.state.lock().children_pending_clear = true;
            }
            return;
        }

        let allow_split = body.allow_split();
        let keep_detail = body.keep_detail();
        let default_mode = allow_split && !keep_detail;
        let check_detail = allow_split && keep_detail && !child_group_attached;

        // With splitting frozen there is no decision to make: draw what is
        // already there, at full detail when we were told to keep it.
        if !default_mode && !check_detail {
            if child_group_attached && keep_detail {
                self.traverse_children(eye, culler, body, out);
            } else {
                self.draw_low(body, out);
            }
            return;
        }

        let d2 = mesh.smallest_distance_squared(eye);
        let far_away = d2 > split_distance * split_distance;
        let eye_is_nan = eye.x.is_nan() || eye.y.is_nan() || eye.z.is_nan();
        let too_deep = self.key.level() >= body.max_level();
        let suggest_low = far_away || eye_is_nan || too_deep;
        // The callback has the last word on detail, except that the level
        // cap binds even when it asks for more.
        let low = !body.should_split(!suggest_low, self) || too_deep;

        if low {
            if child_group_attached {
                self.state.lock().children_pending_clear = true;
            }
            // No point finishing a split we no longer want.
            self.cancel_split_job(body);
            self.draw_low(body, out);
        } else if child_group_attached {
            self.traverse_children(eye, culler, body, out);
        } else {
            if !split_job_active {
                self.queue_split_job(body);
            }
            // The low form carries the frame until the children land.
            self.draw_low(body, out);
        }
    }

    fn traverse_children(
        &self,
        eye: &Point3<f64>,
        culler: &dyn Culler,
        body: &Arc<BodyInner>,
        out: &mut Vec<DrawTile>,
    ) {
        let children = self.state.lock().children.clone();
        for child in children.into_iter().flatten() {
            child.cull(eye, culler, body, out);
        }
    }

    fn draw_low(&self, body: &BodyInner, out: &mut Vec<DrawTile>) {
        let state = self.state.lock();
        if let Some(mesh) = &state.mesh {
            out.push(DrawTile {
                level: self.key.level(),
                mesh: mesh.clone(),
                image: state.image.clone(),
                features: state.vector_data.features().to_vec(),
                alpha: body.alpha(),
            });
        }
    }

    // ------------------------------------------------------------------
    // Update tick.
    // ------------------------------------------------------------------

    /// Apply completed jobs, rebuild stale pieces, and launch whatever
    /// work the dirty bits call for. Runs on the GUI thread only.
    pub(crate) fn update(self: &Arc<Self>, body: &Arc<BodyInner>) {
        if self.state.lock().children_pending_clear {
            self.clear_children(body, true);
        }

        self.poll_image_job(body);
        if self.state.lock().flags.contains(DirtyFlags::IMAGE)
            && self.state.lock().image_job.is_none()
        {
            self.launch_image_job(body);
            // An inline job manager has already finished the job; install
            // its result this same frame.
            self.poll_image_job(body);
        }

        self.poll_elevation_job(body);
        self.maybe_launch_elevation_job(body);
        self.poll_elevation_job(body);

        if self.state.lock().flags.contains(DirtyFlags::VERTICES) {
            self.rebuild_mesh(body);
            body.set_needs_redraw();
        }

        if self.state.lock().flags.contains(DirtyFlags::TEXTURE) {
            self.state.lock().flags.remove(DirtyFlags::TEXTURE);
            body.set_needs_redraw();
        }

        self.poll_split_job();

        if self.state.lock().flags.contains(DirtyFlags::VECTOR) {
            self.cancel_vector_jobs();
            self.launch_vector_jobs(body);
            self.state.lock().flags.remove(DirtyFlags::VECTOR);
        }
        self.poll_vector_jobs(body);

        let (mesh, busy) = {
            let state = self.state.lock();
            let busy = state.image_job.is_some()
                || state.elevation_job.is_some()
                || state.split_job.is_some()
                || !state.vector_jobs.is_empty();
            (state.mesh.clone(), busy)
        };
        if let Some(mesh) = mesh {
            mesh.set_show_skirts(body.use_skirts());
            mesh.set_show_border(body.use_borders() && busy);
        }

        let children = self.state.lock().children.clone();
        for child in children.into_iter().flatten() {
            child.update(body);
        }
    }

    fn poll_image_job(self: &Arc<Self>, body: &Arc<BodyInner>) {
        let finished = {
            let mut state = self.state.lock();
            match &state.image_job {
                Some(job) if job.handle.is_done() => state.image_job.take(),
                _ => None,
            }
        };
        let Some(job) = finished else { return };
        if job.handle.succeeded() {
            if let Ok(image) = job.output.try_recv() {
                let mut state = self.state.lock();
                state.image = image.map(Arc::new);
                state.flags.remove(DirtyFlags::IMAGE);
                state.flags.insert(DirtyFlags::TEXTURE);
            }
            body.set_needs_redraw();
        } else if !job.handle.canceled() {
            // Transient failure; ask again.
            self.launch_image_job(body);
        }
    }

    fn launch_image_job(self: &Arc<Self>, body: &Arc<BodyInner>) {
        let (job, output) = BuildRaster::new(self.key.clone(), Arc::downgrade(body));
        let handle = body.jobs().add_job(Box::new(job), self.key.level());
        self.state.lock().image_job = Some(PendingJob { handle, output });
    }

    fn poll_elevation_job(self: &Arc<Self>, body: &Arc<BodyInner>) {
        let finished = {
            let mut state = self.state.lock();
            match &state.elevation_job {
                Some(job) if job.handle.is_done() => state.elevation_job.take(),
                _ => None,
            }
        };
        let Some(job) = finished else { return };
        if job.handle.succeeded() {
            if let Ok(grid) = job.output.try_recv() {
                let mut state = self.state.lock();
                state.elevation_current = true;
                if let Some(grid) = grid {
                    state.elevation = Some(Arc::new(grid));
                    state.flags.insert(DirtyFlags::VERTICES);
                }
            }
        }
        // Failures leave elevation_current unset; the next tick asks again.
    }

    fn maybe_launch_elevation_job(self: &Arc<Self>, body: &Arc<BodyInner>) {
        {
            let state = self.state.lock();
            if state.elevation_current || state.elevation_job.is_some() {
                return;
            }
        }
        if body.elevation_stack().is_empty() {
            self.state.lock().elevation_current = true;
            return;
        }
        let size = self.key.mesh_size();
        let (job, output) = BuildElevation::new(
            self.key.clone(),
            size.columns,
            size.rows,
            Arc::downgrade(body),
        );
        let handle = body.jobs().add_job(Box::new(job), self.key.level());
        self.state.lock().elevation_job = Some(PendingJob { handle, output });
    }

    pub(crate) fn rebuild_mesh(&self, body: &BodyInner) {
        let elevation = self.state.lock().elevation.clone();
        let mesh = Arc::new(TileMesh::build(
            &self.key,
            body.land(),
            elevation.as_deref(),
        ));
        mesh.set_show_skirts(body.use_skirts());
        let mut state = self.state.lock();
        state.mesh = Some(mesh);
        state.flags.remove(DirtyFlags::VERTICES);
    }

    fn poll_split_job(self: &Arc<Self>) {
        let finished = {
            let mut state = self.state.lock();
            match &state.split_job {
                Some(job) if job.handle.is_done() => state.split_job.take(),
                _ => None,
            }
        };
        let Some(job) = finished else { return };
        if job.handle.succeeded() {
            if let Ok(children) = job.output.try_recv() {
                let mut state = self.state.lock();
                let [a, b, c, d] = children;
                state.children = [Some(a), Some(b), Some(c), Some(d)];
                state.child_group_attached = true;
            }
        } else {
            // The split failed or was canceled; the tile keeps drawing its
            // low form, which is coarser but never wrong.
            debug!("split of tile level {} abandoned", self.key.level());
        }
    }

    fn queue_split_job(self: &Arc<Self>, body: &Arc<BodyInner>) {
        let (job, output) = BuildTiles::new(Arc::downgrade(self), Arc::downgrade(body));
        // Finer tiles first so the detail under the eye fills in before
        // background refinement.
        let handle = body.jobs().add_job(Box::new(job), self.key.level());
        self.state.lock().split_job = Some(PendingJob { handle, output });
    }

    fn cancel_split_job(&self, body: &BodyInner) {
        let job = self.state.lock().split_job.take();
        if let Some(job) = job {
            body.jobs().remove_queued(&job.handle);
            job.handle.cancel();
        }
    }

    fn launch_vector_jobs(&self, body: &Arc<BodyInner>) {
        let jobs = body
            .vector_stack()
            .launch_vector_jobs(self.key.extents(), self.key.level(), body.jobs());
        self.state.lock().vector_jobs = jobs;
    }

    pub(crate) fn cancel_vector_jobs(&self) {
        let jobs = std::mem::take(&mut self.state.lock().vector_jobs);
        for job in jobs {
            job.cancel_vector_job();
        }
    }

    fn poll_vector_jobs(&self, body: &BodyInner) {
        let jobs = self.state.lock().vector_jobs.clone();
        let mut ready = Vec::new();
        for job in &jobs {
            if job.is_vector_job_done() {
                ready.push((job.clone(), job.take_vector_data()));
            }
        }
        if ready.is_empty() {
            return;
        }
        {
            let mut state = self.state.lock();
            for (job, data) in ready {
                // The first fresh result replaces anything inherited from
                // the parent, even when it is empty: the tile's own fetch
                // is authoritative. From then on results accumulate.
                state.vector_data.add(data);
                state.vector_jobs.retain(|j| !Arc::ptr_eq(j, &job));
            }
        }
        body.set_needs_redraw();
    }

    // ------------------------------------------------------------------
    // Split build, executed on a worker inside the BuildTiles job.
    // ------------------------------------------------------------------

    pub(crate) fn build_children(
        self: &Arc<Self>,
        body: &Arc<BodyInner>,
        handle: &JobHandle,
    ) -> Result<[Arc<Tile>; 4], JobError> {
        let keys = self.key.split();
        let half = self.split_distance() / 2.;
        let (parent_vector, parent_elevation) = {
            let state = self.state.lock();
            (state.vector_data.clone(), state.elevation.clone())
        };

        let mut children: Vec<Arc<Tile>> = Vec::with_capacity(4);
        for key in keys {
            let step = handle.check_canceled().and_then(|_| {
                let inherited = TileVectorData::inherited_from(&parent_vector, key.extents());
                let child = Tile::new(key, half, Arc::downgrade(body), inherited);
                child.build_initial_data(body, parent_elevation.as_deref(), handle)?;
                children.push(child);
                Ok(())
            });
            if let Err(err) = step {
                // Partially built siblings must not keep fetching for a
                // split that will never land.
                for child in &children {
                    child.cancel_vector_jobs();
                }
                return Err(err);
            }
        }

        // Every quadrant has elevation now; ground-clamped vector data
        // over this region needs to re-adjust.
        for child in &children {
            body.notify_elevation_changed(child.extents(), child.level());
        }
        handle.check_canceled()?;

        Ok(children
            .try_into()
            .unwrap_or_else(|_| unreachable!("exactly four children")))
    }

    fn build_initial_data(
        self: &Arc<Self>,
        body: &Arc<BodyInner>,
        parent_elevation: Option<&ElevationGrid>,
        handle: &JobHandle,
    ) -> Result<(), JobError> {
        let size = self.key.mesh_size();
        let parent_extents = parent_extents_of(&self.key);

        let merged = body
            .elevation_stack()
            .build(&self.key, size.columns, size.rows, handle)
            .map_err(JobError::from)?;
        {
            let mut state = self.state.lock();
            state.elevation_current = true;
            match merged {
                Some(grid) => state.elevation = Some(Arc::new(grid)),
                None => {
                    // No source covers this quadrant yet; refine the
                    // parent's samples so the surface stays continuous.
                    if let Some(parent) = parent_elevation {
                        state.elevation = Some(Arc::new(resample(
                            parent,
                            &parent_extents,
                            self.key.extents(),
                            parent.width(),
                            parent.height(),
                        )));
                    }
                }
            }
        }
        handle.check_canceled()?;

        let image_size = self.key.image_size();
        let image = body
            .raster_stack()
            .build(&self.key, image_size.width, image_size.height, handle)
            .map_err(JobError::from)?;
        {
            let mut state = self.state.lock();
            state.image = image.map(Arc::new);
            state.flags.remove(DirtyFlags::IMAGE);
        }
        handle.check_canceled()?;

        self.rebuild_mesh(body);
        handle.check_canceled()?;

        self.launch_vector_jobs(body);
        self.state.lock().flags.remove(DirtyFlags::VECTOR);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Clearing and teardown.
    // ------------------------------------------------------------------

    /// Detach and retire the child subtree. The children land on the
    /// body's pending-deletion list; nothing is dropped during traversal.
    pub(crate) fn clear_children(&self, body: &BodyInner, cancel_jobs: bool) {
        let children = {
            let mut state = self.state.lock();
            state.child_group_attached = false;
            state.children_pending_clear = false;
            std::mem::replace(&mut state.children, [None, None, None, None])
        };
        for child in children.into_iter().flatten() {
            child.retire(body);
            body.add_tile_to_delete(child);
        }
        if cancel_jobs {
            self.cancel_split_job(body);
        }
    }

    /// Cancel everything, drop the body reference, and recurse. After this
    /// the tile is inert and safe to drop from any thread at any time.
    pub(crate) fn retire(&self, body: &BodyInner) {
        self.cancel_vector_jobs();
        let (image_job, elevation_job, split_job, children) = {
            let mut state = self.state.lock();
            state.flags = DirtyFlags::empty();
            state.children_pending_clear = false;
            (
                state.image_job.take(),
                state.elevation_job.take(),
                state.split_job.take(),
                std::mem::replace(&mut state.children, [None, None, None, None]),
            )
        };
        for job in [
            image_job.map(|j| j.handle),
            elevation_job.map(|j| j.handle),
            split_job.map(|j| j.handle),
        ]
        .into_iter()
        .flatten()
        {
            body.jobs().remove_queued(&job);
            job.cancel();
        }
        *self.body.write() = Weak::new();
        for child in children.into_iter().flatten() {
            child.retire(body);
            body.add_tile_to_delete(child);
        }
    }

    /// Find the nearest intersection of a world-space segment with the
    /// resident geometry under this tile, recursing into attached
    /// children and testing leaf meshes.
    pub(crate) fn intersect(
        &self,
        p0: &Point3<f64>,
        p1: &Point3<f64>,
        best: &mut Option<(f64, Point3<f64>)>,
    ) {
        let (mesh, children, attached) = {
            let state = self.state.lock();
            (
                state.mesh.clone(),
                state.children.clone(),
                state.child_group_attached,
            )
        };
        if attached {
            for child in children.into_iter().flatten() {
                child.intersect(p0, p1, best);
            }
            return;
        }
        if let Some(mesh) = mesh {
            if let Some((t, point)) = mesh.intersect_segment(p0, p1) {
                if best.map(|(bt, _)| t < bt).unwrap_or(true) {
                    *best = Some((t, point));
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Elevation queries.
    // ------------------------------------------------------------------

    /// Sample this tile's grid at (lat, lon). Zero where there is no grid
    /// or the grid has no data; the body's recursive query handles extents
    /// checks before descending.
    pub fn elevation(&self, lat: f64, lon: f64) -> f64 {
        let extents = self.key.extents();
        let grid = self.state.lock().elevation.clone();
        match grid {
            Some(grid) => {
                let u = (lon - extents.min_lon()) / extents.width();
                let v = (extents.max_lat() - lat) / extents.height();
                let sampled = grid.sample(u, v);
                if grid.is_no_data(sampled) {
                    0.
                } else {
                    sampled as f64
                }
            }
            None => 0.,
        }
    }
}

/// Reconstruct the parent's extents from a child key: the quadrant is
/// known from the row/column parity.
fn parent_extents_of(key: &TileKey) -> Extents {
    let e = key.extents();
    let (width, height) = (e.width(), e.height());
    let west = key.column() % 2 == 0;
    let north = key.row() % 2 == 0;
    let min_lon = if west { e.min_lon() } else { e.min_lon() - width };
    let max_lat = if north { e.max_lat() } else { e.max_lat() + height };
    Extents::new(min_lon, max_lat - 2. * height, min_lon + 2. * width, max_lat)
}

#[cfg(test)]
mod test {
    use super::*;
    use geo::{GridSize, ImageSize};

    #[test]
    fn test_parent_extents_roundtrip() {
        let parent = TileKey::new(
            3,
            5,
            2,
            Extents::new(-20., 10., 20., 50.),
            GridSize::new(5, 5),
            ImageSize::new(16, 16),
        );
        for child in parent.split() {
            assert_eq!(&parent_extents_of(&child), parent.extents());
        }
    }

    #[test]
    fn test_new_tile_starts_fully_dirty_and_leaf() {
        let tile = Tile::new(
            TileKey::new(
                0,
                0,
                0,
                Extents::new(-180., -90., 180., 90.),
                GridSize::new(5, 5),
                ImageSize::new(16, 16),
            ),
            1e7,
            Weak::new(),
            TileVectorData::new(),
        );
        assert_eq!(tile.dirty_flags(), DirtyFlags::ALL);
        assert!(tile.is_leaf());
        assert!(!tile.is_parent());
        assert!(tile.mesh().is_none());
    }

    #[test]
    fn test_dirty_respects_extents_filter() {
        let tile = Tile::new(
            TileKey::new(
                0,
                0,
                0,
                Extents::new(0., 0., 10., 10.),
                GridSize::new(5, 5),
                ImageSize::new(16, 16),
            ),
            1e7,
            Weak::new(),
            TileVectorData::new(),
        );
        tile.dirty(false, DirtyFlags::ALL, false, None);
        assert_eq!(tile.dirty_flags(), DirtyFlags::empty());

        tile.dirty(
            true,
            DirtyFlags::IMAGE,
            false,
            Some(&Extents::new(50., 50., 60., 60.)),
        );
        assert_eq!(tile.dirty_flags(), DirtyFlags::empty());

        tile.dirty(
            true,
            DirtyFlags::IMAGE,
            false,
            Some(&Extents::new(5., 5., 60., 60.)),
        );
        assert_eq!(tile.dirty_flags(), DirtyFlags::IMAGE);
    }
}

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
use crate::source::{TileVectorJob, VectorSource};
use geo::Extents;
use jobs::JobManager;
use parking_lot::RwLock;
use std::sync::Arc;

/// The ordered set of vector sources attached to a body.
#[derive(Default)]
pub struct VectorStack {
    sources: RwLock<Vec<Arc<dyn VectorSource>>>,
}

impl VectorStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, source: Arc<dyn VectorSource>) {
        self.sources.write().push(source);
    }

    pub fn remove(&self, source: &Arc<dyn VectorSource>) {
        self.sources.write().retain(|s| !Arc::ptr_eq(s, source));
    }

    pub fn sources(&self) -> Vec<Arc<dyn VectorSource>> {
        self.sources.read().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.read().is_empty()
    }

    /// Launch one round of per-tile jobs across every visible source whose
    /// coverage touches the tile.
    pub fn launch_vector_jobs(
        &self,
        extents: &Extents,
        level: u32,
        jobs: &Arc<JobManager>,
    ) -> Vec<Arc<dyn TileVectorJob>> {
        let mut launched = Vec::new();
        for source in self.sources() {
            if source.visible() && source.extents().intersects(extents) {
                launched.extend(source.launch_vector_jobs(extents, level, jobs));
            }
        }
        launched
    }
}

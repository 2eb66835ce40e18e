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
use jobs::JobManager;
use std::sync::Arc;

/// An asynchronous fetch of the features intersecting one tile. Tiles poll
/// `is_vector_job_done` from the update tick and take the data exactly
/// once; a job canceled because its tile was culled must stop fetching and
/// will never be polled for data again.
pub trait TileVectorJob: Send + Sync {
    fn is_vector_job_done(&self) -> bool;

    /// Surrender the fetched features. Implementations return the data at
    /// most once; subsequent calls yield nothing.
    fn take_vector_data(&self) -> Vec<Arc<Feature>>;

    fn cancel_vector_job(&self);
}

/// A source of vector data that can be scoped to a tile. Sources schedule
/// whatever work they need on the shared job manager and hand back one
/// pollable job per request.
pub trait VectorSource: Send + Sync {
    fn name(&self) -> &str;

    fn extents(&self) -> Extents;

    fn visible(&self) -> bool {
        true
    }

    fn launch_vector_jobs(
        &self,
        extents: &Extents,
        level: u32,
        jobs: &Arc<JobManager>,
    ) -> Vec<Arc<dyn TileVectorJob>>;

    /// The terrain under `extents` changed; sources with ground-clamped
    /// features re-clamp them here.
    fn elevation_changed(&self, _extents: &Extents, _level: u32) {}
}

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
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use thiserror::Error;

/// A canceled job unwinds through this error; it is expected and silent.
/// Anything else is a real failure that the owning tile reacts to.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("job canceled")]
    Canceled,
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

pub type JobResult = Result<(), JobError>;

#[derive(Debug, Default)]
struct HandleState {
    canceled: AtomicBool,
    done: AtomicBool,
    succeeded: AtomicBool,
}

/// Shared view of one job's lifecycle. The GUI thread polls `is_done` and
/// `succeeded`; it must never block on a job. Workers poll `canceled` at
/// every coarse step so a canceled job stops without touching its target.
#[derive(Clone, Debug, Default)]
pub struct JobHandle {
    state: Arc<HandleState>,
}

impl JobHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.state.canceled.store(true, Ordering::SeqCst);
    }

    pub fn canceled(&self) -> bool {
        self.state.canceled.load(Ordering::SeqCst)
    }

    pub fn is_done(&self) -> bool {
        self.state.done.load(Ordering::SeqCst)
    }

    pub fn succeeded(&self) -> bool {
        self.state.succeeded.load(Ordering::SeqCst)
    }

    /// The cooperative checkpoint: call between I/O operations and at loop
    /// boundaries.
    pub fn check_canceled(&self) -> JobResult {
        if self.canceled() {
            Err(JobError::Canceled)
        } else {
            Ok(())
        }
    }

    /// Two handles are the same job iff they share state.
    pub fn same_job(&self, other: &JobHandle) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    pub(crate) fn finish(&self, succeeded: bool) {
        self.state.succeeded.store(succeeded, Ordering::SeqCst);
        self.state.done.store(true, Ordering::SeqCst);
    }
}

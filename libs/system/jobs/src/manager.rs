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
use crate::handle::{JobError, JobHandle, JobResult};
use log::{debug, warn};
use parking_lot::{Condvar, Mutex};
use std::{
    cmp::Ordering,
    collections::BinaryHeap,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering as MemOrdering},
        Arc,
    },
    thread::JoinHandle,
};

pub trait Job: Send + 'static {
    fn name(&self) -> &str {
        "job"
    }

    fn run(&self, handle: &JobHandle) -> JobResult;
}

struct Queued {
    priority: u32,
    seq: u64,
    job: Box<dyn Job>,
    handle: JobHandle,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        // Highest priority class first; FIFO within a class. The heap is a
        // max-heap, so the lower sequence number must compare greater.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct Shared {
    queue: Mutex<BinaryHeap<Queued>>,
    available: Condvar,
    shutdown: AtomicBool,
    next_seq: AtomicU64,
}

/// A bounded pool of worker threads draining a priority queue of jobs.
/// Priority defaults to the tile level, so finer tiles near the eye come
/// off the queue first. With `inline()` there are no workers and every
/// submitted job runs synchronously on the caller's thread, which is what
/// the engine tests use.
pub struct JobManager {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    inline: bool,
}

impl JobManager {
    pub fn with_workers(count: usize) -> Arc<Self> {
        let manager = Arc::new(Self {
            shared: Arc::new(Shared::default()),
            workers: Mutex::new(Vec::new()),
            inline: false,
        });
        let mut workers = manager.workers.lock();
        for i in 0..count {
            let shared = manager.shared.clone();
            workers.push(
                std::thread::Builder::new()
                    .name(format!("tile-worker-{}", i))
                    .spawn(move || worker_main(shared))
                    .expect("spawn worker"),
            );
        }
        drop(workers);
        manager
    }

    /// A manager with no workers that runs each job at submission time.
    pub fn inline() -> Arc<Self> {
        Arc::new(Self {
            shared: Arc::new(Shared::default()),
            workers: Mutex::new(Vec::new()),
            inline: true,
        })
    }

    pub fn add_job(&self, job: Box<dyn Job>, priority: u32) -> JobHandle {
        let handle = JobHandle::new();
        if self.inline {
            execute(job.as_ref(), &handle);
            return handle;
        }
        let seq = self.shared.next_seq.fetch_add(1, MemOrdering::SeqCst);
        self.shared.queue.lock().push(Queued {
            priority,
            seq,
            job,
            handle: handle.clone(),
        });
        self.shared.available.notify_one();
        handle
    }

    /// Drop a job that has not started yet. Already-running jobs are left
    /// to notice their canceled flag on their own.
    pub fn remove_queued(&self, handle: &JobHandle) {
        let mut queue = self.shared.queue.lock();
        let remaining = std::mem::take(&mut *queue)
            .into_iter()
            .filter(|queued| !queued.handle.same_job(handle))
            .collect();
        *queue = remaining;
    }

    pub fn queued_count(&self) -> usize {
        self.shared.queue.lock().len()
    }

    /// Cancel everything still queued and clear the queue.
    pub fn cancel_queued(&self) {
        let drained = std::mem::take(&mut *self.shared.queue.lock());
        for queued in drained {
            queued.handle.cancel();
            queued.handle.finish(false);
        }
    }

    /// Run the next queued job on the calling thread. Returns false when
    /// the queue is empty. Tests drive the queue with this.
    pub fn run_next(&self) -> bool {
        let queued = self.shared.queue.lock().pop();
        match queued {
            Some(queued) => {
                execute(queued.job.as_ref(), &queued.handle);
                true
            }
            None => false,
        }
    }

    /// Cancel all pending work and join the workers.
    pub fn shutdown(&self) {
        self.cancel_queued();
        self.shared.shutdown.store(true, MemOrdering::SeqCst);
        self.shared.available.notify_all();
        let mut workers = self.workers.lock();
        for worker in workers.drain(..) {
            if worker.join().is_err() {
                warn!("worker thread panicked during shutdown");
            }
        }
    }
}

impl Drop for JobManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn execute(job: &dyn Job, handle: &JobHandle) {
    if handle.canceled() {
        handle.finish(false);
        return;
    }
    let outcome = catch_unwind(AssertUnwindSafe(|| job.run(handle)));
    match outcome {
        Ok(Ok(())) => handle.finish(true),
        Ok(Err(JobError::Canceled)) => {
            debug!("job '{}' canceled", job.name());
            handle.finish(false);
        }
        Ok(Err(JobError::Failed(err))) => {
            warn!("job '{}' failed: {:#}", job.name(), err);
            handle.finish(false);
        }
        Err(_) => {
            warn!("job '{}' panicked", job.name());
            handle.finish(false);
        }
    }
}

fn worker_main(shared: Arc<Shared>) {
    loop {
        let queued = {
            let mut queue = shared.queue.lock();
            loop {
                if shared.shutdown.load(MemOrdering::SeqCst) {
                    return;
                }
                if let Some(queued) = queue.pop() {
                    break queued;
                }
                shared.available.wait(&mut queue);
            }
        };
        execute(queued.job.as_ref(), &queued.handle);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as MemOrdering};

    struct Recorder {
        tag: usize,
        order: Arc<Mutex<Vec<usize>>>,
    }

    impl Job for Recorder {
        fn run(&self, _handle: &JobHandle) -> JobResult {
            self.order.lock().push(self.tag);
            Ok(())
        }
    }

    struct Counter {
        count: Arc<AtomicUsize>,
    }

    impl Job for Counter {
        fn run(&self, handle: &JobHandle) -> JobResult {
            handle.check_canceled()?;
            self.count.fetch_add(1, MemOrdering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_inline_runs_at_submission() {
        let manager = JobManager::inline();
        let count = Arc::new(AtomicUsize::new(0));
        let handle = manager.add_job(
            Box::new(Counter {
                count: count.clone(),
            }),
            0,
        );
        assert!(handle.is_done());
        assert!(handle.succeeded());
        assert_eq!(count.load(MemOrdering::SeqCst), 1);
    }

    #[test]
    fn test_priority_order_with_fifo_within_class() {
        let manager = JobManager::with_workers(0);
        let order = Arc::new(Mutex::new(Vec::new()));
        for (tag, priority) in [(0, 1), (1, 3), (2, 3), (3, 2)] {
            manager.add_job(
                Box::new(Recorder {
                    tag,
                    order: order.clone(),
                }),
                priority,
            );
        }
        while manager.run_next() {}
        // Level 3 jobs first in submission order, then 2, then 1.
        assert_eq!(*order.lock(), vec![1, 2, 3, 0]);
    }

    #[test]
    fn test_canceled_job_does_not_run() {
        let manager = JobManager::with_workers(0);
        let count = Arc::new(AtomicUsize::new(0));
        let handle = manager.add_job(
            Box::new(Counter {
                count: count.clone(),
            }),
            0,
        );
        handle.cancel();
        while manager.run_next() {}
        assert!(handle.is_done());
        assert!(!handle.succeeded());
        assert_eq!(count.load(MemOrdering::SeqCst), 0);
    }

    #[test]
    fn test_cancel_queued_marks_done() {
        let manager = JobManager::with_workers(0);
        let count = Arc::new(AtomicUsize::new(0));
        let handle = manager.add_job(
            Box::new(Counter {
                count: count.clone(),
            }),
            0,
        );
        manager.cancel_queued();
        assert!(handle.canceled());
        assert!(handle.is_done());
        assert_eq!(manager.queued_count(), 0);
    }

    #[test]
    fn test_workers_drain_queue() {
        let manager = JobManager::with_workers(2);
        let count = Arc::new(AtomicUsize::new(0));
        let handles = (0..16)
            .map(|_| {
                manager.add_job(
                    Box::new(Counter {
                        count: count.clone(),
                    }),
                    0,
                )
            })
            .collect::<Vec<_>>();
        while handles.iter().any(|h| !h.is_done()) {
            std::thread::yield_now();
        }
        assert_eq!(count.load(MemOrdering::SeqCst), 16);
        manager.shutdown();
    }
}

//! The job system: worker threads, submission and the main-thread drain.
//!
//! ```rust,ignore
//! use engine_jobs::config::JobSystemConfig;
//! use engine_jobs::core::{JobSpec, JobSystem, JobType};
//!
//! let jobs = JobSystem::new(JobSystemConfig::default())?;
//!
//! let load = jobs.submit(
//!     JobSpec::new(|params, result| {
//!         result.extend_from_slice(params);
//!         Ok(())
//!     })
//!     .with_type(JobType::ResourceLoad)
//!     .with_params(b"textures/stone.png".to_vec()),
//! )?;
//!
//! jobs.submit(
//!     JobSpec::new(|_, _| Ok(()))
//!         .depends_on(load)
//!         .on_success(|_, done| println!("{} finished", done.handle)),
//! )?;
//!
//! // Once per frame, on the thread that created the system:
//! jobs.tick();
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::{unbounded, Receiver};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::JobSystemConfig;
use crate::{Mutex, Semaphore, Signal};

use super::error::JobError;
use super::job::{Completion, FailureKind, JobHandle, JobSpec, JobState};
use super::scheduler::{Admission, DrainItem, SchedulerState};
use super::worker::spawn_worker;

/// Lifetime counters (lock-free atomics).
#[derive(Debug, Default)]
pub(crate) struct JobCounters {
    pub submitted: AtomicU64,
    pub succeeded: AtomicU64,
    pub failed: AtomicU64,
    pub cascaded: AtomicU64,
    pub drained: AtomicU64,
    pub rejected: AtomicU64,
    pub discarded: AtomicU64,
}

/// State shared between the owning [`JobSystem`] and its workers.
pub(crate) struct Shared {
    pub state: Mutex<SchedulerState>,
    /// One semaphore per worker; a permit per queued job plus the quit wake-up.
    pub wakeups: Vec<Semaphore>,
    pub counters: JobCounters,
    pub quit: AtomicBool,
}

/// Snapshot of scheduler occupancy and lifetime counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobStats {
    /// Worker threads.
    pub worker_count: usize,
    /// Record pool capacity.
    pub pool_capacity: usize,
    /// Free records.
    pub free_records: usize,
    /// Jobs waiting on predecessors.
    pub pending: usize,
    /// Jobs queued on a worker, including overflow.
    pub queued: usize,
    /// Jobs sitting in overflow lists.
    pub overflowed: usize,
    /// Entries currently executing.
    pub running: usize,
    /// Finished jobs waiting for [`JobSystem::tick`].
    pub awaiting_drain: usize,
    /// Jobs accepted by `submit`.
    pub submitted: u64,
    /// Entries that returned success.
    pub succeeded: u64,
    /// Entries that returned an error or panicked.
    pub failed: u64,
    /// Jobs failed because a predecessor failed.
    pub cascaded: u64,
    /// Jobs whose callbacks were delivered and records freed.
    pub drained: u64,
    /// Submissions refused with an error.
    pub rejected: u64,
    /// Live jobs freed at shutdown without callbacks.
    pub discarded: u64,
}

/// Multi-threaded job scheduler driven by a frame loop.
///
/// Workers are OS threads, each admitting the job types in its type-mask.
/// Entry functions run on workers; `on_success`/`on_fail` callbacks run only
/// inside [`JobSystem::tick`] on the thread that created the system.
pub struct JobSystem {
    config: JobSystemConfig,
    shared: Arc<Shared>,
    workers: Mutex<Vec<Option<JoinHandle<()>>>>,
    exited: Receiver<usize>,
    owner: ThreadId,
    draining: AtomicBool,
}

/// Marks a drain in progress; cleared on drop so a panicking callback does not
/// wedge later ticks.
struct DrainGuard<'a>(&'a AtomicBool);

impl<'a> DrainGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Option<Self> {
        (!flag.swap(true, Ordering::SeqCst)).then_some(Self(flag))
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl JobSystem {
    /// Validate `config`, create the scheduler state and start the workers.
    ///
    /// Returns once every worker has entered its loop. The calling thread
    /// becomes the main thread: only it may call [`JobSystem::tick`].
    ///
    /// # Errors
    ///
    /// [`JobError::InvalidConfig`] if validation fails, [`JobError::ThreadSpawn`]
    /// if a worker thread cannot be created. Workers started before the failure
    /// are shut down again.
    pub fn new(config: JobSystemConfig) -> Result<Self, JobError> {
        config.validate().map_err(JobError::InvalidConfig)?;

        let worker_count = config.worker_count;
        let shared = Arc::new(Shared {
            state: Mutex::new(SchedulerState::new(&config)),
            wakeups: (0..worker_count).map(|_| Semaphore::new(0)).collect(),
            counters: JobCounters::default(),
            quit: AtomicBool::new(false),
        });
        let (exit_tx, exit_rx) = unbounded();

        let system = Self {
            config,
            shared,
            workers: Mutex::new(Vec::with_capacity(worker_count)),
            exited: exit_rx,
            owner: thread::current().id(),
            draining: AtomicBool::new(false),
        };

        for (worker_id, mask) in system.config.type_masks.iter().enumerate() {
            let ready = Arc::new(Signal::new());
            let handle = spawn_worker(
                worker_id,
                format!("{}-{worker_id}", system.config.thread_name_prefix),
                system.config.thread_stack_size,
                Arc::clone(&system.shared),
                Arc::clone(&ready),
                exit_tx.clone(),
            )
            .map_err(|err| JobError::ThreadSpawn(err.to_string()))?;
            ready.wait();
            system.workers.lock().push(Some(handle));
            debug!(worker_id, mask = ?mask, "Worker ready");
        }

        info!(
            worker_count,
            pool_capacity = system.config.pool_capacity,
            queue_capacity = system.config.queue_capacity,
            "Job system started"
        );
        Ok(system)
    }

    /// Submit a job. Callable from any thread, including worker threads.
    ///
    /// The job is queued on a worker admitting its type (round robin among
    /// several), or parked until its predecessors finish. A predecessor handle
    /// that was already drained counts as succeeded; one that already failed
    /// makes this job fail immediately, delivered through `on_fail`.
    ///
    /// # Errors
    ///
    /// - [`JobError::PoolExhausted`] when no record is free; retry next frame.
    /// - [`JobError::QueueUnavailable`] when no worker admits the job type.
    /// - [`JobError::Shutdown`] after [`JobSystem::shutdown`].
    pub fn submit(&self, spec: JobSpec) -> Result<JobHandle, JobError> {
        let job_type = spec.job_type();
        let priority = spec.priority();

        let admitted = self.shared.state.lock().admit(spec);
        match admitted {
            Ok((handle, admission)) => {
                self.shared.counters.submitted.fetch_add(1, Ordering::Relaxed);
                match admission {
                    Admission::Queued { worker } => {
                        self.shared.wakeups[worker].release();
                        debug!(job = %handle, ?job_type, ?priority, worker, "Job queued");
                    }
                    Admission::Pending => {
                        debug!(job = %handle, ?job_type, ?priority, "Job waiting on predecessors");
                    }
                    Admission::Cascaded => {
                        self.shared.counters.cascaded.fetch_add(1, Ordering::Relaxed);
                        debug!(job = %handle, ?job_type, "Job submitted after predecessor failed");
                    }
                }
                Ok(handle)
            }
            Err(err) => {
                self.shared.counters.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(?job_type, error = %err, "Job submission rejected");
                Err(err)
            }
        }
    }

    /// Drain up to `drain_budget` finished jobs, running each one's
    /// `on_success` or `on_fail` callback and returning its record to the pool.
    ///
    /// Returns how many jobs were drained. Does nothing when called from any
    /// thread other than the one that created the system, from inside a
    /// callback, or after shutdown. A callback that shuts the system down
    /// suppresses the callbacks still left in the batch.
    pub fn tick(&self) -> usize {
        if self.shared.quit.load(Ordering::Acquire) {
            return 0;
        }
        if thread::current().id() != self.owner {
            warn!("JobSystem::tick called off the main thread; ignoring");
            return 0;
        }
        let Some(_draining) = DrainGuard::enter(&self.draining) else {
            warn!("JobSystem::tick called from a completion callback; ignoring");
            return 0;
        };

        let batch = self
            .shared
            .state
            .lock()
            .take_completions(self.config.drain_budget);

        let mut drained = 0;
        for item in batch {
            let DrainItem {
                handle,
                job_type,
                failure,
                result,
                callback,
            } = item;
            if self.shared.quit.load(Ordering::SeqCst) {
                debug!(job = %handle, "Skipping callback after shutdown");
                continue;
            }
            if let Some(FailureKind::Cascade { predecessor }) = &failure {
                warn!(job = %handle, ?job_type, %predecessor, "Job failed by cascade");
            }
            if let Some(callback) = callback {
                let completion = Completion {
                    handle,
                    job_type,
                    failure: failure.as_ref(),
                    result: &result,
                };
                callback(self, &completion);
            }
            // Shutdown inside the callback already reclaimed the record.
            if self.shared.state.lock().release(handle) {
                drained += 1;
            }
        }

        self.shared
            .counters
            .drained
            .fetch_add(drained as u64, Ordering::Relaxed);
        drained
    }

    /// Whether the job has finished. Stays `true` after the job is drained and
    /// its id reused.
    #[must_use]
    pub fn is_complete(&self, handle: JobHandle) -> bool {
        self.shared.state.lock().table.is_complete(handle)
    }

    /// Stop the workers and free every live record.
    ///
    /// Entries already running finish; queued and pending jobs never start.
    /// No callbacks run, including for jobs that finished but were not yet
    /// drained. Each worker gets `shutdown_timeout_ms` to exit before it is
    /// detached. Calling this more than once is a no-op.
    ///
    /// From another thread, this first waits for a running [`JobSystem::tick`]
    /// to finish its current callback. From inside a callback, the rest of
    /// that tick's batch is skipped.
    pub fn shutdown(&self) {
        if self.shared.quit.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Shutting down job system");

        // A drain on the main thread stops at its next callback boundary.
        if thread::current().id() != self.owner {
            while self.draining.load(Ordering::SeqCst) {
                thread::yield_now();
            }
        }
        self.shared.state.lock().close();
        for wakeup in &self.shared.wakeups {
            wakeup.release();
        }

        let timeout = self.config.shutdown_timeout();
        let mut workers = self.workers.lock();
        let mut remaining = workers.iter().flatten().count();
        while remaining > 0 {
            let Ok(worker_id) = self.exited.recv_timeout(timeout) else {
                break;
            };
            remaining -= 1;
            if let Some(handle) = workers.get_mut(worker_id).and_then(Option::take) {
                if handle.join().is_ok() {
                    debug!(worker_id, "Worker joined successfully");
                } else {
                    warn!(worker_id, "Worker panicked");
                }
            }
        }
        for (worker_id, slot) in workers.iter_mut().enumerate() {
            if slot.take().is_some() {
                warn!(worker_id, "Worker did not exit within timeout - detaching");
            }
        }
        let worker_count = workers.len();
        drop(workers);

        let reclaimed = self.shared.state.lock().reclaim_all();
        self.shared
            .counters
            .discarded
            .fetch_add(reclaimed as u64, Ordering::Relaxed);
        info!(worker_count, reclaimed, "Job system shut down complete");
    }

    /// Whether [`JobSystem::shutdown`] has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shared.quit.load(Ordering::Acquire)
    }

    /// Occupancy and lifetime counters.
    #[must_use]
    pub fn stats(&self) -> JobStats {
        let counters = &self.shared.counters;
        let state = self.shared.state.lock();
        JobStats {
            worker_count: self.config.worker_count,
            pool_capacity: state.table.capacity(),
            free_records: state.table.free_count(),
            pending: state.table.count_in(JobState::Pending),
            queued: state.queued(),
            overflowed: state.overflowed(),
            running: state.running(),
            awaiting_drain: state.awaiting_drain(),
            submitted: counters.submitted.load(Ordering::Relaxed),
            succeeded: counters.succeeded.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
            cascaded: counters.cascaded.load(Ordering::Relaxed),
            drained: counters.drained.load(Ordering::Relaxed),
            rejected: counters.rejected.load(Ordering::Relaxed),
            discarded: counters.discarded.load(Ordering::Relaxed),
        }
    }

    /// Number of worker threads.
    #[must_use]
    pub const fn worker_count(&self) -> usize {
        self.config.worker_count
    }

    /// The validated configuration the system runs with.
    #[must_use]
    pub const fn config(&self) -> &JobSystemConfig {
        &self.config
    }
}

impl Drop for JobSystem {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for JobSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobSystem")
            .field("worker_count", &self.config.worker_count)
            .field("type_masks", &self.config.type_masks)
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::job::JobTypeMask;
    use std::time::{Duration, Instant};

    fn single_worker() -> JobSystem {
        JobSystem::new(JobSystemConfig::new().with_type_masks(vec![JobTypeMask::ALL])).unwrap()
    }

    fn tick_until(jobs: &JobSystem, mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done() {
            assert!(Instant::now() < deadline, "timed out waiting for jobs");
            jobs.tick();
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = JobSystem::new(JobSystemConfig::new().with_type_masks(Vec::new())).unwrap_err();
        assert!(matches!(err, JobError::InvalidConfig(_)));
    }

    #[test]
    fn test_submit_and_drain() {
        let jobs = single_worker();
        let handle = jobs.submit(JobSpec::new(|_, _| Ok(()))).unwrap();
        tick_until(&jobs, || jobs.stats().drained == 1);

        assert!(jobs.is_complete(handle));
        let stats = jobs.stats();
        assert_eq!(stats.submitted, 1);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.free_records, stats.pool_capacity);
    }

    #[test]
    fn test_tick_off_main_thread_is_ignored() {
        let jobs = Arc::new(single_worker());
        jobs.submit(JobSpec::new(|_, _| Ok(()))).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while jobs.stats().awaiting_drain == 0 {
            assert!(Instant::now() < deadline);
            thread::sleep(Duration::from_millis(1));
        }

        let remote = Arc::clone(&jobs);
        let drained = thread::spawn(move || remote.tick()).join().unwrap();
        assert_eq!(drained, 0);
        assert_eq!(jobs.tick(), 1);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let jobs = single_worker();
        jobs.shutdown();
        jobs.shutdown();
        assert!(jobs.is_shut_down());
        assert!(matches!(
            jobs.submit(JobSpec::new(|_, _| Ok(()))),
            Err(JobError::Shutdown)
        ));
        assert_eq!(jobs.tick(), 0);
        assert_eq!(jobs.stats().rejected, 1);
    }
}

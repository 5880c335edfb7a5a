//! Scheduler state guarded by the single scheduler mutex.
//!
//! Everything here runs with the lock held: admission, dispatch, completion,
//! dependency wake-ups and the hand-off to the main-thread drain. The methods
//! never block and never call user code.

use std::collections::VecDeque;
use std::mem;

use crate::config::JobSystemConfig;

use super::dispatcher::{Routing, WorkerQueues};
use super::error::JobError;
use super::job::{CompletionFn, FailureKind, JobEntry, JobHandle, JobSpec, JobState, JobType};
use super::table::{DependencyStatus, JobTable};

/// Where a newly admitted job ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    /// READY and queued on `worker`, whose semaphore must be signalled.
    Queued { worker: usize },
    /// Waiting on predecessors.
    Pending,
    /// A predecessor had already failed; the job went straight to FAILED.
    Cascaded,
}

/// A job taken off a queue, owned by the worker until it reports back.
pub(crate) struct RunningJob {
    pub handle: JobHandle,
    pub job_type: JobType,
    pub entry: JobEntry,
    pub params: Box<[u8]>,
    pub result: Vec<u8>,
}

/// How an entry call ended.
#[derive(Debug)]
pub(crate) enum Outcome {
    Succeeded,
    Failed(FailureKind),
}

/// Side effects of a state transition the caller has to act on.
#[derive(Debug, Default)]
pub(crate) struct Wakeups {
    /// Workers that received a newly READY job, one entry per job.
    pub workers: Vec<usize>,
    /// Successors failed by cascade.
    pub cascaded: u64,
}

/// A finished job popped from the completion queue for the main thread.
pub(crate) struct DrainItem {
    pub handle: JobHandle,
    pub job_type: JobType,
    pub failure: Option<FailureKind>,
    pub result: Vec<u8>,
    pub callback: Option<CompletionFn>,
}

pub(crate) struct SchedulerState {
    pub table: JobTable,
    pub queues: Vec<WorkerQueues>,
    routing: Routing,
    completions: VecDeque<JobHandle>,
    running: Vec<Option<JobHandle>>,
    accepting: bool,
}

impl SchedulerState {
    pub fn new(config: &JobSystemConfig) -> Self {
        Self {
            table: JobTable::with_capacity(config.pool_capacity),
            queues: (0..config.worker_count)
                .map(|_| WorkerQueues::new(config.queue_capacity))
                .collect(),
            routing: Routing::from_masks(&config.type_masks),
            completions: VecDeque::new(),
            running: vec![None; config.worker_count],
            accepting: true,
        }
    }

    /// Create a record for `spec`, resolve its dependencies and queue it if it
    /// is ready.
    pub fn admit(&mut self, spec: JobSpec) -> Result<(JobHandle, Admission), JobError> {
        if !self.accepting {
            return Err(JobError::Shutdown);
        }
        if self.table.free_count() == 0 {
            return Err(JobError::PoolExhausted);
        }
        let job_type = spec.job_type;
        let worker = self
            .routing
            .select(job_type)
            .ok_or(JobError::QueueUnavailable { job_type })?;
        let handle = self
            .table
            .allocate(spec, worker)
            .map_err(|_| JobError::PoolExhausted)?;

        let deps = self
            .table
            .get(handle)
            .map(|record| record.deps.clone())
            .unwrap_or_default();

        let failed_pred = deps
            .iter()
            .copied()
            .find(|dep| self.table.dependency_status(*dep) == DependencyStatus::Failed);
        if let Some(predecessor) = failed_pred {
            self.fail(handle, FailureKind::Cascade { predecessor });
            return Ok((handle, Admission::Cascaded));
        }

        let mut unresolved = 0;
        for dep in deps {
            if self.table.dependency_status(dep) != DependencyStatus::Outstanding {
                continue;
            }
            if let Some(pred) = self.table.get_mut(dep) {
                pred.dependents.push(handle);
                unresolved += 1;
            }
        }

        if unresolved > 0 {
            if let Some(record) = self.table.get_mut(handle) {
                record.unresolved = unresolved;
            }
            return Ok((handle, Admission::Pending));
        }

        match self.make_ready(handle) {
            Some(worker) => Ok((handle, Admission::Queued { worker })),
            None => Ok((handle, Admission::Pending)),
        }
    }

    /// PENDING to READY: push onto the target worker's band queue.
    fn make_ready(&mut self, handle: JobHandle) -> Option<usize> {
        let record = self.table.get_mut(handle)?;
        record.state = JobState::Ready;
        let (worker, priority) = (record.worker, record.priority);
        self.queues[worker].push(handle, priority);
        Some(worker)
    }

    /// Mark a job that never ran as FAILED and queue it for the drain.
    fn fail(&mut self, handle: JobHandle, failure: FailureKind) {
        if let Some(record) = self.table.get_mut(handle) {
            record.state = JobState::Failed;
            record.failure = Some(failure);
            self.completions.push_back(handle);
        }
    }

    /// READY to RUNNING for the next job on `worker`, highest band first.
    pub fn begin(&mut self, worker: usize) -> Option<RunningJob> {
        while let Some(handle) = self.queues[worker].pop_next() {
            let Some(record) = self.table.get_mut(handle) else {
                continue;
            };
            if record.state != JobState::Ready {
                continue;
            }
            let Some(entry) = record.entry.take() else {
                continue;
            };
            record.state = JobState::Running;
            let job = RunningJob {
                handle,
                job_type: record.job_type,
                entry,
                params: mem::take(&mut record.params),
                result: mem::take(&mut record.result),
            };
            self.running[worker] = Some(handle);
            return Some(job);
        }
        None
    }

    /// RUNNING to SUCCEEDED/FAILED: give the slabs back to the record, queue it
    /// for the drain and resolve its successors.
    ///
    /// A job whose record was reclaimed while it ran (shutdown) is ignored.
    pub fn finish(
        &mut self,
        worker: usize,
        handle: JobHandle,
        params: Box<[u8]>,
        result: Vec<u8>,
        outcome: Outcome,
    ) -> Wakeups {
        if self.running.get(worker).copied().flatten() == Some(handle) {
            self.running[worker] = None;
        }
        let Some(record) = self.table.get_mut(handle) else {
            return Wakeups::default();
        };
        record.params = params;
        record.result = result;
        match outcome {
            Outcome::Succeeded => record.state = JobState::Succeeded,
            Outcome::Failed(failure) => {
                record.state = JobState::Failed;
                record.failure = Some(failure);
            }
        }
        self.completions.push_back(handle);
        self.resolve_dependents(handle)
    }

    /// Walk the reverse-dependency index from a finished job. A failure
    /// cascades transitively; a success readies successors whose last
    /// predecessor just resolved.
    fn resolve_dependents(&mut self, finished: JobHandle) -> Wakeups {
        let mut wakeups = Wakeups::default();
        let mut stack = vec![finished];

        while let Some(pred) = stack.pop() {
            let Some(record) = self.table.get_mut(pred) else {
                continue;
            };
            let failed = record.state == JobState::Failed;
            let dependents = mem::take(&mut record.dependents);

            for succ in dependents {
                let Some(record) = self.table.get_mut(succ) else {
                    continue;
                };
                if record.state != JobState::Pending {
                    continue;
                }
                record.unresolved = record.unresolved.saturating_sub(1);
                if failed {
                    record.state = JobState::Failed;
                    record.failure = Some(FailureKind::Cascade { predecessor: pred });
                    self.completions.push_back(succ);
                    wakeups.cascaded += 1;
                    stack.push(succ);
                } else if record.unresolved == 0 {
                    if let Some(worker) = self.make_ready(succ) {
                        wakeups.workers.push(worker);
                    }
                }
            }
        }
        wakeups
    }

    /// Pop up to `budget` finished jobs for the main thread, taking their
    /// callback and result slab. Records stay live until [`Self::release`].
    pub fn take_completions(&mut self, budget: usize) -> Vec<DrainItem> {
        let mut items = Vec::with_capacity(budget.min(self.completions.len()));
        while items.len() < budget {
            let Some(handle) = self.completions.pop_front() else {
                break;
            };
            let Some(record) = self.table.get_mut(handle) else {
                continue;
            };
            let callback = if record.state == JobState::Succeeded {
                record.on_success.take()
            } else {
                record.on_fail.take()
            };
            items.push(DrainItem {
                handle,
                job_type: record.job_type,
                failure: record.failure.take(),
                result: mem::take(&mut record.result),
                callback,
            });
        }
        items
    }

    /// Return a drained record to the pool.
    pub fn release(&mut self, handle: JobHandle) -> bool {
        self.table.release(handle).is_some()
    }

    /// Stop admitting jobs. Called first thing during shutdown.
    pub fn close(&mut self) {
        self.accepting = false;
    }

    /// Free every live record without running callbacks. Returns how many were
    /// reclaimed.
    pub fn reclaim_all(&mut self) -> usize {
        for queues in &mut self.queues {
            queues.drain_all();
        }
        self.completions.clear();
        self.running.iter_mut().for_each(|slot| *slot = None);

        let live = self.table.live_handles();
        live.into_iter()
            .filter(|handle| self.table.release(*handle).is_some())
            .count()
    }

    pub fn queued(&self) -> usize {
        self.queues.iter().map(WorkerQueues::len).sum()
    }

    pub fn overflowed(&self) -> usize {
        self.queues.iter().map(WorkerQueues::overflow_len).sum()
    }

    pub fn running(&self) -> usize {
        self.running.iter().flatten().count()
    }

    pub fn awaiting_drain(&self) -> usize {
        self.completions.len()
    }

    /// Worker currently executing `handle`, if any.
    #[cfg(test)]
    pub fn running_on(&self, handle: JobHandle) -> Option<usize> {
        self.running.iter().position(|slot| *slot == Some(handle))
    }
}

//! Job record pool and dependency table.
//!
//! Records live in a dense, fixed-capacity pool with a free list of slots. A
//! sparse table maps each 16-bit job id to its slot, and a per-id generation
//! counter is bumped every time an id is drained, so a stale handle can never
//! be confused with the job that later reuses its id.
//!
//! The reverse-dependency index is kept on the predecessor's record
//! (`dependents`), which makes waking successors a walk over one short list.

use super::job::{
    CompletionFn, FailureKind, JobEntry, JobHandle, JobPriority, JobSpec, JobState, JobType,
};

const ID_SPACE: usize = 1 << 16;

/// One job, owned by the pool from submit until drain.
pub(crate) struct JobRecord {
    pub handle: JobHandle,
    pub job_type: JobType,
    pub priority: JobPriority,
    pub state: JobState,
    /// Worker chosen at submit time.
    pub worker: usize,
    /// Taken by the worker at dispatch; `None` afterwards.
    pub entry: Option<JobEntry>,
    pub on_success: Option<CompletionFn>,
    pub on_fail: Option<CompletionFn>,
    /// Moved to the worker while RUNNING and handed back on completion.
    pub params: Box<[u8]>,
    pub result: Vec<u8>,
    pub deps: Vec<JobHandle>,
    /// Predecessors that have not finished yet.
    pub unresolved: usize,
    /// Successors waiting on this job.
    pub dependents: Vec<JobHandle>,
    pub failure: Option<FailureKind>,
}

/// How a recorded dependency currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DependencyStatus {
    /// Succeeded, already drained, or never issued under that generation.
    Resolved,
    /// Finished as FAILED and not yet drained.
    Failed,
    /// Still pending, queued or running.
    Outstanding,
}

pub(crate) struct JobTable {
    records: Vec<Option<JobRecord>>,
    free_slots: Vec<u32>,
    slot_of: Box<[Option<u32>]>,
    generations: Box<[u32]>,
    next_id: u16,
}

impl JobTable {
    /// Pool with room for `capacity` live jobs (at most 65536).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, ID_SPACE);
        let mut records = Vec::with_capacity(capacity);
        records.resize_with(capacity, || None);
        // Reversed so slot 0 is handed out first.
        #[allow(clippy::cast_possible_truncation)]
        let free_slots = (0..capacity as u32).rev().collect();

        Self {
            records,
            free_slots,
            slot_of: vec![None; ID_SPACE].into_boxed_slice(),
            generations: vec![0; ID_SPACE].into_boxed_slice(),
            next_id: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.records.len()
    }

    pub fn free_count(&self) -> usize {
        self.free_slots.len()
    }

    /// Create a record for `spec`, targeted at `worker`. Dependencies are copied
    /// but not yet resolved; the record starts PENDING with no unresolved count.
    ///
    /// Hands the spec back when the pool is exhausted.
    pub fn allocate(&mut self, spec: JobSpec, worker: usize) -> Result<JobHandle, JobSpec> {
        let Some(slot) = self.free_slots.pop() else {
            return Err(spec);
        };
        let id = self.next_free_id();
        let handle = JobHandle {
            id,
            generation: self.generations[usize::from(id)],
        };

        let JobSpec {
            entry,
            on_success,
            on_fail,
            params,
            result_size,
            job_type,
            priority,
            deps,
        } = spec;

        self.slot_of[usize::from(id)] = Some(slot);
        self.records[slot as usize] = Some(JobRecord {
            handle,
            job_type,
            priority,
            state: JobState::Pending,
            worker,
            entry: Some(entry),
            on_success,
            on_fail,
            params: params.into_boxed_slice(),
            result: vec![0; result_size],
            deps,
            unresolved: 0,
            dependents: Vec::new(),
            failure: None,
        });
        Ok(handle)
    }

    /// Next id in rolling order that no live job holds.
    fn next_free_id(&mut self) -> u16 {
        loop {
            let id = self.next_id;
            self.next_id = self.next_id.wrapping_add(1);
            if self.slot_of[usize::from(id)].is_none() {
                return id;
            }
        }
    }

    fn slot(&self, handle: JobHandle) -> Option<usize> {
        let id = usize::from(handle.id);
        if self.generations[id] != handle.generation {
            return None;
        }
        self.slot_of[id].map(|slot| slot as usize)
    }

    pub fn get(&self, handle: JobHandle) -> Option<&JobRecord> {
        let slot = self.slot(handle)?;
        self.records[slot].as_ref()
    }

    pub fn get_mut(&mut self, handle: JobHandle) -> Option<&mut JobRecord> {
        let slot = self.slot(handle)?;
        self.records[slot].as_mut()
    }

    /// Whether `dep` still blocks a successor submitted now.
    pub fn dependency_status(&self, dep: JobHandle) -> DependencyStatus {
        match self.get(dep).map(|record| record.state) {
            Some(JobState::Succeeded | JobState::Drained) | None => DependencyStatus::Resolved,
            Some(JobState::Failed) => DependencyStatus::Failed,
            Some(JobState::Pending | JobState::Ready | JobState::Running) => {
                DependencyStatus::Outstanding
            }
        }
    }

    /// Remove the record, return its slot and id to the pool and bump the id's
    /// generation.
    pub fn release(&mut self, handle: JobHandle) -> Option<JobRecord> {
        let slot = self.slot(handle)?;
        let mut record = self.records[slot].take()?;
        let id = usize::from(handle.id);
        self.slot_of[id] = None;
        self.generations[id] = self.generations[id].wrapping_add(1);
        #[allow(clippy::cast_possible_truncation)]
        self.free_slots.push(slot as u32);
        record.state = JobState::Drained;
        Some(record)
    }

    /// True once the job finished, including after it was drained and its id's
    /// generation moved on.
    pub fn is_complete(&self, handle: JobHandle) -> bool {
        let id = usize::from(handle.id);
        if handle.generation < self.generations[id] {
            return true;
        }
        self.get(handle)
            .is_some_and(|record| record.state.is_finished())
    }

    /// Current generation of `id`.
    #[cfg(test)]
    pub fn generation(&self, id: u16) -> u32 {
        self.generations[usize::from(id)]
    }

    /// Handles of every live record, in slot order.
    pub fn live_handles(&self) -> Vec<JobHandle> {
        self.records
            .iter()
            .flatten()
            .map(|record| record.handle)
            .collect()
    }

    /// Count live records in `state`.
    pub fn count_in(&self, state: JobState) -> usize {
        self.records
            .iter()
            .flatten()
            .filter(|record| record.state == state)
            .count()
    }
}

//! Scheduling core: job records, per-worker queues, workers and the
//! main-thread drain.

pub mod error;
pub mod job;
pub mod job_system;
pub mod ring;

mod dispatcher;
mod scheduler;
mod table;
mod worker;

pub use error::{AppResult, JobError};
pub use job::{
    Completion, CompletionFn, FailureKind, JobEntry, JobHandle, JobPriority, JobSpec, JobState,
    JobType, JobTypeMask,
};
pub use job_system::{JobStats, JobSystem};
pub use ring::RingQueue;
pub use worker::spawn_named;

//! Configuration for the job system.

pub mod job_system;

pub use job_system::{
    assign_type_masks, worker_count_for, JobSystemConfig, MAX_POOL_CAPACITY, MAX_WORKERS,
};

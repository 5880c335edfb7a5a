//! Error types for scheduler operations.

use thiserror::Error;

use super::job::JobType;

/// Errors produced by the job system.
///
/// Job-level failures (an entry returning an error, a cascade from a failed
/// predecessor) are not errors of this type: they are delivered to the job's
/// `on_fail` callback on the main thread.
#[derive(Debug, Error)]
pub enum JobError {
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The record pool has no free slot; retry next frame.
    #[error("job pool exhausted")]
    PoolExhausted,
    /// No worker's type-mask admits this job type.
    #[error("no worker accepts {job_type:?} jobs")]
    QueueUnavailable {
        /// Rejected job type.
        job_type: JobType,
    },
    /// The scheduler has been shut down.
    #[error("job system has been shut down")]
    Shutdown,
    /// A worker thread could not be created.
    #[error("failed to spawn worker thread: {0}")]
    ThreadSpawn(String),
    /// Job parameters could not be encoded.
    #[error("failed to encode job payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Result type for entry functions; entries use `?` and `anyhow` context freely.
pub type AppResult<T> = Result<T, anyhow::Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(JobError::PoolExhausted.to_string(), "job pool exhausted");
        assert_eq!(
            JobError::QueueUnavailable { job_type: JobType::GpuResource }.to_string(),
            "no worker accepts GpuResource jobs"
        );
        assert_eq!(
            JobError::InvalidConfig("worker_count must be <= 15".into()).to_string(),
            "invalid configuration: worker_count must be <= 15"
        );
    }

    #[test]
    fn test_payload_error_from_serde() {
        let err: JobError = serde_json::from_str::<u32>("\"x\"").unwrap_err().into();
        assert!(matches!(err, JobError::Payload(_)));
        assert!(err.to_string().starts_with("failed to encode job payload: "));
    }
}

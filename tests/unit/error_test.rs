//! Tests for error types

use engine_jobs::core::{FailureKind, JobError, JobHandle, JobType};

#[test]
fn test_pool_exhausted_error() {
    let err = JobError::PoolExhausted;
    assert_eq!(format!("{}", err), "job pool exhausted");
}

#[test]
fn test_queue_unavailable_error() {
    let err = JobError::QueueUnavailable {
        job_type: JobType::ResourceLoad,
    };
    assert_eq!(format!("{}", err), "no worker accepts ResourceLoad jobs");
}

#[test]
fn test_shutdown_error() {
    assert_eq!(format!("{}", JobError::Shutdown), "job system has been shut down");
}

#[test]
fn test_thread_spawn_error() {
    let err = JobError::ThreadSpawn("resource temporarily unavailable".to_string());
    assert_eq!(
        format!("{}", err),
        "failed to spawn worker thread: resource temporarily unavailable"
    );
}

#[test]
fn test_failure_kind_display() {
    let predecessor = JobHandle { id: 3, generation: 1 };
    assert_eq!(
        FailureKind::Cascade { predecessor }.to_string(),
        "predecessor job#3.1 failed"
    );
    assert_eq!(
        FailureKind::EntryFailed("bad header".into()).to_string(),
        "entry failed: bad header"
    );
    assert_eq!(
        FailureKind::Panicked("index out of bounds".into()).to_string(),
        "entry panicked: index out of bounds"
    );
}

#[test]
fn test_job_error_into_anyhow() {
    fn submit_like() -> engine_jobs::core::AppResult<()> {
        Err(JobError::PoolExhausted.into())
    }
    let err = submit_like().unwrap_err();
    assert!(err.downcast_ref::<JobError>().is_some());
}

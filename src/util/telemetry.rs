//! Telemetry helpers for structured logging and tracing.

/// Initialize tracing. Hosts can install their own subscriber; this helper
/// installs a default env-filtered fmt subscriber (`RUST_LOG`) if none is set.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_thread_names(true)
        .try_init();
}

/// Like [`init_tracing`] but with an explicit filter directive such as
/// `"engine_jobs=debug"`, for tests and tools that do not read `RUST_LOG`.
pub fn init_tracing_with(directive: &str) {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(directive))
        .with_thread_names(true)
        .with_test_writer()
        .try_init();
}

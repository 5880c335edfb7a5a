//! Worker threads.
//!
//! Each worker blocks on its own semaphore, pops the highest-priority ready job
//! from its queues under the scheduler lock, runs the entry with the lock
//! released, then re-takes the lock to record the outcome and wake successors.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use tracing::{debug, warn};

use crate::Signal;

use super::job::FailureKind;
use super::job_system::Shared;
use super::scheduler::{Outcome, RunningJob};

/// Spawn a named OS thread with an explicit stack size.
///
/// # Errors
///
/// Returns the OS error if the thread could not be created.
pub fn spawn_named<F>(name: String, stack_size: usize, body: F) -> io::Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new().name(name).stack_size(stack_size).spawn(body)
}

/// Start worker `worker_id`. It sets `ready` once it is in its loop and sends
/// its id on `exited` when it leaves.
pub(crate) fn spawn_worker(
    worker_id: usize,
    name: String,
    stack_size: usize,
    shared: Arc<Shared>,
    ready: Arc<Signal>,
    exited: Sender<usize>,
) -> io::Result<JoinHandle<()>> {
    spawn_named(name, stack_size, move || {
        debug!(worker_id, "Worker thread started");
        ready.set();
        run_worker(worker_id, &shared);
        debug!(worker_id, "Worker thread exiting");
        let _ = exited.send(worker_id);
    })
}

fn run_worker(worker_id: usize, shared: &Shared) {
    loop {
        shared.wakeups[worker_id].acquire();
        if shared.quit.load(Ordering::Acquire) {
            break;
        }

        let Some(job) = shared.state.lock().begin(worker_id) else {
            continue;
        };
        let RunningJob {
            handle,
            job_type,
            entry,
            params,
            mut result,
        } = job;

        debug!(worker_id, job = %handle, ?job_type, "Worker executing job");
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| entry(&params, &mut result))) {
            Ok(Ok(())) => Outcome::Succeeded,
            Ok(Err(err)) => {
                let message = format!("{err:#}");
                warn!(worker_id, job = %handle, error = %message, "Job entry failed");
                Outcome::Failed(FailureKind::EntryFailed(message))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(worker_id, job = %handle, panic = %message, "Job entry panicked");
                Outcome::Failed(FailureKind::Panicked(message))
            }
        };
        let failed = matches!(outcome, Outcome::Failed(_));

        let wakeups = shared
            .state
            .lock()
            .finish(worker_id, handle, params, result, outcome);

        if failed {
            shared.counters.failed.fetch_add(1, Ordering::Relaxed);
        } else {
            shared.counters.succeeded.fetch_add(1, Ordering::Relaxed);
        }
        shared
            .counters
            .cascaded
            .fetch_add(wakeups.cascaded, Ordering::Relaxed);
        for worker in wakeups.workers {
            shared.wakeups[worker].release();
        }
        debug!(worker_id, job = %handle, failed, "Worker completed job");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

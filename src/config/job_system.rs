//! Job system configuration and the worker type-mask policy.

use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{JobType, JobTypeMask};
use crate::util::platform::{available_threads, RendererProbe};

/// Hard ceiling on worker threads.
pub const MAX_WORKERS: usize = 15;
/// Largest record pool a 16-bit id space can address while keeping one id spare.
pub const MAX_POOL_CAPACITY: usize = u16::MAX as usize;

const DEFAULT_POOL_CAPACITY: usize = 4096;
const DEFAULT_QUEUE_CAPACITY: usize = 256;
const DEFAULT_DRAIN_BUDGET: usize = 128;
const DEFAULT_STACK_SIZE: usize = 2 * 1024 * 1024;
const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 2000;
const DEFAULT_THREAD_PREFIX: &str = "job-worker";

const ENV_PREFIX: &str = "ENGINE_JOBS_";

/// Worker threads for a host with `cores` logical processors: one is left for
/// the main thread, clamped to `1..=15`.
#[must_use]
pub fn worker_count_for(cores: usize) -> usize {
    cores.saturating_sub(1).clamp(1, MAX_WORKERS)
}

/// Type-mask for each of `thread_count` workers.
///
/// With three or more workers, worker 0 takes only GPU jobs and worker 1 only
/// resource loads; the rest are general. Two workers split the specialised
/// types and both take general work. With one worker, or when the renderer
/// cannot accept uploads from a worker thread, worker 0 takes every type and
/// any other worker takes general work only.
#[must_use]
pub fn assign_type_masks(thread_count: usize, renderer_multithreaded: bool) -> Vec<JobTypeMask> {
    let thread_count = thread_count.max(1);
    let mut masks = vec![JobTypeMask::GENERAL; thread_count];

    if thread_count == 1 || !renderer_multithreaded {
        masks[0] = JobTypeMask::ALL;
    } else if thread_count == 2 {
        masks[0] = JobTypeMask::GPU_RESOURCE | JobTypeMask::GENERAL;
        masks[1] = JobTypeMask::RESOURCE_LOAD | JobTypeMask::GENERAL;
    } else {
        masks[0] = JobTypeMask::GPU_RESOURCE;
        masks[1] = JobTypeMask::RESOURCE_LOAD;
    }
    masks
}

/// Configuration for [`crate::core::JobSystem`].
///
/// `type_masks` has one entry per worker; the `with_type_masks` builder keeps
/// `worker_count` in step with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobSystemConfig {
    /// Worker threads, `1..=15`.
    pub worker_count: usize,
    /// Job types each worker admits.
    pub type_masks: Vec<JobTypeMask>,
    /// Live job records.
    pub pool_capacity: usize,
    /// Ring capacity of each priority band on each worker.
    pub queue_capacity: usize,
    /// Completions drained per `tick`.
    pub drain_budget: usize,
    /// Worker thread stack size in bytes.
    pub thread_stack_size: usize,
    /// How long shutdown waits for each worker before detaching it.
    pub shutdown_timeout_ms: u64,
    /// Worker threads are named `<prefix>-<index>`.
    pub thread_name_prefix: String,
}

impl Default for JobSystemConfig {
    fn default() -> Self {
        let worker_count = worker_count_for(available_threads());
        Self {
            worker_count,
            type_masks: assign_type_masks(worker_count, true),
            pool_capacity: DEFAULT_POOL_CAPACITY,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            drain_budget: DEFAULT_DRAIN_BUDGET,
            thread_stack_size: DEFAULT_STACK_SIZE,
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
            thread_name_prefix: DEFAULT_THREAD_PREFIX.to_string(),
        }
    }
}

impl JobSystemConfig {
    /// Defaults sized to this host, assuming a multi-threaded renderer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults sized to this host and to what `renderer` supports.
    #[must_use]
    pub fn for_host(renderer: &dyn RendererProbe) -> Self {
        Self::new().with_worker_count_for(
            worker_count_for(available_threads()),
            renderer.supports_multithreaded_upload(),
        )
    }

    /// Set the worker count and derive masks with [`assign_type_masks`].
    #[must_use]
    pub fn with_worker_count(self, worker_count: usize) -> Self {
        self.with_worker_count_for(worker_count, true)
    }

    /// Set the worker count and derive masks for the given renderer capability.
    #[must_use]
    pub fn with_worker_count_for(mut self, worker_count: usize, renderer_multithreaded: bool) -> Self {
        self.worker_count = worker_count;
        self.type_masks = assign_type_masks(worker_count, renderer_multithreaded);
        self
    }

    /// Use explicit per-worker masks. The worker count follows the list length.
    #[must_use]
    pub fn with_type_masks(mut self, type_masks: Vec<JobTypeMask>) -> Self {
        self.worker_count = type_masks.len();
        self.type_masks = type_masks;
        self
    }

    /// Set the record pool capacity.
    #[must_use]
    pub fn with_pool_capacity(mut self, pool_capacity: usize) -> Self {
        self.pool_capacity = pool_capacity;
        self
    }

    /// Set the per-band ring capacity.
    #[must_use]
    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    /// Set how many completions one `tick` drains.
    #[must_use]
    pub fn with_drain_budget(mut self, drain_budget: usize) -> Self {
        self.drain_budget = drain_budget;
        self
    }

    /// Set the worker stack size in bytes.
    #[must_use]
    pub fn with_thread_stack_size(mut self, thread_stack_size: usize) -> Self {
        self.thread_stack_size = thread_stack_size;
        self
    }

    /// Set the per-worker shutdown timeout.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the worker thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Per-worker shutdown timeout.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 || self.worker_count > MAX_WORKERS {
            return Err(format!(
                "worker_count must be between 1 and {MAX_WORKERS}, got {}",
                self.worker_count
            ));
        }
        if self.type_masks.len() != self.worker_count {
            return Err(format!(
                "type_masks has {} entries for {} workers",
                self.type_masks.len(),
                self.worker_count
            ));
        }
        if let Some(worker) = self.type_masks.iter().position(|mask| mask.is_empty()) {
            return Err(format!("worker {worker} admits no job type"));
        }
        for job_type in JobType::ALL {
            if !self.type_masks.iter().any(|mask| mask.admits(job_type)) {
                return Err(format!("no worker admits {job_type:?} jobs"));
            }
        }
        if self.pool_capacity == 0 || self.pool_capacity > MAX_POOL_CAPACITY {
            return Err(format!(
                "pool_capacity must be between 1 and {MAX_POOL_CAPACITY}, got {}",
                self.pool_capacity
            ));
        }
        if self.queue_capacity == 0 {
            return Err("queue_capacity must be greater than 0".into());
        }
        if self.drain_budget == 0 {
            return Err("drain_budget must be greater than 0".into());
        }
        if self.thread_name_prefix.is_empty() {
            return Err("thread_name_prefix must not be empty".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// Missing fields take their defaults. When `worker_count` is given without
    /// `type_masks`, masks are derived with [`assign_type_masks`].
    ///
    /// # Errors
    ///
    /// Returns a parse or validation message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let value: serde_json::Value =
            serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        let has_masks = value.get("type_masks").is_some();
        let mut cfg: Self =
            serde_json::from_value(value).map_err(|e| format!("parse error: {e}"))?;
        if !has_masks {
            cfg.type_masks = assign_type_masks(cfg.worker_count, true);
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Host defaults with `ENGINE_JOBS_*` overrides from the process
    /// environment, after loading a `.env` file if one is present.
    ///
    /// # Errors
    ///
    /// Returns a message if a variable does not parse or the result is invalid.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like [`JobSystemConfig::from_env`] but reads overrides from a specific
    /// dotenv file. Variables already set in the process environment win.
    ///
    /// # Errors
    ///
    /// Returns a message if the file cannot be read, a variable does not parse,
    /// or the result is invalid.
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        let iter = dotenvy::from_path_iter(path)
            .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
        let mut file_vars = HashMap::new();
        for item in iter {
            let (key, value) = item.map_err(|e| format!("{}: {e}", path.display()))?;
            file_vars.insert(key, value);
        }
        Self::from_lookup(|key| env::var(key).ok().or_else(|| file_vars.get(key).cloned()))
    }

    /// Apply `ENGINE_JOBS_*` overrides resolved through `lookup`.
    ///
    /// Recognised keys: `WORKER_COUNT`, `RENDERER_MULTITHREADED`,
    /// `POOL_CAPACITY`, `QUEUE_CAPACITY`, `DRAIN_BUDGET`, `THREAD_STACK_SIZE`,
    /// `SHUTDOWN_TIMEOUT_MS`, `THREAD_NAME_PREFIX`.
    ///
    /// # Errors
    ///
    /// Returns a message if a variable does not parse or the result is invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        let multithreaded = match var("RENDERER_MULTITHREADED") {
            Some(value) => parse_bool("RENDERER_MULTITHREADED", &value)?,
            None => true,
        };
        let worker_count = match var("WORKER_COUNT") {
            Some(value) => parse_number("WORKER_COUNT", &value)?,
            None => worker_count_for(available_threads()),
        };

        let mut cfg = Self::new().with_worker_count_for(worker_count, multithreaded);
        if let Some(value) = var("POOL_CAPACITY") {
            cfg.pool_capacity = parse_number("POOL_CAPACITY", &value)?;
        }
        if let Some(value) = var("QUEUE_CAPACITY") {
            cfg.queue_capacity = parse_number("QUEUE_CAPACITY", &value)?;
        }
        if let Some(value) = var("DRAIN_BUDGET") {
            cfg.drain_budget = parse_number("DRAIN_BUDGET", &value)?;
        }
        if let Some(value) = var("THREAD_STACK_SIZE") {
            cfg.thread_stack_size = parse_number("THREAD_STACK_SIZE", &value)?;
        }
        if let Some(value) = var("SHUTDOWN_TIMEOUT_MS") {
            cfg.shutdown_timeout_ms = parse_number("SHUTDOWN_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = var("THREAD_NAME_PREFIX") {
            cfg.thread_name_prefix = value;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("{ENV_PREFIX}{name}: expected a number, got `{value}`"))
}

fn parse_bool(name: &str, value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(format!("{ENV_PREFIX}{name}: expected a boolean, got `{value}`")),
    }
}

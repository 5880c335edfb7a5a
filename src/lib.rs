//! # Engine Jobs
//!
//! A multi-threaded job system for a game engine frame loop, with a
//! cooperating resource-load pipeline.
//!
//! Work is submitted as typed jobs. Each worker thread admits a fixed set of
//! job types (its type-mask), derived from the processor count and from whether
//! the renderer accepts GPU uploads off its own thread. Jobs carry a priority
//! band, may depend on other jobs, and report back through completion callbacks
//! that run only on the main thread, inside [`core::JobSystem::tick`].
//!
//! ## Key Features
//!
//! - **Typed worker affinity**: GPU uploads and blocking resource loads get
//!   dedicated workers once there are enough cores
//! - **Strict priority bands**: HIGH drains before NORMAL before LOW, FIFO
//!   within a band, with bounded rings that spill into overflow lists
//! - **Dependencies**: a job starts only after every predecessor finished; a
//!   failed predecessor fails its successors transitively
//! - **Deterministic callbacks**: `on_success`/`on_fail` run serially on the
//!   main thread, so they may touch non-thread-safe engine state
//! - **Generational handles**: 16-bit ids are reused, generations keep stale
//!   handles from matching new jobs
//!
//! ```rust,ignore
//! use engine_jobs::config::JobSystemConfig;
//! use engine_jobs::core::{JobPriority, JobSystem};
//! use engine_jobs::resource::{FileResourceLoader, ResourceKind, ResourcePipeline};
//! use engine_jobs::util::StaticRenderer;
//! use std::sync::Arc;
//!
//! let jobs = JobSystem::new(JobSystemConfig::for_host(&StaticRenderer::MULTITHREADED))?;
//! let pipeline = ResourcePipeline::new(Arc::new(FileResourceLoader::new("assets")), uploader);
//!
//! pipeline.request(&jobs, "textures/stone.png", ResourceKind::Texture, JobPriority::High)?;
//!
//! loop {
//!     // ... frame work ...
//!     jobs.tick();
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Job scheduling: records, queues, workers and the main-thread drain.
pub mod core;
/// Configuration and the worker type-mask policy.
pub mod config;
/// Two-phase resource loading on top of the job system.
pub mod resource;
/// Shared utilities.
pub mod util;

mod condvar;
mod mutex;
mod semaphore;
mod signal;

pub use condvar::Condvar;
pub use mutex::{Mutex, MutexGuard};
pub use semaphore::Semaphore;
pub use signal::Signal;

//! Shared utilities: logging setup and host probes.

pub mod platform;
pub mod telemetry;

pub use platform::{available_threads, RendererProbe, StaticRenderer};
pub use telemetry::{init_tracing, init_tracing_with};

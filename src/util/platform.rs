//! Host probes used to size the worker pool.

/// Logical processors available to this process, at least one.
#[must_use]
pub fn available_threads() -> usize {
    num_cpus::get().max(1)
}

/// What the renderer allows from worker threads.
pub trait RendererProbe {
    /// Whether GPU resources may be created from a thread other than the one
    /// that owns the rendering context.
    fn supports_multithreaded_upload(&self) -> bool;
}

/// A renderer probe with a fixed answer, for hosts that know their backend up
/// front and for tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticRenderer {
    multithreaded: bool,
}

impl StaticRenderer {
    /// Renderer that accepts uploads from any thread.
    pub const MULTITHREADED: Self = Self { multithreaded: true };
    /// Renderer bound to a single thread.
    pub const SINGLE_THREADED: Self = Self { multithreaded: false };

    /// Probe with the given answer.
    #[must_use]
    pub const fn new(multithreaded: bool) -> Self {
        Self { multithreaded }
    }
}

impl RendererProbe for StaticRenderer {
    fn supports_multithreaded_upload(&self) -> bool {
        self.multithreaded
    }
}

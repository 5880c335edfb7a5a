//! Tests for host probes and telemetry setup

use engine_jobs::config::{worker_count_for, JobSystemConfig};
use engine_jobs::util::{available_threads, init_tracing, RendererProbe, StaticRenderer};

struct VulkanProbe {
    queue_families: u32,
}

impl RendererProbe for VulkanProbe {
    fn supports_multithreaded_upload(&self) -> bool {
        self.queue_families > 1
    }
}

#[test]
fn test_available_threads_sizes_default_config() {
    let threads = available_threads();
    assert!(threads >= 1);
    assert_eq!(JobSystemConfig::new().worker_count, worker_count_for(threads));
}

#[test]
fn test_custom_renderer_probe() {
    let cfg = JobSystemConfig::for_host(&VulkanProbe { queue_families: 1 });
    assert!(!cfg.type_masks[0].is_exclusive());
    assert!(cfg.validate().is_ok());

    let multi = JobSystemConfig::for_host(&VulkanProbe { queue_families: 3 });
    assert!(multi.validate().is_ok());
    assert_eq!(multi.worker_count, JobSystemConfig::for_host(&StaticRenderer::MULTITHREADED).worker_count);
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
}

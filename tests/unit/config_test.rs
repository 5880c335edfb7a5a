//! Tests for configuration validation and loading

use engine_jobs::config::{assign_type_masks, JobSystemConfig, MAX_WORKERS};
use engine_jobs::core::JobTypeMask;
use engine_jobs::util::StaticRenderer;
use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

#[test]
fn test_config_builder() {
    let cfg = JobSystemConfig::new()
        .with_worker_count(5)
        .with_pool_capacity(1024)
        .with_queue_capacity(32)
        .with_drain_budget(16)
        .with_thread_stack_size(512 * 1024)
        .with_shutdown_timeout(Duration::from_millis(750))
        .with_thread_name_prefix("render-job");

    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.worker_count, 5);
    assert_eq!(cfg.type_masks, assign_type_masks(5, true));
    assert_eq!(cfg.shutdown_timeout_ms, 750);
    assert_eq!(cfg.thread_name_prefix, "render-job");
}

#[test]
fn test_config_invalid_worker_count() {
    assert!(JobSystemConfig::new().with_worker_count(0).validate().is_err());
    assert!(JobSystemConfig::new()
        .with_worker_count(MAX_WORKERS + 1)
        .validate()
        .is_err());
    assert!(JobSystemConfig::new().with_worker_count(MAX_WORKERS).validate().is_ok());
}

#[test]
fn test_config_invalid_capacities() {
    assert!(JobSystemConfig::new().with_pool_capacity(0).validate().is_err());
    assert!(JobSystemConfig::new().with_pool_capacity(70_000).validate().is_err());
    assert!(JobSystemConfig::new().with_queue_capacity(0).validate().is_err());
    assert!(JobSystemConfig::new().with_drain_budget(0).validate().is_err());
}

#[test]
fn test_config_empty_mask_rejected() {
    let cfg = JobSystemConfig::new().with_type_masks(vec![JobTypeMask::ALL, JobTypeMask::EMPTY]);
    let err = cfg.validate().unwrap_err();
    assert!(err.contains("worker 1"), "{err}");
}

#[test]
fn test_for_host_single_threaded_renderer() {
    let cfg = JobSystemConfig::for_host(&StaticRenderer::SINGLE_THREADED);
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.type_masks[0], JobTypeMask::ALL);
    assert!(cfg.type_masks[1..].iter().all(|m| *m == JobTypeMask::GENERAL));
}

#[test]
fn test_config_from_json() {
    let json = r#"{
        "worker_count": 3,
        "pool_capacity": 512,
        "thread_name_prefix": "jobs"
    }"#;
    let cfg = JobSystemConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.worker_count, 3);
    assert_eq!(cfg.type_masks, assign_type_masks(3, true));
    assert_eq!(cfg.pool_capacity, 512);
    assert_eq!(cfg.queue_capacity, 256);
}

#[test]
fn test_config_from_json_explicit_masks() {
    let json = r#"{
        "worker_count": 2,
        "type_masks": [["gpu_resource", "resource_load"], ["general"]]
    }"#;
    let cfg = JobSystemConfig::from_json_str(json).unwrap();
    assert_eq!(
        cfg.type_masks[0],
        JobTypeMask::GPU_RESOURCE | JobTypeMask::RESOURCE_LOAD
    );
    assert_eq!(cfg.type_masks[1], JobTypeMask::GENERAL);
}

#[test]
fn test_config_from_json_invalid() {
    assert!(JobSystemConfig::from_json_str("{ not json").unwrap_err().starts_with("parse error"));
    let err = JobSystemConfig::from_json_str(r#"{ "worker_count": 1, "type_masks": [["general"]] }"#)
        .unwrap_err();
    assert!(err.contains("ResourceLoad"), "{err}");
}

#[test]
fn test_config_from_lookup() {
    let vars: HashMap<&str, &str> = [
        ("ENGINE_JOBS_WORKER_COUNT", "2"),
        ("ENGINE_JOBS_RENDERER_MULTITHREADED", "false"),
        ("ENGINE_JOBS_QUEUE_CAPACITY", "64"),
        ("ENGINE_JOBS_SHUTDOWN_TIMEOUT_MS", "100"),
    ]
    .into_iter()
    .collect();
    let cfg = JobSystemConfig::from_lookup(|key| vars.get(key).map(|v| (*v).to_string())).unwrap();

    assert_eq!(cfg.worker_count, 2);
    assert_eq!(cfg.type_masks, vec![JobTypeMask::ALL, JobTypeMask::GENERAL]);
    assert_eq!(cfg.queue_capacity, 64);
    assert_eq!(cfg.shutdown_timeout(), Duration::from_millis(100));
}

#[test]
fn test_config_from_lookup_bad_number() {
    let err = JobSystemConfig::from_lookup(|key| {
        (key == "ENGINE_JOBS_POOL_CAPACITY").then(|| "lots".to_string())
    })
    .unwrap_err();
    assert!(err.contains("ENGINE_JOBS_POOL_CAPACITY"), "{err}");
}

#[test]
fn test_config_from_env_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "ENGINE_JOBS_POOL_CAPACITY=2048").unwrap();
    writeln!(file, "ENGINE_JOBS_DRAIN_BUDGET=32").unwrap();
    writeln!(file, "ENGINE_JOBS_THREAD_NAME_PREFIX=frame-job").unwrap();

    let cfg = JobSystemConfig::from_env_file(file.path()).unwrap();
    assert_eq!(cfg.pool_capacity, 2048);
    assert_eq!(cfg.drain_budget, 32);
    assert_eq!(cfg.thread_name_prefix, "frame-job");
}

#[test]
fn test_config_json_roundtrip_keeps_masks_readable() {
    let cfg = JobSystemConfig::new().with_worker_count(3);
    let json = serde_json::to_string(&cfg).unwrap();
    assert!(json.contains(r#"["gpu_resource"]"#), "{json}");
    assert_eq!(JobSystemConfig::from_json_str(&json).unwrap(), cfg);
}

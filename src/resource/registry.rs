//! Main-thread view of every requested resource.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::Mutex;

use super::GpuResourceId;

/// Where a requested resource is in the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "detail")]
pub enum ResourceState {
    /// Load job submitted or running.
    Loading,
    /// Loaded; upload job submitted or running.
    Uploading,
    /// Uploaded and usable.
    Ready(GpuResourceId),
    /// Load or upload failed, with the reason.
    Failed(String),
}

/// Resource name to pipeline state.
///
/// Written from completion callbacks on the main thread and read by the host
/// from anywhere.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    states: Mutex<HashMap<String, ResourceState>>,
}

impl ResourceRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of `name`, if it was ever requested.
    #[must_use]
    pub fn state(&self, name: &str) -> Option<ResourceState> {
        self.states.lock().get(name).cloned()
    }

    /// GPU id of `name` once it is ready.
    #[must_use]
    pub fn gpu_id(&self, name: &str) -> Option<GpuResourceId> {
        match self.state(name)? {
            ResourceState::Ready(id) => Some(id),
            _ => None,
        }
    }

    /// Record that a load was requested.
    pub fn mark_loading(&self, name: &str) {
        self.set(name, ResourceState::Loading);
    }

    /// Record that the load finished and the upload was requested.
    pub fn mark_uploading(&self, name: &str) {
        self.set(name, ResourceState::Uploading);
    }

    /// Install the uploaded resource.
    pub fn mark_ready(&self, name: &str, id: GpuResourceId) {
        debug!(resource = name, gpu_id = %id, "Resource ready");
        self.set(name, ResourceState::Ready(id));
    }

    /// Record a failure.
    pub fn mark_failed(&self, name: &str, reason: String) {
        warn!(resource = name, reason = %reason, "Resource failed");
        self.set(name, ResourceState::Failed(reason));
    }

    fn set(&self, name: &str, state: ResourceState) {
        self.states.lock().insert(name.to_string(), state);
    }

    /// Resources still loading or uploading.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.states
            .lock()
            .values()
            .filter(|state| matches!(state, ResourceState::Loading | ResourceState::Uploading))
            .count()
    }

    /// Number of tracked resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.lock().len()
    }

    /// Whether nothing was requested yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.lock().is_empty()
    }
}

//! Resource-load pipeline built from two chained jobs.
//!
//! A RESOURCE_LOAD job reads and parses the resource on the loader worker and
//! writes the parsed payload into its result slab. Its `on_success` callback
//! runs on the main thread and submits a GPU_RESOURCE job that performs the
//! upload on the GPU worker. That job's `on_success` marks the resource ready
//! in the [`ResourceRegistry`]. Either `on_fail` marks it failed.
//!
//! Nothing here is special-cased in the scheduler; it only uses
//! [`JobSystem::submit`] and completion callbacks.

mod file;
mod registry;

use std::fmt;
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::{AppResult, Completion, JobError, JobHandle, JobPriority, JobSpec, JobSystem, JobType};

pub use file::FileResourceLoader;
pub use registry::{ResourceRegistry, ResourceState};

/// Kind of resource, passed through to the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Image data.
    Texture,
    /// Geometry.
    Mesh,
    /// Shader bytecode or source.
    Shader,
    /// Material description.
    Material,
    /// Bitmap or glyph atlas font.
    Font,
    /// Anything else; uploaded as raw bytes.
    Binary,
}

/// Parsed payload handed from the load job to the upload job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadedResource {
    /// Name the resource was requested by.
    pub name: String,
    /// Its kind.
    pub kind: ResourceKind,
    /// Bytes returned by the loader.
    pub data: Vec<u8>,
}

/// Identifier of an uploaded GPU resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GpuResourceId(pub u64);

impl fmt::Display for GpuResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gpu#{}", self.0)
    }
}

/// Blocking resource reader. Called only from RESOURCE_LOAD job entries.
pub trait ResourceLoader: Send + Sync + 'static {
    /// Read the named resource.
    ///
    /// # Errors
    ///
    /// Any I/O or format error; the load job fails with it.
    fn load(&self, name: &str, kind: ResourceKind) -> AppResult<Vec<u8>>;
}

/// GPU upload step. Called only from GPU_RESOURCE job entries, which run on
/// the worker allowed to talk to the renderer.
pub trait GpuUploader: Send + Sync + 'static {
    /// Upload a loaded resource and return its GPU-side id.
    ///
    /// # Errors
    ///
    /// Any renderer error; the upload job fails with it.
    fn upload(&self, resource: &LoadedResource) -> AppResult<GpuResourceId>;
}

#[derive(Serialize, Deserialize)]
struct LoadRequest {
    name: String,
    kind: ResourceKind,
}

/// Submits load-then-upload job pairs and tracks their outcome.
#[derive(Clone)]
pub struct ResourcePipeline {
    loader: Arc<dyn ResourceLoader>,
    uploader: Arc<dyn GpuUploader>,
    registry: Arc<ResourceRegistry>,
}

impl ResourcePipeline {
    /// Pipeline over `loader` and `uploader` with an empty registry.
    pub fn new(loader: Arc<dyn ResourceLoader>, uploader: Arc<dyn GpuUploader>) -> Self {
        Self {
            loader,
            uploader,
            registry: Arc::new(ResourceRegistry::new()),
        }
    }

    /// The registry the pipeline reports into.
    #[must_use]
    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    /// Submit the load job for `name`. The upload job follows from the load
    /// job's `on_success` at the same priority.
    ///
    /// # Errors
    ///
    /// [`JobError::Payload`] if the load request cannot be encoded, otherwise
    /// the submit error if the load job could not be queued; the registry
    /// entry is marked failed in that case.
    pub fn request(
        &self,
        jobs: &JobSystem,
        name: &str,
        kind: ResourceKind,
        priority: JobPriority,
    ) -> Result<JobHandle, JobError> {
        let request = LoadRequest {
            name: name.to_string(),
            kind,
        };
        let loader = Arc::clone(&self.loader);
        let spec = JobSpec::new(move |params, result| {
            let request: LoadRequest =
                serde_json::from_slice(params).context("decoding load request")?;
            let data = loader
                .load(&request.name, request.kind)
                .with_context(|| format!("loading resource `{}`", request.name))?;
            let loaded = LoadedResource {
                name: request.name,
                kind: request.kind,
                data,
            };
            *result = serde_json::to_vec(&loaded)?;
            Ok(())
        })
        .with_json_params(&request)?
        .with_type(JobType::ResourceLoad)
        .with_priority(priority);

        let on_loaded = self.clone();
        let on_load_failed = Arc::clone(&self.registry);
        let (loaded_name, failed_name) = (name.to_string(), name.to_string());
        let spec = spec
            .on_success(move |jobs, done| on_loaded.loaded(jobs, done, &loaded_name, priority))
            .on_fail(move |_, done| {
                let reason = done.failure.map_or_else(String::new, ToString::to_string);
                on_load_failed.mark_failed(&failed_name, reason);
            });

        self.registry.mark_loading(name);
        match jobs.submit(spec) {
            Ok(handle) => {
                debug!(resource = name, ?kind, job = %handle, "Resource load submitted");
                Ok(handle)
            }
            Err(err) => {
                self.registry.mark_failed(name, err.to_string());
                Err(err)
            }
        }
    }

    /// Main-thread continuation of a successful load: submit the upload.
    fn loaded(&self, jobs: &JobSystem, done: &Completion<'_>, name: &str, priority: JobPriority) {
        let resource: LoadedResource = match done.decode_json() {
            Ok(resource) => resource,
            Err(err) => {
                warn!(resource = name, job = %done.handle, error = %err, "Load job produced an unreadable payload");
                self.registry.mark_failed(name, format!("unreadable load payload: {err}"));
                return;
            }
        };
        let name = name.to_string();
        self.registry.mark_uploading(&name);

        let uploader = Arc::clone(&self.uploader);
        let ready = Arc::clone(&self.registry);
        let failed = Arc::clone(&self.registry);
        let (ready_name, failed_name) = (name.clone(), name.clone());

        let spec = JobSpec::new(move |_, result| {
            let id = uploader
                .upload(&resource)
                .with_context(|| format!("uploading resource `{}`", resource.name))?;
            result.copy_from_slice(&id.0.to_le_bytes());
            Ok(())
        })
        .with_type(JobType::GpuResource)
        .with_priority(priority)
        .with_result_size(std::mem::size_of::<u64>())
        .on_success(move |_, done| match decode_gpu_id(done.result) {
            Some(id) => ready.mark_ready(&ready_name, id),
            None => ready.mark_failed(&ready_name, "upload returned no resource id".into()),
        })
        .on_fail(move |_, done| {
            let reason = done.failure.map_or_else(String::new, ToString::to_string);
            failed.mark_failed(&failed_name, reason);
        });

        match jobs.submit(spec) {
            Ok(handle) => debug!(resource = %name, job = %handle, "Resource upload submitted"),
            Err(err) => {
                warn!(resource = %name, error = %err, "Resource upload could not be submitted");
                self.registry.mark_failed(&name, err.to_string());
            }
        }
    }
}

fn decode_gpu_id(result: &[u8]) -> Option<GpuResourceId> {
    let bytes: [u8; 8] = result.get(..8)?.try_into().ok()?;
    Some(GpuResourceId(u64::from_le_bytes(bytes)))
}

impl fmt::Debug for ResourcePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourcePipeline")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_gpu_id() {
        assert_eq!(decode_gpu_id(&7u64.to_le_bytes()), Some(GpuResourceId(7)));
        assert_eq!(decode_gpu_id(&[1, 2, 3]), None);
    }

    #[test]
    fn test_loaded_resource_json_payload() {
        let loaded = LoadedResource {
            name: "stone.png".into(),
            kind: ResourceKind::Texture,
            data: vec![0xde, 0xad],
        };
        let json = serde_json::to_string(&loaded).unwrap();
        assert!(json.contains(r#""kind":"texture""#));
    }

    #[test]
    fn test_gpu_id_display() {
        assert_eq!(GpuResourceId(42).to_string(), "gpu#42");
    }
}

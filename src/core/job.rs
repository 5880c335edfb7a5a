//! Job descriptions: types, priorities, handles and the submit-time spec.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::AppResult;
use super::job_system::JobSystem;

/// Kind of work a job performs. Workers only accept the kinds in their type-mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Ordinary CPU work; may run on any general worker.
    General,
    /// Blocking resource I/O and parsing.
    ResourceLoad,
    /// GPU uploads; pinned to the worker allowed to talk to the renderer.
    GpuResource,
}

impl JobType {
    /// Every job type, in mask-bit order.
    pub const ALL: [Self; 3] = [Self::General, Self::ResourceLoad, Self::GpuResource];

    /// Dense index used for per-type tables.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::General => 0,
            Self::ResourceLoad => 1,
            Self::GpuResource => 2,
        }
    }

    /// The single-bit mask for this type.
    #[must_use]
    pub const fn mask(self) -> JobTypeMask {
        match self {
            Self::General => JobTypeMask::GENERAL,
            Self::ResourceLoad => JobTypeMask::RESOURCE_LOAD,
            Self::GpuResource => JobTypeMask::GPU_RESOURCE,
        }
    }
}

/// Bitfield of job types a worker admits.
///
/// Serialized as a list of job types so configuration files stay readable:
/// `["general", "gpu_resource"]`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Vec<JobType>", into = "Vec<JobType>")]
pub struct JobTypeMask(u8);

impl JobTypeMask {
    /// Admits nothing.
    pub const EMPTY: Self = Self(0);
    /// General CPU jobs.
    pub const GENERAL: Self = Self(0b001);
    /// Resource-load jobs.
    pub const RESOURCE_LOAD: Self = Self(0b010);
    /// GPU resource jobs.
    pub const GPU_RESOURCE: Self = Self(0b100);
    /// Every job type.
    pub const ALL: Self = Self(0b111);

    /// Raw bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Build from raw bits, dropping unknown ones.
    #[must_use]
    pub const fn from_bits_truncate(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    /// Whether a job of `job_type` may run under this mask.
    #[must_use]
    pub const fn admits(self, job_type: JobType) -> bool {
        self.0 & job_type.mask().0 != 0
    }

    /// Whether no type is admitted.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether this mask admits exactly one job type.
    #[must_use]
    pub const fn is_exclusive(self) -> bool {
        self.0.count_ones() == 1
    }
}

impl BitOr for JobTypeMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for JobTypeMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl From<Vec<JobType>> for JobTypeMask {
    fn from(types: Vec<JobType>) -> Self {
        types.into_iter().fold(Self::EMPTY, |mask, ty| mask | ty.mask())
    }
}

impl From<JobTypeMask> for Vec<JobType> {
    fn from(mask: JobTypeMask) -> Self {
        JobType::ALL.into_iter().filter(|ty| mask.admits(*ty)).collect()
    }
}

impl fmt::Debug for JobTypeMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("EMPTY");
        }
        let names: Vec<&str> = JobType::ALL
            .into_iter()
            .filter(|ty| self.admits(*ty))
            .map(|ty| match ty {
                JobType::General => "GENERAL",
                JobType::ResourceLoad => "RESOURCE_LOAD",
                JobType::GpuResource => "GPU_RESOURCE",
            })
            .collect();
        f.write_str(&names.join(" | "))
    }
}

/// Strict priority band inside a worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPriority {
    /// Runs only when no NORMAL or HIGH job is queued on the worker.
    Low,
    /// Default band.
    #[default]
    Normal,
    /// Always dispatched first.
    High,
}

impl JobPriority {
    /// Number of bands.
    pub const BANDS: usize = 3;

    /// Band index in dispatch order: HIGH is 0, LOW is 2.
    #[must_use]
    pub const fn band(self) -> usize {
        match self {
            Self::High => 0,
            Self::Normal => 1,
            Self::Low => 2,
        }
    }
}

/// Lifecycle state of a job record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    /// Waiting on at least one unresolved predecessor.
    Pending,
    /// Queued on its target worker.
    Ready,
    /// Entry function executing on a worker.
    Running,
    /// Entry returned success; waiting for the main-thread drain.
    Succeeded,
    /// Entry failed or a predecessor failed; waiting for the main-thread drain.
    Failed,
    /// Callback delivered and record returned to the pool.
    Drained,
}

impl JobState {
    /// Whether the entry has finished (or will never run).
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Drained)
    }
}

/// Caller-retained identity of a submitted job.
///
/// Ids are 16-bit and reused once a job is drained; the generation tells a
/// reissued id apart from the job a handle was created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobHandle {
    /// Rolling 16-bit identifier, unique among live jobs.
    pub id: u16,
    /// Generation of `id` when this job was issued.
    pub generation: u32,
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job#{}.{}", self.id, self.generation)
    }
}

/// Why a job ended up FAILED.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// The entry function returned an error.
    EntryFailed(String),
    /// The entry function panicked; the worker survived.
    Panicked(String),
    /// A predecessor failed, so the entry was never invoked.
    Cascade {
        /// The failed predecessor that triggered the cascade.
        predecessor: JobHandle,
    },
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EntryFailed(msg) => write!(f, "entry failed: {msg}"),
            Self::Panicked(msg) => write!(f, "entry panicked: {msg}"),
            Self::Cascade { predecessor } => write!(f, "predecessor {predecessor} failed"),
        }
    }
}

/// View handed to completion callbacks on the main thread.
#[derive(Debug)]
pub struct Completion<'a> {
    /// The finished job.
    pub handle: JobHandle,
    /// Its type.
    pub job_type: JobType,
    /// `None` on success.
    pub failure: Option<&'a FailureKind>,
    /// The result slab. Untouched (zeroed) for cascaded jobs.
    pub result: &'a [u8],
}

impl Completion<'_> {
    /// Whether the entry succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Decode a JSON result written by the entry.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the slab does not hold a valid `T`.
    pub fn decode_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(self.result)
    }
}

/// Entry function: reads the param slab, writes the result slab.
///
/// The result vector arrives zeroed at the requested `result_size`; entries with
/// variable-length output may resize it.
pub type JobEntry = Box<dyn FnOnce(&[u8], &mut Vec<u8>) -> AppResult<()> + Send + 'static>;

/// Completion callback, invoked only from [`JobSystem::tick`].
pub type CompletionFn = Box<dyn FnOnce(&JobSystem, &Completion<'_>) + Send + 'static>;

/// Everything needed to submit a job.
pub struct JobSpec {
    pub(crate) entry: JobEntry,
    pub(crate) on_success: Option<CompletionFn>,
    pub(crate) on_fail: Option<CompletionFn>,
    pub(crate) params: Vec<u8>,
    pub(crate) result_size: usize,
    pub(crate) job_type: JobType,
    pub(crate) priority: JobPriority,
    pub(crate) deps: Vec<JobHandle>,
}

impl JobSpec {
    /// A GENERAL, NORMAL-priority job with no params and an empty result slab.
    pub fn new<F>(entry: F) -> Self
    where
        F: FnOnce(&[u8], &mut Vec<u8>) -> AppResult<()> + Send + 'static,
    {
        Self {
            entry: Box::new(entry),
            on_success: None,
            on_fail: None,
            params: Vec::new(),
            result_size: 0,
            job_type: JobType::General,
            priority: JobPriority::Normal,
            deps: Vec::new(),
        }
    }

    /// Set the job type.
    #[must_use]
    pub fn with_type(mut self, job_type: JobType) -> Self {
        self.job_type = job_type;
        self
    }

    /// Set the priority band.
    #[must_use]
    pub fn with_priority(mut self, priority: JobPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Copy `params` into the job's param slab.
    #[must_use]
    pub fn with_params(mut self, params: impl Into<Vec<u8>>) -> Self {
        self.params = params.into();
        self
    }

    /// Serialize `value` as JSON into the param slab.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if `value` cannot be serialized.
    pub fn with_json_params<T: Serialize>(mut self, value: &T) -> Result<Self, serde_json::Error> {
        self.params = serde_json::to_vec(value)?;
        Ok(self)
    }

    /// Size of the zero-initialized result slab.
    #[must_use]
    pub fn with_result_size(mut self, size: usize) -> Self {
        self.result_size = size;
        self
    }

    /// Callback run on the main thread when the entry succeeds.
    #[must_use]
    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&JobSystem, &Completion<'_>) + Send + 'static,
    {
        self.on_success = Some(Box::new(callback));
        self
    }

    /// Callback run on the main thread when the job fails or cascades.
    #[must_use]
    pub fn on_fail<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&JobSystem, &Completion<'_>) + Send + 'static,
    {
        self.on_fail = Some(Box::new(callback));
        self
    }

    /// Add a predecessor that must finish before this job's entry starts.
    #[must_use]
    pub fn depends_on(mut self, predecessor: JobHandle) -> Self {
        self.deps.push(predecessor);
        self
    }

    /// Add several predecessors.
    #[must_use]
    pub fn with_dependencies(mut self, predecessors: impl IntoIterator<Item = JobHandle>) -> Self {
        self.deps.extend(predecessors);
        self
    }

    /// The job type.
    #[must_use]
    pub const fn job_type(&self) -> JobType {
        self.job_type
    }

    /// The priority band.
    #[must_use]
    pub const fn priority(&self) -> JobPriority {
        self.priority
    }
}

impl fmt::Debug for JobSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobSpec")
            .field("job_type", &self.job_type)
            .field("priority", &self.priority)
            .field("param_bytes", &self.params.len())
            .field("result_size", &self.result_size)
            .field("deps", &self.deps)
            .field("on_success", &self.on_success.is_some())
            .field("on_fail", &self.on_fail.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_admits() {
        let mask = JobTypeMask::GENERAL | JobTypeMask::GPU_RESOURCE;
        assert!(mask.admits(JobType::General));
        assert!(mask.admits(JobType::GpuResource));
        assert!(!mask.admits(JobType::ResourceLoad));
        assert!(!mask.is_exclusive());
        assert!(JobTypeMask::RESOURCE_LOAD.is_exclusive());
        assert_eq!(JobTypeMask::from_bits_truncate(0xff), JobTypeMask::ALL);
    }

    #[test]
    fn test_mask_debug() {
        assert_eq!(format!("{:?}", JobTypeMask::ALL), "GENERAL | RESOURCE_LOAD | GPU_RESOURCE");
        assert_eq!(format!("{:?}", JobTypeMask::EMPTY), "EMPTY");
    }

    #[test]
    fn test_mask_serde_as_type_list() {
        let mask = JobTypeMask::GENERAL | JobTypeMask::RESOURCE_LOAD;
        let json = serde_json::to_string(&mask).unwrap();
        assert_eq!(json, r#"["general","resource_load"]"#);

        let back: JobTypeMask = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mask);
    }

    #[test]
    fn test_priority_bands() {
        assert!(JobPriority::High > JobPriority::Normal);
        assert!(JobPriority::Normal > JobPriority::Low);
        assert_eq!(JobPriority::High.band(), 0);
        assert_eq!(JobPriority::Low.band(), 2);
        assert_eq!(JobPriority::default(), JobPriority::Normal);
    }

    #[test]
    fn test_handle_display() {
        let handle = JobHandle { id: 12, generation: 3 };
        assert_eq!(handle.to_string(), "job#12.3");
    }

    #[test]
    fn test_completion_decode_json() {
        let bytes = serde_json::to_vec(&vec![1u32, 2, 3]).unwrap();
        let completion = Completion {
            handle: JobHandle { id: 0, generation: 0 },
            job_type: JobType::General,
            failure: None,
            result: &bytes,
        };
        assert!(completion.is_success());
        assert_eq!(completion.decode_json::<Vec<u32>>().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_spec_builder() {
        let pred = JobHandle { id: 4, generation: 1 };
        let spec = JobSpec::new(|_, _| Ok(()))
            .with_type(JobType::ResourceLoad)
            .with_priority(JobPriority::High)
            .with_params(vec![1, 2, 3])
            .with_result_size(16)
            .depends_on(pred);

        assert_eq!(spec.job_type(), JobType::ResourceLoad);
        assert_eq!(spec.priority(), JobPriority::High);
        assert_eq!(spec.params, vec![1, 2, 3]);
        assert_eq!(spec.result_size, 16);
        assert_eq!(spec.deps, vec![pred]);
    }
}

//! Loader that reads resources from a directory on disk.

use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context};
use tracing::debug;

use crate::core::AppResult;

use super::{ResourceKind, ResourceLoader};

/// Reads `<base>/<name>`.
///
/// Names are relative paths below `base`; absolute paths and `..` components
/// are refused.
#[derive(Debug, Clone)]
pub struct FileResourceLoader {
    base: PathBuf,
}

impl FileResourceLoader {
    /// Loader rooted at `base`.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// The directory resources are read from.
    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    fn resolve(&self, name: &str) -> AppResult<PathBuf> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if name.is_empty() || escapes {
            bail!("resource name `{name}` must be a relative path inside the resource directory");
        }
        Ok(self.base.join(relative))
    }
}

impl ResourceLoader for FileResourceLoader {
    fn load(&self, name: &str, kind: ResourceKind) -> AppResult<Vec<u8>> {
        let path = self.resolve(name)?;
        let bytes = fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
        debug!(resource = name, ?kind, bytes = bytes.len(), "Resource read from disk");
        Ok(bytes)
    }
}

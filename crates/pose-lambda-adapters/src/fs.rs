//! Filesystem adapter for object storage.
//!
//! Maps `bucket/key` onto `root/bucket/key`, for local runs and tests.

use anyhow::{Context, Result};
use pose_lambda_core::domain::ObjectLocation;
use pose_lambda_core::ObjectStore;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Object store backed by a local directory.
///
/// Each bucket is a directory directly under the root.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Creates a store rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a location to a file path under the root.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket or key would escape the root.
    pub fn resolve(&self, location: &ObjectLocation) -> Result<PathBuf> {
        let bucket = Path::new(&location.bucket);
        if !is_single_component(bucket) {
            anyhow::bail!("Invalid bucket name: {:?}", location.bucket);
        }

        let key = Path::new(&location.key);
        if !is_relative_descendant(key) {
            anyhow::bail!("Invalid object key: {:?}", location.key);
        }

        Ok(self.root.join(bucket).join(key))
    }
}

impl ObjectStore for FsObjectStore {
    fn fetch(&self, location: &ObjectLocation) -> Result<Vec<u8>> {
        let path = self.resolve(location)?;
        debug!("Reading {}", path.display());

        std::fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))
    }
}

fn is_single_component(path: &Path) -> bool {
    let mut components = path.components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn is_relative_descendant(path: &Path) -> bool {
    path.components().next().is_some()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

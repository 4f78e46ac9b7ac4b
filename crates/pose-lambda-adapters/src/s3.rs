//! S3 adapter for object storage.

use anyhow::{Context, Result};
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use pose_lambda_core::domain::ObjectLocation;
use pose_lambda_core::ObjectStore;
use tokio::runtime::Handle;
use tracing::debug;

/// Object store backed by Amazon S3.
///
/// [`ObjectStore::fetch`] blocks on the given runtime handle, so it must be
/// called from outside that runtime's async context (for example from a
/// `spawn_blocking` task).
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
    handle: Handle,
}

impl S3ObjectStore {
    /// Creates a store from an existing client.
    #[must_use]
    pub const fn new(client: Client, handle: Handle) -> Self {
        Self { client, handle }
    }

    /// Creates a store with credentials and region from the environment.
    pub async fn from_env(handle: Handle) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        Self::new(Client::new(&config), handle)
    }

    async fn get_object(&self, location: &ObjectLocation) -> Result<Vec<u8>> {
        let output = self
            .client
            .get_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .send()
            .await
            .with_context(|| format!("GetObject failed for s3://{location}"))?;

        let body = output
            .body
            .collect()
            .await
            .with_context(|| format!("Failed to read body of s3://{location}"))?;

        Ok(body.into_bytes().to_vec())
    }
}

impl ObjectStore for S3ObjectStore {
    fn fetch(&self, location: &ObjectLocation) -> Result<Vec<u8>> {
        debug!("Fetching s3://{location}");
        self.handle.block_on(self.get_object(location))
    }
}

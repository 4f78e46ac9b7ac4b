//! Inbound request types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A pose estimation request as received from the invoking runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseRequest {
    /// Storage bucket holding the image. Falls back to the configured default.
    pub bucket: Option<String>,
    /// Object key of the image.
    pub key: Option<String>,
}

impl PoseRequest {
    /// Creates a request for `key`, optionally in `bucket`.
    #[must_use]
    pub fn new(bucket: Option<&str>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.map(str::to_string),
            key: Some(key.into()),
        }
    }

    /// Reads a request out of a raw event.
    ///
    /// Events that are not objects, and fields that are not strings, are
    /// treated as missing so they end up as a validation failure rather than
    /// a deserialization error.
    #[must_use]
    pub fn from_event(event: &Value) -> Self {
        let field = |name: &str| {
            event
                .get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        Self {
            bucket: field("bucket"),
            key: field("key"),
        }
    }

    /// Resolves the object location, using `default_bucket` when the request
    /// has none.
    ///
    /// Returns `None` if the key is missing or no bucket can be resolved.
    /// Empty strings count as missing.
    #[must_use]
    pub fn resolve(&self, default_bucket: Option<&str>) -> Option<ObjectLocation> {
        let key = non_empty(self.key.as_deref())?;
        let bucket = non_empty(self.bucket.as_deref()).or_else(|| non_empty(default_bucket))?;

        Some(ObjectLocation::new(bucket, key))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Fully resolved location of an object in storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectLocation {
    /// Bucket name.
    pub bucket: String,
    /// Object key.
    pub key: String,
}

impl ObjectLocation {
    /// Creates a location.
    #[must_use]
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl std::fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

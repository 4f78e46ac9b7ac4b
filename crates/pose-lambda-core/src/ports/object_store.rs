//! Object store port for fetching image bytes.

use crate::domain::ObjectLocation;

/// Port for reading objects from storage.
pub trait ObjectStore: Send + Sync {
    /// Fetches the full contents of the object at `location`.
    ///
    /// # Errors
    ///
    /// Returns an error if the object is missing, access is denied, or the
    /// transfer fails.
    fn fetch(&self, location: &ObjectLocation) -> anyhow::Result<Vec<u8>>;
}

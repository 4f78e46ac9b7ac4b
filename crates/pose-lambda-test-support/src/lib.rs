//! Test support utilities for pose-lambda.
//!
//! Provides mock storage and estimators, landmark result builders, and
//! synthetic image bytes for testing the request handler.
//!
//! # Example
//!
//! ```
//! use pose_lambda_test_support::{MockEstimatorFactory, MockObjectStore, SyntheticImageBuilder};
//!
//! let store = MockObjectStore::new().with_object("photos", "person.png", SyntheticImageBuilder::png_bytes(64, 64));
//! let factory = MockEstimatorFactory::detecting_pose();
//!
//! assert_eq!(store.object_count(), 1);
//! assert_eq!(factory.created_count(), 0);
//! ```

mod builders;
mod mocks;

pub use builders::{LandmarkResultBuilder, SyntheticImageBuilder};
pub use mocks::{MockEstimator, MockEstimatorFactory, MockObjectStore};

//! Port definitions for hexagonal architecture.
//!
//! These traits define the boundaries between the request handler and the
//! storage and inference adapters.

mod object_store;
mod pose_estimator;

pub use object_store::ObjectStore;
pub use pose_estimator::{EstimatorFactory, EstimatorOptions, ModelComplexity, PoseEstimator};

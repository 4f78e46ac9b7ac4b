//! Pose Lambda Core - Domain logic and the invocation handler
//!
//! This crate contains the request and response types, the storage and
//! estimator ports, the handler that ties them together, and the ONNX pose
//! estimator.

pub mod domain;
pub mod handler;
pub mod inference;
pub mod ports;

pub use domain::{
    Landmark, LandmarkList, LandmarkResult, LambdaResponse, ObjectLocation, Outcome, PoseData,
    PoseRequest,
};
pub use handler::{decode_image, HandlerConfig, InvocationContext, PoseHandler};
pub use ports::{EstimatorFactory, EstimatorOptions, ModelComplexity, ObjectStore, PoseEstimator};

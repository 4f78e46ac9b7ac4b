//! Pose Lambda Adapters - External adapters for pose-lambda.
//!
//! This crate provides adapters for:
//! - S3 object storage
//! - Local filesystem object storage
//! - Model downloading and caching

pub mod fs;
pub mod models;
pub mod s3;

pub use fs::FsObjectStore;
pub use models::{default_models_dir, model_path, model_set};
pub use s3::S3ObjectStore;

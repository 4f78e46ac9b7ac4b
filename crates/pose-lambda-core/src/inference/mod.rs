//! ML inference engine using ONNX Runtime.
//!
//! Provides model loading and inference for:
//! - BlazePose landmarks (lite/full/heavy), with world landmarks and a
//!   segmentation mask
//! - Face mesh landmarks (468 points)

mod holistic;
mod roi;
mod session;
mod tensor;

pub use holistic::{ModelSet, OnnxEstimatorFactory, OnnxHolisticEstimator};
pub use roi::{Roi, FACE_ROI_SCALE, POSE_ROI_SCALE};
pub use session::build_session;
pub use tensor::to_nhwc_tensor;

//! Core domain types for pose estimation requests.

mod envelope;
mod landmark;
mod request;

pub use envelope::{
    LambdaResponse, Outcome, ResponseBody, BAD_REQUEST_MESSAGE, POSE_NOT_DETECTED_MESSAGE,
};
pub use landmark::{
    BodyLandmark, Landmark, LandmarkList, LandmarkResult, PoseData, SegmentationMask,
    FACE_LANDMARK_COUNT, POSE_LANDMARK_COUNT,
};
pub use request::{ObjectLocation, PoseRequest};

//! Handler outcome and its wire representation.

use serde::{Deserialize, Serialize};

use super::PoseData;

/// Message returned when the request lacks a key or a resolvable bucket.
pub const BAD_REQUEST_MESSAGE: &str = "Bad request";

/// Message returned when no pose was found in the image.
pub const POSE_NOT_DETECTED_MESSAGE: &str = "Pose not detected";

/// Result of handling one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A pose was detected.
    Success {
        /// Detected landmarks.
        data: PoseData,
    },
    /// The request was invalid.
    ClientError {
        /// Human-readable reason.
        message: String,
    },
    /// The image was processed but contained no pose.
    NotFound {
        /// Human-readable reason.
        message: String,
    },
}

impl Outcome {
    /// The outcome for a request missing its key or bucket.
    #[must_use]
    pub fn bad_request() -> Self {
        Self::ClientError {
            message: BAD_REQUEST_MESSAGE.to_string(),
        }
    }

    /// The outcome for an image without a detectable pose.
    #[must_use]
    pub fn pose_not_detected() -> Self {
        Self::NotFound {
            message: POSE_NOT_DETECTED_MESSAGE.to_string(),
        }
    }

    /// HTTP-style status code reported on the wire.
    ///
    /// A missing pose is reported as 500, not 404.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Success { .. } => 200,
            Self::ClientError { .. } => 409,
            Self::NotFound { .. } => 500,
        }
    }

    /// Returns the landmark payload, if any.
    #[must_use]
    pub const fn data(&self) -> Option<&PoseData> {
        match self {
            Self::Success { data } => Some(data),
            Self::ClientError { .. } | Self::NotFound { .. } => None,
        }
    }

    /// Returns the error message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::ClientError { message } | Self::NotFound { message } => Some(message.as_str()),
        }
    }

    /// Converts into the response envelope returned to the runtime.
    #[must_use]
    pub fn into_response(self) -> LambdaResponse {
        let status_code = self.status_code();
        let body = match self {
            Self::Success { data } => ResponseBody {
                message: None,
                data: Some(data),
            },
            Self::ClientError { message } | Self::NotFound { message } => ResponseBody {
                message: Some(message),
                data: None,
            },
        };

        LambdaResponse { status_code, body }
    }
}

/// Response envelope in the shape the runtime returns to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LambdaResponse {
    /// Status code.
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    /// Response body.
    pub body: ResponseBody,
}

/// Body of the response envelope. Both keys are always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseBody {
    /// Error message, null on success.
    pub message: Option<String>,
    /// Landmark payload, null on error.
    pub data: Option<PoseData>,
}

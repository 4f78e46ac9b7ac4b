//! Pose estimator port.

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::domain::LandmarkResult;

/// Model size/accuracy tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ModelComplexity {
    /// Fastest, least accurate.
    Lite,
    /// Balanced.
    Full,
    /// Slowest, most accurate.
    #[default]
    Heavy,
}

impl TryFrom<u8> for ModelComplexity {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Lite),
            1 => Ok(Self::Full),
            2 => Ok(Self::Heavy),
            other => Err(format!("model complexity must be 0, 1 or 2, got {other}")),
        }
    }
}

impl From<ModelComplexity> for u8 {
    fn from(value: ModelComplexity) -> Self {
        match value {
            ModelComplexity::Lite => 0,
            ModelComplexity::Full => 1,
            ModelComplexity::Heavy => 2,
        }
    }
}

/// Settings an estimator is constructed with.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimatorOptions {
    /// Treat every image independently instead of tracking across calls.
    pub static_image_mode: bool,
    /// Model tier to load.
    pub model_complexity: ModelComplexity,
    /// Produce a person segmentation mask.
    pub enable_segmentation: bool,
    /// Minimum score for a pose (or face) to count as detected.
    pub min_detection_confidence: f32,
}

impl Default for EstimatorOptions {
    fn default() -> Self {
        Self {
            static_image_mode: true,
            model_complexity: ModelComplexity::Heavy,
            enable_segmentation: true,
            min_detection_confidence: 0.5,
        }
    }
}

/// Port for running pose estimation on a single image.
pub trait PoseEstimator: Send {
    /// Detects pose and face landmarks in an RGB image.
    ///
    /// An image without a person is not an error; the result then has no
    /// pose landmarks.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails.
    fn detect(&mut self, image: &RgbImage) -> anyhow::Result<LandmarkResult>;
}

/// Port for constructing estimators.
///
/// The handler asks for a new estimator on every request; implementations
/// are free to hand out pooled instances instead.
pub trait EstimatorFactory: Send + Sync {
    /// Creates an estimator configured with `options`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying model cannot be loaded.
    fn create(&self, options: &EstimatorOptions) -> anyhow::Result<Box<dyn PoseEstimator>>;
}

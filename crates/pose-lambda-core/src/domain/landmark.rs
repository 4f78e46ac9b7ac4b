//! Landmark types produced by pose estimation.

use serde::{Deserialize, Serialize};

/// Number of body landmarks in a pose.
pub const POSE_LANDMARK_COUNT: usize = 33;

/// Number of face mesh landmarks.
pub const FACE_LANDMARK_COUNT: usize = 468;

/// A single estimated keypoint.
///
/// For image landmarks `x` and `y` are normalized to `[0, 1]` by image width
/// and height, and `z` uses roughly the same scale as `x`. For world landmarks
/// all three coordinates are in metres with the origin between the hips.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    /// Horizontal coordinate.
    pub x: f32,
    /// Vertical coordinate.
    pub y: f32,
    /// Depth coordinate.
    pub z: f32,
    /// Likelihood of the landmark being visible (0.0 to 1.0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f32>,
}

impl Landmark {
    /// Creates a landmark without a visibility score.
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            x,
            y,
            z,
            visibility: None,
        }
    }

    /// Sets the visibility score.
    #[must_use]
    pub const fn with_visibility(mut self, visibility: f32) -> Self {
        self.visibility = Some(visibility);
        self
    }
}

/// An ordered collection of landmarks.
///
/// Serializes as a plain JSON array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkList {
    landmarks: Vec<Landmark>,
}

impl LandmarkList {
    /// Creates a list from landmarks.
    #[must_use]
    pub const fn new(landmarks: Vec<Landmark>) -> Self {
        Self { landmarks }
    }

    /// Returns the number of landmarks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    /// Returns true if the list holds no landmarks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    /// Returns the landmark at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.landmarks.get(index)
    }

    /// Returns the landmark for a body keypoint.
    #[must_use]
    pub fn body(&self, landmark: BodyLandmark) -> Option<&Landmark> {
        self.get(landmark as usize)
    }

    /// Iterates over the landmarks in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Landmark> {
        self.landmarks.iter()
    }
}

impl From<Vec<Landmark>> for LandmarkList {
    fn from(landmarks: Vec<Landmark>) -> Self {
        Self::new(landmarks)
    }
}

impl FromIterator<Landmark> for LandmarkList {
    fn from_iter<I: IntoIterator<Item = Landmark>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a LandmarkList {
    type Item = &'a Landmark;
    type IntoIter = std::slice::Iter<'a, Landmark>;

    fn into_iter(self) -> Self::IntoIter {
        self.landmarks.iter()
    }
}

/// Body landmark indices (33 total).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum BodyLandmark {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl BodyLandmark {
    /// Landmarks on the head, nose through mouth corners.
    pub const FACE: [Self; 11] = [
        Self::Nose,
        Self::LeftEyeInner,
        Self::LeftEye,
        Self::LeftEyeOuter,
        Self::RightEyeInner,
        Self::RightEye,
        Self::RightEyeOuter,
        Self::LeftEar,
        Self::RightEar,
        Self::MouthLeft,
        Self::MouthRight,
    ];
}

/// Per-pixel foreground probability for the person in the model's input crop.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationMask {
    /// Mask width in pixels.
    pub width: u32,
    /// Mask height in pixels.
    pub height: u32,
    /// Row-major probabilities in `[0, 1]`.
    pub values: Vec<f32>,
}

/// Raw output of a pose estimator for one image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LandmarkResult {
    /// Normalized body landmarks, absent when no pose was found.
    pub pose_landmarks: Option<LandmarkList>,
    /// Body landmarks in metric world coordinates.
    pub pose_world_landmarks: Option<LandmarkList>,
    /// Normalized face mesh landmarks.
    pub face_landmarks: Option<LandmarkList>,
    /// Person segmentation, when enabled.
    pub segmentation_mask: Option<SegmentationMask>,
}

impl LandmarkResult {
    /// A result with nothing detected.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns true if primary pose landmarks were found.
    #[must_use]
    pub fn has_pose(&self) -> bool {
        self.pose_landmarks.as_ref().is_some_and(|l| !l.is_empty())
    }
}

/// Landmark payload returned to the caller on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseData {
    /// Normalized body landmarks.
    pub pose_landmarks: LandmarkList,
    /// Body landmarks in world coordinates.
    pub pose_world_landmarks: Option<LandmarkList>,
    /// Face mesh landmarks.
    pub face_landmarks: Option<LandmarkList>,
}

impl PoseData {
    /// Builds the payload from an estimator result.
    ///
    /// Returns `None` when the result has no primary pose landmarks.
    #[must_use]
    pub fn from_result(result: LandmarkResult) -> Option<Self> {
        let LandmarkResult {
            pose_landmarks,
            pose_world_landmarks,
            face_landmarks,
            segmentation_mask: _,
        } = result;

        let pose_landmarks = pose_landmarks.filter(|l| !l.is_empty())?;

        Some(Self {
            pose_landmarks,
            pose_world_landmarks,
            face_landmarks,
        })
    }
}

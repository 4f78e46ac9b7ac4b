//! Body pose and face mesh estimation with ONNX Runtime.
//!
//! Runs the BlazePose landmark models (lite/full/heavy) and the face mesh
//! landmark model exported to ONNX with their TFLite tensor names.
//!
//! Pipeline for one image:
//! 1. Pose model on the letterboxed full frame (or the tracked region in
//!    video mode).
//! 2. If the pose flag clears the detection threshold, a second pass on the
//!    region given by the model's alignment keypoints.
//! 3. Face mesh model on a crop around the pose's face points.

// Allow common ML/image code patterns
#![allow(clippy::cast_precision_loss)]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::{DynValue, Tensor};
use tracing::{debug, warn};

use super::roi::{Roi, FACE_ROI_SCALE, POSE_ROI_SCALE};
use super::{build_session, to_nhwc_tensor};
use crate::domain::{
    BodyLandmark, Landmark, LandmarkList, LandmarkResult, SegmentationMask, FACE_LANDMARK_COUNT,
    POSE_LANDMARK_COUNT,
};
use crate::ports::{EstimatorFactory, EstimatorOptions, ModelComplexity, PoseEstimator};

/// Pose model input side length.
const POSE_INPUT_SIZE: u32 = 256;

/// Face mesh model input side length.
const FACE_INPUT_SIZE: u32 = 192;

/// Values per landmark in the pose output: x, y, z, visibility, presence.
const POSE_STRIDE: usize = 5;

/// The pose model emits 33 body landmarks followed by auxiliary points; the
/// first two auxiliary points are the hip centre and the body scale point.
const ALIGNMENT_CENTER: usize = 33;
const ALIGNMENT_SCALE: usize = 34;

const POSE_INPUT: &str = "input_1";
const POSE_LANDMARKS: &str = "Identity";
const POSE_FLAG: &str = "Identity_1";
const POSE_SEGMENTATION: &str = "Identity_2";
const POSE_WORLD: &str = "Identity_4";

const FACE_INPUT: &str = "input_1";
const FACE_LANDMARKS: &str = "conv2d_21";
const FACE_FLAG: &str = "conv2d_31";

/// Paths to the ONNX model files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSet {
    /// Pose landmark model, lite tier.
    pub pose_lite: PathBuf,
    /// Pose landmark model, full tier.
    pub pose_full: PathBuf,
    /// Pose landmark model, heavy tier.
    pub pose_heavy: PathBuf,
    /// Face mesh landmark model. Face landmarks are skipped without it.
    pub face: Option<PathBuf>,
}

impl ModelSet {
    /// Returns the pose model for a complexity tier.
    #[must_use]
    pub fn pose_model(&self, complexity: ModelComplexity) -> &Path {
        match complexity {
            ModelComplexity::Lite => &self.pose_lite,
            ModelComplexity::Full => &self.pose_full,
            ModelComplexity::Heavy => &self.pose_heavy,
        }
    }
}

/// Maps a logit to a probability.
#[inline]
fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Copies a model output into a flat vector.
fn output_values(value: Option<&DynValue>, name: &str) -> Result<Vec<f32>> {
    let value = value.with_context(|| format!("Model output '{name}' missing"))?;
    let array = value
        .try_extract_array::<f32>()
        .with_context(|| format!("Failed to extract output '{name}'"))?;
    Ok(array.iter().copied().collect())
}

/// Raw output of one pose model pass.
struct PosePass {
    roi: Roi,
    score: f32,
    landmarks: Vec<f32>,
    world: Vec<f32>,
    segmentation: Option<Vec<f32>>,
}

impl PosePass {
    /// Landmark `index` in image pixels.
    fn pixel(&self, index: usize, width: u32, height: u32) -> Option<(f32, f32)> {
        let base = index * POSE_STRIDE;
        let raw = self.landmarks.get(base..base + 3)?;
        let (x, y, _) = self.roi.to_image(
            (raw[0], raw[1], raw[2]),
            POSE_INPUT_SIZE as f32,
            width,
            height,
        );
        Some((x * width as f32, y * height as f32))
    }

    /// Region for a refined pass, from the alignment keypoints.
    fn alignment_roi(&self, width: u32, height: u32) -> Option<Roi> {
        let center = self.pixel(ALIGNMENT_CENTER, width, height)?;
        let scale = self.pixel(ALIGNMENT_SCALE, width, height)?;
        Roi::from_alignment(center, scale, POSE_ROI_SCALE)
    }

    fn visibility(&self, index: usize) -> f32 {
        sigmoid(self.landmarks[index * POSE_STRIDE + 3])
    }

    fn pose_landmarks(&self, width: u32, height: u32) -> LandmarkList {
        (0..POSE_LANDMARK_COUNT)
            .map(|i| {
                let base = i * POSE_STRIDE;
                let raw = &self.landmarks[base..base + 3];
                let (x, y, z) = self.roi.to_image(
                    (raw[0], raw[1], raw[2]),
                    POSE_INPUT_SIZE as f32,
                    width,
                    height,
                );
                Landmark::new(x, y, z).with_visibility(self.visibility(i))
            })
            .collect()
    }

    fn world_landmarks(&self) -> LandmarkList {
        self.world
            .chunks_exact(3)
            .take(POSE_LANDMARK_COUNT)
            .enumerate()
            .map(|(i, p)| Landmark::new(p[0], p[1], p[2]).with_visibility(self.visibility(i)))
            .collect()
    }

    fn segmentation_mask(&self) -> Option<SegmentationMask> {
        self.segmentation.as_ref().map(|logits| SegmentationMask {
            width: POSE_INPUT_SIZE,
            height: POSE_INPUT_SIZE,
            values: logits.iter().copied().map(sigmoid).collect(),
        })
    }
}

/// BlazePose landmark model.
struct PoseModel {
    session: Session,
}

impl PoseModel {
    fn load(path: &Path, threads: usize) -> Result<Self> {
        let session = build_session(path, threads).context("Failed to load pose model")?;
        Ok(Self { session })
    }

    fn run(&mut self, image: &RgbImage, roi: Roi, segmentation: bool) -> Result<PosePass> {
        let input: Array4<f32> = to_nhwc_tensor(&roi.extract(image, POSE_INPUT_SIZE));
        let tensor = Tensor::from_array(input).context("Failed to build pose input tensor")?;
        let outputs = self
            .session
            .run(ort::inputs![POSE_INPUT => tensor])
            .context("Pose inference failed")?;

        let landmarks = output_values(outputs.get(POSE_LANDMARKS), POSE_LANDMARKS)?;
        let flag = output_values(outputs.get(POSE_FLAG), POSE_FLAG)?;
        let world = output_values(outputs.get(POSE_WORLD), POSE_WORLD)?;
        let segmentation = if segmentation {
            Some(output_values(
                outputs.get(POSE_SEGMENTATION),
                POSE_SEGMENTATION,
            )?)
        } else {
            None
        };

        if landmarks.len() < POSE_LANDMARK_COUNT * POSE_STRIDE {
            anyhow::bail!(
                "Pose model returned {} landmark values, expected at least {}",
                landmarks.len(),
                POSE_LANDMARK_COUNT * POSE_STRIDE
            );
        }
        if world.len() < POSE_LANDMARK_COUNT * 3 {
            anyhow::bail!(
                "Pose model returned {} world landmark values, expected at least {}",
                world.len(),
                POSE_LANDMARK_COUNT * 3
            );
        }

        // The pose flag is already a probability.
        let score = flag.first().copied().unwrap_or(0.0);

        Ok(PosePass {
            roi,
            score,
            landmarks,
            world,
            segmentation,
        })
    }
}

/// Face mesh landmark model.
struct FaceModel {
    session: Session,
}

impl FaceModel {
    fn load(path: &Path, threads: usize) -> Result<Self> {
        let session = build_session(path, threads).context("Failed to load face model")?;
        Ok(Self { session })
    }

    /// Returns the face flag logit and landmarks (model pixel space, xyz
    /// triples).
    fn run(&mut self, image: &RgbImage, roi: Roi) -> Result<(f32, Vec<f32>)> {
        let input = to_nhwc_tensor(&roi.extract(image, FACE_INPUT_SIZE));
        let tensor = Tensor::from_array(input).context("Failed to build face input tensor")?;
        let outputs = self
            .session
            .run(ort::inputs![FACE_INPUT => tensor])
            .context("Face inference failed")?;

        let landmarks = output_values(outputs.get(FACE_LANDMARKS), FACE_LANDMARKS)?;
        let flag = output_values(outputs.get(FACE_FLAG), FACE_FLAG)?;

        if landmarks.len() < FACE_LANDMARK_COUNT * 3 {
            anyhow::bail!(
                "Face model returned {} landmark values, expected at least {}",
                landmarks.len(),
                FACE_LANDMARK_COUNT * 3
            );
        }

        let logit = flag.first().copied().unwrap_or(f32::NEG_INFINITY);
        Ok((logit, landmarks))
    }
}

/// Keeps a pass only if its pose flag clears the detection threshold.
fn accept_pass(pass: PosePass, options: &EstimatorOptions) -> Option<PosePass> {
    debug!("Pose pass at {:?}: score={:.3}", pass.roi, pass.score);
    (pass.score >= options.min_detection_confidence).then_some(pass)
}

/// Region carried over from the previous frame, if tracking applies.
fn tracked_region(tracked: Option<Roi>, options: &EstimatorOptions) -> Option<Roi> {
    tracked.filter(|_| !options.static_image_mode)
}

/// Region to track into the next frame.
fn next_tracked(
    pose: Option<&PosePass>,
    width: u32,
    height: u32,
    options: &EstimatorOptions,
) -> Option<Roi> {
    if options.static_image_mode {
        return None;
    }
    pose?.alignment_roi(width, height)
}

/// Finds a pose with `run`, which performs one model pass over a region.
///
/// Starts on `tracked` (or the full frame), falls back to the full frame when
/// a tracked pose is lost, then refines on the alignment region. A refined
/// pass below threshold leaves the first pass in place.
fn locate_pose<F>(
    mut run: F,
    tracked: Option<Roi>,
    width: u32,
    height: u32,
    options: &EstimatorOptions,
) -> Result<Option<PosePass>>
where
    F: FnMut(Roi) -> Result<PosePass>,
{
    let full_frame = Roi::full_frame(width, height);
    let mut pass_at = |roi: Roi| -> Result<Option<PosePass>> { Ok(accept_pass(run(roi)?, options)) };

    let mut pass = pass_at(tracked.unwrap_or(full_frame))?;
    if pass.is_none() && tracked.is_some() {
        debug!("Lost tracked pose, retrying on full frame");
        pass = pass_at(full_frame)?;
    }

    let Some(first) = pass else {
        return Ok(None);
    };

    let refined = match first.alignment_roi(width, height) {
        Some(roi) => pass_at(roi)?,
        None => None,
    };

    Ok(Some(refined.unwrap_or(first)))
}

/// Crop for the face mesh model, around the pose's head landmarks.
fn face_region(pose: &PosePass, width: u32, height: u32) -> Option<Roi> {
    let points = BodyLandmark::FACE
        .iter()
        .filter_map(|&l| pose.pixel(l as usize, width, height));
    Roi::from_points(points, FACE_ROI_SCALE)
}

/// Gates the face flag and maps the mesh back to normalized image space.
fn face_from_raw(
    logit: f32,
    raw: &[f32],
    roi: Roi,
    width: u32,
    height: u32,
    options: &EstimatorOptions,
) -> Option<LandmarkList> {
    let score = sigmoid(logit);
    debug!("Face pass at {roi:?}: score={score:.3}");
    if score < options.min_detection_confidence {
        return None;
    }

    let landmarks = raw
        .chunks_exact(3)
        .take(FACE_LANDMARK_COUNT)
        .map(|p| {
            let (x, y, z) = roi.to_image((p[0], p[1], p[2]), FACE_INPUT_SIZE as f32, width, height);
            Landmark::new(x, y, z)
        })
        .collect();

    Some(landmarks)
}

/// Pose estimator backed by ONNX Runtime sessions.
pub struct OnnxHolisticEstimator {
    pose: PoseModel,
    face: Option<FaceModel>,
    options: EstimatorOptions,
    tracked: Option<Roi>,
}

impl OnnxHolisticEstimator {
    fn face_landmarks(&mut self, image: &RgbImage, pose: &PosePass) -> Result<Option<LandmarkList>> {
        let Some(face) = self.face.as_mut() else {
            return Ok(None);
        };

        let (width, height) = image.dimensions();
        let Some(roi) = face_region(pose, width, height) else {
            debug!("Face region is degenerate, skipping face mesh");
            return Ok(None);
        };

        let (logit, raw) = face.run(image, roi)?;
        Ok(face_from_raw(logit, &raw, roi, width, height, &self.options))
    }
}

impl PoseEstimator for OnnxHolisticEstimator {
    fn detect(&mut self, image: &RgbImage) -> Result<LandmarkResult> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Ok(LandmarkResult::empty());
        }

        let tracked = tracked_region(self.tracked.take(), &self.options);
        let segmentation = self.options.enable_segmentation;
        let model = &mut self.pose;
        let pose = locate_pose(
            |roi| model.run(image, roi, segmentation),
            tracked,
            width,
            height,
            &self.options,
        )?;

        self.tracked = next_tracked(pose.as_ref(), width, height, &self.options);

        let Some(pose) = pose else {
            return Ok(LandmarkResult::empty());
        };

        let face_landmarks = self.face_landmarks(image, &pose)?;

        Ok(LandmarkResult {
            pose_landmarks: Some(pose.pose_landmarks(width, height)),
            pose_world_landmarks: Some(pose.world_landmarks()),
            face_landmarks,
            segmentation_mask: pose.segmentation_mask(),
        })
    }
}

/// Builds a fresh [`OnnxHolisticEstimator`] for every request.
pub struct OnnxEstimatorFactory {
    models: ModelSet,
    threads: usize,
}

impl OnnxEstimatorFactory {
    /// Creates a factory over the given model files.
    ///
    /// `threads` limits intra-op parallelism per session; `0` leaves the
    /// runtime default.
    #[must_use]
    pub const fn new(models: ModelSet, threads: usize) -> Self {
        Self { models, threads }
    }

    /// Returns the model files this factory loads.
    #[must_use]
    pub const fn models(&self) -> &ModelSet {
        &self.models
    }
}

impl EstimatorFactory for OnnxEstimatorFactory {
    fn create(&self, options: &EstimatorOptions) -> Result<Box<dyn PoseEstimator>> {
        let pose_path = self.models.pose_model(options.model_complexity);
        let pose = PoseModel::load(pose_path, self.threads)?;

        let face = match &self.models.face {
            Some(path) if path.exists() => Some(FaceModel::load(path, self.threads)?),
            Some(path) => {
                warn!(
                    "Face model not found at {}, face landmarks disabled",
                    path.display()
                );
                None
            }
            None => None,
        };

        Ok(Box::new(OnnxHolisticEstimator {
            pose,
            face,
            options: options.clone(),
            tracked: None,
        }))
    }
}

//! Landmark result and synthetic image builders for testing.

// Synthetic coordinates are derived from small indices
#![allow(clippy::cast_precision_loss)]

use std::io::Cursor;

use image::{ImageFormat, Rgb, RgbImage};
use pose_lambda_core::domain::{
    Landmark, LandmarkList, LandmarkResult, SegmentationMask, FACE_LANDMARK_COUNT,
    POSE_LANDMARK_COUNT,
};

/// Builder for estimator results.
///
/// Starts from a plausible detection: 33 normalized body landmarks, 33 world
/// landmarks, and a 468-point face mesh.
#[derive(Debug, Clone)]
pub struct LandmarkResultBuilder {
    result: LandmarkResult,
}

impl LandmarkResultBuilder {
    /// A full detection with pose, world, and face landmarks.
    #[must_use]
    pub fn full_pose() -> Self {
        Self {
            result: LandmarkResult {
                pose_landmarks: Some(Self::grid(POSE_LANDMARK_COUNT, Some(0.9))),
                pose_world_landmarks: Some(Self::world(POSE_LANDMARK_COUNT)),
                face_landmarks: Some(Self::grid(FACE_LANDMARK_COUNT, None)),
                segmentation_mask: None,
            },
        }
    }

    /// Nothing detected.
    #[must_use]
    pub fn no_pose() -> Self {
        Self {
            result: LandmarkResult::empty(),
        }
    }

    /// Drops the face landmarks.
    #[must_use]
    pub fn without_face(mut self) -> Self {
        self.result.face_landmarks = None;
        self
    }

    /// Drops the world landmarks.
    #[must_use]
    pub fn without_world(mut self) -> Self {
        self.result.pose_world_landmarks = None;
        self
    }

    /// Adds a uniform segmentation mask.
    #[must_use]
    pub fn with_segmentation(mut self, width: u32, height: u32) -> Self {
        self.result.segmentation_mask = Some(SegmentationMask {
            width,
            height,
            values: vec![0.5; (width * height) as usize],
        });
        self
    }

    /// Finishes the result.
    #[must_use]
    pub fn build(self) -> LandmarkResult {
        self.result
    }

    /// Landmarks spread over the unit square.
    fn grid(count: usize, visibility: Option<f32>) -> LandmarkList {
        (0..count)
            .map(|i| {
                let t = i as f32 / count as f32;
                let landmark = Landmark::new(0.25 + t * 0.5, 0.1 + t * 0.8, -0.1 + t * 0.2);
                match visibility {
                    Some(v) => landmark.with_visibility(v),
                    None => landmark,
                }
            })
            .collect()
    }

    /// Landmarks within a metre of the hip centre.
    fn world(count: usize) -> LandmarkList {
        (0..count)
            .map(|i| {
                let t = i as f32 / count as f32 - 0.5;
                Landmark::new(t * 0.6, t * 1.6, t * 0.2).with_visibility(0.9)
            })
            .collect()
    }
}

/// Builder for synthetic image payloads.
pub struct SyntheticImageBuilder;

impl SyntheticImageBuilder {
    /// Creates an RGB image with a light figure-like block on a dark ground.
    #[must_use]
    pub fn figure(width: u32, height: u32) -> RgbImage {
        let (x0, x1) = (width * 2 / 5, width * 3 / 5);
        let (y0, y1) = (height / 5, height * 4 / 5);
        RgbImage::from_fn(width, height, |x, y| {
            if (x0..x1).contains(&x) && (y0..y1).contains(&y) {
                Rgb([220, 200, 180])
            } else {
                Rgb([30, 40, 50])
            }
        })
    }

    /// Creates a uniform RGB image.
    #[must_use]
    pub fn uniform(width: u32, height: u32, r: u8, g: u8, b: u8) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([r, g, b]))
    }

    /// Encodes [`Self::figure`] as PNG.
    #[must_use]
    pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        Self::encode(&Self::figure(width, height), ImageFormat::Png)
    }

    /// Encodes [`Self::figure`] as JPEG.
    #[must_use]
    pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
        Self::encode(&Self::figure(width, height), ImageFormat::Jpeg)
    }

    /// Bytes that start like a JPEG but are not decodable.
    #[must_use]
    pub fn corrupt_bytes() -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
        bytes.extend_from_slice(b"this is not really a jpeg");
        bytes
    }

    /// Encodes an image in memory.
    ///
    /// # Panics
    ///
    /// Panics if the encoder for `format` is not compiled in.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn encode(image: &RgbImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        image
            .write_to(&mut buf, format)
            .expect("in-memory image encoding");
        buf.into_inner()
    }
}

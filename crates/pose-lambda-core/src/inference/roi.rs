//! Square regions of interest and their mapping to model input space.

// Pixel geometry moves between integer and float coordinates throughout
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]

use image::imageops::{self, FilterType};
use image::RgbImage;

/// Enlargement applied to the pose alignment box.
pub const POSE_ROI_SCALE: f32 = 1.25;

/// Enlargement applied to the box around the face points of a pose.
pub const FACE_ROI_SCALE: f32 = 1.5;

/// Axis-aligned square region in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Roi {
    /// Centre x in pixels.
    pub center_x: f32,
    /// Centre y in pixels.
    pub center_y: f32,
    /// Side length in pixels.
    pub size: f32,
}

impl Roi {
    /// The smallest square that covers the whole image, centred on it.
    ///
    /// Extracting it letterboxes the image with black bars.
    #[must_use]
    pub fn full_frame(width: u32, height: u32) -> Self {
        Self {
            center_x: width as f32 / 2.0,
            center_y: height as f32 / 2.0,
            size: width.max(height) as f32,
        }
    }

    /// Builds a region from the two alignment keypoints of a pose.
    ///
    /// `center` is the hip centre and `scale_point` the point whose distance
    /// to it gives the body radius; both in pixels. Returns `None` for a
    /// degenerate (zero-sized) region.
    #[must_use]
    pub fn from_alignment(center: (f32, f32), scale_point: (f32, f32), scale: f32) -> Option<Self> {
        let radius = (scale_point.0 - center.0).hypot(scale_point.1 - center.1);
        let size = 2.0 * radius * scale;

        (size.is_finite() && size >= 1.0).then_some(Self {
            center_x: center.0,
            center_y: center.1,
            size,
        })
    }

    /// Builds a square around a set of points (pixels), enlarged by `scale`.
    ///
    /// Returns `None` if there are no points or the box is degenerate.
    #[must_use]
    pub fn from_points<I>(points: I, scale: f32) -> Option<Self>
    where
        I: IntoIterator<Item = (f32, f32)>,
    {
        let mut min_x = f32::MAX;
        let mut min_y = f32::MAX;
        let mut max_x = f32::MIN;
        let mut max_y = f32::MIN;
        let mut count = 0usize;

        for (x, y) in points {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
            count += 1;
        }

        if count < 2 {
            return None;
        }

        let size = (max_x - min_x).max(max_y - min_y) * scale;

        (size.is_finite() && size >= 1.0).then_some(Self {
            center_x: (min_x + max_x) / 2.0,
            center_y: (min_y + max_y) / 2.0,
            size,
        })
    }

    /// Left edge in pixels.
    #[must_use]
    pub fn left(&self) -> f32 {
        self.center_x - self.size / 2.0
    }

    /// Top edge in pixels.
    #[must_use]
    pub fn top(&self) -> f32 {
        self.center_y - self.size / 2.0
    }

    /// Crops the region out of `image` and scales it to `target`x`target`.
    ///
    /// Parts of the region outside the image are filled with black.
    #[must_use]
    pub fn extract(&self, image: &RgbImage, target: u32) -> RgbImage {
        let mut canvas = RgbImage::new(target, target);
        let scale = target as f32 / self.size;

        let (width, height) = image.dimensions();
        let x0 = self.left().floor().max(0.0) as u32;
        let y0 = self.top().floor().max(0.0) as u32;
        let x1 = ((self.left() + self.size).ceil().max(0.0) as u32).min(width);
        let y1 = ((self.top() + self.size).ceil().max(0.0) as u32).min(height);

        if x1 <= x0 || y1 <= y0 {
            return canvas;
        }

        let crop = imageops::crop_imm(image, x0, y0, x1 - x0, y1 - y0).to_image();
        let scaled_w = (((x1 - x0) as f32 * scale).round() as u32).max(1);
        let scaled_h = (((y1 - y0) as f32 * scale).round() as u32).max(1);
        let resized = imageops::resize(&crop, scaled_w, scaled_h, FilterType::Triangle);

        let offset_x = ((x0 as f32 - self.left()) * scale).round() as i64;
        let offset_y = ((y0 as f32 - self.top()) * scale).round() as i64;
        imageops::overlay(&mut canvas, &resized, offset_x, offset_y);

        canvas
    }

    /// Maps a point from model input space back to normalized image
    /// coordinates.
    ///
    /// `(u, v, w)` are in pixels of a `input_size`-sided model input; `w` is
    /// depth on the same scale as `u`. The result's `x`/`y` are normalized by
    /// image width/height and `z` by image width.
    #[must_use]
    pub fn to_image(
        &self,
        (u, v, w): (f32, f32, f32),
        input_size: f32,
        width: u32,
        height: u32,
    ) -> (f32, f32, f32) {
        let ratio = self.size / input_size;
        let px = self.left() + u * ratio;
        let py = self.top() + v * ratio;

        (
            px / width as f32,
            py / height as f32,
            w * ratio / width as f32,
        )
    }
}

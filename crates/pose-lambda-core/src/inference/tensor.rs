//! Image to tensor conversion.

use image::RgbImage;
use ndarray::Array4;

/// Converts an RGB image into a `[1, H, W, 3]` tensor with values in `[0, 1]`.
#[must_use]
pub fn to_nhwc_tensor(image: &RgbImage) -> Array4<f32> {
    let (width, height) = image.dimensions();
    let mut tensor = Array4::<f32>::zeros((1, height as usize, width as usize, 3));

    for (x, y, pixel) in image.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, y as usize, x as usize, c]] = f32::from(pixel[c]) / 255.0;
        }
    }

    tensor
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_tensor_layout_and_range() {
        let mut image = RgbImage::new(3, 2);
        image.put_pixel(2, 1, Rgb([255, 0, 51]));

        let tensor = to_nhwc_tensor(&image);
        assert_eq!(tensor.shape(), &[1, 2, 3, 3]);
        assert!((tensor[[0, 1, 2, 0]] - 1.0).abs() < 1e-6);
        assert!(tensor[[0, 1, 2, 1]].abs() < 1e-6);
        assert!((tensor[[0, 1, 2, 2]] - 0.2).abs() < 1e-6);
        assert!(tensor[[0, 0, 0, 0]].abs() < 1e-6);
    }
}

//! CPU image operations for the depth pipeline.
//!
//! All operations work on `image` crate buffers. The signed-to-unsigned
//! decode and the post-colormap channel swap are deliberate, documented steps
//! of the output contract, not general-purpose conversions.

mod colormap;

pub use colormap::{apply_magma, magma_lut};

use common_io::PipelineError;
use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, Rgb, RgbImage};

/// Wrap raw interleaved RGB bytes as a typed image without copying.
pub fn wrap_rgb(data: Vec<u8>, width: u32, height: u32) -> Result<RgbImage, PipelineError> {
    let expected = width as usize * height as usize * 3;
    if data.len() != expected {
        return Err(PipelineError::SizeMismatch {
            expected,
            actual: data.len(),
        });
    }
    ImageBuffer::from_raw(width, height, data)
        .ok_or_else(|| PipelineError::Processing("RGB buffer rejected by image wrapper".into()))
}

/// Bilinear resize.
pub fn resize_rgb(img: &RgbImage, width: u32, height: u32) -> RgbImage {
    imageops::resize(img, width, height, FilterType::Triangle)
}

/// 3x3 box smoothing with edge clamping.
pub fn box_smooth(img: &RgbImage) -> RgbImage {
    let (w, h) = (img.width(), img.height());
    let mut out = RgbImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u32; 3];
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    let sx = (x as i64 + dx).clamp(0, w as i64 - 1) as u32;
                    let sy = (y as i64 + dy).clamp(0, h as i64 - 1) as u32;
                    let p = img.get_pixel(sx, sy);
                    acc[0] += p.0[0] as u32;
                    acc[1] += p.0[1] as u32;
                    acc[2] += p.0[2] as u32;
                }
            }
            out.put_pixel(
                x,
                y,
                Rgb([(acc[0] / 9) as u8, (acc[1] / 9) as u8, (acc[2] / 9) as u8]),
            );
        }
    }
    out
}

/// Decode raw signed-byte model output into an unsigned grayscale image.
///
/// The model stores depth as signed bytes; the display path wants unsigned.
/// Each element is mapped `unsigned = signed + 128`, clamped to [0, 255]:
/// -128 -> 0, 0 -> 128, 127 -> 255.
pub fn decode_i8(raw: &[u8], width: u32, height: u32) -> Result<GrayImage, PipelineError> {
    let expected = width as usize * height as usize;
    if raw.len() != expected {
        return Err(PipelineError::SizeMismatch {
            expected,
            actual: raw.len(),
        });
    }
    let data: Vec<u8> = raw
        .iter()
        .map(|&b| ((b as i8 as i16) + 128).clamp(0, 255) as u8)
        .collect();
    Ok(ImageBuffer::from_raw(width, height, data).expect("sized above"))
}

/// Stretch pixel values to the full [0, 255] range.
///
/// A constant image maps to all zeros.
pub fn normalize_minmax(img: &GrayImage) -> GrayImage {
    let mut min = u8::MAX;
    let mut max = u8::MIN;
    for p in img.pixels() {
        min = min.min(p.0[0]);
        max = max.max(p.0[0]);
    }
    if max <= min {
        return GrayImage::new(img.width(), img.height());
    }
    let range = (max - min) as u32;
    let mut out = GrayImage::new(img.width(), img.height());
    for (x, y, p) in img.enumerate_pixels() {
        let v = ((p.0[0] - min) as u32 * 255 + range / 2) / range;
        out.put_pixel(x, y, image::Luma([v as u8]));
    }
    out
}

/// Swap the R and B channels in place.
pub fn swap_rb(img: &mut RgbImage) {
    for p in img.pixels_mut() {
        p.0.swap(0, 2);
    }
}

/// Concatenate two images side by side. Heights must match.
pub fn hconcat(left: &RgbImage, right: &RgbImage) -> Result<RgbImage, PipelineError> {
    if left.height() != right.height() {
        return Err(PipelineError::DimensionMismatch(format!(
            "hconcat height mismatch: {} vs {}",
            left.height(),
            right.height()
        )));
    }
    let mut out = RgbImage::new(left.width() + right.width(), left.height());
    imageops::replace(&mut out, left, 0, 0);
    imageops::replace(&mut out, right, left.width() as i64, 0);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_rgb_checks_length() {
        assert!(wrap_rgb(vec![0u8; 4 * 4 * 3], 4, 4).is_ok());
        let err = wrap_rgb(vec![0u8; 10], 4, 4).unwrap_err();
        assert!(matches!(err, PipelineError::SizeMismatch { expected: 48, actual: 10 }));
    }

    #[test]
    fn test_decode_i8_mapping() {
        // stored -128 -> 0, 0 -> 128, 127 -> 255
        let raw = [(-128i8) as u8, 0u8, 127i8 as u8, (-1i8) as u8];
        let img = decode_i8(&raw, 4, 1).unwrap();
        let vals: Vec<u8> = img.pixels().map(|p| p.0[0]).collect();
        assert_eq!(vals, vec![0, 128, 255, 127]);
    }

    #[test]
    fn test_decode_i8_rejects_wrong_size() {
        assert!(decode_i8(&[0u8; 5], 4, 1).is_err());
    }

    #[test]
    fn test_normalize_minmax_stretches_range() {
        let mut img = GrayImage::new(3, 1);
        img.put_pixel(0, 0, image::Luma([50]));
        img.put_pixel(1, 0, image::Luma([100]));
        img.put_pixel(2, 0, image::Luma([150]));
        let out = normalize_minmax(&img);
        assert_eq!(out.get_pixel(0, 0).0[0], 0);
        assert_eq!(out.get_pixel(1, 0).0[0], 128);
        assert_eq!(out.get_pixel(2, 0).0[0], 255);
    }

    #[test]
    fn test_normalize_minmax_constant_image() {
        let img = GrayImage::from_pixel(4, 4, image::Luma([77]));
        let out = normalize_minmax(&img);
        assert!(out.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn test_swap_rb_is_involution() {
        let mut img = RgbImage::from_pixel(2, 2, Rgb([10, 20, 30]));
        swap_rb(&mut img);
        assert_eq!(img.get_pixel(0, 0).0, [30, 20, 10]);
        swap_rb(&mut img);
        assert_eq!(img.get_pixel(0, 0).0, [10, 20, 30]);
    }

    #[test]
    fn test_hconcat_dimensions_and_content() {
        let left = RgbImage::from_pixel(2, 2, Rgb([1, 1, 1]));
        let right = RgbImage::from_pixel(3, 2, Rgb([2, 2, 2]));
        let out = hconcat(&left, &right).unwrap();
        assert_eq!((out.width(), out.height()), (5, 2));
        assert_eq!(out.get_pixel(0, 0).0, [1, 1, 1]);
        assert_eq!(out.get_pixel(2, 0).0, [2, 2, 2]);
    }

    #[test]
    fn test_hconcat_rejects_height_mismatch() {
        let left = RgbImage::new(2, 2);
        let right = RgbImage::new(2, 3);
        assert!(hconcat(&left, &right).is_err());
    }

    #[test]
    fn test_box_smooth_preserves_constant_image() {
        let img = RgbImage::from_pixel(5, 5, Rgb([90, 90, 90]));
        let out = box_smooth(&img);
        assert!(out.pixels().all(|p| p.0 == [90, 90, 90]));
    }

    #[test]
    fn test_resize_rgb_dimensions() {
        let img = RgbImage::new(640, 480);
        let out = resize_rgb(&img, 256, 256);
        assert_eq!((out.width(), out.height()), (256, 256));
    }
}

//! Fixed perceptual colormap for depth visualization.
//!
//! The 256-entry LUT is interpolated from published magma anchor stops at
//! build time of the table, so the palette is a constant of the binary and
//! not a runtime dependency.

use image::{GrayImage, Rgb, RgbImage};
use std::sync::OnceLock;

// Magma anchor stops at t = 0.0, 0.2, 0.4, 0.6, 0.8, 1.0.
const MAGMA_STOPS: [[u8; 3]; 6] = [
    [0, 0, 4],
    [59, 15, 112],
    [140, 41, 129],
    [222, 73, 104],
    [254, 159, 109],
    [252, 253, 191],
];

static MAGMA_LUT: OnceLock<[[u8; 3]; 256]> = OnceLock::new();

fn lerp(a: u8, b: u8, t: f32) -> u8 {
    (a as f32 + (b as f32 - a as f32) * t).round() as u8
}

/// The full 256-entry magma table, gray value -> RGB.
pub fn magma_lut() -> &'static [[u8; 3]; 256] {
    MAGMA_LUT.get_or_init(|| {
        let mut lut = [[0u8; 3]; 256];
        let segments = MAGMA_STOPS.len() - 1;
        for (i, entry) in lut.iter_mut().enumerate() {
            let pos = i as f32 / 255.0 * segments as f32;
            let seg = (pos.floor() as usize).min(segments - 1);
            let t = pos - seg as f32;
            let lo = MAGMA_STOPS[seg];
            let hi = MAGMA_STOPS[seg + 1];
            *entry = [
                lerp(lo[0], hi[0], t),
                lerp(lo[1], hi[1], t),
                lerp(lo[2], hi[2], t),
            ];
        }
        lut
    })
}

/// Map a single-channel image through the magma palette.
pub fn apply_magma(img: &GrayImage) -> RgbImage {
    let lut = magma_lut();
    let mut out = RgbImage::new(img.width(), img.height());
    for (x, y, pixel) in img.enumerate_pixels() {
        out.put_pixel(x, y, Rgb(lut[pixel.0[0] as usize]));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lut_endpoints() {
        let lut = magma_lut();
        assert_eq!(lut[0], [0, 0, 4]);
        assert_eq!(lut[255], [252, 253, 191]);
    }

    #[test]
    fn test_lut_red_channel_is_nondecreasing() {
        let lut = magma_lut();
        for pair in lut.windows(2) {
            assert!(pair[1][0] >= pair[0][0]);
        }
    }

    #[test]
    fn test_apply_magma_dimensions() {
        let gray = GrayImage::from_pixel(8, 4, image::Luma([128]));
        let rgb = apply_magma(&gray);
        assert_eq!((rgb.width(), rgb.height()), (8, 4));
    }
}

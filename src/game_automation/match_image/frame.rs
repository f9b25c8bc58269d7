//! Captured frames normalised to the canonical render resolution, plus the
//! colour conversions every region statistic is expressed in.

use image::{GrayImage, ImageBuffer, Luma, RgbImage, imageops::FilterType};
use std::ops::Deref;

/// Width every frame is normalised to before analysis.
pub const CANONICAL_WIDTH: u32 = 1600;
/// Height every frame is normalised to before analysis.
pub const CANONICAL_HEIGHT: u32 = 900;

/// An immutable RGB frame at 1600x900.
///
/// All fixed coordinates used by the classifier and the driver are expressed
/// in this space, whatever the emulator's native resolution is.
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    /// Wrap an image, resizing it to the canonical resolution if needed.
    pub fn new(image: RgbImage) -> Self {
        if image.dimensions() == (CANONICAL_WIDTH, CANONICAL_HEIGHT) {
            return Self { image };
        }
        log::debug!(
            "Normalising frame {}x{} -> {}x{}",
            image.width(),
            image.height(),
            CANONICAL_WIDTH,
            CANONICAL_HEIGHT
        );
        let image = image::imageops::resize(
            &image,
            CANONICAL_WIDTH,
            CANONICAL_HEIGHT,
            FilterType::Triangle,
        );
        Self { image }
    }

    /// Decode PNG/JPEG bytes (e.g. `screencap -p` output) into a frame.
    pub fn from_encoded(bytes: &[u8]) -> Result<Self, image::ImageError> {
        let decoded = image::load_from_memory(bytes)?;
        Ok(Self::new(decoded.to_rgb8()))
    }

    /// A frame filled with one colour. Mostly useful for tests and tooling.
    pub fn filled(rgb: [u8; 3]) -> Self {
        Self {
            image: ImageBuffer::from_pixel(CANONICAL_WIDTH, CANONICAL_HEIGHT, image::Rgb(rgb)),
        }
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Luma plane of the whole frame, using [`luma`] weights.
    pub fn to_gray(&self) -> GrayImage {
        to_gray(&self.image)
    }

    pub fn into_inner(self) -> RgbImage {
        self.image
    }
}

impl Deref for Frame {
    type Target = RgbImage;

    fn deref(&self) -> &RgbImage {
        &self.image
    }
}

/// 8-bit HSV with hue halved into 0..=180, the scale all colour ranges use.
#[inline]
pub fn rgb_to_hsv(rgb: [u8; 3]) -> [u8; 3] {
    let r = rgb[0] as i32;
    let g = rgb[1] as i32;
    let b = rgb[2] as i32;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let v = max;
    let s = if max == 0 {
        0
    } else {
        (255 * delta + max / 2) / max
    };

    let h = if delta == 0 {
        0.0
    } else {
        let d = delta as f32;
        let mut deg = if max == r {
            60.0 * (g - b) as f32 / d
        } else if max == g {
            120.0 + 60.0 * (b - r) as f32 / d
        } else {
            240.0 + 60.0 * (r - g) as f32 / d
        };
        if deg < 0.0 {
            deg += 360.0;
        }
        deg / 2.0
    };

    let h = (h.round() as i32).clamp(0, 180);
    [h as u8, s.clamp(0, 255) as u8, v as u8]
}

/// Luma with BT.601 weights (0.299, 0.587, 0.114).
#[inline]
pub fn luma(rgb: [u8; 3]) -> u8 {
    let y = 299 * rgb[0] as u32 + 587 * rgb[1] as u32 + 114 * rgb[2] as u32;
    ((y + 500) / 1000).min(255) as u8
}

/// Luma plane of any RGB image.
pub fn to_gray(image: &RgbImage) -> GrayImage {
    let mut gray = GrayImage::new(image.width(), image.height());
    for (x, y, pixel) in image.enumerate_pixels() {
        gray.put_pixel(x, y, Luma([luma(pixel.0)]));
    }
    gray
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hsv_primary_colours() {
        assert_eq!(rgb_to_hsv([255, 0, 0]), [0, 255, 255]);
        assert_eq!(rgb_to_hsv([0, 255, 0]), [60, 255, 255]);
        assert_eq!(rgb_to_hsv([0, 0, 255]), [120, 255, 255]);
    }

    #[test]
    fn test_hsv_greys_have_no_saturation() {
        assert_eq!(rgb_to_hsv([0, 0, 0]), [0, 0, 0]);
        assert_eq!(rgb_to_hsv([128, 128, 128]), [0, 0, 128]);
        assert_eq!(rgb_to_hsv([255, 255, 255]), [0, 0, 255]);
    }

    #[test]
    fn test_hsv_orange_lands_in_accent_band() {
        // Typical confirm-button orange
        let [h, s, v] = rgb_to_hsv([240, 140, 20]);
        assert!((10..=25).contains(&h), "hue {h}");
        assert!(s >= 150 && v >= 150);
    }

    #[test]
    fn test_luma_weights() {
        assert_eq!(luma([0, 0, 0]), 0);
        assert_eq!(luma([255, 255, 255]), 255);
        assert_eq!(luma([255, 0, 0]), 76);
        assert_eq!(luma([0, 255, 0]), 150);
    }

    #[test]
    fn test_frame_is_resized_to_canonical() {
        let small = RgbImage::from_pixel(800, 450, image::Rgb([10, 20, 30]));
        let frame = Frame::new(small);
        assert_eq!(frame.dimensions(), (CANONICAL_WIDTH, CANONICAL_HEIGHT));
        assert_eq!(frame.get_pixel(5, 5).0, [10, 20, 30]);
    }

    #[test]
    fn test_frame_from_encoded_png() {
        let source = RgbImage::from_pixel(CANONICAL_WIDTH, CANONICAL_HEIGHT, image::Rgb([1, 2, 3]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(source)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        let frame = Frame::from_encoded(&bytes).unwrap();
        assert_eq!(frame.get_pixel(100, 100).0, [1, 2, 3]);
    }
}

//! Keypoint matching for UI elements that move or animate between frames
//!
//! FAST-9 corners, oriented by intensity centroid, described by a steered
//! 256-bit BRIEF pattern and compared by Hamming distance. Correspondences
//! are accepted with a nearest/second-nearest ratio test.

use image::GrayImage;
use imageproc::corners::corners_fast9;
use imageproc::filter::gaussian_blur_f32;

pub type Descriptor = [u8; 32];

const FAST_THRESHOLD: u8 = 20;
const MAX_KEYPOINTS: usize = 500;
const ORIENTATION_RADIUS: i32 = 15;
/// Rotated pattern offsets reach 13 * sqrt(2) pixels, keep clear of that.
const BORDER: u32 = 20;
const BLUR_SIGMA: f32 = 2.0;
const PAIRS: usize = 256;

static PATTERN: [[i8; 4]; PAIRS] = brief_pattern();

/// Fixed sampling pattern: 256 point pairs with offsets in -13..=13.
const fn brief_pattern() -> [[i8; 4]; PAIRS] {
    let mut pattern = [[0i8; 4]; PAIRS];
    let mut state: u32 = 0x9E37_79B9;
    let mut i = 0;
    while i < PAIRS {
        let mut j = 0;
        while j < 4 {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            pattern[i][j] = (state % 27) as i8 - 13;
            j += 1;
        }
        i += 1;
    }
    pattern
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub x: u32,
    pub y: u32,
    pub angle: f32,
    pub descriptor: Descriptor,
}

#[derive(Debug, Clone)]
pub struct FeatureMatcher {
    ratio: f32,
}

impl FeatureMatcher {
    pub fn new(ratio: f32) -> Self {
        Self { ratio }
    }

    /// Detect and describe up to 500 of the strongest corners.
    pub fn extract(&self, gray: &GrayImage) -> Vec<Feature> {
        let (w, h) = gray.dimensions();
        if w <= 2 * BORDER || h <= 2 * BORDER {
            return Vec::new();
        }

        let mut corners: Vec<_> = corners_fast9(gray, FAST_THRESHOLD)
            .into_iter()
            .filter(|c| c.x >= BORDER && c.y >= BORDER && c.x < w - BORDER && c.y < h - BORDER)
            .collect();
        corners.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        corners.truncate(MAX_KEYPOINTS);
        if corners.is_empty() {
            return Vec::new();
        }

        let smoothed = gaussian_blur_f32(gray, BLUR_SIGMA);
        corners
            .into_iter()
            .map(|c| {
                let angle = orientation(gray, c.x, c.y);
                Feature {
                    x: c.x,
                    y: c.y,
                    angle,
                    descriptor: steered_brief(&smoothed, c.x, c.y, angle),
                }
            })
            .collect()
    }

    /// Number of reference features whose nearest scene descriptor passes
    /// the ratio test. Zero when either side cannot form a pair.
    pub fn good_matches(&self, reference: &[Feature], scene: &[Feature]) -> usize {
        if reference.is_empty() || scene.len() < 2 {
            return 0;
        }
        reference
            .iter()
            .filter(|r| {
                let (best, second) = two_nearest(&r.descriptor, scene);
                (best as f32) < self.ratio * second as f32
            })
            .count()
    }
}

fn two_nearest(descriptor: &Descriptor, scene: &[Feature]) -> (u32, u32) {
    let mut best = u32::MAX;
    let mut second = u32::MAX;
    for candidate in scene {
        let d = hamming_distance(descriptor, &candidate.descriptor);
        if d < best {
            second = best;
            best = d;
        } else if d < second {
            second = d;
        }
    }
    (best, second)
}

pub fn hamming_distance(a: &Descriptor, b: &Descriptor) -> u32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x ^ y).count_ones()).sum()
}

/// Angle from the corner to the intensity centroid of its disc.
fn orientation(gray: &GrayImage, x: u32, y: u32) -> f32 {
    let (cx, cy) = (x as i32, y as i32);
    let mut m01 = 0.0f32;
    let mut m10 = 0.0f32;
    for dy in -ORIENTATION_RADIUS..=ORIENTATION_RADIUS {
        for dx in -ORIENTATION_RADIUS..=ORIENTATION_RADIUS {
            if dx * dx + dy * dy > ORIENTATION_RADIUS * ORIENTATION_RADIUS {
                continue;
            }
            let v = gray.get_pixel((cx + dx) as u32, (cy + dy) as u32)[0] as f32;
            m10 += dx as f32 * v;
            m01 += dy as f32 * v;
        }
    }
    m01.atan2(m10)
}

fn steered_brief(smoothed: &GrayImage, x: u32, y: u32, angle: f32) -> Descriptor {
    let (sin, cos) = angle.sin_cos();
    let sample = |ox: i8, oy: i8| {
        let (ox, oy) = (ox as f32, oy as f32);
        let rx = (cos * ox - sin * oy).round() as i32;
        let ry = (sin * ox + cos * oy).round() as i32;
        smoothed.get_pixel((x as i32 + rx) as u32, (y as i32 + ry) as u32)[0]
    };

    let mut descriptor = [0u8; 32];
    for (i, [x1, y1, x2, y2]) in PATTERN.iter().copied().enumerate() {
        if sample(x1, y1) < sample(x2, y2) {
            descriptor[i / 8] |= 1 << (i % 8);
        }
    }
    descriptor
}

//! Template correlation search with non-maximum suppression
//!
//! Scores are the zero-mean normalised correlation coefficient in `[-1, 1]`,
//! accumulated in f64 against a mean-subtracted template. Window variances
//! come from summed-area tables; extremes are located with imageproc.

use super::region::SearchRegion;
use super::template::ReferenceAsset;
use image::{GrayImage, ImageBuffer, Luma};
use imageproc::template_matching::find_extremes;

/// A match, reported at the template's centre in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplateMatch {
    pub x: u32,
    pub y: u32,
    pub confidence: f32,
}

impl TemplateMatch {
    pub fn new(x: u32, y: u32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }

    pub fn position(&self) -> (u32, u32) {
        (self.x, self.y)
    }
}

/// Correlation score for every placement of `template` inside `image`.
///
/// Windows or templates with less than one grey level of variance per pixel
/// score 0. Returns `None` when the template does not fit.
pub fn correlation_map(
    image: &GrayImage,
    template: &GrayImage,
) -> Option<ImageBuffer<Luma<f32>, Vec<f32>>> {
    let (iw, ih) = image.dimensions();
    let (tw, th) = template.dimensions();
    if tw == 0 || th == 0 || tw > iw || th > ih {
        return None;
    }

    let n = (tw * th) as f64;
    let t_mean = template.pixels().map(|p| p[0] as f64).sum::<f64>() / n;
    let centred: Vec<f64> = template.pixels().map(|p| p[0] as f64 - t_mean).collect();
    let t_var: f64 = centred.iter().map(|v| v * v).sum();

    let table = SummedArea::new(image);
    let raw = image.as_raw();
    let (stride, tw_us) = (iw as usize, tw as usize);

    let mut scores = ImageBuffer::new(iw - tw + 1, ih - th + 1);
    if t_var < n {
        return Some(scores);
    }
    for y in 0..=(ih - th) {
        for x in 0..=(iw - tw) {
            let (w_sum, w_sq) = table.window(x, y, tw, th);
            let w_var = w_sq - w_sum * w_sum / n;
            if w_var < n {
                continue;
            }
            // Sum of (t - mean) * w; the window mean cancels against the zero-mean template
            let mut numerator = 0.0f64;
            for ty in 0..th as usize {
                let start = (y as usize + ty) * stride + x as usize;
                let row = &raw[start..start + tw_us];
                let t_row = &centred[ty * tw_us..(ty + 1) * tw_us];
                numerator += row
                    .iter()
                    .zip(t_row)
                    .map(|(&w, &t)| w as f64 * t)
                    .sum::<f64>();
            }
            let score = (numerator / (w_var * t_var).sqrt()).clamp(-1.0, 1.0);
            scores.put_pixel(x, y, Luma([score as f32]));
        }
    }
    Some(scores)
}

/// Best placement of `asset` inside its search region of `gray`, if its
/// score reaches `threshold`.
pub fn find_best(gray: &GrayImage, asset: &ReferenceAsset, threshold: f32) -> Option<TemplateMatch> {
    let region = &asset.search_region;
    let scores = region_scores(gray, asset, region)?;
    let extremes = find_extremes(&scores);
    log::debug!(
        "Template '{}' best score {:.3} at {:?}",
        asset.name,
        extremes.max_value,
        extremes.max_value_location
    );
    if extremes.max_value < threshold {
        return None;
    }
    let (mx, my) = extremes.max_value_location;
    Some(TemplateMatch::new(
        region.x + mx + asset.width() / 2,
        region.y + my + asset.height() / 2,
        extremes.max_value,
    ))
}

/// Every placement scoring at least `threshold`, reduced by [`non_max_suppression`].
pub fn find_all(gray: &GrayImage, asset: &ReferenceAsset, threshold: f32) -> Vec<TemplateMatch> {
    let region = &asset.search_region;
    let Some(scores) = region_scores(gray, asset, region) else {
        return Vec::new();
    };
    let candidates: Vec<TemplateMatch> = scores
        .enumerate_pixels()
        .filter(|(_, _, p)| p[0] >= threshold)
        .map(|(x, y, p)| {
            TemplateMatch::new(
                region.x + x + asset.width() / 2,
                region.y + y + asset.height() / 2,
                p[0],
            )
        })
        .collect();
    non_max_suppression(candidates, asset.width(), asset.height())
}

/// Best score of `template` anywhere in `image`, or 0 if it does not fit.
pub fn best_score(image: &GrayImage, template: &GrayImage) -> f32 {
    correlation_map(image, template)
        .map(|scores| find_extremes(&scores).max_value)
        .unwrap_or(0.0)
}

fn region_scores(
    gray: &GrayImage,
    asset: &ReferenceAsset,
    region: &SearchRegion,
) -> Option<ImageBuffer<Luma<f32>, Vec<f32>>> {
    if region.x == 0 && region.y == 0 && region.width >= gray.width() && region.height >= gray.height() {
        return correlation_map(gray, &asset.gray);
    }
    let w = region.width.min(gray.width().saturating_sub(region.x));
    let h = region.height.min(gray.height().saturating_sub(region.y));
    let cropped = image::imageops::crop_imm(gray, region.x, region.y, w, h).to_image();
    correlation_map(&cropped, &asset.gray)
}

/// Collapse overlapping detections: highest confidence first, a match is kept
/// only if its centre is not within half the template size of a kept one.
pub fn non_max_suppression(
    mut matches: Vec<TemplateMatch>,
    width: u32,
    height: u32,
) -> Vec<TemplateMatch> {
    // Stable, so equal scores keep scan order
    matches.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let half_w = width as f32 * 0.5;
    let half_h = height as f32 * 0.5;
    let mut kept: Vec<TemplateMatch> = Vec::new();
    for candidate in matches {
        let overlaps = kept.iter().any(|k| {
            (candidate.x as f32 - k.x as f32).abs() < half_w
                && (candidate.y as f32 - k.y as f32).abs() < half_h
        });
        if !overlaps {
            kept.push(candidate);
        }
    }
    kept
}

/// Window sums and sums of squares over a grey image.
struct SummedArea {
    stride: usize,
    sum: Vec<f64>,
    sq: Vec<f64>,
}

impl SummedArea {
    fn new(image: &GrayImage) -> Self {
        let (w, h) = (image.width() as usize, image.height() as usize);
        let stride = w + 1;
        let mut sum = vec![0.0; stride * (h + 1)];
        let mut sq = vec![0.0; stride * (h + 1)];
        for y in 0..h {
            let mut row_sum = 0.0;
            let mut row_sq = 0.0;
            for x in 0..w {
                let v = image.get_pixel(x as u32, y as u32)[0] as f64;
                row_sum += v;
                row_sq += v * v;
                let idx = (y + 1) * stride + x + 1;
                sum[idx] = sum[idx - stride] + row_sum;
                sq[idx] = sq[idx - stride] + row_sq;
            }
        }
        Self { stride, sum, sq }
    }

    fn window(&self, x: u32, y: u32, w: u32, h: u32) -> (f64, f64) {
        let (x0, y0) = (x as usize, y as usize);
        let (x1, y1) = (x0 + w as usize, y0 + h as usize);
        let at = |table: &[f64], x: usize, y: usize| table[y * self.stride + x];
        let rect = |table: &[f64]| at(table, x1, y1) - at(table, x0, y1) - at(table, x1, y0) + at(table, x0, y0);
        (rect(&self.sum), rect(&self.sq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    /// Deterministic texture so correlation peaks are unambiguous.
    fn textured(w: u32, h: u32, seed: u32) -> GrayImage {
        let mut state = seed.wrapping_mul(2654435761).max(1);
        GrayImage::from_fn(w, h, |_, _| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            Luma([(state % 256) as u8])
        })
    }

    fn asset_from(gray: GrayImage, region: SearchRegion) -> ReferenceAsset {
        ReferenceAsset {
            name: "window".to_string(),
            path: PathBuf::new(),
            kind: super::super::template::AssetKind::Correlation,
            search_region: region,
            gray,
        }
    }

    #[test]
    fn test_nms_keeps_higher_confidence_of_overlapping_pair() {
        let matches = vec![
            TemplateMatch::new(100, 100, 0.85),
            TemplateMatch::new(105, 102, 0.92),
        ];
        let kept = non_max_suppression(matches, 40, 40);
        assert_eq!(kept, vec![TemplateMatch::new(105, 102, 0.92)]);
    }

    #[test]
    fn test_nms_keeps_separated_matches() {
        let matches = vec![
            TemplateMatch::new(100, 100, 0.9),
            TemplateMatch::new(300, 100, 0.8),
            TemplateMatch::new(100, 121, 0.95),
        ];
        let kept = non_max_suppression(matches, 40, 40);
        assert_eq!(kept.len(), 3);
        assert_eq!(kept[0].confidence, 0.95);
    }

    #[test]
    fn test_exact_patch_scores_one() {
        let image = textured(80, 60, 7);
        let patch = image::imageops::crop_imm(&image, 30, 20, 16, 12).to_image();
        let scores = correlation_map(&image, &patch).unwrap();
        let extremes = find_extremes(&scores);
        assert_eq!(extremes.max_value_location, (30, 20));
        assert!(extremes.max_value > 0.999, "score {}", extremes.max_value);
    }

    #[test]
    fn test_score_is_invariant_to_brightness_offset() {
        let image = textured(40, 40, 3);
        let patch = image::imageops::crop_imm(&image, 10, 10, 12, 12).to_image();
        let dimmed = GrayImage::from_fn(12, 12, |x, y| Luma([patch.get_pixel(x, y)[0] / 2]));
        assert!(best_score(&image, &dimmed) > 0.99);
    }

    #[test]
    fn test_flat_windows_score_zero() {
        let template = textured(200, 100, 3);
        let mut flat = GrayImage::from_pixel(400, 200, Luma([254]));
        flat.put_pixel(123, 77, Luma([255]));
        let scores = correlation_map(&flat, &template).unwrap();
        let extremes = find_extremes(&scores);
        assert_eq!(extremes.max_value, 0.0);
        assert_eq!(extremes.min_value, 0.0);

        let uniform = GrayImage::from_pixel(400, 200, Luma([250]));
        assert_eq!(best_score(&uniform, &template), 0.0);
    }

    #[test]
    fn test_unrelated_texture_scores_low() {
        let template = textured(40, 20, 3);
        let scene = textured(160, 80, 91);
        let scores = correlation_map(&scene, &template).unwrap();
        let extremes = find_extremes(&scores);
        assert!(extremes.max_value < 0.5, "max {}", extremes.max_value);
        assert!(extremes.min_value > -0.5, "min {}", extremes.min_value);
    }

    #[test]
    fn test_flat_template_scores_zero() {
        let scene = textured(60, 60, 4);
        let template = GrayImage::from_pixel(10, 10, Luma([128]));
        assert_eq!(best_score(&scene, &template), 0.0);
    }

    #[test]
    fn test_oversized_template_does_not_match() {
        let image = textured(10, 10, 1);
        let template = textured(20, 5, 2);
        assert!(correlation_map(&image, &template).is_none());
        assert_eq!(best_score(&image, &template), 0.0);
    }

    #[test]
    fn test_find_best_reports_centre_in_frame_space() {
        let frame = textured(200, 120, 11);
        let patch = image::imageops::crop_imm(&frame, 120, 60, 20, 10).to_image();
        let region = SearchRegion::new(100, 40, 80, 60, "window".to_string());
        let found = find_best(&frame, &asset_from(patch, region), 0.8).unwrap();
        assert_eq!(found.position(), (130, 65));
    }

    #[test]
    fn test_find_all_collapses_neighbourhood() {
        let frame = textured(120, 80, 5);
        let patch = image::imageops::crop_imm(&frame, 40, 30, 20, 20).to_image();
        let region = SearchRegion::new(0, 0, 120, 80, "window".to_string());
        let found = find_all(&frame, &asset_from(patch, region), 0.9);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].position(), (50, 40));
    }
}

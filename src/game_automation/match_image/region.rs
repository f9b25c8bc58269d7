//! Search regions and the pixel-count statistics measured over them

use super::frame::{CANONICAL_HEIGHT, CANONICAL_WIDTH, luma, rgb_to_hsv};
use image::RgbImage;

/// A rectangle in canonical frame coordinates (`x`/`y` inclusive, extent exclusive).
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub name: String,
}

impl SearchRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32, name: String) -> Self {
        Self {
            x,
            y,
            width,
            height,
            name,
        }
    }

    /// The whole canonical frame.
    pub fn full_screen() -> Self {
        Self::new(
            0,
            0,
            CANONICAL_WIDTH,
            CANONICAL_HEIGHT,
            "full_screen".to_string(),
        )
    }

    /// Region spanning `[x0, x1) x [y0, y1)` in pixels, clipped to the frame.
    pub fn from_bounds(name: &str, x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        let x1 = x1.min(CANONICAL_WIDTH);
        let y1 = y1.min(CANONICAL_HEIGHT);
        let x0 = x0.min(x1);
        let y0 = y0.min(y1);
        Self::new(x0, y0, x1 - x0, y1 - y0, name.to_string())
    }

    /// Region given as fractions of the frame size. Edges truncate towards
    /// zero so `0.7` of 900 rows starts at row 630.
    pub fn from_fractions(name: &str, x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        let w = CANONICAL_WIDTH as f32;
        let h = CANONICAL_HEIGHT as f32;
        Self::from_bounds(
            name,
            (w * x0) as u32,
            (h * y0) as u32,
            (w * x1) as u32,
            (h * y1) as u32,
        )
    }

    /// Rectangle of `2*half_w x 2*half_h` centred on a point, clipped to the frame.
    pub fn centered(name: &str, cx: u32, cy: u32, half_w: u32, half_h: u32) -> Self {
        Self::from_bounds(
            name,
            cx.saturating_sub(half_w),
            cy.saturating_sub(half_h),
            cx + half_w,
            cy + half_h,
        )
    }

    /// Parse region from filename format: `template-[x,y,width,height].png`
    pub fn parse_from_filename(filename: &str) -> Option<Self> {
        let region_str = Self::extract_region_string(filename)?;
        let region = Self::parse_region_coordinates(&region_str)?;
        Some(Self::clip_to_screen(region))
    }

    /// Extract region string from filename (e.g., "[300,682,50,50]")
    fn extract_region_string(filename: &str) -> Option<String> {
        if let Some(start) = filename.find('[')
            && let Some(end) = filename.find(']')
            && end > start
        {
            return Some(filename[start + 1..end].to_string());
        }
        None
    }

    /// Parse coordinates from region string (e.g., "300,682,50,50")
    fn parse_region_coordinates(region_str: &str) -> Option<SearchRegion> {
        let parts: Vec<&str> = region_str.split(',').collect();
        if parts.len() == 4
            && let (Ok(x), Ok(y), Ok(width), Ok(height)) = (
                parts[0].trim().parse::<u32>(),
                parts[1].trim().parse::<u32>(),
                parts[2].trim().parse::<u32>(),
                parts[3].trim().parse::<u32>(),
            )
        {
            return Some(SearchRegion::new(
                x,
                y,
                width,
                height,
                format!("parsed_{}_{}_{}_{}", x, y, width, height),
            ));
        }
        None
    }

    fn clip_to_screen(mut region: SearchRegion) -> SearchRegion {
        region.x = region.x.min(CANONICAL_WIDTH.saturating_sub(1));
        region.y = region.y.min(CANONICAL_HEIGHT.saturating_sub(1));
        region.width = region.width.min(CANONICAL_WIDTH.saturating_sub(region.x));
        region.height = region.height.min(CANONICAL_HEIGHT.saturating_sub(region.y));
        region
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Copy the region out of an image, clipped to the image bounds.
    pub fn crop(&self, image: &RgbImage) -> RgbImage {
        let x = self.x.min(image.width());
        let y = self.y.min(image.height());
        let w = self.width.min(image.width() - x);
        let h = self.height.min(image.height() - y);
        image::imageops::crop_imm(image, x, y, w, h).to_image()
    }
}

/// Inclusive HSV bounds (hue 0..=180).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    #[inline]
    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|i| hsv[i] >= self.lower[i] && hsv[i] <= self.upper[i])
    }
}

/// Colour ranges the game's UI is recognised by.
pub mod palette {
    use super::HsvRange;

    /// Saturated orange of primary buttons and banners.
    pub const ACCENT_ORANGE: HsvRange = HsvRange::new([10, 150, 150], [25, 255, 255]);
    /// Orange of the language button on the card screen, less saturated.
    pub const SOFT_ORANGE: HsvRange = HsvRange::new([10, 100, 100], [25, 255, 255]);
    /// The purchase-failed confirm button.
    pub const CONFIRM_ORANGE: HsvRange = HsvRange::new([10, 120, 120], [25, 255, 255]);
    /// Parchment behind card descriptions.
    pub const BEIGE: HsvRange = HsvRange::new([15, 5, 180], [35, 80, 255]);
    pub const DARK_PANEL: HsvRange = HsvRange::new([0, 0, 0], [180, 255, 80]);
    pub const GOLD: HsvRange = HsvRange::new([15, 80, 80], [40, 255, 255]);
    pub const SILVER: HsvRange = HsvRange::new([0, 0, 150], [180, 50, 255]);
    pub const BANNER_GREEN: HsvRange = HsvRange::new([35, 80, 80], [85, 255, 255]);
    pub const START_YELLOW: HsvRange = HsvRange::new([15, 100, 100], [40, 255, 255]);
    /// Red wraps around hue 0, hence two ranges.
    pub const RED: [HsvRange; 2] = [
        HsvRange::new([0, 100, 100], [10, 255, 255]),
        HsvRange::new([160, 100, 100], [180, 255, 255]),
    ];
    /// Orange-or-red of the obstacle continue button.
    pub const WARM_BUTTON: HsvRange = HsvRange::new([0, 100, 100], [25, 255, 255]);
    /// Grey frame/edge pixels around the continue button.
    pub const EDGE_GRAY: HsvRange = HsvRange::new([0, 0, 50], [180, 50, 200]);
    /// "Pick two" badge on the card screen.
    pub const DOUBLE_PICK_BLUE: HsvRange = HsvRange::new([100, 100, 100], [130, 255, 255]);
}

/// Count pixels of `region` whose HSV value falls in any of `ranges`.
pub fn count_hsv(image: &RgbImage, region: &SearchRegion, ranges: &[HsvRange]) -> u32 {
    count_where(image, region, |rgb| {
        let hsv = rgb_to_hsv(rgb);
        ranges.iter().any(|r| r.contains(hsv))
    })
}

/// Count pixels of `region` with luma strictly above `threshold`.
pub fn count_luma_above(image: &RgbImage, region: &SearchRegion, threshold: u8) -> u32 {
    count_where(image, region, |rgb| luma(rgb) > threshold)
}

/// Count pixels of `region` with luma strictly below `threshold`.
pub fn count_luma_below(image: &RgbImage, region: &SearchRegion, threshold: u8) -> u32 {
    count_where(image, region, |rgb| luma(rgb) < threshold)
}

/// Fraction of `region` whose HSV value falls in any of `ranges`.
pub fn hsv_density(image: &RgbImage, region: &SearchRegion, ranges: &[HsvRange]) -> f32 {
    let area = clipped_area(image, region);
    if area == 0 {
        return 0.0;
    }
    count_hsv(image, region, ranges) as f32 / area as f32
}

fn clipped_area(image: &RgbImage, region: &SearchRegion) -> u32 {
    let x1 = (region.x + region.width).min(image.width());
    let y1 = (region.y + region.height).min(image.height());
    x1.saturating_sub(region.x) * y1.saturating_sub(region.y)
}

fn count_where(image: &RgbImage, region: &SearchRegion, predicate: impl Fn([u8; 3]) -> bool) -> u32 {
    let x1 = (region.x + region.width).min(image.width());
    let y1 = (region.y + region.height).min(image.height());
    let mut count = 0;
    for y in region.y..y1 {
        for x in region.x..x1 {
            if predicate(image.get_pixel(x, y).0) {
                count += 1;
            }
        }
    }
    count
}

//! Game state detection: an ordered cascade of region heuristics with two
//! keypoint-matching rules, plus the template searches the driver relies on.

use super::{
    config::ClassifierThresholds,
    features::{Feature, FeatureMatcher},
    frame::{Frame, to_gray},
    matcher::{self, TemplateMatch},
    region::{SearchRegion, count_hsv, count_luma_above, count_luma_below, hsv_density, palette},
    template::{AssetStore, CARD_FRAME, CHOICE_BOX, PURCHASE_FAILED, RETRY_BANNER, SPECIAL_BOX},
};
use crate::config::CardWeights;
use crate::game_automation::types::GameState;
use image::{GrayImage, RgbImage};
use std::cell::OnceCell;
use std::path::PathBuf;

/// Scalars measured once per frame and shared by several rules.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GlobalFeatures {
    /// Accent orange in the bottom 30% of the frame.
    pub bottom_orange: u32,
    /// Parchment in rows 50-75%, columns 10-90%.
    pub beige: u32,
    /// Dark panel pixels in the bottom-left quadrant.
    pub dark_panel: u32,
    /// Gold in the top-centre band.
    pub gold: u32,
    /// Silver or near-white in the top-centre band.
    pub silver: u32,
    /// Bright text pixels of the bottom-left best-time box.
    pub best_time_white: u32,
    /// Dark background pixels of the bottom-left best-time box.
    pub best_time_dark: u32,
    /// Red pixels of the top-right close button.
    pub cancel_red: u32,
}

impl GlobalFeatures {
    /// White-on-dark best-time box shown before a level starts and after a level up.
    pub fn level_prepare_pattern(&self, t: &ClassifierThresholds) -> bool {
        self.best_time_white > t.best_time_min_white
            && self.best_time_dark > t.best_time_min_dark
            && self.best_time_white < self.best_time_dark
            && self.beige < t.best_time_max_beige
    }
}

/// Measurements of the central purchase-failed modal.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ModalStats {
    pub bright: u32,
    pub dark: u32,
    pub button_orange: u32,
}

/// Everything the cascade asks of a frame.
///
/// [`FrameAnalysis`] measures a real frame lazily; tests can answer with
/// fixed numbers to exercise rules in isolation.
pub trait FrameSignals {
    fn global(&self) -> &GlobalFeatures;
    /// Accepted correspondences against the special box reference.
    fn special_box_matches(&self) -> usize;
    /// Accepted correspondences against the retry banner reference.
    fn retry_banner_matches(&self) -> usize;
    fn modal_stats(&self) -> ModalStats;
    /// Fraction of confirm-orange pixels around the expected confirm button.
    fn confirm_density(&self) -> f32;
    fn purchase_failed_template(&self, threshold: f32) -> bool;
    /// Orange in the card screen's (top-left, bottom-right) corners.
    fn card_banner_orange(&self) -> (u32, u32);
    fn victory_green(&self) -> u32;
    fn start_button_pixels(&self) -> u32;
    fn level_up_button_orange(&self) -> u32;
    /// (warm button pixels, grey edge pixels) in the right-side band.
    fn continue_band(&self) -> (u32, u32);
}

type Predicate = fn(&dyn FrameSignals, &ClassifierThresholds) -> bool;

/// One entry of the cascade. Earlier entries win.
pub struct CascadeRule {
    pub name: &'static str,
    pub state: GameState,
    pub predicate: Predicate,
}

/// The classification cascade, in priority order. Each predicate may assume
/// every rule above it was false.
pub static CASCADE: [CascadeRule; 11] = [
    CascadeRule {
        name: "special_box",
        state: GameState::ObstacleSpecialBox,
        predicate: |s, t| s.special_box_matches() >= t.special_box_min_matches,
    },
    CascadeRule {
        name: "purchase_failed",
        state: GameState::PurchaseFailed,
        predicate: purchase_failed,
    },
    CascadeRule {
        name: "card_selection_features",
        state: GameState::CardSelection,
        predicate: |s, t| s.retry_banner_matches() >= t.retry_banner_min_matches,
    },
    CascadeRule {
        name: "card_selection_colors",
        state: GameState::CardSelection,
        predicate: card_selection_colors,
    },
    CascadeRule {
        name: "victory",
        state: GameState::Victory,
        predicate: |s, t| {
            let g = s.global();
            g.bottom_orange > t.bottom_orange_gate
                && s.victory_green() > t.victory_min_green
                && g.beige < t.victory_max_beige
        },
    },
    CascadeRule {
        name: "level_prepare",
        state: GameState::LevelPrepare,
        predicate: |s, t| {
            s.global().level_prepare_pattern(t) && s.start_button_pixels() > t.start_button_min
        },
    },
    CascadeRule {
        name: "level_up_after",
        state: GameState::LevelUpAfter,
        predicate: |s, t| {
            let g = s.global();
            g.level_prepare_pattern(t) && g.cancel_red > t.cancel_button_min_red
        },
    },
    CascadeRule {
        name: "purchase",
        state: GameState::Purchase,
        predicate: |s, t| {
            let g = s.global();
            !g.level_prepare_pattern(t) && g.cancel_red > t.cancel_button_min_red
        },
    },
    CascadeRule {
        name: "level_up",
        state: GameState::LevelUp,
        predicate: |s, t| {
            let g = s.global();
            g.bottom_orange > t.bottom_orange_gate
                && s.level_up_button_orange() > t.level_up_min_button_orange
                && g.gold > t.level_up_min_gold
        },
    },
    CascadeRule {
        name: "obstacle_choice",
        state: GameState::ObstacleChoice,
        predicate: |s, t| {
            let g = s.global();
            g.dark_panel > t.choice_min_dark
                && g.gold > t.choice_min_gold
                && g.silver > t.choice_min_silver
                && g.bottom_orange < t.choice_max_bottom_orange
        },
    },
    CascadeRule {
        name: "obstacle_continue",
        state: GameState::ObstacleContinue,
        predicate: |s, t| {
            let (button, gray) = s.continue_band();
            button > t.continue_min_button
                && (s.global().gold > t.continue_min_gold || gray > t.continue_min_gray)
        },
    },
];

fn purchase_failed(s: &dyn FrameSignals, t: &ClassifierThresholds) -> bool {
    // A blocking modal hides the gold HUD
    if s.global().gold >= t.purchase_failed_max_gold {
        return false;
    }
    let modal = s.modal_stats();
    if modal.bright <= t.modal_min_bright
        || modal.dark <= t.modal_min_dark
        || modal.button_orange <= t.modal_min_button_orange
    {
        return false;
    }
    let density = s.confirm_density();
    density > t.confirm_density_min
        && density < t.confirm_density_max
        && s.purchase_failed_template(t.purchase_failed_template)
}

fn card_selection_colors(s: &dyn FrameSignals, t: &ClassifierThresholds) -> bool {
    let g = s.global();
    if g.beige <= t.card_min_beige {
        return false;
    }
    let (top_left, bottom_right) = s.card_banner_orange();
    let banner = (top_left > t.card_min_banner_orange || bottom_right > t.card_min_banner_orange)
        && top_left < t.card_max_top_left_orange;
    banner || g.dark_panel > t.card_min_dark_panel
}

/// Run the cascade; the first matching rule decides, else `Unknown`.
pub fn evaluate_cascade(signals: &dyn FrameSignals, thresholds: &ClassifierThresholds) -> GameState {
    for rule in CASCADE.iter() {
        if (rule.predicate)(signals, thresholds) {
            log::debug!("Cascade rule '{}' -> {}", rule.name, rule.state);
            return rule.state;
        }
    }
    log::debug!("Cascade: no rule matched {:?}", signals.global());
    GameState::Unknown
}

// Regions at 1600x900, [x0, x1) x [y0, y1)
fn region(name: &str, x0: u32, y0: u32, x1: u32, y1: u32) -> SearchRegion {
    SearchRegion::from_bounds(name, x0, y0, x1, y1)
}

fn bottom_band() -> SearchRegion {
    region("bottom_band", 0, 630, 1600, 900)
}
fn beige_band() -> SearchRegion {
    region("beige_band", 160, 450, 1440, 675)
}
fn dark_panel_quadrant() -> SearchRegion {
    region("bottom_left_quadrant", 0, 450, 400, 900)
}
fn top_band() -> SearchRegion {
    region("top_band", 480, 45, 1120, 315)
}
fn special_box_roi() -> SearchRegion {
    region("special_box", 600, 250, 1000, 650)
}
fn retry_banner_roi() -> SearchRegion {
    region("retry_banner", 1100, 700, 1600, 900)
}
fn modal_text_band() -> SearchRegion {
    region("modal_text", 480, 315, 1120, 495)
}
fn modal_button_band() -> SearchRegion {
    region("modal_button", 560, 495, 1040, 675)
}
fn confirm_button() -> SearchRegion {
    SearchRegion::centered("confirm_button", 800, 640, 100, 30)
}
fn card_top_left() -> SearchRegion {
    region("card_top_left", 0, 0, 480, 270)
}
fn card_bottom_right() -> SearchRegion {
    region("card_bottom_right", 1120, 630, 1600, 900)
}
fn best_time_box() -> SearchRegion {
    region("best_time", 0, 765, 240, 855)
}
fn start_button_band() -> SearchRegion {
    region("start_button", 640, 720, 960, 855)
}
fn cancel_button() -> SearchRegion {
    region("cancel_button", 1480, 40, 1560, 120)
}
fn level_up_button() -> SearchRegion {
    region("level_up_button", 700, 740, 900, 820)
}
fn continue_band() -> SearchRegion {
    region("continue_band", 1280, 270, 1600, 540)
}
fn double_pick_badge() -> SearchRegion {
    region("double_pick", 0, 630, 240, 765)
}

/// Lazy measurements of one frame for one classification call.
pub struct FrameAnalysis<'a> {
    frame: &'a Frame,
    classifier: &'a FrameClassifier,
    global: GlobalFeatures,
    gray: OnceCell<GrayImage>,
}

impl<'a> FrameAnalysis<'a> {
    pub fn new(frame: &'a Frame, classifier: &'a FrameClassifier) -> Self {
        let image = frame.image();
        let top = top_band();
        let best_time = best_time_box();
        let global = GlobalFeatures {
            bottom_orange: count_hsv(image, &bottom_band(), &[palette::ACCENT_ORANGE]),
            beige: count_hsv(image, &beige_band(), &[palette::BEIGE]),
            dark_panel: count_hsv(image, &dark_panel_quadrant(), &[palette::DARK_PANEL]),
            gold: count_hsv(image, &top, &[palette::GOLD]),
            silver: count_hsv(image, &top, &[palette::SILVER]),
            best_time_white: count_luma_above(image, &best_time, 200),
            best_time_dark: count_luma_below(image, &best_time, 60),
            cancel_red: count_hsv(image, &cancel_button(), &palette::RED),
        };
        Self {
            frame,
            classifier,
            global,
            gray: OnceCell::new(),
        }
    }

    fn gray(&self) -> &GrayImage {
        self.gray.get_or_init(|| self.frame.to_gray())
    }

    fn feature_matches(&self, reference: &[Feature], roi: SearchRegion) -> usize {
        if reference.is_empty() {
            return 0;
        }
        let crop = to_gray(&roi.crop(self.frame.image()));
        let matcher = &self.classifier.features;
        let count = matcher.good_matches(reference, &matcher.extract(&crop));
        log::debug!("Feature matches in {}: {}", roi.name, count);
        count
    }
}

impl FrameSignals for FrameAnalysis<'_> {
    fn global(&self) -> &GlobalFeatures {
        &self.global
    }

    fn special_box_matches(&self) -> usize {
        self.feature_matches(&self.classifier.special_box, special_box_roi())
    }

    fn retry_banner_matches(&self) -> usize {
        self.feature_matches(&self.classifier.retry_banner, retry_banner_roi())
    }

    fn modal_stats(&self) -> ModalStats {
        let image = self.frame.image();
        let text = modal_text_band();
        ModalStats {
            bright: count_luma_above(image, &text, 200),
            dark: count_luma_below(image, &text, 80),
            button_orange: count_hsv(image, &modal_button_band(), &[palette::ACCENT_ORANGE]),
        }
    }

    fn confirm_density(&self) -> f32 {
        hsv_density(self.frame.image(), &confirm_button(), &[palette::CONFIRM_ORANGE])
    }

    fn purchase_failed_template(&self, threshold: f32) -> bool {
        self.classifier
            .assets
            .get(PURCHASE_FAILED)
            .and_then(|asset| matcher::find_best(self.gray(), asset, threshold))
            .is_some()
    }

    fn card_banner_orange(&self) -> (u32, u32) {
        let image = self.frame.image();
        (
            count_hsv(image, &card_top_left(), &[palette::SOFT_ORANGE]),
            count_hsv(image, &card_bottom_right(), &[palette::ACCENT_ORANGE]),
        )
    }

    fn victory_green(&self) -> u32 {
        count_hsv(self.frame.image(), &top_band(), &[palette::BANNER_GREEN])
    }

    fn start_button_pixels(&self) -> u32 {
        count_hsv(self.frame.image(), &start_button_band(), &[palette::START_YELLOW])
    }

    fn level_up_button_orange(&self) -> u32 {
        count_hsv(self.frame.image(), &level_up_button(), &[palette::ACCENT_ORANGE])
    }

    fn continue_band(&self) -> (u32, u32) {
        let image = self.frame.image();
        let band = continue_band();
        (
            count_hsv(image, &band, &[palette::WARM_BUTTON]),
            count_hsv(image, &band, &[palette::EDGE_GRAY]),
        )
    }
}

/// Maps frames to [`GameState`]s. Immutable after construction, so one
/// instance can be shared across tasks.
pub struct FrameClassifier {
    assets: AssetStore,
    thresholds: ClassifierThresholds,
    features: FeatureMatcher,
    special_box: Vec<Feature>,
    retry_banner: Vec<Feature>,
    unknown_card_dir: PathBuf,
}

impl FrameClassifier {
    /// Build a classifier, extracting the keypoints of both feature assets once.
    pub fn new(
        assets: AssetStore,
        thresholds: ClassifierThresholds,
        unknown_card_dir: impl Into<PathBuf>,
    ) -> Self {
        let features = FeatureMatcher::new(thresholds.feature_ratio);
        let describe = |name: &str| match assets.get(name) {
            Some(asset) => {
                let set = features.extract(&asset.gray);
                log::info!("🔑 {} keypoints cached for '{}'", set.len(), name);
                set
            }
            None => {
                log::warn!("⚠️ Feature asset '{}' not loaded, rule disabled", name);
                Vec::new()
            }
        };
        let special_box = describe(SPECIAL_BOX);
        let retry_banner = describe(RETRY_BANNER);

        Self {
            assets,
            thresholds,
            features,
            special_box,
            retry_banner,
            unknown_card_dir: unknown_card_dir.into(),
        }
    }

    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }

    pub fn thresholds(&self) -> &ClassifierThresholds {
        &self.thresholds
    }

    pub fn classify(&self, frame: &Frame) -> GameState {
        let analysis = FrameAnalysis::new(frame, self);
        evaluate_cascade(&analysis, &self.thresholds)
    }

    /// Best match of a named template if it scores at least `threshold`.
    pub fn find_template(&self, frame: &Frame, name: &str, threshold: f32) -> Option<TemplateMatch> {
        let asset = self.assets.get(name)?;
        matcher::find_best(&frame.to_gray(), asset, threshold)
    }

    /// All matches of a named template, overlapping ones suppressed.
    pub fn find_all_templates(&self, frame: &Frame, name: &str, threshold: f32) -> Vec<TemplateMatch> {
        match self.assets.get(name) {
            Some(asset) => matcher::find_all(&frame.to_gray(), asset, threshold),
            None => Vec::new(),
        }
    }

    pub fn card_positions(&self, frame: &Frame, defaults: &[(u32, u32)]) -> Vec<(u32, u32)> {
        let found = self.find_all_templates(frame, CARD_FRAME, self.thresholds.position_template_threshold);
        if found.is_empty() {
            return defaults.to_vec();
        }
        found.iter().map(TemplateMatch::position).collect()
    }

    /// Choice boxes left to right, or `defaults` when none are found.
    pub fn choice_positions(&self, frame: &Frame, defaults: &[(u32, u32)]) -> Vec<(u32, u32)> {
        let mut found =
            self.find_all_templates(frame, CHOICE_BOX, self.thresholds.position_template_threshold);
        if found.is_empty() {
            return defaults.to_vec();
        }
        found.sort_by_key(|m| m.x);
        found.iter().map(TemplateMatch::position).collect()
    }

    /// Whether the card screen asks for two picks.
    pub fn needs_double_pick(&self, frame: &Frame) -> bool {
        count_hsv(frame.image(), &double_pick_badge(), &[palette::DOUBLE_PICK_BLUE])
            > self.thresholds.double_pick_min_blue
    }

    /// Identify the card above each position by its id glyph. Unmatched
    /// windows are saved to the unknown-card directory for labelling.
    pub fn detect_card_ids(
        &self,
        frame: &Frame,
        positions: &[(u32, u32)],
        weights: &CardWeights,
    ) -> Vec<Option<String>> {
        let t = &self.thresholds;
        // Glyphs of weighted cards first, so they win ties
        let glyphs = self.assets.card_glyphs();
        let ordered: Vec<_> = glyphs
            .iter()
            .filter(|g| weights.contains(&g.name))
            .chain(glyphs.iter().filter(|g| !weights.contains(&g.name)))
            .collect();

        positions
            .iter()
            .enumerate()
            .map(|(slot, &(x, y))| {
                let window = region(
                    "card_id",
                    x.saturating_sub(t.card_id_half_width),
                    y.saturating_sub(t.card_id_top_offset),
                    x.saturating_add(t.card_id_half_width),
                    y.saturating_sub(t.card_id_bottom_offset),
                );
                if !window.is_valid() {
                    return None;
                }
                let crop = window.crop(frame.image());
                let gray = to_gray(&crop);

                let mut best: Option<(&str, f32)> = None;
                for glyph in &ordered {
                    let score = matcher::best_score(&gray, &glyph.gray);
                    if score > t.card_id_threshold && best.is_none_or(|(_, s)| score > s) {
                        best = Some((glyph.name.as_str(), score));
                    }
                }

                match best {
                    Some((id, score)) => {
                        log::debug!("Card slot {} is '{}' ({:.3})", slot, id, score);
                        Some(id.to_string())
                    }
                    None => {
                        self.save_unknown_card(&crop, slot);
                        None
                    }
                }
            })
            .collect()
    }

    fn save_unknown_card(&self, crop: &RgbImage, slot: usize) {
        let secs = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let path = self
            .unknown_card_dir
            .join(format!("debug_unknown_card_{}_{}.png", secs, slot));
        if let Err(e) = std::fs::create_dir_all(&self.unknown_card_dir) {
            log::warn!("⚠️ Cannot create {:?}: {}", self.unknown_card_dir, e);
            return;
        }
        match crop.save(&path) {
            Ok(()) => log::warn!("❓ Unknown card in slot {}, saved {:?}", slot, path),
            Err(e) => log::warn!("⚠️ Failed to save unknown card {:?}: {}", path, e),
        }
    }
}

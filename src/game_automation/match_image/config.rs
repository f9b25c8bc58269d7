//! Calibration constants for frame classification
//!
//! Every value here was tuned by hand against 1600x900 captures of the game.
//! They are data, not derivations: a different resolution or UI theme needs
//! them re-measured, not "cleaned up".

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierThresholds {
    /// Lowe ratio: keep a correspondence only if best < ratio * second best.
    pub feature_ratio: f32,
    /// Accepted correspondences needed for the special reward box.
    pub special_box_min_matches: usize,
    /// Accepted correspondences needed for the card screen's retry banner.
    pub retry_banner_min_matches: usize,

    /// Purchase-failed is only considered below this many gold pixels.
    pub purchase_failed_max_gold: u32,
    pub modal_min_bright: u32,
    pub modal_min_dark: u32,
    pub modal_min_button_orange: u32,
    /// Exclusive bounds on the confirm button's orange density.
    pub confirm_density_min: f32,
    pub confirm_density_max: f32,
    pub purchase_failed_template: f32,

    pub card_min_beige: u32,
    pub card_min_banner_orange: u32,
    pub card_max_top_left_orange: u32,
    pub card_min_dark_panel: u32,

    /// Victory and level-up both require this much orange along the bottom.
    pub bottom_orange_gate: u32,
    pub victory_min_green: u32,
    pub victory_max_beige: u32,

    pub best_time_min_white: u32,
    pub best_time_min_dark: u32,
    pub best_time_max_beige: u32,
    pub start_button_min: u32,
    pub cancel_button_min_red: u32,

    pub level_up_min_button_orange: u32,
    pub level_up_min_gold: u32,

    pub choice_min_dark: u32,
    pub choice_min_gold: u32,
    pub choice_min_silver: u32,
    pub choice_max_bottom_orange: u32,

    pub continue_min_button: u32,
    pub continue_min_gold: u32,
    pub continue_min_gray: u32,

    pub double_pick_min_blue: u32,

    /// Default score for `find_template`.
    pub template_threshold: f32,
    /// Score for `card_frame`/`choice_box` position searches.
    pub position_template_threshold: f32,
    pub card_id_threshold: f32,
    /// Card id glyph window relative to the card centre: x +- half width,
    /// rows from `y - top` to `y - bottom`.
    pub card_id_half_width: u32,
    pub card_id_top_offset: u32,
    pub card_id_bottom_offset: u32,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            feature_ratio: 0.7,
            special_box_min_matches: 30,
            retry_banner_min_matches: 30,

            purchase_failed_max_gold: 5000,
            modal_min_bright: 2000,
            modal_min_dark: 20000,
            modal_min_button_orange: 5000,
            confirm_density_min: 0.5,
            confirm_density_max: 0.9,
            purchase_failed_template: 0.6,

            card_min_beige: 50000,
            card_min_banner_orange: 5000,
            card_max_top_left_orange: 50000,
            card_min_dark_panel: 80000,

            bottom_orange_gate: 3000,
            victory_min_green: 8000,
            victory_max_beige: 5000,

            best_time_min_white: 150,
            best_time_min_dark: 300,
            best_time_max_beige: 10000,
            start_button_min: 1000,
            cancel_button_min_red: 1000,

            level_up_min_button_orange: 8000,
            level_up_min_gold: 10000,

            choice_min_dark: 5000,
            choice_min_gold: 15000,
            choice_min_silver: 5000,
            choice_max_bottom_orange: 30000,

            continue_min_button: 2000,
            continue_min_gold: 20000,
            continue_min_gray: 2000,

            double_pick_min_blue: 1000,

            template_threshold: 0.8,
            position_template_threshold: 0.7,
            card_id_threshold: 0.85,
            card_id_half_width: 100,
            card_id_top_offset: 460,
            card_id_bottom_offset: 360,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_override_keeps_other_defaults() {
        let json = r#"{ "special_box_min_matches": 40, "confirm_density_max": 0.95 }"#;
        let thresholds: ClassifierThresholds = serde_json::from_str(json).unwrap();
        assert_eq!(thresholds.special_box_min_matches, 40);
        assert_eq!(thresholds.confirm_density_max, 0.95);
        assert_eq!(thresholds.retry_banner_min_matches, 30);
        assert_eq!(thresholds.purchase_failed_max_gold, 5000);
    }
}

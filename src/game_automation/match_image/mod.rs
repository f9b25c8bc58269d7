//! Image matching module for the game automation
//!
//! This module turns a captured frame into a game state: region colour
//! statistics, template correlation and keypoint matching, arranged as an
//! ordered classification cascade.

pub mod config;
pub mod detector;
pub mod features;
pub mod frame;
pub mod matcher;
pub mod region;
pub mod template;


// Re-export main types and functions
pub use config::ClassifierThresholds;
pub use detector::{
    CASCADE, CascadeRule, FrameAnalysis, FrameClassifier, FrameSignals, GlobalFeatures, ModalStats,
    evaluate_cascade,
};
pub use features::{Feature, FeatureMatcher};
pub use frame::{CANONICAL_HEIGHT, CANONICAL_WIDTH, Frame};
pub use matcher::{TemplateMatch, non_max_suppression};
pub use region::{HsvRange, SearchRegion};
pub use template::{AssetError, AssetKind, AssetStore, ReferenceAsset};

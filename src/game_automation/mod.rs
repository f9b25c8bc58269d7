// Game automation module
// This module classifies captured frames into game states and drives the
// game through a polling state machine plus a background continue clicker.

pub mod channels;
pub mod clicker;
pub mod error;
pub mod fsm;
pub mod match_image;
pub mod selection;
pub mod state;
pub mod types;

// Re-export the main types and functions for easy access
pub use channels::create_automation_channels;
pub use clicker::ContinueClicker;
pub use error::{AutomationError, AutomationResult};
pub use fsm::GameAutomation;
pub use match_image::{AssetStore, ClassifierThresholds, Frame, FrameClassifier, TemplateMatch};
pub use selection::select_best_card;
pub use state::{AutomationHandle, SharedState};
pub use types::{AutomationEvent, GameState, RunStatistics};

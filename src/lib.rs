pub mod adb;
pub mod config;
pub mod game_automation;

pub use adb::{AdbShell, DeviceChannel};
pub use config::{AutomationConfig, CardWeights, ConfigProvider};
pub use game_automation::{FrameClassifier, GameAutomation, GameState};

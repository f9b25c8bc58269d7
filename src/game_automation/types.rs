// Types and enums for game automation
use serde::Serialize;
use std::fmt;

/// Which game screen a frame shows. Exactly one per classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameState {
    /// No rule matched: mid-animation or combat, wait.
    Unknown,
    LevelPrepare,
    CardSelection,
    ObstacleContinue,
    ObstacleChoice,
    Victory,
    /// Never produced by the classifier; handled for completeness.
    Defeat,
    PurchaseFailed,
    Purchase,
    LevelUp,
    LevelUpAfter,
    ObstacleSpecialBox,
}

impl GameState {
    pub const ALL: [GameState; 12] = [
        GameState::Unknown,
        GameState::LevelPrepare,
        GameState::CardSelection,
        GameState::ObstacleContinue,
        GameState::ObstacleChoice,
        GameState::Victory,
        GameState::Defeat,
        GameState::PurchaseFailed,
        GameState::Purchase,
        GameState::LevelUp,
        GameState::LevelUpAfter,
        GameState::ObstacleSpecialBox,
    ];

    /// Stable snake_case name, used on the state-change stream.
    pub fn name(&self) -> &'static str {
        match self {
            GameState::Unknown => "unknown",
            GameState::LevelPrepare => "level_prepare",
            GameState::CardSelection => "card_selection",
            GameState::ObstacleContinue => "obstacle_continue",
            GameState::ObstacleChoice => "obstacle_choice",
            GameState::Victory => "victory",
            GameState::Defeat => "defeat",
            GameState::PurchaseFailed => "purchase_failed",
            GameState::Purchase => "purchase",
            GameState::LevelUp => "level_up",
            GameState::LevelUpAfter => "level_up_after",
            GameState::ObstacleSpecialBox => "obstacle_special_box",
        }
    }

    /// States whose handler runs on every poll, not only on entry.
    pub fn repeats(&self) -> bool {
        matches!(
            self,
            GameState::PurchaseFailed
                | GameState::LevelPrepare
                | GameState::CardSelection
                | GameState::ObstacleChoice
                | GameState::ObstacleSpecialBox
                | GameState::Victory
                | GameState::Purchase
                | GameState::LevelUp
                | GameState::LevelUpAfter
        )
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AutomationEvent {
    StateChanged(String),
    Log(String),
    Error(String),
}

/// Counters of logical game events. Never decremented within a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStatistics {
    pub runs: u64,
    pub cards: u64,
    pub obstacles: u64,
}

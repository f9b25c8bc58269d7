//! Configuration loaded from a directory of JSON-with-comments files
//!
//! `config.jsonc` holds coordinates, timings and classifier calibration;
//! `card_weights.jsonc` maps card ids to selection weights. Both may be
//! reloaded while automation runs.

use crate::game_automation::match_image::ClassifierThresholds;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "config.jsonc";
pub const CARD_WEIGHTS_FILE_NAME: &str = "card_weights.jsonc";

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    pub debug: bool,
    /// Preferred obstacle option, 1 to 3.
    pub obstacle_choice: u8,
    /// Sleep after every loop iteration.
    pub loop_delay_ms: u64,
    /// Minimum spacing between two captures.
    pub screenshot_interval_ms: u64,
    pub adb_host: String,
    pub adb_port: u16,
    pub adb_path: String,

    pub btn_start_pos: (u32, u32),
    pub btn_retry_pos: (u32, u32),
    pub btn_continue_pos: (u32, u32),
    pub btn_purchase_confirm_pos: (u32, u32),
    pub btn_level_up_pos: (u32, u32),
    pub btn_cancel_purchase_pos: (u32, u32),
    pub btn_open_chest_pos: (u32, u32),
    pub card_positions: Vec<(u32, u32)>,
    pub choice_positions: Vec<(u32, u32)>,

    /// Where unrecognised card id crops are written.
    pub unknown_card_dir: PathBuf,
    /// Also hold the continue clicker while a run is being (re)started.
    pub clicker_respects_continue_pause: bool,
    pub thresholds: ClassifierThresholds,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            debug: false,
            obstacle_choice: 3,
            loop_delay_ms: 500,
            screenshot_interval_ms: 200,
            adb_host: "127.0.0.1".to_string(),
            adb_port: 5555,
            adb_path: "adb".to_string(),
            btn_start_pos: (900, 800),
            btn_retry_pos: (900, 800),
            btn_continue_pos: (1500, 350),
            btn_purchase_confirm_pos: (900, 675),
            btn_level_up_pos: (800, 760),
            btn_cancel_purchase_pos: (1500, 200),
            btn_open_chest_pos: (800, 500),
            card_positions: vec![(400, 400), (800, 400), (1200, 400)],
            choice_positions: vec![(600, 250), (900, 250), (1200, 250)],
            unknown_card_dir: PathBuf::from("unknown_cards"),
            clicker_respects_continue_pause: false,
            thresholds: ClassifierThresholds::default(),
        }
    }
}

impl AutomationConfig {
    /// Zero-based index into the choice positions.
    pub fn obstacle_choice_index(&self) -> usize {
        self.obstacle_choice.clamp(1, 3) as usize - 1
    }

    pub fn adb_address(&self) -> String {
        format!("{}:{}", self.adb_host, self.adb_port)
    }
}

/// Card id to weight. Higher weights are picked first; unknown ids weigh nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardWeights(HashMap<String, i64>);

impl CardWeights {
    pub fn new(weights: HashMap<String, i64>) -> Self {
        Self(weights)
    }

    pub fn get(&self, id: &str) -> Option<i64> {
        self.0.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, i64)> for CardWeights {
    fn from_iter<I: IntoIterator<Item = (String, i64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Remove `//` comments that are not inside string literals.
pub fn strip_json_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if c == '/' && chars.peek() == Some(&'/') {
            // Keep the newline so line numbers in parse errors still match
            for skipped in chars.by_ref() {
                if skipped == '\n' {
                    out.push('\n');
                    break;
                }
            }
            continue;
        }
        if c == '"' {
            in_string = true;
        }
        out.push(c);
    }
    out
}

/// Parse a JSONC file into `T`.
pub fn load_jsonc<T: for<'de> Deserialize<'de>>(path: &Path) -> ConfigResult<T> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&strip_json_comments(&text)).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn load_or_default<T>(path: &Path) -> ConfigResult<T>
where
    T: for<'de> Deserialize<'de> + Default,
{
    if !path.exists() {
        log::warn!("⚠️ {:?} not found, using defaults", path);
        return Ok(T::default());
    }
    let value = load_jsonc(path)?;
    log::info!("📄 Loaded {:?}", path);
    Ok(value)
}

/// Shared, hot-reloadable view of the configuration directory.
///
/// Readers take an `Arc` snapshot; a reload swaps it for the next reader.
#[derive(Debug)]
pub struct ConfigProvider {
    dir: PathBuf,
    config: RwLock<Arc<AutomationConfig>>,
    weights: RwLock<Arc<CardWeights>>,
}

impl ConfigProvider {
    /// Load both files from `dir`. Missing files fall back to defaults;
    /// malformed ones are an error.
    pub fn load(dir: impl Into<PathBuf>) -> ConfigResult<Self> {
        let dir = dir.into();
        let (config, weights) = Self::read_files(&dir)?;
        Ok(Self {
            dir,
            config: RwLock::new(Arc::new(config)),
            weights: RwLock::new(Arc::new(weights)),
        })
    }

    /// A provider over in-memory values, with no backing directory.
    pub fn from_parts(config: AutomationConfig, weights: CardWeights) -> Self {
        Self {
            dir: PathBuf::new(),
            config: RwLock::new(Arc::new(config)),
            weights: RwLock::new(Arc::new(weights)),
        }
    }

    fn read_files(dir: &Path) -> ConfigResult<(AutomationConfig, CardWeights)> {
        let config: AutomationConfig = load_or_default(&dir.join(CONFIG_FILE_NAME))?;
        let weights: CardWeights = load_or_default(&dir.join(CARD_WEIGHTS_FILE_NAME))?;
        log::info!("🃏 {} card weights loaded", weights.len());
        Ok((config, weights))
    }

    pub fn snapshot(&self) -> Arc<AutomationConfig> {
        self.config
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn card_weights(&self) -> Arc<CardWeights> {
        self.weights
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Re-read both files. On error the previous values stay in effect.
    pub fn reload(&self) -> ConfigResult<()> {
        if self.dir.as_os_str().is_empty() {
            return Ok(());
        }
        let (config, weights) = Self::read_files(&self.dir)?;
        *self
            .config
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Arc::new(config);
        *self
            .weights
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Arc::new(weights);
        log::info!("🔄 Configuration reloaded from {:?}", self.dir);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_comments_outside_strings_only() {
        let source = "{\n  // comment\n  \"url\": \"http://x//y\", // trailing\n  \"q\": \"a\\\"//b\"\n}";
        let stripped = strip_json_comments(source);
        let value: serde_json::Value = serde_json::from_str(&stripped).unwrap();
        assert_eq!(value["url"], "http://x//y");
        assert_eq!(value["q"], "a\"//b");
        assert!(!stripped.contains("comment"));
    }

    #[test]
    fn test_defaults() {
        let config = AutomationConfig::default();
        assert_eq!(config.obstacle_choice, 3);
        assert_eq!(config.obstacle_choice_index(), 2);
        assert_eq!(config.btn_continue_pos, (1500, 350));
        assert_eq!(config.adb_address(), "127.0.0.1:5555");
        assert_eq!(config.choice_positions.len(), 3);
    }

    #[test]
    fn test_obstacle_choice_is_clamped() {
        let mut config = AutomationConfig::default();
        config.obstacle_choice = 0;
        assert_eq!(config.obstacle_choice_index(), 0);
        config.obstacle_choice = 9;
        assert_eq!(config.obstacle_choice_index(), 2);
    }

    #[test]
    fn test_missing_directory_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ConfigProvider::load(dir.path().join("absent")).unwrap();
        assert_eq!(*provider.snapshot(), AutomationConfig::default());
        assert!(provider.card_weights().is_empty());
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("config");
        let provider = ConfigProvider::load(dir).unwrap();
        assert_eq!(*provider.snapshot(), AutomationConfig::default());
        assert!(provider.card_weights().is_empty());
    }

    #[test]
    fn test_load_partial_config_and_weights() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{
                // tuned for this device
                "obstacle_choice": 1,
                "btn_start_pos": [850, 780],
                "thresholds": { "special_box_min_matches": 25 }
            }"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join(CARD_WEIGHTS_FILE_NAME),
            "{ \"132\": 10, // best\n \"017\": -2 }",
        )
        .unwrap();

        let provider = ConfigProvider::load(dir.path()).unwrap();
        let config = provider.snapshot();
        assert_eq!(config.obstacle_choice, 1);
        assert_eq!(config.btn_start_pos, (850, 780));
        assert_eq!(config.btn_retry_pos, (900, 800));
        assert_eq!(config.thresholds.special_box_min_matches, 25);
        assert_eq!(config.thresholds.retry_banner_min_matches, 30);

        let weights = provider.card_weights();
        assert_eq!(weights.get("132"), Some(10));
        assert_eq!(weights.get("017"), Some(-2));
        assert_eq!(weights.get("999"), None);
    }

    #[test]
    fn test_reload_swaps_snapshot_and_keeps_old_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, r#"{ "loop_delay_ms": 100 }"#).unwrap();
        let provider = ConfigProvider::load(dir.path()).unwrap();
        let before = provider.snapshot();
        assert_eq!(before.loop_delay_ms, 100);

        std::fs::write(&path, r#"{ "loop_delay_ms": 250 }"#).unwrap();
        provider.reload().unwrap();
        assert_eq!(provider.snapshot().loop_delay_ms, 250);
        // Earlier snapshots are unaffected
        assert_eq!(before.loop_delay_ms, 100);

        std::fs::write(&path, "{ not json").unwrap();
        let err = provider.reload().unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert_eq!(provider.snapshot().loop_delay_ms, 250);
    }
}

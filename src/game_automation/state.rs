// Driver state shared between the main loop, the continue clicker and front ends
use super::types::{GameState, RunStatistics};
use crate::config::{ConfigProvider, ConfigResult};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Flags and counters read by both loops. Staleness of one polling period
/// is tolerated, so plain relaxed atomics are enough.
#[derive(Debug, Default)]
pub struct SharedState {
    running: AtomicBool,
    paused: AtomicBool,
    continue_paused: AtomicBool,
    last_state: Mutex<Option<GameState>>,
    runs: AtomicU64,
    cards: AtomicU64,
    obstacles: AtomicU64,
}

impl SharedState {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Relaxed);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }

    /// Set while a run is being started or restarted.
    pub fn is_continue_paused(&self) -> bool {
        self.continue_paused.load(Ordering::Relaxed)
    }

    pub fn set_continue_paused(&self, paused: bool) {
        self.continue_paused.store(paused, Ordering::Relaxed);
    }

    pub fn last_state(&self) -> Option<GameState> {
        *self
            .last_state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store `state`, returning the one it replaces.
    pub fn replace_last_state(&self, state: GameState) -> Option<GameState> {
        self.last_state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .replace(state)
    }

    pub fn record_run(&self) {
        self.runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_card(&self) {
        self.cards.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_obstacle(&self) {
        self.obstacles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> RunStatistics {
        RunStatistics {
            runs: self.runs.load(Ordering::Relaxed),
            cards: self.cards.load(Ordering::Relaxed),
            obstacles: self.obstacles.load(Ordering::Relaxed),
        }
    }
}

/// Cloneable control surface for a running automation.
#[derive(Debug, Clone)]
pub struct AutomationHandle {
    shared: Arc<SharedState>,
    config: Arc<ConfigProvider>,
}

impl AutomationHandle {
    pub(crate) fn new(shared: Arc<SharedState>, config: Arc<ConfigProvider>) -> Self {
        Self { shared, config }
    }

    /// Ask the main loop to exit after its current iteration.
    pub fn stop(&self) {
        log::info!("🛑 Stop requested");
        self.shared.set_running(false);
    }

    /// Suspend both the main loop and the continue clicker.
    pub fn pause(&self) {
        log::info!("⏸️ Automation paused");
        self.shared.set_paused(true);
    }

    pub fn resume(&self) {
        log::info!("▶️ Automation resumed");
        self.shared.set_paused(false);
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    pub fn is_paused(&self) -> bool {
        self.shared.is_paused()
    }

    pub fn stats(&self) -> RunStatistics {
        self.shared.stats()
    }

    pub fn last_state(&self) -> Option<GameState> {
        self.shared.last_state()
    }

    /// Re-read the configuration directory; the next poll sees the new values.
    pub fn reload_config(&self) -> ConfigResult<()> {
        self.config.reload()
    }
}

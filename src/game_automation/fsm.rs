// Finite state machine driving the game from classified frames
use super::clicker::ContinueClicker;
use super::error::{AutomationError, AutomationResult};
use super::match_image::template::{RETRY_BUTTON, START_BUTTON};
use super::match_image::{Frame, FrameClassifier};
use super::selection::select_best_card;
use super::state::{AutomationHandle, SharedState};
use super::types::{AutomationEvent, GameState, RunStatistics};
use crate::adb::DeviceChannel;
use crate::config::{AutomationConfig, ConfigProvider};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant, sleep};

const PAUSE_POLL: Duration = Duration::from_millis(100);
const ERROR_BACKOFF: Duration = Duration::from_secs(1);
const CAPTURE_RETRY: Duration = Duration::from_secs(1);
const ACTION_SETTLE: Duration = Duration::from_secs(1);
const CARD_SETTLE: Duration = Duration::from_millis(500);
const SECOND_PICK_DELAY: Duration = Duration::from_millis(300);
const CHOICE_SETTLE: Duration = Duration::from_millis(800);
const PURCHASE_FAILED_SETTLE: Duration = Duration::from_secs(2);

pub struct GameAutomation<D: DeviceChannel> {
    device: Arc<D>,
    classifier: Arc<FrameClassifier>,
    config: Arc<ConfigProvider>,
    shared: Arc<SharedState>,
    event_tx: Option<mpsc::Sender<AutomationEvent>>,
    rng: StdRng,
    last_capture: Option<Instant>,
}

impl<D: DeviceChannel> GameAutomation<D> {
    pub fn new(device: Arc<D>, classifier: Arc<FrameClassifier>, config: Arc<ConfigProvider>) -> Self {
        Self {
            device,
            classifier,
            config,
            shared: Arc::new(SharedState::default()),
            event_tx: None,
            rng: StdRng::from_entropy(),
            last_capture: None,
        }
    }

    /// Publish state changes, log lines and errors on `event_tx`.
    pub fn with_events(mut self, event_tx: mpsc::Sender<AutomationEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Make the random card fallback reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn handle(&self) -> AutomationHandle {
        AutomationHandle::new(self.shared.clone(), self.config.clone())
    }

    pub fn stats(&self) -> RunStatistics {
        self.shared.stats()
    }

    pub fn last_state(&self) -> Option<GameState> {
        self.shared.last_state()
    }

    /// Poll until stopped through a handle. Handler faults are logged and
    /// never end the loop.
    pub async fn run(&mut self) {
        if self.shared.is_running() {
            log::warn!("🤖 Automation already running, ignoring start");
            return;
        }
        self.shared.set_running(true);
        log::info!("🚀 Game automation started");
        self.emit(AutomationEvent::Log("Automation started".to_string()));

        let clicker = ContinueClicker::spawn(
            self.device.clone(),
            self.shared.clone(),
            self.config.clone(),
        );

        while self.shared.is_running() {
            if self.shared.is_paused() {
                sleep(PAUSE_POLL).await;
                continue;
            }
            let config = self.config.snapshot();
            self.wait_for_capture_slot(&config).await;

            match self.tick().await {
                Ok(Some(_)) => {}
                Ok(None) => continue,
                Err(e) => {
                    log::error!("❌ State handler failed: {}", e);
                    self.emit(AutomationEvent::Error(e.to_string()));
                    sleep(ERROR_BACKOFF).await;
                }
            }
            sleep(Duration::from_millis(config.loop_delay_ms)).await;
        }

        clicker.stop().await;
        let stats = self.shared.stats();
        log::info!(
            "⏹️ Game automation stopped: {} runs, {} cards, {} obstacles",
            stats.runs,
            stats.cards,
            stats.obstacles
        );
        self.emit(AutomationEvent::Log("Automation stopped".to_string()));
    }

    /// Keep captures at least `screenshot_interval_ms` apart.
    async fn wait_for_capture_slot(&mut self, config: &AutomationConfig) {
        if let Some(last) = self.last_capture {
            let interval = Duration::from_millis(config.screenshot_interval_ms);
            let elapsed = last.elapsed();
            if elapsed < interval {
                sleep(interval - elapsed).await;
            }
        }
        self.last_capture = Some(Instant::now());
    }

    /// One capture, classify and dispatch cycle. Returns the observed state,
    /// or `None` when the capture failed.
    pub async fn tick(&mut self) -> AutomationResult<Option<GameState>> {
        let Some(frame) = self.device.capture().await else {
            if self.config.snapshot().debug {
                log::warn!("📸 No frame captured, retrying");
            } else {
                log::debug!("📸 No frame captured, retrying");
            }
            sleep(CAPTURE_RETRY).await;
            return Ok(None);
        };
        let state = self.classifier.classify(&frame);
        self.observe(state, &frame).await?;
        Ok(Some(state))
    }

    /// Record `state` and run its handler on entry, or on every poll for
    /// repeating states.
    pub async fn observe(&mut self, state: GameState, frame: &Frame) -> AutomationResult<()> {
        let previous = self.shared.replace_last_state(state);
        let changed = previous != Some(state);
        if changed {
            match previous {
                Some(previous) => log::info!("🎮 State: {} -> {}", previous, state),
                None => log::info!("🎮 State: {}", state),
            }
            self.emit(AutomationEvent::StateChanged(state.name().to_string()));
        }

        if changed || state.repeats() {
            self.dispatch(state, frame, !changed).await?;
        }
        Ok(())
    }

    async fn dispatch(&mut self, state: GameState, frame: &Frame, is_repeat: bool) -> AutomationResult<()> {
        let config = self.config.snapshot();
        match state {
            GameState::LevelPrepare => self.on_level_prepare(frame, &config).await,
            GameState::CardSelection => self.on_card_selection(frame, is_repeat, &config).await?,
            GameState::ObstacleContinue => self.on_obstacle_continue(is_repeat).await,
            GameState::ObstacleChoice => self.on_obstacle_choice(is_repeat, &config).await?,
            GameState::ObstacleSpecialBox => self.on_special_box(is_repeat, &config).await,
            GameState::Victory => self.on_victory(frame, is_repeat, &config).await,
            GameState::Defeat => self.tap_and_settle(config.btn_retry_pos, "retry", ACTION_SETTLE).await,
            GameState::Purchase | GameState::LevelUpAfter => {
                self.tap_and_settle(config.btn_cancel_purchase_pos, "cancel", ACTION_SETTLE).await
            }
            GameState::LevelUp => {
                self.tap_and_settle(config.btn_level_up_pos, "level up", ACTION_SETTLE).await
            }
            GameState::PurchaseFailed => {
                self.tap_and_settle(config.btn_purchase_confirm_pos, "confirm", PURCHASE_FAILED_SETTLE)
                    .await
            }
            GameState::Unknown => {}
        }
        Ok(())
    }

    async fn on_level_prepare(&self, frame: &Frame, config: &AutomationConfig) {
        self.shared.set_continue_paused(true);
        let target = self.locate(frame, START_BUTTON, config.btn_start_pos);
        self.tap_and_settle(target, "start", ACTION_SETTLE).await;
    }

    async fn on_card_selection(
        &mut self,
        frame: &Frame,
        is_repeat: bool,
        config: &AutomationConfig,
    ) -> AutomationResult<()> {
        if !is_repeat {
            self.log_event("🃏 Card selection");
            self.shared.set_continue_paused(false);
        }

        let double_pick = self.classifier.needs_double_pick(frame);
        let positions = self.classifier.card_positions(frame, &config.card_positions);
        if positions.is_empty() {
            return Err(AutomationError::NoPositions { what: "card" });
        }
        let weights = self.config.card_weights();
        let ids = if self.classifier.assets().card_glyphs().is_empty() {
            vec![None; positions.len()]
        } else {
            self.classifier.detect_card_ids(frame, &positions, &weights)
        };

        let first = select_best_card(&ids, &weights, None, &mut self.rng);
        self.tap(positions[first], "card").await;
        if !is_repeat {
            self.shared.record_card();
        }

        if double_pick {
            log::info!("🃏 Double pick");
            sleep(SECOND_PICK_DELAY).await;
            let second = select_best_card(&ids, &weights, Some(first), &mut self.rng);
            self.tap(positions[second], "second card").await;
            if !is_repeat {
                self.shared.record_card();
            }
        }
        sleep(CARD_SETTLE).await;
        Ok(())
    }

    async fn on_obstacle_continue(&self, is_repeat: bool) {
        if !is_repeat {
            self.shared.record_obstacle();
        }
        sleep(CARD_SETTLE).await;
    }

    async fn on_obstacle_choice(
        &self,
        is_repeat: bool,
        config: &AutomationConfig,
    ) -> AutomationResult<()> {
        if !is_repeat {
            self.log_event("🚧 Obstacle choice");
            self.shared.set_continue_paused(false);
            self.shared.record_obstacle();
        }
        let index = config.obstacle_choice_index();
        let target = config
            .choice_positions
            .get(index)
            .copied()
            .ok_or(AutomationError::ChoiceOutOfRange {
                index: index + 1,
                available: config.choice_positions.len(),
            })?;
        self.tap_and_settle(target, "obstacle choice", CHOICE_SETTLE).await;
        Ok(())
    }

    async fn on_special_box(&self, is_repeat: bool, config: &AutomationConfig) {
        if !is_repeat {
            self.log_event("🎁 Special box");
            self.shared.record_obstacle();
        }
        self.tap_and_settle(config.btn_open_chest_pos, "open chest", ACTION_SETTLE).await;
    }

    async fn on_victory(&self, frame: &Frame, is_repeat: bool, config: &AutomationConfig) {
        if !is_repeat {
            self.shared.set_continue_paused(true);
            self.shared.record_run();
            let runs = self.shared.stats().runs;
            self.log_event(&format!("🏆 Victory, run {} complete", runs));
        }
        let target = self.locate(frame, RETRY_BUTTON, config.btn_retry_pos);
        self.tap_and_settle(target, "retry", ACTION_SETTLE).await;
    }

    /// Centre of `template` on the frame, or `fallback` when it is not visible.
    fn locate(&self, frame: &Frame, template: &str, fallback: (u32, u32)) -> (u32, u32) {
        let threshold = self.classifier.thresholds().template_threshold;
        match self.classifier.find_template(frame, template, threshold) {
            Some(found) => {
                log::debug!("🎯 '{}' found at ({}, {}) {:.3}", template, found.x, found.y, found.confidence);
                found.position()
            }
            None => fallback,
        }
    }

    async fn tap(&self, (x, y): (u32, u32), what: &str) {
        if !self.device.tap(x, y).await {
            log::warn!("⚠️ Failed to tap {} at ({}, {})", what, x, y);
        }
    }

    async fn tap_and_settle(&self, target: (u32, u32), what: &str, settle: Duration) {
        self.tap(target, what).await;
        sleep(settle).await;
    }

    fn log_event(&self, message: &str) {
        log::info!("{}", message);
        self.emit(AutomationEvent::Log(message.to_string()));
    }

    fn emit(&self, event: AutomationEvent) {
        if let Some(tx) = &self.event_tx
            && let Err(e) = tx.try_send(event)
        {
            log::debug!("Automation event dropped: {}", e);
        }
    }
}

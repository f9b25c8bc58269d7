// Background task that keeps tapping the continue button
use super::state::SharedState;
use crate::adb::DeviceChannel;
use crate::config::ConfigProvider;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};

pub const CLICK_PERIOD: Duration = Duration::from_millis(500);
pub const STOP_TIMEOUT: Duration = Duration::from_secs(1);

/// Taps `btn_continue_pos` every [`CLICK_PERIOD`] while automation is not paused.
pub struct ContinueClicker {
    stop: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl ContinueClicker {
    pub fn spawn<D: DeviceChannel>(
        device: Arc<D>,
        shared: Arc<SharedState>,
        config: Arc<ConfigProvider>,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let task = tokio::spawn(async move {
            log::debug!("👆 Continue clicker started");
            let mut ticker = tokio::time::interval(CLICK_PERIOD);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if stop_flag.load(Ordering::Relaxed) {
                    break;
                }
                if shared.is_paused() {
                    continue;
                }
                let config = config.snapshot();
                if config.clicker_respects_continue_pause && shared.is_continue_paused() {
                    continue;
                }
                let (x, y) = config.btn_continue_pos;
                if !device.tap(x, y).await {
                    log::debug!("Continue tap ({}, {}) failed", x, y);
                }
            }
            log::debug!("👆 Continue clicker stopped");
        });
        Self { stop, task }
    }

    /// Signal the task and wait up to [`STOP_TIMEOUT`] before aborting it.
    pub async fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if tokio::time::timeout(STOP_TIMEOUT, &mut self.task).await.is_err() {
            log::warn!("⚠️ Continue clicker did not stop in time, aborting");
            self.task.abort();
        }
    }
}

// Core device types and traits
use crate::game_automation::match_image::Frame;
use serde::Serialize;
use std::future::Future;

/// Android key codes used by the helpers.
pub const KEYCODE_HOME: u32 = 3;
pub const KEYCODE_BACK: u32 = 4;

/// Everything the automation needs from the emulator.
///
/// Coordinates are in canonical 1600x900 frame space. Failures are reported
/// as `None`/`false` so callers can simply retry on the next poll; input
/// calls may race each other and are not serialised.
pub trait DeviceChannel: Send + Sync + 'static {
    fn capture(&self) -> impl Future<Output = Option<Frame>> + Send;

    fn tap(&self, x: u32, y: u32) -> impl Future<Output = bool> + Send;

    fn swipe(
        &self,
        x1: u32,
        y1: u32,
        x2: u32,
        y2: u32,
        duration_ms: u32,
    ) -> impl Future<Output = bool> + Send;

    fn key_event(&self, code: u32) -> impl Future<Output = bool> + Send;

    fn back(&self) -> impl Future<Output = bool> + Send {
        self.key_event(KEYCODE_BACK)
    }

    fn home(&self) -> impl Future<Output = bool> + Send {
        self.key_event(KEYCODE_HOME)
    }
}

/// One row of `adb devices -l`.
#[derive(Debug, PartialEq, Serialize, Clone)]
pub struct Device {
    pub name: String,
    pub transport_id: Option<String>,
}

// ADB module - device access for the automation
// This module drives an Android emulator through the external `adb` binary
// and exposes it to the automation as a `DeviceChannel`.

pub mod error;
pub mod shell;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export the main types and functions for easy access
pub use error::{AdbError, AdbResult};
pub use shell::{AdbShell, scale_to_native};
pub use types::{Device, DeviceChannel, KEYCODE_BACK, KEYCODE_HOME};

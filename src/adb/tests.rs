// Tests for the device access layer
// Focus: adb output parsing, connect fallbacks, coordinate scaling, error taxonomy

use super::error::AdbError;
use super::shell::{AdbShell, scale_to_native};
use super::types::{Device, DeviceChannel, KEYCODE_BACK, KEYCODE_HOME};
use crate::game_automation::match_image::Frame;
use std::sync::Mutex;
use std::time::Duration;

// ============================================================
// DEVICE LIST PARSING
// ============================================================

#[test]
fn parse_devices_basic() {
    let adb_output = "List of devices attached\nemulator-5554 device transport_id:5\n";
    let devs = AdbShell::parse_devices(adb_output);
    assert_eq!(devs.len(), 1);
    assert_eq!(devs[0].name, "emulator-5554");
    assert_eq!(devs[0].transport_id, Some("5".to_string()));
}

#[test]
fn test_parse_devices_skips_offline_and_unauthorized() {
    let adb_output = "List of devices attached\n\
        127.0.0.1:5555         device product:SM-S908E model:SM_S908E device:star2qltechn transport_id:2\n\
        emulator-5556          offline transport_id:3\n\
        R58M123ABC             unauthorized usb:1-4 transport_id:4\n\n";
    let devices = AdbShell::parse_devices(adb_output);
    assert_eq!(
        devices,
        vec![Device {
            name: "127.0.0.1:5555".to_string(),
            transport_id: Some("2".to_string())
        }]
    );
}

#[test]
fn test_parse_devices_without_long_format() {
    // Plain `adb devices` separates with a tab and has no transport id
    let adb_output = "List of devices attached\nemulator-5554\tdevice\n";
    let devices = AdbShell::parse_devices(adb_output);
    assert_eq!(
        devices,
        vec![Device {
            name: "emulator-5554".to_string(),
            transport_id: None
        }]
    );
}

#[test]
fn test_parse_devices_empty() {
    assert!(AdbShell::parse_devices("List of devices attached\n\n").is_empty());
    assert!(AdbShell::parse_devices("").is_empty());
}

// ============================================================
// CONNECT FALLBACKS
// ============================================================

#[test]
fn test_connect_targets_start_with_configured_address() {
    let targets = AdbShell::connect_targets("192.168.1.20:5555");
    assert_eq!(
        targets,
        vec![
            "192.168.1.20:5555",
            "127.0.0.1:5555",
            "127.0.0.1:5554",
            "emulator-5554",
            "emulator-5556"
        ]
    );
}

#[test]
fn test_connect_targets_are_deduplicated() {
    let targets = AdbShell::connect_targets("127.0.0.1:5555");
    assert_eq!(targets.len(), 4);
    assert_eq!(targets[0], "127.0.0.1:5555");
}

#[test]
fn test_connect_output_acceptance() {
    assert!(AdbShell::connect_accepted("connected to 127.0.0.1:5555\n"));
    assert!(AdbShell::connect_accepted("already connected to 127.0.0.1:5555\n"));
    assert!(!AdbShell::connect_accepted(
        "cannot connect to 127.0.0.1:5554: Connection refused (111)\n"
    ));
    assert!(!AdbShell::connect_accepted("failed to connect to emulator-5556\n"));
}

// ============================================================
// COORDINATE SCALING
// ============================================================

#[test]
fn test_scaling_identity_at_canonical_size() {
    assert_eq!(scale_to_native(900, 800, (1600, 900)), (900, 800));
}

#[test]
fn test_scaling_to_larger_device() {
    assert_eq!(scale_to_native(800, 450, (1920, 1080)), (960, 540));
    assert_eq!(scale_to_native(1500, 350, (3200, 1800)), (3000, 700));
}

#[test]
fn test_scaling_clamps_to_device_bounds() {
    assert_eq!(scale_to_native(1600, 900, (1280, 720)), (1279, 719));
}

#[test]
fn test_unscaled_before_first_capture() {
    let shell = AdbShell::new("adb", "emulator-5554");
    assert_eq!(shell.native_size(), None);
    assert_eq!(shell.serial(), "emulator-5554");
}

// ============================================================
// ERRORS
// ============================================================

#[test]
fn test_error_taxonomy() {
    let timeout = AdbError::Timeout {
        duration: Duration::from_secs(10),
        description: "adb exec-out screencap -p".to_string(),
    };
    assert!(timeout.is_transient());
    assert!(timeout.to_string().contains("screencap"));

    let failed = AdbError::CommandFailed {
        command: "adb -s x shell input tap 1 2".to_string(),
        stderr: "error: device offline".to_string(),
    };
    assert!(failed.is_transient());

    let none = AdbError::NoDevice {
        tried: vec!["127.0.0.1:5555".to_string()],
    };
    assert!(!none.is_transient());
    assert!(none.to_string().contains("127.0.0.1:5555"));
}

#[test]
fn test_decode_error_converts() {
    let err: AdbError = image::load_from_memory(b"not a png").unwrap_err().into();
    assert!(matches!(err, AdbError::DecodeFailed { .. }));
}

// ============================================================
// DEFAULT KEY HELPERS
// ============================================================

#[derive(Default)]
struct KeyRecorder {
    keys: Mutex<Vec<u32>>,
}

impl DeviceChannel for KeyRecorder {
    async fn capture(&self) -> Option<Frame> {
        None
    }
    async fn tap(&self, _x: u32, _y: u32) -> bool {
        true
    }
    async fn swipe(&self, _x1: u32, _y1: u32, _x2: u32, _y2: u32, _duration_ms: u32) -> bool {
        true
    }
    async fn key_event(&self, code: u32) -> bool {
        self.keys.lock().unwrap().push(code);
        true
    }
}

#[tokio::test]
async fn test_back_and_home_send_key_codes() {
    let device = KeyRecorder::default();
    assert!(device.back().await);
    assert!(device.home().await);
    assert_eq!(*device.keys.lock().unwrap(), vec![KEYCODE_BACK, KEYCODE_HOME]);
    assert!(device.capture().await.is_none());
}

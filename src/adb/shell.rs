use super::error::{AdbError, AdbResult};
use super::types::{Device, DeviceChannel};
use crate::game_automation::match_image::{CANONICAL_HEIGHT, CANONICAL_WIDTH, Frame};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::process::Command;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Emulator access through the external `adb` binary.
pub struct AdbShell {
    adb_path: PathBuf,
    serial: String,
    // Native size of the last capture; 0 until the first one
    native_width: AtomicU32,
    native_height: AtomicU32,
}

impl AdbShell {
    /// Wrap an already-connected device.
    pub fn new(adb_path: impl Into<PathBuf>, serial: impl Into<String>) -> Self {
        Self {
            adb_path: adb_path.into(),
            serial: serial.into(),
            native_width: AtomicU32::new(0),
            native_height: AtomicU32::new(0),
        }
    }

    /// Find a device to drive.
    ///
    /// With `serial`, that device is used (connecting to it if it is not
    /// listed yet). Otherwise the first attached device wins, and when none
    /// is attached the usual emulator addresses are tried, starting with
    /// `preferred` (`host:port`).
    pub async fn connect(
        adb_path: impl Into<PathBuf>,
        serial: Option<&str>,
        preferred: &str,
    ) -> AdbResult<Self> {
        let adb_path = adb_path.into();
        Self::ensure_adb_available(&adb_path).await?;

        let devices = Self::list_devices(&adb_path).await?;
        if let Some(serial) = serial {
            if devices.iter().any(|d| d.name == serial) {
                log::info!("📱 Using attached device {}", serial);
                return Ok(Self::new(adb_path, serial));
            }
            if Self::try_connect(&adb_path, serial).await {
                return Ok(Self::new(adb_path, serial));
            }
            return Err(AdbError::DeviceNotFound {
                serial: serial.to_string(),
            });
        }

        if let Some(device) = devices.into_iter().next() {
            log::info!("📱 Found attached device {}", device.name);
            return Ok(Self::new(adb_path, device.name));
        }

        let targets = Self::connect_targets(preferred);
        for target in &targets {
            if Self::try_connect(&adb_path, target).await {
                return Ok(Self::new(adb_path, target.clone()));
            }
        }
        Err(AdbError::NoDevice { tried: targets })
    }

    /// Addresses tried by `adb connect`, most specific first, without duplicates.
    pub fn connect_targets(preferred: &str) -> Vec<String> {
        let mut targets = vec![preferred.to_string()];
        for fallback in ["127.0.0.1:5555", "127.0.0.1:5554", "emulator-5554", "emulator-5556"] {
            if !targets.iter().any(|t| t == fallback) {
                targets.push(fallback.to_string());
            }
        }
        targets
    }

    async fn try_connect(adb_path: &Path, target: &str) -> bool {
        let mut cmd = Command::new(adb_path);
        cmd.arg("connect").arg(target);
        match Self::output(cmd, format!("adb connect {target}"), CONNECT_TIMEOUT).await {
            Ok(output) => {
                let text = format!(
                    "{}{}",
                    String::from_utf8_lossy(&output.stdout),
                    String::from_utf8_lossy(&output.stderr)
                );
                let accepted = Self::connect_accepted(&text);
                if accepted {
                    log::info!("🔌 Connected to {}", target);
                } else {
                    log::debug!("adb connect {} rejected: {}", target, text.trim());
                }
                accepted
            }
            Err(e) => {
                log::debug!("adb connect {} failed: {}", target, e);
                false
            }
        }
    }

    /// `adb connect` exits 0 even when it fails, so inspect its text.
    pub fn connect_accepted(output: &str) -> bool {
        let lower = output.to_lowercase();
        lower.contains("connected") && !lower.contains("cannot")
    }

    async fn ensure_adb_available(adb_path: &Path) -> AdbResult<()> {
        let mut cmd = Command::new(adb_path);
        cmd.arg("version");
        match Self::output(cmd, "adb version".to_string(), COMMAND_TIMEOUT).await {
            Ok(_) => Ok(()),
            Err(AdbError::SpawnFailed { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                Err(AdbError::AdbNotFound {
                    path: adb_path.to_path_buf(),
                })
            }
            Err(e) => Err(e),
        }
    }

    pub fn parse_devices(output: &str) -> Vec<Device> {
        output
            .lines()
            .skip(1)
            .filter_map(|line| {
                let parts: Vec<&str> = line.split_whitespace().collect();
                if parts.len() >= 2 && parts[1] == "device" {
                    let name = parts[0].to_string();
                    let transport_id = parts
                        .iter()
                        .find_map(|part| part.strip_prefix("transport_id:"))
                        .map(str::to_string);
                    Some(Device { name, transport_id })
                } else {
                    None
                }
            })
            .collect()
    }

    pub async fn list_devices(adb_path: &Path) -> AdbResult<Vec<Device>> {
        let mut cmd = Command::new(adb_path);
        cmd.arg("devices").arg("-l");
        let output = Self::output(cmd, "adb devices -l".to_string(), COMMAND_TIMEOUT).await?;
        Ok(Self::parse_devices(&String::from_utf8_lossy(&output.stdout)))
    }

    /// Run a prepared command with a deadline; non-zero exit is an error.
    async fn output(
        mut cmd: Command,
        description: String,
        timeout: Duration,
    ) -> AdbResult<std::process::Output> {
        cmd.kill_on_drop(true);
        let output = tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| AdbError::Timeout {
                duration: timeout,
                description: description.clone(),
            })?
            .map_err(|source| AdbError::SpawnFailed {
                command: description.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(AdbError::CommandFailed {
                command: description,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output)
    }

    /// `adb -s <serial> <args…>`
    async fn run(&self, args: &[String], timeout: Duration) -> AdbResult<Vec<u8>> {
        let mut cmd = Command::new(&self.adb_path);
        cmd.arg("-s").arg(&self.serial).args(args);
        let description = format!("adb -s {} {}", self.serial, args.join(" "));
        Ok(Self::output(cmd, description, timeout).await?.stdout)
    }

    async fn shell_input(&self, args: &[String]) -> AdbResult<()> {
        let mut full = vec!["shell".to_string(), "input".to_string()];
        full.extend_from_slice(args);
        self.run(&full, COMMAND_TIMEOUT).await.map(|_| ())
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Native size of the last capture, if any.
    pub fn native_size(&self) -> Option<(u32, u32)> {
        let w = self.native_width.load(Ordering::Relaxed);
        let h = self.native_height.load(Ordering::Relaxed);
        (w > 0 && h > 0).then_some((w, h))
    }

    /// PNG bytes straight from `screencap -p`.
    pub async fn capture_png(&self) -> AdbResult<Vec<u8>> {
        let args = ["exec-out", "screencap", "-p"].map(String::from);
        let bytes = self.run(&args, CAPTURE_TIMEOUT).await?;
        if bytes.is_empty() {
            return Err(AdbError::EmptyCapture);
        }
        Ok(bytes)
    }

    /// Capture and normalise a frame, remembering the native size for input scaling.
    pub async fn capture_frame(&self) -> AdbResult<Frame> {
        let bytes = self.capture_png().await?;
        let image = image::load_from_memory(&bytes)?.to_rgb8();
        self.native_width.store(image.width(), Ordering::Relaxed);
        self.native_height.store(image.height(), Ordering::Relaxed);
        Ok(Frame::new(image))
    }

    fn to_native(&self, x: u32, y: u32) -> (u32, u32) {
        match self.native_size() {
            Some(native) => scale_to_native(x, y, native),
            None => (x, y),
        }
    }

    pub async fn input_tap(&self, x: u32, y: u32) -> AdbResult<()> {
        let (nx, ny) = self.to_native(x, y);
        self.shell_input(&["tap".to_string(), nx.to_string(), ny.to_string()])
            .await
    }

    pub async fn input_swipe(
        &self,
        x1: u32,
        y1: u32,
        x2: u32,
        y2: u32,
        duration_ms: u32,
    ) -> AdbResult<()> {
        let (sx, sy) = self.to_native(x1, y1);
        let (ex, ey) = self.to_native(x2, y2);
        let args = [sx, sy, ex, ey, duration_ms].map(|v| v.to_string());
        let mut full = vec!["swipe".to_string()];
        full.extend_from_slice(&args);
        self.shell_input(&full).await
    }

    pub async fn input_keyevent(&self, code: u32) -> AdbResult<()> {
        self.shell_input(&["keyevent".to_string(), code.to_string()])
            .await
    }

    /// `adb get-state` reports `device` for a usable connection.
    pub async fn is_connected(&self) -> bool {
        match self.run(&["get-state".to_string()], CONNECT_TIMEOUT).await {
            Ok(out) => String::from_utf8_lossy(&out).contains("device"),
            Err(_) => false,
        }
    }

    pub async fn disconnect(&self) -> AdbResult<()> {
        let mut cmd = Command::new(&self.adb_path);
        cmd.arg("disconnect").arg(&self.serial);
        Self::output(cmd, format!("adb disconnect {}", self.serial), CONNECT_TIMEOUT)
            .await
            .map(|_| ())
    }
}

/// Map a canonical 1600x900 coordinate onto a device of another size.
pub fn scale_to_native(x: u32, y: u32, native: (u32, u32)) -> (u32, u32) {
    let (w, h) = native;
    if (w, h) == (CANONICAL_WIDTH, CANONICAL_HEIGHT) {
        return (x, y);
    }
    let nx = (x as u64 * w as u64 / CANONICAL_WIDTH as u64) as u32;
    let ny = (y as u64 * h as u64 / CANONICAL_HEIGHT as u64) as u32;
    (nx.min(w.saturating_sub(1)), ny.min(h.saturating_sub(1)))
}

impl DeviceChannel for AdbShell {
    async fn capture(&self) -> Option<Frame> {
        match self.capture_frame().await {
            Ok(frame) => Some(frame),
            Err(e) => {
                log::warn!("📸 Capture failed: {}", e);
                None
            }
        }
    }

    async fn tap(&self, x: u32, y: u32) -> bool {
        match self.input_tap(x, y).await {
            Ok(()) => {
                log::debug!("👆 Tap ({}, {})", x, y);
                true
            }
            Err(e) => {
                log::warn!("⚠️ Tap ({}, {}) failed: {}", x, y, e);
                false
            }
        }
    }

    async fn swipe(&self, x1: u32, y1: u32, x2: u32, y2: u32, duration_ms: u32) -> bool {
        match self.input_swipe(x1, y1, x2, y2, duration_ms).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("⚠️ Swipe failed: {}", e);
                false
            }
        }
    }

    async fn key_event(&self, code: u32) -> bool {
        match self.input_keyevent(code).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("⚠️ Key event {} failed: {}", code, e);
                false
            }
        }
    }
}

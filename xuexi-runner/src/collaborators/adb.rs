//! ADB-backed device controller and connector
//!
//! Every operation shells out to the `adb` binary through `tokio::process`.
//! Recognition and detection are delegated to a [`RemotePipeline`] bound to
//! the same serial.

use super::{
    remote_pipeline::RemotePipeline, CollaboratorError, CollaboratorResult, Controller,
    DeviceConnector, DeviceContext, DeviceInfo, Frame, Point,
};
use image::ImageFormat;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info};

/// Device controller for one ADB serial
#[derive(Debug, Clone)]
pub struct AdbController {
    adb: PathBuf,
    serial: String,
}

impl AdbController {
    pub fn new(adb: impl Into<PathBuf>, serial: impl Into<String>) -> Self {
        Self {
            adb: adb.into(),
            serial: serial.into(),
        }
    }

    async fn exec(&self, args: &[&str]) -> CollaboratorResult<Vec<u8>> {
        debug!(serial = %self.serial, ?args, "adb");
        let output = Command::new(&self.adb)
            .arg("-s")
            .arg(&self.serial)
            .args(args)
            .output()
            .await?;

        if !output.status.success() {
            return Err(CollaboratorError::Device(format!(
                "adb {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output.stdout)
    }

    async fn shell(&self, args: &[&str]) -> CollaboratorResult<()> {
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push("shell");
        full.extend_from_slice(args);
        self.exec(&full).await.map(|_| ())
    }
}

#[async_trait::async_trait]
impl Controller for AdbController {
    async fn capture(&self) -> CollaboratorResult<Frame> {
        let png = self.exec(&["exec-out", "screencap", "-p"]).await?;
        let image = image::load_from_memory_with_format(&png, ImageFormat::Png)?;
        Ok(image.to_rgb8())
    }

    async fn tap(&self, at: Point) -> CollaboratorResult<()> {
        let (x, y) = (at.x.to_string(), at.y.to_string());
        self.shell(&["input", "tap", &x, &y]).await
    }

    async fn swipe(&self, from: Point, to: Point, duration_ms: u32) -> CollaboratorResult<()> {
        let args = [
            from.x.to_string(),
            from.y.to_string(),
            to.x.to_string(),
            to.y.to_string(),
            duration_ms.to_string(),
        ];
        let mut full = vec!["input", "swipe"];
        full.extend(args.iter().map(String::as_str));
        self.shell(&full).await
    }

    /// `input text` only handles ASCII; anything else is sent through the
    /// ADBKeyBoard broadcast, which must be the active IME on the device.
    async fn input_text(&self, text: &str) -> CollaboratorResult<()> {
        if text.is_ascii() {
            let escaped = escape_input_text(text);
            self.shell(&["input", "text", &escaped]).await
        } else {
            let quoted = shell_quote(text);
            self.shell(&["am", "broadcast", "-a", "ADB_INPUT_TEXT", "--es", "msg", &quoted])
                .await
        }
    }

    async fn start_app(&self, package: &str) -> CollaboratorResult<()> {
        self.shell(&[
            "monkey",
            "-p",
            package,
            "-c",
            "android.intent.category.LAUNCHER",
            "1",
        ])
        .await
    }
}

/// Escape text for `adb shell input text`
///
/// Spaces become `%s`; shell metacharacters are backslash-escaped.
pub fn escape_input_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            ' ' => out.push_str("%s"),
            '\'' | '"' | '\\' | '&' | '|' | ';' | '<' | '>' | '(' | ')' | '$' | '`' | '*'
            | '?' | '~' | '#' | '!' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

fn shell_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', r"'\''"))
}

/// Parse `adb devices -l` output
///
/// Only devices in the `device` state are returned; offline and
/// unauthorized entries are skipped.
pub fn parse_devices_output(output: &str) -> Vec<DeviceInfo> {
    output
        .lines()
        .skip_while(|line| !line.starts_with("List of devices"))
        .skip(1)
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let serial = fields.next()?;
            if fields.next()? != "device" {
                return None;
            }
            let name = fields
                .find_map(|f| f.strip_prefix("model:"))
                .map(|m| m.replace('_', " "));
            Some(DeviceInfo {
                serial: serial.to_string(),
                name,
            })
        })
        .collect()
}

/// Discovers ADB devices and binds them with a remote pipeline
#[derive(Debug, Clone)]
pub struct AdbConnector {
    adb: PathBuf,
    pipeline_endpoint: String,
    http: reqwest::Client,
}

impl AdbConnector {
    pub fn new(
        adb: impl Into<PathBuf>,
        pipeline_endpoint: impl Into<String>,
    ) -> CollaboratorResult<Self> {
        Ok(Self {
            adb: adb.into(),
            pipeline_endpoint: pipeline_endpoint.into(),
            http: RemotePipeline::http_client()?,
        })
    }

    async fn adb_global(&self, args: &[&str]) -> CollaboratorResult<String> {
        let output = Command::new(&self.adb).args(args).output().await?;
        if !output.status.success() {
            return Err(CollaboratorError::Device(format!(
                "adb {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait::async_trait]
impl DeviceConnector for AdbConnector {
    async fn list_devices(&self) -> CollaboratorResult<Vec<DeviceInfo>> {
        let output = self.adb_global(&["devices", "-l"]).await?;
        let devices = parse_devices_output(&output);
        debug!(count = devices.len(), "ADB devices discovered");
        Ok(devices)
    }

    async fn connect(&self, device: &DeviceInfo) -> CollaboratorResult<DeviceContext> {
        // Network serials (host:port) need an explicit connect first
        if device.serial.contains(':') {
            let output = self.adb_global(&["connect", &device.serial]).await?;
            if output.contains("failed") || output.contains("unable") {
                return Err(CollaboratorError::Device(output.trim().to_string()));
            }
        }

        let state = self
            .adb_global(&["-s", &device.serial, "get-state"])
            .await?;
        if state.trim() != "device" {
            return Err(CollaboratorError::Device(format!(
                "{} is {}",
                device.serial,
                state.trim()
            )));
        }

        let pipeline = Arc::new(RemotePipeline::new(
            self.http.clone(),
            self.pipeline_endpoint.clone(),
            device.serial.clone(),
        ));
        info!(serial = %device.serial, "ADB device bound");

        Ok(DeviceContext {
            device: device.clone(),
            controller: Arc::new(AdbController::new(self.adb.clone(), device.serial.clone())),
            recognizer: pipeline.clone(),
            detector: pipeline,
        })
    }
}

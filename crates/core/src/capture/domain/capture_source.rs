use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("failed to open capture source {location}: {reason}")]
    Open { location: String, reason: String },
    #[error("capture source {0} has no video stream")]
    NoVideoStream(String),
    #[error("capture source stopped before producing a frame")]
    Disconnected,
    #[error("no frame decoded within {0} ms")]
    NotReady(u64),
}

/// Capture-affecting settings. Changing any of them rebuilds the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Device path, stream URL or video file.
    pub source: String,
    /// libavdevice input format, e.g. `v4l2`, `avfoundation`, `dshow`.
    pub input_format: Option<String>,
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
    /// How long a tick may wait for the first decodable frame.
    pub ready_timeout_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            source: default_source().to_string(),
            input_format: default_input_format().map(str::to_string),
            width: 640,
            height: 480,
            target_fps: 30,
            ready_timeout_ms: 10_000,
        }
    }
}

impl CaptureConfig {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }
}

fn default_source() -> &'static str {
    if cfg!(target_os = "macos") {
        "0"
    } else if cfg!(target_os = "windows") {
        "video=Integrated Camera"
    } else {
        "/dev/video0"
    }
}

fn default_input_format() -> Option<&'static str> {
    if cfg!(target_os = "macos") {
        Some("avfoundation")
    } else if cfg!(target_os = "windows") {
        Some("dshow")
    } else {
        Some("v4l2")
    }
}

/// A live video stream owned by the frame loop.
pub trait CaptureSource: Send {
    /// True once at least one frame has been decoded.
    fn is_ready(&self) -> bool;

    /// Blocks until the one-shot "first frame decoded" notification fires.
    /// Returns immediately when already ready.
    fn wait_ready(&mut self, timeout: Duration) -> Result<(), DeviceError>;

    /// Newest decoded frame.
    fn current_frame(&self) -> Option<Frame>;
}

/// Opens capture sources.
pub trait CaptureProvider: Send {
    fn setup(&mut self, config: &CaptureConfig) -> Result<Box<dyn CaptureSource>, DeviceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_vga_30fps() {
        let config = CaptureConfig::default();
        assert_eq!((config.width, config.height, config.target_fps), (640, 480, 30));
        assert_eq!(config.ready_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: CaptureConfig =
            serde_json::from_str(r#"{"source": "rtsp://cam.local/stream", "input_format": null}"#)
                .unwrap();
        assert_eq!(config.source, "rtsp://cam.local/stream");
        assert!(config.input_format.is_none());
        assert_eq!(config.width, 640);
    }
}

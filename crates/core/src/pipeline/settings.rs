use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capture::domain::capture_source::CaptureConfig;
use crate::detection::domain::detector_factory::{ModelId, ModelOptions};
use crate::detection::domain::runtime::{Backend, RuntimeFlags};
use crate::measurement::domain::face_measurer::CalibrationReference;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Overlay toggles. Changing them never rebuilds anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub show_mesh: bool,
    pub show_bounding_box: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            show_mesh: true,
            show_bounding_box: true,
        }
    }
}

/// Complete session configuration, loadable from a JSON file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub model: ModelId,
    pub model_options: ModelOptions,
    pub backend: Backend,
    pub flags: RuntimeFlags,
    pub capture: CaptureConfig,
    pub render: RenderOptions,
    pub calibration: CalibrationReference,
    pub flip_horizontal: bool,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"model": "face-mesh", "backend": "cpu", "capture": {{"width": 1280, "height": 720}}}}"#
        )
        .unwrap();

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.model, ModelId::FaceMesh);
        assert_eq!(settings.backend, Backend::Cpu);
        assert_eq!((settings.capture.width, settings.capture.height), (1280, 720));
        assert_eq!(settings.capture.target_fps, 30);
        assert_eq!(settings.render, RenderOptions::default());
        assert_eq!(settings.calibration, CalibrationReference::default());
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, SettingsError::Io { .. }));
    }

    #[test]
    fn test_load_unknown_model_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"model": "face-something"}}"#).unwrap();
        let err = Settings::load(file.path()).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
    }

    #[test]
    fn test_serialized_defaults_load_back_equal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(&Settings::default()).unwrap().as_bytes())
            .unwrap();
        assert_eq!(Settings::load(file.path()).unwrap(), Settings::default());
    }
}

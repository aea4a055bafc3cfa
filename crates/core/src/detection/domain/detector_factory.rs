use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::landmark_detector::LandmarkDetector;
use super::runtime::RuntimeSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ModelId {
    /// 468-point mesh, no iris landmarks.
    FaceMesh,
    /// 478-point mesh including both irises.
    #[default]
    FaceMeshRefined,
}

impl ModelId {
    pub const ALL: &[ModelId] = &[ModelId::FaceMesh, ModelId::FaceMeshRefined];

    pub fn name(&self) -> &'static str {
        match self {
            ModelId::FaceMesh => "face-mesh",
            ModelId::FaceMeshRefined => "face-mesh-refined",
        }
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelId::ALL
            .iter()
            .find(|m| m.name() == s)
            .copied()
            .ok_or_else(|| format!("unknown model '{s}', expected face-mesh or face-mesh-refined"))
    }
}

/// Per-model options; any change requires a detector rebuild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelOptions {
    pub max_faces: usize,
    pub min_face_confidence: f64,
    /// Overrides where the face box model is downloaded from.
    pub face_box_model_url: Option<String>,
    /// Overrides where the landmark model is downloaded from.
    pub landmark_model_url: Option<String>,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            max_faces: 1,
            min_face_confidence: 0.5,
            face_box_model_url: None,
            landmark_model_url: None,
        }
    }
}

#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("could not resolve model {name}: {reason}")]
    Resolve { name: String, reason: String },
    #[error("failed to create inference session for {name}: {reason}")]
    Session { name: String, reason: String },
    #[error("model {name} has an incompatible signature: {reason}")]
    IncompatibleModel { name: String, reason: String },
}

/// Builds detectors bound to a model and the current runtime settings.
pub trait DetectorFactory: Send {
    fn create(
        &mut self,
        model: ModelId,
        options: &ModelOptions,
        runtime: &RuntimeSettings,
    ) -> Result<Box<dyn LandmarkDetector>, ModelLoadError>;
}

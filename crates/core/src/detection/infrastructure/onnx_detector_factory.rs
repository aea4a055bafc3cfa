use std::path::PathBuf;

use crate::detection::domain::detector_factory::{DetectorFactory, ModelId, ModelLoadError, ModelOptions};
use crate::detection::domain::landmark_detector::LandmarkDetector;
use crate::detection::domain::runtime::RuntimeSettings;
use crate::measurement::domain::landmark_index::{BASE_LANDMARK_COUNT, REFINED_LANDMARK_COUNT};
use crate::shared::constants::{
    FACE_BOX_MODEL_NAME, FACE_MESH_MODEL_NAME, FACE_MESH_REFINED_MODEL_NAME,
};

use super::model_resolver::{self, ModelSource, ProgressFn};
use super::onnx_face_box_detector::OnnxFaceBoxDetector;
use super::onnx_face_mesh_detector::OnnxFaceMeshDetector;

/// Builds ONNX face mesh detectors, resolving model files on demand.
pub struct OnnxDetectorFactory {
    bundled_dir: Option<PathBuf>,
    on_download: Option<fn(u64, u64)>,
}

impl OnnxDetectorFactory {
    pub fn new(bundled_dir: Option<PathBuf>) -> Self {
        Self {
            bundled_dir,
            on_download: None,
        }
    }

    /// Report `(downloaded, total)` bytes while a model downloads.
    pub fn with_download_progress(mut self, callback: fn(u64, u64)) -> Self {
        self.on_download = Some(callback);
        self
    }

    fn resolve(&self, source: &ModelSource) -> Result<PathBuf, ModelLoadError> {
        let progress: Option<ProgressFn> = self
            .on_download
            .map(|cb| Box::new(cb) as ProgressFn);
        model_resolver::resolve(source, self.bundled_dir.as_deref(), progress).map_err(|e| {
            ModelLoadError::Resolve {
                name: source.name.clone(),
                reason: e.to_string(),
            }
        })
    }
}

/// Landmark model file and point count for a model id.
pub fn landmark_model(model: ModelId) -> (&'static str, usize) {
    match model {
        ModelId::FaceMesh => (FACE_MESH_MODEL_NAME, BASE_LANDMARK_COUNT),
        ModelId::FaceMeshRefined => (FACE_MESH_REFINED_MODEL_NAME, REFINED_LANDMARK_COUNT),
    }
}

impl DetectorFactory for OnnxDetectorFactory {
    fn create(
        &mut self,
        model: ModelId,
        options: &ModelOptions,
        runtime: &RuntimeSettings,
    ) -> Result<Box<dyn LandmarkDetector>, ModelLoadError> {
        let (landmark_name, landmark_count) = landmark_model(model);
        let box_source = ModelSource::new(FACE_BOX_MODEL_NAME, options.face_box_model_url.as_deref());
        let mesh_source = ModelSource::new(landmark_name, options.landmark_model_url.as_deref());

        log::info!("Loading {model} ({landmark_count} landmarks) on {}", runtime.backend);
        let box_path = self.resolve(&box_source)?;
        let mesh_path = self.resolve(&mesh_source)?;

        let face_boxes =
            OnnxFaceBoxDetector::new(&box_path, runtime, options.min_face_confidence).map_err(
                |e| ModelLoadError::Session {
                    name: box_source.name.clone(),
                    reason: e.to_string(),
                },
            )?;
        let detector = OnnxFaceMeshDetector::new(
            face_boxes,
            &mesh_path,
            runtime,
            landmark_count,
            options.max_faces,
        )?;
        Ok(Box::new(detector))
    }
}

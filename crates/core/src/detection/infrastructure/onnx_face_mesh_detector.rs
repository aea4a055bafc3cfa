//! Two-stage face mesh detector: face boxes first, then a landmark model on
//! each squared, expanded face crop.
use std::path::Path;

use crate::detection::domain::detector_factory::ModelLoadError;
use crate::detection::domain::landmark_detector::{
    EstimationOptions, InferenceError, LandmarkDetector,
};
use crate::detection::domain::runtime::RuntimeSettings;
use crate::measurement::domain::landmark_set::{LandmarkSet, Point3};
use crate::shared::frame::Frame;

use super::execution_provider::build_session;
use super::onnx_face_box_detector::{FaceBox, OnnxFaceBoxDetector};
use super::preprocess::{sample_roi, sigmoid, Roi, TensorLayout};

/// Landmark model input resolution when the model doesn't declare one.
const DEFAULT_INPUT_SIZE: u32 = 192;

/// Face boxes are tight around the face; the landmark model expects margin.
const ROI_SCALE: f64 = 1.5;

/// Minimum face-presence probability for a crop to count as a face.
const MIN_PRESENCE: f32 = 0.5;

pub struct OnnxFaceMeshDetector {
    face_boxes: OnnxFaceBoxDetector,
    session: ort::session::Session,
    layout: TensorLayout,
    input_size: u32,
    landmark_count: usize,
    max_faces: usize,
}

impl OnnxFaceMeshDetector {
    /// Load the landmark model and check it produces `landmark_count` points.
    pub fn new(
        face_boxes: OnnxFaceBoxDetector,
        landmark_model_path: &Path,
        runtime: &RuntimeSettings,
        landmark_count: usize,
        max_faces: usize,
    ) -> Result<Self, ModelLoadError> {
        let name = landmark_model_path.display().to_string();
        let session = build_session(landmark_model_path, runtime).map_err(|e| {
            ModelLoadError::Session {
                name: name.clone(),
                reason: e.to_string(),
            }
        })?;

        let input_shape = session.inputs().first().and_then(|input| {
            if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                Some(shape.iter().copied().collect::<Vec<i64>>())
            } else {
                None
            }
        });
        let layout = input_shape
            .as_deref()
            .map_or(TensorLayout::Nhwc, TensorLayout::from_shape);
        let input_size = input_shape
            .as_deref()
            .and_then(|s| layout.input_size(s))
            .unwrap_or(DEFAULT_INPUT_SIZE);

        let declared = session.outputs().first().and_then(|output| {
            if let ort::value::ValueType::Tensor { ref shape, .. } = output.dtype() {
                declared_element_count(&shape.iter().copied().collect::<Vec<i64>>())
            } else {
                None
            }
        });
        if let Some(values) = declared {
            if values != landmark_count * 3 {
                return Err(ModelLoadError::IncompatibleModel {
                    name,
                    reason: format!(
                        "expected {} landmark values ({landmark_count} points), model declares {values}",
                        landmark_count * 3
                    ),
                });
            }
        }

        Ok(Self {
            face_boxes,
            session,
            layout,
            input_size,
            landmark_count,
            max_faces: max_faces.max(1),
        })
    }

    fn landmarks_for(
        &mut self,
        frame: &Frame,
        face: &FaceBox,
        options: EstimationOptions,
    ) -> Result<Option<LandmarkSet>, InferenceError> {
        let roi = Roi::square_around(face.x1, face.y1, face.x2, face.y2, ROI_SCALE);
        let input_tensor = sample_roi(frame, &roi, self.input_size, self.layout);
        let input_value = ort::value::Tensor::from_array(input_tensor).map_err(runtime_err)?;
        let outputs = self
            .session
            .run(ort::inputs![input_value])
            .map_err(runtime_err)?;
        if outputs.len() == 0 {
            return Err(InferenceError::UnexpectedOutput(
                "landmark model produced no outputs".into(),
            ));
        }

        if outputs.len() > 1 {
            let flag = outputs[1].try_extract_array::<f32>().map_err(runtime_err)?;
            let presence = flag.iter().next().copied().map(sigmoid).unwrap_or(1.0);
            if presence < MIN_PRESENCE {
                return Ok(None);
            }
        }

        let tensor = outputs[0].try_extract_array::<f32>().map_err(runtime_err)?;
        let data = tensor
            .as_slice()
            .ok_or_else(|| InferenceError::UnexpectedOutput("non-contiguous landmark tensor".into()))?;
        let points = decode_landmarks(
            data,
            self.landmark_count,
            &roi,
            self.input_size,
            frame.width(),
            options.flip_horizontal,
        )?;
        Ok(Some(LandmarkSet::new(points, face.score)))
    }
}

impl LandmarkDetector for OnnxFaceMeshDetector {
    fn estimate_faces(
        &mut self,
        frame: &Frame,
        options: EstimationOptions,
    ) -> Result<Vec<LandmarkSet>, InferenceError> {
        let boxes = self.face_boxes.detect(frame).map_err(runtime_err)?;
        let mut faces = Vec::with_capacity(boxes.len().min(self.max_faces));
        for face in boxes.iter().take(self.max_faces) {
            if let Some(set) = self.landmarks_for(frame, face, options)? {
                faces.push(set);
            }
        }
        Ok(faces)
    }
}

fn runtime_err(e: impl std::fmt::Display) -> InferenceError {
    InferenceError::Runtime(e.to_string())
}

/// Total elements of a fully static shape.
fn declared_element_count(shape: &[i64]) -> Option<usize> {
    if shape.is_empty() || shape.iter().any(|&d| d <= 0) {
        return None;
    }
    Some(shape.iter().map(|&d| d as usize).product())
}

/// Map crop-space `(x, y, z)` triples back to frame pixels.
///
/// `z` is scaled like `x` so depth stays comparable with planar distances.
fn decode_landmarks(
    data: &[f32],
    count: usize,
    roi: &Roi,
    input_size: u32,
    frame_width: u32,
    flip_horizontal: bool,
) -> Result<Vec<Point3>, InferenceError> {
    if data.len() < count * 3 {
        return Err(InferenceError::UnexpectedOutput(format!(
            "expected {} landmark values, got {}",
            count * 3,
            data.len()
        )));
    }
    let sx = roi.width / input_size as f64;
    let sy = roi.height / input_size as f64;
    Ok(data
        .chunks_exact(3)
        .take(count)
        .map(|v| {
            let x = roi.x + v[0] as f64 * sx;
            let y = roi.y + v[1] as f64 * sy;
            let z = v[2] as f64 * sx;
            let x = if flip_horizontal {
                frame_width as f64 - x
            } else {
                x
            };
            Point3::new(x, y, z)
        })
        .collect())
}

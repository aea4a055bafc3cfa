//! BlazeFace short-range face box detector using ONNX Runtime via `ort`.
//!
//! First stage of the face mesh pipeline: finds face boxes that the
//! landmark stage then crops.
use std::path::Path;

use crate::detection::domain::runtime::RuntimeSettings;
use crate::shared::frame::Frame;

use super::execution_provider::build_session;
use super::math::bbox_iou;
use super::preprocess::{sample_roi, sigmoid, Roi, TensorLayout};

/// BlazeFace model input resolution.
const INPUT_SIZE: u32 = 128;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.3;

/// Number of BlazeFace anchors (short-range model).
const NUM_ANCHORS: usize = 896;

/// Values per anchor in the regressor output: box (4) + 6 keypoints (12).
const REGRESSOR_STRIDE: usize = 16;

/// A detected face box in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub score: f64,
}

impl FaceBox {
    fn corners(&self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

pub struct OnnxFaceBoxDetector {
    session: ort::session::Session,
    confidence: f64,
    layout: TensorLayout,
    anchors: Vec<[f32; 2]>,
}

impl OnnxFaceBoxDetector {
    pub fn new(
        model_path: &Path,
        runtime: &RuntimeSettings,
        confidence: f64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let session = build_session(model_path, runtime)?;
        let layout = session
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    let dims: Vec<i64> = shape.iter().copied().collect();
                    Some(TensorLayout::from_shape(&dims))
                } else {
                    None
                }
            })
            .unwrap_or(TensorLayout::Nchw);
        Ok(Self {
            session,
            confidence,
            layout,
            anchors: generate_anchors(),
        })
    }

    /// Face boxes sorted by descending score.
    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceBox>, Box<dyn std::error::Error>> {
        let input_tensor = sample_roi(frame, &Roi::full_frame(frame), INPUT_SIZE, self.layout);
        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        // regressors: [1, 896, 16], classificators: [1, 896, 1]
        if outputs.len() < 2 {
            return Err(
                format!("face box model expected 2 outputs, got {}", outputs.len()).into(),
            );
        }
        let regressors = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let reg_data = regressors.as_slice().ok_or("Cannot get regressor slice")?;
        let score_data = scores.as_slice().ok_or("Cannot get score slice")?;

        let mut boxes = decode_boxes(
            reg_data,
            score_data,
            &self.anchors,
            self.confidence,
            frame.width(),
            frame.height(),
        );
        Ok(nms(&mut boxes, NMS_IOU_THRESH))
    }
}

/// Decode anchor-relative regressions into frame-pixel boxes above `confidence`.
fn decode_boxes(
    reg_data: &[f32],
    score_data: &[f32],
    anchors: &[[f32; 2]],
    confidence: f64,
    frame_w: u32,
    frame_h: u32,
) -> Vec<FaceBox> {
    let fw = frame_w as f32;
    let fh = frame_h as f32;
    let mut boxes = Vec::new();

    for (i, &raw_score) in score_data.iter().enumerate().take(anchors.len()) {
        let score = sigmoid(raw_score);
        if (score as f64) < confidence {
            continue;
        }
        let offset = i * REGRESSOR_STRIDE;
        if offset + 4 > reg_data.len() {
            break;
        }

        let anchor = anchors[i];
        let cx = anchor[0] + reg_data[offset] / INPUT_SIZE as f32;
        let cy = anchor[1] + reg_data[offset + 1] / INPUT_SIZE as f32;
        let w = reg_data[offset + 2] / INPUT_SIZE as f32;
        let h = reg_data[offset + 3] / INPUT_SIZE as f32;

        boxes.push(FaceBox {
            x1: ((cx - w / 2.0) * fw).max(0.0) as f64,
            y1: ((cy - h / 2.0) * fh).max(0.0) as f64,
            x2: ((cx + w / 2.0) * fw).min(fw) as f64,
            y2: ((cy + h / 2.0) * fh).min(fh) as f64,
            score: score as f64,
        });
    }
    boxes
}

/// Generate BlazeFace anchors for the short-range model.
///
/// Two feature maps: 16×16 with 2 anchors per cell and 8×8 with 6.
fn generate_anchors() -> Vec<[f32; 2]> {
    let strides = [(8, 2), (16, 6)]; // (stride, anchors_per_cell)
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);

    for &(stride, num) in &strides {
        let grid_size = INPUT_SIZE as usize / stride;
        for y in 0..grid_size {
            for x in 0..grid_size {
                let cx = (x as f32 + 0.5) / grid_size as f32;
                let cy = (y as f32 + 0.5) / grid_size as f32;
                for _ in 0..num {
                    anchors.push([cx, cy]);
                }
            }
        }
    }

    anchors
}

fn nms(boxes: &mut [FaceBox], iou_thresh: f64) -> Vec<FaceBox> {
    boxes.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<FaceBox> = Vec::new();
    for candidate in boxes.iter() {
        let overlaps = keep
            .iter()
            .any(|k| bbox_iou(&k.corners(), &candidate.corners()) > iou_thresh);
        if !overlaps {
            keep.push(*candidate);
        }
    }
    keep
}

//! Frame → tensor conversion shared by the ONNX detectors.

use ndarray::Array4;

use crate::shared::frame::Frame;

/// Axis layout of a model's image input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorLayout {
    /// `[1, 3, H, W]`
    Nchw,
    /// `[1, H, W, 3]`
    Nhwc,
}

impl TensorLayout {
    /// Guesses the layout from a 4-D input shape; a channel axis of 3 in
    /// position 1 means NCHW.
    pub fn from_shape(shape: &[i64]) -> Self {
        if shape.len() == 4 && shape[1] == 3 {
            TensorLayout::Nchw
        } else {
            TensorLayout::Nhwc
        }
    }

    /// Square input size, when the shape declares one.
    pub fn input_size(&self, shape: &[i64]) -> Option<u32> {
        if shape.len() != 4 {
            return None;
        }
        let h = match self {
            TensorLayout::Nchw => shape[2],
            TensorLayout::Nhwc => shape[1],
        };
        (h > 0).then_some(h as u32)
    }
}

/// A rectangle in frame pixel coordinates. May extend past the frame edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Roi {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Roi {
    pub fn full_frame(frame: &Frame) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: frame.width() as f64,
            height: frame.height() as f64,
        }
    }

    /// Square box centered on `(x1, y1, x2, y2)` with side `max(w, h) * scale`.
    pub fn square_around(x1: f64, y1: f64, x2: f64, y2: f64, scale: f64) -> Self {
        let side = (x2 - x1).max(y2 - y1) * scale;
        let cx = (x1 + x2) / 2.0;
        let cy = (y1 + y2) / 2.0;
        Self {
            x: cx - side / 2.0,
            y: cy - side / 2.0,
            width: side,
            height: side,
        }
    }
}

/// Nearest-neighbor resample of `roi` to `size × size`, normalized to [0,1].
///
/// Samples falling outside the frame read as black.
pub fn sample_roi(frame: &Frame, roi: &Roi, size: u32, layout: TensorLayout) -> Array4<f32> {
    let src = frame.as_ndarray();
    let src_h = frame.height() as i64;
    let src_w = frame.width() as i64;
    let s = size as usize;

    let mut tensor = match layout {
        TensorLayout::Nchw => Array4::<f32>::zeros((1, 3, s, s)),
        TensorLayout::Nhwc => Array4::<f32>::zeros((1, s, s, 3)),
    };

    for y in 0..s {
        let src_y = (roi.y + (y as f64 + 0.5) * roi.height / s as f64).floor() as i64;
        if src_y < 0 || src_y >= src_h {
            continue;
        }
        for x in 0..s {
            let src_x = (roi.x + (x as f64 + 0.5) * roi.width / s as f64).floor() as i64;
            if src_x < 0 || src_x >= src_w {
                continue;
            }
            for c in 0..3 {
                let v = src[[src_y as usize, src_x as usize, c]] as f32 / 255.0;
                match layout {
                    TensorLayout::Nchw => tensor[[0, c, y, x]] = v,
                    TensorLayout::Nhwc => tensor[[0, y, x, c]] = v,
                }
            }
        }
    }

    tensor
}

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

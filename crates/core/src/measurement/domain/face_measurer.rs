//! Physical measurements and shape inputs derived from one landmark set.
//!
//! A known physical length across the iris gives the millimeters-per-unit
//! ratio. Shape inputs stay in raw landmark units.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::face_shape::{ShapeDistances, ShapeLabel};
use super::landmark_index as idx;
use super::landmark_set::{LandmarkSet, OutOfRange};
use crate::shared::constants::{FACE_LENGTH_SCALE, IRIS_REFERENCE_MM};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeasurementError {
    #[error(transparent)]
    OutOfRange(#[from] OutOfRange),
    #[error("iris reference points coincide, calibration ratio is undefined")]
    DegenerateCalibration,
}

/// Two landmarks a fixed physical distance apart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReference {
    pub point_a: usize,
    pub point_b: usize,
    pub physical_mm: f64,
}

impl Default for CalibrationReference {
    fn default() -> Self {
        Self {
            point_a: idx::LEFT_IRIS_CENTER,
            point_b: idx::LEFT_IRIS_EDGE,
            physical_mm: IRIS_REFERENCE_MM,
        }
    }
}

/// Eyewear-fitting distances, in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceMeasurements {
    pub temple_width_mm: f64,
    pub pupillary_distance_mm: f64,
    pub inner_eye_tail_mm: f64,
    pub outer_eye_tail_mm: f64,
}

/// Everything derived from one face in one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceReport {
    pub frame: usize,
    pub calibration_ratio: f64,
    pub measurements: FaceMeasurements,
    pub shape_distances: ShapeDistances,
    pub shape: ShapeLabel,
}

/// Endpoints of each millimeter measurement.
const TEMPLE: (usize, usize) = (idx::LEFT_TEMPLE, idx::RIGHT_TEMPLE);
const PUPILS: (usize, usize) = (idx::RIGHT_IRIS_CENTER, idx::LEFT_IRIS_CENTER);
const INNER_EYE_TAILS: (usize, usize) = (idx::LEFT_INNER_EYE_TAIL, idx::RIGHT_INNER_EYE_TAIL);
const OUTER_EYE_TAILS: (usize, usize) = (idx::LEFT_OUTER_EYE_TAIL, idx::RIGHT_OUTER_EYE_TAIL);

#[derive(Debug, Clone, Default)]
pub struct FaceMeasurer {
    reference: CalibrationReference,
}

impl FaceMeasurer {
    pub fn new(reference: CalibrationReference) -> Self {
        Self { reference }
    }

    pub fn reference(&self) -> &CalibrationReference {
        &self.reference
    }

    /// Smallest landmark count for which `measure` can succeed.
    pub fn required_landmarks(&self) -> usize {
        let fixed = [
            TEMPLE.0,
            TEMPLE.1,
            PUPILS.0,
            PUPILS.1,
            INNER_EYE_TAILS.0,
            INNER_EYE_TAILS.1,
            OUTER_EYE_TAILS.0,
            OUTER_EYE_TAILS.1,
            idx::LEFT_BROW,
            idx::RIGHT_BROW,
            idx::LEFT_CHEEKBONE,
            idx::RIGHT_CHEEKBONE,
            idx::CHIN,
            idx::FOREHEAD_TOP,
        ];
        let reference = [self.reference.point_a, self.reference.point_b];
        let max = fixed
            .iter()
            .chain(idx::JAW_CONTOUR.iter())
            .chain(reference.iter())
            .copied()
            .max()
            .unwrap_or(0);
        max + 1
    }

    /// Millimeters per raw landmark unit.
    pub fn calibration_ratio(&self, landmarks: &LandmarkSet) -> Result<f64, MeasurementError> {
        let span = landmarks.distance(self.reference.point_a, self.reference.point_b)?;
        if span <= 0.0 || !span.is_finite() {
            return Err(MeasurementError::DegenerateCalibration);
        }
        Ok(self.reference.physical_mm / span)
    }

    pub fn derive_measurements(
        &self,
        landmarks: &LandmarkSet,
        ratio: f64,
    ) -> Result<FaceMeasurements, OutOfRange> {
        let mm = |(a, b): (usize, usize)| landmarks.distance(a, b).map(|d| d * ratio);
        Ok(FaceMeasurements {
            temple_width_mm: mm(TEMPLE)?,
            pupillary_distance_mm: mm(PUPILS)?,
            inner_eye_tail_mm: mm(INNER_EYE_TAILS)?,
            outer_eye_tail_mm: mm(OUTER_EYE_TAILS)?,
        })
    }

    pub fn shape_distances(&self, landmarks: &LandmarkSet) -> Result<ShapeDistances, OutOfRange> {
        Ok(ShapeDistances {
            forehead: landmarks.distance(idx::LEFT_BROW, idx::RIGHT_BROW)?,
            cheekbone: landmarks.distance(idx::LEFT_CHEEKBONE, idx::RIGHT_CHEEKBONE)?,
            jaw: landmarks.path_length(&idx::JAW_CONTOUR)?,
            face_length: landmarks.distance(idx::CHIN, idx::FOREHEAD_TOP)? * FACE_LENGTH_SCALE,
        })
    }

    /// Full per-frame report. Fails before touching any point when the set is
    /// shorter than `required_landmarks`.
    pub fn measure(
        &self,
        landmarks: &LandmarkSet,
        frame: usize,
    ) -> Result<FaceReport, MeasurementError> {
        let required = self.required_landmarks();
        if landmarks.len() < required {
            return Err(OutOfRange {
                index: required - 1,
                len: landmarks.len(),
            }
            .into());
        }

        let calibration_ratio = self.calibration_ratio(landmarks)?;
        let measurements = self.derive_measurements(landmarks, calibration_ratio)?;
        let shape_distances = self.shape_distances(landmarks)?;
        Ok(FaceReport {
            frame,
            calibration_ratio,
            measurements,
            shape: shape_distances.classify(),
            shape_distances,
        })
    }
}

use thiserror::Error;

use crate::measurement::domain::landmark_set::LandmarkSet;
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("inference failed: {0}")]
    Runtime(String),
    #[error("model produced unexpected output: {0}")]
    UnexpectedOutput(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EstimationOptions {
    /// Mirror landmark x coordinates around the frame width.
    pub flip_horizontal: bool,
}

/// Domain interface for facial landmark estimation.
///
/// A detector is bound to one (model, backend, flags) combination for its
/// whole life. Implementations may keep state between frames, hence `&mut self`.
pub trait LandmarkDetector: Send {
    /// Landmark sets for every face found, most confident first.
    fn estimate_faces(
        &mut self,
        frame: &Frame,
        options: EstimationOptions,
    ) -> Result<Vec<LandmarkSet>, InferenceError>;

    /// Releases runtime resources ahead of drop. Default: no-op.
    fn dispose(&mut self) {}
}

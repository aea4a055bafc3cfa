use crate::measurement::domain::landmark_set::LandmarkSet;
use crate::shared::frame::Frame;

/// Draws the camera feed and detection overlays. Calls never block on I/O
/// the loop has to wait for.
pub trait FrameRenderer: Send {
    /// Draws the raw camera frame.
    fn draw_frame(&mut self, frame: &Frame);

    /// Draws annotations for each face on top of the last drawn frame.
    fn draw_results(&mut self, faces: &[LandmarkSet], show_mesh: bool, show_bounding_box: bool);

    /// Called once per tick after all drawing. Default: no-op.
    fn present(&mut self) {}
}

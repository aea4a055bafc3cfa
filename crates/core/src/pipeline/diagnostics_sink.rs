use crate::measurement::domain::face_measurer::FaceReport;

/// Receives everything the frame loop wants to show the user.
///
/// Fire-and-forget: implementations handle their own failures and must never
/// make the loop stop.
pub trait DiagnosticsSink: Send {
    /// Measurements and shape of the first face in a frame.
    fn face_report(&mut self, report: &FaceReport);

    /// Inference throughput, published once per stats window.
    fn inference_fps(&mut self, fps: f64);

    /// User-visible error (device, model load, backend, inference).
    fn error(&mut self, message: &str);

    /// Human-readable status message.
    fn info(&mut self, message: &str);
}

/// Silent sink that discards all events.
pub struct NullDiagnosticsSink;

impl DiagnosticsSink for NullDiagnosticsSink {
    fn face_report(&mut self, _report: &FaceReport) {}
    fn inference_fps(&mut self, _fps: f64) {}
    fn error(&mut self, _message: &str) {}
    fn info(&mut self, _message: &str) {}
}

use std::io::Write;

use serde_json::json;

use crate::measurement::domain::face_measurer::FaceReport;
use crate::pipeline::diagnostics_sink::DiagnosticsSink;

/// Writes one JSON object per event, newline separated.
///
/// Write failures are logged and otherwise ignored.
pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn emit(&mut self, value: serde_json::Value) {
        let result = serde_json::to_writer(&mut self.writer, &value)
            .map_err(std::io::Error::from)
            .and_then(|_| self.writer.write_all(b"\n"))
            .and_then(|_| self.writer.flush());
        if let Err(e) = result {
            log::warn!("Failed to write diagnostics line: {e}");
        }
    }
}

impl<W: Write + Send> DiagnosticsSink for JsonLinesSink<W> {
    fn face_report(&mut self, report: &FaceReport) {
        self.emit(json!({ "event": "face", "report": report }));
    }

    fn inference_fps(&mut self, fps: f64) {
        self.emit(json!({ "event": "fps", "fps": fps }));
    }

    fn error(&mut self, message: &str) {
        self.emit(json!({ "event": "error", "message": message }));
    }

    fn info(&mut self, message: &str) {
        self.emit(json!({ "event": "info", "message": message }));
    }
}

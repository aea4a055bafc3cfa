use crate::measurement::domain::face_measurer::FaceReport;
use crate::pipeline::diagnostics_sink::DiagnosticsSink;

/// Emits diagnostics through the `log` facade.
///
/// Face reports arrive every frame, so only every `throttle_reports`-th one
/// is logged at info level; the rest go to debug.
pub struct LogDiagnosticsSink {
    throttle_reports: usize,
    reports_seen: usize,
    last_fps: Option<f64>,
    last_error: Option<String>,
}

impl LogDiagnosticsSink {
    pub fn new(throttle_reports: usize) -> Self {
        Self {
            throttle_reports: throttle_reports.max(1),
            reports_seen: 0,
            last_fps: None,
            last_error: None,
        }
    }

    pub fn reports_seen(&self) -> usize {
        self.reports_seen
    }

    pub fn last_fps(&self) -> Option<f64> {
        self.last_fps
    }

    /// Most recent user-visible error.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn format_report(report: &FaceReport) -> String {
        let m = &report.measurements;
        format!(
            "frame {}: PD {:.1} mm, temple {:.1} mm, inner eye-tail {:.1} mm, \
             outer eye-tail {:.1} mm, shape {}",
            report.frame,
            m.pupillary_distance_mm,
            m.temple_width_mm,
            m.inner_eye_tail_mm,
            m.outer_eye_tail_mm,
            report.shape
        )
    }
}

impl Default for LogDiagnosticsSink {
    fn default() -> Self {
        Self::new(30)
    }
}

impl DiagnosticsSink for LogDiagnosticsSink {
    fn face_report(&mut self, report: &FaceReport) {
        let line = Self::format_report(report);
        if self.reports_seen % self.throttle_reports == 0 {
            log::info!("{line}");
        } else {
            log::debug!("{line}");
        }
        self.reports_seen += 1;
    }

    fn inference_fps(&mut self, fps: f64) {
        self.last_fps = Some(fps);
        log::info!("Inference: {fps:.1} fps");
    }

    fn error(&mut self, message: &str) {
        self.last_error = Some(message.to_string());
        log::error!("{message}");
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::domain::face_measurer::FaceMeasurements;
    use crate::measurement::domain::face_shape::{ShapeDistances, ShapeLabel};

    fn report(frame: usize) -> FaceReport {
        FaceReport {
            frame,
            calibration_ratio: 0.25,
            measurements: FaceMeasurements {
                temple_width_mm: 140.0,
                pupillary_distance_mm: 62.5,
                inner_eye_tail_mm: 30.0,
                outer_eye_tail_mm: 95.0,
            },
            shape_distances: ShapeDistances {
                forehead: 100.0,
                cheekbone: 120.0,
                jaw: 121.0,
                face_length: 130.0,
            },
            shape: ShapeLabel::Triangle,
        }
    }

    #[test]
    fn test_format_report_includes_values() {
        let line = LogDiagnosticsSink::format_report(&report(3));
        assert!(line.contains("frame 3"));
        assert!(line.contains("PD 62.5 mm"));
        assert!(line.contains("shape Triangle"));
    }

    #[test]
    fn test_counts_reports() {
        let mut sink = LogDiagnosticsSink::new(10);
        for i in 0..25 {
            sink.face_report(&report(i));
        }
        assert_eq!(sink.reports_seen(), 25);
    }

    #[test]
    fn test_keeps_last_error_and_fps() {
        let mut sink = LogDiagnosticsSink::default();
        sink.error("first");
        sink.error("second");
        sink.inference_fps(42.0);
        assert_eq!(sink.last_error(), Some("second"));
        assert_eq!(sink.last_fps(), Some(42.0));
    }

    #[test]
    fn test_zero_throttle_is_clamped() {
        let mut sink = LogDiagnosticsSink::new(0);
        sink.face_report(&report(0));
        assert_eq!(sink.reports_seen(), 1);
    }
}

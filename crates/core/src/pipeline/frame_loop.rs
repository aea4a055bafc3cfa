use std::time::Instant;

use crossbeam_channel::{select, Receiver};

use crate::capture::domain::capture_source::DeviceError;
use crate::detection::domain::landmark_detector::EstimationOptions;
use crate::measurement::domain::face_measurer::{FaceMeasurer, FaceReport};
use crate::measurement::domain::landmark_set::LandmarkSet;
use crate::pipeline::config_state::{ConfigChange, ConfigState};
use crate::pipeline::diagnostics_sink::DiagnosticsSink;
use crate::pipeline::inference_stats::InferenceStats;
use crate::pipeline::model_lifecycle::{ModelLifecycle, Reconciliation};
use crate::pipeline::settings::Settings;
use crate::render::domain::frame_renderer::FrameRenderer;
use crate::shared::frame::Frame;

/// Why a tick stopped before rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickSkip {
    /// A detector rebuild was requested after reconciliation ran.
    ModelChanging,
    NoCapture,
    FrameNotReady,
}

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub reconciliation: Reconciliation,
    pub skipped: Option<TickSkip>,
    pub detection_ran: bool,
    pub faces: usize,
    pub report: Option<FaceReport>,
    pub inference_error: Option<String>,
    pub published_fps: Option<f64>,
    pub frame_drawn: bool,
    pub overlays_drawn: bool,
    /// A model rebuild was requested while detection ran.
    pub stale: bool,
}

/// The per-refresh scheduler: reconcile, wait for a frame, detect, measure,
/// render. Ticks run on the caller's thread and never overlap.
pub struct FrameLoop {
    config: ConfigState,
    changes: Receiver<ConfigChange>,
    lifecycle: ModelLifecycle,
    measurer: FaceMeasurer,
    stats: InferenceStats,
    renderer: Box<dyn FrameRenderer>,
    sink: Box<dyn DiagnosticsSink>,
}

impl FrameLoop {
    pub fn new(
        settings: Settings,
        changes: Receiver<ConfigChange>,
        lifecycle: ModelLifecycle,
        renderer: Box<dyn FrameRenderer>,
        sink: Box<dyn DiagnosticsSink>,
    ) -> Self {
        Self {
            measurer: FaceMeasurer::new(settings.calibration),
            config: ConfigState::new(settings),
            changes,
            lifecycle,
            stats: InferenceStats::new(),
            renderer,
            sink,
        }
    }

    pub fn config(&self) -> &ConfigState {
        &self.config
    }

    pub fn lifecycle(&self) -> &ModelLifecycle {
        &self.lifecycle
    }

    /// Ticks once per `refresh` message until a shutdown message arrives or
    /// the refresh channel disconnects, then releases the detector and
    /// capture source. A disconnected shutdown channel is ignored.
    pub fn run(&mut self, refresh: &Receiver<Instant>, shutdown: &Receiver<()>) {
        let mut shutdown = shutdown.clone();
        let mut ticks = 0usize;
        loop {
            let mut shutdown_closed = false;
            select! {
                recv(shutdown) -> msg => match msg {
                    Ok(()) => break,
                    Err(_) => shutdown_closed = true,
                },
                recv(refresh) -> msg => {
                    if msg.is_err() {
                        break;
                    }
                    let report = self.tick();
                    log::trace!("Tick {ticks}: {report:?}");
                    ticks += 1;
                }
            }
            if shutdown_closed {
                shutdown = crossbeam_channel::never();
            }
        }
        self.lifecycle.shutdown();
        self.sink.info(&format!("Frame loop stopped after {ticks} ticks"));
    }

    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();

        self.drain_changes();
        report.reconciliation = self.lifecycle.reconcile(&mut self.config, self.sink.as_mut());

        self.drain_changes();
        if self.config.dirty().model_changing() {
            report.skipped = Some(TickSkip::ModelChanging);
            return report;
        }

        let Some(frame) = self.next_frame(&mut report) else {
            return report;
        };

        let faces = self.detect(&frame, &mut report);

        self.drain_changes();
        report.stale = self.config.dirty().model_changing();

        self.renderer.draw_frame(&frame);
        report.frame_drawn = true;
        if !faces.is_empty() && !report.stale {
            let render = self.config.settings().render;
            self.renderer
                .draw_results(&faces, render.show_mesh, render.show_bounding_box);
            report.overlays_drawn = true;
        }
        self.renderer.present();

        report
    }

    fn drain_changes(&mut self) {
        while let Ok(change) = self.changes.try_recv() {
            log::debug!("Config change: {change:?}");
            self.config.apply(change);
        }
    }

    fn next_frame(&mut self, report: &mut TickReport) -> Option<Frame> {
        let timeout = self.config.settings().capture.ready_timeout();
        let Some(capture) = self.lifecycle.capture_mut() else {
            report.skipped = Some(TickSkip::NoCapture);
            return None;
        };

        if !capture.is_ready() {
            if let Err(e) = capture.wait_ready(timeout) {
                match e {
                    DeviceError::NotReady(_) => log::warn!("Capture not ready: {e}"),
                    _ => {
                        self.sink.error(&format!("Camera error: {e}"));
                        self.lifecycle.release_capture();
                    }
                }
                report.skipped = Some(TickSkip::FrameNotReady);
                return None;
            }
        }

        let frame = capture.current_frame();
        if frame.is_none() {
            report.skipped = Some(TickSkip::FrameNotReady);
        }
        frame
    }

    fn detect(&mut self, frame: &Frame, report: &mut TickReport) -> Vec<LandmarkSet> {
        let options = EstimationOptions {
            flip_horizontal: self.config.settings().flip_horizontal,
        };
        let Some(detector) = self.lifecycle.detector_mut() else {
            return Vec::new();
        };

        report.detection_ran = true;
        let start = self.stats.begin_sample();
        let faces = match detector.estimate_faces(frame, options) {
            Ok(faces) => {
                if let Some(first) = faces.first() {
                    report.report = self.measure(first, frame.sequence());
                }
                faces
            }
            Err(e) => {
                let message = format!("Detection failed: {e}");
                self.lifecycle.discard_detector(message.clone());
                self.sink.error(&message);
                report.inference_error = Some(message);
                Vec::new()
            }
        };

        report.published_fps = self.stats.end_sample(start);
        if let Some(fps) = report.published_fps {
            self.sink.inference_fps(fps);
        }
        report.faces = faces.len();
        faces
    }

    fn measure(&mut self, face: &LandmarkSet, frame: usize) -> Option<FaceReport> {
        match self.measurer.measure(face, frame) {
            Ok(measured) => {
                self.sink.face_report(&measured);
                Some(measured)
            }
            Err(e) => {
                log::warn!("Skipping measurement for frame {frame}: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detector_factory::ModelId;
    use crate::detection::domain::landmark_detector::InferenceError;
    use crate::measurement::domain::landmark_index::{BASE_LANDMARK_COUNT, REFINED_LANDMARK_COUNT};
    use crate::pipeline::model_lifecycle::DetectorState;
    use crate::testing::{
        landmark_set, FakeCaptureProvider, FakeDetector, FakeFactory, FakeRuntime, Journal,
        RecordingRenderer, RecordingSink,
    };
    use crossbeam_channel::Sender;

    struct Harness {
        journal: Journal,
        changes: Sender<ConfigChange>,
        frame_loop: FrameLoop,
    }

    fn harness_with(
        journal: Journal,
        settings: Settings,
        factory: FakeFactory,
        capture: FakeCaptureProvider,
    ) -> Harness {
        let (tx, rx) = crossbeam_channel::unbounded();
        let lifecycle = ModelLifecycle::new(
            Box::new(factory),
            Box::new(FakeRuntime::new(&journal)),
            Box::new(capture),
        );
        let frame_loop = FrameLoop::new(
            settings,
            rx,
            lifecycle,
            Box::new(RecordingRenderer::new(&journal)),
            Box::new(RecordingSink::new(&journal)),
        );
        Harness {
            journal,
            changes: tx,
            frame_loop,
        }
    }

    fn harness(detector: impl FnOnce(&Journal) -> FakeDetector) -> Harness {
        let journal = Journal::default();
        let factory = FakeFactory::new(&journal).then(Ok(detector(&journal)));
        let capture = FakeCaptureProvider::new(&journal);
        harness_with(journal, Settings::default(), factory, capture)
    }

    #[test]
    fn test_zero_faces_skips_measurement_but_renders_frame() {
        let mut h = harness(|p| FakeDetector::new(p).then(Ok(Vec::new())));

        let report = h.frame_loop.tick();

        assert!(report.detection_ran);
        assert_eq!(report.faces, 0);
        assert!(report.report.is_none());
        assert!(report.frame_drawn && !report.overlays_drawn);
        let log = h.journal.log();
        assert!(log.reports.is_empty());
        assert_eq!(log.frames_drawn, 1);
        assert!(log.results_drawn.is_empty());
        assert_eq!(log.presented, 1);
    }

    #[test]
    fn test_face_is_measured_classified_and_drawn() {
        let mut h = harness(|p| {
            FakeDetector::new(p).then(Ok(vec![
                landmark_set(REFINED_LANDMARK_COUNT),
                landmark_set(REFINED_LANDMARK_COUNT),
            ]))
        });

        let report = h.frame_loop.tick();

        assert_eq!(report.faces, 2);
        let measured = report.report.expect("first face measured");
        assert_eq!(measured.frame, 1);
        assert!(measured.calibration_ratio.is_finite());
        assert!(report.overlays_drawn);
        let log = h.journal.log();
        assert_eq!(log.reports.len(), 1);
        assert_eq!(log.results_drawn, vec![(2, true, true)]);
    }

    #[test]
    fn test_inference_error_empties_slot_and_loop_continues() {
        let mut h = harness(|p| {
            FakeDetector::new(p).then(Err(InferenceError::Runtime("device lost".into())))
        });

        let report = h.frame_loop.tick();
        assert!(report.inference_error.unwrap().contains("device lost"));
        assert!(report.frame_drawn);
        assert_eq!(
            h.frame_loop.lifecycle().slot().state(),
            DetectorState::Failed
        );
        assert_eq!(h.journal.log().disposed, 1);
        assert_eq!(h.journal.log().errors.len(), 1);

        let next = h.frame_loop.tick();
        assert!(!next.detection_ran);
        assert!(next.frame_drawn);
        assert_eq!(h.journal.log().estimates, 1);
        assert_eq!(h.journal.log().errors.len(), 1);
    }

    #[test]
    fn test_short_landmark_set_skips_measurement_only() {
        let mut h = harness(|p| FakeDetector::new(p).then(Ok(vec![landmark_set(BASE_LANDMARK_COUNT)])));

        let report = h.frame_loop.tick();

        assert!(report.report.is_none());
        assert!(report.overlays_drawn);
        assert!(h.journal.log().errors.is_empty());
        assert_eq!(
            h.frame_loop.lifecycle().slot().state(),
            DetectorState::Ready
        );
    }

    #[test]
    fn test_rebuild_requested_during_detection_suppresses_overlays() {
        let journal = Journal::default();
        let (tx, rx) = crossbeam_channel::unbounded();
        let detector = FakeDetector::new(&journal)
            .then(Ok(vec![landmark_set(REFINED_LANDMARK_COUNT)]))
            .changing_config(tx.clone(), ConfigChange::Model(ModelId::FaceMesh));
        let lifecycle = ModelLifecycle::new(
            Box::new(FakeFactory::new(&journal).then(Ok(detector))),
            Box::new(FakeRuntime::new(&journal)),
            Box::new(FakeCaptureProvider::new(&journal)),
        );
        let mut frame_loop = FrameLoop::new(
            Settings::default(),
            rx,
            lifecycle,
            Box::new(RecordingRenderer::new(&journal)),
            Box::new(RecordingSink::new(&journal)),
        );

        let report = frame_loop.tick();
        assert!(report.stale);
        assert!(report.frame_drawn && !report.overlays_drawn);
        assert!(journal.log().results_drawn.is_empty());

        let next = frame_loop.tick();
        assert!(next.reconciliation.detector_rebuilt);
        assert!(!frame_loop.config().dirty().model);
        assert_eq!(
            journal.log().created,
            vec![ModelId::FaceMeshRefined, ModelId::FaceMesh]
        );
    }

    #[test]
    fn test_config_change_rebuilds_on_next_tick() {
        let mut h = harness(FakeDetector::new);
        h.frame_loop.tick();

        h.changes.send(ConfigChange::Model(ModelId::FaceMesh)).unwrap();
        let report = h.frame_loop.tick();

        assert!(report.reconciliation.detector_rebuilt);
        assert!(report.reconciliation.errors.is_empty());
        assert!(h.frame_loop.config().dirty().is_clean());
        assert_eq!(h.frame_loop.config().settings().model, ModelId::FaceMesh);
        assert_eq!(h.journal.log().disposed, 1);
    }

    #[test]
    fn test_failed_model_skips_detection_until_retry() {
        let journal = Journal::default();
        let factory = FakeFactory::new(&journal).then(Err("404".into()));
        let capture = FakeCaptureProvider::new(&journal);
        let mut h = harness_with(journal, Settings::default(), factory, capture);

        let report = h.frame_loop.tick();
        assert_eq!(report.reconciliation.errors.len(), 1);
        assert!(!report.detection_ran);
        assert!(report.frame_drawn);

        h.changes.send(ConfigChange::Retry).unwrap();
        let report = h.frame_loop.tick();
        assert!(report.reconciliation.errors.is_empty());
        assert!(report.detection_ran);
        assert_eq!(h.journal.log().errors.len(), 1);
    }

    #[test]
    fn test_no_capture_skips_tick() {
        let journal = Journal::default();
        let factory = FakeFactory::new(&journal);
        let capture = FakeCaptureProvider::new(&journal).failing_once();
        let mut h = harness_with(journal, Settings::default(), factory, capture);

        let report = h.frame_loop.tick();
        assert_eq!(report.skipped, Some(TickSkip::NoCapture));
        assert!(!report.frame_drawn);
        assert_eq!(h.journal.log().frames_drawn, 0);
    }

    #[test]
    fn test_frame_not_ready_skips_detection() {
        let journal = Journal::default();
        let factory = FakeFactory::new(&journal);
        let capture = FakeCaptureProvider::new(&journal).never_ready();
        let mut settings = Settings::default();
        settings.capture.ready_timeout_ms = 1;
        let mut h = harness_with(journal, settings, factory, capture);

        let report = h.frame_loop.tick();
        assert_eq!(report.skipped, Some(TickSkip::FrameNotReady));
        assert!(!report.detection_ran);
        assert_eq!(h.journal.log().estimates, 0);
        assert!(h.frame_loop.lifecycle().has_capture());
    }

    #[test]
    fn test_render_and_flip_options_reach_collaborators() {
        let mut h = harness(|p| {
            FakeDetector::new(p)
                .then(Ok(vec![landmark_set(REFINED_LANDMARK_COUNT)]))
                .then(Ok(vec![landmark_set(REFINED_LANDMARK_COUNT)]))
        });
        h.frame_loop.tick();

        h.changes.send(ConfigChange::ShowMesh(false)).unwrap();
        h.changes.send(ConfigChange::FlipHorizontal(true)).unwrap();
        let report = h.frame_loop.tick();

        assert!(!report.reconciliation.detector_rebuilt);
        let log = h.journal.log();
        assert_eq!(log.flips, vec![false, true]);
        assert_eq!(log.results_drawn, vec![(1, true, true), (1, false, true)]);
    }

    #[test]
    fn test_run_ticks_until_refresh_closes_then_releases() {
        let mut h = harness(FakeDetector::new);
        let (refresh_tx, refresh_rx) = crossbeam_channel::unbounded();
        let (_shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
        for _ in 0..3 {
            refresh_tx.send(Instant::now()).unwrap();
        }
        drop(refresh_tx);

        h.frame_loop.run(&refresh_rx, &shutdown_rx);

        assert_eq!(h.journal.log().frames_drawn, 3);
        assert_eq!(h.journal.log().disposed, 1);
        assert!(!h.frame_loop.lifecycle().has_capture());
    }

    #[test]
    fn test_run_stops_on_shutdown() {
        let mut h = harness(FakeDetector::new);
        let (_refresh_tx, refresh_rx) = crossbeam_channel::unbounded::<Instant>();
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        shutdown_tx.send(()).unwrap();

        h.frame_loop.run(&refresh_rx, &shutdown_rx);

        assert_eq!(h.journal.log().frames_drawn, 0);
    }

    #[test]
    fn test_run_keeps_ticking_after_shutdown_sender_dropped() {
        let mut h = harness(FakeDetector::new);
        let (refresh_tx, refresh_rx) = crossbeam_channel::unbounded();
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
        drop(shutdown_tx);
        for _ in 0..3 {
            refresh_tx.send(Instant::now()).unwrap();
        }
        drop(refresh_tx);

        h.frame_loop.run(&refresh_rx, &shutdown_rx);

        assert_eq!(h.journal.log().frames_drawn, 3);
        assert_eq!(h.journal.log().disposed, 1);
    }
}

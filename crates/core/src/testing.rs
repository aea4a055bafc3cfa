//! Fakes for the ports the frame loop depends on. All of them record into one
//! shared [`Journal`] so tests can assert on the order-free outcome of a tick.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crossbeam_channel::Sender;

use crate::capture::domain::capture_source::{
    CaptureConfig, CaptureProvider, CaptureSource, DeviceError,
};
use crate::detection::domain::detector_factory::{
    DetectorFactory, ModelId, ModelLoadError, ModelOptions,
};
use crate::detection::domain::landmark_detector::{
    EstimationOptions, InferenceError, LandmarkDetector,
};
use crate::detection::domain::runtime::{
    Backend, BackendError, RuntimeConfigurator, RuntimeFlags, RuntimeSettings,
};
use crate::measurement::domain::face_measurer::FaceReport;
use crate::measurement::domain::landmark_set::{LandmarkSet, Point3};
use crate::pipeline::config_state::ConfigChange;
use crate::pipeline::diagnostics_sink::DiagnosticsSink;
use crate::render::domain::frame_renderer::FrameRenderer;
use crate::shared::frame::Frame;

#[derive(Debug, Default)]
pub struct JournalEntries {
    pub configured: Vec<Backend>,
    pub created: Vec<ModelId>,
    pub estimates: usize,
    pub flips: Vec<bool>,
    pub disposed: usize,
    pub captures_opened: usize,
    pub frames_drawn: usize,
    pub results_drawn: Vec<(usize, bool, bool)>,
    pub presented: usize,
    pub reports: Vec<FaceReport>,
    pub errors: Vec<String>,
    pub fps: Vec<f64>,
}

#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<JournalEntries>>);

impl Journal {
    pub fn log(&self) -> MutexGuard<'_, JournalEntries> {
        self.0.lock().unwrap()
    }
}

/// A grid of `len` distinct points, 3 px apart.
pub fn landmark_set(len: usize) -> LandmarkSet {
    let points = (0..len)
        .map(|i| Point3::new(10.0 + (i % 23) as f64 * 3.0, 10.0 + (i / 23) as f64 * 3.0, 0.0))
        .collect();
    LandmarkSet::new(points, 0.9)
}

pub struct FakeDetector {
    journal: Journal,
    responses: VecDeque<Result<Vec<LandmarkSet>, InferenceError>>,
    mid_call: Option<(Sender<ConfigChange>, ConfigChange)>,
}

impl FakeDetector {
    /// Returns no faces on every call.
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            responses: VecDeque::new(),
            mid_call: None,
        }
    }

    /// Queues the result of the next call. Once exhausted, calls find no faces.
    pub fn then(mut self, response: Result<Vec<LandmarkSet>, InferenceError>) -> Self {
        self.responses.push_back(response);
        self
    }

    /// Sends `change` while the first detection call is in flight.
    pub fn changing_config(mut self, tx: Sender<ConfigChange>, change: ConfigChange) -> Self {
        self.mid_call = Some((tx, change));
        self
    }
}

impl LandmarkDetector for FakeDetector {
    fn estimate_faces(
        &mut self,
        _frame: &Frame,
        options: EstimationOptions,
    ) -> Result<Vec<LandmarkSet>, InferenceError> {
        {
            let mut log = self.journal.log();
            log.estimates += 1;
            log.flips.push(options.flip_horizontal);
        }
        if let Some((tx, change)) = self.mid_call.take() {
            tx.send(change).unwrap();
        }
        self.responses.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    fn dispose(&mut self) {
        self.journal.log().disposed += 1;
    }
}

/// Hands out queued detectors; `Err` entries fail the build with that reason.
pub struct FakeFactory {
    journal: Journal,
    plans: VecDeque<Result<FakeDetector, String>>,
}

impl FakeFactory {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            plans: VecDeque::new(),
        }
    }

    pub fn then(mut self, plan: Result<FakeDetector, String>) -> Self {
        self.plans.push_back(plan);
        self
    }
}

impl DetectorFactory for FakeFactory {
    fn create(
        &mut self,
        model: ModelId,
        _options: &ModelOptions,
        _runtime: &RuntimeSettings,
    ) -> Result<Box<dyn LandmarkDetector>, ModelLoadError> {
        self.journal.log().created.push(model);
        match self.plans.pop_front() {
            Some(Ok(detector)) => Ok(Box::new(detector)),
            Some(Err(reason)) => Err(ModelLoadError::Session {
                name: model.to_string(),
                reason,
            }),
            None => Ok(Box::new(FakeDetector::new(&self.journal))),
        }
    }
}

pub struct FakeRuntime {
    journal: Journal,
    unavailable: Vec<Backend>,
}

impl FakeRuntime {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            unavailable: Vec::new(),
        }
    }

    pub fn without(mut self, backend: Backend) -> Self {
        self.unavailable.push(backend);
        self
    }
}

impl RuntimeConfigurator for FakeRuntime {
    fn configure(
        &mut self,
        backend: Backend,
        flags: &RuntimeFlags,
    ) -> Result<RuntimeSettings, BackendError> {
        self.journal.log().configured.push(backend);
        if self.unavailable.contains(&backend) {
            return Err(BackendError::Unavailable(backend));
        }
        Ok(RuntimeSettings {
            backend,
            flags: *flags,
        })
    }
}

pub struct FakeCapture {
    frame: Option<Frame>,
    ready: bool,
}

impl CaptureSource for FakeCapture {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn wait_ready(&mut self, timeout: Duration) -> Result<(), DeviceError> {
        if self.frame.is_none() {
            return Err(DeviceError::NotReady(timeout.as_millis() as u64));
        }
        self.ready = true;
        Ok(())
    }

    fn current_frame(&self) -> Option<Frame> {
        if self.ready {
            self.frame.clone()
        } else {
            None
        }
    }
}

/// Opens captures that always show the same frame. Queued `false` entries
/// make the corresponding `setup` call fail.
pub struct FakeCaptureProvider {
    journal: Journal,
    frame: Option<Frame>,
    outcomes: VecDeque<bool>,
}

impl FakeCaptureProvider {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            frame: Some(Frame::filled(64, 48, [40, 40, 40], 1)),
            outcomes: VecDeque::new(),
        }
    }

    /// Captures open but never decode a frame.
    pub fn never_ready(mut self) -> Self {
        self.frame = None;
        self
    }

    pub fn failing_once(mut self) -> Self {
        self.outcomes.push_back(false);
        self
    }
}

impl CaptureProvider for FakeCaptureProvider {
    fn setup(&mut self, config: &CaptureConfig) -> Result<Box<dyn CaptureSource>, DeviceError> {
        if !self.outcomes.pop_front().unwrap_or(true) {
            return Err(DeviceError::Open {
                location: config.source.clone(),
                reason: "permission denied".into(),
            });
        }
        self.journal.log().captures_opened += 1;
        Ok(Box::new(FakeCapture {
            frame: self.frame.clone(),
            ready: false,
        }))
    }
}

pub struct RecordingRenderer {
    journal: Journal,
}

impl RecordingRenderer {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
        }
    }
}

impl FrameRenderer for RecordingRenderer {
    fn draw_frame(&mut self, _frame: &Frame) {
        self.journal.log().frames_drawn += 1;
    }

    fn draw_results(&mut self, faces: &[LandmarkSet], show_mesh: bool, show_bounding_box: bool) {
        self.journal
            .log()
            .results_drawn
            .push((faces.len(), show_mesh, show_bounding_box));
    }

    fn present(&mut self) {
        self.journal.log().presented += 1;
    }
}

pub struct RecordingSink {
    journal: Journal,
}

impl RecordingSink {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
        }
    }
}

impl DiagnosticsSink for RecordingSink {
    fn face_report(&mut self, report: &FaceReport) {
        self.journal.log().reports.push(report.clone());
    }

    fn inference_fps(&mut self, fps: f64) {
        self.journal.log().fps.push(fps);
    }

    fn error(&mut self, message: &str) {
        self.journal.log().errors.push(message.to_string());
    }

    fn info(&mut self, _message: &str) {}
}

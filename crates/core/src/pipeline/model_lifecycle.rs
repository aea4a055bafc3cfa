//! Owns the detector slot and the capture source, and rebuilds them when the
//! configuration they were built from changes.

use thiserror::Error;

use crate::capture::domain::capture_source::{CaptureConfig, CaptureProvider, CaptureSource, DeviceError};
use crate::detection::domain::detector_factory::{DetectorFactory, ModelLoadError};
use crate::detection::domain::landmark_detector::LandmarkDetector;
use crate::detection::domain::runtime::{BackendError, RuntimeConfigurator, RuntimeSettings};
use crate::pipeline::config_state::{ConfigState, DirtyBits};
use crate::pipeline::diagnostics_sink::DiagnosticsSink;
use crate::pipeline::settings::Settings;

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("camera unavailable: {0}")]
    Device(#[from] DeviceError),
    #[error("runtime backend error: {0}")]
    Backend(#[from] BackendError),
    #[error("model load failed: {0}")]
    ModelLoad(#[from] ModelLoadError),
}

pub enum DetectorSlot {
    Empty,
    Loading,
    Ready(Box<dyn LandmarkDetector>),
    /// Build or inference failed; stays empty until the configuration changes.
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    Empty,
    Loading,
    Ready,
    Failed,
}

impl DetectorSlot {
    pub fn state(&self) -> DetectorState {
        match self {
            DetectorSlot::Empty => DetectorState::Empty,
            DetectorSlot::Loading => DetectorState::Loading,
            DetectorSlot::Ready(_) => DetectorState::Ready,
            DetectorSlot::Failed(_) => DetectorState::Failed,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, DetectorSlot::Ready(_))
    }
}

impl std::fmt::Debug for DetectorSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectorSlot::Failed(reason) => f.debug_tuple("Failed").field(reason).finish(),
            other => write!(f, "{:?}", other.state()),
        }
    }
}

/// What one reconciliation pass did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    pub capture_rebuilt: bool,
    pub detector_rebuilt: bool,
    /// Errors surfaced to the sink during this pass.
    pub errors: Vec<String>,
}

pub struct ModelLifecycle {
    factory: Box<dyn DetectorFactory>,
    runtime: Box<dyn RuntimeConfigurator>,
    capture_provider: Box<dyn CaptureProvider>,
    slot: DetectorSlot,
    capture: Option<Box<dyn CaptureSource>>,
    runtime_settings: Option<RuntimeSettings>,
}

impl ModelLifecycle {
    pub fn new(
        factory: Box<dyn DetectorFactory>,
        runtime: Box<dyn RuntimeConfigurator>,
        capture_provider: Box<dyn CaptureProvider>,
    ) -> Self {
        Self {
            factory,
            runtime,
            capture_provider,
            slot: DetectorSlot::Empty,
            capture: None,
            runtime_settings: None,
        }
    }

    /// Rebuilds whatever the dirty bits ask for: capture first, then the
    /// detector. Bits are cleared whether or not the rebuild succeeded; each
    /// failure is reported to `sink` exactly once.
    pub fn reconcile(
        &mut self,
        config: &mut ConfigState,
        sink: &mut dyn DiagnosticsSink,
    ) -> Reconciliation {
        let mut outcome = Reconciliation::default();
        let dirty = config.dirty();

        if dirty.capture_changed() {
            outcome.capture_rebuilt = true;
            if let Err(e) = self.rebuild_capture(&config.settings().capture) {
                let message = e.to_string();
                sink.error(&message);
                outcome.errors.push(message);
            }
            config.clear_capture_bits();
        }

        if dirty.model_changing() {
            outcome.detector_rebuilt = true;
            match self.rebuild_detector(config.settings(), dirty) {
                Ok(()) => sink.info(&format!("Model {} ready", config.settings().model)),
                Err(e) => {
                    let message = e.to_string();
                    self.slot = DetectorSlot::Failed(message.clone());
                    sink.error(&message);
                    outcome.errors.push(message);
                }
            }
            config.clear_model_bits();
        }

        outcome
    }

    fn rebuild_capture(&mut self, config: &CaptureConfig) -> Result<(), LifecycleError> {
        // The device may only be opened once at a time.
        self.capture = None;
        log::info!(
            "Opening capture {} at {}x{} @ {} fps",
            config.source,
            config.width,
            config.height,
            config.target_fps
        );
        self.capture = Some(self.capture_provider.setup(config)?);
        Ok(())
    }

    fn rebuild_detector(
        &mut self,
        settings: &Settings,
        dirty: DirtyBits,
    ) -> Result<(), LifecycleError> {
        self.release_detector();
        self.slot = DetectorSlot::Loading;

        let current = self.runtime_settings;
        let runtime = match current {
            Some(current) if !dirty.backend && !dirty.flags => current,
            _ => {
                self.runtime_settings = None;
                let configured = self.runtime.configure(settings.backend, &settings.flags)?;
                self.runtime_settings = Some(configured);
                configured
            }
        };

        log::info!("Loading model {} on {}", settings.model, runtime.backend);
        let detector = self
            .factory
            .create(settings.model, &settings.model_options, &runtime)?;
        self.slot = DetectorSlot::Ready(detector);
        Ok(())
    }

    fn release_detector(&mut self) {
        if let DetectorSlot::Ready(mut detector) =
            std::mem::replace(&mut self.slot, DetectorSlot::Empty)
        {
            detector.dispose();
        }
    }

    pub fn slot(&self) -> &DetectorSlot {
        &self.slot
    }

    pub fn runtime_settings(&self) -> Option<&RuntimeSettings> {
        self.runtime_settings.as_ref()
    }

    pub fn detector_mut(&mut self) -> Option<&mut (dyn LandmarkDetector + 'static)> {
        match &mut self.slot {
            DetectorSlot::Ready(detector) => Some(detector.as_mut()),
            _ => None,
        }
    }

    /// Releases the detector after a failed inference call.
    pub fn discard_detector(&mut self, reason: String) {
        self.release_detector();
        self.slot = DetectorSlot::Failed(reason);
    }

    pub fn has_capture(&self) -> bool {
        self.capture.is_some()
    }

    pub fn capture_mut(&mut self) -> Option<&mut (dyn CaptureSource + 'static)> {
        self.capture.as_deref_mut()
    }

    pub fn release_capture(&mut self) {
        self.capture = None;
    }

    /// Releases the detector and the capture source.
    pub fn shutdown(&mut self) {
        self.release_detector();
        self.capture = None;
    }
}

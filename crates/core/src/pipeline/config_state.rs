use crate::detection::domain::detector_factory::{ModelId, ModelOptions};
use crate::detection::domain::runtime::Backend;
use crate::pipeline::settings::Settings;

/// Which configuration categories changed since the last reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirtyBits {
    pub model: bool,
    pub flags: bool,
    pub backend: bool,
    pub target_fps: bool,
    pub size: bool,
}

impl DirtyBits {
    /// State of a fresh session: everything must be built once.
    pub fn all() -> Self {
        Self {
            model: true,
            flags: true,
            backend: true,
            target_fps: true,
            size: true,
        }
    }

    /// True while a detector rebuild is pending.
    pub fn model_changing(&self) -> bool {
        self.model || self.flags || self.backend
    }

    pub fn capture_changed(&self) -> bool {
        self.target_fps || self.size
    }

    pub fn is_clean(&self) -> bool {
        !self.model_changing() && !self.capture_changed()
    }
}

/// One user-driven configuration edit.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigChange {
    Model(ModelId),
    ModelOptions(ModelOptions),
    Backend(Backend),
    IntraThreads(usize),
    OptimizeGraph(bool),
    CaptureSize { width: u32, height: u32 },
    TargetFps(u32),
    ShowMesh(bool),
    ShowBoundingBox(bool),
    FlipHorizontal(bool),
    /// Rebuild capture and detector even though nothing changed.
    Retry,
}

/// Settings owned by the frame loop plus the dirty bits describing what the
/// lifecycle manager still has to rebuild.
///
/// Dirty bits are derived by comparing the live settings with the settings
/// the lifecycle last reconciled, so reverting an edit before the next tick
/// leaves nothing to rebuild.
#[derive(Debug, Clone)]
pub struct ConfigState {
    settings: Settings,
    reconciled: Settings,
    forced: DirtyBits,
}

impl ConfigState {
    pub fn new(settings: Settings) -> Self {
        Self {
            reconciled: settings.clone(),
            settings,
            forced: DirtyBits::all(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn dirty(&self) -> DirtyBits {
        let live = &self.settings;
        let last = &self.reconciled;
        DirtyBits {
            model: self.forced.model
                || live.model != last.model
                || live.model_options != last.model_options,
            flags: self.forced.flags || live.flags != last.flags,
            backend: self.forced.backend || live.backend != last.backend,
            target_fps: self.forced.target_fps
                || live.capture.target_fps != last.capture.target_fps,
            size: self.forced.size
                || live.capture.width != last.capture.width
                || live.capture.height != last.capture.height,
        }
    }

    /// Applies a change. Returns whether any value actually differed.
    pub fn apply(&mut self, change: ConfigChange) -> bool {
        let s = &mut self.settings;
        match change {
            ConfigChange::Model(model) => set(&mut s.model, model),
            ConfigChange::ModelOptions(options) => set(&mut s.model_options, options),
            ConfigChange::Backend(backend) => set(&mut s.backend, backend),
            ConfigChange::IntraThreads(n) => set(&mut s.flags.intra_threads, n),
            ConfigChange::OptimizeGraph(on) => set(&mut s.flags.optimize_graph, on),
            ConfigChange::CaptureSize { width, height } => {
                let w = set(&mut s.capture.width, width);
                let h = set(&mut s.capture.height, height);
                w || h
            }
            ConfigChange::TargetFps(fps) => set(&mut s.capture.target_fps, fps),
            ConfigChange::ShowMesh(on) => set(&mut s.render.show_mesh, on),
            ConfigChange::ShowBoundingBox(on) => set(&mut s.render.show_bounding_box, on),
            ConfigChange::FlipHorizontal(on) => set(&mut s.flip_horizontal, on),
            ConfigChange::Retry => {
                self.forced.model = true;
                self.forced.size = true;
                true
            }
        }
    }

    /// Clears the capture bits. Called once the capture source was rebuilt.
    pub fn clear_capture_bits(&mut self) {
        self.reconciled.capture = self.settings.capture.clone();
        self.forced.target_fps = false;
        self.forced.size = false;
    }

    /// Clears the detector bits, whatever the outcome of the rebuild.
    pub fn clear_model_bits(&mut self) {
        self.reconciled.model = self.settings.model;
        self.reconciled.model_options = self.settings.model_options.clone();
        self.reconciled.backend = self.settings.backend;
        self.reconciled.flags = self.settings.flags;
        self.forced.model = false;
        self.forced.flags = false;
        self.forced.backend = false;
    }
}

fn set<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

pub mod detector_factory;
pub mod landmark_detector;
pub mod runtime;

/// Cache file name of the face box (BlazeFace short-range) model.
pub const FACE_BOX_MODEL_NAME: &str = "face_detection_short_range.onnx";

/// Cache file name of the 468-point face landmark model.
pub const FACE_MESH_MODEL_NAME: &str = "face_landmark.onnx";

/// Cache file name of the 478-point face landmark model (adds iris points).
pub const FACE_MESH_REFINED_MODEL_NAME: &str = "face_landmark_with_attention.onnx";

/// Physical length of the default iris calibration segment, in millimeters.
pub const IRIS_REFERENCE_MM: f64 = 5.5;

/// Maximum differences between shape distances that still count as "equal".
pub const SHAPE_TOLERANCE: f64 = 20.0;

/// Face length is measured chin-to-hairline; the hairline point sits above the
/// forehead, so the raw distance is scaled down.
pub const FACE_LENGTH_SCALE: f64 = 0.87;

/// Stats window over which inference latency is averaged.
pub const STATS_WINDOW_MS: f64 = 1000.0;

/// Ceiling handed to the FPS display along with each published value.
pub const FPS_DISPLAY_CEILING: f64 = 120.0;

/// Default refresh rate of the frame loop when no display drives it.
pub const DEFAULT_REFRESH_HZ: f64 = 60.0;

pub mod execution_provider;
pub mod math;
pub mod model_resolver;
pub mod onnx_detector_factory;
pub mod onnx_face_box_detector;
pub mod onnx_face_mesh_detector;
pub mod ort_runtime;
pub mod preprocess;

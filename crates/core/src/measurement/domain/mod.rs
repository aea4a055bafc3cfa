pub mod face_measurer;
pub mod face_shape;
pub mod landmark_index;
pub mod landmark_set;

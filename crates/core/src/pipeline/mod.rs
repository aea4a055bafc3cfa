pub mod config_state;
pub mod diagnostics_sink;
pub mod frame_loop;
pub mod inference_stats;
pub mod infrastructure;
pub mod model_lifecycle;
pub mod settings;

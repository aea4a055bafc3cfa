pub mod image_file_writer;
pub mod overlay_renderer;

use std::path::Path;

use crate::shared::frame::Frame;

/// Persists a rendered frame as an image file.
pub trait ImageWriter: Send {
    /// Encoding is chosen from the path's extension.
    fn write(&self, path: &Path, frame: &Frame) -> Result<(), Box<dyn std::error::Error>>;
}

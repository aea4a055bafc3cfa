use std::path::PathBuf;

use crate::measurement::domain::landmark_set::LandmarkSet;
use crate::render::domain::frame_renderer::FrameRenderer;
use crate::render::domain::image_writer::ImageWriter;
use crate::shared::frame::Frame;

const MESH_COLOR: [u8; 3] = [32, 224, 96];
const BOX_COLOR: [u8; 3] = [255, 64, 64];

/// Where and how often composed frames are saved.
pub struct SnapshotPolicy {
    pub dir: PathBuf,
    pub every: usize,
    pub writer: Box<dyn ImageWriter>,
}

/// Software renderer that composes overlays into an owned canvas.
pub struct OverlayRenderer {
    canvas: Option<Frame>,
    snapshots: Option<SnapshotPolicy>,
    presented: usize,
    dot_radius: i64,
}

impl OverlayRenderer {
    pub fn new() -> Self {
        Self {
            canvas: None,
            snapshots: None,
            presented: 0,
            dot_radius: 1,
        }
    }

    pub fn with_snapshots(mut self, policy: SnapshotPolicy) -> Self {
        self.snapshots = Some(SnapshotPolicy {
            every: policy.every.max(1),
            ..policy
        });
        self
    }

    /// Last composed frame.
    pub fn canvas(&self) -> Option<&Frame> {
        self.canvas.as_ref()
    }

    pub fn presented(&self) -> usize {
        self.presented
    }

    fn draw_dot(canvas: &mut Frame, x: f64, y: f64, radius: i64) {
        let (cx, cy) = (x.round() as i64, y.round() as i64);
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                canvas.set_pixel(cx + dx, cy + dy, MESH_COLOR);
            }
        }
    }

    fn draw_rect(canvas: &mut Frame, x1: i64, y1: i64, x2: i64, y2: i64) {
        for x in x1..=x2 {
            canvas.set_pixel(x, y1, BOX_COLOR);
            canvas.set_pixel(x, y2, BOX_COLOR);
        }
        for y in y1..=y2 {
            canvas.set_pixel(x1, y, BOX_COLOR);
            canvas.set_pixel(x2, y, BOX_COLOR);
        }
    }
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameRenderer for OverlayRenderer {
    fn draw_frame(&mut self, frame: &Frame) {
        self.canvas = Some(frame.clone());
    }

    fn draw_results(&mut self, faces: &[LandmarkSet], show_mesh: bool, show_bounding_box: bool) {
        let radius = self.dot_radius;
        let Some(canvas) = self.canvas.as_mut() else {
            return;
        };
        for face in faces {
            if show_mesh {
                for p in face.points() {
                    Self::draw_dot(canvas, p.x, p.y, radius);
                }
            }
            if show_bounding_box {
                if let Some(b) = face.bounds() {
                    Self::draw_rect(
                        canvas,
                        b.x_min.floor() as i64,
                        b.y_min.floor() as i64,
                        b.x_max.ceil() as i64,
                        b.y_max.ceil() as i64,
                    );
                }
            }
        }
    }

    fn present(&mut self) {
        let Some(canvas) = self.canvas.as_ref() else {
            return;
        };
        self.presented += 1;

        if let Some(policy) = &self.snapshots {
            if self.presented % policy.every == 0 {
                let path = policy
                    .dir
                    .join(format!("frame-{:06}.png", canvas.sequence()));
                if let Err(e) = policy.writer.write(&path, canvas) {
                    log::warn!("Failed to write snapshot {}: {e}", path.display());
                }
            }
        }
    }
}

//! 3D facial landmarks as produced by one detection call for one face.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A landmark index the set does not contain.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("landmark index {index} out of range for a set of {len} points")]
pub struct OutOfRange {
    pub index: usize,
    pub len: usize,
}

/// One landmark position. `x`/`y` are frame pixels, `z` uses the same scale
/// as `x` with smaller values closer to the camera.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Euclidean distance between two points.
pub fn distance3d(p: Point3, q: Point3) -> f64 {
    let dx = p.x - q.x;
    let dy = p.y - q.y;
    let dz = p.z - q.z;
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// Axis-aligned extent of a landmark set in frame pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LandmarkBounds {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

/// Ordered landmark points of a single face. Indices are stable anatomical
/// positions defined by the landmark model topology.
#[derive(Clone, Debug, PartialEq)]
pub struct LandmarkSet {
    points: Vec<Point3>,
    score: f64,
}

impl LandmarkSet {
    pub fn new(points: Vec<Point3>, score: f64) -> Self {
        Self { points, score }
    }

    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Face detection confidence the set was produced with.
    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn point(&self, index: usize) -> Result<Point3, OutOfRange> {
        self.points.get(index).copied().ok_or(OutOfRange {
            index,
            len: self.points.len(),
        })
    }

    /// Distance between two indexed landmarks.
    pub fn distance(&self, a: usize, b: usize) -> Result<f64, OutOfRange> {
        Ok(distance3d(self.point(a)?, self.point(b)?))
    }

    /// Summed segment lengths along a path of landmark indices.
    pub fn path_length(&self, path: &[usize]) -> Result<f64, OutOfRange> {
        path.windows(2)
            .map(|pair| self.distance(pair[0], pair[1]))
            .sum()
    }

    /// Returns `None` for an empty set.
    pub fn bounds(&self) -> Option<LandmarkBounds> {
        let first = self.points.first()?;
        let init = LandmarkBounds {
            x_min: first.x,
            y_min: first.y,
            x_max: first.x,
            y_max: first.y,
        };
        Some(self.points.iter().fold(init, |b, p| LandmarkBounds {
            x_min: b.x_min.min(p.x),
            y_min: b.y_min.min(p.y),
            x_max: b.x_max.max(p.x),
            y_max: b.y_max.max(p.y),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[rstest]
    #[case(Point3::new(0.0, 0.0, 0.0))]
    #[case(Point3::new(-3.5, 12.0, 0.25))]
    #[case(Point3::new(1e6, -1e6, 42.0))]
    fn test_distance_to_self_is_zero(#[case] p: Point3) {
        assert_relative_eq!(distance3d(p, p), 0.0);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = Point3::new(1.0, 2.0, 3.0);
        let b = Point3::new(-4.0, 0.5, 9.0);
        assert_relative_eq!(distance3d(a, b), distance3d(b, a));
    }

    #[test]
    fn test_distance_pythagorean() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(2.0, 3.0, 6.0);
        // sqrt(4 + 9 + 36) = 7
        assert_relative_eq!(distance3d(a, b), 7.0);
    }

    #[test]
    fn test_point_out_of_range() {
        let set = LandmarkSet::new(vec![Point3::default(); 3], 1.0);
        assert_eq!(set.point(3), Err(OutOfRange { index: 3, len: 3 }));
        assert!(set.point(2).is_ok());
    }

    #[test]
    fn test_path_length_sums_segments() {
        let set = LandmarkSet::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(3.0, 4.0, 0.0),
                Point3::new(3.0, 4.0, 10.0),
            ],
            1.0,
        );
        assert_relative_eq!(set.path_length(&[0, 1, 2]).unwrap(), 15.0);
        assert_relative_eq!(set.path_length(&[1]).unwrap(), 0.0);
    }

    #[test]
    fn test_path_length_reports_first_missing_index() {
        let set = LandmarkSet::new(vec![Point3::default(); 2], 1.0);
        let err = set.path_length(&[0, 1, 7, 9]).unwrap_err();
        assert_eq!(err.index, 7);
    }

    #[test]
    fn test_bounds() {
        let set = LandmarkSet::new(
            vec![
                Point3::new(10.0, 50.0, 0.0),
                Point3::new(30.0, 20.0, 1.0),
                Point3::new(20.0, 40.0, -1.0),
            ],
            0.9,
        );
        let b = set.bounds().unwrap();
        assert_eq!(
            b,
            LandmarkBounds {
                x_min: 10.0,
                y_min: 20.0,
                x_max: 30.0,
                y_max: 50.0
            }
        );
        assert!(LandmarkSet::new(Vec::new(), 0.0).bounds().is_none());
    }
}

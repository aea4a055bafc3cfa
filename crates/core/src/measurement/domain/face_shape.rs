//! Face shape classification from four relative distances.
//!
//! Inputs share the raw landmark unit (frame pixels); they are never
//! converted to millimeters. Rules are evaluated in order and the first match
//! wins, with `Undetermined` as the catch-all.

use serde::{Deserialize, Serialize};

use crate::shared::constants::SHAPE_TOLERANCE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeLabel {
    Triangle,
    Heart,
    Oblong,
    Round,
    Diamond,
    Oval,
    Undetermined,
}

impl std::fmt::Display for ShapeLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ShapeLabel::Triangle => "Triangle",
            ShapeLabel::Heart => "Heart",
            ShapeLabel::Oblong => "Oblong",
            ShapeLabel::Round => "Round",
            ShapeLabel::Diamond => "Diamond",
            ShapeLabel::Oval => "Oval",
            ShapeLabel::Undetermined => "Undetermined",
        };
        f.write_str(name)
    }
}

/// The four raw distances the classifier looks at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapeDistances {
    pub forehead: f64,
    pub cheekbone: f64,
    pub jaw: f64,
    pub face_length: f64,
}

impl ShapeDistances {
    pub fn classify(&self) -> ShapeLabel {
        classify_shape(self.forehead, self.cheekbone, self.jaw, self.face_length)
    }
}

fn within_tolerance(a: f64, b: f64) -> bool {
    (a - b).abs() <= SHAPE_TOLERANCE
}

pub fn classify_shape(forehead: f64, cheekbone: f64, jaw: f64, face_length: f64) -> ShapeLabel {
    if ![forehead, cheekbone, jaw, face_length]
        .iter()
        .all(|v| v.is_finite())
    {
        return ShapeLabel::Undetermined;
    }

    if jaw > cheekbone && cheekbone > forehead {
        ShapeLabel::Triangle
    } else if forehead > cheekbone {
        ShapeLabel::Heart
    } else if within_tolerance(forehead, cheekbone)
        && within_tolerance(cheekbone, jaw)
        && face_length > forehead
        && face_length > cheekbone
        && face_length > jaw
    {
        ShapeLabel::Oblong
    } else if within_tolerance(cheekbone, face_length) && cheekbone > forehead && cheekbone > jaw {
        ShapeLabel::Round
    } else if face_length > cheekbone && cheekbone > forehead && forehead > jaw {
        ShapeLabel::Diamond
    } else if face_length > cheekbone && forehead > jaw {
        ShapeLabel::Oval
    } else {
        ShapeLabel::Undetermined
    }
}

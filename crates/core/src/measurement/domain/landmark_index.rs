//! Named indices into the 468/478-point face mesh topology.
//!
//! Indices 468..=477 only exist in the refined (iris) topology.

pub const LEFT_TEMPLE: usize = 46;
pub const RIGHT_TEMPLE: usize = 276;

pub const RIGHT_IRIS_CENTER: usize = 468;
pub const LEFT_IRIS_CENTER: usize = 473;
pub const LEFT_IRIS_EDGE: usize = 474;

pub const LEFT_INNER_EYE_TAIL: usize = 243;
pub const RIGHT_INNER_EYE_TAIL: usize = 463;
pub const LEFT_OUTER_EYE_TAIL: usize = 130;
pub const RIGHT_OUTER_EYE_TAIL: usize = 359;

pub const LEFT_BROW: usize = 70;
pub const RIGHT_BROW: usize = 300;
pub const LEFT_CHEEKBONE: usize = 111;
pub const RIGHT_CHEEKBONE: usize = 340;
pub const CHIN: usize = 152;
pub const FOREHEAD_TOP: usize = 10;

/// Jaw contour from the left jaw angle, through the chin, to the right angle.
pub const JAW_CONTOUR: [usize; 13] = [172, 136, 150, 149, 176, 148, 152, 377, 400, 378, 379, 365, 397];

/// Landmark count of the refined topology.
pub const REFINED_LANDMARK_COUNT: usize = 478;

/// Landmark count of the base topology.
pub const BASE_LANDMARK_COUNT: usize = 468;

//! Frame converters
//!
//! Both converters express a raw robot state in the generate frame, the
//! common frame anchored on the smoothed foot-mid coordinate in which all
//! generation and IK happen.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod act_to_gen;
mod ref_to_gen;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Isometry3;

// Internal
pub use act_to_gen::*;
pub use ref_to_gen::*;
use crate::gait::GaitParam;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// The foot-mid origin implied by a single leg at `coords`.
///
/// The leg is shifted to its centre of pressure target and then back by its
/// neutral stance offset, so each leg alone points at the same mid
/// coordinate when standing in the neutral stance.
pub fn leg_origin_coords(gait: &GaitParam, leg: usize, coords: &Isometry3<f64>) -> Isometry3<f64> {
    let mut c = *coords;
    c.translation.vector += coords.rotation
        * (gait.cop_offset[leg].value() - gait.default_translate_pos[leg].value());
    c
}

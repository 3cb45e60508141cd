//! Smoothed-value interpolators
//!
//! Every corrective offset and generated trajectory in the controller goes
//! through one of these so that no output jumps between ticks. The
//! interpolators follow a quintic (minimum jerk, Hoff-Arbib) profile from the
//! current position, velocity and acceleration to the goal at rest.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod interpolator;
mod pose;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Vector3, Vector6};
use std::fmt::Debug;
use std::ops::{Add, Mul, Sub};

// Internal
pub use interpolator::*;
pub use pose::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Times closer than this are considered equal.
///
/// Goals reached within this tolerance snap to the exact goal value, and the
/// mode state machine uses the same tolerance to finish transitions, so the
/// two agree on which tick a ramp ends.
pub const TIME_EPSILON: f64 = 1e-9;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A value in a vector space that can be interpolated.
pub trait Interpolable:
    Copy
    + Debug
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<f64, Output = Self>
{
    /// The additive identity.
    fn zero() -> Self;
}

impl Interpolable for f64 {
    fn zero() -> Self {
        0.0
    }
}

impl Interpolable for Vector3<f64> {
    fn zero() -> Self {
        Vector3::zeros()
    }
}

impl Interpolable for Vector6<f64> {
    fn zero() -> Self {
        Vector6::zeros()
    }
}

//! Leg and CoM trajectory generator
//!
//! Turns the footstep queue into a piecewise linear reference ZMP trajectory
//! and smooth foot trajectories, then moves the generated CoM with a linear
//! inverted pendulum tracking the divergent component of motion (DCM) of the
//! reference ZMP.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod com;
mod leg_coords;
mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Isometry3, Vector3};

// Internal
pub use params::*;
use crate::gait::{LegTrajectory, LinearTrajectory, NUM_LEGS};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Smallest CoM height used for the pendulum frequency.
///
/// Units: meters
pub const MIN_DZ: f64 = 0.01;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LegCoordsGenerator {
    params: LegCoordsParams,
}

/// Updated leg trajectories.
#[derive(Debug, Clone)]
pub struct LegCoords {
    pub ref_zmp_traj: Vec<LinearTrajectory>,
    pub gen_coords: [LegTrajectory; NUM_LEGS],
    pub src_coords: [Isometry3<f64>; NUM_LEGS],
    pub prev_support_phase: [bool; NUM_LEGS],
}

/// Updated generated CoM.
#[derive(Debug, Clone, Copy)]
pub struct ComCoords {
    pub gen_cog: Vector3<f64>,
    pub gen_cog_vel: Vector3<f64>,

    /// Commanded ZMP, clamped to the support polygon.
    pub gen_zmp: Vector3<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LegCoordsGenerator {
    pub fn new(params: LegCoordsParams) -> Self {
        Self {
            params
        }
    }

    pub fn params(&self) -> &LegCoordsParams {
        &self.params
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Natural frequency of the pendulum for a CoM height `dz`.
pub fn pendulum_omega(dz: f64) -> f64 {
    (crate::gait::GRAVITY / dz.max(MIN_DZ)).sqrt()
}

//! AutoStabilizer module
//!
//! Runs the whole balance pipeline once per tick: frame conversion, footstep
//! and CoM generation, impedance control, stabilization, whole-body IK and
//! output blending. `AutoStabilizerHandle` shares one instance between the
//! cyclic executive and command senders.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod commands;
mod handle;
mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use handle::*;
pub use params::*;
pub use state::*;
use crate::ctrl_mode::{IllegalTransition, Mode};
use crate::footstep_gen::FootstepError;
use crate::imp_ctrl::ImpedanceError;
use crate::robot_model::RobotModelError;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Names the first two end effectors must have.
pub const LEG_NAMES: [&str; 2] = ["rleg", "lleg"];

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised while building the AutoStabilizer.
#[derive(Debug, thiserror::Error)]
pub enum AutoStabilizerInitError {
    #[error("Cannot load the AutoStabilizer parameters: {0}")]
    ParamsLoad(#[from] util::params::LoadError),

    #[error("Cannot build the robot model: {0}")]
    RobotModel(#[from] RobotModelError),

    #[error("The control period must be positive, got {0} s")]
    NonPositiveDt(f64),

    #[error("At least two end effectors (rleg, lleg) are required, got {0}")]
    TooFewEndEffectors(usize),

    #[error("End effector {index} must be named \"{expected}\", got \"{found}\"")]
    UnexpectedLegName { index: usize, expected: String, found: String },

    #[error("End effector {ee} is attached to an unknown link {link}")]
    UnknownLink { ee: String, link: String },

    #[error("Uncontrollable joint {0} is not in the robot model")]
    UnknownJoint(String),

    #[error("The sole of {0} needs at least three vertices")]
    InvalidSole(String),

    #[error("Invalid footstep parameters: {0}")]
    FootstepParams(FootstepError),

    #[error("Cannot create the AutoStabilizer archive: {0}")]
    Archive(#[from] util::archive::ArchiveError),
}

/// Errors returned by AutoStabilizer commands. A failed command changes
/// nothing.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),

    #[error("Balancing is not running")]
    NotBalancing,

    #[error("A command argument is not finite")]
    NonFiniteArgument,

    #[error(transparent)]
    Footstep(#[from] FootstepError),

    #[error(transparent)]
    Impedance(#[from] ImpedanceError),

    #[error("The AutoStabilizer lock is poisoned")]
    Poisoned,

    #[error("Timed out waiting for the {0:?} mode")]
    TransitionTimeout(Mode),
}

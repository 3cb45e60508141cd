//! Footstep generator
//!
//! Maintains the footstep queue: advances the executing node, pops it when it
//! completes and plans new nodes either from a commanded walking velocity or
//! by repeating the last stance.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod generator;
mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
pub use generator::*;
pub use params::*;
use crate::gait::{LLEG, RLEG};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// One explicitly commanded step, in the generate frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FootStep {
    /// `"rleg"` or `"lleg"`.
    pub leg: String,

    /// Units: meters
    pub pos: [f64; 3],

    /// Units: radians
    #[serde(default)]
    pub rpy: [f64; 3],

    /// Duration of the step, the default step time if not given.
    ///
    /// Units: seconds
    #[serde(default)]
    pub step_time: Option<f64>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum FootstepError {
    #[error("The footstep sequence is empty")]
    EmptySequence,

    #[error("Unknown leg \"{0}\", expected \"rleg\" or \"lleg\"")]
    UnknownLeg(String),

    #[error("Step {0} has a non-positive or non-finite step time")]
    InvalidStepTime(usize),

    #[error("The walking target is not finite")]
    NonFiniteTarget,

    #[error("Reaching the target needs {needed} steps, at most {max} are allowed")]
    TooManySteps { needed: f64, max: usize },

    #[error("Footstep parameter {0} must be finite and positive")]
    InvalidParam(&'static str),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl FootStep {
    /// Index of the stepping leg.
    pub fn leg_index(&self) -> Result<usize, FootstepError> {
        match self.leg.as_str() {
            "rleg" => Ok(RLEG),
            "lleg" => Ok(LLEG),
            _ => Err(FootstepError::UnknownLeg(self.leg.clone()))
        }
    }
}

//! # Telecommand module
//!
//! Commands accepted by the stabilizer executable, serialised as JSON in
//! command scripts.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use crate::footstep_gen::FootStep;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A telecommand to the AutoStabilizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Tc {
    StartAutoBalancer,
    StopAutoBalancer,
    StartStabilizer,
    StopStabilizer,

    /// Walk at a velocity, in meters/second and radians/second.
    GoVelocity { vx: f64, vy: f64, vth: f64 },

    GoStop,

    /// Walk to a pose relative to the feet, in meters and radians.
    GoPos { x: f64, y: f64, th: f64 },

    SetFootSteps {
        steps: Vec<FootStep>,
        #[serde(default)]
        overwrite_idx: usize,
    },

    StartImpedance { name: String },
    StopImpedance { name: String },

    SetHandFixMode { ratio: f64, time: f64 },

    /// Return to idle and drop all corrections.
    Activate,
}

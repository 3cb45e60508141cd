//! Parameters structure for the stabilizer

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StabilizerParams {
    /// Gain from the DCM error to the target ZMP shift.
    pub zmp_gain: f64,

    /// Gain from the DCM error to the root lean.
    ///
    /// Units: radians/meter
    pub root_rpy_gain: f64,

    /// Largest root lean, roll then pitch.
    ///
    /// Units: radians
    pub root_rpy_limit: [f64; 2],

    /// Damping control gains on the vertical force, roll moment and pitch
    /// moment.
    ///
    /// Units: newton seconds/meter, newton meter seconds/radian (x2)
    pub damping_gain: [f64; 3],

    /// Time constants pulling the foot offsets back to zero, same axes as
    /// `damping_gain`.
    ///
    /// Units: seconds
    pub time_const: [f64; 3],

    /// Largest absolute foot offset, same axes as `damping_gain`.
    ///
    /// Units: meters, radians (x2)
    pub offset_limit: [f64; 3],
}

impl Default for StabilizerParams {
    fn default() -> Self {
        Self {
            zmp_gain: 1.0,
            root_rpy_gain: 0.5,
            root_rpy_limit: [0.2, 0.2],
            damping_gain: [10000.0, 100.0, 100.0],
            time_const: [1.5, 1.5, 1.5],
            offset_limit: [0.05, 0.2, 0.2],
        }
    }
}

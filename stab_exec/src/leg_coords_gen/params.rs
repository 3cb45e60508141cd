//! Parameters structure for the leg and CoM trajectory generator

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LegCoordsParams {
    /// Feedback gain from the DCM error to the commanded ZMP.
    ///
    /// Units: 1/second
    pub dcm_feedback_gain: f64,
}

impl Default for LegCoordsParams {
    fn default() -> Self {
        Self {
            dcm_feedback_gain: 1.0,
        }
    }
}

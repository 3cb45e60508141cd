//! # Stabilizer Executable Parameters
//!
//! This module provide parameters for the stabilizer executable.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Serialize, Deserialize};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StabExecParams {

    /// Run length when no script is given, the script's duration plus this
    /// margin otherwise.
    ///
    /// Units: seconds
    pub max_duration_s: f64,

    /// Number of consecutive cycle overruns after which execution stops
    pub max_consec_cycle_overruns: u64,
}

impl Default for StabExecParams {
    fn default() -> Self {
        Self {
            max_duration_s: 10.0,
            max_consec_cycle_overruns: 500,
        }
    }
}

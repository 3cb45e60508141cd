//! Parameters structure for the footstep generator

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// Internal
use super::FootstepError;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FootstepParams {
    /// Duration of a planned step.
    ///
    /// Units: seconds
    pub default_step_time: f64,

    /// Swing apex height of a planned step.
    ///
    /// Units: meters
    pub default_step_height: f64,

    /// Number of nodes kept in the queue while walking by velocity.
    pub min_look_ahead: usize,

    /// Largest displacement of one `go_pos` stride, forward, sideways and
    /// yaw.
    ///
    /// Units: meters, meters, radians
    pub max_stride: [f64; 3],

    /// Most steps a single `go_pos` may queue, closing step included.
    pub max_num_steps: usize,
}

impl Default for FootstepParams {
    fn default() -> Self {
        Self {
            default_step_time: 0.8,
            default_step_height: 0.05,
            min_look_ahead: 3,
            max_stride: [0.15, 0.1, 0.3],
            max_num_steps: 40,
        }
    }
}

impl FootstepParams {
    /// Check the planning limits are usable.
    pub fn validate(&self) -> Result<(), FootstepError> {
        if !(self.default_step_time.is_finite() && self.default_step_time > 0.0) {
            return Err(FootstepError::InvalidParam("default_step_time"))
        }
        if !self.max_stride.iter().all(|s| s.is_finite() && *s > 0.0) {
            return Err(FootstepError::InvalidParam("max_stride"))
        }
        if self.max_num_steps < 2 {
            return Err(FootstepError::InvalidParam("max_num_steps"))
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(FootstepParams::default().validate().is_ok());

        let zero_stride = FootstepParams { max_stride: [0.15, 0.0, 0.3], ..Default::default() };
        assert!(matches!(zero_stride.validate(), Err(FootstepError::InvalidParam("max_stride"))));

        let nan_stride = FootstepParams { max_stride: [f64::NAN, 0.1, 0.3], ..Default::default() };
        assert!(matches!(nan_stride.validate(), Err(FootstepError::InvalidParam("max_stride"))));

        let no_steps = FootstepParams { max_num_steps: 1, ..Default::default() };
        assert!(matches!(no_steps.validate(), Err(FootstepError::InvalidParam("max_num_steps"))));
    }
}

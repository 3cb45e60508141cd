//! Parameters structure for the whole-body IK

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IkParams {
    /// Task weight of the leg end effector poses.
    pub leg_weight: f64,

    /// Task weight of the other end effector poses.
    pub limb_weight: f64,

    /// Largest pose, CoM and joint error corrected per second.
    ///
    /// Units: meters/second, radians/second
    pub max_error_rate: f64,

    /// Task weight of the CoM position.
    pub com_weight: f64,

    /// Target angular momentum about the CoM.
    ///
    /// Units: newton meter seconds
    pub angular_momentum_target: [f64; 3],

    /// Task weights of the angular momentum, per axis.
    pub angular_momentum_weight: [f64; 3],

    /// Largest angular momentum error corrected per second.
    pub max_angular_momentum_rate: f64,

    /// Task weights of the root pose, translation then rotation.
    pub root_weight: [f64; 6],

    /// Task weight pulling each controllable joint to its reference angle.
    pub ref_joint_weight: f64,

    /// Scale of the joint limit avoidance term in the damping.
    pub jlim_avoid_weight: f64,

    /// Base damping of the least squares step.
    pub wn: f64,
}

impl Default for IkParams {
    fn default() -> Self {
        Self {
            leg_weight: 9.0,
            limb_weight: 1.0,
            max_error_rate: 10.0,
            com_weight: 3.0,
            angular_momentum_target: [0.0; 3],
            angular_momentum_weight: [1e-4, 1e-4, 0.0],
            max_angular_momentum_rate: 1.0,
            root_weight: [0.0, 0.0, 0.0, 3.0, 3.0, 3.0],
            ref_joint_weight: 0.1,
            jlim_avoid_weight: 1.0,
            wn: 1e-6,
        }
    }
}

//! Parameters structure for the AutoStabilizer

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// Internal
use crate::ctrl_mode::ModeParams;
use crate::footstep_gen::FootstepParams;
use crate::frame_conv::RefToGenParams;
use crate::fullbody_ik::IkParams;
use crate::imp_ctrl::ImpedanceParams;
use crate::leg_coords_gen::LegCoordsParams;
use crate::stabilizer::StabilizerParams;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Control period.
    ///
    /// Units: seconds
    pub dt: f64,

    /// Robot model description, relative to the parameters directory.
    pub robot_model_file: String,

    /// Longest time a blocking mode command waits for its mode.
    ///
    /// Units: seconds
    pub command_timeout_s: f64,

    /// End effectors, the right leg first and the left leg second.
    pub end_effectors: Vec<EndEffectorParams>,

    /// Joints the IK must not move.
    pub uncontrollable_joints: Vec<String>,

    pub mode: ModeParams,
    pub ref_to_gen: RefToGenParams,
    pub footstep: FootstepParams,
    pub leg_coords: LegCoordsParams,
    pub impedance: ImpedanceParams,
    pub stabilizer: StabilizerParams,
    pub fullbody_ik: IkParams,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndEffectorParams {
    pub name: String,

    /// Link the end effector is attached to.
    pub parent_link: String,

    /// Position in the parent link frame.
    ///
    /// Units: meters
    #[serde(default)]
    pub local_pos: [f64; 3],

    /// Orientation in the parent link frame.
    ///
    /// Units: radians
    #[serde(default)]
    pub local_rpy: [f64; 3],

    /// Sole geometry, used by the legs only.
    #[serde(default)]
    pub foot: FootParams,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FootParams {
    /// Target CoP in the end effector frame.
    ///
    /// Units: meters
    pub cop_offset: [f64; 3],

    /// Sole outline in the end effector frame, in any order.
    ///
    /// Units: meters
    pub sole_vertices: Vec<[f64; 2]>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            dt: 0.002,
            robot_model_file: "robot_model.toml".into(),
            command_timeout_s: 10.0,
            end_effectors: Vec::new(),
            uncontrollable_joints: Vec::new(),
            mode: ModeParams::default(),
            ref_to_gen: RefToGenParams::default(),
            footstep: FootstepParams::default(),
            leg_coords: LegCoordsParams::default(),
            impedance: ImpedanceParams::default(),
            stabilizer: StabilizerParams::default(),
            fullbody_ik: IkParams::default(),
        }
    }
}

impl Default for FootParams {
    fn default() -> Self {
        Self {
            cop_offset: [0.0; 3],
            sole_vertices: vec![[0.1, 0.05], [-0.1, 0.05], [-0.1, -0.05], [0.1, -0.05]],
        }
    }
}

//! # Stabilizer library.
//!
//! This library allows other crates in the workspace (and the benchmarks) to
//! access items defined inside the stabilizer crate.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

/// AutoStabilizer - the per-tick balance pipeline and its command interface
pub mod auto_stab;

/// Control mode state machine - gates which parts of the pipeline run
pub mod ctrl_mode;

/// Global data store for the executable
pub mod data_store;

/// Footstep generator - maintains the footstep queue
pub mod footstep_gen;

/// Frame converters - express reference and actual states in the generate frame
pub mod frame_conv;

/// Whole-body inverse kinematics
pub mod fullbody_ik;

/// Gait state shared by the generators
pub mod gait;

/// Impedance controller - end effector compliance
pub mod imp_ctrl;

/// Smoothed-value interpolators
pub mod interp;

/// Leg and CoM trajectory generator
pub mod leg_coords_gen;

/// End effectors and joint parameters
pub mod limbs;

/// Output blending across mode changes
pub mod output_blend;

/// Executable parameters
pub mod params;

/// Kinematic and inertial robot model
pub mod robot_model;

/// Stabilizer - DCM feedback and foot damping control
pub mod stabilizer;

/// Telecommands
pub mod tc;

#[cfg(test)]
mod test_fixtures;

//! Shared test fixtures, built from the test biped in `params/`

use nalgebra::Vector3;

use crate::auto_stab::{self, Params};
use crate::gait::{GaitParam, LLEG, RLEG};
use crate::limbs::EndEffector;
use crate::robot_model::{ModelDescription, RobotModel};
use util::maths::{calc_mid_coords_pair, orient_coord_to_axis};

pub(crate) fn test_params() -> Params {
    util::params::parse(include_str!("../../params/auto_stabilizer.toml")).unwrap()
}

/// The test biped at its initial configuration.
pub(crate) fn test_robot() -> RobotModel {
    ModelDescription::parse(include_str!("../../params/robot_model.toml"))
        .unwrap()
        .build()
        .unwrap()
}

pub(crate) fn test_end_effectors(robot: &RobotModel) -> Vec<EndEffector> {
    auto_stab::build_end_effectors(&test_params().end_effectors, robot).unwrap()
}

/// Gait standing still at the current state of `robot`.
pub(crate) fn test_gait(robot: &RobotModel, ees: &[EndEffector]) -> GaitParam {
    let mut gait = auto_stab::build_gait(&test_params().end_effectors, ees, robot).unwrap();

    let mid = calc_mid_coords_pair(&ees[RLEG].pose_in(robot), &ees[LLEG].pose_in(robot), 0.5);
    auto_stab::seed_gait(&mut gait, robot, ees, orient_coord_to_axis(&mid, &Vector3::z()));

    gait
}

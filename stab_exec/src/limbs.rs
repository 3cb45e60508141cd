//! End effectors and joint parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3, Vector6};

// Internal
use crate::interp::Interpolator;
use crate::robot_model::RobotModel;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Margin taken off each end of a joint position range.
///
/// Units: radians
const Q_LIMIT_MARGIN: f64 = 0.001;

/// Margin taken off each end of a joint velocity range.
///
/// Units: radians/second
const DQ_LIMIT_MARGIN: f64 = 0.01;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A named limb end, with everything the pipeline computes for it.
///
/// Wrenches are `[force, moment]`, moments about the end effector origin.
/// Poses and wrenches are in the generate frame unless stated otherwise.
#[derive(Debug, Clone)]
pub struct EndEffector {
    pub name: String,

    pub parent_link: usize,

    /// Pose of the end effector in the parent link frame.
    pub local: Isometry3<f64>,

    /// Force sensor measuring this end effector, if any.
    pub force_sensor: Option<usize>,

    pub ref_pose: Isometry3<f64>,
    pub ref_wrench: Vector6<f64>,

    /// Reference wrench as received, in the reference frame.
    pub ref_wrench_origin: Vector6<f64>,

    pub act_pose: Isometry3<f64>,
    pub act_wrench: Vector6<f64>,

    /// Impedance offset, translation then axis-angle.
    pub ic_offset: Interpolator<Vector6<f64>>,

    /// Stabilizer offset, translation then axis-angle.
    pub st_offset: Interpolator<Vector6<f64>>,

    pub ic_target_pose: Isometry3<f64>,
    pub abc_target_pose: Isometry3<f64>,

    /// Target fed to the whole-body IK.
    pub st_target_pose: Isometry3<f64>,
}

/// Per joint limits and capabilities.
#[derive(Debug, Clone)]
pub struct JointParam {
    pub name: String,

    /// Units: newton meters
    pub max_torque: f64,

    /// Whether the IK may move this joint.
    pub controllable: bool,

    /// Position range with the safety margin applied.
    ///
    /// Units: radians
    pub q_min: f64,
    pub q_max: f64,

    /// Velocity range with the safety margin applied.
    ///
    /// Units: radians/second
    pub dq_min: f64,
    pub dq_max: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl EndEffector {
    pub fn new(
        name: &str, parent_link: usize, local: Isometry3<f64>, force_sensor: Option<usize>
    ) -> Self {
        Self {
            name: name.to_string(),
            parent_link,
            local,
            force_sensor,
            ref_pose: Isometry3::identity(),
            ref_wrench: Vector6::zeros(),
            ref_wrench_origin: Vector6::zeros(),
            act_pose: Isometry3::identity(),
            act_wrench: Vector6::zeros(),
            ic_offset: Interpolator::new(Vector6::zeros()),
            st_offset: Interpolator::new(Vector6::zeros()),
            ic_target_pose: Isometry3::identity(),
            abc_target_pose: Isometry3::identity(),
            st_target_pose: Isometry3::identity(),
        }
    }

    /// World pose of this end effector on the given robot.
    pub fn pose_in(&self, robot: &RobotModel) -> Isometry3<f64> {
        robot.link_pose(self.parent_link) * self.local
    }
}

impl JointParam {
    /// Derive the parameters of every joint of the model.
    ///
    /// Joints named in `uncontrollable` are held by the IK.
    pub fn from_model(model: &RobotModel, uncontrollable: &[String]) -> Vec<Self> {
        model.joints()
            .iter()
            .map(|j| {
                let (q_min, q_max) = shrink_range(j.q_min, j.q_max, Q_LIMIT_MARGIN);
                let (dq_min, dq_max) = shrink_range(j.dq_min, j.dq_max, DQ_LIMIT_MARGIN);

                JointParam {
                    name: j.name.clone(),
                    max_torque: j.climit * j.gear_ratio * j.torque_const,
                    controllable: !uncontrollable.contains(&j.name),
                    q_min,
                    q_max,
                    dq_min,
                    dq_max,
                }
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Apply a `[translation, axis-angle]` offset to a pose, both in the world
/// frame.
pub fn apply_offset(pose: &Isometry3<f64>, offset: &Vector6<f64>) -> Isometry3<f64> {
    let trans: Vector3<f64> = offset.fixed_rows::<3>(0).clone_owned();
    let rot: Vector3<f64> = offset.fixed_rows::<3>(3).clone_owned();

    Isometry3::from_parts(
        Translation3::from(pose.translation.vector + trans),
        UnitQuaternion::from_scaled_axis(rot) * pose.rotation
    )
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Shrink a range by `margin` at each end, unless that would empty it.
fn shrink_range(min: f64, max: f64, margin: f64) -> (f64, f64) {
    if max - min > 2.0 * margin {
        (min + margin, max - margin)
    }
    else {
        (min, max)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_fixtures::test_robot;

    #[test]
    fn test_joint_params() {
        let model = test_robot();
        let params = JointParam::from_model(&model, &["RARM_ELBOW".to_string()]);

        assert_eq!(params.len(), model.num_joints());

        let knee = &params[model.joint_index("RLEG_KNEE").unwrap()];
        assert!((knee.max_torque - 20.0 * 100.0 * 0.1).abs() < 1e-9);
        assert!((knee.q_min - 0.001).abs() < 1e-12);
        assert!((knee.q_max - 2.399).abs() < 1e-12);
        assert!(knee.controllable);

        assert!(!params[model.joint_index("RARM_ELBOW").unwrap()].controllable);
    }

    #[test]
    fn test_narrow_range_kept() {
        assert_eq!(shrink_range(0.0, 0.001, 0.001), (0.0, 0.001));
        let (lo, hi) = shrink_range(-1.0, 1.0, 0.01);
        assert!((lo + 0.99).abs() < 1e-12 && (hi - 0.99).abs() < 1e-12);
    }

    #[test]
    fn test_apply_offset() {
        let pose = Isometry3::from_parts(
            Translation3::new(0.1, 0.2, 0.3),
            UnitQuaternion::from_euler_angles(0.0, 0.0, 0.5)
        );
        let offset = Vector6::new(0.01, 0.0, -0.02, 0.0, 0.0, 0.1);
        let out = apply_offset(&pose, &offset);

        assert!((out.translation.vector - Vector3::new(0.11, 0.2, 0.28)).norm() < 1e-12);
        assert!((out.rotation.euler_angles().2 - 0.6).abs() < 1e-12);
    }
}

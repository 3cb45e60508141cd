//! Actual to generate frame conversion

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Isometry3, UnitQuaternion, Vector3, Vector6};

// Internal
use super::leg_origin_coords;
use crate::gait::{GaitParam, NUM_LEGS};
use crate::limbs::EndEffector;
use crate::robot_model::RobotModel;
use util::maths::{calc_mid_coords, orient_coord_to_axis};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ActToGenFrameConverter {
    /// Actual CoM of the previous tick, `None` straight after a reset.
    prev_act_cog: Option<Vector3<f64>>,
}

/// Actual state expressed in the generate frame.
#[derive(Debug, Clone)]
pub struct ActFrame {
    pub act_robot: RobotModel,
    pub act_pose: Vec<Isometry3<f64>>,
    pub act_wrench: Vec<Vector6<f64>>,
    pub act_cog: Vector3<f64>,
    pub act_cog_vel: Vector3<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ActToGenFrameConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the previous CoM, the next velocity will be zero.
    pub fn reset(&mut self) {
        self.prev_act_cog = None;
    }

    /// Express the measured robot in the generate frame.
    ///
    /// `sensor_wrench` holds one `[force, moment]` per force sensor of the
    /// model, in the sensor frame.
    pub fn convert_frame(
        &mut self,
        act_robot_raw: &RobotModel,
        sensor_wrench: &[Vector6<f64>],
        ees: &[EndEffector],
        gait: &GaitParam,
        dt: f64
    ) -> ActFrame {
        let mut act_robot = act_robot_raw.clone();
        act_robot.calc_forward_kinematics();

        let node0 = gait.node0();
        let any_support = node0.is_support_phase.iter().any(|s| *s);
        let mut coords = Vec::with_capacity(NUM_LEGS);
        let mut weights = Vec::with_capacity(NUM_LEGS);
        for leg in 0..NUM_LEGS {
            coords.push(leg_origin_coords(gait, leg, &ees[leg].pose_in(&act_robot)));
            weights.push(if node0.is_support_phase[leg] || !any_support { 1.0 } else { 0.0 });
        }
        let act_foot_mid = orient_coord_to_axis(
            &calc_mid_coords(&coords, &weights), &Vector3::z());
        let gen_foot_mid = orient_coord_to_axis(&gait.foot_mid_coords.value(), &Vector3::z());
        act_robot.move_coords(&gen_foot_mid, &act_foot_mid);

        let act_pose = ees.iter().map(|ee| ee.pose_in(&act_robot)).collect();

        let act_wrench = ees.iter()
            .map(|ee| match ee.force_sensor {
                Some(s) => sensor_wrench_at(&act_robot, s, sensor_wrench, &ee.pose_in(&act_robot)),
                None => Vector6::zeros()
            })
            .collect();

        let act_cog = *act_robot.com();
        let act_cog_vel = match self.prev_act_cog {
            Some(prev) if dt > 0.0 => (act_cog - prev) / dt,
            _ => Vector3::zeros()
        };
        self.prev_act_cog = Some(act_cog);

        ActFrame {
            act_robot,
            act_pose,
            act_wrench,
            act_cog,
            act_cog_vel,
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Replace the root attitude with the one measured by the gyrometer.
///
/// `imu_rpy` is the measured attitude of the gyrometer frame. The root is
/// rotated so that its gyrometer frame matches the measurement, the joint
/// state is untouched. Does nothing if the model has no gyrometer.
pub fn merge_imu_attitude(robot: &mut RobotModel, imu_rpy: &Vector3<f64>) {
    let gyro = match robot.gyrometer() {
        Some(g) => g.clone(),
        None => return
    };
    robot.calc_forward_kinematics();

    let imu_world = robot.link_pose(gyro.link).rotation * gyro.local.rotation;
    let imu_meas = UnitQuaternion::from_euler_angles(imu_rpy.x, imu_rpy.y, imu_rpy.z);

    let mut root = *robot.root_pose();
    root.rotation = imu_meas * (imu_world.inverse() * root.rotation);
    robot.set_root_pose(root);
    robot.calc_forward_kinematics();
    robot.calc_center_of_mass();
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// World wrench of a force sensor, moment taken about `ee_pose`.
fn sensor_wrench_at(
    robot: &RobotModel,
    sensor: usize,
    sensor_wrench: &[Vector6<f64>],
    ee_pose: &Isometry3<f64>
) -> Vector6<f64> {
    let w = match sensor_wrench.get(sensor) {
        Some(w) => w,
        None => return Vector6::zeros()
    };
    let s = robot.force_sensor_pose(sensor);

    let f = s.rotation * w.fixed_rows::<3>(0).clone_owned();
    let m = s.rotation * w.fixed_rows::<3>(3).clone_owned()
        + (s.translation.vector - ee_pose.translation.vector).cross(&f);

    Vector6::new(f.x, f.y, f.z, m.x, m.y, m.z)
}

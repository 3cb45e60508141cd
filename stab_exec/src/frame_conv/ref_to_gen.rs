//! Reference to generate frame conversion

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Isometry3, Point3, Translation3, Vector3, Vector6};
use serde::Deserialize;

// Internal
use super::leg_origin_coords;
use crate::gait::{GaitParam, FootstepNode, LLEG, NUM_LEGS, RLEG};
use crate::interp::{Interpolator, PoseInterpolator};
use crate::limbs::EndEffector;
use crate::robot_model::RobotModel;
use util::maths::{calc_mid_coords, calc_mid_coords_pair, orient_coord_to_axis};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RefToGenParams {
    /// How much each leg counts towards the reference foot-mid coordinate.
    /// A weight of zero excludes the leg.
    pub ref_foot_origin_weight: [f64; NUM_LEGS],

    /// 0 keeps the generated CoM lateral position as the reference origin,
    /// 1 pins the reference origin to the foot-mid coordinate.
    pub hand_fix_mode: f64,
}

#[derive(Debug, Clone)]
pub struct RefToGenFrameConverter {
    params: RefToGenParams,
    ref_foot_origin_weight: [Interpolator<f64>; NUM_LEGS],
    hand_fix_mode: Interpolator<f64>,
}

/// Generated state seeded from the reference on activation.
#[derive(Debug, Clone)]
pub struct GenRobotInit {
    pub gen_robot: RobotModel,
    pub foot_mid_coords: Isometry3<f64>,
    pub gen_cog: Vector3<f64>,
    pub gen_cog_vel: Vector3<f64>,
}

/// Reference state expressed in the generate frame.
#[derive(Debug, Clone)]
pub struct RefFrame {
    pub ref_robot: RobotModel,
    pub ref_pose: Vec<Isometry3<f64>>,
    pub ref_wrench: Vec<Vector6<f64>>,
    pub dz: f64,
    pub foot_mid_coords: PoseInterpolator,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for RefToGenParams {
    fn default() -> Self {
        Self {
            ref_foot_origin_weight: [1.0; NUM_LEGS],
            hand_fix_mode: 0.0,
        }
    }
}

impl RefToGenFrameConverter {
    pub fn new(params: RefToGenParams) -> Self {
        let w = params.ref_foot_origin_weight;
        let h = params.hand_fix_mode;
        Self {
            params,
            ref_foot_origin_weight: [Interpolator::new(w[RLEG]), Interpolator::new(w[LLEG])],
            hand_fix_mode: Interpolator::new(h),
        }
    }

    /// Snap the smoothed parameters to their goals.
    pub fn reset(&mut self) {
        for w in self.ref_foot_origin_weight.iter_mut() {
            let goal = w.goal();
            w.reset(goal);
        }
        let goal = self.hand_fix_mode.goal();
        self.hand_fix_mode.reset(goal);
    }

    pub fn update(&mut self, dt: f64) {
        for w in self.ref_foot_origin_weight.iter_mut() {
            w.interpolate(dt);
        }
        self.hand_fix_mode.interpolate(dt);
    }

    /// Move the hand fix ratio to `ratio`, clamped to `[0, 1]`, over `time`.
    pub fn set_hand_fix_mode(&mut self, ratio: f64, time: f64) {
        self.hand_fix_mode.set_goal(ratio.clamp(0.0, 1.0), time);
    }

    pub fn hand_fix_mode(&self) -> f64 {
        self.hand_fix_mode.value()
    }

    pub fn params(&self) -> &RefToGenParams {
        &self.params
    }

    /// Seed the generated robot from the raw reference.
    ///
    /// The reference posture is copied verbatim and the robot is moved so
    /// that its foot-mid coordinate is upright.
    pub fn init_gen_robot(
        &self,
        ref_robot_raw: &RobotModel,
        ees: &[EndEffector],
        gait: &GaitParam
    ) -> GenRobotInit {
        let mut gen_robot = ref_robot_raw.clone();
        gen_robot.calc_forward_kinematics();

        let ref_foot_mid = self.calc_ref_foot_mid_coords(&gen_robot, ees, gait);
        let foot_mid = orient_coord_to_axis(&ref_foot_mid, &Vector3::z());
        gen_robot.move_coords(&foot_mid, &ref_foot_mid);

        let gen_cog = *gen_robot.com();

        GenRobotInit {
            gen_robot,
            foot_mid_coords: foot_mid,
            gen_cog,
            gen_cog_vel: Vector3::zeros(),
        }
    }

    /// Express the raw reference in the generate frame.
    ///
    /// Also advances the foot-mid coordinate towards the support feet of the
    /// upcoming footstep nodes.
    pub fn convert_frame(
        &self,
        ref_robot_raw: &RobotModel,
        ees: &[EndEffector],
        gait: &GaitParam,
        dt: f64
    ) -> RefFrame {
        let mut ref_robot = ref_robot_raw.clone();

        let mut foot_mid_coords = gait.foot_mid_coords.clone();
        let (goal, time) = foot_mid_goal(gait);
        foot_mid_coords.set_goal(goal, time);
        foot_mid_coords.interpolate(dt);
        let foot_mid = foot_mid_coords.value();

        let ref_foot_mid = self.calc_ref_foot_mid_coords(&ref_robot, ees, gait);
        let dz = (ref_foot_mid.inverse() * Point3::from(*ref_robot.com())).z;

        // The reference origin follows the generated CoM, laterally only as
        // much as the hand fix ratio allows
        let mut local = foot_mid.rotation.inverse()
            * (gait.gen_cog - gait.l - foot_mid.translation.vector);
        local.y *= 1.0 - self.hand_fix_mode.value();
        let gen_foot_mid = Isometry3::from_parts(
            Translation3::from(foot_mid.translation.vector + foot_mid.rotation * local),
            foot_mid.rotation
        );
        ref_robot.move_coords(&gen_foot_mid, &ref_foot_mid);

        let ref_pose = ees.iter().map(|ee| ee.pose_in(&ref_robot)).collect();

        let ref_wrench = ees.iter()
            .map(|ee| {
                let f = foot_mid.rotation * ee.ref_wrench_origin.fixed_rows::<3>(0).clone_owned();
                let m = foot_mid.rotation * ee.ref_wrench_origin.fixed_rows::<3>(3).clone_owned();
                Vector6::new(f.x, f.y, f.z, m.x, m.y, m.z)
            })
            .collect();

        RefFrame {
            ref_robot,
            ref_pose,
            ref_wrench,
            dz,
            foot_mid_coords,
        }
    }

    /// Foot-mid coordinate of a robot from its leg end effectors.
    pub fn calc_ref_foot_mid_coords(
        &self,
        robot: &RobotModel,
        ees: &[EndEffector],
        gait: &GaitParam
    ) -> Isometry3<f64> {
        let rleg = leg_origin_coords(gait, RLEG, &ees[RLEG].pose_in(robot));
        let lleg = leg_origin_coords(gait, LLEG, &ees[LLEG].pose_in(robot));
        let both = calc_mid_coords_pair(&rleg, &lleg, 0.5);

        let w_r = self.ref_foot_origin_weight[RLEG].value();
        let w_l = self.ref_foot_origin_weight[LLEG].value();
        let w_both = w_r.min(w_l);

        calc_mid_coords(&[both, rleg, lleg], &[w_both, w_r - w_both, w_l - w_both])
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Upright foot-mid coordinate implied by a node's destinations.
fn node_origin(gait: &GaitParam, node: &FootstepNode, leg: Option<usize>) -> Isometry3<f64> {
    let coords = match leg {
        Some(l) => leg_origin_coords(gait, l, &node.dst_coords[l]),
        None => calc_mid_coords_pair(
            &leg_origin_coords(gait, RLEG, &node.dst_coords[RLEG]),
            &leg_origin_coords(gait, LLEG, &node.dst_coords[LLEG]),
            0.5
        )
    };
    orient_coord_to_axis(&coords, &Vector3::z())
}

/// Target of the foot-mid coordinate and the time to reach it.
fn foot_mid_goal(gait: &GaitParam) -> (Isometry3<f64>, f64) {
    let node0 = gait.node0();
    let node1 = gait.footstep_nodes.get(1);

    if node0.is_double_support() {
        return (node_origin(gait, node0, None), node0.remain_time)
    }

    match node0.swing_leg() {
        Some(swing) => {
            // Single support: head for the next double support if there is
            // one, else stay over the supporting foot
            let support = 1 - swing;
            match node1 {
                Some(n1) if n1.is_double_support() => (
                    node_origin(gait, n1, None),
                    node0.remain_time + n1.remain_time
                ),
                _ => (node_origin(gait, node0, Some(support)), node0.remain_time)
            }
        },
        None => {
            // Flight: head for whichever foot lands next
            let next_support = node1.and_then(|n1| n1.swing_leg().map(|s| 1 - s));
            (node_origin(gait, node0, next_support), node0.remain_time)
        }
    }
}

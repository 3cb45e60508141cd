//! Whole-body inverse kinematics
//!
//! One weighted least squares step per tick over the floating base and the
//! joints. Tasks are stacked with the weights below and solved together:
//!
//! - end effector poses (legs weighted above the other limbs)
//! - CoM position
//! - angular momentum about the CoM
//! - root pose
//! - reference joint angles
//!
//! Each task error is clamped to what can be corrected in one tick, so a far
//! off target is approached at a bounded rate.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use nalgebra::{DMatrix, DVector, Isometry3, Translation3, UnitQuaternion, Vector3};

// Internal
pub use params::*;
use crate::gait::{GaitParam, NUM_LEGS};
use crate::limbs::{EndEffector, JointParam};
use crate::robot_model::{RobotModel, NUM_BASE_DOF};
use util::maths::clamp_abs;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FullbodyIkSolver {
    params: IkParams,
}

/// Normal equations of the stacked tasks over all degrees of freedom.
struct NormalEquations {
    h: DMatrix<f64>,
    g: DVector<f64>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum IkError {
    #[error("The IK normal matrix is not positive definite")]
    NotPositiveDefinite,

    #[error("The IK step is not finite")]
    NonFiniteStep,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl FullbodyIkSolver {
    pub fn new(params: IkParams) -> Self {
        Self {
            params
        }
    }

    pub fn params(&self) -> &IkParams {
        &self.params
    }

    /// Move `gen_robot` one step towards the stabilizer targets.
    ///
    /// Targets are each end effector's `st_target_pose`, the generated CoM
    /// and the stabilizer root pose of `gait`, and the joint angles of
    /// `ref_robot`. Joints that are not controllable are set to their
    /// reference angle. On error no step is applied.
    pub fn solve(
        &self,
        gen_robot: &mut RobotModel,
        ees: &[EndEffector],
        ref_robot: &RobotModel,
        gait: &GaitParam,
        joint_params: &[JointParam],
        dt: f64
    ) -> Result<(), IkError> {
        let p = &self.params;
        let dof = gen_robot.num_dof();
        let max_err = p.max_error_rate * dt;

        for (j, jp) in joint_params.iter().enumerate() {
            if !jp.controllable {
                gen_robot.q_mut()[j] = ref_robot.q()[j];
            }
        }
        gen_robot.calc_forward_kinematics();
        gen_robot.calc_center_of_mass();

        let mut eqs = NormalEquations::new(dof);

        // End effectors
        for (i, ee) in ees.iter().enumerate() {
            let current = ee.pose_in(gen_robot);
            let jac = gen_robot.link_jacobian(ee.parent_link, &current.translation.vector);
            let err = pose_error(&ee.st_target_pose, &current, max_err);
            let w = if i < NUM_LEGS { p.leg_weight } else { p.limb_weight };
            eqs.add_task(&jac, &err, &[w; 6]);
        }

        // CoM
        let com_err = (gait.gen_cog - gen_robot.com()).map(|e| clamp_abs(e, max_err));
        eqs.add_task(
            &gen_robot.com_jacobian(),
            &DVector::from_column_slice(com_err.as_slice()),
            &[p.com_weight; 3]
        );

        // Angular momentum, as a momentum reached over one tick
        if dt > 0.0 {
            let max_mom = p.max_angular_momentum_rate * dt;
            let target = DVector::from_iterator(
                3, p.angular_momentum_target.iter().map(|h| clamp_abs(*h, max_mom)));
            eqs.add_task(
                &(gen_robot.angular_momentum_jacobian() / dt),
                &target,
                &p.angular_momentum_weight
            );
        }

        // Root
        let mut root_jac = DMatrix::zeros(NUM_BASE_DOF, dof);
        root_jac.view_mut((0, 0), (NUM_BASE_DOF, NUM_BASE_DOF)).fill_with_identity();
        let root_err = pose_error(&gait.st_target_root_pose, gen_robot.root_pose(), max_err);
        eqs.add_task(&root_jac, &root_err, &p.root_weight);

        // Reference joint angles
        let controllable: Vec<usize> = joint_params.iter()
            .enumerate()
            .filter_map(|(j, jp)| if jp.controllable { Some(j) } else { None })
            .collect();
        if !controllable.is_empty() {
            let mut jac = DMatrix::zeros(controllable.len(), dof);
            let mut err = DVector::zeros(controllable.len());
            for (r, j) in controllable.iter().enumerate() {
                jac[(r, NUM_BASE_DOF + j)] = 1.0;
                err[r] = clamp_abs(ref_robot.q()[*j] - gen_robot.q()[*j], max_err);
            }
            eqs.add_task(&jac, &err, &vec![p.ref_joint_weight; controllable.len()]);
        }

        // Only the base and controllable joints take part in the step
        let active: Vec<usize> = (0..NUM_BASE_DOF)
            .chain(controllable.iter().map(|j| NUM_BASE_DOF + j))
            .collect();

        let mut h = eqs.h.select_rows(active.iter()).select_columns(active.iter());
        let g = eqs.g.select_rows(active.iter());

        for (k, d) in active.iter().enumerate() {
            let jlim = if *d < NUM_BASE_DOF {
                1.0
            }
            else {
                let j = d - NUM_BASE_DOF;
                1.0 + p.jlim_avoid_weight * joint_limit_gradient(
                    gen_robot.q()[j], joint_params[j].q_min, joint_params[j].q_max
                ).abs()
            };
            h[(k, k)] += p.wn * jlim;
        }

        let step = h.cholesky()
            .ok_or(IkError::NotPositiveDefinite)?
            .solve(&g);
        if step.iter().any(|v| !v.is_finite()) {
            return Err(IkError::NonFiniteStep)
        }

        let mut dq = DVector::zeros(dof);
        for (k, d) in active.iter().enumerate() {
            dq[*d] = step[k];
        }

        integrate(gen_robot, &dq, joint_params, dt);

        trace!("IK step norm {:.6}", dq.norm());

        Ok(())
    }
}

impl NormalEquations {
    fn new(dof: usize) -> Self {
        Self {
            h: DMatrix::zeros(dof, dof),
            g: DVector::zeros(dof),
        }
    }

    /// Add `jac * dq = err` with per row `weights`.
    fn add_task(&mut self, jac: &DMatrix<f64>, err: &DVector<f64>, weights: &[f64]) {
        let mut weighted = jac.clone();
        for (r, mut row) in weighted.row_iter_mut().enumerate() {
            row *= weights[r];
        }

        self.h += jac.transpose() * &weighted;
        self.g += weighted.transpose() * err;
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Translation then axis-angle error from `current` to `target`, each element
/// clamped to `max`.
fn pose_error(target: &Isometry3<f64>, current: &Isometry3<f64>, max: f64) -> DVector<f64> {
    let dp = target.translation.vector - current.translation.vector;
    let dr = (target.rotation * current.rotation.inverse()).scaled_axis();

    DVector::from_iterator(6, dp.iter().chain(dr.iter()).map(|e| clamp_abs(*e, max)))
}

/// Gradient of the joint limit performance criterion, which grows without
/// bound towards either end of the range.
fn joint_limit_gradient(q: f64, q_min: f64, q_max: f64) -> f64 {
    let to_max = q_max - q;
    let to_min = q - q_min;
    if to_max <= 0.0 || to_min <= 0.0 {
        return 0.0
    }

    let range = q_max - q_min;
    range * range * (2.0 * q - q_max - q_min) / (4.0 * to_max * to_max * to_min * to_min)
}

/// Apply a step to the robot, keeping joints within their position and
/// velocity ranges.
fn integrate(robot: &mut RobotModel, dq: &DVector<f64>, joint_params: &[JointParam], dt: f64) {
    let root = *robot.root_pose();
    let dp = Vector3::new(dq[0], dq[1], dq[2]);
    let dr = Vector3::new(dq[3], dq[4], dq[5]);
    robot.set_root_pose(Isometry3::from_parts(
        Translation3::from(root.translation.vector + dp),
        UnitQuaternion::from_scaled_axis(dr) * root.rotation
    ));

    for (j, jp) in joint_params.iter().enumerate() {
        if !jp.controllable {
            continue
        }
        let mut step = dq[NUM_BASE_DOF + j];
        if dt > 0.0 {
            step = step.clamp(jp.dq_min * dt, jp.dq_max * dt);
        }
        let q = (robot.q()[j] + step).clamp(jp.q_min, jp.q_max);
        if dt > 0.0 {
            robot.dq_mut()[j] = (q - robot.q()[j]) / dt;
        }
        robot.q_mut()[j] = q;
    }

    robot.calc_forward_kinematics();
    robot.calc_center_of_mass();
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::gait::{LLEG, RLEG};
    use crate::test_fixtures::{test_end_effectors, test_gait, test_robot};

    const DT: f64 = 0.002;

    /// Targets at the current state of the robot.
    fn hold_targets(robot: &RobotModel, ees: &mut [EndEffector], gait: &mut GaitParam) {
        for ee in ees.iter_mut() {
            ee.st_target_pose = ee.pose_in(robot);
        }
        gait.gen_cog = *robot.com();
        gait.st_target_root_pose = *robot.root_pose();
    }

    #[test]
    fn test_targets_met_do_not_move() {
        let mut robot = test_robot();
        let reference = robot.clone();
        let mut ees = test_end_effectors(&robot);
        let mut gait = test_gait(&robot, &ees);
        hold_targets(&robot, &mut ees, &mut gait);
        let jp = JointParam::from_model(&robot, &[]);

        let ik = FullbodyIkSolver::new(IkParams::default());
        ik.solve(&mut robot, &ees, &reference, &gait, &jp, DT).unwrap();

        assert!((robot.q() - reference.q()).norm() < 1e-9);
        assert!((robot.root_pose().translation.vector
            - reference.root_pose().translation.vector).norm() < 1e-9);
    }

    #[test]
    fn test_foot_tracks_raised_target() {
        let mut robot = test_robot();
        let reference = robot.clone();
        let mut ees = test_end_effectors(&robot);
        let mut gait = test_gait(&robot, &ees);
        hold_targets(&robot, &mut ees, &mut gait);
        let jp = JointParam::from_model(&robot, &[]);

        let start = ees[RLEG].st_target_pose;
        ees[RLEG].st_target_pose = Isometry3::translation(0.0, 0.0, 0.03) * start;

        let ik = FullbodyIkSolver::new(IkParams::default());

        // The first step is limited by the error clamp
        ik.solve(&mut robot, &ees, &reference, &gait, &jp, DT).unwrap();
        let lift = ees[RLEG].pose_in(&robot).translation.z - start.translation.z;
        assert!(lift > 0.0);
        assert!(lift < 10.0 * DT + 1e-4);

        for _ in 0..200 {
            ik.solve(&mut robot, &ees, &reference, &gait, &jp, DT).unwrap();
        }
        let foot = ees[RLEG].pose_in(&robot);
        assert!((foot.translation.vector - ees[RLEG].st_target_pose.translation.vector)
            .norm() < 2e-3);

        // The other foot stays put
        let other = ees[LLEG].pose_in(&robot);
        assert!((other.translation.vector - ees[LLEG].st_target_pose.translation.vector)
            .norm() < 2e-3);
    }

    #[test]
    fn test_joint_ranges_and_held_joints() {
        let mut robot = test_robot();
        let mut reference = robot.clone();
        let mut ees = test_end_effectors(&robot);
        let mut gait = test_gait(&robot, &ees);
        hold_targets(&robot, &mut ees, &mut gait);

        let elbow = robot.joint_index("RARM_ELBOW").unwrap();
        let shoulder = robot.joint_index("LARM_SHOULDER_P").unwrap();
        reference.q_mut()[elbow] = -0.4;
        reference.q_mut()[shoulder] = 100.0;
        let jp = JointParam::from_model(&robot, &["RARM_ELBOW".to_string()]);

        let ik = FullbodyIkSolver::new(IkParams {
            ref_joint_weight: 100.0,
            ..IkParams::default()
        });
        for _ in 0..2000 {
            ik.solve(&mut robot, &ees, &reference, &gait, &jp, DT).unwrap();
        }

        // Held joints follow the reference exactly
        assert_eq!(robot.q()[elbow], -0.4);
        // Controllable joints never leave their range
        for (j, p) in jp.iter().enumerate() {
            assert!(robot.q()[j] >= p.q_min && robot.q()[j] <= p.q_max);
        }
        assert!(robot.q()[shoulder] > jp[shoulder].q_max - 0.1);
    }

    #[test]
    fn test_non_finite_target_leaves_robot_unchanged() {
        let mut robot = test_robot();
        let reference = robot.clone();
        let mut ees = test_end_effectors(&robot);
        let mut gait = test_gait(&robot, &ees);
        hold_targets(&robot, &mut ees, &mut gait);
        gait.gen_cog.x = f64::NAN;
        let jp = JointParam::from_model(&robot, &[]);

        let ik = FullbodyIkSolver::new(IkParams::default());
        assert!(ik.solve(&mut robot, &ees, &reference, &gait, &jp, DT).is_err());
        assert_eq!(robot.q(), reference.q());
        assert_eq!(robot.root_pose(), reference.root_pose());
    }

    #[test]
    fn test_joint_limit_gradient() {
        assert_eq!(joint_limit_gradient(0.0, -1.0, 1.0), 0.0);
        assert!(joint_limit_gradient(0.9, -1.0, 1.0) > 10.0);
        assert!(joint_limit_gradient(-0.9, -1.0, 1.0) < -10.0);
        assert_eq!(joint_limit_gradient(1.0, -1.0, 1.0), 0.0);
    }
}

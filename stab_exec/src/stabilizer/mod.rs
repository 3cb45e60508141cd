//! Stabilizer
//!
//! Feeds the error between the actual and generated DCM back into a shifted
//! target ZMP. The target ZMP is realised by leaning the root against the
//! error and by damping control of each supporting foot, which moves the
//! foot until its measured wrench matches the target one.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use nalgebra::{Vector2, Vector3, Vector6};

// Internal
pub use params::*;
use crate::gait::{GaitParam, GRAVITY, NUM_LEGS};
use crate::interp::Interpolator;
use crate::leg_coords_gen::pendulum_omega;
use crate::limbs::EndEffector;
use util::maths::{calc_nearest_point_of_hull, clamp_abs};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Offset and wrench indices acted on by the damping control: vertical
/// force, roll moment, pitch moment.
const DAMPED_AXES: [usize; 3] = [2, 3, 4];

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Stabilizer {
    params: StabilizerParams,
}

/// Retargeted stabilizer offsets, not yet interpolated.
#[derive(Debug, Clone)]
pub struct StabilizerOutput {
    pub st_offset_root_rpy: Interpolator<Vector3<f64>>,
    pub st_offset: Vec<Interpolator<Vector6<f64>>>,
    pub target_zmp: Vector3<f64>,

    /// Target wrench of each end effector, zero for those not in support.
    pub target_wrench: Vec<Vector6<f64>>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Stabilizer {
    pub fn new(params: StabilizerParams) -> Self {
        Self {
            params
        }
    }

    pub fn params(&self) -> &StabilizerParams {
        &self.params
    }

    /// Compute this tick's stabilizer offsets.
    ///
    /// `mass` is the total robot mass in kilograms.
    pub fn exec_stabilizer(
        &self,
        gait: &GaitParam,
        ees: &[EndEffector],
        mass: f64,
        dt: f64
    ) -> StabilizerOutput {
        let omega = pendulum_omega(gait.dz);

        let mut dcm_err = (gait.act_cog - gait.gen_cog)
            + (gait.act_cog_vel - gait.gen_cog_vel) / omega;
        dcm_err.z = 0.0;

        let target_zmp = self.calc_target_zmp(gait, &dcm_err);

        // Lean against the error, in the foot-mid frame
        let mid_rot = gait.foot_mid_coords.value().rotation;
        let err_local = mid_rot.inverse() * dcm_err;
        let rpy = Vector3::new(
            clamp_abs(self.params.root_rpy_gain * err_local.y, self.params.root_rpy_limit[0]),
            clamp_abs(-self.params.root_rpy_gain * err_local.x, self.params.root_rpy_limit[1]),
            0.0
        );
        let mut st_offset_root_rpy = gait.st_offset_root_rpy.clone();
        st_offset_root_rpy.set_goal(rpy, dt);

        let target_wrench = self.calc_target_wrench(gait, ees, &target_zmp, mass);

        let node0 = gait.node0();
        let st_offset = ees.iter()
            .enumerate()
            .map(|(i, ee)| {
                let mut offset = ee.st_offset.clone();
                let current = offset.value();
                let mut next = Vector6::zeros();

                let damped = i < NUM_LEGS
                    && node0.is_support_phase[i]
                    && ee.force_sensor.is_some();

                for (k, a) in DAMPED_AXES.iter().enumerate() {
                    let t = self.params.time_const[k];
                    next[*a] = if damped {
                        let rate = (ee.act_wrench[*a] - target_wrench[i][*a])
                            / self.params.damping_gain[k]
                            - current[*a] / t;
                        clamp_abs(current[*a] + dt * rate, self.params.offset_limit[k])
                    }
                    else {
                        current[*a] * (1.0 - dt / t)
                    };
                }

                offset.set_goal(next, dt);
                offset
            })
            .collect();

        trace!(
            "DCM error ({:.4}, {:.4}), target ZMP ({:.4}, {:.4})",
            dcm_err.x, dcm_err.y, target_zmp.x, target_zmp.y
        );

        StabilizerOutput {
            st_offset_root_rpy,
            st_offset,
            target_zmp,
            target_wrench,
        }
    }

    /// Generated ZMP shifted by the DCM error, kept in the support polygon.
    fn calc_target_zmp(&self, gait: &GaitParam, dcm_err: &Vector3<f64>) -> Vector3<f64> {
        let shifted = gait.gen_zmp + self.params.zmp_gain * dcm_err;
        let p = calc_nearest_point_of_hull(
            &Vector2::new(shifted.x, shifted.y), &gait.support_polygon());
        Vector3::new(p.x, p.y, gait.gen_zmp.z)
    }

    /// Share the weight between the supporting feet by where the target ZMP
    /// lies between them, and shift each foot's CoP by what is left of the
    /// target ZMP as far as its sole allows.
    fn calc_target_wrench(
        &self,
        gait: &GaitParam,
        ees: &[EndEffector],
        target_zmp: &Vector3<f64>,
        mass: f64
    ) -> Vec<Vector6<f64>> {
        let node0 = gait.node0();
        let coords = gait.gen_leg_coords();
        let total = mass * GRAVITY;

        let cops: Vec<Vector2<f64>> = (0..NUM_LEGS)
            .map(|leg| gait.cop_point(leg, &coords[leg]).xy())
            .collect();

        let (fz, nominal) = match (node0.is_support_phase[0], node0.is_support_phase[1]) {
            (true, true) => {
                let ab = cops[1] - cops[0];
                let len2 = ab.norm_squared();
                let t = if len2 > 0.0 {
                    ((target_zmp.xy() - cops[0]).dot(&ab) / len2).clamp(0.0, 1.0)
                }
                else {
                    0.5
                };
                ([(1.0 - t) * total, t * total], cops[0] + ab * t)
            },
            (true, false) => ([total, 0.0], cops[0]),
            (false, true) => ([0.0, total], cops[1]),
            (false, false) => ([0.0, 0.0], target_zmp.xy())
        };
        let shift = target_zmp.xy() - nominal;

        let mut wrench = vec![Vector6::zeros(); ees.len()];
        for leg in 0..NUM_LEGS {
            if fz[leg] <= 0.0 {
                continue
            }
            let hull = gait.sole_hull_at(leg, &coords[leg]);
            let cop = calc_nearest_point_of_hull(&(cops[leg] + shift), &hull);
            let p_ee = coords[leg].translation.vector;
            let lever = Vector3::new(cop.x - p_ee.x, cop.y - p_ee.y, 0.0);
            let n = lever.cross(&Vector3::new(0.0, 0.0, fz[leg]));

            wrench[leg] = Vector6::new(0.0, 0.0, fz[leg], n.x, n.y, n.z);
        }

        wrench
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::gait::{FootGeometry, LLEG, RLEG};
    use nalgebra::Isometry3;

    const DT: f64 = 0.002;
    const MASS: f64 = 25.0;

    fn gait() -> GaitParam {
        let sole = vec![
            Vector2::new(0.1, 0.05), Vector2::new(-0.1, 0.05),
            Vector2::new(-0.1, -0.05), Vector2::new(0.1, -0.05),
        ];
        let mut gait = GaitParam::new(&[
            FootGeometry {
                default_translate_pos: Vector3::new(0.0, -0.1, 0.0),
                cop_offset: Vector3::zeros(),
                sole_hull: sole.clone(),
            },
            FootGeometry {
                default_translate_pos: Vector3::new(0.0, 0.1, 0.0),
                cop_offset: Vector3::zeros(),
                sole_hull: sole,
            },
        ]);
        gait.dz = 0.8;
        gait.gen_cog = Vector3::new(0.0, 0.0, 0.8);
        gait.act_cog = gait.gen_cog;
        gait
    }

    fn ees() -> Vec<EndEffector> {
        let mut rleg = EndEffector::new("rleg", 0, Isometry3::identity(), Some(0));
        let mut lleg = EndEffector::new("lleg", 0, Isometry3::identity(), Some(1));
        let half = MASS * GRAVITY / 2.0;
        rleg.act_wrench = Vector6::new(0.0, 0.0, half, 0.0, 0.0, 0.0);
        lleg.act_wrench = Vector6::new(0.0, 0.0, half, 0.0, 0.0, 0.0);
        vec![rleg, lleg, EndEffector::new("rarm", 0, Isometry3::identity(), None)]
    }

    #[test]
    fn test_balanced_keeps_offsets_zero() {
        let gait = gait();
        let st = Stabilizer::new(StabilizerParams::default());

        let out = st.exec_stabilizer(&gait, &ees(), MASS, DT);
        assert!(out.target_zmp.norm() < 1e-12);
        assert!(out.st_offset_root_rpy.goal().norm() < 1e-12);
        for o in out.st_offset.iter() {
            assert!(o.goal().norm() < 1e-12);
        }
        // Even split about the middle
        assert!((out.target_wrench[RLEG][2] - MASS * GRAVITY / 2.0).abs() < 1e-9);
        assert!((out.target_wrench[LLEG][2] - MASS * GRAVITY / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_forward_error_leans_back_toes_down() {
        let mut gait = gait();
        gait.act_cog.x += 0.02;
        let st = Stabilizer::new(StabilizerParams::default());

        let out = st.exec_stabilizer(&gait, &ees(), MASS, DT);

        assert!(out.target_zmp.x > 0.0);
        // Negative pitch leans the root backwards
        assert!(out.st_offset_root_rpy.goal().y < 0.0);
        assert!(out.st_offset_root_rpy.goal().x.abs() < 1e-12);

        // Positive pitch offset on the feet puts the toes down
        for leg in [RLEG, LLEG] {
            assert!(out.target_wrench[leg][4] < 0.0);
            assert!(out.st_offset[leg].goal()[4] > 0.0);
        }
        assert_eq!(out.st_offset[2].goal(), Vector6::zeros());
    }

    #[test]
    fn test_single_support_carries_all() {
        let mut gait = gait();
        gait.footstep_nodes[0].is_support_phase = [true, false];
        let st = Stabilizer::new(StabilizerParams::default());

        let mut ees = ees();
        ees[LLEG].st_offset.reset(Vector6::new(0.0, 0.0, 0.01, 0.0, 0.0, 0.0));

        let out = st.exec_stabilizer(&gait, &ees, MASS, DT);
        assert!((out.target_wrench[RLEG][2] - MASS * GRAVITY).abs() < 1e-9);
        assert_eq!(out.target_wrench[LLEG], Vector6::zeros());

        // The swing foot decays back to zero
        let decayed = out.st_offset[LLEG].goal()[2];
        assert!((decayed - 0.01 * (1.0 - DT / 1.5)).abs() < 1e-15);
    }
}

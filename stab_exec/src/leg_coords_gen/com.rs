//! Generated CoM from the linear inverted pendulum

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Vector2, Vector3};

// Internal
use super::{pendulum_omega, ComCoords, LegCoordsGenerator};
use crate::gait::{GaitParam, LinearTrajectory};
use util::maths::calc_nearest_point_of_hull;

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LegCoordsGenerator {
    /// Advance the generated CoM by `dt`.
    ///
    /// The commanded ZMP is the reference ZMP plus feedback on the DCM
    /// error, clamped to the support polygon, and is held over the tick.
    pub fn calc_com_coords(&self, gait: &GaitParam, dt: f64) -> ComCoords {
        let omega = pendulum_omega(gait.dz);

        let ref_zmp = match gait.ref_zmp_traj.first() {
            Some(t) => t.start(),
            None => gait.gen_zmp
        };
        let ref_dcm = calc_ref_dcm(&gait.ref_zmp_traj, omega).unwrap_or(ref_zmp);
        let dcm = gait.gen_cog + gait.gen_cog_vel / omega;

        let k = 1.0 + self.params.dcm_feedback_gain / omega;
        let p = ref_zmp + k * (dcm - ref_dcm);
        let p = calc_nearest_point_of_hull(&Vector2::new(p.x, p.y), &gait.support_polygon());
        let gen_zmp = Vector3::new(p.x, p.y, ref_zmp.z);

        // Closed form of the pendulum with the ZMP held over the tick
        let (c, s) = ((omega * dt).cosh(), (omega * dt).sinh());
        let x0 = gait.gen_cog.xy() - p;
        let v0 = gait.gen_cog_vel.xy();
        let x = p + x0 * c + v0 * (s / omega);
        let v = x0 * (omega * s) + v0 * c;

        let z = ref_zmp.z + gait.dz;
        let vz = if dt > 0.0 { (z - gait.gen_cog.z) / dt } else { 0.0 };

        ComCoords {
            gen_cog: Vector3::new(x.x, x.y, z),
            gen_cog_vel: Vector3::new(v.x, v.y, vz),
            gen_zmp,
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Reference DCM at the start of a piecewise linear ZMP trajectory.
///
/// Recursed backwards from the final ZMP, which is taken as the terminal
/// DCM. `None` for an empty trajectory.
pub fn calc_ref_dcm(traj: &[LinearTrajectory], omega: f64) -> Option<Vector3<f64>> {
    let mut dcm = traj.last()?.goal();

    for seg in traj.iter().rev() {
        let t = seg.duration();
        let e = (-omega * t).exp();
        dcm = dcm * e
            + seg.start() * (1.0 - e)
            + seg.slope() * ((1.0 - e * (1.0 + omega * t)) / omega);
    }

    Some(dcm)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::gait::FootGeometry;
    use crate::leg_coords_gen::LegCoordsParams;

    const DT: f64 = 0.002;

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
        gait
    }

    #[test]
    fn test_ref_dcm_matches_integration() {
        let omega = pendulum_omega(0.8);
        let traj = vec![
            LinearTrajectory::new(Vector3::new(0.0, 0.0, 0.0), Vector3::new(0.1, 0.0, 0.0), 0.5),
            LinearTrajectory::new(Vector3::new(0.1, 0.0, 0.0), Vector3::new(0.1, 0.0, 0.0), 0.3),
        ];
        let dcm = calc_ref_dcm(&traj, omega).unwrap();

        // Forward Euler of dcm' = omega (dcm - zmp) from the computed start
        // must land on the final ZMP
        let mut x = dcm.x;
        let h: f64 = 1e-5;
        let steps = (0.8 / h).round() as usize;
        for i in 0..steps {
            let t = i as f64 * h;
            let zmp = if t < 0.5 { traj[0].value_at(t).x } else { traj[1].value_at(t - 0.5).x };
            x += h * omega * (x - zmp);
        }
        assert!((x - 0.1).abs() < 1e-3);

        // A constant ZMP has its DCM on top of it
        let hold = vec![LinearTrajectory::new(Vector3::x(), Vector3::x(), 1.0)];
        assert!((calc_ref_dcm(&hold, omega).unwrap() - Vector3::x()).norm() < 1e-12);
        assert!(calc_ref_dcm(&[], omega).is_none());
    }

    #[test]
    fn test_balanced_cog_stays() {
        let gait = gait();
        let gen = LegCoordsGenerator::new(LegCoordsParams::default());

        let out = gen.calc_com_coords(&gait, DT);
        assert!((out.gen_cog - gait.gen_cog).norm() < 1e-12);
        assert!(out.gen_cog_vel.norm() < 1e-9);
    }

    #[test]
    fn test_dcm_error_recovers() {
        let mut gait = gait();
        gait.gen_cog.x = 0.02;
        let gen = LegCoordsGenerator::new(LegCoordsParams::default());

        // The ZMP goes ahead of the CoM to bring it back
        let out = gen.calc_com_coords(&gait, DT);
        assert!(out.gen_zmp.x > 0.02);

        let ticks = (5.0 / DT).round() as usize;
        for _ in 0..ticks {
            let out = gen.calc_com_coords(&gait, DT);
            gait.gen_cog = out.gen_cog;
            gait.gen_cog_vel = out.gen_cog_vel;
            gait.gen_zmp = out.gen_zmp;
        }
        assert!(gait.gen_cog.x.abs() < 1e-3);
    }

    #[test]
    fn test_zmp_clamped_to_support() {
        let mut gait = gait();
        gait.gen_cog_vel.x = 2.0;
        let gen = LegCoordsGenerator::new(LegCoordsParams::default());

        let out = gen.calc_com_coords(&gait, DT);
        assert!((out.gen_zmp.x - 0.1).abs() < 1e-12);
    }
}

//! Foot trajectories and the reference ZMP trajectory

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;

// Internal
use super::{LegCoords, LegCoordsGenerator};
use crate::gait::{GaitParam, LinearTrajectory, NUM_LEGS, RLEG, LLEG};

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LegCoordsGenerator {
    /// Advance the foot trajectories by `dt` and rebuild the reference ZMP
    /// trajectory from the footstep queue.
    pub fn calc_leg_coords(&self, gait: &GaitParam, dt: f64) -> LegCoords {
        let ref_zmp_traj = calc_ref_zmp_traj(gait, dt);

        let node0 = gait.node0();
        let mut gen_coords = gait.gen_coords.clone();
        let mut src_coords = gait.src_coords;

        for leg in 0..NUM_LEGS {
            let traj = &mut gen_coords[leg];
            let remain = node0.remain_time;

            if node0.is_support_phase[leg] {
                traj.pose.set_goal(node0.dst_coords[leg], remain);
                traj.lift.set_goal(0.0, remain);
            }
            else {
                if gait.prev_support_phase[leg] {
                    src_coords[leg] = traj.value();
                    trace!("Leg {} lift-off", leg);
                }

                traj.pose.set_goal(node0.dst_coords[leg], remain);

                // Rise to the apex by mid-step, then come back down to land
                let half = node0.step_time / 2.0;
                if remain > half {
                    traj.lift.set_goal(node0.step_height[leg], remain - half);
                }
                else {
                    traj.lift.set_goal(0.0, remain);
                }
            }

            traj.interpolate(dt);
        }

        LegCoords {
            ref_zmp_traj,
            gen_coords,
            src_coords,
            prev_support_phase: node0.is_support_phase,
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// One segment per queued node, starting from the current reference ZMP.
fn calc_ref_zmp_traj(gait: &GaitParam, dt: f64) -> Vec<LinearTrajectory> {
    let mut traj = Vec::with_capacity(gait.footstep_nodes.len());

    let mut prev_end = match gait.ref_zmp_traj.first() {
        Some(t) => t.value_at(dt),
        None => gait.gen_zmp
    };

    for node in gait.footstep_nodes.iter() {
        let seg = match node.swing_leg() {
            Some(swing) => {
                let support = 1 - swing;
                let cop = gait.cop_point(support, &node.dst_coords[support]);
                LinearTrajectory::new(cop, cop, node.remain_time)
            },
            None if node.is_double_support() => {
                let mid = 0.5 * (
                    gait.cop_point(RLEG, &node.dst_coords[RLEG])
                    + gait.cop_point(LLEG, &node.dst_coords[LLEG])
                );
                LinearTrajectory::new(prev_end, mid, node.remain_time)
            },
            None => LinearTrajectory::new(prev_end, prev_end, node.remain_time)
        };
        prev_end = seg.goal();
        traj.push(seg);
    }

    traj
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::gait::{FootGeometry, FootstepNode};
    use crate::leg_coords_gen::LegCoordsParams;
    use nalgebra::{Isometry3, Vector2, Vector3};

    const DT: f64 = 0.002;

    fn gait() -> GaitParam {
        let sole = vec![
            Vector2::new(0.1, 0.05), Vector2::new(-0.1, 0.05),
            Vector2::new(-0.1, -0.05), Vector2::new(0.1, -0.05),
        ];
        GaitParam::new(&[
            FootGeometry {
                default_translate_pos: Vector3::new(0.0, -0.1, 0.0),
                cop_offset: Vector3::new(0.01, 0.0, 0.0),
                sole_hull: sole.clone(),
            },
            FootGeometry {
                default_translate_pos: Vector3::new(0.0, 0.1, 0.0),
                cop_offset: Vector3::new(0.01, 0.0, 0.0),
                sole_hull: sole,
            },
        ])
    }

    fn lleg_step(gait: &GaitParam) -> FootstepNode {
        let mut dst = gait.node0().dst_coords;
        dst[LLEG] = Isometry3::translation(0.1, 0.1, 0.0);
        FootstepNode {
            dst_coords: dst,
            is_support_phase: [true, false],
            remain_time: 0.8,
            step_time: 0.8,
            step_height: [0.0, 0.05],
        }
    }

    #[test]
    fn test_ref_zmp_traj() {
        let mut gait = gait();
        let step = lleg_step(&gait);
        let mut stand = FootstepNode::stand(step.dst_coords, 0.8);
        stand.remain_time = 0.4;
        gait.footstep_nodes.clear();
        gait.footstep_nodes.push_back(step);
        gait.footstep_nodes.push_back(stand);

        let traj = calc_ref_zmp_traj(&gait, DT);
        assert_eq!(traj.len(), 2);

        // Single support holds the supporting foot's CoP point
        assert_eq!(traj[0].start(), Vector3::new(0.01, -0.1, 0.0));
        assert_eq!(traj[0].goal(), traj[0].start());
        assert_eq!(traj[0].duration(), 0.8);

        // Double support shifts from there to the middle of both CoPs
        assert_eq!(traj[1].start(), traj[0].goal());
        assert!((traj[1].goal() - Vector3::new(0.06, 0.0, 0.0)).norm() < 1e-12);
        assert_eq!(traj[1].duration(), 0.4);
    }

    #[test]
    fn test_swing_profile() {
        let mut gait = gait();
        let step = lleg_step(&gait);
        let rleg_start = gait.gen_coords[RLEG].value();
        let lleg_start = gait.gen_coords[LLEG].value();
        gait.footstep_nodes[0] = step;

        let gen = LegCoordsGenerator::new(LegCoordsParams::default());

        let ticks = (0.8 / DT).round() as usize;
        let mut max_lift: f64 = 0.0;
        for t in 1..=ticks {
            gait.footstep_nodes[0].remain_time = (0.8 - t as f64 * DT).max(0.0);
            let out = gen.calc_leg_coords(&gait, DT);

            if t == 1 {
                // Lift-off edge records where the swing started
                assert_eq!(out.src_coords[LLEG], lleg_start);
            }
            max_lift = max_lift.max(out.gen_coords[LLEG].lift.value());

            gait.gen_coords = out.gen_coords;
            gait.src_coords = out.src_coords;
            gait.prev_support_phase = out.prev_support_phase;
            gait.ref_zmp_traj = out.ref_zmp_traj;
        }

        assert!((max_lift - 0.05).abs() < 1e-9);
        assert!(gait.gen_coords[LLEG].lift.value().abs() < 1e-9);
        let end = gait.gen_coords[LLEG].value();
        assert!((end.translation.vector - Vector3::new(0.1, 0.1, 0.0)).norm() < 1e-9);
        assert_eq!(gait.gen_coords[RLEG].value(), rleg_start);
        assert_eq!(gait.prev_support_phase, [true, false]);
    }
}

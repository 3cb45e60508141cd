//! Footstep queue maintenance and planning

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, trace};
use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use std::collections::VecDeque;

// Internal
use super::{FootStep, FootstepError, FootstepParams};
use crate::gait::{FootstepNode, GaitParam, LLEG, NUM_LEGS, RLEG};
use crate::interp::TIME_EPSILON;
use util::maths::orient_coord_to_axis;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FootstepGenerator {
    params: FootstepParams,

    /// Whether new nodes are planned from `cmd_vel` or repeat the stance.
    velocity_mode: bool,

    /// Commanded walking velocity in the support foot frame, `(vx, vy, vth)`.
    ///
    /// Units: meters/second, meters/second, radians/second
    cmd_vel: Vector3<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl FootstepGenerator {
    pub fn new(params: FootstepParams) -> Self {
        Self {
            params,
            velocity_mode: false,
            cmd_vel: Vector3::zeros(),
        }
    }

    pub fn params(&self) -> &FootstepParams {
        &self.params
    }

    pub fn is_velocity_mode(&self) -> bool {
        self.velocity_mode
    }

    /// Leave velocity mode, keeping the queue.
    pub fn reset(&mut self) {
        self.velocity_mode = false;
        self.cmd_vel = Vector3::zeros();
    }

    /// Advance the queue by `dt`.
    ///
    /// Returns the new queue and the source coordinates of the legs, which
    /// are the current generated coordinates whenever a node is popped.
    pub fn calc_foot_steps(
        &self,
        gait: &GaitParam,
        dt: f64
    ) -> (VecDeque<FootstepNode>, [Isometry3<f64>; NUM_LEGS]) {
        let mut nodes = gait.footstep_nodes.clone();
        let mut src_coords = gait.src_coords;

        self.top_up(&mut nodes, gait);

        nodes[0].remain_time = (nodes[0].remain_time - dt).max(0.0);
        if nodes[0].remain_time <= TIME_EPSILON {
            if nodes.len() < 2 {
                let next = self.plan_next(&nodes, gait);
                nodes.push_back(next);
            }
            src_coords = gait.gen_leg_coords();
            nodes.pop_front();
            self.top_up(&mut nodes, gait);

            trace!(
                "Footstep node complete, {} queued, next support {:?}",
                nodes.len(), nodes[0].is_support_phase
            );
        }

        (nodes, src_coords)
    }

    /// Walk at the given velocity until stopped.
    ///
    /// `vx` and `vy` are in meters/second in the support foot frame, `vth` in
    /// radians/second. Each planned node lands `v * step_time` ahead of the
    /// previous node's support foot, so one leg advances `2 * v * step_time`
    /// over its own last destination and the body moves at `v`.
    pub fn go_velocity(&mut self, vx: f64, vy: f64, vth: f64) {
        self.velocity_mode = true;
        self.cmd_vel = Vector3::new(vx, vy, vth);
        debug!("Walking at ({:.3}, {:.3}, {:.3})", vx, vy, vth);
    }

    /// Stop walking, dropping every planned node after the executing one.
    pub fn go_stop(&mut self, nodes: &mut VecDeque<FootstepNode>) {
        self.reset();
        nodes.truncate(1);
        debug!("Walking stopped");
    }

    /// Replace the queue from `overwrite_idx` with an explicit sequence.
    ///
    /// The executing node is never replaced. On error the queue is left as it
    /// was.
    pub fn set_foot_steps(
        &mut self,
        nodes: &mut VecDeque<FootstepNode>,
        steps: &[FootStep],
        overwrite_idx: usize
    ) -> Result<(), FootstepError> {
        if steps.is_empty() {
            return Err(FootstepError::EmptySequence)
        }

        let mut planned = Vec::with_capacity(steps.len());
        for (i, step) in steps.iter().enumerate() {
            let leg = step.leg_index()?;
            let step_time = step.step_time.unwrap_or(self.params.default_step_time);
            if !step_time.is_finite() || step_time <= 0.0 {
                return Err(FootstepError::InvalidStepTime(i))
            }
            let pose = Isometry3::from_parts(
                Translation3::new(step.pos[0], step.pos[1], step.pos[2]),
                UnitQuaternion::from_euler_angles(step.rpy[0], step.rpy[1], step.rpy[2])
            );
            planned.push((leg, pose, step_time));
        }

        self.reset();
        nodes.truncate(overwrite_idx.max(1));
        for (leg, pose, step_time) in planned {
            let node = self.step_node(nodes, leg, pose, step_time);
            nodes.push_back(node);
        }

        debug!("{} footsteps set from node {}", steps.len(), overwrite_idx.max(1));
        Ok(())
    }

    /// Walk to a pose relative to the current foot-mid coordinate.
    ///
    /// `x` and `y` are in meters, `th` in radians. Strides are bounded by
    /// `max_stride`, and a closing step brings the feet together in the
    /// neutral stance.
    pub fn go_pos(
        &mut self,
        nodes: &mut VecDeque<FootstepNode>,
        gait: &GaitParam,
        x: f64,
        y: f64,
        th: f64
    ) -> Result<(), FootstepError> {
        if !(x.is_finite() && y.is_finite() && th.is_finite()) {
            return Err(FootstepError::NonFiniteTarget)
        }

        // Counted before any cast to usize
        let max = self.params.max_stride;
        let strides = [x / max[0], y / max[1], th / max[2]]
            .iter()
            .map(|r| r.abs().ceil())
            .fold(1.0, f64::max);
        if !(strides + 1.0 <= self.params.max_num_steps as f64) {
            return Err(FootstepError::TooManySteps {
                needed: strides + 1.0,
                max: self.params.max_num_steps
            })
        }
        let num_strides = strides as usize;

        let start = orient_coord_to_axis(&gait.foot_mid_coords.value(), &Vector3::z());

        self.reset();
        nodes.truncate(1);

        let mut swing = match nodes[0].swing_leg() {
            Some(l) => 1 - l,
            None if y > 0.0 || (y == 0.0 && th > 0.0) => LLEG,
            None => RLEG
        };

        let mut mid = start;
        for k in 1..=num_strides {
            let r = k as f64 / num_strides as f64;
            mid = start * Isometry3::from_parts(
                Translation3::new(x * r, y * r, 0.0),
                UnitQuaternion::from_euler_angles(0.0, 0.0, th * r)
            );
            let pose = mid * Translation3::from(gait.default_translate_pos[swing].value());
            let node = self.step_node(nodes, swing, pose, self.params.default_step_time);
            nodes.push_back(node);
            swing = 1 - swing;
        }

        // Closing step
        let pose = mid * Translation3::from(gait.default_translate_pos[swing].value());
        let node = self.step_node(nodes, swing, pose, self.params.default_step_time);
        nodes.push_back(node);

        debug!(
            "Walking to ({:.3}, {:.3}, {:.3}) in {} steps",
            x, y, th, num_strides + 1
        );
        Ok(())
    }

    /// Append velocity-mode nodes until the look-ahead is met.
    fn top_up(&self, nodes: &mut VecDeque<FootstepNode>, gait: &GaitParam) {
        if !self.velocity_mode {
            return
        }
        while nodes.len() < self.params.min_look_ahead {
            let next = self.plan_next(nodes, gait);
            nodes.push_back(next);
        }
    }

    /// The node following the last queued one.
    fn plan_next(&self, nodes: &VecDeque<FootstepNode>, gait: &GaitParam) -> FootstepNode {
        let last = match nodes.back() {
            Some(n) => n,
            None => return FootstepNode::stand(gait.gen_leg_coords(), self.params.default_step_time)
        };

        if !self.velocity_mode {
            return FootstepNode::stand(last.dst_coords, self.params.default_step_time)
        }

        let swing = match last.swing_leg() {
            Some(l) => 1 - l,
            None if self.cmd_vel.y > 0.0 => LLEG,
            None => RLEG
        };
        let support = 1 - swing;
        let step_time = self.params.default_step_time;

        let support_dst = orient_coord_to_axis(&last.dst_coords[support], &Vector3::z());
        let offset = gait.default_translate_pos[swing].value()
            - gait.default_translate_pos[support].value()
            + Vector3::new(self.cmd_vel.x, self.cmd_vel.y, 0.0) * step_time;
        let turn = UnitQuaternion::from_euler_angles(0.0, 0.0, self.cmd_vel.z * step_time);

        let swing_dst = Isometry3::from_parts(
            Translation3::from(support_dst.translation.vector + support_dst.rotation * offset),
            support_dst.rotation * turn
        );

        self.step_node(nodes, swing, swing_dst, step_time)
    }

    /// A single support node swinging `swing` to `dst`, the other leg staying
    /// where the last queued node leaves it.
    fn step_node(
        &self,
        nodes: &VecDeque<FootstepNode>,
        swing: usize,
        dst: Isometry3<f64>,
        step_time: f64
    ) -> FootstepNode {
        let mut dst_coords = match nodes.back() {
            Some(n) => n.dst_coords,
            None => [dst; NUM_LEGS]
        };
        dst_coords[swing] = dst;

        let mut is_support_phase = [true; NUM_LEGS];
        is_support_phase[swing] = false;

        let mut step_height = [0.0; NUM_LEGS];
        step_height[swing] = self.params.default_step_height;

        FootstepNode {
            dst_coords,
            is_support_phase,
            remain_time: step_time,
            step_time,
            step_height,
        }
    }
}

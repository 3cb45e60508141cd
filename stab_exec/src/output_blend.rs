//! Output blending
//!
//! Joint angles, torques and base pose switch source when balancing starts
//! or stops. The blender hides the switch by holding the difference to the
//! last emitted output as an offset and ramping it to zero over the
//! transition.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;
use nalgebra::{DVector, Isometry3};

// Internal
use crate::ctrl_mode::ControlMode;
use crate::interp::{Interpolator, PoseInterpolator};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Joint and base command emitted each tick.
#[derive(Debug, Clone, PartialEq)]
pub struct RobotCommand {
    /// Units: radians
    pub q: DVector<f64>,

    /// Units: newton meters
    pub tau: DVector<f64>,

    pub base_pose: Isometry3<f64>,
}

#[derive(Debug, Clone)]
pub struct OutputBlender {
    q_offset: Vec<Interpolator<f64>>,
    tau_offset: Vec<Interpolator<f64>>,

    /// Offset composed on the left of the raw base pose.
    base_offset: PoseInterpolator,

    /// Last emitted command.
    prev: Option<RobotCommand>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl RobotCommand {
    /// Base pose as translation followed by the row-major rotation matrix.
    pub fn base_tform(&self) -> [f64; 12] {
        let p = self.base_pose.translation.vector;
        let r = self.base_pose.rotation.to_rotation_matrix();
        let m = r.matrix();

        [
            p.x, p.y, p.z,
            m[(0, 0)], m[(0, 1)], m[(0, 2)],
            m[(1, 0)], m[(1, 1)], m[(1, 2)],
            m[(2, 0)], m[(2, 1)], m[(2, 2)],
        ]
    }

    /// Base orientation as roll, pitch, yaw.
    ///
    /// Units: radians
    pub fn base_rpy(&self) -> [f64; 3] {
        let (r, p, y) = self.base_pose.rotation.euler_angles();
        [r, p, y]
    }
}

impl OutputBlender {
    pub fn new(num_joints: usize) -> Self {
        Self {
            q_offset: vec![Interpolator::new(0.0); num_joints],
            tau_offset: vec![Interpolator::new(0.0); num_joints],
            base_offset: PoseInterpolator::default(),
            prev: None,
        }
    }

    /// Forget the last output and drop all offsets.
    pub fn reset(&mut self) {
        self.q_offset.iter_mut().for_each(|o| o.reset(0.0));
        self.tau_offset.iter_mut().for_each(|o| o.reset(0.0));
        self.base_offset.reset(Isometry3::identity());
        self.prev = None;
    }

    pub fn last_output(&self) -> Option<&RobotCommand> {
        self.prev.as_ref()
    }

    /// Blend this tick's raw command into the output.
    ///
    /// Blending applies only while balancing starts or stops, outside those
    /// transitions the raw command is emitted unchanged.
    pub fn blend(&mut self, raw: &RobotCommand, mode: &ControlMode, dt: f64) -> RobotCommand {
        let blending = mode.is_sync_to_abc() || mode.is_sync_to_idle();

        if !blending {
            self.clear_offsets();
        }
        else if mode.changed() {
            self.start_blend(raw, mode.remain_time());
        }
        else {
            self.q_offset.iter_mut().for_each(|o| o.interpolate(dt));
            self.tau_offset.iter_mut().for_each(|o| o.interpolate(dt));
            self.base_offset.interpolate(dt);
        }

        let out = RobotCommand {
            q: DVector::from_iterator(
                raw.q.len(),
                raw.q.iter().zip(self.q_offset.iter()).map(|(q, o)| q + o.value())
            ),
            tau: DVector::from_iterator(
                raw.tau.len(),
                raw.tau.iter().zip(self.tau_offset.iter()).map(|(t, o)| t + o.value())
            ),
            base_pose: self.base_offset.value() * raw.base_pose,
        };

        self.prev = Some(out.clone());
        out
    }

    /// Hold the jump from the last output and ramp it out over `duration`.
    fn start_blend(&mut self, raw: &RobotCommand, duration: f64) {
        let prev = match self.prev.as_ref() {
            Some(p) if p.q.len() == raw.q.len() && p.tau.len() == raw.tau.len() => p,
            _ => {
                self.clear_offsets();
                return
            }
        };

        for (o, (p, r)) in self.q_offset.iter_mut().zip(prev.q.iter().zip(raw.q.iter())) {
            o.reset(p - r);
            o.set_goal(0.0, duration);
        }
        for (o, (p, r)) in self.tau_offset.iter_mut().zip(prev.tau.iter().zip(raw.tau.iter())) {
            o.reset(p - r);
            o.set_goal(0.0, duration);
        }
        self.base_offset.reset(prev.base_pose * raw.base_pose.inverse());
        self.base_offset.set_goal(Isometry3::identity(), duration);

        debug!("Output blend over {:.3} s", duration);
    }

    fn clear_offsets(&mut self) {
        self.q_offset.iter_mut().for_each(|o| o.reset(0.0));
        self.tau_offset.iter_mut().for_each(|o| o.reset(0.0));
        self.base_offset.reset(Isometry3::identity());
    }
}

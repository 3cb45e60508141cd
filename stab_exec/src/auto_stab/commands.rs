//! Commands accepted by the AutoStabilizer between cycles
//!
//! A rejected command leaves the AutoStabilizer exactly as it was.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, warn};
use nalgebra::Vector6;

// Internal
use super::{AutoStabilizer, CommandError};
use crate::ctrl_mode::Transition;
use crate::footstep_gen::{FootStep, FootstepError};

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl AutoStabilizer {
    /// Request a mode transition, started on the next cycle.
    pub fn request_transition(&mut self, transition: Transition) -> Result<(), CommandError> {
        self.mode.set_next_transition(transition).map_err(|e| {
            warn!("Transition rejected: {}", e);
            CommandError::from(e)
        })?;

        info!("{:?} requested", transition);
        Ok(())
    }

    /// Walk at a velocity until stopped.
    ///
    /// `vx` and `vy` are in meters/second, `vth` in radians/second. The body
    /// moves at `v`, each leg advancing `2 * v * step_time` per own stride.
    pub fn go_velocity(&mut self, vx: f64, vy: f64, vth: f64) -> Result<(), CommandError> {
        self.require_balancing("go_velocity")?;
        if !(vx.is_finite() && vy.is_finite() && vth.is_finite()) {
            warn!("go_velocity rejected, the velocity is not finite");
            return Err(FootstepError::NonFiniteTarget.into())
        }

        self.footstep_gen.go_velocity(vx, vy, vth);
        info!("Walking at ({:.3} m/s, {:.3} m/s, {:.3} rad/s)", vx, vy, vth);
        Ok(())
    }

    /// Stop walking once the executing step completes.
    pub fn go_stop(&mut self) -> Result<(), CommandError> {
        self.require_balancing("go_stop")?;

        self.footstep_gen.go_stop(&mut self.gait.footstep_nodes);
        info!("Walking stopped");
        Ok(())
    }

    /// Walk to a pose relative to the current foot-mid coordinate.
    ///
    /// `x` and `y` are in meters, `th` in radians.
    pub fn go_pos(&mut self, x: f64, y: f64, th: f64) -> Result<(), CommandError> {
        self.require_balancing("go_pos")?;

        let gait = self.gait.clone();
        let mut nodes = gait.footstep_nodes.clone();
        self.footstep_gen.go_pos(&mut nodes, &gait, x, y, th).map_err(|e| {
            warn!("go_pos rejected: {}", e);
            CommandError::from(e)
        })?;
        self.gait.footstep_nodes = nodes;

        info!("Walking to ({:.3} m, {:.3} m, {:.3} rad)", x, y, th);
        Ok(())
    }

    /// Replace the queue from `overwrite_idx` with explicit steps.
    pub fn set_foot_steps(
        &mut self,
        steps: &[FootStep],
        overwrite_idx: usize
    ) -> Result<(), CommandError> {
        self.require_balancing("set_foot_steps")?;

        self.footstep_gen
            .set_foot_steps(&mut self.gait.footstep_nodes, steps, overwrite_idx)
            .map_err(|e| {
                warn!("set_foot_steps rejected: {}", e);
                CommandError::from(e)
            })?;

        info!("{} footsteps set", steps.len());
        Ok(())
    }

    pub fn start_impedance_controller(&mut self, name: &str) -> Result<(), CommandError> {
        self.require_balancing("start_impedance_controller")?;

        self.imp_ctrl.start(name, &self.ees).map_err(|e| {
            warn!("Impedance start rejected: {}", e);
            CommandError::from(e)
        })
    }

    /// Stop compliance on an end effector, its offset ramps back to zero.
    pub fn stop_impedance_controller(&mut self, name: &str) -> Result<(), CommandError> {
        self.require_balancing("stop_impedance_controller")?;

        self.imp_ctrl.stop(name, &mut self.ees).map_err(|e| {
            warn!("Impedance stop rejected: {}", e);
            CommandError::from(e)
        })
    }

    /// Move the hand fix ratio to `ratio` over `time` seconds.
    ///
    /// At 1 the reference no longer follows the generated CoM sideways, so
    /// the hands hold their lateral position while the body sways.
    pub fn set_hand_fix_mode(&mut self, ratio: f64, time: f64) -> Result<(), CommandError> {
        if !(ratio.is_finite() && time.is_finite()) {
            warn!("Hand fix mode rejected, the ratio or time is not finite");
            return Err(CommandError::NonFiniteArgument)
        }

        self.ref_to_gen.set_hand_fix_mode(ratio, time);
        info!("Hand fix ratio going to {:.2} over {:.2} s", ratio.clamp(0.0, 1.0), time);
        Ok(())
    }

    /// Return to `Idle` and drop all corrections, as when the controller is
    /// (re)started.
    pub fn activate(&mut self) {
        self.mode.reset();
        self.footstep_gen.reset();
        self.imp_ctrl.reset();
        for ee in self.ees.iter_mut() {
            ee.ic_offset.reset(Vector6::zeros());
            ee.st_offset.reset(Vector6::zeros());
        }
        self.blender.reset();
        self.output = None;

        info!("AutoStabilizer activated");
    }

    fn require_balancing(&self, cmd: &str) -> Result<(), CommandError> {
        if self.mode.is_abc_running() {
            Ok(())
        }
        else {
            warn!("{} rejected, balancing is not running", cmd);
            Err(CommandError::NotBalancing)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ctrl_mode::Mode;
    use crate::test_fixtures::{test_params, test_robot};
    use crate::auto_stab::InputData;
    use util::module::State;

    fn balancing() -> AutoStabilizer {
        let robot = test_robot();
        let mut s = AutoStabilizer::new(test_params(), robot.clone()).unwrap();
        let input = InputData {
            q_ref: Some(robot.q().iter().copied().collect()),
            ..InputData::default()
        };
        s.request_transition(Transition::StartAbc).unwrap();
        s.proc(&input).unwrap();
        assert!(s.control_mode().is_abc_running());
        s
    }

    #[test]
    fn test_commands_rejected_while_idle() {
        let mut s = AutoStabilizer::new(test_params(), test_robot()).unwrap();
        let len = s.gait().footstep_nodes.len();

        assert!(matches!(s.go_velocity(0.1, 0.0, 0.0), Err(CommandError::NotBalancing)));
        assert!(matches!(s.go_stop(), Err(CommandError::NotBalancing)));
        assert!(matches!(s.go_pos(0.2, 0.0, 0.0), Err(CommandError::NotBalancing)));
        assert!(matches!(s.set_foot_steps(&[], 0), Err(CommandError::NotBalancing)));
        assert!(matches!(
            s.start_impedance_controller("rarm"),
            Err(CommandError::NotBalancing)
        ));
        assert!(matches!(
            s.request_transition(Transition::StartSt),
            Err(CommandError::IllegalTransition(_))
        ));

        assert_eq!(s.gait().footstep_nodes.len(), len);
        assert!(!s.footstep_gen.is_velocity_mode());
        assert_eq!(s.mode(), Mode::Idle);
    }

    #[test]
    fn test_bad_arguments_change_nothing() {
        let mut s = balancing();
        let before = s.gait().footstep_nodes.len();

        assert!(matches!(
            s.go_velocity(f64::NAN, 0.0, 0.0),
            Err(CommandError::Footstep(FootstepError::NonFiniteTarget))
        ));
        assert!(!s.footstep_gen.is_velocity_mode());

        assert!(matches!(
            s.go_pos(0.1, f64::INFINITY, 0.0),
            Err(CommandError::Footstep(_))
        ));
        let bad = vec![FootStep {
            leg: "tail".into(), pos: [0.0; 3], rpy: [0.0; 3], step_time: None
        }];
        assert!(matches!(s.set_foot_steps(&bad, 1), Err(CommandError::Footstep(_))));
        assert_eq!(s.gait().footstep_nodes.len(), before);

        assert!(matches!(
            s.start_impedance_controller("tail"),
            Err(CommandError::Impedance(_))
        ));
        assert!(matches!(
            s.stop_impedance_controller("rarm"),
            Err(CommandError::Impedance(_))
        ));
        assert!(matches!(
            s.set_hand_fix_mode(f64::NAN, 1.0),
            Err(CommandError::NonFiniteArgument)
        ));
    }

    #[test]
    fn test_go_pos_and_stop() {
        let mut s = balancing();

        s.go_pos(0.3, 0.0, 0.0).unwrap();
        assert!(s.gait().footstep_nodes.len() > 2);

        s.go_stop().unwrap();
        assert_eq!(s.gait().footstep_nodes.len(), 1);
    }

    #[test]
    fn test_far_go_pos_rejected() {
        let mut s = balancing();
        s.go_velocity(0.1, 0.0, 0.0).unwrap();
        let before = s.gait().footstep_nodes.len();

        assert!(matches!(
            s.go_pos(2000.0, 0.0, 0.0),
            Err(CommandError::Footstep(FootstepError::TooManySteps { .. }))
        ));
        assert!(matches!(
            s.go_pos(1e300, 0.0, 0.0),
            Err(CommandError::Footstep(FootstepError::TooManySteps { .. }))
        ));

        // Still walking on the same queue
        assert_eq!(s.gait().footstep_nodes.len(), before);
        assert!(s.footstep_gen.is_velocity_mode());
    }

    #[test]
    fn test_activate_resets_mode() {
        let mut s = balancing();
        s.start_impedance_controller("rarm").unwrap();

        s.activate();
        assert_eq!(s.mode(), Mode::Idle);
        assert!(!s.imp_ctrl.is_active(2));
        assert!(s.blender.last_output().is_none());
    }
}

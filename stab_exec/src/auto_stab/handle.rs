//! Shared handle on the AutoStabilizer
//!
//! The cyclic executive ticks the AutoStabilizer through the handle while
//! command senders on other threads lock it between ticks. Blocking mode
//! commands release the lock while they wait, the tick wakes them whenever
//! the mode changes.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::warn;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

// Internal
use super::{AutoStabilizer, CommandError, InputData, OutputData, StatusReport};
use crate::ctrl_mode::{Mode, Transition};
use crate::footstep_gen::FootStep;
use util::{archive::Archived, module::State};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AutoStabilizerHandle {
    shared: Arc<(Mutex<AutoStabilizer>, Condvar)>,

    /// Longest wait of a blocking mode command.
    timeout: Duration,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl AutoStabilizerHandle {
    pub fn new(auto_stab: AutoStabilizer) -> Self {
        let timeout = Duration::from_secs_f64(auto_stab.params.command_timeout_s.max(0.0));
        Self {
            shared: Arc::new((Mutex::new(auto_stab), Condvar::new())),
            timeout,
        }
    }

    /// Run one control cycle and archive its status report.
    pub fn tick(&self, input: &InputData) -> Result<(OutputData, StatusReport), CommandError> {
        let (lock, cvar) = &*self.shared;
        let mut s = lock.lock().map_err(|_| CommandError::Poisoned)?;

        let (output, report) = match s.proc(input) {
            Ok(r) => r,
            Err(e) => match e {}
        };

        if let Err(e) = s.write() {
            warn!("Cannot archive the AutoStabilizer status: {}", e);
        }

        if report.mode_changed {
            cvar.notify_all();
        }

        Ok((output, report))
    }

    /// Run `f` on the locked AutoStabilizer.
    pub fn with<R>(&self, f: impl FnOnce(&mut AutoStabilizer) -> R) -> Result<R, CommandError> {
        let mut s = self.lock()?;
        Ok(f(&mut s))
    }

    pub fn mode(&self) -> Result<Mode, CommandError> {
        self.with(|s| s.mode())
    }

    // ---- MODE COMMANDS ----

    /// Start balancing and wait until it is fully running.
    pub fn start_auto_balancer(&self) -> Result<(), CommandError> {
        self.transition_and_wait(Transition::StartAbc)
    }

    /// Stop balancing and wait until the robot follows the reference again.
    pub fn stop_auto_balancer(&self) -> Result<(), CommandError> {
        self.transition_and_wait(Transition::StopAbc)
    }

    pub fn start_stabilizer(&self) -> Result<(), CommandError> {
        self.transition_and_wait(Transition::StartSt)
    }

    pub fn stop_stabilizer(&self) -> Result<(), CommandError> {
        self.transition_and_wait(Transition::StopSt)
    }

    pub fn request_start_auto_balancer(&self) -> Result<(), CommandError> {
        self.with(|s| s.request_transition(Transition::StartAbc))?
    }

    pub fn request_stop_auto_balancer(&self) -> Result<(), CommandError> {
        self.with(|s| s.request_transition(Transition::StopAbc))?
    }

    pub fn request_start_stabilizer(&self) -> Result<(), CommandError> {
        self.with(|s| s.request_transition(Transition::StartSt))?
    }

    pub fn request_stop_stabilizer(&self) -> Result<(), CommandError> {
        self.with(|s| s.request_transition(Transition::StopSt))?
    }

    // ---- WALKING AND LIMB COMMANDS ----

    pub fn go_velocity(&self, vx: f64, vy: f64, vth: f64) -> Result<(), CommandError> {
        self.with(|s| s.go_velocity(vx, vy, vth))?
    }

    pub fn go_stop(&self) -> Result<(), CommandError> {
        self.with(|s| s.go_stop())?
    }

    pub fn go_pos(&self, x: f64, y: f64, th: f64) -> Result<(), CommandError> {
        self.with(|s| s.go_pos(x, y, th))?
    }

    pub fn set_foot_steps(&self, steps: &[FootStep], overwrite_idx: usize) -> Result<(), CommandError> {
        self.with(|s| s.set_foot_steps(steps, overwrite_idx))?
    }

    pub fn start_impedance_controller(&self, name: &str) -> Result<(), CommandError> {
        self.with(|s| s.start_impedance_controller(name))?
    }

    pub fn stop_impedance_controller(&self, name: &str) -> Result<(), CommandError> {
        self.with(|s| s.stop_impedance_controller(name))?
    }

    pub fn set_hand_fix_mode(&self, ratio: f64, time: f64) -> Result<(), CommandError> {
        self.with(|s| s.set_hand_fix_mode(ratio, time))?
    }

    /// Reset to `Idle`. Blocked mode commands wake and see the new mode.
    pub fn activate(&self) -> Result<(), CommandError> {
        self.with(|s| s.activate())?;
        self.shared.1.notify_all();
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, AutoStabilizer>, CommandError> {
        self.shared.0.lock().map_err(|_| CommandError::Poisoned)
    }

    /// Request a transition and wait for the mode it ends in.
    fn transition_and_wait(&self, transition: Transition) -> Result<(), CommandError> {
        let (lock, cvar) = &*self.shared;
        let mut s = lock.lock().map_err(|_| CommandError::Poisoned)?;
        s.request_transition(transition)?;

        let target = transition.target();
        let (s, _) = cvar
            .wait_timeout_while(s, self.timeout, |s| s.mode() != target)
            .map_err(|_| CommandError::Poisoned)?;

        if s.mode() == target {
            Ok(())
        }
        else {
            warn!("Timed out waiting for {:?}, mode is {:?}", target, s.mode());
            Err(CommandError::TransitionTimeout(target))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ctrl_mode::ModeParams;
    use crate::test_fixtures::{test_params, test_robot};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    fn handle(timeout_s: f64) -> (AutoStabilizerHandle, InputData) {
        let robot = test_robot();
        let mut params = test_params();
        params.command_timeout_s = timeout_s;
        params.mode = ModeParams {
            abc_start_transition_time: 0.02,
            abc_stop_transition_time: 0.02,
            st_start_transition_time: 0.02,
            st_stop_transition_time: 0.02,
        };
        let input = InputData {
            q_ref: Some(robot.q().iter().copied().collect()),
            ..InputData::default()
        };
        (AutoStabilizerHandle::new(AutoStabilizer::new(params, robot).unwrap()), input)
    }

    #[test]
    fn test_blocking_commands_wait_for_mode() {
        let (h, input) = handle(10.0);
        let run = Arc::new(AtomicBool::new(true));

        let ticker = {
            let h = h.clone();
            let run = run.clone();
            thread::spawn(move || {
                while run.load(Ordering::Relaxed) {
                    h.tick(&input).unwrap();
                    thread::sleep(Duration::from_millis(1));
                }
            })
        };

        h.start_auto_balancer().unwrap();
        assert_eq!(h.mode().unwrap(), Mode::Abc);
        h.start_stabilizer().unwrap();
        assert_eq!(h.mode().unwrap(), Mode::St);
        h.stop_stabilizer().unwrap();
        assert_eq!(h.mode().unwrap(), Mode::Abc);
        h.stop_auto_balancer().unwrap();
        assert_eq!(h.mode().unwrap(), Mode::Idle);

        run.store(false, Ordering::Relaxed);
        ticker.join().unwrap();
    }

    #[test]
    fn test_timeout_and_rejection() {
        let (h, input) = handle(0.05);

        // Nothing ticks, the mode never settles
        assert!(matches!(
            h.start_auto_balancer(),
            Err(CommandError::TransitionTimeout(Mode::Abc))
        ));

        // The request is still pending, a second one is refused
        assert!(matches!(
            h.request_start_auto_balancer(),
            Err(CommandError::IllegalTransition(_))
        ));

        h.tick(&input).unwrap();
        assert_eq!(h.mode().unwrap(), Mode::SyncToAbc);
        assert!(matches!(h.request_stop_stabilizer(), Err(CommandError::IllegalTransition(_))));
    }
}

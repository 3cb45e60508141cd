//! # Telecommand processor module
//!
//! The telecommand processor forwards TCs from the script to the
//! AutoStabilizer.
//!
//! The processor runs on the executable's loop thread, the same thread that
//! ticks the AutoStabilizer, so mode changes are only requested here. Waiting
//! for a mode from this thread would never see it reached.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, warn};

// Internal
use stab_lib::{auto_stab::AutoStabilizerHandle, tc::Tc};

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Execute a telecommand.
///
/// A rejected TC is logged and dropped.
pub(crate) fn exec(stab: &AutoStabilizerHandle, tc: &Tc) {
    debug!("Recieved {:?} command", tc);

    let result = match tc {
        Tc::StartAutoBalancer => stab.request_start_auto_balancer(),
        Tc::StopAutoBalancer => stab.request_stop_auto_balancer(),
        Tc::StartStabilizer => stab.request_start_stabilizer(),
        Tc::StopStabilizer => stab.request_stop_stabilizer(),
        Tc::GoVelocity { vx, vy, vth } => stab.go_velocity(*vx, *vy, *vth),
        Tc::GoStop => stab.go_stop(),
        Tc::GoPos { x, y, th } => stab.go_pos(*x, *y, *th),
        Tc::SetFootSteps { steps, overwrite_idx } => stab.set_foot_steps(steps, *overwrite_idx),
        Tc::StartImpedance { name } => stab.start_impedance_controller(name),
        Tc::StopImpedance { name } => stab.stop_impedance_controller(name),
        Tc::SetHandFixMode { ratio, time } => stab.set_hand_fix_mode(*ratio, *time),
        Tc::Activate => stab.activate(),
    };

    if let Err(e) = result {
        warn!("{:?} rejected: {}", tc, e);
    }
}

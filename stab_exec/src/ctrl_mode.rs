//! Control mode state machine
//!
//! Gates which parts of the controller run. Transitions are requested from
//! the command side and take effect on the next tick, passing through a
//! transient `SyncTo*` mode which lasts the configured transition time:
//!
//! ```text
//! Idle --StartAbc--> SyncToAbc --> Abc --StartSt--> SyncToSt --> St
//!  ^                                |  ^                          |
//!  +------ SyncToIdle <--StopAbc----+  +---- SyncToStopSt <-StopSt-+
//! ```

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;
use serde::{Deserialize, Serialize};

// Internal
use crate::interp::TIME_EPSILON;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Transition times of the control mode state machine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModeParams {
    /// Units: seconds
    pub abc_start_transition_time: f64,

    /// Units: seconds
    pub abc_stop_transition_time: f64,

    /// Units: seconds
    pub st_start_transition_time: f64,

    /// Units: seconds
    pub st_stop_transition_time: f64,
}

#[derive(Debug, Clone)]
pub struct ControlMode {
    params: ModeParams,

    current: Mode,
    previous: Mode,

    /// Mode requested since the last tick.
    next: Mode,

    /// Time left in the current transient mode.
    ///
    /// Units: seconds
    remain_time: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Mode {
    #[default]
    Idle,
    SyncToAbc,
    Abc,
    SyncToSt,
    St,
    SyncToStopSt,
    SyncToIdle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    StartAbc,
    StopAbc,
    StartSt,
    StopSt,
}

#[derive(Debug, thiserror::Error)]
#[error("Cannot {transition:?} while in {mode:?}")]
pub struct IllegalTransition {
    pub transition: Transition,
    pub mode: Mode,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for ModeParams {
    fn default() -> Self {
        Self {
            abc_start_transition_time: 2.0,
            abc_stop_transition_time: 2.0,
            st_start_transition_time: 0.5,
            st_stop_transition_time: 2.0,
        }
    }
}

impl Mode {
    /// The mode a transient mode settles into.
    fn terminal(self) -> Mode {
        match self {
            Mode::SyncToAbc => Mode::Abc,
            Mode::SyncToSt => Mode::St,
            Mode::SyncToStopSt => Mode::Abc,
            Mode::SyncToIdle => Mode::Idle,
            m => m
        }
    }

    fn is_transient(self) -> bool {
        self.terminal() != self
    }
}

impl Transition {
    /// The terminal mode reached once this transition completes.
    pub fn target(self) -> Mode {
        match self {
            Transition::StartAbc => Mode::Abc,
            Transition::StopAbc => Mode::Idle,
            Transition::StartSt => Mode::St,
            Transition::StopSt => Mode::Abc,
        }
    }
}

impl ControlMode {
    pub fn new(params: ModeParams) -> Self {
        Self {
            params,
            current: Mode::Idle,
            previous: Mode::Idle,
            next: Mode::Idle,
            remain_time: 0.0,
        }
    }

    /// Return to `Idle`, dropping any pending request.
    pub fn reset(&mut self) {
        self.current = Mode::Idle;
        self.previous = Mode::Idle;
        self.next = Mode::Idle;
        self.remain_time = 0.0;
    }

    /// Request a transition, to be started on the next `update`.
    ///
    /// Fails without side effects if the transition is not legal from the
    /// current mode or another request is already pending.
    pub fn set_next_transition(&mut self, transition: Transition) -> Result<(), IllegalTransition> {
        let next = match (transition, self.current) {
            (Transition::StartAbc, Mode::Idle) => Mode::SyncToAbc,
            (Transition::StopAbc, Mode::Abc) => Mode::SyncToIdle,
            (Transition::StartSt, Mode::Abc) => Mode::SyncToSt,
            (Transition::StopSt, Mode::St) => Mode::SyncToStopSt,
            _ => return Err(IllegalTransition { transition, mode: self.current })
        };

        if self.next != self.current {
            return Err(IllegalTransition { transition, mode: self.current })
        }

        self.next = next;
        Ok(())
    }

    /// Advance the state machine by one tick.
    pub fn update(&mut self, dt: f64) {
        if self.next != self.current {
            self.previous = self.current;
            self.current = self.next;
            self.remain_time = match self.current {
                Mode::SyncToAbc => self.params.abc_start_transition_time,
                Mode::SyncToIdle => self.params.abc_stop_transition_time,
                Mode::SyncToSt => self.params.st_start_transition_time,
                Mode::SyncToStopSt => self.params.st_stop_transition_time,
                _ => 0.0
            };
            debug!("Control mode {:?} -> {:?}", self.previous, self.current);
        }
        else {
            self.previous = self.current;
            if self.current.is_transient() {
                self.remain_time -= dt;
                if self.remain_time <= TIME_EPSILON {
                    self.remain_time = 0.0;
                    self.current = self.current.terminal();
                    self.next = self.current;
                    debug!("Control mode {:?} -> {:?}", self.previous, self.current);
                }
            }
        }
    }

    pub fn now(&self) -> Mode {
        self.current
    }

    pub fn remain_time(&self) -> f64 {
        self.remain_time
    }

    /// True if the mode changed on the last `update`.
    pub fn changed(&self) -> bool {
        self.current != self.previous
    }

    pub fn is_abc_running(&self) -> bool {
        !matches!(self.current, Mode::Idle | Mode::SyncToIdle)
    }

    pub fn is_st_running(&self) -> bool {
        matches!(self.current, Mode::SyncToSt | Mode::St)
    }

    pub fn is_sync_to_abc(&self) -> bool {
        self.current == Mode::SyncToAbc
    }

    pub fn is_sync_to_idle(&self) -> bool {
        self.current == Mode::SyncToIdle
    }

    pub fn is_sync_to_stop_st(&self) -> bool {
        self.current == Mode::SyncToStopSt
    }

    pub fn is_sync_to_abc_init(&self) -> bool {
        self.is_sync_to_abc() && self.changed()
    }

    pub fn is_sync_to_idle_init(&self) -> bool {
        self.is_sync_to_idle() && self.changed()
    }

    pub fn is_sync_to_stop_st_init(&self) -> bool {
        self.is_sync_to_stop_st() && self.changed()
    }
}

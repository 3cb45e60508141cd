//! # Data Store
//!
//! Holds the data passed between the executable's cycle stages.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use crate::auto_stab;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Global data store for the executable.
#[derive(Default)]
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u128,

    /// True if this cycle falls on a 1Hz boundary
    pub is_1_hz_cycle: bool,

    /// Controller time, cycles times the control period
    pub ctrl_time_s: f64,

    /// Session elapsed time
    pub sim_time_s: f64,

    // Reference motion
    /// Joint angles held as the reference posture
    pub ref_q: Vec<f64>,

    /// Base position held as the reference
    pub ref_base_pos: [f64; 3],

    /// Wrench read by each force sensor of the standing robot
    pub nominal_wrench: Vec<Option<[f64; 6]>>,

    // AutoStabilizer
    pub auto_stab_input: auto_stab::InputData,
    pub auto_stab_output: Option<auto_stab::OutputData>,
    pub auto_stab_status_rpt: auto_stab::StatusReport,

    // Monitoring Counters
    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl DataStore {
    /// Perform actions required at the start of a cycle.
    ///
    /// Builds the AutoStabilizer input from the held reference, with the
    /// actual state looped back from the previous cycle's command, and sets
    /// the 1Hz cycle flag.
    pub fn cycle_start(&mut self, cycle_frequency_hz: f64, period_s: f64) {
        let cycles_per_s = (cycle_frequency_hz.round() as u128).max(1);
        self.is_1_hz_cycle = self.num_cycles % cycles_per_s == 0;

        self.auto_stab_input = auto_stab::InputData {
            q_ref: Some(self.ref_q.clone()),
            tau_ref: Some(vec![0.0; self.ref_q.len()]),
            ref_base_pos: Some(self.ref_base_pos),
            ref_base_rpy: Some([0.0; 3]),
            act_wrench: self.nominal_wrench.clone(),
            ..auto_stab::InputData::default()
        };

        // Loop-back plant, the robot reaches each command within a cycle
        if let Some(ref out) = self.auto_stab_output {
            self.auto_stab_input.q_act = Some(out.q.clone());
            self.auto_stab_input.dq_act = Some(vec![0.0; out.q.len()]);
            self.auto_stab_input.act_imu_rpy = Some(out.base_rpy);
        }

        self.auto_stab_status_rpt = auto_stab::StatusReport::default();

        self.ctrl_time_s = self.num_cycles as f64 * period_s;
        self.sim_time_s = util::session::get_elapsed_seconds();
    }
}

//! Main stabilizer executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise the AutoStabilizer
//!     - Main loop, once per control period:
//!         - Input acquisition (reference posture, actual state looped back
//!           from the previous command)
//!         - Telecommand processing from the script
//!         - AutoStabilizer processing
//!         - Cycle management
//!
//! With no script the robot stands under the AutoStabilizer for the
//! configured run length.

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

use stab_lib::{
    auto_stab::{AutoStabilizer, AutoStabilizerHandle},
    data_store::DataStore,
    gait::{GRAVITY, NUM_LEGS},
    params::StabExecParams,
    tc::Tc
};

mod tc_processor;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use std::env;
use std::thread;
use std::time::{Duration, Instant};
use color_eyre::{Report, eyre::{WrapErr, eyre}};

// Internal
use util::{
    raise_error,
    module::State,
    logger::{logger_init, LevelFilter},
    session::Session,
    time::seconds_to_cycles,
    script_interpreter::{ScriptInterpreter, PendingCmds},
};

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new(
        "stab_exec",
        "sessions"
    ).wrap_err("Failed to create the session")?;

    // Initialise logger, the per-tick trace of the library stays out
    logger_init(LevelFilter::Trace, &[("stab_lib", LevelFilter::Debug)], &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("AutoStabilizer Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let exec_params: StabExecParams = util::params::load(
        "stab_exec.toml"
    ).wrap_err("Could not load exec params")?;

    info!("Exec parameters loaded");

    // ---- INITIALISE TC SOURCE ----

    // Collect all arguments
    let args: Vec<String> = env::args().collect();
    debug!("CLI arguments: {:?}", args);

    // If we have a single argument use it as the script path
    let mut script: Option<ScriptInterpreter<Tc>> = if args.len() == 2 {
        info!("Loading script from \"{}\"", &args[1]);

        let si = ScriptInterpreter::new(&args[1])
            .wrap_err("Failed to load script")?;

        info!(
            "Loaded script lasts {:.02} s and contains {} TCs\n",
            si.get_duration(),
            si.get_num_cmds()
        );

        Some(si)
    }
    else if args.len() == 1 {
        info!("No script provided, the robot will stand\n");
        None
    }
    else {
        return Err(eyre!(
            "Expected either zero or one argument, found {}", args.len() - 1)
        );
    };

    let run_duration_s = match script {
        Some(ref si) => si.get_duration() + exec_params.max_duration_s,
        None => exec_params.max_duration_s
    };

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let auto_stab = AutoStabilizer::init("auto_stabilizer.toml", &session)
        .wrap_err("Failed to initialise the AutoStabilizer")?;
    info!("AutoStabilizer init complete");

    let period_s = auto_stab.params().dt;
    let frequency_hz = 1.0 / period_s;
    let run_cycles = seconds_to_cycles(run_duration_s, period_s) as u128;

    // ---- INITIALISE DATASTORE ----

    let mut ds = DataStore::default();
    {
        let model = auto_stab.gen_robot();
        ds.ref_q = model.q().iter().copied().collect();
        ds.ref_base_pos = model.root_pose().translation.vector.into();

        // Weight shared evenly between the feet
        let foot_fz = model.total_mass() * GRAVITY / NUM_LEGS as f64;
        ds.nominal_wrench = vec![None; model.force_sensors().len()];
        for ee in auto_stab.end_effectors().iter().take(NUM_LEGS) {
            if let Some(fs) = ee.force_sensor {
                ds.nominal_wrench[fs] = Some([0.0, 0.0, foot_fz, 0.0, 0.0, 0.0]);
            }
        }
    }

    let stab = AutoStabilizerHandle::new(auto_stab);

    info!("Module initialisation complete\n");

    // ---- MAIN LOOP ----

    info!("Begining main loop, running for {:.02} s\n", run_duration_s);

    loop {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // Clear items that need wiping at the start of the cycle
        ds.cycle_start(frequency_hz, period_s);

        if ds.num_cycles >= run_cycles {
            info!("Run length reached, stopping");
            break
        }

        // ---- TELECOMMAND PROCESSING ----

        // Script time is controller time so that runs replay identically
        if let Some(ref mut si) = script {
            match si.get_pending_cmds(ds.ctrl_time_s) {
                PendingCmds::None => (),
                PendingCmds::Some(tc_vec) => {
                    for tc in tc_vec.iter() {
                        tc_processor::exec(&stab, tc);
                    }
                },
                // Keep running so the last commands can complete
                PendingCmds::EndOfScript => ()
            }
        }

        // ---- CONTROL ALGORITHM PROCESSING ----

        let (output, report) = stab.tick(&ds.auto_stab_input)
            .wrap_err("AutoStabilizer processing failed")?;

        if report.ik_failed {
            warn!("Whole-body IK failed at {:.03} s", ds.ctrl_time_s);
        }

        if ds.is_1_hz_cycle {
            info!(
                "{:.01} s: {:?}, CoM ({:.03}, {:.03}), ZMP ({:.03}, {:.03}), {} footstep nodes",
                ds.ctrl_time_s,
                report.mode,
                report.gen_cog_x, report.gen_cog_y,
                report.gen_zmp_x, report.gen_zmp_y,
                report.num_footstep_nodes
            );
        }

        ds.auto_stab_output = Some(output);
        ds.auto_stab_status_rpt = report;

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match Duration::from_secs_f64(period_s)
            .checked_sub(cycle_dur)
        {
            Some(d) => {
                ds.num_consec_cycle_overruns = 0;
                thread::sleep(d);
            },
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - period_s
                );
                ds.num_consec_cycle_overruns += 1;

                // If number of overruns greater than the limit exit
                if ds.num_consec_cycle_overruns > exec_params.max_consec_cycle_overruns {
                    raise_error!(
                        "More than {} consecutive cycle overruns!",
                        exec_params.max_consec_cycle_overruns
                    );
                }
            }
        }

        // Increment cycle counter
        ds.num_cycles += 1;
    }

    // ---- SHUTDOWN ----

    info!("End of execution");

    Ok(())
}

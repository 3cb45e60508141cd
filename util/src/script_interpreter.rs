//! # Script interpreter module
//!
//! This module provides an interpreter for timed command scripts. A script is
//! a list of `<time>: <json>;` entries, the JSON payload being deserialised
//! into the command type the interpreter is built for, for example:
//!
//! ```text
//! 0.5: "StartAutoBalancer";
//! 3.0: {"GoVelocity": {"vx": 0.1, "vy": 0.0, "vth": 0.0}};
//! ```

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::fs;
use regex::RegexBuilder;
use serde::de::DeserializeOwned;
use thiserror::Error;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Matches one `<time>: <payload>;` entry per line.
const ENTRY_PATTERN: &str = r"^\s*(\d+(\.\d+)?)\s*:\s*([^;]*);";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A command which is scripted to occur at a specific time.
struct Command<T> {
    /// The time the command is supposed to execute at
    exec_time_s: f64,

    /// The command to run
    cmd: T
}

/// A script interpreter.
///
/// After initialising with the path to the script to run use
/// `.get_pending_cmds` to acquire the commands that are due.
pub struct ScriptInterpreter<T> {
    script_path: PathBuf,
    cmds: VecDeque<Command<T>>
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Could not find the script at {0:?}")]
    ScriptNotFound(PathBuf),

    #[error("Could not load the script: {0}")]
    ScriptLoadError(std::io::Error),

    #[error("The script entry pattern is invalid: {0}")]
    PatternError(regex::Error),

    #[error("The script is empty (or is so bad it can't be read)")]
    ScriptEmpty,

    #[error(
        "Script contains an invalid timestamp: {0}. \
        Should be a float (like 1.0)")]
    InvalidTimestamp(String),

    #[error("Script contains an invalid command at {0} s: {1}")]
    InvalidCmd(f64, serde_json::Error)
}

/// Commands which are due for execution.
pub enum PendingCmds<T> {
    None,
    Some(Vec<T>),
    EndOfScript
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<T: DeserializeOwned> ScriptInterpreter<T> {

    /// Create a new interpreter from the given script path.
    pub fn new<P: AsRef<Path>>(script_path: P) -> Result<Self, ScriptError> {
        let path = PathBuf::from(script_path.as_ref());

        if !path.exists() {
            return Err(ScriptError::ScriptNotFound(path));
        }

        let script = fs::read_to_string(&path)
            .map_err(ScriptError::ScriptLoadError)?;

        let mut interp = Self::from_str(&script)?;
        interp.script_path = path;
        Ok(interp)
    }

    /// Create a new interpreter from the script's contents.
    pub fn from_str(script: &str) -> Result<Self, ScriptError> {
        let mut queue: VecDeque<Command<T>> = VecDeque::new();

        let re = RegexBuilder::new(ENTRY_PATTERN)
            .multi_line(true)
            .build()
            .map_err(ScriptError::PatternError)?;

        for cap in re.captures_iter(script) {
            // Groups 1 and 3 always participate in a match
            let time_str = cap.get(1).map_or("", |m| m.as_str());
            let payload = cap.get(3).map_or("", |m| m.as_str());

            let exec_time_s: f64 = time_str
                .parse()
                .map_err(|e| ScriptError::InvalidTimestamp(format!("{}", e)))?;

            let cmd = serde_json::from_str(payload)
                .map_err(|e| ScriptError::InvalidCmd(exec_time_s, e))?;

            queue.push_back(Command {
                exec_time_s,
                cmd
            });
        }

        if queue.is_empty() {
            return Err(ScriptError::ScriptEmpty)
        }

        Ok(ScriptInterpreter {
            script_path: PathBuf::new(),
            cmds: queue
        })
    }
}

impl<T> ScriptInterpreter<T> {
    /// Return the commands whose execution time is at or before `current_time_s`.
    ///
    /// The time base is up to the caller, the stabilizer executable uses the
    /// controller time (cycles times period) rather than wall time so that
    /// scripts replay identically regardless of overruns.
    pub fn get_pending_cmds(&mut self, current_time_s: f64) -> PendingCmds<T> {
        if self.cmds.is_empty() {
            return PendingCmds::EndOfScript
        }

        let mut due = vec![];

        while let Some(front) = self.cmds.front() {
            if front.exec_time_s > current_time_s {
                break
            }
            if let Some(c) = self.cmds.pop_front() {
                due.push(c.cmd);
            }
        }

        if due.is_empty() {
            PendingCmds::None
        }
        else {
            PendingCmds::Some(due)
        }
    }

    /// Get the number of commands remaining in the script
    pub fn get_num_cmds(&self) -> usize {
        self.cmds.len()
    }

    /// Get the length of the script in seconds
    pub fn get_duration(&self) -> f64 {
        match self.cmds.back() {
            Some(c) => c.exec_time_s,
            None => 0f64
        }
    }

    /// Path the script was loaded from (empty if built from a string)
    pub fn script_path(&self) -> &Path {
        &self.script_path
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    enum Cmd {
        Start,
        Speed { v: f64 },
    }

    #[test]
    fn test_parse_and_pending() {
        let script = "\
            0.5: \"Start\";\n\
            1.0 : {\"Speed\": {\"v\": 0.1}};\n\
            1.0: {\"Speed\": {\"v\": 0.2}};\n";

        let mut si: ScriptInterpreter<Cmd> = ScriptInterpreter::from_str(script).unwrap();
        assert_eq!(si.get_num_cmds(), 3);
        assert_eq!(si.get_duration(), 1.0);

        assert!(matches!(si.get_pending_cmds(0.1), PendingCmds::None));

        match si.get_pending_cmds(0.5) {
            PendingCmds::Some(v) => assert_eq!(v, vec![Cmd::Start]),
            _ => panic!("Expected the start command")
        }

        match si.get_pending_cmds(2.0) {
            PendingCmds::Some(v) => assert_eq!(
                v, vec![Cmd::Speed { v: 0.1 }, Cmd::Speed { v: 0.2 }]),
            _ => panic!("Expected both speed commands")
        }

        assert!(matches!(si.get_pending_cmds(3.0), PendingCmds::EndOfScript));
    }

    #[test]
    fn test_bad_scripts() {
        assert!(matches!(
            ScriptInterpreter::<Cmd>::from_str("nothing here"),
            Err(ScriptError::ScriptEmpty)
        ));
        assert!(matches!(
            ScriptInterpreter::<Cmd>::from_str("1.0: \"Jump\";"),
            Err(ScriptError::InvalidCmd(t, _)) if t == 1.0
        ));
    }
}

//! Utility library for the AutoStabilizer software

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

/// CSV archiving of per-cycle status records
pub mod archive;

/// Software root lookup
pub mod host;

/// Logging to stdout and the session log file
#[macro_use]
pub mod logger;

/// Geometry helpers: mid coordinates, axis alignment, support hulls
pub mod maths;

/// Cyclic module interface
pub mod module;

/// TOML parameter loading
pub mod params;

/// Session directory and epoch
pub mod session;

/// Timed command scripts
pub mod script_interpreter;

/// Time conversions
pub mod time;

// ---------------------------------------------------------------------------
// MACROS
// ---------------------------------------------------------------------------

/// Fire an unrecoverable error which will panic.
///
/// # Notes
/// - It is prefered to return a `Result<_,Error>` instead of raising an error
///   as this allows the application to potentially handle.
#[macro_export]
macro_rules! raise_error {
    () => ({
        log::error!("Explicit error raised.");
        std::panic!("Unrecoverable error");
    });
    ($fmt:expr) => ({
        log::error!("{}", $fmt);
        std::panic!("Unrecoverable error");
    });
    ($fmt:expr, $($arg:tt)*) => ({
        log::error!("{}", std::format_args!($fmt, $($arg)+));
        std::panic!("Unrecoverable error");
    });
}

//! Session logging
//!
//! Log records go to two places: the console at the level requested by the
//! user, and the session's log file which always records at least `Debug`,
//! so the per-tick trajectory control summaries can be read back after a run
//! even if the console was kept at `Info`.
//!
//! Only the crates in this workspace log below `Warn`.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use std::fmt::Arguments;
use log::{self, info, Record};
use fern::{self, FormatCallback};
use colored::{ColoredString, Colorize};
use thiserror::Error;

// Internal imports
use crate::session;

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Log targets (crate names) which may log below `Warn`.
const WORKSPACE_TARGETS: [&str; 3] = ["follow_lib", "follow_sim", "util"];

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("Expected a log level of at least `INFO`, found `{0}`")]
    InvalidMinLogLevel(log::LevelFilter),

    #[error("Error initialising the log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("An error occured while setting up the logger: {0}")]
    FernInitError(log::SetLoggerError)
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise the logger for this execution.
///
/// `console_level` is the level shown on stdout, it must be `Info` or more
/// verbose. `Debug` prints a line per control tick, `Trace` adds the
/// localisation steps.
///
/// This function must only be called once, a second call fails with
/// `FernInitError`.
pub fn logger_init(
    console_level: LevelFilter,
    session: &session::Session
) -> Result<(), LoggerInitError> {

    if console_level < log::Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(console_level))
    }

    let file_level = file_level(console_level);

    let log_file = fern::log_file(session.log_file_path.clone())
        .map_err(LoggerInitError::LogFileInitError)?;

    let mut dispatch = fern::Dispatch::new()
        .format(format_record)
        .level(LevelFilter::Warn);

    for target in WORKSPACE_TARGETS.iter() {
        dispatch = dispatch.level_for(*target, file_level);
    }

    dispatch
        .chain(
            fern::Dispatch::new()
                .level(console_level)
                .chain(std::io::stdout())
        )
        .chain(log_file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!("Logging initialised");
    if let Some(epoch) = session::get_epoch() {
        info!("    Session epoch: {}", epoch);
    }
    info!("    Console level: {:?}", console_level);
    info!("    Log file level: {:?}", file_level);
    info!("    Log file path: {:?}", session.log_file_path);

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// The level recorded in the session log file for the given console level.
fn file_level(console_level: LevelFilter) -> LevelFilter {
    console_level.max(LevelFilter::Debug)
}

/// Prefix each record with the session time and level. Records below `Info`
/// also carry the module they came from.
fn format_record(out: FormatCallback, message: &Arguments, record: &Record) {
    let time_s = session::get_elapsed_seconds();
    let level = level_to_str(record.level());

    if record.level() > log::Level::Info {
        out.finish(format_args!(
            "[{:10.6} {}] {}: {}",
            time_s,
            level,
            record.target(),
            message
        ))
    }
    else {
        out.finish(format_args!("[{:10.6} {}] {}", time_s, level, message))
    }
}

/// Get the string representation of a log level
fn level_to_str(level: log::Level) -> ColoredString {
    match level {
        log::Level::Trace => "TRC".dimmed().italic(),
        log::Level::Debug => "DBG".dimmed(),
        log::Level::Info  => "INF".normal(),
        log::Level::Warn  => "WRN".yellow(),
        log::Level::Error => "ERR".red().bold()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_file_level() {
        assert_eq!(file_level(LevelFilter::Info), LevelFilter::Debug);
        assert_eq!(file_level(LevelFilter::Debug), LevelFilter::Debug);
        assert_eq!(file_level(LevelFilter::Trace), LevelFilter::Trace);
    }
}

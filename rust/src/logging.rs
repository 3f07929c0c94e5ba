//! Logging macros for the convolution engine with verbosity level control.
//!
//! Provides zero-cost logging when disabled (verbosity=0).
//! Verbosity levels:
//! - 0: SILENT (only errors)
//! - 1: PROGRESS (anchor refinements, fixed points, schedule summaries)
//! - 2: DETAIL (individual backtrace splits, per-square statistics)
//! - 3: DEBUG (convolution internals)

/// Verbosity level constants.
pub const VERBOSITY_SILENT: u8 = 0;
pub const VERBOSITY_PROGRESS: u8 = 1;
pub const VERBOSITY_DETAIL: u8 = 2;
pub const VERBOSITY_DEBUG: u8 = 3;

/// Log an internal inconsistency. Printed at every verbosity level.
#[macro_export]
macro_rules! log_error {
    ($verbosity:expr, $($arg:tt)*) => {{
        let _ = $verbosity;
        eprintln!($($arg)*);
    }};
}

/// Log at PROGRESS level (verbosity >= 1).
///
/// Used for: anchor refinements, fixed-point convergence, final schedules.
#[macro_export]
macro_rules! log_progress {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_PROGRESS {
            eprintln!($($arg)*);
        }
    };
}

/// Log at DETAIL level (verbosity >= 2).
///
/// Used for: backtrace targets and the splits chosen for them.
#[macro_export]
macro_rules! log_detail {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_DETAIL {
            eprintln!($($arg)*);
        }
    };
}

/// Log at DEBUG level (verbosity >= 3).
///
/// Used for: value ranges, spectra counts, hashes.
#[macro_export]
macro_rules! log_debug {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_DEBUG {
            eprintln!($($arg)*);
        }
    };
}

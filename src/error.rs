//! Error type shared by the simulation substrate and the testbench layers.
//!
//! Protocol outcomes (NACK, lock timeout, POR timeout) are *not* errors; they
//! are returned as values. [`TbError`] covers infrastructure failures and
//! explicit scenario checks.

use std::io;

pub type TbResult<T> = Result<T, TbError>;

#[derive(Debug, thiserror::Error)]
pub enum TbError {
    /// A testbench operation ran outside of [`crate::sim::Simulation::run`].
    #[error("no simulation is running on this thread")]
    NoSimulation,

    #[error("object '{0}' not found")]
    NotFound(String),

    #[error("invalid object handle {0}")]
    BadHandle(usize),

    #[error("width mismatch on '{name}': expected {expected} bits, got {got}")]
    WidthMismatch {
        name: String,
        expected: u32,
        got: u32,
    },

    #[error("invalid logic value string '{0}'")]
    BadValue(String),

    #[error("unknown time unit '{0}'")]
    UnknownUnit(String),

    #[error("can't convert {time} {unit} to sim steps without rounding (precision 10^{precision} s)")]
    TimeRounding { time: f64, unit: String, precision: i8 },

    #[error("invalid I2C timing: {0}")]
    InvalidTiming(String),

    #[error("simulation stalled at {time_ps} ps with the test still pending")]
    Stalled { time_ps: u64 },

    #[error("simulation time limit of {limit_ns} ns exceeded")]
    TimeLimit { limit_ns: u64 },

    #[error("task '{0}' was cancelled")]
    Cancelled(String),

    /// A scenario check failed; this is the only error that fails a test on purpose.
    #[error("check failed: {0}")]
    Check(String),

    #[error("config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("report: {0}")]
    Report(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Fails the current scenario with [`TbError::Check`] unless `cond` holds.
///
/// ```ignore
/// check!(readback == 0x02, "PHY_ENABLE default: got 0x{:02X}", readback);
/// ```
#[macro_export]
macro_rules! check {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::error::TbError::Check(format!($($arg)+)));
        }
    };
    ($cond:expr) => {
        if !$cond {
            return Err($crate::error::TbError::Check(stringify!($cond).to_string()));
        }
    };
}

/// Like [`check!`] for equality, reporting both sides in hex.
#[macro_export]
macro_rules! check_eq {
    ($left:expr, $right:expr, $($arg:tt)+) => {{
        let (l, r) = (&$left, &$right);
        if *l != *r {
            return Err($crate::error::TbError::Check(format!(
                "{}: left=0x{:02X?} right=0x{:02X?}",
                format!($($arg)+),
                l,
                r
            )));
        }
    }};
}

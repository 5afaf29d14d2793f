//! Diagnostics on stderr.
//!
//! `-q` leaves only errors, the default adds notices such as a test binary
//! without tests, and `-v` also shows constraint decisions, manifests, tool
//! command lines and how long each tool ran. Stdout is left to the Go tools.

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Default,
    Verbose,
}

impl Verbosity {
    /// Level selected by the `-q`/`-v` pair. Quiet wins if both are set.
    pub fn from_flags(quiet: bool, verbose: bool) -> Self {
        match (quiet, verbose) {
            (true, _) => Verbosity::Quiet,
            (false, true) => Verbosity::Verbose,
            (false, false) => Verbosity::Default,
        }
    }

    fn encode(self) -> u8 {
        match self {
            Verbosity::Quiet => 0,
            Verbosity::Default => 1,
            Verbosity::Verbose => 2,
        }
    }

    fn decode(raw: u8) -> Self {
        match raw {
            0 => Verbosity::Quiet,
            2 => Verbosity::Verbose,
            _ => Verbosity::Default,
        }
    }
}

static LEVEL: AtomicU8 = AtomicU8::new(1);

pub fn init(quiet: bool, verbose: bool) {
    LEVEL.store(Verbosity::from_flags(quiet, verbose).encode(), Ordering::Relaxed);
}

fn level() -> Verbosity {
    Verbosity::decode(LEVEL.load(Ordering::Relaxed))
}

pub fn is_verbose() -> bool {
    level() == Verbosity::Verbose
}

pub fn is_quiet() -> bool {
    level() == Verbosity::Quiet
}

/// `eprintln!` under `-v` only.
macro_rules! vprintln {
    ($($arg:tt)*) => {
        if $crate::verbose::is_verbose() {
            eprintln!($($arg)*);
        }
    };
}

pub(crate) use vprintln;

/// `eprintln!` unless `-q` was given.
macro_rules! dprintln {
    ($($arg:tt)*) => {
        if !$crate::verbose::is_quiet() {
            eprintln!($($arg)*);
        }
    };
}

pub(crate) use dprintln;

/// Reports how long a tool ran once it is dropped, in verbose mode.
///
/// Dropping on the error path still reports, so a slow failing compile
/// shows up too.
pub struct Timer {
    tool: &'static str,
    start: Instant,
}

impl Timer {
    pub fn start(tool: &'static str) -> Self {
        Self {
            tool,
            start: Instant::now(),
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if is_verbose() {
            eprintln!("{}", timing_line(self.tool, self.start.elapsed()));
        }
    }
}

fn timing_line(tool: &str, elapsed: Duration) -> String {
    format!("  {tool} took {elapsed:.1?}")
}

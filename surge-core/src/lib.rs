//! Scenario contract for the `surge` load tester: load profiles, checks, thresholds and their
//! evaluation. Nothing in here performs I/O; the runner lives in the `surge` crate.
mod check;
mod config;
mod constants;
mod duration;
mod error;
mod evaluate;
mod outcome;
mod preset;
mod profile;
mod stats;
mod threshold;

pub use check::*;
pub use config::*;
pub use constants::*;
pub use error::*;
pub use evaluate::*;
pub use outcome::*;
pub use preset::*;
pub use profile::*;
pub use stats::*;
pub use threshold::*;

pub use duration::parse as parse_duration;

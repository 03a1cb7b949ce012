//! fsconform harness: the probe library and the machinery that runs it
//!
//! A [`Registry`] holds the built-in probes, grouped by [`Category`]. The
//! [`Runner`] executes each one against an [`fsconform_core::FsOracle`] inside
//! its own [`ProbeContext`] directory and hands outcomes to a [`Reporter`].

pub mod config;
pub mod context;
pub mod probe;
mod probes;
pub mod registry;
pub mod report;
pub mod runner;
pub mod traverse;

// Re-export key types for convenience
pub use config::{ExitPolicy, HarnessConfig};
pub use context::{remove_entry, OpenHandle, ProbeContext};
pub use probe::{
    check, check_bytes, check_eq, expect_failure, Category, Outcome, Probe, ProbeFailure,
    ProbeFn, ProbeResult, ProbeResultExt,
};
pub use registry::Registry;
pub use report::{format_line, ConsoleReporter, Reporter};
pub use runner::{ProbeRecord, RunSummary, Runner, SettlePolicy};
pub use traverse::{walk, Walk};

//! Sequential probe execution

use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fsconform_core::FsOracle;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::context::ProbeContext;
use crate::probe::{Category, Outcome, Probe, ProbeFailure, ProbeResult};
use crate::registry::Registry;
use crate::report::Reporter;

/// Pause before each probe plus bounded retry of transient failures.
///
/// Some back ends (antivirus filters, network redirectors) hold files briefly
/// after close; a delay alone was the historical workaround.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlePolicy {
    /// Pause before every probe, in milliseconds.
    pub delay_ms: u64,
    /// Extra attempts for a probe that failed with a transient error.
    pub max_retries: u32,
    /// Wait before the first retry; doubled on each further retry.
    pub backoff_ms: u64,
}

impl Default for SettlePolicy {
    fn default() -> Self {
        Self {
            delay_ms: 0,
            max_retries: 3,
            backoff_ms: 50,
        }
    }
}

impl SettlePolicy {
    /// One second between probes, no retries.
    pub fn legacy() -> Self {
        Self {
            delay_ms: 1000,
            max_retries: 0,
            backoff_ms: 0,
        }
    }

    fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u64 << retry.min(16);
        Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }
}

/// One probe's final result
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeRecord {
    pub name: &'static str,
    pub category: Category,
    pub outcome: Outcome,
    pub attempts: u32,
}

/// Totals for a run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
    pub results: Vec<ProbeRecord>,
}

impl RunSummary {
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &ProbeRecord> {
        self.results.iter().filter(|r| !r.outcome.is_pass())
    }
}

/// Runs probes one at a time against a volume root
pub struct Runner<'a> {
    oracle: &'a dyn FsOracle,
    root: PathBuf,
    policy: SettlePolicy,
}

impl<'a> Runner<'a> {
    pub fn new(oracle: &'a dyn FsOracle, root: impl Into<PathBuf>) -> Self {
        Self {
            oracle,
            root: root.into(),
            policy: SettlePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: SettlePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run every probe in registration order. A failing probe never stops the run.
    pub fn run(&self, registry: &Registry, reporter: &mut dyn Reporter) -> RunSummary {
        let started = Instant::now();
        info!(
            backend = self.oracle.name(),
            root = %self.root.display(),
            probes = registry.len(),
            "starting conformance run"
        );

        let mut summary = RunSummary::default();
        for probe in registry.iter() {
            if self.policy.delay_ms > 0 {
                thread::sleep(Duration::from_millis(self.policy.delay_ms));
            }
            let record = self.run_probe(probe);
            reporter.report(probe, &record.outcome);
            if record.outcome.is_pass() {
                summary.passed += 1;
            } else {
                summary.failed += 1;
            }
            summary.results.push(record);
        }

        info!(
            passed = summary.passed,
            failed = summary.failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "conformance run finished"
        );
        reporter.finish(&summary);
        summary
    }

    /// Run one probe, retrying while it fails transiently.
    pub fn run_probe(&self, probe: &Probe) -> ProbeRecord {
        let mut attempts = 0;
        let result = loop {
            attempts += 1;
            let result = self.attempt(probe);
            match &result {
                Err(failure) if failure.is_transient() && attempts <= self.policy.max_retries => {
                    let wait = self.policy.backoff(attempts - 1);
                    debug!(
                        probe = probe.name,
                        attempt = attempts,
                        wait_ms = wait.as_millis() as u64,
                        error = %failure,
                        "transient failure, retrying"
                    );
                    thread::sleep(wait);
                }
                _ => break result,
            }
        };

        ProbeRecord {
            name: probe.name,
            category: probe.category,
            outcome: Outcome::from(result),
            attempts,
        }
    }

    fn attempt(&self, probe: &Probe) -> ProbeResult {
        let ctx = ProbeContext::enter(self.oracle, &self.root, probe.name)
            .map_err(ProbeFailure::Context)?;
        let result = (probe.run)(&ctx);
        if let Err(err) = ctx.teardown() {
            warn!(probe = probe.name, error = %err, "could not remove probe directory");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{check_eq, ProbeResultExt};
    use crate::report::ConsoleReporter;
    use fsconform_core::{FsError, MemoryFs};
    use std::sync::atomic::{AtomicU32, Ordering};

    static FLAKY_CALLS: AtomicU32 = AtomicU32::new(0);

    fn passes(ctx: &ProbeContext<'_>) -> ProbeResult {
        ctx.write_file(&ctx.path("f"), b"x").setup("write")?;
        Ok("ok".to_string())
    }

    fn fails(_: &ProbeContext<'_>) -> ProbeResult {
        check_eq("value", 1, 2)?;
        Ok(String::new())
    }

    fn flaky(_: &ProbeContext<'_>) -> ProbeResult {
        if FLAKY_CALLS.fetch_add(1, Ordering::SeqCst) < 2 {
            return Err(FsError::Busy).op("open");
        }
        Ok(String::new())
    }

    fn quick() -> SettlePolicy {
        SettlePolicy {
            delay_ms: 0,
            max_retries: 3,
            backoff_ms: 0,
        }
    }

    #[test]
    fn test_failure_does_not_stop_run() {
        let fs = MemoryFs::default();
        fs.create_directory(Path::new("/vol")).unwrap();
        let mut registry = Registry::new();
        registry.register(Probe::new("Fails", Category::Creation, fails));
        registry.register(Probe::new("Passes", Category::Creation, passes));

        let mut reporter = ConsoleReporter::new(Vec::new(), Vec::new());
        let summary = Runner::new(&fs, "/vol")
            .with_policy(quick())
            .run(&registry, &mut reporter);

        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failures().next().map(|r| r.name), Some("Fails"));
        assert!(fs.read_dir(Path::new("/vol")).unwrap().is_empty());
    }

    #[test]
    fn test_transient_failure_is_retried() {
        let fs = MemoryFs::default();
        fs.create_directory(Path::new("/vol")).unwrap();
        let runner = Runner::new(&fs, "/vol").with_policy(quick());

        let record = runner.run_probe(&Probe::new("Flaky", Category::Locking, flaky));
        assert!(record.outcome.is_pass());
        assert_eq!(record.attempts, 3);
    }

    #[test]
    fn test_missing_root_fails_every_probe() {
        let fs = MemoryFs::default();
        let runner = Runner::new(&fs, "/absent").with_policy(SettlePolicy {
            max_retries: 0,
            ..quick()
        });
        let record = runner.run_probe(&Probe::new("Passes", Category::Creation, passes));
        assert!(!record.outcome.is_pass());
        assert_eq!(record.attempts, 1);
    }
}

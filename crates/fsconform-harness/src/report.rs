//! Per-probe result lines

use std::io::{self, Write};

use tracing::{info, warn};

use crate::probe::{Outcome, Probe};
use crate::runner::RunSummary;

/// Receives every outcome as soon as it is known
pub trait Reporter {
    fn report(&mut self, probe: &Probe, outcome: &Outcome);

    fn finish(&mut self, _summary: &RunSummary) {}
}

/// `[OK] Name details` or `[FAIL] Name: message`
pub fn format_line(probe: &Probe, outcome: &Outcome) -> String {
    match outcome {
        Outcome::Pass { details } if details.is_empty() => format!("[OK] {}", probe.name),
        Outcome::Pass { details } => format!("[OK] {} {}", probe.name, details),
        Outcome::Fail { message } => format!("[FAIL] {}: {}", probe.name, message),
    }
}

/// Writes passes to one stream and failures to another
pub struct ConsoleReporter<O: Write, E: Write> {
    out: O,
    err: E,
}

impl ConsoleReporter<io::Stdout, io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(io::stdout(), io::stderr())
    }
}

impl<O: Write, E: Write> ConsoleReporter<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self { out, err }
    }

    pub fn into_inner(self) -> (O, E) {
        (self.out, self.err)
    }
}

impl<O: Write, E: Write> Reporter for ConsoleReporter<O, E> {
    fn report(&mut self, probe: &Probe, outcome: &Outcome) {
        let line = format_line(probe, outcome);
        let written = match outcome {
            Outcome::Pass { details } => {
                info!(probe = probe.name, category = %probe.category, %details, "probe passed");
                writeln!(self.out, "{line}").and_then(|()| self.out.flush())
            }
            Outcome::Fail { message } => {
                warn!(probe = probe.name, category = %probe.category, %message, "probe failed");
                writeln!(self.err, "{line}").and_then(|()| self.err.flush())
            }
        };
        if let Err(err) = written {
            warn!(error = %err, "failed to write result line");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ProbeContext;
    use crate::probe::{Category, ProbeResult};

    fn noop(_: &ProbeContext<'_>) -> ProbeResult {
        Ok(String::new())
    }

    #[test]
    fn test_lines_go_to_matching_stream() {
        let probe = Probe::new("HardLinkBasic", Category::Links, noop);
        let mut reporter = ConsoleReporter::new(Vec::new(), Vec::new());
        reporter.report(
            &probe,
            &Outcome::Pass {
                details: "link=b.txt".to_string(),
            },
        );
        reporter.report(
            &probe,
            &Outcome::Fail {
                message: "CreateHardLink failed unexpectedly: not found".to_string(),
            },
        );

        let (out, err) = reporter.into_inner();
        assert_eq!(String::from_utf8(out).unwrap(), "[OK] HardLinkBasic link=b.txt\n");
        assert_eq!(
            String::from_utf8(err).unwrap(),
            "[FAIL] HardLinkBasic: CreateHardLink failed unexpectedly: not found\n"
        );
    }

    #[test]
    fn test_pass_without_details() {
        let probe = Probe::new("DeleteBasic", Category::Delete, noop);
        let line = format_line(
            &probe,
            &Outcome::Pass {
                details: String::new(),
            },
        );
        assert_eq!(line, "[OK] DeleteBasic");
    }
}

//! Probe identity, outcomes, and the failure vocabulary probes report with.

use std::fmt;
use std::str::FromStr;

use fsconform_core::{ErrorKind, FsError, FsResult};
use serde::{Deserialize, Serialize};

use crate::context::ProbeContext;

/// Probe groups, in reporting order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Creation,
    Links,
    Directories,
    Copy,
    Move,
    Delete,
    Attributes,
    Truncation,
    HandleInformation,
    AllocationSize,
    FreeSpace,
    ReadWrite,
    Enumeration,
    Locking,
}

impl Category {
    pub const ALL: [Category; 14] = [
        Category::Creation,
        Category::Links,
        Category::Directories,
        Category::Copy,
        Category::Move,
        Category::Delete,
        Category::Attributes,
        Category::Truncation,
        Category::HandleInformation,
        Category::AllocationSize,
        Category::FreeSpace,
        Category::ReadWrite,
        Category::Enumeration,
        Category::Locking,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Creation => "creation",
            Category::Links => "links",
            Category::Directories => "directories",
            Category::Copy => "copy",
            Category::Move => "move",
            Category::Delete => "delete",
            Category::Attributes => "attributes",
            Category::Truncation => "truncation",
            Category::HandleInformation => "handle-information",
            Category::AllocationSize => "allocation-size",
            Category::FreeSpace => "free-space",
            Category::ReadWrite => "read-write",
            Category::Enumeration => "enumeration",
            Category::Locking => "locking",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let known: Vec<_> = Category::ALL.iter().map(|c| c.as_str()).collect();
                format!("unknown category '{s}' (expected one of: {})", known.join(", "))
            })
    }
}

/// What a probe body returns: a parameter summary on success.
pub type ProbeResult = Result<String, ProbeFailure>;

/// Probe body. It owns the context for its whole run.
pub type ProbeFn = fn(&ProbeContext<'_>) -> ProbeResult;

/// A named, independent behavioral check
#[derive(Clone, Copy)]
pub struct Probe {
    pub name: &'static str,
    pub category: Category,
    pub run: ProbeFn,
}

impl Probe {
    pub const fn new(name: &'static str, category: Category, run: ProbeFn) -> Self {
        Self {
            name,
            category,
            run,
        }
    }
}

impl fmt::Debug for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Probe")
            .field("name", &self.name)
            .field("category", &self.category)
            .finish()
    }
}

/// Result of one probe invocation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Pass { details: String },
    Fail { message: String },
}

impl Outcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, Outcome::Pass { .. })
    }
}

impl From<ProbeResult> for Outcome {
    fn from(result: ProbeResult) -> Self {
        match result {
            Ok(details) => Outcome::Pass { details },
            Err(failure) => Outcome::Fail {
                message: failure.to_string(),
            },
        }
    }
}

/// Why a probe did not pass
#[derive(thiserror::Error, Debug)]
pub enum ProbeFailure {
    #[error("could not prepare working directory: {0}")]
    Context(#[source] FsError),
    #[error("setup step '{step}' failed: {source}")]
    Setup { step: String, source: FsError },
    #[error("{op} failed unexpectedly: {source}")]
    Operation { op: String, source: FsError },
    #[error("{op} succeeded, expected {expected}")]
    UnexpectedSuccess { op: String, expected: String },
    #[error("{op} failed with {observed}, expected {expected}")]
    WrongError {
        op: String,
        expected: String,
        observed: ErrorKind,
    },
    #[error("{what}: expected {expected}, observed {observed}")]
    Mismatch {
        what: String,
        expected: String,
        observed: String,
    },
}

impl ProbeFailure {
    /// Failures caused by a condition that may clear up, such as a sharing violation.
    pub fn is_transient(&self) -> bool {
        match self {
            ProbeFailure::Context(source)
            | ProbeFailure::Setup { source, .. }
            | ProbeFailure::Operation { source, .. } => source.is_transient(),
            ProbeFailure::WrongError { observed, .. } => *observed == ErrorKind::Busy,
            ProbeFailure::UnexpectedSuccess { .. } | ProbeFailure::Mismatch { .. } => false,
        }
    }

    pub fn mismatch(
        what: impl Into<String>,
        expected: impl fmt::Display,
        observed: impl fmt::Display,
    ) -> Self {
        ProbeFailure::Mismatch {
            what: what.into(),
            expected: expected.to_string(),
            observed: observed.to_string(),
        }
    }
}

/// Attach probe phase information to oracle results.
pub trait ProbeResultExt<T> {
    /// A failure while establishing preconditions or reading back state.
    fn setup(self, step: &str) -> Result<T, ProbeFailure>;
    /// A failure of the operation under test.
    fn op(self, op: &str) -> Result<T, ProbeFailure>;
}

impl<T> ProbeResultExt<T> for FsResult<T> {
    fn setup(self, step: &str) -> Result<T, ProbeFailure> {
        self.map_err(|source| ProbeFailure::Setup {
            step: step.to_string(),
            source,
        })
    }

    fn op(self, op: &str) -> Result<T, ProbeFailure> {
        self.map_err(|source| ProbeFailure::Operation {
            op: op.to_string(),
            source,
        })
    }
}

fn describe_kinds(expected: &[ErrorKind]) -> String {
    if expected.is_empty() {
        return "a failure".to_string();
    }
    expected
        .iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(" or ")
}

/// Require `result` to fail with one of `expected` (any failure when empty).
pub fn expect_failure<T>(
    result: FsResult<T>,
    op: &str,
    expected: &[ErrorKind],
) -> Result<ErrorKind, ProbeFailure> {
    match result {
        Ok(_) => Err(ProbeFailure::UnexpectedSuccess {
            op: op.to_string(),
            expected: describe_kinds(expected),
        }),
        Err(err) => {
            let observed = err.kind();
            if expected.is_empty() || expected.contains(&observed) {
                Ok(observed)
            } else {
                Err(ProbeFailure::WrongError {
                    op: op.to_string(),
                    expected: describe_kinds(expected),
                    observed,
                })
            }
        }
    }
}

/// Require a condition, describing the expectation otherwise.
pub fn check(
    condition: bool,
    what: &str,
    expected: impl fmt::Display,
    observed: impl fmt::Display,
) -> Result<(), ProbeFailure> {
    if condition {
        Ok(())
    } else {
        Err(ProbeFailure::mismatch(what, expected, observed))
    }
}

pub fn check_eq<T>(what: &str, expected: T, observed: T) -> Result<(), ProbeFailure>
where
    T: PartialEq + fmt::Debug,
{
    if expected == observed {
        Ok(())
    } else {
        Err(ProbeFailure::mismatch(
            what,
            format!("{expected:?}"),
            format!("{observed:?}"),
        ))
    }
}

/// Compare file content, rendering short buffers as text.
pub fn check_bytes(what: &str, expected: &[u8], observed: &[u8]) -> Result<(), ProbeFailure> {
    if expected == observed {
        return Ok(());
    }
    let render = |bytes: &[u8]| {
        if bytes.len() <= 64 {
            format!("{:?}", String::from_utf8_lossy(bytes))
        } else {
            format!("{} bytes", bytes.len())
        }
    };
    Err(ProbeFailure::mismatch(what, render(expected), render(observed)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse_round_trip() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>().unwrap(), category);
        }
        assert!("bogus".parse::<Category>().is_err());
    }

    #[test]
    fn test_expect_failure_classifies() {
        let ok: FsResult<()> = Ok(());
        let err = expect_failure(ok, "DeleteFile", &[ErrorKind::NotFound]).unwrap_err();
        assert_eq!(err.to_string(), "DeleteFile succeeded, expected NotFound");

        let wrong: FsResult<()> = Err(FsError::AccessDenied);
        let err = expect_failure(wrong, "DeleteFile", &[ErrorKind::NotFound, ErrorKind::NotEmpty])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "DeleteFile failed with AccessDenied, expected NotFound or NotEmpty"
        );

        let any: FsResult<()> = Err(FsError::InvalidName);
        assert_eq!(expect_failure(any, "op", &[]).unwrap(), ErrorKind::InvalidName);
    }

    #[test]
    fn test_transient_failures() {
        let busy: FsResult<()> = Err(FsError::Busy);
        assert!(busy.setup("open").unwrap_err().is_transient());
        assert!(!ProbeFailure::mismatch("size", 1, 2).is_transient());
    }

    #[test]
    fn test_check_bytes_message() {
        let err = check_bytes("content", b"abc", b"abd").unwrap_err();
        assert_eq!(err.to_string(), "content: expected \"abc\", observed \"abd\"");
    }
}

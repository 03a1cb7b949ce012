//! Harness configuration

use serde::{Deserialize, Serialize};

use crate::probe::Category;
use crate::runner::{RunSummary, SettlePolicy};

/// How the process exit code reflects the run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExitPolicy {
    /// 0 when every probe passed, 1 otherwise.
    #[default]
    NonZeroOnFailure,
    /// Always 0; failures are visible in the log only.
    AlwaysZero,
}

impl ExitPolicy {
    pub fn exit_code(self, summary: &RunSummary) -> i32 {
        match self {
            ExitPolicy::AlwaysZero => 0,
            ExitPolicy::NonZeroOnFailure if summary.failed > 0 => 1,
            ExitPolicy::NonZeroOnFailure => 0,
        }
    }
}

/// Run-level settings
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub settle: SettlePolicy,
    /// Categories to run; empty selects all of them.
    pub categories: Vec<Category>,
    pub exit_policy: ExitPolicy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: HarnessConfig =
            serde_json::from_str(r#"{ "categories": ["locking", "free-space"] }"#).unwrap();
        assert_eq!(config.categories, vec![Category::Locking, Category::FreeSpace]);
        assert_eq!(config.settle, SettlePolicy::default());
        assert_eq!(config.exit_policy, ExitPolicy::NonZeroOnFailure);
    }

    #[test]
    fn test_exit_codes() {
        let failing = RunSummary {
            passed: 3,
            failed: 1,
            results: Vec::new(),
        };
        let clean = RunSummary {
            passed: 4,
            failed: 0,
            results: Vec::new(),
        };
        assert_eq!(ExitPolicy::NonZeroOnFailure.exit_code(&failing), 1);
        assert_eq!(ExitPolicy::NonZeroOnFailure.exit_code(&clean), 0);
        assert_eq!(ExitPolicy::AlwaysZero.exit_code(&failing), 0);
    }
}

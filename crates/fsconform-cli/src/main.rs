//! fsconform — file-system conformance probe runner
//!
//! Runs the built-in probe library against a directory on the host file
//! system (or an in-memory reference volume) and prints one result line per
//! probe: `[OK] ...` on stdout, `[FAIL] ...` on stderr.

#[cfg(target_os = "linux")]
mod native;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use fsconform_core::{FsConfig, FsError, FsOracle, MemoryFs};
use fsconform_harness::{Category, ConsoleReporter, ExitPolicy, HarnessConfig, Registry, Runner};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// The host file system
    Native,
    /// The in-memory reference volume
    Memory,
}

#[derive(Parser, Debug)]
#[command(name = "fsconform", version)]
#[command(about = "Behavioral conformance probes for file-system implementations")]
struct Args {
    /// Directory the probes run under; created if missing
    #[arg(required_unless_present = "list")]
    root: Option<PathBuf>,

    /// File system to probe
    #[arg(long, value_enum, default_value_t = Backend::Native)]
    backend: Backend,

    /// Configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Pause before each probe, in milliseconds
    #[arg(long, value_name = "MS")]
    settle_ms: Option<u64>,

    /// Run only this category (repeatable)
    #[arg(long = "category", value_name = "NAME")]
    categories: Vec<Category>,

    /// Print the probe registry and exit
    #[arg(long)]
    list: bool,

    /// Exit 0 even when probes fail
    #[arg(long)]
    compat_exit_zero: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Configuration file layout
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CliConfig {
    harness: HarnessConfig,
    /// Geometry and limits of `--backend memory`.
    memory_volume: FsConfig,
}

fn load_config(config_path: Option<PathBuf>) -> Result<CliConfig> {
    match config_path {
        Some(path) => {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("cannot read config {}", path.display()))?;
            let config: CliConfig = serde_json::from_str(&content)
                .with_context(|| format!("invalid config {}", path.display()))?;
            Ok(config)
        }
        None => Ok(CliConfig::default()),
    }
}

/// Command-line flags win over file values.
fn apply_overrides(config: &mut HarnessConfig, args: &Args) {
    if let Some(delay_ms) = args.settle_ms {
        config.settle.delay_ms = delay_ms;
    }
    if !args.categories.is_empty() {
        config.categories = args.categories.clone();
    }
    if args.compat_exit_zero {
        config.exit_policy = ExitPolicy::AlwaysZero;
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "fsconform=debug" } else { "fsconform=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Create `root` and any missing ancestors.
fn ensure_root(oracle: &dyn FsOracle, root: &Path) -> Result<(), FsError> {
    let mut missing: Vec<&Path> = root
        .ancestors()
        .filter(|p| !p.as_os_str().is_empty())
        .take_while(|p| !oracle.exists(p))
        .collect();
    missing.reverse();
    for dir in missing {
        match oracle.create_directory(dir) {
            Ok(()) | Err(FsError::AlreadyExists) => {}
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

fn run(
    oracle: &dyn FsOracle,
    root: &Path,
    registry: &Registry,
    config: &HarnessConfig,
) -> Result<i32> {
    ensure_root(oracle, root)
        .with_context(|| format!("cannot prepare root {}", root.display()))?;
    let runner = Runner::new(oracle, root).with_policy(config.settle);
    let mut reporter = ConsoleReporter::stdio();
    let summary = runner.run(registry, &mut reporter);
    Ok(config.exit_policy.exit_code(&summary))
}

#[cfg(target_os = "linux")]
fn run_native(root: &Path, registry: &Registry, config: &HarnessConfig) -> Result<i32> {
    let oracle = native::NativeFs::new();
    run(&oracle, root, registry, config)
}

#[cfg(not(target_os = "linux"))]
fn run_native(_root: &Path, _registry: &Registry, _config: &HarnessConfig) -> Result<i32> {
    anyhow::bail!("the native backend is only available on Linux; use --backend memory")
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = load_config(args.config.clone())?;
    apply_overrides(&mut config.harness, &args);
    let registry = Registry::standard().only(&config.harness.categories);

    if args.list {
        for probe in registry.iter() {
            println!("{}\t{}", probe.category, probe.name);
        }
        return Ok(());
    }

    let root = args.root.context("a target root is required")?;
    let code = match args.backend {
        Backend::Native => run_native(&root, &registry, &config.harness)?,
        Backend::Memory => {
            let oracle = MemoryFs::new(config.memory_volume);
            run(&oracle, &root, &registry, &config.harness)?
        }
    };
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};
    use tempfile::NamedTempFile;

    #[derive(Clone, Default)]
    struct SharedLog(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedLog {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_config_loading_default() {
        let config = load_config(None).unwrap();
        assert_eq!(config.harness, HarnessConfig::default());
        assert_eq!(config.harness.settle.delay_ms, 0);
        assert_eq!(config.memory_volume.volume.total_clusters, 262_144);
    }

    #[test]
    fn test_config_loading_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        let config_json = r#"{
            "harness": {
                "settle": { "delay_ms": 1000, "max_retries": 0 },
                "categories": ["locking", "read-write"],
                "exit_policy": "always-zero"
            },
            "memory_volume": {
                "case_sensitivity": "Sensitive",
                "volume": {
                    "bytes_per_sector": 512,
                    "sectors_per_cluster": 1,
                    "total_clusters": 4096
                },
                "limits": {
                    "max_open_handles": 64,
                    "max_symlink_depth": 8
                }
            }
        }"#;
        temp_file.write_all(config_json.as_bytes()).unwrap();

        let config = load_config(Some(temp_file.path().to_path_buf())).unwrap();
        assert_eq!(config.harness.settle.delay_ms, 1000);
        assert_eq!(config.harness.settle.max_retries, 0);
        assert_eq!(config.harness.settle.backoff_ms, 50);
        assert_eq!(
            config.harness.categories,
            vec![Category::Locking, Category::ReadWrite]
        );
        assert_eq!(config.harness.exit_policy, ExitPolicy::AlwaysZero);
        assert_eq!(config.memory_volume.volume.total_clusters, 4096);
    }

    #[test]
    fn test_config_rejects_malformed_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"{ not json").unwrap();
        assert!(load_config(Some(temp_file.path().to_path_buf())).is_err());
    }

    #[test]
    fn test_missing_root_is_a_usage_error() {
        let err = Args::try_parse_from(["fsconform"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        assert_eq!(err.exit_code(), 2);

        let args = Args::try_parse_from(["fsconform", "--list"]).unwrap();
        assert!(args.list);
        assert!(args.root.is_none());
    }

    #[test]
    fn test_flags_override_file_values() {
        let args = Args::try_parse_from([
            "fsconform",
            "/mnt/target",
            "--backend",
            "memory",
            "--settle-ms",
            "250",
            "--category",
            "locking",
            "--category",
            "delete",
            "--compat-exit-zero",
        ])
        .unwrap();
        assert_eq!(args.backend, Backend::Memory);

        let mut config = HarnessConfig::default();
        apply_overrides(&mut config, &args);
        assert_eq!(config.settle.delay_ms, 250);
        assert_eq!(config.categories, vec![Category::Locking, Category::Delete]);
        assert_eq!(config.exit_policy, ExitPolicy::AlwaysZero);
    }

    #[test]
    fn test_unknown_category_is_rejected() {
        let err = Args::try_parse_from(["fsconform", "/x", "--category", "bogus"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn test_ensure_root_creates_ancestors() {
        let oracle = MemoryFs::default();
        let root = Path::new("/deep/nested/root");
        ensure_root(&oracle, root).unwrap();
        assert!(oracle.exists(root));
        // Idempotent.
        ensure_root(&oracle, root).unwrap();
    }

    #[test]
    fn test_memory_run_exits_zero() {
        let oracle = MemoryFs::default();
        let registry = Registry::standard().only(&[Category::Creation, Category::Locking]);
        let code = run(&oracle, Path::new("/run"), &registry, &HarnessConfig::default()).unwrap();
        assert_eq!(code, 0);
        assert!(oracle.read_dir(Path::new("/run")).unwrap().is_empty());
    }

    #[test]
    fn test_run_announces_itself_once() {
        let log = SharedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let oracle = MemoryFs::default();
        let registry = Registry::standard().only(&[Category::Truncation]);
        let code = tracing::subscriber::with_default(subscriber, || {
            run(&oracle, Path::new("/run"), &registry, &HarnessConfig::default())
        })
        .unwrap();
        assert_eq!(code, 0);

        let output = String::from_utf8(log.0.lock().unwrap().clone()).unwrap();
        assert_eq!(output.matches("starting conformance run").count(), 1);
    }
}

//! The full probe library against the in-memory reference volume.

use std::path::Path;

use fsconform_core::{FsOracle, MemoryFs};
use fsconform_harness::{
    Category, ConsoleReporter, Outcome, Registry, RunSummary, Runner, SettlePolicy,
};

fn run_all(fs: &MemoryFs, root: &Path) -> (RunSummary, String, String) {
    let runner = Runner::new(fs, root).with_policy(SettlePolicy {
        delay_ms: 0,
        max_retries: 0,
        backoff_ms: 0,
    });
    let mut reporter = ConsoleReporter::new(Vec::new(), Vec::new());
    let summary = runner.run(&Registry::standard(), &mut reporter);
    let (out, err) = reporter.into_inner();
    (
        summary,
        String::from_utf8(out).unwrap(),
        String::from_utf8(err).unwrap(),
    )
}

fn volume() -> MemoryFs {
    let fs = MemoryFs::default();
    fs.create_directory(Path::new("/vol")).unwrap();
    fs
}

#[test]
fn test_every_probe_passes_on_memory_volume() {
    let fs = volume();
    let (summary, out, err) = run_all(&fs, Path::new("/vol"));

    let failures: Vec<String> = summary
        .failures()
        .map(|r| format!("{}: {:?}", r.name, r.outcome))
        .collect();
    assert!(failures.is_empty(), "failing probes:\n{}", failures.join("\n"));
    assert!(err.is_empty(), "unexpected failure lines:\n{err}");

    assert_eq!(summary.passed, Registry::standard().len());
    assert_eq!(out.lines().count(), summary.passed);
    assert!(out.lines().all(|line| line.starts_with("[OK] ")));
}

#[test]
fn test_run_leaves_volume_clean() {
    let fs = volume();
    run_all(&fs, Path::new("/vol"));

    assert!(fs.read_dir(Path::new("/vol")).unwrap().is_empty());
    assert_eq!(fs.open_handle_count(), 0);
    assert_eq!(fs.lock_count(), 0);
}

#[test]
fn test_repeated_runs_agree() {
    let fs = volume();
    let (first, _, _) = run_all(&fs, Path::new("/vol"));
    let (second, _, _) = run_all(&fs, Path::new("/vol"));

    let verdicts = |s: &RunSummary| -> Vec<(&'static str, Category, bool)> {
        s.results
            .iter()
            .map(|r| (r.name, r.category, r.outcome.is_pass()))
            .collect()
    };
    assert_eq!(verdicts(&first), verdicts(&second));
}

#[test]
fn test_category_filter_runs_subset() {
    let fs = volume();
    let registry = Registry::standard().only(&[Category::Locking]);
    let mut reporter = ConsoleReporter::new(Vec::new(), Vec::new());
    let summary = Runner::new(&fs, "/vol").run(&registry, &mut reporter);

    assert_eq!(summary.results.len(), registry.len());
    assert!(summary.results.iter().all(|r| r.category == Category::Locking));
    assert!(summary.all_passed());
    let (out, _) = reporter.into_inner();
    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("[OK] LockFileBasicExclusive"));
}

#[test]
fn test_outcomes_are_in_registry_order() {
    let fs = volume();
    let (summary, out, _) = run_all(&fs, Path::new("/vol"));
    let names: Vec<&str> = Registry::standard().iter().map(|p| p.name).collect();
    let ran: Vec<&str> = summary.results.iter().map(|r| r.name).collect();
    assert_eq!(names, ran);

    let first_line = out.lines().next().unwrap();
    assert!(first_line.starts_with(&format!("[OK] {}", names[0])));
    assert!(matches!(summary.results[0].outcome, Outcome::Pass { .. }));
}

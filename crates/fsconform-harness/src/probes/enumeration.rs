//! Pattern enumeration and recursive traversal.

use std::path::Path;

use fsconform_core::{CaseSensitivity, DirEntry, ErrorKind, FileAttributes, NamePattern};

use super::{mkdir, touch, Step};
use crate::context::ProbeContext;
use crate::probe::{check, check_eq, expect_failure, Category, Probe, ProbeResult, ProbeResultExt};
use crate::traverse::walk;

pub fn probes() -> Vec<Probe> {
    use Category::Enumeration;
    vec![
        Probe::new("EnumerateExactMatch", Enumeration, enumerate_exact_match),
        Probe::new("EnumerateWildcardMatch", Enumeration, enumerate_wildcard_match),
        Probe::new("EnumerateExtensionMatch", Enumeration, enumerate_extension_match),
        Probe::new("EnumerateNonexistentFails", Enumeration, enumerate_nonexistent_fails),
        Probe::new(
            "EnumerateHiddenFileVisibleByName",
            Enumeration,
            enumerate_hidden_file_visible_by_name,
        ),
        Probe::new("EnumerateDirectoryExactMatch", Enumeration, enumerate_directory_exact_match),
        Probe::new("EnumerateDirectoryWildcard", Enumeration, enumerate_directory_wildcard),
        Probe::new(
            "EnumerateDirectoryHiddenAttribute",
            Enumeration,
            enumerate_directory_hidden_attribute,
        ),
        Probe::new("EnumerateDirectorySubdirs", Enumeration, enumerate_directory_subdirs),
        Probe::new("EnumerateDirectoryDotDot", Enumeration, enumerate_directory_dot_dot),
        Probe::new("EnumerateRecursiveFiles", Enumeration, enumerate_recursive_files),
        Probe::new("EnumerateRecursiveDirectories", Enumeration, enumerate_recursive_directories),
        Probe::new("EnumerateQuestionMarkWildcard", Enumeration, enumerate_question_mark_wildcard),
        Probe::new(
            "EnumerateMissingDirectoryFails",
            Enumeration,
            enumerate_missing_directory_fails,
        ),
    ]
}

fn find(ctx: &ProbeContext<'_>, pattern: &Path) -> Step<Vec<DirEntry>> {
    ctx.oracle().enumerate(pattern).op("FindFirstFile")
}

/// Sorted names, without the `.` and `..` pseudo-entries.
fn real_names(entries: &[DirEntry]) -> Vec<String> {
    let mut names: Vec<String> = entries
        .iter()
        .filter(|e| !e.is_dot_entry())
        .map(|e| e.name.clone())
        .collect();
    names.sort();
    names
}

fn enumerate_exact_match(ctx: &ProbeContext<'_>) -> ProbeResult {
    touch(ctx, &ctx.path("target.txt"))?;
    touch(ctx, &ctx.path("other.txt"))?;

    let entries = find(ctx, &ctx.path("target.txt"))?;
    check_eq("matches", vec!["target.txt".to_string()], real_names(&entries))?;
    check_eq("entry count", 1, entries.len())?;
    Ok("pattern=target.txt".to_string())
}

fn enumerate_wildcard_match(ctx: &ProbeContext<'_>) -> ProbeResult {
    touch(ctx, &ctx.path("a.txt"))?;
    touch(ctx, &ctx.path("b.log"))?;

    let entries = find(ctx, &ctx.path("*"))?;
    check_eq(
        "matches",
        vec!["a.txt".to_string(), "b.log".to_string()],
        real_names(&entries),
    )?;
    Ok(format!("pattern=* entries={}", entries.len()))
}

fn enumerate_extension_match(ctx: &ProbeContext<'_>) -> ProbeResult {
    for name in ["a.txt", "b.txt", "c.log"] {
        touch(ctx, &ctx.path(name))?;
    }

    let entries = find(ctx, &ctx.path("*.txt"))?;
    check_eq(
        "matches",
        vec!["a.txt".to_string(), "b.txt".to_string()],
        real_names(&entries),
    )?;
    Ok("pattern=*.txt".to_string())
}

fn enumerate_nonexistent_fails(ctx: &ProbeContext<'_>) -> ProbeResult {
    touch(ctx, &ctx.path("present.txt"))?;
    expect_failure(
        ctx.oracle().enumerate(&ctx.path("nothing*.xyz")),
        "FindFirstFile with no match",
        &[ErrorKind::NotFound],
    )?;
    Ok("pattern=nothing*.xyz".to_string())
}

fn enumerate_hidden_file_visible_by_name(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("secret.txt");
    touch(ctx, &path)?;
    ctx.oracle()
        .set_attributes(&path, FileAttributes::HIDDEN)
        .setup("set Hidden")?;

    let entries = find(ctx, &path)?;
    check_eq("matches", vec!["secret.txt".to_string()], real_names(&entries))?;
    let attrs = entries[0].attributes;
    check(
        attrs.contains(FileAttributes::HIDDEN),
        "entry attributes",
        "Hidden",
        attrs,
    )?;
    Ok("pattern=secret.txt".to_string())
}

fn enumerate_directory_exact_match(ctx: &ProbeContext<'_>) -> ProbeResult {
    mkdir(ctx, &ctx.path("subdir"))?;

    let entries = find(ctx, &ctx.path("subdir"))?;
    check_eq("entry count", 1, entries.len())?;
    check(entries[0].is_dir(), "entry", "a directory", entries[0].attributes)?;
    Ok("pattern=subdir".to_string())
}

fn enumerate_directory_wildcard(ctx: &ProbeContext<'_>) -> ProbeResult {
    mkdir(ctx, &ctx.path("d1"))?;
    mkdir(ctx, &ctx.path("d2"))?;
    touch(ctx, &ctx.path("f.txt"))?;

    let entries = find(ctx, &ctx.path("*"))?;
    let dirs: Vec<DirEntry> = entries
        .into_iter()
        .filter(|e| e.is_dir() && !e.is_dot_entry())
        .collect();
    check_eq(
        "directories",
        vec!["d1".to_string(), "d2".to_string()],
        real_names(&dirs),
    )?;
    Ok("directories=2".to_string())
}

fn enumerate_directory_hidden_attribute(ctx: &ProbeContext<'_>) -> ProbeResult {
    let hidden = ctx.path("hidden_dir");
    mkdir(ctx, &hidden)?;
    mkdir(ctx, &ctx.path("shown_dir"))?;
    ctx.oracle()
        .set_attributes(&hidden, FileAttributes::HIDDEN)
        .setup("set Hidden")?;

    let entries = find(ctx, &ctx.path("*"))?;
    check_eq(
        "wildcard matches",
        vec!["shown_dir".to_string()],
        real_names(&entries),
    )?;
    let exact = find(ctx, &hidden)?;
    check_eq("exact-name matches", 1, exact.len())?;
    Ok("dir=hidden_dir".to_string())
}

fn enumerate_directory_subdirs(ctx: &ProbeContext<'_>) -> ProbeResult {
    let parent = ctx.path("parent");
    mkdir(ctx, &parent)?;
    mkdir(ctx, &parent.join("child1"))?;
    mkdir(ctx, &parent.join("child2"))?;

    let entries = find(ctx, &parent.join("*"))?;
    check_eq(
        "children",
        vec!["child1".to_string(), "child2".to_string()],
        real_names(&entries),
    )?;
    Ok("parent=parent children=2".to_string())
}

fn enumerate_directory_dot_dot(ctx: &ProbeContext<'_>) -> ProbeResult {
    let dir = ctx.path("empty");
    mkdir(ctx, &dir)?;

    let entries = find(ctx, &dir.join("*"))?;
    let mut names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    names.sort_unstable();
    check_eq("entries of empty directory", vec![".", ".."], names)?;
    Ok("entries=.,..".to_string())
}

fn build_tree(ctx: &ProbeContext<'_>) -> Step<()> {
    for dir in ["tree", "tree/a", "tree/a/b", "tree/c"] {
        mkdir(ctx, &ctx.path(dir))?;
    }
    for file in ["tree/top.txt", "tree/a/b/deep.txt", "tree/c/notes.log"] {
        touch(ctx, &ctx.path(file))?;
    }
    Ok(())
}

fn txt_pattern() -> Step<NamePattern> {
    NamePattern::new("*.txt", CaseSensitivity::InsensitivePreserving).setup("compile pattern")
}

fn enumerate_recursive_files(ctx: &ProbeContext<'_>) -> ProbeResult {
    build_tree(ctx)?;
    let found = walk(ctx.oracle(), &ctx.path("tree"), &txt_pattern()?).op("recursive enumeration")?;

    let mut files: Vec<String> = found
        .files
        .iter()
        .filter_map(|p| p.strip_prefix(ctx.path("tree")).ok())
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .collect();
    files.sort();
    check_eq(
        "matching files",
        vec!["a/b/deep.txt".to_string(), "top.txt".to_string()],
        files,
    )?;
    Ok(format!("files={}", found.files.len()))
}

fn enumerate_recursive_directories(ctx: &ProbeContext<'_>) -> ProbeResult {
    build_tree(ctx)?;
    let found = walk(ctx.oracle(), &ctx.path("tree"), &txt_pattern()?).op("recursive enumeration")?;
    check_eq("directory count", 3, found.directories.len())?;
    Ok(format!("directories={}", found.directories.len()))
}

fn enumerate_question_mark_wildcard(ctx: &ProbeContext<'_>) -> ProbeResult {
    for name in ["file1.txt", "file2.txt", "file10.txt"] {
        touch(ctx, &ctx.path(name))?;
    }

    let entries = find(ctx, &ctx.path("file?.txt"))?;
    check_eq(
        "matches",
        vec!["file1.txt".to_string(), "file2.txt".to_string()],
        real_names(&entries),
    )?;
    Ok("pattern=file?.txt".to_string())
}

fn enumerate_missing_directory_fails(ctx: &ProbeContext<'_>) -> ProbeResult {
    expect_failure(
        ctx.oracle().enumerate(&ctx.path("missing/*")),
        "FindFirstFile in missing directory",
        &[ErrorKind::NotFound],
    )?;
    Ok("pattern=missing/*".to_string())
}

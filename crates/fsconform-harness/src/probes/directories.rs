//! Directory creation and removal.

use fsconform_core::{ErrorKind, FileAttributes};

use super::{attributes_of, mkdir, touch};
use crate::context::ProbeContext;
use crate::probe::{check, expect_failure, Category, Probe, ProbeResult, ProbeResultExt};

pub fn probes() -> Vec<Probe> {
    use Category::Directories;
    vec![
        Probe::new("CreateDirectoryBasic", Directories, create_directory_basic),
        Probe::new("CreateDirectoryAlreadyExists", Directories, create_directory_already_exists),
        Probe::new(
            "CreateDirectoryWithSubdirectories",
            Directories,
            create_directory_with_subdirectories,
        ),
        Probe::new(
            "CreateDirectoryMissingParentFails",
            Directories,
            create_directory_missing_parent_fails,
        ),
        Probe::new("CreateDirectoryInvalidPath", Directories, create_directory_invalid_path),
        Probe::new("CreateDirectoryRelativePath", Directories, create_directory_relative_path),
        Probe::new("CreateDirectoryOverFileFails", Directories, create_directory_over_file_fails),
        Probe::new("RemoveDirectoryBasic", Directories, remove_directory_basic),
        Probe::new("RemoveDirectoryNonEmpty", Directories, remove_directory_non_empty),
        Probe::new("RemoveDirectoryRelativePath", Directories, remove_directory_relative_path),
        Probe::new("RemoveDirectoryNotExist", Directories, remove_directory_not_exist),
        Probe::new(
            "RemoveDirectoryWithTrailingSlash",
            Directories,
            remove_directory_with_trailing_slash,
        ),
        Probe::new(
            "RemoveDirectoryHasSubdirectory",
            Directories,
            remove_directory_has_subdirectory,
        ),
        Probe::new(
            "RemoveDirectorySubdirectoryOfParent",
            Directories,
            remove_directory_subdirectory_of_parent,
        ),
        Probe::new("RemoveDirectoryOnFileFails", Directories, remove_directory_on_file_fails),
    ]
}

fn create_directory_basic(ctx: &ProbeContext<'_>) -> ProbeResult {
    let dir = ctx.path("newdir");
    ctx.create_dir(&dir).op("CreateDirectory")?;
    let attrs = attributes_of(ctx, &dir)?;
    check(
        attrs.contains(FileAttributes::DIRECTORY),
        "attributes",
        "Directory",
        attrs,
    )?;
    Ok("dir=newdir".to_string())
}

fn create_directory_already_exists(ctx: &ProbeContext<'_>) -> ProbeResult {
    let dir = ctx.path("dup");
    mkdir(ctx, &dir)?;
    expect_failure(
        ctx.create_dir(&dir),
        "CreateDirectory on existing directory",
        &[ErrorKind::AlreadyExists],
    )?;
    Ok("dir=dup".to_string())
}

fn create_directory_with_subdirectories(ctx: &ProbeContext<'_>) -> ProbeResult {
    let levels = ["a", "a/b", "a/b/c"];
    for level in levels {
        ctx.create_dir(&ctx.path(level)).op("CreateDirectory")?;
    }
    for level in levels {
        check(
            ctx.oracle().exists(&ctx.path(level)),
            level,
            "present",
            "absent",
        )?;
    }
    Ok("depth=3".to_string())
}

fn create_directory_missing_parent_fails(ctx: &ProbeContext<'_>) -> ProbeResult {
    expect_failure(
        ctx.create_dir(&ctx.path("missing/child")),
        "CreateDirectory below missing parent",
        &[ErrorKind::NotFound],
    )?;
    check(
        !ctx.oracle().exists(&ctx.path("missing")),
        "ancestor",
        "not created implicitly",
        "created",
    )?;
    Ok("dir=missing/child".to_string())
}

fn create_directory_invalid_path(ctx: &ProbeContext<'_>) -> ProbeResult {
    let observed = expect_failure(
        ctx.create_dir(&ctx.path("dir/?:/invalid/path")),
        "CreateDirectory with malformed path",
        &[ErrorKind::NotFound, ErrorKind::InvalidName],
    )?;
    Ok(format!("error={observed}"))
}

fn create_directory_relative_path(ctx: &ProbeContext<'_>) -> ProbeResult {
    mkdir(ctx, &ctx.path("anchor"))?;
    ctx.create_dir(&ctx.path("anchor/../newdir"))
        .op("CreateDirectory via dot-dot")?;
    check(
        ctx.oracle().exists(&ctx.path("newdir")),
        "newdir beside anchor",
        "present",
        "absent",
    )?;
    check(
        !ctx.oracle().exists(&ctx.path("anchor/newdir")),
        "newdir inside anchor",
        "absent",
        "present",
    )?;
    Ok("path=anchor/../newdir".to_string())
}

fn create_directory_over_file_fails(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("taken");
    touch(ctx, &path)?;
    expect_failure(
        ctx.create_dir(&path),
        "CreateDirectory over file",
        &[ErrorKind::AlreadyExists],
    )?;
    Ok("path=taken".to_string())
}

fn remove_directory_basic(ctx: &ProbeContext<'_>) -> ProbeResult {
    let dir = ctx.path("victim");
    mkdir(ctx, &dir)?;
    ctx.oracle().remove_directory(&dir).op("RemoveDirectory")?;
    check(!ctx.oracle().exists(&dir), "directory", "absent", "present")?;
    Ok("dir=victim".to_string())
}

fn remove_directory_non_empty(ctx: &ProbeContext<'_>) -> ProbeResult {
    let dir = ctx.path("full");
    mkdir(ctx, &dir)?;
    touch(ctx, &dir.join("file.txt"))?;
    expect_failure(
        ctx.oracle().remove_directory(&dir),
        "RemoveDirectory on non-empty directory",
        &[ErrorKind::NotEmpty],
    )?;
    check(
        ctx.oracle().exists(&dir.join("file.txt")),
        "child",
        "present",
        "absent",
    )?;
    Ok("dir=full".to_string())
}

fn remove_directory_relative_path(ctx: &ProbeContext<'_>) -> ProbeResult {
    mkdir(ctx, &ctx.path("anchor"))?;
    mkdir(ctx, &ctx.path("victim"))?;
    ctx.oracle()
        .remove_directory(&ctx.path("anchor/../victim"))
        .op("RemoveDirectory via dot-dot")?;
    check(
        !ctx.oracle().exists(&ctx.path("victim")),
        "victim",
        "absent",
        "present",
    )?;
    check(
        ctx.oracle().exists(&ctx.path("anchor")),
        "anchor",
        "present",
        "absent",
    )?;
    Ok("path=anchor/../victim".to_string())
}

fn remove_directory_not_exist(ctx: &ProbeContext<'_>) -> ProbeResult {
    expect_failure(
        ctx.oracle().remove_directory(&ctx.path("ghost")),
        "RemoveDirectory on absent directory",
        &[ErrorKind::NotFound],
    )?;
    Ok("dir=ghost".to_string())
}

fn remove_directory_with_trailing_slash(ctx: &ProbeContext<'_>) -> ProbeResult {
    mkdir(ctx, &ctx.path("slashed"))?;
    ctx.oracle()
        .remove_directory(&ctx.path("slashed/"))
        .op("RemoveDirectory with trailing separator")?;
    check(
        !ctx.oracle().exists(&ctx.path("slashed")),
        "directory",
        "absent",
        "present",
    )?;
    Ok("path=slashed/".to_string())
}

fn remove_directory_has_subdirectory(ctx: &ProbeContext<'_>) -> ProbeResult {
    mkdir(ctx, &ctx.path("parent"))?;
    mkdir(ctx, &ctx.path("parent/child"))?;
    expect_failure(
        ctx.oracle().remove_directory(&ctx.path("parent")),
        "RemoveDirectory with subdirectory",
        &[ErrorKind::NotEmpty],
    )?;
    Ok("dir=parent".to_string())
}

fn remove_directory_subdirectory_of_parent(ctx: &ProbeContext<'_>) -> ProbeResult {
    mkdir(ctx, &ctx.path("parent"))?;
    mkdir(ctx, &ctx.path("parent/child"))?;
    ctx.oracle()
        .remove_directory(&ctx.path("parent/child"))
        .op("RemoveDirectory child")?;
    check(
        ctx.oracle().exists(&ctx.path("parent")),
        "parent after removing child",
        "present",
        "absent",
    )?;
    ctx.oracle()
        .remove_directory(&ctx.path("parent"))
        .op("RemoveDirectory emptied parent")?;
    Ok("order=child,parent".to_string())
}

fn remove_directory_on_file_fails(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("plain.txt");
    touch(ctx, &path)?;
    let observed = expect_failure(
        ctx.oracle().remove_directory(&path),
        "RemoveDirectory on file",
        &[ErrorKind::NotFound, ErrorKind::AccessDenied, ErrorKind::InvalidName],
    )?;
    check(ctx.oracle().exists(&path), "file", "present", "absent")?;
    Ok(format!("error={observed}"))
}

//! File copy.

use fsconform_core::{ErrorKind, FileAttributes};

use super::{attributes_of, mkdir, read_back, seed};
use crate::context::ProbeContext;
use crate::probe::{
    check, check_bytes, expect_failure, Category, Probe, ProbeResult, ProbeResultExt,
};

pub fn probes() -> Vec<Probe> {
    use Category::Copy;
    vec![
        Probe::new("CopyBasic", Copy, copy_basic),
        Probe::new("CopyFailIfExists", Copy, copy_fail_if_exists),
        Probe::new("CopyOverwriteAllowed", Copy, copy_overwrite_allowed),
        Probe::new("CopySourceMissing", Copy, copy_source_missing),
        Probe::new("CopySubdirToParent", Copy, copy_subdir_to_parent),
        Probe::new("CopyParentToSubdir", Copy, copy_parent_to_subdir),
        Probe::new("CopyFromSymbolicLink", Copy, copy_from_symbolic_link),
        Probe::new("CopyBreaksIdentity", Copy, copy_breaks_identity),
        Probe::new("CopyDirectoryFails", Copy, copy_directory_fails),
        Probe::new("CopyPreservesReadOnlyAttribute", Copy, copy_preserves_read_only_attribute),
    ]
}

fn copy_basic(ctx: &ProbeContext<'_>) -> ProbeResult {
    let src = ctx.path("source.txt");
    let dst = ctx.path("dest.txt");
    seed(ctx, &src, b"hello copy")?;

    ctx.oracle().copy(&src, &dst, true).op("CopyFile")?;
    check_bytes("destination content", b"hello copy", &read_back(ctx, &dst)?)?;
    check(ctx.oracle().exists(&src), "source", "present", "absent")?;
    Ok("src=source.txt dst=dest.txt".to_string())
}

fn copy_fail_if_exists(ctx: &ProbeContext<'_>) -> ProbeResult {
    let src = ctx.path("source.txt");
    let dst = ctx.path("dest.txt");
    seed(ctx, &src, b"new")?;
    seed(ctx, &dst, b"old")?;

    expect_failure(
        ctx.oracle().copy(&src, &dst, true),
        "CopyFile with failIfExists",
        &[ErrorKind::AlreadyExists],
    )?;
    check_bytes("destination content", b"old", &read_back(ctx, &dst)?)?;
    Ok("failIfExists=true".to_string())
}

fn copy_overwrite_allowed(ctx: &ProbeContext<'_>) -> ProbeResult {
    let src = ctx.path("source.txt");
    let dst = ctx.path("dest.txt");
    seed(ctx, &src, b"replacement")?;
    seed(ctx, &dst, b"old")?;

    ctx.oracle().copy(&src, &dst, false).op("CopyFile overwrite")?;
    check_bytes("destination content", b"replacement", &read_back(ctx, &dst)?)?;
    Ok("failIfExists=false".to_string())
}

fn copy_source_missing(ctx: &ProbeContext<'_>) -> ProbeResult {
    let dst = ctx.path("dest.txt");
    expect_failure(
        ctx.oracle().copy(&ctx.path("absent.txt"), &dst, false),
        "CopyFile from missing source",
        &[ErrorKind::NotFound],
    )?;
    check(!ctx.oracle().exists(&dst), "destination", "absent", "present")?;
    Ok("src=absent.txt".to_string())
}

fn copy_subdir_to_parent(ctx: &ProbeContext<'_>) -> ProbeResult {
    mkdir(ctx, &ctx.path("sub"))?;
    let src = ctx.path("sub/inner.txt");
    let dst = ctx.path("outer.txt");
    seed(ctx, &src, b"sub->parent")?;

    ctx.oracle().copy(&src, &dst, true).op("CopyFile to parent")?;
    check_bytes("destination content", b"sub->parent", &read_back(ctx, &dst)?)?;
    Ok("src=sub/inner.txt dst=outer.txt".to_string())
}

fn copy_parent_to_subdir(ctx: &ProbeContext<'_>) -> ProbeResult {
    mkdir(ctx, &ctx.path("sub"))?;
    let src = ctx.path("outer.txt");
    let dst = ctx.path("sub/inner.txt");
    seed(ctx, &src, b"0123456789")?;

    ctx.oracle().copy(&src, &dst, true).op("CopyFile to subdirectory")?;
    let size = ctx.oracle().size(&dst).setup("size")?;
    check(size == 10, "destination size", 10, size)?;
    check_bytes("destination content", b"0123456789", &read_back(ctx, &dst)?)?;
    Ok("src=outer.txt dst=sub/inner.txt".to_string())
}

fn copy_from_symbolic_link(ctx: &ProbeContext<'_>) -> ProbeResult {
    let target = ctx.path("target.txt");
    let link = ctx.path("link.txt");
    let dst = ctx.path("copy.txt");
    seed(ctx, &target, b"resolved content")?;
    ctx.oracle()
        .create_symbolic_link(&link, &target, false)
        .setup("create symbolic link")?;

    ctx.oracle().copy(&link, &dst, true).op("CopyFile from link")?;
    let attrs = attributes_of(ctx, &dst)?;
    check(
        !attrs.contains(FileAttributes::REPARSE_POINT),
        "copy attributes",
        "regular file",
        attrs,
    )?;
    check_bytes("copy content", b"resolved content", &read_back(ctx, &dst)?)?;
    Ok(format!("attributes={attrs}"))
}

fn copy_breaks_identity(ctx: &ProbeContext<'_>) -> ProbeResult {
    let src = ctx.path("source.txt");
    let dst = ctx.path("dest.txt");
    seed(ctx, &src, b"same bytes")?;
    ctx.oracle().copy(&src, &dst, true).setup("copy")?;

    let a = ctx.oracle().identity(&src).setup("identity of source")?;
    let b = ctx.oracle().identity(&dst).setup("identity of copy")?;
    check(a != b, "identity of copy", format!("different from {a}"), b)?;
    Ok(format!("src={a} dst={b}"))
}

fn copy_directory_fails(ctx: &ProbeContext<'_>) -> ProbeResult {
    let dir = ctx.path("dir");
    mkdir(ctx, &dir)?;
    let observed = expect_failure(
        ctx.oracle().copy(&dir, &ctx.path("dircopy"), true),
        "CopyFile on directory",
        &[ErrorKind::AccessDenied, ErrorKind::InvalidArgument],
    )?;
    Ok(format!("error={observed}"))
}

fn copy_preserves_read_only_attribute(ctx: &ProbeContext<'_>) -> ProbeResult {
    let src = ctx.path("source.txt");
    let dst = ctx.path("dest.txt");
    seed(ctx, &src, b"locked down")?;
    ctx.oracle()
        .set_attributes(&src, FileAttributes::READ_ONLY)
        .setup("set ReadOnly")?;

    ctx.oracle().copy(&src, &dst, true).op("CopyFile")?;
    let attrs = attributes_of(ctx, &dst)?;
    check(
        attrs.contains(FileAttributes::READ_ONLY),
        "copy attributes",
        "ReadOnly",
        attrs,
    )?;
    Ok(format!("attributes={attrs}"))
}

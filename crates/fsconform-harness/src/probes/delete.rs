//! File deletion.

use fsconform_core::{ErrorKind, FileAttributes};

use super::{mkdir, read_back, seed, touch};
use crate::context::ProbeContext;
use crate::probe::{
    check, check_bytes, expect_failure, Category, Probe, ProbeResult, ProbeResultExt,
};

pub fn probes() -> Vec<Probe> {
    use Category::Delete;
    vec![
        Probe::new("DeleteBasic", Delete, delete_basic),
        Probe::new("DeleteNotExists", Delete, delete_not_exists),
        Probe::new("DeleteReadOnlyFile", Delete, delete_read_only_file),
        Probe::new("DeleteOnDirectory", Delete, delete_on_directory),
        Probe::new("DeleteRelativePath", Delete, delete_relative_path),
        Probe::new("DeleteInSubdirectory", Delete, delete_in_subdirectory),
        Probe::new("DeleteSymbolicLinkKeepsTarget", Delete, delete_symbolic_link_keeps_target),
    ]
}

fn delete_basic(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("doomed.txt");
    seed(ctx, &path, b"bye")?;
    ctx.oracle().delete_file(&path).op("DeleteFile")?;
    check(!ctx.oracle().exists(&path), "file", "absent", "present")?;
    Ok("file=doomed.txt".to_string())
}

fn delete_not_exists(ctx: &ProbeContext<'_>) -> ProbeResult {
    expect_failure(
        ctx.oracle().delete_file(&ctx.path("ghost.txt")),
        "DeleteFile on absent file",
        &[ErrorKind::NotFound],
    )?;
    Ok("file=ghost.txt".to_string())
}

fn delete_read_only_file(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("protected.txt");
    touch(ctx, &path)?;
    ctx.oracle()
        .set_attributes(&path, FileAttributes::READ_ONLY)
        .setup("set ReadOnly")?;

    expect_failure(
        ctx.oracle().delete_file(&path),
        "DeleteFile on read-only file",
        &[ErrorKind::AccessDenied],
    )?;
    check(ctx.oracle().exists(&path), "file", "present", "absent")?;
    Ok("file=protected.txt".to_string())
}

fn delete_on_directory(ctx: &ProbeContext<'_>) -> ProbeResult {
    let dir = ctx.path("dir");
    mkdir(ctx, &dir)?;
    let observed = expect_failure(
        ctx.oracle().delete_file(&dir),
        "DeleteFile on directory",
        &[ErrorKind::AccessDenied, ErrorKind::NotFound],
    )?;
    check(ctx.oracle().exists(&dir), "directory", "present", "absent")?;
    Ok(format!("error={observed}"))
}

fn delete_relative_path(ctx: &ProbeContext<'_>) -> ProbeResult {
    mkdir(ctx, &ctx.path("anchor"))?;
    let victim = ctx.path("victim.txt");
    touch(ctx, &victim)?;

    ctx.oracle()
        .delete_file(&ctx.path("anchor/../victim.txt"))
        .op("DeleteFile via dot-dot")?;
    check(!ctx.oracle().exists(&victim), "file", "absent", "present")?;
    Ok("path=anchor/../victim.txt".to_string())
}

fn delete_in_subdirectory(ctx: &ProbeContext<'_>) -> ProbeResult {
    mkdir(ctx, &ctx.path("sub"))?;
    let doomed = ctx.path("sub/doomed.txt");
    let kept = ctx.path("sub/kept.txt");
    touch(ctx, &doomed)?;
    touch(ctx, &kept)?;

    ctx.oracle().delete_file(&doomed).op("DeleteFile in subdirectory")?;
    check(!ctx.oracle().exists(&doomed), "deleted file", "absent", "present")?;
    check(ctx.oracle().exists(&kept), "sibling", "present", "absent")?;
    Ok("file=sub/doomed.txt".to_string())
}

fn delete_symbolic_link_keeps_target(ctx: &ProbeContext<'_>) -> ProbeResult {
    let target = ctx.path("target.txt");
    let link = ctx.path("link.txt");
    seed(ctx, &target, b"still here")?;
    ctx.oracle()
        .create_symbolic_link(&link, &target, false)
        .setup("create symbolic link")?;

    ctx.oracle().delete_file(&link).op("DeleteFile on link")?;
    check(!ctx.oracle().exists(&link), "link", "absent", "present")?;
    check_bytes("target content", b"still here", &read_back(ctx, &target)?)?;
    Ok("link=link.txt".to_string())
}

//! Hard and symbolic links.

use fsconform_core::{Access, Disposition, ErrorKind, FileAttributes};

use super::{attributes_of, mkdir, open_rw, read_back, seed, touch};
use crate::context::ProbeContext;
use crate::probe::{
    check, check_bytes, check_eq, expect_failure, Category, Probe, ProbeResult, ProbeResultExt,
};

pub fn probes() -> Vec<Probe> {
    use Category::Links;
    vec![
        Probe::new("HardLinkBasic", Links, hard_link_basic),
        Probe::new("HardLinkTargetMissing", Links, hard_link_target_missing),
        Probe::new("HardLinkAlreadyExists", Links, hard_link_already_exists),
        Probe::new(
            "HardLinkModifyReflectsInOriginal",
            Links,
            hard_link_modify_reflects_in_original,
        ),
        Probe::new(
            "HardLinkWriteOriginalVisibleThroughLink",
            Links,
            hard_link_write_original_visible_through_link,
        ),
        Probe::new("HardLinkDeleteOriginalKeepsLink", Links, hard_link_delete_original_keeps_link),
        Probe::new("HardLinkToDirectoryFails", Links, hard_link_to_directory_fails),
        Probe::new("SymbolicLinkFile", Links, symbolic_link_file),
        Probe::new("SymbolicLinkDirectory", Links, symbolic_link_directory),
        Probe::new("SymbolicLinkReadThrough", Links, symbolic_link_read_through),
        Probe::new("SymbolicLinkDanglingOpenFails", Links, symbolic_link_dangling_open_fails),
        Probe::new(
            "SymbolicLinkResolvesToTargetIdentity",
            Links,
            symbolic_link_resolves_to_target_identity,
        ),
        Probe::new("SymbolicLinkAlreadyExists", Links, symbolic_link_already_exists),
    ]
}

fn hard_link_basic(ctx: &ProbeContext<'_>) -> ProbeResult {
    let original = ctx.path("original.txt");
    let link = ctx.path("link.txt");
    seed(ctx, &original, b"shared")?;

    ctx.oracle()
        .create_hard_link(&link, &original)
        .op("CreateHardLink")?;
    check(ctx.oracle().exists(&link), "link", "present", "absent")?;

    let a = ctx.oracle().identity(&original).setup("identity of original")?;
    let b = ctx.oracle().identity(&link).setup("identity of link")?;
    check_eq("identity", a, b)?;
    check_bytes("content through link", b"shared", &read_back(ctx, &link)?)?;
    Ok(format!("link=link.txt target=original.txt id={a}"))
}

fn hard_link_target_missing(ctx: &ProbeContext<'_>) -> ProbeResult {
    expect_failure(
        ctx.oracle()
            .create_hard_link(&ctx.path("link.txt"), &ctx.path("absent.txt")),
        "CreateHardLink to missing target",
        &[ErrorKind::NotFound],
    )?;
    check(
        !ctx.oracle().exists(&ctx.path("link.txt")),
        "link",
        "absent",
        "present",
    )?;
    Ok("target=absent.txt".to_string())
}

fn hard_link_already_exists(ctx: &ProbeContext<'_>) -> ProbeResult {
    let original = ctx.path("original.txt");
    let occupied = ctx.path("occupied.txt");
    seed(ctx, &original, b"one")?;
    seed(ctx, &occupied, b"two")?;

    expect_failure(
        ctx.oracle().create_hard_link(&occupied, &original),
        "CreateHardLink over existing name",
        &[ErrorKind::AlreadyExists],
    )?;
    check_bytes("occupant content", b"two", &read_back(ctx, &occupied)?)?;
    Ok("link=occupied.txt".to_string())
}

fn hard_link_modify_reflects_in_original(ctx: &ProbeContext<'_>) -> ProbeResult {
    let original = ctx.path("original.txt");
    let link = ctx.path("link.txt");
    seed(ctx, &original, b"start")?;
    ctx.oracle()
        .create_hard_link(&link, &original)
        .setup("create hard link")?;

    let handle = open_rw(ctx, &link)?;
    handle.write(Some(0), b"sync").op("WriteFile through link")?;
    handle.close().setup("close")?;

    check_bytes("original content", b"synct", &read_back(ctx, &original)?)?;
    Ok("content=synct".to_string())
}

fn hard_link_write_original_visible_through_link(ctx: &ProbeContext<'_>) -> ProbeResult {
    let original = ctx.path("original.txt");
    let link = ctx.path("link.txt");
    seed(ctx, &original, b"hello")?;
    ctx.oracle()
        .create_hard_link(&link, &original)
        .setup("create hard link")?;

    let handle = open_rw(ctx, &original)?;
    handle.write(Some(0), b"XYZ").op("WriteFile through original")?;
    handle.close().setup("close")?;

    check_bytes("link content", b"XYZlo", &read_back(ctx, &link)?)?;
    Ok("content=XYZlo".to_string())
}

fn hard_link_delete_original_keeps_link(ctx: &ProbeContext<'_>) -> ProbeResult {
    let original = ctx.path("original.txt");
    let link = ctx.path("link.txt");
    seed(ctx, &original, b"survives")?;
    ctx.oracle()
        .create_hard_link(&link, &original)
        .setup("create hard link")?;

    ctx.oracle().delete_file(&original).op("DeleteFile original")?;
    check(!ctx.oracle().exists(&original), "original", "absent", "present")?;
    check_bytes("link content", b"survives", &read_back(ctx, &link)?)?;
    Ok("link=link.txt".to_string())
}

fn hard_link_to_directory_fails(ctx: &ProbeContext<'_>) -> ProbeResult {
    let dir = ctx.path("dir");
    mkdir(ctx, &dir)?;
    let observed = expect_failure(
        ctx.oracle().create_hard_link(&ctx.path("dirlink"), &dir),
        "CreateHardLink to directory",
        &[ErrorKind::AccessDenied],
    )?;
    Ok(format!("error={observed}"))
}

fn symbolic_link_file(ctx: &ProbeContext<'_>) -> ProbeResult {
    let target = ctx.path("target.txt");
    let link = ctx.path("link.txt");
    seed(ctx, &target, b"data")?;

    ctx.oracle()
        .create_symbolic_link(&link, &target, false)
        .op("CreateSymbolicLink")?;
    let attrs = attributes_of(ctx, &link)?;
    check(
        attrs.contains(FileAttributes::REPARSE_POINT),
        "link attributes",
        "ReparsePoint",
        attrs,
    )?;
    check(
        !attrs.contains(FileAttributes::DIRECTORY),
        "link attributes",
        "no Directory bit",
        attrs,
    )?;
    Ok(format!("attributes={attrs}"))
}

fn symbolic_link_directory(ctx: &ProbeContext<'_>) -> ProbeResult {
    let target = ctx.path("target");
    let link = ctx.path("link");
    mkdir(ctx, &target)?;
    touch(ctx, &target.join("inner.txt"))?;

    ctx.oracle()
        .create_symbolic_link(&link, &target, true)
        .op("CreateSymbolicLink directory")?;
    let attrs = attributes_of(ctx, &link)?;
    check(
        attrs.contains(FileAttributes::REPARSE_POINT | FileAttributes::DIRECTORY),
        "link attributes",
        "Directory|ReparsePoint",
        attrs,
    )?;
    check(
        ctx.oracle().exists(&link.join("inner.txt")),
        "entry through link",
        "present",
        "absent",
    )?;
    Ok(format!("attributes={attrs}"))
}

fn symbolic_link_read_through(ctx: &ProbeContext<'_>) -> ProbeResult {
    let target = ctx.path("target.txt");
    let link = ctx.path("link.txt");
    seed(ctx, &target, b"payload")?;
    ctx.oracle()
        .create_symbolic_link(&link, &target, false)
        .setup("create symbolic link")?;

    check_bytes("content through link", b"payload", &read_back(ctx, &link)?)?;
    Ok("content=payload".to_string())
}

fn symbolic_link_dangling_open_fails(ctx: &ProbeContext<'_>) -> ProbeResult {
    let link = ctx.path("dangling.txt");
    ctx.oracle()
        .create_symbolic_link(&link, &ctx.path("nowhere.txt"), false)
        .setup("create dangling link")?;

    check(ctx.oracle().exists(&link), "link entry", "present", "absent")?;
    expect_failure(
        ctx.open(&link, Disposition::OpenExisting, Access::READ),
        "OpenExisting through dangling link",
        &[ErrorKind::NotFound],
    )?;
    Ok("link=dangling.txt".to_string())
}

fn symbolic_link_resolves_to_target_identity(ctx: &ProbeContext<'_>) -> ProbeResult {
    let target = ctx.path("target.txt");
    let link = ctx.path("link.txt");
    seed(ctx, &target, b"x")?;
    ctx.oracle()
        .create_symbolic_link(&link, &target, false)
        .setup("create symbolic link")?;

    let a = ctx.oracle().identity(&target).setup("identity of target")?;
    let b = ctx.oracle().identity(&link).op("identity through link")?;
    check_eq("identity", a, b)?;
    Ok(format!("id={a}"))
}

fn symbolic_link_already_exists(ctx: &ProbeContext<'_>) -> ProbeResult {
    let target = ctx.path("target.txt");
    let occupied = ctx.path("occupied.txt");
    touch(ctx, &target)?;
    seed(ctx, &occupied, b"mine")?;

    expect_failure(
        ctx.oracle().create_symbolic_link(&occupied, &target, false),
        "CreateSymbolicLink over existing name",
        &[ErrorKind::AlreadyExists],
    )?;
    let attrs = attributes_of(ctx, &occupied)?;
    check(
        !attrs.contains(FileAttributes::REPARSE_POINT),
        "occupant attributes",
        "regular file",
        attrs,
    )?;
    Ok("link=occupied.txt".to_string())
}

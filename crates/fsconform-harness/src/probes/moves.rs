//! Rename and move of files, directories and links.

use fsconform_core::{ErrorKind, FileAttributes};

use super::{attributes_of, file_name, mkdir, read_back, seed, touch};
use crate::context::ProbeContext;
use crate::probe::{
    check, check_bytes, check_eq, expect_failure, Category, Probe, ProbeResult, ProbeResultExt,
};

pub fn probes() -> Vec<Probe> {
    use Category::Move;
    vec![
        Probe::new("MoveRenameSameDirectory", Move, move_rename_same_directory),
        Probe::new("MoveIntoSubdirectory", Move, move_into_subdirectory),
        Probe::new("MoveDestinationExists", Move, move_destination_exists),
        Probe::new("MoveSymbolicLinkItself", Move, move_symbolic_link_itself),
        Probe::new("MoveFromSubdirectoryToParent", Move, move_from_subdirectory_to_parent),
        Probe::new("MoveDirectoryBasic", Move, move_directory_basic),
        Probe::new("MoveDirectoryRenameInPlace", Move, move_directory_rename_in_place),
        Probe::new("MoveDirectoryIntoSubdirectory", Move, move_directory_into_subdirectory),
        Probe::new("MoveDirectoryOverwriteExisting", Move, move_directory_overwrite_existing),
        Probe::new("MoveSourceMissing", Move, move_source_missing),
        Probe::new("MovePreservesIdentity", Move, move_preserves_identity),
    ]
}

fn move_rename_same_directory(ctx: &ProbeContext<'_>) -> ProbeResult {
    let src = ctx.path("before.txt");
    let dst = ctx.path("after.txt");
    seed(ctx, &src, b"move me")?;

    ctx.oracle().rename(&src, &dst).op("MoveFile")?;
    check(!ctx.oracle().exists(&src), "source", "absent", "present")?;
    check_bytes("destination content", b"move me", &read_back(ctx, &dst)?)?;
    Ok("src=before.txt dst=after.txt".to_string())
}

fn move_into_subdirectory(ctx: &ProbeContext<'_>) -> ProbeResult {
    mkdir(ctx, &ctx.path("sub"))?;
    let src = ctx.path("file.txt");
    let dst = ctx.path("sub/file.txt");
    seed(ctx, &src, b"descend")?;

    ctx.oracle().rename(&src, &dst).op("MoveFile into subdirectory")?;
    check(!ctx.oracle().exists(&src), "source", "absent", "present")?;
    check_bytes("destination content", b"descend", &read_back(ctx, &dst)?)?;
    Ok("dst=sub/file.txt".to_string())
}

fn move_destination_exists(ctx: &ProbeContext<'_>) -> ProbeResult {
    let src = ctx.path("src.txt");
    let dst = ctx.path("dst.txt");
    seed(ctx, &src, b"source")?;
    seed(ctx, &dst, b"destination")?;

    expect_failure(
        ctx.oracle().rename(&src, &dst),
        "MoveFile onto existing file",
        &[ErrorKind::AlreadyExists],
    )?;
    check_bytes("source content", b"source", &read_back(ctx, &src)?)?;
    check_bytes("destination content", b"destination", &read_back(ctx, &dst)?)?;
    Ok("dst=dst.txt".to_string())
}

fn move_symbolic_link_itself(ctx: &ProbeContext<'_>) -> ProbeResult {
    let target = ctx.path("target.txt");
    let link = ctx.path("link.txt");
    let moved = ctx.path("moved.txt");
    seed(ctx, &target, b"stay")?;
    ctx.oracle()
        .create_symbolic_link(&link, &target, false)
        .setup("create symbolic link")?;

    ctx.oracle().rename(&link, &moved).op("MoveFile on link")?;
    check(!ctx.oracle().exists(&link), "old link name", "absent", "present")?;

    let moved_attrs = attributes_of(ctx, &moved)?;
    check(
        moved_attrs.contains(FileAttributes::REPARSE_POINT),
        "moved entry",
        "a link",
        moved_attrs,
    )?;
    let target_attrs = attributes_of(ctx, &target)?;
    check(
        !target_attrs.contains(FileAttributes::REPARSE_POINT),
        "target",
        "regular file left in place",
        target_attrs,
    )?;
    check_bytes("content through moved link", b"stay", &read_back(ctx, &moved)?)?;
    Ok("link=moved.txt".to_string())
}

fn move_from_subdirectory_to_parent(ctx: &ProbeContext<'_>) -> ProbeResult {
    mkdir(ctx, &ctx.path("sub"))?;
    let src = ctx.path("sub/file.txt");
    let dst = ctx.path("file.txt");
    seed(ctx, &src, b"ascend")?;

    ctx.oracle().rename(&src, &dst).op("MoveFile to parent")?;
    check(!ctx.oracle().exists(&src), "source", "absent", "present")?;
    check_bytes("destination content", b"ascend", &read_back(ctx, &dst)?)?;
    Ok("src=sub/file.txt".to_string())
}

fn move_directory_basic(ctx: &ProbeContext<'_>) -> ProbeResult {
    let src = ctx.path("olddir");
    let dst = ctx.path("newdir");
    mkdir(ctx, &src)?;
    mkdir(ctx, &src.join("nested"))?;
    seed(ctx, &src.join("nested/file.txt"), b"carried")?;

    ctx.oracle().rename(&src, &dst).op("MoveFile on directory")?;
    check(!ctx.oracle().exists(&src), "source", "absent", "present")?;
    check_bytes(
        "nested content",
        b"carried",
        &read_back(ctx, &dst.join("nested/file.txt"))?,
    )?;
    Ok("src=olddir dst=newdir".to_string())
}

fn move_directory_rename_in_place(ctx: &ProbeContext<'_>) -> ProbeResult {
    let src = ctx.path("Folder");
    let dst = ctx.path("folder");
    mkdir(ctx, &src)?;
    touch(ctx, &src.join("keep.txt"))?;

    ctx.oracle().rename(&src, &dst).op("MoveFile case-only rename")?;
    let entries = ctx.oracle().read_dir(ctx.root()).setup("list directory")?;
    let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    check_eq("entries after rename", vec!["folder"], names)?;
    check(
        ctx.oracle().exists(&dst.join("keep.txt")),
        "child",
        "present",
        "absent",
    )?;
    Ok(format!("name={}", file_name(&dst)))
}

fn move_directory_into_subdirectory(ctx: &ProbeContext<'_>) -> ProbeResult {
    let parent = ctx.path("parent");
    mkdir(ctx, &parent)?;
    mkdir(ctx, &parent.join("child"))?;

    let observed = expect_failure(
        ctx.oracle().rename(&parent, &parent.join("child/parent")),
        "MoveFile directory into its own descendant",
        &[ErrorKind::InvalidArgument, ErrorKind::AccessDenied],
    )?;
    check(
        ctx.oracle().exists(&parent.join("child")),
        "original tree",
        "intact",
        "changed",
    )?;
    Ok(format!("error={observed}"))
}

fn move_directory_overwrite_existing(ctx: &ProbeContext<'_>) -> ProbeResult {
    let src = ctx.path("src");
    let dst = ctx.path("dst");
    mkdir(ctx, &src)?;
    mkdir(ctx, &dst)?;
    touch(ctx, &src.join("marker.txt"))?;

    expect_failure(
        ctx.oracle().rename(&src, &dst),
        "MoveFile directory onto existing directory",
        &[ErrorKind::AlreadyExists],
    )?;
    check(
        ctx.oracle().exists(&src.join("marker.txt")),
        "source tree",
        "intact",
        "changed",
    )?;
    Ok("dst=dst".to_string())
}

fn move_source_missing(ctx: &ProbeContext<'_>) -> ProbeResult {
    expect_failure(
        ctx.oracle()
            .rename(&ctx.path("absent.txt"), &ctx.path("anywhere.txt")),
        "MoveFile on missing source",
        &[ErrorKind::NotFound],
    )?;
    Ok("src=absent.txt".to_string())
}

fn move_preserves_identity(ctx: &ProbeContext<'_>) -> ProbeResult {
    let src = ctx.path("before.txt");
    let dst = ctx.path("after.txt");
    seed(ctx, &src, b"same")?;

    let before = ctx.oracle().identity(&src).setup("identity before move")?;
    ctx.oracle().rename(&src, &dst).op("MoveFile")?;
    let after = ctx.oracle().identity(&dst).setup("identity after move")?;
    check_eq("identity", before, after)?;
    Ok(format!("id={after}"))
}

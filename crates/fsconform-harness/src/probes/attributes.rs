//! Attribute bits on files and directories.

use std::path::Path;

use fsconform_core::{Access, Disposition, ErrorKind, FileAttributes};

use super::{attributes_of, mkdir, seed, touch, Step};
use crate::context::ProbeContext;
use crate::probe::{
    check, check_bytes, check_eq, expect_failure, Category, Probe, ProbeResult, ProbeResultExt,
};

pub fn probes() -> Vec<Probe> {
    use Category::Attributes;
    vec![
        Probe::new("AttributeReadOnly", Attributes, attribute_read_only),
        Probe::new("AttributeHidden", Attributes, attribute_hidden),
        Probe::new("AttributeSystem", Attributes, attribute_system),
        Probe::new("AttributeInvalidFile", Attributes, attribute_invalid_file),
        Probe::new(
            "AttributeNormalClearsOtherFlags",
            Attributes,
            attribute_normal_clears_other_flags,
        ),
        Probe::new("AttributeReadOnlyBlocksWrite", Attributes, attribute_read_only_blocks_write),
        Probe::new(
            "AttributeHiddenHidesFromWildcard",
            Attributes,
            attribute_hidden_hides_from_wildcard,
        ),
        Probe::new(
            "AttributeSetOnInvalidPathFails",
            Attributes,
            attribute_set_on_invalid_path_fails,
        ),
        Probe::new("AttributeReadOnlyAllowsRead", Attributes, attribute_read_only_allows_read),
        Probe::new("DirectoryReadOnly", Attributes, directory_read_only),
        Probe::new("DirectoryHidden", Attributes, directory_hidden),
        Probe::new("DirectorySystem", Attributes, directory_system),
        Probe::new("DirectoryNormalClearsOthers", Attributes, directory_normal_clears_others),
        Probe::new("DirectoryInvalidPathFails", Attributes, directory_invalid_path_fails),
    ]
}

/// Set `bit` on `path` and require it to read back.
fn set_and_verify(
    ctx: &ProbeContext<'_>,
    path: &Path,
    bit: FileAttributes,
) -> Step<FileAttributes> {
    ctx.oracle()
        .set_attributes(path, bit)
        .op("SetFileAttributes")?;
    let attrs = attributes_of(ctx, path)?;
    check(attrs.contains(bit), "attributes", bit, attrs)?;
    Ok(attrs)
}

fn attribute_read_only(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("file.txt");
    touch(ctx, &path)?;
    let attrs = set_and_verify(ctx, &path, FileAttributes::READ_ONLY)?;
    Ok(format!("attributes={attrs}"))
}

fn attribute_hidden(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("file.txt");
    touch(ctx, &path)?;
    let attrs = set_and_verify(ctx, &path, FileAttributes::HIDDEN)?;
    Ok(format!("attributes={attrs}"))
}

fn attribute_system(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("file.txt");
    touch(ctx, &path)?;
    let attrs = set_and_verify(ctx, &path, FileAttributes::SYSTEM)?;
    Ok(format!("attributes={attrs}"))
}

fn attribute_invalid_file(ctx: &ProbeContext<'_>) -> ProbeResult {
    expect_failure(
        ctx.oracle().attributes(&ctx.path("ghost.txt")),
        "GetFileAttributes on absent file",
        &[ErrorKind::NotFound],
    )?;
    Ok("file=ghost.txt".to_string())
}

fn attribute_normal_clears_other_flags(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("file.txt");
    touch(ctx, &path)?;
    ctx.oracle()
        .set_attributes(
            &path,
            FileAttributes::READ_ONLY | FileAttributes::HIDDEN | FileAttributes::SYSTEM,
        )
        .setup("set ReadOnly|Hidden|System")?;

    ctx.oracle()
        .set_attributes(&path, FileAttributes::NORMAL)
        .op("SetFileAttributes Normal")?;
    let attrs = attributes_of(ctx, &path)?;
    check(
        !attrs.intersects(FileAttributes::SETTABLE),
        "attributes after Normal",
        "no ReadOnly, Hidden or System",
        attrs,
    )?;
    check_eq("attributes after Normal", FileAttributes::NORMAL, attrs)?;
    Ok(format!("attributes={attrs}"))
}

fn attribute_read_only_blocks_write(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("file.txt");
    seed(ctx, &path, b"frozen")?;
    ctx.oracle()
        .set_attributes(&path, FileAttributes::READ_ONLY)
        .setup("set ReadOnly")?;

    expect_failure(
        ctx.open(&path, Disposition::CreateAlways, Access::READ_WRITE),
        "CreateAlways on read-only file",
        &[ErrorKind::AccessDenied],
    )?;
    expect_failure(
        ctx.open(&path, Disposition::OpenExisting, Access::WRITE),
        "OpenExisting for write on read-only file",
        &[ErrorKind::AccessDenied],
    )?;
    let size = ctx.oracle().size(&path).setup("size")?;
    check_eq("size", 6, size)?;
    Ok("file=file.txt".to_string())
}

fn attribute_hidden_hides_from_wildcard(ctx: &ProbeContext<'_>) -> ProbeResult {
    let visible = ctx.path("visible.txt");
    let secret = ctx.path("secret.txt");
    touch(ctx, &visible)?;
    touch(ctx, &secret)?;
    ctx.oracle()
        .set_attributes(&secret, FileAttributes::HIDDEN)
        .setup("set Hidden")?;

    let entries = ctx
        .oracle()
        .enumerate(&ctx.path("*.txt"))
        .op("FindFirstFile *.txt")?;
    let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    check_eq("wildcard matches", vec!["visible.txt"], names)?;
    check(ctx.oracle().exists(&secret), "hidden file", "present", "absent")?;
    Ok("pattern=*.txt".to_string())
}

fn attribute_set_on_invalid_path_fails(ctx: &ProbeContext<'_>) -> ProbeResult {
    expect_failure(
        ctx.oracle()
            .set_attributes(&ctx.path("ghost.txt"), FileAttributes::HIDDEN),
        "SetFileAttributes on absent file",
        &[ErrorKind::NotFound],
    )?;
    Ok("file=ghost.txt".to_string())
}

fn attribute_read_only_allows_read(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("file.txt");
    seed(ctx, &path, b"readable")?;
    ctx.oracle()
        .set_attributes(&path, FileAttributes::READ_ONLY)
        .setup("set ReadOnly")?;

    let handle = ctx
        .open(&path, Disposition::OpenExisting, Access::READ)
        .op("OpenExisting for read on read-only file")?;
    let data = handle.read(Some(0), 64).op("ReadFile")?;
    check_bytes("content", b"readable", &data)?;
    Ok("file=file.txt".to_string())
}

fn directory_read_only(ctx: &ProbeContext<'_>) -> ProbeResult {
    let dir = ctx.path("dir");
    mkdir(ctx, &dir)?;
    let attrs = set_and_verify(ctx, &dir, FileAttributes::READ_ONLY)?;
    check(
        attrs.contains(FileAttributes::DIRECTORY),
        "attributes",
        "Directory kept",
        attrs,
    )?;
    Ok(format!("attributes={attrs}"))
}

fn directory_hidden(ctx: &ProbeContext<'_>) -> ProbeResult {
    let dir = ctx.path("dir");
    mkdir(ctx, &dir)?;
    let attrs = set_and_verify(ctx, &dir, FileAttributes::HIDDEN)?;
    Ok(format!("attributes={attrs}"))
}

fn directory_system(ctx: &ProbeContext<'_>) -> ProbeResult {
    let dir = ctx.path("dir");
    mkdir(ctx, &dir)?;
    let attrs = set_and_verify(ctx, &dir, FileAttributes::SYSTEM)?;
    Ok(format!("attributes={attrs}"))
}

fn directory_normal_clears_others(ctx: &ProbeContext<'_>) -> ProbeResult {
    let dir = ctx.path("dir");
    mkdir(ctx, &dir)?;
    ctx.oracle()
        .set_attributes(&dir, FileAttributes::HIDDEN | FileAttributes::SYSTEM)
        .setup("set Hidden|System")?;

    ctx.oracle()
        .set_attributes(&dir, FileAttributes::NORMAL)
        .op("SetFileAttributes Normal")?;
    let attrs = attributes_of(ctx, &dir)?;
    check(
        attrs.contains(FileAttributes::DIRECTORY) && !attrs.intersects(FileAttributes::SETTABLE),
        "attributes after Normal",
        "Directory only",
        attrs,
    )?;
    Ok(format!("attributes={attrs}"))
}

fn directory_invalid_path_fails(ctx: &ProbeContext<'_>) -> ProbeResult {
    expect_failure(
        ctx.oracle()
            .set_attributes(&ctx.path("missing/dir"), FileAttributes::HIDDEN),
        "SetFileAttributes on absent directory",
        &[ErrorKind::NotFound],
    )?;
    Ok("dir=missing/dir".to_string())
}

//! Creation dispositions.

use fsconform_core::{Access, Disposition, ErrorKind, FileAttributes, OpenRequest};

use super::{attributes_of, read_back, seed, touch};
use crate::context::ProbeContext;
use crate::probe::{
    check, check_bytes, check_eq, expect_failure, Category, Probe, ProbeResult, ProbeResultExt,
};

pub fn probes() -> Vec<Probe> {
    use Category::Creation;
    vec![
        Probe::new("CreateAlways", Creation, create_always),
        Probe::new("CreateNew", Creation, create_new),
        Probe::new("TruncateExisting", Creation, truncate_existing),
        Probe::new("OpenExisting", Creation, open_existing),
        Probe::new("OpenAlways", Creation, open_always),
        Probe::new("ReadWriteAccess", Creation, read_write_access),
        Probe::new("CreateWithHiddenAttribute", Creation, create_with_hidden_attribute),
        Probe::new("CreateNewInMissingDirectory", Creation, create_new_in_missing_directory),
        Probe::new("CreateAlwaysOnReadOnlyFile", Creation, create_always_on_read_only_file),
    ]
}

fn create_always(ctx: &ProbeContext<'_>) -> ProbeResult {
    let fresh = ctx.path("fresh.txt");
    ctx.open(&fresh, Disposition::CreateAlways, Access::READ_WRITE)
        .and_then(|h| h.close())
        .op("CreateAlways on absent file")?;
    check(ctx.oracle().exists(&fresh), "file created", "present", "absent")?;

    let existing = ctx.path("existing.txt");
    seed(ctx, &existing, b"1234")?;
    ctx.open(&existing, Disposition::CreateAlways, Access::READ_WRITE)
        .and_then(|h| h.close())
        .op("CreateAlways on existing file")?;
    let size = ctx.oracle().size(&existing).setup("size")?;
    check_eq("size after CreateAlways", 0, size)?;
    Ok("file=existing.txt".to_string())
}

fn create_new(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("new.txt");
    ctx.open(&path, Disposition::CreateNew, Access::READ_WRITE)
        .and_then(|h| h.close())
        .op("CreateNew on absent file")?;
    let size = ctx.oracle().size(&path).setup("size")?;
    check_eq("size of new file", 0, size)?;

    expect_failure(
        ctx.open(&path, Disposition::CreateNew, Access::READ_WRITE),
        "CreateNew on existing file",
        &[ErrorKind::AlreadyExists],
    )?;
    Ok("file=new.txt".to_string())
}

fn truncate_existing(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("truncate.txt");
    expect_failure(
        ctx.open(&path, Disposition::TruncateExisting, Access::READ_WRITE),
        "TruncateExisting on absent file",
        &[ErrorKind::NotFound],
    )?;

    seed(ctx, &path, b"12345")?;
    ctx.open(&path, Disposition::TruncateExisting, Access::READ_WRITE)
        .and_then(|h| h.close())
        .op("TruncateExisting")?;
    let size = ctx.oracle().size(&path).setup("size")?;
    check_eq("size after TruncateExisting", 0, size)?;
    Ok("file=truncate.txt".to_string())
}

fn open_existing(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("existing.txt");
    expect_failure(
        ctx.open(&path, Disposition::OpenExisting, Access::READ),
        "OpenExisting on absent file",
        &[ErrorKind::NotFound],
    )?;
    check(!ctx.oracle().exists(&path), "failed open", "no file created", "file created")?;

    seed(ctx, &path, b"keep")?;
    let handle = ctx
        .open(&path, Disposition::OpenExisting, Access::READ)
        .op("OpenExisting")?;
    let data = handle.read(Some(0), 16).setup("read")?;
    check_bytes("content", b"keep", &data)?;
    Ok("file=existing.txt".to_string())
}

fn open_always(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("always.txt");
    ctx.open(&path, Disposition::OpenAlways, Access::READ_WRITE)
        .and_then(|h| h.close())
        .op("OpenAlways on absent file")?;
    check(ctx.oracle().exists(&path), "file created", "present", "absent")?;

    seed(ctx, &path, b"preserved")?;
    ctx.open(&path, Disposition::OpenAlways, Access::READ_WRITE)
        .and_then(|h| h.close())
        .op("OpenAlways on existing file")?;
    check_bytes("content after OpenAlways", b"preserved", &read_back(ctx, &path)?)?;
    Ok("file=always.txt".to_string())
}

fn read_write_access(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("rw.txt");
    let handle = ctx
        .open(&path, Disposition::CreateAlways, Access::READ_WRITE)
        .op("CreateAlways read/write")?;
    let written = handle.write(Some(0), b"abcde").op("WriteFile")?;
    check_eq("bytes written", 5, written)?;
    let data = handle.read(Some(0), 5).op("ReadFile")?;
    check_bytes("content", b"abcde", &data)?;
    Ok("data=abcde".to_string())
}

fn create_with_hidden_attribute(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("hidden.txt");
    let request = OpenRequest::new(Disposition::CreateNew, Access::READ_WRITE)
        .with_attributes(FileAttributes::HIDDEN);
    ctx.create(&path, &request)
        .and_then(|h| h.close())
        .op("CreateNew with Hidden")?;
    let attrs = attributes_of(ctx, &path)?;
    check(attrs.contains(FileAttributes::HIDDEN), "attributes", "Hidden", attrs)?;
    Ok(format!("attributes={attrs}"))
}

fn create_new_in_missing_directory(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("missing/child.txt");
    expect_failure(
        ctx.open(&path, Disposition::CreateNew, Access::READ_WRITE),
        "CreateNew under missing directory",
        &[ErrorKind::NotFound],
    )?;
    check(
        !ctx.oracle().exists(&ctx.path("missing")),
        "parent directory",
        "not created",
        "created",
    )?;
    Ok("path=missing/child.txt".to_string())
}

fn create_always_on_read_only_file(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("readonly.txt");
    touch(ctx, &path)?;
    ctx.oracle()
        .set_attributes(&path, FileAttributes::READ_ONLY)
        .setup("set ReadOnly")?;
    expect_failure(
        ctx.open(&path, Disposition::CreateAlways, Access::READ_WRITE),
        "CreateAlways on read-only file",
        &[ErrorKind::AccessDenied],
    )?;
    Ok("file=readonly.txt".to_string())
}

//! End-of-file truncation and extension through a handle.

use fsconform_core::{Access, Disposition, ErrorKind, HandleId};

use super::{open_rw, read_back, seed};
use crate::context::ProbeContext;
use crate::probe::{
    check_bytes, check_eq, expect_failure, Category, Probe, ProbeResult, ProbeResultExt,
};

pub fn probes() -> Vec<Probe> {
    use Category::Truncation;
    vec![
        Probe::new("SetEndOfFileTruncate", Truncation, set_end_of_file_truncate),
        Probe::new("SetEndOfFileExtend", Truncation, set_end_of_file_extend),
        Probe::new("SetEndOfFileAtExactSize", Truncation, set_end_of_file_at_exact_size),
        Probe::new("SetEndOfFileInvalidHandle", Truncation, set_end_of_file_invalid_handle),
        Probe::new("SetEndOfFileOnReadOnlyHandle", Truncation, set_end_of_file_on_read_only_handle),
        Probe::new("SetEndOfFileToZero", Truncation, set_end_of_file_to_zero),
    ]
}

fn set_end_of_file_truncate(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("file.bin");
    seed(ctx, &path, b"0123456789")?;

    let handle = open_rw(ctx, &path)?;
    handle.set_len(5).op("SetEndOfFile")?;
    check_eq("size through handle", 5, handle.size().setup("size")?)?;
    handle.close().setup("close")?;

    check_bytes("content", b"01234", &read_back(ctx, &path)?)?;
    Ok("10->5".to_string())
}

fn set_end_of_file_extend(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("file.bin");
    seed(ctx, &path, b"abc")?;

    let handle = open_rw(ctx, &path)?;
    handle.set_len(10).op("SetEndOfFile")?;
    handle.close().setup("close")?;

    check_bytes("content", b"abc\0\0\0\0\0\0\0", &read_back(ctx, &path)?)?;
    Ok("3->10".to_string())
}

fn set_end_of_file_at_exact_size(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("file.bin");
    seed(ctx, &path, b"12345")?;

    let handle = open_rw(ctx, &path)?;
    handle.set_len(5).op("SetEndOfFile")?;
    handle.close().setup("close")?;

    check_bytes("content", b"12345", &read_back(ctx, &path)?)?;
    Ok("5->5".to_string())
}

fn set_end_of_file_invalid_handle(ctx: &ProbeContext<'_>) -> ProbeResult {
    let observed = expect_failure(
        ctx.oracle().set_end_of_file(HandleId::INVALID, 0),
        "SetEndOfFile on invalid handle",
        &[ErrorKind::InvalidHandle, ErrorKind::AccessDenied],
    )?;
    Ok(format!("error={observed}"))
}

fn set_end_of_file_on_read_only_handle(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("file.bin");
    seed(ctx, &path, b"unchanged")?;

    let handle = ctx
        .open(&path, Disposition::OpenExisting, Access::READ)
        .setup("open for read")?;
    let observed = expect_failure(
        handle.set_len(2),
        "SetEndOfFile on read-only handle",
        &[ErrorKind::AccessDenied, ErrorKind::InvalidHandle],
    )?;
    handle.close().setup("close")?;

    check_bytes("content", b"unchanged", &read_back(ctx, &path)?)?;
    Ok(format!("error={observed}"))
}

fn set_end_of_file_to_zero(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("file.bin");
    seed(ctx, &path, b"something")?;

    let handle = open_rw(ctx, &path)?;
    handle.set_len(0).op("SetEndOfFile")?;
    handle.close().setup("close")?;

    let size = ctx.oracle().size(&path).setup("size")?;
    check_eq("size", 0, size)?;
    Ok("9->0".to_string())
}

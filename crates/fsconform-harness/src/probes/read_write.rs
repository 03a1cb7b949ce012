//! Reads and writes: offsets, cursor, append mode and handle access.

use std::path::PathBuf;

use fsconform_core::{Access, Disposition, ErrorKind, FileAttributes, HandleId};

use super::{read_back, seed, touch, Step};
use crate::context::ProbeContext;
use crate::probe::{
    check_bytes, check_eq, expect_failure, Category, Probe, ProbeResult, ProbeResultExt,
};

const POSITIONED: &[u8] = b"a123456789";

pub fn probes() -> Vec<Probe> {
    use Category::ReadWrite;
    vec![
        Probe::new("WriteFileBasic", ReadWrite, write_file_basic),
        Probe::new("WriteFileAppendMode", ReadWrite, write_file_append_mode),
        Probe::new("WriteFileWithOffset", ReadWrite, write_file_with_offset),
        Probe::new("WriteFileToReadOnlyFile", ReadWrite, write_file_to_read_only_file),
        Probe::new("WriteFileOnReadOnlyHandle", ReadWrite, write_file_on_read_only_handle),
        Probe::new("WriteFileInvalidHandle", ReadWrite, write_file_invalid_handle),
        Probe::new("WriteFileBeyondEOF", ReadWrite, write_file_beyond_eof),
        Probe::new("WriteFileSequentialCursor", ReadWrite, write_file_sequential_cursor),
        Probe::new("ReadFileBasic", ReadWrite, read_file_basic),
        Probe::new("ReadFilePartial", ReadWrite, read_file_partial),
        Probe::new("ReadFileAtEOFReturnsZero", ReadWrite, read_file_at_eof_returns_zero),
        Probe::new("ReadFileClosedHandleFails", ReadWrite, read_file_closed_handle_fails),
        Probe::new("ReadFileInvalidHandleFails", ReadWrite, read_file_invalid_handle_fails),
        Probe::new("ReadFileStart", ReadWrite, read_file_start),
        Probe::new("ReadFileMiddle", ReadWrite, read_file_middle),
        Probe::new("ReadFileEnd", ReadWrite, read_file_end),
        Probe::new("ReadFileOnWriteOnlyHandle", ReadWrite, read_file_on_write_only_handle),
        Probe::new("ReadFileSequentialCursor", ReadWrite, read_file_sequential_cursor),
    ]
}

fn write_file_basic(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("hello.txt");
    let handle = ctx
        .open(&path, Disposition::CreateNew, Access::READ_WRITE)
        .setup("create file")?;
    let written = handle.write(Some(0), b"Hello, World!").op("WriteFile")?;
    check_eq("bytes written", 13, written)?;
    handle.close().setup("close")?;

    check_bytes("content", b"Hello, World!", &read_back(ctx, &path)?)?;
    Ok(format!("written={written}"))
}

fn write_file_append_mode(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("log.txt");
    seed(ctx, &path, b"123")?;

    let handle = ctx
        .open(&path, Disposition::OpenExisting, Access::APPEND)
        .setup("open for append")?;
    handle.write(Some(0), b"456").op("WriteFile in append mode")?;
    handle.close().setup("close")?;

    check_bytes("content", b"123456", &read_back(ctx, &path)?)?;
    Ok("content=123456".to_string())
}

fn write_file_with_offset(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("offset.txt");
    seed(ctx, &path, b"abcdef")?;

    let handle = ctx
        .open(&path, Disposition::OpenExisting, Access::WRITE)
        .setup("open for write")?;
    handle.write(Some(3), b"XYZ").op("WriteFile at offset 3")?;
    handle.close().setup("close")?;

    check_bytes("content", b"abcXYZ", &read_back(ctx, &path)?)?;
    Ok("content=abcXYZ".to_string())
}

fn write_file_to_read_only_file(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("readonly.txt");
    seed(ctx, &path, b"original")?;
    ctx.oracle()
        .set_attributes(&path, FileAttributes::READ_ONLY)
        .setup("set ReadOnly")?;

    expect_failure(
        ctx.open(&path, Disposition::OpenExisting, Access::READ_WRITE),
        "open read-only file for write",
        &[ErrorKind::AccessDenied],
    )?;
    check_bytes("content", b"original", &read_back(ctx, &path)?)?;
    Ok("file=readonly.txt".to_string())
}

fn write_file_on_read_only_handle(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("file.txt");
    seed(ctx, &path, b"original")?;

    let handle = ctx
        .open(&path, Disposition::OpenExisting, Access::READ)
        .setup("open for read")?;
    expect_failure(
        handle.write(Some(0), b"nope"),
        "WriteFile on read-only handle",
        &[ErrorKind::AccessDenied],
    )?;
    handle.close().setup("close")?;

    check_bytes("content", b"original", &read_back(ctx, &path)?)?;
    Ok("access=read".to_string())
}

fn write_file_invalid_handle(ctx: &ProbeContext<'_>) -> ProbeResult {
    expect_failure(
        ctx.oracle().write(HandleId::INVALID, Some(0), b"x"),
        "WriteFile on invalid handle",
        &[ErrorKind::InvalidHandle],
    )?;
    Ok(format!("handle={}", HandleId::INVALID))
}

fn write_file_beyond_eof(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("far.bin");
    let offset = 1_048_576u64;
    let handle = ctx
        .open(&path, Disposition::CreateNew, Access::READ_WRITE)
        .setup("create file")?;
    handle.write(Some(offset), &[0x42]).op("WriteFile past end")?;
    check_eq("size", offset + 1, handle.size().setup("size")?)?;

    let gap = handle.read(Some(offset - 4), 5).setup("read gap")?;
    check_bytes("bytes before written value", &[0, 0, 0, 0, 0x42], &gap)?;
    Ok(format!("offset={offset} size={}", offset + 1))
}

fn write_file_sequential_cursor(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("cursor.txt");
    let handle = ctx
        .open(&path, Disposition::CreateNew, Access::READ_WRITE)
        .setup("create file")?;
    handle.write(None, b"ab").op("WriteFile at cursor")?;
    handle.write(None, b"cd").op("WriteFile at advanced cursor")?;
    handle.close().setup("close")?;

    check_bytes("content", b"abcd", &read_back(ctx, &path)?)?;
    Ok("content=abcd".to_string())
}

fn read_file_basic(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("hello.txt");
    seed(ctx, &path, b"Hello")?;

    let handle = ctx
        .open(&path, Disposition::OpenExisting, Access::READ)
        .setup("open for read")?;
    let data = handle.read(Some(0), 64).op("ReadFile")?;
    check_bytes("content", b"Hello", &data)?;
    Ok(format!("read={}", data.len()))
}

fn read_file_partial(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("digits.txt");
    seed(ctx, &path, b"0123456789")?;

    let handle = ctx
        .open(&path, Disposition::OpenExisting, Access::READ)
        .setup("open for read")?;
    let data = handle.read(Some(2), 3).op("ReadFile 3 bytes at 2")?;
    check_bytes("content", b"234", &data)?;
    Ok("range=[2,5)".to_string())
}

fn read_file_at_eof_returns_zero(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("short.txt");
    seed(ctx, &path, b"abc")?;

    let handle = ctx
        .open(&path, Disposition::OpenExisting, Access::READ)
        .setup("open for read")?;
    let at_end = handle.read(Some(3), 10).op("ReadFile at end")?;
    check_eq("bytes at end", 0, at_end.len())?;
    let past_end = handle.read(Some(100), 10).op("ReadFile past end")?;
    check_eq("bytes past end", 0, past_end.len())?;
    Ok("read=0".to_string())
}

fn read_file_closed_handle_fails(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("file.txt");
    seed(ctx, &path, b"data")?;

    let handle = ctx
        .open(&path, Disposition::OpenExisting, Access::READ)
        .setup("open for read")?;
    let stale = handle.id();
    handle.close().setup("close")?;

    expect_failure(
        ctx.oracle().read(stale, Some(0), 4),
        "ReadFile on closed handle",
        &[ErrorKind::InvalidHandle],
    )?;
    Ok(format!("handle={stale}"))
}

fn read_file_invalid_handle_fails(ctx: &ProbeContext<'_>) -> ProbeResult {
    expect_failure(
        ctx.oracle().read(HandleId::INVALID, Some(0), 4),
        "ReadFile on invalid handle",
        &[ErrorKind::InvalidHandle],
    )?;
    Ok(format!("handle={}", HandleId::INVALID))
}

fn positioned(ctx: &ProbeContext<'_>) -> Step<PathBuf> {
    let path = ctx.path("positions.txt");
    seed(ctx, &path, POSITIONED)?;
    Ok(path)
}

fn read_one_at(ctx: &ProbeContext<'_>, offset: u64, expected: &[u8]) -> ProbeResult {
    let path = positioned(ctx)?;
    let handle = ctx
        .open(&path, Disposition::OpenExisting, Access::READ)
        .setup("open for read")?;
    let data = handle.read(Some(offset), 1).op("ReadFile 1 byte")?;
    check_bytes(&format!("byte at {offset}"), expected, &data)?;
    Ok(format!("offset={offset} read={}", data.len()))
}

fn read_file_start(ctx: &ProbeContext<'_>) -> ProbeResult {
    read_one_at(ctx, 0, b"a")
}

fn read_file_middle(ctx: &ProbeContext<'_>) -> ProbeResult {
    read_one_at(ctx, 5, b"5")
}

fn read_file_end(ctx: &ProbeContext<'_>) -> ProbeResult {
    read_one_at(ctx, POSITIONED.len() as u64, b"")
}

fn read_file_on_write_only_handle(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("file.txt");
    touch(ctx, &path)?;

    let handle = ctx
        .open(&path, Disposition::OpenExisting, Access::WRITE)
        .setup("open for write")?;
    handle.write(Some(0), b"secret").setup("write")?;
    expect_failure(
        handle.read(Some(0), 6),
        "ReadFile on write-only handle",
        &[ErrorKind::AccessDenied],
    )?;
    Ok("access=write".to_string())
}

fn read_file_sequential_cursor(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = positioned(ctx)?;
    let handle = ctx
        .open(&path, Disposition::OpenExisting, Access::READ)
        .setup("open for read")?;
    let first = handle.read(None, 4).op("ReadFile at cursor")?;
    let second = handle.read(None, 4).op("ReadFile at advanced cursor")?;
    check_bytes("first read", b"a123", &first)?;
    check_bytes("second read", b"4567", &second)?;
    Ok("reads=2x4".to_string())
}

//! Byte-range locking between handles.

use fsconform_core::{ErrorKind, HandleId};

use super::{open_rw, seed, Step};
use crate::context::{OpenHandle, ProbeContext};
use crate::probe::{check_bytes, expect_failure, Category, Probe, ProbeResult, ProbeResultExt};

const CONTENT: &[u8] = b"0123456789";

pub fn probes() -> Vec<Probe> {
    use Category::Locking;
    vec![
        Probe::new("LockFileBasicExclusive", Locking, lock_file_basic_exclusive),
        Probe::new("LockFileInvalidHandle", Locking, lock_file_invalid_handle),
        Probe::new("LockFileNonOverlappingSuccess", Locking, lock_file_non_overlapping_success),
        Probe::new("LockFileAlreadyLockedFails", Locking, lock_file_already_locked_fails),
        Probe::new("LockFileUnlockRegion", Locking, lock_file_unlock_region),
        Probe::new("LockFileBlocksOverlappingRead", Locking, lock_file_blocks_overlapping_read),
        Probe::new("LockFileReleasedOnClose", Locking, lock_file_released_on_close),
        Probe::new("UnlockFileBasic", Locking, unlock_file_basic),
        Probe::new("UnlockFileWithoutLockFails", Locking, unlock_file_without_lock_fails),
        Probe::new("UnlockFileWrongRegionFails", Locking, unlock_file_wrong_region_fails),
        Probe::new("UnlockFileWithInvalidHandle", Locking, unlock_file_with_invalid_handle),
        Probe::new(
            "UnlockFilePartialUnlockThenAccess",
            Locking,
            unlock_file_partial_unlock_then_access,
        ),
        Probe::new("UnlockFileFromOtherHandleFails", Locking, unlock_file_from_other_handle_fails),
    ]
}

/// A ten-byte file opened twice for read/write.
fn two_handles<'a>(ctx: &ProbeContext<'a>) -> Step<(OpenHandle<'a>, OpenHandle<'a>)> {
    let path = ctx.path("locked.bin");
    seed(ctx, &path, CONTENT)?;
    let first = open_rw(ctx, &path)?;
    let second = open_rw(ctx, &path)?;
    Ok((first, second))
}

fn lock_file_basic_exclusive(ctx: &ProbeContext<'_>) -> ProbeResult {
    let (h1, h2) = two_handles(ctx)?;
    h1.lock(0, 5).op("LockFile [0,5)")?;

    expect_failure(
        h2.write(Some(0), b"xx"),
        "overlapping write from other handle",
        &[ErrorKind::LockViolation],
    )?;
    h2.write(Some(5), b"yy")
        .op("non-overlapping write from other handle")?;
    h1.write(Some(0), b"zz").op("write by lock owner")?;

    h1.unlock(0, 5).op("UnlockFile [0,5)")?;
    h2.write(Some(0), b"ok").op("write after unlock")?;

    let data = h1.read(Some(0), CONTENT.len()).setup("read back")?;
    check_bytes("content", b"ok234yy789", &data)?;
    Ok("region=[0,5)".to_string())
}

fn lock_file_invalid_handle(ctx: &ProbeContext<'_>) -> ProbeResult {
    expect_failure(
        ctx.oracle().lock(HandleId::INVALID, 0, 1),
        "LockFile on invalid handle",
        &[ErrorKind::InvalidHandle],
    )?;
    Ok(format!("handle={}", HandleId::INVALID))
}

fn lock_file_non_overlapping_success(ctx: &ProbeContext<'_>) -> ProbeResult {
    let (h1, h2) = two_handles(ctx)?;
    h1.lock(0, 5).op("LockFile [0,5)")?;
    h2.lock(5, 5).op("LockFile [5,10) from other handle")?;
    Ok("regions=[0,5),[5,10)".to_string())
}

fn lock_file_already_locked_fails(ctx: &ProbeContext<'_>) -> ProbeResult {
    let (h1, h2) = two_handles(ctx)?;
    h1.lock(0, 10).op("LockFile [0,10)")?;
    expect_failure(
        h2.lock(2, 4),
        "LockFile [2,6) from other handle",
        &[ErrorKind::LockViolation],
    )?;
    Ok("region=[2,6)".to_string())
}

fn lock_file_unlock_region(ctx: &ProbeContext<'_>) -> ProbeResult {
    let (h1, h2) = two_handles(ctx)?;
    h1.lock(0, 5).op("LockFile")?;
    h1.unlock(0, 5).op("UnlockFile")?;
    h2.lock(0, 5).op("LockFile released region from other handle")?;
    Ok("region=[0,5)".to_string())
}

fn lock_file_blocks_overlapping_read(ctx: &ProbeContext<'_>) -> ProbeResult {
    let (h1, h2) = two_handles(ctx)?;
    h1.lock(0, 5).op("LockFile [0,5)")?;
    expect_failure(
        h2.read(Some(2), 3),
        "overlapping read from other handle",
        &[ErrorKind::LockViolation],
    )?;
    let tail = h2.read(Some(5), 5).op("non-overlapping read")?;
    check_bytes("unlocked tail", b"56789", &tail)?;
    Ok("region=[0,5)".to_string())
}

fn lock_file_released_on_close(ctx: &ProbeContext<'_>) -> ProbeResult {
    let (h1, h2) = two_handles(ctx)?;
    h1.lock(0, 5).op("LockFile [0,5)")?;
    h1.close().op("CloseHandle with lock held")?;
    h2.write(Some(0), b"free").op("write after owner closed")?;
    Ok("region=[0,5)".to_string())
}

fn unlock_file_basic(ctx: &ProbeContext<'_>) -> ProbeResult {
    let (h1, _h2) = two_handles(ctx)?;
    h1.lock(2, 3).setup("lock")?;
    h1.unlock(2, 3).op("UnlockFile [2,5)")?;
    Ok("region=[2,5)".to_string())
}

fn unlock_file_without_lock_fails(ctx: &ProbeContext<'_>) -> ProbeResult {
    let (h1, _h2) = two_handles(ctx)?;
    expect_failure(
        h1.unlock(0, 5),
        "UnlockFile without lock",
        &[ErrorKind::NotLocked],
    )?;
    Ok("region=[0,5)".to_string())
}

fn unlock_file_wrong_region_fails(ctx: &ProbeContext<'_>) -> ProbeResult {
    let (h1, _h2) = two_handles(ctx)?;
    h1.lock(0, 10).setup("lock [0,10)")?;
    expect_failure(
        h1.unlock(0, 5),
        "UnlockFile on sub-range of lock",
        &[ErrorKind::NotLocked],
    )?;
    h1.unlock(0, 10).op("UnlockFile exact region")?;
    Ok("locked=[0,10) unlocked=[0,5)".to_string())
}

fn unlock_file_with_invalid_handle(ctx: &ProbeContext<'_>) -> ProbeResult {
    expect_failure(
        ctx.oracle().unlock(HandleId::INVALID, 0, 1),
        "UnlockFile on invalid handle",
        &[ErrorKind::InvalidHandle],
    )?;
    Ok(format!("handle={}", HandleId::INVALID))
}

/// Two adjacent locks; releasing one frees exactly that range.
fn unlock_file_partial_unlock_then_access(ctx: &ProbeContext<'_>) -> ProbeResult {
    let (h1, h2) = two_handles(ctx)?;
    h1.lock(0, 5).setup("lock [0,5)")?;
    h1.lock(5, 5).setup("lock [5,10)")?;
    h1.unlock(5, 5).op("UnlockFile [5,10)")?;

    h2.write(Some(5), b"abcde").op("write to released range")?;
    expect_failure(
        h2.write(Some(0), b"x"),
        "write to range still locked",
        &[ErrorKind::LockViolation],
    )?;
    Ok("released=[5,10) held=[0,5)".to_string())
}

fn unlock_file_from_other_handle_fails(ctx: &ProbeContext<'_>) -> ProbeResult {
    let (h1, h2) = two_handles(ctx)?;
    h1.lock(0, 5).setup("lock [0,5)")?;
    expect_failure(
        h2.unlock(0, 5),
        "UnlockFile from non-owning handle",
        &[ErrorKind::NotLocked],
    )?;
    expect_failure(
        h2.write(Some(0), b"x"),
        "write while lock still held",
        &[ErrorKind::LockViolation],
    )?;
    Ok("region=[0,5)".to_string())
}

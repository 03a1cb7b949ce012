//! Information set through an open handle: delete-on-close, rename,
//! end of file and timestamps.

use std::path::PathBuf;

use fsconform_core::{Access, Disposition, ErrorKind, FileAttributes, FileTimes, RenameTarget};

use super::{mkdir, open_rw, read_back, seed, touch};
use crate::context::ProbeContext;
use crate::probe::{
    check, check_bytes, check_eq, expect_failure, Category, Probe, ProbeResult, ProbeResultExt,
};

pub fn probes() -> Vec<Probe> {
    use Category::HandleInformation;
    vec![
        Probe::new("HandleDeleteOnClose", HandleInformation, handle_delete_on_close),
        Probe::new(
            "HandleDeleteOnCloseCancelled",
            HandleInformation,
            handle_delete_on_close_cancelled,
        ),
        Probe::new("HandleTruncateFile", HandleInformation, handle_truncate_file),
        Probe::new("HandleDeleteReadOnlyFile", HandleInformation, handle_delete_read_only_file),
        Probe::new("HandleRename", HandleInformation, handle_rename),
        Probe::new("HandleRenameOverwrite", HandleInformation, handle_rename_overwrite),
        Probe::new("HandleRenameNoReplaceFails", HandleInformation, handle_rename_no_replace_fails),
        Probe::new("HandleRenameWithRoot", HandleInformation, handle_rename_with_root),
        Probe::new("HandleChangeTimes", HandleInformation, handle_change_times),
    ]
}

fn target(name: PathBuf, replace_if_exists: bool) -> RenameTarget {
    RenameTarget {
        root: None,
        name,
        replace_if_exists,
    }
}

fn handle_delete_on_close(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("temp.txt");
    seed(ctx, &path, b"transient")?;

    let handle = open_rw(ctx, &path)?;
    handle.set_delete_on_close(true).op("SetDeleteOnClose")?;
    check(
        ctx.oracle().exists(&path),
        "file while handle open",
        "present",
        "absent",
    )?;
    handle.close().op("CloseHandle")?;
    check(
        !ctx.oracle().exists(&path),
        "file after close",
        "absent",
        "present",
    )?;
    Ok("file=temp.txt".to_string())
}

fn handle_delete_on_close_cancelled(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("temp.txt");
    seed(ctx, &path, b"reprieve")?;

    let handle = open_rw(ctx, &path)?;
    handle.set_delete_on_close(true).setup("SetDeleteOnClose true")?;
    handle.set_delete_on_close(false).op("SetDeleteOnClose false")?;
    handle.close().setup("close")?;
    check(ctx.oracle().exists(&path), "file after close", "present", "absent")?;
    Ok("file=temp.txt".to_string())
}

fn handle_truncate_file(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("file.bin");
    seed(ctx, &path, b"0123456789")?;

    let handle = open_rw(ctx, &path)?;
    handle.set_len(3).op("SetFileInformation EndOfFile")?;
    check_eq("size through handle", 3, handle.size().setup("handle size")?)?;
    check_eq("size by path", 3, ctx.oracle().size(&path).setup("size")?)?;
    Ok("10->3".to_string())
}

fn handle_delete_read_only_file(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("protected.txt");
    touch(ctx, &path)?;
    ctx.oracle()
        .set_attributes(&path, FileAttributes::READ_ONLY)
        .setup("set ReadOnly")?;

    let handle = ctx
        .open(&path, Disposition::OpenExisting, Access::READ)
        .setup("open for read")?;
    expect_failure(
        handle.set_delete_on_close(true),
        "SetDeleteOnClose on read-only file",
        &[ErrorKind::AccessDenied],
    )?;
    handle.close().setup("close")?;
    check(ctx.oracle().exists(&path), "file", "present", "absent")?;
    Ok("file=protected.txt".to_string())
}

fn handle_rename(ctx: &ProbeContext<'_>) -> ProbeResult {
    let src = ctx.path("before.txt");
    let dst = ctx.path("after.txt");
    seed(ctx, &src, b"renamed")?;

    let handle = open_rw(ctx, &src)?;
    handle.rename(&target(dst.clone(), false)).op("SetFileInformation Rename")?;
    handle
        .write(Some(7), b"!")
        .op("WriteFile after rename")?;
    handle.close().setup("close")?;

    check(!ctx.oracle().exists(&src), "old name", "absent", "present")?;
    check_bytes("new name content", b"renamed!", &read_back(ctx, &dst)?)?;
    Ok("dst=after.txt".to_string())
}

fn handle_rename_overwrite(ctx: &ProbeContext<'_>) -> ProbeResult {
    let src = ctx.path("src.txt");
    let dst = ctx.path("dst.txt");
    seed(ctx, &src, b"winner")?;
    seed(ctx, &dst, b"loser")?;

    let handle = open_rw(ctx, &src)?;
    handle
        .rename(&target(dst.clone(), true))
        .op("SetFileInformation Rename with replace")?;
    handle.close().setup("close")?;

    check(!ctx.oracle().exists(&src), "old name", "absent", "present")?;
    check_bytes("destination content", b"winner", &read_back(ctx, &dst)?)?;
    Ok("replace=true".to_string())
}

fn handle_rename_no_replace_fails(ctx: &ProbeContext<'_>) -> ProbeResult {
    let src = ctx.path("src.txt");
    let dst = ctx.path("dst.txt");
    seed(ctx, &src, b"source")?;
    seed(ctx, &dst, b"keep")?;

    let handle = open_rw(ctx, &src)?;
    expect_failure(
        handle.rename(&target(dst.clone(), false)),
        "SetFileInformation Rename without replace",
        &[ErrorKind::AlreadyExists],
    )?;
    handle.close().setup("close")?;

    check(ctx.oracle().exists(&src), "source", "present", "absent")?;
    check_bytes("destination content", b"keep", &read_back(ctx, &dst)?)?;
    Ok("replace=false".to_string())
}

fn handle_rename_with_root(ctx: &ProbeContext<'_>) -> ProbeResult {
    let dir = ctx.path("dest");
    let src = ctx.path("file.txt");
    mkdir(ctx, &dir)?;
    seed(ctx, &src, b"relocated")?;

    let dir_handle = ctx
        .open(&dir, Disposition::OpenExisting, Access::READ)
        .setup("open directory")?;
    let handle = open_rw(ctx, &src)?;
    handle
        .rename(&RenameTarget {
            root: Some(dir_handle.id()),
            name: PathBuf::from("moved.txt"),
            replace_if_exists: false,
        })
        .op("SetFileInformation Rename relative to directory")?;
    handle.close().setup("close")?;
    dir_handle.close().setup("close directory")?;

    check(!ctx.oracle().exists(&src), "old name", "absent", "present")?;
    check_bytes(
        "content under root",
        b"relocated",
        &read_back(ctx, &dir.join("moved.txt"))?,
    )?;
    Ok("root=dest name=moved.txt".to_string())
}

fn handle_change_times(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("stamped.txt");
    seed(ctx, &path, b"tick")?;

    let handle = open_rw(ctx, &path)?;
    let before = handle.times().setup("query times")?;
    let wanted = FileTimes {
        created: before.created + 3600,
        modified: before.modified + 3600,
        accessed: before.accessed + 3600,
        ..before
    };
    handle.set_times(wanted).op("SetFileTime")?;
    let after = handle.times().setup("query times")?;
    check_eq("creation time", wanted.created, after.created)?;
    check_eq("modified time", wanted.modified, after.modified)?;
    check_eq("accessed time", wanted.accessed, after.accessed)?;
    Ok(format!("created=+3600s modified=+3600s ({})", after.modified))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{Runner, SettlePolicy};
    use fsconform_core::{
        DirEntry, EntityId, FreeSpace, FsOracle, FsResult, HandleId, MemoryFs, OpenRequest,
    };
    use std::path::Path;

    /// A volume that accepts new timestamps but keeps the original creation time.
    struct FrozenCreation(MemoryFs);

    impl FsOracle for FrozenCreation {
        fn name(&self) -> &str {
            "frozen-creation"
        }
        fn exists(&self, path: &Path) -> bool {
            self.0.exists(path)
        }
        fn size(&self, path: &Path) -> FsResult<u64> {
            self.0.size(path)
        }
        fn identity(&self, path: &Path) -> FsResult<EntityId> {
            self.0.identity(path)
        }
        fn create(&self, path: &Path, request: &OpenRequest) -> FsResult<HandleId> {
            self.0.create(path, request)
        }
        fn close(&self, handle: HandleId) -> FsResult<()> {
            self.0.close(handle)
        }
        fn create_hard_link(&self, link: &Path, target: &Path) -> FsResult<()> {
            self.0.create_hard_link(link, target)
        }
        fn create_symbolic_link(&self, link: &Path, target: &Path, dir: bool) -> FsResult<()> {
            self.0.create_symbolic_link(link, target, dir)
        }
        fn create_directory(&self, path: &Path) -> FsResult<()> {
            self.0.create_directory(path)
        }
        fn remove_directory(&self, path: &Path) -> FsResult<()> {
            self.0.remove_directory(path)
        }
        fn read_dir(&self, path: &Path) -> FsResult<Vec<DirEntry>> {
            self.0.read_dir(path)
        }
        fn copy(&self, src: &Path, dst: &Path, fail_if_exists: bool) -> FsResult<()> {
            self.0.copy(src, dst, fail_if_exists)
        }
        fn rename(&self, src: &Path, dst: &Path) -> FsResult<()> {
            self.0.rename(src, dst)
        }
        fn delete_file(&self, path: &Path) -> FsResult<()> {
            self.0.delete_file(path)
        }
        fn attributes(&self, path: &Path) -> FsResult<FileAttributes> {
            self.0.attributes(path)
        }
        fn set_attributes(&self, path: &Path, attributes: FileAttributes) -> FsResult<()> {
            self.0.set_attributes(path, attributes)
        }
        fn set_end_of_file(&self, handle: HandleId, len: u64) -> FsResult<()> {
            self.0.set_end_of_file(handle, len)
        }
        fn handle_size(&self, handle: HandleId) -> FsResult<u64> {
            self.0.handle_size(handle)
        }
        fn allocated_size(&self, path: &Path) -> FsResult<u64> {
            self.0.allocated_size(path)
        }
        fn set_sparse(&self, handle: HandleId) -> FsResult<()> {
            self.0.set_sparse(handle)
        }
        fn set_compressed(&self, handle: HandleId) -> FsResult<()> {
            self.0.set_compressed(handle)
        }
        fn lock(&self, handle: HandleId, offset: u64, len: u64) -> FsResult<()> {
            self.0.lock(handle, offset, len)
        }
        fn unlock(&self, handle: HandleId, offset: u64, len: u64) -> FsResult<()> {
            self.0.unlock(handle, offset, len)
        }
        fn read(&self, handle: HandleId, offset: Option<u64>, len: usize) -> FsResult<Vec<u8>> {
            self.0.read(handle, offset, len)
        }
        fn write(&self, handle: HandleId, offset: Option<u64>, data: &[u8]) -> FsResult<usize> {
            self.0.write(handle, offset, data)
        }
        fn flush(&self, handle: HandleId) -> FsResult<()> {
            self.0.flush(handle)
        }
        fn enumerate(&self, pattern: &Path) -> FsResult<Vec<DirEntry>> {
            self.0.enumerate(pattern)
        }
        fn free_space(&self, volume_root: &Path) -> FsResult<FreeSpace> {
            self.0.free_space(volume_root)
        }
        fn set_delete_on_close(&self, handle: HandleId, delete: bool) -> FsResult<()> {
            self.0.set_delete_on_close(handle, delete)
        }
        fn rename_by_handle(&self, handle: HandleId, target: &RenameTarget) -> FsResult<()> {
            self.0.rename_by_handle(handle, target)
        }
        fn file_times(&self, handle: HandleId) -> FsResult<FileTimes> {
            self.0.file_times(handle)
        }
        fn set_file_times(&self, handle: HandleId, times: FileTimes) -> FsResult<()> {
            let created = self.0.file_times(handle)?.created;
            self.0.set_file_times(handle, FileTimes { created, ..times })
        }
    }

    fn run_change_times(oracle: &dyn FsOracle) -> bool {
        oracle.create_directory(Path::new("/vol")).unwrap();
        let runner = Runner::new(oracle, "/vol").with_policy(SettlePolicy {
            delay_ms: 0,
            max_retries: 0,
            backoff_ms: 0,
        });
        let probe = Probe::new(
            "HandleChangeTimes",
            Category::HandleInformation,
            handle_change_times,
        );
        runner.run_probe(&probe).outcome.is_pass()
    }

    #[test]
    fn test_change_times_passes_on_memory_volume() {
        assert!(run_change_times(&MemoryFs::default()));
    }

    #[test]
    fn test_change_times_catches_ignored_creation_time() {
        assert!(!run_change_times(&FrozenCreation(MemoryFs::default())));
    }
}

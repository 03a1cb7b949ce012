//! Per-probe working directory and handle guards.

use std::path::{Path, PathBuf};

use fsconform_core::{
    Access, Disposition, FileAttributes, FileTimes, FsOracle, FsResult, HandleId, OpenRequest,
    RenameTarget,
};
use tracing::{debug, warn};

const READ_CHUNK: usize = 64 * 1024;

/// The isolated root a probe works under: `<volume root>/<probe name>`.
///
/// Entering scrubs any residue from an earlier run. The tree is removed again
/// by [`ProbeContext::teardown`], or on drop if nobody called it.
pub struct ProbeContext<'a> {
    oracle: &'a dyn FsOracle,
    volume_root: PathBuf,
    root: PathBuf,
    torn_down: bool,
}

impl<'a> ProbeContext<'a> {
    pub fn enter(oracle: &'a dyn FsOracle, volume_root: &Path, name: &str) -> FsResult<Self> {
        let root = volume_root.join(name);
        if oracle.exists(&root) {
            debug!(root = %root.display(), "removing residue from an earlier run");
            remove_entry(oracle, &root)?;
        }
        oracle.create_directory(&root)?;

        Ok(Self {
            oracle,
            volume_root: volume_root.to_path_buf(),
            root,
            torn_down: false,
        })
    }

    pub fn oracle(&self) -> &'a dyn FsOracle {
        self.oracle
    }

    /// The directory supplied to the harness.
    pub fn volume_root(&self) -> &Path {
        &self.volume_root
    }

    /// This probe's private directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    pub fn create(&self, path: &Path, request: &OpenRequest) -> FsResult<OpenHandle<'a>> {
        let id = self.oracle.create(path, request)?;
        Ok(OpenHandle::new(self.oracle, id))
    }

    pub fn open(
        &self,
        path: &Path,
        disposition: Disposition,
        access: Access,
    ) -> FsResult<OpenHandle<'a>> {
        self.create(path, &OpenRequest::new(disposition, access))
    }

    /// Replace the content of `path` with `data`.
    pub fn write_file(&self, path: &Path, data: &[u8]) -> FsResult<()> {
        let handle = self.open(path, Disposition::CreateAlways, Access::READ_WRITE)?;
        if !data.is_empty() {
            handle.write(Some(0), data)?;
        }
        handle.close()
    }

    pub fn read_file(&self, path: &Path) -> FsResult<Vec<u8>> {
        let handle = self.open(path, Disposition::OpenExisting, Access::READ)?;
        let mut content = Vec::new();
        loop {
            let chunk = handle.read(None, READ_CHUNK)?;
            if chunk.is_empty() {
                break;
            }
            content.extend_from_slice(&chunk);
        }
        handle.close()?;
        Ok(content)
    }

    pub fn create_dir(&self, path: &Path) -> FsResult<()> {
        self.oracle.create_directory(path)
    }

    /// Remove the probe directory and everything below it.
    pub fn teardown(mut self) -> FsResult<()> {
        self.torn_down = true;
        remove_entry(self.oracle, &self.root)
    }
}

impl Drop for ProbeContext<'_> {
    fn drop(&mut self) {
        if !self.torn_down {
            if let Err(err) = remove_entry(self.oracle, &self.root) {
                warn!(
                    root = %self.root.display(),
                    error = %err,
                    "failed to remove probe directory"
                );
            }
        }
    }
}

/// An open handle that is closed on every exit path.
pub struct OpenHandle<'a> {
    oracle: &'a dyn FsOracle,
    id: HandleId,
    open: bool,
}

impl<'a> OpenHandle<'a> {
    pub fn new(oracle: &'a dyn FsOracle, id: HandleId) -> Self {
        Self {
            oracle,
            id,
            open: true,
        }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn read(&self, offset: Option<u64>, len: usize) -> FsResult<Vec<u8>> {
        self.oracle.read(self.id, offset, len)
    }

    pub fn write(&self, offset: Option<u64>, data: &[u8]) -> FsResult<usize> {
        self.oracle.write(self.id, offset, data)
    }

    pub fn flush(&self) -> FsResult<()> {
        self.oracle.flush(self.id)
    }

    pub fn set_len(&self, len: u64) -> FsResult<()> {
        self.oracle.set_end_of_file(self.id, len)
    }

    pub fn size(&self) -> FsResult<u64> {
        self.oracle.handle_size(self.id)
    }

    pub fn lock(&self, offset: u64, len: u64) -> FsResult<()> {
        self.oracle.lock(self.id, offset, len)
    }

    pub fn unlock(&self, offset: u64, len: u64) -> FsResult<()> {
        self.oracle.unlock(self.id, offset, len)
    }

    pub fn set_sparse(&self) -> FsResult<()> {
        self.oracle.set_sparse(self.id)
    }

    pub fn set_compressed(&self) -> FsResult<()> {
        self.oracle.set_compressed(self.id)
    }

    pub fn set_delete_on_close(&self, delete: bool) -> FsResult<()> {
        self.oracle.set_delete_on_close(self.id, delete)
    }

    pub fn rename(&self, target: &RenameTarget) -> FsResult<()> {
        self.oracle.rename_by_handle(self.id, target)
    }

    pub fn times(&self) -> FsResult<FileTimes> {
        self.oracle.file_times(self.id)
    }

    pub fn set_times(&self, times: FileTimes) -> FsResult<()> {
        self.oracle.set_file_times(self.id, times)
    }

    /// Close now and surface the result.
    pub fn close(mut self) -> FsResult<()> {
        self.open = false;
        self.oracle.close(self.id)
    }
}

impl Drop for OpenHandle<'_> {
    fn drop(&mut self) {
        if self.open {
            if let Err(err) = self.oracle.close(self.id) {
                debug!(handle = %self.id, error = %err, "close on drop failed");
            }
        }
    }
}

/// Remove `path` whatever it is. Directories are emptied bottom-up with an
/// explicit stack; read-only bits are cleared before each removal.
pub fn remove_entry(oracle: &dyn FsOracle, path: &Path) -> FsResult<()> {
    let attributes = oracle.attributes(path)?;
    if !attributes.contains(FileAttributes::DIRECTORY)
        || attributes.contains(FileAttributes::REPARSE_POINT)
    {
        return remove_leaf(oracle, path, attributes);
    }

    let mut stack: Vec<(PathBuf, bool)> = vec![(path.to_path_buf(), false)];
    while let Some((dir, emptied)) = stack.pop() {
        if emptied {
            clear_read_only(oracle, &dir, FileAttributes::DIRECTORY);
            oracle.remove_directory(&dir)?;
            continue;
        }

        stack.push((dir.clone(), true));
        for entry in oracle.read_dir(&dir)? {
            let child = dir.join(&entry.name);
            if entry.is_dir() && !entry.is_reparse_point() {
                stack.push((child, false));
            } else {
                remove_leaf(oracle, &child, entry.attributes)?;
            }
        }
    }
    Ok(())
}

fn remove_leaf(oracle: &dyn FsOracle, path: &Path, attributes: FileAttributes) -> FsResult<()> {
    if attributes.contains(FileAttributes::REPARSE_POINT) {
        // Link entries are removed as themselves, never through the target.
        if attributes.contains(FileAttributes::DIRECTORY) {
            return oracle.remove_directory(path);
        }
        return oracle.delete_file(path);
    }
    clear_read_only(oracle, path, attributes);
    oracle.delete_file(path)
}

fn clear_read_only(oracle: &dyn FsOracle, path: &Path, attributes: FileAttributes) {
    if attributes.contains(FileAttributes::REPARSE_POINT) {
        return;
    }
    let current = oracle.attributes(path).unwrap_or(attributes);
    if current.intersects(FileAttributes::SETTABLE) {
        if let Err(err) = oracle.set_attributes(path, FileAttributes::NORMAL) {
            debug!(path = %path.display(), error = %err, "could not clear attributes");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsconform_core::MemoryFs;

    #[test]
    fn test_enter_scrubs_residue_and_teardown_removes_tree() {
        let fs = MemoryFs::default();
        let volume = Path::new("/vol");
        fs.create_directory(volume).unwrap();

        // Residue left by a previous, interrupted run.
        fs.create_directory(&volume.join("Probe")).unwrap();
        fs.create_directory(&volume.join("Probe/nested")).unwrap();
        let h = fs
            .create(
                &volume.join("Probe/nested/locked.txt"),
                &OpenRequest::new(Disposition::CreateNew, Access::READ_WRITE),
            )
            .unwrap();
        fs.close(h).unwrap();
        fs.set_attributes(
            &volume.join("Probe/nested/locked.txt"),
            FileAttributes::READ_ONLY | FileAttributes::HIDDEN,
        )
        .unwrap();

        let ctx = ProbeContext::enter(&fs, volume, "Probe").unwrap();
        assert!(fs.read_dir(ctx.root()).unwrap().is_empty());

        ctx.create_dir(&ctx.path("sub")).unwrap();
        ctx.write_file(&ctx.path("sub/data.bin"), b"abc").unwrap();
        fs.create_symbolic_link(&ctx.path("dirlink"), &ctx.path("sub"), true)
            .unwrap();
        ctx.teardown().unwrap();

        assert!(!fs.exists(&volume.join("Probe")));
        assert!(fs.read_dir(volume).unwrap().is_empty());
    }

    #[test]
    fn test_handles_close_on_drop() {
        let fs = MemoryFs::default();
        fs.create_directory(Path::new("/vol")).unwrap();
        {
            let ctx = ProbeContext::enter(&fs, Path::new("/vol"), "Drop").unwrap();
            let handle = ctx
                .open(&ctx.path("f"), Disposition::CreateNew, Access::READ_WRITE)
                .unwrap();
            handle.lock(0, 4).unwrap();
            assert_eq!(fs.open_handle_count(), 1);
        }
        assert_eq!(fs.open_handle_count(), 0);
        assert_eq!(fs.lock_count(), 0);
        assert!(!fs.exists(Path::new("/vol/Drop")));
    }

    #[test]
    fn test_read_file_spans_chunks() {
        let fs = MemoryFs::default();
        fs.create_directory(Path::new("/vol")).unwrap();
        let ctx = ProbeContext::enter(&fs, Path::new("/vol"), "Chunks").unwrap();
        let data = vec![b'q'; READ_CHUNK * 2 + 7];
        ctx.write_file(&ctx.path("big"), &data).unwrap();
        assert_eq!(ctx.read_file(&ctx.path("big")).unwrap(), data);
        ctx.teardown().unwrap();
    }
}

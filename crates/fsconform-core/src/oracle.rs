//! The narrow operation interface every probe goes through.

use std::path::Path;

use crate::error::FsResult;
use crate::types::{
    DirEntry, EntityId, FileAttributes, FileTimes, FreeSpace, HandleId, OpenRequest,
    RenameTarget,
};

/// Primitive file-system operations of the system under test.
///
/// Implementations classify every failure into an [`crate::FsError`]; none of
/// these methods may panic on an expected domain condition, and a handle that
/// was never issued (or was already closed) yields `InvalidHandle`.
pub trait FsOracle: Send + Sync {
    /// Short back-end name for logs.
    fn name(&self) -> &str;

    // Existence and identity

    /// True when the path names any entry. A final symbolic link is not followed.
    fn exists(&self, path: &Path) -> bool;
    fn size(&self, path: &Path) -> FsResult<u64>;
    fn identity(&self, path: &Path) -> FsResult<EntityId>;

    // Creation and handles

    fn create(&self, path: &Path, request: &OpenRequest) -> FsResult<HandleId>;
    fn close(&self, handle: HandleId) -> FsResult<()>;

    // Links

    fn create_hard_link(&self, link: &Path, target: &Path) -> FsResult<()>;
    fn create_symbolic_link(&self, link: &Path, target: &Path, is_directory: bool) -> FsResult<()>;

    // Directory lifecycle

    fn create_directory(&self, path: &Path) -> FsResult<()>;
    fn remove_directory(&self, path: &Path) -> FsResult<()>;
    /// Every child of a directory, hidden ones included, without `.` and `..`.
    fn read_dir(&self, path: &Path) -> FsResult<Vec<DirEntry>>;

    // Copy, move and delete

    fn copy(&self, src: &Path, dst: &Path, fail_if_exists: bool) -> FsResult<()>;
    /// Move without ever replacing an existing destination.
    fn rename(&self, src: &Path, dst: &Path) -> FsResult<()>;
    fn delete_file(&self, path: &Path) -> FsResult<()>;

    // Attributes

    fn attributes(&self, path: &Path) -> FsResult<FileAttributes>;
    fn set_attributes(&self, path: &Path, attributes: FileAttributes) -> FsResult<()>;

    // Size and allocation

    fn set_end_of_file(&self, handle: HandleId, len: u64) -> FsResult<()>;
    fn handle_size(&self, handle: HandleId) -> FsResult<u64>;
    fn allocated_size(&self, path: &Path) -> FsResult<u64>;
    fn set_sparse(&self, handle: HandleId) -> FsResult<()>;
    fn set_compressed(&self, handle: HandleId) -> FsResult<()>;

    // Byte-range locking

    fn lock(&self, handle: HandleId, offset: u64, len: u64) -> FsResult<()>;
    fn unlock(&self, handle: HandleId, offset: u64, len: u64) -> FsResult<()>;

    // Data

    /// Read up to `len` bytes. `None` reads at the handle cursor and advances it.
    fn read(&self, handle: HandleId, offset: Option<u64>, len: usize) -> FsResult<Vec<u8>>;
    /// Write `data`. `None` writes at the handle cursor and advances it.
    fn write(&self, handle: HandleId, offset: Option<u64>, data: &[u8]) -> FsResult<usize>;
    fn flush(&self, handle: HandleId) -> FsResult<()>;

    // Enumeration and volume

    /// Entries of the parent directory whose names match the final component.
    fn enumerate(&self, pattern: &Path) -> FsResult<Vec<DirEntry>>;
    fn free_space(&self, volume_root: &Path) -> FsResult<FreeSpace>;

    // Handle information

    fn set_delete_on_close(&self, handle: HandleId, delete: bool) -> FsResult<()>;
    fn rename_by_handle(&self, handle: HandleId, target: &RenameTarget) -> FsResult<()>;
    fn file_times(&self, handle: HandleId) -> FsResult<FileTimes>;
    fn set_file_times(&self, handle: HandleId, times: FileTimes) -> FsResult<()>;
}

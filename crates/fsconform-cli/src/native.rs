//! The host file system (Linux) as an oracle.
//!
//! Semantics the host does not provide are emulated here so the probe
//! library keeps a single contract:
//!
//! * the ReadOnly bit is enforced on open, delete and overwrite, also for
//!   privileged users that bypass permission bits;
//! * Hidden, System and Sparse live in a user extended attribute;
//! * byte-range locks are open-file-description locks, and reads and writes
//!   through this oracle check them before touching data.

use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::fs::{self, File, OpenOptions, Permissions};
use std::io::{self, Write};
use std::os::fd::AsRawFd;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{symlink, FileExt, MetadataExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fsconform_core::{
    is_wildcard, Access, CaseSensitivity, DirEntry, Disposition, EntityId, FileAttributes,
    FileTimes, FreeSpace, FsError, FsOracle, FsResult, HandleId, NamePattern, OpenRequest,
    RenameTarget,
};
use nix::errno::Errno;
use nix::fcntl::{fcntl, renameat2, FcntlArg, RenameFlags, AT_FDCWD};
use nix::sys::statvfs::statvfs;
use tracing::debug;

const ATTRIBUTE_XATTR: &CStr = c"user.fsconform.attributes";

/// Bits kept in [`ATTRIBUTE_XATTR`].
const STORED_BITS: FileAttributes = FileAttributes::from_bits(
    FileAttributes::HIDDEN.bits() | FileAttributes::SYSTEM.bits() | FileAttributes::SPARSE.bits(),
);

const FS_COMPR_FL: libc::c_long = 0x0000_0004;

nix::ioctl_read!(get_inode_flags, b'f', 1, libc::c_long);
nix::ioctl_write_ptr!(set_inode_flags, b'f', 2, libc::c_long);

struct NativeHandle {
    file: File,
    path: PathBuf,
    access: Access,
    cursor: u64,
    /// Regions this handle locked, as `(offset, len)`.
    locks: Vec<(u64, u64)>,
    delete_on_close: bool,
}

#[derive(Default)]
struct HandleTable {
    next: u64,
    handles: HashMap<HandleId, NativeHandle>,
}

/// Host file-system oracle
#[derive(Default)]
pub struct NativeFs {
    table: Mutex<HandleTable>,
}

impl NativeFs {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, HandleTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_handle<T>(
        &self,
        id: HandleId,
        f: impl FnOnce(&mut NativeHandle) -> FsResult<T>,
    ) -> FsResult<T> {
        let mut table = self.table();
        let handle = table.handles.get_mut(&id).ok_or(FsError::InvalidHandle)?;
        f(handle)
    }

    /// Handles opened at or below `from` now live below `to`.
    fn follow_move(&self, from: &Path, to: &Path) {
        let mut table = self.table();
        for handle in table.handles.values_mut() {
            if let Ok(rest) = handle.path.strip_prefix(from) {
                handle.path = if rest.as_os_str().is_empty() {
                    to.to_path_buf()
                } else {
                    to.join(rest)
                };
            }
        }
    }

    fn move_entry(&self, src: &Path, dst: &Path, replace: bool) -> FsResult<()> {
        fs::symlink_metadata(src)?;
        if replace {
            if let Ok(existing) = fs::symlink_metadata(dst) {
                let source = fs::symlink_metadata(src)?;
                let same = existing.dev() == source.dev() && existing.ino() == source.ino();
                if !same && (existing.is_dir() || is_read_only(&existing)) {
                    return Err(FsError::AccessDenied);
                }
            }
            fs::rename(src, dst)?;
        } else {
            rename_no_replace(src, dst)?;
        }
        debug!(from = %src.display(), to = %dst.display(), "moved entry");
        self.follow_move(src, dst);
        Ok(())
    }
}

impl FsOracle for NativeFs {
    fn name(&self) -> &str {
        "native"
    }

    fn exists(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok()
    }

    fn size(&self, path: &Path) -> FsResult<u64> {
        let meta = fs::metadata(path)?;
        Ok(if meta.is_dir() { 0 } else { meta.len() })
    }

    fn identity(&self, path: &Path) -> FsResult<EntityId> {
        let meta = fs::metadata(path)?;
        Ok(EntityId {
            volume: meta.dev(),
            index: meta.ino(),
        })
    }

    fn create(&self, path: &Path, request: &OpenRequest) -> FsResult<HandleId> {
        let disposition = request.disposition;
        let access = request.access;
        let truncates = matches!(
            disposition,
            Disposition::CreateAlways | Disposition::TruncateExisting
        );

        let existing = match fs::metadata(path) {
            Ok(meta) => Some(meta),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                // A dangling link still occupies its name.
                if fs::symlink_metadata(path).is_ok() {
                    return Err(match disposition {
                        Disposition::CreateNew => FsError::AlreadyExists,
                        _ => FsError::NotFound,
                    });
                }
                None
            }
            Err(err) => return Err(err.into()),
        };

        if let Some(meta) = &existing {
            if disposition == Disposition::CreateNew {
                return Err(FsError::AlreadyExists);
            }
            let wants_write = access.can_write() || truncates;
            if wants_write && (meta.is_dir() || is_read_only(meta)) {
                return Err(FsError::AccessDenied);
            }
            if disposition == Disposition::TruncateExisting && !access.can_write() {
                return Err(FsError::AccessDenied);
            }
        }

        let creation = match disposition {
            Disposition::CreateNew => libc::O_CREAT | libc::O_EXCL,
            Disposition::CreateAlways => libc::O_CREAT | libc::O_TRUNC,
            Disposition::OpenAlways => libc::O_CREAT,
            Disposition::TruncateExisting => libc::O_TRUNC,
            Disposition::OpenExisting => 0,
        };
        let file = OpenOptions::new()
            .read(access.read || !access.can_write())
            .write(access.write)
            .append(access.append)
            .custom_flags(creation)
            .mode(0o666)
            .open(path)?;

        if existing.is_none() || disposition == Disposition::CreateAlways {
            self.set_attributes(path, request.attributes)?;
        }

        let mut table = self.table();
        table.next += 1;
        let id = HandleId::new(table.next);
        table.handles.insert(
            id,
            NativeHandle {
                file,
                path: path.to_path_buf(),
                access,
                cursor: 0,
                locks: Vec::new(),
                delete_on_close: false,
            },
        );
        debug!(path = %path.display(), handle = %id, ?disposition, "opened");
        Ok(id)
    }

    fn close(&self, id: HandleId) -> FsResult<()> {
        let handle = self
            .table()
            .handles
            .remove(&id)
            .ok_or(FsError::InvalidHandle)?;
        let NativeHandle {
            file,
            path,
            delete_on_close,
            ..
        } = handle;
        // Closing the description releases its locks.
        drop(file);

        if delete_on_close {
            let removed = match fs::symlink_metadata(&path) {
                Ok(meta) if meta.is_dir() => fs::remove_dir(&path),
                Ok(_) => fs::remove_file(&path),
                Err(err) => Err(err),
            };
            match removed {
                Ok(()) => debug!(path = %path.display(), "deleted on close"),
                Err(err) => debug!(path = %path.display(), error = %err, "delete on close skipped"),
            }
        }
        Ok(())
    }

    fn create_hard_link(&self, link: &Path, target: &Path) -> FsResult<()> {
        if fs::symlink_metadata(target)?.is_dir() {
            return Err(FsError::AccessDenied);
        }
        fs::hard_link(target, link)?;
        Ok(())
    }

    fn create_symbolic_link(&self, link: &Path, target: &Path, is_directory: bool) -> FsResult<()> {
        symlink(target, link)?;
        debug!(
            link = %link.display(),
            target = %target.display(),
            is_directory,
            "created symbolic link"
        );
        Ok(())
    }

    fn create_directory(&self, path: &Path) -> FsResult<()> {
        fs::create_dir(path)?;
        Ok(())
    }

    fn remove_directory(&self, path: &Path) -> FsResult<()> {
        let meta = fs::symlink_metadata(path)?;
        if meta.file_type().is_symlink() {
            if !target_is_dir(path) {
                return Err(FsError::NotADirectory);
            }
            fs::remove_file(path)?;
            return Ok(());
        }
        if !meta.is_dir() {
            return Err(FsError::NotADirectory);
        }
        if fs::read_dir(path)?.next().is_some() {
            return Err(FsError::NotEmpty);
        }
        if is_read_only(&meta) {
            return Err(FsError::AccessDenied);
        }
        fs::remove_dir(path)?;
        Ok(())
    }

    fn read_dir(&self, path: &Path) -> FsResult<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for item in fs::read_dir(path)? {
            let item = item?;
            let name = item.file_name().to_string_lossy().into_owned();
            entries.push(dir_entry(&item.path(), name)?);
        }
        Ok(entries)
    }

    fn copy(&self, src: &Path, dst: &Path, fail_if_exists: bool) -> FsResult<()> {
        let source = fs::metadata(src)?;
        if source.is_dir() {
            return Err(FsError::AccessDenied);
        }
        match fs::metadata(dst) {
            Ok(existing) => {
                if existing.dev() == source.dev() && existing.ino() == source.ino() {
                    return Err(FsError::AccessDenied);
                }
                if fail_if_exists {
                    return Err(FsError::AlreadyExists);
                }
                if existing.is_dir() || is_read_only(&existing) {
                    return Err(FsError::AccessDenied);
                }
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        fs::copy(src, dst)?;
        let settable = self
            .attributes(src)?
            .intersection(FileAttributes::SETTABLE);
        self.set_attributes(dst, settable)
    }

    fn rename(&self, src: &Path, dst: &Path) -> FsResult<()> {
        self.move_entry(src, dst, false)
    }

    fn delete_file(&self, path: &Path) -> FsResult<()> {
        let meta = fs::symlink_metadata(path)?;
        if meta.file_type().is_symlink() {
            if target_is_dir(path) {
                return Err(FsError::IsADirectory);
            }
        } else if meta.is_dir() {
            return Err(FsError::IsADirectory);
        } else if is_read_only(&meta) {
            return Err(FsError::AccessDenied);
        }
        fs::remove_file(path)?;
        debug!(path = %path.display(), "deleted file");
        Ok(())
    }

    fn attributes(&self, path: &Path) -> FsResult<FileAttributes> {
        let meta = fs::symlink_metadata(path)?;
        attributes_of(path, &meta)
    }

    fn set_attributes(&self, path: &Path, attributes: FileAttributes) -> FsResult<()> {
        let meta = fs::symlink_metadata(path)?;
        if meta.file_type().is_symlink() {
            // Links carry neither a mode nor user attributes on Linux.
            if attributes.intersects(FileAttributes::SETTABLE) {
                return Err(FsError::Unsupported);
            }
            return Ok(());
        }
        let stored = load_flags(path)?;
        let wanted = stored.intersection(FileAttributes::SPARSE)
            | attributes.intersection(FileAttributes::HIDDEN | FileAttributes::SYSTEM);
        if wanted != stored {
            // Writing an extended attribute needs a writable inode.
            set_read_only(path, &meta, false)?;
            store_flags(path, wanted)?;
        }
        set_read_only(
            path,
            &fs::metadata(path)?,
            attributes.contains(FileAttributes::READ_ONLY),
        )
    }

    fn set_end_of_file(&self, handle: HandleId, len: u64) -> FsResult<()> {
        self.with_handle(handle, |h| {
            if !h.access.can_write() {
                return Err(FsError::AccessDenied);
            }
            h.file.set_len(len)?;
            Ok(())
        })
    }

    fn handle_size(&self, handle: HandleId) -> FsResult<u64> {
        self.with_handle(handle, |h| Ok(h.file.metadata()?.len()))
    }

    fn allocated_size(&self, path: &Path) -> FsResult<u64> {
        Ok(fs::metadata(path)?.blocks() * 512)
    }

    fn set_sparse(&self, handle: HandleId) -> FsResult<()> {
        self.with_handle(handle, |h| {
            if !h.access.can_write() {
                return Err(FsError::AccessDenied);
            }
            // Unwritten ranges are holes already; only the bit is recorded.
            let flags = load_flags(&h.path)? | FileAttributes::SPARSE;
            match store_flags(&h.path, flags) {
                Err(FsError::Unsupported) => {
                    debug!(path = %h.path.display(), "sparse bit not recorded");
                    Ok(())
                }
                other => other,
            }
        })
    }

    fn set_compressed(&self, handle: HandleId) -> FsResult<()> {
        self.with_handle(handle, |h| {
            if !h.access.can_write() {
                return Err(FsError::AccessDenied);
            }
            let fd = h.file.as_raw_fd();
            let mut flags: libc::c_long = 0;
            // SAFETY: `fd` is open for the duration of the call and `flags`
            // outlives it.
            unsafe { get_inode_flags(fd, &mut flags) }.map_err(inode_flag_error)?;
            flags |= FS_COMPR_FL;
            // SAFETY: as above.
            unsafe { set_inode_flags(fd, &flags) }.map_err(inode_flag_error)?;
            Ok(())
        })
    }

    fn lock(&self, handle: HandleId, offset: u64, len: u64) -> FsResult<()> {
        self.with_handle(handle, |h| {
            if len == 0 || offset.checked_add(len).is_none() {
                return Err(FsError::InvalidArgument);
            }
            if h.locks.iter().any(|&(o, l)| overlaps(o, l, offset, len)) {
                return Err(FsError::LockViolation);
            }
            set_lock(&h.file, libc::F_WRLCK as libc::c_short, offset, len)?;
            h.locks.push((offset, len));
            Ok(())
        })
    }

    fn unlock(&self, handle: HandleId, offset: u64, len: u64) -> FsResult<()> {
        self.with_handle(handle, |h| {
            let index = h
                .locks
                .iter()
                .position(|&region| region == (offset, len))
                .ok_or(FsError::NotLocked)?;
            set_lock(&h.file, libc::F_UNLCK as libc::c_short, offset, len)?;
            h.locks.remove(index);
            Ok(())
        })
    }

    fn read(&self, handle: HandleId, offset: Option<u64>, len: usize) -> FsResult<Vec<u8>> {
        self.with_handle(handle, |h| {
            if !h.access.read {
                return Err(FsError::AccessDenied);
            }
            let pos = offset.unwrap_or(h.cursor);
            check_conflict(&h.file, false, pos, len as u64)?;

            let mut buf = vec![0; len];
            let mut filled = 0;
            while filled < len {
                match h.file.read_at(&mut buf[filled..], pos + filled as u64) {
                    Ok(0) => break,
                    Ok(n) => filled += n,
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                    Err(err) => return Err(err.into()),
                }
            }
            buf.truncate(filled);
            if offset.is_none() {
                h.cursor = pos + filled as u64;
            }
            Ok(buf)
        })
    }

    fn write(&self, handle: HandleId, offset: Option<u64>, data: &[u8]) -> FsResult<usize> {
        self.with_handle(handle, |h| {
            if !h.access.can_write() {
                return Err(FsError::AccessDenied);
            }
            let pos = if h.access.append {
                h.file.metadata()?.len()
            } else {
                offset.unwrap_or(h.cursor)
            };
            check_conflict(&h.file, true, pos, data.len() as u64)?;

            if h.access.append {
                (&h.file).write_all(data)?;
            } else {
                h.file.write_all_at(data, pos)?;
            }
            if offset.is_none() || h.access.append {
                h.cursor = pos + data.len() as u64;
            }
            Ok(data.len())
        })
    }

    fn flush(&self, handle: HandleId) -> FsResult<()> {
        self.with_handle(handle, |h| Ok(h.file.sync_data()?))
    }

    fn enumerate(&self, pattern: &Path) -> FsResult<Vec<DirEntry>> {
        let name = pattern
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or(FsError::InvalidName)?;
        let parent = pattern.parent().ok_or(FsError::InvalidName)?;

        if !is_wildcard(name) {
            return Ok(vec![dir_entry(pattern, name.to_string())?]);
        }

        let matcher = NamePattern::new(name, CaseSensitivity::Sensitive)?;
        let listing = fs::read_dir(parent)?;
        let mut entries: Vec<DirEntry> = [".", ".."]
            .into_iter()
            .filter(|dot| matcher.matches(dot))
            .map(|dot| DirEntry {
                name: dot.to_string(),
                attributes: FileAttributes::DIRECTORY,
                len: 0,
            })
            .collect();

        for item in listing {
            let item = item?;
            let name = item.file_name().to_string_lossy().into_owned();
            if !matcher.matches(&name) {
                continue;
            }
            let entry = dir_entry(&item.path(), name)?;
            if !entry.attributes.contains(FileAttributes::HIDDEN) {
                entries.push(entry);
            }
        }

        if entries.is_empty() {
            return Err(FsError::NotFound);
        }
        Ok(entries)
    }

    fn free_space(&self, volume_root: &Path) -> FsResult<FreeSpace> {
        let stats = statvfs(volume_root).map_err(io::Error::from)?;
        let cluster_size = stats.fragment_size() as u64;
        let bytes_per_sector = if cluster_size % 512 == 0 { 512 } else { cluster_size };
        Ok(FreeSpace {
            cluster_size,
            bytes_per_sector,
            free_clusters: stats.blocks_available() as u64,
            total_clusters: stats.blocks() as u64,
        })
    }

    fn set_delete_on_close(&self, handle: HandleId, delete: bool) -> FsResult<()> {
        self.with_handle(handle, |h| {
            if delete {
                let meta = fs::symlink_metadata(&h.path)?;
                if is_read_only(&meta) {
                    return Err(FsError::AccessDenied);
                }
                if meta.is_dir() && fs::read_dir(&h.path)?.next().is_some() {
                    return Err(FsError::NotEmpty);
                }
            }
            h.delete_on_close = delete;
            Ok(())
        })
    }

    fn rename_by_handle(&self, handle: HandleId, target: &RenameTarget) -> FsResult<()> {
        let (src, dst) = {
            let table = self.table();
            let source = table.handles.get(&handle).ok_or(FsError::InvalidHandle)?;
            let dst = match target.root {
                Some(root) => {
                    if target.name.has_root() {
                        return Err(FsError::InvalidArgument);
                    }
                    let base = table.handles.get(&root).ok_or(FsError::InvalidHandle)?;
                    if !base.file.metadata()?.is_dir() {
                        return Err(FsError::InvalidArgument);
                    }
                    base.path.join(&target.name)
                }
                None => target.name.clone(),
            };
            (source.path.clone(), dst)
        };
        self.move_entry(&src, &dst, target.replace_if_exists)
    }

    fn file_times(&self, handle: HandleId) -> FsResult<FileTimes> {
        self.with_handle(handle, |h| {
            let meta = h.file.metadata()?;
            Ok(FileTimes {
                created: creation_time(&meta),
                accessed: meta.atime(),
                modified: meta.mtime(),
                changed: meta.ctime(),
            })
        })
    }

    fn set_file_times(&self, handle: HandleId, times: FileTimes) -> FsResult<()> {
        self.with_handle(handle, |h| {
            if times.created != creation_time(&h.file.metadata()?) {
                return Err(FsError::Unsupported);
            }
            let update = fs::FileTimes::new()
                .set_accessed(system_time(times.accessed))
                .set_modified(system_time(times.modified));
            h.file.set_times(update)?;
            Ok(())
        })
    }
}

fn is_read_only(meta: &fs::Metadata) -> bool {
    !meta.file_type().is_symlink() && meta.permissions().readonly()
}

fn target_is_dir(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
}

fn set_read_only(path: &Path, meta: &fs::Metadata, read_only: bool) -> FsResult<()> {
    let mode = meta.permissions().mode();
    let next = if read_only { mode & !0o222 } else { mode | 0o200 };
    if next != mode {
        fs::set_permissions(path, Permissions::from_mode(next))?;
    }
    Ok(())
}

fn attributes_of(path: &Path, meta: &fs::Metadata) -> FsResult<FileAttributes> {
    if meta.file_type().is_symlink() {
        let mut attrs = FileAttributes::REPARSE_POINT;
        if target_is_dir(path) {
            attrs |= FileAttributes::DIRECTORY;
        }
        return Ok(attrs);
    }

    let mut attrs = load_flags(path)?;
    if meta.permissions().readonly() {
        attrs |= FileAttributes::READ_ONLY;
    }
    if meta.is_dir() {
        attrs |= FileAttributes::DIRECTORY;
    } else if attrs.is_empty() {
        attrs = FileAttributes::NORMAL;
    }
    Ok(attrs)
}

fn dir_entry(path: &Path, name: String) -> FsResult<DirEntry> {
    let meta = fs::symlink_metadata(path)?;
    Ok(DirEntry {
        name,
        attributes: attributes_of(path, &meta)?,
        len: if meta.is_dir() { 0 } else { meta.len() },
    })
}

fn c_path(path: &Path) -> FsResult<CString> {
    CString::new(path.as_os_str().as_bytes()).map_err(|_| FsError::InvalidName)
}

fn load_flags(path: &Path) -> FsResult<FileAttributes> {
    let c_path = c_path(path)?;
    let mut buf = [0u8; 4];
    // SAFETY: both strings are NUL-terminated and `buf` is valid for its length.
    let rc = unsafe {
        libc::lgetxattr(
            c_path.as_ptr(),
            ATTRIBUTE_XATTR.as_ptr(),
            buf.as_mut_ptr().cast(),
            buf.len(),
        )
    };
    match Errno::result(rc) {
        Ok(4) => Ok(FileAttributes::from_bits(u32::from_le_bytes(buf)).intersection(STORED_BITS)),
        Ok(_) | Err(Errno::ENODATA) | Err(Errno::EOPNOTSUPP) => Ok(FileAttributes::empty()),
        Err(errno) => Err(io::Error::from(errno).into()),
    }
}

fn store_flags(path: &Path, flags: FileAttributes) -> FsResult<()> {
    let c_path = c_path(path)?;
    let flags = flags.intersection(STORED_BITS);
    let rc = if flags.is_empty() {
        // SAFETY: both strings are NUL-terminated.
        unsafe { libc::lremovexattr(c_path.as_ptr(), ATTRIBUTE_XATTR.as_ptr()) }
    } else {
        let value = flags.bits().to_le_bytes();
        // SAFETY: both strings are NUL-terminated and `value` is valid for its length.
        unsafe {
            libc::lsetxattr(
                c_path.as_ptr(),
                ATTRIBUTE_XATTR.as_ptr(),
                value.as_ptr().cast(),
                value.len(),
                0,
            )
        }
    };
    match Errno::result(rc) {
        Ok(_) => Ok(()),
        Err(Errno::ENODATA) if flags.is_empty() => Ok(()),
        Err(Errno::EOPNOTSUPP) if flags.is_empty() => Ok(()),
        Err(Errno::EOPNOTSUPP) => Err(FsError::Unsupported),
        Err(errno) => Err(io::Error::from(errno).into()),
    }
}

fn rename_no_replace(src: &Path, dst: &Path) -> FsResult<()> {
    match renameat2(AT_FDCWD, src, AT_FDCWD, dst, RenameFlags::RENAME_NOREPLACE) {
        Ok(()) => Ok(()),
        // Kernels or file systems without the flag.
        Err(Errno::ENOSYS) => rename_checked(src, dst),
        Err(Errno::EINVAL) if !dst.starts_with(src) => rename_checked(src, dst),
        Err(errno) => Err(io::Error::from(errno).into()),
    }
}

fn rename_checked(src: &Path, dst: &Path) -> FsResult<()> {
    if fs::symlink_metadata(dst).is_ok() {
        return Err(FsError::AlreadyExists);
    }
    fs::rename(src, dst)?;
    Ok(())
}

fn overlaps(a_offset: u64, a_len: u64, b_offset: u64, b_len: u64) -> bool {
    a_offset < b_offset.saturating_add(b_len) && b_offset < a_offset.saturating_add(a_len)
}

fn lock_region(kind: libc::c_short, offset: u64, len: u64) -> FsResult<libc::flock> {
    let start = libc::off_t::try_from(offset).map_err(|_| FsError::InvalidArgument)?;
    let len = libc::off_t::try_from(len).map_err(|_| FsError::InvalidArgument)?;
    // SAFETY: `flock` is plain data; all-zero is a valid value.
    let mut region: libc::flock = unsafe { std::mem::zeroed() };
    region.l_type = kind;
    region.l_whence = libc::SEEK_SET as libc::c_short;
    region.l_start = start;
    region.l_len = len;
    Ok(region)
}

fn set_lock(file: &File, kind: libc::c_short, offset: u64, len: u64) -> FsResult<()> {
    let region = lock_region(kind, offset, len)?;
    match fcntl(file, FcntlArg::F_OFD_SETLK(&region)) {
        Ok(_) => Ok(()),
        Err(Errno::EAGAIN) | Err(Errno::EACCES) => Err(FsError::LockViolation),
        Err(errno) => Err(io::Error::from(errno).into()),
    }
}

/// Fail when another description holds a lock over `[offset, offset+len)`.
fn check_conflict(file: &File, write: bool, offset: u64, len: u64) -> FsResult<()> {
    if len == 0 {
        return Ok(());
    }
    let kind = if write { libc::F_WRLCK } else { libc::F_RDLCK };
    let mut region = lock_region(kind as libc::c_short, offset, len)?;
    fcntl(file, FcntlArg::F_OFD_GETLK(&mut region)).map_err(io::Error::from)?;
    if region.l_type == libc::F_UNLCK as libc::c_short {
        Ok(())
    } else {
        Err(FsError::LockViolation)
    }
}

fn inode_flag_error(errno: Errno) -> FsError {
    match errno {
        Errno::ENOTTY | Errno::EOPNOTSUPP | Errno::EINVAL => FsError::Unsupported,
        other => io::Error::from(other).into(),
    }
}

/// Birth time where the file system records one, else the inode change time.
fn creation_time(meta: &fs::Metadata) -> i64 {
    meta.created()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .and_then(|d| i64::try_from(d.as_secs()).ok())
        .unwrap_or(meta.ctime())
}

fn system_time(seconds: i64) -> SystemTime {
    if seconds >= 0 {
        UNIX_EPOCH + Duration::from_secs(seconds.unsigned_abs())
    } else {
        UNIX_EPOCH - Duration::from_secs(seconds.unsigned_abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsconform_core::ErrorKind;
    use tempfile::TempDir;

    fn rw(disposition: Disposition) -> OpenRequest {
        OpenRequest::new(disposition, Access::READ_WRITE)
    }

    fn seed(fs: &NativeFs, path: &Path, data: &[u8]) {
        let h = fs.create(path, &rw(Disposition::CreateAlways)).unwrap();
        fs.write(h, Some(0), data).unwrap();
        fs.close(h).unwrap();
    }

    #[test]
    fn test_create_write_read_with_cursor() {
        let dir = TempDir::new().unwrap();
        let fs = NativeFs::new();
        let path = dir.path().join("file.txt");

        let h = fs.create(&path, &rw(Disposition::CreateNew)).unwrap();
        fs.write(h, None, b"ab").unwrap();
        fs.write(h, None, b"cd").unwrap();
        assert_eq!(fs.read(h, Some(1), 10).unwrap(), b"bcd");
        assert_eq!(fs.handle_size(h).unwrap(), 4);
        fs.close(h).unwrap();

        let err = fs.create(&path, &rw(Disposition::CreateNew)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(fs.size(&path).unwrap(), 4);
    }

    #[test]
    fn test_read_only_bit_is_enforced() {
        let dir = TempDir::new().unwrap();
        let fs = NativeFs::new();
        let path = dir.path().join("ro.txt");
        seed(&fs, &path, b"keep");
        fs.set_attributes(&path, FileAttributes::READ_ONLY).unwrap();

        assert!(fs.attributes(&path).unwrap().contains(FileAttributes::READ_ONLY));
        let err = fs.create(&path, &rw(Disposition::OpenExisting)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);
        assert_eq!(fs.delete_file(&path).unwrap_err().kind(), ErrorKind::AccessDenied);

        fs.set_attributes(&path, FileAttributes::NORMAL).unwrap();
        fs.delete_file(&path).unwrap();
        assert!(!fs.exists(&path));
    }

    #[test]
    fn test_locks_exclude_other_handles() {
        let dir = TempDir::new().unwrap();
        let fs = NativeFs::new();
        let path = dir.path().join("locked.bin");
        seed(&fs, &path, b"0123456789");

        let h1 = fs.create(&path, &rw(Disposition::OpenExisting)).unwrap();
        let h2 = fs.create(&path, &rw(Disposition::OpenExisting)).unwrap();
        fs.lock(h1, 0, 5).unwrap();

        let err = fs.write(h2, Some(0), b"x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LockViolation);
        fs.write(h2, Some(5), b"y").unwrap();
        fs.write(h1, Some(0), b"z").unwrap();

        assert_eq!(fs.unlock(h2, 0, 5).unwrap_err().kind(), ErrorKind::NotLocked);
        assert_eq!(fs.unlock(h1, 0, 4).unwrap_err().kind(), ErrorKind::NotLocked);
        fs.unlock(h1, 0, 5).unwrap();
        fs.write(h2, Some(0), b"w").unwrap();

        fs.close(h1).unwrap();
        fs.close(h2).unwrap();
    }

    #[test]
    fn test_rename_never_replaces() {
        let dir = TempDir::new().unwrap();
        let fs = NativeFs::new();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        seed(&fs, &a, b"a");
        seed(&fs, &b, b"b");

        assert_eq!(fs.rename(&a, &b).unwrap_err().kind(), ErrorKind::AlreadyExists);

        let parent = dir.path().join("parent");
        fs.create_directory(&parent).unwrap();
        fs.create_directory(&parent.join("child")).unwrap();
        let err = fs.rename(&parent, &parent.join("child/inner")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(fs.exists(&parent.join("child")));
    }

    #[test]
    fn test_enumerate_adds_dot_entries_and_reports_no_match() {
        let dir = TempDir::new().unwrap();
        let fs = NativeFs::new();
        seed(&fs, &dir.path().join("one.txt"), b"1");

        let entries = fs.enumerate(&dir.path().join("*")).unwrap();
        let mut names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, vec![".", "..", "one.txt"]);

        let err = fs.enumerate(&dir.path().join("*.xyz")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_invalid_handle_is_classified() {
        let fs = NativeFs::new();
        let err = fs.read(HandleId::INVALID, Some(0), 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidHandle);
        assert_eq!(fs.close(HandleId::INVALID).unwrap_err().kind(), ErrorKind::InvalidHandle);
    }

    #[test]
    fn test_delete_on_close_and_handle_rename() {
        let dir = TempDir::new().unwrap();
        let fs = NativeFs::new();
        let path = dir.path().join("temp.txt");
        seed(&fs, &path, b"temp");

        let h = fs.create(&path, &rw(Disposition::OpenExisting)).unwrap();
        let moved = dir.path().join("moved.txt");
        fs.rename_by_handle(
            h,
            &RenameTarget {
                root: None,
                name: moved.clone(),
                replace_if_exists: false,
            },
        )
        .unwrap();
        fs.set_delete_on_close(h, true).unwrap();
        assert!(fs.exists(&moved));
        fs.close(h).unwrap();

        assert!(!fs.exists(&path));
        assert!(!fs.exists(&moved));
    }

    #[test]
    fn test_access_is_checked_per_handle() {
        let dir = TempDir::new().unwrap();
        let fs = NativeFs::new();
        let path = dir.path().join("file.txt");
        seed(&fs, &path, b"data");

        let reader = fs
            .create(&path, &OpenRequest::new(Disposition::OpenExisting, Access::READ))
            .unwrap();
        assert_eq!(fs.write(reader, Some(0), b"x").unwrap_err().kind(), ErrorKind::AccessDenied);
        assert_eq!(fs.set_end_of_file(reader, 0).unwrap_err().kind(), ErrorKind::AccessDenied);
        fs.close(reader).unwrap();

        let writer = fs
            .create(&path, &OpenRequest::new(Disposition::OpenExisting, Access::WRITE))
            .unwrap();
        assert_eq!(fs.read(writer, Some(0), 4).unwrap_err().kind(), ErrorKind::AccessDenied);
        fs.close(writer).unwrap();
    }

    #[test]
    fn test_creation_time_change_is_unsupported() {
        let dir = TempDir::new().unwrap();
        let fs = NativeFs::new();
        let path = dir.path().join("stamped.txt");
        seed(&fs, &path, b"tick");

        let h = fs.create(&path, &rw(Disposition::OpenExisting)).unwrap();
        let before = fs.file_times(h).unwrap();
        let shifted = FileTimes {
            created: before.created + 3600,
            modified: before.modified + 3600,
            ..before
        };
        let err = fs.set_file_times(h, shifted).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        assert_eq!(fs.file_times(h).unwrap().modified, before.modified);

        let moved = FileTimes {
            modified: before.modified + 3600,
            ..before
        };
        fs.set_file_times(h, moved).unwrap();
        assert_eq!(fs.file_times(h).unwrap().modified, before.modified + 3600);
        fs.close(h).unwrap();
    }

    #[test]
    fn test_link_attributes_do_not_reach_target() {
        let dir = TempDir::new().unwrap();
        let fs = NativeFs::new();
        let target = dir.path().join("target.txt");
        let link = dir.path().join("link.txt");
        seed(&fs, &target, b"data");
        fs.create_symbolic_link(&link, &target, false).unwrap();

        let err = fs.set_attributes(&link, FileAttributes::HIDDEN).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        fs.set_attributes(&link, FileAttributes::NORMAL).unwrap();

        assert_eq!(fs.attributes(&target).unwrap(), FileAttributes::NORMAL);
        assert!(fs.attributes(&link).unwrap().contains(FileAttributes::REPARSE_POINT));
    }
}

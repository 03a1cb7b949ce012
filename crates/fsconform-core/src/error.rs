//! Error types for fsconform core

use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};

/// Portable classification of a failed file-system operation.
///
/// Probes assert on kinds, never on raw OS codes, so the same contract can be
/// checked against any back end.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    AccessDenied,
    NotEmpty,
    LockViolation,
    NotLocked,
    InvalidHandle,
    Unsupported,
    InvalidName,
    InvalidArgument,
    /// Transient "in use" condition; the runner may retry.
    Busy,
    Other,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NotFound",
            ErrorKind::AlreadyExists => "AlreadyExists",
            ErrorKind::AccessDenied => "AccessDenied",
            ErrorKind::NotEmpty => "NotEmpty",
            ErrorKind::LockViolation => "LockViolation",
            ErrorKind::NotLocked => "NotLocked",
            ErrorKind::InvalidHandle => "InvalidHandle",
            ErrorKind::Unsupported => "Unsupported",
            ErrorKind::InvalidName => "InvalidName",
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::Busy => "Busy",
            ErrorKind::Other => "Other",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core filesystem error type
#[derive(thiserror::Error, Debug)]
pub enum FsError {
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    #[error("access denied")]
    AccessDenied,
    #[error("directory not empty")]
    NotEmpty,
    #[error("region is locked by another handle")]
    LockViolation,
    #[error("region is not locked")]
    NotLocked,
    #[error("invalid handle")]
    InvalidHandle,
    #[error("unsupported")]
    Unsupported,
    #[error("name not allowed")]
    InvalidName,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("not a directory")]
    NotADirectory,
    #[error("is a directory")]
    IsADirectory,
    #[error("busy")]
    Busy,
    #[error("too many open files")]
    TooManyOpenFiles,
    #[error("no space left")]
    NoSpace,
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl FsError {
    /// Fold this error into the portable taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FsError::NotFound | FsError::NotADirectory => ErrorKind::NotFound,
            FsError::AlreadyExists => ErrorKind::AlreadyExists,
            FsError::AccessDenied | FsError::IsADirectory => ErrorKind::AccessDenied,
            FsError::NotEmpty => ErrorKind::NotEmpty,
            FsError::LockViolation => ErrorKind::LockViolation,
            FsError::NotLocked => ErrorKind::NotLocked,
            FsError::InvalidHandle => ErrorKind::InvalidHandle,
            FsError::Unsupported => ErrorKind::Unsupported,
            FsError::InvalidName => ErrorKind::InvalidName,
            FsError::InvalidArgument => ErrorKind::InvalidArgument,
            FsError::Busy => ErrorKind::Busy,
            FsError::TooManyOpenFiles | FsError::NoSpace => ErrorKind::Other,
            FsError::Io(err) => classify_io(err),
        }
    }

    /// True when the condition may clear up on its own.
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Busy
    }
}

pub type FsResult<T> = Result<T, FsError>;

/// Classify an `io::Error`, preferring the raw OS code when present.
pub fn classify_io(err: &io::Error) -> ErrorKind {
    if let Some(code) = err.raw_os_error() {
        #[cfg(windows)]
        return classify_win32(code as u32);
        #[cfg(unix)]
        return classify_errno(code);
        #[cfg(not(any(unix, windows)))]
        let _ = code;
    }

    match err.kind() {
        io::ErrorKind::NotFound => ErrorKind::NotFound,
        io::ErrorKind::AlreadyExists => ErrorKind::AlreadyExists,
        io::ErrorKind::PermissionDenied => ErrorKind::AccessDenied,
        io::ErrorKind::WouldBlock => ErrorKind::LockViolation,
        io::ErrorKind::InvalidInput => ErrorKind::InvalidArgument,
        io::ErrorKind::Unsupported => ErrorKind::Unsupported,
        _ => ErrorKind::Other,
    }
}

/// Classify a unix errno value.
#[cfg(unix)]
pub fn classify_errno(code: i32) -> ErrorKind {
    match code {
        libc::ENOENT | libc::ENOTDIR => ErrorKind::NotFound,
        libc::EEXIST => ErrorKind::AlreadyExists,
        libc::EACCES | libc::EPERM | libc::EISDIR | libc::EROFS => ErrorKind::AccessDenied,
        libc::ENOTEMPTY => ErrorKind::NotEmpty,
        libc::EBADF => ErrorKind::InvalidHandle,
        libc::EAGAIN => ErrorKind::LockViolation,
        libc::ENOTSUP | libc::ENOSYS | libc::ENOTTY => ErrorKind::Unsupported,
        libc::EBUSY | libc::ETXTBSY => ErrorKind::Busy,
        libc::EINVAL => ErrorKind::InvalidArgument,
        libc::ENAMETOOLONG => ErrorKind::InvalidName,
        // EWOULDBLOCK and EOPNOTSUPP alias EAGAIN and ENOTSUP on the common targets.
        #[allow(unreachable_patterns)]
        libc::EWOULDBLOCK => ErrorKind::LockViolation,
        #[allow(unreachable_patterns)]
        libc::EOPNOTSUPP => ErrorKind::Unsupported,
        _ => ErrorKind::Other,
    }
}

/// Classify a Win32 error code. Available on every platform so captured
/// codes from remote hosts can be classified too.
pub fn classify_win32(code: u32) -> ErrorKind {
    match code {
        2 | 3 => ErrorKind::NotFound,             // FILE_NOT_FOUND, PATH_NOT_FOUND
        80 | 183 => ErrorKind::AlreadyExists,     // FILE_EXISTS, ALREADY_EXISTS
        5 | 19 => ErrorKind::AccessDenied,        // ACCESS_DENIED, WRITE_PROTECT
        145 => ErrorKind::NotEmpty,               // DIR_NOT_EMPTY
        33 => ErrorKind::LockViolation,           // LOCK_VIOLATION
        158 => ErrorKind::NotLocked,              // NOT_LOCKED
        6 => ErrorKind::InvalidHandle,            // INVALID_HANDLE
        50 => ErrorKind::Unsupported,             // NOT_SUPPORTED
        32 => ErrorKind::Busy,                    // SHARING_VIOLATION
        // INVALID_NAME, BAD_PATHNAME, FILENAME_EXCED_RANGE
        123 | 161 | 206 => ErrorKind::InvalidName,
        87 => ErrorKind::InvalidArgument,         // INVALID_PARAMETER
        _ => ErrorKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_folds_variants() {
        assert_eq!(FsError::NotADirectory.kind(), ErrorKind::NotFound);
        assert_eq!(FsError::IsADirectory.kind(), ErrorKind::AccessDenied);
        assert_eq!(FsError::LockViolation.kind(), ErrorKind::LockViolation);
        assert!(FsError::Busy.is_transient());
        assert!(!FsError::NotLocked.is_transient());
    }

    #[test]
    fn test_classify_win32_table() {
        assert_eq!(classify_win32(2), ErrorKind::NotFound);
        assert_eq!(classify_win32(183), ErrorKind::AlreadyExists);
        assert_eq!(classify_win32(145), ErrorKind::NotEmpty);
        assert_eq!(classify_win32(33), ErrorKind::LockViolation);
        assert_eq!(classify_win32(158), ErrorKind::NotLocked);
        assert_eq!(classify_win32(6), ErrorKind::InvalidHandle);
        assert_eq!(classify_win32(32), ErrorKind::Busy);
        assert_eq!(classify_win32(9999), ErrorKind::Other);
    }

    #[cfg(unix)]
    #[test]
    fn test_classify_io_uses_errno() {
        let err = FsError::from(io::Error::from_raw_os_error(libc::ENOTEMPTY));
        assert_eq!(err.kind(), ErrorKind::NotEmpty);

        let err = FsError::from(io::Error::from_raw_os_error(libc::EISDIR));
        assert_eq!(err.kind(), ErrorKind::AccessDenied);
    }

    #[test]
    fn test_classify_io_without_os_code() {
        let err = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert_eq!(classify_io(&err), ErrorKind::NotFound);
    }
}

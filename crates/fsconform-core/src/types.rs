//! Core type definitions for fsconform

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// Opaque handle identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    /// A value no back end ever issues.
    pub const INVALID: HandleId = HandleId(u64::MAX);

    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of the stored entity behind a path. Equal for hard links.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EntityId {
    pub volume: u64,
    pub index: u64,
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}:{:x}", self.volume, self.index)
    }
}

/// Attribute bits, using the classic numeric layout so values read the same
/// as in any file manager.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FileAttributes(u32);

impl FileAttributes {
    pub const READ_ONLY: FileAttributes = FileAttributes(0x0001);
    pub const HIDDEN: FileAttributes = FileAttributes(0x0002);
    pub const SYSTEM: FileAttributes = FileAttributes(0x0004);
    pub const DIRECTORY: FileAttributes = FileAttributes(0x0010);
    pub const NORMAL: FileAttributes = FileAttributes(0x0080);
    pub const SPARSE: FileAttributes = FileAttributes(0x0200);
    pub const REPARSE_POINT: FileAttributes = FileAttributes(0x0400);
    pub const COMPRESSED: FileAttributes = FileAttributes(0x0800);

    /// Bits a caller may change through `set_attributes`.
    pub const SETTABLE: FileAttributes = FileAttributes(0x0001 | 0x0002 | 0x0004);

    const NAMES: [(FileAttributes, &'static str); 8] = [
        (Self::READ_ONLY, "ReadOnly"),
        (Self::HIDDEN, "Hidden"),
        (Self::SYSTEM, "System"),
        (Self::DIRECTORY, "Directory"),
        (Self::NORMAL, "Normal"),
        (Self::SPARSE, "Sparse"),
        (Self::REPARSE_POINT, "ReparsePoint"),
        (Self::COMPRESSED, "Compressed"),
    ];

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn contains(self, other: FileAttributes) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: FileAttributes) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn intersection(self, other: FileAttributes) -> Self {
        Self(self.0 & other.0)
    }

    pub fn difference(self, other: FileAttributes) -> Self {
        Self(self.0 & !other.0)
    }
}

impl BitOr for FileAttributes {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for FileAttributes {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for FileAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileAttributes({self})")
    }
}

impl fmt::Display for FileAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("(none)");
        }
        let mut first = true;
        for (bit, name) in Self::NAMES {
            if self.contains(bit) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        let unknown = self.0 & !Self::NAMES.iter().fold(0, |acc, (bit, _)| acc | bit.0);
        if unknown != 0 {
            if !first {
                f.write_str("|")?;
            }
            write!(f, "{unknown:#x}")?;
        }
        Ok(())
    }
}

/// Creation policy for `create`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Disposition {
    /// Fail with AlreadyExists if present, else create empty.
    CreateNew,
    /// Create empty, truncating if present.
    CreateAlways,
    /// Fail with NotFound if absent.
    OpenExisting,
    /// Create if absent, open without truncating if present.
    OpenAlways,
    /// Fail with NotFound if absent, else truncate to zero.
    TruncateExisting,
}

/// Requested access for a handle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Access {
    pub read: bool,
    pub write: bool,
    /// Writes always land at the logical end of the file.
    pub append: bool,
}

impl Access {
    pub const READ: Access = Access {
        read: true,
        write: false,
        append: false,
    };
    pub const WRITE: Access = Access {
        read: false,
        write: true,
        append: false,
    };
    pub const READ_WRITE: Access = Access {
        read: true,
        write: true,
        append: false,
    };
    pub const APPEND: Access = Access {
        read: false,
        write: false,
        append: true,
    };

    pub fn can_write(self) -> bool {
        self.write || self.append
    }
}

/// Arguments for `FsOracle::create`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenRequest {
    pub disposition: Disposition,
    pub access: Access,
    /// Attributes applied when the call creates (or truncates) the file.
    pub attributes: FileAttributes,
}

impl OpenRequest {
    pub fn new(disposition: Disposition, access: Access) -> Self {
        Self {
            disposition,
            access,
            attributes: FileAttributes::NORMAL,
        }
    }

    pub fn with_attributes(mut self, attributes: FileAttributes) -> Self {
        self.attributes = attributes;
        self
    }
}

/// File timestamps, in seconds since the unix epoch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileTimes {
    pub created: i64,
    pub accessed: i64,
    pub modified: i64,
    pub changed: i64,
}

/// Directory entry information
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub attributes: FileAttributes,
    pub len: u64,
}

impl DirEntry {
    pub fn is_dir(&self) -> bool {
        self.attributes.contains(FileAttributes::DIRECTORY)
    }

    pub fn is_reparse_point(&self) -> bool {
        self.attributes.contains(FileAttributes::REPARSE_POINT)
    }

    /// `.` and `..`
    pub fn is_dot_entry(&self) -> bool {
        self.name == "." || self.name == ".."
    }
}

/// Volume geometry and free clusters
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FreeSpace {
    pub cluster_size: u64,
    pub bytes_per_sector: u64,
    pub free_clusters: u64,
    pub total_clusters: u64,
}

/// Destination of a rename issued through a handle
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenameTarget {
    /// Directory handle `name` is relative to. Without it, `name` is a full path.
    pub root: Option<HandleId>,
    pub name: std::path::PathBuf,
    pub replace_if_exists: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_display() {
        let attrs = FileAttributes::READ_ONLY | FileAttributes::HIDDEN;
        assert_eq!(attrs.to_string(), "ReadOnly|Hidden");
        assert_eq!(FileAttributes::empty().to_string(), "(none)");
        assert_eq!(FileAttributes::from_bits(0x8000_0000).to_string(), "0x80000000");
    }

    #[test]
    fn test_attribute_contains() {
        let attrs = FileAttributes::DIRECTORY | FileAttributes::REPARSE_POINT;
        assert!(attrs.contains(FileAttributes::DIRECTORY));
        assert!(!attrs.contains(FileAttributes::HIDDEN));
        assert!(!attrs.contains(FileAttributes::empty()));
        assert_eq!(attrs.difference(FileAttributes::DIRECTORY), FileAttributes::REPARSE_POINT);
    }
}

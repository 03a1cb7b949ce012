//! fsconform core: the filesystem oracle interface and its reference volume
//!
//! This crate defines the operation surface conformance probes use
//! ([`FsOracle`]), the portable error taxonomy ([`ErrorKind`]) that OS codes
//! are folded into, and [`MemoryFs`], an in-memory volume implementing the
//! expected semantics.

pub mod config;
pub mod error;
pub mod oracle;
pub mod pattern;
pub mod storage;
pub mod types;
pub mod vfs;

// Re-export key types for convenience
pub use config::{CaseSensitivity, FsConfig, FsLimits, VolumeGeometry};
pub use error::{classify_io, classify_win32, ErrorKind, FsError, FsResult};
pub use oracle::FsOracle;
pub use pattern::{is_wildcard, NamePattern};
pub use types::*;
pub use vfs::MemoryFs;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FsError::NotFound;
        assert_eq!(err.to_string(), "not found");
        assert_eq!(FsError::NotLocked.kind().to_string(), "NotLocked");
    }

    #[test]
    fn test_config_creation() {
        let config = FsConfig {
            case_sensitivity: CaseSensitivity::Sensitive,
            volume: VolumeGeometry {
                bytes_per_sector: 512,
                sectors_per_cluster: 1,
                total_clusters: 128,
            },
            limits: FsLimits {
                max_open_handles: 16,
                max_symlink_depth: 4,
            },
        };
        let fs = MemoryFs::new(config);
        let space = fs.free_space(std::path::Path::new("/")).unwrap();
        assert_eq!(space.cluster_size, 512);
        assert_eq!(space.free_clusters, 128);
    }
}

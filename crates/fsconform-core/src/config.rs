//! Configuration types for the in-memory reference volume

use serde::{Deserialize, Serialize};

/// Case sensitivity modes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaseSensitivity {
    Sensitive,
    InsensitivePreserving,
}

/// Volume geometry used for allocation and free-space accounting
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeGeometry {
    pub bytes_per_sector: u32,
    pub sectors_per_cluster: u32,
    pub total_clusters: u64,
}

impl VolumeGeometry {
    pub fn cluster_size(&self) -> u64 {
        u64::from(self.bytes_per_sector) * u64::from(self.sectors_per_cluster)
    }
}

impl Default for VolumeGeometry {
    fn default() -> Self {
        Self {
            bytes_per_sector: 512,
            sectors_per_cluster: 8,
            total_clusters: 262_144, // 1 GiB at 4 KiB clusters
        }
    }
}

/// System limits
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FsLimits {
    pub max_open_handles: u32,
    pub max_symlink_depth: u32,
}

impl Default for FsLimits {
    fn default() -> Self {
        Self {
            max_open_handles: 10000,
            max_symlink_depth: 40,
        }
    }
}

/// Main filesystem configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FsConfig {
    pub case_sensitivity: CaseSensitivity,
    pub volume: VolumeGeometry,
    pub limits: FsLimits,
}

impl FsConfig {
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            case_sensitivity: CaseSensitivity::InsensitivePreserving,
            volume: VolumeGeometry::default(),
            limits: FsLimits::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let config = FsConfig::from_json(r#"{ "volume": { "total_clusters": 64 } }"#).unwrap();
        assert_eq!(config.volume.total_clusters, 64);
        assert_eq!(config.volume.cluster_size(), 4096);
        assert_eq!(config.case_sensitivity, CaseSensitivity::InsensitivePreserving);
        assert_eq!(config.limits.max_symlink_depth, 40);
    }
}

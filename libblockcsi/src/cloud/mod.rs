//! Remote block-storage backend.
//!
//! [`Cloud`] is the only collaborator the controller talks to.  Every record
//! it returns is treated as the sole source of truth for that instant; the
//! controller keeps no copy.  Failures are reported through the closed
//! [`CloudError`] enum so callers classify them with an exhaustive `match`.

pub mod memory;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::InMemoryCloud;

/// Backend tag holding the caller-assigned volume name.
pub const VOLUME_NAME_TAG_KEY: &str = "CSIVolumeName";
/// Backend tag holding the caller-assigned snapshot name.
pub const SNAPSHOT_NAME_TAG_KEY: &str = "CSIVolumeSnapshotName";

/// Backend volume classes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum VolumeType {
    /// General purpose SSD.
    #[default]
    Gp2,
    /// Provisioned-IOPS SSD; needs an IOPS-per-GiB figure.
    Io1,
    /// Throughput-optimized HDD.
    St1,
    /// Cold HDD.
    Sc1,
}

impl VolumeType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gp2 => "gp2",
            Self::Io1 => "io1",
            Self::St1 => "st1",
            Self::Sc1 => "sc1",
        }
    }

    /// Whether creating this class requires [`DiskOptions::iops_per_gb`].
    pub fn requires_iops(self) -> bool {
        matches!(self, Self::Io1)
    }
}

impl fmt::Display for VolumeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VolumeType {
    type Err = String;

    /// An empty string selects the backend default.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(Self::default()),
            "gp2" => Ok(Self::Gp2),
            "io1" => Ok(Self::Io1),
            "st1" => Ok(Self::St1),
            "sc1" => Ok(Self::Sc1),
            other => Err(format!("unknown volume type {other:?}")),
        }
    }
}

/// A block volume as recorded by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disk {
    pub volume_id: String,
    /// Value of the [`VOLUME_NAME_TAG_KEY`] tag.
    pub name: String,
    pub capacity_gib: u64,
    pub volume_type: VolumeType,
    pub availability_zone: String,
    pub encrypted: bool,
    pub kms_key_id: Option<String>,
    /// Snapshot the disk was restored from.
    pub snapshot_id: Option<String>,
    /// Filesystem hint attached by the controller; never set by the backend.
    pub fs_type: String,
}

/// Parameters for [`Cloud::create_disk`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskOptions {
    pub capacity_bytes: u64,
    pub tags: HashMap<String, String>,
    pub volume_type: VolumeType,
    /// Zero unless `volume_type` requires it.
    pub iops_per_gb: u32,
    /// Empty lets the backend choose.
    pub availability_zone: String,
    pub encrypted: bool,
    pub kms_key_id: Option<String>,
    pub snapshot_id: Option<String>,
}

/// A snapshot as recorded by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudSnapshot {
    pub snapshot_id: String,
    /// Value of the [`SNAPSHOT_NAME_TAG_KEY`] tag.
    pub name: String,
    pub source_volume_id: String,
    pub size_bytes: u64,
    pub creation_time: SystemTime,
    pub ready_to_use: bool,
}

/// Parameters for [`Cloud::create_snapshot`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotOptions {
    pub tags: HashMap<String, String>,
}

/// Closed set of backend failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CloudError {
    #[error("resource was not found")]
    NotFound,

    /// More than one disk carries the requested name tag.
    #[error("multiple disks with same name")]
    MultipleDisks,

    /// A disk with the requested name exists but with another size.
    #[error("disk with same name but different size already exists")]
    DiskExistsDiffSize,

    /// The disk is already attached to another instance.
    #[error("resource already exists")]
    AlreadyExists,

    /// Any other API failure.
    #[error("{0}")]
    Api(String),
}

/// Remote block-storage service.
///
/// Implementations must be safe to call concurrently.  Detaching a disk
/// that is not attached to the node must succeed.
#[async_trait]
pub trait Cloud: Send + Sync {
    /// Find the live disk named `name`.
    ///
    /// Returns [`CloudError::DiskExistsDiffSize`] when its size differs from
    /// `capacity_bytes` rounded up to whole GiB.
    async fn get_disk_by_name(&self, name: &str, capacity_bytes: u64) -> Result<Disk, CloudError>;

    async fn get_disk_by_id(&self, volume_id: &str) -> Result<Disk, CloudError>;

    async fn create_disk(&self, name: &str, opts: &DiskOptions) -> Result<Disk, CloudError>;

    async fn delete_disk(&self, volume_id: &str) -> Result<(), CloudError>;

    /// Attach and return the device path seen by the instance.
    async fn attach_disk(&self, volume_id: &str, node_id: &str) -> Result<String, CloudError>;

    async fn detach_disk(&self, volume_id: &str, node_id: &str) -> Result<(), CloudError>;

    async fn instance_exists(&self, node_id: &str) -> bool;

    async fn get_snapshot_by_name(&self, name: &str) -> Result<CloudSnapshot, CloudError>;

    async fn create_snapshot(
        &self,
        volume_id: &str,
        opts: &SnapshotOptions,
    ) -> Result<CloudSnapshot, CloudError>;

    async fn delete_snapshot(&self, snapshot_id: &str) -> Result<(), CloudError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_type_parse() {
        assert_eq!("".parse::<VolumeType>(), Ok(VolumeType::Gp2));
        assert_eq!("io1".parse::<VolumeType>(), Ok(VolumeType::Io1));
        assert!("gp9".parse::<VolumeType>().is_err());
        assert!(VolumeType::Io1.requires_iops());
        assert!(!VolumeType::St1.requires_iops());
        assert_eq!(VolumeType::Sc1.to_string(), "sc1");
    }
}

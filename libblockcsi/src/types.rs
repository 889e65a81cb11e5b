//! Core CSI types: identifiers, capabilities, topology, requests and
//! responses of the Controller and Identity services.
//!
//! These types are the wire representation exchanged with the orchestrator.
//! They are all [`Serialize`]/[`Deserialize`] so they can be carried inside a
//! [`CsiMessage`](crate::message::CsiMessage) as JSON.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
        pub struct $name(pub String);

        impl $name {
            /// Borrow the raw identifier.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_id!(
    /// Backend-assigned, stable identifier of a volume.
    VolumeId
);
string_id!(
    /// Backend-assigned identifier of a snapshot.
    SnapshotId
);

// ---------------------------------------------------------------------------
// Access mode & capabilities
// ---------------------------------------------------------------------------

/// How many nodes may use a volume at once, and in which mode.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AccessMode {
    #[default]
    Unknown,
    /// Read-write on a single node.
    SingleNodeWriter,
    /// Read-only on a single node.
    SingleNodeReaderOnly,
    /// Read-only on many nodes.
    MultiNodeReaderOnly,
    /// Read-only on many nodes, read-write on one.
    MultiNodeSingleWriter,
    /// Read-write on many nodes.
    MultiNodeMultiWriter,
}

/// Whether the volume is consumed as a raw block device or a filesystem.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum AccessType {
    /// Raw block device.
    Block,
    /// Mounted filesystem.
    Mount {
        /// Filesystem type, e.g. `"ext4"`.  Empty lets the node decide.
        #[serde(default)]
        fs_type: String,
        /// Additional mount flags (e.g. `"noatime"`).
        #[serde(default)]
        mount_flags: Vec<String>,
    },
}

impl Default for AccessType {
    fn default() -> Self {
        Self::Mount {
            fs_type: String::new(),
            mount_flags: Vec::new(),
        }
    }
}

/// Describes the capabilities required from a volume.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VolumeCapability {
    /// Block or mount access.
    #[serde(default)]
    pub access_type: AccessType,
    /// Requested access mode.
    pub access_mode: AccessMode,
}

impl VolumeCapability {
    /// A mount capability with the given access mode and no fs preference.
    pub fn mount(access_mode: AccessMode) -> Self {
        Self {
            access_type: AccessType::default(),
            access_mode,
        }
    }
}

/// RPCs the Controller service advertises through
/// `ControllerGetCapabilities`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ControllerCapability {
    CreateDeleteVolume,
    PublishUnpublishVolume,
    CreateDeleteSnapshot,
}

// ---------------------------------------------------------------------------
// Capacity & topology
// ---------------------------------------------------------------------------

/// Requested size bounds for a new volume.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapacityRange {
    /// Lower bound in bytes.  Zero means no lower bound.
    #[serde(default)]
    pub required_bytes: u64,
    /// Upper bound in bytes.  `None` or zero means no upper bound.
    #[serde(default)]
    pub limit_bytes: Option<u64>,
}

/// Topology expressed as key-value segments, e.g.
/// `{"topology.block.csi.rk8s.io/zone": "zone-a"}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Topology {
    #[serde(default)]
    pub segments: HashMap<String, String>,
}

impl Topology {
    /// A topology with a single segment.
    pub fn single(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            segments: HashMap::from([(key.into(), value.into())]),
        }
    }
}

/// Placement constraints attached to a `CreateVolume` request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopologyRequirement {
    /// Topologies the volume must be accessible from, in order.
    #[serde(default)]
    pub requisite: Vec<Topology>,
    /// Topologies the caller would like the volume placed in, most
    /// preferred first.
    #[serde(default)]
    pub preferred: Vec<Topology>,
}

/// Pre-populated content for a new volume.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum VolumeContentSource {
    /// Restore from an existing snapshot.
    Snapshot { snapshot_id: SnapshotId },
    /// Clone an existing volume.
    Volume { volume_id: VolumeId },
}

// ---------------------------------------------------------------------------
// Volume & snapshot descriptors
// ---------------------------------------------------------------------------

/// A provisioned volume as reported to the orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Volume {
    /// Unique volume identifier.
    pub volume_id: VolumeId,
    /// Provisioned capacity in bytes.
    pub capacity_bytes: u64,
    /// Opaque context passed from Controller to Node operations.
    #[serde(default)]
    pub volume_context: HashMap<String, String>,
    /// The single zone the volume lives in.
    #[serde(default)]
    pub accessible_topology: Vec<Topology>,
    /// Content the volume was created from, if any.
    #[serde(default)]
    pub content_source: Option<VolumeContentSource>,
}

/// Seconds and nanoseconds since the Unix epoch, in the range
/// `0001-01-01T00:00:00Z ..= 9999-12-31T23:59:59.999999999Z`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    pub seconds: i64,
    /// Always in `0..1_000_000_000`, also for instants before the epoch.
    pub nanos: i32,
}

/// A point-in-time snapshot as reported to the orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snapshot {
    pub snapshot_id: SnapshotId,
    pub source_volume_id: VolumeId,
    pub size_bytes: u64,
    pub creation_time: Timestamp,
    /// Whether the backend finished materializing the snapshot.
    pub ready_to_use: bool,
}

// ---------------------------------------------------------------------------
// Requests & responses
// ---------------------------------------------------------------------------

/// Request to create a new volume.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateVolumeRequest {
    /// Caller-assigned name, used as the idempotency key.
    pub name: String,
    #[serde(default)]
    pub capacity_range: Option<CapacityRange>,
    /// Required capabilities.
    #[serde(default)]
    pub volume_capabilities: Vec<VolumeCapability>,
    /// Storage-class parameters (`type`, `iopsPerGB`, `encrypted`, ...).
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    #[serde(default)]
    pub volume_content_source: Option<VolumeContentSource>,
    #[serde(default)]
    pub accessibility_requirements: Option<TopologyRequirement>,
}

/// Request to attach a volume to a compute node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControllerPublishVolumeRequest {
    pub volume_id: VolumeId,
    pub node_id: String,
    #[serde(default)]
    pub volume_capability: Option<VolumeCapability>,
    #[serde(default)]
    pub readonly: bool,
    /// Context returned by `CreateVolume`.
    #[serde(default)]
    pub volume_context: HashMap<String, String>,
}

/// Result of a successful attach.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ControllerPublishVolumeResponse {
    /// Forwarded to the node's stage/publish calls; carries `devicePath`.
    #[serde(default)]
    pub publish_context: HashMap<String, String>,
}

/// Request to detach a volume from a compute node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControllerUnpublishVolumeRequest {
    pub volume_id: VolumeId,
    pub node_id: String,
}

/// Request to check a set of capabilities against an existing volume.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidateVolumeCapabilitiesRequest {
    pub volume_id: VolumeId,
    #[serde(default)]
    pub volume_capabilities: Vec<VolumeCapability>,
}

/// Capabilities confirmed by `ValidateVolumeCapabilities`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfirmedCapabilities {
    pub volume_capabilities: Vec<VolumeCapability>,
}

/// Result of `ValidateVolumeCapabilities`.  `confirmed` is `None` when any
/// requested capability is unsupported.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidateVolumeCapabilitiesResponse {
    #[serde(default)]
    pub confirmed: Option<ConfirmedCapabilities>,
    #[serde(default)]
    pub message: String,
}

/// Request to snapshot an existing volume.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateSnapshotRequest {
    /// Caller-assigned name, used as the idempotency key together with
    /// `source_volume_id`.
    pub name: String,
    pub source_volume_id: VolumeId,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

// ---------------------------------------------------------------------------
// Plugin info
// ---------------------------------------------------------------------------

/// Information about the CSI plugin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PluginInfo {
    /// Plugin name, e.g. `"block.csi.rk8s.io"`.
    pub name: String,
    /// Vendor-provided version string.
    pub vendor_version: String,
}

/// Capabilities advertised by the CSI plugin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum PluginCapability {
    /// Plugin provides a Controller service.
    ControllerService,
    /// Plugin supports volume topology constraints.
    VolumeAccessibilityConstraints,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_display() {
        assert_eq!(VolumeId("vol-abc".into()).to_string(), "vol-abc");
        assert_eq!(SnapshotId::from("snap-1").as_str(), "snap-1");
    }

    #[test]
    fn capability_defaults_to_mount() {
        let cap: VolumeCapability =
            serde_json::from_str(r#"{"access_mode":"SingleNodeWriter"}"#).expect("deserialize");
        assert_eq!(cap, VolumeCapability::mount(AccessMode::SingleNodeWriter));
    }

    #[test]
    fn create_volume_request_minimal_json() {
        let req: CreateVolumeRequest =
            serde_json::from_str(r#"{"name":"pvc-1"}"#).expect("deserialize");
        assert_eq!(req.name, "pvc-1");
        assert!(req.capacity_range.is_none());
        assert!(req.volume_capabilities.is_empty());
        assert!(req.accessibility_requirements.is_none());
    }
}

//! CSI protocol messages.
//!
//! [`CsiMessage`] is the envelope for every request and response exchanged
//! with the orchestrator-side sidecar.  A request variant goes in, the
//! matching response variant (or [`CsiMessage::Error`]) comes out of
//! [`dispatch`].  Messages serialize to JSON; the transport carrying them is
//! supplied by the embedding process.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::controller::CsiController;
use crate::error::CsiError;
use crate::identity::CsiIdentity;
use crate::types::*;

/// Top-level message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CsiMessage {
    // ----- Requests --------------------------------------------------------
    /// Create a volume (Controller).
    CreateVolume(CreateVolumeRequest),
    /// Delete a volume (Controller).
    DeleteVolume(VolumeId),
    /// Attach a volume to a node (Controller).
    ControllerPublishVolume(ControllerPublishVolumeRequest),
    /// Detach a volume from a node (Controller).
    ControllerUnpublishVolume(ControllerUnpublishVolumeRequest),
    /// Validate volume capabilities (Controller).
    ValidateVolumeCapabilities(ValidateVolumeCapabilitiesRequest),
    /// Query supported controller RPCs (Controller).
    ControllerGetCapabilities,
    /// Snapshot a volume (Controller).
    CreateSnapshot(CreateSnapshotRequest),
    /// Delete a snapshot (Controller).
    DeleteSnapshot(SnapshotId),
    ListVolumes,
    ListSnapshots,
    GetCapacity,

    /// Health probe (Identity).
    Probe,
    /// Query plugin info (Identity).
    GetPluginInfo,
    /// Query plugin capabilities (Identity).
    GetPluginCapabilities,

    // ----- Responses -------------------------------------------------------
    VolumeCreated(Volume),
    VolumePublished(ControllerPublishVolumeResponse),
    CapabilitiesValidated(ValidateVolumeCapabilitiesResponse),
    ControllerCapabilities(Vec<ControllerCapability>),
    SnapshotCreated(Snapshot),
    VolumeList(Vec<Volume>),
    SnapshotList(Vec<Snapshot>),
    Capacity(u64),
    PluginInfoResponse(PluginInfo),
    PluginCapabilitiesResponse(Vec<PluginCapability>),
    ProbeResult(bool),

    /// Generic success acknowledgement (no payload).
    Ok,
    /// An error occurred.
    Error(CsiError),
}

impl std::fmt::Display for CsiMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CreateVolume(req) => write!(f, "CreateVolume(name={})", req.name),
            Self::DeleteVolume(id) => write!(f, "DeleteVolume({id})"),
            Self::ControllerPublishVolume(req) => {
                write!(f, "ControllerPublishVolume({} -> {})", req.volume_id, req.node_id)
            }
            Self::ControllerUnpublishVolume(req) => {
                write!(f, "ControllerUnpublishVolume({} -x {})", req.volume_id, req.node_id)
            }
            Self::ValidateVolumeCapabilities(req) => {
                write!(f, "ValidateVolumeCapabilities({})", req.volume_id)
            }
            Self::ControllerGetCapabilities => f.write_str("ControllerGetCapabilities"),
            Self::CreateSnapshot(req) => write!(
                f,
                "CreateSnapshot(name={}, source={})",
                req.name, req.source_volume_id
            ),
            Self::DeleteSnapshot(id) => write!(f, "DeleteSnapshot({id})"),
            Self::ListVolumes => f.write_str("ListVolumes"),
            Self::ListSnapshots => f.write_str("ListSnapshots"),
            Self::GetCapacity => f.write_str("GetCapacity"),
            Self::Probe => f.write_str("Probe"),
            Self::GetPluginInfo => f.write_str("GetPluginInfo"),
            Self::GetPluginCapabilities => f.write_str("GetPluginCapabilities"),
            Self::VolumeCreated(v) => write!(f, "VolumeCreated({})", v.volume_id),
            Self::VolumePublished(resp) => {
                write!(f, "VolumePublished(context={})", resp.publish_context.len())
            }
            Self::CapabilitiesValidated(resp) => {
                write!(f, "CapabilitiesValidated(confirmed={})", resp.confirmed.is_some())
            }
            Self::ControllerCapabilities(caps) => {
                write!(f, "ControllerCapabilities(count={})", caps.len())
            }
            Self::SnapshotCreated(s) => write!(
                f,
                "SnapshotCreated({}, ready={})",
                s.snapshot_id, s.ready_to_use
            ),
            Self::VolumeList(vs) => write!(f, "VolumeList(count={})", vs.len()),
            Self::SnapshotList(ss) => write!(f, "SnapshotList(count={})", ss.len()),
            Self::Capacity(c) => write!(f, "Capacity({c})"),
            Self::PluginInfoResponse(info) => write!(f, "PluginInfo(name={})", info.name),
            Self::PluginCapabilitiesResponse(caps) => {
                write!(f, "PluginCapabilities(count={})", caps.len())
            }
            Self::ProbeResult(ok) => write!(f, "ProbeResult({ok})"),
            Self::Ok => f.write_str("Ok"),
            Self::Error(e) => write!(f, "Error({e})"),
        }
    }
}

/// Upper bound on an encoded message.
pub const MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

impl CsiMessage {
    /// Serialize to JSON.
    pub fn encode(&self) -> Result<Vec<u8>, CsiError> {
        serde_json::to_vec(self).map_err(CsiError::internal)
    }

    /// Parse a JSON-encoded message of at most [`MAX_MESSAGE_BYTES`].
    pub fn decode(buf: &[u8]) -> Result<Self, CsiError> {
        if buf.len() > MAX_MESSAGE_BYTES {
            return Err(CsiError::InvalidArgument(format!(
                "message of {} bytes exceeds the {MAX_MESSAGE_BYTES} byte limit",
                buf.len()
            )));
        }
        serde_json::from_slice(buf)
            .map_err(|e| CsiError::InvalidArgument(format!("malformed message: {e}")))
    }
}

fn reply<T>(result: Result<T, CsiError>, wrap: impl FnOnce(T) -> CsiMessage) -> CsiMessage {
    match result {
        Ok(value) => wrap(value),
        Err(e) => CsiMessage::Error(e),
    }
}

/// Route a request to the matching service method and wrap the result in a
/// response [`CsiMessage`].
pub async fn dispatch<T>(handler: &T, request: CsiMessage) -> CsiMessage
where
    T: CsiIdentity + CsiController,
{
    debug!(%request, "CSI request received");
    let response = match request {
        // --- Identity -------------------------------------------------------
        CsiMessage::Probe => reply(handler.probe().await, CsiMessage::ProbeResult),
        CsiMessage::GetPluginInfo => {
            reply(handler.get_plugin_info().await, CsiMessage::PluginInfoResponse)
        }
        CsiMessage::GetPluginCapabilities => reply(
            handler.get_plugin_capabilities().await,
            CsiMessage::PluginCapabilitiesResponse,
        ),

        // --- Controller -----------------------------------------------------
        CsiMessage::CreateVolume(req) => {
            reply(handler.create_volume(req).await, CsiMessage::VolumeCreated)
        }
        CsiMessage::DeleteVolume(id) => {
            reply(handler.delete_volume(&id).await, |()| CsiMessage::Ok)
        }
        CsiMessage::ControllerPublishVolume(req) => reply(
            handler.controller_publish_volume(req).await,
            CsiMessage::VolumePublished,
        ),
        CsiMessage::ControllerUnpublishVolume(req) => reply(
            handler.controller_unpublish_volume(req).await,
            |()| CsiMessage::Ok,
        ),
        CsiMessage::ValidateVolumeCapabilities(req) => reply(
            handler.validate_volume_capabilities(req).await,
            CsiMessage::CapabilitiesValidated,
        ),
        CsiMessage::ControllerGetCapabilities => reply(
            handler.controller_get_capabilities().await,
            CsiMessage::ControllerCapabilities,
        ),
        CsiMessage::CreateSnapshot(req) => {
            reply(handler.create_snapshot(req).await, CsiMessage::SnapshotCreated)
        }
        CsiMessage::DeleteSnapshot(id) => {
            reply(handler.delete_snapshot(&id).await, |()| CsiMessage::Ok)
        }
        CsiMessage::ListVolumes => reply(handler.list_volumes().await, CsiMessage::VolumeList),
        CsiMessage::ListSnapshots => {
            reply(handler.list_snapshots().await, CsiMessage::SnapshotList)
        }
        CsiMessage::GetCapacity => reply(handler.get_capacity().await, CsiMessage::Capacity),

        // --- Response variants should never arrive as requests --------------
        other => {
            warn!(msg = %other, "unexpected message variant received as request");
            CsiMessage::Error(CsiError::InvalidArgument(format!(
                "unexpected message: {other}"
            )))
        }
    };
    debug!(%response, "CSI response");
    response
}

/// Decode one request, dispatch it and encode the response.  A request that
/// cannot be decoded is answered with [`CsiMessage::Error`].
pub async fn handle_encoded<T>(handler: &T, request: &[u8]) -> Result<Vec<u8>, CsiError>
where
    T: CsiIdentity + CsiController,
{
    let response = match CsiMessage::decode(request) {
        Ok(request) => dispatch(handler, request).await,
        Err(e) => {
            warn!(error = %e, "rejecting undecodable request");
            CsiMessage::Error(e)
        }
    };
    response.encode()
}

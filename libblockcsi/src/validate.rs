//! Required-field checks run before any backend call.

use crate::error::CsiError;
use crate::types::{
    ControllerPublishVolumeRequest, ControllerUnpublishVolumeRequest, CreateSnapshotRequest,
    CreateVolumeRequest, SnapshotId, ValidateVolumeCapabilitiesRequest, VolumeCapability,
    VolumeContentSource, VolumeId,
};

fn require(value: &str, what: &str) -> Result<(), CsiError> {
    if value.is_empty() {
        return Err(CsiError::InvalidArgument(format!("{what} not provided")));
    }
    Ok(())
}

pub fn create_volume(req: &CreateVolumeRequest) -> Result<(), CsiError> {
    require(&req.name, "volume name")?;
    if req.volume_capabilities.is_empty() {
        return Err(CsiError::invalid_argument("volume capabilities not provided"));
    }
    if let Some(VolumeContentSource::Snapshot { snapshot_id }) = &req.volume_content_source {
        require(snapshot_id.as_str(), "content source snapshot ID")?;
    }
    Ok(())
}

pub fn delete_volume(volume_id: &VolumeId) -> Result<(), CsiError> {
    require(volume_id.as_str(), "volume ID")
}

/// Returns the requested capability once every field is present.
pub fn publish_volume(
    req: &ControllerPublishVolumeRequest,
) -> Result<&VolumeCapability, CsiError> {
    require(req.volume_id.as_str(), "volume ID")?;
    require(&req.node_id, "node ID")?;
    req.volume_capability
        .as_ref()
        .ok_or_else(|| CsiError::invalid_argument("volume capability not provided"))
}

pub fn unpublish_volume(req: &ControllerUnpublishVolumeRequest) -> Result<(), CsiError> {
    require(req.volume_id.as_str(), "volume ID")?;
    require(&req.node_id, "node ID")
}

pub fn validate_volume_capabilities(
    req: &ValidateVolumeCapabilitiesRequest,
) -> Result<(), CsiError> {
    require(req.volume_id.as_str(), "volume ID")?;
    if req.volume_capabilities.is_empty() {
        return Err(CsiError::invalid_argument("volume capabilities not provided"));
    }
    Ok(())
}

pub fn create_snapshot(req: &CreateSnapshotRequest) -> Result<(), CsiError> {
    require(&req.name, "snapshot name")?;
    require(req.source_volume_id.as_str(), "snapshot source volume ID")
}

pub fn delete_snapshot(snapshot_id: &SnapshotId) -> Result<(), CsiError> {
    require(snapshot_id.as_str(), "snapshot ID")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Code;
    use crate::types::AccessMode;

    fn code(r: Result<(), CsiError>) -> Option<Code> {
        r.err().map(|e| e.code())
    }

    #[test]
    fn create_volume_requires_name_and_caps() {
        let mut req = CreateVolumeRequest {
            name: "pvc-1".into(),
            volume_capabilities: vec![VolumeCapability::mount(AccessMode::SingleNodeWriter)],
            ..Default::default()
        };
        assert!(create_volume(&req).is_ok());

        req.volume_capabilities.clear();
        assert_eq!(code(create_volume(&req)), Some(Code::InvalidArgument));

        req.volume_capabilities.push(VolumeCapability::default());
        req.name.clear();
        assert_eq!(code(create_volume(&req)), Some(Code::InvalidArgument));
    }

    #[test]
    fn create_volume_rejects_empty_snapshot_source() {
        let req = CreateVolumeRequest {
            name: "pvc-1".into(),
            volume_capabilities: vec![VolumeCapability::default()],
            volume_content_source: Some(VolumeContentSource::Snapshot {
                snapshot_id: SnapshotId::default(),
            }),
            ..Default::default()
        };
        assert_eq!(code(create_volume(&req)), Some(Code::InvalidArgument));
    }

    #[test]
    fn publish_requires_ids_and_capability() {
        let mut req = ControllerPublishVolumeRequest {
            volume_id: "vol-1".into(),
            node_id: "i-1".into(),
            volume_capability: Some(VolumeCapability::default()),
            ..Default::default()
        };
        assert!(publish_volume(&req).is_ok());

        req.volume_capability = None;
        assert!(publish_volume(&req).is_err());

        req.volume_capability = Some(VolumeCapability::default());
        req.node_id.clear();
        let err = publish_volume(&req).unwrap_err();
        assert_eq!(err, CsiError::InvalidArgument("node ID not provided".into()));
    }

    #[test]
    fn empty_ids_rejected() {
        assert!(delete_volume(&VolumeId::default()).is_err());
        assert!(delete_snapshot(&SnapshotId::default()).is_err());
        assert!(
            unpublish_volume(&ControllerUnpublishVolumeRequest {
                volume_id: "vol-1".into(),
                node_id: String::new(),
            })
            .is_err()
        );
        assert!(
            create_snapshot(&CreateSnapshotRequest {
                name: "snap".into(),
                ..Default::default()
            })
            .is_err()
        );
        assert!(
            validate_volume_capabilities(&ValidateVolumeCapabilitiesRequest {
                volume_id: "vol-1".into(),
                volume_capabilities: vec![],
            })
            .is_err()
        );
    }
}

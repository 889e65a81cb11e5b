//! Block-storage controller backed by a remote [`Cloud`].
//!
//! [`BlockController`] implements [`CsiController`] and
//! [`CsiIdentity`](crate::identity::CsiIdentity) on top of any [`Cloud`].
//! It keeps no state of its own besides the backend handle and an immutable
//! [`DriverConfig`]: every decision is taken from what the backend reports
//! at the time of the call, so any number of requests may run concurrently.
//!
//! Two concurrent creates for the same name can both see the name as free
//! and both create a disk.  Later lookups then fail with an internal error
//! until an operator removes the duplicate; serializing per-name creates is
//! left to the caller.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use crate::attachment;
use crate::capability::{self, CONTROLLER_CAPABILITIES};
use crate::capacity;
use crate::cloud::{
    Cloud, CloudError, DiskOptions, SNAPSHOT_NAME_TAG_KEY, SnapshotOptions, VOLUME_NAME_TAG_KEY,
    VolumeType,
};
use crate::config::{DRIVER_CONFIG, DriverConfig};
use crate::controller::CsiController;
use crate::error::CsiError;
use crate::resolve::{self, Lookup};
use crate::topology;
use crate::translate::{self, FS_TYPE_KEY};
use crate::types::*;
use crate::validate;

/// Storage-class parameter selecting the [`VolumeType`].
pub const VOLUME_TYPE_KEY: &str = "type";
/// Storage-class parameter with the IOPS per GiB for `io1` volumes.
pub const IOPS_PER_GB_KEY: &str = "iopsPerGB";
/// Storage-class parameter; only the literal `"true"` enables encryption.
pub const ENCRYPTED_KEY: &str = "encrypted";
/// Storage-class parameter with the encryption key, used when encrypted.
pub const KMS_KEY_ID_KEY: &str = "kmsKeyId";

/// CSI controller for remote block volumes.
pub struct BlockController {
    cloud: Arc<dyn Cloud>,
    config: DriverConfig,
}

impl BlockController {
    /// Create a controller using the process-wide [`DRIVER_CONFIG`].
    pub fn new(cloud: Arc<dyn Cloud>) -> Self {
        Self::with_config(cloud, DRIVER_CONFIG.clone())
    }

    pub fn with_config(cloud: Arc<dyn Cloud>, config: DriverConfig) -> Self {
        Self { cloud, config }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Build backend creation options for a volume that does not exist yet.
    fn disk_options(
        &self,
        req: &CreateVolumeRequest,
        capacity_bytes: u64,
    ) -> Result<DiskOptions, CsiError> {
        let params = &req.parameters;

        let volume_type: VolumeType = params
            .get(VOLUME_TYPE_KEY)
            .map(String::as_str)
            .unwrap_or_default()
            .parse()
            .map_err(CsiError::InvalidArgument)?;

        let iops_per_gb = if volume_type.requires_iops() {
            let raw = params.get(IOPS_PER_GB_KEY).map(String::as_str).unwrap_or_default();
            raw.trim()
                .parse::<u32>()
                .ok()
                .filter(|iops| *iops > 0)
                .ok_or_else(|| {
                    CsiError::InvalidArgument(format!(
                        "could not parse invalid {IOPS_PER_GB_KEY} {raw:?} for volume type {volume_type}"
                    ))
                })?
        } else {
            0
        };

        let encrypted = params.get(ENCRYPTED_KEY).is_some_and(|v| v == "true");
        let kms_key_id = if encrypted {
            params.get(KMS_KEY_ID_KEY).filter(|k| !k.is_empty()).cloned()
        } else {
            None
        };

        let snapshot_id = match &req.volume_content_source {
            None => None,
            Some(VolumeContentSource::Snapshot { snapshot_id }) => Some(snapshot_id.0.clone()),
            Some(VolumeContentSource::Volume { .. }) => {
                return Err(CsiError::invalid_argument(
                    "unsupported volume content source type",
                ));
            }
        };

        Ok(DiskOptions {
            capacity_bytes,
            tags: HashMap::from([(VOLUME_NAME_TAG_KEY.to_owned(), req.name.clone())]),
            volume_type,
            iops_per_gb,
            availability_zone: topology::pick_availability_zone(
                req.accessibility_requirements.as_ref(),
            ),
            encrypted,
            kms_key_id,
            snapshot_id,
        })
    }
}

#[async_trait]
impl CsiController for BlockController {
    #[instrument(skip(self, req), fields(name = %req.name))]
    async fn create_volume(&self, req: CreateVolumeRequest) -> Result<Volume, CsiError> {
        validate::create_volume(&req)?;
        let capacity_bytes = capacity::normalize(req.capacity_range.as_ref(), &self.config)?;
        if !capability::is_valid_volume_capabilities(&req.volume_capabilities) {
            return Err(CsiError::invalid_argument("volume capabilities not supported"));
        }
        let fs_type = req.parameters.get(FS_TYPE_KEY).cloned().unwrap_or_default();

        let lookup = self.cloud.get_disk_by_name(&req.name, capacity_bytes).await;
        if let Lookup::Existing(mut disk) = resolve::classify_disk_lookup(&req.name, lookup)? {
            disk.fs_type = fs_type;
            return Ok(translate::volume_from_disk(&disk));
        }

        let opts = self.disk_options(&req, capacity_bytes)?;
        let mut disk = self
            .cloud
            .create_disk(&req.name, &opts)
            .await
            .map_err(|e| {
                CsiError::Internal(format!("could not create volume {:?}: {e}", req.name))
            })?;
        disk.fs_type = fs_type;

        info!(
            volume_id = %disk.volume_id,
            zone = %disk.availability_zone,
            capacity_gib = disk.capacity_gib,
            "volume created"
        );
        Ok(translate::volume_from_disk(&disk))
    }

    #[instrument(skip(self))]
    async fn delete_volume(&self, volume_id: &VolumeId) -> Result<(), CsiError> {
        validate::delete_volume(volume_id)?;
        match self.cloud.delete_disk(volume_id.as_str()).await {
            Ok(()) => info!(%volume_id, "volume deleted"),
            Err(CloudError::NotFound) => {
                debug!(%volume_id, "volume not found, returning with success");
            }
            Err(e) => {
                return Err(CsiError::Internal(format!(
                    "could not delete volume ID {:?}: {e}",
                    volume_id.as_str()
                )));
            }
        }
        Ok(())
    }

    #[instrument(skip(self, req), fields(volume_id = %req.volume_id, node_id = %req.node_id))]
    async fn controller_publish_volume(
        &self,
        req: ControllerPublishVolumeRequest,
    ) -> Result<ControllerPublishVolumeResponse, CsiError> {
        let capability = validate::publish_volume(&req)?;
        attachment::attach(self.cloud.as_ref(), &req.volume_id, &req.node_id, capability).await
    }

    #[instrument(skip(self, req), fields(volume_id = %req.volume_id, node_id = %req.node_id))]
    async fn controller_unpublish_volume(
        &self,
        req: ControllerUnpublishVolumeRequest,
    ) -> Result<(), CsiError> {
        validate::unpublish_volume(&req)?;
        attachment::detach(self.cloud.as_ref(), &req.volume_id, &req.node_id).await
    }

    #[instrument(skip(self, req), fields(volume_id = %req.volume_id))]
    async fn validate_volume_capabilities(
        &self,
        req: ValidateVolumeCapabilitiesRequest,
    ) -> Result<ValidateVolumeCapabilitiesResponse, CsiError> {
        validate::validate_volume_capabilities(&req)?;

        match self.cloud.get_disk_by_id(req.volume_id.as_str()).await {
            Ok(_) => {}
            Err(CloudError::NotFound) => {
                return Err(CsiError::NotFound(format!("volume {} not found", req.volume_id)));
            }
            Err(e) => {
                return Err(CsiError::Internal(format!(
                    "could not get volume with ID {:?}: {e}",
                    req.volume_id.as_str()
                )));
            }
        }

        if capability::is_valid_volume_capabilities(&req.volume_capabilities) {
            return Ok(ValidateVolumeCapabilitiesResponse {
                confirmed: Some(ConfirmedCapabilities {
                    volume_capabilities: req.volume_capabilities,
                }),
                message: String::new(),
            });
        }
        debug!(volume_id = %req.volume_id, "requested capabilities not supported");
        Ok(ValidateVolumeCapabilitiesResponse {
            confirmed: None,
            message: "only single-node-writer access is supported".to_owned(),
        })
    }

    async fn controller_get_capabilities(&self) -> Result<Vec<ControllerCapability>, CsiError> {
        Ok(CONTROLLER_CAPABILITIES.to_vec())
    }

    #[instrument(
        skip(self, req),
        fields(name = %req.name, source_volume_id = %req.source_volume_id)
    )]
    async fn create_snapshot(&self, req: CreateSnapshotRequest) -> Result<Snapshot, CsiError> {
        validate::create_snapshot(&req)?;
        let source = req.source_volume_id.as_str();

        let lookup = self.cloud.get_snapshot_by_name(&req.name).await;
        if let Lookup::Existing(snapshot) =
            resolve::classify_snapshot_lookup(&req.name, source, lookup)?
        {
            return translate::snapshot_from_cloud(&snapshot);
        }

        let opts = SnapshotOptions {
            tags: HashMap::from([(SNAPSHOT_NAME_TAG_KEY.to_owned(), req.name.clone())]),
        };
        let snapshot = self
            .cloud
            .create_snapshot(source, &opts)
            .await
            .map_err(|e| {
                CsiError::Internal(format!("could not create snapshot {:?}: {e}", req.name))
            })?;

        info!(snapshot_id = %snapshot.snapshot_id, "snapshot created");
        translate::snapshot_from_cloud(&snapshot)
    }

    #[instrument(skip(self))]
    async fn delete_snapshot(&self, snapshot_id: &SnapshotId) -> Result<(), CsiError> {
        validate::delete_snapshot(snapshot_id)?;
        match self.cloud.delete_snapshot(snapshot_id.as_str()).await {
            Ok(()) => info!(%snapshot_id, "snapshot deleted"),
            Err(CloudError::NotFound) => {
                debug!(%snapshot_id, "snapshot not found, returning with success");
            }
            Err(e) => {
                return Err(CsiError::Internal(format!(
                    "could not delete snapshot ID {:?}: {e}",
                    snapshot_id.as_str()
                )));
            }
        }
        Ok(())
    }

    async fn list_volumes(&self) -> Result<Vec<Volume>, CsiError> {
        Err(CsiError::unimplemented("ListVolumes"))
    }

    async fn list_snapshots(&self) -> Result<Vec<Snapshot>, CsiError> {
        Err(CsiError::unimplemented("ListSnapshots"))
    }

    async fn get_capacity(&self) -> Result<u64, CsiError> {
        Err(CsiError::unimplemented("GetCapacity"))
    }
}

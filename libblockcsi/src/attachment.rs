//! Attach and detach of volumes to compute instances.
//!
//! The attachment state of a (volume, node) pair is never tracked here; it
//! is whatever the backend reports.  Detaching a volume that is not attached
//! is a no-op by contract of [`Cloud::detach_disk`].

use std::collections::HashMap;

use tracing::{info, instrument};

use crate::capability;
use crate::cloud::{Cloud, CloudError};
use crate::error::CsiError;
use crate::types::{ControllerPublishVolumeResponse, VolumeCapability, VolumeId};

/// Publish context key carrying the device path seen by the instance.
pub const DEVICE_PATH_KEY: &str = "devicePath";

/// Attach `volume_id` to `node_id` after checking that both exist.
///
/// # Errors
///
/// - [`CsiError::InvalidArgument`] for an unsupported capability.
/// - [`CsiError::NotFound`] when the instance or the volume is missing.
/// - [`CsiError::AlreadyExists`] when the volume is attached elsewhere.
/// - [`CsiError::Internal`] for any other backend failure.
#[instrument(skip(cloud, capability))]
pub async fn attach(
    cloud: &dyn Cloud,
    volume_id: &VolumeId,
    node_id: &str,
    capability: &VolumeCapability,
) -> Result<ControllerPublishVolumeResponse, CsiError> {
    if !capability::is_supported(capability) {
        return Err(CsiError::InvalidArgument(format!(
            "volume capability {:?} not supported",
            capability.access_mode
        )));
    }

    if !cloud.instance_exists(node_id).await {
        return Err(CsiError::NotFound(format!("instance {node_id:?} not found")));
    }

    match cloud.get_disk_by_id(volume_id.as_str()).await {
        Ok(_) => {}
        Err(CloudError::NotFound) => {
            return Err(CsiError::NotFound(format!("volume {volume_id} not found")));
        }
        Err(e) => {
            return Err(CsiError::Internal(format!(
                "could not get volume with ID {:?}: {e}",
                volume_id.as_str()
            )));
        }
    }

    let device_path = match cloud.attach_disk(volume_id.as_str(), node_id).await {
        Ok(path) => path,
        Err(e @ CloudError::AlreadyExists) => {
            return Err(CsiError::AlreadyExists(format!(
                "volume {volume_id} cannot be attached to {node_id}: {e}"
            )));
        }
        Err(e) => {
            return Err(CsiError::Internal(format!(
                "could not attach volume {:?} to node {node_id:?}: {e}",
                volume_id.as_str()
            )));
        }
    };
    info!(%volume_id, node_id, %device_path, "volume attached");

    Ok(ControllerPublishVolumeResponse {
        publish_context: HashMap::from([(DEVICE_PATH_KEY.to_owned(), device_path)]),
    })
}

/// Detach `volume_id` from `node_id`.  Every backend error is internal.
#[instrument(skip(cloud))]
pub async fn detach(
    cloud: &dyn Cloud,
    volume_id: &VolumeId,
    node_id: &str,
) -> Result<(), CsiError> {
    cloud
        .detach_disk(volume_id.as_str(), node_id)
        .await
        .map_err(|e| {
            CsiError::Internal(format!(
                "could not detach volume {:?} from node {node_id:?}: {e}",
                volume_id.as_str()
            ))
        })?;
    info!(%volume_id, node_id, "volume detached");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::GIB;
    use crate::cloud::{CloudSnapshot, Disk, DiskOptions, InMemoryCloud, SnapshotOptions};
    use crate::error::Code;
    use crate::types::AccessMode;
    use async_trait::async_trait;

    /// Backend whose detach always fails; everything else is delegated.
    struct DetachFails(InMemoryCloud);

    #[async_trait]
    impl Cloud for DetachFails {
        async fn get_disk_by_name(&self, name: &str, bytes: u64) -> Result<Disk, CloudError> {
            self.0.get_disk_by_name(name, bytes).await
        }

        async fn get_disk_by_id(&self, volume_id: &str) -> Result<Disk, CloudError> {
            self.0.get_disk_by_id(volume_id).await
        }

        async fn create_disk(&self, name: &str, opts: &DiskOptions) -> Result<Disk, CloudError> {
            self.0.create_disk(name, opts).await
        }

        async fn delete_disk(&self, volume_id: &str) -> Result<(), CloudError> {
            self.0.delete_disk(volume_id).await
        }

        async fn attach_disk(&self, volume_id: &str, node_id: &str) -> Result<String, CloudError> {
            self.0.attach_disk(volume_id, node_id).await
        }

        async fn detach_disk(&self, _volume_id: &str, _node_id: &str) -> Result<(), CloudError> {
            Err(CloudError::Api("request throttled".into()))
        }

        async fn instance_exists(&self, node_id: &str) -> bool {
            self.0.instance_exists(node_id).await
        }

        async fn get_snapshot_by_name(&self, name: &str) -> Result<CloudSnapshot, CloudError> {
            self.0.get_snapshot_by_name(name).await
        }

        async fn create_snapshot(
            &self,
            volume_id: &str,
            opts: &SnapshotOptions,
        ) -> Result<CloudSnapshot, CloudError> {
            self.0.create_snapshot(volume_id, opts).await
        }

        async fn delete_snapshot(&self, snapshot_id: &str) -> Result<(), CloudError> {
            self.0.delete_snapshot(snapshot_id).await
        }
    }

    async fn setup() -> (InMemoryCloud, VolumeId) {
        let cloud = InMemoryCloud::new();
        cloud.add_instance("i-1");
        cloud.add_instance("i-2");
        let disk = cloud
            .create_disk(
                "data",
                &DiskOptions {
                    capacity_bytes: GIB,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        (cloud, VolumeId(disk.volume_id))
    }

    fn rwo() -> VolumeCapability {
        VolumeCapability::mount(AccessMode::SingleNodeWriter)
    }

    #[tokio::test]
    async fn attach_reports_device_path() {
        let (cloud, vol) = setup().await;
        let resp = attach(&cloud, &vol, "i-1", &rwo()).await.unwrap();
        assert_eq!(
            resp.publish_context.get(DEVICE_PATH_KEY).map(String::as_str),
            Some("/dev/xvdb")
        );
    }

    #[tokio::test]
    async fn attach_checks_existence_first() {
        let (cloud, vol) = setup().await;
        let err = attach(&cloud, &vol, "i-missing", &rwo()).await.unwrap_err();
        assert_eq!(err.code(), Code::NotFound);

        let err = attach(&cloud, &VolumeId::from("vol-missing"), "i-1", &rwo())
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::NotFound);
    }

    #[tokio::test]
    async fn attach_rejects_multi_node_modes() {
        let (cloud, vol) = setup().await;
        let cap = VolumeCapability::mount(AccessMode::MultiNodeMultiWriter);
        let err = attach(&cloud, &vol, "i-1", &cap).await.unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
        assert_eq!(cloud.attached_node(vol.as_str()), None);
    }

    #[tokio::test]
    async fn attach_elsewhere_conflicts() {
        let (cloud, vol) = setup().await;
        attach(&cloud, &vol, "i-1", &rwo()).await.unwrap();
        let err = attach(&cloud, &vol, "i-2", &rwo()).await.unwrap_err();
        assert_eq!(err.code(), Code::AlreadyExists);
    }

    #[tokio::test]
    async fn detach_twice_succeeds() {
        let (cloud, vol) = setup().await;
        attach(&cloud, &vol, "i-1", &rwo()).await.unwrap();
        detach(&cloud, &vol, "i-1").await.unwrap();
        detach(&cloud, &vol, "i-1").await.unwrap();
        assert_eq!(cloud.attached_node(vol.as_str()), None);
    }

    #[tokio::test]
    async fn detach_from_previous_node_succeeds() {
        let (cloud, vol) = setup().await;
        attach(&cloud, &vol, "i-1", &rwo()).await.unwrap();
        detach(&cloud, &vol, "i-1").await.unwrap();
        attach(&cloud, &vol, "i-2", &rwo()).await.unwrap();

        // A late unpublish for the old node leaves the new attachment alone.
        detach(&cloud, &vol, "i-1").await.unwrap();
        assert_eq!(cloud.attached_node(vol.as_str()).as_deref(), Some("i-2"));
    }

    #[tokio::test]
    async fn detach_backend_error_is_internal() {
        let (cloud, vol) = setup().await;
        let cloud = DetachFails(cloud);
        attach(&cloud, &vol, "i-1", &rwo()).await.unwrap();

        let err = detach(&cloud, &vol, "i-1").await.unwrap_err();
        assert_eq!(err.code(), Code::Internal);
        assert!(err.to_string().contains(&format!("{:?}", vol.as_str())));
        assert!(!err.to_string().contains("VolumeId("));
    }

    #[tokio::test]
    async fn repeated_publish_cycles_keep_working() {
        let (cloud, vol) = setup().await;
        for _ in 0..30 {
            let resp = attach(&cloud, &vol, "i-1", &rwo()).await.unwrap();
            assert_eq!(
                resp.publish_context.get(DEVICE_PATH_KEY).map(String::as_str),
                Some("/dev/xvdb")
            );
            detach(&cloud, &vol, "i-1").await.unwrap();
        }
    }
}

//! In-memory [`Cloud`] implementation.
//!
//! [`InMemoryCloud`] behaves like the remote service from the controller's
//! point of view: it assigns identifiers, enforces name/size checks in
//! `get_disk_by_name`, refuses to attach a disk to two instances and treats
//! detaching a disk that is not attached to the given instance as a no-op.
//! Like the real service it does *not* reject two disks with the same name
//! tag.  Device names are reused once their attachment is gone.
//!
//! # Thread safety
//!
//! All state lives in concurrent maps ([`DashMap`]), so any number of Tokio
//! tasks may drive it at once.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use tracing::debug;

use super::{
    Cloud, CloudError, CloudSnapshot, Disk, DiskOptions, SNAPSHOT_NAME_TAG_KEY, SnapshotOptions,
    VOLUME_NAME_TAG_KEY,
};
use crate::capacity::{bytes_to_gib, gib_to_bytes};

/// Zone used when a create request leaves placement to the backend.
pub const DEFAULT_ZONE: &str = "zone-a";

/// Device names handed out per instance: `/dev/xvdb` .. `/dev/xvdz`.
const DEVICE_LETTERS: &[u8] = b"bcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone)]
struct Attachment {
    node_id: String,
    device_path: String,
}

/// Concrete in-memory backend.
#[derive(Debug)]
pub struct InMemoryCloud {
    default_zone: String,
    /// Disks keyed by volume ID.
    disks: DashMap<String, Disk>,
    /// Snapshots keyed by snapshot ID.
    snapshots: DashMap<String, CloudSnapshot>,
    /// Current attachment of each attached volume, keyed by volume ID.
    attachments: DashMap<String, Attachment>,
    /// Device letters held by current attachments, per instance.
    devices_in_use: DashMap<String, HashSet<u8>>,
    instances: DashSet<String>,
    disk_creates: AtomicUsize,
    snapshot_creates: AtomicUsize,
}

impl Default for InMemoryCloud {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCloud {
    pub fn new() -> Self {
        Self::with_zone(DEFAULT_ZONE)
    }

    /// Backend that places unconstrained disks in `zone`.
    pub fn with_zone(zone: impl Into<String>) -> Self {
        Self {
            default_zone: zone.into(),
            disks: DashMap::new(),
            snapshots: DashMap::new(),
            attachments: DashMap::new(),
            devices_in_use: DashMap::new(),
            instances: DashSet::new(),
            disk_creates: AtomicUsize::new(0),
            snapshot_creates: AtomicUsize::new(0),
        }
    }

    /// Register a compute instance that disks may be attached to.
    pub fn add_instance(&self, node_id: impl Into<String>) {
        self.instances.insert(node_id.into());
    }

    /// Store `disk` as-is, bypassing name checks.
    pub fn insert_disk(&self, disk: Disk) {
        self.disks.insert(disk.volume_id.clone(), disk);
    }

    /// Mark a snapshot as fully materialized.  Returns `false` if unknown.
    pub fn set_snapshot_ready(&self, snapshot_id: &str) -> bool {
        match self.snapshots.get_mut(snapshot_id) {
            Some(mut snap) => {
                snap.ready_to_use = true;
                true
            }
            None => false,
        }
    }

    /// Instance the volume is attached to, if any.
    pub fn attached_node(&self, volume_id: &str) -> Option<String> {
        self.attachments.get(volume_id).map(|a| a.node_id.clone())
    }

    pub fn disk_count(&self) -> usize {
        self.disks.len()
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    /// Number of successful `create_disk` calls so far.
    pub fn disk_creates(&self) -> usize {
        self.disk_creates.load(Ordering::SeqCst)
    }

    /// Number of successful `create_snapshot` calls so far.
    pub fn snapshot_creates(&self) -> usize {
        self.snapshot_creates.load(Ordering::SeqCst)
    }

    /// Lowest device name not held by another attachment on `node_id`.
    fn allocate_device(&self, node_id: &str) -> Result<String, CloudError> {
        let mut in_use = self.devices_in_use.entry(node_id.to_owned()).or_default();
        let letter = DEVICE_LETTERS
            .iter()
            .copied()
            .find(|l| !in_use.contains(l))
            .ok_or_else(|| CloudError::Api(format!("no free device name on {node_id}")))?;
        in_use.insert(letter);
        Ok(format!("/dev/xvd{}", char::from(letter)))
    }

    fn release_device(&self, node_id: &str, device_path: &str) {
        if let Some(&letter) = device_path.as_bytes().last()
            && let Some(mut in_use) = self.devices_in_use.get_mut(node_id)
        {
            in_use.remove(&letter);
        }
    }
}

#[async_trait]
impl Cloud for InMemoryCloud {
    async fn get_disk_by_name(&self, name: &str, capacity_bytes: u64) -> Result<Disk, CloudError> {
        let mut matches = self
            .disks
            .iter()
            .filter(|entry| entry.value().name == name)
            .map(|entry| entry.value().clone());

        let disk = matches.next().ok_or(CloudError::NotFound)?;
        if matches.next().is_some() {
            return Err(CloudError::MultipleDisks);
        }
        if disk.capacity_gib != bytes_to_gib(capacity_bytes) {
            return Err(CloudError::DiskExistsDiffSize);
        }
        Ok(disk)
    }

    async fn get_disk_by_id(&self, volume_id: &str) -> Result<Disk, CloudError> {
        self.disks
            .get(volume_id)
            .map(|d| d.clone())
            .ok_or(CloudError::NotFound)
    }

    async fn create_disk(&self, name: &str, opts: &DiskOptions) -> Result<Disk, CloudError> {
        if opts.capacity_bytes == 0 {
            return Err(CloudError::Api("capacity must be positive".into()));
        }
        if opts.volume_type.requires_iops() && opts.iops_per_gb == 0 {
            return Err(CloudError::Api(format!(
                "volume type {} requires iops",
                opts.volume_type
            )));
        }
        if let Some(snapshot_id) = &opts.snapshot_id
            && !self.snapshots.contains_key(snapshot_id)
        {
            return Err(CloudError::Api(format!("snapshot {snapshot_id} does not exist")));
        }

        let disk = Disk {
            volume_id: format!("vol-{}", uuid::Uuid::new_v4().simple()),
            name: opts
                .tags
                .get(VOLUME_NAME_TAG_KEY)
                .cloned()
                .unwrap_or_else(|| name.to_owned()),
            capacity_gib: bytes_to_gib(opts.capacity_bytes),
            volume_type: opts.volume_type,
            availability_zone: if opts.availability_zone.is_empty() {
                self.default_zone.clone()
            } else {
                opts.availability_zone.clone()
            },
            encrypted: opts.encrypted,
            kms_key_id: opts.kms_key_id.clone(),
            snapshot_id: opts.snapshot_id.clone(),
            fs_type: String::new(),
        };

        self.disks.insert(disk.volume_id.clone(), disk.clone());
        self.disk_creates.fetch_add(1, Ordering::SeqCst);
        debug!(volume_id = %disk.volume_id, name, "disk created");
        Ok(disk)
    }

    async fn delete_disk(&self, volume_id: &str) -> Result<(), CloudError> {
        if let Some(a) = self.attachments.get(volume_id) {
            return Err(CloudError::Api(format!(
                "volume {volume_id} is in use by {}",
                a.node_id
            )));
        }
        self.disks
            .remove(volume_id)
            .map(|_| ())
            .ok_or(CloudError::NotFound)
    }

    async fn attach_disk(&self, volume_id: &str, node_id: &str) -> Result<String, CloudError> {
        if !self.instances.contains(node_id) || !self.disks.contains_key(volume_id) {
            return Err(CloudError::NotFound);
        }
        match self.attachments.entry(volume_id.to_owned()) {
            Entry::Occupied(existing) if existing.get().node_id == node_id => {
                Ok(existing.get().device_path.clone())
            }
            Entry::Occupied(_) => Err(CloudError::AlreadyExists),
            Entry::Vacant(slot) => {
                let device_path = self.allocate_device(node_id)?;
                slot.insert(Attachment {
                    node_id: node_id.to_owned(),
                    device_path: device_path.clone(),
                });
                Ok(device_path)
            }
        }
    }

    async fn detach_disk(&self, volume_id: &str, node_id: &str) -> Result<(), CloudError> {
        match self.attachments.entry(volume_id.to_owned()) {
            Entry::Occupied(existing) if existing.get().node_id == node_id => {
                let attachment = existing.remove();
                self.release_device(node_id, &attachment.device_path);
                Ok(())
            }
            // Attached elsewhere: the pair asked about is already detached.
            Entry::Occupied(_) | Entry::Vacant(_) => Ok(()),
        }
    }

    async fn instance_exists(&self, node_id: &str) -> bool {
        self.instances.contains(node_id)
    }

    async fn get_snapshot_by_name(&self, name: &str) -> Result<CloudSnapshot, CloudError> {
        self.snapshots
            .iter()
            .find(|entry| entry.value().name == name)
            .map(|entry| entry.value().clone())
            .ok_or(CloudError::NotFound)
    }

    async fn create_snapshot(
        &self,
        volume_id: &str,
        opts: &SnapshotOptions,
    ) -> Result<CloudSnapshot, CloudError> {
        let capacity_gib = self
            .disks
            .get(volume_id)
            .map(|d| d.capacity_gib)
            .ok_or(CloudError::NotFound)?;

        let snapshot = CloudSnapshot {
            snapshot_id: format!("snap-{}", uuid::Uuid::new_v4().simple()),
            name: opts
                .tags
                .get(SNAPSHOT_NAME_TAG_KEY)
                .cloned()
                .unwrap_or_default(),
            source_volume_id: volume_id.to_owned(),
            size_bytes: gib_to_bytes(capacity_gib),
            creation_time: SystemTime::now(),
            ready_to_use: false,
        };

        self.snapshots
            .insert(snapshot.snapshot_id.clone(), snapshot.clone());
        self.snapshot_creates.fetch_add(1, Ordering::SeqCst);
        debug!(snapshot_id = %snapshot.snapshot_id, volume_id, "snapshot created");
        Ok(snapshot)
    }

    async fn delete_snapshot(&self, snapshot_id: &str) -> Result<(), CloudError> {
        self.snapshots
            .remove(snapshot_id)
            .map(|_| ())
            .ok_or(CloudError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::GIB;
    use std::collections::HashMap;

    fn opts(gib: u64) -> DiskOptions {
        DiskOptions {
            capacity_bytes: gib * GIB,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn lookup_by_name_compares_size() {
        let cloud = InMemoryCloud::new();
        let disk = cloud.create_disk("data", &opts(4)).await.unwrap();
        assert_eq!(disk.availability_zone, DEFAULT_ZONE);

        let found = cloud.get_disk_by_name("data", 4 * GIB).await.unwrap();
        assert_eq!(found.volume_id, disk.volume_id);
        assert_eq!(
            cloud.get_disk_by_name("data", 5 * GIB).await,
            Err(CloudError::DiskExistsDiffSize)
        );
        assert_eq!(
            cloud.get_disk_by_name("other", 4 * GIB).await,
            Err(CloudError::NotFound)
        );
    }

    #[tokio::test]
    async fn duplicate_names_are_reported() {
        let cloud = InMemoryCloud::new();
        cloud.create_disk("twin", &opts(1)).await.unwrap();
        cloud.create_disk("twin", &opts(1)).await.unwrap();
        assert_eq!(
            cloud.get_disk_by_name("twin", GIB).await,
            Err(CloudError::MultipleDisks)
        );
    }

    #[tokio::test]
    async fn name_tag_overrides_name_argument() {
        let cloud = InMemoryCloud::new();
        let mut o = opts(1);
        o.tags = HashMap::from([(VOLUME_NAME_TAG_KEY.to_owned(), "tagged".to_owned())]);
        let disk = cloud.create_disk("untagged", &o).await.unwrap();
        assert_eq!(disk.name, "tagged");
    }

    #[tokio::test]
    async fn attach_is_exclusive_and_detach_idempotent() {
        let cloud = InMemoryCloud::new();
        cloud.add_instance("i-1");
        cloud.add_instance("i-2");
        let disk = cloud.create_disk("data", &opts(1)).await.unwrap();

        let dev = cloud.attach_disk(&disk.volume_id, "i-1").await.unwrap();
        assert_eq!(dev, "/dev/xvdb");
        assert_eq!(cloud.attach_disk(&disk.volume_id, "i-1").await.unwrap(), dev);
        assert_eq!(
            cloud.attach_disk(&disk.volume_id, "i-2").await,
            Err(CloudError::AlreadyExists)
        );
        cloud.detach_disk(&disk.volume_id, "i-2").await.unwrap();
        assert_eq!(cloud.attached_node(&disk.volume_id).as_deref(), Some("i-1"));

        cloud.detach_disk(&disk.volume_id, "i-1").await.unwrap();
        cloud.detach_disk(&disk.volume_id, "i-1").await.unwrap();
        assert_eq!(cloud.attached_node(&disk.volume_id), None);
    }

    #[tokio::test]
    async fn device_names_are_reused_after_detach() {
        let cloud = InMemoryCloud::new();
        cloud.add_instance("i-1");
        let a = cloud.create_disk("a", &opts(1)).await.unwrap();
        let b = cloud.create_disk("b", &opts(1)).await.unwrap();

        for _ in 0..(DEVICE_LETTERS.len() + 5) {
            let dev = cloud.attach_disk(&a.volume_id, "i-1").await.unwrap();
            assert_eq!(dev, "/dev/xvdb");
            cloud.detach_disk(&a.volume_id, "i-1").await.unwrap();
        }

        // A held device is skipped and the freed one handed out again.
        assert_eq!(cloud.attach_disk(&a.volume_id, "i-1").await.unwrap(), "/dev/xvdb");
        assert_eq!(cloud.attach_disk(&b.volume_id, "i-1").await.unwrap(), "/dev/xvdc");
        cloud.detach_disk(&a.volume_id, "i-1").await.unwrap();
        assert_eq!(cloud.attach_disk(&a.volume_id, "i-1").await.unwrap(), "/dev/xvdb");
    }

    #[tokio::test]
    async fn delete_attached_disk_fails() {
        let cloud = InMemoryCloud::new();
        cloud.add_instance("i-1");
        let disk = cloud.create_disk("data", &opts(1)).await.unwrap();
        cloud.attach_disk(&disk.volume_id, "i-1").await.unwrap();

        assert!(matches!(
            cloud.delete_disk(&disk.volume_id).await,
            Err(CloudError::Api(_))
        ));
        cloud.detach_disk(&disk.volume_id, "i-1").await.unwrap();
        cloud.delete_disk(&disk.volume_id).await.unwrap();
        assert_eq!(
            cloud.delete_disk(&disk.volume_id).await,
            Err(CloudError::NotFound)
        );
    }

    #[tokio::test]
    async fn snapshots_start_pending() {
        let cloud = InMemoryCloud::new();
        let disk = cloud.create_disk("data", &opts(2)).await.unwrap();
        let snap = cloud
            .create_snapshot(
                &disk.volume_id,
                &SnapshotOptions {
                    tags: HashMap::from([(SNAPSHOT_NAME_TAG_KEY.to_owned(), "nightly".to_owned())]),
                },
            )
            .await
            .unwrap();
        assert!(!snap.ready_to_use);
        assert_eq!(snap.size_bytes, 2 * GIB);

        assert!(cloud.set_snapshot_ready(&snap.snapshot_id));
        let found = cloud.get_snapshot_by_name("nightly").await.unwrap();
        assert!(found.ready_to_use);

        assert_eq!(
            cloud.create_snapshot("vol-missing", &SnapshotOptions::default()).await,
            Err(CloudError::NotFound)
        );
    }
}

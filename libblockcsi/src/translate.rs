//! Conversion of backend records into wire descriptors.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::capacity::gib_to_bytes;
use crate::cloud::{CloudSnapshot, Disk};
use crate::error::CsiError;
use crate::topology::TOPOLOGY_KEY;
use crate::types::{Snapshot, Timestamp, Topology, Volume, VolumeContentSource};

/// Volume context key carrying the filesystem hint from the storage class.
pub const FS_TYPE_KEY: &str = "fsType";

/// 0001-01-01T00:00:00Z
const MIN_TIMESTAMP_SECONDS: i64 = -62_135_596_800;
/// 9999-12-31T23:59:59Z
const MAX_TIMESTAMP_SECONDS: i64 = 253_402_300_799;

impl TryFrom<SystemTime> for Timestamp {
    type Error = CsiError;

    fn try_from(time: SystemTime) -> Result<Self, Self::Error> {
        let out_of_range = || CsiError::Internal(format!("timestamp {time:?} out of range"));

        let (seconds, nanos) = match time.duration_since(UNIX_EPOCH) {
            Ok(after) => (
                i64::try_from(after.as_secs()).map_err(|_| out_of_range())?,
                after.subsec_nanos(),
            ),
            Err(before) => {
                let before = before.duration();
                let seconds = i64::try_from(before.as_secs())
                    .map_err(|_| out_of_range())?
                    .checked_neg()
                    .ok_or_else(out_of_range)?;
                // Nanos stay non-negative: borrow one second.
                match before.subsec_nanos() {
                    0 => (seconds, 0),
                    n => (
                        seconds.checked_sub(1).ok_or_else(out_of_range)?,
                        1_000_000_000 - n,
                    ),
                }
            }
        };

        if !(MIN_TIMESTAMP_SECONDS..=MAX_TIMESTAMP_SECONDS).contains(&seconds) {
            return Err(out_of_range());
        }
        Ok(Self {
            seconds,
            nanos: i32::try_from(nanos).map_err(|_| out_of_range())?,
        })
    }
}

/// Describe `disk` to the orchestrator.  Its topology is exactly the zone the
/// backend placed it in.
pub fn volume_from_disk(disk: &Disk) -> Volume {
    let content_source = disk
        .snapshot_id
        .as_deref()
        .map(|id| VolumeContentSource::Snapshot {
            snapshot_id: id.into(),
        });
    Volume {
        volume_id: disk.volume_id.as_str().into(),
        capacity_bytes: gib_to_bytes(disk.capacity_gib),
        volume_context: HashMap::from([(FS_TYPE_KEY.to_owned(), disk.fs_type.clone())]),
        accessible_topology: vec![Topology::single(
            TOPOLOGY_KEY,
            disk.availability_zone.as_str(),
        )],
        content_source,
    }
}

/// Describe `snapshot` to the orchestrator.
///
/// # Errors
///
/// [`CsiError::Internal`] when the creation time cannot be represented.
pub fn snapshot_from_cloud(snapshot: &CloudSnapshot) -> Result<Snapshot, CsiError> {
    Ok(Snapshot {
        snapshot_id: snapshot.snapshot_id.as_str().into(),
        source_volume_id: snapshot.source_volume_id.as_str().into(),
        size_bytes: snapshot.size_bytes,
        creation_time: Timestamp::try_from(snapshot.creation_time)?,
        ready_to_use: snapshot.ready_to_use,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::GIB;
    use crate::cloud::VolumeType;
    use crate::error::Code;
    use crate::types::SnapshotId;
    use std::time::Duration;

    #[test]
    fn volume_carries_zone_and_fs_type() {
        let disk = Disk {
            volume_id: "vol-1".into(),
            name: "pvc-1".into(),
            capacity_gib: 8,
            volume_type: VolumeType::St1,
            availability_zone: "zone-b".into(),
            encrypted: false,
            kms_key_id: None,
            snapshot_id: Some("snap-1".into()),
            fs_type: "xfs".into(),
        };
        let vol = volume_from_disk(&disk);

        assert_eq!(vol.volume_id.as_str(), "vol-1");
        assert_eq!(vol.capacity_bytes, 8 * GIB);
        assert_eq!(vol.volume_context.get(FS_TYPE_KEY).map(String::as_str), Some("xfs"));
        assert_eq!(vol.accessible_topology, vec![Topology::single(TOPOLOGY_KEY, "zone-b")]);
        assert_eq!(
            vol.content_source,
            Some(VolumeContentSource::Snapshot {
                snapshot_id: SnapshotId::from("snap-1"),
            })
        );
    }

    #[test]
    fn timestamp_after_epoch() {
        let t = UNIX_EPOCH + Duration::new(1_700_000_000, 250);
        assert_eq!(
            Timestamp::try_from(t),
            Ok(Timestamp {
                seconds: 1_700_000_000,
                nanos: 250
            })
        );
    }

    #[test]
    fn timestamp_before_epoch_keeps_positive_nanos() {
        let t = UNIX_EPOCH - Duration::new(1, 500_000_000);
        assert_eq!(
            Timestamp::try_from(t),
            Ok(Timestamp {
                seconds: -2,
                nanos: 500_000_000
            })
        );
    }

    #[test]
    fn timestamp_out_of_range_is_internal() {
        let Some(far) = UNIX_EPOCH.checked_add(Duration::from_secs(300_000_000_000)) else {
            return;
        };
        let snap = CloudSnapshot {
            snapshot_id: "snap-1".into(),
            name: "n".into(),
            source_volume_id: "vol-1".into(),
            size_bytes: GIB,
            creation_time: far,
            ready_to_use: true,
        };
        assert_eq!(snapshot_from_cloud(&snap).unwrap_err().code(), Code::Internal);
    }

    #[test]
    fn snapshot_fields_copied() {
        let snap = CloudSnapshot {
            snapshot_id: "snap-1".into(),
            name: "n".into(),
            source_volume_id: "vol-1".into(),
            size_bytes: 2 * GIB,
            creation_time: UNIX_EPOCH + Duration::from_secs(10),
            ready_to_use: false,
        };
        let wire = snapshot_from_cloud(&snap).unwrap();
        assert_eq!(wire.snapshot_id.as_str(), "snap-1");
        assert_eq!(wire.source_volume_id.as_str(), "vol-1");
        assert_eq!(wire.size_bytes, 2 * GIB);
        assert_eq!(wire.creation_time.seconds, 10);
        assert!(!wire.ready_to_use);
    }
}

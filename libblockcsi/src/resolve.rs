//! Idempotency resolution for create requests.
//!
//! The orchestrator retries every RPC until it sees a definite answer, so a
//! create may arrive for a resource that a previous attempt already made.
//! Nothing is recorded locally: whether to reuse, reject or create is decided
//! solely from a name lookup against the backend.
//!
//! Only a backend `NotFound` lets the create proceed.  Every other lookup
//! outcome is terminal.

use tracing::debug;

use crate::cloud::{CloudError, CloudSnapshot, Disk};
use crate::error::CsiError;

/// Outcome of a name lookup that did not end the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    /// No resource with this name: go ahead and create.
    Absent,
    /// A matching resource exists: the create is a replay.
    Existing(T),
}

/// Classify the result of [`Cloud::get_disk_by_name`](crate::cloud::Cloud::get_disk_by_name).
pub fn classify_disk_lookup(
    name: &str,
    lookup: Result<Disk, CloudError>,
) -> Result<Lookup<Disk>, CsiError> {
    match lookup {
        Ok(disk) => {
            debug!(name, volume_id = %disk.volume_id, "volume already exists with matching size");
            Ok(Lookup::Existing(disk))
        }
        Err(CloudError::NotFound) => Ok(Lookup::Absent),
        Err(e @ CloudError::DiskExistsDiffSize) => Err(CsiError::AlreadyExists(format!(
            "volume {name:?}: {e}"
        ))),
        Err(e @ CloudError::MultipleDisks) => {
            Err(CsiError::Internal(format!("volume {name:?}: {e}")))
        }
        Err(e @ (CloudError::AlreadyExists | CloudError::Api(_))) => Err(CsiError::Internal(
            format!("could not look up volume {name:?}: {e}"),
        )),
    }
}

/// Classify the result of
/// [`Cloud::get_snapshot_by_name`](crate::cloud::Cloud::get_snapshot_by_name)
/// against the requested source volume.
///
/// An existing snapshot is reused whatever its readiness: readiness is
/// reported, not enforced, at creation time.
pub fn classify_snapshot_lookup(
    name: &str,
    source_volume_id: &str,
    lookup: Result<CloudSnapshot, CloudError>,
) -> Result<Lookup<CloudSnapshot>, CsiError> {
    match lookup {
        Ok(snapshot) if snapshot.source_volume_id == source_volume_id => {
            debug!(
                name,
                snapshot_id = %snapshot.snapshot_id,
                ready = snapshot.ready_to_use,
                "snapshot already exists for this volume"
            );
            Ok(Lookup::Existing(snapshot))
        }
        Ok(snapshot) => Err(CsiError::AlreadyExists(format!(
            "snapshot {name:?} already exists for different volume ({})",
            snapshot.source_volume_id
        ))),
        Err(CloudError::NotFound) => Ok(Lookup::Absent),
        Err(e @ (CloudError::MultipleDisks
        | CloudError::DiskExistsDiffSize
        | CloudError::AlreadyExists
        | CloudError::Api(_))) => Err(CsiError::Internal(format!(
            "could not look up snapshot {name:?}: {e}"
        ))),
    }
}

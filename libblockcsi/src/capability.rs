//! Fixed capability tables.
//!
//! A block volume can only be attached to a single node at any given time,
//! so the only supported access mode is [`AccessMode::SingleNodeWriter`].

use crate::types::{AccessMode, ControllerCapability, VolumeCapability};

/// Access modes a volume may be requested with.
pub const SUPPORTED_ACCESS_MODES: &[AccessMode] = &[AccessMode::SingleNodeWriter];

/// RPCs advertised by `ControllerGetCapabilities`.
pub const CONTROLLER_CAPABILITIES: &[ControllerCapability] = &[
    ControllerCapability::CreateDeleteVolume,
    ControllerCapability::PublishUnpublishVolume,
    ControllerCapability::CreateDeleteSnapshot,
];

/// `true` when `capability` uses a supported access mode.
pub fn is_supported(capability: &VolumeCapability) -> bool {
    SUPPORTED_ACCESS_MODES.contains(&capability.access_mode)
}

/// `true` when every capability in `capabilities` is supported.
pub fn is_valid_volume_capabilities(capabilities: &[VolumeCapability]) -> bool {
    capabilities.iter().all(is_supported)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_node_writer_only() {
        assert!(is_supported(&VolumeCapability::mount(AccessMode::SingleNodeWriter)));
        for mode in [
            AccessMode::Unknown,
            AccessMode::SingleNodeReaderOnly,
            AccessMode::MultiNodeReaderOnly,
            AccessMode::MultiNodeSingleWriter,
            AccessMode::MultiNodeMultiWriter,
        ] {
            assert!(!is_supported(&VolumeCapability::mount(mode)), "{mode:?}");
        }
    }

    #[test]
    fn one_bad_capability_fails_the_set() {
        let caps = [
            VolumeCapability::mount(AccessMode::SingleNodeWriter),
            VolumeCapability::mount(AccessMode::MultiNodeMultiWriter),
        ];
        assert!(!is_valid_volume_capabilities(&caps));
        assert!(is_valid_volume_capabilities(&caps[..1]));
    }

    #[test]
    fn controller_table_advertises_every_capability() {
        assert_eq!(
            CONTROLLER_CAPABILITIES,
            &[
                ControllerCapability::CreateDeleteVolume,
                ControllerCapability::PublishUnpublishVolume,
                ControllerCapability::CreateDeleteSnapshot,
            ]
        );
    }
}

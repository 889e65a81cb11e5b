//! Driver configuration.
//!
//! Read once from the environment on first access:
//! - `BLOCK_CSI_DRIVER_NAME`: plugin name reported by `GetPluginInfo`.
//!   Defaults to `block.csi.rk8s.io`.
//! - `BLOCK_CSI_DEFAULT_VOLUME_GIB`: size used when `CreateVolume` carries no
//!   capacity range. Defaults to `100`.

use std::sync::LazyLock;

use tracing::warn;

use crate::capacity::GIB;

/// Default plugin name.
pub const DEFAULT_DRIVER_NAME: &str = "block.csi.rk8s.io";

/// Default volume size when the request does not specify one.
pub const DEFAULT_VOLUME_SIZE_BYTES: u64 = 100 * GIB;

/// Immutable controller configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// Plugin name reported by the Identity service.
    pub driver_name: String,
    /// Size requested from the backend when no capacity range is given.
    pub default_volume_size_bytes: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            driver_name: DEFAULT_DRIVER_NAME.to_owned(),
            default_volume_size_bytes: DEFAULT_VOLUME_SIZE_BYTES,
        }
    }
}

impl DriverConfig {
    /// Build a configuration from environment variables, falling back to the
    /// defaults for anything unset or malformed.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(name) = lookup("BLOCK_CSI_DRIVER_NAME").filter(|n| !n.trim().is_empty()) {
            config.driver_name = name.trim().to_owned();
        }

        if let Some(raw) = lookup("BLOCK_CSI_DEFAULT_VOLUME_GIB") {
            let bytes = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|g| *g > 0)
                .and_then(|g| g.checked_mul(GIB));
            match bytes {
                Some(bytes) => config.default_volume_size_bytes = bytes,
                None => warn!(value = %raw, "ignoring malformed BLOCK_CSI_DEFAULT_VOLUME_GIB"),
            }
        }

        config
    }
}

/// Globally initialized driver configuration, read from environment variables
/// at first access.
pub static DRIVER_CONFIG: LazyLock<DriverConfig> = LazyLock::new(DriverConfig::from_env);

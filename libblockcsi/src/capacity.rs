//! Capacity normalization.
//!
//! The backend allocates whole GiB, so every requested size is rounded up to
//! a GiB boundary.  Rounding must never exceed a caller-specified limit.

use crate::config::DriverConfig;
use crate::error::CsiError;
use crate::types::CapacityRange;

/// Backend allocation granularity.
pub const GIB: u64 = 1024 * 1024 * 1024;

/// Round `bytes` up to the next GiB boundary.  `None` on overflow.
pub fn round_up_bytes(bytes: u64) -> Option<u64> {
    bytes.div_ceil(GIB).checked_mul(GIB)
}

/// Whole GiB needed to hold `bytes`.
pub fn bytes_to_gib(bytes: u64) -> u64 {
    bytes.div_ceil(GIB)
}

/// Saturating: backend sizes never get near `u64::MAX` bytes.
pub fn gib_to_bytes(gib: u64) -> u64 {
    gib.saturating_mul(GIB)
}

/// Number of bytes to request from the backend for `range`.
pub fn normalize(range: Option<&CapacityRange>, config: &DriverConfig) -> Result<u64, CsiError> {
    let Some(range) = range else {
        return Ok(config.default_volume_size_bytes);
    };
    let limit = range.limit_bytes.filter(|l| *l > 0);

    if range.required_bytes == 0 {
        // No lower bound: the default size, shrunk to fit under the limit.
        let Some(limit) = limit else {
            return Ok(config.default_volume_size_bytes);
        };
        let ceiling = limit - limit % GIB;
        if ceiling == 0 {
            return Err(CsiError::InvalidArgument(format!(
                "limit of {limit} bytes is below the 1 GiB allocation unit"
            )));
        }
        return Ok(config.default_volume_size_bytes.min(ceiling));
    }

    let size = round_up_bytes(range.required_bytes).ok_or_else(|| {
        CsiError::InvalidArgument(format!(
            "required size of {} bytes is too large",
            range.required_bytes
        ))
    })?;
    if let Some(limit) = limit
        && size > limit
    {
        return Err(CsiError::InvalidArgument(format!(
            "after round-up, volume size {size} exceeds the limit of {limit} bytes"
        )));
    }
    Ok(size)
}

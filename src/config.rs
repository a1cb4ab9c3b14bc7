//! Configuration for the PicoPass core.
//!
//! Holds the fixed layout constants of the device and the few settings a
//! board integration may tune.

/// Number of password slots on the device.
pub const MAX_PASSWORD_SLOTS: usize = 4;

/// Longest password, in bytes, a slot can hold.
pub const MAX_PASSWORD_LENGTH: usize = 64;

/// Inactivity period before a forced lock, in seconds.
pub const DEFAULT_AUTO_LOCK_TIMEOUT_S: u32 = 120;

/// One flash sector.
pub const DEFAULT_REGION_CAPACITY: usize = 4096;

/// Flash program granularity.
pub const DEFAULT_PAGE_SIZE: usize = 256;

/// Main configuration structure for the core.
///
/// Populated by the board integration and passed to the controller and the
/// storage region at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Timeout written into a fresh (unprovisioned) record.
    pub auto_lock_timeout_s: u32,

    /// Geometry of the non-volatile region holding the record.
    pub region: RegionConfig,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            auto_lock_timeout_s: DEFAULT_AUTO_LOCK_TIMEOUT_S,
            region: RegionConfig::default(),
        }
    }
}

/// Geometry of the storage region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionConfig {
    /// Total bytes reserved for the record, erased as one unit.
    pub capacity: usize,

    /// Writes are rounded up to a multiple of this.
    pub page_size: usize,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_REGION_CAPACITY,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

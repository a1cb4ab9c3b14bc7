#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod command;
pub mod config;
pub mod crypto;
pub mod device;
pub mod entropy;
pub mod platform;
pub mod record;
pub mod storage;

#[cfg(test)]
mod test_support;

pub use config::DeviceConfig;
pub use crypto::{CryptoEngine, CryptoError};
pub use device::{DeviceController, DeviceError, DeviceStatus, LockState};
pub use record::{DeviceRecord, PasswordSlot};
pub use storage::{PersistentStore, StorageError};

/// Firmware-facing version string reported by the identity commands.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[no_mangle]
pub extern "C" fn picopass_core_version() -> u32 {
    0x010000
}

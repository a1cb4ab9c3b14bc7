//! Device Controller.
//!
//! Owns the device record and drives the crypto engine and the persistent
//! store through the lock state machine. This is the surface the button,
//! serial and USB adapters call into; it never talks to a transport itself
//! and reports every outcome as a [`DeviceError`] or a value.

pub mod controller;
pub mod state;

pub use controller::DeviceController;
pub use state::{LockCause, LockObserver, LockState};

use core::fmt;

use crate::config::MAX_PASSWORD_SLOTS;

/// Outcome kinds of controller operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    /// Credential does not match the provisioned master credential.
    AuthenticationFailed,
    /// A master credential is needed but none (or an empty one) was given.
    CredentialRequired,
    /// Operation needs the device unlocked.
    DeviceLocked,
    /// Slot index outside `0..MAX_PASSWORD_SLOTS`.
    InvalidSlot,
    /// Slot holds no password.
    SlotEmpty,
    /// No working key cached.
    NoActiveKey,
    /// The crypto engine could not seal the password.
    EncryptionFailed,
    /// Ciphertext rejected on decrypt (padding check included).
    DecryptionFailed,
    /// The storage write failed; the in-memory change was rolled back.
    PersistFailed,
    /// The record does not fit the storage region.
    RegionTooSmall,
    /// Stored record failed validation.
    StorageInvalid,
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::AuthenticationFailed => write!(f, "Wrong master password"),
            DeviceError::CredentialRequired => write!(f, "Master password required"),
            DeviceError::DeviceLocked => write!(f, "Device locked"),
            DeviceError::InvalidSlot => write!(f, "Invalid slot"),
            DeviceError::SlotEmpty => write!(f, "Slot is empty"),
            DeviceError::NoActiveKey => write!(f, "No active key"),
            DeviceError::EncryptionFailed => write!(f, "Encryption failed"),
            DeviceError::DecryptionFailed => write!(f, "Decryption failed"),
            DeviceError::PersistFailed => write!(f, "Failed to persist device state"),
            DeviceError::RegionTooSmall => write!(f, "Storage region too small"),
            DeviceError::StorageInvalid => write!(f, "Stored data invalid"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DeviceError {}

/// Read-only snapshot for the adapters' status command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DeviceStatus {
    pub unlocked: bool,
    pub slots: [bool; MAX_PASSWORD_SLOTS],
    #[cfg_attr(feature = "serde", serde(rename = "timeout"))]
    pub auto_lock_timeout_s: u32,
}

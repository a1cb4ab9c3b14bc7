//! Storage Module.
//!
//! Persists the whole [`DeviceRecord`](crate::record::DeviceRecord) as one
//! framed blob in a fixed non-volatile region:
//! - `codec`: the on-media frame (magic, version, record, CRC-32).
//! - `store`: save/load over a region, under a bus critical section.
//! - `critical`: scoped exclusive access to the storage bus.
//! - `region`: RAM-backed region; `mapped` and `nor_flash` add
//!   memory-mapped-file and `embedded-storage` backends.
//!
//! # Durability
//! A save erases the region and programs it again. There is no journal: a
//! failure in between leaves the region indeterminate, and the next load
//! falls back to a fresh record.

pub mod codec;
pub mod critical;
#[cfg(feature = "mmap")]
pub mod mapped;
#[cfg(feature = "embedded-storage")]
pub mod nor_flash;
pub mod region;
pub mod store;

pub use critical::{BusLock, CriticalSection, NoBusLock};
#[cfg(feature = "mmap")]
pub use mapped::MappedRegion;
#[cfg(feature = "embedded-storage")]
pub use nor_flash::NorFlashRegion;
pub use region::RamRegion;
pub use store::PersistentStore;

use core::fmt;

/// Errors raised by a storage region backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionError {
    /// Access past the end of the region.
    OutOfBounds,
    /// Offset or length not aligned to the medium's granularity.
    Misaligned,
    /// The medium reported a failure.
    Io,
}

impl fmt::Display for RegionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionError::OutOfBounds => write!(f, "Access out of region bounds"),
            RegionError::Misaligned => write!(f, "Misaligned region access"),
            RegionError::Io => write!(f, "Storage medium I/O error"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RegionError {}

#[cfg(feature = "std")]
impl From<std::io::Error> for RegionError {
    fn from(_: std::io::Error) -> Self {
        RegionError::Io
    }
}

/// Errors related to persisting the device record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// The framed record does not fit the region.
    RegionTooSmall,
    /// Magic, version, checksum or record contents rejected on load.
    StorageInvalid,
    /// The medium failed during erase or program.
    WriteFailed(RegionError),
    /// The medium failed during read.
    ReadFailed(RegionError),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::RegionTooSmall => write!(f, "Record does not fit the storage region"),
            StorageError::StorageInvalid => write!(f, "Stored record is invalid"),
            StorageError::WriteFailed(err) => write!(f, "Storage write failed: {err}"),
            StorageError::ReadFailed(err) => write!(f, "Storage read failed: {err}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for StorageError {}

/// A fixed-size non-volatile region with erase-then-program semantics.
pub trait StorageRegion {
    /// Total size of the region in bytes.
    fn capacity(&self) -> usize;

    /// Program granularity; writes are padded to a multiple of it.
    fn page_size(&self) -> usize;

    /// Reads `buf.len()` bytes starting at `offset`.
    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), RegionError>;

    /// Erases the whole region (every byte reads back as `0xFF`).
    fn erase(&mut self) -> Result<(), RegionError>;

    /// Programs `data` at `offset`. The target must have been erased.
    fn program(&mut self, offset: usize, data: &[u8]) -> Result<(), RegionError>;
}

impl<R: StorageRegion + ?Sized> StorageRegion for &mut R {
    fn capacity(&self) -> usize {
        (**self).capacity()
    }

    fn page_size(&self) -> usize {
        (**self).page_size()
    }

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), RegionError> {
        (**self).read(offset, buf)
    }

    fn erase(&mut self) -> Result<(), RegionError> {
        (**self).erase()
    }

    fn program(&mut self, offset: usize, data: &[u8]) -> Result<(), RegionError> {
        (**self).program(offset, data)
    }
}

/// Checks `offset..offset + len` against a region of `capacity` bytes.
pub(crate) fn check_bounds(offset: usize, len: usize, capacity: usize) -> Result<(), RegionError> {
    match offset.checked_add(len) {
        Some(end) if end <= capacity => Ok(()),
        _ => Err(RegionError::OutOfBounds),
    }
}

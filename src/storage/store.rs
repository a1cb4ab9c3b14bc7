//! Whole-record persistence over a [`StorageRegion`].

use alloc::vec;
use zeroize::Zeroizing;

use super::codec::{self, FRAME_LEN};
use super::critical::{BusLock, CriticalSection};
use super::{StorageError, StorageRegion};
use crate::record::DeviceRecord;

/// Saves and loads the device record as a single framed blob.
pub struct PersistentStore<R, L> {
    region: R,
    bus: L,
}

impl<R: StorageRegion, L: BusLock> PersistentStore<R, L> {
    pub fn new(region: R, bus: L) -> Self {
        Self { region, bus }
    }

    pub fn region(&self) -> &R {
        &self.region
    }

    pub fn region_mut(&mut self) -> &mut R {
        &mut self.region
    }

    pub fn into_parts(self) -> (R, L) {
        (self.region, self.bus)
    }

    /// Bytes a save programs: the frame rounded up to whole pages.
    pub fn write_size(&self) -> usize {
        let page = self.region.page_size().max(1);
        FRAME_LEN.div_ceil(page) * page
    }

    /// Erases the region and programs `record` into it.
    ///
    /// Not atomic: if the medium fails after the erase the region content is
    /// undefined and the next `load` returns `None`.
    pub fn save(&mut self, record: &DeviceRecord) -> Result<(), StorageError> {
        let write_size = self.write_size();
        if write_size > self.region.capacity() {
            log::warn!(
                "record frame needs {} bytes, region holds {}",
                write_size,
                self.region.capacity()
            );
            return Err(StorageError::RegionTooSmall);
        }

        let frame = Zeroizing::new(codec::encode(record));
        let mut buf = Zeroizing::new(vec![0u8; write_size]);
        buf[..frame.len()].copy_from_slice(&frame);

        let _cs = CriticalSection::enter(&mut self.bus);
        self.region.erase().map_err(StorageError::WriteFailed)?;
        self.region.program(0, &buf).map_err(StorageError::WriteFailed)?;

        log::debug!("record saved ({write_size} bytes)");
        Ok(())
    }

    /// Reads and validates the stored record.
    ///
    /// First boot and a corrupted region look the same: both give `None`.
    pub fn load(&mut self) -> Option<DeviceRecord> {
        match self.try_load() {
            Ok(record) => Some(record),
            Err(err) => {
                log::warn!("no usable stored record: {err}");
                None
            }
        }
    }

    /// Like [`load`](Self::load) but reports why nothing was loaded.
    pub fn try_load(&mut self) -> Result<DeviceRecord, StorageError> {
        if self.region.capacity() < FRAME_LEN {
            return Err(StorageError::RegionTooSmall);
        }

        // whole pages where possible, drivers may reject unaligned reads
        let read_len = self.write_size().min(self.region.capacity());
        let mut buf = Zeroizing::new(vec![0u8; read_len]);
        self.region.read(0, &mut buf).map_err(StorageError::ReadFailed)?;

        codec::decode(&buf).map_err(|fault| {
            log::debug!("stored frame rejected: {fault}");
            StorageError::StorageInvalid
        })
    }
}

//! Region over an `embedded-storage` NOR flash driver.

use embedded_storage::nor_flash::{NorFlash, ReadNorFlash};

use super::{check_bounds, RegionError, StorageRegion};

/// A window `[offset, offset + size)` of a NOR flash device.
pub struct NorFlashRegion<F> {
    flash: F,
    offset: u32,
    size: u32,
}

impl<F: NorFlash> NorFlashRegion<F> {
    /// The window must start and end on erase-sector boundaries and lie
    /// inside the device.
    pub fn new(flash: F, offset: u32, size: u32) -> Result<Self, RegionError> {
        let erase = F::ERASE_SIZE as u32;
        if size == 0 || offset % erase != 0 || size % erase != 0 {
            return Err(RegionError::Misaligned);
        }
        check_bounds(offset as usize, size as usize, flash.capacity())?;
        Ok(Self { flash, offset, size })
    }

    pub fn into_inner(self) -> F {
        self.flash
    }

    fn absolute(&self, offset: usize, len: usize) -> Result<u32, RegionError> {
        check_bounds(offset, len, self.size as usize)?;
        u32::try_from(offset)
            .ok()
            .and_then(|o| self.offset.checked_add(o))
            .ok_or(RegionError::OutOfBounds)
    }
}

impl<F: NorFlash> StorageRegion for NorFlashRegion<F> {
    fn capacity(&self) -> usize {
        self.size as usize
    }

    fn page_size(&self) -> usize {
        F::WRITE_SIZE.max(1)
    }

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), RegionError> {
        let at = self.absolute(offset, buf.len())?;
        if at as usize % F::READ_SIZE != 0 || buf.len() % F::READ_SIZE != 0 {
            return Err(RegionError::Misaligned);
        }
        ReadNorFlash::read(&mut self.flash, at, buf).map_err(|_| RegionError::Io)
    }

    fn erase(&mut self) -> Result<(), RegionError> {
        self.flash
            .erase(self.offset, self.offset + self.size)
            .map_err(|_| RegionError::Io)
    }

    fn program(&mut self, offset: usize, data: &[u8]) -> Result<(), RegionError> {
        let at = self.absolute(offset, data.len())?;
        if at as usize % F::WRITE_SIZE != 0 || data.len() % F::WRITE_SIZE != 0 {
            return Err(RegionError::Misaligned);
        }
        self.flash.write(at, data).map_err(|_| RegionError::Io)
    }
}

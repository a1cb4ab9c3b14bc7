//! Heap-backed storage region.

use alloc::vec;
use alloc::vec::Vec;

use super::{check_bounds, RegionError, StorageRegion};
use crate::config::RegionConfig;

/// Erased flash reads as all ones.
pub const ERASED_BYTE: u8 = 0xFF;

/// A region kept in RAM, starting out erased.
///
/// Behaves like NOR flash: programming can only clear bits, so writing over
/// unerased data corrupts it the same way the real part would.
#[derive(Debug, Clone)]
pub struct RamRegion {
    data: Vec<u8>,
    page_size: usize,
}

impl RamRegion {
    pub fn new(capacity: usize, page_size: usize) -> Self {
        Self {
            data: vec![ERASED_BYTE; capacity],
            page_size: page_size.max(1),
        }
    }

    pub fn with_config(config: &RegionConfig) -> Self {
        Self::new(config.capacity, config.page_size)
    }

    /// Raw contents, for inspection.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Raw contents, for fault injection.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl StorageRegion for RamRegion {
    fn capacity(&self) -> usize {
        self.data.len()
    }

    fn page_size(&self) -> usize {
        self.page_size
    }

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), RegionError> {
        check_bounds(offset, buf.len(), self.data.len())?;
        buf.copy_from_slice(&self.data[offset..offset + buf.len()]);
        Ok(())
    }

    fn erase(&mut self) -> Result<(), RegionError> {
        self.data.fill(ERASED_BYTE);
        Ok(())
    }

    fn program(&mut self, offset: usize, data: &[u8]) -> Result<(), RegionError> {
        check_bounds(offset, data.len(), self.data.len())?;
        for (cell, &byte) in self.data[offset..offset + data.len()].iter_mut().zip(data) {
            *cell &= byte;
        }
        Ok(())
    }
}

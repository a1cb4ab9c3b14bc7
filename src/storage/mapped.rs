//! Memory-mapped file region.
//!
//! Emulates the flash sector on a host (simulator, desktop tooling): the
//! file is sized to the region capacity, erased to `0xFF` when created, and
//! flushed after every erase or program.

use std::fs::OpenOptions;
use std::path::Path;

use memmap2::{MmapMut, MmapOptions};

use super::region::ERASED_BYTE;
use super::{check_bounds, RegionError, StorageRegion};
use crate::config::RegionConfig;

pub struct MappedRegion {
    map: MmapMut,
    page_size: usize,
}

impl MappedRegion {
    /// Opens (or creates) the backing file at `path`.
    pub fn open<P: AsRef<Path>>(path: P, config: &RegionConfig) -> Result<Self, RegionError> {
        let path = path.as_ref();
        let capacity = config.capacity;
        if capacity == 0 {
            return Err(RegionError::OutOfBounds);
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let existing = file.metadata()?.len();
        let fresh = existing == 0;
        if existing != capacity as u64 {
            file.set_len(capacity as u64)?;
        }

        // SAFETY: the file is owned by this region for its lifetime; nothing
        // else in the process maps or truncates it.
        let mut map = unsafe { MmapOptions::new().len(capacity).map_mut(&file)? };

        if fresh {
            map.fill(ERASED_BYTE);
            map.flush()?;
        }

        log::debug!("mapped {} byte region at {}", capacity, path.display());
        Ok(Self {
            map,
            page_size: config.page_size.max(1),
        })
    }
}

impl StorageRegion for MappedRegion {
    fn capacity(&self) -> usize {
        self.map.len()
    }

    fn page_size(&self) -> usize {
        self.page_size
    }

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), RegionError> {
        check_bounds(offset, buf.len(), self.map.len())?;
        buf.copy_from_slice(&self.map[offset..offset + buf.len()]);
        Ok(())
    }

    fn erase(&mut self) -> Result<(), RegionError> {
        self.map.fill(ERASED_BYTE);
        self.map.flush()?;
        Ok(())
    }

    fn program(&mut self, offset: usize, data: &[u8]) -> Result<(), RegionError> {
        check_bounds(offset, data.len(), self.map.len())?;
        for (cell, &byte) in self.map[offset..offset + data.len()].iter_mut().zip(data) {
            *cell &= byte;
        }
        self.map.flush_range(offset, data.len())?;
        Ok(())
    }
}

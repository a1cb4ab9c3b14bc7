//! Shared fixtures for the controller and command tests.

use crate::config::DeviceConfig;
use crate::crypto::{BoardIdentity, CryptoEngine};
use crate::device::DeviceController;
use crate::entropy::{EntropyError, EntropySource};
use crate::platform::ManualClock;
use crate::storage::{NoBusLock, PersistentStore, RamRegion, StorageRegion};

pub(crate) type Device = DeviceController<RamRegion, NoBusLock, MockEntropy, ManualClock>;

/// Counter-based entropy, deterministic across runs.
pub(crate) struct MockEntropy {
    counter: u8,
}

impl MockEntropy {
    pub(crate) fn new() -> Self {
        Self { counter: 0 }
    }
}

impl EntropySource for MockEntropy {
    fn name(&self) -> &'static str {
        "Mock"
    }
    fn fill(&mut self, dest: &mut [u8]) -> Result<(), EntropyError> {
        for byte in dest.iter_mut() {
            *byte = self.counter;
            self.counter = self.counter.wrapping_add(7);
        }
        Ok(())
    }
}

pub(crate) fn board() -> BoardIdentity {
    BoardIdentity::from_text("E6613852832F1A2B")
}

/// A booted controller over `region` plus a handle to its clock.
pub(crate) fn build<R: StorageRegion>(
    region: R,
) -> (DeviceController<R, NoBusLock, MockEntropy, ManualClock>, ManualClock) {
    let clock = ManualClock::new(1_000_000);
    let dev = DeviceController::initialize(
        board(),
        DeviceConfig::default(),
        PersistentStore::new(region, NoBusLock),
        CryptoEngine::new(MockEntropy::new()),
        clock.clone(),
    );
    (dev, clock)
}

//! Platform services the core consumes: a monotonic millisecond clock.

#[cfg(feature = "std")]
pub mod host;

#[cfg(feature = "std")]
pub use host::HostClock;

use alloc::rc::Rc;
use core::cell::Cell;

/// Monotonic time since boot.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

/// Clock driven by whoever holds a handle to it.
///
/// Board loops feed it from their tick counter; simulations and tests
/// advance it by hand. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Rc::new(Cell::new(start_ms)),
        }
    }

    pub fn set(&self, now_ms: u64) {
        self.now.set(now_ms);
    }

    pub fn advance(&self, delta_ms: u64) {
        self.now.set(self.now.get().saturating_add(delta_ms));
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

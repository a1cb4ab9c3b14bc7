use std::time::Instant;

use super::Clock;

/// Host clock: milliseconds since the clock was created.
pub struct HostClock {
    boot: Instant,
}

impl HostClock {
    pub fn new() -> Self {
        Self {
            boot: Instant::now(),
        }
    }
}

impl Default for HostClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for HostClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.boot.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

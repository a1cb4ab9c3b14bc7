//! Exclusive access to the storage bus.
//!
//! Flash cannot be read while it is being erased or programmed, and on the
//! board code executes from that same flash. Interrupts therefore stay off
//! for the whole erase+program sequence. [`CriticalSection`] is the RAII
//! guard for that window: it releases on drop, including every early return.

/// Platform hook that suspends and restores concurrent activity.
pub trait BusLock {
    /// State saved by `acquire` and handed back to `release`
    /// (for example the interrupt mask).
    type Token;

    fn acquire(&mut self) -> Self::Token;

    fn release(&mut self, token: Self::Token);
}

/// For hosts, where nothing else touches the region.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBusLock;

impl BusLock for NoBusLock {
    type Token = ();

    fn acquire(&mut self) {}

    fn release(&mut self, _token: ()) {}
}

/// RAII guard over an acquired [`BusLock`].
pub struct CriticalSection<'a, L: BusLock> {
    lock: &'a mut L,
    token: Option<L::Token>,
}

impl<'a, L: BusLock> CriticalSection<'a, L> {
    pub fn enter(lock: &'a mut L) -> Self {
        let token = lock.acquire();
        Self {
            lock,
            token: Some(token),
        }
    }
}

impl<'a, L: BusLock> Drop for CriticalSection<'a, L> {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            self.lock.release(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingLock {
        depth: u32,
        acquired: u32,
        released: u32,
    }

    impl BusLock for CountingLock {
        type Token = u32;

        fn acquire(&mut self) -> u32 {
            self.acquired += 1;
            let saved = self.depth;
            self.depth += 1;
            saved
        }

        fn release(&mut self, token: u32) {
            self.released += 1;
            self.depth = token;
        }
    }

    fn fallible(lock: &mut CountingLock, fail: bool) -> Result<(), ()> {
        let _cs = CriticalSection::enter(lock);
        if fail {
            return Err(());
        }
        Ok(())
    }

    #[test]
    fn test_released_on_success_and_failure() {
        let mut lock = CountingLock::default();
        fallible(&mut lock, false).unwrap();
        assert!(fallible(&mut lock, true).is_err());
        assert_eq!(lock.acquired, 2);
        assert_eq!(lock.released, 2);
        assert_eq!(lock.depth, 0);
    }
}

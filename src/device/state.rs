//! Lock state and transition notifications.
//!
//! # States
//! - **Locked**: initial state on every boot; no working key exists.
//! - **Unlocked**: the working key is cached; slot operations allowed.
//!
//! Unlock is only reachable through a successful credential check. Lock is
//! reachable from any state and is idempotent.

use alloc::boxed::Box;
use alloc::vec::Vec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Locked,
    Unlocked,
}

/// What caused a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockCause {
    /// Forced lock during initialization.
    Boot,
    /// Successful credential check.
    Unlock,
    /// Explicit lock request.
    Manual,
    /// Inactivity timeout.
    AutoLock,
    /// Factory reset.
    Reset,
}

/// Observer for lock transitions (status LEDs and the like).
pub trait LockObserver {
    fn on_transition(&self, from: LockState, to: LockState, cause: LockCause);
}

/// Current state plus the registered observers.
pub(crate) struct LockMachine {
    state: LockState,
    observers: Vec<Box<dyn LockObserver>>,
}

impl LockMachine {
    pub(crate) fn new() -> Self {
        Self {
            state: LockState::Locked,
            observers: Vec::new(),
        }
    }

    pub(crate) fn state(&self) -> LockState {
        self.state
    }

    pub(crate) fn add_observer(&mut self, observer: Box<dyn LockObserver>) {
        self.observers.push(observer);
    }

    /// Moves to `to` and notifies observers, even when already there.
    pub(crate) fn transition(&mut self, to: LockState, cause: LockCause) {
        let from = self.state;
        log::info!("Lock state: {:?} -> {:?} ({:?})", from, to, cause);
        self.state = to;
        for obs in &self.observers {
            obs.on_transition(from, to, cause);
        }
    }
}

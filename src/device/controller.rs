//! The device controller: lock state machine, slot lifecycle and auto-lock.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::mem;

use zeroize::{Zeroize, Zeroizing};

use super::state::{LockCause, LockMachine, LockObserver, LockState};
use super::{DeviceError, DeviceStatus};
use crate::config::{DeviceConfig, MAX_PASSWORD_SLOTS};
use crate::crypto::{BoardIdentity, CryptoEngine, CryptoError, CredentialHash};
use crate::entropy::EntropySource;
use crate::platform::Clock;
use crate::record::{DeviceRecord, PasswordSlot};
use crate::storage::{BusLock, PersistentStore, StorageError, StorageRegion};

/// Owns the device record and every collaborator it needs.
///
/// Built once at startup by [`initialize`](Self::initialize); adapters hold
/// it and call one operation per detected event.
pub struct DeviceController<R, L, E, C> {
    record: DeviceRecord,
    machine: LockMachine,
    crypto: CryptoEngine<E>,
    store: PersistentStore<R, L>,
    clock: C,
    config: DeviceConfig,
}

impl<R, L, E, C> DeviceController<R, L, E, C>
where
    R: StorageRegion,
    L: BusLock,
    E: EntropySource,
    C: Clock,
{
    /// Loads the persisted record (or starts fresh), binds the crypto engine
    /// to `board_identity` and forces the Locked state.
    ///
    /// Never fails: an unreadable or foreign record is replaced by a fresh,
    /// unprovisioned one in memory.
    pub fn initialize(
        board_identity: BoardIdentity,
        config: DeviceConfig,
        mut store: PersistentStore<R, L>,
        mut crypto: CryptoEngine<E>,
        clock: C,
    ) -> Self {
        let record = match store.load() {
            Some(record) if record.board_identity == board_identity => record,
            Some(record) => {
                log::warn!(
                    "stored record belongs to board {}, starting fresh",
                    record.board_identity
                );
                DeviceRecord::new(board_identity, config.auto_lock_timeout_s)
            }
            None => DeviceRecord::new(board_identity, config.auto_lock_timeout_s),
        };

        crypto.initialize(&board_identity);

        let mut controller = Self {
            record,
            machine: LockMachine::new(),
            crypto,
            store,
            clock,
            config,
        };
        controller.lock_with(LockCause::Boot);

        log::info!(
            "device {} ready ({})",
            board_identity,
            if controller.record.is_provisioned() { "provisioned" } else { "unprovisioned" }
        );
        controller
    }

    /// Presents the master credential.
    ///
    /// On an unprovisioned device the credential becomes the master
    /// credential. Otherwise it must match the stored digest.
    pub fn unlock(&mut self, credential: Option<&str>) -> Result<(), DeviceError> {
        let credential = match credential {
            Some(credential) if !credential.is_empty() => credential,
            _ => {
                log::warn!("unlock rejected: master password required");
                return Err(DeviceError::CredentialRequired);
            }
        };

        let presented = self.crypto.hash_credential(credential);

        if self.record.is_provisioned() {
            if !presented.matches(&self.record.master_credential_hash) {
                log::warn!("unlock rejected: wrong master password");
                return Err(DeviceError::AuthenticationFailed);
            }
        } else {
            self.record.master_credential_hash = presented;
            if let Err(err) = self.persist() {
                self.record.master_credential_hash = CredentialHash::UNSET;
                return Err(err);
            }
            log::info!("master password set");
        }

        self.crypto.derive_and_cache_key(credential);
        self.record.unlocked = true;
        self.touch();
        self.machine.transition(LockState::Unlocked, LockCause::Unlock);
        Ok(())
    }

    /// Drops the working key and locks. Always succeeds.
    pub fn lock(&mut self) {
        self.lock_with(LockCause::Manual);
    }

    /// Decrypts the password in `slot`.
    ///
    /// The caller types it out and drops the returned buffer, which zeroes it.
    pub fn type_password(&mut self, slot: usize) -> Result<Zeroizing<Vec<u8>>, DeviceError> {
        self.require_unlocked()?;
        let entry = self.slot(slot)?;
        if !entry.occupied {
            return Err(DeviceError::SlotEmpty);
        }

        let plaintext = self
            .crypto
            .decrypt(entry.ciphertext(), &entry.iv)
            .map_err(|err| {
                log::warn!("slot {slot}: {err}");
                match err {
                    CryptoError::NoActiveKey => DeviceError::NoActiveKey,
                    _ => DeviceError::DecryptionFailed,
                }
            })?;

        self.touch();
        Ok(plaintext)
    }

    /// Encrypts `plaintext` into `slot`, replacing whatever was there.
    pub fn add_password(&mut self, slot: usize, plaintext: &str) -> Result<(), DeviceError> {
        self.require_unlocked()?;
        self.slot(slot)?;

        let sealed = self.crypto.encrypt(plaintext.as_bytes()).map_err(|err| {
            log::warn!("slot {slot}: {err}");
            DeviceError::EncryptionFailed
        })?;

        let previous = mem::replace(&mut self.record.slots[slot], PasswordSlot::from_sealed(&sealed));
        self.commit_slot(slot, previous)?;

        log::info!("password saved to slot {slot}");
        Ok(())
    }

    /// Zeroes `slot`.
    pub fn delete_password(&mut self, slot: usize) -> Result<(), DeviceError> {
        self.require_unlocked()?;
        self.slot(slot)?;

        let previous = mem::replace(&mut self.record.slots[slot], PasswordSlot::EMPTY);
        self.commit_slot(slot, previous)?;

        log::info!("slot {slot} cleared");
        Ok(())
    }

    /// Sets the inactivity timeout. Allowed in any state.
    pub fn set_auto_lock_timeout(&mut self, seconds: u32) -> Result<(), DeviceError> {
        let previous = mem::replace(&mut self.record.auto_lock_timeout_s, seconds);
        if let Err(err) = self.persist() {
            self.record.auto_lock_timeout_s = previous;
            return Err(err);
        }
        log::info!("auto-lock timeout set to {seconds} s");
        Ok(())
    }

    /// Locks if at least `auto_lock_timeout_s` have passed since the last
    /// activity. Returns whether this call locked the device.
    pub fn check_auto_lock(&mut self, now_ms: u64) -> bool {
        if self.machine.state() != LockState::Unlocked {
            return false;
        }

        let elapsed_s = now_ms.saturating_sub(self.record.last_activity_ms) / 1000;
        if elapsed_s < u64::from(self.record.auto_lock_timeout_s) {
            return false;
        }

        log::info!("auto-lock triggered after {elapsed_s} s");
        self.lock_with(LockCause::AutoLock);
        true
    }

    /// [`check_auto_lock`](Self::check_auto_lock) against the controller's clock.
    pub fn poll_auto_lock(&mut self) -> bool {
        let now = self.clock.now_ms();
        self.check_auto_lock(now)
    }

    /// Wipes the master credential and every slot, then locks.
    pub fn factory_reset(&mut self) -> Result<(), DeviceError> {
        self.require_unlocked()?;

        let fresh = DeviceRecord::new(self.record.board_identity, self.config.auto_lock_timeout_s);
        let previous = mem::replace(&mut self.record, fresh);
        if let Err(err) = self.persist() {
            self.record = previous;
            return Err(err);
        }

        let mut previous = previous;
        previous.slots.iter_mut().for_each(Zeroize::zeroize);
        log::info!("factory reset complete");
        self.lock_with(LockCause::Reset);
        Ok(())
    }

    pub fn status(&self) -> DeviceStatus {
        let mut slots = [false; MAX_PASSWORD_SLOTS];
        for (flag, slot) in slots.iter_mut().zip(&self.record.slots) {
            *flag = slot.occupied;
        }
        DeviceStatus {
            unlocked: self.is_unlocked(),
            slots,
            auto_lock_timeout_s: self.record.auto_lock_timeout_s,
        }
    }

    pub fn state(&self) -> LockState {
        self.machine.state()
    }

    pub fn is_unlocked(&self) -> bool {
        self.machine.state() == LockState::Unlocked
    }

    pub fn is_provisioned(&self) -> bool {
        self.record.is_provisioned()
    }

    pub fn board_identity(&self) -> &BoardIdentity {
        &self.record.board_identity
    }

    /// Core version reported to the host.
    pub fn version(&self) -> &'static str {
        crate::VERSION
    }

    pub fn record(&self) -> &DeviceRecord {
        &self.record
    }

    /// Registers an observer for lock transitions.
    pub fn add_observer(&mut self, observer: Box<dyn LockObserver>) {
        self.machine.add_observer(observer);
    }

    /// Tears the controller down, e.g. to simulate a power cycle.
    pub fn into_parts(mut self) -> (PersistentStore<R, L>, CryptoEngine<E>, C) {
        self.crypto.clear_key_cache();
        (self.store, self.crypto, self.clock)
    }

    fn lock_with(&mut self, cause: LockCause) {
        self.crypto.clear_key_cache();
        self.record.unlocked = false;
        self.machine.transition(LockState::Locked, cause);
    }

    fn require_unlocked(&self) -> Result<(), DeviceError> {
        if self.machine.state() == LockState::Unlocked {
            Ok(())
        } else {
            Err(DeviceError::DeviceLocked)
        }
    }

    fn slot(&self, index: usize) -> Result<&PasswordSlot, DeviceError> {
        self.record.slots.get(index).ok_or(DeviceError::InvalidSlot)
    }

    /// Persists after a slot mutation, restoring `previous` if that fails.
    fn commit_slot(&mut self, slot: usize, mut previous: PasswordSlot) -> Result<(), DeviceError> {
        if let Err(err) = self.persist() {
            self.record.slots[slot] = previous;
            return Err(err);
        }
        previous.zeroize();
        self.touch();
        Ok(())
    }

    fn persist(&mut self) -> Result<(), DeviceError> {
        self.store.save(&self.record).map_err(|err| {
            log::warn!("persist failed: {err}");
            match err {
                StorageError::RegionTooSmall => DeviceError::RegionTooSmall,
                _ => DeviceError::PersistFailed,
            }
        })
    }

    fn touch(&mut self) {
        self.record.last_activity_ms = self.clock.now_ms();
    }
}

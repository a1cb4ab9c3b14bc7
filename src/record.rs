//! The device record: everything the device persists, as one aggregate.

use zeroize::Zeroize;

use crate::config::MAX_PASSWORD_SLOTS;
use crate::crypto::{BoardIdentity, CredentialHash, Sealed, BLOCK_SIZE, IV_LEN, MAX_CIPHERTEXT_LEN};

const EMPTY_SLOT: PasswordSlot = PasswordSlot::EMPTY;

/// One encrypted password.
///
/// An unoccupied slot is all zeros; an occupied one holds a block-aligned,
/// non-empty ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Zeroize)]
pub struct PasswordSlot {
    pub occupied: bool,
    pub iv: [u8; IV_LEN],
    pub ciphertext: [u8; MAX_CIPHERTEXT_LEN],
    pub ciphertext_len: usize,
}

impl PasswordSlot {
    pub const EMPTY: Self = Self {
        occupied: false,
        iv: [0u8; IV_LEN],
        ciphertext: [0u8; MAX_CIPHERTEXT_LEN],
        ciphertext_len: 0,
    };

    pub fn from_sealed(sealed: &Sealed) -> Self {
        let mut slot = Self::EMPTY;
        let ct = sealed.ciphertext();
        slot.occupied = true;
        slot.iv = sealed.iv;
        slot.ciphertext[..ct.len()].copy_from_slice(ct);
        slot.ciphertext_len = ct.len();
        slot
    }

    /// The stored ciphertext (empty for an unoccupied slot).
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext[..self.ciphertext_len.min(MAX_CIPHERTEXT_LEN)]
    }

    /// Checks the slot invariant.
    pub fn is_well_formed(&self) -> bool {
        if self.occupied {
            self.ciphertext_len > 0
                && self.ciphertext_len % BLOCK_SIZE == 0
                && self.ciphertext_len <= MAX_CIPHERTEXT_LEN
        } else {
            *self == Self::EMPTY
        }
    }
}

impl Default for PasswordSlot {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// The single persisted aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    /// Key-derivation salt, written once at provisioning.
    pub board_identity: BoardIdentity,
    /// Written for layout parity only; never trusted on load.
    pub unlocked: bool,
    pub last_activity_ms: u64,
    pub auto_lock_timeout_s: u32,
    pub master_credential_hash: CredentialHash,
    pub slots: [PasswordSlot; MAX_PASSWORD_SLOTS],
}

impl DeviceRecord {
    /// A fresh, unprovisioned record.
    pub fn new(board_identity: BoardIdentity, auto_lock_timeout_s: u32) -> Self {
        Self {
            board_identity,
            unlocked: false,
            last_activity_ms: 0,
            auto_lock_timeout_s,
            master_credential_hash: CredentialHash::UNSET,
            slots: [EMPTY_SLOT; MAX_PASSWORD_SLOTS],
        }
    }

    pub fn is_provisioned(&self) -> bool {
        !self.master_credential_hash.is_unset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_slot_is_well_formed() {
        assert!(PasswordSlot::EMPTY.is_well_formed());
        assert!(PasswordSlot::EMPTY.ciphertext().is_empty());
    }

    #[test]
    fn test_slot_invariants() {
        let mut slot = PasswordSlot::EMPTY;
        slot.iv[0] = 1;
        assert!(!slot.is_well_formed(), "unoccupied slot must be zeroed");

        let mut slot = PasswordSlot::EMPTY;
        slot.occupied = true;
        assert!(!slot.is_well_formed(), "occupied slot needs ciphertext");
        slot.ciphertext_len = 17;
        assert!(!slot.is_well_formed());
        slot.ciphertext_len = 32;
        assert!(slot.is_well_formed());
        slot.ciphertext_len = MAX_CIPHERTEXT_LEN + BLOCK_SIZE;
        assert!(!slot.is_well_formed());
    }

    #[test]
    fn test_zeroize_empties_slot() {
        let mut slot = PasswordSlot::EMPTY;
        slot.occupied = true;
        slot.iv = [7u8; IV_LEN];
        slot.ciphertext = [9u8; MAX_CIPHERTEXT_LEN];
        slot.ciphertext_len = 16;
        slot.zeroize();
        assert_eq!(slot, PasswordSlot::EMPTY);
    }

    #[test]
    fn test_new_record_unprovisioned() {
        let record = DeviceRecord::new(BoardIdentity::from_text("B"), 120);
        assert!(!record.is_provisioned());
        assert!(!record.unlocked);
        assert!(record.slots.iter().all(|s| !s.occupied));
    }
}

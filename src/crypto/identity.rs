//! Board identity and master credential digest.

use core::fmt;

use subtle::ConstantTimeEq;

/// Length of the board identity: 8 unique-id bytes as upper-case hex.
pub const BOARD_ID_LEN: usize = 16;

/// Length of the stored credential digest: SHA-256 as lower-case hex.
pub const CREDENTIAL_HASH_LEN: usize = 64;

/// Fixed per-device identifier used as the key-derivation salt.
///
/// Shorter identifiers are NUL padded; only the bytes before the first NUL
/// take part in key derivation.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct BoardIdentity([u8; BOARD_ID_LEN]);

impl BoardIdentity {
    pub const fn new(bytes: [u8; BOARD_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Renders the chip's 8-byte unique id the way the bootloader prints it.
    pub fn from_unique_id(id: &[u8; 8]) -> Self {
        let mut bytes = [0u8; BOARD_ID_LEN];
        bytes.copy_from_slice(hex::encode_upper(id).as_bytes());
        Self(bytes)
    }

    /// Builds an identity from text, truncating to `BOARD_ID_LEN` bytes.
    pub fn from_text(text: &str) -> Self {
        let mut bytes = [0u8; BOARD_ID_LEN];
        let len = text.len().min(BOARD_ID_LEN);
        bytes[..len].copy_from_slice(&text.as_bytes()[..len]);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; BOARD_ID_LEN] {
        &self.0
    }

    /// Bytes mixed into the key derivation.
    pub fn salt(&self) -> &[u8] {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(BOARD_ID_LEN);
        &self.0[..end]
    }
}

impl Default for BoardIdentity {
    fn default() -> Self {
        Self([0u8; BOARD_ID_LEN])
    }
}

impl fmt::Debug for BoardIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BoardIdentity({self})")
    }
}

impl fmt::Display for BoardIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in self.salt() {
            if b.is_ascii_graphic() {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

/// Hex-encoded digest of the master credential. All zeros means the device
/// has not been provisioned yet.
#[derive(Clone, Copy)]
pub struct CredentialHash([u8; CREDENTIAL_HASH_LEN]);

impl CredentialHash {
    pub const UNSET: Self = Self([0u8; CREDENTIAL_HASH_LEN]);

    pub const fn from_bytes(bytes: [u8; CREDENTIAL_HASH_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; CREDENTIAL_HASH_LEN] {
        &self.0
    }

    pub fn is_unset(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// Constant-time comparison.
    pub fn matches(&self, other: &CredentialHash) -> bool {
        self.0[..].ct_eq(&other.0[..]).into()
    }
}

impl Default for CredentialHash {
    fn default() -> Self {
        Self::UNSET
    }
}

impl PartialEq for CredentialHash {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other)
    }
}

impl Eq for CredentialHash {}

impl fmt::Debug for CredentialHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unset() {
            write!(f, "CredentialHash(unset)")
        } else {
            write!(f, "CredentialHash(..)")
        }
    }
}

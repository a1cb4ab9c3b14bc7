//! Cryptographic engine.
//!
//! Derives the working key from the master credential and the board identity,
//! authenticates the master credential by digest, and seals slot payloads
//! with AES-256-CBC + PKCS#7.
//!
//! # Known limitation
//! Slot ciphertexts are not authenticated. The trailing padding byte is the
//! only integrity signal on decrypt, so a wrong key or a flipped bit that
//! still yields a pad byte in `1..=16` decrypts to garbage instead of
//! failing (roughly a 1 in 16 chance for random data). The stored format
//! depends on this scheme, so it is kept as is.

pub mod burn;
pub mod engine;
pub mod identity;

pub use engine::{CryptoEngine, Sealed};
pub use identity::{BoardIdentity, CredentialHash};

use core::fmt;

use crate::config::MAX_PASSWORD_LENGTH;

/// Cipher block size (AES).
pub const BLOCK_SIZE: usize = 16;

/// Length of the per-encryption initialization vector.
pub const IV_LEN: usize = 16;

/// Length of the derived working key (AES-256).
pub const KEY_LEN: usize = 32;

/// Largest ciphertext a slot can hold: max plaintext plus one padding block.
pub const MAX_CIPHERTEXT_LEN: usize = MAX_PASSWORD_LENGTH + BLOCK_SIZE;

/// Errors raised by the crypto engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    /// No working key is cached (device locked).
    NoActiveKey,
    /// Trailing PKCS#7 byte is zero or larger than the block size.
    PaddingInvalid,
    /// Plaintext exceeds `MAX_PASSWORD_LENGTH`.
    PlaintextTooLong,
    /// Ciphertext is empty, not block aligned or too long for a slot.
    CiphertextLength,
    /// The entropy source could not produce an IV.
    EntropyFailed,
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::NoActiveKey => write!(f, "No active key"),
            CryptoError::PaddingInvalid => write!(f, "Invalid padding"),
            CryptoError::PlaintextTooLong => write!(f, "Plaintext too long"),
            CryptoError::CiphertextLength => write!(f, "Invalid ciphertext length"),
            CryptoError::EntropyFailed => write!(f, "Entropy source failed"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CryptoError {}

//! Working-key cache and slot sealing.
//!
//! The key is `SHA-256(credential || board identity salt)`. It is derived
//! from the plaintext credential on every unlock; the stored credential
//! digest only authenticates and never feeds the key.

use alloc::vec::Vec;

use cbc::cipher::block_padding::{NoPadding, Pkcs7};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::burn::burn_slice;
use super::identity::{BoardIdentity, CredentialHash, CREDENTIAL_HASH_LEN};
use super::{CryptoError, BLOCK_SIZE, IV_LEN, KEY_LEN, MAX_CIPHERTEXT_LEN};
use crate::config::MAX_PASSWORD_LENGTH;
use crate::entropy::EntropySource;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Output of [`CryptoEngine::encrypt`]: a fresh IV and the padded ciphertext.
#[derive(Clone, PartialEq, Eq)]
pub struct Sealed {
    pub iv: [u8; IV_LEN],
    buf: [u8; MAX_CIPHERTEXT_LEN],
    len: usize,
}

impl Sealed {
    pub fn ciphertext(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl core::fmt::Debug for Sealed {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Sealed").field("len", &self.len).finish_non_exhaustive()
    }
}

/// Holds the board salt and, while unlocked, the working key.
pub struct CryptoEngine<E> {
    entropy: E,
    salt: BoardIdentity,
    key: Zeroizing<[u8; KEY_LEN]>,
    key_cached: bool,
}

impl<E: EntropySource> CryptoEngine<E> {
    /// Creates an engine with no salt bound and no key cached.
    pub fn new(entropy: E) -> Self {
        Self {
            entropy,
            salt: BoardIdentity::default(),
            key: Zeroizing::new([0u8; KEY_LEN]),
            key_cached: false,
        }
    }

    /// Binds the salt for all later derivations and drops any cached key.
    pub fn initialize(&mut self, board_identity: &BoardIdentity) {
        self.clear_key_cache();
        self.salt = *board_identity;
        log::debug!("crypto engine bound to board {}", self.salt);
    }

    /// Derives the working key from `credential` and caches it.
    ///
    /// Callers must not pass an empty credential.
    pub fn derive_and_cache_key(&mut self, credential: &str) {
        debug_assert!(!credential.is_empty());

        let mut hasher = Sha256::new();
        hasher.update(credential.as_bytes());
        hasher.update(self.salt.salt());
        let mut digest: [u8; KEY_LEN] = hasher.finalize().into();

        self.key.copy_from_slice(&digest);
        burn_slice(&mut digest);
        self.key_cached = true;
    }

    /// One-way digest used to authenticate the master credential.
    pub fn hash_credential(&self, credential: &str) -> CredentialHash {
        let mut digest: [u8; 32] = Sha256::digest(credential.as_bytes()).into();
        let encoded = Zeroizing::new(hex::encode(digest));
        burn_slice(&mut digest);

        let mut out = [0u8; CREDENTIAL_HASH_LEN];
        out.copy_from_slice(encoded.as_bytes());
        CredentialHash::from_bytes(out)
    }

    pub fn has_key(&self) -> bool {
        self.key_cached
    }

    /// Pads and encrypts `plaintext` under the cached key with a fresh IV.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<Sealed, CryptoError> {
        if !self.key_cached {
            return Err(CryptoError::NoActiveKey);
        }
        if plaintext.len() > MAX_PASSWORD_LENGTH {
            return Err(CryptoError::PlaintextTooLong);
        }

        let mut iv = [0u8; IV_LEN];
        self.entropy
            .fill(&mut iv)
            .map_err(|_| CryptoError::EntropyFailed)?;

        let mut buf = Zeroizing::new([0u8; MAX_CIPHERTEXT_LEN]);
        buf[..plaintext.len()].copy_from_slice(plaintext);

        let len = Aes256CbcEnc::new((&*self.key).into(), (&iv).into())
            .encrypt_padded_mut::<Pkcs7>(&mut buf[..], plaintext.len())
            .map_err(|_| CryptoError::PlaintextTooLong)?
            .len();

        let mut sealed = Sealed {
            iv,
            buf: [0u8; MAX_CIPHERTEXT_LEN],
            len,
        };
        sealed.buf[..len].copy_from_slice(&buf[..len]);
        Ok(sealed)
    }

    /// Decrypts and strips padding.
    ///
    /// Only the trailing pad byte is checked; see the module docs for what
    /// that does and does not catch.
    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        iv: &[u8; IV_LEN],
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        if !self.key_cached {
            return Err(CryptoError::NoActiveKey);
        }

        let len = ciphertext.len();
        if len == 0 || len % BLOCK_SIZE != 0 || len > MAX_CIPHERTEXT_LEN {
            return Err(CryptoError::CiphertextLength);
        }

        let mut buf = Zeroizing::new([0u8; MAX_CIPHERTEXT_LEN]);
        buf[..len].copy_from_slice(ciphertext);

        Aes256CbcDec::new((&*self.key).into(), iv.into())
            .decrypt_padded_mut::<NoPadding>(&mut buf[..len])
            .map_err(|_| CryptoError::CiphertextLength)?;

        let pad = usize::from(buf[len - 1]);
        if pad == 0 || pad > BLOCK_SIZE {
            return Err(CryptoError::PaddingInvalid);
        }

        Ok(Zeroizing::new(buf[..len - pad].to_vec()))
    }

    /// Wipes the working key. After this every encrypt/decrypt fails with
    /// `NoActiveKey` until the next derivation.
    pub fn clear_key_cache(&mut self) {
        burn_slice(&mut self.key[..]);
        self.key_cached = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entropy::EntropyError;
    use proptest::prelude::*;

    // Mock Entropy Source for testing
    struct MockEntropy {
        counter: u8,
    }

    impl MockEntropy {
        fn new() -> Self {
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
                self.counter = self.counter.wrapping_add(1);
            }
            Ok(())
        }
    }

    struct DeadEntropy;

    impl EntropySource for DeadEntropy {
        fn name(&self) -> &'static str {
            "Dead"
        }
        fn fill(&mut self, _dest: &mut [u8]) -> Result<(), EntropyError> {
            Err(EntropyError::CollectionFailed)
        }
    }

    fn unlocked_engine(credential: &str) -> CryptoEngine<MockEntropy> {
        let mut engine = CryptoEngine::new(MockEntropy::new());
        engine.initialize(&BoardIdentity::from_text("E6613852832F1A2B"));
        engine.derive_and_cache_key(credential);
        engine
    }

    #[test]
    fn test_hash_credential_is_sha256_hex() {
        let engine = CryptoEngine::new(MockEntropy::new());
        let hash = engine.hash_credential("abc");
        assert_eq!(
            &hash.as_bytes()[..],
            b"ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_key_depends_on_board_identity() {
        let mut a = unlocked_engine("alpha");
        let sealed = a.encrypt(b"hunter2").unwrap();

        let mut b = CryptoEngine::new(MockEntropy::new());
        b.initialize(&BoardIdentity::from_text("0000000000000000"));
        b.derive_and_cache_key("alpha");
        match b.decrypt(sealed.ciphertext(), &sealed.iv) {
            Ok(pt) => assert_ne!(&pt[..], b"hunter2"),
            Err(err) => assert_eq!(err, CryptoError::PaddingInvalid),
        }
    }

    #[test]
    fn test_encrypt_requires_key() {
        let mut engine = CryptoEngine::new(MockEntropy::new());
        assert_eq!(engine.encrypt(b"x").unwrap_err(), CryptoError::NoActiveKey);
        assert_eq!(
            engine.decrypt(&[0u8; 16], &[0u8; IV_LEN]).unwrap_err(),
            CryptoError::NoActiveKey
        );
    }

    #[test]
    fn test_fresh_iv_per_encryption() {
        let mut engine = unlocked_engine("alpha");
        let a = engine.encrypt(b"same").unwrap();
        let b = engine.encrypt(b"same").unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext(), b.ciphertext());
    }

    #[test]
    fn test_padding_adds_full_block_on_boundary() {
        let mut engine = unlocked_engine("alpha");
        assert_eq!(engine.encrypt(&[7u8; 15]).unwrap().ciphertext().len(), 16);
        assert_eq!(engine.encrypt(&[7u8; 16]).unwrap().ciphertext().len(), 32);
        assert_eq!(
            engine.encrypt(&[7u8; MAX_PASSWORD_LENGTH]).unwrap().ciphertext().len(),
            MAX_CIPHERTEXT_LEN
        );
    }

    #[test]
    fn test_plaintext_too_long() {
        let mut engine = unlocked_engine("alpha");
        let err = engine.encrypt(&[1u8; MAX_PASSWORD_LENGTH + 1]).unwrap_err();
        assert_eq!(err, CryptoError::PlaintextTooLong);
    }

    #[test]
    fn test_entropy_failure() {
        let mut engine = CryptoEngine::new(DeadEntropy);
        engine.derive_and_cache_key("alpha");
        assert_eq!(engine.encrypt(b"x").unwrap_err(), CryptoError::EntropyFailed);
    }

    #[test]
    fn test_decrypt_after_clear_fails() {
        let mut engine = unlocked_engine("alpha");
        let sealed = engine.encrypt(b"hunter2").unwrap();
        engine.clear_key_cache();
        assert!(!engine.has_key());
        assert_eq!(
            engine.decrypt(sealed.ciphertext(), &sealed.iv).unwrap_err(),
            CryptoError::NoActiveKey
        );
    }

    #[test]
    fn test_initialize_clears_key() {
        let mut engine = unlocked_engine("alpha");
        assert!(engine.has_key());
        engine.initialize(&BoardIdentity::from_text("OTHER"));
        assert!(!engine.has_key());
    }

    #[test]
    fn test_decrypt_rejects_bad_lengths() {
        let engine = unlocked_engine("alpha");
        let iv = [0u8; IV_LEN];
        assert_eq!(engine.decrypt(&[], &iv).unwrap_err(), CryptoError::CiphertextLength);
        assert_eq!(engine.decrypt(&[0u8; 17], &iv).unwrap_err(), CryptoError::CiphertextLength);
        assert_eq!(
            engine.decrypt(&[0u8; MAX_CIPHERTEXT_LEN + 16], &iv).unwrap_err(),
            CryptoError::CiphertextLength
        );
    }

    #[test]
    fn test_decrypt_detects_zero_pad_byte() {
        let engine = unlocked_engine("alpha");
        // Encrypt a block whose last byte is 0 without padding, then hand it
        // to decrypt as if it were a sealed slot.
        let mut block = [0x41u8; 16];
        block[15] = 0;
        let iv = [3u8; IV_LEN];
        let ct = Aes256CbcEnc::new((&*engine.key).into(), (&iv).into())
            .encrypt_padded_mut::<NoPadding>(&mut block, 16)
            .unwrap()
            .to_vec();
        assert_eq!(engine.decrypt(&ct, &iv).unwrap_err(), CryptoError::PaddingInvalid);
    }

    #[test]
    fn test_decrypt_detects_oversized_pad_byte() {
        let engine = unlocked_engine("alpha");
        let mut block = [0x41u8; 16];
        block[15] = 17;
        let iv = [9u8; IV_LEN];
        let ct = Aes256CbcEnc::new((&*engine.key).into(), (&iv).into())
            .encrypt_padded_mut::<NoPadding>(&mut block, 16)
            .unwrap()
            .to_vec();
        assert_eq!(engine.decrypt(&ct, &iv).unwrap_err(), CryptoError::PaddingInvalid);
    }

    proptest! {
        #[test]
        fn prop_roundtrip(plaintext in proptest::collection::vec(any::<u8>(), 1..=MAX_PASSWORD_LENGTH)) {
            let mut engine = unlocked_engine("alpha");
            let sealed = engine.encrypt(&plaintext).unwrap();
            prop_assert_eq!(sealed.ciphertext().len() % BLOCK_SIZE, 0);
            let decrypted = engine.decrypt(sealed.ciphertext(), &sealed.iv).unwrap();
            prop_assert_eq!(&decrypted[..], &plaintext[..]);
        }

        #[test]
        fn prop_no_decrypt_after_lock(plaintext in proptest::collection::vec(any::<u8>(), 1..=MAX_PASSWORD_LENGTH)) {
            let mut engine = unlocked_engine("alpha");
            let sealed = engine.encrypt(&plaintext).unwrap();
            engine.clear_key_cache();
            prop_assert_eq!(
                engine.decrypt(sealed.ciphertext(), &sealed.iv).unwrap_err(),
                CryptoError::NoActiveKey
            );
        }
    }
}

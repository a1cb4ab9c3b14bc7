//! `rand_core` backed entropy.

use rand_core::{CryptoRng, RngCore};

use super::{EntropyError, EntropySource};

/// Adapts any cryptographically secure `rand_core` generator.
///
/// On the board this wraps the TRNG driver; the `CryptoRng` bound keeps
/// seeded PRNGs like `StdRng` honest about their guarantees.
pub struct RngEntropy<R> {
    rng: R,
}

impl<R: RngCore + CryptoRng> RngEntropy<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    pub fn into_inner(self) -> R {
        self.rng
    }
}

impl<R: RngCore + CryptoRng> EntropySource for RngEntropy<R> {
    fn name(&self) -> &'static str {
        "RngCore"
    }

    fn fill(&mut self, dest: &mut [u8]) -> Result<(), EntropyError> {
        self.rng
            .try_fill_bytes(dest)
            .map_err(|_| EntropyError::CollectionFailed)
    }
}

/// Operating system entropy (`getrandom`).
#[cfg(feature = "std")]
pub type OsEntropy = RngEntropy<rand_core::OsRng>;

#[cfg(feature = "std")]
impl OsEntropy {
    pub fn os() -> Self {
        RngEntropy::new(rand_core::OsRng)
    }
}

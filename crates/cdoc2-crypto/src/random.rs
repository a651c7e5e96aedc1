//! Process-wide secure random source.
//!
//! Initialised on first use under the `OnceLock`; afterwards callers draw
//! concurrently from the OS generator without further locking.

use std::sync::OnceLock;

use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};

use crate::error::{CryptoError, CryptoResult};

static SECURE_RANDOM: OnceLock<SecureRandom> = OnceLock::new();

/// Handle to the shared CSPRNG. Obtain it with [`secure_random`].
#[derive(Debug)]
pub struct SecureRandom {
    _private: (),
}

impl SecureRandom {
    /// Fails if the OS entropy source cannot be read.
    fn init() -> CryptoResult<Self> {
        let mut sample = [0u8; 16];
        OsRng
            .try_fill_bytes(&mut sample)
            .map_err(|e| CryptoError::Random(e.to_string()))?;
        tracing::debug!("secure random source initialised");
        Ok(Self { _private: () })
    }

    pub fn fill(&self, dest: &mut [u8]) -> CryptoResult<()> {
        OsRng
            .try_fill_bytes(dest)
            .map_err(|e| CryptoError::Random(e.to_string()))
    }

    pub fn bytes<const N: usize>(&self) -> CryptoResult<[u8; N]> {
        let mut out = [0u8; N];
        self.fill(&mut out)?;
        Ok(out)
    }

    /// An `RngCore` view for APIs that generate keys from a caller-supplied rng.
    pub fn rng(&self) -> impl RngCore + CryptoRng {
        OsRng
    }
}

/// The shared secure random source, initialised exactly once.
pub fn secure_random() -> CryptoResult<&'static SecureRandom> {
    if let Some(rng) = SECURE_RANDOM.get() {
        return Ok(rng);
    }
    let rng = SecureRandom::init()?;
    Ok(SECURE_RANDOM.get_or_init(|| rng))
}

//! Secret key newtypes of the envelope key hierarchy and FMK generation

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::{CryptoError, CryptoResult};
use crate::random::secure_random;
use crate::KEY_SIZE;

/// HKDF-Extract salt for a fresh file master key
const FMK_SALT: &[u8] = b"CDOC20salt";

macro_rules! secret_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name {
            bytes: [u8; KEY_SIZE],
        }

        impl $name {
            pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
                Self { bytes }
            }

            pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
                let bytes: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
                    CryptoError::InvalidArgument(format!(
                        concat!(stringify!($name), " must be {} bytes, got {}"),
                        KEY_SIZE,
                        bytes.len()
                    ))
                })?;
                Ok(Self { bytes })
            }

            pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
                &self.bytes
            }
        }

        impl Drop for $name {
            fn drop(&mut self) {
                self.bytes.zeroize();
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("bytes", &"[REDACTED]")
                    .finish()
            }
        }
    };
}

secret_key!(
    /// Per-envelope file master key. Zeroized on drop.
    FileMasterKey
);
secret_key!(
    /// Per-recipient key used once to XOR-wrap the FMK.
    KeyEncryptionKey
);
secret_key!(
    /// Payload ChaCha20-Poly1305 key derived from the FMK.
    ContentEncryptionKey
);
secret_key!(
    /// Header HMAC-SHA256 key derived from the FMK.
    HeaderHmacKey
);

/// Generate a fresh FMK: HKDF-Extract(salt="CDOC20salt", ikm=32 random bytes).
pub fn generate_fmk() -> CryptoResult<FileMasterKey> {
    let mut ikm: [u8; KEY_SIZE] = secure_random()?.bytes()?;
    let (mut prk, _) = Hkdf::<Sha256>::extract(Some(FMK_SALT), &ikm);
    ikm.zeroize();

    let mut bytes = [0u8; KEY_SIZE];
    bytes.copy_from_slice(&prk);
    prk.as_mut_slice().zeroize();
    Ok(FileMasterKey::from_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmk_generation() {
        let k1 = generate_fmk().unwrap();
        let k2 = generate_fmk().unwrap();
        assert_ne!(k1.as_bytes(), k2.as_bytes(), "random keys must differ");
    }

    #[test]
    fn test_from_slice_length() {
        assert!(FileMasterKey::from_slice(&[7u8; KEY_SIZE]).is_ok());

        let err = FileMasterKey::from_slice(&[7u8; 16]).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidArgument(_)));
        assert!(err.to_string().contains("FileMasterKey must be 32 bytes, got 16"));
    }

    #[test]
    fn test_debug_redacted() {
        let key = HeaderHmacKey::from_bytes([0xAA; KEY_SIZE]);
        let debug = format!("{key:?}");
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("170"));
    }
}

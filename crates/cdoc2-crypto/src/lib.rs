//! cdoc2-crypto: the CDOC2 envelope engine
//!
//! Container layout:
//! ```text
//! "CDOC" | version (1 byte, = 2) | header length (u32 BE) | header (FlatBuffers)
//!        | HMAC-SHA256(header) (32 bytes) | nonce (12) | ChaCha20-Poly1305 ciphertext + tag
//! ```
//!
//! Key hierarchy:
//! ```text
//! File Master Key (256-bit, HKDF-Extract of 32 random bytes)
//!   ├── per recipient: encrypted FMK = FMK XOR KEK
//!   │   └── KEK = HKDF(ECDH(sender ephemeral, recipient), info binds both public keys)
//!   ├── Header HMAC key (HKDF-Expand, info="CDOC20hmac")
//!   └── Content Encryption Key (HKDF-Expand, info="CDOC20cek" || "ChaCha20-Poly1305")
//!       └── Payload AEAD: ChaCha20-Poly1305 (AAD="CDOC20payload" || header || hmac)
//! ```

pub mod curve;
pub mod ec_keys;
pub mod envelope;
pub mod error;
pub mod kdf;
pub mod key_material;
pub mod keys;
pub mod payload;
pub mod public_key;
pub mod random;
pub mod rsa_keys;

pub use curve::EllipticCurve;
pub use ec_keys::{EcKeyPair, EcPublicKey};
pub use envelope::{EccRecipient, Envelope, KeyServerRecipient, ParseOptions, ParsedHeader, Recipient};
pub use error::{CryptoError, CryptoResult};
pub use key_material::{EncryptionKeyMaterial, EncryptionKeyOrigin};
pub use keys::{generate_fmk, ContentEncryptionKey, FileMasterKey, HeaderHmacKey, KeyEncryptionKey};
pub use public_key::PublicKey;
pub use random::{secure_random, SecureRandom};
pub use rsa_keys::RsaPublicKey;

/// Size of the FMK and every key derived from it (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of the header HMAC-SHA256 tag
pub const HMAC_SIZE: usize = 32;

/// Size of a ChaCha20-Poly1305 nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a Poly1305 authentication tag
pub const TAG_SIZE: usize = 16;

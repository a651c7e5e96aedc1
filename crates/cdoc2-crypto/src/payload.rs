//! Payload ChaCha20-Poly1305 encryption/decryption
//!
//! Encrypted payload format (binary):
//! ```text
//! [12 bytes: random nonce][N bytes: ciphertext][16 bytes: Poly1305 tag]
//! AAD = "CDOC20payload" || header || header HMAC
//! ```
//!
//! The AAD binds the ciphertext to the exact header it travels with.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};

use crate::error::{CryptoError, CryptoResult};
use crate::keys::ContentEncryptionKey;
use crate::random::secure_random;
use crate::{NONCE_SIZE, TAG_SIZE};

const PAYLOAD_AAD_PREFIX: &[u8] = b"CDOC20payload";

/// Encrypt the container payload.
///
/// Returns: `[12-byte nonce][ciphertext][16-byte tag]`
pub fn encrypt_payload(
    cek: &ContentEncryptionKey,
    header: &[u8],
    header_hmac: &[u8],
    plaintext: &[u8],
) -> CryptoResult<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(cek.as_bytes().into());

    let nonce_bytes: [u8; NONCE_SIZE] = secure_random()?.bytes()?;
    let nonce = Nonce::from_slice(&nonce_bytes);

    let aad = build_aad(header, header_hmac);

    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad: &aad,
            },
        )
        .map_err(|e| CryptoError::InvalidArgument(format!("payload encryption failed: {e}")))?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

/// Decrypt the container payload. Nothing is returned unless the tag verifies.
pub fn decrypt_payload(
    cek: &ContentEncryptionKey,
    header: &[u8],
    header_hmac: &[u8],
    encrypted: &[u8],
) -> CryptoResult<Vec<u8>> {
    if encrypted.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::AuthenticationFailure(format!(
            "encrypted payload too short: {} bytes (minimum {})",
            encrypted.len(),
            NONCE_SIZE + TAG_SIZE
        )));
    }

    let (nonce_bytes, ciphertext) = encrypted.split_at(NONCE_SIZE);
    let nonce = Nonce::from_slice(nonce_bytes);
    let cipher = ChaCha20Poly1305::new(cek.as_bytes().into());

    let aad = build_aad(header, header_hmac);

    cipher
        .decrypt(
            nonce,
            Payload {
                msg: ciphertext,
                aad: &aad,
            },
        )
        .map_err(|_| CryptoError::AuthenticationFailure("payload authentication tag mismatch".into()))
}

/// Build AAD: "CDOC20payload" || header || hmac
fn build_aad(header: &[u8], header_hmac: &[u8]) -> Vec<u8> {
    let mut aad = Vec::with_capacity(PAYLOAD_AAD_PREFIX.len() + header.len() + header_hmac.len());
    aad.extend_from_slice(PAYLOAD_AAD_PREFIX);
    aad.extend_from_slice(header);
    aad.extend_from_slice(header_hmac);
    aad
}

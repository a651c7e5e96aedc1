//! Key derivation: ECDH → KEK, FMK → CEK / header HMAC key, password-origin keys
//!
//! All HKDF instances use SHA-256. Info strings are fixed and pairwise
//! distinct, so no two derivations from the same input can collide.

use argon2::{Algorithm, Argon2, Params, Version};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

use crate::ec_keys::{encode_tls, EcKeyPair, EcPublicKey};
use crate::error::{CryptoError, CryptoResult};
use crate::keys::{ContentEncryptionKey, FileMasterKey, HeaderHmacKey, KeyEncryptionKey};
use crate::{HMAC_SIZE, KEY_SIZE};

const KEK_PREMASTER_SALT: &[u8] = b"CDOC20kekpremaster";
const KEK_INFO: &[u8] = b"CDOC20kek";
const CEK_INFO: &[u8] = b"CDOC20cek";
const HMAC_KEY_INFO: &[u8] = b"CDOC20hmac";
const PASSWORD_KEY_INFO: &[u8] = b"CDOC20password";

/// Shortest salt accepted for password-origin key material
pub const MIN_PASSWORD_SALT_LEN: usize = 16;

/// FMK wrapping method name, bound into the KEK info
const FMK_ENCRYPTION_METHOD_XOR: &[u8] = b"XOR";
/// Payload cipher name, bound into the CEK info
const PAYLOAD_METHOD_CHACHA: &[u8] = b"ChaCha20-Poly1305";

type HmacSha256 = Hmac<Sha256>;

/// Sender side: KEK from the sender's ephemeral key pair and the recipient's
/// public key.
pub fn derive_key_encryption_key(
    sender: &EcKeyPair,
    recipient: &EcPublicKey,
) -> CryptoResult<KeyEncryptionKey> {
    derive_kek(sender, recipient, recipient, sender.public_key())
}

/// Recipient side: the same KEK from the recipient's key pair and the
/// sender's ephemeral public key taken from the header.
pub fn derive_key_decryption_key(
    recipient: &EcKeyPair,
    sender: &EcPublicKey,
) -> CryptoResult<KeyEncryptionKey> {
    derive_kek(recipient, sender, recipient.public_key(), sender)
}

fn derive_kek(
    local: &EcKeyPair,
    peer: &EcPublicKey,
    recipient_pub: &EcPublicKey,
    sender_pub: &EcPublicKey,
) -> CryptoResult<KeyEncryptionKey> {
    let curve = local.curve();
    let shared = local.diffie_hellman(peer)?;
    let recipient_tls = encode_tls(curve, recipient_pub)?;
    let sender_tls = encode_tls(curve, sender_pub)?;

    let mut okm = [0u8; KEY_SIZE];
    derive_shared_key(
        &shared,
        &[
            KEK_INFO,
            FMK_ENCRYPTION_METHOD_XOR,
            recipient_tls.as_slice(),
            sender_tls.as_slice(),
        ],
        &mut okm,
    )?;
    let kek = KeyEncryptionKey::from_bytes(okm);
    okm.zeroize();
    Ok(kek)
}

/// HKDF-Extract(salt="CDOC20kekpremaster", ikm=shared) then Expand over the
/// concatenated `info` parts into `out` (any length HKDF allows).
pub fn derive_shared_key(shared: &[u8], info: &[&[u8]], out: &mut [u8]) -> CryptoResult<()> {
    let hkdf = Hkdf::<Sha256>::new(Some(KEK_PREMASTER_SALT), shared);
    hkdf.expand_multi_info(info, out)
        .map_err(|e| CryptoError::KeyDerivation(format!("HKDF expand failed: {e}")))
}

/// Content encryption key: HKDF-Expand(prk=FMK, info="CDOC20cek" || "ChaCha20-Poly1305")
pub fn derive_content_encryption_key(fmk: &FileMasterKey) -> CryptoResult<ContentEncryptionKey> {
    let mut okm = expand_from_fmk(fmk, &[CEK_INFO, PAYLOAD_METHOD_CHACHA])?;
    let key = ContentEncryptionKey::from_bytes(okm);
    okm.zeroize();
    Ok(key)
}

/// Header HMAC key: HKDF-Expand(prk=FMK, info="CDOC20hmac")
pub fn derive_header_hmac_key(fmk: &FileMasterKey) -> CryptoResult<HeaderHmacKey> {
    let mut okm = expand_from_fmk(fmk, &[HMAC_KEY_INFO])?;
    let key = HeaderHmacKey::from_bytes(okm);
    okm.zeroize();
    Ok(key)
}

fn expand_from_fmk(fmk: &FileMasterKey, info: &[&[u8]]) -> CryptoResult<[u8; KEY_SIZE]> {
    let hkdf = Hkdf::<Sha256>::from_prk(fmk.as_bytes())
        .map_err(|e| CryptoError::KeyDerivation(format!("FMK is not a valid PRK: {e}")))?;
    let mut okm = [0u8; KEY_SIZE];
    hkdf.expand_multi_info(info, &mut okm)
        .map_err(|e| CryptoError::KeyDerivation(format!("HKDF expand failed: {e}")))?;
    Ok(okm)
}

/// Wrap the FMK for one recipient: `fmk XOR kek`.
pub fn encrypt_fmk(fmk: &FileMasterKey, kek: &KeyEncryptionKey) -> [u8; KEY_SIZE] {
    xor(fmk.as_bytes(), kek.as_bytes())
}

/// Unwrap an encrypted FMK taken from a recipient record.
pub fn decrypt_fmk(encrypted_fmk: &[u8], kek: &KeyEncryptionKey) -> CryptoResult<FileMasterKey> {
    let encrypted: &[u8; KEY_SIZE] = encrypted_fmk.try_into().map_err(|_| {
        CryptoError::InvalidArgument(format!(
            "encrypted FMK must be {KEY_SIZE} bytes, got {}",
            encrypted_fmk.len()
        ))
    })?;
    let mut fmk = xor(encrypted, kek.as_bytes());
    let key = FileMasterKey::from_bytes(fmk);
    fmk.zeroize();
    Ok(key)
}

fn xor(a: &[u8; KEY_SIZE], b: &[u8; KEY_SIZE]) -> [u8; KEY_SIZE] {
    let mut out = [0u8; KEY_SIZE];
    for (o, (x, y)) in out.iter_mut().zip(a.iter().zip(b.iter())) {
        *o = x ^ y;
    }
    out
}

/// HMAC-SHA256 over the serialized header.
pub fn header_hmac(key: &HeaderHmacKey, header: &[u8]) -> CryptoResult<[u8; HMAC_SIZE]> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::KeyDerivation(format!("invalid HMAC key: {e}")))?;
    mac.update(header);
    Ok(mac.finalize().into_bytes().into())
}

/// Constant-time check of the header HMAC.
pub fn verify_header_hmac(key: &HeaderHmacKey, header: &[u8], expected: &[u8]) -> CryptoResult<()> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::KeyDerivation(format!("invalid HMAC key: {e}")))?;
    mac.update(header);
    mac.verify_slice(expected)
        .map_err(|_| CryptoError::AuthenticationFailure("header HMAC mismatch".into()))
}

/// Argon2id cost for password-origin key material
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordKdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub lanes: u32,
}

impl PasswordKdfParams {
    /// RFC 9106 section 4, second recommended option (64 MiB, t=3, p=4)
    pub const RFC9106_LOW_MEMORY: Self = Self {
        memory_kib: 64 * 1024,
        iterations: 3,
        lanes: 4,
    };

    fn argon2(&self) -> CryptoResult<Argon2<'static>> {
        let params = Params::new(self.memory_kib, self.iterations, self.lanes, Some(KEY_SIZE))
            .map_err(|e| CryptoError::InvalidArgument(format!("password KDF parameters: {e}")))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

impl Default for PasswordKdfParams {
    fn default() -> Self {
        Self::RFC9106_LOW_MEMORY
    }
}

/// Key for a password recipient labelled `label`.
///
/// Argon2id stretches the password over `salt`; the result is only used as
/// an HKDF PRK, expanded with info = "CDOC20password" || label, so the same
/// password and salt under another label gives an unrelated key.
pub fn derive_password_key(
    password: &SecretString,
    label: &str,
    salt: &[u8],
    params: &PasswordKdfParams,
) -> CryptoResult<Zeroizing<[u8; KEY_SIZE]>> {
    let password = password.expose_secret();
    if password.is_empty() {
        return Err(CryptoError::InvalidArgument("password is empty".into()));
    }
    if salt.len() < MIN_PASSWORD_SALT_LEN {
        return Err(CryptoError::InvalidArgument(format!(
            "password salt must be at least {MIN_PASSWORD_SALT_LEN} bytes, got {}",
            salt.len()
        )));
    }

    let mut stretched = Zeroizing::new([0u8; KEY_SIZE]);
    params
        .argon2()?
        .hash_password_into(password.as_bytes(), salt, &mut stretched[..])
        .map_err(|e| CryptoError::KeyDerivation(format!("Argon2id: {e}")))?;

    let hkdf = Hkdf::<Sha256>::from_prk(&stretched[..])
        .map_err(|e| CryptoError::KeyDerivation(format!("stretched password is not a valid PRK: {e}")))?;
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    hkdf.expand_multi_info(&[PASSWORD_KEY_INFO, label.as_bytes()], &mut key[..])
        .map_err(|e| CryptoError::KeyDerivation(format!("HKDF expand failed: {e}")))?;
    Ok(key)
}

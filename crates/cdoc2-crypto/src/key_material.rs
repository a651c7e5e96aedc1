//! Key material a container can be encrypted for

use std::fmt;

use secrecy::SecretString;
use zeroize::{Zeroize, Zeroizing};

use crate::error::{CryptoError, CryptoResult};
use crate::kdf::{derive_password_key, PasswordKdfParams};
use crate::public_key::PublicKey;
use crate::random::secure_random;
use crate::KEY_SIZE;

/// Length of a freshly generated password salt
pub const PASSWORD_SALT_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionKeyOrigin {
    PublicKey,
    SharedSecret,
    Password,
}

impl fmt::Display for EncryptionKeyOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncryptionKeyOrigin::PublicKey => write!(f, "public key"),
            EncryptionKeyOrigin::SharedSecret => write!(f, "shared secret"),
            EncryptionKeyOrigin::Password => write!(f, "password"),
        }
    }
}

/// A recipient's key together with the label stored next to it.
///
/// Secret variants are wiped on drop or by an explicit [`Zeroize::zeroize`].
pub enum EncryptionKeyMaterial {
    PublicKey {
        key: PublicKey,
        label: String,
    },
    SharedSecret {
        key: Zeroizing<Vec<u8>>,
        label: String,
    },
    Password {
        key: Zeroizing<[u8; KEY_SIZE]>,
        label: String,
        salt: Vec<u8>,
    },
}

impl EncryptionKeyMaterial {
    pub fn from_public_key(key: impl Into<PublicKey>, label: impl Into<String>) -> Self {
        EncryptionKeyMaterial::PublicKey {
            key: key.into(),
            label: label.into(),
        }
    }

    pub fn from_secret(secret: Vec<u8>, label: impl Into<String>) -> CryptoResult<Self> {
        if secret.is_empty() {
            return Err(CryptoError::InvalidArgument("shared secret is empty".into()));
        }
        Ok(EncryptionKeyMaterial::SharedSecret {
            key: Zeroizing::new(secret),
            label: label.into(),
        })
    }

    /// Derive key material from a password with a fresh random salt. The key
    /// is bound to `label`.
    pub fn from_password(
        password: &SecretString,
        label: impl Into<String>,
        params: &PasswordKdfParams,
    ) -> CryptoResult<Self> {
        let salt: [u8; PASSWORD_SALT_SIZE] = secure_random()?.bytes()?;
        Self::from_password_with_salt(password, label, salt.to_vec(), params)
    }

    /// Re-derive password key material using the salt stored with a container.
    pub fn from_password_with_salt(
        password: &SecretString,
        label: impl Into<String>,
        salt: Vec<u8>,
        params: &PasswordKdfParams,
    ) -> CryptoResult<Self> {
        let label = label.into();
        let key = derive_password_key(password, &label, &salt, params)?;
        Ok(EncryptionKeyMaterial::Password { key, label, salt })
    }

    pub fn origin(&self) -> EncryptionKeyOrigin {
        match self {
            EncryptionKeyMaterial::PublicKey { .. } => EncryptionKeyOrigin::PublicKey,
            EncryptionKeyMaterial::SharedSecret { .. } => EncryptionKeyOrigin::SharedSecret,
            EncryptionKeyMaterial::Password { .. } => EncryptionKeyOrigin::Password,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            EncryptionKeyMaterial::PublicKey { label, .. }
            | EncryptionKeyMaterial::SharedSecret { label, .. }
            | EncryptionKeyMaterial::Password { label, .. } => label,
        }
    }

    pub fn public_key(&self) -> Option<&PublicKey> {
        match self {
            EncryptionKeyMaterial::PublicKey { key, .. } => Some(key),
            _ => None,
        }
    }

    /// Symmetric key bytes for secret and password origins
    pub fn secret_key(&self) -> Option<&[u8]> {
        match self {
            EncryptionKeyMaterial::SharedSecret { key, .. } => Some(key.as_slice()),
            EncryptionKeyMaterial::Password { key, .. } => Some(key.as_slice()),
            EncryptionKeyMaterial::PublicKey { .. } => None,
        }
    }

    pub fn password_salt(&self) -> Option<&[u8]> {
        match self {
            EncryptionKeyMaterial::Password { salt, .. } => Some(salt),
            _ => None,
        }
    }
}

impl Zeroize for EncryptionKeyMaterial {
    fn zeroize(&mut self) {
        match self {
            EncryptionKeyMaterial::PublicKey { .. } => {}
            EncryptionKeyMaterial::SharedSecret { key, .. } => key.zeroize(),
            EncryptionKeyMaterial::Password { key, .. } => key.zeroize(),
        }
    }
}

impl fmt::Debug for EncryptionKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("EncryptionKeyMaterial");
        s.field("origin", &self.origin()).field("label", &self.label());
        if let Some(key) = self.public_key() {
            s.field("key", key);
        } else {
            s.field("key", &"[REDACTED]");
        }
        s.finish()
    }
}

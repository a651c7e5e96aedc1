use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of key material carried by a capsule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapsuleType {
    EccSecp384r1,
    EccSecp256r1,
    Rsa,
    /// A tag this build does not know (newer protocol version)
    #[serde(other)]
    Unknown,
}

impl fmt::Display for CapsuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CapsuleType::EccSecp384r1 => "ecc_secp384r1",
            CapsuleType::EccSecp256r1 => "ecc_secp256r1",
            CapsuleType::Rsa => "rsa",
            CapsuleType::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Key capsule as exchanged over HTTP.
///
/// For EC capsules `recipient_id` and `ephemeral_key_material` are TLS-encoded
/// public keys (recipient and sender). For RSA, `recipient_id` is the DER RSA
/// public key and `ephemeral_key_material` the RSA-encrypted key blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capsule {
    pub capsule_type: CapsuleType,
    #[serde(default, with = "base64_opt")]
    pub recipient_id: Option<Vec<u8>>,
    #[serde(default, with = "base64_opt")]
    pub ephemeral_key_material: Option<Vec<u8>>,
}

impl Capsule {
    pub fn new(capsule_type: CapsuleType, recipient_id: Vec<u8>, ephemeral: Vec<u8>) -> Self {
        Self {
            capsule_type,
            recipient_id: Some(recipient_id),
            ephemeral_key_material: Some(ephemeral),
        }
    }
}

/// Persisted capsule record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCapsule {
    pub transaction_id: String,
    pub capsule_type: CapsuleType,
    #[serde(with = "base64_vec")]
    pub recipient: Vec<u8>,
    #[serde(with = "base64_vec")]
    pub payload: Vec<u8>,
    pub expiry_time: DateTime<Utc>,
    /// Set when the requested expiry exceeded the maximum and was clamped
    pub expiry_time_adjusted: bool,
    pub created_at: DateTime<Utc>,
}

impl StoredCapsule {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry_time < now
    }

    /// Wire form returned to the recipient
    pub fn to_capsule(&self) -> Capsule {
        Capsule::new(self.capsule_type, self.recipient.clone(), self.payload.clone())
    }
}

mod base64_vec {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}

mod base64_opt {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => s.serialize_some(&STANDARD.encode(b)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        match Option::<String>::deserialize(d)? {
            Some(s) => STANDARD.decode(s).map(Some).map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

//! RSA public keys as PKCS#1 DER (RFC 8017 A.1.1):
//! `SEQUENCE { modulus INTEGER, publicExponent INTEGER }`

use der::{asn1::UintRef, Decode, Encode};

use crate::error::{CryptoError, CryptoResult};

/// RSA public key; both integers are big-endian without leading zeros.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaPublicKey {
    modulus: Vec<u8>,
    public_exponent: Vec<u8>,
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

impl RsaPublicKey {
    /// Build from big-endian unsigned integers. Both must be positive.
    pub fn new(modulus: &[u8], public_exponent: &[u8]) -> CryptoResult<Self> {
        let modulus = strip_leading_zeros(modulus);
        let public_exponent = strip_leading_zeros(public_exponent);
        if modulus.is_empty() {
            return Err(CryptoError::InvalidKey("RSA modulus must be positive".into()));
        }
        if public_exponent.is_empty() {
            return Err(CryptoError::InvalidKey("RSA public exponent must be positive".into()));
        }
        Ok(Self {
            modulus: modulus.to_vec(),
            public_exponent: public_exponent.to_vec(),
        })
    }

    pub fn modulus(&self) -> &[u8] {
        &self.modulus
    }

    pub fn public_exponent(&self) -> &[u8] {
        &self.public_exponent
    }

    /// Modulus size in bits
    pub fn bits(&self) -> usize {
        match self.modulus.first() {
            Some(first) => self.modulus.len() * 8 - first.leading_zeros() as usize,
            None => 0,
        }
    }

    pub fn to_der(&self) -> CryptoResult<Vec<u8>> {
        let encode_err = |e: der::Error| CryptoError::Encoding(format!("RSA key encoding: {e}"));
        let key = pkcs1::RsaPublicKey {
            modulus: UintRef::new(&self.modulus).map_err(encode_err)?,
            public_exponent: UintRef::new(&self.public_exponent).map_err(encode_err)?,
        };
        key.to_der().map_err(encode_err)
    }

    /// Decode PKCS#1 DER. Anything other than a two-integer sequence (with
    /// no trailing bytes) is an encoding error.
    pub fn from_der(bytes: &[u8]) -> CryptoResult<Self> {
        let key = pkcs1::RsaPublicKey::from_der(bytes)
            .map_err(|e| CryptoError::Encoding(format!("not a PKCS#1 RSA public key: {e}")))?;
        Self::new(key.modulus.as_bytes(), key.public_exponent.as_bytes())
    }
}

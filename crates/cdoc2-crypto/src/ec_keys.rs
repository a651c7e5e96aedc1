//! EC public keys in TLS 1.3 uncompressed point encoding, key pairs and ECDH
//!
//! TLS encoding (RFC 8446 §4.2.8.2):
//! ```text
//! 0x04 || X || Y    X, Y left-zero-padded to the curve's field length
//! ```

use std::fmt;

use der::pem::LineEnding;
use p384::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use p384::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use spki::{EncodePublicKey, ObjectIdentifier};
use zeroize::Zeroizing;

use crate::curve::EllipticCurve;
use crate::error::{CryptoError, CryptoResult};
use crate::random::secure_random;

const UNCOMPRESSED_POINT_TAG: u8 = 0x04;

/// A validated EC public key on one of the supported curves.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EcPublicKey {
    P384(p384::PublicKey),
    P256(p256::PublicKey),
}

impl EcPublicKey {
    pub fn curve(&self) -> EllipticCurve {
        match self {
            EcPublicKey::P384(_) => EllipticCurve::Secp384r1,
            EcPublicKey::P256(_) => EllipticCurve::Secp256r1,
        }
    }

    /// Parse any SEC1 encoding (compressed or uncompressed) for `curve`.
    pub fn from_sec1_bytes(curve: EllipticCurve, bytes: &[u8]) -> CryptoResult<Self> {
        let invalid =
            |e: p384::elliptic_curve::Error| CryptoError::InvalidKey(format!("not a {curve} point: {e}"));
        match curve {
            EllipticCurve::Secp384r1 => p384::PublicKey::from_sec1_bytes(bytes)
                .map(EcPublicKey::P384)
                .map_err(invalid),
            EllipticCurve::Secp256r1 => p256::PublicKey::from_sec1_bytes(bytes)
                .map(EcPublicKey::P256)
                .map_err(invalid),
        }
    }

    /// Uncompressed SEC1 point bytes, `0x04 || X || Y`
    fn uncompressed_point(&self) -> Vec<u8> {
        match self {
            EcPublicKey::P384(k) => k.to_encoded_point(false).as_bytes().to_vec(),
            EcPublicKey::P256(k) => k.to_encoded_point(false).as_bytes().to_vec(),
        }
    }

    fn is_identity(&self) -> bool {
        match self {
            EcPublicKey::P384(k) => k.to_encoded_point(false).is_identity(),
            EcPublicKey::P256(k) => k.to_encoded_point(false).is_identity(),
        }
    }

    /// SubjectPublicKeyInfo DER
    pub fn to_spki_der(&self) -> CryptoResult<Vec<u8>> {
        let doc = match self {
            EcPublicKey::P384(k) => k.to_public_key_der(),
            EcPublicKey::P256(k) => k.to_public_key_der(),
        }
        .map_err(|e| CryptoError::Encoding(format!("SPKI encoding failed: {e}")))?;
        Ok(doc.as_bytes().to_vec())
    }

    pub fn to_pem(&self) -> CryptoResult<String> {
        match self {
            EcPublicKey::P384(k) => k.to_public_key_pem(LineEnding::LF),
            EcPublicKey::P256(k) => k.to_public_key_pem(LineEnding::LF),
        }
        .map_err(|e| CryptoError::Encoding(format!("PEM encoding failed: {e}")))
    }
}

/// Encode `key` as `0x04 || X || Y` for `curve`.
///
/// Fails if the key is the identity element or lives on a different curve.
pub fn encode_tls(curve: EllipticCurve, key: &EcPublicKey) -> CryptoResult<Vec<u8>> {
    if key.curve() != curve {
        return Err(CryptoError::InvalidArgument(format!(
            "key is on {}, expected {curve}",
            key.curve()
        )));
    }
    if key.is_identity() {
        return Err(CryptoError::InvalidKey("identity point has no TLS encoding".into()));
    }
    let encoded = key.uncompressed_point();
    debug_assert_eq!(encoded.len(), curve.tls_encoded_len());
    Ok(encoded)
}

/// Decode a TLS-encoded public key and validate it against `curve`.
pub fn decode_tls(curve: EllipticCurve, bytes: &[u8]) -> CryptoResult<EcPublicKey> {
    let expected = curve.tls_encoded_len();
    if bytes.len() != expected {
        return Err(CryptoError::Encoding(format!(
            "{curve} TLS key must be {expected} bytes, got {}",
            bytes.len()
        )));
    }
    if bytes[0] != UNCOMPRESSED_POINT_TAG {
        return Err(CryptoError::Encoding(format!(
            "TLS key must start with 0x04, got {:#04x}",
            bytes[0]
        )));
    }

    let half = curve.key_length();
    let (x, y) = (&bytes[1..=half], &bytes[half + 1..]);

    let key = match curve {
        EllipticCurve::Secp384r1 => {
            let point = p384::EncodedPoint::from_affine_coordinates(
                p384::FieldBytes::from_slice(x),
                p384::FieldBytes::from_slice(y),
                false,
            );
            Option::<p384::PublicKey>::from(p384::PublicKey::from_encoded_point(&point))
                .map(EcPublicKey::P384)
        }
        EllipticCurve::Secp256r1 => {
            let point = p256::EncodedPoint::from_affine_coordinates(
                p256::FieldBytes::from_slice(x),
                p256::FieldBytes::from_slice(y),
                false,
            );
            Option::<p256::PublicKey>::from(p256::PublicKey::from_encoded_point(&point))
                .map(EcPublicKey::P256)
        }
    }
    .ok_or_else(|| CryptoError::InvalidKey(format!("point is not on {curve}")))?;

    if !is_valid(curve, Some(&key)) {
        return Err(CryptoError::InvalidKey(format!("not a valid {curve} public key")));
    }
    Ok(key)
}

/// Full public-key validation. Checks run in order and short-circuit:
/// present, not the identity, on the expected curve, coordinates satisfy the
/// curve equation.
pub fn is_valid(curve: EllipticCurve, key: Option<&EcPublicKey>) -> bool {
    let Some(key) = key else {
        return false;
    };
    if key.is_identity() {
        return false;
    }
    if !curve.is_valid_name(&curve_oid(key).to_string()) {
        return false;
    }

    // Rebuild the affine point from its raw coordinates; decoding performs
    // the curve equation check independently of the key object.
    match key {
        EcPublicKey::P384(k) => {
            let point = k.to_encoded_point(false);
            bool::from(p384::AffinePoint::from_encoded_point(&point).is_some())
        }
        EcPublicKey::P256(k) => {
            let point = k.to_encoded_point(false);
            bool::from(p256::AffinePoint::from_encoded_point(&point).is_some())
        }
    }
}

/// Canonical curve OID of `key`'s domain parameters.
pub fn curve_oid(key: &EcPublicKey) -> ObjectIdentifier {
    key.curve().oid()
}

#[derive(Clone)]
enum EcSecretKey {
    P384(p384::SecretKey),
    P256(p256::SecretKey),
}

/// An EC private key together with its public half. The secret scalar is
/// zeroized on drop.
#[derive(Clone)]
pub struct EcKeyPair {
    secret: EcSecretKey,
    public: EcPublicKey,
}

impl EcKeyPair {
    pub fn generate(curve: EllipticCurve) -> CryptoResult<Self> {
        let mut rng = secure_random()?.rng();
        let secret = match curve {
            EllipticCurve::Secp384r1 => EcSecretKey::P384(p384::SecretKey::random(&mut rng)),
            EllipticCurve::Secp256r1 => EcSecretKey::P256(p256::SecretKey::random(&mut rng)),
        };
        Ok(Self::from_secret(secret))
    }

    fn from_secret(secret: EcSecretKey) -> Self {
        let public = match &secret {
            EcSecretKey::P384(sk) => EcPublicKey::P384(sk.public_key()),
            EcSecretKey::P256(sk) => EcPublicKey::P256(sk.public_key()),
        };
        Self { secret, public }
    }

    /// Load a PKCS#8 (`PRIVATE KEY`) or SEC1 (`EC PRIVATE KEY`) PEM private key.
    pub fn from_pem(pem: &str) -> CryptoResult<Self> {
        let secret = if let Ok(sk) = p384::SecretKey::from_pkcs8_pem(pem) {
            EcSecretKey::P384(sk)
        } else if let Ok(sk) = p256::SecretKey::from_pkcs8_pem(pem) {
            EcSecretKey::P256(sk)
        } else if let Ok(sk) = p384::SecretKey::from_sec1_pem(pem) {
            EcSecretKey::P384(sk)
        } else if let Ok(sk) = p256::SecretKey::from_sec1_pem(pem) {
            EcSecretKey::P256(sk)
        } else {
            return Err(CryptoError::InvalidKey(
                "not a secp384r1 or secp256r1 private key in PKCS#8 or SEC1 PEM".into(),
            ));
        };
        Ok(Self::from_secret(secret))
    }

    pub fn to_pkcs8_pem(&self) -> CryptoResult<Zeroizing<String>> {
        match &self.secret {
            EcSecretKey::P384(sk) => sk.to_pkcs8_pem(LineEnding::LF),
            EcSecretKey::P256(sk) => sk.to_pkcs8_pem(LineEnding::LF),
        }
        .map_err(|e| CryptoError::Encoding(format!("PKCS#8 encoding failed: {e}")))
    }

    pub fn curve(&self) -> EllipticCurve {
        self.public.curve()
    }

    pub fn public_key(&self) -> &EcPublicKey {
        &self.public
    }

    /// ECDH shared secret (the x-coordinate of the shared point).
    pub fn diffie_hellman(&self, peer: &EcPublicKey) -> CryptoResult<Zeroizing<Vec<u8>>> {
        match (&self.secret, peer) {
            (EcSecretKey::P384(sk), EcPublicKey::P384(pk)) => {
                let shared = p384::ecdh::diffie_hellman(sk.to_nonzero_scalar(), pk.as_affine());
                Ok(Zeroizing::new(shared.raw_secret_bytes().to_vec()))
            }
            (EcSecretKey::P256(sk), EcPublicKey::P256(pk)) => {
                let shared = p256::ecdh::diffie_hellman(sk.to_nonzero_scalar(), pk.as_affine());
                Ok(Zeroizing::new(shared.raw_secret_bytes().to_vec()))
            }
            _ => Err(CryptoError::InvalidArgument(format!(
                "ECDH between {} and {} keys",
                self.curve(),
                peer.curve()
            ))),
        }
    }
}

impl fmt::Debug for EcKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcKeyPair")
            .field("curve", &self.curve())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

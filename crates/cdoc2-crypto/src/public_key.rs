//! Recipient / client public keys decoded from X.509 SubjectPublicKeyInfo

use der::asn1::{AnyRef, BitStringRef};
use der::{Decode, Encode};
use spki::{AlgorithmIdentifierRef, ObjectIdentifier, SubjectPublicKeyInfoRef};

use crate::curve::EllipticCurve;
use crate::ec_keys::EcPublicKey;
use crate::error::{CryptoError, CryptoResult};
use crate::rsa_keys::RsaPublicKey;

const ID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    Ec(EcPublicKey),
    Rsa(RsaPublicKey),
}

impl PublicKey {
    pub fn from_spki_der(der: &[u8]) -> CryptoResult<Self> {
        let spki = SubjectPublicKeyInfoRef::from_der(der)
            .map_err(|e| CryptoError::Encoding(format!("not a SubjectPublicKeyInfo: {e}")))?;
        let key_bytes = spki
            .subject_public_key
            .as_bytes()
            .ok_or_else(|| CryptoError::Encoding("public key BIT STRING has unused bits".into()))?;

        let algorithm = spki.algorithm.oid;
        if algorithm == ID_EC_PUBLIC_KEY {
            let curve_oid = spki
                .algorithm
                .parameters_oid()
                .map_err(|e| CryptoError::Encoding(format!("EC key without named curve: {e}")))?;
            let curve = EllipticCurve::for_oid(&curve_oid)?;
            EcPublicKey::from_sec1_bytes(curve, key_bytes).map(PublicKey::Ec)
        } else if algorithm == RSA_ENCRYPTION {
            RsaPublicKey::from_der(key_bytes).map(PublicKey::Rsa)
        } else {
            Err(CryptoError::InvalidKey(format!(
                "unsupported public key algorithm {algorithm}"
            )))
        }
    }

    /// Accepts `PUBLIC KEY` (SPKI) and `RSA PUBLIC KEY` (PKCS#1) PEM blocks.
    pub fn from_pem(pem: &str) -> CryptoResult<Self> {
        let (label, der) = der::pem::decode_vec(pem.trim().as_bytes())
            .map_err(|e| CryptoError::Encoding(format!("invalid PEM: {e}")))?;
        match label {
            "PUBLIC KEY" => Self::from_spki_der(&der),
            "RSA PUBLIC KEY" => RsaPublicKey::from_der(&der).map(PublicKey::Rsa),
            other => Err(CryptoError::Encoding(format!(
                "unexpected PEM label '{other}', expected PUBLIC KEY"
            ))),
        }
    }

    pub fn to_spki_der(&self) -> CryptoResult<Vec<u8>> {
        match self {
            PublicKey::Ec(key) => key.to_spki_der(),
            PublicKey::Rsa(key) => {
                let pkcs1 = key.to_der()?;
                let encode_err =
                    |e: der::Error| CryptoError::Encoding(format!("SPKI encoding failed: {e}"));
                let spki = SubjectPublicKeyInfoRef {
                    algorithm: AlgorithmIdentifierRef {
                        oid: RSA_ENCRYPTION,
                        parameters: Some(AnyRef::NULL),
                    },
                    subject_public_key: BitStringRef::from_bytes(&pkcs1).map_err(encode_err)?,
                };
                spki.to_der().map_err(encode_err)
            }
        }
    }

    pub fn as_ec(&self) -> Option<&EcPublicKey> {
        match self {
            PublicKey::Ec(key) => Some(key),
            PublicKey::Rsa(_) => None,
        }
    }

    pub fn algorithm(&self) -> &'static str {
        match self {
            PublicKey::Ec(key) => key.curve().name(),
            PublicKey::Rsa(_) => "rsa",
        }
    }
}

impl From<EcPublicKey> for PublicKey {
    fn from(key: EcPublicKey) -> Self {
        PublicKey::Ec(key)
    }
}

impl From<RsaPublicKey> for PublicKey {
    fn from(key: RsaPublicKey) -> Self {
        PublicKey::Rsa(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ec_keys::EcKeyPair;

    fn rsa_key() -> RsaPublicKey {
        let mut modulus = vec![0xB5u8];
        modulus.extend(std::iter::repeat(0x5Au8).take(255));
        RsaPublicKey::new(&modulus, &[0x01, 0x00, 0x01]).unwrap()
    }

    #[test]
    fn test_ec_spki_roundtrip() {
        for curve in EllipticCurve::ALL {
            let pair = EcKeyPair::generate(curve).unwrap();
            let key = PublicKey::Ec(pair.public_key().clone());

            let der = key.to_spki_der().unwrap();
            assert_eq!(PublicKey::from_spki_der(&der).unwrap(), key);
        }
    }

    #[test]
    fn test_ec_pem() {
        let pair = EcKeyPair::generate(EllipticCurve::Secp384r1).unwrap();
        let pem = pair.public_key().to_pem().unwrap();

        let key = PublicKey::from_pem(&pem).unwrap();
        assert_eq!(key.as_ec(), Some(pair.public_key()));
        assert_eq!(key.algorithm(), "secp384r1");
    }

    #[test]
    fn test_rsa_spki_roundtrip() {
        let key = PublicKey::Rsa(rsa_key());
        let der = key.to_spki_der().unwrap();
        assert_eq!(PublicKey::from_spki_der(&der).unwrap(), key);
    }

    #[test]
    fn test_rsa_pkcs1_pem() {
        let der = rsa_key().to_der().unwrap();
        let pem = der::pem::encode_string("RSA PUBLIC KEY", der::pem::LineEnding::LF, &der).unwrap();
        assert_eq!(PublicKey::from_pem(&pem).unwrap(), PublicKey::Rsa(rsa_key()));
    }

    #[test]
    fn test_rejects_private_key_pem() {
        let pair = EcKeyPair::generate(EllipticCurve::Secp256r1).unwrap();
        let pem = pair.to_pkcs8_pem().unwrap();
        assert!(matches!(
            PublicKey::from_pem(&pem),
            Err(CryptoError::Encoding(_))
        ));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(PublicKey::from_spki_der(&[0x30, 0x03, 0x02, 0x01, 0x00]).is_err());
        assert!(PublicKey::from_pem("-----BEGIN PUBLIC KEY-----\n!!\n-----END PUBLIC KEY-----").is_err());
    }
}

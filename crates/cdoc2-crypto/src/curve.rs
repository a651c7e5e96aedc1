//! Supported named curves and their constant tables

use std::fmt;

use cdoc2_core::fbs::recipients::EllipticCurve as FbsCurve;
use spki::ObjectIdentifier;

use crate::error::{CryptoError, CryptoResult};

const SECP384R1_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");
const SECP256R1_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EllipticCurve {
    Secp384r1,
    Secp256r1,
}

impl EllipticCurve {
    pub const ALL: [EllipticCurve; 2] = [EllipticCurve::Secp384r1, EllipticCurve::Secp256r1];

    pub fn name(self) -> &'static str {
        match self {
            EllipticCurve::Secp384r1 => "secp384r1",
            EllipticCurve::Secp256r1 => "secp256r1",
        }
    }

    pub fn oid(self) -> ObjectIdentifier {
        match self {
            EllipticCurve::Secp384r1 => SECP384R1_OID,
            EllipticCurve::Secp256r1 => SECP256R1_OID,
        }
    }

    /// Field element length in bytes
    pub fn key_length(self) -> usize {
        match self {
            EllipticCurve::Secp384r1 => 48,
            EllipticCurve::Secp256r1 => 32,
        }
    }

    /// Length of `0x04 || X || Y`
    pub fn tls_encoded_len(self) -> usize {
        2 * self.key_length() + 1
    }

    /// Names under which JCA, OpenSSL and the RFCs refer to this curve.
    fn aliases(self) -> &'static [&'static str] {
        match self {
            EllipticCurve::Secp384r1 => &["1.3.132.0.34", "secp384r1", "NIST P-384", "P-384"],
            EllipticCurve::Secp256r1 => &[
                "1.2.840.10045.3.1.7",
                "secp256r1",
                "NIST P-256",
                "P-256",
                "prime256v1",
                "X9.62 prime256v1",
            ],
        }
    }

    /// True if `name` is the OID, short name or long name of this curve.
    pub fn is_valid_name(self, name: &str) -> bool {
        let name = name.trim();
        self.aliases().iter().any(|a| a.eq_ignore_ascii_case(name))
    }

    pub fn for_name(name: &str) -> CryptoResult<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.is_valid_name(name))
            .ok_or_else(|| CryptoError::InvalidArgument(format!("unknown curve '{name}'")))
    }

    pub fn for_oid(oid: &ObjectIdentifier) -> CryptoResult<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.oid() == *oid)
            .ok_or_else(|| CryptoError::InvalidKey(format!("unsupported curve OID {oid}")))
    }

    /// Header curve tag
    pub fn to_fbs(self) -> FbsCurve {
        match self {
            EllipticCurve::Secp384r1 => FbsCurve::secp384r1,
            EllipticCurve::Secp256r1 => FbsCurve::secp256r1,
        }
    }

    /// Map the header's curve tag; anything unrecognised is a framing error.
    pub fn from_fbs(tag: FbsCurve) -> CryptoResult<Self> {
        match tag {
            FbsCurve::secp384r1 => Ok(EllipticCurve::Secp384r1),
            FbsCurve::secp256r1 => Ok(EllipticCurve::Secp256r1),
            other => Err(CryptoError::Parse(format!("unsupported curve tag {}", other.0))),
        }
    }
}

impl fmt::Display for EllipticCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lengths() {
        assert_eq!(EllipticCurve::Secp384r1.key_length(), 48);
        assert_eq!(EllipticCurve::Secp384r1.tls_encoded_len(), 97);
        assert_eq!(EllipticCurve::Secp256r1.key_length(), 32);
        assert_eq!(EllipticCurve::Secp256r1.tls_encoded_len(), 65);
    }

    #[test]
    fn test_aliases_are_equivalent() {
        for name in ["secp384r1", "1.3.132.0.34", "NIST P-384", "p-384"] {
            assert_eq!(
                EllipticCurve::for_name(name).unwrap(),
                EllipticCurve::Secp384r1,
                "{name}"
            );
        }
        for name in ["prime256v1", "1.2.840.10045.3.1.7", "secp256r1", "X9.62 prime256v1"] {
            assert_eq!(
                EllipticCurve::for_name(name).unwrap(),
                EllipticCurve::Secp256r1,
                "{name}"
            );
        }
        assert!(EllipticCurve::for_name("secp521r1").is_err());
    }

    #[test]
    fn test_oid_lookup() {
        for curve in EllipticCurve::ALL {
            assert_eq!(EllipticCurve::for_oid(&curve.oid()).unwrap(), curve);
            assert!(curve.is_valid_name(&curve.oid().to_string()));
        }
        let ed25519 = ObjectIdentifier::new_unwrap("1.3.101.112");
        assert!(EllipticCurve::for_oid(&ed25519).is_err());
    }

    #[test]
    fn test_header_tag_mapping() {
        for curve in EllipticCurve::ALL {
            assert_eq!(EllipticCurve::from_fbs(curve.to_fbs()).unwrap(), curve);
        }
        assert_eq!(EllipticCurve::Secp384r1.to_fbs().0, 1);
        assert_eq!(EllipticCurve::Secp256r1.to_fbs().0, 2);
        assert!(matches!(
            EllipticCurve::from_fbs(FbsCurve::UNKNOWN),
            Err(CryptoError::Parse(_))
        ));
        assert!(EllipticCurve::from_fbs(FbsCurve(42)).is_err());
    }
}

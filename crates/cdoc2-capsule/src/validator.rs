//! Capsule validation on PUT
//!
//! EC capsules must carry two TLS-encoded points on the claimed curve.
//! RSA capsules only need a decodable recipient key; the encrypted key blob
//! is opaque to the server.

use cdoc2_core::types::{Capsule, CapsuleType};
use cdoc2_crypto::{ec_keys, EllipticCurve, RsaPublicKey};
use tracing::debug;

use crate::error::{CapsuleError, CapsuleResult};

/// `Ok(false)` for a malformed capsule, `Err` for a capsule type this
/// server does not know.
pub fn is_valid(capsule: &Capsule) -> CapsuleResult<bool> {
    match check(capsule)? {
        Ok(()) => Ok(true),
        Err(reason) => {
            debug!(capsule_type = %capsule.capsule_type, %reason, "capsule rejected");
            Ok(false)
        }
    }
}

/// Like [`is_valid`] but carries the rejection reason.
pub fn validate(capsule: &Capsule) -> CapsuleResult<()> {
    check(capsule)?.map_err(CapsuleError::Validation)
}

fn check(capsule: &Capsule) -> CapsuleResult<Result<(), String>> {
    let outcome = match capsule.capsule_type {
        CapsuleType::EccSecp384r1 => check_ec(EllipticCurve::Secp384r1, capsule),
        CapsuleType::EccSecp256r1 => check_ec(EllipticCurve::Secp256r1, capsule),
        CapsuleType::Rsa => check_rsa(capsule),
        CapsuleType::Unknown => {
            return Err(CapsuleError::UnsupportedCapsuleType(capsule.capsule_type))
        }
    };
    Ok(outcome)
}

fn check_ec(curve: EllipticCurve, capsule: &Capsule) -> Result<(), String> {
    let recipient = capsule
        .recipient_id
        .as_deref()
        .ok_or("recipient_id is missing")?;
    let ephemeral = capsule
        .ephemeral_key_material
        .as_deref()
        .ok_or("ephemeral_key_material is missing")?;

    let expected = curve.tls_encoded_len();
    for (field, bytes) in [("recipient_id", recipient), ("ephemeral_key_material", ephemeral)] {
        if bytes.len() != expected {
            return Err(format!(
                "{field} is {} bytes, {curve} keys are {expected}",
                bytes.len()
            ));
        }
        ec_keys::decode_tls(curve, bytes).map_err(|e| format!("{field}: {e}"))?;
    }
    Ok(())
}

fn check_rsa(capsule: &Capsule) -> Result<(), String> {
    let recipient = capsule
        .recipient_id
        .as_deref()
        .ok_or("recipient_id is missing")?;
    RsaPublicKey::from_der(recipient)
        .map(|_| ())
        .map_err(|e| format!("recipient_id: {e}"))
}

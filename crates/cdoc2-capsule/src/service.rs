//! Key capsule service: store (PUT), fetch (GET), expire (sweep)

use std::sync::Arc;

use cdoc2_core::types::{Capsule, CapsuleType, StoredCapsule};
use cdoc2_crypto::{ec_keys, EllipticCurve, PublicKey};
use chrono::{DateTime, Utc};
use subtle::ConstantTimeEq;
use tracing::{debug, error, info, warn};

use crate::error::{CapsuleError, CapsuleResult};
use crate::expiry::ExpiryPolicy;
use crate::store::CapsuleStore;
use crate::transaction::{self, generate_transaction_id};
use crate::validator;

/// Fresh ids are retried this many times if the store reports a collision.
const MAX_ID_ATTEMPTS: usize = 3;

/// What a successful PUT reports back to the sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOutcome {
    pub transaction_id: String,
    pub expiry_time: DateTime<Utc>,
    pub expiry_time_adjusted: bool,
}

#[derive(Clone)]
pub struct KeyCapsuleService {
    store: Arc<dyn CapsuleStore>,
    policy: ExpiryPolicy,
}

impl KeyCapsuleService {
    pub fn new(store: Arc<dyn CapsuleStore>, policy: ExpiryPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &ExpiryPolicy {
        &self.policy
    }

    pub async fn store(
        &self,
        capsule: Capsule,
        requested_expiry: Option<DateTime<Utc>>,
    ) -> CapsuleResult<StoreOutcome> {
        self.store_at(capsule, requested_expiry, Utc::now()).await
    }

    /// Validate, resolve the expiry against `now` and persist under a new id.
    pub async fn store_at(
        &self,
        capsule: Capsule,
        requested_expiry: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> CapsuleResult<StoreOutcome> {
        if let Err(e) = validator::validate(&capsule) {
            match &e {
                CapsuleError::UnsupportedCapsuleType(t) => {
                    error!(capsule_type = %t, "capsule type not supported by this server")
                }
                _ => warn!(capsule_type = %capsule.capsule_type, "invalid capsule: {e}"),
            }
            return Err(e);
        }

        let expiry = self.policy.resolve(requested_expiry, now);
        if expiry.adjusted {
            info!(
                requested = ?requested_expiry,
                effective = %expiry.expiry_time,
                "requested capsule expiry exceeds maximum, clamped"
            );
        }

        // validated above, both fields are present for EC and recipient for RSA
        let recipient = capsule.recipient_id.unwrap_or_default();
        let payload = capsule.ephemeral_key_material.unwrap_or_default();

        let mut attempt = 0;
        loop {
            attempt += 1;
            let record = StoredCapsule {
                transaction_id: generate_transaction_id()?,
                capsule_type: capsule.capsule_type,
                recipient: recipient.clone(),
                payload: payload.clone(),
                expiry_time: expiry.expiry_time,
                expiry_time_adjusted: expiry.adjusted,
                created_at: now,
            };
            let transaction_id = record.transaction_id.clone();

            match self.store.insert(record).await {
                Ok(()) => {
                    info!(
                        %transaction_id,
                        capsule_type = %capsule.capsule_type,
                        expiry_time = %expiry.expiry_time,
                        adjusted = expiry.adjusted,
                        "key capsule stored"
                    );
                    return Ok(StoreOutcome {
                        transaction_id,
                        expiry_time: expiry.expiry_time,
                        expiry_time_adjusted: expiry.adjusted,
                    });
                }
                Err(CapsuleError::DuplicateTransactionId(id)) if attempt < MAX_ID_ATTEMPTS => {
                    warn!(transaction_id = %id, attempt, "transaction id collision, retrying");
                }
                Err(e) => {
                    error!(capsule_type = %capsule.capsule_type, "failed to store key capsule: {e}");
                    return Err(e);
                }
            }
        }
    }

    /// Release a capsule to its recipient.
    ///
    /// An unknown id and a caller who is not the recipient both yield
    /// `NotFound`.
    pub async fn fetch(&self, transaction_id: &str, caller: &PublicKey) -> CapsuleResult<Capsule> {
        if !transaction::is_well_formed(transaction_id) {
            debug!(%transaction_id, "malformed transaction id");
            return Err(CapsuleError::NotFound);
        }

        let stored = match self.store.find(transaction_id).await {
            Ok(Some(stored)) => stored,
            Ok(None) => {
                info!(%transaction_id, "key capsule not found");
                return Err(CapsuleError::NotFound);
            }
            Err(e) => {
                error!(%transaction_id, "failed to load key capsule: {e}");
                return Err(e);
            }
        };

        if !recipient_matches(&stored, caller) {
            info!(%transaction_id, "key capsule not found");
            debug!(%transaction_id, caller = caller.algorithm(), "caller is not the recipient");
            return Err(CapsuleError::NotFound);
        }

        info!(%transaction_id, capsule_type = %stored.capsule_type, "key capsule fetched");
        Ok(stored.to_capsule())
    }

    pub async fn expire(&self) -> CapsuleResult<u64> {
        self.expire_at(Utc::now()).await
    }

    /// Delete every capsule whose expiry is before `now`.
    pub async fn expire_at(&self, now: DateTime<Utc>) -> CapsuleResult<u64> {
        let removed = self.store.delete_expired(now).await?;
        info!(removed, "expired key capsules deleted");
        Ok(removed)
    }
}

/// Encode the caller's key the way the stored recipient was encoded and
/// compare in constant time.
fn recipient_matches(stored: &StoredCapsule, caller: &PublicKey) -> bool {
    let expected = match (stored.capsule_type, caller) {
        (CapsuleType::EccSecp384r1, PublicKey::Ec(key)) => {
            encode_ec(EllipticCurve::Secp384r1, key)
        }
        (CapsuleType::EccSecp256r1, PublicKey::Ec(key)) => {
            encode_ec(EllipticCurve::Secp256r1, key)
        }
        (CapsuleType::Rsa, PublicKey::Rsa(key)) => key.to_der().ok(),
        _ => None,
    };
    expected.is_some_and(|bytes| bool::from(bytes.ct_eq(&stored.recipient)))
}

fn encode_ec(curve: EllipticCurve, key: &cdoc2_crypto::EcPublicKey) -> Option<Vec<u8>> {
    if key.curve() != curve {
        return None;
    }
    ec_keys::encode_tls(curve, key).ok()
}

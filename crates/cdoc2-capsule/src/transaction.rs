//! Transaction ids: `KC` followed by 32 lowercase hex characters

use cdoc2_crypto::secure_random;

use crate::error::CapsuleResult;

pub const TRANSACTION_ID_PREFIX: &str = "KC";

const RANDOM_BYTES: usize = 16;

pub fn generate_transaction_id() -> CapsuleResult<String> {
    let bytes: [u8; RANDOM_BYTES] = secure_random()?.bytes()?;
    Ok(format!("{TRANSACTION_ID_PREFIX}{}", hex::encode(bytes)))
}

/// Shape check only; says nothing about whether the capsule exists.
pub fn is_well_formed(id: &str) -> bool {
    id.strip_prefix(TRANSACTION_ID_PREFIX).is_some_and(|rest| {
        rest.len() == RANDOM_BYTES * 2 && rest.bytes().all(|b| b.is_ascii_hexdigit())
    })
}

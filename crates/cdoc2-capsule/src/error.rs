use cdoc2_core::types::CapsuleType;
use cdoc2_crypto::CryptoError;
use thiserror::Error;

pub type CapsuleResult<T> = Result<T, CapsuleError>;

#[derive(Debug, Error)]
pub enum CapsuleError {
    /// Capsule rejected by the validator (client error)
    #[error("capsule validation failed: {0}")]
    Validation(String),

    /// Capsule type this server does not know (protocol mismatch)
    #[error("unsupported capsule type: {0}")]
    UnsupportedCapsuleType(CapsuleType),

    /// No such capsule, or the caller is not its recipient
    #[error("key capsule not found")]
    NotFound,

    #[error("transaction id already in use: {0}")]
    DuplicateTransactionId(String),

    #[error("capsule storage failed: {0}")]
    Storage(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

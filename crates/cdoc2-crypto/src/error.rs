use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

#[derive(Debug, Error)]
pub enum CryptoError {
    /// Malformed byte layout: wrong length, bad prefix byte, bad ASN.1 structure
    #[error("invalid encoding: {0}")]
    Encoding(String),

    /// Well-formed bytes that are not a usable key (off curve, identity, wrong curve)
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Container framing violation
    #[error("parse error: {0}")]
    Parse(String),

    /// HMAC or AEAD tag mismatch
    #[error("authentication failed: {0}")]
    AuthenticationFailure(String),

    #[error("no recipient record matches the given key")]
    NoMatchingRecipient,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unsupported recipient: {0}")]
    UnsupportedRecipient(String),

    #[error("secure random source unavailable: {0}")]
    Random(String),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

//! cdoc2-capsule: key capsule exchange
//!
//! A sender that cannot hand its ephemeral key to the recipient directly
//! stores it as a capsule (PUT). The recipient later fetches it (GET) over
//! mutual TLS; the capsule is released only to the client whose certificate
//! key matches the stored recipient. Expired capsules are swept periodically.

pub mod error;
pub mod expiry;
#[cfg(feature = "rocksdb")]
pub mod rocks;
pub mod service;
pub mod store;
pub mod transaction;
pub mod validator;

pub use error::{CapsuleError, CapsuleResult};
pub use expiry::{ExpiryPolicy, ResolvedExpiry};
#[cfg(feature = "rocksdb")]
pub use rocks::RocksDbCapsuleStore;
pub use service::{KeyCapsuleService, StoreOutcome};
pub use store::{open_store, CapsuleStore, MemoryCapsuleStore};
pub use transaction::generate_transaction_id;

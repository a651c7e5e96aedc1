//! Capsule persistence
//!
//! The service only needs three operations: insert a new record, look one up
//! by transaction id, and delete everything past its expiry. Each backend
//! owns its own synchronisation; the service never holds a lock across calls.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use cdoc2_core::config::{StorageBackend, StorageConfig};
use cdoc2_core::types::StoredCapsule;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::error::{CapsuleError, CapsuleResult};

#[async_trait]
pub trait CapsuleStore: Send + Sync {
    /// Fails with `DuplicateTransactionId` if the id is already taken.
    async fn insert(&self, capsule: StoredCapsule) -> CapsuleResult<()>;

    async fn find(&self, transaction_id: &str) -> CapsuleResult<Option<StoredCapsule>>;

    /// Delete every capsule with `expiry_time < now`; returns how many went.
    async fn delete_expired(&self, now: DateTime<Utc>) -> CapsuleResult<u64>;

    async fn count(&self) -> CapsuleResult<usize>;
}

/// Volatile store for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryCapsuleStore {
    capsules: RwLock<HashMap<String, StoredCapsule>>,
}

impl MemoryCapsuleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CapsuleStore for MemoryCapsuleStore {
    async fn insert(&self, capsule: StoredCapsule) -> CapsuleResult<()> {
        let mut capsules = self.capsules.write();
        if capsules.contains_key(&capsule.transaction_id) {
            return Err(CapsuleError::DuplicateTransactionId(capsule.transaction_id));
        }
        capsules.insert(capsule.transaction_id.clone(), capsule);
        Ok(())
    }

    async fn find(&self, transaction_id: &str) -> CapsuleResult<Option<StoredCapsule>> {
        Ok(self.capsules.read().get(transaction_id).cloned())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> CapsuleResult<u64> {
        let mut capsules = self.capsules.write();
        let before = capsules.len();
        capsules.retain(|_, c| !c.is_expired_at(now));
        Ok((before - capsules.len()) as u64)
    }

    async fn count(&self) -> CapsuleResult<usize> {
        Ok(self.capsules.read().len())
    }
}

/// Open the backend selected in `[storage]`.
///
/// Asking for RocksDB in a build without the `rocksdb` feature falls back to
/// the memory store with a warning.
pub fn open_store(config: &StorageConfig) -> CapsuleResult<Arc<dyn CapsuleStore>> {
    match config.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryCapsuleStore::new())),
        #[cfg(feature = "rocksdb")]
        StorageBackend::Rocksdb => Ok(Arc::new(crate::rocks::RocksDbCapsuleStore::open(
            &config.path,
        )?)),
        #[cfg(not(feature = "rocksdb"))]
        StorageBackend::Rocksdb => {
            tracing::warn!(
                "RocksDB not compiled in (missing 'rocksdb' feature), capsules will not survive a restart"
            );
            Ok(Arc::new(MemoryCapsuleStore::new()))
        }
    }
}

//! RocksDB-backed capsule store (feature `rocksdb`)
//!
//! Records are JSON values keyed by transaction id. Every call runs on the
//! blocking pool so request handlers never stall the runtime on disk I/O.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use cdoc2_core::types::StoredCapsule;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::error::{CapsuleError, CapsuleResult};
use crate::store::CapsuleStore;

pub struct RocksDbCapsuleStore {
    db: Arc<rocksdb::DB>,
    /// Serialises the existence check and put of `insert`.
    insert_lock: Arc<Mutex<()>>,
}

impl RocksDbCapsuleStore {
    /// Open or create a capsule database at the given path.
    pub fn open(path: &Path) -> CapsuleResult<Self> {
        let mut opts = rocksdb::Options::default();
        opts.create_if_missing(true);

        let db = rocksdb::DB::open(&opts, path).map_err(|e| {
            CapsuleError::Storage(format!("opening RocksDB {}: {e}", path.display()))
        })?;

        tracing::info!(path = %path.display(), "capsule store opened");
        Ok(Self {
            db: Arc::new(db),
            insert_lock: Arc::new(Mutex::new(())),
        })
    }

    async fn blocking<T, F>(&self, f: F) -> CapsuleResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&rocksdb::DB) -> CapsuleResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| CapsuleError::Storage(format!("storage task failed: {e}")))?
    }
}

fn storage_err(context: &str, e: impl std::fmt::Display) -> CapsuleError {
    CapsuleError::Storage(format!("{context}: {e}"))
}

#[async_trait]
impl CapsuleStore for RocksDbCapsuleStore {
    async fn insert(&self, capsule: StoredCapsule) -> CapsuleResult<()> {
        let lock = Arc::clone(&self.insert_lock);
        self.blocking(move |db| {
            let key = capsule.transaction_id.as_bytes();
            let value = serde_json::to_vec(&capsule).map_err(|e| storage_err("encoding capsule", e))?;

            let _guard = lock.lock();
            if db
                .get_pinned(key)
                .map_err(|e| storage_err("RocksDB get", e))?
                .is_some()
            {
                return Err(CapsuleError::DuplicateTransactionId(
                    capsule.transaction_id.clone(),
                ));
            }
            db.put(key, value).map_err(|e| storage_err("RocksDB put", e))
        })
        .await
    }

    async fn find(&self, transaction_id: &str) -> CapsuleResult<Option<StoredCapsule>> {
        let key = transaction_id.to_string();
        self.blocking(move |db| {
            let Some(bytes) = db
                .get(key.as_bytes())
                .map_err(|e| storage_err("RocksDB get", e))?
            else {
                return Ok(None);
            };
            serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| storage_err(&format!("decoding capsule {key}"), e))
        })
        .await
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> CapsuleResult<u64> {
        self.blocking(move |db| {
            let mut expired = Vec::new();
            for item in db.iterator(rocksdb::IteratorMode::Start) {
                let (key, value) = item.map_err(|e| storage_err("iterating RocksDB", e))?;
                match serde_json::from_slice::<StoredCapsule>(&value) {
                    Ok(capsule) if capsule.is_expired_at(now) => expired.push(key),
                    Ok(_) => {}
                    Err(e) => tracing::warn!(
                        key = %String::from_utf8_lossy(&key),
                        "skipping undecodable capsule record: {e}"
                    ),
                }
            }

            if expired.is_empty() {
                return Ok(0);
            }
            // one atomic write for the whole sweep
            let mut batch = rocksdb::WriteBatch::default();
            for key in &expired {
                batch.delete(key);
            }
            db.write(batch)
                .map_err(|e| storage_err("RocksDB delete batch", e))?;

            tracing::debug!(removed = expired.len(), "expired capsules deleted");
            Ok(expired.len() as u64)
        })
        .await
    }

    async fn count(&self) -> CapsuleResult<usize> {
        self.blocking(|db| {
            let mut n = 0;
            for item in db.iterator(rocksdb::IteratorMode::Start) {
                item.map_err(|e| storage_err("iterating RocksDB", e))?;
                n += 1;
            }
            Ok(n)
        })
        .await
    }
}

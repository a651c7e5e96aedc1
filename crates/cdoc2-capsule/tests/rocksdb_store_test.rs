//! RocksDB capsule store (requires `--features rocksdb`)
#![cfg(feature = "rocksdb")]

use std::sync::Arc;

use cdoc2_capsule::{CapsuleError, CapsuleStore, ExpiryPolicy, KeyCapsuleService, RocksDbCapsuleStore};
use cdoc2_core::types::{CapsuleType, StoredCapsule};
use cdoc2_crypto::{ec_keys, EcKeyPair, EllipticCurve, PublicKey};
use chrono::{Duration, Utc};
use tempfile::TempDir;

fn record(id: &str, expiry_hours: i64) -> StoredCapsule {
    let now = Utc::now();
    StoredCapsule {
        transaction_id: id.to_string(),
        capsule_type: CapsuleType::EccSecp256r1,
        recipient: vec![4; 65],
        payload: vec![7; 65],
        expiry_time: now + Duration::hours(expiry_hours),
        expiry_time_adjusted: false,
        created_at: now,
    }
}

#[tokio::test]
async fn rocksdb_insert_find_roundtrip() {
    let tmp = TempDir::new().unwrap();
    let store = RocksDbCapsuleStore::open(&tmp.path().join("capsules")).unwrap();

    let capsule = record("KC01", 1);
    store.insert(capsule.clone()).await.unwrap();

    assert_eq!(store.find("KC01").await.unwrap(), Some(capsule));
    assert_eq!(store.find("KC02").await.unwrap(), None);
}

#[tokio::test]
async fn rocksdb_rejects_duplicate_id() {
    let tmp = TempDir::new().unwrap();
    let store = RocksDbCapsuleStore::open(&tmp.path().join("capsules")).unwrap();

    store.insert(record("KC01", 1)).await.unwrap();
    let err = store.insert(record("KC01", 2)).await.unwrap_err();
    assert!(matches!(err, CapsuleError::DuplicateTransactionId(_)));
}

#[tokio::test]
async fn rocksdb_persistence_across_reopen() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("capsules");

    {
        let store = RocksDbCapsuleStore::open(&path).unwrap();
        store.insert(record("KC01", 1)).await.unwrap();
        store.insert(record("KC02", 1)).await.unwrap();
    }

    let store = RocksDbCapsuleStore::open(&path).unwrap();
    assert_eq!(store.count().await.unwrap(), 2);
    assert!(store.find("KC02").await.unwrap().is_some());
}

#[tokio::test]
async fn rocksdb_delete_expired() {
    let tmp = TempDir::new().unwrap();
    let store = RocksDbCapsuleStore::open(&tmp.path().join("capsules")).unwrap();

    store.insert(record("old", -2)).await.unwrap();
    store.insert(record("older", -48)).await.unwrap();
    store.insert(record("new", 2)).await.unwrap();

    assert_eq!(store.delete_expired(Utc::now()).await.unwrap(), 2);
    assert_eq!(store.count().await.unwrap(), 1);
    assert_eq!(store.delete_expired(Utc::now()).await.unwrap(), 0);
}

#[tokio::test]
async fn rocksdb_delete_expired_sweeps_in_one_pass() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("capsules");

    {
        let store = RocksDbCapsuleStore::open(&path).unwrap();
        for i in 0..40 {
            store.insert(record(&format!("KC-expired-{i:02}"), -1)).await.unwrap();
        }
        store.insert(record("KC-live", 1)).await.unwrap();

        assert_eq!(store.delete_expired(Utc::now()).await.unwrap(), 40);
        for i in 0..40 {
            assert_eq!(store.find(&format!("KC-expired-{i:02}")).await.unwrap(), None);
        }
    }

    // the deletions are durable and the live record survived
    let store = RocksDbCapsuleStore::open(&path).unwrap();
    assert_eq!(store.count().await.unwrap(), 1);
    assert!(store.find("KC-live").await.unwrap().is_some());
}

#[tokio::test]
async fn rocksdb_backs_capsule_service() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(RocksDbCapsuleStore::open(&tmp.path().join("capsules")).unwrap());
    let service = KeyCapsuleService::new(store, ExpiryPolicy::default());

    let recipient = EcKeyPair::generate(EllipticCurve::Secp384r1).unwrap();
    let ephemeral = EcKeyPair::generate(EllipticCurve::Secp384r1).unwrap();
    let capsule = cdoc2_core::types::Capsule::new(
        CapsuleType::EccSecp384r1,
        ec_keys::encode_tls(recipient.curve(), recipient.public_key()).unwrap(),
        ec_keys::encode_tls(ephemeral.curve(), ephemeral.public_key()).unwrap(),
    );

    let outcome = service.store(capsule.clone(), None).await.unwrap();
    let fetched = service
        .fetch(
            &outcome.transaction_id,
            &PublicKey::from(recipient.public_key().clone()),
        )
        .await
        .unwrap();
    assert_eq!(fetched, capsule);
}

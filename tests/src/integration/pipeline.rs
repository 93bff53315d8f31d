//! Put/Get round trips, dedup, and the replication floor.

use crate::harness::{small_config, TestCell};
use pocket_frontend::PutError;
use pocket_index::BlockIndexApi;
use pocket_replication::ReplicationTableApi;
use rand::RngCore;
use shared_types::BlockHash;

#[tokio::test]
async fn round_trip_hello() {
    let cell = TestCell::new(3, small_config()).await;
    let data = b"Hello, Magic Pocket!".to_vec();

    let hash = cell.frontend.put(data.clone()).await.unwrap();
    assert_eq!(hash, BlockHash::digest(&data));
    assert_eq!(hash.to_hex().len(), 64);

    assert_eq!(cell.frontend.get(&hash).await.unwrap(), data);
}

#[tokio::test]
async fn round_trip_large_random_payloads() {
    let cell = TestCell::new(3, small_config()).await;
    let mut rng = rand::thread_rng();

    for len in [1, 100, 4096, 1 << 20] {
        let mut data = vec![0u8; len];
        rng.fill_bytes(&mut data);
        let hash = cell.frontend.put(data.clone()).await.unwrap();
        assert_eq!(cell.frontend.get(&hash).await.unwrap(), data, "len {len}");
    }
}

#[tokio::test]
async fn dedup_known_digest_and_single_replica_set() {
    let cell = TestCell::new(3, small_config()).await;

    let first = cell.frontend.put(b"abc".to_vec()).await.unwrap();
    let second = cell.frontend.put(b"abc".to_vec()).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(
        first.to_hex(),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );

    // Exactly one logical replica set holds the bytes.
    let volumes = cell.table.list_volumes(None).await.unwrap();
    assert_eq!(volumes.len(), 1);
    let buckets = cell.table.list_buckets(volumes[0]).await.unwrap();
    assert_eq!(buckets.len(), 1);
    assert_eq!(
        cell.table
            .list_bucket_blocks(buckets[0].bucket_id)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn concurrent_puts_of_identical_bytes_converge() {
    let cell = std::sync::Arc::new(TestCell::new(3, small_config()).await);
    let data = b"raced from two clients".to_vec();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let cell = cell.clone();
        let data = data.clone();
        handles.push(tokio::spawn(
            async move { cell.frontend.put(data).await },
        ));
    }

    let mut hashes = Vec::new();
    for handle in handles {
        hashes.push(handle.await.unwrap().unwrap());
    }
    let expected = BlockHash::digest(&data);
    assert!(hashes.iter().all(|h| *h == expected));

    // Idempotent daemon writes and index upsert left one logical copy.
    let entry = cell.index.get_entry(&expected).await.unwrap().unwrap();
    let manifest = cell
        .table
        .list_bucket_blocks(entry.bucket_id)
        .await
        .unwrap();
    assert_eq!(manifest.iter().filter(|(h, _)| *h == expected).count(), 1);
    assert_eq!(cell.frontend.get(&expected).await.unwrap(), data);
}

#[tokio::test]
async fn replication_floor_blocks_put() {
    let cell = TestCell::new(2, small_config()).await;
    let data = b"two daemons are not three".to_vec();

    let err = cell.frontend.put(data.clone()).await.unwrap_err();
    assert!(matches!(
        err,
        PutError::InsufficientReplicas { needed: 3, got: 2 }
    ));
    assert!(!cell
        .index
        .exists(&BlockHash::digest(&data))
        .await
        .unwrap());
}

#[tokio::test]
async fn distinct_blocks_share_one_open_volume() {
    let cell = TestCell::new(4, small_config()).await;

    let a = cell.frontend.put(b"first block".to_vec()).await.unwrap();
    let b = cell.frontend.put(b"second block".to_vec()).await.unwrap();
    assert_ne!(a, b);

    let volumes = cell.table.list_volumes(None).await.unwrap();
    assert_eq!(volumes.len(), 1);

    // Both land in the same open bucket of that volume.
    let entry_a = cell.index.get_entry(&a).await.unwrap().unwrap();
    let entry_b = cell.index.get_entry(&b).await.unwrap().unwrap();
    assert_eq!(entry_a.bucket_id, entry_b.bucket_id);
}

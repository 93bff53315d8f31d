//! Bucket sealing and volume close as writes accumulate.

use crate::harness::TestCell;
use pocket_replication::ReplicationTableApi;
use shared_types::{CellConfig, VolumeState};

#[tokio::test]
async fn buckets_seal_and_full_volume_closes() {
    // Tiny buckets: two 40-byte blocks overflow one bucket; a volume is
    // full after two sealed buckets.
    let config = CellConfig::default()
        .with_cell_id("cell-test")
        .with_bucket_size(64)
        .with_max_buckets_per_volume(2);
    let cell = TestCell::new(3, config).await;

    let payloads: Vec<Vec<u8>> = (0..4u8).map(|i| vec![i; 40]).collect();
    let mut hashes = Vec::new();
    for data in &payloads {
        hashes.push(cell.frontend.put(data.clone()).await.unwrap());
    }

    let volumes = cell.table.list_volumes(None).await.unwrap();
    assert_eq!(volumes.len(), 2, "a second volume opened after the first filled");

    let mut states = Vec::new();
    for volume_id in &volumes {
        let info = cell.table.get_volume(*volume_id).await.unwrap().unwrap();
        states.push(info.state);
    }
    assert!(states.contains(&VolumeState::Closed));
    assert!(states.contains(&VolumeState::Open));

    // Closing and rolling volumes never loses a block.
    for (hash, data) in hashes.iter().zip(&payloads) {
        assert_eq!(&cell.frontend.get(hash).await.unwrap(), data);
    }
}

#[tokio::test]
async fn sealed_buckets_are_append_frozen() {
    let config = CellConfig::default()
        .with_cell_id("cell-test")
        .with_bucket_size(64)
        .with_max_buckets_per_volume(8);
    let cell = TestCell::new(3, config).await;

    cell.frontend.put(vec![1u8; 40]).await.unwrap();
    cell.frontend.put(vec![2u8; 40]).await.unwrap();

    let volume_id = cell.table.list_volumes(None).await.unwrap()[0];
    let buckets = cell.table.list_buckets(volume_id).await.unwrap();
    let sealed: Vec<_> = buckets.iter().filter(|b| b.sealed).collect();
    assert_eq!(sealed.len(), 1);

    // The sealed bucket keeps exactly its one block; the follow-up went to
    // the successor bucket.
    let manifest = cell
        .table
        .list_bucket_blocks(sealed[0].bucket_id)
        .await
        .unwrap();
    assert_eq!(manifest.len(), 1);
}

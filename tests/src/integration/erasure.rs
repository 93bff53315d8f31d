//! Closed-volume erasure coding and shard-loss reads through the frontend.

use crate::harness::TestCell;
use pocket_frontend::GetError;
use pocket_master::MasterApi;
use pocket_replication::ReplicationTableApi;
use pocket_volman::VolumeManagerApi;
use shared_types::{CellConfig, VolumeState};

fn ec_config() -> CellConfig {
    CellConfig::default()
        .with_cell_id("cell-test")
        .with_shards(4, 2)
}

/// Put blocks, close the volume, encode it onto fresh daemons.
async fn encoded_cell() -> (TestCell, Vec<(shared_types::BlockHash, Vec<u8>)>) {
    let cell = TestCell::new(9, ec_config()).await;

    let mut blocks = Vec::new();
    for i in 0..3u32 {
        let data: Vec<u8> = (0..2000 + i * 17).map(|j| (j % 251) as u8).collect();
        let hash = cell.frontend.put(data.clone()).await.unwrap();
        blocks.push((hash, data));
    }

    let volume_id = cell.table.list_volumes(None).await.unwrap()[0];
    let info = cell.table.get_volume(volume_id).await.unwrap().unwrap();
    cell.master.close_volume(volume_id).await.unwrap();

    let buckets = cell.table.list_buckets(volume_id).await.unwrap();
    assert_eq!(buckets.len(), 1);
    let targets: Vec<String> = (3..9).map(|i| format!("osd-{i}:9090")).collect();
    cell.volman
        .erasure_encode_volume(
            volume_id,
            buckets[0].bucket_id,
            &info.osd_addresses,
            &targets,
        )
        .await
        .unwrap();

    let info = cell.table.get_volume(volume_id).await.unwrap().unwrap();
    assert_eq!(info.state, VolumeState::ErasureCoded);
    assert_eq!(info.generation, 2);
    assert_eq!(info.osd_addresses, targets);

    (cell, blocks)
}

#[tokio::test]
async fn reads_go_through_reconstruction_after_encoding() {
    let (cell, blocks) = encoded_cell().await;
    for (hash, data) in &blocks {
        assert_eq!(&cell.frontend.get(hash).await.unwrap(), data);
    }
}

#[tokio::test]
async fn reads_survive_parity_many_shard_losses() {
    let (cell, blocks) = encoded_cell().await;

    // Two of the six shard holders die, still within the parity budget.
    cell.osds[4].set_healthy(false);
    cell.osds[8].set_healthy(false);

    for (hash, data) in &blocks {
        assert_eq!(&cell.frontend.get(hash).await.unwrap(), data);
    }
}

#[tokio::test]
async fn reads_fail_beyond_parity_budget() {
    let (cell, blocks) = encoded_cell().await;

    // Three losses with P = 2: under the decode threshold.
    for i in [3, 5, 7] {
        cell.osds[i].set_healthy(false);
    }

    let err = cell.frontend.get(&blocks[0].0).await.unwrap_err();
    assert!(matches!(err, GetError::BlockUnavailable(_)));
}

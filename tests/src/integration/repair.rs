//! Failure detection and volume rebuild, end to end.
//!
//! Runs in real time with sub-second liveness windows: daemons heartbeat
//! every 100 ms, the monitor wakes every 150 ms, and a daemon is dead
//! after 500 ms of silence.

use crate::harness::TestCell;
use pocket_index::BlockIndexApi;
use pocket_osd::ObjectStorageApi;
use pocket_replication::ReplicationTableApi;
use shared_types::{CellConfig, VolumeState};
use std::time::Duration;

fn repair_config() -> CellConfig {
    CellConfig::default()
        .with_cell_id("cell-test")
        .with_heartbeat_timeout(Duration::from_millis(500))
        .with_monitor_interval(Duration::from_millis(150))
}

#[tokio::test]
async fn dead_osd_detected_and_volume_rebuilt() {
    let mut cell = TestCell::new(4, repair_config()).await;

    let data = b"must survive the death of osd-0".to_vec();
    let hash = cell.frontend.put(data.clone()).await.unwrap();
    let volume_id = cell.table.list_volumes(None).await.unwrap()[0];
    let before = cell.table.get_volume(volume_id).await.unwrap().unwrap();
    assert_eq!(
        before.osd_addresses,
        vec!["osd-0:9090", "osd-1:9090", "osd-2:9090"]
    );

    // Survivors keep heartbeating; osd-0 goes silent and dark.
    for i in 1..4 {
        cell.spawn_heartbeat(i, Duration::from_millis(100));
    }
    cell.spawn_monitor();
    cell.osds[0].set_healthy(false);

    // Wait for the monitor to notice and the repair to commit, reading the
    // block the whole time.
    let mut rebuilt = None;
    for _ in 0..100 {
        assert_eq!(
            cell.frontend.get(&hash).await.unwrap(),
            data,
            "reads must not fail during repair"
        );
        let info = cell.table.get_volume(volume_id).await.unwrap().unwrap();
        if info.generation >= 2 {
            rebuilt = Some(info);
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    let info = rebuilt.expect("repair did not commit within the deadline");
    assert_eq!(info.generation, 2);
    // osd-3 took osd-0's replica slot; a volume under repair stops taking
    // writes.
    assert_eq!(
        info.osd_addresses,
        vec!["osd-3:9090", "osd-1:9090", "osd-2:9090"]
    );
    assert_eq!(info.state, VolumeState::Closed);

    // The replacement really holds the bytes.
    let entry = cell.index.get_entry(&hash).await.unwrap().unwrap();
    let copied = cell.osds[3]
        .get_block(&hash, entry.bucket_id, volume_id)
        .await
        .unwrap();
    assert_eq!(copied, data);
    assert_eq!(cell.frontend.get(&hash).await.unwrap(), data);

    cell.stop().await;
}

#[tokio::test]
async fn repair_is_a_no_op_for_uninvolved_volumes() {
    let mut cell = TestCell::new(5, repair_config()).await;

    let hash = cell.frontend.put(b"placed on osd-0..2".to_vec()).await.unwrap();
    let volume_id = cell.table.list_volumes(None).await.unwrap()[0];

    // osd-4 dies; it never held the volume.
    for i in 0..4 {
        cell.spawn_heartbeat(i, Duration::from_millis(100));
    }
    cell.spawn_monitor();
    cell.osds[4].set_healthy(false);

    tokio::time::sleep(Duration::from_millis(1200)).await;

    let info = cell.table.get_volume(volume_id).await.unwrap().unwrap();
    assert_eq!(info.generation, 1, "membership must be untouched");
    assert_eq!(info.state, VolumeState::Open);
    assert!(cell.frontend.get(&hash).await.is_ok());

    cell.stop().await;
}

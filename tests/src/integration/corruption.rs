//! On-disk corruption: detected on read, quarantined, survived by failover.

use crate::harness::{small_config, TestCell};
use pocket_frontend::GetError;
use pocket_index::BlockIndexApi;
use pocket_osd::{ObjectStorageApi, OsdError};
use pocket_replication::ReplicationTableApi;

#[tokio::test]
async fn corrupt_copy_detected_and_skipped() {
    let cell = TestCell::new(3, small_config()).await;
    let data = b"bytes that will rot on one disk".to_vec();
    let hash = cell.frontend.put(data.clone()).await.unwrap();
    let entry = cell.index.get_entry(&hash).await.unwrap().unwrap();
    let volume_id = cell
        .table
        .find_volume_for_bucket(entry.bucket_id)
        .await
        .unwrap()
        .unwrap();

    // Flip one byte of the copy on the first member.
    let path = cell
        .osd_dir(0)
        .join(&cell.config.cell_id)
        .join(entry.bucket_id.to_string())
        .join(hash.to_hex());
    let mut raw = std::fs::read(&path).unwrap();
    let mid = raw.len() / 2;
    raw[mid] ^= 0x40;
    std::fs::write(&path, &raw).unwrap();

    // Reading that daemon directly reports corruption, not bad bytes.
    let err = cell.osds[0]
        .get_block(&hash, entry.bucket_id, volume_id)
        .await
        .unwrap_err();
    assert!(matches!(err, OsdError::Corrupt(_)));

    // The frontend still serves the block from the other members.
    assert_eq!(cell.frontend.get(&hash).await.unwrap(), data);
}

#[tokio::test]
async fn all_copies_corrupt_is_unavailable_not_wrong() {
    let cell = TestCell::new(3, small_config()).await;
    let data = b"every copy rots".to_vec();
    let hash = cell.frontend.put(data.clone()).await.unwrap();
    let entry = cell.index.get_entry(&hash).await.unwrap().unwrap();

    for i in 0..3 {
        let path = cell
            .osd_dir(i)
            .join(&cell.config.cell_id)
            .join(entry.bucket_id.to_string())
            .join(hash.to_hex());
        let mut raw = std::fs::read(&path).unwrap();
        raw[0] ^= 0xff;
        std::fs::write(&path, &raw).unwrap();
    }

    let err = cell.frontend.get(&hash).await.unwrap_err();
    assert!(matches!(err, GetError::BlockUnavailable(_)));
}

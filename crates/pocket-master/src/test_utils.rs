//! Test fixtures: an in-memory replication table and canned volume
//! managers for exercising planning and repair without storage daemons.

use async_trait::async_trait;
use parking_lot::Mutex;
use pocket_replication::{ReplicationTable, ReplicationTableApi};
use pocket_volman::{VolumeManagerApi, VolumeManagerError};
use shared_types::{BlockHash, InMemoryKvStore};
use std::sync::Arc;
use uuid::Uuid;

pub fn test_table() -> Arc<dyn ReplicationTableApi> {
    Arc::new(ReplicationTable::new(
        Arc::new(InMemoryKvStore::new()),
        1024 * 1024,
    ))
}

/// `(volume, bucket, target)` triples seen by `copy_volume`.
pub type CopyCalls = Arc<Mutex<Vec<(Uuid, Uuid, String)>>>;

struct CannedVolman {
    calls: CopyCalls,
    fail_copies: bool,
}

#[async_trait]
impl VolumeManagerApi for CannedVolman {
    async fn copy_volume(
        &self,
        volume_id: Uuid,
        bucket_id: Uuid,
        _source_osds: &[String],
        target_osd: &str,
    ) -> Result<(), VolumeManagerError> {
        self.calls
            .lock()
            .push((volume_id, bucket_id, target_osd.to_string()));
        if self.fail_copies {
            return Err(VolumeManagerError::SourceUnavailable(volume_id.to_string()));
        }
        Ok(())
    }

    async fn erasure_encode_volume(
        &self,
        _volume_id: Uuid,
        _bucket_id: Uuid,
        _source_osds: &[String],
        _target_osds: &[String],
    ) -> Result<(), VolumeManagerError> {
        Ok(())
    }

    async fn reconstruct_block(
        &self,
        hash: &BlockHash,
        _bucket_id: Uuid,
        _volume_id: Uuid,
        _osd_addresses: &[String],
    ) -> Result<Vec<u8>, VolumeManagerError> {
        Err(VolumeManagerError::InsufficientShards {
            hash: hash.to_hex(),
            available: 0,
            needed: 1,
        })
    }
}

pub fn recording_volman() -> (Arc<dyn VolumeManagerApi>, CopyCalls) {
    let calls: CopyCalls = Arc::new(Mutex::new(Vec::new()));
    (
        Arc::new(CannedVolman {
            calls: calls.clone(),
            fail_copies: false,
        }),
        calls,
    )
}

pub fn failing_volman() -> Arc<dyn VolumeManagerApi> {
    Arc::new(CannedVolman {
        calls: Arc::new(Mutex::new(Vec::new())),
        fail_copies: true,
    })
}

pub fn stub_volman() -> Arc<dyn VolumeManagerApi> {
    recording_volman().0
}

//! Frontend construction and shared plumbing.

use pocket_index::BlockIndexApi;
use pocket_master::MasterApi;
use pocket_osd::OsdClientCache;
use pocket_replication::ReplicationTableApi;
use pocket_volman::VolumeManagerApi;
use shared_types::CellConfig;
use std::sync::Arc;

/// Client-facing coordinator for Put/Get.
pub struct Frontend {
    pub(crate) config: CellConfig,
    pub(crate) index: Arc<dyn BlockIndexApi>,
    pub(crate) table: Arc<dyn ReplicationTableApi>,
    pub(crate) master: Arc<dyn MasterApi>,
    pub(crate) osds: Arc<OsdClientCache>,
    pub(crate) volman: Arc<dyn VolumeManagerApi>,
}

impl Frontend {
    pub fn new(
        config: CellConfig,
        index: Arc<dyn BlockIndexApi>,
        table: Arc<dyn ReplicationTableApi>,
        master: Arc<dyn MasterApi>,
        osds: Arc<OsdClientCache>,
        volman: Arc<dyn VolumeManagerApi>,
    ) -> Self {
        Frontend {
            config,
            index,
            table,
            master,
            osds,
            volman,
        }
    }
}

//! Repair planning and execution after a daemon failure.

use crate::api::MasterError;
use crate::master::Master;
use pocket_replication::ReplicationTableApi;
use pocket_volman::VolumeManagerApi;
use shared_types::VolumeState;
use uuid::Uuid;

/// Repair work for a single volume that lost a replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeRepair {
    pub volume_id: Uuid,
    /// Surviving healthy members to read from.
    pub source_osds: Vec<String>,
    /// Healthy daemon that will take the lost replica.
    pub target_osd: String,
}

/// Everything to do about one failed daemon.
#[derive(Debug, Clone)]
pub struct RepairPlan {
    pub failed_osd: String,
    pub volumes: Vec<VolumeRepair>,
}

/// Outcome of executing a plan.
#[derive(Debug, Default)]
pub struct RepairReport {
    pub repaired: Vec<Uuid>,
    pub failed: Vec<(Uuid, String)>,
}

impl Master {
    /// Plan the repair of every replicated volume that counts `failed_osd`
    /// among its members.
    ///
    /// Sources are the surviving healthy members; the target is the first
    /// healthy daemon (lexicographically) not already in the volume.
    /// Volumes with no usable source or no available target are skipped
    /// with a warning; there is nothing safe to do for them here.
    pub async fn build_repair_plan(&self, failed_osd: &str) -> Result<RepairPlan, MasterError> {
        let healthy = self.healthy_snapshot();
        if healthy.is_empty() {
            return Err(MasterError::NoHealthyOsds);
        }

        let mut volumes = Vec::new();
        for volume_id in self.table.list_volumes(Some(&self.cell_id)).await? {
            let Some(info) = self.table.get_volume(volume_id).await? else {
                continue;
            };
            if !info.osd_addresses.iter().any(|a| a == failed_osd) {
                continue;
            }
            if info.state == VolumeState::ErasureCoded {
                // Shard loss is absorbed by parity; replica copy does not apply.
                tracing::debug!("[master] skipping ec volume {volume_id} in repair plan");
                continue;
            }

            let source_osds: Vec<String> = info
                .osd_addresses
                .iter()
                .filter(|a| *a != failed_osd && healthy.contains(*a))
                .cloned()
                .collect();
            if source_osds.is_empty() {
                tracing::warn!(
                    "[master] volume {volume_id} has no healthy surviving replica, cannot repair"
                );
                continue;
            }

            let Some(target_osd) = healthy
                .iter()
                .find(|a| !info.osd_addresses.contains(*a))
                .cloned()
            else {
                tracing::warn!(
                    "[master] no healthy osd outside volume {volume_id}, cannot repair"
                );
                continue;
            };

            volumes.push(VolumeRepair {
                volume_id,
                source_osds,
                target_osd,
            });
        }

        Ok(RepairPlan {
            failed_osd: failed_osd.to_string(),
            volumes,
        })
    }

    /// Execute the repair of one failed daemon.
    ///
    /// Per-volume: copy every bucket to the target, then commit the new
    /// membership at `generation + 1`. Open volumes are closed by the same
    /// commit; a volume under repair stops taking writes. Failures are
    /// collected, not fatal: the rest of the plan still runs.
    pub async fn repair_osd(&self, failed_osd: &str) -> Result<RepairReport, MasterError> {
        let plan = self.build_repair_plan(failed_osd).await?;
        let mut report = RepairReport::default();

        for repair in &plan.volumes {
            match self.repair_volume(&plan.failed_osd, repair).await {
                Ok(()) => report.repaired.push(repair.volume_id),
                Err(e) => {
                    tracing::error!(
                        "[master] repair of volume {} failed: {e}",
                        repair.volume_id
                    );
                    report.failed.push((repair.volume_id, e.to_string()));
                }
            }
        }

        Ok(report)
    }

    async fn repair_volume(
        &self,
        failed_osd: &str,
        repair: &VolumeRepair,
    ) -> Result<(), MasterError> {
        for bucket in self.table.list_buckets(repair.volume_id).await? {
            self.volman
                .copy_volume(
                    repair.volume_id,
                    bucket.bucket_id,
                    &repair.source_osds,
                    &repair.target_osd,
                )
                .await
                .map_err(|e| MasterError::Rebuild(e.to_string()))?;
        }

        // Re-read at commit time: the volume may have moved on since planning.
        let info = self
            .table
            .get_volume(repair.volume_id)
            .await?
            .ok_or(MasterError::VolumeNotFound(repair.volume_id))?;
        let members: Vec<String> = info
            .osd_addresses
            .iter()
            .map(|a| {
                if a == failed_osd {
                    repair.target_osd.clone()
                } else {
                    a.clone()
                }
            })
            .collect();
        let state = match info.state {
            VolumeState::Open => VolumeState::Closed,
            other => other,
        };
        self.table
            .update_volume(repair.volume_id, members, info.generation + 1, state)
            .await?;

        tracing::info!(
            "[master] volume {} rebuilt: {failed_osd} -> {}",
            repair.volume_id,
            repair.target_osd
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MasterApi;
    use crate::test_utils::{failing_volman, recording_volman, test_table};
    use shared_types::{BlockHash, CellConfig};
    use std::sync::Arc;

    async fn seed_volume(
        table: &Arc<dyn pocket_replication::ReplicationTableApi>,
        members: &[&str],
    ) -> Uuid {
        let volume_id = Uuid::new_v4();
        table
            .create_volume(
                volume_id,
                members.iter().map(|s| s.to_string()).collect(),
                "cell1",
            )
            .await
            .unwrap();
        // One bucket with one block so repair has something to copy.
        table
            .assign_block(volume_id, &BlockHash::digest(volume_id.as_bytes()), 10)
            .await
            .unwrap();
        volume_id
    }

    #[tokio::test]
    async fn test_plan_selects_survivors_and_lexicographic_target() {
        let table = test_table();
        let (volman, _calls) = recording_volman();
        let master = Master::new(
            &CellConfig::default().with_cell_id("cell1"),
            table.clone(),
            volman,
        );

        for osd in ["osd-a", "osd-b", "osd-c", "osd-e", "osd-d"] {
            master.register_osd(osd, "cell1", 100).await.unwrap();
        }
        let volume_id = seed_volume(&table, &["osd-a", "osd-b", "osd-c"]).await;
        master.trigger_repair("osd-a").await; // demotes osd-a

        let plan = master.build_repair_plan("osd-a").await.unwrap();
        assert_eq!(plan.volumes.len(), 1);
        let repair = &plan.volumes[0];
        assert_eq!(repair.volume_id, volume_id);
        assert_eq!(repair.source_osds, vec!["osd-b", "osd-c"]);
        // osd-d comes before osd-e; both are outside the volume.
        assert_eq!(repair.target_osd, "osd-d");
    }

    #[tokio::test]
    async fn test_plan_skips_unaffected_and_ec_volumes() {
        let table = test_table();
        let (volman, _calls) = recording_volman();
        let master = Master::new(
            &CellConfig::default().with_cell_id("cell1"),
            table.clone(),
            volman,
        );
        for osd in ["osd-a", "osd-b", "osd-c", "osd-d"] {
            master.register_osd(osd, "cell1", 100).await.unwrap();
        }

        let _unaffected = seed_volume(&table, &["osd-b", "osd-c", "osd-d"]).await;
        let ec = seed_volume(&table, &["osd-a", "osd-b", "osd-c"]).await;
        let info = table.get_volume(ec).await.unwrap().unwrap();
        table
            .update_volume(
                ec,
                info.osd_addresses,
                info.generation + 1,
                shared_types::VolumeState::ErasureCoded,
            )
            .await
            .unwrap();

        let plan = master.build_repair_plan("osd-a").await.unwrap();
        assert!(plan.volumes.is_empty());
    }

    #[tokio::test]
    async fn test_repair_commits_new_membership_and_generation() {
        let table = test_table();
        let (volman, calls) = recording_volman();
        let master = Master::new(
            &CellConfig::default().with_cell_id("cell1"),
            table.clone(),
            volman,
        );
        for osd in ["osd-a", "osd-b", "osd-c", "osd-d"] {
            master.register_osd(osd, "cell1", 100).await.unwrap();
        }
        let volume_id = seed_volume(&table, &["osd-a", "osd-b", "osd-c"]).await;
        master.trigger_repair("osd-a").await;

        let report = master.repair_osd("osd-a").await.unwrap();
        assert_eq!(report.repaired, vec![volume_id]);
        assert!(report.failed.is_empty());
        assert_eq!(calls.lock().len(), 1);

        let info = table.get_volume(volume_id).await.unwrap().unwrap();
        assert_eq!(info.generation, 2);
        // The failed member is substituted in place.
        assert_eq!(info.osd_addresses, vec!["osd-d", "osd-b", "osd-c"]);
        // A volume under repair stops taking writes.
        assert_eq!(info.state, shared_types::VolumeState::Closed);
    }

    #[tokio::test]
    async fn test_repair_swallows_per_volume_failures() {
        let table = test_table();
        let master = Master::new(
            &CellConfig::default().with_cell_id("cell1"),
            table.clone(),
            failing_volman(),
        );
        for osd in ["osd-a", "osd-b", "osd-c", "osd-d"] {
            master.register_osd(osd, "cell1", 100).await.unwrap();
        }
        let first = seed_volume(&table, &["osd-a", "osd-b", "osd-c"]).await;
        let second = seed_volume(&table, &["osd-a", "osd-c", "osd-d"]).await;
        master.trigger_repair("osd-a").await;

        let report = master.repair_osd("osd-a").await.unwrap();
        assert!(report.repaired.is_empty());
        assert_eq!(report.failed.len(), 2);
        for volume_id in [first, second] {
            let info = table.get_volume(volume_id).await.unwrap().unwrap();
            assert_eq!(info.generation, 1, "failed repair must not commit");
        }
    }

    #[tokio::test]
    async fn test_repair_without_any_healthy_osd() {
        let table = test_table();
        let (volman, _calls) = recording_volman();
        let master = Master::new(
            &CellConfig::default().with_cell_id("cell1"),
            table,
            volman,
        );
        let err = master.build_repair_plan("osd-a").await.unwrap_err();
        assert!(matches!(err, MasterError::NoHealthyOsds));
    }
}

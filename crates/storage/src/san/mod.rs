/*
 * SPDX-FileCopyrightText: Copyright (c) 2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
 * SPDX-License-Identifier: Apache-2.0
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 * http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! SAN LUN snapshots on VNX and Unity arrays.

pub mod navisec;
pub mod unity;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use litp::ModelApi;
use runtime::RunStateStore;
use runtime::state::SAN_LUNS_BKUP;
use serde::{Deserialize, Serialize};

use crate::errors::{StorageError, StorageResult};
use crate::tier::{SnapshotRecord, SnapshotTier, TierKind, report_problems};

pub use navisec::NaviSecCli;
pub use unity::UemCli;

/// Prefix of the snapshots the array takes of a LUN before restoring it.
pub const RESTORE_BACKUP_PREFIX: &str = "enm_upgrade_bkup";
pub const SNAPSHOT_DESCRIPTION: &str = "ENM_Upgrade_Snapshot";
/// LUNs that are never snapped.
pub const EXCLUDED_LUNS: [&str; 2] = ["elasticsearchdb", "versant_bur"];

const SYSTEMS: &str = "/infrastructure/systems";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SanType {
    Vnx,
    Unity,
}

impl FromStr for SanType {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        if lower.starts_with("vnx") {
            Ok(SanType::Vnx)
        } else if lower.starts_with("unity") {
            Ok(SanType::Unity)
        } else {
            Err(StorageError::adapter(TierKind::San, "san_type", format!("unsupported SAN type '{s}'")))
        }
    }
}

impl fmt::Display for SanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SanType::Vnx => "vnx",
            SanType::Unity => "unity",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lun {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LunSnapshot {
    pub name: String,
    /// Id of the LUN the snapshot was taken of.
    pub lun_id: String,
    pub created: Option<String>,
    pub state: Option<String>,
}

/// A LUN presented to a host through a storage group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostLun {
    pub hlu: u32,
    pub lun_id: String,
}

/// Array access details from the storage provider in the model.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanCredentials {
    pub san_type: SanType,
    pub spa_ip: String,
    pub spb_ip: Option<String>,
    pub username: String,
    pub password: String,
    pub pool: String,
}

impl fmt::Debug for SanCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SanCredentials")
            .field("san_type", &self.san_type)
            .field("spa_ip", &self.spa_ip)
            .field("spb_ip", &self.spb_ip)
            .field("username", &self.username)
            .field("pool", &self.pool)
            .finish()
    }
}

/// The array operations the snapshot tier needs.
#[async_trait]
pub trait SanApi: Send + Sync + fmt::Debug {
    fn san_type(&self) -> SanType;

    async fn list_luns(&self, pool: &str) -> StorageResult<Vec<Lun>>;

    async fn list_snaps(&self) -> StorageResult<Vec<LunSnapshot>>;

    async fn snap_create(&self, lun_id: &str, name: &str, description: &str) -> StorageResult<()>;

    /// Rolls the LUN back to `snap_name`. The array keeps the replaced
    /// content in a new snapshot called `backup_name`.
    async fn snap_restore(&self, lun_id: &str, snap_name: &str, backup_name: &str) -> StorageResult<()>;

    async fn snap_destroy(&self, snap_name: &str) -> StorageResult<()>;

    async fn lun_delete(&self, lun_id: &str) -> StorageResult<()>;

    /// LUNs presented through `group`, or `None` when the array has no
    /// such storage group.
    async fn storage_group_luns(&self, group: &str) -> StorageResult<Option<Vec<HostLun>>>;

    async fn storage_group_remove(&self, group: &str, hlus: &[u32]) -> StorageResult<()>;

    /// Active alerts of critical severity, one line each.
    async fn critical_alerts(&self) -> StorageResult<Vec<String>>;

    /// NAS servers among `names` running on a storage processor other than
    /// their home one.
    async fn unbalanced_nas_servers(&self, names: &[String]) -> StorageResult<Vec<String>>;
}

/// Builds the adapter for the array type.
pub fn san_adapter(credentials: SanCredentials, runner: Arc<dyn runtime::CommandRunner>) -> Arc<dyn SanApi> {
    match credentials.san_type {
        SanType::Vnx => Arc::new(NaviSecCli::new(credentials, runner)),
        SanType::Unity => Arc::new(UemCli::new(credentials, runner)),
    }
}

/// Snapshots of the LUNs presented to the deployment's blades.
#[derive(Debug, Clone)]
pub struct SanTier {
    api: Arc<dyn SanApi>,
    model: Arc<dyn ModelApi>,
    state: RunStateStore,
    pool: String,
    prefix: String,
    dps_uses_neo4j: bool,
}

impl SanTier {
    pub fn new(
        api: Arc<dyn SanApi>,
        model: Arc<dyn ModelApi>,
        state: RunStateStore,
        pool: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            api,
            model,
            state,
            pool: pool.into(),
            prefix: prefix.into(),
            dps_uses_neo4j: false,
        }
    }

    /// Versant LUNs are out of use, and not snapped, once the graph
    /// database has moved to Neo4j.
    pub fn with_dps_uses_neo4j(mut self, neo4j: bool) -> Self {
        self.dps_uses_neo4j = neo4j;
        self
    }

    pub fn snap_name(&self, lun_id: &str) -> String {
        format!("{}_{lun_id}", self.prefix)
    }

    /// LUN names of every `lun-disk` in the model.
    async fn modelled_lun_names(&self) -> StorageResult<Vec<String>> {
        Ok(litp::tree::items_by_type(self.model.as_ref(), SYSTEMS, "lun-disk", false)
            .await?
            .into_iter()
            .filter_map(|d| d.property("lun_name").map(str::to_string))
            .collect())
    }

    /// LUNs of the pool in scope, keyed by id. The LUN ids recorded at
    /// create time take precedence over the model so LUNs added since the
    /// snapshot are left alone.
    pub async fn snappable_luns(&self, for_remove: bool) -> StorageResult<BTreeMap<String, Lun>> {
        tracing::info!(target: "enminst::snapshots", pool = %self.pool, "building list of LUNs in the storage pool");
        let recorded: Option<Vec<String>> = self.state.load_json(SAN_LUNS_BKUP)?;
        let modelled = match recorded {
            Some(_) => Vec::new(),
            None => self.modelled_lun_names().await?,
        };
        let mut luns = BTreeMap::new();
        for lun in self.api.list_luns(&self.pool).await? {
            let in_scope = match &recorded {
                Some(ids) => ids.contains(&lun.id),
                None => modelled.contains(&lun.name),
            };
            if !in_scope || EXCLUDED_LUNS.iter().any(|x| lun.name.contains(x)) {
                continue;
            }
            if self.dps_uses_neo4j && !for_remove && lun.name.contains("versant") {
                tracing::info!(target: "enminst::snapshots", lun = %lun.name, "versant LUN not snappable as not in use");
                continue;
            }
            luns.insert(lun.id.clone(), lun);
        }
        Ok(luns)
    }

    /// Snapshots per LUN id, restricted to `luns` and to names starting
    /// with `prefix`. Every LUN gets an entry.
    async fn lun_snapshots(
        &self,
        luns: &BTreeMap<String, Lun>,
        prefix: &str,
    ) -> StorageResult<BTreeMap<String, Vec<LunSnapshot>>> {
        let mut out: BTreeMap<String, Vec<LunSnapshot>> =
            luns.keys().map(|id| (id.clone(), Vec::new())).collect();
        for snap in self.api.list_snaps().await? {
            if !snap.name.starts_with(prefix) {
                continue;
            }
            if let Some(entry) = out.get_mut(&snap.lun_id) {
                entry.push(snap);
            }
        }
        Ok(out)
    }

    async fn destroy_by_prefix(&self, luns: &BTreeMap<String, Lun>, prefix: &str) -> StorageResult<()> {
        tracing::info!(target: "enminst::snapshots", prefix, "looking for SAN snapshots to destroy");
        let snapshots = self.lun_snapshots(luns, prefix).await?;
        let mut failures = Vec::new();
        let mut destroyed = 0;
        for (lun_id, snaps) in &snapshots {
            let lun_name = luns.get(lun_id).map(|l| l.name.as_str()).unwrap_or_default();
            for snap in snaps {
                tracing::info!(target: "enminst::snapshots", snapshot = %snap.name, lun = %lun_id, lun_name, "destroying snapshot");
                match self.api.snap_destroy(&snap.name).await {
                    Ok(()) => destroyed += 1,
                    Err(e) => {
                        tracing::error!(target: "enminst::snapshots", snapshot = %snap.name, error = %e, "destroy snapshot failed");
                        failures.push(snap.name.clone());
                    }
                }
            }
        }
        if !failures.is_empty() {
            return Err(StorageError::adapter(
                TierKind::San,
                "destroy snapshot",
                failures.join(", "),
            ));
        }
        if destroyed == 0 {
            tracing::info!(target: "enminst::snapshots", "no SAN snapshots found to destroy");
        }
        Ok(())
    }

    /// Removes the snapshots the array took of each LUN while restoring it.
    pub async fn remove_restore_backups(&self) -> StorageResult<()> {
        let luns = self.snappable_luns(true).await?;
        self.destroy_by_prefix(&luns, RESTORE_BACKUP_PREFIX).await
    }

    /// Deletes a LUN. Refused while any snapshot of it remains.
    pub async fn delete_lun(&self, lun: &Lun) -> StorageResult<()> {
        let snaps: Vec<String> = self
            .api
            .list_snaps()
            .await?
            .into_iter()
            .filter(|s| s.lun_id == lun.id)
            .map(|s| s.name)
            .collect();
        if !snaps.is_empty() {
            return Err(StorageError::adapter(
                TierKind::San,
                format!("delete LUN {}", lun.name),
                format!("LUN still has snapshots {}", snaps.join(", ")),
            ));
        }
        tracing::info!(target: "enminst::snapshots", lun = %lun.name, "deleting LUN");
        self.api.lun_delete(&lun.id).await
    }

    /// Takes the LUNs of a blade that is gone from the deployment out of
    /// its storage group and deletes every one not listed in `keep`.
    /// Excluded LUNs stay. Returns the ids of the deleted LUNs.
    pub async fn scrub_blade_luns(&self, storage_group: &str, keep: &[String]) -> StorageResult<Vec<String>> {
        let Some(presented) = self.api.storage_group_luns(storage_group).await? else {
            tracing::warn!(target: "enminst::snapshots", storage_group, "storage group not defined on array");
            return Ok(Vec::new());
        };
        let hlus: Vec<u32> = presented.iter().map(|h| h.hlu).collect();
        if !hlus.is_empty() {
            self.api.storage_group_remove(storage_group, &hlus).await?;
        }
        let mut deleted = Vec::new();
        for lun in self.api.list_luns(&self.pool).await? {
            let presented_here = presented.iter().any(|h| h.lun_id == lun.id);
            if !presented_here || keep.contains(&lun.id) || EXCLUDED_LUNS.iter().any(|x| lun.name.contains(x)) {
                continue;
            }
            self.delete_lun(&lun).await?;
            deleted.push(lun.id);
        }
        Ok(deleted)
    }
}

#[async_trait]
impl SnapshotTier for SanTier {
    fn kind(&self) -> TierKind {
        TierKind::San
    }

    async fn create(&self) -> StorageResult<()> {
        let luns = self.snappable_luns(false).await?;
        if luns.is_empty() {
            return Err(StorageError::NothingToSnap {
                tier: TierKind::San,
                message: format!("no LUNs to snapshot in storage pool {}", self.pool),
            });
        }
        let existing: Vec<String> = self
            .lun_snapshots(&luns, &self.prefix)
            .await?
            .into_values()
            .flatten()
            .map(|s| s.name)
            .collect();
        if !existing.is_empty() {
            return Err(StorageError::SnapshotsExist {
                tier: TierKind::San,
                names: existing,
            });
        }
        for lun in luns.values() {
            let name = self.snap_name(&lun.id);
            tracing::info!(target: "enminst::snapshots", lun = %lun.id, lun_name = %lun.name, snapshot = %name, "creating LUN snapshot");
            self.api
                .snap_create(&lun.id, &name, SNAPSHOT_DESCRIPTION)
                .await?;
        }
        let ids: Vec<&String> = luns.keys().collect();
        self.state.save_json(SAN_LUNS_BKUP, &ids)?;
        Ok(())
    }

    async fn list(&self) -> StorageResult<Vec<SnapshotRecord>> {
        let luns = self.snappable_luns(false).await?;
        let snapshots = self.lun_snapshots(&luns, &self.prefix).await?;
        let mut records = Vec::new();
        for (lun_id, snaps) in snapshots {
            let expected = self.snap_name(&lun_id);
            for snap in snaps.into_iter().filter(|s| s.name == expected) {
                let mut record = SnapshotRecord::new(TierKind::San, lun_id.clone(), snap.name)
                    .with_created(snap.created.unwrap_or_default());
                if let Some(state) = snap.state {
                    record = record.with_state(state);
                }
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn validate(&self) -> StorageResult<()> {
        let luns = self.snappable_luns(false).await?;
        let snapshots = self.lun_snapshots(&luns, &self.prefix).await?;
        let mut problems = Vec::new();
        for (lun_id, snaps) in &snapshots {
            let lun_name = luns.get(lun_id).map(|l| l.name.as_str()).unwrap_or_default();
            let expected = self.snap_name(lun_id);
            if snaps.is_empty() {
                problems.push(format!(
                    "LUN {lun_id}/{lun_name} has no snapshot with the prefix \"{}\"",
                    self.prefix
                ));
            }
            for snap in snaps.iter().filter(|s| s.name != expected) {
                problems.push(format!(
                    "LUN {lun_id}/{lun_name} has a snapshot \"{}\" but expected one called \"{expected}\"",
                    snap.name
                ));
            }
        }
        report_problems(TierKind::San, problems)?;
        tracing::info!(target: "enminst::snapshots", pool = %self.pool, "all LUNs in storage pool have expected snapshots");
        Ok(())
    }

    async fn restore(&self) -> StorageResult<()> {
        let luns = self.snappable_luns(false).await?;
        let snapshots = self.lun_snapshots(&luns, &self.prefix).await?;
        for (lun_id, snaps) in &snapshots {
            let lun_name = luns.get(lun_id).map(|l| l.name.as_str()).unwrap_or_default();
            match snaps.len() {
                0 => {
                    return Err(StorageError::restore(
                        TierKind::San,
                        format!("No snapshot found on LUN {lun_name}"),
                    ));
                }
                1 => {}
                _ => {
                    return Err(StorageError::restore(
                        TierKind::San,
                        format!("More than one snapshot found on LUN {lun_name}"),
                    ));
                }
            }
        }
        tracing::info!(target: "enminst::snapshots", pool = %self.pool, "starting restore snapshot on LUNs");
        let mut failed = Vec::new();
        for (lun_id, snaps) in &snapshots {
            let Some(snap) = snaps.first() else {
                continue;
            };
            let lun_name = luns.get(lun_id).map(|l| l.name.as_str()).unwrap_or_default();
            tracing::info!(target: "enminst::snapshots", lun = %lun_id, lun_name, snapshot = %snap.name, "restoring LUN");
            let backup = format!("{RESTORE_BACKUP_PREFIX}_{lun_id}");
            if let Err(e) = self.api.snap_restore(lun_id, &snap.name, &backup).await {
                tracing::error!(target: "enminst::snapshots", lun = %lun_id, lun_name, error = %e, "restore LUN failed");
                failed.push(format!("{lun_id}/{lun_name}"));
            }
        }
        if !failed.is_empty() {
            return Err(StorageError::restore(
                TierKind::San,
                format!("LUN(s) {} could not be restored", failed.join(", ")),
            ));
        }
        tracing::info!(target: "enminst::snapshots", "SAN snapshot restore finished successfully");
        Ok(())
    }

    async fn remove(&self) -> StorageResult<()> {
        let luns = self.snappable_luns(true).await?;
        self.destroy_by_prefix(&luns, &self.prefix).await?;
        self.state.remove(SAN_LUNS_BKUP)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_san_type() {
        assert_eq!("VNX2".parse::<SanType>().unwrap(), SanType::Vnx);
        assert_eq!("unityxt".parse::<SanType>().unwrap(), SanType::Unity);
        assert!("netapp".parse::<SanType>().is_err());
    }

    #[test]
    fn test_credentials_hide_password() {
        let creds = SanCredentials {
            san_type: SanType::Vnx,
            spa_ip: "10.1.1.1".into(),
            spb_ip: None,
            username: "admin".into(),
            password: "secret".into(),
            pool: "ENM".into(),
        };
        assert!(!format!("{creds:?}").contains("secret"));
    }
}

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

//! LVM snapshots on peer nodes whose file systems live on local disks.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use litp::ModelApi;
use mco::{EnminstAgent, FileManagerAgent, Mco};
use model::item::{DeploymentItem, ItemState};
use model::lvm::{LV_COLUMNS, LogicalVolume};
use runtime::RunStateStore;
use runtime::state::NODE_VOL_BKUP;

use crate::errors::{StorageError, StorageResult};
use crate::lvm::{GRUB_FILES, LmsLvmTier, SnappableVolume};
use crate::tier::{LEGACY_SNAPSHOT_TAG, SNAPSHOT_TAG, SnapshotRecord, SnapshotTier, TierKind, report_problems};

/// Hostname to the volumes snapped on it.
pub type NodeVolumes = BTreeMap<String, Vec<SnappableVolume>>;

fn local_devices(node: &DeploymentItem) -> Vec<String> {
    node.child("system")
        .and_then(|s| s.child("disks"))
        .map(|disks| {
            disks
                .children
                .iter()
                .filter(|d| d.property("lun_name").is_none())
                .filter_map(|d| d.property("name").map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

// File systems with a snap size in every volume group built on a local disk.
fn local_volumes(node: &DeploymentItem, devices: &[String]) -> StorageResult<Vec<SnappableVolume>> {
    let mut volumes = Vec::new();
    let Some(groups) = node
        .child("storage_profile")
        .and_then(|p| p.child("volume_groups"))
    else {
        return Ok(volumes);
    };
    for vg in &groups.children {
        let on_local_disk = vg
            .child("physical_devices")
            .is_some_and(|pds| {
                pds.children
                    .iter()
                    .any(|pd| pd.property("device_name").is_some_and(|d| devices.iter().any(|l| l == d)))
            });
        if !on_local_disk {
            continue;
        }
        let vg_name = vg.require_property("volume_group_name")?;
        for fs in vg.child("file_systems").map(|f| f.children.as_slice()).unwrap_or_default() {
            let snap_size = fs.int_property("snap_size")?.unwrap_or(0);
            if snap_size <= 0 {
                continue;
            }
            let lv_name = format!("{}_{}", vg.id, fs.id);
            volumes.push(SnappableVolume {
                lv_path: format!("/dev/{vg_name}/{lv_name}"),
                lv_name,
                snap_size: snap_size.min(100) as u32,
            });
        }
    }
    Ok(volumes)
}

/// Node local volumes are snapped, merged and removed by the `enminst`
/// agent on each node; the grub configuration is saved beside the
/// snapshots through the `filemanager` agent.
#[derive(Debug, Clone)]
pub struct NodeLvmTier {
    enminst: EnminstAgent,
    files: FileManagerAgent,
    model: Arc<dyn ModelApi>,
    state: RunStateStore,
    prefix: String,
    tag: String,
    usage_tolerance: f64,
}

impl NodeLvmTier {
    pub fn new(mco: Mco, model: Arc<dyn ModelApi>, state: RunStateStore, prefix: impl Into<String>) -> Self {
        Self {
            enminst: EnminstAgent::new(mco.clone()),
            files: FileManagerAgent::new(mco),
            model,
            state,
            prefix: prefix.into(),
            tag: SNAPSHOT_TAG.to_string(),
            usage_tolerance: 90.0,
        }
    }

    pub fn with_usage_tolerance(mut self, tolerance: f64) -> Self {
        self.usage_tolerance = tolerance;
        self
    }

    /// Nodes using local disks for LVM, keyed by hostname. Nodes still in
    /// Initial are not deployed and are skipped.
    pub async fn node_volumes(&self) -> StorageResult<NodeVolumes> {
        let mut out = NodeVolumes::new();
        for node in litp::tree::cluster_nodes(self.model.as_ref())
            .await?
            .into_values()
            .flatten()
        {
            if node.state == ItemState::Initial {
                continue;
            }
            let devices = local_devices(&node);
            if devices.is_empty() {
                continue;
            }
            let hostname = node.property("hostname").unwrap_or(&node.id).to_string();
            out.insert(hostname, local_volumes(&node, &devices)?);
        }
        Ok(out)
    }

    fn backed_up(&self) -> StorageResult<Option<BTreeMap<String, Vec<String>>>> {
        Ok(self.state.load_json(NODE_VOL_BKUP)?)
    }

    async fn snapshots_on(&self, hosts: &[String]) -> StorageResult<BTreeMap<String, Vec<LogicalVolume>>> {
        let raw = self.enminst.lvs_list(hosts, LV_COLUMNS).await?;
        raw.into_iter()
            .map(|(host, out)| {
                let snaps = LogicalVolume::parse_output(&out)?
                    .into_iter()
                    .filter(|v| v.is_snapshot() && (v.has_tag(&self.tag) || v.has_tag(LEGACY_SNAPSHOT_TAG)))
                    .collect();
                Ok((host, snaps))
            })
            .collect()
    }

    // Copies between the live grub file and its saved copy on `hosts`,
    // trying each grub layout in turn.
    async fn copy_grub(&self, hosts: &[String], to_saved: bool) -> StorageResult<()> {
        let mut last = None;
        for (file, save) in GRUB_FILES {
            let (src, dest) = if to_saved { (file, save) } else { (save, file) };
            match self.files.copy(src, dest, hosts).await {
                Ok(()) => {
                    tracing::info!(target: "enminst::snapshots", nodes = hosts.len(), src, dest, "copied grub file");
                    return Ok(());
                }
                Err(e) => last = Some(e),
            }
        }
        match last {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    async fn grub_saved(&self, hosts: &[String]) -> BTreeMap<String, bool> {
        let mut found: BTreeMap<String, bool> = hosts.iter().map(|h| (h.clone(), false)).collect();
        for (_, save) in GRUB_FILES {
            match self.files.exists(save, hosts).await {
                Ok(result) => {
                    for (host, exists) in result {
                        if exists {
                            found.insert(host, true);
                        }
                    }
                }
                Err(e) => tracing::debug!(target: "enminst::snapshots", file = save, error = %e, "grub lookup failed"),
            }
        }
        found
    }
}

fn log_host_output(data: &BTreeMap<String, mco::HostData>) {
    for (host, reply) in data {
        for line in reply.out.lines().map(str::trim).filter(|l| !l.is_empty()) {
            tracing::info!(target: "enminst::snapshots", host = %host, "{line}");
        }
    }
}

#[async_trait]
impl SnapshotTier for NodeLvmTier {
    fn kind(&self) -> TierKind {
        TierKind::NodeLvm
    }

    async fn create(&self) -> StorageResult<()> {
        tracing::info!(target: "enminst::snapshots", "reading available node local logical volumes");
        let node_volumes = self.node_volumes().await?;
        if node_volumes.is_empty() {
            tracing::info!(target: "enminst::snapshots", "no node local logical volumes to snap");
            return Ok(());
        }
        let hosts: Vec<String> = node_volumes.keys().cloned().collect();
        let existing: Vec<String> = self
            .snapshots_on(&hosts)
            .await?
            .into_iter()
            .flat_map(|(host, snaps)| snaps.into_iter().map(move |s| format!("{host}:{}", s.lv_name)))
            .collect();
        if !existing.is_empty() {
            return Err(StorageError::SnapshotsExist {
                tier: TierKind::NodeLvm,
                names: existing,
            });
        }

        let mut snap_info = serde_json::Map::new();
        for (host, volumes) in &node_volumes {
            let entries: Vec<serde_json::Value> = volumes
                .iter()
                .map(|v| {
                    serde_json::json!({
                        "fs_snap_size": v.snap_size,
                        "lv_path": v.lv_path,
                        "lv_name": v.lv_name,
                        "snap_name": v.snap_name(&self.prefix),
                    })
                })
                .collect();
            snap_info.insert(host.clone(), serde_json::Value::Array(entries));
        }
        snap_info.insert("snap_tag".to_string(), serde_json::Value::String(self.tag.clone()));
        tracing::info!(target: "enminst::snapshots", nodes = hosts.len(), "creating node local snapshots");
        let output = self
            .enminst
            .create_lv_snapshots(&serde_json::Value::Object(snap_info), &hosts)
            .await?;
        log_host_output(&output);

        let names: BTreeMap<String, Vec<String>> = node_volumes
            .iter()
            .map(|(h, vols)| (h.clone(), vols.iter().map(|v| v.lv_name.clone()).collect()))
            .collect();
        self.state.save_json(NODE_VOL_BKUP, &names)?;
        self.copy_grub(&hosts, true).await
    }

    async fn list(&self) -> StorageResult<Vec<SnapshotRecord>> {
        let hosts: Vec<String> = match self.backed_up()? {
            Some(backup) => backup.into_keys().collect(),
            None => self.node_volumes().await?.into_keys().collect(),
        };
        if hosts.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .snapshots_on(&hosts)
            .await?
            .into_iter()
            .flat_map(|(host, snaps)| {
                snaps.into_iter().map(move |s| {
                    SnapshotRecord::new(TierKind::NodeLvm, s.origin.clone(), s.lv_name.clone())
                        .on_host(host.clone())
                        .with_created(s.lv_time.clone())
                        .with_usage(s.snap_percent)
                })
            })
            .collect())
    }

    async fn validate(&self) -> StorageResult<()> {
        let Some(backup) = self.backed_up()? else {
            tracing::info!(target: "enminst::snapshots", "no nodes using local storage were snapped");
            return Ok(());
        };
        if backup.is_empty() {
            return Ok(());
        }
        let hosts: Vec<String> = backup.keys().cloned().collect();
        let mut problems = Vec::new();
        let grub = self.grub_saved(&hosts).await;
        for host in &hosts {
            if grub.get(host).copied().unwrap_or(false) {
                tracing::info!(target: "enminst::snapshots", host, "grub file exists");
            } else {
                problems.push(format!("{host} : Grub file does not exist"));
            }
        }
        let snapshots = match self.snapshots_on(&hosts).await {
            Ok(s) => s,
            Err(StorageError::Mco(e)) if e.is_unreachable() => {
                problems.push(format!("Cannot read logical volumes: {e}"));
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };
        for (host, required) in &backup {
            let Some(snaps) = snapshots.get(host) else {
                problems.push(format!("{host} : Got no LV data from node"));
                continue;
            };
            problems.extend(LmsLvmTier::snapshot_problems(snaps, host, self.usage_tolerance));
            for volume in required {
                if !snaps.iter().any(|s| &s.origin == volume) {
                    problems.push(format!("{host} : Snapshot for volume {volume} not found"));
                }
            }
        }
        report_problems(TierKind::NodeLvm, problems)
    }

    async fn restore(&self) -> StorageResult<()> {
        let hosts: Vec<String> = match self.backed_up()? {
            Some(backup) => backup.into_keys().collect(),
            None => self.node_volumes().await?.into_keys().collect(),
        };
        if hosts.is_empty() {
            tracing::info!(target: "enminst::snapshots", "no node local snapshots to restore");
            return Ok(());
        }
        tracing::info!(target: "enminst::snapshots", nodes = hosts.len(), "restoring grub on nodes");
        self.copy_grub(&hosts, false).await?;
        tracing::info!(target: "enminst::snapshots", nodes = hosts.len(), "restoring LV snapshots on nodes");
        let output = self
            .enminst
            .restore_lv_snapshots(&self.tag, &hosts)
            .await
            .map_err(|e| StorageError::restore(TierKind::NodeLvm, e.to_string()))?;
        log_host_output(&output);
        Ok(())
    }

    async fn remove(&self) -> StorageResult<()> {
        let hosts: Vec<String> = self.node_volumes().await?.into_keys().collect();
        if hosts.is_empty() {
            tracing::info!(target: "enminst::snapshots", "no nodes using local storage");
            self.state.remove(NODE_VOL_BKUP)?;
            return Ok(());
        }
        let output = self.enminst.delete_lv_snapshots(&self.tag, &hosts).await?;
        log_host_output(&output);
        for (_, save) in GRUB_FILES {
            if let Err(e) = self.files.delete(save, &hosts).await {
                tracing::debug!(target: "enminst::snapshots", file = save, error = %e, "no saved grub file to delete");
            }
        }
        self.state.remove(NODE_VOL_BKUP)?;
        Ok(())
    }
}

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

//! Blade credentials read from the deployment model and the records kept
//! of them across a snapshot lifecycle.

use std::collections::BTreeMap;
use std::sync::Arc;

use litp::{ModelApi, PasswordStore, tree};
use model::blade::{BladeCredential, BladeInfo};
use model::item::{DeploymentItem, ItemState};
use runtime::RunStateStore;
use runtime::state::{BLADE_INFO, REMOVED_BLADES_INFO};

use crate::errors::SnapshotResult;

pub const INFRA_SYSTEMS: &str = "/infrastructure/systems";

#[derive(Debug, Clone)]
pub struct BladeInventory {
    model: Arc<dyn ModelApi>,
    passwords: Arc<dyn PasswordStore>,
    state: RunStateStore,
}

// Cluster and hostname of every deployed node, keyed by the system name
// of the blade it runs on.
fn placements(clusters: BTreeMap<String, Vec<DeploymentItem>>) -> BTreeMap<String, (String, String)> {
    let mut out = BTreeMap::new();
    for (cluster, nodes) in clusters {
        for node in nodes {
            let hostname = node.property("hostname").unwrap_or(&node.id).to_string();
            let system = node
                .child("system")
                .and_then(|s| s.property("system_name"))
                .unwrap_or(&node.id)
                .to_string();
            out.insert(system, (cluster.clone(), hostname));
        }
    }
    out
}

impl BladeInventory {
    pub fn new(model: Arc<dyn ModelApi>, passwords: Arc<dyn PasswordStore>, state: RunStateStore) -> Self {
        Self {
            model,
            passwords,
            state,
        }
    }

    fn credential(&self, bmc: &DeploymentItem, cluster: String, hostname: String) -> SnapshotResult<BladeCredential> {
        let username = bmc.require_property("username")?.to_string();
        let password = self
            .passwords
            .password(bmc.require_property("password_key")?, &username)?;
        Ok(BladeCredential {
            cluster,
            hostname,
            iloaddress: bmc.require_property("ipaddress")?.to_string(),
            username,
            password,
        })
    }

    /// Credentials of every blade in the model keyed by system name,
    /// leaving out the blades recorded as removed.
    pub async fn node_credentials(&self) -> SnapshotResult<BladeInfo> {
        let removed = self.removed_blades()?;
        let placed = placements(tree::cluster_nodes(self.model.as_ref()).await?);
        let blades = tree::items_by_type(self.model.as_ref(), INFRA_SYSTEMS, "blade", false).await?;
        let mut creds = BladeInfo::new();
        for blade in blades {
            let name = blade.property("system_name").unwrap_or(&blade.id).to_string();
            if removed.contains_key(&name) {
                continue;
            }
            let bmc = match blade.child("bmc") {
                Some(bmc) => bmc.clone(),
                None => self.model.get(&format!("{}/bmc", blade.path)).await?,
            };
            let (cluster, hostname) = placed
                .get(&name)
                .cloned()
                .unwrap_or_else(|| (String::new(), name.clone()));
            creds.insert(name, self.credential(&bmc, cluster, hostname)?);
        }
        tracing::debug!(target: "enminst::snapshots", blades = creds.len(), "node credentials built");
        Ok(creds)
    }

    /// Blades recorded when the snapshots were taken, if the record exists.
    pub fn snapshot_blades(&self) -> SnapshotResult<Option<BladeInfo>> {
        Ok(self.state.load_blade_info(BLADE_INFO)?)
    }

    pub fn write_blade_info(&self, creds: &BladeInfo) -> SnapshotResult<()> {
        self.state.save_blade_info(BLADE_INFO, creds)?;
        tracing::info!(target: "enminst::snapshots", path = %self.state.path(BLADE_INFO).display(), "blade info recorded");
        Ok(())
    }

    /// Blades removed by the upgrade that took the snapshots.
    pub fn removed_blades(&self) -> SnapshotResult<BladeInfo> {
        Ok(self
            .state
            .load_blade_info(REMOVED_BLADES_INFO)?
            .unwrap_or_default())
    }

    pub fn has_removed_blades(&self) -> bool {
        self.state.exists(REMOVED_BLADES_INFO)
    }

    /// Records the nodes the model is about to remove, with the BMC details
    /// needed to power them off after the model no longer knows them.
    pub async fn write_removed_blades(&self) -> SnapshotResult<BladeInfo> {
        let clusters = tree::cluster_nodes(self.model.as_ref()).await?;
        let deployments = self.model.get_tree(tree::DEPLOYMENTS).await?;
        let removed_clusters: Vec<String> = deployments
            .walk()
            .into_iter()
            .filter(|i| i.base_type() == "vcs-cluster" && i.state == ItemState::ForRemoval)
            .map(|i| i.id.clone())
            .collect();

        let mut removed = BladeInfo::new();
        for (cluster, nodes) in clusters {
            let whole_cluster = removed_clusters.contains(&cluster);
            for node in nodes {
                if !whole_cluster && node.state != ItemState::ForRemoval {
                    continue;
                }
                let bmc = self.model.get(&format!("{}/system/bmc", node.path)).await?;
                let hostname = node.property("hostname").unwrap_or(&node.id).to_string();
                let credential = self.credential(&bmc, cluster.clone(), hostname)?;
                removed.insert(node.id.clone(), credential);
            }
        }
        self.state.save_blade_info(REMOVED_BLADES_INFO, &removed)?;
        tracing::info!(target: "enminst::snapshots", blades = ?removed.keys().collect::<Vec<_>>(), "removed blades recorded");
        Ok(removed)
    }

    /// Drops both blade records. Returns whether anything was removed.
    pub fn clear(&self) -> SnapshotResult<bool> {
        let blade_info = self.state.remove(BLADE_INFO)?;
        let removed = self.state.remove(REMOVED_BLADES_INFO)?;
        Ok(blade_info || removed)
    }
}

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

//! VM provisioning check: the memory the new deployment description places
//! on each blade against what the blade has.

use std::collections::BTreeMap;

use litp::{ModelApi, tree};
use mco::{EnminstAgent, Mco};
use model::TableRow;
use model::item::ItemState;

use crate::errors::{UpgradeError, UpgradeResult};
use crate::xml::DeploymentDescription;

const SOFTWARE_SERVICES: &str = "/software/services/";

pub const USAGE_HEADERS: [&str; 7] = [
    "Cluster",
    "Node",
    "CPUs used",
    "CPU provision ratio",
    "RAM used (MB)",
    "RAM available (MB)",
    "State",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VmUsage {
    pub cpus: u64,
    pub ram_mb: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageState {
    Ok,
    OverProvisioned,
    /// The node is not deployed yet; nothing to measure.
    Initial,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BladeUsage {
    pub cluster: String,
    pub node: String,
    pub modelled: VmUsage,
    pub physical: Option<VmUsage>,
    pub state: UsageState,
}

impl TableRow for BladeUsage {
    fn cell(&self, column: &str) -> String {
        match column {
            "Cluster" => self.cluster.clone(),
            "Node" => self.node.clone(),
            "CPUs used" => self.modelled.cpus.to_string(),
            "CPU provision ratio" => match self.physical {
                Some(p) if p.cpus > 0 => format!("{:.2}", self.modelled.cpus as f64 / p.cpus as f64),
                _ => "-".to_string(),
            },
            "RAM used (MB)" => self.modelled.ram_mb.to_string(),
            "RAM available (MB)" => match self.physical {
                Some(p) if p.ram_mb > 0 => (p.ram_mb as i64 - self.modelled.ram_mb as i64).to_string(),
                _ => "-".to_string(),
            },
            "State" => match self.state {
                UsageState::Ok => "OK",
                UsageState::OverProvisioned => "NOK",
                UsageState::Initial => "Initial",
            }
            .to_string(),
            _ => String::new(),
        }
    }
}

/// `2048M` or `4G` in megabytes.
pub fn parse_ram(value: &str) -> Option<u64> {
    let value = value.trim();
    let (digits, factor) = match value.char_indices().last()? {
        (i, 'M' | 'm') => (&value[..i], 1),
        (i, 'G' | 'g') => (&value[..i], 1024),
        _ => (value, 1),
    };
    digits.parse::<u64>().ok().map(|v| v * factor)
}

/// Cluster to node to the summed VM usage of every service placed on it.
pub fn modelled_usage(dd: &DeploymentDescription) -> BTreeMap<String, BTreeMap<String, VmUsage>> {
    let mut out: BTreeMap<String, BTreeMap<String, VmUsage>> = BTreeMap::new();
    for vm in dd.items_of_type("vm-service").into_iter().filter(|v| !v.is_inherited()) {
        let (Some(cpus), Some(ram)) = (
            vm.property("cpus").and_then(|c| c.parse::<u64>().ok()),
            vm.property("ram").and_then(parse_ram),
        ) else {
            tracing::debug!(target: "enminst::upgrade", service = %vm.id, "vm-service without cpus or ram");
            continue;
        };
        let source = format!("{SOFTWARE_SERVICES}{}", vm.id);
        for cluster in dd.items_of_type("vcs-cluster") {
            for service in cluster.descendants_of_type("vcs-clustered-service") {
                let placed = service
                    .descendants_of_type("vm-service")
                    .iter()
                    .any(|i| i.source_path.as_deref() == Some(source.as_str()));
                if !placed {
                    continue;
                }
                let nodes = service.property("node_list").unwrap_or_default();
                for node in nodes.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                    let entry = out
                        .entry(cluster.id.clone())
                        .or_default()
                        .entry(node.to_string())
                        .or_default();
                    entry.cpus += cpus;
                    entry.ram_mb += ram;
                }
            }
        }
    }
    out
}

/// Compares the description's VM placement with the memory and cores the
/// deployed blades report. Fails when any deployed blade would have its
/// memory fully committed.
pub async fn check_provisioning(
    model: &dyn ModelApi,
    mco: &Mco,
    dd: &DeploymentDescription,
) -> UpgradeResult<Vec<BladeUsage>> {
    tracing::info!(target: "enminst::upgrade", description = %dd.source().display(), "checking predicted hardware provisions");
    let usage = modelled_usage(dd);
    let mut hostnames = dd.hostnames();
    let mut deployed: BTreeMap<String, bool> = BTreeMap::new();
    for node in tree::cluster_nodes(model).await?.into_values().flatten() {
        if let Some(h) = node.property("hostname") {
            hostnames.insert(node.id.clone(), h.to_string());
        }
        deployed.insert(node.id.clone(), node.state != ItemState::Initial);
    }

    let measured: Vec<String> = usage
        .values()
        .flat_map(|nodes| nodes.keys())
        .filter(|n| deployed.get(*n).copied().unwrap_or(false))
        .filter_map(|n| hostnames.get(n).cloned())
        .collect();
    let (mem, cores) = if measured.is_empty() {
        (BTreeMap::new(), BTreeMap::new())
    } else {
        let agent = EnminstAgent::new(mco.clone());
        (agent.get_mem(&measured).await?, agent.get_cores(&measured).await?)
    };

    let mut rows = Vec::new();
    for (cluster, nodes) in usage {
        for (node, modelled) in nodes {
            let live = deployed.get(&node).copied().unwrap_or(false);
            let physical = hostnames.get(&node).filter(|_| live).map(|h| VmUsage {
                cpus: cores.get(h).copied().unwrap_or(0),
                ram_mb: mem.get(h).copied().unwrap_or(0) / 1024,
            });
            let state = match physical {
                None => UsageState::Initial,
                Some(p) if modelled.ram_mb >= p.ram_mb => UsageState::OverProvisioned,
                Some(_) => UsageState::Ok,
            };
            rows.push(BladeUsage {
                cluster: cluster.clone(),
                node,
                modelled,
                physical,
                state,
            });
        }
    }

    let over: Vec<String> = rows
        .iter()
        .filter(|r| r.state == UsageState::OverProvisioned)
        .map(|r| r.node.clone())
        .collect();
    if !over.is_empty() {
        tracing::error!(target: "enminst::upgrade", nodes = %over.join(", "), "RAM over provisioned");
        return Err(UpgradeError::OverProvisioned { nodes: over });
    }
    tracing::info!(target: "enminst::upgrade", "hardware resources healthcheck completed");
    Ok(rows)
}

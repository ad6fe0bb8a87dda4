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

//! The modelled side of the VCS view: clusters, their systems and the
//! clustered services that become VCS service groups.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use litp::ModelApi;
use litp::tree;
use model::item::{DeploymentItem, ItemState};
use model::split_list_property;
use model::vcs::{AvailabilityType, vcs_group_name};

use crate::errors::VcsResult;
use crate::filter::{Pattern, matches, matches_any};

/// Fallbacks for services that do not model their own timeouts.
#[derive(Debug, Clone, Copy)]
pub struct VcsDefaults {
    pub timeout: Duration,
    pub retries: u32,
    pub nic_wait: Duration,
}

impl Default for VcsDefaults {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(600),
            retries: 3,
            nic_wait: Duration::from_secs(300),
        }
    }
}

impl VcsDefaults {
    pub fn from_config(config: &runtime::Config) -> Self {
        Self {
            timeout: config.vcs_default_timeout,
            retries: config.vcs_default_retries,
            nic_wait: config.nic_wait_timeout,
        }
    }
}

/// A clustered service as modelled.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelledGroup {
    pub cluster: String,
    pub service_id: String,
    pub vcs_name: String,
    pub state: ItemState,
    /// Hostnames in `node_list` order.
    pub systems: Vec<String>,
    pub avail: AvailabilityType,
    pub online_timeout: Duration,
    pub offline_timeout: Duration,
    pub online_retry: u32,
    pub offline_retry: u32,
    pub dependencies: Vec<String>,
    pub deactivated: bool,
}

impl ModelledGroup {
    /// Time allowed for the group to come online, over every retry.
    pub fn online_wait(&self) -> Duration {
        self.online_timeout * self.online_retry
    }

    pub fn offline_wait(&self) -> Duration {
        self.offline_timeout * self.offline_retry
    }

    fn from_item(
        cluster: &str,
        item: &DeploymentItem,
        aliases: &BTreeMap<String, String>,
        defaults: &VcsDefaults,
    ) -> VcsResult<Self> {
        let node_ids = split_list_property(item.property("node_list").unwrap_or_default());
        let systems: Vec<String> = node_ids
            .iter()
            .map(|id| aliases.get(id).cloned().unwrap_or_else(|| id.clone()))
            .collect();
        let active = item.int_property("active")?.unwrap_or(1);
        let standby = item.int_property("standby")?.unwrap_or(0);
        let seconds = |name: &str, default: Duration| -> VcsResult<Duration> {
            Ok(item
                .int_property(name)?
                .map(|s| Duration::from_secs(s.max(0) as u64))
                .unwrap_or(default))
        };
        let retries = |name: &str| -> VcsResult<u32> {
            Ok(item
                .int_property(name)?
                .map(|r| r.max(1) as u32)
                .unwrap_or(defaults.retries))
        };
        Ok(Self {
            cluster: cluster.to_string(),
            service_id: item.id.clone(),
            vcs_name: vcs_group_name(cluster, &item.id),
            state: item.state,
            avail: AvailabilityType::derive(active, standby, systems.len()),
            systems,
            online_timeout: seconds("online_timeout", defaults.timeout)?,
            offline_timeout: seconds("offline_timeout", defaults.timeout)?,
            online_retry: retries("online_retry")?,
            offline_retry: retries("offline_retry")?,
            dependencies: split_list_property(item.property("dependency_list").unwrap_or_default()),
            deactivated: item.property("deactivated") == Some("true"),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelledCluster {
    pub name: String,
    /// Hostnames, sorted.
    pub systems: Vec<String>,
    /// Model item state of each system's node.
    pub node_states: BTreeMap<String, ItemState>,
    /// Groups keyed by VCS name.
    pub groups: BTreeMap<String, ModelledGroup>,
}

impl ModelledCluster {
    pub fn is_initial(&self, system: &str) -> bool {
        self.node_states.get(system) == Some(&ItemState::Initial)
    }
}

/// Every modelled cluster, with node id to hostname aliases.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    pub clusters: BTreeMap<String, ModelledCluster>,
    pub aliases: BTreeMap<String, String>,
}

impl Inventory {
    pub async fn load(model: &dyn ModelApi, defaults: &VcsDefaults) -> VcsResult<Self> {
        let nodes = tree::cluster_nodes(model).await?;
        let services = tree::cluster_services(model).await?;
        let aliases: BTreeMap<String, String> = nodes
            .values()
            .flatten()
            .map(|n| (n.id.clone(), n.property("hostname").unwrap_or(&n.id).to_string()))
            .collect();

        let mut clusters = BTreeMap::new();
        for (name, cluster_nodes) in nodes {
            let mut cluster = ModelledCluster {
                name: name.clone(),
                ..Default::default()
            };
            for node in &cluster_nodes {
                let hostname = aliases.get(&node.id).cloned().unwrap_or_else(|| node.id.clone());
                cluster.node_states.insert(hostname.clone(), node.state);
                cluster.systems.push(hostname);
            }
            cluster.systems.sort();
            for item in services.get(&name).into_iter().flatten() {
                let group = ModelledGroup::from_item(&name, item, &aliases, defaults)?;
                cluster.groups.insert(group.vcs_name.clone(), group);
            }
            clusters.insert(name, cluster);
        }
        Ok(Self { clusters, aliases })
    }

    pub fn group(&self, cluster: &str, vcs_name: &str) -> Option<&ModelledGroup> {
        self.clusters.get(cluster)?.groups.get(vcs_name)
    }

    pub fn clusters_matching<'a>(
        &'a self,
        filter: Option<&'a Pattern>,
    ) -> impl Iterator<Item = &'a ModelledCluster> + 'a {
        self.clusters.values().filter(move |c| matches(filter, &c.name))
    }

    /// Groups matching the cluster, group and system filters, where the
    /// system filter matches any system the group can run on.
    pub fn groups_matching<'a>(
        &'a self,
        cluster: Option<&'a Pattern>,
        group: Option<&'a Pattern>,
        system: Option<&'a Pattern>,
    ) -> impl Iterator<Item = &'a ModelledGroup> + 'a {
        self.clusters_matching(cluster)
            .flat_map(|c| c.groups.values())
            .filter(move |g| matches(group, &g.vcs_name))
            .filter(move |g| matches_any(system, g.systems.iter().map(String::as_str)))
    }

    /// Every modelled system matching the filter, across all clusters.
    pub fn systems_matching(&self, filter: Option<&Pattern>) -> Vec<String> {
        let systems: BTreeSet<&String> = self
            .clusters
            .values()
            .flat_map(|c| c.systems.iter())
            .filter(|s| matches(filter, s))
            .collect();
        systems.into_iter().cloned().collect()
    }

    pub fn cluster_of(&self, system: &str) -> Option<&ModelledCluster> {
        self.clusters
            .values()
            .find(|c| c.systems.iter().any(|s| s == system))
    }
}

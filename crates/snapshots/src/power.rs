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

//! Power ordering for the nodes of a deployment and the BMC choreography
//! that follows it during a restore.
//!
//! [`PowerOrder`] is the only place that decides the order nodes go down
//! and come back up; [`NodePower`] carries that order out.

use std::collections::BTreeSet;
use std::time::Duration;

use bmc::{PowerChange, PowerDriver};
use model::blade::{BladeCredential, BladeInfo};
use runtime::WorkerPool;

use crate::errors::{SnapshotError, SnapshotResult};

/// Database nodes added by a cluster expansion. When they are not part of
/// the snapshot they go down first so the database cluster can drop their
/// fencing keys before the others stop.
pub const EXPANSION_DB_NODES: [&str; 2] = ["db-3", "db-4"];

pub fn is_db_node(node: &str) -> bool {
    node.starts_with("db-")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownOrder {
    /// Powered off one by one before the rest, followed by a settle wait.
    pub leading: Vec<String>,
    /// Powered off in parallel; database nodes are submitted first.
    pub rest: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartOrder {
    /// Database nodes, powered on one at a time.
    pub sequential: Vec<String>,
    /// Powered on after the start delay once `sequential` is up.
    pub deferred: Vec<String>,
    /// Everything else, powered on in parallel after the settle delay.
    pub parallel: Vec<String>,
    /// Nodes left off: removed blades, and blades added after the snapshot.
    pub excluded: Vec<String>,
}

impl StartOrder {
    pub fn is_empty(&self) -> bool {
        self.sequential.is_empty() && self.deferred.is_empty() && self.parallel.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerOrder {
    dps_uses_neo4j: bool,
}

impl PowerOrder {
    pub fn new(dps_uses_neo4j: bool) -> Self {
        Self { dps_uses_neo4j }
    }

    /// `nodes` is every blade to stop, removed blades included.
    /// `snapshot` is the blade list recorded when the snapshots were taken.
    pub fn shutdown(&self, nodes: &BladeInfo, snapshot: Option<&BladeInfo>) -> ShutdownOrder {
        let leading: Vec<String> = match snapshot {
            Some(snapped) => EXPANSION_DB_NODES
                .iter()
                .filter(|n| nodes.contains_key(**n) && !snapped.contains_key(**n))
                .map(|n| n.to_string())
                .collect(),
            None => Vec::new(),
        };
        let (mut rest, others): (Vec<String>, Vec<String>) = nodes
            .keys()
            .filter(|n| !leading.contains(n))
            .cloned()
            .partition(|n| is_db_node(n));
        rest.extend(others);
        ShutdownOrder { leading, rest }
    }

    /// `nodes` is every blade in the deployment. Removed blades and blades
    /// missing from `snapshot` are never powered on. On a large Neo4j
    /// deployment (one with db-3) db-2 is started last of the database
    /// nodes, after a delay.
    pub fn start(&self, nodes: &BladeInfo, snapshot: Option<&BladeInfo>, removed: &BladeInfo) -> StartOrder {
        let mut order = StartOrder::default();
        let candidates: BTreeSet<&String> = nodes
            .keys()
            .filter(|n| !removed.contains_key(*n))
            .filter(|n| snapshot.is_none_or(|s| s.contains_key(*n)))
            .collect();
        order.excluded = nodes
            .keys()
            .chain(removed.keys())
            .filter(|n| !candidates.contains(n))
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let large_neo4j = self.dps_uses_neo4j && candidates.iter().any(|n| n.as_str() == "db-3");
        for node in candidates {
            if large_neo4j && node.starts_with("db-2") {
                order.deferred.push(node.clone());
            } else if is_db_node(node) {
                order.sequential.push(node.clone());
            } else {
                order.parallel.push(node.clone());
            }
        }
        order
    }
}

/// Timings of the power choreography.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerTimings {
    /// How long a node may take to reach the requested state.
    pub transition: Duration,
    /// Wait after the leading nodes are off.
    pub removed_settle: Duration,
    /// Wait before the deferred database nodes start.
    pub deferred_start: Duration,
    /// Wait between the database nodes and the rest.
    pub settle: Duration,
}

impl Default for PowerTimings {
    fn default() -> Self {
        Self {
            transition: Duration::from_secs(60),
            removed_settle: Duration::from_secs(85),
            deferred_start: Duration::from_secs(300),
            settle: Duration::from_secs(30),
        }
    }
}

impl PowerTimings {
    pub fn from_config(config: &runtime::Config) -> Self {
        Self {
            transition: config.power_off_timeout,
            removed_settle: config.removed_blade_settle,
            deferred_start: config.start_nodes_sleep,
            settle: config.power_settle_delay,
        }
    }
}

/// Drives the BMCs of the nodes in the order given.
#[derive(Debug, Clone)]
pub struct NodePower {
    driver: PowerDriver,
    pool: WorkerPool,
    timings: PowerTimings,
}

impl NodePower {
    pub fn new(driver: PowerDriver, pool: WorkerPool, timings: PowerTimings) -> Self {
        Self { driver, pool, timings }
    }

    fn credential<'a>(creds: &'a BladeInfo, node: &str) -> SnapshotResult<&'a BladeCredential> {
        creds
            .get(node)
            .ok_or_else(|| SnapshotError::missing_bmc(node, "no credentials recorded"))
    }

    async fn off(&self, node: &str, creds: &BladeInfo) -> Result<(), String> {
        let credential = Self::credential(creds, node).map_err(|e| e.to_string())?;
        match self.driver.power_off(node, credential, self.timings.transition).await {
            Ok(PowerChange::Changed) => Ok(()),
            Ok(PowerChange::WasAlready) => {
                tracing::info!(target: "enminst::snapshots", node, "system is already powered off");
                Ok(())
            }
            Err(e) => {
                tracing::error!(target: "enminst::snapshots", node, error = %e, "power off failed");
                Err(format!("{node}: {e}"))
            }
        }
    }

    async fn on(&self, node: &str, creds: &BladeInfo, ignore_if_on: bool) -> Result<(), String> {
        let credential = Self::credential(creds, node).map_err(|e| e.to_string())?;
        match self
            .driver
            .power_on(node, credential, self.timings.transition, ignore_if_on)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::error!(target: "enminst::snapshots", node, error = %e, "power on failed");
                Err(format!("{node}: {e}"))
            }
        }
    }

    async fn parallel<F, Fut>(&self, nodes: &[String], action: &'static str, task: F) -> SnapshotResult<()>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<(), String>>,
    {
        let results = self.pool.run(nodes.iter().cloned(), task).await;
        let failures: Vec<String> = results.into_iter().filter_map(Result::err).collect();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(SnapshotError::Power { action, failures })
        }
    }

    /// Powers off a single node.
    pub async fn power_off_node(&self, node: &str, creds: &BladeInfo) -> SnapshotResult<()> {
        self.off(node, creds).await.map_err(|f| SnapshotError::Power {
            action: "Power off",
            failures: vec![f],
        })
    }

    /// Powers off every node of `order`. Every node must reach off.
    pub async fn shutdown(&self, order: &ShutdownOrder, creds: &BladeInfo) -> SnapshotResult<()> {
        if !order.leading.is_empty() {
            for node in &order.leading {
                tracing::info!(target: "enminst::snapshots", node = %node, "powering off expansion node not in the snapshot");
                self.power_off_node(node, creds).await?;
            }
            tracing::info!(target: "enminst::snapshots", "waiting until the DB cluster updates systems state");
            tokio::time::sleep(self.timings.removed_settle).await;
        }
        self.parallel(&order.rest, "Power off", |node| async move { self.off(&node, creds).await })
            .await?;
        tracing::info!(target: "enminst::snapshots", "all the nodes are shut down successfully");
        Ok(())
    }

    /// Powers on every node of `order`. A node that is already on fails
    /// the start unless `ignore_if_on` is set.
    pub async fn start(&self, order: &StartOrder, creds: &BladeInfo, ignore_if_on: bool) -> SnapshotResult<()> {
        let single = |f: String| SnapshotError::Power {
            action: "Power on",
            failures: vec![f],
        };
        for node in &order.sequential {
            self.on(node, creds, ignore_if_on).await.map_err(single)?;
        }
        if !order.deferred.is_empty() {
            tracing::info!(target: "enminst::snapshots", nodes = ?order.deferred, "pause before booting low start priority db nodes");
            tokio::time::sleep(self.timings.deferred_start).await;
            for node in &order.deferred {
                tracing::info!(target: "enminst::snapshots", node = %node, "booting low priority node");
                self.on(node, creds, ignore_if_on).await.map_err(single)?;
            }
        }
        if !order.parallel.is_empty() {
            tokio::time::sleep(self.timings.settle).await;
            self.parallel(&order.parallel, "Power on", |node| async move {
                self.on(&node, creds, ignore_if_on).await
            })
            .await?;
        }
        tracing::info!(target: "enminst::snapshots", "all the nodes are powered on successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blades(ids: &[&str]) -> BladeInfo {
        ids.iter()
            .map(|id| {
                (
                    id.to_string(),
                    BladeCredential {
                        cluster: String::new(),
                        hostname: id.to_string(),
                        username: "root".into(),
                        iloaddress: format!("ilo-{id}"),
                        password: "pw".into(),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_shutdown_puts_db_first() {
        let nodes = blades(&["svc-1", "db-1", "scp-1", "db-2"]);
        let order = PowerOrder::new(false).shutdown(&nodes, None);
        assert!(order.leading.is_empty());
        assert_eq!(order.rest, vec!["db-1", "db-2", "scp-1", "svc-1"]);
    }

    #[test]
    fn test_shutdown_leads_with_expansion_db_nodes_not_snapped() {
        let nodes = blades(&["db-1", "db-2", "db-3", "db-4", "svc-1"]);
        let snapped = blades(&["db-1", "db-2", "db-3", "svc-1"]);
        let order = PowerOrder::new(true).shutdown(&nodes, Some(&snapped));
        assert_eq!(order.leading, vec!["db-4"]);
        assert_eq!(order.rest, vec!["db-1", "db-2", "db-3", "svc-1"]);
    }

    #[test]
    fn test_start_defers_db2_on_large_neo4j() {
        let nodes = blades(&["db-1", "db-2", "db-3", "db-4", "svc-1", "svc-2"]);
        let order = PowerOrder::new(true).start(&nodes, None, &BladeInfo::new());
        assert_eq!(order.sequential, vec!["db-1", "db-3", "db-4"]);
        assert_eq!(order.deferred, vec!["db-2"]);
        assert_eq!(order.parallel, vec!["svc-1", "svc-2"]);

        let order = PowerOrder::new(false).start(&nodes, None, &BladeInfo::new());
        assert!(order.deferred.is_empty());
        assert_eq!(order.sequential, vec!["db-1", "db-2", "db-3", "db-4"]);
    }

    #[test]
    fn test_start_never_includes_removed_or_new_blades() {
        let nodes = blades(&["db-1", "db-2", "svc-1", "svc-4"]);
        let snapped = blades(&["db-1", "db-2", "svc-1", "svc-3"]);
        let removed = blades(&["svc-3"]);
        let order = PowerOrder::new(true).start(&nodes, Some(&snapped), &removed);
        assert_eq!(order.sequential, vec!["db-1", "db-2"]);
        assert!(order.deferred.is_empty(), "no db-3, so not a large deployment");
        assert_eq!(order.parallel, vec!["svc-1"]);
        assert_eq!(order.excluded, vec!["svc-3", "svc-4"]);
    }
}

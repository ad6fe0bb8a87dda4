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

//! Service group and system transitions.
//!
//! Every transition resolves its targets against the live `hagrp -state`
//! view of each matching cluster, issues the verb per target, then waits
//! for the target state on a bounded worker pool. Per target failures are
//! collected so one slow group does not hide the outcome of the others.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use litp::ModelApi;
use mco::{EnminstAgent, HostCode, Mco, McoError, StateRow, VcsCmdApiAgent};
use model::vcs::{AvailabilityType, ServiceState};
use once_cell::sync::Lazy;
use regex::Regex;
use runtime::{RuntimeContext, WorkerPool};

use crate::errors::{VcsError, VcsResult};
use crate::filter::{Pattern, matches};
use crate::inventory::{Inventory, ModelledCluster, ModelledGroup, VcsDefaults};

/// Groups bound to NICs are managed by VCS itself and never targeted.
pub const NIC_GROUP_PREFIX: &str = "Grp_NIC_";

static GROUP_CLUSTER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Grp_CS.(.*?)_cluster").expect("static regex is valid"));

/// Cluster filter derived from a group name such as
/// `Grp_CS_svc_cluster_msap`.
pub fn cluster_from_group(group: &str) -> Option<String> {
    GROUP_CLUSTER_RE
        .captures(group)
        .map(|caps| caps[1].to_string())
}

/// A live group instance on one system, joined with its model.
#[derive(Debug, Clone)]
pub struct ActionGroup {
    pub name: String,
    pub system: String,
    pub cluster: String,
    pub states: Vec<String>,
    pub model: ModelledGroup,
}

impl ActionGroup {
    pub fn state(&self) -> ServiceState {
        ServiceState::from_vcs(&self.states.join("|"))
    }

    /// Exactly ONLINE, no transitional modifiers.
    pub fn is_online(&self) -> bool {
        self.states.len() == 1 && self.state() == ServiceState::Online
    }

    pub fn is_offline(&self) -> bool {
        self.states.len() == 1 && self.state() == ServiceState::Offline
    }

    pub fn needs_clear(&self) -> bool {
        self.state().is_faulted()
    }

    pub fn avail(&self) -> AvailabilityType {
        self.model.avail
    }
}

// One wait-for-state to run on the pool.
#[derive(Debug, Clone)]
struct WaitTask {
    group: String,
    system: String,
    state: ServiceState,
    timeout: Duration,
    avail: AvailabilityType,
    cluster: String,
}

#[derive(Debug)]
struct WaitFailure {
    message: String,
    timed_out: bool,
    code: Option<HostCode>,
}

/// Entry point to the VCS control plane of a deployment.
#[derive(Debug, Clone)]
pub struct Vcs {
    pub(crate) model: Arc<dyn ModelApi>,
    pub(crate) mco: Mco,
    pub(crate) pool: WorkerPool,
    pub(crate) defaults: VcsDefaults,
    pub(crate) dps_uses_neo4j: bool,
}

impl Vcs {
    pub fn new(model: Arc<dyn ModelApi>, mco: Mco) -> Self {
        Self {
            model,
            mco,
            pool: WorkerPool::per_cpu(3),
            defaults: VcsDefaults::default(),
            dps_uses_neo4j: false,
        }
    }

    pub fn from_context(ctx: &RuntimeContext, model: Arc<dyn ModelApi>, mco: Mco) -> Self {
        Self::new(model, mco)
            .with_pool(ctx.worker_pool())
            .with_defaults(VcsDefaults::from_config(&ctx.config))
            .with_dps_uses_neo4j(ctx.platform.dps_uses_neo4j)
    }

    pub fn with_pool(mut self, pool: WorkerPool) -> Self {
        self.pool = pool;
        self
    }

    pub fn with_defaults(mut self, defaults: VcsDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_dps_uses_neo4j(mut self, neo4j: bool) -> Self {
        self.dps_uses_neo4j = neo4j;
        self
    }

    pub(crate) fn enminst(&self) -> EnminstAgent {
        EnminstAgent::new(self.mco.clone())
    }

    fn vcs_cmd(&self) -> VcsCmdApiAgent {
        VcsCmdApiAgent::new(self.mco.clone())
    }

    pub async fn inventory(&self) -> VcsResult<Inventory> {
        Inventory::load(self.model.as_ref(), &self.defaults).await
    }

    /// Live group instances matching the filters. A system filter of
    /// `any` selects every system.
    pub async fn action_groups(
        &self,
        group: Option<&Pattern>,
        system: Option<&Pattern>,
        cluster: Option<&Pattern>,
    ) -> VcsResult<Vec<ActionGroup>> {
        let inventory = self.inventory().await?;
        let clusters: Vec<&ModelledCluster> = inventory.clusters_matching(cluster).collect();
        if clusters.is_empty() {
            return Err(VcsError::ClusterNotFound(describe(cluster)));
        }
        let system = system.filter(|s| s.as_str() != "any");
        let selected: Vec<(&ModelledCluster, Vec<&String>)> = clusters
            .into_iter()
            .map(|c| (c, c.systems.iter().filter(|s| matches(system, s)).collect::<Vec<_>>()))
            .filter(|(_, systems)| !systems.is_empty())
            .collect();
        if selected.is_empty() {
            return Err(VcsError::SystemNotFound(describe(system)));
        }

        let mut found = Vec::new();
        for (modelled, systems) in selected {
            let Some(states) = self.live_group_states(modelled).await? else {
                tracing::warn!(target: "enminst::vcs", cluster = %modelled.name, "no system in cluster answered");
                continue;
            };
            for row in states {
                let Some(row_system) = row.system.as_ref() else {
                    continue;
                };
                if row.name.starts_with(NIC_GROUP_PREFIX)
                    || !matches(group, &row.name)
                    || !systems.contains(&row_system)
                {
                    continue;
                }
                let model = modelled
                    .groups
                    .get(&row.name)
                    .cloned()
                    .ok_or_else(|| VcsError::UnmodelledGroup(row.name.clone()))?;
                found.push(ActionGroup {
                    name: row.name.clone(),
                    system: row_system.clone(),
                    cluster: modelled.name.clone(),
                    states: row.states.clone(),
                    model,
                });
            }
        }
        if found.is_empty() {
            return Err(VcsError::GroupNotFound(describe(group)));
        }
        Ok(found)
    }

    // First system of the cluster that answers `hagrp -state`.
    async fn live_group_states(&self, cluster: &ModelledCluster) -> VcsResult<Option<Vec<StateRow>>> {
        for system in &cluster.systems {
            match self.enminst().hagrp_state(system).await {
                Ok(rows) => return Ok(Some(rows)),
                Err(e) if e.is_unreachable() => {
                    tracing::warn!(target: "enminst::vcs", system, error = %e, "system unavailable");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }

    async fn wait_state(&self, task: &WaitTask) -> Result<(), WaitFailure> {
        tracing::info!(
            target: "enminst::vcs",
            group = %task.group,
            state = %task.state,
            system = %task.system,
            timeout = ?task.timeout,
            "waiting for group state"
        );
        let started = Instant::now();
        match self
            .vcs_cmd()
            .hagrp_wait(&task.group, &task.system, task.state.as_str(), task.timeout)
            .await
        {
            Ok(()) => {
                tracing::info!(
                    target: "enminst::vcs",
                    group = %task.group,
                    state = %task.state,
                    system = %task.system,
                    taken = %humantime::format_duration(Duration::from_secs(started.elapsed().as_secs())),
                    "group reached state"
                );
                Ok(())
            }
            Err(e) => Err(wait_failure(task, &e)),
        }
    }

    async fn online_wait(&self, task: WaitTask) -> Result<(), WaitFailure> {
        let failure = match self.wait_state(&task).await {
            Ok(()) => return Ok(()),
            Err(failure) => failure,
        };
        // an active-standby group busy onlining elsewhere is fine once the
        // other side is up
        if task.avail == AvailabilityType::ActiveStandby
            && failure.code == Some(HostCode::BusyOnlining)
        {
            let exact = Pattern::exact(&task.group);
            let cluster = Pattern::exact(&task.cluster);
            if let Ok(groups) = self.action_groups(Some(&exact), None, Some(&cluster)).await
                && let Some(other) = groups.iter().find(|g| g.system != task.system && g.is_online())
            {
                tracing::warn!(target: "enminst::vcs", group = %task.group, system = %other.system, "group is already online");
                return Ok(());
            }
        }
        Err(failure)
    }

    async fn join_waits<F, Fut>(&self, operation: &'static str, mut failures: Vec<WaitFailure>, tasks: Vec<WaitTask>, wait: F) -> VcsResult<()>
    where
        F: FnMut(WaitTask) -> Fut,
        Fut: Future<Output = Result<(), WaitFailure>>,
    {
        let results = self.pool.run(tasks, wait).await;
        failures.extend(results.into_iter().filter_map(Result::err));
        if failures.is_empty() {
            return Ok(());
        }
        for failure in &failures {
            tracing::error!(target: "enminst::vcs", operation, "{}", failure.message);
        }
        Err(VcsError::OperationsFailed {
            operation,
            timed_out: failures.iter().any(|f| f.timed_out),
            failures: failures.into_iter().map(|f| f.message).collect(),
        })
    }

    /// Onlines the matching groups and waits for them to go ONLINE.
    ///
    /// An active-standby group with one side already ONLINE is left alone.
    /// FAULTED targets are cleared first with `autoclear`, otherwise they
    /// are reported as failures.
    pub async fn hagrp_online(
        &self,
        group: &Pattern,
        system: Option<&Pattern>,
        cluster: Option<&Pattern>,
        timeout: Option<Duration>,
        autoclear: bool,
    ) -> VcsResult<()> {
        let derived;
        let cluster = match cluster {
            Some(c) => Some(c),
            None => {
                derived = cluster_from_group(group.as_str()).map(|c| Pattern::new(&c)).transpose()?;
                derived.as_ref()
            }
        };
        let all = self.action_groups(Some(group), None, cluster).await?;
        let targets = online_targets(&all, system);
        if targets.is_empty() {
            tracing::info!(
                target: "enminst::vcs",
                "Found no groups to online (either filters are too restrictive or target groups are already ONLINE)."
            );
            return Ok(());
        }

        tracing::info!(target: "enminst::vcs", count = targets.len(), "onlining group(s)");
        let enminst = self.enminst();
        let mut failures = Vec::new();
        let mut tasks = Vec::new();
        for target in targets {
            if target.needs_clear() {
                if !autoclear {
                    failures.push(WaitFailure {
                        message: format!(
                            "Group {} on system {} needs to be cleared, state |{}|",
                            target.name,
                            target.system,
                            target.states.join(",")
                        ),
                        timed_out: false,
                        code: None,
                    });
                    continue;
                }
                tracing::info!(target: "enminst::vcs", group = %target.name, system = %target.system, "clearing group");
                enminst.hagrp_clear(&target.name, &target.system).await?;
            }
            tracing::info!(target: "enminst::vcs", group = %target.name, system = %target.system, "onlining group");
            let propagate = !target.model.dependencies.is_empty();
            match enminst
                .hagrp_online(&target.name, &target.system, propagate, &target.system)
                .await
            {
                Ok(_) => {}
                Err(e) if e.host_code() == Some(HostCode::AlreadyOnline) => {
                    tracing::warn!(target: "enminst::vcs", group = %target.name, "group is already online in cluster");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
            tasks.push(WaitTask {
                group: target.name.clone(),
                system: target.system.clone(),
                state: ServiceState::Online,
                timeout: effective_timeout(timeout, target.model.online_wait()),
                avail: target.avail(),
                cluster: target.cluster.clone(),
            });
        }
        self.join_waits("online", failures, tasks, |t| self.online_wait(t)).await
    }

    /// Offlines the matching groups and waits for them to go OFFLINE.
    pub async fn hagrp_offline(
        &self,
        group: &Pattern,
        system: Option<&Pattern>,
        cluster: Option<&Pattern>,
        timeout: Option<Duration>,
    ) -> VcsResult<()> {
        let targets: Vec<ActionGroup> = self
            .action_groups(Some(group), system, cluster)
            .await?
            .into_iter()
            .filter(|g| !g.is_offline())
            .collect();
        if targets.is_empty() {
            tracing::info!(
                target: "enminst::vcs",
                "Found no groups to offline (either filters are too restrictive or target groups are already OFFLINE)."
            );
            return Ok(());
        }

        tracing::info!(target: "enminst::vcs", count = targets.len(), "offlining group(s)");
        let enminst = self.enminst();
        let mut tasks = Vec::new();
        for target in targets {
            tracing::info!(target: "enminst::vcs", group = %target.name, system = %target.system, "offlining group");
            enminst
                .hagrp_offline(&target.name, &target.system, &target.system)
                .await?;
            tasks.push(WaitTask {
                group: target.name.clone(),
                system: target.system.clone(),
                state: ServiceState::Offline,
                timeout: effective_timeout(timeout, target.model.offline_wait()),
                avail: target.avail(),
                cluster: target.cluster.clone(),
            });
        }
        self.join_waits("offline", Vec::new(), tasks, |t| async move { self.wait_state(&t).await })
            .await
    }

    /// Offline then online of the same selection.
    pub async fn hagrp_restart(
        &self,
        group: &Pattern,
        system: Option<&Pattern>,
        cluster: Option<&Pattern>,
        timeout: Option<Duration>,
        autoclear: bool,
    ) -> VcsResult<()> {
        self.hagrp_offline(group, system, cluster, timeout).await?;
        self.hagrp_online(group, system, cluster, timeout, autoclear).await
    }

    /// Switches active-standby groups to their OFFLINE side.
    pub async fn hagrp_switch(
        &self,
        group: &Pattern,
        system: Option<&Pattern>,
        cluster: Option<&Pattern>,
        timeout: Option<Duration>,
    ) -> VcsResult<()> {
        let candidates = self.action_groups(Some(group), system, cluster).await?;
        let targets = switch_targets(candidates);
        if targets.is_empty() {
            tracing::info!(
                target: "enminst::vcs",
                "Found no groups to switch (either filters are too restrictive or no active-standby groups available to switch.)"
            );
            return Ok(());
        }

        tracing::info!(target: "enminst::vcs", count = targets.len(), "switching group(s)");
        let enminst = self.enminst();
        let mut failures = Vec::new();
        let mut tasks = Vec::new();
        for target in targets.into_values() {
            tracing::info!(target: "enminst::vcs", group = %target.name, system = %target.system, "switching group");
            if let Err(e) = enminst
                .hagrp_switch(&target.name, &target.system, &target.system)
                .await
            {
                failures.push(WaitFailure {
                    message: e.to_string(),
                    timed_out: false,
                    code: e.host_code(),
                });
                continue;
            }
            tasks.push(WaitTask {
                group: target.name.clone(),
                system: target.system.clone(),
                state: ServiceState::Online,
                timeout: timeout
                    .unwrap_or_else(|| target.model.offline_wait() + target.model.online_wait()),
                avail: target.avail(),
                cluster: target.cluster.clone(),
            });
        }
        self.join_waits("switch", failures, tasks, |t| async move { self.wait_state(&t).await })
            .await
    }

    /// Clears FAULTED instances of the matching groups.
    pub async fn hagrp_clear(
        &self,
        group: Option<&Pattern>,
        system: Option<&Pattern>,
        cluster: Option<&Pattern>,
    ) -> VcsResult<usize> {
        let enminst = self.enminst();
        let mut cleared = 0;
        for target in self.action_groups(group, system, cluster).await? {
            if !target.needs_clear() {
                continue;
            }
            tracing::info!(target: "enminst::vcs", group = %target.name, system = %target.system, "clearing group");
            enminst.hagrp_clear(&target.name, &target.system).await?;
            cleared += 1;
        }
        if cleared == 0 {
            tracing::info!(target: "enminst::vcs", "No groups needed clearing.");
        }
        Ok(cleared)
    }

    pub async fn freeze_group(&self, group: &Pattern, persistent: bool, system: Option<&Pattern>) -> VcsResult<()> {
        self.group_freeze(group, persistent, system, true).await
    }

    pub async fn unfreeze_group(&self, group: &Pattern, persistent: bool, system: Option<&Pattern>) -> VcsResult<()> {
        self.group_freeze(group, persistent, system, false).await
    }

    async fn group_freeze(
        &self,
        group: &Pattern,
        persistent: bool,
        system: Option<&Pattern>,
        freeze: bool,
    ) -> VcsResult<()> {
        if group.as_str().is_empty() {
            return Err(VcsError::usage("No group name/filter passed!"));
        }
        let enminst = self.enminst();
        let mut done: Vec<String> = Vec::new();
        for target in self.action_groups(Some(group), system, None).await? {
            if done.contains(&target.name) {
                continue;
            }
            let result = if freeze {
                tracing::info!(target: "enminst::vcs", group = %target.name, persistent, "freezing group");
                enminst.hagrp_freeze(&target.name, &target.system, persistent).await
            } else {
                tracing::info!(target: "enminst::vcs", group = %target.name, persistent, "unfreezing group");
                enminst.hagrp_unfreeze(&target.name, &target.system, persistent).await
            };
            result.inspect_err(|e| {
                tracing::error!(target: "enminst::vcs", group = %target.name, error = %e, freeze, "could not change group freeze")
            })?;
            done.push(target.name);
        }
        Ok(())
    }

    pub async fn freeze_system(&self, system: &Pattern, persistent: bool, evacuate: bool) -> VcsResult<()> {
        let enminst = self.enminst();
        for name in self.inventory().await?.systems_matching(Some(system)) {
            tracing::info!(target: "enminst::vcs", system = %name, persistent, evacuate, "freezing system");
            enminst.hasys_freeze(&name, persistent, evacuate).await?;
        }
        Ok(())
    }

    pub async fn unfreeze_system(&self, system: &Pattern, persistent: bool) -> VcsResult<()> {
        let enminst = self.enminst();
        for name in self.inventory().await?.systems_matching(Some(system)) {
            tracing::info!(target: "enminst::vcs", system = %name, persistent, "unfreezing system");
            enminst.hasys_unfreeze(&name, persistent).await?;
        }
        Ok(())
    }

    /// Locks the matching systems: failover groups are switched away and
    /// the system is frozen persistently. Frozen systems are refused and
    /// reported together after the others are locked.
    pub async fn lock(&self, system: &Pattern, switch_timeout: Option<Duration>) -> VcsResult<()> {
        let inventory = self.inventory().await?;
        let names = inventory.systems_matching(Some(system));
        if names.is_empty() {
            return Err(VcsError::SystemNotFound(system.as_str().to_string()));
        }
        let system_rows = self.system_status(None).await?;

        let vcs_cmd = self.vcs_cmd();
        let mut frozen = Vec::new();
        for name in names {
            let is_frozen = system_rows
                .iter()
                .find(|r| r.system == name)
                .is_some_and(|r| r.frozen.is_frozen());
            if is_frozen {
                tracing::error!(target: "enminst::vcs", system = %name, "cannot lock a frozen system");
                frozen.push(name);
                continue;
            }
            let switch_timeout = switch_timeout.unwrap_or_else(|| lock_switch_timeout(&inventory, &name));
            tracing::info!(target: "enminst::vcs", system = %name, switch_timeout = ?switch_timeout, "locking system");
            vcs_cmd.lock(&name, switch_timeout).await?;
        }
        if frozen.is_empty() {
            Ok(())
        } else {
            Err(VcsError::SystemsFrozen(frozen))
        }
    }

    pub async fn unlock(&self, system: &Pattern, nic_wait_timeout: Option<Duration>) -> VcsResult<()> {
        let names = self.inventory().await?.systems_matching(Some(system));
        if names.is_empty() {
            return Err(VcsError::SystemNotFound(system.as_str().to_string()));
        }
        let nic_wait = nic_wait_timeout.unwrap_or(self.defaults.nic_wait);
        let vcs_cmd = self.vcs_cmd();
        for name in names {
            tracing::info!(target: "enminst::vcs", system = %name, "unlocking system");
            vcs_cmd.unlock(&name, nic_wait).await?;
        }
        Ok(())
    }
}

fn describe(filter: Option<&Pattern>) -> String {
    filter.map(|f| f.as_str().to_string()).unwrap_or_else(|| "*".to_string())
}

// An override only ever extends the modelled wait.
fn effective_timeout(requested: Option<Duration>, modelled: Duration) -> Duration {
    requested.map_or(modelled, |t| t.max(modelled))
}

fn wait_failure(task: &WaitTask, error: &McoError) -> WaitFailure {
    let message = if error.is_wait_timeout() {
        format!("Timed out waiting for {} to go {}", task.group, task.state)
    } else {
        error.to_string()
    };
    WaitFailure {
        message,
        timed_out: error.is_wait_timeout(),
        code: error.host_code(),
    }
}

/// Chooses which instances to online. An active-standby group with an
/// ONLINE side yields nothing; otherwise its first OFFLINE side matching
/// the system filter. Other types yield every matching instance not
/// already ONLINE.
pub fn online_targets(all: &[ActionGroup], system: Option<&Pattern>) -> Vec<ActionGroup> {
    let mut by_group: BTreeMap<&str, Vec<&ActionGroup>> = BTreeMap::new();
    for group in all {
        by_group.entry(group.name.as_str()).or_default().push(group);
    }
    let mut targets = Vec::new();
    for instances in by_group.values() {
        let Some(first) = instances.first() else {
            continue;
        };
        if first.avail() == AvailabilityType::ActiveStandby {
            if instances.iter().any(|g| g.is_online()) {
                continue;
            }
            if let Some(target) = instances.iter().find(|g| matches(system, &g.system)) {
                targets.push((*target).clone());
            }
        } else {
            targets.extend(
                instances
                    .iter()
                    .filter(|g| matches(system, &g.system) && !g.is_online())
                    .map(|g| (*g).clone()),
            );
        }
    }
    targets
}

/// Active-standby groups with exactly one OFFLINE instance in the
/// selection, keyed by group, pointing at that instance.
pub fn switch_targets(candidates: Vec<ActionGroup>) -> BTreeMap<String, ActionGroup> {
    let mut targets = BTreeMap::new();
    let mut both_offline = Vec::new();
    for group in candidates {
        if group.avail() != AvailabilityType::ActiveStandby || !group.is_offline() {
            continue;
        }
        if targets.contains_key(&group.name) {
            tracing::info!(target: "enminst::vcs", group = %group.name, "cannot switch, not active anywhere in cluster");
            both_offline.push(group.name.clone());
            continue;
        }
        targets.insert(group.name.clone(), group);
    }
    for name in both_offline {
        targets.remove(&name);
    }
    targets
}

// Sum of the offline timeouts of every active-standby group that can run
// on the system being locked.
fn lock_switch_timeout(inventory: &Inventory, system: &str) -> Duration {
    inventory
        .clusters
        .values()
        .flat_map(|c| c.groups.values())
        .filter(|g| g.avail == AvailabilityType::ActiveStandby)
        .filter(|g| g.systems.iter().any(|s| s == system))
        .map(|g| g.offline_timeout)
        .sum()
}

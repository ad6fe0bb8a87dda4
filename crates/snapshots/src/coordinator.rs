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

//! Coordinates snapshot create, list, validate, remove and restore across
//! the storage tiers and the deployment model.

use std::sync::Arc;
use std::time::Duration;

use bmc::{BmcAdapter, PowerDriver};
use litp::{ModelApi, PasswordStore, PlanMonitor};
use mco::{Mco, PuppetAgent};
use model::blade::BladeInfo;
use runtime::state::SAN_LUNS_BKUP;
use runtime::{RunStateStore, RuntimeContext};
use storage::{
    LmsLvmTier, NasConsole, NasTier, NodeLvmTier, SanTier, SnapshotRecord, SnapshotTier, TierKind, san_adapter,
};

use crate::blades::BladeInventory;
use crate::discovery::{SanArray, StorageDiscovery};
use crate::errors::{SnapshotError, SnapshotResult};
use crate::power::{NodePower, PowerOrder, PowerTimings};
use crate::selector::SnapType;
use crate::services::{self, CONSUL, HTTPD, LmsServices, Neo4jHooks, PUPPET, PUPPETSERVER, RESTORE_STOPPED};

/// Name of the deployment model snapshot taken for an upgrade.
pub const DEPLOYMENT_SNAPSHOT: &str = "snapshot";

const PUPPET_POLL_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
struct SanHandle {
    tier: Arc<SanTier>,
    array: SanArray,
}

/// Everything `list` found, per tier.
#[derive(Debug, Clone, Default)]
pub struct SnapshotListing {
    pub tiers: Vec<(TierKind, Vec<SnapshotRecord>)>,
    pub deployment: Vec<String>,
}

impl SnapshotListing {
    pub fn is_empty(&self) -> bool {
        self.deployment.is_empty() && self.tiers.iter().all(|(_, r)| r.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotCoordinator {
    model: Arc<dyn ModelApi>,
    state: RunStateStore,
    tiers: Vec<Arc<dyn SnapshotTier>>,
    san: Option<SanHandle>,
    blades: BladeInventory,
    services: LmsServices,
    puppet: PuppetAgent,
    neo4j: Neo4jHooks,
    power: NodePower,
    order: PowerOrder,
    monitor: PlanMonitor,
    puppet_wait: Duration,
    deployment_snapshot: String,
    force: bool,
}

impl SnapshotCoordinator {
    /// A coordinator with no storage tiers; add them with
    /// [`Self::with_tier`] and [`Self::with_san`].
    pub fn new(
        ctx: &RuntimeContext,
        model: Arc<dyn ModelApi>,
        mco: Mco,
        bmc: Arc<dyn BmcAdapter>,
        passwords: Arc<dyn PasswordStore>,
    ) -> Self {
        let config = &ctx.config;
        let driver = PowerDriver::new(bmc).with_settle_delay(config.power_settle_delay);
        Self {
            state: ctx.state.clone(),
            tiers: Vec::new(),
            san: None,
            blades: BladeInventory::new(model.clone(), passwords, ctx.state.clone()),
            services: LmsServices::new(ctx.runner.clone()),
            puppet: PuppetAgent::new(mco),
            neo4j: Neo4jHooks::new(
                ctx.runner.clone(),
                config.neo4j_pre_snapshot_script.clone(),
                config.neo4j_post_remove_script.clone(),
            )
            .with_enabled(ctx.platform.dps_uses_neo4j),
            power: NodePower::new(driver, ctx.worker_pool(), PowerTimings::from_config(config)),
            order: PowerOrder::new(ctx.platform.dps_uses_neo4j),
            monitor: PlanMonitor::new(model.clone())
                .with_poll_interval(config.plan_poll_interval)
                .with_start_timeout(config.plan_start_timeout),
            puppet_wait: config.puppet_wait_timeout,
            deployment_snapshot: DEPLOYMENT_SNAPSHOT.to_string(),
            force: false,
            model,
        }
    }

    /// Builds the coordinator with every tier the deployment has: both LVM
    /// tiers always, the SAN and NAS tiers when the model describes them.
    pub async fn discover(
        ctx: &RuntimeContext,
        model: Arc<dyn ModelApi>,
        mco: Mco,
        bmc: Arc<dyn BmcAdapter>,
        passwords: Arc<dyn PasswordStore>,
        lvm_snap_percent: Option<u32>,
    ) -> SnapshotResult<Self> {
        let config = ctx.config.clone();
        let prefix = config.snapshot_prefix.clone();
        let discovery = StorageDiscovery::new(model.clone(), passwords.clone());
        let mut coordinator = Self::new(ctx, model.clone(), mco.clone(), bmc, passwords)
            .with_tier(Arc::new(
                LmsLvmTier::new(ctx.runner.clone(), model.clone(), ctx.state.clone(), prefix.clone())
                    .with_snap_percent(lvm_snap_percent)
                    .with_usage_tolerance(config.lvm_usage_tolerance),
            ))
            .with_tier(Arc::new(NodeLvmTier::new(
                mco,
                model.clone(),
                ctx.state.clone(),
                prefix.clone(),
            )));
        if let Some(array) = discovery.san().await? {
            let api = san_adapter(array.credentials.clone(), ctx.runner.clone());
            let tier = SanTier::new(api, model.clone(), ctx.state.clone(), array.credentials.pool.clone(), prefix.clone())
                .with_dps_uses_neo4j(ctx.platform.dps_uses_neo4j);
            coordinator = coordinator.with_san(Arc::new(tier), array);
        }
        if let Some(creds) = discovery.nas().await? {
            let pool = creds.pool.clone();
            let api = Arc::new(NasConsole::new(creds, ctx.runner.clone()));
            coordinator = coordinator.with_tier(Arc::new(NasTier::new(api, model, ctx.state.clone(), pool, prefix)));
        }
        Ok(coordinator)
    }

    pub fn with_tier(mut self, tier: Arc<dyn SnapshotTier>) -> Self {
        self.tiers.push(tier);
        self.tiers.sort_by_key(|t| t.kind());
        self
    }

    pub fn with_san(mut self, tier: Arc<SanTier>, array: SanArray) -> Self {
        self.san = Some(SanHandle {
            tier: tier.clone(),
            array,
        });
        self.with_tier(tier)
    }

    pub fn with_deployment_snapshot(mut self, name: impl Into<String>) -> Self {
        self.deployment_snapshot = name.into();
        self
    }

    /// Forces removal and restore of the deployment snapshot even when
    /// the model engine reports it as unusable.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn tier_kinds(&self) -> Vec<TierKind> {
        self.tiers.iter().map(|t| t.kind()).collect()
    }

    fn selected(&self, snap_type: SnapType) -> Vec<Arc<dyn SnapshotTier>> {
        self.tiers
            .iter()
            .filter(|t| snap_type.includes(t.kind()))
            .cloned()
            .collect()
    }

    fn tier(&self, kind: TierKind) -> Option<&Arc<dyn SnapshotTier>> {
        self.tiers.iter().find(|t| t.kind() == kind)
    }

    async fn restore_tier(&self, kind: TierKind) -> SnapshotResult<()> {
        if let Some(tier) = self.tier(kind) {
            tracing::info!(target: "enminst::snapshots", tier = %kind, "restoring snapshots");
            tier.restore().await?;
        }
        Ok(())
    }

    async fn has_deployment_snapshot(&self) -> SnapshotResult<bool> {
        Ok(self
            .model
            .list_snapshots()
            .await?
            .iter()
            .any(|s| *s == self.deployment_snapshot))
    }

    /// Takes snapshots of every selected tier, then of the deployment
    /// model. A second create while the snapshot indicator is present only
    /// validates.
    pub async fn create(&self, snap_type: SnapType) -> SnapshotResult<()> {
        if self.model.is_plan_running().await? {
            tracing::error!(target: "enminst::snapshots", "A plan is currently running, wait for it to complete before running a snapshot create");
            return Err(SnapshotError::PlanRunning);
        }
        tracing::info!(target: "enminst::snapshots", "no running plans found");

        if snap_type == SnapType::All && self.state.snapshot_indicator_exists() {
            tracing::info!(target: "enminst::snapshots", "snapshots already taken and valid, validating only");
            return self.validate(snap_type).await;
        }

        let tiers = self.selected(snap_type);
        let mut existing = Vec::new();
        for tier in &tiers {
            if tier.has_snapshots().await? {
                existing.push(tier.kind().to_string());
            }
        }
        let deployment = snap_type.includes_deployment();
        if deployment && self.has_deployment_snapshot().await? {
            if snap_type == SnapType::Litp {
                return Err(SnapshotError::DeploymentSnapshotExists(self.deployment_snapshot.clone()));
            }
            existing.push("deployment model".to_string());
        }
        if !existing.is_empty() {
            return Err(SnapshotError::SnapshotsExist { tiers: existing });
        }

        if !tiers.is_empty() {
            self.create_tiers(&tiers).await?;
        }
        if snap_type == SnapType::All {
            let creds = self.blades.node_credentials().await?;
            self.blades.write_blade_info(&creds)?;
        }
        if deployment {
            self.model.create_snapshot(&self.deployment_snapshot).await?;
            self.monitor.monitor(false).await?;
        }
        if snap_type == SnapType::All {
            self.state.create_snapshot_indicator()?;
        }
        tracing::info!(target: "enminst::snapshots", %snap_type, "ENM create_snapshot finished successfully");
        Ok(())
    }

    async fn create_tiers(&self, tiers: &[Arc<dyn SnapshotTier>]) -> SnapshotResult<()> {
        self.neo4j.pre_snapshot().await;
        self.services.stop(&[PUPPET]).await?;
        let result = async {
            services::wait_puppet_quiesced(&self.puppet, self.puppet_wait, PUPPET_POLL_INTERVAL).await?;
            for tier in tiers {
                tracing::info!(target: "enminst::snapshots", tier = %tier.kind(), "creating snapshots");
                tier.create().await?;
            }
            Ok::<_, SnapshotError>(())
        }
        .await;
        if let Err(e) = &result {
            tracing::error!(target: "enminst::snapshots", error = %e, "Create snapshot failed, run remove_snapshot before any subsequent attempt to create_snapshot");
            self.neo4j.post_remove().await;
        }
        let started = self.services.start(&[PUPPET]).await;
        result?;
        started
    }

    pub async fn list(&self, snap_type: SnapType) -> SnapshotResult<SnapshotListing> {
        let mut listing = SnapshotListing::default();
        for tier in self.selected(snap_type) {
            listing.tiers.push((tier.kind(), tier.list().await?));
        }
        if snap_type.includes_deployment() {
            listing.deployment = self.model.list_snapshots().await?;
        }
        Ok(listing)
    }

    pub async fn validate(&self, snap_type: SnapType) -> SnapshotResult<()> {
        for tier in self.selected(snap_type) {
            tier.validate().await?;
        }
        if snap_type.includes_deployment() {
            let snapshots = self.model.list_snapshots().await?;
            if snapshots.is_empty() {
                return Err(SnapshotError::NoDeploymentSnapshot);
            }
            if !snapshots.contains(&self.deployment_snapshot) {
                return Err(SnapshotError::NamedSnapshotMissing(self.deployment_snapshot.clone()));
            }
        }
        tracing::info!(target: "enminst::snapshots", %snap_type, "snapshots are valid");
        Ok(())
    }

    /// Removes the snapshots of every selected tier. A failing tier does
    /// not stop the others; the failures are reported together.
    pub async fn remove(&self, snap_type: SnapType) -> SnapshotResult<()> {
        let mut failures = Vec::new();
        for tier in self.selected(snap_type) {
            tracing::info!(target: "enminst::snapshots", tier = %tier.kind(), "removing snapshots");
            if let Err(e) = tier.remove().await {
                tracing::error!(target: "enminst::snapshots", tier = %tier.kind(), error = %e, "snapshot removal failed");
                failures.push(format!("{}: {e}", tier.kind()));
            }
        }
        if snap_type.includes(TierKind::San) && self.blades.has_removed_blades() {
            if let Err(e) = self.clean_removed_luns().await {
                failures.push(format!("removed blades: {e}"));
            }
        }
        if snap_type.includes_deployment() {
            let removed = async {
                if self.has_deployment_snapshot().await? {
                    self.model.remove_snapshot(&self.deployment_snapshot, self.force).await?;
                    self.monitor.monitor(false).await?;
                }
                Ok::<_, SnapshotError>(())
            }
            .await;
            if let Err(e) = removed {
                failures.push(format!("deployment model: {e}"));
            }
        }
        if snap_type == SnapType::All && failures.is_empty() {
            self.state.remove_snapshot_indicator()?;
            self.blades.clear()?;
        }
        self.neo4j.post_remove().await;
        if failures.is_empty() {
            tracing::info!(target: "enminst::snapshots", %snap_type, "ENM remove_snapshot finished successfully");
            Ok(())
        } else {
            tracing::error!(target: "enminst::snapshots", "Remove snapshot failed, run remove_snapshot again before any subsequent attempt to create_snapshot");
            Err(SnapshotError::Steps {
                operation: "Remove snapshot",
                failures,
            })
        }
    }

    // Blades removed by the upgrade keep their storage groups and LUNs on
    // the array until the snapshots are dropped.
    async fn clean_removed_luns(&self) -> SnapshotResult<()> {
        let Some(san) = &self.san else {
            return Ok(());
        };
        let removed = self.blades.removed_blades()?;
        for (node, cred) in &removed {
            let path = format!("/deployments/enm/clusters/{}/nodes/{node}", cred.cluster);
            if self.model.exists(&path).await? {
                continue;
            }
            let group = san.array.storage_group(&cred.cluster, node);
            match san.tier.scrub_blade_luns(&group, &[]).await {
                Ok(deleted) => {
                    tracing::info!(target: "enminst::snapshots", node = %node, luns = ?deleted, "removed blade LUNs deleted")
                }
                Err(e) => {
                    tracing::warn!(target: "enminst::snapshots", node = %node, error = %e, "The clean up of unused LUNs failed, please clean it manually")
                }
            }
            self.power.power_off_node(node, &removed).await?;
        }
        self.services.restart(HTTPD).await
    }

    /// Restores the deployment to its snapshots. Only a full restore or a
    /// restore of the deployment model alone is supported.
    pub async fn restore(&self, snap_type: SnapType) -> SnapshotResult<()> {
        if self.model.is_plan_running().await? {
            tracing::error!(target: "enminst::snapshots", "A plan is currently running, wait for it to complete before running a snapshot restore");
            return Err(SnapshotError::PlanRunning);
        }
        match snap_type {
            SnapType::All => {}
            SnapType::Litp => {
                self.validate(SnapType::Litp).await?;
                self.model.restore_snapshot(&self.deployment_snapshot, self.force).await?;
                self.monitor.monitor(false).await?;
                return Ok(());
            }
            other => {
                return Err(SnapshotError::usage(format!(
                    "restore of {other} snapshots alone is not supported, restore all or the deployment snapshot"
                )));
            }
        }
        let mut found = false;
        for tier in &self.tiers {
            found |= tier.has_snapshots().await?;
        }
        if !found {
            return Err(SnapshotError::NoStorageSnapshots);
        }
        self.validate(SnapType::All).await?;

        let result = self.restore_all().await;
        if let Err(e) = &result {
            if let Some(san) = &self.san {
                if let Err(cleanup) = san.tier.remove_restore_backups().await {
                    tracing::warn!(target: "enminst::snapshots", error = %cleanup, "removing restore backups failed");
                }
            }
            tracing::error!(target: "enminst::snapshots", error = %e, "Restore Snapshot Failed.");
        }
        result
    }

    async fn restore_all(&self) -> SnapshotResult<()> {
        let creds = self.blades.node_credentials().await?;
        let snapped = self.blades.snapshot_blades()?;
        let removed = self.blades.removed_blades()?;

        self.services.stop(&PUPPETSERVER).await?;
        self.restore_tier(TierKind::NodeLvm).await?;
        self.services.stop(&RESTORE_STOPPED).await?;
        self.services.manage("stop", &[CONSUL], true).await?;

        let mut to_stop = creds.clone();
        to_stop.extend(removed.clone());
        let shutdown = self.order.shutdown(&to_stop, snapped.as_ref());
        self.power.shutdown(&shutdown, &to_stop).await?;

        self.restore_tier(TierKind::San).await?;
        self.restore_tier(TierKind::Nas).await?;
        tracing::info!(target: "enminst::snapshots", name = %self.deployment_snapshot, "restoring deployment snapshot");
        self.model.restore_snapshot(&self.deployment_snapshot, self.force).await?;
        self.monitor.monitor(false).await?;

        if let Some(snapped) = &snapped {
            self.clean_expansion(&creds, snapped).await;
            self.blades.clear()?;
        }

        let start = self.order.start(&creds, snapped.as_ref(), &removed);
        if !start.excluded.is_empty() {
            tracing::info!(target: "enminst::snapshots", nodes = ?start.excluded, "not powering on blades outside the snapshot");
        }
        self.power.start(&start, &creds, false).await?;

        if let Some(san) = &self.san {
            san.tier.remove_restore_backups().await?;
        }
        self.restore_tier(TierKind::LmsLvm).await?;
        self.services.reboot().await
    }

    // Blades added after the snapshot lose the LUNs the snapshot does not
    // know about. Failures are left for manual clean up.
    async fn clean_expansion(&self, creds: &BladeInfo, snapped: &BladeInfo) {
        let Some(san) = &self.san else {
            return;
        };
        let keep: Vec<String> = match self.state.load_json::<Vec<String>>(SAN_LUNS_BKUP) {
            Ok(Some(ids)) => ids,
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(target: "enminst::snapshots", error = %e, "cannot read the LUN list, skipping expansion clean up");
                return;
            }
        };
        for (node, cred) in creds.iter().filter(|(n, _)| !snapped.contains_key(*n)) {
            let cluster = if cred.cluster.is_empty() {
                format!("{}_cluster", node.split('-').next().unwrap_or(node))
            } else {
                cred.cluster.clone()
            };
            let group = san.array.storage_group(&cluster, node);
            if let Err(e) = san.tier.scrub_blade_luns(&group, &keep).await {
                tracing::warn!(target: "enminst::snapshots", node = %node, error = %e, "The clean up of newly added LUNs failed, please clean it manually");
            }
        }
    }
}

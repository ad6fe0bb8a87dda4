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

//! The upgrade stage machine.
//!
//! A run either resumes a failed upgrade plan, picks up a plan that is still
//! running, or walks the standard path: checks, snapshots, OS patches, ISO
//! imports, model changes and the upgrade plan. Every path ends with the
//! post upgrade steps. The stage file records where a run stopped so the
//! next invocation knows which of those applies.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bmc::{BmcAdapter, PowerDriver};
use litp::{ModelApi, PasswordStore, PlanMonitor, PlanOptions};
use mco::{Mco, PuppetAgent};
use model::stage::{Stage, StageRecord, StageState};
use runtime::RuntimeContext;
use runtime::state::{MS_OS_PATCHED, PREVIOUS_XML, RUNTIME_XML};
use snapshots::{BladeInventory, NodePower, PowerOrder, PowerTimings, SnapType, SnapshotCoordinator, SnapshotError};
use storage::TierKind;
use vcs::{GroupFilter, Vcs};

use crate::args::UpgradeArgs;
use crate::dbgroups::is_rack;
use crate::errors::{UpgradeError, UpgradeResult};
use crate::gossip::{self, ConsulClient, GOSSIP_AFFECTED_CLUSTERS, GossipBounce, GossipTimings, JGROUPS_PROTOCOL_MIGRATION};
use crate::hardware::check_provisioning;
use crate::iso::{self, IsoImporter};
use crate::keys;
use crate::model_update::{self, INFRASTRUCTURE_CLUSTERS};
use crate::patching::{OsPatcher, handle_reboot};
use crate::paths::UpgradePaths;
use crate::post;
use crate::sed::{SiteParameters, WORKING_CFG, WorkingConfig, encrypt_passwords};
use crate::site_sync::sync_site_values;
use crate::xml::DeploymentDescription;

pub const ENM_DEPLOYMENT: &str = "/deployments/enm";
pub const VCS_CLUSTER_HEALTHCHECK: &str = "vcs_cluster_healthcheck";
pub const VCS_SERVICE_GROUP_HEALTHCHECK: &str = "vcs_service_group_healthcheck";

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeOutcome {
    Completed,
    /// The management server was patched and has to restart before the
    /// same command is run again.
    RebootPending,
    /// Site values were written to the model; no plan was run.
    ModelSynced,
}

enum StandardOutcome {
    Planned { gossip: bool },
    RebootPending,
}

pub struct UpgradeOrchestrator {
    ctx: RuntimeContext,
    model: Arc<dyn ModelApi>,
    mco: Mco,
    vcs: Vcs,
    snapshots: SnapshotCoordinator,
    blades: BladeInventory,
    power: NodePower,
    consul: ConsulClient,
    paths: UpgradePaths,
    monitor: PlanMonitor,
    gossip_timings: GossipTimings,
    import_poll: Option<Duration>,
}

impl UpgradeOrchestrator {
    pub fn new(
        ctx: RuntimeContext,
        model: Arc<dyn ModelApi>,
        mco: Mco,
        bmc: Arc<dyn BmcAdapter>,
        passwords: Arc<dyn PasswordStore>,
        snapshots: SnapshotCoordinator,
    ) -> Self {
        let config = ctx.config.clone();
        let driver = PowerDriver::new(bmc).with_settle_delay(config.power_settle_delay);
        Self {
            vcs: Vcs::from_context(&ctx, model.clone(), mco.clone()),
            blades: BladeInventory::new(model.clone(), passwords, ctx.state.clone()),
            power: NodePower::new(driver, ctx.worker_pool(), PowerTimings::from_config(&config)),
            consul: ConsulClient::from_config(&config),
            paths: UpgradePaths::default(),
            monitor: PlanMonitor::new(model.clone())
                .with_poll_interval(config.plan_poll_interval)
                .with_start_timeout(config.plan_start_timeout),
            gossip_timings: GossipTimings::from_config(&config),
            import_poll: None,
            snapshots,
            mco,
            model,
            ctx,
        }
    }

    pub fn with_paths(mut self, paths: UpgradePaths) -> Self {
        self.paths = paths;
        self
    }

    pub fn with_consul(mut self, consul: ConsulClient) -> Self {
        self.consul = consul;
        self
    }

    pub fn with_vcs(mut self, vcs: Vcs) -> Self {
        self.vcs = vcs;
        self
    }

    pub fn with_gossip_timings(mut self, timings: GossipTimings) -> Self {
        self.gossip_timings = timings;
        self
    }

    pub fn with_import_poll_interval(mut self, interval: Duration) -> Self {
        self.import_poll = Some(interval);
        self
    }

    /// Validates `args` and runs the upgrade. A resumed run replays the
    /// parameters persisted by the run that failed.
    pub async fn run(&self, args: &UpgradeArgs) -> UpgradeResult<UpgradeOutcome> {
        let state = &self.ctx.state;
        if args.resume {
            args.validate(&[])?;
            let persisted: Option<UpgradeArgs> = state.load_params()?;
            let args = UpgradeArgs {
                resume: true,
                ..persisted.unwrap_or_default()
            };
            return self.execute_stages(&args).await;
        }

        args.validate(&state.patch_markers()?)?;
        if args.is_internal_model() {
            return self.internal_model(args).await;
        }
        state.save_params(args)?;
        self.execute_stages(args).await
    }

    async fn internal_model(&self, args: &UpgradeArgs) -> UpgradeResult<UpgradeOutcome> {
        let Some(sed) = args.sed_file.as_deref() else {
            return Err(UpgradeError::usage("--internal_model_only requires --sed"));
        };
        let site = SiteParameters::load(&[sed])?;
        let updated = sync_site_values(self.model.as_ref(), &site).await?;
        tracing::info!(target: "enminst::upgrade", count = updated.len(), "site values synchronised to the model");
        Ok(UpgradeOutcome::ModelSynced)
    }

    async fn execute_stages(&self, args: &UpgradeArgs) -> UpgradeResult<UpgradeOutcome> {
        if args.is_model_only() {
            self.refresh_working_images()?;
        }

        let gossip = if args.resume {
            self.resume_plan().await?
        } else {
            let stage = self.ctx.state.stage()?;
            if stage.is_some_and(|r| r.is(Stage::UpgradePlan, StageState::Start)) && self.model.is_plan_running().await? {
                tracing::info!(target: "enminst::upgrade", "upgrade plan is still running, monitoring it");
                self.monitor_plan(Stage::UpgradePlan, false).await?;
                self.consul.is_set(JGROUPS_PROTOCOL_MIGRATION).await?
            } else {
                match self.standard(args, stage).await? {
                    StandardOutcome::RebootPending => return Ok(UpgradeOutcome::RebootPending),
                    StandardOutcome::Planned { gossip } => gossip,
                }
            }
        };

        if gossip {
            let rack = is_rack(self.model.as_ref()).await?;
            self.gossip_bounce(rack).complete(args.sed_file.as_deref()).await?;
        }
        post::post_upgrade(
            self.model.as_ref(),
            &self.vcs,
            self.ctx.runner.as_ref(),
            &self.paths,
            &self.ctx.state,
            self.ctx.platform.dps_uses_neo4j,
        )
        .await?;
        self.cleanup()?;
        tracing::info!(target: "enminst::upgrade", "ENM upgrade completed");
        Ok(UpgradeOutcome::Completed)
    }

    async fn resume_plan(&self) -> UpgradeResult<bool> {
        let stage = self.ctx.state.stage()?;
        let resumable = stage.is_some_and(|r| {
            r.is(Stage::UpgradePlan, StageState::Failed) || r.is(Stage::UpgradePlan, StageState::Start)
        });
        if !resumable {
            let recorded = stage.map_or_else(|| "no stage recorded".to_string(), |r| r.to_string());
            return Err(UpgradeError::ResumeState(recorded));
        }
        tracing::info!(target: "enminst::upgrade", "resuming the upgrade plan");
        self.persist(Stage::UpgradePlan, StageState::Start)?;
        if let Err(e) = self.model.run_plan(true).await {
            self.persist(Stage::UpgradePlan, StageState::Failed)?;
            return Err(e.into());
        }
        self.monitor_plan(Stage::UpgradePlan, true).await?;
        self.consul.is_set(JGROUPS_PROTOCOL_MIGRATION).await
    }

    async fn standard(&self, args: &UpgradeArgs, stage: Option<StageRecord>) -> UpgradeResult<StandardOutcome> {
        let retrying = stage.is_some_and(|r| r.is(Stage::UpgradePlan, StageState::Failed));
        let mut working = WorkingConfig::open(self.ctx.state.path(WORKING_CFG))?;

        let description = match (args.model_xml.as_deref(), args.sed_file.as_deref()) {
            (Some(xml), Some(sed)) => Some(self.prepare_description(xml, sed, &mut working).await?),
            _ => None,
        };
        let mut gossip = false;
        if let Some(dd) = &description {
            model_update::check_node_counts(self.model.as_ref(), dd, self.ctx.confirm.as_ref(), args.expansion_upgrade)
                .await?;
            gossip = gossip::detect(self.model.as_ref(), dd, self.ctx.confirm.as_ref()).await?;
        }

        self.enable_puppet().await?;
        if args.disable_hc {
            tracing::warn!(target: "enminst::upgrade", "health checks disabled");
        } else {
            self.healthcheck(&args.disable_hcs).await?;
        }

        if let Some(dd) = &description {
            if !args.disable_hc {
                let usage = check_provisioning(self.model.as_ref(), &self.mco, dd).await?;
                tracing::info!(target: "enminst::upgrade", blades = usage.len(), "hardware provisioning checked");
            }
            self.infrastructure(dd).await?;
        }

        self.prepare_snapshot().await?;

        if args.regenerate_keys {
            keys::regenerate(self.ctx.runner.as_ref(), self.model.as_ref(), &self.paths, &mut working).await?;
        }

        if !args.os_patch.is_empty() {
            let patcher = OsPatcher::new(
                self.ctx.runner.as_ref(),
                &self.ctx.state,
                &self.paths,
                &self.ctx.platform.kernel_release,
            );
            if let Some(iso) = args.rhel7_9_iso.as_deref() {
                patcher.copy_rhel_iso(iso).await?;
            }
            let outcome = patcher.apply(&args.os_patch, args.model_xml.is_some()).await?;
            if outcome.reboot_required {
                let puppet = PuppetAgent::new(self.mco.clone());
                handle_reboot(
                    self.ctx.runner.as_ref(),
                    &puppet,
                    self.ctx.config.puppet_wait_timeout,
                    args.noreboot,
                )
                .await?;
                return Ok(StandardOutcome::RebootPending);
            }
        }

        self.enable_puppet().await?;

        if retrying {
            tracing::info!(target: "enminst::upgrade", "previous upgrade plan failed, recreating it without importing again");
        } else {
            self.import_software(args, &mut working).await?;
            if let (Some(xml), Some(_)) = (args.model_xml.as_deref(), args.sed_file.as_deref()) {
                // image names may have changed with the ENM ISO
                let dd = self.render_description(xml, &working)?;
                self.load_description(&dd).await?;
                self.remove_deleted_items().await?;
                if gossip {
                    gossip::prepare(self.model.as_ref(), &self.consul).await?;
                }
            }
        }

        let options = if gossip {
            PlanOptions::no_lock_tasks(GOSSIP_AFFECTED_CLUSTERS)
        } else {
            PlanOptions::default()
        };
        self.run_upgrade_plan(&options, gossip).await?;
        Ok(StandardOutcome::Planned { gossip })
    }

    // ---------------------------------------------------------------------
    // deployment description

    /// Merges the site parameters into the working copy, makes sure the VM
    /// key exists, encrypts the passwords and renders the description.
    async fn prepare_description(
        &self,
        xml: &Path,
        sed: &Path,
        working: &mut WorkingConfig,
    ) -> UpgradeResult<DeploymentDescription> {
        let state = &self.ctx.state;
        let runtime_xml = state.path(RUNTIME_XML);
        let previous_xml = state.path(PREVIOUS_XML);
        if runtime_xml.is_file() && !previous_xml.exists() {
            std::fs::copy(&runtime_xml, &previous_xml).map_err(|e| UpgradeError::io(&previous_xml, e))?;
        }

        let site = SiteParameters::load(&[sed])?;
        for (key, value) in site.iter() {
            working.set(key, value);
        }
        keys::ensure_vm_key(self.ctx.runner.as_ref(), &self.paths, working).await?;
        let encrypted = encrypt_passwords(self.ctx.runner.as_ref(), &site, &self.paths.passkey_dir).await?;
        for (key, value) in &encrypted {
            working.set(key, value);
        }
        working.save()?;
        self.render_description(xml, working)
    }

    fn render_description(&self, xml: &Path, working: &WorkingConfig) -> UpgradeResult<DeploymentDescription> {
        let runtime_xml = self.ctx.state.path(RUNTIME_XML);
        let params = SiteParameters::load(&[working.path()])?;
        params.substitute_file(xml, &runtime_xml)?;
        DeploymentDescription::load(&runtime_xml)
    }

    fn refresh_working_images(&self) -> UpgradeResult<()> {
        let repo = self.paths.yum_repo_root.join(iso::ENM_IMAGES);
        let images = iso::qcow2_images(&repo)?;
        let mut working = WorkingConfig::open(self.ctx.state.path(WORKING_CFG))?;
        working.set_images(images.iter().map(String::as_str));
        working.save()?;
        tracing::info!(target: "enminst::upgrade", repo = %repo.display(), count = images.len(), "working images refreshed from the repository");
        Ok(())
    }

    async fn remove_deleted_items(&self) -> UpgradeResult<()> {
        let previous = self.ctx.state.path(PREVIOUS_XML);
        if !previous.is_file() {
            tracing::info!(target: "enminst::upgrade", "no previous deployment description, nothing to remove");
            return Ok(());
        }
        let removed = model_update::remove_deleted_items(
            self.ctx.runner.as_ref(),
            self.model.as_ref(),
            &self.paths.diff_tool,
            &previous,
            &self.ctx.state.path(RUNTIME_XML),
        )
        .await?;
        tracing::info!(target: "enminst::upgrade", count = removed.len(), "model items removed");
        Ok(())
    }

    async fn load_description(&self, dd: &DeploymentDescription) -> UpgradeResult<()> {
        let document = std::fs::read_to_string(dd.source()).map_err(|e| UpgradeError::io(dd.source(), e))?;
        tracing::info!(target: "enminst::upgrade", description = %dd.source().display(), "loading deployment description");
        self.model.load_xml("/", &document, true).await?;
        model_update::verify_structure(self.model.as_ref(), dd).await
    }

    // ---------------------------------------------------------------------
    // infrastructure

    async fn infrastructure(&self, dd: &DeploymentDescription) -> UpgradeResult<()> {
        let changes = model_update::infrastructure_changes(self.model.as_ref(), dd).await?;
        if changes.is_empty() {
            tracing::info!(target: "enminst::upgrade", "no infrastructure changes");
            return Ok(());
        }
        let listing = self.snapshots.list(SnapType::All).await?;
        if self.ctx.state.snapshot_indicator_exists() || !listing.is_empty() {
            let mut tiers: Vec<String> = listing
                .tiers
                .iter()
                .filter(|(_, records)| !records.is_empty())
                .map(|(kind, _)| kind.to_string())
                .collect();
            if !listing.deployment.is_empty() {
                tiers.push("deployment model".to_string());
            }
            tracing::error!(target: "enminst::upgrade", "infrastructure changes cannot be applied while snapshots exist");
            return Err(SnapshotError::SnapshotsExist { tiers }.into());
        }

        model_update::apply_infrastructure_changes(self.model.as_ref(), &changes).await?;
        if !changes.plan_required {
            return Ok(());
        }
        let options = PlanOptions::no_lock_tasks(INFRASTRUCTURE_CLUSTERS);
        if self.model.create_plan_if_needed(&options).await? {
            self.start_plan(Stage::InfrastructurePlan).await?;
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // snapshots

    async fn prepare_snapshot(&self) -> UpgradeResult<()> {
        if self.ctx.platform.is_virtual() && !self.snapshots.tier_kinds().contains(&TierKind::San) {
            tracing::warn!(target: "enminst::upgrade", "no SAN on a virtual deployment, upgrade snapshots skipped");
            return Ok(());
        }
        if !self.ctx.state.snapshot_indicator_exists() {
            tracing::info!(target: "enminst::upgrade", "taking upgrade snapshots");
            self.snapshots.create(SnapType::All).await?;
        }
        self.snapshots
            .validate(SnapType::All)
            .await
            .map_err(|e| UpgradeError::InvalidSnapshots(e.to_string()))
    }

    // ---------------------------------------------------------------------
    // software

    async fn import_software(&self, args: &UpgradeArgs, working: &mut WorkingConfig) -> UpgradeResult<()> {
        let runner = self.ctx.runner.as_ref();
        let importer = match self.import_poll {
            Some(interval) => IsoImporter::new(runner, self.model.as_ref()).with_poll_interval(interval),
            None => IsoImporter::new(runner, self.model.as_ref()),
        };
        if let Some(iso) = args.litp_iso.as_deref() {
            importer.import_litp(iso).await?;
        }
        if let Some(iso) = args.enm_iso.as_deref() {
            importer.import_enm(iso, &self.ctx.platform.hostname, working).await?;
            let updated = model_update::update_vm_images(self.model.as_ref(), working).await?;
            tracing::info!(target: "enminst::upgrade", count = updated.len(), "VM image references updated");
        }
        if args.litp_iso.is_some() || args.enm_iso.is_some() || args.model_xml.is_some() {
            self.model.upgrade(ENM_DEPLOYMENT).await?;
        }
        Ok(())
    }

    async fn enable_puppet(&self) -> UpgradeResult<()> {
        PuppetAgent::new(self.mco.clone()).enable(&[]).await?;
        Ok(())
    }

    async fn healthcheck(&self, disabled: &[String]) -> UpgradeResult<()> {
        let skipped = |name: &str| disabled.iter().any(|d| d == name);
        if skipped(VCS_CLUSTER_HEALTHCHECK) {
            tracing::warn!(target: "enminst::upgrade", check = VCS_CLUSTER_HEALTHCHECK, "health check disabled");
        } else {
            self.vcs.verify_system_status(None).await?;
        }
        if skipped(VCS_SERVICE_GROUP_HEALTHCHECK) {
            tracing::warn!(target: "enminst::upgrade", check = VCS_SERVICE_GROUP_HEALTHCHECK, "health check disabled");
        } else {
            self.vcs.verify_group_status(&GroupFilter::new()).await?;
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // plans

    fn persist(&self, stage: Stage, state: StageState) -> UpgradeResult<()> {
        let record = StageRecord::new(stage, state);
        tracing::debug!(target: "enminst::upgrade", stage = %record, "stage recorded");
        self.ctx.state.set_stage(record)?;
        Ok(())
    }

    async fn monitor_plan(&self, stage: Stage, resume: bool) -> UpgradeResult<()> {
        match self.monitor.monitor(resume).await {
            Ok(()) => self.persist(stage, StageState::End),
            Err(e) => {
                self.persist(stage, StageState::Failed)?;
                Err(e.into())
            }
        }
    }

    async fn start_plan(&self, stage: Stage) -> UpgradeResult<()> {
        self.persist(stage, StageState::Start)?;
        if let Err(e) = self.model.run_plan(false).await {
            self.persist(stage, StageState::Failed)?;
            return Err(e.into());
        }
        self.monitor_plan(stage, false).await
    }

    async fn run_upgrade_plan(&self, options: &PlanOptions, gossip: bool) -> UpgradeResult<()> {
        match self.model.create_plan_if_needed(options).await {
            Ok(true) => self.start_plan(Stage::UpgradePlan).await,
            Ok(false) => {
                self.persist(Stage::UpgradePlan, StageState::End)?;
                Ok(())
            }
            Err(e) => {
                tracing::error!(target: "enminst::upgrade", error = %e, "upgrade plan creation failed");
                if !gossip {
                    tracing::info!(target: "enminst::upgrade", "restoring the model");
                    self.model.restore_model().await?;
                }
                Err(e.into())
            }
        }
    }

    // ---------------------------------------------------------------------
    // finish

    fn gossip_bounce(&self, rack: bool) -> GossipBounce<'_> {
        GossipBounce {
            model: self.model.as_ref(),
            vcs: &self.vcs,
            consul: &self.consul,
            runner: self.ctx.runner.as_ref(),
            blades: &self.blades,
            power: &self.power,
            order: PowerOrder::new(self.ctx.platform.dps_uses_neo4j),
            paths: &self.paths,
            timings: self.gossip_timings,
            dps_uses_neo4j: self.ctx.platform.dps_uses_neo4j,
            rack,
        }
    }

    fn cleanup(&self) -> UpgradeResult<()> {
        let state = &self.ctx.state;
        state.remove_snapshot_indicator()?;
        state.remove(MS_OS_PATCHED)?;
        state.remove(PREVIOUS_XML)?;
        Ok(())
    }
}

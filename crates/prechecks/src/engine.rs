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

//! Runs the requested prechecks in order and collects the report.

use std::sync::Arc;
use std::time::Duration;

use litp::{ModelApi, PasswordStore};
use mco::{EnminstAgent, Mco, PrecheckAgent};
use model::vcs::ServiceState;
use runtime::{CommandSpec, RuntimeContext};
use storage::SanApi;
use vcs::{ActionGroup, Pattern, Vcs};

use crate::action::{PrecheckAction, resolve};
use crate::errors::{PrecheckError, PrecheckResult};
use crate::locations::Locations;
use crate::report::{CheckOutcome, CheckResult, PrecheckReport};

pub const DB_CLUSTER: &str = "db_cluster";
pub const NON_DB_CLUSTERS: [&str; 3] = ["svc_cluster", "evt_cluster", "scp_cluster"];
pub const DEPLOYMENT_TYPE_ITEM: &str = "/software/items/config_manager/global_properties/enm_deployment_type";
const RACK_SUFFIX: &str = "ENM_On_Rack_Servers";
const ALL_SERVICES: &str = "[^\\s]+";

pub const ALL_PASSED: &str = "ALL UPGRADE PREREQUISITE CHECKS PASSED";

/// Group name pattern of a clustered service in a cluster. `None` matches
/// every clustered service of the cluster.
pub fn cs_group_pattern(cluster: &str, service: Option<&str>) -> String {
    let all = service.is_none();
    let service = service.unwrap_or(ALL_SERVICES);
    let mut pattern = format!("Grp_CS_{cluster}_");
    if all || service == "neo4j" {
        pattern.push_str("(sg_)?");
    }
    pattern.push_str(service);
    if all || service == "modeldeployment" {
        pattern.push_str("_cluster(ed)?");
    } else {
        pattern.push_str("_clustered");
    }
    pattern.push_str("_service");
    if all || matches!(service, "modeldeployment" | "versant") {
        pattern.push_str("(_1)?");
    }
    pattern
}

/// Waits around the reboot of a node with non multipathed volumes.
#[derive(Debug, Clone, Copy)]
pub struct RebootTimings {
    /// Slept before the node is probed.
    pub settle: Duration,
    /// Upper bound on waiting for the node to answer again.
    pub timeout: Duration,
    pub poll: Duration,
}

impl Default for RebootTimings {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(120),
            timeout: Duration::from_secs(600),
            poll: Duration::from_secs(5),
        }
    }
}

/// The precheck engine. Checks stop at the first failure so the report
/// carries at most one FAILED block.
#[derive(Debug, Clone)]
pub struct PrecheckEngine {
    pub(crate) ctx: RuntimeContext,
    pub(crate) model: Arc<dyn ModelApi>,
    pub(crate) passwords: Arc<dyn PasswordStore>,
    pub(crate) mco: Mco,
    pub(crate) vcs: Vcs,
    pub(crate) locations: Locations,
    pub(crate) http: reqwest::Client,
    pub(crate) san: Option<Arc<dyn SanApi>>,
    pub(crate) reboot: RebootTimings,
}

impl PrecheckEngine {
    pub fn new(
        ctx: RuntimeContext,
        model: Arc<dyn ModelApi>,
        passwords: Arc<dyn PasswordStore>,
        mco: Mco,
    ) -> PrecheckResult<Self> {
        let vcs = Vcs::from_context(&ctx, model.clone(), mco.clone());
        // iLO consoles answer with self signed certificates
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            ctx,
            model,
            passwords,
            mco,
            vcs,
            locations: Locations::default(),
            http,
            san: None,
            reboot: RebootTimings::default(),
        })
    }

    pub fn with_locations(mut self, locations: Locations) -> Self {
        self.locations = locations;
        self
    }

    pub fn with_vcs(mut self, vcs: Vcs) -> Self {
        self.vcs = vcs;
        self
    }

    /// Uses this SAN instead of the one described by the model.
    pub fn with_san(mut self, san: Arc<dyn SanApi>) -> Self {
        self.san = Some(san);
        self
    }

    pub fn with_reboot_timings(mut self, reboot: RebootTimings) -> Self {
        self.reboot = reboot;
        self
    }

    /// Runs the resolved actions, stopping at the first failure.
    pub async fn run(&self, requested: &[PrecheckAction]) -> PrecheckReport {
        let plan = resolve(requested);
        let mut report = PrecheckReport::default();
        for action in plan.actions {
            tracing::info!(target: "enminst::prechecks", "({action}) {} ...", action.heading());
            let result = match self.run_check(action).await {
                Ok(outcome) => CheckResult::from_outcome(action, outcome),
                Err(e) => CheckResult::from_error(action, &e),
            };
            for line in result.render() {
                if result.is_failed() {
                    tracing::error!(target: "enminst::prechecks", "{line}");
                } else {
                    tracing::info!(target: "enminst::prechecks", "{line}");
                }
            }
            let failed = result.is_failed();
            report.push(result);
            if failed {
                return report;
            }
        }
        if plan.summary {
            tracing::info!(target: "enminst::prechecks", "{ALL_PASSED}");
            report.summary = Some(ALL_PASSED.to_string());
        }
        report
    }

    pub async fn run_check(&self, action: PrecheckAction) -> PrecheckResult<CheckOutcome> {
        match action {
            PrecheckAction::StorageSetupCheck => self.storage_setup_check().await,
            PrecheckAction::SanAlertCheck => self.san_alert_check().await,
            PrecheckAction::CheckLvmConfNonDbNodes => self.check_lvm_conf_non_db_nodes().await,
            PrecheckAction::CheckGrubCfgLvs => self.check_grub_cfg_lvs().await,
            PrecheckAction::LitpModelSynchronizedCheck => self.model_synchronized_check().await,
            PrecheckAction::ElasticSearchStatusCheck => self.elasticsearch_status_check().await,
            PrecheckAction::OpendjReplicationCheck => self.opendj_replication_check().await,
            PrecheckAction::UnmountIsoImageCheck => self.unmount_iso_image_check().await,
            PrecheckAction::RemovePackages => self.remove_packages().await,
            PrecheckAction::ApplyPuppetTimeouts => self.apply_puppet_timeouts().await,
            PrecheckAction::CheckFallbackStatus => self.check_fallback_status().await,
            PrecheckAction::RemoveSeedFileAfterCheck => self.remove_seed_file_after_check().await,
            PrecheckAction::CheckHttpsPortIloAvailable => self.check_https_port_ilo_available().await,
            PrecheckAction::DeactivateOmbsBackup => self.deactivate_ombs_backup().await,
            PrecheckAction::RestartPuppetServices => self.restart_puppet_services().await,
            PrecheckAction::UpgradePrerequisitesCheck => Err(PrecheckError::Usage(format!(
                "{action} expands to the individual checks and cannot run on its own"
            ))),
        }
    }

    pub(crate) fn enminst(&self) -> EnminstAgent {
        EnminstAgent::new(self.mco.clone())
    }

    pub(crate) fn precheck_agent(&self) -> PrecheckAgent {
        PrecheckAgent::new(self.mco.clone())
    }

    /// A skip outcome when running on a virtual platform.
    pub(crate) fn virtual_skip(&self) -> Option<CheckOutcome> {
        let provider = self.ctx.platform.virtual_provider?;
        Some(CheckOutcome::skipped(format!(
            "Virtual environment detected ({provider:?}), check not applicable"
        )))
    }

    /// Rack deployments are flagged by the deployment type global property.
    pub(crate) async fn is_rack(&self) -> PrecheckResult<bool> {
        match self.model.get(DEPLOYMENT_TYPE_ITEM).await {
            Ok(item) => Ok(item.property("value").is_some_and(|v| v.ends_with(RACK_SUFFIX))),
            Err(e) if e.is_not_found() => {
                tracing::info!(target: "enminst::prechecks", "enm_deployment_type not found in the model");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Systems of a cluster that VCS reports RUNNING, as seen from the
    /// first system that answers.
    pub(crate) async fn running_systems(&self, cluster: &str) -> PrecheckResult<Vec<String>> {
        let inventory = self.vcs.inventory().await?;
        let Some(modelled) = inventory.clusters.get(cluster) else {
            return Ok(Vec::new());
        };
        let enminst = self.enminst();
        for host in &modelled.systems {
            match enminst.hasys_state(host).await {
                Ok(rows) => {
                    return Ok(modelled
                        .systems
                        .iter()
                        .filter(|s| {
                            rows.iter().any(|r| {
                                &r.name == *s && ServiceState::from_vcs(&r.states.join("|")) == ServiceState::Running
                            })
                        })
                        .cloned()
                        .collect());
                }
                Err(e) if e.is_unreachable() => {
                    tracing::warn!(target: "enminst::prechecks", system = %host, error = %e, "system unavailable");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(Vec::new())
    }

    /// Live instances of a clustered service in a cluster. A service that
    /// is not deployed yields no instances.
    pub(crate) async fn service_instances(&self, cluster: &str, service: Option<&str>) -> PrecheckResult<Vec<ActionGroup>> {
        let group = Pattern::new(&format!("^{}$", cs_group_pattern(cluster, service)))?;
        match self
            .vcs
            .action_groups(Some(&group), None, Some(&Pattern::exact(cluster)))
            .await
        {
            Ok(groups) => Ok(groups),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Runs a command on the management server, failing on a non-zero exit.
    pub(crate) async fn run_local(&self, spec: CommandSpec) -> PrecheckResult<String> {
        Ok(self.ctx.runner.run_checked(&spec).await?.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cs_group_pattern() {
        assert_eq!(
            cs_group_pattern("db_cluster", Some("opendj")),
            "Grp_CS_db_cluster_opendj_clustered_service"
        );
        assert_eq!(
            cs_group_pattern("db_cluster", Some("neo4j")),
            "Grp_CS_db_cluster_(sg_)?neo4j_clustered_service"
        );
        assert_eq!(
            cs_group_pattern("db_cluster", Some("versant")),
            "Grp_CS_db_cluster_versant_clustered_service(_1)?"
        );
        assert_eq!(
            cs_group_pattern("db_cluster", Some("modeldeployment")),
            "Grp_CS_db_cluster_modeldeployment_cluster(ed)?_service(_1)?"
        );
        assert_eq!(
            cs_group_pattern("db_cluster", None),
            "Grp_CS_db_cluster_(sg_)?[^\\s]+_cluster(ed)?_service(_1)?"
        );
    }

    #[test]
    fn test_group_pattern_matches_modelled_names() {
        let neo4j = Pattern::new(&format!("^{}$", cs_group_pattern("db_cluster", Some("neo4j")))).unwrap();
        assert!(neo4j.is_match("Grp_CS_db_cluster_sg_neo4j_clustered_service"));
        assert!(neo4j.is_match("Grp_CS_db_cluster_neo4j_clustered_service"));
        assert!(!neo4j.is_match("Grp_CS_db_cluster_versant_clustered_service"));
    }
}

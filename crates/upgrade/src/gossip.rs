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

//! Migration of the JGroups transport to the gossip router.
//!
//! The first upgrade that brings in the gossip router service needs every
//! JBoss cluster outside the database cluster restarted at once. The pre
//! steps stop the plan from rebooting or onlining those clusters and raise
//! a consul flag the VMs read on boot; once the plan has run, the affected
//! clusters are powered off and on and the service groups are watched until
//! they settle.

use std::path::Path;
use std::time::Duration;

use litp::{ModelApi, props, tree};
use model::blade::BladeInfo;
use model::item::ItemState;
use model::vcs::ServiceState;
use runtime::{CommandRunner, CommandSpec, Confirm, Deadline};
use snapshots::{BladeInventory, NodePower, PowerOrder};
use vcs::{GroupFilter, Pattern, Vcs};

use crate::dbgroups::{DB_CLUSTER, switch_db_groups};
use crate::errors::{UpgradeError, UpgradeResult};
use crate::paths::UpgradePaths;
use crate::xml::{DeploymentDescription, GOSSIP_ROUTER_SERVICE};

pub const JGROUPS_PROTOCOL_MIGRATION: &str = "jgroups_protocol_migration";

pub const GOSSIP_AFFECTED_CLUSTERS: [&str; 8] = [
    "svc_cluster",
    "scp_cluster",
    "evt_cluster",
    "str_cluster",
    "asr_cluster",
    "ebs_cluster",
    "eba_cluster",
    "esn_cluster",
];

const GOSSIP_DB_SERVICE: &str = "/deployments/enm/clusters/db_cluster/services/gossiprouter_clustered_service";
const GLOBAL_PROPERTIES: &str = "/software/items/config_manager/global_properties";
const VMS_WITHOUT_JGROUPS: &str = "vms_without_jgroups";
const VMS_WITHOUT_JGROUPS_LIST: &str = "httpd,amos,scripting,winfiol,openidm,bnsiserv,fmx,sso,\
visinamingnb,visinamingsb,flowautomation,ops,nodeplugins,vaultserv,cnom,ebsm1,ebsm2,ebsm3,ebsm4,\
ebsm5,udcdashboard,imadserv,imadserv-2,imadserv-3,imadserv-4,imkbserv,imgroupingserv,\
imgroupingserv-2,imfmalarmserv,imlcserv,ebaapeps1,ebaapeps2,ebaapeps3,ebaapeps4,ebakafka1,\
ebakafka2,ebamsstr1,ebamsstr2,ebareg1,ebareg2,ebazoo1,rpmoflow1,rpmoflow2,rpmoflow3,rpmokafka1,\
rpmokafka2,rttflow1,rttflow2,supervc,ncm";

const FM_EMERGENCY: &str = "fmemergency_ips=";
const FALLBACK_NODE: &str = "fb_node1";
const POSTGRES_GROUP: &str = ".*postgres_clustered_service";
const CLEAR_FAULTED_GROUPS: &str = "get_check_clear_non_dbcluster_groups";

// ---------------------------------------------------------------------------
// consul

/// Flags in the consul key/value store on the management server.
#[derive(Debug, Clone)]
pub struct ConsulClient {
    http: reqwest::Client,
    base_url: String,
}

impl ConsulClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    pub fn from_config(config: &runtime::Config) -> Self {
        Self::new(&config.consul_url)
    }

    fn url(&self, key: &str) -> String {
        format!("{}{key}", self.base_url)
    }

    /// A missing key reads as unset.
    pub async fn is_set(&self, key: &str) -> UpgradeResult<bool> {
        tracing::info!(target: "enminst::upgrade", key, "getting consul flag");
        let response = self.http.get(self.url(key)).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        let body = response
            .error_for_status()
            .map_err(|e| UpgradeError::consul(key, e.to_string()))?
            .text()
            .await?;
        Ok(body.contains(key))
    }

    pub async fn set(&self, key: &str) -> UpgradeResult<()> {
        tracing::info!(target: "enminst::upgrade", key, "setting consul flag");
        self.http
            .put(self.url(key))
            .body("true")
            .send()
            .await?
            .error_for_status()
            .map_err(|e| UpgradeError::consul(key, e.to_string()))?;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> UpgradeResult<()> {
        tracing::info!(target: "enminst::upgrade", key, "deleting consul flag");
        self.http
            .delete(self.url(key))
            .send()
            .await?
            .error_for_status()
            .map_err(|e| UpgradeError::consul(key, e.to_string()))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// detection and pre steps

/// Whether this upgrade introduces the gossip router. The operator must
/// accept the downtime of the affected clusters.
pub async fn detect(model: &dyn ModelApi, dd: &DeploymentDescription, confirm: &dyn Confirm) -> UpgradeResult<bool> {
    if !dd.has_clustered_service(GOSSIP_ROUTER_SERVICE) {
        return Ok(false);
    }
    let deployed = match model.get(GOSSIP_DB_SERVICE).await {
        Ok(item) => item.state != ItemState::Initial,
        Err(e) if e.is_not_found() => false,
        Err(e) => return Err(e.into()),
    };
    if deployed {
        return Ok(false);
    }
    tracing::warn!(target: "enminst::upgrade", clusters = ?GOSSIP_AFFECTED_CLUSTERS, "gossip router upgrade detected");
    let prompt = format!(
        "This upgrade introduces the gossip router. Every node of {} will be powered off and on after the upgrade plan, \
         causing downtime of the services they run. Continue?",
        GOSSIP_AFFECTED_CLUSTERS.join(", ")
    );
    if !confirm.confirm(&prompt, true) {
        return Err(UpgradeError::Declined("gossip router downtime".to_string()));
    }
    Ok(true)
}

/// Sets `cs_initial_online` on the affected clusters of every deployment.
pub async fn set_cs_initial_online(model: &dyn ModelApi, value: &str) -> UpgradeResult<usize> {
    let mut updated = 0;
    for deployment in model.get_children("/deployments").await? {
        for cluster in GOSSIP_AFFECTED_CLUSTERS {
            let path = format!("{}/clusters/{cluster}", deployment.path);
            if !model.exists(&path).await? {
                continue;
            }
            model.update(&path, &props([("cs_initial_online", value)])).await?;
            updated += 1;
        }
    }
    tracing::info!(target: "enminst::upgrade", value, clusters = updated, "cs_initial_online set");
    Ok(updated)
}

async fn disable_reboot_tasks(model: &dyn ModelApi) -> UpgradeResult<usize> {
    let mut updated = 0;
    for (cluster, nodes) in tree::cluster_nodes(model).await? {
        if !GOSSIP_AFFECTED_CLUSTERS.contains(&cluster.as_str()) {
            continue;
        }
        for node in nodes {
            let upgrade = format!("{}/upgrade", node.path);
            if model.exists(&upgrade).await? {
                model.update(&upgrade, &props([("disable_reboot", "true")])).await?;
                updated += 1;
            }
        }
    }
    Ok(updated)
}

async fn create_vms_without_jgroups(model: &dyn ModelApi) -> UpgradeResult<()> {
    let properties = props([("key", VMS_WITHOUT_JGROUPS), ("value", VMS_WITHOUT_JGROUPS_LIST)]);
    match model
        .create(GLOBAL_PROPERTIES, VMS_WITHOUT_JGROUPS, "config-manager-property", &properties)
        .await
    {
        Ok(_) => Ok(()),
        Err(e) if e.is_conflict() => {
            tracing::info!(target: "enminst::upgrade", "{VMS_WITHOUT_JGROUPS} global property already exists");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Model and consul changes made before the upgrade plan is created.
pub async fn prepare(model: &dyn ModelApi, consul: &ConsulClient) -> UpgradeResult<()> {
    let nodes = disable_reboot_tasks(model).await?;
    tracing::info!(target: "enminst::upgrade", nodes, "node reboot tasks disabled");
    set_cs_initial_online(model, "off").await?;
    create_vms_without_jgroups(model).await?;
    consul.set(JGROUPS_PROTOCOL_MIGRATION).await
}

// ---------------------------------------------------------------------------
// post plan bounce

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GossipTimings {
    /// Wait between the consul flag removal and the power off.
    pub settle: Duration,
    /// Wait between the power on and the first service check.
    pub boot: Duration,
    /// How long the service groups get to come back.
    pub healthcheck_timeout: Duration,
    pub healthcheck_retry: Duration,
}

impl Default for GossipTimings {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(60),
            boot: Duration::from_secs(600),
            healthcheck_timeout: Duration::from_secs(5400),
            healthcheck_retry: Duration::from_secs(60),
        }
    }
}

impl GossipTimings {
    pub fn from_config(config: &runtime::Config) -> Self {
        Self {
            boot: config.healthcheck_interval,
            healthcheck_timeout: config.healthcheck_timeout,
            ..Self::default()
        }
    }
}

/// The post plan half of the migration.
pub struct GossipBounce<'a> {
    pub model: &'a dyn ModelApi,
    pub vcs: &'a Vcs,
    pub consul: &'a ConsulClient,
    pub runner: &'a dyn CommandRunner,
    pub blades: &'a BladeInventory,
    pub power: &'a NodePower,
    pub order: PowerOrder,
    pub paths: &'a UpgradePaths,
    pub timings: GossipTimings,
    pub dps_uses_neo4j: bool,
    pub rack: bool,
}

impl GossipBounce<'_> {
    fn fm_availability(&self) -> bool {
        std::fs::read_to_string(&self.paths.global_properties)
            .map(|text| text.contains(FM_EMERGENCY))
            .unwrap_or(false)
    }

    async fn fallback(&self, sed: Option<&Path>, step: &str) {
        let Some(sed) = sed else {
            tracing::warn!(target: "enminst::upgrade", step, "no site parameters file, skipping FM availability step");
            return;
        };
        let spec = CommandSpec::new("/bin/bash")
            .arg(self.paths.fallback_installer.display().to_string())
            .args([step, "-s"])
            .arg(sed.display().to_string())
            .args(["-n", FALLBACK_NODE]);
        match self.runner.run_checked(&spec).await {
            Ok(_) => tracing::info!(target: "enminst::upgrade", step, "FM availability step complete"),
            Err(e) => tracing::error!(target: "enminst::upgrade", step, error = %e, "FM availability step failed"),
        }
    }

    async fn affected_blades(&self) -> UpgradeResult<BladeInfo> {
        Ok(self
            .blades
            .node_credentials()
            .await?
            .into_iter()
            .filter(|(_, c)| GOSSIP_AFFECTED_CLUSTERS.contains(&c.cluster.as_str()))
            .collect())
    }

    async fn postgres_active_host(&self) -> UpgradeResult<Option<String>> {
        let filter = GroupFilter::new()
            .with_cluster(Pattern::exact(DB_CLUSTER))
            .with_group(Pattern::new(POSTGRES_GROUP)?);
        let rows = self.vcs.group_status(&filter, false).await?;
        Ok(rows
            .into_iter()
            .find(|r| r.state == ServiceState::Online)
            .map(|r| r.system))
    }

    async fn restart_postgres(&self) -> UpgradeResult<()> {
        let Some(host) = self.postgres_active_host().await? else {
            return Ok(());
        };
        tracing::info!(target: "enminst::upgrade", system = %host, "restarting postgres service group");
        let group = Pattern::new(POSTGRES_GROUP)?;
        let system = Pattern::exact(&host);
        let cluster = Pattern::exact(DB_CLUSTER);
        self.vcs
            .hagrp_offline(&group, Some(&system), Some(&cluster), None)
            .await?;
        self.vcs
            .hagrp_online(&group, Some(&system), Some(&cluster), None, false)
            .await?;
        Ok(())
    }

    /// Polls the service groups until they are healthy. Faulted groups
    /// outside the database cluster are cleared between polls. Returns
    /// false when the groups did not settle in time.
    async fn wait_services_healthy(&self) -> bool {
        let deadline = Deadline::after(self.timings.healthcheck_timeout);
        loop {
            match self.vcs.verify_group_status(&GroupFilter::new()).await {
                Ok(_) => return true,
                Err(e) => {
                    tracing::error!(target: "enminst::upgrade", error = %e, "post bounce service health check failed");
                    let clear = CommandSpec::new(self.paths.post_restore_script.display().to_string())
                        .arg(CLEAR_FAULTED_GROUPS);
                    if let Err(e) = self.runner.run_checked(&clear).await {
                        tracing::error!(target: "enminst::upgrade", error = %e, "post bounce faulted service check failed");
                    }
                }
            }
            if deadline.expired() {
                tracing::error!(
                    target: "enminst::upgrade",
                    "post upgrade bounce health check timed out, verify the service health manually"
                );
                return false;
            }
            tracing::info!(
                target: "enminst::upgrade",
                elapsed = ?deadline.elapsed(),
                remaining = ?deadline.remaining(),
                "waiting for service groups"
            );
            deadline.sleep(self.timings.healthcheck_retry).await;
        }
    }

    async fn bounce(&self, sed: Option<&Path>, fm: bool) -> UpgradeResult<()> {
        tokio::time::sleep(self.timings.settle).await;
        let blades = self.affected_blades().await?;
        if blades.is_empty() {
            tracing::info!(target: "enminst::upgrade", "no nodes found to bounce");
            return Ok(());
        }
        let started = tokio::time::Instant::now();
        tracing::info!(target: "enminst::upgrade", nodes = blades.len(), "powering off nodes");
        self.power.shutdown(&self.order.shutdown(&blades, None), &blades).await?;
        if let Err(e) = self.restart_postgres().await {
            tracing::error!(target: "enminst::upgrade", error = %e, "failed to offline/online the postgres service group");
        }
        tracing::info!(target: "enminst::upgrade", "powering on nodes");
        self.power
            .start(&self.order.start(&blades, None, &BladeInfo::new()), &blades, true)
            .await?;
        tracing::info!(target: "enminst::upgrade", wait = ?self.timings.boot, "waiting before post bounce service check");
        tokio::time::sleep(self.timings.boot).await;

        if !self.wait_services_healthy().await {
            return Ok(());
        }
        tracing::info!(target: "enminst::upgrade", downtime = ?started.elapsed(), "system successfully bounced");
        if fm {
            tracing::info!(target: "enminst::upgrade", "migrating FM traffic back to ENM");
            self.fallback(sed, "-po").await;
        }
        Ok(())
    }

    /// Runs the post plan steps. The consul flag is removed whatever the
    /// outcome of the steps before it.
    pub async fn complete(&self, sed: Option<&Path>) -> UpgradeResult<()> {
        let fm = self.fm_availability();
        if fm {
            tracing::info!(target: "enminst::upgrade", "FM availability is present, performing pre-rollback step");
            self.fallback(sed, "-pr").await;
        }
        let prepared = async {
            set_cs_initial_online(self.model, "on").await?;
            switch_db_groups(self.vcs, self.dps_uses_neo4j, self.rack).await
        }
        .await;
        let cleared = self.consul.delete(JGROUPS_PROTOCOL_MIGRATION).await;
        prepared?;
        cleared?;
        self.bounce(sed, fm).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bmc::PowerDriver;
    use bmc::testing::FakeBmc;
    use litp::LitpErrorKind;
    use litp::testing::{FakeModel, FakePasswords};
    use mco::Mco;
    use mco::testing::MockTransport;
    use runtime::testing::ScriptedRunner;
    use runtime::{AssumeNo, AssumeYes, RunStateStore, WorkerPool};
    use snapshots::PowerTimings;

    use super::*;

    const NO_WAIT: GossipTimings = GossipTimings {
        settle: Duration::ZERO,
        boot: Duration::ZERO,
        healthcheck_timeout: Duration::ZERO,
        healthcheck_retry: Duration::ZERO,
    };

    // Collaborators of a bounce over a deployment with no blades modelled.
    struct BounceFixture {
        _dir: tempfile::TempDir,
        model: Arc<FakeModel>,
        vcs: Vcs,
        blades: BladeInventory,
        power: NodePower,
        paths: UpgradePaths,
        runner: ScriptedRunner,
    }

    impl BounceFixture {
        fn new(model: FakeModel) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let model = Arc::new(
                model
                    .with_node("svc_cluster", "svc-1", "ieatrcxb3")
                    .with_item("/infrastructure/systems", "collection-of-blade", ItemState::Applied, &[]),
            );
            let mco = Mco::new(Arc::new(MockTransport::new()));
            Self {
                vcs: Vcs::new(model.clone(), mco),
                blades: BladeInventory::new(
                    model.clone(),
                    Arc::new(FakePasswords::new()),
                    RunStateStore::new(dir.path()),
                ),
                power: NodePower::new(
                    PowerDriver::new(Arc::new(FakeBmc::new())),
                    WorkerPool::new(1),
                    PowerTimings::default(),
                ),
                paths: UpgradePaths::rooted(dir.path()),
                runner: ScriptedRunner::new(),
                model,
                _dir: dir,
            }
        }

        fn bounce<'a>(&'a self, consul: &'a ConsulClient) -> GossipBounce<'a> {
            GossipBounce {
                model: self.model.as_ref(),
                vcs: &self.vcs,
                consul,
                runner: &self.runner,
                blades: &self.blades,
                power: &self.power,
                order: PowerOrder::new(false),
                paths: &self.paths,
                timings: NO_WAIT,
                dps_uses_neo4j: false,
                rack: false,
            }
        }
    }

    fn description() -> DeploymentDescription {
        DeploymentDescription::parse("/tmp/dd.xml", crate::xml::SAMPLE).unwrap()
    }

    #[tokio::test]
    async fn test_detect_new_gossip_router() {
        let model = FakeModel::new();
        assert!(detect(&model, &description(), &AssumeYes).await.unwrap());
        let err = detect(&model, &description(), &AssumeNo).await.unwrap_err();
        assert!(matches!(err, UpgradeError::Declined(_)));
    }

    #[tokio::test]
    async fn test_detect_ignores_applied_gossip_router() {
        let model = FakeModel::new().with_service("db_cluster", "gossiprouter_clustered_service", ItemState::Applied, &[]);
        assert!(!detect(&model, &description(), &AssumeNo).await.unwrap());

        let initial = FakeModel::new().with_service("db_cluster", "gossiprouter_clustered_service", ItemState::Initial, &[]);
        assert!(detect(&initial, &description(), &AssumeYes).await.unwrap());
    }

    #[tokio::test]
    async fn test_consul_flag_round_trip() {
        let mut server = mockito::Server::new_async().await;
        let put = server
            .mock("PUT", "/v1/kv/jgroups_protocol_migration")
            .match_body("true")
            .with_status(200)
            .with_body("true")
            .create_async()
            .await;
        let get = server
            .mock("GET", "/v1/kv/jgroups_protocol_migration")
            .with_status(200)
            .with_body(r#"[{"Key":"jgroups_protocol_migration","Value":"dHJ1ZQ=="}]"#)
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", "/v1/kv/jgroups_protocol_migration")
            .with_status(200)
            .create_async()
            .await;

        let consul = ConsulClient::new(format!("{}/v1/kv", server.url()));
        consul.set(JGROUPS_PROTOCOL_MIGRATION).await.unwrap();
        assert!(consul.is_set(JGROUPS_PROTOCOL_MIGRATION).await.unwrap());
        consul.delete(JGROUPS_PROTOCOL_MIGRATION).await.unwrap();
        put.assert_async().await;
        get.assert_async().await;
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn test_consul_missing_key_is_unset() {
        let mut server = mockito::Server::new_async().await;
        let _get = server
            .mock("GET", "/v1/kv/jgroups_protocol_migration")
            .with_status(404)
            .create_async()
            .await;
        let consul = ConsulClient::new(format!("{}/v1/kv/", server.url()));
        assert!(!consul.is_set(JGROUPS_PROTOCOL_MIGRATION).await.unwrap());
    }

    #[tokio::test]
    async fn test_consul_rejected_put_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _put = server
            .mock("PUT", "/v1/kv/jgroups_protocol_migration")
            .with_status(500)
            .create_async()
            .await;
        let consul = ConsulClient::new(format!("{}/v1/kv/", server.url()));
        let err = consul.set(JGROUPS_PROTOCOL_MIGRATION).await.unwrap_err();
        assert!(matches!(err, UpgradeError::Consul { .. }));
    }

    #[tokio::test]
    async fn test_prepare_updates_model_and_sets_flag() {
        let mut server = mockito::Server::new_async().await;
        let put = server
            .mock("PUT", "/v1/kv/jgroups_protocol_migration")
            .with_status(200)
            .create_async()
            .await;
        let model = FakeModel::new()
            .with_node("svc_cluster", "svc-1", "svc-1")
            .with_item(
                "/deployments/enm/clusters/svc_cluster/nodes/svc-1/upgrade",
                "upgrade",
                ItemState::Applied,
                &[],
            )
            .with_node("db_cluster", "db-1", "db-1")
            .with_item(
                "/deployments/enm/clusters/db_cluster/nodes/db-1/upgrade",
                "upgrade",
                ItemState::Applied,
                &[],
            )
            .with_item(GLOBAL_PROPERTIES, "collection-of-config-manager-property", ItemState::Applied, &[]);
        let consul = ConsulClient::new(format!("{}/v1/kv/", server.url()));

        prepare(&model, &consul).await.unwrap();

        assert!(model.called("update /deployments/enm/clusters/svc_cluster/nodes/svc-1/upgrade disable_reboot=true"));
        assert!(!model.called("update /deployments/enm/clusters/db_cluster/nodes/db-1/upgrade"));
        assert!(model.called("update /deployments/enm/clusters/svc_cluster cs_initial_online=off"));
        assert!(!model.called("update /deployments/enm/clusters/db_cluster cs_initial_online"));
        assert!(model.called(&format!("create {GLOBAL_PROPERTIES}/{VMS_WITHOUT_JGROUPS} config-manager-property")));
        put.assert_async().await;
    }

    #[tokio::test]
    async fn test_existing_global_property_is_accepted() {
        let model = FakeModel::new()
            .with_item(GLOBAL_PROPERTIES, "collection-of-config-manager-property", ItemState::Applied, &[])
            .with_item(
                &format!("{GLOBAL_PROPERTIES}/{VMS_WITHOUT_JGROUPS}"),
                "config-manager-property",
                ItemState::Applied,
                &[],
            );
        create_vms_without_jgroups(&model).await.unwrap();
    }

    #[tokio::test]
    async fn test_complete_clears_flag_when_model_update_fails() {
        let mut server = mockito::Server::new_async().await;
        let delete = server
            .mock("DELETE", "/v1/kv/jgroups_protocol_migration")
            .with_status(200)
            .expect(1)
            .create_async()
            .await;
        let fixture = BounceFixture::new(
            FakeModel::new().fail("update /deployments/enm/clusters/svc_cluster", LitpErrorKind::Validation),
        );
        let consul = ConsulClient::new(format!("{}/v1/kv/", server.url()));

        let err = fixture.bounce(&consul).complete(None).await.unwrap_err();

        assert!(matches!(err, UpgradeError::Litp(_)));
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn test_complete_fails_when_flag_is_not_removed() {
        let mut server = mockito::Server::new_async().await;
        let delete = server
            .mock("DELETE", "/v1/kv/jgroups_protocol_migration")
            .with_status(500)
            .create_async()
            .await;
        let fixture = BounceFixture::new(FakeModel::new());
        let consul = ConsulClient::new(format!("{}/v1/kv/", server.url()));

        let err = fixture.bounce(&consul).complete(None).await.unwrap_err();

        assert!(matches!(err, UpgradeError::Consul { ref key, .. } if key == JGROUPS_PROTOCOL_MIGRATION));
        assert!(fixture.model.called("update /deployments/enm/clusters/svc_cluster cs_initial_online=on"));
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn test_complete_without_blades_to_bounce() {
        let mut server = mockito::Server::new_async().await;
        let delete = server
            .mock("DELETE", "/v1/kv/jgroups_protocol_migration")
            .with_status(200)
            .create_async()
            .await;
        let fixture = BounceFixture::new(FakeModel::new());
        let consul = ConsulClient::new(format!("{}/v1/kv/", server.url()));

        fixture.bounce(&consul).complete(None).await.unwrap();

        assert!(fixture.model.called("update /deployments/enm/clusters/svc_cluster cs_initial_online=on"));
        assert!(fixture.runner.calls().is_empty());
        delete.assert_async().await;
    }
}

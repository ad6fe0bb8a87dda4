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

// tests/upgrade.rs
// Upgrade runs against an in-memory model, peer transport and BMCs.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bmc::testing::FakeBmc;
use litp::PlanState;
use litp::testing::{FakeModel, FakePasswords};
use mco::testing::MockTransport;
use mco::{AgentAction, Mco};
use model::ExitCode;
use model::item::ItemState;
use model::patch::PatchMarker;
use model::stage::{Stage, StageRecord, StageState};
use runtime::state::{PREVIOUS_XML, RUNTIME_XML};
use runtime::testing::ScriptedRunner;
use runtime::{
    AssumeYes, CommandOutput, CommandRunner, CommandSpec, Config, Platform, RunStateStore, RuntimeContext,
    RuntimeResult, VirtualProvider,
};
use snapshots::SnapshotCoordinator;
use tempfile::TempDir;
use upgrade::{
    ConsulClient, GossipTimings, UpgradeArgs, UpgradeError, UpgradeOrchestrator, UpgradeOutcome, UpgradePaths,
};

const SVC_DESCRIPTION: &str = r#"<?xml version='1.0' encoding='utf-8'?>
<litp:root xmlns:litp="http://www.ericsson.com/litp" id="root">
  <litp:root-deployments-collection id="deployments">
    <litp:deployment id="enm">
      <litp:deployment-clusters-collection id="clusters">
        <litp:vcs-cluster id="svc_cluster">
          <litp:cluster-nodes-collection id="nodes">
            <litp:node id="svc-1"><hostname>%%svc_node1_hostname%%</hostname></litp:node>
          </litp:cluster-nodes-collection>
        </litp:vcs-cluster>
      </litp:deployment-clusters-collection>
    </litp:deployment>
  </litp:root-deployments-collection>
</litp:root>
"#;

const GOSSIP_DESCRIPTION: &str = r#"<?xml version='1.0' encoding='utf-8'?>
<litp:root xmlns:litp="http://www.ericsson.com/litp" id="root">
  <litp:root-deployments-collection id="deployments">
    <litp:deployment id="enm">
      <litp:deployment-clusters-collection id="clusters">
        <litp:vcs-cluster id="db_cluster">
          <litp:cluster-nodes-collection id="nodes">
            <litp:node id="db-1"><hostname>ieatrcxb1</hostname></litp:node>
          </litp:cluster-nodes-collection>
          <litp:cluster-services-collection id="services">
            <litp:vcs-clustered-service id="gossiprouter_clustered_service">
              <active>1</active>
              <name>gossiprouter</name>
              <node_list>db-1</node_list>
              <standby>0</standby>
            </litp:vcs-clustered-service>
          </litp:cluster-services-collection>
        </litp:vcs-cluster>
        <litp:vcs-cluster id="svc_cluster">
          <litp:cluster-nodes-collection id="nodes">
            <litp:node id="svc-1"><hostname>%%svc_node1_hostname%%</hostname></litp:node>
          </litp:cluster-nodes-collection>
        </litp:vcs-cluster>
      </litp:deployment-clusters-collection>
    </litp:deployment>
  </litp:root-deployments-collection>
</litp:root>
"#;

const OLD_KERNEL: &str = "3.10.0-1160.el7.x86_64";
const NEW_KERNEL: &str = "3.10.0-1160.102.1.el7.x86_64";

/// Answers from a script, and leaves on disk what the diff tool and tar
/// would write.
#[derive(Debug, Default)]
struct StagedRunner {
    scripted: ScriptedRunner,
    /// Model paths the diff tool reports as removed.
    deletable: Vec<String>,
}

#[async_trait]
impl CommandRunner for StagedRunner {
    async fn run(&self, spec: &CommandSpec) -> RuntimeResult<CommandOutput> {
        if spec.program.ends_with("dstutil.sh") {
            let listing: String = self.deletable.iter().map(|p| format!("y {p}\n")).collect();
            std::fs::write(&spec.args[2], listing).unwrap();
        }
        if spec.program == "tar" {
            if let Some(dir) = spec.args.iter().skip_while(|a| a.as_str() != "-C").nth(1) {
                std::fs::create_dir_all(Path::new(dir).join("RHEL/Packages")).unwrap();
            }
        }
        self.scripted.run(spec).await
    }
}

fn patching_runner() -> StagedRunner {
    StagedRunner {
        scripted: ScriptedRunner::new()
            .on("file -b", CommandOutput::ok("gzip compressed data, from Unix"))
            .on(
                "-name RHEL_OS_Patch_Set",
                CommandOutput::ok("/tmp/os_patch/RHEL/RHEL_OS_Patch_Set_CXP9041797-1.23.4.rpm\n"),
            )
            .on("rpm2cpio", CommandOutput::ok(r#""rhel_version": "7.9", "cxp": "9041797","#))
            .on("check-update", CommandOutput::failed(100, ""))
            .on("rpm -q --last kernel", CommandOutput::ok(format!("kernel-{NEW_KERNEL}  Tue 01 Aug 2023"))),
        deletable: Vec::new(),
    }
}

fn no_wait() -> GossipTimings {
    GossipTimings {
        settle: Duration::ZERO,
        boot: Duration::ZERO,
        healthcheck_timeout: Duration::ZERO,
        healthcheck_retry: Duration::ZERO,
    }
}

struct Harness {
    dir: TempDir,
    ctx: RuntimeContext,
    model: Arc<FakeModel>,
    transport: Arc<MockTransport>,
}

impl Harness {
    fn new(model: FakeModel, platform: Platform) -> Self {
        let dir = TempDir::new().unwrap();
        let runtime_dir = dir.path().join("runtime");
        std::fs::create_dir_all(&runtime_dir).unwrap();
        let config = Config {
            runtime_dir: runtime_dir.clone(),
            plan_poll_interval: Duration::ZERO,
            plan_start_timeout: Duration::from_secs(300),
            ..Config::default()
        };
        let ctx = RuntimeContext::new(config, platform).with_state(RunStateStore::new(runtime_dir));
        Self {
            dir,
            ctx,
            model: Arc::new(model.with_item("/deployments/enm", "deployment", ItemState::Applied, &[])),
            transport: Arc::new(MockTransport::new()),
        }
    }

    fn with_runner(mut self, runner: Arc<StagedRunner>) -> Self {
        self.ctx = self.ctx.with_runner(runner);
        self
    }

    fn state(&self) -> &RunStateStore {
        &self.ctx.state
    }

    fn paths(&self) -> UpgradePaths {
        UpgradePaths::rooted(self.dir.path().join("root"))
    }

    /// Writes a description template with its site parameters, the diff
    /// tool and the image repository a model only upgrade reads.
    fn site_files(&self, description: &str) -> (PathBuf, PathBuf) {
        let xml = self.dir.path().join("enm_deployment_template.xml");
        std::fs::write(&xml, description).unwrap();
        let sed = self.dir.path().join("sed.txt");
        std::fs::write(
            &sed,
            "svc_node1_hostname=ieatrcxb3\nvm_ssh_key=file:///root/.ssh/vm_private_key.pub\n",
        )
        .unwrap();

        let paths = self.paths();
        std::fs::create_dir_all(paths.diff_tool.parent().unwrap()).unwrap();
        std::fs::write(&paths.diff_tool, "#!/bin/sh\n").unwrap();
        let images = paths.yum_repo_root.join("images/ENM");
        std::fs::create_dir_all(&images).unwrap();
        std::fs::write(images.join("ERICrhel79jbossimage_CXP9041916-1.2.3.qcow2"), "").unwrap();
        (xml, sed)
    }

    fn orchestrator(&self, consul_url: &str) -> UpgradeOrchestrator {
        let mco = Mco::new(self.transport.clone());
        let bmc = Arc::new(FakeBmc::new());
        let passwords = Arc::new(FakePasswords::new());
        let snapshots = SnapshotCoordinator::new(&self.ctx, self.model.clone(), mco.clone(), bmc.clone(), passwords.clone());
        UpgradeOrchestrator::new(self.ctx.clone(), self.model.clone(), mco, bmc, passwords, snapshots)
            .with_paths(self.paths())
            .with_consul(ConsulClient::new(consul_url))
    }

    fn position(&self, prefix: &str) -> usize {
        self.model
            .calls()
            .iter()
            .position(|c| c.starts_with(prefix))
            .unwrap_or_else(|| panic!("no model call starting with {prefix}"))
    }
}

async fn consul_without_flag() -> mockito::ServerGuard {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v1/kv/jgroups_protocol_migration")
        .with_status(404)
        .create_async()
        .await;
    server
}

// =============================================================================
// argument handling
// =============================================================================

#[tokio::test]
async fn test_resume_rejects_artifacts() {
    let h = Harness::new(FakeModel::new(), Platform::default());
    let args = UpgradeArgs {
        resume: true,
        litp_iso: Some("/tmp/litp.iso".into()),
        ..Default::default()
    };
    let err = h.orchestrator("http://localhost:1/v1/kv/").run(&args).await.unwrap_err();
    assert!(err.is_usage());
    assert_eq!(err.exit_code(), ExitCode::InvalidUsage);
    assert!(h.model.calls().iter().all(|c| !c.starts_with("set_plan_state")));
}

#[tokio::test]
async fn test_resume_needs_a_recorded_plan() {
    let h = Harness::new(FakeModel::new(), Platform::default());
    h.state()
        .set_stage(StageRecord::new(Stage::InfrastructurePlan, StageState::Failed))
        .unwrap();
    let args = UpgradeArgs {
        resume: true,
        ..Default::default()
    };
    let err = h.orchestrator("http://localhost:1/v1/kv/").run(&args).await.unwrap_err();
    assert!(matches!(err, UpgradeError::ResumeState(ref s) if s == "infrastructure_plan:failed"));
}

// =============================================================================
// plan re-entry
// =============================================================================

#[tokio::test]
async fn test_resume_reruns_failed_plan_and_finishes() {
    let h = Harness::new(
        FakeModel::new().with_plan(&[PlanState::Failed, PlanState::Running, PlanState::Successful]),
        Platform::default(),
    );
    let persisted = UpgradeArgs {
        litp_iso: Some("/tmp/litp.iso".into()),
        ..Default::default()
    };
    h.state().save_params(&persisted).unwrap();
    h.state()
        .set_stage(StageRecord::new(Stage::UpgradePlan, StageState::Failed))
        .unwrap();
    h.state().create_snapshot_indicator().unwrap();
    let consul = consul_without_flag().await;

    let args = UpgradeArgs {
        resume: true,
        ..Default::default()
    };
    let outcome = h
        .orchestrator(&format!("{}/v1/kv/", consul.url()))
        .run(&args)
        .await
        .unwrap();

    assert_eq!(outcome, UpgradeOutcome::Completed);
    assert!(h.model.called("set_plan_state running resume=true"));
    assert!(!h.model.called("create_plan"));
    assert_eq!(h.state().stage().unwrap(), None);
    assert_eq!(h.state().load_params::<UpgradeArgs>().unwrap(), None);
    assert!(!h.state().snapshot_indicator_exists());
}

#[tokio::test]
async fn test_running_plan_is_monitored_not_recreated() {
    let h = Harness::new(
        FakeModel::new().with_plan(&[PlanState::Running, PlanState::Successful]),
        Platform::default(),
    );
    h.state()
        .set_stage(StageRecord::new(Stage::UpgradePlan, StageState::Start))
        .unwrap();
    let consul = consul_without_flag().await;

    let args = UpgradeArgs {
        enm_iso: Some("/tmp/enm.iso".into()),
        ..Default::default()
    };
    let outcome = h
        .orchestrator(&format!("{}/v1/kv/", consul.url()))
        .run(&args)
        .await
        .unwrap();

    assert_eq!(outcome, UpgradeOutcome::Completed);
    assert!(!h.model.called("create_plan"));
    assert!(!h.model.called("set_plan_state"));
    assert!(!h.transport.called(AgentAction::PuppetEnable));
    assert_eq!(h.state().stage().unwrap(), None);
}

// =============================================================================
// standard path
// =============================================================================

#[tokio::test]
async fn test_import_refused_in_maintenance_mode() {
    let platform = Platform::default().with_virtual_provider(Some(VirtualProvider::Kvm));
    let h = Harness::new(FakeModel::new().with_maintenance(true), platform);
    let args = UpgradeArgs {
        litp_iso: Some("/tmp/litp.iso".into()),
        disable_hc: true,
        ..Default::default()
    };
    let err = h.orchestrator("http://localhost:1/v1/kv/").run(&args).await.unwrap_err();

    assert!(matches!(err, UpgradeError::MaintenanceMode));
    assert_eq!(err.exit_code(), ExitCode::LitpMaintenanceMode);
    // once before the checks and once after the patches
    assert_eq!(h.transport.count(AgentAction::PuppetEnable), 2);
    // no SAN on a virtual deployment, so nothing was snapped
    assert!(h.model.snapshots().is_empty());
    assert_eq!(h.state().load_params::<UpgradeArgs>().unwrap(), Some(args));
    assert!(!h.model.called("create_plan"));
}

#[tokio::test]
async fn test_deleted_items_removed_after_description_load() {
    let platform = Platform::default().with_virtual_provider(Some(VirtualProvider::Kvm));
    let model = FakeModel::new()
        .with_node("svc_cluster", "svc-1", "ieatrcxb3")
        .with_item("/software/items/old_package", "package", ItemState::Applied, &[("name", "ERICold")]);
    let runner = Arc::new(StagedRunner {
        deletable: vec!["/software/items/old_package".into()],
        ..Default::default()
    });
    let h = Harness::new(model, platform).with_runner(runner.clone());
    let (xml, sed) = h.site_files(SVC_DESCRIPTION);
    // description the running deployment was installed from
    std::fs::write(h.state().path(RUNTIME_XML), SVC_DESCRIPTION.replace("%%svc_node1_hostname%%", "ieatrcxb3")).unwrap();

    let args = UpgradeArgs {
        sed_file: Some(sed),
        model_xml: Some(xml),
        disable_hc: true,
        ..Default::default()
    };
    let outcome = h.orchestrator("http://localhost:1/v1/kv/").run(&args).await.unwrap();

    assert_eq!(outcome, UpgradeOutcome::Completed);
    assert!(h.position("upgrade /deployments/enm") < h.position("load_xml / merge=true"));
    assert!(h.position("load_xml / merge=true") < h.position("delete_path /software/items/old_package"));
    assert!(h.position("delete_path /software/items/old_package") < h.position("create_plan no_lock_tasks=false"));
    assert!(h.model.item("/software/items/old_package").is_none());
    assert_eq!(runner.scripted.count("dstutil.sh"), 1);
    let rendered = std::fs::read_to_string(h.state().path(RUNTIME_XML)).unwrap();
    assert!(rendered.contains("<hostname>ieatrcxb3</hostname>"));
    assert!(!h.state().exists(PREVIOUS_XML));
    assert_eq!(h.state().stage().unwrap(), None);
}

#[tokio::test]
async fn test_structure_mismatch_stops_before_deletions() {
    let platform = Platform::default().with_virtual_provider(Some(VirtualProvider::Kvm));
    // the load leaves the node without the described hostname
    let model = FakeModel::new()
        .with_node("svc_cluster", "svc-1", "ieatrcxb9")
        .with_item("/software/items/old_package", "package", ItemState::Applied, &[]);
    let runner = Arc::new(StagedRunner {
        deletable: vec!["/software/items/old_package".into()],
        ..Default::default()
    });
    let h = Harness::new(model, platform).with_runner(runner.clone());
    let (xml, sed) = h.site_files(SVC_DESCRIPTION);
    std::fs::write(h.state().path(RUNTIME_XML), SVC_DESCRIPTION).unwrap();

    let args = UpgradeArgs {
        sed_file: Some(sed),
        model_xml: Some(xml),
        disable_hc: true,
        ..Default::default()
    };
    let err = h.orchestrator("http://localhost:1/v1/kv/").run(&args).await.unwrap_err();

    assert!(matches!(err, UpgradeError::StructuralMismatch { .. }));
    assert!(h.model.called("load_xml"));
    assert!(!runner.scripted.called("dstutil.sh"));
    assert!(h.model.item("/software/items/old_package").is_some());
    assert!(!h.model.called("create_plan"));
}

// =============================================================================
// OS patches and the management server reboot
// =============================================================================

#[tokio::test]
async fn test_patch_reboot_then_rerun_skips_applied_bundle() {
    let platform = Platform::default()
        .with_virtual_provider(Some(VirtualProvider::Kvm))
        .with_kernel_release(OLD_KERNEL);
    let runner = Arc::new(patching_runner());
    let mut h = Harness::new(FakeModel::new(), platform).with_runner(runner.clone());
    let patch = h.dir.path().join("rhel_os_patches.tar.gz");
    std::fs::write(&patch, "bundle").unwrap();
    let args = UpgradeArgs {
        os_patch: vec![patch],
        disable_hc: true,
        ..Default::default()
    };

    let outcome = h.orchestrator("http://localhost:1/v1/kv/").run(&args).await.unwrap();

    assert_eq!(outcome, UpgradeOutcome::RebootPending);
    assert_eq!(runner.scripted.count("/usr/bin/litp import"), 1);
    assert!(runner.scripted.called("yum -y --disablerepo=* --enablerepo=UPDATES upgrade"));
    assert_eq!(runner.scripted.count("/sbin/shutdown -r now"), 1);
    assert!(h.transport.called(AgentAction::PuppetDisable));
    assert_eq!(
        h.state().patch_markers().unwrap(),
        vec![PatchMarker::WithoutModel, PatchMarker::with_cxp("9041797", "1.23.4")]
    );
    assert!(!h.model.called("create_plan"));
    assert_eq!(h.state().load_params::<UpgradeArgs>().unwrap(), Some(args.clone()));

    // back up on the patched kernel, the operator repeats the command
    std::sync::Arc::make_mut(&mut h.ctx.platform).kernel_release = NEW_KERNEL.to_string();
    let outcome = h.orchestrator("http://localhost:1/v1/kv/").run(&args).await.unwrap();

    assert_eq!(outcome, UpgradeOutcome::Completed);
    assert_eq!(runner.scripted.count("/usr/bin/litp import"), 1);
    assert_eq!(runner.scripted.count("yum clean all"), 1);
    assert_eq!(runner.scripted.count("/sbin/shutdown"), 1);
    assert!(h.model.called("create_plan no_lock_tasks=false"));
    assert_eq!(h.state().load_params::<UpgradeArgs>().unwrap(), None);
}

// =============================================================================
// gossip router migration
// =============================================================================

#[tokio::test]
async fn test_gossip_router_upgrade_bounces_after_plan() {
    let platform = Platform::default().with_virtual_provider(Some(VirtualProvider::Kvm));
    let model = FakeModel::new()
        .with_node("db_cluster", "db-1", "ieatrcxb1")
        .with_node("svc_cluster", "svc-1", "ieatrcxb3")
        .with_service(
            "db_cluster",
            "gossiprouter_clustered_service",
            ItemState::Initial,
            &[("active", "1"), ("standby", "0"), ("node_list", "db-1"), ("name", "gossiprouter")],
        )
        .with_item(
            "/software/items/config_manager/global_properties",
            "collection-of-config-manager-property",
            ItemState::Applied,
            &[],
        )
        .with_item("/infrastructure/systems", "collection-of-blade", ItemState::Applied, &[]);
    let mut h = Harness::new(model, platform).with_runner(Arc::new(StagedRunner::default()));
    h.ctx = h.ctx.with_confirm(Arc::new(AssumeYes));
    let (xml, sed) = h.site_files(GOSSIP_DESCRIPTION);

    let mut consul = mockito::Server::new_async().await;
    let set = consul
        .mock("PUT", "/v1/kv/jgroups_protocol_migration")
        .match_body("true")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;
    let cleared = consul
        .mock("DELETE", "/v1/kv/jgroups_protocol_migration")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let args = UpgradeArgs {
        sed_file: Some(sed),
        model_xml: Some(xml),
        disable_hc: true,
        ..Default::default()
    };
    let outcome = h
        .orchestrator(&format!("{}/v1/kv/", consul.url()))
        .with_gossip_timings(no_wait())
        .run(&args)
        .await
        .unwrap();

    assert_eq!(outcome, UpgradeOutcome::Completed);
    let offline = h.position("update /deployments/enm/clusters/svc_cluster cs_initial_online=off");
    let plan = h.position("create_plan no_lock_tasks=true");
    let online = h.position("update /deployments/enm/clusters/svc_cluster cs_initial_online=on");
    assert!(h.position("load_xml") < offline);
    assert!(offline < plan && plan < online);
    assert!(h.model.called("create /software/items/config_manager/global_properties/vms_without_jgroups"));
    assert!(!h.model.called("update /deployments/enm/clusters/db_cluster cs_initial_online"));
    set.assert_async().await;
    cleared.assert_async().await;
    assert_eq!(h.state().stage().unwrap(), None);
}

// =============================================================================
// internal model
// =============================================================================

#[tokio::test]
async fn test_internal_model_writes_site_values_only() {
    let h = Harness::new(
        FakeModel::new().with_item(
            "/deployments/enm/clusters/svc_cluster/nodes/svc-1/network_interfaces/eth0",
            "eth",
            ItemState::Applied,
            &[("macaddress", "00:50:56:00:00:02")],
        ),
        Platform::default(),
    );
    let sed = h.dir.path().join("sed.txt");
    std::fs::write(&sed, "svc_node1_eth0_macaddress=00:50:56:00:00:01\n").unwrap();

    let args = UpgradeArgs {
        internal_model: true,
        sed_file: Some(sed),
        ..Default::default()
    };
    let outcome = h.orchestrator("http://localhost:1/v1/kv/").run(&args).await.unwrap();

    assert_eq!(outcome, UpgradeOutcome::ModelSynced);
    assert!(h.model.called(
        "update /deployments/enm/clusters/svc_cluster/nodes/svc-1/network_interfaces/eth0 macaddress=00:50:56:00:00:01"
    ));
    assert!(!h.model.called("create_plan"));
    assert_eq!(h.state().load_params::<UpgradeArgs>().unwrap(), None);
}

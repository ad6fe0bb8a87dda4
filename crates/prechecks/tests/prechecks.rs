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

// tests/prechecks.rs
// Precheck runs against a fake model, scripted agents and commands, and a
// mock HTTP server.

use std::path::Path;
use std::sync::Arc;

use litp::testing::{FakeModel, FakePasswords};
use mco::testing::MockTransport;
use mco::{AgentAction, HostReply, Mco};
use mockito::Matcher;
use model::ExitCode;
use model::item::ItemState;
use prechecks::{Locations, PrecheckAction, PrecheckEngine, PrecheckReport};
use runtime::testing::ScriptedRunner;
use runtime::{AssumeNo, AssumeYes, CommandOutput, Config, Confirm, Platform, RuntimeContext, VirtualProvider};
use storage::SanType;
use storage::testing::FakeSan;
use tempfile::TempDir;

const OPENDJ_GROUP: &str = "Grp_CS_db_cluster_opendj_clustered_service";
const ES_GROUP: &str = "Grp_CS_db_cluster_elasticsearch_clustered_service";

fn db_model() -> FakeModel {
    FakeModel::new()
        .with_node("db_cluster", "db_node1", "db-1")
        .with_node("db_cluster", "db_node2", "db-2")
        .with_service(
            "db_cluster",
            "opendj_clustered_service",
            ItemState::Applied,
            &[("active", "2"), ("standby", "0"), ("node_list", "db_node1,db_node2")],
        )
        .with_service(
            "db_cluster",
            "elasticsearch_clustered_service",
            ItemState::Applied,
            &[("active", "1"), ("standby", "1"), ("node_list", "db_node1,db_node2")],
        )
}

fn group_states(opendj: (&str, &str), es: (&str, &str)) -> HostReply {
    HostReply::ok(format!(
        "#Group Attribute System Value\n\
         {OPENDJ_GROUP} State db-1 |{}|\n\
         {OPENDJ_GROUP} State db-2 |{}|\n\
         {ES_GROUP} State db-1 |{}|\n\
         {ES_GROUP} State db-2 |{}|\n",
        opendj.0, opendj.1, es.0, es.1
    ))
}

fn replication_report(mc1: &str, mc2: &str) -> String {
    format!(
        "Suffix DN : Server : Entries : Replication enabled : DS ID : RS ID : RS Port : M.C. : A.O.M.C. : Security\n\
         --------------:--------------:---------:---------------------:-------:-------:---------:------:----------:---------\n\
         dc=enm,dc=com : db-1:4444 : 2048 : true : 11 : 21 : 8989 : {mc1} : : true\n\
         dc=enm,dc=com : db-2:4444 : 2048 : true : 12 : 22 : 8989 : {mc2} : : true\n"
    )
}

struct Harness {
    dir: TempDir,
    model: Arc<FakeModel>,
    mock: Arc<MockTransport>,
    runner: Arc<ScriptedRunner>,
    engine: PrecheckEngine,
}

struct Setup {
    model: FakeModel,
    mock: MockTransport,
    runner: ScriptedRunner,
    platform: Platform,
    confirm: Arc<dyn Confirm>,
    config: Config,
}

impl Default for Setup {
    fn default() -> Self {
        Self {
            model: db_model(),
            mock: MockTransport::new(),
            runner: ScriptedRunner::new(),
            platform: Platform::default(),
            confirm: Arc::new(AssumeYes),
            config: Config::default(),
        }
    }
}

fn locations(dir: &Path) -> Locations {
    Locations {
        global_properties: dir.join("global.properties"),
        opendj_passkey: dir.join("opendj_passkey"),
        iso_mount_dir: dir.join("mnt"),
        fallback_sed: dir.join("fallback.sed"),
        seed_conf: dir.join("seed.conf"),
        enm_version: dir.join("enm-version"),
        ilo_sed: dir.join("sed.txt"),
        bos_conf: dir.join("bos.conf"),
        ..Locations::default()
    }
}

impl Setup {
    fn build(self) -> Harness {
        let dir = TempDir::new().unwrap();
        let model = Arc::new(self.model);
        let mock = Arc::new(self.mock);
        let runner = Arc::new(self.runner);
        let ctx = RuntimeContext::new(self.config, self.platform)
            .with_runner(runner.clone())
            .with_confirm(self.confirm);
        let engine = PrecheckEngine::new(ctx, model.clone(), Arc::new(FakePasswords::new()), Mco::new(mock.clone()))
            .unwrap()
            .with_locations(locations(dir.path()));
        Harness {
            dir,
            model,
            mock,
            runner,
            engine,
        }
    }
}

impl Harness {
    fn write(&self, name: &str, content: &str) {
        std::fs::write(self.dir.path().join(name), content).unwrap();
    }

    async fn run(&self, actions: &[PrecheckAction]) -> PrecheckReport {
        self.engine.run(actions).await
    }
}

// =============================================================================
// model synchronisation
// =============================================================================

#[tokio::test]
async fn test_model_synchronised_passes() {
    let h = Setup {
        model: db_model().with_do_nothing_plan(),
        ..Setup::default()
    }
    .build();
    let report = h.run(&[PrecheckAction::LitpModelSynchronizedCheck]).await;
    assert_eq!(report.lines(), vec!["PASSED: Model is synchronised".to_string()]);
    assert_eq!(report.exit_code(), ExitCode::Ok);
}

#[tokio::test]
async fn test_model_out_of_sync_removes_the_plan_and_fails() {
    let h = Setup::default().build();
    let report = h.run(&[PrecheckAction::LitpModelSynchronizedCheck]).await;
    assert!(!report.succeeded());
    let lines = report.lines();
    assert!(lines[0].starts_with("FAILED: litp_model_synchronized_check"));
    assert!(lines[1].contains("MODEL_NOT_SYNCHRONISED"));
    assert!(h.model.called("delete_plan"));
}

#[tokio::test]
async fn test_model_check_is_skipped_on_virtual_platforms() {
    let h = Setup {
        platform: Platform::default().with_virtual_provider(Some(VirtualProvider::Vmware)),
        ..Setup::default()
    }
    .build();
    let report = h.run(&[PrecheckAction::LitpModelSynchronizedCheck]).await;
    assert!(report.lines()[0].starts_with("SKIPPED: "));
    assert!(!h.model.called("create_plan"));
}

// =============================================================================
// OpenDJ
// =============================================================================

fn opendj_setup(replication: HostReply) -> Harness {
    let h = Setup {
        mock: MockTransport::new()
            .reply_all(AgentAction::HagrpState, group_states(("ONLINE", "ONLINE"), ("ONLINE", "OFFLINE")))
            .reply_all(AgentAction::GetReplicationStatus, replication),
        runner: ScriptedRunner::new().on("openssl", CommandOutput::ok("s3cr3t\n")),
        ..Setup::default()
    }
    .build();
    h.write(
        "global.properties",
        "COM_INF_LDAP_ROOT_SUFFIX=dc=enm,dc=com\nLDAP_ADMIN_PASSWORD=U2FsdGVkX1+abc=\n",
    );
    h
}

#[tokio::test]
async fn test_opendj_replication_intact() {
    let h = opendj_setup(HostReply::ok(replication_report("0", "0")));
    let report = h.run(&[PrecheckAction::OpendjReplicationCheck]).await;
    assert_eq!(report.lines(), vec!["PASSED: OpenDJ replication is intact".to_string()]);

    let queries = h.mock.calls_for(AgentAction::GetReplicationStatus);
    assert_eq!(queries.len(), 2);
    assert!(queries.iter().all(|q| q.args["password"] == "s3cr3t"));
    assert!(queries.iter().all(|q| q.args["baseDN"] == "dc=enm,dc=com"));
    assert!(h.runner.called("-kfile"));
}

#[tokio::test]
async fn test_opendj_missing_changes_fail() {
    let h = opendj_setup(HostReply::ok(replication_report("0", "17")));
    let report = h.run(&[PrecheckAction::OpendjReplicationCheck]).await;
    assert_eq!(report.exit_code(), ExitCode::Error);
    let lines = report.lines();
    assert_eq!(lines[0], "FAILED: opendj_replication_check (ERROR)");
    assert!(lines[1].contains("MC_IS_NOT_ZERO_ON_BOTH_NODES"));
    assert_eq!(lines.len(), 2);
}

#[tokio::test]
async fn test_opendj_monitor_failure() {
    let h = opendj_setup(HostReply::ok("monitor_replication......FAIL\n"));
    let report = h.run(&[PrecheckAction::OpendjReplicationCheck]).await;
    assert!(report.lines()[1].contains("OPENDJ_REPLICATION_FAILED"));
    assert_eq!(h.mock.count(AgentAction::GetReplicationStatus), 1);
}

#[tokio::test]
async fn test_opendj_needs_two_online_nodes() {
    let h = Setup {
        mock: MockTransport::new()
            .reply_all(AgentAction::HagrpState, group_states(("ONLINE", "OFFLINE"), ("ONLINE", "OFFLINE"))),
        ..Setup::default()
    }
    .build();
    let report = h.run(&[PrecheckAction::OpendjReplicationCheck]).await;
    assert!(report.lines()[1].contains("OPENDJ_NOT_ONLINE_ON_TWO_NODES"));
    assert!(!h.mock.called(AgentAction::GetReplicationStatus));
}

#[tokio::test]
async fn test_opendj_without_password_fails() {
    let h = opendj_setup(HostReply::ok(replication_report("0", "0")));
    h.write("global.properties", "COM_INF_LDAP_ROOT_SUFFIX=dc=enm,dc=com\n");
    let report = h.run(&[PrecheckAction::OpendjReplicationCheck]).await;
    assert!(report.lines()[1].contains("OPENDJ_PASSWORD_UNAVAILABLE"));
    assert!(!h.runner.called("openssl"));
}

// =============================================================================
// Elasticsearch
// =============================================================================

async fn elasticsearch_setup(server: &mockito::ServerGuard, es: (&str, &str)) -> Harness {
    Setup {
        mock: MockTransport::new().reply_all(AgentAction::HagrpState, group_states(("ONLINE", "ONLINE"), es)),
        config: Config {
            elasticsearch_url: server.url(),
            ..Config::default()
        },
        ..Setup::default()
    }
    .build()
}

#[tokio::test]
async fn test_elasticsearch_green_indices_pass() {
    let mut server = mockito::Server::new_async().await;
    let listing = server
        .mock("GET", "/_cat/indices")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("health status index uuid pri rep\ngreen open enm_logs-1 abc 1 1\n")
        .create_async()
        .await;
    let h = elasticsearch_setup(&server, ("OFFLINE", "ONLINE")).await;
    let report = h.run(&[PrecheckAction::ElasticSearchStatusCheck]).await;
    assert!(report.succeeded(), "{:?}", report.lines());
    listing.assert_async().await;
}

#[tokio::test]
async fn test_elasticsearch_yellow_index_fails() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/_cat/indices")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("health status index uuid pri rep\nyellow open enm_logs-2 def 1 1\n")
        .create_async()
        .await;
    let h = elasticsearch_setup(&server, ("ONLINE", "OFFLINE")).await;
    let lines = h.run(&[PrecheckAction::ElasticSearchStatusCheck]).await.lines();
    assert!(lines[1].contains("ELASTICSEARCH_STATUS_CHECK_FAILED"));
    assert!(lines[1].contains("enm_logs-2"));
}

#[tokio::test]
async fn test_elasticsearch_header_only_listing_fails() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/_cat/indices")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("health status index uuid pri rep\n")
        .create_async()
        .await;
    let h = elasticsearch_setup(&server, ("ONLINE", "OFFLINE")).await;
    let lines = h.run(&[PrecheckAction::ElasticSearchStatusCheck]).await.lines();
    assert!(lines[1].contains("COULD_NOT_RETRIEVE_ELASTICSEARCH_INDICES"));
}

#[tokio::test]
async fn test_elasticsearch_offline_everywhere_fails_without_a_request() {
    let server = mockito::Server::new_async().await;
    let h = elasticsearch_setup(&server, ("OFFLINE", "OFFLINE")).await;
    let lines = h.run(&[PrecheckAction::ElasticSearchStatusCheck]).await.lines();
    assert!(lines[1].contains("ELASTICSEARCH_STATUS_CHECK_FAILED"));
}

// =============================================================================
// SAN
// =============================================================================

fn san_model() -> FakeModel {
    db_model()
        .with_item(
            "/infrastructure/storage/storage_providers/unityxt",
            "sfs-service",
            ItemState::Applied,
            &[("nas_type", "unityxt")],
        )
        .with_item(
            "/infrastructure/storage/storage_providers/unityxt/virtual_servers/vs1",
            "sfs-virtual-server",
            ItemState::Applied,
            &[("name", "nas_server_a")],
        )
}

#[tokio::test]
async fn test_san_critical_alerts_fail() {
    let h = Setup {
        model: san_model(),
        ..Setup::default()
    }
    .build();
    let engine = h
        .engine
        .clone()
        .with_san(Arc::new(FakeSan::new(SanType::Unity).with_alert("Storage processor SPA is faulted")));
    let report = engine.run(&[PrecheckAction::SanAlertCheck]).await;
    let lines = report.lines();
    assert!(lines[1].contains("SAN_ALERT_CHECK_FAILED"));
    assert!(lines[1].contains("SPA is faulted"));
}

#[tokio::test]
async fn test_san_nas_server_off_home_processor_fails() {
    let h = Setup {
        model: san_model(),
        ..Setup::default()
    }
    .build();
    let san = FakeSan::new(SanType::Unity).with_unbalanced_nas_server("nas_server_a");
    let report = h.engine.clone().with_san(Arc::new(san)).run(&[PrecheckAction::SanAlertCheck]).await;
    assert!(report.lines()[1].contains("NAS_SERVER_IMBALANCE"));
}

#[tokio::test]
async fn test_san_without_alerts_passes() {
    let h = Setup {
        model: san_model(),
        ..Setup::default()
    }
    .build();
    let report = h
        .engine
        .clone()
        .with_san(Arc::new(FakeSan::new(SanType::Unity)))
        .run(&[PrecheckAction::SanAlertCheck])
        .await;
    assert_eq!(report.lines(), vec!["PASSED: No critical SAN alerts".to_string()]);
}

// =============================================================================
// management server
// =============================================================================

#[tokio::test]
async fn test_iso_mounted_on_mnt_is_unmounted_after_confirmation() {
    let h = Setup {
        runner: ScriptedRunner::new()
            .on("/bin/mount", CommandOutput::ok("/dev/loop0 on /mnt type iso9660 (ro)\n"))
            .on("/bin/mount", CommandOutput::ok("/dev/sda1 on /boot type xfs (rw)\n")),
        ..Setup::default()
    }
    .build();
    let engine = h.engine.clone().with_locations(Locations {
        iso_mount_dir: "/mnt".into(),
        ..locations(h.dir.path())
    });
    let report = engine.run(&[PrecheckAction::UnmountIsoImageCheck]).await;
    assert!(report.succeeded(), "{:?}", report.lines());
    assert_eq!(h.runner.count("/bin/umount /mnt"), 1);
}

#[tokio::test]
async fn test_iso_mount_declined_fails() {
    let h = Setup {
        runner: ScriptedRunner::new().on("/bin/mount", CommandOutput::ok("/dev/loop0 on /mnt type iso9660 (ro)\n")),
        confirm: Arc::new(AssumeNo),
        ..Setup::default()
    }
    .build();
    let engine = h.engine.clone().with_locations(Locations {
        iso_mount_dir: "/mnt".into(),
        ..locations(h.dir.path())
    });
    let report = engine.run(&[PrecheckAction::UnmountIsoImageCheck]).await;
    assert!(report.lines()[1].contains("ISO_IMAGE_MOUNTED"));
    assert!(!h.runner.called("umount"));
}

#[tokio::test]
async fn test_ombs_lock_file_is_created_once() {
    let h = Setup::default().build();
    let lock = h.dir.path().join("ombs.lock");
    h.write(
        "bos.conf",
        &format!("[precondition]\nsystem_backup_lock_file = {}\n", lock.display()),
    );
    let report = h.run(&[PrecheckAction::DeactivateOmbsBackup]).await;
    assert_eq!(report.lines(), vec!["PASSED: OMBS backup deactivated".to_string()]);
    assert!(std::fs::read_to_string(&lock).unwrap().starts_with("Existence of this file"));
    assert!(h.runner.called("chown brsadm:brsadm"));

    let again = h.run(&[PrecheckAction::DeactivateOmbsBackup]).await;
    assert_eq!(again.lines(), vec!["PASSED: OMBS backup is inactive".to_string()]);
}

#[tokio::test]
async fn test_ombs_without_lock_option_fails() {
    let h = Setup::default().build();
    h.write("bos.conf", "[precondition]\nother = 1\n");
    let report = h.run(&[PrecheckAction::DeactivateOmbsBackup]).await;
    assert!(report.lines()[1].contains("OMBS_BACKUP_CONFIG_INVALID"));
}

#[tokio::test]
async fn test_seed_file_removed_on_old_rack_release() {
    let h = Setup {
        model: db_model().with_item(
            "/software/items/config_manager/global_properties/enm_deployment_type",
            "config-manager-property",
            ItemState::Applied,
            &[("value", "Small_ENM_On_Rack_Servers")],
        ),
        ..Setup::default()
    }
    .build();
    h.write("seed.conf", "seed-1\n");
    h.write("enm-version", "ENM 21.03 (ISO Version: 2.19.90) AOM 901 151 R1DC\n");
    let report = h.run(&[PrecheckAction::RemoveSeedFileAfterCheck]).await;
    assert_eq!(report.lines(), vec!["PASSED: Checking of ENM version completed".to_string()]);
    assert!(!h.dir.path().join("seed.conf").exists());
}

#[tokio::test]
async fn test_seed_file_kept_on_blade_deployments() {
    let h = Setup::default().build();
    h.write("seed.conf", "seed-1\n");
    h.write("enm-version", "ENM 21.03 (ISO Version: 2.19.90) AOM 901 151 R1DC\n");
    assert!(h.run(&[PrecheckAction::RemoveSeedFileAfterCheck]).await.succeeded());
    assert!(h.dir.path().join("seed.conf").exists());

    h.write("enm-version", "garbage\n");
    let report = h.run(&[PrecheckAction::RemoveSeedFileAfterCheck]).await;
    assert!(report.lines()[1].contains("ENM_VERSION_UNREADABLE"));
}

// =============================================================================
// site documents
// =============================================================================

#[tokio::test]
async fn test_fallback_uses_seed_nodes_probe_when_health_is_not_ok() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/health")
        .with_status(503)
        .create_async()
        .await;
    let seeds = server
        .mock("GET", "/seeds")
        .with_status(200)
        .create_async()
        .await;
    let h = Setup::default().build();
    h.write("fallback.sed", &format!("fb_dpmediation_1_ip_internal={}\nother=1\n", server.host_with_port()));
    let engine = h.engine.clone().with_locations(Locations {
        fallback_health_url: "http://{ip}/health".into(),
        fallback_seed_nodes_url: "http://{ip}/seeds".into(),
        ..locations(h.dir.path())
    });
    let report = engine.run(&[PrecheckAction::CheckFallbackStatus]).await;
    assert!(report.succeeded(), "{:?}", report.lines());
    seeds.assert_async().await;
}

#[tokio::test]
async fn test_fallback_with_empty_address_fails() {
    let h = Setup::default().build();
    h.write("fallback.sed", "fb_dpmediation_internal=\n");
    let report = h.run(&[PrecheckAction::CheckFallbackStatus]).await;
    assert!(report.lines()[1].contains("FALLBACK_STATUS_CHECK_FAILED"));
}

#[tokio::test]
async fn test_fallback_without_sed_passes() {
    let h = Setup::default().build();
    assert!(h.run(&[PrecheckAction::CheckFallbackStatus]).await.succeeded());
}

#[tokio::test]
async fn test_ilo_https_unreachable_names_the_node() {
    let mut server = mockito::Server::new_async().await;
    server.mock("GET", "/").with_status(200).create_async().await;
    let h = Setup::default().build();
    h.write(
        "sed.txt",
        &format!(
            "db_node1_ilo_IP={}\ndb_node2_ilo_IP=127.0.0.1:1\nsvc_node1_ilo_IP=\n",
            server.host_with_port()
        ),
    );
    let engine = h.engine.clone().with_locations(Locations {
        ilo_url: "http://{ip}".into(),
        ..locations(h.dir.path())
    });
    let lines = engine.run(&[PrecheckAction::CheckHttpsPortIloAvailable]).await.lines();
    assert_eq!(lines.len(), 2);
    assert!(lines[1].contains("HTTPS_PORT_UNAVAILABLE_ON_ILO"));
    assert!(lines[1].contains("db_node2"));
}

// =============================================================================
// runs
// =============================================================================

#[tokio::test]
async fn test_run_stops_at_the_first_failure() {
    let h = Setup::default().build();
    let report = h
        .run(&[
            PrecheckAction::LitpModelSynchronizedCheck,
            PrecheckAction::CheckFallbackStatus,
        ])
        .await;
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.lines().iter().filter(|l| l.starts_with("FAILED")).count(), 1);
    assert!(report.summary.is_none());
}

#[tokio::test]
async fn test_ombs_deactivation_runs_on_its_own() {
    let h = Setup::default().build();
    h.write("bos.conf", "[precondition]\nsystem_backup_lock_file =\n");
    let report = h
        .run(&[
            PrecheckAction::CheckFallbackStatus,
            PrecheckAction::DeactivateOmbsBackup,
        ])
        .await;
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].action, PrecheckAction::DeactivateOmbsBackup);
}

// =============================================================================
// storage
// =============================================================================

fn storage_mock(non_dm: &str) -> MockTransport {
    MockTransport::new()
        .reply_all(
            AgentAction::HasysState,
            HostReply::ok("#System Attribute Value\ndb-1 SysState RUNNING\ndb-2 SysState RUNNING\n"),
        )
        .reply_all(AgentAction::BootPartitionTest, HostReply::failed(0, "", "512 bytes copied"))
        .reply_all(AgentAction::PhysicalVolumeScan, HostReply::ok("/dev/mapper/mpatha vg_app\n"))
        .reply_all(
            AgentAction::GetLvmConfGlobalFilter,
            HostReply::ok("global_filter = [ \"r|^/dev/sd.*|\" ]"),
        )
        .reply_all(AgentAction::GetCountDmsetupDepsNonDm, HostReply::ok(non_dm))
}

#[tokio::test]
async fn test_storage_setup_passes_on_multipathed_nodes() {
    let h = Setup {
        mock: storage_mock("0"),
        ..Setup::default()
    }
    .build();
    let report = h.run(&[PrecheckAction::StorageSetupCheck]).await;
    assert!(report.succeeded(), "{:?}", report.lines());
    assert_eq!(h.mock.count(AgentAction::BootPartitionCleanup), 2);
    assert!(!h.mock.called(AgentAction::UpdateLvmConfGlobalFilter));
    assert!(!h.mock.called(AgentAction::StopVcsAndReboot));
}

#[tokio::test]
async fn test_storage_setup_reboot_declined_fails() {
    let h = Setup {
        mock: storage_mock("2"),
        confirm: Arc::new(AssumeNo),
        ..Setup::default()
    }
    .build();
    let report = h.run(&[PrecheckAction::StorageSetupCheck]).await;
    assert!(report.lines()[1].contains("NON_MULTIPATHED_VOLUMES_PRESENT"));
    assert!(!h.mock.called(AgentAction::StopVcsAndReboot));
}

#[tokio::test]
async fn test_storage_setup_is_skipped_on_virtual_platforms() {
    let h = Setup {
        platform: Platform::default().with_virtual_provider(Some(VirtualProvider::Kvm)),
        ..Setup::default()
    }
    .build();
    let report = h.run(&[PrecheckAction::StorageSetupCheck]).await;
    assert!(report.lines()[0].starts_with("SKIPPED: "));
    assert!(h.mock.calls().is_empty());
}

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

// tests/agents.rs
// Agent facades driven through the scripted transport.

use std::sync::Arc;
use std::time::Duration;

use mco::testing::MockTransport;
use mco::{
    AgentAction, EnminstAgent, FileManagerAgent, HostCode, HostReply, Mco, PrecheckAgent,
    PuppetAgent, VcsCmdApiAgent,
};

fn facade(mock: MockTransport) -> (Arc<MockTransport>, Mco) {
    let mock = Arc::new(mock);
    (mock.clone(), Mco::new(mock))
}

// =============================================================================
// enminst
// =============================================================================

#[tokio::test]
async fn test_hagrp_display_parses_chunks() {
    let chunk = "#Group Attribute System Value\n\
                 Grp_CS_db_cluster_postgres State db-1 |ONLINE|\n\
                 Grp_CS_db_cluster_postgres State db-2 |OFFLINE|\n";
    let (mock, mco) = facade(MockTransport::new().reply(
        AgentAction::HagrpDisplay,
        "db-1",
        HostReply::structured(serde_json::json!([chunk])),
    ));
    let agent = EnminstAgent::new(mco);
    let data = agent
        .hagrp_display(&["Grp_CS_db_cluster_postgres".to_string()], "db-1")
        .await
        .unwrap();
    assert_eq!(data["Grp_CS_db_cluster_postgres"]["db-2"]["State"], "|OFFLINE|");
    let call = &mock.calls_for(AgentAction::HagrpDisplay)[0];
    assert_eq!(call.args["groups"], "Grp_CS_db_cluster_postgres");
}

#[tokio::test]
async fn test_hagrp_display_engine_down() {
    let (_, mco) = facade(MockTransport::new().reply(
        AgentAction::HagrpDisplay,
        "db-1",
        HostReply::structured(serde_json::json!([
            "Grp_CS_x VCS ERROR V-16-1-10600 Cannot connect to VCS engine"
        ])),
    ));
    let err = EnminstAgent::new(mco)
        .hagrp_display(&["Grp_CS_x".to_string()], "db-1")
        .await
        .unwrap_err();
    assert!(err.is_unreachable());
}

#[tokio::test]
async fn test_online_already_online_is_signalled() {
    let (_, mco) = facade(MockTransport::new().reply(
        AgentAction::HagrpOnline,
        "svc-1",
        HostReply::ok("VCS WARNING V-16-1-40229 Group is already online"),
    ));
    let err = EnminstAgent::new(mco)
        .hagrp_online("Grp_CS_svc_cluster_msap", "svc-1", false, "svc-1")
        .await
        .unwrap_err();
    assert_eq!(err.host_code(), Some(HostCode::AlreadyOnline));
}

#[tokio::test]
async fn test_persistent_freeze_opens_and_closes_config() {
    let (mock, mco) = facade(MockTransport::new().reply(
        AgentAction::HasysFreeze,
        "svc-1",
        HostReply::failed(1, "", "some other failure"),
    ));
    let err = EnminstAgent::new(mco)
        .hasys_freeze("svc-1", true, true)
        .await
        .unwrap_err();
    assert!(err.host_code().is_none());
    let haconf = mock.calls_for(AgentAction::Haconf);
    assert_eq!(haconf.len(), 2);
    assert_eq!(haconf[0].args["haaction"], "makerw");
    assert_eq!(haconf[1].args["haaction"], "dump");
    let freeze = &mock.calls_for(AgentAction::HasysFreeze)[0];
    assert_eq!(freeze.args["evacuate"], "true");
    assert_eq!(freeze.args["persistent"], "true");
}

#[tokio::test]
async fn test_freeze_already_frozen_is_tolerated() {
    let (mock, mco) = facade(MockTransport::new().reply(
        AgentAction::HagrpFreeze,
        "svc-1",
        HostReply::failed(1, "V-16-1-40200 Group is already frozen", ""),
    ));
    EnminstAgent::new(mco)
        .hagrp_freeze("Grp_CS_svc_cluster_msap", "svc-1", false)
        .await
        .unwrap();
    assert!(!mock.called(AgentAction::Haconf));
}

#[tokio::test]
async fn test_hagrp_list_deduplicates() {
    let (_, mco) = facade(MockTransport::new().reply(
        AgentAction::HagrpList,
        "svc-1",
        HostReply::ok("Grp_CS_a svc-1\nGrp_CS_a svc-2\nGrp_CS_b svc-1\n"),
    ));
    let groups = EnminstAgent::new(mco).hagrp_list("svc-1").await.unwrap();
    assert_eq!(groups, vec!["Grp_CS_a", "Grp_CS_b"]);
}

#[tokio::test]
async fn test_lvs_list_needs_every_host() {
    let (_, mco) = facade(MockTransport::new().silent("db-2"));
    let err = EnminstAgent::new(mco)
        .lvs_list(&["db-1".to_string(), "db-2".to_string()], "lv_name")
        .await
        .unwrap_err();
    assert!(err.is_unreachable());
}

// =============================================================================
// vcs_cmd_api
// =============================================================================

#[tokio::test]
async fn test_hagrp_wait_timeout_and_args() {
    let (mock, mco) = facade(MockTransport::new().reply(
        AgentAction::HagrpWait,
        "svc-1",
        HostReply::failed(1, "", "V-16-1-10805 Wait timed out"),
    ));
    let err = VcsCmdApiAgent::new(mco)
        .hagrp_wait("Grp_CS_svc_cluster_msap", "svc-1", "ONLINE", Duration::from_secs(30))
        .await
        .unwrap_err();
    assert!(err.is_wait_timeout());
    assert_eq!(err.exit_code(), model::ExitCode::VcsOperationTimedOut);
    let call = &mock.calls_for(AgentAction::HagrpWait)[0];
    assert_eq!(call.timeout, Duration::from_secs(35));
    assert_eq!(call.args["timeout"], "30");
    assert_eq!(call.args["node_name"], "svc-1");
}

// =============================================================================
// enm_precheck, filemanager, puppet
// =============================================================================

#[tokio::test]
async fn test_precheck_worker_returns_failed_payload() {
    let (_, mco) = facade(MockTransport::new().reply(
        AgentAction::BootPartitionTest,
        "db-1",
        HostReply::failed(1, "", "1+0 records in\n1+0 records out\n512 bytes copied"),
    ));
    let text = PrecheckAgent::new(mco).boot_partition_test("db-1").await.unwrap();
    assert!(text.contains("copied"));
}

#[tokio::test]
async fn test_precheck_worker_still_fails_on_silence() {
    let (_, mco) = facade(MockTransport::new().silent("db-1"));
    let err = PrecheckAgent::new(mco)
        .worker(AgentAction::PhysicalVolumeScan, "db-1")
        .await
        .unwrap_err();
    assert!(err.is_unreachable());
}

#[tokio::test]
async fn test_file_exists() {
    let (_, mco) = facade(
        MockTransport::new()
            .reply(AgentAction::FileExists, "db-1", HostReply::structured(serde_json::json!(true)))
            .reply(AgentAction::FileExists, "db-2", HostReply::ok("false")),
    );
    let found = FileManagerAgent::new(mco)
        .exists("/tmp/x", &["db-1".to_string(), "db-2".to_string()])
        .await
        .unwrap();
    assert!(found["db-1"]);
    assert!(!found["db-2"]);
}

#[tokio::test]
async fn test_puppet_status_reads_extra_fields() {
    let mut reply = HostReply::ok("");
    reply.data.out = serde_json::Value::Null;
    reply
        .data
        .extra
        .insert("enabled".to_string(), serde_json::json!(true));
    reply
        .data
        .extra
        .insert("applying".to_string(), serde_json::json!(false));
    let (_, mco) = facade(MockTransport::new().reply(AgentAction::PuppetStatus, "svc-1", reply));
    let status = PuppetAgent::new(mco)
        .status(&["svc-1".to_string()])
        .await
        .unwrap();
    assert!(status["svc-1"].enabled);
    assert!(!status["svc-1"].applying);
}

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

// tests/status.rs
// Joined group and system status views.

use std::sync::Arc;

use litp::ModelApi;
use litp::testing::FakeModel;
use mco::testing::MockTransport;
use mco::{AgentAction, HostReply, Mco};
use model::ExitCode;
use model::item::ItemState;
use model::vcs::{AvailabilityType, GroupState, ServiceState};
use vcs::{GroupFilter, Pattern, Vcs};

fn db_model() -> FakeModel {
    FakeModel::new()
        .with_node("db_cluster", "db_node1", "db-1")
        .with_node("db_cluster", "db_node2", "db-2")
        .with_service(
            "db_cluster",
            "postgres",
            ItemState::Applied,
            &[("active", "1"), ("standby", "1"), ("node_list", "db_node1,db_node2")],
        )
}

fn setup(model: FakeModel, mock: MockTransport) -> (Arc<MockTransport>, Vcs) {
    let mock = Arc::new(mock);
    let model: Arc<dyn ModelApi> = Arc::new(model);
    (mock.clone(), Vcs::new(model, Mco::new(mock)))
}

fn postgres_display(db1: &str, db2: &str, frozen: &str) -> HostReply {
    HostReply::structured(serde_json::json!([format!(
        "#Group Attribute System Value\n\
         Grp_CS_db_cluster_postgres Frozen global {frozen}\n\
         Grp_CS_db_cluster_postgres TFrozen global 0\n\
         Grp_CS_db_cluster_postgres Parallel global 0\n\
         Grp_CS_db_cluster_postgres State db-1 |{db1}|\n\
         Grp_CS_db_cluster_postgres State db-2 |{db2}|\n"
    )]))
}

#[tokio::test]
async fn test_group_status_join() {
    let (_, vcs) = setup(
        db_model(),
        MockTransport::new().reply_all(AgentAction::HagrpDisplay, postgres_display("ONLINE", "OFFLINE", "0")),
    );
    let rows = vcs.group_status(&GroupFilter::new(), false).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.avail == AvailabilityType::ActiveStandby));
    assert!(rows.iter().all(|r| r.group_state == GroupState::Ok));
    assert_eq!(rows[0].system, "db-1");
    assert_eq!(rows[0].state, ServiceState::Online);
    assert_eq!(rows[1].state, ServiceState::Offline);

    vcs.verify_group_status(&GroupFilter::new()).await.unwrap();
}

#[tokio::test]
async fn test_group_status_falls_back_to_next_system() {
    let (mock, vcs) = setup(
        db_model(),
        MockTransport::new()
            .silent("db-1")
            .reply(AgentAction::HagrpDisplay, "db-2", postgres_display("ONLINE", "ONLINE", "0")),
    );
    let rows = vcs.group_status(&GroupFilter::new(), false).await.unwrap();
    assert!(rows.iter().all(|r| r.group_state == GroupState::Invalid));
    assert_eq!(mock.count(AgentAction::HagrpDisplay), 2);
}

#[tokio::test]
async fn test_group_status_unreachable_cluster_is_synthetic() {
    let (_, vcs) = setup(db_model(), MockTransport::new().silent("db-1").silent("db-2"));
    let rows = vcs.group_status(&GroupFilter::new(), false).await.unwrap();
    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert_eq!(row.group, "-");
        assert_eq!(row.avail, AvailabilityType::NotApplicable);
        assert_eq!(row.state, ServiceState::Unknown);
        assert_eq!(row.group_state, GroupState::Invalid);
    }

    let err = vcs.verify_group_status(&GroupFilter::new()).await.unwrap_err();
    assert_eq!(err.exit_code(), ExitCode::InvalidVcsState);
}

#[tokio::test]
async fn test_initial_group_is_undefined_without_asking_vcs() {
    let model = FakeModel::new()
        .with_node("db_cluster", "db_node1", "db-1")
        .with_service(
            "db_cluster",
            "elasticsearch",
            ItemState::Initial,
            &[("node_list", "db_node1")],
        );
    let (mock, vcs) = setup(model, MockTransport::new());
    let rows = vcs.group_status(&GroupFilter::new(), false).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].state, ServiceState::Undefined);
    assert_eq!(rows[0].group_state, GroupState::Undefined);
    assert!(!mock.called(AgentAction::HagrpDisplay));
}

#[tokio::test]
async fn test_frozen_group_fails_verify() {
    let (_, vcs) = setup(
        db_model(),
        MockTransport::new().reply_all(AgentAction::HagrpDisplay, postgres_display("ONLINE", "OFFLINE", "1")),
    );
    let rows = vcs.group_status(&GroupFilter::new(), false).await.unwrap();
    assert!(rows.iter().all(|r| r.frozen.persistent));
    assert!(vcs.verify_group_status(&GroupFilter::new()).await.is_err());
}

#[tokio::test]
async fn test_group_status_column_filters() {
    let (_, vcs) = setup(
        db_model(),
        MockTransport::new().reply_all(AgentAction::HagrpDisplay, postgres_display("ONLINE", "OFFLINE", "0")),
    );
    let filter = GroupFilter::new().with_service_state(Pattern::new("OFFLINE").unwrap());
    let rows = vcs.group_status(&filter, false).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].system, "db-2");
}

// =============================================================================
// systems
// =============================================================================

#[tokio::test]
async fn test_system_status_engine_down() {
    let (_, vcs) = setup(
        db_model(),
        MockTransport::new().reply_all(
            AgentAction::HasysState,
            HostReply::failed(1, "", "VCS ERROR V-16-1-10600 Cannot connect to VCS engine"),
        ),
    );
    let rows = vcs.system_status(None).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.state == ServiceState::Exited));
    let err = vcs.verify_system_status(None).await.unwrap_err();
    assert_eq!(err.exit_code(), ExitCode::InvalidVcsState);
}

#[tokio::test]
async fn test_system_status_running() {
    let (mock, vcs) = setup(
        db_model(),
        MockTransport::new()
            .reply_all(
                AgentAction::HasysState,
                HostReply::ok("#System Attribute Value\ndb-1 SysState |RUNNING|\ndb-2 SysState |RUNNING|\n"),
            )
            .reply_all(
                AgentAction::HasysDisplay,
                HostReply::structured(serde_json::json!({
                    "db-1": "#System Attribute Value\ndb-1 Frozen 0\ndb-1 TFrozen 0\n",
                    "db-2": "#System Attribute Value\ndb-2 Frozen 0\ndb-2 TFrozen 1\n",
                })),
            ),
    );
    let rows = vcs.system_status(Some(&Pattern::new("db").unwrap())).await.unwrap();
    assert!(rows[0].is_ok());
    assert!(rows[1].frozen.temporary);
    assert_eq!(mock.count(AgentAction::HasysState), 1);
    assert!(vcs.verify_system_status(None).await.is_err());
}

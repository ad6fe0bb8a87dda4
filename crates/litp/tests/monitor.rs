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

// tests/monitor.rs
// Plan monitor state handling and tree helpers over the in-memory engine.

use std::sync::Arc;
use std::time::Duration;

use litp::testing::FakeModel;
use litp::{LitpError, ModelApi, PlanMonitor, PlanOptions, PlanState, tree};
use model::item::ItemState;

fn monitor(fake: Arc<FakeModel>) -> PlanMonitor {
    PlanMonitor::new(fake)
        .with_poll_interval(Duration::from_secs(10))
        .with_start_timeout(Duration::from_secs(300))
}

// =============================================================================
// Monitor
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_monitor_success() {
    let fake = Arc::new(FakeModel::new().with_plan(&[
        PlanState::Initial,
        PlanState::Running,
        PlanState::Running,
        PlanState::Successful,
    ]));
    monitor(fake).monitor(false).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_monitor_failed() {
    let fake = Arc::new(FakeModel::new().with_plan(&[PlanState::Running, PlanState::Failed]));
    let err = monitor(fake).monitor(false).await.unwrap_err();
    assert!(matches!(err, LitpError::PlanFailed));
    assert_eq!(err.exit_code(), model::ExitCode::PlanFailed);
}

#[tokio::test(start_paused = true)]
async fn test_monitor_stopped() {
    let fake = Arc::new(FakeModel::new().with_plan(&[PlanState::Running, PlanState::Stopping]));
    let err = monitor(fake).monitor(false).await.unwrap_err();
    assert!(matches!(err, LitpError::PlanStopped));
}

#[tokio::test(start_paused = true)]
async fn test_monitor_initial_times_out() {
    let fake = Arc::new(FakeModel::new().with_plan(&[PlanState::Initial]));
    let started = tokio::time::Instant::now();
    let err = monitor(fake).monitor(false).await.unwrap_err();
    assert!(matches!(err, LitpError::PlanStartTimeout { ref state, .. } if state == "Initial"));
    assert!(started.elapsed() >= Duration::from_secs(300));
}

#[tokio::test(start_paused = true)]
async fn test_monitor_resume_waits_for_failed_to_change() {
    let fake = Arc::new(FakeModel::new().with_plan(&[
        PlanState::Failed,
        PlanState::Failed,
        PlanState::Running,
        PlanState::Successful,
    ]));
    monitor(fake).monitor(true).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_monitor_failure_after_resume_started() {
    let fake = Arc::new(FakeModel::new().with_plan(&[
        PlanState::Failed,
        PlanState::Running,
        PlanState::Failed,
    ]));
    let err = monitor(fake).monitor(true).await.unwrap_err();
    assert!(matches!(err, LitpError::PlanFailed));
}

#[tokio::test(start_paused = true)]
async fn test_create_run_monitor() {
    let fake = Arc::new(FakeModel::new().with_plan_script(&[PlanState::Running, PlanState::Successful]));
    assert!(fake.create_plan_if_needed(&PlanOptions::default()).await.unwrap());
    fake.run_plan(false).await.unwrap();
    monitor(fake.clone()).monitor(false).await.unwrap();
    assert_eq!(fake.count("create_plan"), 1);
}

// =============================================================================
// Tree helpers
// =============================================================================

fn deployment() -> FakeModel {
    FakeModel::new()
        .with_node("db_cluster", "db-1", "ieatrcxb1")
        .with_node("db_cluster", "db-2", "ieatrcxb2")
        .with_node("svc_cluster", "svc-1", "ieatrcxb3")
        .with_service(
            "svc_cluster",
            "msap",
            ItemState::Applied,
            &[("active", "1"), ("standby", "0"), ("node_list", "svc-1")],
        )
        .with_item("/infrastructure/storage/storage_providers/san1", "san-emc", ItemState::Applied, &[("san_type", "vnx")])
        .with_item("/infrastructure/storage/storage_providers/san2", "san-emc", ItemState::Initial, &[("san_type", "unity")])
}

#[tokio::test]
async fn test_cluster_nodes_and_counts() {
    let fake = deployment();
    let nodes = tree::cluster_nodes(&fake).await.unwrap();
    assert_eq!(nodes["db_cluster"].len(), 2);
    assert_eq!(tree::count_nodes_and_clusters(&fake).await.unwrap(), (3, 2));
    let hostnames = tree::node_hostnames(&fake).await.unwrap();
    assert_eq!(hostnames["svc-1"], "ieatrcxb3");
    let clusters = tree::deployment_clusters(&fake).await.unwrap();
    assert_eq!(clusters["enm"], vec!["db_cluster", "svc_cluster"]);
}

#[tokio::test]
async fn test_items_by_type() {
    let fake = deployment();
    let applied = tree::items_by_type(&fake, "/infrastructure", "san-emc", true)
        .await
        .unwrap();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].property("san_type"), Some("vnx"));
    let all = tree::items_by_type(&fake, "/infrastructure", "san-emc", false)
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn test_all_items_depth_first() {
    let fake = deployment();
    let items = tree::all_items(&fake, "/deployments").await.unwrap();
    assert_eq!(items[0].path, "/deployments");
    assert!(items.iter().all(|i| i.children.is_empty()));
    assert!(items.iter().any(|i| i.path == "/deployments/enm/clusters/svc_cluster/services/msap"));
}

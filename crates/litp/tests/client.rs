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

// tests/client.rs
// REST client behaviour against a mock engine.

use std::time::Duration;

use litp::{LitpClient, LitpErrorKind, ModelApi, PlanOptions, PlanState, props};
use mockito::{Matcher, Server};
use serde_json::json;

fn client(server: &Server) -> LitpClient {
    LitpClient::new(server.url(), "litp-admin", Some("pw".into()))
        .unwrap()
        .with_retries(0, Duration::from_millis(1))
}

fn hal(server: &Server, path: &str, item_type: &str, state: &str, props: serde_json::Value) -> serde_json::Value {
    json!({
        "id": path.rsplit('/').next().unwrap(),
        "item-type-name": item_type,
        "state": state,
        "properties": props,
        "_links": {"self": {"href": format!("{}/litp/rest/v1{}", server.url(), path)}}
    })
}

// =============================================================================
// Items
// =============================================================================

#[tokio::test]
async fn test_get_with_children() {
    let mut server = Server::new_async().await;
    let mut body = hal(&server, "/deployments/enm/clusters/db_cluster/nodes", "collection-of-node", "Applied", json!({}));
    body["_embedded"] = json!({"item": [
        hal(&server, "/deployments/enm/clusters/db_cluster/nodes/db-1", "node", "Applied",
            json!({"hostname": "ieatrcxb1", "is_locked": "false"})),
        hal(&server, "/deployments/enm/clusters/db_cluster/nodes/db-2", "node", "Initial",
            json!({"hostname": "ieatrcxb2"})),
    ]});
    let mock = server
        .mock("GET", "/litp/rest/v1/deployments/enm/clusters/db_cluster/nodes")
        .match_header("authorization", Matcher::Regex("^Basic ".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await;

    let nodes = client(&server)
        .get_children("/deployments/enm/clusters/db_cluster/nodes")
        .await
        .unwrap();
    mock.assert_async().await;
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0].path, "/deployments/enm/clusters/db_cluster/nodes/db-1");
    assert_eq!(nodes[0].property("hostname"), Some("ieatrcxb1"));
    assert!(nodes[1].is_initial());
}

#[tokio::test]
async fn test_exists_maps_not_found() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/litp/rest/v1/ms/services/missing")
        .with_status(404)
        .with_body(r#"{"messages": [{"type": "InvalidLocationError", "message": "Not found"}]}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/litp/rest/v1/ms")
        .with_status(200)
        .with_body(hal(&server, "/ms", "ms", "Applied", json!({"hostname": "ms-1"})).to_string())
        .create_async()
        .await;

    let client = client(&server);
    assert!(!client.exists("/ms/services/missing").await.unwrap());
    assert!(client.exists("/ms").await.unwrap());
}

#[tokio::test]
async fn test_create_refuses_existing_path() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/litp/rest/v1/ms/items/pkg")
        .with_status(200)
        .with_body(hal(&server, "/ms/items/pkg", "package", "Applied", json!({})).to_string())
        .create_async()
        .await;
    let post = server
        .mock("POST", "/litp/rest/v1/ms/items")
        .expect(0)
        .create_async()
        .await;

    let err = client(&server)
        .create("/ms/items", "pkg", "package", &props([("name", "pkg")]))
        .await
        .unwrap_err();
    assert!(err.is_conflict());
    post.assert_async().await;
}

#[tokio::test]
async fn test_create_posts_item() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/litp/rest/v1/ms/items/pkg")
        .with_status(404)
        .with_body(r#"{"messages": [{"type": "InvalidLocationError", "message": "Not found"}]}"#)
        .create_async()
        .await;
    let post = server
        .mock("POST", "/litp/rest/v1/ms/items")
        .match_body(Matcher::Json(json!({
            "id": "pkg", "type": "package", "properties": {"name": "pkg"}
        })))
        .with_status(201)
        .with_body("{}")
        .create_async()
        .await;

    let path = client(&server)
        .create("/ms/items", "pkg", "package", &props([("name", "pkg")]))
        .await
        .unwrap();
    assert_eq!(path, "/ms/items/pkg");
    post.assert_async().await;
}

#[tokio::test]
async fn test_delete_property_puts_null() {
    let mut server = Server::new_async().await;
    let path = "/deployments/enm/clusters/svc_cluster/services/cmserv";
    server
        .mock("GET", format!("/litp/rest/v1{path}").as_str())
        .with_status(200)
        .with_body(hal(&server, path, "vcs-clustered-service", "Applied",
                       json!({"deactivated": "true", "active": "2"})).to_string())
        .create_async()
        .await;
    let put = server
        .mock("PUT", format!("/litp/rest/v1{path}").as_str())
        .match_body(Matcher::Json(json!({"properties": {"deactivated": null}})))
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let client = client(&server);
    assert!(client.delete_property(path, "deactivated").await.unwrap());
    assert!(!client.delete_property(path, "dependency_list").await.unwrap());
    put.assert_async().await;
}

#[tokio::test]
async fn test_load_xml_merges() {
    let mut server = Server::new_async().await;
    let load = server
        .mock("POST", "/litp/xml/deployments")
        .match_query(Matcher::UrlEncoded("merge".into(), "true".into()))
        .match_header("content-type", "application/xml")
        .match_body("<litp:deployment id=\"enm\"/>")
        .with_status(201)
        .create_async()
        .await;

    client(&server)
        .load_xml("/deployments", "  <litp:deployment id=\"enm\"/>\n", true)
        .await
        .unwrap();
    load.assert_async().await;
}

// =============================================================================
// Plans
// =============================================================================

#[tokio::test]
async fn test_create_plan_do_nothing() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/litp/rest/v1/plans")
        .match_body(Matcher::Json(json!({"id": "plan", "type": "plan"})))
        .with_status(422)
        .with_body(r#"{"messages": [{"type": "DoNothingPlanError",
                       "message": "Create plan failed: no tasks were generated"}]}"#)
        .create_async()
        .await;

    let client = client(&server);
    let err = client.create_plan(&PlanOptions::default()).await.unwrap_err();
    assert!(err.is_do_nothing_plan());
    assert!(!client.create_plan_if_needed(&PlanOptions::default()).await.unwrap());
}

#[tokio::test]
async fn test_run_plan_with_resume() {
    let mut server = Server::new_async().await;
    let put = server
        .mock("PUT", "/litp/rest/v1/plans/plan")
        .match_body(Matcher::Json(json!({"properties": {"state": "running", "resume": "true"}})))
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    client(&server).run_plan(true).await.unwrap();
    put.assert_async().await;
}

#[tokio::test]
async fn test_plan_state_and_running() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/litp/rest/v1/plans/plan")
        .with_status(200)
        .with_body(r#"{"id": "plan", "item-type-name": "plan", "properties": {"state": "stopping"}}"#)
        .create_async()
        .await;

    let client = client(&server);
    assert_eq!(client.plan_state().await.unwrap(), Some(PlanState::Stopping));
    assert!(client.is_plan_running().await.unwrap());
}

#[tokio::test]
async fn test_no_plan_is_not_running() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/litp/rest/v1/plans/plan")
        .with_status(404)
        .with_body(r#"{"messages": [{"type": "InvalidLocationError", "message": "Plan does not exist"}]}"#)
        .create_async()
        .await;

    assert!(!client(&server).is_plan_running().await.unwrap());
}

// =============================================================================
// Snapshots and maintenance
// =============================================================================

#[tokio::test]
async fn test_snapshot_verbs() {
    let mut server = Server::new_async().await;
    let create = server
        .mock("POST", "/litp/rest/v1/snapshots/snapshot")
        .match_body(Matcher::Json(json!({"type": "snapshot-base"})))
        .with_status(201)
        .with_body("{}")
        .create_async()
        .await;
    let remove = server
        .mock("PUT", "/litp/rest/v1/snapshots/snapshot")
        .match_body(Matcher::Json(json!({"properties": {"action": "remove", "force": "true"}})))
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;
    let mut list = hal(&server, "/snapshots", "collection-of-snapshot-base", "Applied", json!({}));
    list["_embedded"] = json!({"item": [
        hal(&server, "/snapshots/snapshot", "snapshot-base", "Applied", json!({})),
        hal(&server, "/snapshots/ombs", "snapshot-base", "Applied", json!({})),
    ]});
    server
        .mock("GET", "/litp/rest/v1/snapshots")
        .with_status(200)
        .with_body(list.to_string())
        .create_async()
        .await;

    let client = client(&server);
    client.create_snapshot("snapshot").await.unwrap();
    client.remove_snapshot("snapshot", true).await.unwrap();
    assert_eq!(client.list_snapshots().await.unwrap(), vec!["snapshot", "ombs"]);
    create.assert_async().await;
    remove.assert_async().await;
}

#[tokio::test]
async fn test_maintenance_mode_error_kind() {
    let mut server = Server::new_async().await;
    server
        .mock("PUT", "/litp/rest/v1/deployments/enm")
        .with_status(503)
        .with_body(r#"{"messages": [{"type": "ServerUnavailableError",
                       "message": "LITP is in maintenance mode"}]}"#)
        .create_async()
        .await;

    let err = client(&server)
        .update("/deployments/enm", &props([("x", "y")]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), Some(LitpErrorKind::MaintenanceMode));
    assert_eq!(err.exit_code(), model::ExitCode::LitpMaintenanceMode);
}

#[tokio::test]
async fn test_unreachable_engine() {
    let err = LitpClient::new("http://127.0.0.1:1", "litp-admin", None)
        .unwrap()
        .with_retries(0, Duration::from_millis(1))
        .get("/")
        .await
        .unwrap_err();
    assert!(matches!(err, litp::LitpError::Request { .. }));
}

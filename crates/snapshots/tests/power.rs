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

// tests/power.rs
// Power choreography of a restore against the in-memory BMC.

use std::sync::Arc;
use std::time::Duration;

use bmc::testing::FakeBmc;
use bmc::{PowerDriver, PowerState, ResetType};
use model::blade::{BladeCredential, BladeInfo};
use runtime::WorkerPool;
use snapshots::{NodePower, PowerOrder, PowerTimings, SnapshotError};
use tokio::time::Instant;

fn ilo(node: &str) -> String {
    format!("ilo-{node}")
}

fn blades(ids: &[&str]) -> BladeInfo {
    ids.iter()
        .map(|id| {
            (
                id.to_string(),
                BladeCredential {
                    cluster: String::new(),
                    hostname: format!("host-{id}"),
                    username: "root".into(),
                    iloaddress: ilo(id),
                    password: "secret".into(),
                },
            )
        })
        .collect()
}

fn bmc_with(ids: &[&str], state: PowerState) -> Arc<FakeBmc> {
    Arc::new(
        ids.iter()
            .fold(FakeBmc::new(), |bmc, id| bmc.powered(ilo(id), state)),
    )
}

// a single worker keeps the parallel phases in submission order
fn power(bmc: Arc<FakeBmc>) -> NodePower {
    NodePower::new(PowerDriver::new(bmc), WorkerPool::new(1), PowerTimings::default())
}

fn addresses(bmc: &FakeBmc, reset: ResetType) -> Vec<String> {
    bmc.resets()
        .into_iter()
        .filter(|(_, r)| *r == reset)
        .map(|(a, _)| a)
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_leads_with_expansion_db_node() {
    let ids = ["db-1", "db-2", "db-3", "db-4", "svc-1"];
    let bmc = bmc_with(&ids, PowerState::On);
    let nodes = blades(&ids);
    let snapped = blades(&["db-1", "db-2", "db-3", "svc-1"]);
    let order = PowerOrder::new(true).shutdown(&nodes, Some(&snapped));

    let started = Instant::now();
    power(bmc.clone()).shutdown(&order, &nodes).await.unwrap();

    assert!(started.elapsed() >= Duration::from_secs(85));
    assert_eq!(
        addresses(&bmc, ResetType::ForceOff),
        vec![ilo("db-4"), ilo("db-1"), ilo("db-2"), ilo("db-3"), ilo("svc-1")]
    );
    for id in ids {
        assert_eq!(bmc.state(&ilo(id)), Some(PowerState::Off));
    }
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_without_snapshot_record_has_no_settle_wait() {
    let ids = ["db-1", "db-3", "db-4", "svc-1"];
    let bmc = bmc_with(&ids, PowerState::On);
    let nodes = blades(&ids);
    let order = PowerOrder::new(true).shutdown(&nodes, None);
    assert!(order.leading.is_empty());

    let started = Instant::now();
    power(bmc.clone()).shutdown(&order, &nodes).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(85));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_tolerates_nodes_already_off_and_reports_failures() {
    let bmc = Arc::new(
        FakeBmc::new()
            .powered(ilo("db-1"), PowerState::Off)
            .powered(ilo("svc-1"), PowerState::On)
            .powered(ilo("svc-2"), PowerState::On)
            .broken(ilo("svc-2")),
    );
    let nodes = blades(&["db-1", "svc-1", "svc-2"]);
    let order = PowerOrder::new(false).shutdown(&nodes, None);

    let err = power(bmc.clone()).shutdown(&order, &nodes).await.unwrap_err();
    match err {
        SnapshotError::Power { action, failures } => {
            assert_eq!(action, "Power off");
            assert_eq!(failures.len(), 1);
            assert!(failures[0].starts_with("svc-2"));
        }
        other => panic!("unexpected error {other}"),
    }
    assert_eq!(bmc.state(&ilo("svc-1")), Some(PowerState::Off));
    assert!(!addresses(&bmc, ResetType::ForceOff).contains(&ilo("db-1")));
}

#[tokio::test(start_paused = true)]
async fn test_start_defers_db2_then_starts_the_rest() {
    let ids = ["db-1", "db-2", "db-3", "svc-1", "svc-2"];
    let bmc = bmc_with(&ids, PowerState::Off);
    let nodes = blades(&ids);
    let order = PowerOrder::new(true).start(&nodes, None, &BladeInfo::new());

    let started = Instant::now();
    power(bmc.clone()).start(&order, &nodes, false).await.unwrap();

    assert!(started.elapsed() >= Duration::from_secs(300 + 30));
    assert_eq!(
        addresses(&bmc, ResetType::On),
        vec![ilo("db-1"), ilo("db-3"), ilo("db-2"), ilo("svc-1"), ilo("svc-2")]
    );
}

#[tokio::test(start_paused = true)]
async fn test_start_fails_on_node_already_on() {
    let bmc = Arc::new(
        FakeBmc::new()
            .powered(ilo("db-1"), PowerState::On)
            .powered(ilo("svc-1"), PowerState::Off),
    );
    let nodes = blades(&["db-1", "svc-1"]);
    let order = PowerOrder::new(false).start(&nodes, None, &BladeInfo::new());

    let err = power(bmc.clone()).start(&order, &nodes, false).await.unwrap_err();
    assert!(err.to_string().contains("db-1"), "{err}");
    assert!(bmc.resets().is_empty());

    power(bmc.clone()).start(&order, &nodes, true).await.unwrap();
    assert_eq!(bmc.state(&ilo("svc-1")), Some(PowerState::On));
}

#[tokio::test(start_paused = true)]
async fn test_node_without_credentials_is_a_failure() {
    let bmc = bmc_with(&["db-1"], PowerState::On);
    let err = power(bmc)
        .power_off_node("db-9", &blades(&["db-1"]))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("db-9"), "{err}");
}

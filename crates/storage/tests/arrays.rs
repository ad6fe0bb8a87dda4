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

// tests/arrays.rs
// SAN and NAS tiers driven through the in-memory arrays.

use std::sync::Arc;
use std::time::Duration;

use litp::testing::FakeModel;
use model::item::ItemState;
use runtime::RunStateStore;
use runtime::state::{NAS_FS_BKUP, NAS_SHARES_BKUP, SAN_LUNS_BKUP};
use storage::nas::NasType;
use storage::testing::{FakeNas, FakeSan};
use storage::{NasTier, SanTier, SnapshotTier, StorageError};
use tempfile::TempDir;

fn san_model() -> FakeModel {
    FakeModel::new()
        .with_item(
            "/infrastructure/systems/db1/disks/lun0",
            "lun-disk",
            ItemState::Applied,
            &[("lun_name", "LITP2_ENM_db_1")],
        )
        .with_item(
            "/infrastructure/systems/db2/disks/lun0",
            "lun-disk",
            ItemState::Applied,
            &[("lun_name", "LITP2_ENM_versant_1")],
        )
        .with_item(
            "/infrastructure/systems/es/disks/lun0",
            "lun-disk",
            ItemState::Applied,
            &[("lun_name", "LITP2_ENM_elasticsearchdb")],
        )
}

fn san_array() -> FakeSan {
    FakeSan::default()
        .with_lun("ENM", "12", "LITP2_ENM_db_1")
        .with_lun("ENM", "13", "LITP2_ENM_versant_1")
        .with_lun("ENM", "14", "LITP2_ENM_elasticsearchdb")
        .with_lun("ENM", "15", "unmodelled")
        .with_lun("OTHER", "20", "LITP2_ENM_db_1")
}

fn san_tier(array: FakeSan, dir: &TempDir) -> (Arc<FakeSan>, RunStateStore, SanTier) {
    let array = Arc::new(array);
    let state = RunStateStore::new(dir.path());
    let tier = SanTier::new(array.clone(), Arc::new(san_model()), state.clone(), "ENM", "Snapshot");
    (array, state, tier)
}

// =============================================================================
// SAN
// =============================================================================

#[tokio::test]
async fn test_san_snappable_luns_excludes() {
    let dir = TempDir::new().unwrap();
    let (_, _, tier) = san_tier(san_array(), &dir);
    let luns = tier.snappable_luns(false).await.unwrap();
    assert_eq!(luns.keys().collect::<Vec<_>>(), vec!["12", "13"]);

    let tier = tier.with_dps_uses_neo4j(true);
    let luns = tier.snappable_luns(false).await.unwrap();
    assert_eq!(luns.keys().collect::<Vec<_>>(), vec!["12"]);
    let luns = tier.snappable_luns(true).await.unwrap();
    assert_eq!(luns.keys().collect::<Vec<_>>(), vec!["12", "13"]);
}

#[tokio::test]
async fn test_san_create_and_validate() {
    let dir = TempDir::new().unwrap();
    let (array, state, tier) = san_tier(san_array(), &dir);
    tier.create().await.unwrap();
    assert_eq!(array.snap_names(), vec!["Snapshot_12", "Snapshot_13"]);
    let ids: Vec<String> = state.load_json(SAN_LUNS_BKUP).unwrap().unwrap();
    assert_eq!(ids, vec!["12", "13"]);
    tier.validate().await.unwrap();
    assert_eq!(tier.list().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_san_create_refuses_existing() {
    let dir = TempDir::new().unwrap();
    let (array, _, tier) = san_tier(san_array().with_snap("12", "Snapshot_12"), &dir);
    let err = tier.create().await.unwrap_err();
    assert!(matches!(err, StorageError::SnapshotsExist { .. }));
    assert!(!array.called("snap_create"));
}

#[tokio::test]
async fn test_san_validate_missing_and_misnamed() {
    let dir = TempDir::new().unwrap();
    let (_, _, tier) = san_tier(san_array().with_snap("13", "Snapshot_old_13"), &dir);
    let err = tier.validate().await.unwrap_err();
    match err {
        StorageError::Invalid { problems, .. } => {
            assert_eq!(problems.len(), 2, "{problems:?}");
            assert!(problems[0].contains("LUN 12"));
            assert!(problems[1].contains("Snapshot_old_13"));
        }
        other => panic!("unexpected {other}"),
    }
}

#[tokio::test]
async fn test_san_restore_requires_one_snapshot_per_lun() {
    let dir = TempDir::new().unwrap();
    let array = san_array()
        .with_snap("12", "Snapshot_12")
        .with_snap("13", "Snapshot_13")
        .with_snap("13", "Snapshot_13_extra");
    let (array, _, tier) = san_tier(array, &dir);
    let err = tier.restore().await.unwrap_err();
    assert!(err.to_string().contains("More than one snapshot"), "{err}");
    assert!(!array.called("snap_restore"));
}

#[tokio::test]
async fn test_san_restore_then_remove_backups() {
    let dir = TempDir::new().unwrap();
    let array = san_array()
        .with_snap("12", "Snapshot_12")
        .with_snap("13", "Snapshot_13");
    let (array, _, tier) = san_tier(array, &dir);
    tier.restore().await.unwrap();
    assert!(array.called("snap_restore 12 Snapshot_12 enm_upgrade_bkup_12"));
    assert!(array.snap_names().contains(&"enm_upgrade_bkup_13".to_string()));

    tier.remove_restore_backups().await.unwrap();
    assert_eq!(array.snap_names(), vec!["Snapshot_12", "Snapshot_13"]);
}

#[tokio::test]
async fn test_san_restore_reports_failed_luns() {
    let dir = TempDir::new().unwrap();
    let array = san_array()
        .with_snap("12", "Snapshot_12")
        .with_snap("13", "Snapshot_13")
        .fail("snap_restore 13");
    let (array, _, tier) = san_tier(array, &dir);
    let err = tier.restore().await.unwrap_err();
    assert!(err.to_string().contains("13/LITP2_ENM_versant_1"), "{err}");
    assert!(array.called("snap_restore 12"));
}

#[tokio::test]
async fn test_san_remove_uses_recorded_luns() {
    let dir = TempDir::new().unwrap();
    let array = san_array()
        .with_snap("12", "Snapshot_12")
        .with_snap("15", "Snapshot_15");
    let (array, state, tier) = san_tier(array, &dir);
    state.save_json(SAN_LUNS_BKUP, &["12"]).unwrap();
    tier.remove().await.unwrap();
    assert_eq!(array.snap_names(), vec!["Snapshot_15"]);
    assert!(!state.exists(SAN_LUNS_BKUP));
}

#[tokio::test]
async fn test_san_scrub_blade_luns() {
    let dir = TempDir::new().unwrap();
    let array = san_array()
        .with_lun("ENM", "31", "LITP2_ENM_db_3_data")
        .with_storage_group("ENM-enm-db_cluster-db-3", &[(0, "12"), (1, "31"), (2, "14")]);
    let (array, _, tier) = san_tier(array, &dir);
    let deleted = tier
        .scrub_blade_luns("ENM-enm-db_cluster-db-3", &["12".to_string()])
        .await
        .unwrap();
    assert_eq!(deleted, vec!["31"]);
    assert!(array.storage_group("ENM-enm-db_cluster-db-3").is_empty());
    let ids = array.lun_ids();
    assert!(ids.contains(&"12".to_string()));
    assert!(ids.contains(&"14".to_string()), "excluded LUN kept");
    assert!(!ids.contains(&"31".to_string()));

    let none = tier.scrub_blade_luns("no-such-group", &[]).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_san_delete_lun_refused_with_snapshots() {
    let dir = TempDir::new().unwrap();
    let array = san_array()
        .with_snap("15", "Snapshot_15")
        .with_storage_group("db-3", &[(3, "15")]);
    let (array, _, tier) = san_tier(array, &dir);
    let err = tier.scrub_blade_luns("db-3", &[]).await.unwrap_err();
    assert!(err.to_string().contains("still has snapshots"), "{err}");
    assert!(array.storage_group("db-3").is_empty());
    assert!(array.lun_ids().contains(&"15".to_string()));
}

// =============================================================================
// NAS
// =============================================================================

const POOL: &str = "ENM";

fn nas_model() -> FakeModel {
    let fs = "/infrastructure/storage/storage_providers/sfs/pools/enm/file_systems";
    FakeModel::new()
        .with_item(
            &format!("{fs}/data"),
            "sfs-filesystem",
            ItemState::Applied,
            &[("path", "/vx/ENM-data"), ("snap_size", "10")],
        )
        .with_item(
            &format!("{fs}/amos"),
            "sfs-filesystem",
            ItemState::Applied,
            &[("path", "/vx/ENM-amos"), ("snap_size", "0")],
        )
        .with_item(
            &format!("{fs}/gone"),
            "sfs-filesystem",
            ItemState::Applied,
            &[("path", "/vx/ENM-gone"), ("snap_size", "5")],
        )
}

fn nas(fake: FakeNas, dir: &TempDir) -> (Arc<FakeNas>, RunStateStore, NasTier) {
    let fake = Arc::new(fake);
    let state = RunStateStore::new(dir.path());
    let tier = NasTier::new(fake.clone(), Arc::new(nas_model()), state.clone(), POOL, "Snapshot")
        .with_share_retry_delay(Duration::ZERO);
    (fake, state, tier)
}

fn nas_array() -> FakeNas {
    FakeNas::new(NasType::Veritas)
        .with_fs("ENM-data", 102_400.0)
        .with_fs("ENM-amos", 1024.0)
        .with_fs("OTHER-data", 1024.0)
        .with_share("ENM-data", "10.1.1.5", "rw,no_root_squash")
}

#[tokio::test]
async fn test_nas_create_builds_cache_and_rollbacks() {
    let dir = TempDir::new().unwrap();
    let (fake, state, tier) = nas(nas_array(), &dir);
    tier.create().await.unwrap();
    assert!(fake.called("cache_create ENM-cache 10G ENM"));
    assert_eq!(fake.rollback_names(), vec!["Snapshot-ENM-data"]);
    assert!(state.exists(NAS_FS_BKUP));
    assert!(state.exists(NAS_SHARES_BKUP));
    tier.validate().await.unwrap();
}

#[tokio::test]
async fn test_nas_unity_has_no_cache() {
    let dir = TempDir::new().unwrap();
    let fake = FakeNas::new(NasType::UnityXt).with_fs("ENM-data", 2048.0);
    let (fake, _, tier) = nas(fake, &dir);
    tier.create().await.unwrap();
    assert!(!fake.called("cache_create"));
    assert!(fake.called("rollback_create Snapshot-ENM-data ENM-data -"));
    tier.validate().await.unwrap();
}

#[tokio::test]
async fn test_nas_create_nothing_to_snap() {
    let dir = TempDir::new().unwrap();
    let (_, _, tier) = nas(FakeNas::default().with_fs("ENM-amos", 10.0), &dir);
    let err = tier.create().await.unwrap_err();
    assert!(matches!(err, StorageError::NothingToSnap { .. }));
}

#[tokio::test]
async fn test_nas_validate_full_cache() {
    let dir = TempDir::new().unwrap();
    let fake = nas_array()
        .with_rollback("ENM-data", "Snapshot-ENM-data")
        .with_cache("ENM-cache", 10240.0, 100.0);
    let (_, _, tier) = nas(fake, &dir);
    let err = tier.validate().await.unwrap_err();
    assert!(err.to_string().contains("is full"), "{err}");
}

#[tokio::test]
async fn test_nas_validate_high_usage_only_warns() {
    let dir = TempDir::new().unwrap();
    let fake = nas_array()
        .with_rollback("ENM-data", "Snapshot-ENM-data")
        .with_cache("ENM-cache", 10240.0, 85.0);
    let (_, _, tier) = nas(fake, &dir);
    tier.validate().await.unwrap();
}

#[tokio::test]
async fn test_nas_restore_readds_shares() {
    let dir = TempDir::new().unwrap();
    let fake = nas_array()
        .with_rollback("ENM-data", "Snapshot-ENM-data")
        .with_cache("ENM-cache", 10240.0, 5.0);
    let (fake, _, tier) = nas(fake, &dir);
    tier.restore().await.unwrap();
    let calls = fake.calls();
    let offline = calls.iter().position(|c| c == "fs_online ENM-data false").unwrap();
    let restore = calls.iter().position(|c| c == "rollback_restore ENM-data Snapshot-ENM-data").unwrap();
    let online = calls.iter().position(|c| c == "fs_online ENM-data true").unwrap();
    assert!(offline < restore && restore < online);
    assert_eq!(fake.shares().len(), 1);
    assert_eq!(fake.count("share_add"), 1);
}

#[tokio::test]
async fn test_nas_restore_share_retries_exhausted() {
    let dir = TempDir::new().unwrap();
    let fake = nas_array()
        .with_rollback("ENM-data", "Snapshot-ENM-data")
        .fail("share_add");
    let (fake, _, tier) = nas(fake, &dir);
    let err = tier.restore().await.unwrap_err();
    assert!(matches!(err, StorageError::Restore { .. }), "{err}");
    assert_eq!(fake.count("share_add"), 3);
}

#[tokio::test]
async fn test_nas_restore_rejects_multiple_rollbacks() {
    let dir = TempDir::new().unwrap();
    let fake = nas_array()
        .with_rollback("ENM-data", "Snapshot-ENM-data")
        .with_rollback("ENM-data", "Snapshot-ENM-data-2");
    let (fake, _, tier) = nas(fake, &dir);
    let err = tier.restore().await.unwrap_err();
    assert!(err.to_string().contains("More than one rollback"), "{err}");
    assert!(!fake.called("rollback_restore"));
}

#[tokio::test]
async fn test_nas_remove_destroys_rollbacks_and_cache() {
    let dir = TempDir::new().unwrap();
    let fake = nas_array()
        .with_rollback("ENM-data", "Snapshot-ENM-data")
        .with_rollback("OTHER-data", "Snapshot-OTHER-data")
        .with_cache("ENM-cache", 10240.0, 5.0);
    let (fake, state, tier) = nas(fake, &dir);
    state.save_json(NAS_SHARES_BKUP, &Vec::<String>::new()).unwrap();
    tier.remove().await.unwrap();
    assert_eq!(fake.rollback_names(), vec!["Snapshot-OTHER-data"]);
    assert!(fake.cache_names().is_empty());
    assert!(!state.exists(NAS_SHARES_BKUP));
}

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

// Command Structure - Baseline debug_assert() of the entire command.
// Argument Parsing  - Ensure actions and snapshot types parse correctly.
// Rendering         - Listing output per tier.

use clap::{CommandFactory, Parser};
use snapshots::{SnapType, SnapshotListing};
use storage::{SnapshotRecord, TierKind};

use super::args::*;
use super::cmds::render_listing;
use crate::output::OutputFormat;

// verify_cmd_structure runs a baseline clap debug_assert()
// to catch duplicate or inconsistent argument definitions.
#[test]
fn verify_cmd_structure() {
    Cmd::command().debug_assert();
}

/////////////////////////////////////////////////////////////////////////////
// Argument Parsing

// parse_create_defaults ensures create without a type addresses
// every tier.
#[test]
fn parse_create_defaults() {
    let cmd = Cmd::try_parse_from(["snapshots", "create"]).expect("should parse create");
    match cmd {
        Cmd::Create(args) => {
            assert_eq!(args.selector.snap_type, SnapType::All);
            assert!(args.selector.snap_name.is_none());
            assert!(args.lvm_snapsize.is_none());
        }
        _ => panic!("expected Create variant"),
    }
}

// parse_create_lvm_snapsize ensures the LVM size reaches create.
#[test]
fn parse_create_lvm_snapsize() {
    let cmd = Cmd::try_parse_from(["snapshots", "create", "--snap_type", "lvm", "--lvm_snapsize", "50"])
        .expect("should parse create with size");
    match cmd {
        Cmd::Create(args) => {
            assert_eq!(args.selector.snap_type, SnapType::Lvm);
            assert_eq!(args.lvm_snapsize, Some(50));
        }
        _ => panic!("expected Create variant"),
    }
}

// parse_deployment_alias ensures "deployment" selects the model
// snapshot like "litp".
#[test]
fn parse_deployment_alias() {
    let cmd = Cmd::try_parse_from([
        "snapshots",
        "restore",
        "--snap_type",
        "deployment",
        "--snap_name",
        "pre_upgrade",
        "--force",
    ])
    .expect("should parse restore");
    match cmd {
        Cmd::Restore(args) => {
            assert_eq!(args.selector.snap_type, SnapType::Litp);
            assert_eq!(args.selector.snap_name.as_deref(), Some("pre_upgrade"));
            assert!(args.force);
        }
        _ => panic!("expected Restore variant"),
    }
}

// parse_unknown_snap_type ensures an unknown tier is refused.
#[test]
fn parse_unknown_snap_type() {
    assert!(Cmd::try_parse_from(["snapshots", "list", "--snap_type", "tape"]).is_err());
}

// parse_list_detailed ensures --detailed is only a list flag.
#[test]
fn parse_list_detailed() {
    let cmd = Cmd::try_parse_from(["snapshots", "list", "--detailed"]).expect("should parse list");
    assert!(matches!(cmd, Cmd::List(List { detailed: true, .. })));
    assert!(Cmd::try_parse_from(["snapshots", "remove", "--detailed"]).is_err());
}

/////////////////////////////////////////////////////////////////////////////
// Rendering

fn listing() -> SnapshotListing {
    SnapshotListing {
        tiers: vec![
            (
                TierKind::LmsLvm,
                vec![
                    SnapshotRecord::new(TierKind::LmsLvm, "vg_root/lv_var", "Snapshot_lv_var")
                        .with_created("2026-10-01 10:00")
                        .with_usage(Some(12.25)),
                ],
            ),
            (TierKind::Nas, Vec::new()),
        ],
        deployment: vec!["snapshot".to_string()],
    }
}

#[test]
fn test_render_listing_table() {
    let out = render_listing(&listing(), false, OutputFormat::AsciiTable).unwrap();
    assert!(out.contains("LMS LVM snapshots:"));
    assert!(out.contains("Snapshot_lv_var"));
    assert!(!out.contains("12.2%"));
    assert!(out.contains("No NAS snapshots found"));
    assert!(out.contains("Deployment snapshots: snapshot"));

    let detailed = render_listing(&listing(), true, OutputFormat::AsciiTable).unwrap();
    assert!(detailed.contains("Usage"));
    assert!(detailed.contains("2026-10-01 10:00"));
}

#[test]
fn test_render_listing_json() {
    let out = render_listing(&listing(), false, OutputFormat::Json).unwrap();
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["deployment"][0], "snapshot");
    assert_eq!(value["tiers"]["LMS LVM"][0]["name"], "Snapshot_lv_var");
    assert_eq!(value["tiers"]["NAS"].as_array().map(Vec::len), Some(0));
}

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
// Argument Parsing  - Ensure filters, targets and timeouts parse correctly.

use std::time::Duration;

use clap::{CommandFactory, Parser};
use vcs::ViewType;

use super::args::*;

// verify_cmd_structure runs a baseline clap debug_assert()
// to catch duplicate short flags across the flattened groups.
#[test]
fn verify_cmd_structure() {
    Cmd::command().debug_assert();
}

/////////////////////////////////////////////////////////////////////////////
// Argument Parsing

// parse_groups_filters ensures every column filter and the report
// options reach the groups command.
#[test]
fn parse_groups_filters() {
    let cmd = Cmd::try_parse_from([
        "vcs", "groups", "-g", "Grp_CS_svc_cluster_.*", "-c", "svc_cluster", "-s", "svc-1", "-t",
        "parallel", "-a", "OK,Invalid", "-b", "ONLINE", "--sort", "System,Group", "--csv",
        "/tmp/groups.csv", "--vt", "x", "--uptime",
    ])
    .expect("should parse groups");
    let Cmd::Groups(args) = cmd else {
        panic!("expected Groups variant");
    };
    assert_eq!(args.filters.group.as_deref(), Some("Grp_CS_svc_cluster_.*"));
    assert_eq!(args.filters.avail_type.as_deref(), Some("parallel"));
    assert_eq!(args.report.view, ViewType::Both);
    assert!(args.uptime);

    let filter = args.filters.group_filter().expect("filters should compile");
    assert!(filter.cluster.is_some());
    assert!(filter.group_state.is_some());
    assert!(filter.service_state.is_some());
}

// parse_groups_bad_view ensures an unknown view type is refused.
#[test]
fn parse_groups_bad_view() {
    assert!(Cmd::try_parse_from(["vcs", "groups", "--vt", "q"]).is_err());
}

// parse_online_target ensures the group is required and the timeout
// is read in seconds.
#[test]
fn parse_online_target() {
    assert!(Cmd::try_parse_from(["vcs", "online"]).is_err());
    let cmd = Cmd::try_parse_from([
        "vcs",
        "online",
        "-g",
        "Grp_CS_svc_cluster_httpd",
        "-s",
        "svc-2",
        "-m",
        "120",
        "--autoclear",
    ])
    .expect("should parse online");
    let Cmd::Online(args) = cmd else {
        panic!("expected Online variant");
    };
    assert_eq!(args.target.timeout(), Some(Duration::from_secs(120)));
    assert!(args.autoclear);
    let (group, system, cluster) = args.target.patterns().expect("patterns should compile");
    assert_eq!(group.as_str(), "Grp_CS_svc_cluster_httpd");
    assert!(system.is_some());
    assert!(cluster.is_none());
}

// parse_freeze_needs_target ensures freeze names a group or a system.
#[test]
fn parse_freeze_needs_target() {
    assert!(Cmd::try_parse_from(["vcs", "freeze", "-p"]).is_err());
    let cmd = Cmd::try_parse_from(["vcs", "freeze", "-s", "db-1", "-p", "--evacuate"])
        .expect("should parse system freeze");
    assert!(matches!(
        cmd,
        Cmd::Freeze(Freeze { group: None, persistent: true, evacuate: true, .. })
    ));
}

// parse_lock_requires_system ensures lock and unlock need -s.
#[test]
fn parse_lock_requires_system() {
    assert!(Cmd::try_parse_from(["vcs", "lock"]).is_err());
    let cmd = Cmd::try_parse_from(["vcs", "unlock", "-s", "svc-1", "-m", "300"])
        .expect("should parse unlock");
    let Cmd::Unlock(args) = cmd else {
        panic!("expected Unlock variant");
    };
    assert_eq!(args.system, "svc-1");
    assert_eq!(args.timeout(), Some(Duration::from_secs(300)));
}

// parse_history_sort_by_date ensures sorting on Date switches to the
// chronological merge.
#[test]
fn parse_history_sort_by_date() {
    let cmd = Cmd::try_parse_from(["vcs", "history", "-c", "db_cluster", "--sort", "date"])
        .expect("should parse history");
    let Cmd::History(args) = cmd else {
        panic!("expected History variant");
    };
    assert!(args.sort_by_date());
    assert!(args.group_filter().expect("filter").cluster.is_some());
}

// parse_clear_without_group ensures clear accepts no group at all.
#[test]
fn parse_clear_without_group() {
    let cmd = Cmd::try_parse_from(["vcs", "clear", "-c", "svc_cluster"]).expect("should parse clear");
    assert!(matches!(cmd, Cmd::Clear(Clear { group: None, .. })));
}

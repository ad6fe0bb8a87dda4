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
// Argument Parsing  - Ensure snake and kebab action names parse.

use clap::{CommandFactory, Parser};
use prechecks::PrecheckAction;

use super::args::*;

// verify_cmd_structure runs a baseline clap debug_assert()
// to catch inconsistent argument definitions.
#[test]
fn verify_cmd_structure() {
    Cmd::command().debug_assert();
}

// parse_no_action ensures a bare run selects nothing explicitly,
// leaving the full prerequisite run to the engine.
#[test]
fn parse_no_action() {
    let cmd = Cmd::try_parse_from(["prechecks"]).expect("should parse without actions");
    assert!(cmd.actions.is_empty());
}

// parse_action_spellings ensures snake_case, kebab-case and comma
// separated lists all parse.
#[test]
fn parse_action_spellings() {
    let cmd = Cmd::try_parse_from([
        "prechecks",
        "--action",
        "storage_setup_check,elastic-search-status-check",
        "--action",
        "opendj_replication_check",
    ])
    .expect("should parse actions");
    assert_eq!(
        cmd.actions,
        vec![
            PrecheckAction::StorageSetupCheck,
            PrecheckAction::ElasticSearchStatusCheck,
            PrecheckAction::OpendjReplicationCheck,
        ]
    );
}

// parse_unknown_action ensures names outside the closed set are refused.
#[test]
fn parse_unknown_action() {
    assert!(Cmd::try_parse_from(["prechecks", "--action", "format_disks"]).is_err());
}

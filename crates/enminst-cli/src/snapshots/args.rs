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

use std::str::FromStr;

use clap::{Args, Parser};
use snapshots::SnapType;

fn parse_snap_type(value: &str) -> Result<SnapType, String> {
    SnapType::from_str(value)
        .map_err(|_| format!("'{value}' is not one of lvm, san, nas, litp, deployment or all"))
}

/// Which snapshots an action addresses.
#[derive(Args, Debug, Clone)]
pub struct SnapSelector {
    #[clap(
        long = "snap_type",
        default_value = "all",
        value_parser = parse_snap_type,
        help = "Snapshot tier: lvm, san, nas, litp (or deployment) or all"
    )]
    pub snap_type: SnapType,

    #[clap(long = "snap_name", help = "Name of the deployment model snapshot")]
    pub snap_name: Option<String>,
}

#[derive(Parser, Debug)]
pub enum Cmd {
    #[clap(about = "Take snapshots of the selected tiers")]
    Create(Create),
    #[clap(about = "List the snapshots of the selected tiers")]
    List(List),
    #[clap(about = "Check the snapshots of the selected tiers are usable")]
    Validate(SnapSelector),
    #[clap(about = "Roll the deployment back to its snapshots")]
    Restore(Restore),
    #[clap(about = "Remove the snapshots of the selected tiers")]
    Remove(Remove),
}

#[derive(Parser, Debug, Clone)]
pub struct Create {
    #[clap(flatten)]
    pub selector: SnapSelector,

    #[clap(long = "lvm_snapsize", help = "LVM snapshot size as a percentage of the volume")]
    pub lvm_snapsize: Option<u32>,
}

#[derive(Parser, Debug, Clone)]
pub struct List {
    #[clap(flatten)]
    pub selector: SnapSelector,

    #[clap(long, help = "Include creation time, usage and state")]
    pub detailed: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct Restore {
    #[clap(flatten)]
    pub selector: SnapSelector,

    #[clap(long, help = "Force the deployment model snapshot restore")]
    pub force: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct Remove {
    #[clap(flatten)]
    pub selector: SnapSelector,

    #[clap(long, help = "Force the deployment model snapshot removal")]
    pub force: bool,
}

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

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::output::OutputFormat;
use crate::{prechecks, snapshots, upgrade, vcs};

#[derive(Parser, Debug)]
#[clap(name = "enminst", version, about = "Upgrade, snapshot and operate an ENM deployment")]
pub struct CliOptions {
    #[clap(
        long,
        global = true,
        env = "ENMINST_CONFIG",
        help = "Configuration file, defaults to /opt/ericsson/enminst/etc/enminst.toml"
    )]
    pub config: Option<PathBuf>,

    #[clap(
        short,
        long,
        global = true,
        action = ArgAction::Count,
        help = "More output, repeat for trace level"
    )]
    pub verbose: u8,

    #[clap(short = 'y', long = "assumeyes", global = true, help = "Answer yes to every confirmation")]
    pub assumeyes: bool,

    #[clap(long, global = true, value_enum, default_value_t, help = "Format of printed reports")]
    pub format: OutputFormat,

    #[clap(long = "no_log_file", global = true, help = "Log to the terminal only")]
    pub no_log_file: bool,

    #[clap(subcommand)]
    pub commands: CliCommand,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    #[clap(about = "Upgrade the deployment with new software, OS patches or a new model")]
    Upgrade(upgrade::Cmd),
    #[clap(about = "Create, list, validate, restore or remove deployment snapshots", subcommand)]
    Snapshots(snapshots::Cmd),
    #[clap(about = "Show and control VCS service groups and systems", subcommand)]
    Vcs(vcs::Cmd),
    #[clap(about = "Run the upgrade prerequisite checks")]
    Prechecks(prechecks::Cmd),
}

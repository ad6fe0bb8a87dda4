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

//! The `enminst` command line. Each subcommand module parses its own
//! arguments (`args`), runs them against the shared [`cfg::runtime::CliContext`]
//! (`cmds`) and is tested for its argument surface (`tests`).

pub mod cfg;
pub mod errors;
pub mod output;
pub mod prechecks;
pub mod snapshots;
pub mod upgrade;
pub mod vcs;

use cfg::cli_options::CliCommand;
use cfg::dispatch::Dispatch;
use cfg::runtime::CliContext;
pub use errors::{CliResult, EnminstCliError};

impl Dispatch for CliCommand {
    async fn dispatch(self, ctx: CliContext) -> CliResult<()> {
        match self {
            CliCommand::Upgrade(cmd) => cmd.dispatch(ctx).await,
            CliCommand::Snapshots(cmd) => cmd.dispatch(ctx).await,
            CliCommand::Vcs(cmd) => cmd.dispatch(ctx).await,
            CliCommand::Prechecks(cmd) => cmd.dispatch(ctx).await,
        }
    }
}

pub async fn run(command: CliCommand, ctx: CliContext) -> CliResult<()> {
    command.dispatch(ctx).await
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use crate::cfg::cli_options::{CliCommand, CliOptions};
    use crate::output::OutputFormat;

    #[test]
    fn verify_cli_structure() {
        CliOptions::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let options = CliOptions::try_parse_from([
            "enminst",
            "upgrade",
            "--resume",
            "--assumeyes",
            "-vv",
            "--format",
            "json",
        ])
        .expect("should parse globals after the subcommand");
        assert!(options.assumeyes);
        assert_eq!(options.verbose, 2);
        assert_eq!(options.format, OutputFormat::Json);
        assert!(matches!(options.commands, CliCommand::Upgrade(ref cmd) if cmd.resume));
    }

    #[test]
    fn test_subcommands() {
        let options = CliOptions::try_parse_from(["enminst", "vcs", "systems", "-c", "db_cluster"])
            .expect("should parse vcs systems");
        assert!(matches!(options.commands, CliCommand::Vcs(crate::vcs::Cmd::Systems(_))));

        let options = CliOptions::try_parse_from(["enminst", "snapshots", "validate", "--snap_type", "san"])
            .expect("should parse snapshots validate");
        assert!(matches!(options.commands, CliCommand::Snapshots(crate::snapshots::Cmd::Validate(_))));

        assert!(CliOptions::try_parse_from(["enminst"]).is_err());
    }
}

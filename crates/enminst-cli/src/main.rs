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

use clap::Parser;
use enminst_cli::cfg::cli_options::CliOptions;
use enminst_cli::cfg::runtime::CliContext;
use eyre::WrapErr;
use model::ExitCode;
use runtime::logging::setup_logging;
use runtime::{Config, Platform};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let options = CliOptions::parse();

    let config = Config::load(options.config.as_deref()).wrap_err("loading configuration")?;
    let log_file = (!options.no_log_file).then(|| config.log_file());
    setup_logging(options.verbose, log_file.as_deref())?;

    let platform = Platform::detect();
    tracing::debug!(target: "enminst::cli", ?platform, "platform detected");

    let code = match CliContext::build(&options, config, platform) {
        Err(e) => {
            tracing::error!(target: "enminst::cli", "{e}");
            e.exit_code()
        }
        Ok(ctx) => {
            tokio::select! {
                result = enminst_cli::run(options.commands, ctx) => match result {
                    Ok(()) => ExitCode::Ok,
                    Err(e) => {
                        tracing::error!(target: "enminst::cli", code = e.exit_code().code(), "{e}");
                        e.exit_code()
                    }
                },
                _ = tokio::signal::ctrl_c() => {
                    tracing::warn!(target: "enminst::cli", "Interrupted, exiting");
                    ExitCode::Interrupted
                }
            }
        }
    };
    std::process::exit(code.code())
}

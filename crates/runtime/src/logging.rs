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

use std::path::Path;
use std::sync::Mutex;

use eyre::WrapErr;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::prelude::*;

/// Quiets chatty dependencies regardless of the chosen level.
pub fn dep_log_filter(env_filter: EnvFilter) -> EnvFilter {
    ["hyper=error", "hyper_util=error", "reqwest=warn", "rustls=warn", "h2=warn"]
        .iter()
        .fold(env_filter, |f, filter_str| match filter_str.parse() {
            Ok(directive) => f.add_directive(directive),
            Err(_) => f,
        })
}

pub fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Installs the global subscriber: human readable output on stderr plus,
/// when `log_file` is given, an appending plain-text copy of every event.
/// `RUST_LOG` overrides the level derived from `verbosity`.
pub fn setup_logging(verbosity: u8, log_file: Option<&Path>) -> eyre::Result<()> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(level_for(verbosity).into())
        .from_env_lossy();
    let env_filter = dep_log_filter(env_filter);

    let file_layer = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .wrap_err_with(|| format!("opening log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(file_layer)
        .with(env_filter)
        .try_init()
        .wrap_err("new tracing subscriber try_init()")?;

    tracing::debug!("current log level: {}", LevelFilter::current());
    Ok(())
}

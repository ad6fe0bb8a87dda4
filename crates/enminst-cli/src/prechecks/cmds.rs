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

use prechecks::PrecheckEngine;
use snapshots::StorageDiscovery;
use storage::san_adapter;

use super::args::Cmd;
use crate::cfg::runtime::CliContext;
use crate::errors::{CliResult, EnminstCliError};

pub async fn prechecks(cmd: Cmd, ctx: CliContext) -> CliResult<()> {
    let mut engine = PrecheckEngine::new(
        ctx.runtime.clone(),
        ctx.model.clone(),
        ctx.passwords.clone(),
        ctx.mco.clone(),
    )?;
    if !ctx.runtime.platform.is_virtual() {
        let discovery = StorageDiscovery::new(ctx.model.clone(), ctx.passwords.clone());
        if let Some(array) = discovery.san().await? {
            engine = engine.with_san(san_adapter(array.credentials, ctx.runtime.runner.clone()));
        }
    }
    let report = engine.run(&cmd.actions).await;
    match report.failure() {
        None => Ok(()),
        Some(failed) => Err(EnminstCliError::PrecheckFailed {
            check: failed.action.to_string(),
            code: report.exit_code(),
        }),
    }
}

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

use snapshots::SnapshotCoordinator;
use upgrade::{UpgradeOrchestrator, UpgradeOutcome};

use super::args::Cmd;
use crate::cfg::runtime::CliContext;
use crate::errors::CliResult;

pub async fn upgrade(cmd: Cmd, ctx: CliContext) -> CliResult<()> {
    let args = cmd.into_upgrade_args(ctx.assumeyes, ctx.verbose);
    let snapshots = SnapshotCoordinator::discover(
        &ctx.runtime,
        ctx.model.clone(),
        ctx.mco.clone(),
        ctx.bmc.clone(),
        ctx.passwords.clone(),
        args.lvm_snapsize,
    )
    .await?;
    let orchestrator = UpgradeOrchestrator::new(
        ctx.runtime.clone(),
        ctx.model.clone(),
        ctx.mco.clone(),
        ctx.bmc.clone(),
        ctx.passwords.clone(),
        snapshots,
    );
    match orchestrator.run(&args).await? {
        UpgradeOutcome::Completed => {
            tracing::info!(target: "enminst::cli", "ENM upgrade completed successfully")
        }
        UpgradeOutcome::RebootPending => tracing::info!(
            target: "enminst::cli",
            "The management server must reboot to finish OS patching, run the upgrade again once it is back"
        ),
        UpgradeOutcome::ModelSynced => {
            tracing::info!(target: "enminst::cli", "Site values written to the deployment model")
        }
    }
    Ok(())
}

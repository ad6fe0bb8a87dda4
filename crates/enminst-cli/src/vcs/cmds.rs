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

use model::vcs::{GroupStatusRow, SystemStatusRow};
use runtime::report::{TableRow, sort_rows};
use vcs::filter::matches;
use vcs::{GroupFilter, HistoryLine, Pattern, Vcs, ViewType};

use super::args::{Clear, Freeze, GroupTarget, Groups, History, Lock, Online, Systems, Unfreeze};
use crate::cfg::runtime::CliContext;
use crate::errors::{CliResult, EnminstCliError};
use crate::output::print_rows;

fn sort<R: TableRow>(rows: &mut [R], keys: Option<&str>, headers: &[&str]) -> CliResult<()> {
    match keys {
        Some(keys) if !sort_rows(rows, keys, headers) => Err(EnminstCliError::usage(format!(
            "Cannot sort on '{keys}', columns are {}",
            headers.join(", ")
        ))),
        _ => Ok(()),
    }
}

pub async fn groups(args: Groups, ctx: &CliContext) -> CliResult<()> {
    let vcs = ctx.vcs();
    let filter = args.filters.group_filter()?;
    let mut rows = vcs.group_status(&filter, args.uptime).await?;
    if args.report.view != ViewType::Vcs {
        args.report.view.apply_groups(&vcs.inventory().await?, &mut rows);
    }
    let headers = GroupStatusRow::headers(args.uptime);
    sort(&mut rows, args.report.sort.as_deref(), &headers)?;
    print_rows(ctx.format, &headers, &rows, args.report.csv.as_deref())
}

pub async fn systems(args: Systems, ctx: &CliContext) -> CliResult<()> {
    let vcs = ctx.vcs();
    let cluster = args.cluster.as_deref().map(Pattern::new).transpose()?;
    let system = args.system.as_deref().map(Pattern::new).transpose()?;
    let mut rows = vcs.system_status(cluster.as_ref()).await?;
    rows.retain(|r| matches(system.as_ref(), &r.system));
    if let Some(states) = &args.state {
        GroupFilter::new()
            .with_service_state(Pattern::any_of(states)?)
            .retain_systems(&mut rows);
    }
    if args.report.view != ViewType::Vcs {
        args.report.view.apply_systems(&vcs.inventory().await?, &mut rows);
    }
    let headers = SystemStatusRow::headers();
    sort(&mut rows, args.report.sort.as_deref(), &headers)?;
    print_rows(ctx.format, &headers, &rows, args.report.csv.as_deref())
}

pub async fn online(args: Online, vcs: &Vcs) -> CliResult<()> {
    let (group, system, cluster) = args.target.patterns()?;
    vcs.hagrp_online(&group, system.as_ref(), cluster.as_ref(), args.target.timeout(), args.autoclear)
        .await?;
    Ok(())
}

pub async fn offline(args: GroupTarget, vcs: &Vcs) -> CliResult<()> {
    let (group, system, cluster) = args.patterns()?;
    vcs.hagrp_offline(&group, system.as_ref(), cluster.as_ref(), args.timeout())
        .await?;
    Ok(())
}

pub async fn restart(args: Online, vcs: &Vcs) -> CliResult<()> {
    let (group, system, cluster) = args.target.patterns()?;
    vcs.hagrp_restart(&group, system.as_ref(), cluster.as_ref(), args.target.timeout(), args.autoclear)
        .await?;
    Ok(())
}

pub async fn switch(args: GroupTarget, vcs: &Vcs) -> CliResult<()> {
    let (group, system, cluster) = args.patterns()?;
    vcs.hagrp_switch(&group, system.as_ref(), cluster.as_ref(), args.timeout())
        .await?;
    Ok(())
}

pub async fn clear(args: Clear, vcs: &Vcs) -> CliResult<()> {
    let (group, system, cluster) = args.patterns()?;
    let cleared = vcs
        .hagrp_clear(group.as_ref(), system.as_ref(), cluster.as_ref())
        .await?;
    tracing::info!(target: "enminst::cli", cleared, "service groups cleared");
    Ok(())
}

pub async fn history(args: History, ctx: &CliContext) -> CliResult<()> {
    let filter = args.group_filter()?;
    let mut lines = ctx.vcs().history(&filter, args.sort_by_date()).await?;
    let headers = HistoryLine::headers();
    if !args.sort_by_date() {
        sort(&mut lines, args.sort.as_deref(), &headers)?;
    }
    print_rows(ctx.format, &headers, &lines, args.csv.as_deref())
}

pub async fn freeze(args: Freeze, vcs: &Vcs) -> CliResult<()> {
    let system = args.system.as_deref().map(Pattern::new).transpose()?;
    match (&args.group, system) {
        (Some(group), system) => {
            vcs.freeze_group(&Pattern::new(group)?, args.persistent, system.as_ref())
                .await?
        }
        (None, Some(system)) => vcs.freeze_system(&system, args.persistent, args.evacuate).await?,
        (None, None) => return Err(EnminstCliError::usage("a group or a system is required")),
    }
    Ok(())
}

pub async fn unfreeze(args: Unfreeze, vcs: &Vcs) -> CliResult<()> {
    let system = args.system.as_deref().map(Pattern::new).transpose()?;
    match (&args.group, system) {
        (Some(group), system) => {
            vcs.unfreeze_group(&Pattern::new(group)?, args.persistent, system.as_ref())
                .await?
        }
        (None, Some(system)) => vcs.unfreeze_system(&system, args.persistent).await?,
        (None, None) => return Err(EnminstCliError::usage("a group or a system is required")),
    }
    Ok(())
}

pub async fn lock(args: Lock, vcs: &Vcs) -> CliResult<()> {
    vcs.lock(&Pattern::new(&args.system)?, args.timeout()).await?;
    Ok(())
}

pub async fn unlock(args: Lock, vcs: &Vcs) -> CliResult<()> {
    vcs.unlock(&Pattern::new(&args.system)?, args.timeout()).await?;
    Ok(())
}

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

use std::collections::BTreeMap;

use runtime::report::{TableRow, render_ascii_table};
use serde::Serialize;
use snapshots::{SnapshotCoordinator, SnapshotListing};
use storage::SnapshotRecord;

use super::args::{Create, List, Remove, Restore, SnapSelector};
use crate::cfg::runtime::CliContext;
use crate::errors::{CliResult, EnminstCliError};
use crate::output::OutputFormat;

const RESTORE_PROMPT: &str = "Every ENM node will be powered off and the deployment rolled back to its snapshots. \
     Changes made since the snapshots were taken are lost. Continue?";

async fn coordinator(
    ctx: &CliContext,
    selector: &SnapSelector,
    lvm_snapsize: Option<u32>,
    force: bool,
) -> CliResult<SnapshotCoordinator> {
    let mut coordinator = SnapshotCoordinator::discover(
        &ctx.runtime,
        ctx.model.clone(),
        ctx.mco.clone(),
        ctx.bmc.clone(),
        ctx.passwords.clone(),
        lvm_snapsize,
    )
    .await?
    .with_force(force);
    if let Some(name) = &selector.snap_name {
        coordinator = coordinator.with_deployment_snapshot(name);
    }
    Ok(coordinator)
}

pub async fn create(args: Create, ctx: &CliContext) -> CliResult<()> {
    coordinator(ctx, &args.selector, args.lvm_snapsize, false)
        .await?
        .create(args.selector.snap_type)
        .await?;
    Ok(())
}

pub async fn list(args: List, ctx: &CliContext) -> CliResult<()> {
    let listing = coordinator(ctx, &args.selector, None, false)
        .await?
        .list(args.selector.snap_type)
        .await?;
    println!("{}", render_listing(&listing, args.detailed, ctx.format)?);
    Ok(())
}

pub async fn validate(args: SnapSelector, ctx: &CliContext) -> CliResult<()> {
    coordinator(ctx, &args, None, false).await?.validate(args.snap_type).await?;
    Ok(())
}

pub async fn restore(args: Restore, ctx: &CliContext) -> CliResult<()> {
    if !ctx.confirm(RESTORE_PROMPT, true) {
        return Err(EnminstCliError::Declined("snapshot restore cancelled".to_string()));
    }
    coordinator(ctx, &args.selector, None, args.force)
        .await?
        .restore(args.selector.snap_type)
        .await?;
    Ok(())
}

pub async fn remove(args: Remove, ctx: &CliContext) -> CliResult<()> {
    coordinator(ctx, &args.selector, None, args.force)
        .await?
        .remove(args.selector.snap_type)
        .await?;
    Ok(())
}

#[derive(Serialize)]
#[serde(transparent)]
struct SnapshotRow<'a>(&'a SnapshotRecord);

impl TableRow for SnapshotRow<'_> {
    fn cell(&self, column: &str) -> String {
        let record = self.0;
        match column {
            "Host" => record.host.clone().unwrap_or_else(|| "-".to_string()),
            "Target" => record.target.clone(),
            "Snapshot" => record.name.clone(),
            "Created" => record.created.clone().unwrap_or_else(|| "-".to_string()),
            "Usage" => record
                .usage
                .map(|u| format!("{u:.1}%"))
                .unwrap_or_else(|| "-".to_string()),
            "State" => record.state.clone().unwrap_or_else(|| "-".to_string()),
            _ => String::new(),
        }
    }
}

fn headers(detailed: bool) -> Vec<&'static str> {
    let mut headers = vec!["Host", "Target", "Snapshot"];
    if detailed {
        headers.extend(["Created", "Usage", "State"]);
    }
    headers
}

#[derive(Serialize)]
struct ListingView<'a> {
    tiers: BTreeMap<String, Vec<SnapshotRow<'a>>>,
    deployment: &'a [String],
}

/// One table per tier followed by the deployment model snapshots.
pub fn render_listing(listing: &SnapshotListing, detailed: bool, format: OutputFormat) -> CliResult<String> {
    if format != OutputFormat::AsciiTable {
        let view = ListingView {
            tiers: listing
                .tiers
                .iter()
                .map(|(kind, records)| (kind.to_string(), records.iter().map(SnapshotRow).collect()))
                .collect(),
            deployment: &listing.deployment,
        };
        return Ok(match format {
            OutputFormat::Json => serde_json::to_string_pretty(&view)?,
            _ => serde_yaml::to_string(&view)?,
        });
    }
    let headers = headers(detailed);
    let mut out = Vec::new();
    for (kind, records) in &listing.tiers {
        if records.is_empty() {
            out.push(format!("No {kind} snapshots found"));
            continue;
        }
        let rows: Vec<SnapshotRow> = records.iter().map(SnapshotRow).collect();
        out.push(format!("{kind} snapshots:\n{}", render_ascii_table(&headers, &rows)));
    }
    if listing.deployment.is_empty() {
        out.push("No deployment snapshots found".to_string());
    } else {
        out.push(format!("Deployment snapshots: {}", listing.deployment.join(", ")));
    }
    Ok(out.join("\n"))
}

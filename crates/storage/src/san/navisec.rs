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

//! VNX access through `naviseccli`.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use runtime::{CommandRunner, CommandSpec};

use super::{HostLun, Lun, LunSnapshot, SanApi, SanCredentials, SanType};
use crate::errors::{StorageError, StorageResult};
use crate::tier::TierKind;

pub const NAVISECCLI: &str = "/opt/Navisphere/bin/naviseccli";
const FAULTS_NORMAL: &str = "The array is operating normally.";

static LUN_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^LOGICAL UNIT NUMBER\s+(\d+)").expect("static regex is valid"));
static HLU_ALU: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\s+(\d+)$").expect("static regex is valid"));
static FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z][A-Za-z ()]*?):\s*(.*)$").expect("static regex is valid"));

#[derive(Clone)]
pub struct NaviSecCli {
    credentials: SanCredentials,
    runner: Arc<dyn CommandRunner>,
}

impl fmt::Debug for NaviSecCli {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NaviSecCli")
            .field("spa_ip", &self.credentials.spa_ip)
            .finish()
    }
}

impl NaviSecCli {
    pub fn new(credentials: SanCredentials, runner: Arc<dyn CommandRunner>) -> Self {
        Self { credentials, runner }
    }

    fn command<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandSpec::new(NAVISECCLI)
            .args(["-h", self.credentials.spa_ip.as_str()])
            .args(["-user", self.credentials.username.as_str()])
            .args(["-password", self.credentials.password.as_str()])
            .args(["-scope", "0"])
            .args(args)
    }

    async fn exec<I, S>(&self, operation: &str, args: I) -> StorageResult<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let spec = self.command(args);
        let output = self.runner.run(&spec).await?;
        if !output.success() {
            let detail = if output.stderr.trim().is_empty() {
                output.stdout
            } else {
                output.stderr
            };
            return Err(StorageError::adapter(
                TierKind::San,
                operation,
                format!("naviseccli exited {}: {}", output.code, detail.trim()),
            ));
        }
        Ok(output.stdout)
    }
}

/// Fault lines reported by `faults -list`; empty when the array is healthy.
pub fn parse_faults(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && *l != FAULTS_NORMAL)
        .map(str::to_string)
        .collect()
}

/// Parses `lun -list` output into LUNs.
pub fn parse_luns(output: &str) -> Vec<Lun> {
    let mut luns = Vec::new();
    let mut current: Option<Lun> = None;
    for line in output.lines().map(str::trim) {
        if let Some(caps) = LUN_NUMBER.captures(line) {
            luns.extend(current.take());
            current = Some(Lun {
                id: caps[1].to_string(),
                name: String::new(),
            });
        } else if let (Some(lun), Some(caps)) = (current.as_mut(), FIELD.captures(line)) {
            if &caps[1] == "Name" {
                lun.name = caps[2].trim().to_string();
            }
        }
    }
    luns.extend(current);
    luns
}

/// Parses `snap -list` output. Records are separated by blank lines.
pub fn parse_snaps(output: &str) -> Vec<LunSnapshot> {
    let mut snaps = Vec::new();
    for block in output.split("\n\n") {
        let mut snap = LunSnapshot {
            name: String::new(),
            lun_id: String::new(),
            created: None,
            state: None,
        };
        for line in block.lines().map(str::trim) {
            let Some(caps) = FIELD.captures(line) else {
                continue;
            };
            let value = caps[2].trim().to_string();
            match &caps[1] {
                "Name" => snap.name = value,
                "Creation time" => snap.created = Some(value),
                "Source LUN(s)" => snap.lun_id = value.split(',').next().unwrap_or_default().trim().to_string(),
                "State" => snap.state = Some(value),
                _ => {}
            }
        }
        if !snap.name.is_empty() {
            snaps.push(snap);
        }
    }
    snaps
}

/// Parses the `HLU/ALU Pairs` table of `storagegroup -list`.
pub fn parse_hlu_pairs(output: &str) -> Vec<HostLun> {
    output
        .lines()
        .map(str::trim)
        .skip_while(|l| !l.starts_with("HLU/ALU Pairs"))
        .filter_map(|l| HLU_ALU.captures(l))
        .filter_map(|caps| {
            Some(HostLun {
                hlu: caps[1].parse().ok()?,
                lun_id: caps[2].to_string(),
            })
        })
        .collect()
}

#[async_trait]
impl SanApi for NaviSecCli {
    fn san_type(&self) -> SanType {
        SanType::Vnx
    }

    async fn list_luns(&self, pool: &str) -> StorageResult<Vec<Lun>> {
        let out = self.exec("list LUNs", ["lun", "-list", "-poolName", pool]).await?;
        Ok(parse_luns(&out))
    }

    async fn list_snaps(&self) -> StorageResult<Vec<LunSnapshot>> {
        let out = self.exec("list snapshots", ["snap", "-list"]).await?;
        Ok(parse_snaps(&out))
    }

    async fn snap_create(&self, lun_id: &str, name: &str, description: &str) -> StorageResult<()> {
        self.exec(
            "create snapshot",
            ["snap", "-create", "-res", lun_id, "-name", name, "-descr", description],
        )
        .await?;
        Ok(())
    }

    async fn snap_restore(&self, lun_id: &str, snap_name: &str, backup_name: &str) -> StorageResult<()> {
        self.exec(
            "restore snapshot",
            ["snap", "-restore", "-id", snap_name, "-res", lun_id, "-bakName", backup_name, "-o"],
        )
        .await?;
        Ok(())
    }

    async fn snap_destroy(&self, snap_name: &str) -> StorageResult<()> {
        self.exec("destroy snapshot", ["snap", "-destroy", "-id", snap_name, "-o"])
            .await?;
        Ok(())
    }

    async fn lun_delete(&self, lun_id: &str) -> StorageResult<()> {
        self.exec("delete LUN", ["lun", "-destroy", "-l", lun_id, "-o"])
            .await?;
        Ok(())
    }

    async fn storage_group_luns(&self, group: &str) -> StorageResult<Option<Vec<HostLun>>> {
        let output = self
            .runner
            .run(&self.command(["storagegroup", "-list", "-gname", group]))
            .await?;
        if !output.success() {
            let detail = format!("{}{}", output.stdout, output.stderr);
            if detail.contains("does not exist") || detail.contains("not found") {
                return Ok(None);
            }
            return Err(StorageError::adapter(
                TierKind::San,
                "list storage group",
                format!("naviseccli exited {}: {}", output.code, detail.trim()),
            ));
        }
        Ok(Some(parse_hlu_pairs(&output.stdout)))
    }

    async fn storage_group_remove(&self, group: &str, hlus: &[u32]) -> StorageResult<()> {
        let mut args = vec![
            "storagegroup".to_string(),
            "-removehlu".to_string(),
            "-gname".to_string(),
            group.to_string(),
        ];
        for hlu in hlus {
            args.push("-hlu".to_string());
            args.push(hlu.to_string());
        }
        args.push("-o".to_string());
        self.exec("remove from storage group", args).await?;
        Ok(())
    }

    async fn critical_alerts(&self) -> StorageResult<Vec<String>> {
        let out = self.exec("list faults", ["faults", "-list"]).await?;
        Ok(parse_faults(&out))
    }

    // NAS servers only exist on Unity arrays.
    async fn unbalanced_nas_servers(&self, _names: &[String]) -> StorageResult<Vec<String>> {
        Ok(Vec::new())
    }
}

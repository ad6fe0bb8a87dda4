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

//! Unity access through `uemcli` with CSV output.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use runtime::{CommandRunner, CommandSpec};

use super::{HostLun, Lun, LunSnapshot, SanApi, SanCredentials, SanType};
use crate::errors::{StorageError, StorageResult};
use crate::tier::TierKind;

pub const UEMCLI: &str = "/usr/bin/uemcli";

#[derive(Clone)]
pub struct UemCli {
    credentials: SanCredentials,
    runner: Arc<dyn CommandRunner>,
}

impl fmt::Debug for UemCli {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UemCli")
            .field("spa_ip", &self.credentials.spa_ip)
            .finish()
    }
}

/// Rows of a `-output csv` listing keyed by column header. Banner lines
/// printed before the header row are skipped.
pub fn parse_csv(output: &str) -> StorageResult<Vec<BTreeMap<String, String>>> {
    let Some(start) = output
        .lines()
        .position(|l| l.trim_start().trim_start_matches('"').starts_with("ID"))
    else {
        return Ok(Vec::new());
    };
    let body: Vec<&str> = output.lines().skip(start).collect();
    let joined = body.join("\n");
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(joined.as_bytes());
    let headers = reader
        .headers()
        .map_err(|e| StorageError::adapter(TierKind::San, "parse uemcli output", e))?
        .clone();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| StorageError::adapter(TierKind::San, "parse uemcli output", e))?;
        rows.push(
            headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.to_string(), v.to_string()))
                .collect(),
        );
    }
    Ok(rows)
}

fn column<'a>(row: &'a BTreeMap<String, String>, name: &str) -> &'a str {
    row.get(name).map(String::as_str).unwrap_or_default()
}

impl UemCli {
    pub fn new(credentials: SanCredentials, runner: Arc<dyn CommandRunner>) -> Self {
        Self { credentials, runner }
    }

    async fn exec<I, S>(&self, operation: &str, args: I) -> StorageResult<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let spec = CommandSpec::new(UEMCLI)
            .args(["-d", self.credentials.spa_ip.as_str()])
            .args(["-u", self.credentials.username.as_str()])
            .args(["-p", self.credentials.password.as_str()])
            .arg("-sslPolicy")
            .arg("accept")
            .args(args);
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
                format!("uemcli exited {}: {}", output.code, detail.trim()),
            ));
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl SanApi for UemCli {
    fn san_type(&self) -> SanType {
        SanType::Unity
    }

    async fn list_luns(&self, pool: &str) -> StorageResult<Vec<Lun>> {
        let out = self
            .exec("list LUNs", ["/stor/prov/luns/lun", "show", "-detail", "-output", "csv"])
            .await?;
        Ok(parse_csv(&out)?
            .iter()
            .filter(|row| column(row, "Storage pool") == pool)
            .map(|row| Lun {
                id: column(row, "ID").to_string(),
                name: column(row, "Name").to_string(),
            })
            .collect())
    }

    async fn list_snaps(&self) -> StorageResult<Vec<LunSnapshot>> {
        let out = self
            .exec("list snapshots", ["/prot/snap", "show", "-detail", "-output", "csv"])
            .await?;
        Ok(parse_csv(&out)?
            .iter()
            .map(|row| LunSnapshot {
                name: column(row, "Name").to_string(),
                lun_id: column(row, "Source").to_string(),
                created: row.get("Creation time").cloned(),
                state: row.get("State").cloned(),
            })
            .collect())
    }

    async fn snap_create(&self, lun_id: &str, name: &str, description: &str) -> StorageResult<()> {
        self.exec(
            "create snapshot",
            ["/prot/snap", "create", "-source", lun_id, "-name", name, "-descr", description],
        )
        .await?;
        Ok(())
    }

    async fn snap_restore(&self, _lun_id: &str, snap_name: &str, backup_name: &str) -> StorageResult<()> {
        self.exec(
            "restore snapshot",
            ["/prot/snap", "-name", snap_name, "restore", "-backupName", backup_name],
        )
        .await?;
        Ok(())
    }

    async fn snap_destroy(&self, snap_name: &str) -> StorageResult<()> {
        self.exec("destroy snapshot", ["/prot/snap", "-name", snap_name, "delete"])
            .await?;
        Ok(())
    }

    async fn lun_delete(&self, lun_id: &str) -> StorageResult<()> {
        self.exec("delete LUN", ["/stor/prov/luns/lun", "-id", lun_id, "delete"])
            .await?;
        Ok(())
    }

    async fn storage_group_luns(&self, group: &str) -> StorageResult<Option<Vec<HostLun>>> {
        let out = self
            .exec("list host LUNs", ["/remote/host/hlu", "-host", group, "show", "-output", "csv"])
            .await?;
        let rows = parse_csv(&out)?;
        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(
            rows.iter()
                .filter_map(|row| {
                    Some(HostLun {
                        hlu: column(row, "LUN ID").parse().ok()?,
                        lun_id: column(row, "LUN").to_string(),
                    })
                })
                .collect(),
        ))
    }

    // Host access on Unity belongs to the LUN and goes when it is deleted.
    async fn storage_group_remove(&self, group: &str, hlus: &[u32]) -> StorageResult<()> {
        tracing::info!(target: "enminst::snapshots", group, ?hlus, "host access is removed with the LUN on Unity");
        Ok(())
    }

    async fn critical_alerts(&self) -> StorageResult<Vec<String>> {
        let out = self
            .exec("list alerts", ["/event/alert/hist", "show", "-detail", "-output", "csv"])
            .await?;
        Ok(parse_csv(&out)?
            .iter()
            .filter(|row| column(row, "Severity").eq_ignore_ascii_case("critical"))
            .filter(|row| !column(row, "State").eq_ignore_ascii_case("inactive"))
            .map(|row| format!("{} {}", column(row, "Time"), column(row, "Message")).trim().to_string())
            .collect())
    }

    async fn unbalanced_nas_servers(&self, names: &[String]) -> StorageResult<Vec<String>> {
        let mut unbalanced = Vec::new();
        for name in names {
            let out = self
                .exec("show NAS server", ["/net/nas/server", "-name", name.as_str(), "show", "-detail", "-output", "csv"])
                .await?;
            let rows = parse_csv(&out)?;
            let Some(row) = rows.first() else {
                return Err(StorageError::adapter(TierKind::San, "show NAS server", format!("NAS server {name} not found")));
            };
            let home = column(row, "Home SP");
            let current = column(row, "Current SP");
            if home != current {
                tracing::warn!(target: "enminst::prechecks", nas_server = %name, home, current, "NAS server is not on its home SP");
                unbalanced.push(name.clone());
            }
        }
        Ok(unbalanced)
    }
}

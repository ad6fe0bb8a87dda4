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

//! Typed facades over the agents deployed on the peer nodes.
//!
//! Each facade turns agent payloads into Rust types. Vendor codes that an
//! operation treats as benign are passed as the tolerated set so the caller
//! never sees them as errors.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::action::AgentAction;
use crate::client::Mco;
use crate::errors::{McoError, McoResult};
use crate::host_code::HostCode;
use crate::outcome::HostData;
use crate::transport::McoRequest;

static DISPLAY_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\S+)\s+(\S+)\s+(\S+)\s*(.*)$").expect("static regex is valid"));
static SYSTEM_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\S+)\s+(\S+)\s*(.*)$").expect("static regex is valid"));

/// `hagrp -display` attributes keyed by group, then system, then attribute.
pub type GroupDisplay = BTreeMap<String, BTreeMap<String, BTreeMap<String, String>>>;

/// `hasys -display` attributes keyed by system, then attribute.
pub type SystemDisplay = BTreeMap<String, BTreeMap<String, String>>;

/// One row of `hagrp -state` or `hasys -state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRow {
    pub name: String,
    /// Set for group rows only.
    pub system: Option<String>,
    pub states: Vec<String>,
}

/// A VCS engine log event for a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub date: String,
    pub id: String,
    pub info: String,
}

impl HistoryEvent {
    pub const DATE_FORMAT: &'static str = "%a %b %d %H:%M:%S %Y";

    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(self.date.trim(), Self::DATE_FORMAT).ok()
    }
}

pub fn parse_group_display(chunks: &[String]) -> GroupDisplay {
    let mut data = GroupDisplay::new();
    for chunk in chunks {
        for line in chunk.lines().skip(1) {
            let Some(caps) = DISPLAY_LINE_RE.captures(line.trim_end()) else {
                continue;
            };
            data.entry(caps[1].to_string())
                .or_default()
                .entry(caps[3].to_string())
                .or_default()
                .insert(caps[2].to_string(), caps[4].trim().to_string());
        }
    }
    data
}

pub fn parse_system_display(per_system: &BTreeMap<String, String>) -> SystemDisplay {
    let mut data = SystemDisplay::new();
    for text in per_system.values() {
        for line in text.lines().skip(1) {
            let Some(caps) = SYSTEM_LINE_RE.captures(line.trim_end()) else {
                continue;
            };
            data.entry(caps[1].to_string())
                .or_default()
                .insert(caps[2].to_string(), caps[3].trim().to_string());
        }
    }
    data
}

/// Parses the `#Group Attribute System Value` style tables.
pub fn parse_state_table(text: &str) -> Vec<StateRow> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let Some(header) = lines.next() else {
        return Vec::new();
    };
    let headers: Vec<String> = header
        .split_whitespace()
        .map(|h| h.trim_start_matches('#').to_string())
        .collect();
    let position = |name: &str| headers.iter().position(|h| h == name);
    let name_col = position("Group").or_else(|| position("System")).unwrap_or(0);
    let system_col = if position("Group").is_some() {
        position("System")
    } else {
        None
    };
    let value_col = position("Value").unwrap_or(headers.len().saturating_sub(1));
    lines
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let name = fields.get(name_col)?;
            let value = fields.get(value_col).copied().unwrap_or_default();
            Some(StateRow {
                name: name.to_string(),
                system: system_col.and_then(|c| fields.get(c)).map(|s| s.to_string()),
                states: value
                    .split('|')
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
            })
        })
        .collect()
}

fn structured_as<T: serde::de::DeserializeOwned>(
    action: AgentAction,
    host: &str,
    data: &HostData,
) -> McoResult<T> {
    let value = data
        .structured
        .clone()
        .unwrap_or_else(|| serde_json::Value::String(data.out.clone()));
    serde_json::from_value(value).map_err(|e| McoError::parse_error(action, host, e.to_string()))
}

/// The `enminst` agent: VCS verbs and node local LVM operations.
#[derive(Debug, Clone)]
pub struct EnminstAgent {
    mco: Mco,
}

impl EnminstAgent {
    pub fn new(mco: Mco) -> Self {
        Self { mco }
    }

    pub async fn haclus_list(&self, host: &str) -> McoResult<Vec<String>> {
        let data = self
            .mco
            .run(&McoRequest::new(AgentAction::HaclusList).host(host))
            .await?;
        Ok(data
            .out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    pub async fn hagrp_list(&self, host: &str) -> McoResult<Vec<String>> {
        let data = self
            .mco
            .run(&McoRequest::new(AgentAction::HagrpList).host(host))
            .await?;
        let mut groups: Vec<String> = Vec::new();
        for name in data.out.lines().filter_map(|l| l.split_whitespace().next()) {
            if !groups.iter().any(|g| g == name) {
                groups.push(name.to_string());
            }
        }
        Ok(groups)
    }

    pub async fn hagrp_display(&self, groups: &[String], host: &str) -> McoResult<GroupDisplay> {
        let action = AgentAction::HagrpDisplay;
        let data = self
            .mco
            .run(&McoRequest::new(action).host(host).arg("groups", groups.join(",")))
            .await?;
        let chunks: Vec<String> = structured_as(action, host, &data)?;
        if chunks.iter().any(|c| c.contains("VCS ERROR")) {
            let joined = chunks.join("\n");
            return Err(match HostCode::classify(&joined, "") {
                Some(code) => McoError::HostError {
                    action,
                    host: host.to_string(),
                    code,
                },
                None => McoError::parse_error(action, host, joined),
            });
        }
        Ok(parse_group_display(&chunks))
    }

    /// Engine events per group, oldest first.
    pub async fn hagrp_history(
        &self,
        group: Option<&str>,
        host: &str,
    ) -> McoResult<BTreeMap<String, Vec<HistoryEvent>>> {
        let action = AgentAction::HagrpHistory;
        let mut request = McoRequest::new(action).host(host);
        if let Some(group) = group {
            request = request.arg("group", group);
        }
        let data = self.mco.run(&request).await?;
        let mut history: BTreeMap<String, Vec<HistoryEvent>> = structured_as(action, host, &data)?;
        for events in history.values_mut() {
            events.sort_by_key(HistoryEvent::timestamp);
        }
        Ok(history)
    }

    pub async fn hasys_state(&self, host: &str) -> McoResult<Vec<StateRow>> {
        let data = self
            .mco
            .run(&McoRequest::new(AgentAction::HasysState).host(host))
            .await?;
        Ok(parse_state_table(&data.out))
    }

    pub async fn hagrp_state(&self, host: &str) -> McoResult<Vec<StateRow>> {
        let data = self
            .mco
            .run(&McoRequest::new(AgentAction::HagrpState).host(host))
            .await?;
        Ok(parse_state_table(&data.out))
    }

    pub async fn hasys_display(&self, systems: &[String], host: &str) -> McoResult<SystemDisplay> {
        let action = AgentAction::HasysDisplay;
        let data = self
            .mco
            .run(&McoRequest::new(action).host(host).arg("systems", systems.join(",")))
            .await?;
        let per_system: BTreeMap<String, String> = structured_as(action, host, &data)?;
        Ok(parse_system_display(&per_system))
    }

    pub async fn hagrp_clear(&self, group: &str, system: &str) -> McoResult<()> {
        self.mco
            .run(
                &McoRequest::new(AgentAction::HagrpClear)
                    .host(system)
                    .arg("group_name", group),
            )
            .await
            .inspect_err(|e| tracing::error!(group, system, error = %e, "unable to clear service group"))?;
        Ok(())
    }

    pub async fn hagrp_switch(&self, group: &str, to_system: &str, host: &str) -> McoResult<()> {
        self.mco
            .run(
                &McoRequest::new(AgentAction::HagrpSwitch)
                    .host(host)
                    .arg("group_name", group)
                    .arg("system", to_system),
            )
            .await?;
        Ok(())
    }

    pub async fn hagrp_online(
        &self,
        group: &str,
        system: &str,
        propagate: bool,
        host: &str,
    ) -> McoResult<HostData> {
        let action = AgentAction::HagrpOnline;
        let mut request = McoRequest::new(action)
            .host(host)
            .arg("group_name", group)
            .arg("system", system);
        if propagate {
            request = request.arg("propagate", "true");
        }
        let data = self.mco.run(&request).await?;
        // the agent reports an already online group with retcode 0
        if HostCode::classify(&data.out, &data.err) == Some(HostCode::AlreadyOnline) {
            return Err(McoError::HostError {
                action,
                host: host.to_string(),
                code: HostCode::AlreadyOnline,
            });
        }
        Ok(data)
    }

    pub async fn hagrp_offline(&self, group: &str, system: &str, host: &str) -> McoResult<HostData> {
        self.mco
            .run(
                &McoRequest::new(AgentAction::HagrpOffline)
                    .host(host)
                    .arg("group_name", group)
                    .arg("system", system),
            )
            .await
    }

    /// Freezes a group; a persistent freeze opens the configuration around
    /// the call. Already frozen is not an error.
    pub async fn hagrp_freeze(&self, group: &str, host: &str, persistent: bool) -> McoResult<()> {
        let mut request = McoRequest::new(AgentAction::HagrpFreeze)
            .host(host)
            .arg("group_name", group);
        if persistent {
            request = request.arg("persistent", "true");
        }
        self.with_config_open(host, persistent, &request, &[HostCode::AlreadyFrozen])
            .await
    }

    pub async fn hagrp_unfreeze(&self, group: &str, host: &str, persistent: bool) -> McoResult<()> {
        let mut request = McoRequest::new(AgentAction::HagrpUnfreeze)
            .host(host)
            .arg("group_name", group);
        if persistent {
            request = request.arg("persistent", "true");
        }
        self.with_config_open(host, persistent, &request, &[HostCode::NotFrozen])
            .await
    }

    pub async fn hasys_freeze(&self, system: &str, persistent: bool, evacuate: bool) -> McoResult<()> {
        let mut request = McoRequest::new(AgentAction::HasysFreeze)
            .host(system)
            .arg("system", system);
        if evacuate {
            request = request.arg("evacuate", "true");
        }
        if persistent {
            request = request.arg("persistent", "true");
        }
        self.with_config_open(system, persistent, &request, &[HostCode::AlreadyFrozen])
            .await
    }

    pub async fn hasys_unfreeze(&self, system: &str, persistent: bool) -> McoResult<()> {
        let mut request = McoRequest::new(AgentAction::HasysUnfreeze)
            .host(system)
            .arg("system", system);
        if persistent {
            request = request.arg("persistent", "true");
        }
        self.with_config_open(system, persistent, &request, &[HostCode::NotFrozen])
            .await
    }

    // makero runs even when the call itself failed
    async fn with_config_open(
        &self,
        host: &str,
        persistent: bool,
        request: &McoRequest,
        tolerated: &[HostCode],
    ) -> McoResult<()> {
        let vcs = VcsCmdApiAgent::new(self.mco.clone());
        if persistent {
            vcs.haconf_makerw(host).await?;
        }
        let result = self.mco.run_tolerant(request, tolerated).await;
        if persistent {
            let closed = vcs.haconf_makero(host).await;
            result?;
            closed?;
        } else {
            result?;
        }
        Ok(())
    }

    /// Raw `lvs` output per host.
    pub async fn lvs_list(&self, hosts: &[String], lv_opts: &str) -> McoResult<BTreeMap<String, String>> {
        let data = self
            .mco
            .run_all(
                &McoRequest::new(AgentAction::LvsList)
                    .hosts(hosts.iter().cloned())
                    .arg("lv_opts", lv_opts),
            )
            .await?;
        Ok(data.into_iter().map(|(h, d)| (h, d.out)).collect())
    }

    pub async fn create_lv_snapshots(
        &self,
        snap_info: &serde_json::Value,
        hosts: &[String],
    ) -> McoResult<BTreeMap<String, HostData>> {
        self.mco
            .run_all(
                &McoRequest::new(AgentAction::CreateLvSnapshots)
                    .hosts(hosts.iter().cloned())
                    .arg("snap_info", snap_info),
            )
            .await
    }

    pub async fn delete_lv_snapshots(&self, tag: &str, hosts: &[String]) -> McoResult<BTreeMap<String, HostData>> {
        self.mco
            .run_all(
                &McoRequest::new(AgentAction::DeleteLvSnapshots)
                    .hosts(hosts.iter().cloned())
                    .arg("tag_name", tag),
            )
            .await
    }

    pub async fn restore_lv_snapshots(&self, tag: &str, hosts: &[String]) -> McoResult<BTreeMap<String, HostData>> {
        self.mco
            .run_all(
                &McoRequest::new(AgentAction::RestoreLvSnapshots)
                    .hosts(hosts.iter().cloned())
                    .arg("tag_name", tag),
            )
            .await
    }

    pub async fn shutdown_host(&self, host: &str) -> McoResult<()> {
        self.mco
            .run(&McoRequest::new(AgentAction::ShutdownHost).host(host))
            .await?;
        Ok(())
    }

    pub async fn get_lvm_conf_global_filter(&self, host: &str) -> McoResult<String> {
        Ok(self
            .mco
            .run(&McoRequest::new(AgentAction::GetLvmConfGlobalFilter).host(host))
            .await?
            .out)
    }

    pub async fn get_grub_conf_lvs(&self, host: &str) -> McoResult<String> {
        Ok(self
            .mco
            .run(&McoRequest::new(AgentAction::GetGrubConfLvs).host(host))
            .await?
            .out)
    }

    /// Total memory in kB per host.
    pub async fn get_mem(&self, hosts: &[String]) -> McoResult<BTreeMap<String, u64>> {
        self.numeric_per_host(AgentAction::GetMem, hosts).await
    }

    /// Physical core count per host.
    pub async fn get_cores(&self, hosts: &[String]) -> McoResult<BTreeMap<String, u64>> {
        self.numeric_per_host(AgentAction::GetCores, hosts).await
    }

    async fn numeric_per_host(&self, action: AgentAction, hosts: &[String]) -> McoResult<BTreeMap<String, u64>> {
        let data = self
            .mco
            .run_all(&McoRequest::new(action).hosts(hosts.iter().cloned()))
            .await?;
        let mut out = BTreeMap::new();
        for (host, d) in data {
            let value = d.out.trim().parse::<u64>().map_err(|_| {
                McoError::parse_error(action, host.as_str(), format!("not a number: {}", d.out.trim()))
            })?;
            out.insert(host, value);
        }
        Ok(out)
    }
}

/// The `vcs_cmd_api` agent: blocking waits and LITP style lock/unlock.
#[derive(Debug, Clone)]
pub struct VcsCmdApiAgent {
    mco: Mco,
}

impl VcsCmdApiAgent {
    pub fn new(mco: Mco) -> Self {
        Self { mco }
    }

    /// Blocks on the node until the group reaches `state` on `system`.
    pub async fn hagrp_wait(
        &self,
        group: &str,
        system: &str,
        state: &str,
        timeout: Duration,
    ) -> McoResult<()> {
        self.mco
            .run(
                &McoRequest::new(AgentAction::HagrpWait)
                    .host(system)
                    .arg("group_name", group)
                    .arg("state", state)
                    .arg("node_name", system)
                    .arg("timeout", timeout.as_secs())
                    .with_timeout(timeout + Duration::from_secs(5)),
            )
            .await?;
        Ok(())
    }

    pub async fn haconf_makerw(&self, host: &str) -> McoResult<()> {
        self.haconf(host, "makerw", false).await
    }

    pub async fn haconf_makero(&self, host: &str) -> McoResult<()> {
        self.haconf(host, "dump", true).await
    }

    async fn haconf(&self, host: &str, haaction: &str, read_only: bool) -> McoResult<()> {
        self.mco
            .run_tolerant(
                &McoRequest::new(AgentAction::Haconf)
                    .host(host)
                    .arg("haaction", haaction)
                    .arg("read_only", read_only),
                &[HostCode::ConfigUnchanged],
            )
            .await?;
        Ok(())
    }

    pub async fn lock(&self, system: &str, switch_timeout: Duration) -> McoResult<()> {
        self.mco
            .run(
                &McoRequest::new(AgentAction::Lock)
                    .host(system)
                    .arg("sys", system)
                    .arg("switch_timeout", switch_timeout.as_secs()),
            )
            .await
            .inspect_err(|e| tracing::error!(system, error = %e, "unable to lock system"))?;
        Ok(())
    }

    pub async fn unlock(&self, system: &str, nic_wait_timeout: Duration) -> McoResult<()> {
        self.mco
            .run(
                &McoRequest::new(AgentAction::Unlock)
                    .host(system)
                    .arg("sys", system)
                    .arg("nic_wait_timeout", nic_wait_timeout.as_secs()),
            )
            .await
            .inspect_err(|e| tracing::error!(system, error = %e, "unable to unlock system"))?;
        Ok(())
    }
}

/// The precheck agent. Most of its actions report failures through the
/// payload, so agent errors are returned as data.
#[derive(Debug, Clone)]
pub struct PrecheckAgent {
    mco: Mco,
    timeout: Option<Duration>,
}

impl PrecheckAgent {
    pub fn new(mco: Mco) -> Self {
        Self { mco, timeout: None }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn request(&self, action: AgentAction, host: &str) -> McoRequest {
        let request = McoRequest::new(action).host(host);
        match self.timeout {
            Some(t) => request.with_timeout(t),
            None => request,
        }
    }

    pub async fn get_replication_status(
        &self,
        host: &str,
        base_dn: &str,
        password: &str,
    ) -> McoResult<HostData> {
        self.mco
            .run_lenient(
                &self
                    .request(AgentAction::GetReplicationStatus, host)
                    .arg("baseDN", base_dn)
                    .arg("password", password)
                    .arg("host", host),
            )
            .await
    }

    /// The boot partition test reports its result on stderr.
    pub async fn boot_partition_test(&self, host: &str) -> McoResult<String> {
        Ok(self.worker(AgentAction::BootPartitionTest, host).await?.err)
    }

    pub async fn worker(&self, action: AgentAction, host: &str) -> McoResult<HostData> {
        self.mco.run_lenient(&self.request(action, host)).await
    }

    /// Like [`worker`](Self::worker) but a non-zero retcode is an error.
    pub async fn run(&self, action: AgentAction, host: &str) -> McoResult<HostData> {
        self.mco.run(&self.request(action, host)).await
    }

    pub async fn remove_packages(&self, host: &str, package: &str) -> McoResult<()> {
        self.mco
            .run(&self.request(AgentAction::RemovePackages, host).arg("package", package))
            .await?;
        Ok(())
    }
}

/// The `filemanager` agent.
#[derive(Debug, Clone)]
pub struct FileManagerAgent {
    mco: Mco,
}

impl FileManagerAgent {
    pub fn new(mco: Mco) -> Self {
        Self { mco }
    }

    pub async fn exists(&self, path: &str, hosts: &[String]) -> McoResult<BTreeMap<String, bool>> {
        let data = self
            .mco
            .run_all(
                &McoRequest::new(AgentAction::FileExists)
                    .hosts(hosts.iter().cloned())
                    .arg("file", path),
            )
            .await?;
        Ok(data
            .into_iter()
            .map(|(host, d)| {
                let found = match &d.structured {
                    Some(serde_json::Value::Bool(b)) => *b,
                    _ => matches!(d.out.trim(), "true" | "True" | "1"),
                };
                (host, found)
            })
            .collect())
    }

    pub async fn copy(&self, src: &str, dest: &str, hosts: &[String]) -> McoResult<()> {
        self.mco
            .run_all(
                &McoRequest::new(AgentAction::FileCopy)
                    .hosts(hosts.iter().cloned())
                    .arg("src", src)
                    .arg("dest", dest),
            )
            .await?;
        Ok(())
    }

    pub async fn delete(&self, path: &str, hosts: &[String]) -> McoResult<()> {
        self.mco
            .run_all(
                &McoRequest::new(AgentAction::FileDelete)
                    .hosts(hosts.iter().cloned())
                    .arg("file", path),
            )
            .await?;
        Ok(())
    }
}

/// Puppet agent state on a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuppetStatus {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub applying: bool,
    #[serde(default)]
    pub status: String,
}

/// The `puppet` agent. An empty host list addresses every node.
#[derive(Debug, Clone)]
pub struct PuppetAgent {
    mco: Mco,
}

impl PuppetAgent {
    pub fn new(mco: Mco) -> Self {
        Self { mco }
    }

    pub async fn disable(&self, hosts: &[String], message: &str) -> McoResult<()> {
        self.mco
            .run_all(
                &McoRequest::new(AgentAction::PuppetDisable)
                    .hosts(hosts.iter().cloned())
                    .arg("message", message),
            )
            .await?;
        Ok(())
    }

    pub async fn enable(&self, hosts: &[String]) -> McoResult<()> {
        self.mco
            .run_all(&McoRequest::new(AgentAction::PuppetEnable).hosts(hosts.iter().cloned()))
            .await?;
        Ok(())
    }

    pub async fn runonce(&self, hosts: &[String]) -> McoResult<()> {
        self.mco
            .run_all(&McoRequest::new(AgentAction::PuppetRunOnce).hosts(hosts.iter().cloned()))
            .await?;
        Ok(())
    }

    pub async fn status(&self, hosts: &[String]) -> McoResult<BTreeMap<String, PuppetStatus>> {
        let action = AgentAction::PuppetStatus;
        let data = self
            .mco
            .run_all(&McoRequest::new(action).hosts(hosts.iter().cloned()))
            .await?;
        data.into_iter()
            .map(|(host, d)| {
                let status = match d.structured {
                    Some(value) => serde_json::from_value(value)
                        .map_err(|e| McoError::parse_error(action, &host, e.to_string()))?,
                    None => PuppetStatus::default(),
                };
                Ok((host, status))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_group_display() {
        let chunk = "#Group Attribute System Value\n\
                     Grp_CS_svc_cluster_msap State svc-1 |ONLINE|\n\
                     Grp_CS_svc_cluster_msap State svc-2 |OFFLINE|\n\
                     Grp_CS_svc_cluster_msap Frozen global 0\n\
                     Grp_CS_svc_cluster_msap TFrozen global 1\n";
        let data = parse_group_display(&[chunk.to_string()]);
        let group = &data["Grp_CS_svc_cluster_msap"];
        assert_eq!(group["svc-1"]["State"], "|ONLINE|");
        assert_eq!(group["svc-2"]["State"], "|OFFLINE|");
        assert_eq!(group["global"]["TFrozen"], "1");
    }

    #[test]
    fn test_parse_state_table() {
        let text = "#Group Attribute System Value\n\
                    Grp_CS_db_cluster_postgres State db-1 |ONLINE|\n\
                    Grp_CS_db_cluster_postgres State db-2 |OFFLINE|FAULTED|\n";
        let rows = parse_state_table(text);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].system.as_deref(), Some("db-2"));
        assert_eq!(rows[1].states, vec!["OFFLINE", "FAULTED"]);

        let rows = parse_state_table("#System Attribute Value\nsvc-1 SysState RUNNING\n");
        assert_eq!(rows[0].name, "svc-1");
        assert_eq!(rows[0].system, None);
        assert_eq!(rows[0].states, vec!["RUNNING"]);
        assert!(parse_state_table("").is_empty());
    }

    #[test]
    fn test_parse_system_display() {
        let mut raw = BTreeMap::new();
        raw.insert(
            "svc-1".to_string(),
            "#System Attribute Value\nsvc-1 Frozen 0\nsvc-1 TFrozen 1\nsvc-1 SysState RUNNING\n"
                .to_string(),
        );
        let data = parse_system_display(&raw);
        assert_eq!(data["svc-1"]["TFrozen"], "1");
        assert_eq!(data["svc-1"]["SysState"], "RUNNING");
    }

    #[test]
    fn test_history_timestamp() {
        let event = HistoryEvent {
            date: "Tue Mar 05 10:11:12 2024".to_string(),
            id: "V-16-1-10447".to_string(),
            info: "Group is online".to_string(),
        };
        assert!(event.timestamp().is_some());
    }
}

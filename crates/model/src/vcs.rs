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

//! Live and derived VCS state for service groups and systems.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{ModelError, ModelResult};
use crate::table::TableRow;

/// State of a service group on one system, or of a system itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceState {
    Online,
    Offline,
    Faulted,
    Partial,
    Starting,
    Stopping,
    Exited,
    Running,
    PoweredOff,
    /// Modelled but not yet created in VCS.
    Undefined,
    Unknown,
}

impl ServiceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceState::Online => "ONLINE",
            ServiceState::Offline => "OFFLINE",
            ServiceState::Faulted => "FAULTED",
            ServiceState::Partial => "PARTIAL",
            ServiceState::Starting => "STARTING",
            ServiceState::Stopping => "STOPPING",
            ServiceState::Exited => "EXITED",
            ServiceState::Running => "RUNNING",
            ServiceState::PoweredOff => "POWERED OFF",
            ServiceState::Undefined => "Undefined",
            ServiceState::Unknown => "-",
        }
    }

    /// Parses the state column of `hagrp -state`, which may carry
    /// modifiers such as `ONLINE|STOPPING` or `OFFLINE|FAULTED`.
    pub fn from_vcs(raw: &str) -> ServiceState {
        let parts: Vec<&str> = raw
            .trim()
            .split('|')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if parts.iter().any(|p| p.eq_ignore_ascii_case("FAULTED")) {
            return ServiceState::Faulted;
        }
        for modifier in ["STARTING", "STOPPING", "PARTIAL"] {
            if parts.iter().any(|p| p.eq_ignore_ascii_case(modifier)) {
                return modifier.parse().unwrap_or(ServiceState::Unknown);
            }
        }
        parts
            .first()
            .and_then(|p| p.parse().ok())
            .unwrap_or(ServiceState::Unknown)
    }

    pub fn is_faulted(&self) -> bool {
        matches!(self, ServiceState::Faulted)
    }
}

impl FromStr for ServiceState {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ONLINE" => Ok(ServiceState::Online),
            "OFFLINE" => Ok(ServiceState::Offline),
            "FAULTED" => Ok(ServiceState::Faulted),
            "PARTIAL" => Ok(ServiceState::Partial),
            "STARTING" => Ok(ServiceState::Starting),
            "STOPPING" => Ok(ServiceState::Stopping),
            "EXITED" => Ok(ServiceState::Exited),
            "RUNNING" => Ok(ServiceState::Running),
            "POWERED OFF" => Ok(ServiceState::PoweredOff),
            "UNDEFINED" => Ok(ServiceState::Undefined),
            "-" | "UNKNOWN" => Ok(ServiceState::Unknown),
            other => Err(ModelError::unknown("service state", other)),
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a service group spreads over its nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AvailabilityType {
    Parallel,
    ActiveStandby,
    Standalone,
    NotApplicable,
}

impl AvailabilityType {
    /// Derives the type from the modelled `active`/`standby` counts.
    pub fn derive(active: i64, standby: i64, node_count: usize) -> Self {
        if active == 1 && standby == 1 {
            AvailabilityType::ActiveStandby
        } else if standby == 0 && active == node_count as i64 {
            AvailabilityType::Parallel
        } else {
            AvailabilityType::Standalone
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AvailabilityType::Parallel => "parallel",
            AvailabilityType::ActiveStandby => "active-standby",
            AvailabilityType::Standalone => "standalone",
            AvailabilityType::NotApplicable => "N/A",
        }
    }
}

impl FromStr for AvailabilityType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "parallel" => Ok(AvailabilityType::Parallel),
            "active-standby" => Ok(AvailabilityType::ActiveStandby),
            "standalone" => Ok(AvailabilityType::Standalone),
            "n/a" => Ok(AvailabilityType::NotApplicable),
            other => Err(ModelError::unknown("availability type", other)),
        }
    }
}

impl fmt::Display for AvailabilityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Synthetic per-row group state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupState {
    Ok,
    Invalid,
    Undefined,
}

impl GroupState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupState::Ok => "OK",
            GroupState::Invalid => "Invalid",
            GroupState::Undefined => "Undefined",
        }
    }

    /// Evaluates the group state from the states of every system row.
    pub fn evaluate(avail: AvailabilityType, states: &[ServiceState]) -> GroupState {
        let online = states.iter().filter(|s| **s == ServiceState::Online).count();
        let offline = states.iter().filter(|s| **s == ServiceState::Offline).count();
        let ok = match avail {
            AvailabilityType::Parallel => !states.is_empty() && online == states.len(),
            AvailabilityType::ActiveStandby => online == 1 && offline == 1,
            AvailabilityType::Standalone => online == 1,
            AvailabilityType::NotApplicable => false,
        };
        if ok { GroupState::Ok } else { GroupState::Invalid }
    }
}

impl FromStr for GroupState {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ok" => Ok(GroupState::Ok),
            "invalid" => Ok(GroupState::Invalid),
            "undefined" => Ok(GroupState::Undefined),
            other => Err(ModelError::unknown("group state", other)),
        }
    }
}

impl fmt::Display for GroupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Frozen bits of a group or system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Frozen {
    pub persistent: bool,
    pub temporary: bool,
}

impl Frozen {
    pub fn is_frozen(&self) -> bool {
        self.persistent || self.temporary
    }

    pub fn from_flags(frozen: &str, tfrozen: &str) -> Self {
        Frozen {
            persistent: frozen.trim() == "1",
            temporary: tfrozen.trim() == "1",
        }
    }
}

impl fmt::Display for Frozen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.persistent {
            f.write_str("Perm")
        } else if self.temporary {
            f.write_str("Temp")
        } else {
            f.write_str("-")
        }
    }
}

/// One row of the joined group status view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupStatusRow {
    pub cluster: String,
    pub group: String,
    pub system: String,
    pub avail: AvailabilityType,
    pub state: ServiceState,
    pub group_state: GroupState,
    pub frozen: Frozen,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uptime: Option<String>,
}

impl GroupStatusRow {
    pub fn headers(with_uptime: bool) -> Vec<&'static str> {
        let mut headers = vec![
            "Cluster",
            "Group",
            "System",
            "HAType",
            "ServiceState",
            "GroupState",
            "Frozen",
        ];
        if with_uptime {
            headers.push("Uptime");
        }
        headers
    }
}

/// One row of the system status view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStatusRow {
    pub cluster: String,
    pub system: String,
    pub state: ServiceState,
    pub frozen: Frozen,
}

impl SystemStatusRow {
    pub fn headers() -> Vec<&'static str> {
        vec!["Cluster", "System", "State", "Frozen"]
    }

    /// A system row is OK when the system is running and not frozen.
    pub fn is_ok(&self) -> bool {
        self.state == ServiceState::Running && !self.frozen.is_frozen()
    }
}

impl TableRow for GroupStatusRow {
    fn cell(&self, column: &str) -> String {
        match column {
            "Cluster" => self.cluster.clone(),
            "Group" => self.group.clone(),
            "System" => self.system.clone(),
            "HAType" => self.avail.to_string(),
            "ServiceState" => self.state.to_string(),
            "GroupState" => self.group_state.to_string(),
            "Frozen" => self.frozen.to_string(),
            "Uptime" => self.uptime.clone().unwrap_or_else(|| "-".to_string()),
            _ => String::new(),
        }
    }
}

impl TableRow for SystemStatusRow {
    fn cell(&self, column: &str) -> String {
        match column {
            "Cluster" => self.cluster.clone(),
            "System" => self.system.clone(),
            "State" => self.state.to_string(),
            "Frozen" => self.frozen.to_string(),
            _ => String::new(),
        }
    }
}

/// VCS group name for a modelled clustered service.
pub fn vcs_group_name(cluster: &str, service_id: &str) -> String {
    format!("Grp_CS_{}_{}", cluster, service_id.replace('-', "_"))
}

/// Strips the `Grp_CS_<cluster>_` prefix from a VCS group name.
pub fn model_service_id(cluster: &str, group_name: &str) -> ModelResult<String> {
    let prefix = format!("Grp_CS_{cluster}_");
    group_name
        .strip_prefix(&prefix)
        .map(str::to_string)
        .ok_or_else(|| ModelError::malformed("group name", group_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_availability_derivation() {
        assert_eq!(AvailabilityType::derive(1, 1, 2), AvailabilityType::ActiveStandby);
        assert_eq!(AvailabilityType::derive(2, 0, 2), AvailabilityType::Parallel);
        assert_eq!(AvailabilityType::derive(1, 0, 1), AvailabilityType::Parallel);
        assert_eq!(AvailabilityType::derive(1, 0, 2), AvailabilityType::Standalone);
    }

    #[test]
    fn test_group_state_evaluation() {
        use ServiceState::*;
        assert_eq!(
            GroupState::evaluate(AvailabilityType::Parallel, &[Online, Online]),
            GroupState::Ok
        );
        assert_eq!(
            GroupState::evaluate(AvailabilityType::Parallel, &[Online, Offline]),
            GroupState::Invalid
        );
        assert_eq!(
            GroupState::evaluate(AvailabilityType::ActiveStandby, &[Online, Offline]),
            GroupState::Ok
        );
        assert_eq!(
            GroupState::evaluate(AvailabilityType::ActiveStandby, &[Online, Online]),
            GroupState::Invalid
        );
        assert_eq!(
            GroupState::evaluate(AvailabilityType::ActiveStandby, &[Offline, Faulted]),
            GroupState::Invalid
        );
    }

    #[test]
    fn test_state_with_modifiers() {
        assert_eq!(ServiceState::from_vcs("ONLINE"), ServiceState::Online);
        assert_eq!(ServiceState::from_vcs("|OFFLINE|FAULTED|"), ServiceState::Faulted);
        assert_eq!(ServiceState::from_vcs("OFFLINE|STARTING"), ServiceState::Starting);
        assert_eq!(ServiceState::from_vcs("weird"), ServiceState::Unknown);
        assert_eq!(ServiceState::from_vcs("POWERED OFF"), ServiceState::PoweredOff);
    }

    #[test]
    fn test_frozen_display() {
        assert_eq!(Frozen::from_flags("1", "0").to_string(), "Perm");
        assert_eq!(Frozen::from_flags("0", "1").to_string(), "Temp");
        assert_eq!(Frozen::default().to_string(), "-");
    }

    #[test]
    fn test_group_names() {
        assert_eq!(vcs_group_name("svc_cluster", "msap"), "Grp_CS_svc_cluster_msap");
        assert_eq!(vcs_group_name("db_cluster", "sg-neo4j"), "Grp_CS_db_cluster_sg_neo4j");
        assert_eq!(
            model_service_id("svc_cluster", "Grp_CS_svc_cluster_msap").unwrap(),
            "msap"
        );
        assert!(model_service_id("svc_cluster", "Grp_NIC_svc_cluster_eth0").is_err());
    }
}

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

//! Read side of the control plane: the joined group view, the system
//! view, verification of both and the group event history.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use mco::agents::{GroupDisplay, HistoryEvent};
use mco::{HostCode, McoError};
use model::TableRow;
use model::item::ItemState;
use model::vcs::{
    AvailabilityType, Frozen, GroupState, GroupStatusRow, ServiceState, SystemStatusRow,
};
use serde::{Deserialize, Serialize};

use crate::control::Vcs;
use crate::errors::{VcsError, VcsResult};
use crate::filter::{GroupFilter, Pattern, matches, matches_any};
use crate::inventory::{Inventory, ModelledCluster, ModelledGroup};

/// Group selected by `verify` when no group filter is given.
pub const DEFAULT_VERIFY_GROUPS: &str = "Grp_CS_.*";

const NEO4J_GROUP: &str = "neo4j_clustered_service";
const VERSANT_GROUP: &str = "versant_clustered_service";

/// How names are shown: as VCS knows them (`v`), as modelled (`m`) or
/// both (`x`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewType {
    #[default]
    Vcs,
    Model,
    Both,
}

impl FromStr for ViewType {
    type Err = VcsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "v" => Ok(ViewType::Vcs),
            "m" => Ok(ViewType::Model),
            "x" => Ok(ViewType::Both),
            other => Err(VcsError::usage(format!("Unknown view type '{other}', expected v, m or x"))),
        }
    }
}

impl ViewType {
    fn render(&self, real: &str, alias: &str) -> String {
        match self {
            ViewType::Vcs => real.to_string(),
            ViewType::Model => alias.to_string(),
            ViewType::Both => format!("{real}/{alias}"),
        }
    }

    /// Rewrites group and system names of joined rows.
    pub fn apply_groups(&self, inventory: &Inventory, rows: &mut [GroupStatusRow]) {
        if *self == ViewType::Vcs {
            return;
        }
        let nodes = node_ids(inventory);
        for row in rows {
            let service = inventory
                .group(&row.cluster, &row.group)
                .map(|g| g.service_id.clone())
                .unwrap_or_else(|| row.group.clone());
            let node = nodes.get(&row.system).cloned().unwrap_or_else(|| row.system.clone());
            row.group = self.render(&row.group, &service);
            row.system = self.render(&row.system, &node);
        }
    }

    pub fn apply_systems(&self, inventory: &Inventory, rows: &mut [SystemStatusRow]) {
        if *self == ViewType::Vcs {
            return;
        }
        let nodes = node_ids(inventory);
        for row in rows {
            let node = nodes.get(&row.system).cloned().unwrap_or_else(|| row.system.clone());
            row.system = self.render(&row.system, &node);
        }
    }
}

// hostname -> node id
fn node_ids(inventory: &Inventory) -> BTreeMap<String, String> {
    inventory
        .aliases
        .iter()
        .map(|(id, hostname)| (hostname.clone(), id.clone()))
        .collect()
}

/// One line of `show_history`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryLine {
    pub date: String,
    pub group: String,
    pub system: String,
    pub info: String,
}

impl HistoryLine {
    pub fn headers() -> Vec<&'static str> {
        vec!["Date", "Group", "System", "Event"]
    }

    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(self.date.trim(), HistoryEvent::DATE_FORMAT).ok()
    }
}

impl TableRow for HistoryLine {
    fn cell(&self, column: &str) -> String {
        match column {
            "Date" => self.date.clone(),
            "Group" => self.group.clone(),
            "System" => self.system.clone(),
            "Event" => self.info.clone(),
            _ => String::new(),
        }
    }
}

impl fmt::Display for HistoryLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.date, self.group, self.system, self.info)
    }
}

fn undefined_row(cluster: &str, group: &str, system: &str) -> GroupStatusRow {
    GroupStatusRow {
        cluster: cluster.to_string(),
        group: group.to_string(),
        system: system.to_string(),
        avail: AvailabilityType::NotApplicable,
        state: ServiceState::Undefined,
        group_state: GroupState::Undefined,
        frozen: Frozen::default(),
        uptime: None,
    }
}

// Emitted for every system of a cluster where no system answered.
fn synthetic_row(cluster: &str, system: &str) -> GroupStatusRow {
    GroupStatusRow {
        cluster: cluster.to_string(),
        group: "-".to_string(),
        system: system.to_string(),
        avail: AvailabilityType::NotApplicable,
        state: ServiceState::Unknown,
        group_state: GroupState::Invalid,
        frozen: Frozen::default(),
        uptime: None,
    }
}

/// Availability type as VCS reports it, falling back to the model.
fn live_avail(global: Option<&BTreeMap<String, String>>, systems: usize, modelled: AvailabilityType) -> AvailabilityType {
    match global.and_then(|g| g.get("Parallel")).map(|p| p.trim()) {
        Some(_) if systems == 1 => AvailabilityType::Standalone,
        Some("1") => AvailabilityType::Parallel,
        Some("0") => AvailabilityType::ActiveStandby,
        _ => modelled,
    }
}

/// Uptime of a group on `system`, from its last "online" engine event.
pub fn uptime_from_history(events: &[HistoryEvent], system: &str, now: NaiveDateTime) -> Option<String> {
    let online_code = HostCode::UptimeEvent.vendor_code()?;
    let since = events
        .iter()
        .rev()
        .find(|e| e.id == online_code && e.info.trim_end().ends_with(system))?
        .timestamp()?;
    let secs = (now - since).num_seconds().max(0) as u64;
    Some(humantime::format_duration(Duration::from_secs(secs)).to_string())
}

/// Fails with the offending rows when any group is not OK.
///
/// Only one of the Neo4j and Versant groups is expected online at a time:
/// the one not in use is skipped, and a frozen Versant group is accepted.
pub fn check_groups(rows: &[GroupStatusRow], dps_uses_neo4j: bool) -> VcsResult<()> {
    let skipped = if dps_uses_neo4j { VERSANT_GROUP } else { NEO4J_GROUP };
    let bad: Vec<String> = rows
        .iter()
        .filter(|r| !r.group.contains(skipped))
        .filter(|r| {
            r.group_state != GroupState::Ok
                || (r.frozen.is_frozen() && !r.group.contains(VERSANT_GROUP))
        })
        .map(|r| {
            format!(
                "{} {} {} {} {} {}",
                r.cluster, r.group, r.system, r.state, r.group_state, r.frozen
            )
        })
        .collect();
    if bad.is_empty() {
        Ok(())
    } else {
        Err(VcsError::InvalidState { rows: bad })
    }
}

pub fn check_systems(rows: &[SystemStatusRow]) -> VcsResult<()> {
    let bad: Vec<String> = rows
        .iter()
        .filter(|r| !r.is_ok())
        .map(|r| format!("{} {} {} {}", r.cluster, r.system, r.state, r.frozen))
        .collect();
    if bad.is_empty() {
        Ok(())
    } else {
        Err(VcsError::InvalidState { rows: bad })
    }
}

impl Vcs {
    /// Joined group status of every modelled, activated group matching
    /// the filter.
    pub async fn group_status(&self, filter: &GroupFilter, uptimes: bool) -> VcsResult<Vec<GroupStatusRow>> {
        let inventory = self.inventory().await?;
        let mut rows = Vec::new();
        for cluster in inventory.clusters_matching(filter.cluster.as_ref()) {
            let groups: Vec<&ModelledGroup> = cluster
                .groups
                .values()
                .filter(|g| !g.deactivated)
                .filter(|g| matches(filter.group.as_ref(), &g.vcs_name))
                .filter(|g| matches_any(filter.system.as_ref(), g.systems.iter().map(String::as_str)))
                .collect();
            if groups.is_empty() {
                continue;
            }
            let (initial, live): (Vec<&ModelledGroup>, Vec<&ModelledGroup>) =
                groups.into_iter().partition(|g| g.state == ItemState::Initial);
            for group in initial {
                rows.extend(
                    group
                        .systems
                        .iter()
                        .map(|s| undefined_row(&cluster.name, &group.vcs_name, s)),
                );
            }
            if live.is_empty() {
                continue;
            }

            let names: Vec<String> = live.iter().map(|g| g.vcs_name.clone()).collect();
            let Some((host, display)) = self.cluster_display(cluster, &names).await? else {
                tracing::warn!(target: "enminst::vcs", cluster = %cluster.name, "no group data from any system");
                rows.extend(cluster.systems.iter().map(|s| synthetic_row(&cluster.name, s)));
                continue;
            };
            for group in live {
                rows.extend(self.join_group(cluster, group, &display, &host, uptimes).await);
            }
        }
        filter.retain_rows(&mut rows);
        Ok(rows)
    }

    // `hagrp -display` from the first system that answers.
    async fn cluster_display(
        &self,
        cluster: &ModelledCluster,
        groups: &[String],
    ) -> VcsResult<Option<(String, GroupDisplay)>> {
        let enminst = self.enminst();
        for system in &cluster.systems {
            match enminst.hagrp_display(groups, system).await {
                Ok(display) => return Ok(Some((system.clone(), display))),
                Err(e) if e.host_code() == Some(HostCode::NoAnswerFromNode) => {
                    tracing::warn!(target: "enminst::vcs", system, "system is powered off");
                }
                Err(e) if e.is_unreachable() => {
                    tracing::warn!(target: "enminst::vcs", system, error = %e, "system unavailable");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }

    async fn join_group(
        &self,
        cluster: &ModelledCluster,
        group: &ModelledGroup,
        display: &GroupDisplay,
        host: &str,
        uptimes: bool,
    ) -> Vec<GroupStatusRow> {
        let attributes = display.get(&group.vcs_name);
        let global = attributes.and_then(|a| a.get("global"));
        let avail = live_avail(global, group.systems.len(), group.avail);
        let frozen = Frozen::from_flags(
            global.and_then(|g| g.get("Frozen")).map(String::as_str).unwrap_or("0"),
            global.and_then(|g| g.get("TFrozen")).map(String::as_str).unwrap_or("0"),
        );
        let states: Vec<ServiceState> = group
            .systems
            .iter()
            .map(|system| {
                attributes
                    .and_then(|a| a.get(system))
                    .and_then(|a| a.get("State"))
                    .map(|s| ServiceState::from_vcs(s))
                    .unwrap_or(ServiceState::Unknown)
            })
            .collect();
        let group_state = GroupState::evaluate(avail, &states);

        let history = if uptimes && states.contains(&ServiceState::Online) {
            match self.enminst().hagrp_history(Some(&group.vcs_name), host).await {
                Ok(mut history) => history.remove(&group.vcs_name).unwrap_or_default(),
                Err(e) => {
                    tracing::warn!(target: "enminst::vcs", group = %group.vcs_name, error = %e, "could not read group history");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };
        let now = Local::now().naive_local();

        group
            .systems
            .iter()
            .zip(states)
            .map(|(system, state)| GroupStatusRow {
                cluster: cluster.name.clone(),
                group: group.vcs_name.clone(),
                system: system.clone(),
                avail,
                state,
                group_state,
                frozen,
                uptime: if uptimes && state == ServiceState::Online {
                    uptime_from_history(&history, system, now)
                } else {
                    None
                },
            })
            .collect()
    }

    /// Group status restricted to `Grp_CS_` groups unless filtered,
    /// failing when any row is not OK.
    pub async fn verify_group_status(&self, filter: &GroupFilter) -> VcsResult<Vec<GroupStatusRow>> {
        let mut filter = filter.clone();
        if filter.group.is_none() {
            filter.group = Some(Pattern::new(DEFAULT_VERIFY_GROUPS)?);
        }
        let rows = self.group_status(&filter, false).await?;
        check_groups(&rows, self.dps_uses_neo4j)?;
        tracing::info!(target: "enminst::vcs", rows = rows.len(), "VCS group status is OK");
        Ok(rows)
    }

    /// State and frozen bits of every system of the matching clusters.
    pub async fn system_status(&self, cluster: Option<&Pattern>) -> VcsResult<Vec<SystemStatusRow>> {
        let inventory = self.inventory().await?;
        let mut rows = Vec::new();
        for modelled in inventory.clusters_matching(cluster) {
            let (initial, live): (Vec<&String>, Vec<&String>) =
                modelled.systems.iter().partition(|s| modelled.is_initial(s));
            rows.extend(initial.into_iter().map(|s| SystemStatusRow {
                cluster: modelled.name.clone(),
                system: s.clone(),
                state: ServiceState::Undefined,
                frozen: Frozen::default(),
            }));
            if live.is_empty() {
                continue;
            }
            let live: Vec<String> = live.into_iter().cloned().collect();
            rows.extend(self.cluster_systems(&modelled.name, &live).await?);
        }
        Ok(rows)
    }

    async fn cluster_systems(&self, cluster: &str, systems: &[String]) -> VcsResult<Vec<SystemStatusRow>> {
        let mut last_error: Option<McoError> = None;
        for host in systems {
            match self.read_systems(cluster, systems, host).await {
                Ok(rows) => return Ok(rows),
                Err(e) if e.is_unreachable() => {
                    tracing::warn!(target: "enminst::vcs", system = %host, error = %e, "system unavailable");
                    last_error = Some(e);
                }
                Err(e) => return Err(e.into()),
            }
        }
        let state = match last_error.as_ref().and_then(McoError::host_code) {
            Some(HostCode::EngineUnreachable) => ServiceState::Exited,
            Some(HostCode::NoAnswerFromNode) => ServiceState::PoweredOff,
            _ => ServiceState::Unknown,
        };
        Ok(systems
            .iter()
            .map(|system| SystemStatusRow {
                cluster: cluster.to_string(),
                system: system.clone(),
                state,
                frozen: Frozen::default(),
            })
            .collect())
    }

    async fn read_systems(&self, cluster: &str, systems: &[String], host: &str) -> Result<Vec<SystemStatusRow>, McoError> {
        let enminst = self.enminst();
        let states: BTreeMap<String, ServiceState> = enminst
            .hasys_state(host)
            .await?
            .into_iter()
            .map(|row| (row.name, ServiceState::from_vcs(&row.states.join("|"))))
            .collect();
        let running: Vec<String> = systems
            .iter()
            .filter(|s| states.get(*s) == Some(&ServiceState::Running))
            .cloned()
            .collect();
        let display = if running.is_empty() {
            Default::default()
        } else {
            enminst.hasys_display(&running, host).await?
        };
        Ok(systems
            .iter()
            .map(|system| {
                let attrs = display.get(system);
                let flag = |name: &str| attrs.and_then(|a| a.get(name)).map(String::as_str).unwrap_or("0");
                SystemStatusRow {
                    cluster: cluster.to_string(),
                    system: system.clone(),
                    state: states.get(system).copied().unwrap_or(ServiceState::Unknown),
                    frozen: Frozen::from_flags(flag("Frozen"), flag("TFrozen")),
                }
            })
            .collect())
    }

    pub async fn verify_system_status(&self, cluster: Option<&Pattern>) -> VcsResult<Vec<SystemStatusRow>> {
        let rows = self.system_status(cluster).await?;
        check_systems(&rows)?;
        tracing::info!(target: "enminst::vcs", rows = rows.len(), "VCS system status is OK");
        Ok(rows)
    }

    /// Engine events of every matching group, optionally sorted by date
    /// across groups.
    pub async fn history(&self, filter: &GroupFilter, sort_by_date: bool) -> VcsResult<Vec<HistoryLine>> {
        let inventory = self.inventory().await?;
        let enminst = self.enminst();
        let mut lines = Vec::new();
        for group in inventory.groups_matching(
            filter.cluster.as_ref(),
            filter.group.as_ref(),
            filter.system.as_ref(),
        ) {
            let Some(host) = group.systems.first() else {
                continue;
            };
            let events = enminst
                .hagrp_history(Some(&group.vcs_name), host)
                .await?
                .remove(&group.vcs_name)
                .unwrap_or_default();
            if events.is_empty() {
                tracing::info!(target: "enminst::vcs", group = %group.vcs_name, "Could not find any history");
                continue;
            }
            lines.extend(events.into_iter().map(|e| HistoryLine {
                system: event_system(&e.info, &group.systems).unwrap_or_default(),
                date: e.date,
                group: group.vcs_name.clone(),
                info: e.info,
            }));
        }
        if sort_by_date {
            lines.sort_by_key(HistoryLine::timestamp);
        }
        Ok(lines)
    }
}

// The system an engine event refers to, if it names one of the group's.
fn event_system(info: &str, systems: &[String]) -> Option<String> {
    systems
        .iter()
        .find(|s| info.split_whitespace().any(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '-' && c != '_') == s.as_str()))
        .cloned()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn row(group: &str, group_state: GroupState, frozen: Frozen) -> GroupStatusRow {
        GroupStatusRow {
            cluster: "db_cluster".into(),
            group: group.into(),
            system: "db-1".into(),
            avail: AvailabilityType::ActiveStandby,
            state: ServiceState::Offline,
            group_state,
            frozen,
            uptime: None,
        }
    }

    fn event(date: &str, id: &str, info: &str) -> HistoryEvent {
        HistoryEvent {
            date: date.into(),
            id: id.into(),
            info: info.into(),
        }
    }

    #[test]
    fn test_check_groups_neo4j_carve_out() {
        let versant_down = vec![
            row("Grp_CS_db_cluster_versant_clustered_service", GroupState::Invalid, Frozen::default()),
            row("Grp_CS_db_cluster_neo4j_clustered_service", GroupState::Ok, Frozen::default()),
        ];
        assert!(check_groups(&versant_down, true).is_ok());
        assert!(check_groups(&versant_down, false).unwrap_err().is_invalid_state());

        let neo4j_down = vec![row("Grp_CS_db_cluster_neo4j_clustered_service", GroupState::Invalid, Frozen::default())];
        assert!(check_groups(&neo4j_down, false).is_ok());
    }

    #[test]
    fn test_check_groups_frozen() {
        let frozen = Frozen {
            persistent: true,
            temporary: false,
        };
        assert!(check_groups(&[row("Grp_CS_db_cluster_mysql", GroupState::Ok, frozen)], false).is_err());
        assert!(
            check_groups(&[row("Grp_CS_db_cluster_versant_clustered_service", GroupState::Ok, frozen)], false).is_ok()
        );
    }

    #[test]
    fn test_uptime_from_history() {
        let events = vec![
            event("Mon Oct 12 10:00:00 2026", "V-16-1-10447", "Group Grp_CS_x is online on system db-1"),
            event("Mon Oct 12 11:00:00 2026", "V-16-1-10447", "Group Grp_CS_x is online on system db-2"),
            event("Mon Oct 12 12:00:00 2026", "V-16-1-10446", "Group Grp_CS_x is offline on system db-1"),
        ];
        let now = NaiveDate::from_ymd_opt(2026, 10, 12)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap();
        assert_eq!(uptime_from_history(&events, "db-1", now).as_deref(), Some("2h 30m"));
        assert_eq!(uptime_from_history(&events, "db-2", now).as_deref(), Some("1h 30m"));
        assert_eq!(uptime_from_history(&events, "db-3", now), None);
    }

    #[test]
    fn test_live_avail() {
        let mut global = BTreeMap::new();
        global.insert("Parallel".to_string(), "1".to_string());
        assert_eq!(live_avail(Some(&global), 2, AvailabilityType::Standalone), AvailabilityType::Parallel);
        assert_eq!(live_avail(Some(&global), 1, AvailabilityType::Parallel), AvailabilityType::Standalone);
        global.insert("Parallel".to_string(), "0".to_string());
        assert_eq!(live_avail(Some(&global), 2, AvailabilityType::Parallel), AvailabilityType::ActiveStandby);
        assert_eq!(live_avail(None, 2, AvailabilityType::Parallel), AvailabilityType::Parallel);
    }

    #[test]
    fn test_view_type() {
        assert_eq!("x".parse::<ViewType>().unwrap(), ViewType::Both);
        assert!("q".parse::<ViewType>().is_err());
        assert_eq!(ViewType::Both.render("db-1", "node1"), "db-1/node1");
        assert_eq!(ViewType::Model.render("db-1", "node1"), "node1");
    }

    #[test]
    fn test_event_system() {
        let systems = vec!["db-1".to_string(), "db-2".to_string()];
        assert_eq!(
            event_system("Group Grp_CS_x is online on system db-2", &systems).as_deref(),
            Some("db-2")
        );
        assert_eq!(event_system("Group Grp_CS_x faulted", &systems), None);
    }
}

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

//! Redistribution of the database cluster's active-standby groups so the
//! DPS database runs on a system of its own.

use litp::ModelApi;
use model::vcs::{AvailabilityType, GroupStatusRow, ServiceState};
use vcs::{GroupFilter, Pattern, Vcs};

use crate::errors::{UpgradeError, UpgradeResult};

pub const DB_CLUSTER: &str = "db_cluster";
const VERSANT_GROUP: &str = "versant_clustered_service";
const NEO4J_GROUP: &str = "sg_neo4j_clustered_service";
const DEPLOYMENT_TYPE_ITEM: &str = "/software/items/config_manager/global_properties/enm_deployment_type";
const RACK_SUFFIX: &str = "ENM_On_Rack_Servers";

// Fixed placement on rack deployments, by node id.
const RACK_LAYOUT: [(&str, &str); 6] = [
    ("Grp_CS_db_cluster_elasticsearch_clustered_service", "db-2"),
    ("Grp_CS_db_cluster_eshistory_clustered_service", "db-3"),
    ("Grp_CS_db_cluster_jms_clustered_service", "db-3"),
    ("Grp_CS_db_cluster_modeldeployment_cluster_service_1", "db-1"),
    ("Grp_CS_db_cluster_postgres_clustered_service", "db-3"),
    ("Grp_CS_db_cluster_sg_neo4jbur_clustered_service", "db-1"),
];

pub async fn is_rack(model: &dyn ModelApi) -> UpgradeResult<bool> {
    match model.get(DEPLOYMENT_TYPE_ITEM).await {
        Ok(item) => Ok(item.property("value").is_some_and(|v| v.ends_with(RACK_SUFFIX))),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Where the DPS database group runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DpsLayout {
    pub group: String,
    pub active: String,
    pub standby: Option<String>,
    /// Systems the group is registered on.
    pub nodes: usize,
}

pub fn dps_group(dps_uses_neo4j: bool) -> &'static str {
    if dps_uses_neo4j { NEO4J_GROUP } else { VERSANT_GROUP }
}

pub fn dps_layout(rows: &[GroupStatusRow], group: &str) -> UpgradeResult<DpsLayout> {
    let dps: Vec<&GroupStatusRow> = rows.iter().filter(|r| r.group.contains(group)).collect();
    let active = dps
        .iter()
        .find(|r| r.state == ServiceState::Online)
        .map(|r| r.system.clone())
        .ok_or_else(|| UpgradeError::DbGroupOffline(group.to_string()))?;
    let standby = dps
        .iter()
        .find(|r| r.state == ServiceState::Offline)
        .map(|r| r.system.clone());
    Ok(DpsLayout {
        group: group.to_string(),
        active,
        standby,
        nodes: dps.len(),
    })
}

fn switchable<'a>(rows: &'a [GroupStatusRow], dps_group: &'a str) -> impl Iterator<Item = &'a GroupStatusRow> + 'a {
    rows.iter().filter(move |r| {
        r.avail == AvailabilityType::ActiveStandby
            && r.state == ServiceState::Online
            && !r.group.contains(dps_group)
    })
}

/// Two system layout: every other active-standby group online beside the
/// DPS database moves to the database's standby side.
pub fn two_node_switches(rows: &[GroupStatusRow], layout: &DpsLayout) -> Vec<(String, String)> {
    let Some(standby) = &layout.standby else {
        return Vec::new();
    };
    let mut out: Vec<(String, String)> = switchable(rows, &layout.group)
        .filter(|r| r.system == layout.active)
        .map(|r| (r.group.clone(), standby.clone()))
        .collect();
    // elasticsearch before postgres
    out.sort();
    out
}

/// Causal cluster layout: groups online on db-2 move to db-1.
pub fn causal_cluster_switches(rows: &[GroupStatusRow], dps_group: &str, db1: &str, db2: &str) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = switchable(rows, dps_group)
        .filter(|r| r.system == db2)
        .map(|r| (r.group.clone(), db1.to_string()))
        .collect();
    out.sort();
    out
}

async fn switch(vcs: &Vcs, group: &str, system: &str) -> UpgradeResult<()> {
    tracing::info!(target: "enminst::upgrade", group, to = system, "switching DB group");
    vcs.hagrp_switch(
        &Pattern::exact(group),
        Some(&Pattern::exact(system)),
        Some(&Pattern::exact(DB_CLUSTER)),
        None,
    )
    .await?;
    Ok(())
}

/// Moves the active-standby groups of the database cluster off the system
/// running the DPS database.
pub async fn switch_db_groups(vcs: &Vcs, dps_uses_neo4j: bool, rack: bool) -> UpgradeResult<()> {
    tracing::info!(target: "enminst::upgrade", "distributing active-standby service groups in the DB cluster");
    let inventory = vcs.inventory().await?;
    let system_of = |node: &str| inventory.aliases.get(node).cloned().unwrap_or_else(|| node.to_string());

    if rack {
        tracing::info!(target: "enminst::upgrade", "rack deployment");
        for (group, node) in RACK_LAYOUT {
            switch(vcs, group, &system_of(node)).await?;
        }
        return Ok(());
    }

    let systems = inventory.clusters.get(DB_CLUSTER).map_or(0, |c| c.systems.len());
    if systems < 2 {
        tracing::warn!(target: "enminst::upgrade", "DB cluster service group failover is not supported on this deployment");
        return Ok(());
    }

    let rows = vcs
        .group_status(&GroupFilter::new().with_cluster(Pattern::exact(DB_CLUSTER)), false)
        .await?;
    let layout = dps_layout(&rows, dps_group(dps_uses_neo4j))?;
    let switches = match layout.nodes {
        1 => {
            tracing::info!(target: "enminst::upgrade", group = %layout.group, "group has one system, nothing to switch");
            return Ok(());
        }
        2 => two_node_switches(&rows, &layout),
        _ => causal_cluster_switches(&rows, &layout.group, &system_of("db-1"), &system_of("db-2")),
    };
    for (group, system) in switches {
        switch(vcs, &group, &system).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use model::vcs::{Frozen, GroupState};

    use super::*;

    fn row(group: &str, system: &str, avail: AvailabilityType, state: ServiceState) -> GroupStatusRow {
        GroupStatusRow {
            cluster: DB_CLUSTER.into(),
            group: group.into(),
            system: system.into(),
            avail,
            state,
            group_state: GroupState::Ok,
            frozen: Frozen::default(),
            uptime: None,
        }
    }

    fn two_node_rows() -> Vec<GroupStatusRow> {
        use AvailabilityType::*;
        use ServiceState::*;
        vec![
            row("Grp_CS_db_cluster_versant_clustered_service", "db1", ActiveStandby, Online),
            row("Grp_CS_db_cluster_versant_clustered_service", "db2", ActiveStandby, Offline),
            row("Grp_CS_db_cluster_postgres_clustered_service", "db1", ActiveStandby, Online),
            row("Grp_CS_db_cluster_postgres_clustered_service", "db2", ActiveStandby, Offline),
            row("Grp_CS_db_cluster_elasticsearch_clustered_service", "db1", ActiveStandby, Online),
            row("Grp_CS_db_cluster_elasticsearch_clustered_service", "db2", ActiveStandby, Offline),
            row("Grp_CS_db_cluster_jms_clustered_service", "db2", ActiveStandby, Online),
            row("Grp_CS_db_cluster_jms_clustered_service", "db1", ActiveStandby, Offline),
            row("Grp_CS_db_cluster_opendj_clustered_service", "db1", Parallel, Online),
        ]
    }

    #[test]
    fn test_two_node_moves_groups_off_the_database() {
        let rows = two_node_rows();
        let layout = dps_layout(&rows, VERSANT_GROUP).unwrap();
        assert_eq!(layout.active, "db1");
        assert_eq!(layout.standby.as_deref(), Some("db2"));
        assert_eq!(layout.nodes, 2);
        assert_eq!(
            two_node_switches(&rows, &layout),
            vec![
                ("Grp_CS_db_cluster_elasticsearch_clustered_service".to_string(), "db2".to_string()),
                ("Grp_CS_db_cluster_postgres_clustered_service".to_string(), "db2".to_string()),
            ]
        );
    }

    #[test]
    fn test_offline_database_is_an_error() {
        let rows = vec![row(
            "Grp_CS_db_cluster_sg_neo4j_clustered_service",
            "db1",
            AvailabilityType::ActiveStandby,
            ServiceState::Offline,
        )];
        let err = dps_layout(&rows, NEO4J_GROUP).unwrap_err();
        assert_eq!(err.exit_code(), model::ExitCode::VcsGroupOffline);
    }

    #[test]
    fn test_causal_cluster_moves_groups_off_db2() {
        use AvailabilityType::*;
        use ServiceState::*;
        let rows = vec![
            row("Grp_CS_db_cluster_sg_neo4j_clustered_service", "db1", Parallel, Online),
            row("Grp_CS_db_cluster_sg_neo4j_clustered_service", "db2", Parallel, Online),
            row("Grp_CS_db_cluster_sg_neo4j_clustered_service", "db3", Parallel, Online),
            row("Grp_CS_db_cluster_postgres_clustered_service", "db2", ActiveStandby, Online),
            row("Grp_CS_db_cluster_jms_clustered_service", "db1", ActiveStandby, Online),
        ];
        assert_eq!(dps_layout(&rows, NEO4J_GROUP).unwrap().nodes, 3);
        assert_eq!(
            causal_cluster_switches(&rows, NEO4J_GROUP, "db1", "db2"),
            vec![("Grp_CS_db_cluster_postgres_clustered_service".to_string(), "db1".to_string())]
        );
    }
}

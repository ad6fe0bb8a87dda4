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

//! OpenDJ replication between the directory nodes of the db cluster.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use runtime::CommandSpec;

use crate::engine::{DB_CLUSTER, PrecheckEngine};
use crate::errors::{Failure, FailureKind, PrecheckError, PrecheckResult};
use crate::properties::read_properties;
use crate::report::CheckOutcome;

const LDAP_ROOT_KEY: &str = "COM_INF_LDAP_ROOT_SUFFIX";
const LDAP_PASSWORD_KEY: &str = "LDAP_ADMIN_PASSWORD";
const MONITOR_FAIL: &str = "monitor_replication......FAIL";
const MONITOR_OK: &str = "monitor_replication......OK";
const OPENSSL: &str = "/usr/bin/openssl";
pub const REPLICATION_INTACT: &str = "OpenDJ replication is intact";

// suffix : server:4444 : entries : enabled : ds-id : rs-id : rs-port : mc [: ...]
static ROW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(\S+)\s+:\s+(\S+):4444\s+:\s+([0-9]+)\s+:\s+(\S+)\s+:\s+([0-9]+)\s+:\s+([0-9]+)\s+:\s+([0-9]+)\s+:\s+([0-9]+)(\s+:.*)?$",
    )
    .expect("static regex is valid")
});

/// One server line of the replication status report.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReplicationRow {
    pub server: String,
    pub entries: String,
    pub enabled: String,
    pub ds_id: String,
    pub rs_id: String,
    pub rs_port: String,
    pub mc_count: String,
}

impl ReplicationRow {
    pub fn is_enabled(&self) -> bool {
        self.enabled == "true"
    }
}

/// Rows of the report that belong to the `root` suffix.
pub fn parse_replication_rows(root: &str, text: &str) -> Vec<ReplicationRow> {
    text.lines()
        .filter_map(|line| ROW_RE.captures(line.trim()))
        .filter(|caps| &caps[1] == root)
        .map(|caps| ReplicationRow {
            server: caps[2].to_string(),
            entries: caps[3].to_string(),
            enabled: caps[4].to_string(),
            ds_id: caps[5].to_string(),
            rs_id: caps[6].to_string(),
            rs_port: caps[7].to_string(),
            mc_count: caps[8].to_string(),
        })
        .collect()
}

/// Healthy replication has at least two servers, every one enabled, with
/// the same entry count and no missing changes.
pub fn evaluate_replication(rows: &[ReplicationRow]) -> Vec<Failure> {
    if rows.len() < 2 {
        return vec![Failure::new(
            FailureKind::OpendjReplNodesNotFound,
            format!("expected at least 2 replication servers, found {}", rows.len()),
        )];
    }
    let summary = |value: fn(&ReplicationRow) -> &str| {
        rows.iter()
            .map(|r| format!("{}={}", r.server, value(r)))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let mut failures = Vec::new();
    if rows.iter().any(|r| r.entries != rows[0].entries) {
        failures.push(Failure::new(
            FailureKind::MismatchInNumberOfOpendjEntries,
            format!("entries {}", summary(|r| &r.entries)),
        ));
    }
    if !rows.iter().all(ReplicationRow::is_enabled) {
        failures.push(Failure::new(
            FailureKind::ReplicationNotEnabledOnBothNodes,
            format!("enabled {}", summary(|r| &r.enabled)),
        ));
    }
    if rows.iter().any(|r| r.mc_count != "0") {
        failures.push(Failure::new(
            FailureKind::McIsNotZeroOnBothNodes,
            format!("missing changes {}", summary(|r| &r.mc_count)),
        ));
    }
    failures
}

// What two directory nodes must agree on.
fn fingerprint(rows: &[ReplicationRow]) -> BTreeSet<(String, String, String, String)> {
    rows.iter()
        .map(|r| (r.server.clone(), r.entries.clone(), r.enabled.clone(), r.mc_count.clone()))
        .collect()
}

impl PrecheckEngine {
    /// Queries every online directory node and requires each report to be
    /// healthy and every node to report the same replication view.
    pub(crate) async fn opendj_replication_check(&self) -> PrecheckResult<CheckOutcome> {
        if let Some(skip) = self.virtual_skip() {
            return Ok(skip);
        }
        let instances = self.service_instances(DB_CLUSTER, Some("opendj")).await?;
        tracing::debug!(target: "enminst::prechecks", instances = instances.len(), "OpenDJ service instances");
        if instances.len() < 2 || instances.iter().any(|g| !g.is_online()) {
            return Err(PrecheckError::check(
                FailureKind::OpendjNotOnlineOnTwoNodes,
                "OpenDJ must be ONLINE on two db nodes",
            ));
        }

        let path = &self.locations.global_properties;
        let props = read_properties(path).await?;
        let root = props
            .get(LDAP_ROOT_KEY)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| {
                PrecheckError::check(
                    FailureKind::OpendjPasswordUnavailable,
                    format!("LDAP root cannot be retrieved from {}", path.display()),
                )
            })?;
        let password = self.ldap_password(props.get(LDAP_PASSWORD_KEY).map(String::as_str)).await?;

        let agent = self.precheck_agent();
        let mut views = Vec::new();
        for instance in &instances {
            let system = &instance.system;
            tracing::debug!(target: "enminst::prechecks", %system, "requesting replication status");
            let report = agent.get_replication_status(system, root, &password).await?.out;
            if report.contains(MONITOR_FAIL) {
                return Err(PrecheckError::check(
                    FailureKind::OpendjReplicationFailed,
                    format!("replication monitor on {system} reports a failure"),
                ));
            }
            if report.contains(MONITOR_OK) {
                continue;
            }
            let rows = parse_replication_rows(root, &report);
            tracing::debug!(target: "enminst::prechecks", %system, ?rows, "replication servers");
            let failures = evaluate_replication(&rows);
            if !failures.is_empty() {
                return Err(PrecheckError::failed(
                    failures
                        .into_iter()
                        .map(|f| Failure::new(f.kind, format!("{system}: {}", f.reason)))
                        .collect(),
                ));
            }
            views.push((system.clone(), fingerprint(&rows)));
        }
        if let Some((first, view)) = views.first()
            && let Some((other, _)) = views.iter().find(|(_, v)| v != view)
        {
            return Err(PrecheckError::check(
                FailureKind::OpendjNodesDisagree,
                format!("{first} and {other} report different replication servers"),
            ));
        }
        Ok(CheckOutcome::passed(REPLICATION_INTACT))
    }

    // The admin password is stored encrypted with the OpenDJ passkey.
    async fn ldap_password(&self, encrypted: Option<&str>) -> PrecheckResult<String> {
        let unavailable = || {
            PrecheckError::check(
                FailureKind::OpendjPasswordUnavailable,
                format!(
                    "OpenDJ password cannot be retrieved from {}",
                    self.locations.global_properties.display()
                ),
            )
        };
        let encrypted = encrypted.filter(|p| !p.is_empty()).ok_or_else(unavailable)?;
        let spec = CommandSpec::new(OPENSSL)
            .args(["enc", "-a", "-d", "-aes-128-cbc", "-salt", "-kfile"])
            .arg(self.locations.opendj_passkey.display().to_string())
            .with_stdin(format!("{encrypted}\n"));
        let clear = self.run_local(spec).await?;
        let clear = clear.trim();
        if clear.is_empty() {
            return Err(unavailable());
        }
        Ok(clear.to_string())
    }
}

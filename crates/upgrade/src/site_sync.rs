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

//! Pushes hardware identities from the site parameters straight into the
//! model: HBA port WWNs and network interface MAC addresses. Used when a
//! blade is replaced and nothing else changes.

use litp::{ModelApi, props};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::UpgradeResult;
use crate::sed::SiteParameters;

static WWPN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(asr|aut|db|ebs|esn|evt|scp|str|svc)_node(\d{1,3})_WWPN(1|2)$").expect("static regex is valid")
});
static MAC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(asr|aut|db|ebs|esn|evt|scp|str|svc)_node(\d{1,3})_eth(\d{1,3})_macaddress$")
        .expect("static regex is valid")
});

/// One model property a site parameter maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteValue {
    pub key: String,
    pub path: String,
    pub property: &'static str,
    pub value: String,
}

impl SiteValue {
    // Both identities are hex strings, compared without case.
    fn same_as(&self, current: &str) -> bool {
        self.value.eq_ignore_ascii_case(current)
    }
}

/// Site parameters that name a WWPN or a MAC address, with the model
/// property each one maps to.
pub fn site_values(params: &SiteParameters) -> Vec<SiteValue> {
    let mut out = Vec::new();
    for (key, value) in params.iter() {
        if let Some(c) = WWPN_RE.captures(key) {
            out.push(SiteValue {
                key: key.to_string(),
                path: format!("/infrastructure/systems/{}-{}_system/controllers/hba{}", &c[1], &c[2], &c[3]),
                property: "hba_porta_wwn",
                value: value.to_string(),
            });
        } else if let Some(c) = MAC_RE.captures(key) {
            out.push(SiteValue {
                key: key.to_string(),
                path: format!(
                    "/deployments/enm/clusters/{0}_cluster/nodes/{0}-{1}/network_interfaces/eth{2}",
                    &c[1], &c[2], &c[3]
                ),
                property: "macaddress",
                value: value.to_string(),
            });
        }
    }
    out
}

/// Updates every mapped property whose model value differs. Returns the
/// values written. The commands that undo the change are logged.
pub async fn sync_site_values(model: &dyn ModelApi, params: &SiteParameters) -> UpgradeResult<Vec<SiteValue>> {
    let mut changed = Vec::new();
    let mut rollback = Vec::new();
    for value in site_values(params) {
        let item = model.get(&value.path).await?;
        let current = item.require_property(value.property)?.to_string();
        if value.same_as(&current) {
            tracing::debug!(target: "enminst::upgrade", key = %value.key, "no change");
            continue;
        }
        tracing::info!(target: "enminst::upgrade", path = %value.path, from = %current, to = %value.value, "updating {}", value.property);
        model.update(&value.path, &props([(value.property, value.value.as_str())])).await?;
        rollback.push(format!("litp update -p {} -o {}={current}", value.path, value.property));
        changed.push(value);
    }
    if changed.is_empty() {
        tracing::info!(target: "enminst::upgrade", "no items require updating");
    } else {
        tracing::info!(target: "enminst::upgrade", "model updates can be rolled back with:");
        for line in &rollback {
            tracing::info!(target: "enminst::upgrade", "{line}");
        }
    }
    Ok(changed)
}

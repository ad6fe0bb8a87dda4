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

use std::collections::BTreeSet;

use litp::tree::DEPLOYMENTS;
use model::item::DeploymentItem;

use crate::engine::PrecheckEngine;
use crate::errors::{FailureKind, PrecheckError, PrecheckResult};
use crate::report::CheckOutcome;

/// Differences between the logical volumes a volume group models and the
/// ones the node's grub configuration activates.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct LvDrift {
    pub missing: Vec<String>,
    pub extra: Vec<String>,
}

impl LvDrift {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty()
    }
}

/// Grub lists volumes as `<vg>_<lv>`, one per line.
pub(crate) fn lv_drift(vg: &str, modelled: &BTreeSet<String>, grub_lvs: &str) -> LvDrift {
    let prefix = format!("{vg}_");
    let configured: BTreeSet<String> = grub_lvs
        .lines()
        .filter_map(|l| l.trim().strip_prefix(&prefix))
        .map(str::to_string)
        .collect();
    LvDrift {
        missing: modelled.difference(&configured).cloned().collect(),
        extra: configured.difference(modelled).cloned().collect(),
    }
}

fn grub_enabled_clusters(tree: &DeploymentItem) -> impl Iterator<Item = &DeploymentItem> {
    tree.children
        .iter()
        .filter_map(|d| d.child("clusters"))
        .flat_map(|c| c.children.iter())
        .filter(|c| c.property("grub_lv_enable") == Some("true"))
}

impl PrecheckEngine {
    pub(crate) async fn check_grub_cfg_lvs(&self) -> PrecheckResult<CheckOutcome> {
        if self.is_rack().await? {
            return Ok(CheckOutcome::skipped("Rack deployment, grub logical volumes not applicable"));
        }
        let tree = self.model.get_tree(DEPLOYMENTS).await?;
        let enminst = self.enminst();
        let mut reasons = Vec::new();
        let mut checked = 0;
        for cluster in grub_enabled_clusters(&tree) {
            for node in cluster.child("nodes").map(|n| n.children.as_slice()).unwrap_or_default() {
                let Some(groups) = node
                    .child("storage_profile")
                    .and_then(|p| p.child("volume_groups"))
                else {
                    continue;
                };
                let hostname = node.property("hostname").unwrap_or(&node.id);
                let grub_lvs = enminst.get_grub_conf_lvs(hostname).await?;
                checked += 1;
                for vg in &groups.children {
                    let modelled: BTreeSet<String> = vg
                        .child("file_systems")
                        .map(|f| f.children.iter().map(|fs| fs.id.clone()).collect())
                        .unwrap_or_default();
                    let drift = lv_drift(&vg.id, &modelled, &grub_lvs);
                    if !drift.is_empty() {
                        reasons.push(format!(
                            "{}/{hostname}/{} missing: {}; extra: {}",
                            cluster.id,
                            vg.id,
                            drift.missing.join(", "),
                            drift.extra.join(", ")
                        ));
                    }
                }
            }
        }
        if !reasons.is_empty() {
            return Err(PrecheckError::checks(FailureKind::GrubCfgLvsMismatch, reasons));
        }
        if checked == 0 {
            return Ok(CheckOutcome::skipped("No cluster has grub_lv_enable set"));
        }
        Ok(CheckOutcome::passed("Grub logical volumes match the model"))
    }
}

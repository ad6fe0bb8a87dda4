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

//! Changes applied to the deployment model ahead of the upgrade plan.

use std::collections::BTreeMap;
use std::path::Path;

use litp::{ModelApi, Properties, tree};
use model::item::{DeploymentItem, ItemState};
use runtime::{CommandRunner, CommandSpec, Confirm};

use crate::errors::{UpgradeError, UpgradeResult};
use crate::sed::WorkingConfig;
use crate::xml::DeploymentDescription;

pub const SOFTWARE_IMAGES: &str = "/software/images";

/// Clusters whose lock tasks are skipped by an infrastructure plan.
pub const INFRASTRUCTURE_CLUSTERS: [&str; 9] = [
    "svc_cluster",
    "scp_cluster",
    "eba_cluster",
    "ebs_cluster",
    "str_cluster",
    "asr_cluster",
    "evt_cluster",
    "aut_cluster",
    "db_cluster",
];

// Image items whose working parameter is not named after the item.
const IMAGE_PARAMS: [(&str, &str); 3] = [
    ("rhel7-lsb-image", "ERICrhel79lsbimage"),
    ("rhel7-jboss-image", "ERICrhel79jbossimage"),
    ("sles15-image", "ERICsles15image"),
];

// ---------------------------------------------------------------------------
// node counts

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeCountChange {
    pub clusters_before: usize,
    pub clusters_after: usize,
    pub nodes_before: usize,
    pub nodes_after: usize,
    /// Clusters that are new or gain nodes.
    pub grown: Vec<String>,
}

impl NodeCountChange {
    pub fn compare(current: &BTreeMap<String, usize>, described: &BTreeMap<String, usize>) -> Self {
        let grown = described
            .iter()
            .filter(|(cluster, count)| current.get(*cluster).is_none_or(|c| *count > c))
            .map(|(cluster, _)| cluster.clone())
            .collect();
        Self {
            clusters_before: current.len(),
            clusters_after: described.len(),
            nodes_before: current.values().sum(),
            nodes_after: described.values().sum(),
            grown,
        }
    }

    pub fn is_shrinking(&self) -> bool {
        self.clusters_after < self.clusters_before || self.nodes_after < self.nodes_before
    }

    pub fn is_expanding(&self) -> bool {
        !self.grown.is_empty()
    }
}

/// Guards against an accidental change in deployment size. Shrinking needs
/// a strong confirmation; growing needs the expansion flag.
pub async fn check_node_counts(
    model: &dyn ModelApi,
    dd: &DeploymentDescription,
    confirm: &dyn Confirm,
    expansion_upgrade: bool,
) -> UpgradeResult<NodeCountChange> {
    let current: BTreeMap<String, usize> = tree::cluster_nodes(model)
        .await?
        .into_iter()
        .map(|(cluster, nodes)| (cluster, nodes.len()))
        .collect();
    let change = NodeCountChange::compare(&current, &dd.cluster_node_counts());
    tracing::info!(
        target: "enminst::upgrade",
        clusters_before = change.clusters_before,
        clusters_after = change.clusters_after,
        nodes_before = change.nodes_before,
        nodes_after = change.nodes_after,
        "deployment size"
    );

    if change.is_shrinking() {
        let prompt = format!(
            "The deployment description has {} clusters with {} nodes, the deployment has {} clusters with {} nodes. Removed nodes and their data will be lost. Continue?",
            change.clusters_after, change.nodes_after, change.clusters_before, change.nodes_before
        );
        if !confirm.confirm(&prompt, true) {
            return Err(UpgradeError::Declined("deployment shrink".to_string()));
        }
    }
    if change.is_expanding() && !expansion_upgrade {
        return Err(UpgradeError::usage(format!(
            "the deployment description adds nodes to {}; use --expansion_upgrade",
            change.grown.join(", ")
        )));
    }
    Ok(change)
}

// ---------------------------------------------------------------------------
// deletions between the previous and the new description

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deletion {
    pub path: String,
    pub property: Option<String>,
}

/// Entries the diff tool marks deletable, in the order it lists them.
pub fn parse_diff(text: &str) -> Vec<Deletion> {
    text.lines()
        .map(str::trim)
        .filter(|l| l.starts_with("y "))
        .filter_map(|l| l.split_whitespace().nth(1))
        .map(|field| match field.split_once('@') {
            Some((path, property)) => Deletion {
                path: path.to_string(),
                property: Some(property.to_string()),
            },
            None => Deletion {
                path: field.to_string(),
                property: None,
            },
        })
        .collect()
}

/// Runs the diff tool over the two descriptions and deletes what it marks.
/// Entries already gone from the model are logged and skipped.
pub async fn remove_deleted_items(
    runner: &dyn CommandRunner,
    model: &dyn ModelApi,
    diff_tool: &Path,
    previous: &Path,
    current: &Path,
) -> UpgradeResult<Vec<Deletion>> {
    for file in [diff_tool, previous, current] {
        if !file.is_file() {
            return Err(UpgradeError::xml(file, "required for the model difference is missing"));
        }
    }
    let out = tempfile::NamedTempFile::new().map_err(|e| UpgradeError::io(std::env::temp_dir(), e))?;
    runner
        .run_checked(
            &CommandSpec::new(diff_tool.display().to_string())
                .arg(previous.display().to_string())
                .arg(current.display().to_string())
                .arg(out.path().display().to_string()),
        )
        .await?;
    let text = std::fs::read_to_string(out.path()).map_err(|e| UpgradeError::io(out.path(), e))?;
    let deletions = parse_diff(&text);
    if deletions.is_empty() {
        tracing::info!(target: "enminst::upgrade", "no items to be removed from the runtime model");
        return Ok(deletions);
    }
    for entry in &deletions {
        let removed = match &entry.property {
            Some(property) => model.delete_property(&entry.path, property).await?,
            None => model.delete_path(&entry.path).await?,
        };
        match (&entry.property, removed) {
            (Some(p), true) => tracing::info!(target: "enminst::upgrade", path = %entry.path, property = %p, "property deleted"),
            (None, true) => tracing::info!(target: "enminst::upgrade", path = %entry.path, "item deleted"),
            (_, false) => tracing::info!(target: "enminst::upgrade", path = %entry.path, "not in the model"),
        }
    }
    Ok(deletions)
}

// ---------------------------------------------------------------------------
// infrastructure changes taken before the upgrade snapshots

// Item types resized ahead of the snapshots, with the properties compared
// and whether a change to them needs a plan.
const CHANGE_TYPES: [(&str, &[(&str, bool)]); 4] = [
    ("file-system", &[("size", true), ("snap_size", false)]),
    ("sfs-filesystem", &[("size", true)]),
    ("sfs-export", &[]),
    ("lun-disk", &[("size", true)]),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfraChange {
    Update { path: String, properties: Properties },
    Create { parent: String, id: String, item_type: String, properties: Properties },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfraChanges {
    pub changes: Vec<InfraChange>,
    pub plan_required: bool,
}

impl InfraChanges {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Storage items the description resizes or adds.
pub async fn infrastructure_changes(model: &dyn ModelApi, dd: &DeploymentDescription) -> UpgradeResult<InfraChanges> {
    let mut out = InfraChanges::default();
    for (item_type, compared) in CHANGE_TYPES {
        for item in dd.items_of_type(item_type) {
            let existing = match model.get(&item.path).await {
                Ok(existing) => Some(existing),
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(e.into()),
            };
            match existing {
                Some(existing) => {
                    let mut properties = Properties::new();
                    for (name, config) in compared {
                        let Some(wanted) = item.property(name) else {
                            continue;
                        };
                        if existing.property(name) != Some(wanted) || existing.state != ItemState::Applied {
                            properties.insert((*name).to_string(), wanted.to_string());
                            out.plan_required |= *config;
                        }
                    }
                    if !properties.is_empty() {
                        out.changes.push(InfraChange::Update {
                            path: item.path.clone(),
                            properties,
                        });
                    }
                }
                None => {
                    let parent = item.parent_path().to_string();
                    if item_type != "sfs-export" && !model.exists(&parent).await? {
                        continue;
                    }
                    out.changes.push(InfraChange::Create {
                        parent,
                        id: item.id.clone(),
                        item_type: item_type.to_string(),
                        properties: item.properties.clone(),
                    });
                    out.plan_required = true;
                }
            }
        }
    }
    Ok(out)
}

pub async fn apply_infrastructure_changes(model: &dyn ModelApi, changes: &InfraChanges) -> UpgradeResult<()> {
    for change in &changes.changes {
        match change {
            InfraChange::Update { path, properties } => {
                tracing::info!(target: "enminst::upgrade", path = %path, "updating infrastructure item");
                model.update(path, properties).await?;
            }
            InfraChange::Create {
                parent,
                id,
                item_type,
                properties,
            } => {
                tracing::info!(target: "enminst::upgrade", parent = %parent, id = %id, item_type = %item_type, "creating infrastructure item");
                model.create(parent, id, item_type, properties).await?;
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// VM images

fn image_param(item_id: &str) -> &str {
    IMAGE_PARAMS
        .iter()
        .find(|(id, _)| *id == item_id)
        .map(|(_, param)| *param)
        .unwrap_or(item_id)
}

/// Points each image item at the file the last ENM ISO import delivered.
/// Returns the paths updated.
pub async fn update_vm_images(model: &dyn ModelApi, working: &WorkingConfig) -> UpgradeResult<Vec<String>> {
    let mut updated = Vec::new();
    for image in model.get_children(SOFTWARE_IMAGES).await? {
        let param = image_param(&image.id);
        let (Some(file), Some(old)) = (working.get(param), image.property("source_uri")) else {
            tracing::warn!(target: "enminst::upgrade", image = %image.id, param, "no image file or source_uri");
            continue;
        };
        let new = match old.rsplit_once('/') {
            Some((dir, _)) => format!("{dir}/{file}"),
            None => file.to_string(),
        };
        if new == old {
            tracing::info!(target: "enminst::upgrade", image = %image.id, "image has not changed");
            continue;
        }
        let mut properties = image.properties.clone();
        properties.insert("source_uri".to_string(), new.clone());
        model.update(&image.path, &properties).await?;
        tracing::info!(target: "enminst::upgrade", image = %image.id, from = %old, to = %new, "image updated");
        updated.push(image.path);
    }
    Ok(updated)
}

// ---------------------------------------------------------------------------
// structure check

// The model side restricted to the paths and property names the
// description states. Collection type names differ between the two
// renderings, so the described type is kept.
fn project(model_items: &BTreeMap<&str, &DeploymentItem>, described: &DeploymentItem) -> Option<DeploymentItem> {
    let item = model_items.get(described.path.as_str())?;
    Some(DeploymentItem {
        path: item.path.clone(),
        id: item.id.clone(),
        item_type: described.item_type.clone(),
        state: item.state,
        properties: described
            .properties
            .keys()
            .filter_map(|k| Some((k.clone(), item.property(k)?.to_string())))
            .collect(),
        children: Vec::new(),
    })
}

/// Compares the loaded model with the description it was loaded from.
pub async fn verify_structure(model: &dyn ModelApi, dd: &DeploymentDescription) -> UpgradeResult<()> {
    let mut items = tree::all_items(model, "/").await?;
    items.retain(|i| i.path != "/");
    let by_path: BTreeMap<&str, &DeploymentItem> = items.iter().map(|i| (i.path.as_str(), i)).collect();
    let described = dd.to_model_items();
    let projected: Vec<DeploymentItem> = described.iter().filter_map(|d| project(&by_path, d)).collect();

    let description = tree::structural_hash(&described);
    let model_hash = tree::structural_hash(&projected);
    if description != model_hash {
        let missing: Vec<&str> = described
            .iter()
            .filter(|d| !by_path.contains_key(d.path.as_str()))
            .map(|d| d.path.as_str())
            .collect();
        tracing::error!(
            target: "enminst::upgrade",
            model = %model_hash,
            description = %description,
            missing = %missing.join(", "),
            "model does not match the deployment description"
        );
        return Err(UpgradeError::StructuralMismatch {
            model: model_hash,
            description,
        });
    }
    tracing::info!(target: "enminst::upgrade", hash = %model_hash, "model matches the deployment description");
    Ok(())
}

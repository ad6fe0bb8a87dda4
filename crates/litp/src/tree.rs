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

//! Read helpers over the deployment tree.

use std::collections::BTreeMap;

use model::item::{DeploymentItem, ItemState};
use sha2::{Digest, Sha256};

use crate::api::ModelApi;
use crate::errors::LitpResult;

pub const DEPLOYMENTS: &str = "/deployments";

/// Deployment id to its cluster ids.
pub async fn deployment_clusters(model: &dyn ModelApi) -> LitpResult<BTreeMap<String, Vec<String>>> {
    let tree = model.get_tree(DEPLOYMENTS).await?;
    Ok(tree
        .children
        .iter()
        .map(|d| {
            let clusters = d
                .child("clusters")
                .map(|c| c.children.iter().map(|c| c.id.clone()).collect())
                .unwrap_or_default();
            (d.id.clone(), clusters)
        })
        .collect())
}

// Collects one collection (`nodes`, `services`) from every cluster.
fn per_cluster(tree: &DeploymentItem, collection: &str) -> BTreeMap<String, Vec<DeploymentItem>> {
    let mut out = BTreeMap::new();
    for deployment in &tree.children {
        let Some(clusters) = deployment.child("clusters") else {
            continue;
        };
        for cluster in &clusters.children {
            let items = cluster
                .child(collection)
                .map(|c| c.children.clone())
                .unwrap_or_default();
            out.insert(cluster.id.clone(), items);
        }
    }
    out
}

/// Cluster id to its node items.
pub async fn cluster_nodes(model: &dyn ModelApi) -> LitpResult<BTreeMap<String, Vec<DeploymentItem>>> {
    Ok(per_cluster(&model.get_tree(DEPLOYMENTS).await?, "nodes"))
}

/// Cluster id to its clustered service items.
pub async fn cluster_services(model: &dyn ModelApi) -> LitpResult<BTreeMap<String, Vec<DeploymentItem>>> {
    Ok(per_cluster(&model.get_tree(DEPLOYMENTS).await?, "services"))
}

/// Node id to hostname across every cluster.
pub async fn node_hostnames(model: &dyn ModelApi) -> LitpResult<BTreeMap<String, String>> {
    Ok(cluster_nodes(model)
        .await?
        .into_values()
        .flatten()
        .map(|n| {
            let hostname = n.property("hostname").unwrap_or(&n.id).to_string();
            (n.id, hostname)
        })
        .collect())
}

pub async fn count_nodes_and_clusters(model: &dyn ModelApi) -> LitpResult<(usize, usize)> {
    let nodes = cluster_nodes(model).await?;
    Ok((nodes.values().map(Vec::len).sum(), nodes.len()))
}

fn find_by_type<'a>(
    item: &'a DeploymentItem,
    item_type: &str,
    applied_only: bool,
    out: &mut Vec<&'a DeploymentItem>,
) {
    for child in &item.children {
        let matches = child.base_type() == item_type
            && (!applied_only || child.state == ItemState::Applied);
        if matches {
            out.push(child);
        } else {
            find_by_type(child, item_type, applied_only, out);
        }
    }
}

/// Items of `item_type` below `path`. The search does not descend into a
/// match. With `applied_only`, items in any other state are skipped.
pub async fn items_by_type(
    model: &dyn ModelApi,
    path: &str,
    item_type: &str,
    applied_only: bool,
) -> LitpResult<Vec<DeploymentItem>> {
    let tree = model.get_tree(path).await?;
    let mut found = Vec::new();
    find_by_type(&tree, item_type, applied_only, &mut found);
    Ok(found.into_iter().cloned().collect())
}

/// Every item below `path` depth first, children detached.
pub async fn all_items(model: &dyn ModelApi, path: &str) -> LitpResult<Vec<DeploymentItem>> {
    let tree = model.get_tree(path).await?;
    Ok(tree
        .walk()
        .into_iter()
        .map(|i| DeploymentItem {
            children: Vec::new(),
            ..i.clone()
        })
        .collect())
}

/// Order independent digest over `(path, type, properties)` of every item.
pub fn structural_hash<'a>(items: impl IntoIterator<Item = &'a DeploymentItem>) -> String {
    let mut triples: Vec<String> = items
        .into_iter()
        .map(|i| {
            let props: Vec<String> = i.properties.iter().map(|(k, v)| format!("{k}={v}")).collect();
            format!("{}|{}|{}", i.path, i.base_type(), props.join(","))
        })
        .collect();
    triples.sort();
    let mut hasher = Sha256::new();
    for t in &triples {
        hasher.update(t.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_hash_ignores_order_and_state() {
        let a = DeploymentItem::new("/a", "node", ItemState::Applied).with_property("hostname", "db-1");
        let b = DeploymentItem::new("/b", "reference-to-os-profile", ItemState::Initial);
        let b2 = DeploymentItem::new("/b", "os-profile", ItemState::Applied);
        assert_eq!(structural_hash([&a, &b]), structural_hash([&b2, &a]));
        let c = DeploymentItem::new("/a", "node", ItemState::Applied).with_property("hostname", "db-2");
        assert_ne!(structural_hash([&a]), structural_hash([&c]));
    }
}

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

//! Finds the SAN and NAS arrays a deployment uses, with their console
//! credentials, from the deployment model.

use std::collections::BTreeSet;
use std::sync::Arc;

use litp::{ModelApi, PasswordStore, tree};
use model::item::DeploymentItem;
use storage::{NasCredentials, NasType, SanCredentials, SanType};

use crate::blades::INFRA_SYSTEMS;
use crate::errors::{SnapshotError, SnapshotResult};

pub const STORAGE_PROVIDERS: &str = "/infrastructure/storage/storage_providers";
const NAS_SSH_PORT: u16 = 22;

/// The SAN in use and the site id its storage groups are named with.
#[derive(Debug, Clone)]
pub struct SanArray {
    pub credentials: SanCredentials,
    pub site_id: String,
}

impl SanArray {
    /// Storage group of a node: `<site>-enm-<cluster>-<node>`.
    pub fn storage_group(&self, cluster: &str, node: &str) -> String {
        format!("{}-enm-{cluster}-{node}", self.site_id)
    }
}

#[derive(Debug, Clone)]
pub struct StorageDiscovery {
    model: Arc<dyn ModelApi>,
    passwords: Arc<dyn PasswordStore>,
}

fn required<'a>(tier: &'static str, item: &'a DeploymentItem, name: &str) -> SnapshotResult<&'a str> {
    item.property(name)
        .ok_or_else(|| SnapshotError::discovery(tier, format!("{} has no {name}", item.path)))
}

impl StorageDiscovery {
    pub fn new(model: Arc<dyn ModelApi>, passwords: Arc<dyn PasswordStore>) -> Self {
        Self { model, passwords }
    }

    /// The single storage pool the LUN disks of the deployment live in.
    pub async fn san_pool(&self) -> SnapshotResult<Option<String>> {
        let pools: BTreeSet<String> = tree::items_by_type(self.model.as_ref(), INFRA_SYSTEMS, "lun-disk", false)
            .await?
            .iter()
            .filter_map(|d| d.property("storage_container").map(str::to_string))
            .collect();
        match pools.len() {
            0 => {
                tracing::info!(target: "enminst::snapshots", "no SAN storage pools found in model");
                Ok(None)
            }
            1 => Ok(pools.into_iter().next()),
            _ => Err(SnapshotError::discovery(
                "SAN",
                format!("more than one storage pool in use: {}", pools.into_iter().collect::<Vec<_>>().join(", ")),
            )),
        }
    }

    /// Console details of the array holding the deployment's pool, or
    /// `None` when the deployment has no LUN disks.
    pub async fn san(&self) -> SnapshotResult<Option<SanArray>> {
        let Some(pool) = self.san_pool().await? else {
            return Ok(None);
        };
        tracing::debug!(target: "enminst::snapshots", %pool, "SAN storage pool");
        let providers = tree::items_by_type(self.model.as_ref(), STORAGE_PROVIDERS, "san-emc", false).await?;
        let provider = providers.iter().find(|p| {
            p.child("storage_containers").is_some_and(|c| {
                c.children
                    .iter()
                    .any(|s| s.base_type() == "storage-container" && s.property("name") == Some(pool.as_str()))
            })
        });
        let Some(provider) = provider else {
            return Err(SnapshotError::discovery(
                "SAN",
                format!("could not find a model entry for a san-emc item called {pool}"),
            ));
        };
        let username = required("SAN", provider, "username")?.to_string();
        let password = self
            .passwords
            .password(required("SAN", provider, "password_key")?, &username)?;
        let san_type: SanType = required("SAN", provider, "san_type")?.parse()?;
        let credentials = SanCredentials {
            san_type,
            spa_ip: required("SAN", provider, "ip_a")?.to_string(),
            spb_ip: provider.property("ip_b").map(str::to_string),
            username,
            password,
            pool,
        };
        Ok(Some(SanArray {
            credentials,
            site_id: provider.property("storage_site_id").unwrap_or_default().to_string(),
        }))
    }

    /// Console details of the NAS serving the deployment's NFS mounts, or
    /// `None` when no node mounts from an SFS virtual server.
    pub async fn nas(&self) -> SnapshotResult<Option<NasCredentials>> {
        let used: BTreeSet<String> = tree::items_by_type(self.model.as_ref(), tree::DEPLOYMENTS, "nfs-mount", false)
            .await?
            .iter()
            .filter_map(|m| m.property("provider").map(str::to_string))
            .collect();
        let providers: Vec<DeploymentItem> =
            tree::items_by_type(self.model.as_ref(), STORAGE_PROVIDERS, "sfs-service", false)
                .await?
                .into_iter()
                .filter(|p| {
                    p.child("virtual_servers").is_some_and(|vs| {
                        vs.children
                            .iter()
                            .any(|v| v.property("name").is_some_and(|n| used.contains(n)))
                    })
                })
                .collect();
        let provider = match providers.as_slice() {
            [] => {
                tracing::info!(target: "enminst::snapshots", "no NAS storage providers found in model");
                return Ok(None);
            }
            [one] => one,
            _ => {
                return Err(SnapshotError::discovery(
                    "NAS",
                    "more than one NAS storage provider in use",
                ));
            }
        };
        let pool = provider
            .child("pools")
            .and_then(|p| p.children.last())
            .and_then(|p| p.property("name"))
            .ok_or_else(|| SnapshotError::discovery("NAS", format!("{} has no pool", provider.path)))?
            .to_string();
        let username = required("NAS", provider, "user_name")?.to_string();
        let password = self
            .passwords
            .password(required("NAS", provider, "password_key")?, &username)?;
        let nas_type: NasType = provider.property("nas_type").unwrap_or("veritas").parse()?;
        Ok(Some(NasCredentials {
            nas_type,
            console_ip: required("NAS", provider, "management_ipv4")?.to_string(),
            username,
            password,
            ssh_port: NAS_SSH_PORT,
            pool,
        }))
    }
}

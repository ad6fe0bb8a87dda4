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

//! NAS rollbacks of the SFS file systems in a storage pool.

pub mod console;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use litp::ModelApi;
use runtime::RunStateStore;
use runtime::state::{NAS_FS_BKUP, NAS_SHARES_BKUP};
use serde::{Deserialize, Serialize};
use tryhard::RetryFutureConfig;

use crate::errors::{StorageError, StorageResult};
use crate::tier::{SnapshotRecord, SnapshotTier, TierKind, report_problems};

pub use console::NasConsole;

const STORAGE_PROVIDERS: &str = "/infrastructure/storage/storage_providers";
const CACHE_WARN_PERCENT: f64 = 80.0;
const CACHE_FULL_PERCENT: f64 = 100.0;
const SHARE_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NasType {
    Veritas,
    UnityXt,
}

impl FromStr for NasType {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "veritas" | "sfs" => Ok(NasType::Veritas),
            "unityxt" => Ok(NasType::UnityXt),
            other => Err(StorageError::adapter(TierKind::Nas, "nas_type", format!("unsupported NAS type '{other}'"))),
        }
    }
}

impl NasType {
    /// Only Veritas keeps rollbacks in a separate cache.
    pub fn uses_cache(self) -> bool {
        self == NasType::Veritas
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NasFileSystem {
    pub name: String,
    pub online: bool,
    pub size_mb: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NfsShare {
    pub filesystem: String,
    pub client: String,
    pub options: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackCache {
    pub size_mb: f64,
    pub used_percent: f64,
}

/// Console access details from the storage provider in the model.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NasCredentials {
    pub nas_type: NasType,
    pub console_ip: String,
    pub username: String,
    pub password: String,
    pub ssh_port: u16,
    pub pool: String,
}

impl fmt::Debug for NasCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NasCredentials")
            .field("nas_type", &self.nas_type)
            .field("console_ip", &self.console_ip)
            .field("username", &self.username)
            .field("ssh_port", &self.ssh_port)
            .field("pool", &self.pool)
            .finish()
    }
}

/// Converts `512M`, `10G`, `1.5T` to megabytes.
pub fn normalize_size(size: &str) -> Option<f64> {
    let size = size.trim();
    let unit = size.chars().last()?;
    let factor = match unit.to_ascii_lowercase() {
        'k' => 1.0 / 1024.0,
        'm' => 1.0,
        'g' => 1024.0,
        't' => 1024.0 * 1024.0,
        _ => return None,
    };
    size[..size.len() - unit.len_utf8()]
        .parse::<f64>()
        .ok()
        .map(|v| v * factor)
}

pub fn cache_name(pool: &str) -> String {
    format!("{pool}-cache")
}

pub fn rollback_name(prefix: &str, fs: &str) -> String {
    format!("{prefix}-{fs}")
}

/// Cache size covering `snap_size` percent of each file system, in whole
/// gigabytes, or `256M` when that rounds to nothing.
pub fn cache_size<'a>(filesystems: impl IntoIterator<Item = (&'a NasFileSystem, u32)>) -> String {
    let total: f64 = filesystems
        .into_iter()
        .map(|(fs, snap_size)| fs.size_mb / 100.0 * f64::from(snap_size))
        .sum();
    let gigabytes = (total / 1024.0).floor() as u64;
    if gigabytes == 0 {
        "256M".to_string()
    } else {
        format!("{gigabytes}G")
    }
}

/// The NAS console operations the snapshot tier needs.
#[async_trait]
pub trait NasApi: Send + Sync + fmt::Debug {
    fn nas_type(&self) -> NasType;

    /// File systems of the pool keyed by name.
    async fn fs_list(&self, pool: &str) -> StorageResult<BTreeMap<String, NasFileSystem>>;

    /// Rollbacks starting with `prefix` keyed by file system. Every file
    /// system of the pool gets an entry.
    async fn rollback_list(&self, pool: &str, prefix: &str) -> StorageResult<BTreeMap<String, Vec<String>>>;

    async fn rollback_create(&self, name: &str, fs: &str, cache: Option<&str>) -> StorageResult<()>;

    async fn rollback_restore(&self, fs: &str, name: &str) -> StorageResult<()>;

    async fn rollback_destroy(&self, name: &str, fs: &str) -> StorageResult<()>;

    async fn cache_list(&self) -> StorageResult<BTreeMap<String, RollbackCache>>;

    async fn cache_create(&self, name: &str, size: &str, pool: &str) -> StorageResult<()>;

    async fn cache_delete(&self, name: &str) -> StorageResult<()>;

    async fn share_list(&self, pool: &str) -> StorageResult<Vec<NfsShare>>;

    async fn share_add(&self, share: &NfsShare) -> StorageResult<()>;

    async fn fs_online(&self, fs: &str, online: bool) -> StorageResult<()>;
}

/// Rollbacks of the modelled SFS file systems that carry a snap size.
#[derive(Debug, Clone)]
pub struct NasTier {
    api: Arc<dyn NasApi>,
    model: Arc<dyn ModelApi>,
    state: RunStateStore,
    pool: String,
    prefix: String,
    share_retry_delay: Duration,
}

impl NasTier {
    pub fn new(
        api: Arc<dyn NasApi>,
        model: Arc<dyn ModelApi>,
        state: RunStateStore,
        pool: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            api,
            model,
            state,
            pool: pool.into(),
            prefix: prefix.into(),
            share_retry_delay: Duration::from_secs(2),
        }
    }

    pub fn with_share_retry_delay(mut self, delay: Duration) -> Self {
        self.share_retry_delay = delay;
        self
    }

    /// File system name to snap size for every modelled SFS file system
    /// with a snap size.
    pub async fn modelled_filesystems(&self) -> StorageResult<BTreeMap<String, u32>> {
        let mut out = BTreeMap::new();
        for fs in litp::tree::items_by_type(self.model.as_ref(), STORAGE_PROVIDERS, "sfs-filesystem", false).await? {
            let snap_size = fs.int_property("snap_size")?.unwrap_or(0);
            if snap_size <= 0 {
                continue;
            }
            let Some(path) = fs.property("path") else {
                continue;
            };
            let name = path.rsplit('/').next().unwrap_or(path).to_string();
            out.insert(name, u32::try_from(snap_size).unwrap_or(u32::MAX));
        }
        Ok(out)
    }

    /// File systems in scope. The list recorded at create time wins over
    /// the model so that file systems added since are left alone.
    pub async fn filesystems_to_snap(&self) -> StorageResult<BTreeMap<String, NasFileSystem>> {
        if let Some(recorded) = self.state.load_json::<BTreeMap<String, NasFileSystem>>(NAS_FS_BKUP)? {
            return Ok(recorded);
        }
        let on_nas = self.api.fs_list(&self.pool).await?;
        let modelled = self.modelled_filesystems().await?;
        for fs in modelled.keys().filter(|fs| !on_nas.contains_key(*fs)) {
            tracing::info!(target: "enminst::snapshots", filesystem = %fs, pool = %self.pool, "file system is not in the pool to snap");
        }
        Ok(on_nas
            .into_iter()
            .filter(|(name, _)| modelled.contains_key(name))
            .collect())
    }

    async fn rollbacks(&self, filesystems: &BTreeMap<String, NasFileSystem>) -> StorageResult<BTreeMap<String, Vec<String>>> {
        Ok(self
            .api
            .rollback_list(&self.pool, &self.prefix)
            .await?
            .into_iter()
            .filter(|(fs, _)| filesystems.contains_key(fs))
            .collect())
    }

    async fn ensure_cache(&self, filesystems: &BTreeMap<String, NasFileSystem>) -> StorageResult<Option<String>> {
        if !self.api.nas_type().uses_cache() {
            return Ok(None);
        }
        let cache = cache_name(&self.pool);
        if self.api.cache_list().await?.contains_key(&cache) {
            tracing::info!(target: "enminst::snapshots", cache = %cache, "rollback cache exists");
            return Ok(Some(cache));
        }
        let modelled = self.modelled_filesystems().await?;
        let size = cache_size(
            filesystems
                .iter()
                .map(|(name, fs)| (fs, modelled.get(name).copied().unwrap_or(0))),
        );
        tracing::info!(target: "enminst::snapshots", cache = %cache, size = %size, "creating rollback cache");
        self.api.cache_create(&cache, &size, &self.pool).await?;
        Ok(Some(cache))
    }

    fn cache_problems(&self, caches: &BTreeMap<String, RollbackCache>) -> Vec<String> {
        let cache = cache_name(&self.pool);
        match caches.get(&cache) {
            None => vec![format!("No rollback cache {cache} exists")],
            Some(c) if c.used_percent >= CACHE_FULL_PERCENT => {
                vec![format!("Rollback cache {cache} is full")]
            }
            Some(c) => {
                if c.used_percent >= CACHE_WARN_PERCENT {
                    tracing::warn!(target: "enminst::snapshots", cache = %cache, usage = c.used_percent, "rollback cache usage is high");
                } else {
                    tracing::info!(target: "enminst::snapshots", cache = %cache, usage = c.used_percent, "rollback cache usage");
                }
                Vec::new()
            }
        }
    }

    async fn readd_shares(&self, fs: &str, recorded: &[NfsShare]) -> StorageResult<()> {
        let wanted: Vec<&NfsShare> = recorded.iter().filter(|s| s.filesystem == fs).collect();
        if wanted.is_empty() {
            return Ok(());
        }
        let current = self.api.share_list(&self.pool).await?;
        for share in wanted.into_iter().filter(|s| !current.contains(s)) {
            tracing::info!(target: "enminst::snapshots", filesystem = fs, client = %share.client, "re-adding NFS share");
            let config = RetryFutureConfig::new(SHARE_RETRIES - 1).fixed_backoff(self.share_retry_delay);
            tryhard::retry_fn(|| self.api.share_add(share))
                .with_config(config)
                .await?;
        }
        Ok(())
    }

    async fn rollback_filesystem(&self, fs: &str, rollbacks: &[String], shares: &[NfsShare]) -> StorageResult<()> {
        let rollback = match rollbacks {
            [one] => one,
            [] => {
                return Err(StorageError::restore(TierKind::Nas, format!("No rollback found for NAS filesystem {fs}")));
            }
            _ => {
                return Err(StorageError::restore(
                    TierKind::Nas,
                    format!("More than one rollback found for NAS filesystem {fs}"),
                ));
            }
        };
        let offline_first = self.api.nas_type().uses_cache();
        if offline_first {
            tracing::info!(target: "enminst::snapshots", filesystem = fs, "offlining filesystem");
            self.api.fs_online(fs, false).await?;
        }
        tracing::info!(target: "enminst::snapshots", filesystem = fs, rollback = %rollback, "restoring rollback");
        self.api.rollback_restore(fs, rollback).await?;
        if offline_first {
            self.api.fs_online(fs, true).await?;
        }
        self.readd_shares(fs, shares).await
    }
}

#[async_trait]
impl SnapshotTier for NasTier {
    fn kind(&self) -> TierKind {
        TierKind::Nas
    }

    async fn create(&self) -> StorageResult<()> {
        let filesystems = self.filesystems_to_snap().await?;
        if filesystems.is_empty() {
            return Err(StorageError::NothingToSnap {
                tier: TierKind::Nas,
                message: format!("no filesystems to snapshot in pool {}", self.pool),
            });
        }
        let existing: Vec<String> = self.rollbacks(&filesystems).await?.into_values().flatten().collect();
        if !existing.is_empty() {
            return Err(StorageError::SnapshotsExist {
                tier: TierKind::Nas,
                names: existing,
            });
        }
        let shares = self.api.share_list(&self.pool).await?;
        let cache = self.ensure_cache(&filesystems).await?;
        for fs in filesystems.keys() {
            let name = rollback_name(&self.prefix, fs);
            tracing::info!(target: "enminst::snapshots", rollback = %name, filesystem = %fs, "creating rollback");
            self.api.rollback_create(&name, fs, cache.as_deref()).await?;
        }
        self.state.save_json(NAS_FS_BKUP, &filesystems)?;
        self.state.save_json(NAS_SHARES_BKUP, &shares)?;
        tracing::info!(target: "enminst::snapshots", pool = %self.pool, prefix = %self.prefix, "snapshots created for all filesystems in the storage pool");
        Ok(())
    }

    async fn list(&self) -> StorageResult<Vec<SnapshotRecord>> {
        let filesystems = self.filesystems_to_snap().await?;
        Ok(self
            .rollbacks(&filesystems)
            .await?
            .into_iter()
            .flat_map(|(fs, names)| {
                names
                    .into_iter()
                    .map(move |name| SnapshotRecord::new(TierKind::Nas, fs.clone(), name))
            })
            .collect())
    }

    async fn validate(&self) -> StorageResult<()> {
        let filesystems = self.filesystems_to_snap().await?;
        let rollbacks = self.rollbacks(&filesystems).await?;
        let mut problems = Vec::new();
        for fs in filesystems.keys() {
            let expected = rollback_name(&self.prefix, fs);
            let found = rollbacks.get(fs).is_some_and(|r| r.contains(&expected));
            if !found {
                problems.push(format!("No rollback {expected} found for filesystem {fs}"));
            }
        }
        if self.api.nas_type().uses_cache() {
            problems.extend(self.cache_problems(&self.api.cache_list().await?));
        }
        report_problems(TierKind::Nas, problems)
    }

    async fn restore(&self) -> StorageResult<()> {
        let filesystems = self.filesystems_to_snap().await?;
        let rollbacks = self.rollbacks(&filesystems).await?;
        let shares: Vec<NfsShare> = match self.state.load_json(NAS_SHARES_BKUP)? {
            Some(shares) => shares,
            None => self.api.share_list(&self.pool).await?,
        };
        let shares = shares.as_slice();
        let empty = Vec::new();
        let results = futures::future::join_all(filesystems.keys().map(|fs| {
            let found = rollbacks.get(fs).unwrap_or(&empty);
            async move { (fs, self.rollback_filesystem(fs, found, shares).await) }
        }))
        .await;
        let mut failed = Vec::new();
        for (fs, result) in results {
            if let Err(e) = result {
                tracing::error!(target: "enminst::snapshots", filesystem = %fs, error = %e, "rollback failed");
                failed.push(e.to_string());
            }
        }
        if !failed.is_empty() {
            return Err(StorageError::restore(TierKind::Nas, failed.join("; ")));
        }
        tracing::info!(target: "enminst::snapshots", "restore rollbacks finished");
        Ok(())
    }

    async fn remove(&self) -> StorageResult<()> {
        let filesystems = self.filesystems_to_snap().await?;
        let rollbacks = self.rollbacks(&filesystems).await?;
        let mut destroyed = 0;
        for (fs, names) in &rollbacks {
            for name in names {
                tracing::info!(target: "enminst::snapshots", rollback = %name, "destroying rollback");
                self.api.rollback_destroy(name, fs).await?;
                destroyed += 1;
            }
        }
        if destroyed == 0 {
            tracing::info!(target: "enminst::snapshots", "no rollbacks to destroy");
        }
        if self.api.nas_type().uses_cache() {
            let cache = cache_name(&self.pool);
            if self.api.cache_list().await?.contains_key(&cache) {
                tracing::info!(target: "enminst::snapshots", cache = %cache, "destroying rollback cache");
                self.api.cache_delete(&cache).await?;
            }
        }
        self.state.remove(NAS_FS_BKUP)?;
        self.state.remove(NAS_SHARES_BKUP)?;
        Ok(())
    }
}

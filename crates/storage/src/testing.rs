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

//! In-memory arrays used by tests across the workspace.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::{StorageError, StorageResult};
use crate::nas::{NasApi, NasFileSystem, NasType, NfsShare, RollbackCache};
use crate::san::{HostLun, Lun, LunSnapshot, SanApi, SanType};
use crate::tier::TierKind;

fn record(calls: &Mutex<Vec<String>>, call: String) {
    if let Ok(mut calls) = calls.lock() {
        calls.push(call);
    }
}

fn failing(failures: &Mutex<BTreeSet<String>>, call: &str, tier: TierKind) -> StorageResult<()> {
    let hit = failures
        .lock()
        .map(|f| f.iter().any(|p| call.starts_with(p.as_str())))
        .unwrap_or(false);
    if hit {
        Err(StorageError::adapter(tier, call, "scripted failure"))
    } else {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct SanInner {
    luns: Vec<(String, Lun)>,
    snaps: Vec<LunSnapshot>,
    storage_groups: BTreeMap<String, Vec<HostLun>>,
    alerts: Vec<String>,
    unbalanced: BTreeSet<String>,
}

/// A storage array with LUNs in pools. Calls are recorded as
/// `<operation> <args>` and can be made to fail by prefix.
#[derive(Debug)]
pub struct FakeSan {
    san_type: SanType,
    inner: Mutex<SanInner>,
    failures: Mutex<BTreeSet<String>>,
    calls: Mutex<Vec<String>>,
}

impl Default for FakeSan {
    fn default() -> Self {
        Self::new(SanType::Vnx)
    }
}

impl FakeSan {
    pub fn new(san_type: SanType) -> Self {
        Self {
            san_type,
            inner: Mutex::new(SanInner::default()),
            failures: Mutex::new(BTreeSet::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_lun(self, pool: &str, id: &str, name: &str) -> Self {
        if let Ok(mut inner) = self.inner.lock() {
            inner.luns.push((
                pool.to_string(),
                Lun {
                    id: id.to_string(),
                    name: name.to_string(),
                },
            ));
        }
        self
    }

    pub fn with_snap(self, lun_id: &str, name: &str) -> Self {
        if let Ok(mut inner) = self.inner.lock() {
            inner.snaps.push(LunSnapshot {
                name: name.to_string(),
                lun_id: lun_id.to_string(),
                created: Some("2026-10-01 08:00:00".to_string()),
                state: Some("Ready".to_string()),
            });
        }
        self
    }

    /// Presents LUNs to `group` as `(hlu, lun id)` pairs.
    pub fn with_storage_group(self, group: &str, luns: &[(u32, &str)]) -> Self {
        if let Ok(mut inner) = self.inner.lock() {
            inner.storage_groups.insert(
                group.to_string(),
                luns.iter()
                    .map(|(hlu, id)| HostLun {
                        hlu: *hlu,
                        lun_id: id.to_string(),
                    })
                    .collect(),
            );
        }
        self
    }

    pub fn with_alert(self, alert: &str) -> Self {
        if let Ok(mut inner) = self.inner.lock() {
            inner.alerts.push(alert.to_string());
        }
        self
    }

    /// Marks a NAS server as running away from its home SP.
    pub fn with_unbalanced_nas_server(self, name: &str) -> Self {
        if let Ok(mut inner) = self.inner.lock() {
            inner.unbalanced.insert(name.to_string());
        }
        self
    }

    pub fn fail(self, prefix: &str) -> Self {
        if let Ok(mut failures) = self.failures.lock() {
            failures.insert(prefix.to_string());
        }
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn called(&self, prefix: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(prefix))
    }

    pub fn snap_names(&self) -> Vec<String> {
        self.inner
            .lock()
            .map(|i| i.snaps.iter().map(|s| s.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn lun_ids(&self) -> Vec<String> {
        self.inner
            .lock()
            .map(|i| i.luns.iter().map(|(_, l)| l.id.clone()).collect())
            .unwrap_or_default()
    }

    pub fn storage_group(&self, group: &str) -> Vec<u32> {
        self.inner
            .lock()
            .ok()
            .and_then(|i| i.storage_groups.get(group).map(|l| l.iter().map(|h| h.hlu).collect()))
            .unwrap_or_default()
    }

    fn enter(&self, call: String) -> StorageResult<()> {
        record(&self.calls, call.clone());
        failing(&self.failures, &call, TierKind::San)
    }
}

#[async_trait]
impl SanApi for FakeSan {
    fn san_type(&self) -> SanType {
        self.san_type
    }

    async fn list_luns(&self, pool: &str) -> StorageResult<Vec<Lun>> {
        self.enter(format!("list_luns {pool}"))?;
        Ok(self
            .inner
            .lock()
            .map(|i| {
                i.luns
                    .iter()
                    .filter(|(p, _)| p == pool)
                    .map(|(_, l)| l.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_snaps(&self) -> StorageResult<Vec<LunSnapshot>> {
        self.enter("list_snaps".to_string())?;
        Ok(self.inner.lock().map(|i| i.snaps.clone()).unwrap_or_default())
    }

    async fn snap_create(&self, lun_id: &str, name: &str, _description: &str) -> StorageResult<()> {
        self.enter(format!("snap_create {lun_id} {name}"))?;
        if let Ok(mut inner) = self.inner.lock() {
            inner.snaps.push(LunSnapshot {
                name: name.to_string(),
                lun_id: lun_id.to_string(),
                created: None,
                state: Some("Ready".to_string()),
            });
        }
        Ok(())
    }

    async fn snap_restore(&self, lun_id: &str, snap_name: &str, backup_name: &str) -> StorageResult<()> {
        self.enter(format!("snap_restore {lun_id} {snap_name} {backup_name}"))?;
        if let Ok(mut inner) = self.inner.lock() {
            inner.snaps.push(LunSnapshot {
                name: backup_name.to_string(),
                lun_id: lun_id.to_string(),
                created: None,
                state: Some("Ready".to_string()),
            });
        }
        Ok(())
    }

    async fn snap_destroy(&self, snap_name: &str) -> StorageResult<()> {
        self.enter(format!("snap_destroy {snap_name}"))?;
        if let Ok(mut inner) = self.inner.lock() {
            inner.snaps.retain(|s| s.name != snap_name);
        }
        Ok(())
    }

    async fn lun_delete(&self, lun_id: &str) -> StorageResult<()> {
        self.enter(format!("lun_delete {lun_id}"))?;
        if let Ok(mut inner) = self.inner.lock() {
            inner.luns.retain(|(_, l)| l.id != lun_id);
        }
        Ok(())
    }

    async fn storage_group_luns(&self, group: &str) -> StorageResult<Option<Vec<HostLun>>> {
        self.enter(format!("storage_group_luns {group}"))?;
        Ok(self.inner.lock().ok().and_then(|i| i.storage_groups.get(group).cloned()))
    }

    async fn storage_group_remove(&self, group: &str, hlus: &[u32]) -> StorageResult<()> {
        self.enter(format!("storage_group_remove {group} {hlus:?}"))?;
        if let Ok(mut inner) = self.inner.lock()
            && let Some(current) = inner.storage_groups.get_mut(group)
        {
            current.retain(|h| !hlus.contains(&h.hlu));
        }
        Ok(())
    }

    async fn critical_alerts(&self) -> StorageResult<Vec<String>> {
        self.enter("critical_alerts".to_string())?;
        Ok(self.inner.lock().map(|i| i.alerts.clone()).unwrap_or_default())
    }

    async fn unbalanced_nas_servers(&self, names: &[String]) -> StorageResult<Vec<String>> {
        self.enter(format!("unbalanced_nas_servers {}", names.join(",")))?;
        Ok(self
            .inner
            .lock()
            .map(|i| names.iter().filter(|n| i.unbalanced.contains(*n)).cloned().collect())
            .unwrap_or_default())
    }
}

#[derive(Debug, Default)]
struct NasInner {
    filesystems: BTreeMap<String, NasFileSystem>,
    // (filesystem, rollback)
    rollbacks: Vec<(String, String)>,
    caches: BTreeMap<String, RollbackCache>,
    shares: Vec<NfsShare>,
}

/// A NAS console holding file systems, rollbacks, caches and shares.
#[derive(Debug)]
pub struct FakeNas {
    nas_type: NasType,
    inner: Mutex<NasInner>,
    failures: Mutex<BTreeSet<String>>,
    calls: Mutex<Vec<String>>,
}

impl Default for FakeNas {
    fn default() -> Self {
        Self::new(NasType::Veritas)
    }
}

impl FakeNas {
    pub fn new(nas_type: NasType) -> Self {
        Self {
            nas_type,
            inner: Mutex::new(NasInner::default()),
            failures: Mutex::new(BTreeSet::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_fs(self, name: &str, size_mb: f64) -> Self {
        if let Ok(mut inner) = self.inner.lock() {
            inner.filesystems.insert(
                name.to_string(),
                NasFileSystem {
                    name: name.to_string(),
                    online: true,
                    size_mb,
                },
            );
        }
        self
    }

    pub fn with_rollback(self, fs: &str, name: &str) -> Self {
        if let Ok(mut inner) = self.inner.lock() {
            inner.rollbacks.push((fs.to_string(), name.to_string()));
        }
        self
    }

    pub fn with_cache(self, name: &str, size_mb: f64, used_percent: f64) -> Self {
        if let Ok(mut inner) = self.inner.lock() {
            inner
                .caches
                .insert(name.to_string(), RollbackCache { size_mb, used_percent });
        }
        self
    }

    pub fn with_share(self, fs: &str, client: &str, options: &str) -> Self {
        if let Ok(mut inner) = self.inner.lock() {
            inner.shares.push(NfsShare {
                filesystem: fs.to_string(),
                client: client.to_string(),
                options: options.to_string(),
            });
        }
        self
    }

    pub fn fail(self, prefix: &str) -> Self {
        if let Ok(mut failures) = self.failures.lock() {
            failures.insert(prefix.to_string());
        }
        self
    }

    /// Drops every share, as a rollback of an exported file system does.
    pub fn drop_shares(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.shares.clear();
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn called(&self, prefix: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(prefix))
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn rollback_names(&self) -> Vec<String> {
        self.inner
            .lock()
            .map(|i| i.rollbacks.iter().map(|(_, r)| r.clone()).collect())
            .unwrap_or_default()
    }

    pub fn cache_names(&self) -> Vec<String> {
        self.inner
            .lock()
            .map(|i| i.caches.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn shares(&self) -> Vec<NfsShare> {
        self.inner.lock().map(|i| i.shares.clone()).unwrap_or_default()
    }

    fn enter(&self, call: String) -> StorageResult<()> {
        record(&self.calls, call.clone());
        failing(&self.failures, &call, TierKind::Nas)
    }
}

fn in_pool(fs: &str, pool: &str) -> bool {
    fs.strip_prefix(pool).is_some_and(|rest| rest.starts_with('-'))
}

#[async_trait]
impl NasApi for FakeNas {
    fn nas_type(&self) -> NasType {
        self.nas_type
    }

    async fn fs_list(&self, pool: &str) -> StorageResult<BTreeMap<String, NasFileSystem>> {
        self.enter(format!("fs_list {pool}"))?;
        Ok(self
            .inner
            .lock()
            .map(|i| {
                i.filesystems
                    .iter()
                    .filter(|(name, _)| in_pool(name, pool))
                    .map(|(n, f)| (n.clone(), f.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn rollback_list(&self, pool: &str, prefix: &str) -> StorageResult<BTreeMap<String, Vec<String>>> {
        self.enter(format!("rollback_list {pool} {prefix}"))?;
        let inner = self
            .inner
            .lock()
            .map_err(|_| StorageError::adapter(TierKind::Nas, "rollback_list", "poisoned"))?;
        let mut out: BTreeMap<String, Vec<String>> = inner
            .filesystems
            .keys()
            .filter(|fs| in_pool(fs, pool))
            .map(|fs| (fs.clone(), Vec::new()))
            .collect();
        for (fs, name) in &inner.rollbacks {
            if let Some(entry) = out.get_mut(fs)
                && name.starts_with(prefix)
            {
                entry.push(name.clone());
            }
        }
        Ok(out)
    }

    async fn rollback_create(&self, name: &str, fs: &str, cache: Option<&str>) -> StorageResult<()> {
        self.enter(format!("rollback_create {name} {fs} {}", cache.unwrap_or("-")))?;
        if let Ok(mut inner) = self.inner.lock() {
            inner.rollbacks.push((fs.to_string(), name.to_string()));
        }
        Ok(())
    }

    async fn rollback_restore(&self, fs: &str, name: &str) -> StorageResult<()> {
        self.enter(format!("rollback_restore {fs} {name}"))?;
        if let Ok(mut inner) = self.inner.lock() {
            inner.shares.retain(|s| s.filesystem != fs);
        }
        Ok(())
    }

    async fn rollback_destroy(&self, name: &str, fs: &str) -> StorageResult<()> {
        self.enter(format!("rollback_destroy {name} {fs}"))?;
        if let Ok(mut inner) = self.inner.lock() {
            inner.rollbacks.retain(|(f, n)| !(f == fs && n == name));
        }
        Ok(())
    }

    async fn cache_list(&self) -> StorageResult<BTreeMap<String, RollbackCache>> {
        self.enter("cache_list".to_string())?;
        Ok(self.inner.lock().map(|i| i.caches.clone()).unwrap_or_default())
    }

    async fn cache_create(&self, name: &str, size: &str, pool: &str) -> StorageResult<()> {
        self.enter(format!("cache_create {name} {size} {pool}"))?;
        if let Ok(mut inner) = self.inner.lock() {
            inner.caches.insert(
                name.to_string(),
                RollbackCache {
                    size_mb: crate::nas::normalize_size(size).unwrap_or_default(),
                    used_percent: 0.0,
                },
            );
        }
        Ok(())
    }

    async fn cache_delete(&self, name: &str) -> StorageResult<()> {
        self.enter(format!("cache_delete {name}"))?;
        if let Ok(mut inner) = self.inner.lock() {
            inner.caches.remove(name);
        }
        Ok(())
    }

    async fn share_list(&self, pool: &str) -> StorageResult<Vec<NfsShare>> {
        self.enter(format!("share_list {pool}"))?;
        Ok(self
            .inner
            .lock()
            .map(|i| {
                i.shares
                    .iter()
                    .filter(|s| in_pool(&s.filesystem, pool))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn share_add(&self, share: &NfsShare) -> StorageResult<()> {
        self.enter(format!("share_add {} {}", share.filesystem, share.client))?;
        if let Ok(mut inner) = self.inner.lock() {
            inner.shares.push(share.clone());
        }
        Ok(())
    }

    async fn fs_online(&self, fs: &str, online: bool) -> StorageResult<()> {
        self.enter(format!("fs_online {fs} {online}"))?;
        if let Ok(mut inner) = self.inner.lock()
            && let Some(entry) = inner.filesystems.get_mut(fs)
        {
            entry.online = online;
        }
        Ok(())
    }
}

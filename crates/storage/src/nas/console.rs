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

//! NAS console commands run over ssh with key based authentication.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use runtime::{CommandRunner, CommandSpec};

use super::{NasApi, NasCredentials, NasFileSystem, NasType, NfsShare, RollbackCache, normalize_size};
use crate::errors::{StorageError, StorageResult};
use crate::tier::TierKind;

const VX_PATH_PREFIX: &str = "/vx/";

#[derive(Clone)]
pub struct NasConsole {
    credentials: NasCredentials,
    runner: Arc<dyn CommandRunner>,
}

impl fmt::Debug for NasConsole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NasConsole")
            .field("console_ip", &self.credentials.console_ip)
            .field("nas_type", &self.credentials.nas_type)
            .finish()
    }
}

fn in_pool(fs: &str, pool: &str) -> bool {
    fs.strip_prefix(pool).is_some_and(|rest| rest.starts_with('-'))
}

// Whitespace separated rows below the header line, ruler lines dropped.
fn rows(output: &str) -> impl Iterator<Item = Vec<&str>> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.chars().all(|c| c == '-' || c == ' '))
        .skip(1)
        .map(|l| l.split_whitespace().collect())
}

pub fn parse_fs_list(output: &str, pool: &str) -> BTreeMap<String, NasFileSystem> {
    rows(output)
        .filter(|cols| cols.len() >= 3 && in_pool(cols[0], pool))
        .map(|cols| {
            (
                cols[0].to_string(),
                NasFileSystem {
                    name: cols[0].to_string(),
                    online: cols[1].eq_ignore_ascii_case("online"),
                    size_mb: normalize_size(cols[2]).unwrap_or_default(),
                },
            )
        })
        .collect()
}

/// `storage rollback list` rows are NAME TYPE FILESYSTEM ...
pub fn parse_rollback_list(output: &str, pool: &str, prefix: &str) -> BTreeMap<String, Vec<String>> {
    let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for cols in rows(output).filter(|c| c.len() >= 3 && in_pool(c[2], pool)) {
        let entry = out.entry(cols[2].to_string()).or_default();
        if prefix == "*" || cols[0].starts_with(prefix) {
            entry.push(cols[0].to_string());
        }
    }
    out
}

/// `storage rollback cache list` rows are NAME TOTAL(Mb) USED(Mb) ...
pub fn parse_cache_list(output: &str) -> BTreeMap<String, RollbackCache> {
    rows(output)
        .filter(|cols| cols.len() >= 3)
        .filter_map(|cols| {
            let size_mb: f64 = cols[1].parse().ok()?;
            let used_mb: f64 = cols[2].parse().ok()?;
            let used_percent = if size_mb > 0.0 {
                (used_mb / size_mb * 10_000.0).round() / 100.0
            } else {
                0.0
            };
            Some((cols[0].to_string(), RollbackCache { size_mb, used_percent }))
        })
        .collect()
}

pub fn parse_share_list(output: &str, pool: &str) -> Vec<NfsShare> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with('/'))
        .filter_map(|l| {
            let cols: Vec<&str> = l.split_whitespace().collect();
            let fs = cols.first()?.rsplit('/').next()?;
            if cols.len() < 3 || !in_pool(fs, pool) {
                return None;
            }
            Some(NfsShare {
                filesystem: fs.to_string(),
                client: cols[1].to_string(),
                options: cols[2].trim_matches(|c| c == '(' || c == ')').to_string(),
            })
        })
        .collect()
}

impl NasConsole {
    pub fn new(credentials: NasCredentials, runner: Arc<dyn CommandRunner>) -> Self {
        Self { credentials, runner }
    }

    fn export_path(&self, fs: &str) -> String {
        match self.credentials.nas_type {
            NasType::Veritas => format!("{VX_PATH_PREFIX}{fs}"),
            NasType::UnityXt => fs.to_string(),
        }
    }

    async fn exec(&self, operation: &str, command: String) -> StorageResult<String> {
        let spec = CommandSpec::new("ssh")
            .args(["-o", "BatchMode=yes", "-o", "StrictHostKeyChecking=no"])
            .arg("-p")
            .arg(self.credentials.ssh_port.to_string())
            .arg(format!("{}@{}", self.credentials.username, self.credentials.console_ip))
            .arg(format!("export TERM=xterm;{command}"));
        let output = self.runner.run(&spec).await?;
        if !output.success() {
            let detail = if output.stderr.trim().is_empty() {
                output.stdout
            } else {
                output.stderr
            };
            return Err(StorageError::adapter(
                TierKind::Nas,
                operation,
                format!("'{command}' exited {}: {}", output.code, detail.trim()),
            ));
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl NasApi for NasConsole {
    fn nas_type(&self) -> NasType {
        self.credentials.nas_type
    }

    async fn fs_list(&self, pool: &str) -> StorageResult<BTreeMap<String, NasFileSystem>> {
        let out = self.exec("list filesystems", "storage fs list".into()).await?;
        Ok(parse_fs_list(&out, pool))
    }

    async fn rollback_list(&self, pool: &str, prefix: &str) -> StorageResult<BTreeMap<String, Vec<String>>> {
        let out = self.exec("list rollbacks", "storage rollback list".into()).await?;
        Ok(parse_rollback_list(&out, pool, prefix))
    }

    async fn rollback_create(&self, name: &str, fs: &str, cache: Option<&str>) -> StorageResult<()> {
        let command = match cache {
            Some(cache) => format!("storage rollback create space-optimized {name} {fs} {cache}"),
            None => format!("storage rollback create {name} {fs}"),
        };
        self.exec("create rollback", command).await?;
        Ok(())
    }

    async fn rollback_restore(&self, fs: &str, name: &str) -> StorageResult<()> {
        self.exec("restore rollback", format!("storage rollback restore {fs} {name}"))
            .await?;
        Ok(())
    }

    async fn rollback_destroy(&self, name: &str, fs: &str) -> StorageResult<()> {
        self.exec("destroy rollback", format!("storage rollback destroy {name} {fs}"))
            .await?;
        Ok(())
    }

    async fn cache_list(&self) -> StorageResult<BTreeMap<String, RollbackCache>> {
        if !self.credentials.nas_type.uses_cache() {
            return Ok(BTreeMap::new());
        }
        let out = self.exec("list rollback caches", "storage rollback cache list".into()).await?;
        Ok(parse_cache_list(&out))
    }

    async fn cache_create(&self, name: &str, size: &str, pool: &str) -> StorageResult<()> {
        if !self.credentials.nas_type.uses_cache() {
            return Ok(());
        }
        self.exec(
            "create rollback cache",
            format!("storage rollback cache create {name} {size} {pool}"),
        )
        .await?;
        Ok(())
    }

    async fn cache_delete(&self, name: &str) -> StorageResult<()> {
        if !self.credentials.nas_type.uses_cache() {
            return Ok(());
        }
        self.exec("destroy rollback cache", format!("storage rollback cache destroy {name}"))
            .await?;
        Ok(())
    }

    async fn share_list(&self, pool: &str) -> StorageResult<Vec<NfsShare>> {
        let out = self.exec("list shares", "nfs share show".into()).await?;
        Ok(parse_share_list(&out, pool))
    }

    async fn share_add(&self, share: &NfsShare) -> StorageResult<()> {
        self.exec(
            "add share",
            format!(
                "nfs share add {} {} {}",
                share.options,
                self.export_path(&share.filesystem),
                share.client
            ),
        )
        .await?;
        Ok(())
    }

    async fn fs_online(&self, fs: &str, online: bool) -> StorageResult<()> {
        let verb = if online { "online" } else { "offline" };
        self.exec("change filesystem state", format!("storage fs {verb} {fs}"))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fs_list() {
        let out = "FS              STATUS  SIZE   LAYOUT\n\
                   ENM-data        online  10.00G simple\n\
                   ENM-amos        offline 512M   simple\n\
                   OTHER-fs        online  1G     simple\n";
        let fs = parse_fs_list(out, "ENM");
        assert_eq!(fs.len(), 2);
        assert!(fs["ENM-data"].online);
        assert_eq!(fs["ENM-data"].size_mb, 10240.0);
        assert!(!fs["ENM-amos"].online);
    }

    #[test]
    fn test_parse_rollback_list() {
        let out = "NAME               TYPE     FILESYSTEM  SNAPDATE\n\
                   Snapshot-ENM-data  spaceopt ENM-data    2026/10/01 08:30\n\
                   L_ENM-data_        spaceopt ENM-data    2026/09/01 08:30\n\
                   Snapshot-X-fs      spaceopt X-fs        2026/10/01 08:30\n";
        let rollbacks = parse_rollback_list(out, "ENM", "Snapshot");
        assert_eq!(rollbacks.len(), 1);
        assert_eq!(rollbacks["ENM-data"], vec!["Snapshot-ENM-data".to_string()]);
    }

    #[test]
    fn test_parse_cache_list() {
        let out = "CACHE NAME  TOTAL(Mb)  USED(Mb) (%)  AVAIL(Mb) (%)\n\
                   ---------- ---------- ------------\n\
                   ENM-cache   1000       850 (85)      150 (15)\n";
        let caches = parse_cache_list(out);
        assert_eq!(caches["ENM-cache"].size_mb, 1000.0);
        assert_eq!(caches["ENM-cache"].used_percent, 85.0);
    }

    #[test]
    fn test_parse_share_list() {
        let out = "/vx/ENM-data  10.1.1.5  (rw,no_root_squash)\n/vx/X-fs 10.1.1.6 (rw)\n";
        let shares = parse_share_list(out, "ENM");
        assert_eq!(
            shares,
            vec![NfsShare {
                filesystem: "ENM-data".into(),
                client: "10.1.1.5".into(),
                options: "rw,no_root_squash".into(),
            }]
        );
    }
}

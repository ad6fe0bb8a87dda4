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

//! Files and scripts the upgrade reads, writes or runs.

use std::path::PathBuf;

/// Every location an upgrade touches outside the runtime directory. Tests
/// point these at a scratch directory.
#[derive(Debug, Clone)]
pub struct UpgradePaths {
    /// Holds the passkey files used to encrypt site passwords.
    pub passkey_dir: PathBuf,
    pub global_properties: PathBuf,
    /// Produces the list of model items a new description no longer has.
    pub diff_tool: PathBuf,
    pub ssh_dir: PathBuf,
    pub yum_repo_root: PathBuf,
    pub cron_d: PathBuf,
    pub cron_daily: PathBuf,
    pub litp_backup_dir: PathBuf,
    pub fallback_installer: PathBuf,
    pub post_restore_script: PathBuf,
    /// Run after the upgrade when present; a failure is only logged.
    pub post_upgrade_scripts: Vec<PathBuf>,
}

impl Default for UpgradePaths {
    fn default() -> Self {
        Self {
            passkey_dir: "/ericsson/tor/data/idenmgmt".into(),
            global_properties: "/ericsson/tor/data/global.properties".into(),
            diff_tool: "/opt/ericsson/enminst/bin/dstutil.sh".into(),
            ssh_dir: "/root/.ssh".into(),
            yum_repo_root: "/var/www/html".into(),
            cron_d: "/etc/cron.d".into(),
            cron_daily: "/etc/cron.daily".into(),
            litp_backup_dir: "/ericsson/tor/data/enmbur/lmsdata".into(),
            fallback_installer: "/opt/ericsson/fallback/bin/installer.sh".into(),
            post_restore_script: "/opt/ericsson/enminst/bin/enm_post_restore.sh".into(),
            post_upgrade_scripts: vec![
                "/opt/ericsson/enminst/bin/esadmin_password_set.sh".into(),
                "/ericsson/pib-scripts/scripts/pib_reset_status_all.sh".into(),
                "/opt/ericsson/nms/litp/lib/scripts/neo4j_hardening_password.sh".into(),
            ],
        }
    }
}

impl UpgradePaths {
    /// Places every file under `root`, keeping the relative layout.
    pub fn rooted(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let defaults = Self::default();
        let under = |p: &PathBuf| root.join(p.strip_prefix("/").unwrap_or(p));
        Self {
            passkey_dir: under(&defaults.passkey_dir),
            global_properties: under(&defaults.global_properties),
            diff_tool: under(&defaults.diff_tool),
            ssh_dir: under(&defaults.ssh_dir),
            yum_repo_root: under(&defaults.yum_repo_root),
            cron_d: under(&defaults.cron_d),
            cron_daily: under(&defaults.cron_daily),
            litp_backup_dir: under(&defaults.litp_backup_dir),
            fallback_installer: under(&defaults.fallback_installer),
            post_restore_script: under(&defaults.post_restore_script),
            post_upgrade_scripts: defaults.post_upgrade_scripts.iter().map(under).collect(),
        }
    }

    pub fn private_key(&self) -> PathBuf {
        self.ssh_dir.join("vm_private_key")
    }

    pub fn public_key(&self) -> PathBuf {
        self.ssh_dir.join("vm_private_key.pub")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rooted_keeps_layout() {
        let paths = UpgradePaths::rooted("/tmp/scratch");
        assert_eq!(paths.cron_d, PathBuf::from("/tmp/scratch/etc/cron.d"));
        assert_eq!(paths.public_key(), PathBuf::from("/tmp/scratch/root/.ssh/vm_private_key.pub"));
        assert_eq!(paths.post_upgrade_scripts.len(), 3);
    }
}

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

//! The closed set of agent methods the tooling invokes on peer nodes.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// RPC agents deployed on the peer nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Agent {
    Enminst,
    VcsCmdApi,
    EnmPrecheck,
    Filemanager,
    Puppet,
}

impl Agent {
    pub fn name(self) -> &'static str {
        match self {
            Agent::Enminst => "enminst",
            Agent::VcsCmdApi => "vcs_cmd_api",
            Agent::EnmPrecheck => "enm_precheck",
            Agent::Filemanager => "filemanager",
            Agent::Puppet => "puppet",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentAction {
    // enminst
    HaclusList,
    HagrpList,
    HagrpDisplay,
    HagrpHistory,
    HasysState,
    HagrpState,
    HagrpClear,
    HagrpSwitch,
    HagrpFreeze,
    HagrpUnfreeze,
    HasysFreeze,
    HasysUnfreeze,
    HasysDisplay,
    HagrpOffline,
    HagrpOnline,
    LvsList,
    CreateLvSnapshots,
    DeleteLvSnapshots,
    RestoreLvSnapshots,
    ShutdownHost,
    GetLvmConfGlobalFilter,
    GetGrubConfLvs,
    GetMem,
    GetCores,
    // vcs_cmd_api
    HagrpWait,
    Haconf,
    Lock,
    Unlock,
    // enm_precheck
    GetReplicationStatus,
    BootPartitionTest,
    BootPartitionCleanup,
    BootPartitionMount,
    LvmConfBackupsCleanup,
    BackupLvmConf,
    UpdateLvmConfGlobalFilter,
    PhysicalVolumeScan,
    GetCountDmsetupDepsNonDm,
    StopVcsAndReboot,
    AddLvmNondbFilter,
    AddLvmNondbGlobalFilter,
    RemovePackages,
    // filemanager
    FileExists,
    FileCopy,
    FileDelete,
    // puppet
    PuppetDisable,
    PuppetEnable,
    PuppetRunOnce,
    PuppetStatus,
}

/// Transport level description of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionDescriptor {
    pub agent: Agent,
    pub method: &'static str,
    pub default_timeout: Duration,
}

const fn desc(agent: Agent, method: &'static str, secs: u64) -> ActionDescriptor {
    ActionDescriptor {
        agent,
        method,
        default_timeout: Duration::from_secs(secs),
    }
}

impl AgentAction {
    /// Every action, in table order.
    pub const ALL: [AgentAction; 48] = [
        AgentAction::HaclusList,
        AgentAction::HagrpList,
        AgentAction::HagrpDisplay,
        AgentAction::HagrpHistory,
        AgentAction::HasysState,
        AgentAction::HagrpState,
        AgentAction::HagrpClear,
        AgentAction::HagrpSwitch,
        AgentAction::HagrpFreeze,
        AgentAction::HagrpUnfreeze,
        AgentAction::HasysFreeze,
        AgentAction::HasysUnfreeze,
        AgentAction::HasysDisplay,
        AgentAction::HagrpOffline,
        AgentAction::HagrpOnline,
        AgentAction::LvsList,
        AgentAction::CreateLvSnapshots,
        AgentAction::DeleteLvSnapshots,
        AgentAction::RestoreLvSnapshots,
        AgentAction::ShutdownHost,
        AgentAction::GetLvmConfGlobalFilter,
        AgentAction::GetGrubConfLvs,
        AgentAction::GetMem,
        AgentAction::GetCores,
        AgentAction::HagrpWait,
        AgentAction::Haconf,
        AgentAction::Lock,
        AgentAction::Unlock,
        AgentAction::GetReplicationStatus,
        AgentAction::BootPartitionTest,
        AgentAction::BootPartitionCleanup,
        AgentAction::BootPartitionMount,
        AgentAction::LvmConfBackupsCleanup,
        AgentAction::BackupLvmConf,
        AgentAction::UpdateLvmConfGlobalFilter,
        AgentAction::PhysicalVolumeScan,
        AgentAction::GetCountDmsetupDepsNonDm,
        AgentAction::StopVcsAndReboot,
        AgentAction::AddLvmNondbFilter,
        AgentAction::AddLvmNondbGlobalFilter,
        AgentAction::RemovePackages,
        AgentAction::FileExists,
        AgentAction::FileCopy,
        AgentAction::FileDelete,
        AgentAction::PuppetDisable,
        AgentAction::PuppetEnable,
        AgentAction::PuppetRunOnce,
        AgentAction::PuppetStatus,
    ];

    /// The dispatch table. Adding an action without an entry here does not
    /// compile.
    pub fn descriptor(self) -> ActionDescriptor {
        use Agent::*;
        match self {
            AgentAction::HaclusList => desc(Enminst, "haclus_list", 60),
            AgentAction::HagrpList => desc(Enminst, "hagrp_list", 60),
            AgentAction::HagrpDisplay => desc(Enminst, "hagrp_display", 120),
            AgentAction::HagrpHistory => desc(Enminst, "hagrp_history", 120),
            AgentAction::HasysState => desc(Enminst, "hasys_state", 60),
            AgentAction::HagrpState => desc(Enminst, "hagrp_state", 60),
            AgentAction::HagrpClear => desc(Enminst, "hagrp_clear", 60),
            AgentAction::HagrpSwitch => desc(Enminst, "hagrp_switch", 60),
            AgentAction::HagrpFreeze => desc(Enminst, "hagrp_freeze", 60),
            AgentAction::HagrpUnfreeze => desc(Enminst, "hagrp_unfreeze", 60),
            AgentAction::HasysFreeze => desc(Enminst, "hasys_freeze", 60),
            AgentAction::HasysUnfreeze => desc(Enminst, "hasys_unfreeze", 60),
            AgentAction::HasysDisplay => desc(Enminst, "hasys_display", 60),
            AgentAction::HagrpOffline => desc(Enminst, "hagrp_offline", 60),
            AgentAction::HagrpOnline => desc(Enminst, "hagrp_online", 60),
            AgentAction::LvsList => desc(Enminst, "lvs_list", 60),
            AgentAction::CreateLvSnapshots => desc(Enminst, "create_lv_snapshots", 300),
            AgentAction::DeleteLvSnapshots => desc(Enminst, "delete_lv_snapshots", 300),
            AgentAction::RestoreLvSnapshots => desc(Enminst, "restore_lv_snapshots", 600),
            AgentAction::ShutdownHost => desc(Enminst, "shutdown_host", 60),
            AgentAction::GetLvmConfGlobalFilter => desc(Enminst, "get_lvm_conf_global_filter", 60),
            AgentAction::GetGrubConfLvs => desc(Enminst, "get_grub_conf_lvs", 60),
            AgentAction::GetMem => desc(Enminst, "get_mem", 60),
            AgentAction::GetCores => desc(Enminst, "get_cores", 60),
            AgentAction::HagrpWait => desc(VcsCmdApi, "hagrp_wait", 600),
            AgentAction::Haconf => desc(VcsCmdApi, "haconf", 60),
            AgentAction::Lock => desc(VcsCmdApi, "lock", 900),
            AgentAction::Unlock => desc(VcsCmdApi, "unlock", 900),
            AgentAction::GetReplicationStatus => desc(EnmPrecheck, "get_replication_status", 120),
            AgentAction::BootPartitionTest => desc(EnmPrecheck, "boot_partition_test", 60),
            AgentAction::BootPartitionCleanup => desc(EnmPrecheck, "boot_partition_cleanup", 60),
            AgentAction::BootPartitionMount => desc(EnmPrecheck, "boot_partition_mount", 60),
            AgentAction::LvmConfBackupsCleanup => {
                desc(EnmPrecheck, "lvm_conf_backups_cleanup", 60)
            }
            AgentAction::BackupLvmConf => desc(EnmPrecheck, "backup_lvm_conf", 60),
            AgentAction::UpdateLvmConfGlobalFilter => {
                desc(EnmPrecheck, "update_lvm_conf_global_filter", 60)
            }
            AgentAction::PhysicalVolumeScan => desc(EnmPrecheck, "physical_volume_scan", 120),
            AgentAction::GetCountDmsetupDepsNonDm => {
                desc(EnmPrecheck, "get_count_dmsetup_deps_non_dm", 60)
            }
            AgentAction::StopVcsAndReboot => desc(EnmPrecheck, "stop_vcs_and_reboot", 120),
            AgentAction::AddLvmNondbFilter => desc(EnmPrecheck, "add_lvm_nondb_filter", 60),
            AgentAction::AddLvmNondbGlobalFilter => {
                desc(EnmPrecheck, "add_lvm_nondb_global_filter", 60)
            }
            AgentAction::RemovePackages => desc(EnmPrecheck, "remove_packages", 600),
            AgentAction::FileExists => desc(Filemanager, "exists", 60),
            AgentAction::FileCopy => desc(Filemanager, "copy", 120),
            AgentAction::FileDelete => desc(Filemanager, "delete", 60),
            AgentAction::PuppetDisable => desc(Puppet, "disable", 60),
            AgentAction::PuppetEnable => desc(Puppet, "enable", 60),
            AgentAction::PuppetRunOnce => desc(Puppet, "runonce", 60),
            AgentAction::PuppetStatus => desc(Puppet, "status", 60),
        }
    }

    pub fn agent(self) -> Agent {
        self.descriptor().agent
    }

    pub fn method(self) -> &'static str {
        self.descriptor().method
    }

    /// Reverse lookup used when replaying recorded calls.
    pub fn lookup(agent: &str, method: &str) -> Option<AgentAction> {
        Self::ALL
            .into_iter()
            .find(|a| a.agent().name() == agent && a.method() == method)
    }
}

impl fmt::Display for AgentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.agent().name(), self.method())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_table_is_unique() {
        let keys: HashSet<_> = AgentAction::ALL
            .iter()
            .map(|a| (a.agent(), a.method()))
            .collect();
        assert_eq!(keys.len(), AgentAction::ALL.len());
    }

    #[test]
    fn test_lookup() {
        assert_eq!(
            AgentAction::lookup("vcs_cmd_api", "hagrp_wait"),
            Some(AgentAction::HagrpWait)
        );
        assert_eq!(AgentAction::lookup("enminst", "no_such_action"), None);
        assert_eq!(AgentAction::HagrpOnline.to_string(), "enminst.hagrp_online");
    }
}

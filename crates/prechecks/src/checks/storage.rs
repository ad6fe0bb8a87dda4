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

//! Storage layout of the db nodes and the LVM filters of the other nodes.

use mco::AgentAction;
use model::vcs::ServiceState;
use runtime::{CommandSpec, Deadline};

use crate::engine::{DB_CLUSTER, NON_DB_CLUSTERS, PrecheckEngine};
use crate::errors::{FailureKind, PrecheckError, PrecheckResult};
use crate::report::CheckOutcome;

// Global filter entry rejecting the non multipathed sd devices.
const SD_REJECT: &str = "r|^/dev/sd.*|";
const RACK_NON_DM_NODES: usize = 3;

fn boot_writable(stderr: &str) -> bool {
    stderr.to_lowercase().contains("copied")
}

impl PrecheckEngine {
    pub(crate) async fn storage_setup_check(&self) -> PrecheckResult<CheckOutcome> {
        if let Some(skip) = self.virtual_skip() {
            return Ok(skip);
        }
        let service = if self.ctx.platform.dps_uses_neo4j { "neo4j" } else { "versant" };
        let running = self.running_systems(DB_CLUSTER).await?;
        if running.is_empty() {
            return Ok(CheckOutcome::skipped("No RUNNING db_cluster systems found"));
        }

        // Passive database nodes first, so the active one is touched last.
        let mut instances = self.service_instances(DB_CLUSTER, Some(service)).await?;
        instances.sort_by_key(|g| g.states.join("|"));
        let mut systems: Vec<String> = Vec::with_capacity(running.len());
        for system in instances.iter().map(|g| &g.system).chain(running.iter()) {
            if running.contains(system) && !systems.contains(system) {
                systems.push(system.clone());
            }
        }

        let rack = self.is_rack().await?;
        for system in &systems {
            tracing::info!(target: "enminst::prechecks", %system, "checking storage setup");
            self.check_boot_partition(system).await?;
            if !rack {
                self.check_lvm_global_filter(system).await?;
            }
        }
        self.check_multipathed_volumes(&systems, rack).await?;
        Ok(CheckOutcome::passed(format!(
            "Storage setup is correct on {}",
            systems.join(", ")
        )))
    }

    async fn check_boot_partition(&self, system: &str) -> PrecheckResult<()> {
        let agent = self.precheck_agent();
        if !boot_writable(&agent.boot_partition_test(system).await?) {
            tracing::warn!(target: "enminst::prechecks", %system, "boot partition not writable, mounting it");
            agent.worker(AgentAction::BootPartitionMount, system).await?;
            if !boot_writable(&agent.boot_partition_test(system).await?) {
                return Err(PrecheckError::check(
                    FailureKind::BootPartitionNotWritable,
                    format!("/boot is not writable on {system}"),
                ));
            }
        }
        agent.worker(AgentAction::BootPartitionCleanup, system).await?;
        Ok(())
    }

    async fn check_lvm_global_filter(&self, system: &str) -> PrecheckResult<()> {
        let agent = self.precheck_agent();
        let enminst = self.enminst();
        let volumes = agent.worker(AgentAction::PhysicalVolumeScan, system).await?.out;
        agent.worker(AgentAction::LvmConfBackupsCleanup, system).await?;

        let filter = enminst.get_lvm_conf_global_filter(system).await?;
        if filter.trim().lines().count() > 1 {
            return Err(PrecheckError::check(
                FailureKind::LvmGlobalFilterCorrupted,
                format!("more than one global_filter in lvm.conf on {system}"),
            ));
        }
        if !filter.contains(SD_REJECT) {
            tracing::info!(target: "enminst::prechecks", %system, %filter, "updating the lvm.conf global_filter");
            agent.run(AgentAction::BackupLvmConf, system).await?;
            agent.run(AgentAction::UpdateLvmConfGlobalFilter, system).await?;
            if !enminst.get_lvm_conf_global_filter(system).await?.contains(SD_REJECT) {
                return Err(PrecheckError::check(
                    FailureKind::LvmGlobalFilterNotInCorrectFormat,
                    format!("global_filter in lvm.conf on {system} does not reject {SD_REJECT}"),
                ));
            }
            let rescanned = agent.worker(AgentAction::PhysicalVolumeScan, system).await?.out;
            if rescanned != volumes {
                return Err(PrecheckError::check(
                    FailureKind::PhysicalVolumesChanged,
                    format!("physical volumes on {system} changed after the global_filter update"),
                ));
            }
        }
        agent.worker(AgentAction::LvmConfBackupsCleanup, system).await?;
        Ok(())
    }

    async fn non_dm_count(&self, system: &str) -> PrecheckResult<String> {
        Ok(self
            .precheck_agent()
            .worker(AgentAction::GetCountDmsetupDepsNonDm, system)
            .await?
            .out
            .trim()
            .to_string())
    }

    /// Volumes not under the device mapper are only picked up by multipath
    /// after a reboot, which the operator has to agree to.
    async fn check_multipathed_volumes(&self, systems: &[String], rack: bool) -> PrecheckResult<()> {
        let mut affected = Vec::new();
        for system in systems {
            let count = self.non_dm_count(system).await?;
            if count != "0" {
                tracing::warn!(target: "enminst::prechecks", %system, %count, "non multipathed volumes present");
                affected.push(system.clone());
            }
        }
        if affected.is_empty() || (rack && affected.len() == RACK_NON_DM_NODES) {
            return Ok(());
        }

        let wait_for_cluster = affected.len() > 1;
        for system in &affected {
            let prompt = format!("Non multipathed volumes present on {system}. Reboot {system}?");
            if !self.ctx.confirm.confirm(&prompt, false) {
                return Err(PrecheckError::check(
                    FailureKind::NonMultipathedVolumesPresent,
                    format!("non multipathed volumes present on {system}, reboot declined"),
                ));
            }
            // The node may go down before it answers.
            match self.precheck_agent().worker(AgentAction::StopVcsAndReboot, system).await {
                Ok(_) => {}
                Err(e) if e.is_unreachable() => {
                    tracing::debug!(target: "enminst::prechecks", %system, error = %e, "no reply to reboot request");
                }
                Err(e) => return Err(e.into()),
            }
            tokio::time::sleep(self.reboot.settle).await;
            if !self.wait_for_system(system, wait_for_cluster).await? {
                return Err(PrecheckError::check(
                    FailureKind::NonMultipathedVolumesPresent,
                    format!("{system} did not come back within {:?} of its reboot", self.reboot.timeout),
                ));
            }
            if self.non_dm_count(system).await? != "0" {
                return Err(PrecheckError::check(
                    FailureKind::NonMultipathedVolumesPresent,
                    format!("non multipathed volumes still present on {system} after reboot"),
                ));
            }
        }
        Ok(())
    }

    async fn wait_for_system(&self, system: &str, in_cluster: bool) -> PrecheckResult<bool> {
        let deadline = Deadline::after(self.reboot.timeout);
        let ping = CommandSpec::new("mco").args(["ping", "-I", system]);
        loop {
            let answered = self
                .ctx
                .runner
                .run(&ping)
                .await
                .is_ok_and(|out| matches!(out.code, 0 | 1) && out.stdout.contains(system));
            if answered && (!in_cluster || self.system_running(system).await?) {
                tracing::info!(target: "enminst::prechecks", %system, "system is back");
                return Ok(true);
            }
            if deadline.expired() {
                return Ok(false);
            }
            deadline.sleep(self.reboot.poll).await;
        }
    }

    async fn system_running(&self, system: &str) -> PrecheckResult<bool> {
        match self.enminst().hasys_state(system).await {
            Ok(rows) => Ok(rows
                .iter()
                .any(|r| r.name == system && ServiceState::from_vcs(&r.states.join("|")) == ServiceState::Running)),
            Err(e) if e.is_unreachable() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) async fn check_lvm_conf_non_db_nodes(&self) -> PrecheckResult<CheckOutcome> {
        if let Some(skip) = self.virtual_skip() {
            return Ok(skip);
        }
        if self.is_rack().await? {
            return Ok(CheckOutcome::skipped("Rack deployment, lvm.conf filters not applicable"));
        }
        let mut systems = Vec::new();
        for cluster in NON_DB_CLUSTERS {
            systems.extend(self.running_systems(cluster).await?);
        }
        if systems.is_empty() {
            return Ok(CheckOutcome::skipped("No RUNNING non db systems found"));
        }
        let agent = self.precheck_agent();
        for system in &systems {
            tracing::info!(target: "enminst::prechecks", %system, "applying lvm.conf filters");
            for action in [
                AgentAction::LvmConfBackupsCleanup,
                AgentAction::BackupLvmConf,
                AgentAction::AddLvmNondbFilter,
                AgentAction::AddLvmNondbGlobalFilter,
                AgentAction::LvmConfBackupsCleanup,
            ] {
                agent.run(action, system).await?;
            }
        }
        Ok(CheckOutcome::passed(format!(
            "lvm.conf filters in place on {}",
            systems.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boot_writable() {
        assert!(boot_writable("1+0 records in\n1+0 records out\n512 bytes Copied"));
        assert!(!boot_writable("dd: failed to open '/boot/test': Read-only file system"));
    }
}

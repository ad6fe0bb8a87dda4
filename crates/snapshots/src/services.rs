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

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use mco::PuppetAgent;
use runtime::{CommandRunner, CommandSpec, Deadline};

use crate::errors::{SnapshotError, SnapshotResult};

pub const PUPPET: &str = "puppet";
pub const PUPPETSERVER: [&str; 2] = ["puppetserver", "puppetserver_monitor"];
pub const RESTORE_STOPPED: [&str; 3] = ["puppet", "httpd", "crond"];
pub const CONSUL: &str = "consul";
pub const HTTPD: &str = "httpd";

const UNRECOGNIZED: &str = "unrecognized service";
const CONFIRM_INPUT: &str = "CoNfIrM";

/// Init services on the management server.
#[derive(Debug, Clone)]
pub struct LmsServices {
    runner: Arc<dyn CommandRunner>,
}

impl LmsServices {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    async fn control(&self, service: &str, action: &str, skip_uninstalled: bool) -> SnapshotResult<()> {
        let spec = CommandSpec::new("service").arg(service).arg(action);
        let out = self.runner.run(&spec).await?;
        if out.success() {
            tracing::info!(target: "enminst::snapshots", service, action, "LMS service done");
            return Ok(());
        }
        if skip_uninstalled && (out.stderr.contains(UNRECOGNIZED) || out.stdout.contains(UNRECOGNIZED)) {
            tracing::info!(target: "enminst::snapshots", service, "service not installed, skipping");
            return Ok(());
        }
        Err(SnapshotError::Service {
            service: service.to_string(),
            action: action.to_string(),
            message: out.stderr.trim().to_string(),
        })
    }

    /// Runs `action` on each service in order, stopping at the first
    /// failure. With `skip_uninstalled`, services the host does not know
    /// are passed over.
    pub async fn manage(&self, action: &str, services: &[&str], skip_uninstalled: bool) -> SnapshotResult<()> {
        for service in services {
            self.control(service, action, skip_uninstalled).await?;
        }
        Ok(())
    }

    pub async fn stop(&self, services: &[&str]) -> SnapshotResult<()> {
        self.manage("stop", services, false).await
    }

    pub async fn start(&self, services: &[&str]) -> SnapshotResult<()> {
        self.manage("start", services, false).await
    }

    pub async fn restart(&self, service: &str) -> SnapshotResult<()> {
        self.control(service, "restart", false).await
    }

    /// Asks the management server to reboot.
    pub async fn reboot(&self) -> SnapshotResult<()> {
        tracing::info!(target: "enminst::snapshots", "rebooting the LMS");
        self.runner
            .run_checked(&CommandSpec::new("shutdown").args(["-r", "now"]))
            .await?;
        Ok(())
    }
}

/// Waits until no node is applying a puppet catalog.
pub async fn wait_puppet_quiesced(puppet: &PuppetAgent, timeout: Duration, interval: Duration) -> SnapshotResult<()> {
    let deadline = Deadline::after(timeout);
    loop {
        let busy: Vec<String> = puppet
            .status(&[])
            .await?
            .into_iter()
            .filter(|(_, s)| s.applying)
            .map(|(host, _)| host)
            .collect();
        if busy.is_empty() {
            return Ok(());
        }
        if deadline.expired() {
            return Err(SnapshotError::PuppetBusy { hosts: busy, timeout });
        }
        tracing::info!(target: "enminst::snapshots", hosts = ?busy, "waiting for puppet catalog runs to finish");
        deadline.sleep(interval).await;
    }
}

/// Neo4j hooks run around the snapshot lifecycle on Neo4j deployments.
#[derive(Debug, Clone)]
pub struct Neo4jHooks {
    runner: Arc<dyn CommandRunner>,
    pre_snapshot: PathBuf,
    post_remove: PathBuf,
    enabled: bool,
}

impl Neo4jHooks {
    pub fn new(runner: Arc<dyn CommandRunner>, pre_snapshot: PathBuf, post_remove: PathBuf) -> Self {
        Self {
            runner,
            pre_snapshot,
            post_remove,
            enabled: true,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    // A missing script or a failing one is logged and otherwise ignored.
    async fn run(&self, script: &Path, flag: &str) {
        if !self.enabled {
            return;
        }
        if !script.exists() {
            tracing::debug!(target: "enminst::snapshots", script = %script.display(), "script not present, skipping");
            return;
        }
        let spec = CommandSpec::new(script.display().to_string())
            .arg(flag)
            .with_stdin(CONFIRM_INPUT);
        match self.runner.run(&spec).await {
            Ok(out) if out.success() => {
                tracing::info!(target: "enminst::snapshots", script = %script.display(), "script completed");
            }
            Ok(out) => {
                tracing::error!(target: "enminst::snapshots", script = %script.display(), code = out.code, stderr = %out.stderr.trim(), "script failed");
            }
            Err(e) => {
                tracing::error!(target: "enminst::snapshots", script = %script.display(), error = %e, "script failed");
            }
        }
    }

    pub async fn pre_snapshot(&self) {
        self.run(&self.pre_snapshot, "--set_for_restore").await
    }

    pub async fn post_remove(&self) {
        self.run(&self.post_remove, "--clean_after_restore").await
    }
}

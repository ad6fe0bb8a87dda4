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

//! Checks and fixes applied on the management server itself.

use std::path::Path;
use std::time::Duration;

use mco::PuppetAgent;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use runtime::CommandSpec;
use snapshots::services::wait_puppet_quiesced;

use crate::engine::PrecheckEngine;
use crate::errors::{FailureKind, PrecheckError, PrecheckResult};
use crate::report::CheckOutcome;

const LOCAL_PACKAGE: &str = "perl-Compress-Raw-Zlib";
const PUPPET_SYNC: &str = "/opt/ericsson/enminst/bin/puppet.bsh";
const SYSTEMCTL: &str = "/usr/bin/systemctl";
const PUPPET_POLL_INTERVAL: Duration = Duration::from_secs(10);
const PUPPET_SYNC_BACKOFF: Duration = Duration::from_secs(5);

static RUNINTERVAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"runinterval\s*=\s*(\d+)").expect("static regex is valid"));
static CONFIGTIMEOUT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"configtimeout\s*=\s*(\d+)").expect("static regex is valid"));
static MANIFEST_RUNINTERVAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"setting\s*=>\s*'runinterval',\s*value\s*=>\s*'([0-9]+)'").expect("static regex is valid")
});
static MANIFEST_CONFIGTIMEOUT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"setting\s*=>\s*'configtimeout',\s*value\s*=>\s*'([0-9]+)'").expect("static regex is valid")
});
static LOCK_TIMEOUT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"PUPPET_LOCK_TIMEOUT\s*=\s*(\d+)").expect("static regex is valid"));
static MAX_ITERATIONS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"def __init__\(self, max_iterations=([0-9]+)").expect("static regex is valid")
});

const RUNINTERVAL: u64 = 1800;
const CONFIGTIMEOUT: u64 = 1720;
const LOCK_TIMEOUT: u64 = 1980;
const MAX_ITERATIONS: u64 = 1000;

/// Raises the value captured by the first group of every match of `re` to
/// `minimum`. Returns the new text when anything changed.
pub(crate) fn raise_setting(text: &str, re: &Regex, minimum: u64) -> Option<String> {
    let mut changed = false;
    let updated = re.replace_all(text, |caps: &Captures| {
        let (Some(whole), Some(value)) = (caps.get(0), caps.get(1)) else {
            return caps[0].to_string();
        };
        if value.as_str().parse::<u64>().is_ok_and(|v| v >= minimum) {
            return whole.as_str().to_string();
        }
        changed = true;
        let start = value.start() - whole.start();
        let end = value.end() - whole.start();
        format!("{}{minimum}{}", &whole.as_str()[..start], &whole.as_str()[end..])
    });
    changed.then(|| updated.into_owned())
}

fn mounts_at<'a>(mounts: &'a str, marker: &str) -> Vec<&'a str> {
    mounts.lines().filter(|l| l.contains(marker)).collect()
}

impl PrecheckEngine {
    pub(crate) async fn unmount_iso_image_check(&self) -> PrecheckResult<CheckOutcome> {
        let dir = self.locations.iso_mount_dir.display().to_string();
        let mount = CommandSpec::new("/bin/mount");
        let mounts = self.run_local(mount.clone()).await?;

        let nested = mounts_at(&mounts, &format!(" on {dir}/"));
        if !nested.is_empty() {
            return Err(PrecheckError::checks(
                FailureKind::IsoImageMounted,
                nested
                    .into_iter()
                    .map(|m| format!("{m}: unmount it manually"))
                    .collect(),
            ));
        }

        let marker = format!(" on {dir} ");
        let mounted = mounts_at(&mounts, &marker).len();
        if mounted > 0 {
            let prompt = format!("{mounted} image(s) mounted on {dir}. Unmount?");
            if !self.ctx.confirm.confirm(&prompt, false) {
                return Err(PrecheckError::check(
                    FailureKind::IsoImageMounted,
                    format!("an image is mounted on {dir}, unmount it manually"),
                ));
            }
            // Mounts stack, each umount removes the top one.
            for _ in 0..mounted {
                self.run_local(CommandSpec::new("/bin/umount").arg(&dir)).await?;
            }
            if !mounts_at(&self.run_local(mount).await?, &marker).is_empty() {
                return Err(PrecheckError::check(
                    FailureKind::IsoImageMounted,
                    format!("{dir} is still mounted"),
                ));
            }
            tracing::info!(target: "enminst::prechecks", %dir, "unmounted images");
        }

        if let Ok(mut entries) = tokio::fs::read_dir(&self.locations.iso_mount_dir).await
            && let Ok(Some(_)) = entries.next_entry().await
        {
            tracing::warn!(target: "enminst::prechecks", %dir, "directory is not empty");
        }
        Ok(CheckOutcome::passed(format!("No image mounted on {dir}")))
    }

    pub(crate) async fn remove_packages(&self) -> PrecheckResult<CheckOutcome> {
        let failed = |reason: String| PrecheckError::check(FailureKind::PluginRemovalFailed, reason);
        self.run_local(CommandSpec::new("yum").args(["remove", "-y", LOCAL_PACKAGE]))
            .await
            .map_err(|e| failed(format!("{LOCAL_PACKAGE} on the management server: {e}")))?;

        let clusters: Vec<String> = self.vcs.inventory().await?.clusters.into_keys().collect();
        let agent = self.precheck_agent();
        let mut reasons = Vec::new();
        for cluster in &clusters {
            for system in self.running_systems(cluster).await? {
                if let Err(e) = agent.remove_packages(&system, LOCAL_PACKAGE).await {
                    tracing::error!(target: "enminst::prechecks", %system, error = %e, "package removal failed");
                    reasons.push(format!("{LOCAL_PACKAGE} on {system}: {e}"));
                }
            }
        }
        if !reasons.is_empty() {
            return Err(PrecheckError::checks(FailureKind::PluginRemovalFailed, reasons));
        }
        Ok(CheckOutcome::passed(format!("{LOCAL_PACKAGE} removed")))
    }

    async fn raise_in_file(&self, path: &Path, settings: &[(&Regex, u64)]) -> PrecheckResult<bool> {
        let original = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| PrecheckError::io(path, e))?;
        let mut text = original.clone();
        for (re, minimum) in settings {
            if let Some(updated) = raise_setting(&text, re, *minimum) {
                text = updated;
            }
        }
        if text == original {
            return Ok(false);
        }
        tokio::fs::write(path, text)
            .await
            .map_err(|e| PrecheckError::io(path, e))?;
        tracing::info!(target: "enminst::prechecks", path = %path.display(), "raised puppet timeouts");
        Ok(true)
    }

    pub(crate) async fn apply_puppet_timeouts(&self) -> PrecheckResult<CheckOutcome> {
        let files = &self.locations.puppet_timeouts;
        let mut changed = false;
        changed |= self
            .raise_in_file(
                &files.puppet_conf,
                &[(&*RUNINTERVAL_RE, RUNINTERVAL), (&*CONFIGTIMEOUT_RE, CONFIGTIMEOUT)],
            )
            .await?;
        changed |= self
            .raise_in_file(
                &files.litp_puppet_manifest,
                &[
                    (&*MANIFEST_RUNINTERVAL_RE, RUNINTERVAL),
                    (&*MANIFEST_CONFIGTIMEOUT_RE, CONFIGTIMEOUT),
                ],
            )
            .await?;
        changed |= self
            .raise_in_file(&files.puppet_manager, &[(&*LOCK_TIMEOUT_RE, LOCK_TIMEOUT)])
            .await?;
        changed |= self
            .raise_in_file(&files.rpc_commands, &[(&*MAX_ITERATIONS_RE, MAX_ITERATIONS)])
            .await?;
        if !changed {
            return Ok(CheckOutcome::passed("Puppet timeouts already applied"));
        }

        let not_applied = |e: PrecheckError| PrecheckError::check(FailureKind::PuppetTimeoutsNotApplied, e.to_string());
        self.run_local(CommandSpec::new("service").args(["litpd", "restart"]))
            .await
            .map_err(not_applied)?;
        let sync = CommandSpec::new(PUPPET_SYNC).arg("--sync");
        tryhard::retry_fn(|| self.run_local(sync.clone()))
            .retries(1)
            .fixed_backoff(PUPPET_SYNC_BACKOFF)
            .await
            .map_err(not_applied)?;
        Ok(CheckOutcome::passed("Puppet timeouts applied"))
    }

    pub(crate) async fn restart_puppet_services(&self) -> PrecheckResult<CheckOutcome> {
        if self.model.is_plan_running().await? {
            return Err(PrecheckError::check(
                FailureKind::PlanRunning,
                "a plan is running, puppet services cannot be restarted",
            ));
        }
        wait_puppet_quiesced(
            &PuppetAgent::new(self.mco.clone()),
            self.ctx.config.puppet_wait_timeout,
            PUPPET_POLL_INTERVAL,
        )
        .await?;

        for (verb, unit) in [
            ("stop", "puppetdb_monitor"),
            ("stop", "puppetserver_monitor"),
            ("restart", "puppetdb"),
            ("restart", "puppetserver"),
            ("start", "puppetdb_monitor"),
            ("start", "puppetserver_monitor"),
        ] {
            tracing::info!(target: "enminst::prechecks", "{verb} {unit}");
            self.run_local(CommandSpec::new(SYSTEMCTL).args([verb, unit]))
                .await
                .map_err(|e| {
                    PrecheckError::check(FailureKind::PuppetServicesRestartFailed, format!("{verb} {unit}: {e}"))
                })?;
        }
        Ok(CheckOutcome::passed("Puppet services restarted"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raise_setting_only_raises() {
        let conf = "[main]\n    runinterval = 600\n    configtimeout = 3000\n";
        let raised = raise_setting(conf, &RUNINTERVAL_RE, RUNINTERVAL).unwrap();
        assert!(raised.contains("runinterval = 1800"));
        assert!(raise_setting(&raised, &CONFIGTIMEOUT_RE, CONFIGTIMEOUT).is_none());
        assert!(raise_setting(&raised, &RUNINTERVAL_RE, RUNINTERVAL).is_none());
    }

    #[test]
    fn test_raise_manifest_and_python_settings() {
        let manifest = "litp::puppet_conf { setting => 'runinterval', value => '300' }";
        assert_eq!(
            raise_setting(manifest, &MANIFEST_RUNINTERVAL_RE, RUNINTERVAL).unwrap(),
            "litp::puppet_conf { setting => 'runinterval', value => '1800' }"
        );
        let rpc = "    def __init__(self, max_iterations=200, other=1):";
        assert!(
            raise_setting(rpc, &MAX_ITERATIONS_RE, MAX_ITERATIONS)
                .unwrap()
                .contains("max_iterations=1000,")
        );
    }
}

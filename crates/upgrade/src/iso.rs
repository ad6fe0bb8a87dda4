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

//! LITP and ENM ISO imports.
//!
//! `litp import_iso` returns at once and puts the model engine into
//! maintenance mode while it copies the repositories; the import is over
//! when the maintenance job reports `Done` and the mode is lifted.

use std::path::{Path, PathBuf};
use std::time::Duration;

use litp::{ModelApi, props};
use runtime::mount::IsoMount;
use runtime::{CommandRunner, CommandSpec, Deadline};

use crate::errors::{UpgradeError, UpgradeResult};
use crate::sed::WorkingConfig;

pub const IMPORT_TIMEOUT: Duration = Duration::from_secs(7200);
const IMPORT_SETTLE: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_secs(10);
const JOB_DONE: &str = "Done";
const JOB_FAILED: &str = "Failed";
pub(crate) const ENM_IMAGES: &str = "images/ENM";

#[derive(Debug)]
pub struct IsoImporter<'a> {
    runner: &'a dyn CommandRunner,
    model: &'a dyn ModelApi,
    timeout: Duration,
    poll_interval: Duration,
}

impl<'a> IsoImporter<'a> {
    pub fn new(runner: &'a dyn CommandRunner, model: &'a dyn ModelApi) -> Self {
        Self {
            runner,
            model,
            timeout: IMPORT_TIMEOUT,
            poll_interval: POLL_INTERVAL,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn ensure_not_in_maintenance(&self) -> UpgradeResult<()> {
        if self.model.is_in_maintenance_mode().await? {
            tracing::error!(target: "enminst::upgrade", "LITP is in maintenance mode, can not import an ISO in this mode");
            return Err(UpgradeError::MaintenanceMode);
        }
        Ok(())
    }

    async fn import_mounted(&self, iso: &Path, mount: &IsoMount) -> UpgradeResult<()> {
        self.runner
            .run_checked(&CommandSpec::new("litp").arg("import_iso").arg(mount.path().display().to_string()))
            .await?;
        tokio::time::sleep(IMPORT_SETTLE).await;
        self.wait_for_import(iso).await
    }

    async fn wait_for_import(&self, iso: &Path) -> UpgradeResult<()> {
        let deadline = Deadline::after(self.timeout);
        loop {
            match self.model.maintenance().await {
                Ok(m) if m.status.as_deref() == Some(JOB_FAILED) => {
                    return Err(UpgradeError::Import {
                        iso: iso.to_path_buf(),
                        message: "import ISO job failed".to_string(),
                    });
                }
                Ok(m) if m.status.as_deref() == Some(JOB_DONE) && !m.enabled => {
                    tracing::info!(target: "enminst::upgrade", iso = %iso.display(), elapsed = ?deadline.elapsed(), "import finished");
                    return Ok(());
                }
                Ok(m) => {
                    tracing::debug!(target: "enminst::upgrade", status = ?m.status, enabled = m.enabled, "import in progress");
                }
                // the engine refuses requests for a while during an import
                Err(e) => {
                    tracing::info!(target: "enminst::upgrade", error = %e, "waiting for response from LITP");
                }
            }
            if deadline.expired() {
                tracing::error!(target: "enminst::upgrade", iso = %iso.display(), "timeout limit reached for LITP import_iso");
                return Err(UpgradeError::ImportTimeout {
                    iso: iso.to_path_buf(),
                    timeout: self.timeout,
                });
            }
            deadline.sleep(self.poll_interval).await;
        }
    }

    pub async fn import_litp(&self, iso: &Path) -> UpgradeResult<()> {
        tracing::info!(target: "enminst::upgrade", iso = %iso.display(), "importing LITP ISO");
        self.ensure_not_in_maintenance().await?;
        let mount = IsoMount::mount(self.runner, iso).await?;
        self.import_mounted(iso, &mount).await
    }

    /// Imports the ENM ISO and records its VM images in the working
    /// parameters. Returns the image file names.
    pub async fn import_enm(&self, iso: &Path, ms_hostname: &str, working: &mut WorkingConfig) -> UpgradeResult<Vec<String>> {
        tracing::info!(target: "enminst::upgrade", iso = %iso.display(), "importing ENM ISO");
        self.ensure_not_in_maintenance().await?;
        let mount = IsoMount::mount(self.runner, iso).await?;
        let images = qcow2_images(&mount.path().join(ENM_IMAGES))?;
        self.model.update("/ms", &props([("hostname", ms_hostname)])).await?;
        self.import_mounted(iso, &mount).await?;
        working.set_images(images.iter().map(String::as_str));
        working.save()?;
        tracing::info!(target: "enminst::upgrade", count = images.len(), "VM images recorded");
        Ok(images)
    }
}

pub(crate) fn qcow2_images(dir: &Path) -> UpgradeResult<Vec<String>> {
    let entries = std::fs::read_dir(dir).map_err(|e| UpgradeError::io(dir, e))?;
    let mut images: Vec<String> = entries
        .filter_map(Result::ok)
        .map(|e| PathBuf::from(e.file_name()))
        .filter(|p| p.extension().is_some_and(|x| x == "qcow2"))
        .map(|p| p.display().to_string())
        .collect();
    images.sort();
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use litp::testing::FakeModel;
    use runtime::testing::ScriptedRunner;

    #[tokio::test]
    async fn test_maintenance_mode_blocks_import() {
        let dir = tempfile::tempdir().unwrap();
        let iso = dir.path().join("litp.iso");
        std::fs::write(&iso, b"iso").unwrap();
        let model = FakeModel::new().with_maintenance(true);
        let runner = ScriptedRunner::new();
        let err = IsoImporter::new(&runner, &model).import_litp(&iso).await.unwrap_err();
        assert!(matches!(err, UpgradeError::MaintenanceMode));
        assert!(!runner.called("mount"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_job_fails_import() {
        let model = FakeModel::new().with_maintenance_status("Failed");
        let runner = ScriptedRunner::new();
        let err = IsoImporter::new(&runner, &model)
            .wait_for_import(Path::new("/tmp/enm.iso"))
            .await
            .unwrap_err();
        assert!(matches!(err, UpgradeError::Import { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_import_times_out() {
        let model = FakeModel::new().with_maintenance(true).with_maintenance_status("Running");
        let runner = ScriptedRunner::new();
        let err = IsoImporter::new(&runner, &model)
            .with_timeout(Duration::from_secs(60))
            .wait_for_import(Path::new("/tmp/enm.iso"))
            .await
            .unwrap_err();
        assert!(matches!(err, UpgradeError::ImportTimeout { .. }));
    }

    #[test]
    fn test_qcow2_images() {
        let dir = tempfile::tempdir().unwrap();
        for f in ["b_CXP1-1.qcow2", "a_CXP2-1.qcow2", "notes.txt"] {
            std::fs::write(dir.path().join(f), b"").unwrap();
        }
        assert_eq!(
            qcow2_images(dir.path()).unwrap(),
            vec!["a_CXP2-1.qcow2".to_string(), "b_CXP1-1.qcow2".to_string()]
        );
    }
}

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

//! Scoped loop mounts of ISO images.

use std::path::{Path, PathBuf};

use crate::command::{CommandRunner, CommandSpec};
use crate::errors::{RuntimeError, RuntimeResult};

/// An ISO mounted on a private temporary directory.
///
/// Dropping the guard unmounts the image. A mount that refuses to go away
/// has the processes working inside it killed, then is lazily detached.
#[derive(Debug)]
pub struct IsoMount {
    iso: PathBuf,
    dir: Option<tempfile::TempDir>,
}

impl IsoMount {
    pub async fn mount(runner: &dyn CommandRunner, iso: &Path) -> RuntimeResult<Self> {
        if !iso.is_file() {
            return Err(RuntimeError::Mount {
                path: iso.to_path_buf(),
                message: "image does not exist".to_string(),
            });
        }
        let dir = tempfile::Builder::new()
            .prefix("enminst_iso_")
            .tempdir()
            .map_err(|e| RuntimeError::io(std::env::temp_dir(), e))?;
        let spec = CommandSpec::new("mount")
            .args(["-o", "loop,ro"])
            .arg(iso.display().to_string())
            .arg(dir.path().display().to_string());
        let output = runner.run(&spec).await?;
        if !output.success() {
            return Err(RuntimeError::Mount {
                path: iso.to_path_buf(),
                message: output.stderr.trim().to_string(),
            });
        }
        tracing::info!(iso = %iso.display(), mount = %dir.path().display(), "mounted image");
        Ok(Self {
            iso: iso.to_path_buf(),
            dir: Some(dir),
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.as_ref().map(|d| d.path()).unwrap_or(self.iso.as_path())
    }

    fn release(dir: &Path) {
        let umount = |args: &[&str]| {
            std::process::Command::new("umount")
                .args(args)
                .arg(dir)
                .status()
                .map(|s| s.success())
                .unwrap_or(false)
        };
        if umount(&[]) {
            return;
        }
        tracing::warn!(mount = %dir.display(), "mount busy, killing processes using it");
        let _ = std::process::Command::new("fuser").arg("-km").arg(dir).status();
        if !umount(&[]) && !umount(&["-l"]) {
            tracing::error!(mount = %dir.display(), "failed to unmount");
        }
    }
}

impl Drop for IsoMount {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            Self::release(dir.path());
            tracing::debug!(iso = %self.iso.display(), "unmounted image");
            // TempDir removes the (now empty) mount point
            drop(dir);
        }
    }
}

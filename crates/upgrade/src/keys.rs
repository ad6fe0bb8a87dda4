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

//! SSH key used by the management server to reach the VMs.

use std::path::Path;

use litp::{ModelApi, props};
use runtime::{CommandRunner, CommandSpec};

use crate::errors::{UpgradeError, UpgradeResult};
use crate::paths::UpgradePaths;
use crate::sed::WorkingConfig;

pub const VM_SSH_KEY_PARAM: &str = "vm_ssh_key";
const KEY_COMMENT: &str = "cloud-user";
const SERVICE_ROOTS: [&str; 2] = ["/software/services", "/ms/services"];

async fn generate(runner: &dyn CommandRunner, paths: &UpgradePaths) -> UpgradeResult<String> {
    std::fs::create_dir_all(&paths.ssh_dir).map_err(|e| UpgradeError::io(&paths.ssh_dir, e))?;
    let private = paths.private_key();
    // ssh-keygen refuses to overwrite without a prompt
    for stale in [private.clone(), paths.public_key()] {
        if stale.exists() {
            std::fs::remove_file(&stale).map_err(|e| UpgradeError::io(&stale, e))?;
        }
    }
    tracing::info!(target: "enminst::upgrade", "generating SSH key");
    runner
        .run_checked(
            &CommandSpec::new("ssh-keygen")
                .args(["-q", "-t", "rsa", "-b", "2048", "-N", "", "-C", KEY_COMMENT, "-f"])
                .arg(private.display().to_string()),
        )
        .await?;
    read_public_key(&paths.public_key())
}

fn read_public_key(path: &Path) -> UpgradeResult<String> {
    let key = std::fs::read_to_string(path).map_err(|e| UpgradeError::io(path, e))?;
    Ok(key.trim().to_string())
}

/// Makes sure the working parameters reference a VM key, generating one
/// when they do not. A key stored inline is moved out to the public key
/// file.
pub async fn ensure_vm_key(
    runner: &dyn CommandRunner,
    paths: &UpgradePaths,
    working: &mut WorkingConfig,
) -> UpgradeResult<()> {
    let file_ref = format!("file://{}", paths.public_key().display());
    match working.get(VM_SSH_KEY_PARAM).map(str::to_string) {
        Some(value) if value.starts_with("file://") => return Ok(()),
        Some(value) if value.contains("ssh-rsa") => {
            tracing::info!(target: "enminst::upgrade", "moving inline VM SSH key to its key file");
            std::fs::create_dir_all(&paths.ssh_dir).map_err(|e| UpgradeError::io(&paths.ssh_dir, e))?;
            let public = paths.public_key();
            std::fs::write(&public, format!("{value}\n")).map_err(|e| UpgradeError::io(&public, e))?;
        }
        _ => {
            generate(runner, paths).await?;
        }
    }
    working.set(VM_SSH_KEY_PARAM, &file_ref);
    working.save()
}

/// Paths of every `vm-ssh-key` item below the VM services.
pub async fn vm_key_paths(model: &dyn ModelApi) -> UpgradeResult<Vec<String>> {
    let mut out = Vec::new();
    for root in SERVICE_ROOTS {
        if !model.exists(root).await? {
            continue;
        }
        for service in model.get_children(root).await? {
            if service.base_type() != "vm-service" {
                continue;
            }
            let keys = format!("{}/vm_ssh_keys", service.path);
            if !model.exists(&keys).await? {
                continue;
            }
            out.extend(
                model
                    .get_children(&keys)
                    .await?
                    .into_iter()
                    .filter(|k| k.base_type() == "vm-ssh-key")
                    .map(|k| k.path),
            );
        }
    }
    Ok(out)
}

/// Generates a new VM key and writes it to every VM key item. The upgrade
/// plan carries the change to the VMs.
pub async fn regenerate(
    runner: &dyn CommandRunner,
    model: &dyn ModelApi,
    paths: &UpgradePaths,
    working: &mut WorkingConfig,
) -> UpgradeResult<usize> {
    let targets = vm_key_paths(model).await?;
    if targets.is_empty() {
        tracing::info!(target: "enminst::upgrade", "no SSH keys to regenerate");
        return Ok(0);
    }
    let key = generate(runner, paths).await?;
    working.set(VM_SSH_KEY_PARAM, &format!("file://{}", paths.public_key().display()));
    working.save()?;
    for path in &targets {
        model.update(path, &props([("ssh_key", key.as_str())])).await?;
    }
    tracing::info!(target: "enminst::upgrade", count = targets.len(), "SSH keys regenerated");
    Ok(targets.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use runtime::testing::ScriptedRunner;

    #[tokio::test]
    async fn test_inline_key_moves_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths = UpgradePaths::rooted(dir.path());
        let cfg_path = dir.path().join("enminst_working.cfg");
        std::fs::write(&cfg_path, "vm_ssh_key=ssh-rsa AAAA cloud-user\n").unwrap();
        let mut working = WorkingConfig::open(&cfg_path).unwrap();
        let runner = ScriptedRunner::new();

        ensure_vm_key(&runner, &paths, &mut working).await.unwrap();

        assert!(!runner.called("ssh-keygen"));
        assert_eq!(
            std::fs::read_to_string(paths.public_key()).unwrap(),
            "ssh-rsa AAAA cloud-user\n"
        );
        let reread = WorkingConfig::open(&cfg_path).unwrap();
        assert!(reread.get(VM_SSH_KEY_PARAM).unwrap().starts_with("file://"));
    }

    #[tokio::test]
    async fn test_file_reference_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let paths = UpgradePaths::rooted(dir.path());
        let cfg_path = dir.path().join("enminst_working.cfg");
        std::fs::write(&cfg_path, "vm_ssh_key=file:///root/.ssh/vm_private_key.pub\n").unwrap();
        let mut working = WorkingConfig::open(&cfg_path).unwrap();
        let runner = ScriptedRunner::new();

        ensure_vm_key(&runner, &paths, &mut working).await.unwrap();
        assert!(runner.calls().is_empty());
    }
}

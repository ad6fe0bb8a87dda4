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

//! Housekeeping once the upgrade plan has run.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use litp::{ModelApi, tree};
use runtime::{CommandRunner, CommandSpec, RunStateStore};
use storage::NasType;
use vcs::Vcs;

use crate::dbgroups::{is_rack, switch_db_groups};
use crate::errors::{UpgradeError, UpgradeResult};
use crate::paths::UpgradePaths;

const STORAGE_PROVIDERS: &str = "/infrastructure/storage/storage_providers";

const LITP_STATE_BACKUP: &str = "litp_state_backup";
const CLEANUP_JAVA_CORE_DUMPS: &str = "cleanup_java_core_dumps";
const SAN_FAULT_CHECKER: &str = "san_fault_checker";
const NASAUDIT_ERROR_CHECK: &str = "nasaudit_error_check";

const CLEANUP_JAVA_CORE_DUMPS_SCRIPT: &str = "#!/bin/sh\n\
find /ericsson/enm/dumps -type f -mtime +30 \\( -name \\*.hprof -o -name core.\\* \\) -exec rm -f {} \\; \n";
const SAN_FAULT_CHECKER_ENTRY: &str = "*/15 * * * * root /opt/ericsson/enminst/bin/san_fault_check.sh \n";
const NASAUDIT_ERROR_CHECK_ENTRY: &str = "0 */4 * * * root /opt/ericsson/enminst/bin/nasaudit_error_check.sh \n";

fn litp_state_backup_entry(backup_dir: &Path) -> String {
    format!(
        "*/10 * * * * root [ -f /opt/ericsson/nms/litp/bin/litp_state_backup.sh ] && \
         /opt/ericsson/nms/litp/bin/litp_state_backup.sh {}/\n",
        backup_dir.display().to_string().trim_end_matches('/')
    )
}

fn write(path: &Path, content: &str) -> UpgradeResult<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| UpgradeError::io(dir, e))?;
    }
    std::fs::write(path, content).map_err(|e| UpgradeError::io(path, e))
}

/// Type of the NAS in the model, if there is one.
pub async fn nas_type(model: &dyn ModelApi) -> UpgradeResult<Option<NasType>> {
    if !model.exists(STORAGE_PROVIDERS).await? {
        return Ok(None);
    }
    let providers = tree::items_by_type(model, STORAGE_PROVIDERS, "sfs-service", false).await?;
    match providers.first() {
        Some(p) => Ok(Some(p.property("nas_type").unwrap_or("veritas").parse()?)),
        None => Ok(None),
    }
}

/// Writes the housekeeping cron jobs. The NAS audit only applies to
/// Veritas.
pub fn install_crons(paths: &UpgradePaths, nas: Option<NasType>) -> UpgradeResult<Vec<PathBuf>> {
    let mut written = Vec::new();

    std::fs::create_dir_all(&paths.litp_backup_dir).map_err(|e| UpgradeError::io(&paths.litp_backup_dir, e))?;
    let backup = paths.cron_d.join(LITP_STATE_BACKUP);
    write(&backup, &litp_state_backup_entry(&paths.litp_backup_dir))?;
    written.push(backup);

    let dumps = paths.cron_daily.join(CLEANUP_JAVA_CORE_DUMPS);
    write(&dumps, CLEANUP_JAVA_CORE_DUMPS_SCRIPT)?;
    std::fs::set_permissions(&dumps, std::fs::Permissions::from_mode(0o755))
        .map_err(|e| UpgradeError::io(&dumps, e))?;
    written.push(dumps);

    let san = paths.cron_d.join(SAN_FAULT_CHECKER);
    write(&san, SAN_FAULT_CHECKER_ENTRY)?;
    written.push(san);

    if nas == Some(NasType::Veritas) {
        let audit = paths.cron_d.join(NASAUDIT_ERROR_CHECK);
        write(&audit, NASAUDIT_ERROR_CHECK_ENTRY)?;
        written.push(audit);
    }
    tracing::info!(target: "enminst::upgrade", crons = written.len(), "housekeeping crons installed");
    Ok(written)
}

/// Runs each script that exists. Failures are logged only.
pub async fn run_optional_scripts(runner: &dyn CommandRunner, scripts: &[PathBuf]) -> usize {
    let mut ran = 0;
    for script in scripts {
        if !script.is_file() {
            tracing::debug!(target: "enminst::upgrade", script = %script.display(), "script not installed");
            continue;
        }
        ran += 1;
        let spec = CommandSpec::new("sh").arg(script.display().to_string());
        match runner.run_checked(&spec).await {
            Ok(_) => tracing::info!(target: "enminst::upgrade", script = %script.display(), "script successful"),
            Err(e) => tracing::error!(target: "enminst::upgrade", script = %script.display(), error = %e, "script failed"),
        }
    }
    ran
}

/// Post upgrade steps, ending with the removal of the stage and
/// parameter records.
pub async fn post_upgrade(
    model: &dyn ModelApi,
    vcs: &Vcs,
    runner: &dyn CommandRunner,
    paths: &UpgradePaths,
    state: &RunStateStore,
    dps_uses_neo4j: bool,
) -> UpgradeResult<()> {
    tracing::info!(target: "enminst::upgrade", "post upgrade");
    switch_db_groups(vcs, dps_uses_neo4j, is_rack(model).await?).await?;
    install_crons(paths, nas_type(model).await?)?;
    run_optional_scripts(runner, &paths.post_upgrade_scripts).await;
    state.clear_stage()?;
    state.clear_params()?;
    Ok(())
}

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

// src/errors.rs
// Error types for the upgrade orchestrator.

use std::path::{Path, PathBuf};

use model::ExitCode;
use thiserror::Error;

// UpgradeError covers every way an upgrade run stops. The lower layers keep
// their own exit codes; the orchestrator adds the ones that only make sense
// for a whole run.
#[derive(Error, Debug)]
pub enum UpgradeError {
    // Usage occurs when the argument combination is not a valid run.
    #[error("{0}")]
    Usage(String),
    // DuplicatePatch occurs when two patch files have the same content.
    #[error("OS patch {second} has the same content as {first}")]
    DuplicatePatch { first: PathBuf, second: PathBuf },
    // Declined occurs when the operator refuses a confirmation, such as a
    // deployment description that removes nodes.
    #[error("upgrade aborted: {0}")]
    Declined(String),
    // Substitution occurs when the deployment description still carries
    // placeholders after every known parameter was applied.
    #[error("unresolved parameters in {path}: {}", .unresolved.join(", "))]
    Substitution { path: PathBuf, unresolved: Vec<String> },
    // Xml occurs when a deployment description cannot be parsed.
    #[error("invalid deployment description {path}: {message}")]
    Xml { path: PathBuf, message: String },
    // Parameter occurs when a site parameter file is malformed or missing
    // a value the run needs.
    #[error("{0}")]
    Parameter(String),
    // PatchFile occurs when an OS patch bundle cannot be unpacked or does
    // not carry a patch set.
    #[error("OS patch {path}: {message}")]
    PatchFile { path: PathBuf, message: String },
    // InvalidSnapshots occurs when the upgrade snapshots taken by an earlier
    // run no longer validate.
    #[error("upgrade snapshots are not valid: {0}")]
    InvalidSnapshots(String),
    // Consul occurs when the key/value store does not accept a flag change.
    #[error("consul request for {key} failed: {message}")]
    Consul { key: String, message: String },
    // Import occurs when the model engine reports a failed ISO import.
    #[error("import of {iso} failed: {message}")]
    Import { iso: PathBuf, message: String },
    // ImportTimeout occurs when the model engine stays in maintenance for
    // longer than the import is allowed.
    #[error("import of {iso} did not finish within {timeout:?}")]
    ImportTimeout { iso: PathBuf, timeout: std::time::Duration },
    // MaintenanceMode occurs when the model engine is in maintenance before
    // an import starts.
    #[error("the deployment model is in maintenance mode")]
    MaintenanceMode,
    // ResumeState occurs when --resume is given and no failed upgrade plan
    // is recorded.
    #[error("upgrade plan did not previously fail, unable to resume ({0})")]
    ResumeState(String),
    // StructuralMismatch occurs when the applied model differs from the
    // deployment description that was loaded.
    #[error("applied model {model} does not match deployment description {description}")]
    StructuralMismatch { model: String, description: String },
    // OverProvisioned occurs when the modelled VM memory does not fit the
    // blades it is placed on.
    #[error("RAM over provisioned on: {}", .nodes.join(", "))]
    OverProvisioned { nodes: Vec<String> },
    // DbGroupOffline occurs when the DPS database group is not ONLINE on any
    // system of the database cluster.
    #[error("{0} is OFFLINE on all systems in the DB cluster")]
    DbGroupOffline(String),
    // Io occurs when a local file cannot be read or written.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Litp(#[from] litp::LitpError),
    #[error(transparent)]
    Snapshot(#[from] snapshots::SnapshotError),
    #[error(transparent)]
    Storage(#[from] storage::StorageError),
    #[error(transparent)]
    Vcs(#[from] vcs::VcsError),
    #[error(transparent)]
    Mco(#[from] mco::McoError),
    #[error(transparent)]
    Bmc(#[from] bmc::BmcError),
    #[error(transparent)]
    Runtime(#[from] runtime::RuntimeError),
    #[error(transparent)]
    Model(#[from] model::ModelError),
}

impl UpgradeError {
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    pub fn parameter(message: impl Into<String>) -> Self {
        Self::Parameter(message.into())
    }

    pub fn patch(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::PatchFile {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    pub fn xml(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::Xml {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn consul(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Consul {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn is_usage(&self) -> bool {
        matches!(self, Self::Usage(_) | Self::DuplicatePatch { .. })
    }

    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Usage(_) | Self::DuplicatePatch { .. } => ExitCode::InvalidUsage,
            Self::InvalidSnapshots(_) => ExitCode::InvalidSnapshots,
            Self::ImportTimeout { .. } => ExitCode::Timeout,
            Self::MaintenanceMode => ExitCode::LitpMaintenanceMode,
            Self::DbGroupOffline(_) => ExitCode::VcsGroupOffline,
            Self::Litp(e) => e.exit_code(),
            Self::Snapshot(e) => e.exit_code(),
            Self::Storage(e) => e.exit_code(),
            Self::Vcs(e) => e.exit_code(),
            Self::Mco(e) => e.exit_code(),
            Self::Bmc(e) => e.exit_code(),
            Self::Runtime(e) => e.exit_code(),
            _ => ExitCode::Error,
        }
    }
}

pub type UpgradeResult<T> = Result<T, UpgradeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(UpgradeError::usage("bad").exit_code(), ExitCode::InvalidUsage);
        assert_eq!(
            UpgradeError::InvalidSnapshots("lvm".into()).exit_code(),
            ExitCode::InvalidSnapshots
        );
        assert_eq!(UpgradeError::MaintenanceMode.exit_code(), ExitCode::LitpMaintenanceMode);
        assert_eq!(
            UpgradeError::ImportTimeout {
                iso: "/tmp/litp.iso".into(),
                timeout: std::time::Duration::from_secs(1),
            }
            .exit_code(),
            ExitCode::Timeout
        );
        assert_eq!(UpgradeError::parameter("x").exit_code(), ExitCode::Error);
    }

    #[test]
    fn test_substitution_message_lists_keys() {
        let e = UpgradeError::Substitution {
            path: "/tmp/dd.xml".into(),
            unresolved: vec!["%%a%%".into(), "%%b%%".into()],
        };
        assert_eq!(e.to_string(), "unresolved parameters in /tmp/dd.xml: %%a%%, %%b%%");
    }
}

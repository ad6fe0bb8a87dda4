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
// Error types for the precheck engine.

use model::ExitCode;
use strum_macros::{AsRefStr, Display};
use thiserror::Error;

// The named reasons a check reports when the deployment is not fit to
// upgrade. The names are what operators grep for in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    ModelNotSynchronised,
    OpendjNotOnlineOnTwoNodes,
    OpendjPasswordUnavailable,
    OpendjReplicationFailed,
    OpendjReplNodesNotFound,
    MismatchInNumberOfOpendjEntries,
    ReplicationNotEnabledOnBothNodes,
    McIsNotZeroOnBothNodes,
    OpendjNodesDisagree,
    ElasticsearchStatusCheckFailed,
    CouldNotRetrieveElasticsearchIndices,
    BootPartitionNotWritable,
    LvmGlobalFilterCorrupted,
    LvmGlobalFilterNotInCorrectFormat,
    PhysicalVolumesChanged,
    NonMultipathedVolumesPresent,
    GrubCfgLvsMismatch,
    SanAlertCheckFailed,
    NasServerImbalance,
    IsoImageMounted,
    PluginRemovalFailed,
    PuppetTimeoutsNotApplied,
    PlanRunning,
    PuppetServicesRestartFailed,
    FallbackStatusCheckFailed,
    EnmVersionUnreadable,
    HttpsPortUnavailableOnIlo,
    OmbsBackupConfigInvalid,
}

/// One named reason a check failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    pub reason: String,
}

impl Failure {
    pub fn new(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

fn render(failures: &[Failure]) -> Vec<String> {
    failures.iter().map(|f| format!("{}: {}", f.kind, f.reason)).collect()
}

// PrecheckError covers a check that found the deployment not ready and
// anything the lower layers report while a check runs.
#[derive(Error, Debug)]
pub enum PrecheckError {
    // Check occurs when a check ran to completion and the deployment failed
    // it. Every failure is one line of the FAILED block.
    #[error("{}", render(failures).join("; "))]
    Check { failures: Vec<Failure> },
    // Usage occurs when the requested action list cannot be run.
    #[error("{0}")]
    Usage(String),
    // Io occurs when a local file the check needs cannot be read or written.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Litp(#[from] litp::LitpError),
    #[error(transparent)]
    Mco(#[from] mco::McoError),
    #[error(transparent)]
    Vcs(#[from] vcs::VcsError),
    #[error(transparent)]
    Storage(#[from] storage::StorageError),
    #[error(transparent)]
    Snapshot(#[from] snapshots::SnapshotError),
    #[error(transparent)]
    Runtime(#[from] runtime::RuntimeError),
}

impl PrecheckError {
    pub fn check(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self::Check {
            failures: vec![Failure::new(kind, reason)],
        }
    }

    pub fn failed(failures: Vec<Failure>) -> Self {
        Self::Check { failures }
    }

    pub fn checks(kind: FailureKind, reasons: Vec<String>) -> Self {
        Self::Check {
            failures: reasons.into_iter().map(|r| Failure::new(kind, r)).collect(),
        }
    }

    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// Kind of the first failure.
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            Self::Check { failures } => failures.first().map(|f| f.kind),
            _ => None,
        }
    }

    pub fn has_failure(&self, kind: FailureKind) -> bool {
        matches!(self, Self::Check { failures } if failures.iter().any(|f| f.kind == kind))
    }

    pub fn is_check_failure(&self) -> bool {
        matches!(self, Self::Check { .. })
    }

    /// Lines printed under the FAILED heading.
    pub fn reasons(&self) -> Vec<String> {
        match self {
            Self::Check { failures } => render(failures),
            other => vec![other.to_string()],
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Check { .. } if self.kind() == Some(FailureKind::PlanRunning) => ExitCode::SnapshotPlanRunning,
            Self::Usage(_) => ExitCode::InvalidUsage,
            Self::Litp(e) => e.exit_code(),
            Self::Mco(e) => e.exit_code(),
            Self::Vcs(e) => e.exit_code(),
            Self::Storage(e) => e.exit_code(),
            Self::Snapshot(e) => e.exit_code(),
            Self::Runtime(e) => e.exit_code(),
            _ => ExitCode::Error,
        }
    }
}

pub type PrecheckResult<T> = Result<T, PrecheckError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_names() {
        assert_eq!(
            FailureKind::McIsNotZeroOnBothNodes.to_string(),
            "MC_IS_NOT_ZERO_ON_BOTH_NODES"
        );
        assert_eq!(
            FailureKind::OpendjReplNodesNotFound.to_string(),
            "OPENDJ_REPL_NODES_NOT_FOUND"
        );
        assert_eq!(
            FailureKind::HttpsPortUnavailableOnIlo.as_ref(),
            "HTTPS_PORT_UNAVAILABLE_ON_ILO"
        );
    }

    #[test]
    fn test_exit_codes_and_reasons() {
        let err = PrecheckError::checks(
            FailureKind::ElasticsearchStatusCheckFailed,
            vec!["index a is yellow".into(), "index b is red".into()],
        );
        assert_eq!(err.exit_code(), ExitCode::Error);
        assert_eq!(err.reasons().len(), 2);
        assert!(err.reasons()[0].starts_with("ELASTICSEARCH_STATUS_CHECK_FAILED: "));
        assert_eq!(
            PrecheckError::check(FailureKind::PlanRunning, "plan").exit_code(),
            ExitCode::SnapshotPlanRunning
        );
        assert_eq!(PrecheckError::Usage("x".into()).exit_code(), ExitCode::InvalidUsage);
    }
}

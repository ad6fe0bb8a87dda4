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
// Error types for the snapshot coordinator.

use model::ExitCode;
use thiserror::Error;

// SnapshotError covers refused preconditions, failures of the power
// choreography and anything the tiers or the model engine report.
#[derive(Error, Debug)]
pub enum SnapshotError {
    // PlanRunning occurs when create or restore finds a plan running on the model
    // engine.
    #[error("A plan is currently running, wait for it to complete before running a snapshot create")]
    PlanRunning,
    // SnapshotsExist occurs when create finds snapshots in a tier while the
    // snapshot indicator is absent.
    #[error("Snapshots already exist in {}, run a snapshot remove first", tiers.join(", "))]
    SnapshotsExist { tiers: Vec<String> },
    // NoDeploymentSnapshot occurs when the model has no snapshot at all.
    #[error("No modeled snapshot(s) exist")]
    NoDeploymentSnapshot,
    // NamedSnapshotMissing occurs when the named model snapshot does not
    // exist.
    #[error("No modeled snapshot called '{0}' exists")]
    NamedSnapshotMissing(String),
    // DeploymentSnapshotExists occurs when a model snapshot of that name is
    // already present.
    #[error("Modeled snapshot called '{0}' already exists")]
    DeploymentSnapshotExists(String),
    // NoStorageSnapshots occurs when restore finds no storage snapshots.
    #[error("No storage snapshots exist to restore")]
    NoStorageSnapshots,
    // Usage covers an action that is not supported for the selected tiers.
    #[error("{0}")]
    Usage(String),
    // Discovery occurs when the model does not describe a storage array
    // consistently.
    #[error("Cannot build {tier} credentials from the model: {message}")]
    Discovery { tier: &'static str, message: String },
    // MissingBmc occurs when a blade has no usable BMC details.
    #[error("No BMC details found for {node}: {message}")]
    MissingBmc { node: String, message: String },
    // Power collects the nodes that failed a power transition.
    #[error("{action} failed for {}", failures.join("; "))]
    Power {
        action: &'static str,
        failures: Vec<String>,
    },
    // Service occurs when an LMS service cannot be stopped or started.
    #[error("Cannot {action} LMS service {service}: {message}")]
    Service {
        service: String,
        action: String,
        message: String,
    },
    // PuppetBusy occurs when catalog runs do not finish in time.
    #[error("Puppet catalog runs still active on {} after {timeout:?}", hosts.join(", "))]
    PuppetBusy {
        hosts: Vec<String>,
        timeout: std::time::Duration,
    },
    // Steps collects the failures of a tolerant run (remove), one entry per
    // failed step.
    #[error("{operation} failed: {}", failures.join("; "))]
    Steps {
        operation: &'static str,
        failures: Vec<String>,
    },
    #[error(transparent)]
    Storage(#[from] storage::StorageError),
    #[error(transparent)]
    Litp(#[from] litp::LitpError),
    #[error(transparent)]
    Mco(#[from] mco::McoError),
    #[error(transparent)]
    Bmc(#[from] bmc::BmcError),
    #[error(transparent)]
    Runtime(#[from] runtime::RuntimeError),
    #[error(transparent)]
    Model(#[from] model::ModelError),
}

impl SnapshotError {
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    pub fn discovery(tier: &'static str, message: impl Into<String>) -> Self {
        Self::Discovery {
            tier,
            message: message.into(),
        }
    }

    pub fn missing_bmc(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MissingBmc {
            node: node.into(),
            message: message.into(),
        }
    }

    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::PlanRunning
                | Self::SnapshotsExist { .. }
                | Self::NoDeploymentSnapshot
                | Self::NamedSnapshotMissing(_)
                | Self::NoStorageSnapshots
        )
    }

    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::PlanRunning => ExitCode::SnapshotPlanRunning,
            Self::SnapshotsExist { .. } => ExitCode::InvalidSnapshots,
            Self::NoDeploymentSnapshot | Self::NoStorageSnapshots => ExitCode::LitpNoSnapsExist,
            Self::NamedSnapshotMissing(_) => ExitCode::LitpNoNamedSnapsExist,
            Self::DeploymentSnapshotExists(_) => ExitCode::LitpSnapsExist,
            Self::Usage(_) => ExitCode::InvalidUsage,
            Self::PuppetBusy { .. } => ExitCode::Timeout,
            Self::Storage(e) => e.exit_code(),
            Self::Litp(e) => e.exit_code(),
            Self::Mco(e) => e.exit_code(),
            Self::Bmc(e) => e.exit_code(),
            Self::Runtime(e) => e.exit_code(),
            _ => ExitCode::Error,
        }
    }
}

pub type SnapshotResult<T> = Result<T, SnapshotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(SnapshotError::PlanRunning.exit_code(), ExitCode::SnapshotPlanRunning);
        assert_eq!(SnapshotError::PlanRunning.exit_code() as i32, 4);
        let exists = SnapshotError::SnapshotsExist {
            tiers: vec!["SAN".into()],
        };
        assert_eq!(exists.exit_code(), ExitCode::InvalidSnapshots);
        assert!(exists.is_precondition());
        let power = SnapshotError::Power {
            action: "Power off",
            failures: vec!["db-1: timeout".into()],
        };
        assert_eq!(power.exit_code(), ExitCode::Error);
        assert!(power.to_string().contains("db-1"));
    }
}

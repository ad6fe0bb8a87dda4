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
// Error types for the VCS control plane.

use thiserror::Error;

// VcsError covers failures of status queries and group or system
// transitions. Most variants carry their own exit code class.
#[derive(Error, Debug)]
pub enum VcsError {
    // InvalidFilter occurs when a user supplied filter is not a valid
    // regular expression.
    #[error("Invalid filter '{filter}': {source}")]
    InvalidFilter {
        filter: String,
        #[source]
        source: regex::Error,
    },
    // ClusterNotFound occurs when no modelled cluster matches the filter.
    #[error("No clusters found matching cluster filter \"{0}\"")]
    ClusterNotFound(String),
    // SystemNotFound occurs when no modelled system matches the filter.
    #[error("No systems found matching filter \"{0}\"")]
    SystemNotFound(String),
    // GroupNotFound occurs when no live group matches the filters.
    #[error("No live groups found matching any filter(s): {0}")]
    GroupNotFound(String),
    // UnmodelledGroup occurs when VCS reports a group the model does not
    // know about.
    #[error("No modeled group found called {0}")]
    UnmodelledGroup(String),
    // InvalidState is returned by verification when rows are not OK.
    #[error("Invalid VCS state: {}", rows.join("; "))]
    InvalidState { rows: Vec<String> },
    // OperationsFailed collects the per target failures of a batch
    // transition (online, offline, switch).
    #[error("{operation} failed: {}", failures.join("; "))]
    OperationsFailed {
        operation: &'static str,
        failures: Vec<String>,
        timed_out: bool,
    },
    // SystemsFrozen occurs when lock targets frozen systems.
    #[error("Cannot lock frozen system(s): {}", .0.join(", "))]
    SystemsFrozen(Vec<String>),
    // Usage covers a missing or inconsistent argument.
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Mco(#[from] mco::McoError),
    #[error(transparent)]
    Litp(#[from] litp::LitpError),
    #[error(transparent)]
    Model(#[from] model::ModelError),
    #[error(transparent)]
    Runtime(#[from] runtime::RuntimeError),
}

impl VcsError {
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ClusterNotFound(_) | Self::SystemNotFound(_) | Self::GroupNotFound(_)
        )
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState { .. } | Self::OperationsFailed { .. })
    }

    pub fn exit_code(&self) -> model::ExitCode {
        match self {
            Self::InvalidFilter { .. } | Self::Usage(_) => model::ExitCode::InvalidUsage,
            Self::ClusterNotFound(_) => model::ExitCode::VcsClusterNotFound,
            Self::SystemNotFound(_) => model::ExitCode::VcsSystemNotFound,
            Self::GroupNotFound(_) | Self::UnmodelledGroup(_) => model::ExitCode::VcsGroupNotFound,
            Self::InvalidState { .. } => model::ExitCode::InvalidVcsState,
            Self::OperationsFailed { timed_out: true, .. } => model::ExitCode::VcsOperationTimedOut,
            Self::OperationsFailed { .. } => model::ExitCode::InvalidVcsState,
            Self::SystemsFrozen(_) => model::ExitCode::VcsSystemFrozen,
            Self::Mco(e) => e.exit_code(),
            Self::Litp(e) => e.exit_code(),
            Self::Runtime(e) => e.exit_code(),
            Self::Model(_) => model::ExitCode::Error,
        }
    }
}

pub type VcsResult<T> = Result<T, VcsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            VcsError::SystemsFrozen(vec!["db-1".into()]).exit_code(),
            model::ExitCode::VcsSystemFrozen
        );
        assert_eq!(
            VcsError::ClusterNotFound("x".into()).exit_code(),
            model::ExitCode::VcsClusterNotFound
        );
        let failed = VcsError::OperationsFailed {
            operation: "online",
            failures: vec!["Timed out waiting for Grp_CS_x to go ONLINE".into()],
            timed_out: true,
        };
        assert_eq!(failed.exit_code(), model::ExitCode::VcsOperationTimedOut);
        assert!(failed.is_invalid_state());
    }
}

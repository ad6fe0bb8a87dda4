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
// Error types for the snapshot tiers.

use thiserror::Error;

use crate::tier::TierKind;

// StorageError covers every failure of a snapshot tier, from refused
// preconditions to adapter failures on the arrays themselves.
#[derive(Error, Debug)]
pub enum StorageError {
    // SnapshotsExist occurs when a create finds snapshots already present
    // in the tier.
    #[error("{tier} snapshots already exist: {}", names.join(", "))]
    SnapshotsExist { tier: TierKind, names: Vec<String> },
    // NoSnapshots occurs when an operation needs snapshots and the tier
    // has none.
    #[error("No {tier} snapshots found on the system")]
    NoSnapshots { tier: TierKind },
    // Invalid is returned by validation, one entry per problem found.
    #[error("Invalid {tier} snapshots found: {}", problems.join("; "))]
    Invalid { tier: TierKind, problems: Vec<String> },
    // Restore occurs when a snapshot cannot be restored.
    #[error("{tier} snapshot restore failed: {message}")]
    Restore { tier: TierKind, message: String },
    // NothingToSnap occurs when the deployment has nothing the tier could
    // snapshot.
    #[error("{tier}: {message}")]
    NothingToSnap { tier: TierKind, message: String },
    // ModelState occurs when the deployment model is not in a state that
    // allows snapshotting.
    #[error("Cannot snapshot, {0}")]
    ModelState(String),
    // Adapter covers failures reported by an array or NAS console.
    #[error("{tier} {operation} failed: {message}")]
    Adapter {
        tier: TierKind,
        operation: String,
        message: String,
    },
    #[error(transparent)]
    Mco(#[from] mco::McoError),
    #[error(transparent)]
    Litp(#[from] litp::LitpError),
    #[error(transparent)]
    Runtime(#[from] runtime::RuntimeError),
    #[error(transparent)]
    Model(#[from] model::ModelError),
}

impl StorageError {
    pub fn adapter(tier: TierKind, operation: impl Into<String>, message: impl ToString) -> Self {
        Self::Adapter {
            tier,
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    pub fn restore(tier: TierKind, message: impl Into<String>) -> Self {
        Self::Restore {
            tier,
            message: message.into(),
        }
    }

    pub fn tier(&self) -> Option<TierKind> {
        match self {
            Self::SnapshotsExist { tier, .. }
            | Self::NoSnapshots { tier }
            | Self::Invalid { tier, .. }
            | Self::Restore { tier, .. }
            | Self::NothingToSnap { tier, .. }
            | Self::Adapter { tier, .. } => Some(*tier),
            _ => None,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid { .. })
    }

    pub fn is_no_snapshots(&self) -> bool {
        matches!(self, Self::NoSnapshots { .. })
    }

    pub fn exit_code(&self) -> model::ExitCode {
        match self {
            Self::SnapshotsExist { .. } => model::ExitCode::LitpSnapsExist,
            Self::NoSnapshots { .. } => model::ExitCode::LitpNoSnapsExist,
            Self::Invalid { .. } => model::ExitCode::InvalidSnapshots,
            Self::Restore { .. } | Self::NothingToSnap { .. } => model::ExitCode::LitpSnapError,
            Self::Mco(e) => e.exit_code(),
            Self::Litp(e) => e.exit_code(),
            Self::Runtime(e) => e.exit_code(),
            _ => model::ExitCode::Error,
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let err = StorageError::Invalid {
            tier: TierKind::San,
            problems: vec!["LUN 12 has no snapshot".into()],
        };
        assert_eq!(err.exit_code(), model::ExitCode::InvalidSnapshots);
        assert_eq!(err.tier(), Some(TierKind::San));
        assert!(err.to_string().contains("LUN 12"));
        assert_eq!(
            StorageError::NoSnapshots { tier: TierKind::Nas }.exit_code(),
            model::ExitCode::LitpNoSnapsExist
        );
    }
}

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

//! The contract shared by every snapshot tier.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::StorageResult;

/// Tag added to every LVM snapshot taken for an upgrade.
pub const SNAPSHOT_TAG: &str = "enm_upgrade_snapshot";

/// Older releases created their snapshots with this misspelt tag, so it is
/// matched alongside [`SNAPSHOT_TAG`] wherever snapshots are looked up.
pub const LEGACY_SNAPSHOT_TAG: &str = "enm_upgarde_snapshot";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TierKind {
    LmsLvm,
    NodeLvm,
    San,
    Nas,
}

impl TierKind {
    pub fn all() -> [TierKind; 4] {
        [TierKind::LmsLvm, TierKind::NodeLvm, TierKind::San, TierKind::Nas]
    }
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TierKind::LmsLvm => "LMS LVM",
            TierKind::NodeLvm => "node LVM",
            TierKind::San => "SAN",
            TierKind::Nas => "NAS",
        })
    }
}

/// One snapshot as reported by a tier listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub tier: TierKind,
    /// Node the snapshot lives on, for node local volumes.
    pub host: Option<String>,
    /// The volume, LUN or filesystem the snapshot was taken of.
    pub target: String,
    pub name: String,
    pub created: Option<String>,
    /// Percentage of the snapshot space in use, where the tier reports it.
    pub usage: Option<f64>,
    pub state: Option<String>,
}

impl SnapshotRecord {
    pub fn new(tier: TierKind, target: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            tier,
            host: None,
            target: target.into(),
            name: name.into(),
            created: None,
            usage: None,
            state: None,
        }
    }

    pub fn on_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_created(mut self, created: impl Into<String>) -> Self {
        let created = created.into();
        if !created.is_empty() {
            self.created = Some(created);
        }
        self
    }

    pub fn with_usage(mut self, usage: Option<f64>) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }
}

/// Snapshot verbs of one storage tier. Each tier persists the list of
/// targets it snapped at create time and validates against it later.
#[async_trait]
pub trait SnapshotTier: Send + Sync + fmt::Debug {
    fn kind(&self) -> TierKind;

    /// Refuses with `SnapshotsExist` when the tier already has snapshots.
    async fn create(&self) -> StorageResult<()>;

    async fn list(&self) -> StorageResult<Vec<SnapshotRecord>>;

    /// Fails with `Invalid` listing every problem found.
    async fn validate(&self) -> StorageResult<()>;

    async fn restore(&self) -> StorageResult<()>;

    /// Removes whatever snapshots the tier still holds. Removing from an
    /// empty tier succeeds.
    async fn remove(&self) -> StorageResult<()>;

    async fn has_snapshots(&self) -> StorageResult<bool> {
        Ok(!self.list().await?.is_empty())
    }
}

/// Fails with `Invalid` when `problems` is not empty.
pub(crate) fn report_problems(tier: TierKind, problems: Vec<String>) -> StorageResult<()> {
    if problems.is_empty() {
        tracing::info!(target: "enminst::snapshots", %tier, "snapshots are valid");
        Ok(())
    } else {
        for problem in &problems {
            tracing::error!(target: "enminst::snapshots", %tier, "{problem}");
        }
        Err(crate::errors::StorageError::Invalid { tier, problems })
    }
}

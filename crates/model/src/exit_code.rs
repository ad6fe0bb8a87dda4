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

use std::fmt;

use serde::{Deserialize, Serialize};

/// Process exit codes reported by every command line surface.
///
/// The numeric values are part of the operator contract: scripts wrapping
/// the tooling match on them, so they must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum ExitCode {
    Ok = 0,
    Error = 1,
    InvalidUsage = 2,
    InvalidVcsState = 3,
    SnapshotPlanRunning = 4,
    VcsOperationTimedOut = 9,
    VcsClearState = 10,
    VcsGroupOffline = 11,
    VcsSystemNotFound = 12,
    VcsGroupNotFound = 13,
    VcsInvalidAction = 14,
    VcsSysclusterOffline = 15,
    VcsClusterNotFound = 16,
    VcsSystemFrozen = 17,
    VcsInvalidStateTransition = 20,
    LitpMaintenanceMode = 21,
    LitpNoSnapsExist = 22,
    LitpNoNamedSnapsExist = 23,
    LitpSnapsExist = 24,
    LitpSnapError = 25,
    Timeout = 41,
    Interrupted = 42,
    InvalidSnapshots = 43,
    PlanFailed = 44,
    PlanStopped = 45,
    UnknownPlanState = 46,
    PlanStartTimeout = 47,
    TeardownFunctionError = 48,
    LoadPlanFailed = 49,
    CreatePlanFailed = 50,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn is_ok(self) -> bool {
        self == ExitCode::Ok
    }

    /// The upper-case class name printed in FAILED blocks.
    pub fn name(self) -> &'static str {
        match self {
            ExitCode::Ok => "OK",
            ExitCode::Error => "ERROR",
            ExitCode::InvalidUsage => "INVALID_USAGE",
            ExitCode::InvalidVcsState => "INVALID_VCS_STATE",
            ExitCode::SnapshotPlanRunning => "PLAN_RUNNING",
            ExitCode::VcsOperationTimedOut => "VCS_OPERATION_TIMEDOUT",
            ExitCode::VcsClearState => "VCS_CLEAR_STATE",
            ExitCode::VcsGroupOffline => "VCS_GROUP_OFFLINE",
            ExitCode::VcsSystemNotFound => "VCS_SYSTEM_NOT_FOUND",
            ExitCode::VcsGroupNotFound => "VCS_GROUP_NOT_FOUND",
            ExitCode::VcsInvalidAction => "VCS_INVALID_ACTION",
            ExitCode::VcsSysclusterOffline => "VCS_SYSCLSTR_OFFLINE",
            ExitCode::VcsClusterNotFound => "VCS_CLUSTER_NOT_FOUND",
            ExitCode::VcsSystemFrozen => "VCS_SYSTEM_FROZEN",
            ExitCode::VcsInvalidStateTransition => "VCS_INVALID_STATE",
            ExitCode::LitpMaintenanceMode => "LITP_MAINT_MODE",
            ExitCode::LitpNoSnapsExist => "LITP_NO_SNAPS_EXIST",
            ExitCode::LitpNoNamedSnapsExist => "LITP_NO_NAMED_SNAPS_EXIST",
            ExitCode::LitpSnapsExist => "LITP_SNAPS_EXIST",
            ExitCode::LitpSnapError => "LITP_SNAP_ERROR",
            ExitCode::Timeout => "TIMEOUT",
            ExitCode::Interrupted => "INTERRUPTED",
            ExitCode::InvalidSnapshots => "INVALID_SNAPSHOTS",
            ExitCode::PlanFailed => "PLAN_FAILED",
            ExitCode::PlanStopped => "PLAN_STOPPED",
            ExitCode::UnknownPlanState => "UNKNOWN_PLAN_STATE",
            ExitCode::PlanStartTimeout => "PLAN_START_TIMEOUT",
            ExitCode::TeardownFunctionError => "TEARDOWN_FUNCTION_ERROR",
            ExitCode::LoadPlanFailed => "LOAD_PLAN_FAILED",
            ExitCode::CreatePlanFailed => "CREATE_PLAN_FAILED",
        }
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.code())
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        // All codes fit in a byte.
        std::process::ExitCode::from(code.code() as u8)
    }
}

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
// Error types for the deployment model client.

use std::fmt;
use std::time::Duration;

use model::ExitCode;
use serde::Deserialize;
use thiserror::Error;

/// One entry of the engine's `{"messages": [...]}` error body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LitpMessage {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub message: String,
}

impl fmt::Display for LitpMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}    {}", self.kind, self.message)
    }
}

/// Classification of an engine error response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LitpErrorKind {
    DoNothingPlan,
    InvalidLocation,
    Validation,
    Conflict,
    NotFound,
    MaintenanceMode,
    InvalidRequest,
    Unauthorized,
    Other,
}

impl LitpErrorKind {
    /// Picks the kind from the HTTP status and the typed messages. A typed
    /// message wins over the status, except that 404 is always NotFound.
    pub fn classify(status: u16, messages: &[LitpMessage]) -> Self {
        let has = |t: &str| messages.iter().any(|m| m.kind == t);
        if has("DoNothingPlanError") {
            Self::DoNothingPlan
        } else if has("ServerUnavailableError") {
            Self::MaintenanceMode
        } else if status == 404 {
            Self::NotFound
        } else if has("InvalidLocationError") {
            Self::InvalidLocation
        } else if status == 409 || messages.iter().any(|m| m.message.contains("already exists")) {
            Self::Conflict
        } else if has("ValidationError") {
            Self::Validation
        } else if status == 401 {
            Self::Unauthorized
        } else if has("InvalidRequestError") {
            Self::InvalidRequest
        } else {
            Self::Other
        }
    }
}

impl fmt::Display for LitpErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::DoNothingPlan => "DoNothingPlanError",
            Self::InvalidLocation => "InvalidLocationError",
            Self::Validation => "ValidationError",
            Self::Conflict => "Conflict",
            Self::NotFound => "NotFound",
            Self::MaintenanceMode => "ServerUnavailableError",
            Self::InvalidRequest => "InvalidRequestError",
            Self::Unauthorized => "Unauthorized",
            Self::Other => "Error",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum LitpError {
    // Api occurs when the engine answered with a non-success status.
    #[error("{method} {path} failed ({status} {kind}): {}", join_messages(.messages))]
    Api {
        method: String,
        path: String,
        status: u16,
        kind: LitpErrorKind,
        messages: Vec<LitpMessage>,
    },
    // Request occurs when the engine could not be reached at all.
    #[error("{method} {path}: request failed: {message}")]
    Request {
        method: String,
        path: String,
        message: String,
    },
    // Decode occurs when a success response has an unexpected body.
    #[error("Cannot decode response of {path}: {message}")]
    Decode { path: String, message: String },
    // Credentials occurs when the engine password cannot be read.
    #[error("Cannot read model engine credentials: {0}")]
    Credentials(String),
    // PlanFailed occurs when a monitored plan ends in the failed state.
    #[error("Plan execution failed")]
    PlanFailed,
    // PlanStopped occurs when a monitored plan is stopping or stopped.
    #[error("Plan is stopping/stopped!")]
    PlanStopped,
    // UnknownPlanState occurs when the plan reports a state we do not know.
    #[error("Unknown plan state {0}")]
    UnknownPlanState(String),
    // PlanStartTimeout occurs when a plan does not leave a waiting state.
    #[error("Timed out waiting for the plan to change from {state} state after {timeout:?}")]
    PlanStartTimeout { state: String, timeout: Duration },
    #[error(transparent)]
    Model(#[from] model::ModelError),
    #[error(transparent)]
    Runtime(#[from] runtime::RuntimeError),
}

fn join_messages(messages: &[LitpMessage]) -> String {
    messages
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl LitpError {
    pub fn api(
        method: impl Into<String>,
        path: impl Into<String>,
        status: u16,
        messages: Vec<LitpMessage>,
    ) -> Self {
        Self::Api {
            method: method.into(),
            path: path.into(),
            status,
            kind: LitpErrorKind::classify(status, &messages),
            messages,
        }
    }

    pub fn decode(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> Option<LitpErrorKind> {
        match self {
            Self::Api { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn messages(&self) -> &[LitpMessage] {
        match self {
            Self::Api { messages, .. } => messages,
            _ => &[],
        }
    }

    // Check if a plan was refused because the model has no changes.
    pub fn is_do_nothing_plan(&self) -> bool {
        self.kind() == Some(LitpErrorKind::DoNothingPlan)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self.kind(),
            Some(LitpErrorKind::NotFound) | Some(LitpErrorKind::InvalidLocation)
        )
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == Some(LitpErrorKind::Conflict)
    }

    pub fn is_maintenance_mode(&self) -> bool {
        self.kind() == Some(LitpErrorKind::MaintenanceMode)
    }

    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Api {
                kind: LitpErrorKind::MaintenanceMode,
                ..
            } => ExitCode::LitpMaintenanceMode,
            Self::PlanFailed => ExitCode::PlanFailed,
            Self::PlanStopped => ExitCode::PlanStopped,
            Self::UnknownPlanState(_) => ExitCode::UnknownPlanState,
            Self::PlanStartTimeout { .. } => ExitCode::PlanStartTimeout,
            Self::Runtime(e) => e.exit_code(),
            _ => ExitCode::Error,
        }
    }
}

pub type LitpResult<T> = Result<T, LitpError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(kind: &str, message: &str) -> LitpMessage {
        LitpMessage {
            kind: kind.into(),
            message: message.into(),
        }
    }

    #[test]
    fn test_classify() {
        let dnp = vec![msg("DoNothingPlanError", "Create plan failed: no tasks were generated")];
        assert_eq!(LitpErrorKind::classify(422, &dnp), LitpErrorKind::DoNothingPlan);
        let missing = vec![msg("InvalidLocationError", "Not found")];
        assert_eq!(LitpErrorKind::classify(404, &missing), LitpErrorKind::NotFound);
        assert_eq!(LitpErrorKind::classify(400, &missing), LitpErrorKind::InvalidLocation);
        let exists = vec![msg("ItemExistsError", "Item already exists in model: x")];
        assert_eq!(LitpErrorKind::classify(422, &exists), LitpErrorKind::Conflict);
        let maint = vec![msg("ServerUnavailableError", "LITP is in maintenance mode")];
        assert_eq!(LitpErrorKind::classify(503, &maint), LitpErrorKind::MaintenanceMode);
        assert_eq!(LitpErrorKind::classify(500, &[]), LitpErrorKind::Other);
    }

    #[test]
    fn test_exit_codes() {
        let maint = LitpError::api(
            "GET",
            "/",
            503,
            vec![msg("ServerUnavailableError", "LITP is in maintenance mode")],
        );
        assert!(maint.is_maintenance_mode());
        assert_eq!(maint.exit_code(), ExitCode::LitpMaintenanceMode);
        assert_eq!(LitpError::PlanFailed.exit_code(), ExitCode::PlanFailed);
        assert_eq!(
            LitpError::PlanStartTimeout {
                state: "initial".into(),
                timeout: Duration::from_secs(1)
            }
            .exit_code(),
            ExitCode::PlanStartTimeout
        );
    }

    #[test]
    fn test_display_joins_messages() {
        let err = LitpError::api(
            "POST",
            "/plans",
            422,
            vec![msg("ValidationError", "a"), msg("ValidationError", "b")],
        );
        assert_eq!(
            err.to_string(),
            "POST /plans failed (422 ValidationError): ValidationError    a; ValidationError    b"
        );
    }
}

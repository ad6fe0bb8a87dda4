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
// Error types for the peer executor.

use thiserror::Error;

use crate::action::AgentAction;
use crate::host_code::HostCode;

// McoError covers every way a peer call can fail once the caller has
// decided the per-host outcome is fatal.
#[derive(Error, Debug)]
pub enum McoError {
    // AgentError carries the raw reply so callers can still match on
    // vendor codes in out/err.
    #[error("{action} on {host} failed with retcode {retcode}: {detail}")]
    AgentError {
        action: AgentAction,
        host: String,
        retcode: i32,
        out: String,
        err: String,
        detail: String,
    },
    // HostError occurs when the host itself signalled a known condition
    // (unreachable engine, powered off node, wait timed out).
    #[error("{action} on {host}: {code}")]
    HostError {
        action: AgentAction,
        host: String,
        code: HostCode,
    },
    // NoReply occurs when a targeted host did not answer at all.
    #[error("No reply from {host} for {action}")]
    NoReply { action: AgentAction, host: String },
    // TransportFailure occurs when the transport could not be driven
    // (binary missing, output unparseable).
    #[error("Transport failure: {0}")]
    TransportFailure(String),
    // ParseError occurs when a successful reply has an unexpected shape.
    #[error("Cannot parse reply of {action} from {host}: {message}")]
    ParseError {
        action: AgentAction,
        host: String,
        message: String,
    },
    #[error(transparent)]
    Runtime(#[from] runtime::RuntimeError),
}

impl McoError {
    // Create a TransportFailure with a descriptive message.
    pub fn transport_failure(message: impl Into<String>) -> Self {
        Self::TransportFailure(message.into())
    }

    pub fn parse_error(
        action: AgentAction,
        host: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ParseError {
            action,
            host: host.into(),
            message: message.into(),
        }
    }

    // The vendor code carried by this error, if any.
    pub fn host_code(&self) -> Option<HostCode> {
        match self {
            Self::HostError { code, .. } => Some(code.clone()),
            Self::AgentError { out, err, .. } => HostCode::classify(out, err),
            _ => None,
        }
    }

    // Check if this error means the host could not be reached.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::NoReply { .. })
            || matches!(
                self.host_code(),
                Some(HostCode::EngineUnreachable | HostCode::NoAnswerFromNode | HostCode::Unreachable)
            )
    }

    // Check if this error is a timed out wait.
    pub fn is_wait_timeout(&self) -> bool {
        self.host_code() == Some(HostCode::WaitTimedOut)
    }

    pub fn exit_code(&self) -> model::ExitCode {
        if self.is_wait_timeout() {
            model::ExitCode::VcsOperationTimedOut
        } else {
            model::ExitCode::Error
        }
    }
}

pub type McoResult<T> = Result<T, McoError>;

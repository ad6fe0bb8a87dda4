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
// Error types for BMC access and power transitions.

use std::time::Duration;

use thiserror::Error;

use crate::adapter::PowerState;

// BmcError covers failures talking to a BMC and failures of the
// power transitions built on top of it.
#[derive(Error, Debug)]
pub enum BmcError {
    // InvalidCredentials occurs when the BMC rejects the session login.
    #[error("Invalid credentials provided for BMC {address}")]
    InvalidCredentials { address: String },
    // RetriesExhausted occurs when the BMC could not be reached after
    // every retry.
    #[error("Max number of retries exhausted talking to {address}: {message}")]
    RetriesExhausted { address: String, message: String },
    // DecompressResponse occurs when the response body cannot be decoded.
    #[error("Decompressing response from {address} failed: {message}")]
    DecompressResponse { address: String, message: String },
    // InvalidOperationForSystemState is returned by the BMC when a reset
    // asks for the state the system is already in.
    #[error("{address} rejected the operation for the current system state: {message}")]
    InvalidOperationForSystemState { address: String, message: String },
    // Http covers every other non-success status.
    #[error("{operation} on {address} failed, status:{status} : '{message}'")]
    Http {
        operation: String,
        address: String,
        status: u16,
        message: String,
    },
    // Cloud occurs when the cloud power tool fails.
    #[error("Cloud power tool failed for {address}: {message}")]
    Cloud { address: String, message: String },
    // Timeout occurs when a node does not reach the requested power
    // state in time.
    #[error("Timeout waiting for node {node} to power {target} after {timeout:?}")]
    Timeout {
        node: String,
        target: PowerState,
        timeout: Duration,
    },
    // AlreadyOn occurs when a power on is requested for a running node
    // and the caller did not allow it.
    #[error("System {node} is already powered on")]
    AlreadyOn { node: String },
    #[error("Unexpected BMC response from {address}: {message}")]
    Protocol { address: String, message: String },
    #[error(transparent)]
    Runtime(#[from] runtime::RuntimeError),
}

impl BmcError {
    pub fn http(
        operation: impl Into<String>,
        address: impl Into<String>,
        status: u16,
        message: impl Into<String>,
    ) -> Self {
        Self::Http {
            operation: operation.into(),
            address: address.into(),
            status,
            message: message.into(),
        }
    }

    pub fn protocol(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Protocol {
            address: address.into(),
            message: message.into(),
        }
    }

    // Check if the BMC refused a transition that is already in effect.
    pub fn is_invalid_for_state(&self) -> bool {
        matches!(self, Self::InvalidOperationForSystemState { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn exit_code(&self) -> model::ExitCode {
        match self {
            Self::Timeout { .. } => model::ExitCode::Timeout,
            _ => model::ExitCode::Error,
        }
    }
}

pub type BmcResult<T> = Result<T, BmcError>;

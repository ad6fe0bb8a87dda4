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

//! The peer executor facade.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::errors::{McoError, McoResult};
use crate::host_code::HostCode;
use crate::outcome::{HostData, RpcOutcome};
use crate::transport::{HostReply, McoRequest, Transport};

/// One host's classified result plus the raw reply it came from.
#[derive(Debug, Clone)]
pub struct HostResult {
    pub host: String,
    pub outcome: RpcOutcome<HostData>,
    pub raw: HostReply,
}

impl HostResult {
    pub fn into_result(self, request: &McoRequest) -> McoResult<HostData> {
        self.outcome
            .into_result(request.action, &self.host, &self.raw)
    }
}

#[derive(Debug, Clone)]
pub struct Mco {
    transport: Arc<dyn Transport>,
}

impl Mco {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Calls every targeted host and classifies each reply. A host missing
    /// from the transport's answer gets an `Unreachable` outcome.
    pub async fn call(&self, request: &McoRequest) -> McoResult<Vec<HostResult>> {
        let replies = self.transport.call(request).await?;
        Ok(Self::collect(request, replies))
    }

    // An untargeted request reports whichever hosts replied.
    fn collect(request: &McoRequest, replies: BTreeMap<String, HostReply>) -> Vec<HostResult> {
        let hosts: Vec<String> = if request.hosts.is_empty() {
            replies.keys().cloned().collect()
        } else {
            request.hosts.clone()
        };
        hosts
            .iter()
            .map(|host| {
                let raw = replies.get(host).cloned().unwrap_or_default();
                let outcome = RpcOutcome::classify(replies.get(host));
                if !outcome.is_ok() {
                    tracing::debug!(action = %request.action, host, outcome = ?outcome, "peer call did not succeed");
                }
                HostResult {
                    host: host.clone(),
                    outcome,
                    raw,
                }
            })
            .collect()
    }

    /// Calls a single host; any failure is fatal.
    pub async fn run(&self, request: &McoRequest) -> McoResult<HostData> {
        self.run_tolerant(request, &[]).await
    }

    /// Calls a single host. Vendor codes in `tolerated` are downgraded to a
    /// warning and the call is treated as successful.
    pub async fn run_tolerant(
        &self,
        request: &McoRequest,
        tolerated: &[HostCode],
    ) -> McoResult<HostData> {
        let host = request
            .hosts
            .first()
            .ok_or_else(|| McoError::transport_failure(format!("{} has no target host", request.action)))?;
        let mut results = self.call(request).await?;
        let result = results
            .pop()
            .ok_or_else(|| McoError::NoReply {
                action: request.action,
                host: host.clone(),
            })?;
        Self::tolerate(request, result, tolerated)
    }

    fn tolerate(
        request: &McoRequest,
        result: HostResult,
        tolerated: &[HostCode],
    ) -> McoResult<HostData> {
        if let RpcOutcome::TransportError(code) = &result.outcome {
            if tolerated.contains(code) {
                tracing::warn!(
                    action = %request.action,
                    host = %result.host,
                    code = %code,
                    detail = %result.raw.data.out_text().trim(),
                    "ignoring tolerated vendor code"
                );
                return Ok(HostData {
                    retcode: result.raw.data.retcode,
                    out: result.raw.data.out_text(),
                    err: result.raw.data.err.clone(),
                    structured: None,
                });
            }
        }
        result.into_result(request)
    }

    /// Calls a single host and hands back the agent payload whatever its
    /// retcode. Only transport level failures are errors.
    pub async fn run_lenient(&self, request: &McoRequest) -> McoResult<HostData> {
        let host = request
            .hosts
            .first()
            .cloned()
            .ok_or_else(|| McoError::transport_failure(format!("{} has no target host", request.action)))?;
        let result = self
            .call(request)
            .await?
            .pop()
            .ok_or_else(|| McoError::NoReply {
                action: request.action,
                host: host.clone(),
            })?;
        match result.outcome {
            RpcOutcome::Ok(data) => Ok(data),
            RpcOutcome::ApplicationError(..) | RpcOutcome::TransportError(HostCode::Other(_))
                if result.raw.errors.is_empty() =>
            {
                Ok(HostData {
                    retcode: result.raw.data.retcode,
                    out: result.raw.data.out_text(),
                    err: result.raw.data.err.clone(),
                    structured: None,
                })
            }
            outcome => outcome.into_result(request.action, &host, &result.raw),
        }
    }

    /// Calls every targeted host; all must succeed.
    pub async fn run_all(&self, request: &McoRequest) -> McoResult<BTreeMap<String, HostData>> {
        self.call(request)
            .await?
            .into_iter()
            .map(|r| {
                let host = r.host.clone();
                r.into_result(request).map(|d| (host, d))
            })
            .collect()
    }
}

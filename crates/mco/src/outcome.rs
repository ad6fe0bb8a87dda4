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

//! Classification of a single host reply.

use serde::{Deserialize, Serialize};

use crate::action::AgentAction;
use crate::errors::McoError;
use crate::host_code::HostCode;
use crate::transport::HostReply;

/// Successful agent payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HostData {
    pub retcode: i32,
    pub out: String,
    pub err: String,
    /// The `out` field when the agent returned a structured document.
    #[serde(default)]
    pub structured: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicationErrorKind {
    /// The agent ran and returned a non-zero retcode with no recognised code.
    NonZeroRetcode(i32),
    /// The transport reported errors that carry no vendor code.
    AgentErrors,
}

/// Outcome of one host's reply.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcOutcome<T> {
    Ok(T),
    /// The host signalled a known condition.
    TransportError(HostCode),
    /// The agent failed for a reason the tooling does not recognise.
    ApplicationError(ApplicationErrorKind, String),
}

impl RpcOutcome<HostData> {
    /// Classifies a reply; `None` means the host never answered.
    pub fn classify(reply: Option<&HostReply>) -> Self {
        let Some(reply) = reply else {
            return RpcOutcome::TransportError(HostCode::Unreachable);
        };
        let out = reply.data.out_text();
        if !reply.errors.is_empty() {
            let joined = reply.errors.join("; ");
            return match HostCode::classify(&joined, &reply.data.err) {
                Some(code) => RpcOutcome::TransportError(code),
                None if reply.data.retcode != 0 => {
                    RpcOutcome::ApplicationError(ApplicationErrorKind::AgentErrors, joined)
                }
                None => RpcOutcome::TransportError(HostCode::Unreachable),
            };
        }
        if reply.data.retcode != 0 {
            return match HostCode::classify(&out, &reply.data.err) {
                Some(code) => RpcOutcome::TransportError(code),
                None => {
                    let detail = if reply.data.err.trim().is_empty() {
                        out
                    } else {
                        reply.data.err.clone()
                    };
                    RpcOutcome::ApplicationError(
                        ApplicationErrorKind::NonZeroRetcode(reply.data.retcode),
                        detail.trim().to_string(),
                    )
                }
            };
        }
        let structured = match &reply.data.out {
            serde_json::Value::String(_) | serde_json::Value::Null if reply.data.extra.is_empty() => {
                None
            }
            serde_json::Value::String(_) | serde_json::Value::Null => {
                Some(serde_json::Value::Object(reply.data.extra.clone()))
            }
            other => Some(other.clone()),
        };
        RpcOutcome::Ok(HostData {
            retcode: 0,
            out,
            err: reply.data.err.clone(),
            structured,
        })
    }
}

impl<T> RpcOutcome<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, RpcOutcome::Ok(_))
    }

    pub fn ok(self) -> Option<T> {
        match self {
            RpcOutcome::Ok(v) => Some(v),
            _ => None,
        }
    }

    pub fn host_code(&self) -> Option<&HostCode> {
        match self {
            RpcOutcome::TransportError(code) => Some(code),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> RpcOutcome<U> {
        match self {
            RpcOutcome::Ok(v) => RpcOutcome::Ok(f(v)),
            RpcOutcome::TransportError(c) => RpcOutcome::TransportError(c),
            RpcOutcome::ApplicationError(k, d) => RpcOutcome::ApplicationError(k, d),
        }
    }

    /// Converts into a `Result`, keeping the raw reply in the error.
    pub fn into_result(
        self,
        action: AgentAction,
        host: &str,
        raw: &HostReply,
    ) -> Result<T, McoError> {
        match self {
            RpcOutcome::Ok(v) => Ok(v),
            RpcOutcome::TransportError(HostCode::Unreachable) if raw.errors.is_empty() => {
                Err(McoError::NoReply {
                    action,
                    host: host.to_string(),
                })
            }
            RpcOutcome::TransportError(code) => Err(McoError::HostError {
                action,
                host: host.to_string(),
                code,
            }),
            RpcOutcome::ApplicationError(kind, detail) => Err(McoError::AgentError {
                action,
                host: host.to_string(),
                retcode: match kind {
                    ApplicationErrorKind::NonZeroRetcode(rc) => rc,
                    ApplicationErrorKind::AgentErrors => raw.data.retcode,
                },
                out: raw.data.out_text(),
                err: raw.data.err.clone(),
                detail,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_success() {
        let outcome = RpcOutcome::classify(Some(&HostReply::ok("done")));
        assert_eq!(outcome.ok().unwrap().out, "done");
    }

    #[test]
    fn test_classify_missing_host() {
        assert_eq!(
            RpcOutcome::classify(None),
            RpcOutcome::TransportError(HostCode::Unreachable)
        );
    }

    #[test]
    fn test_classify_vendor_code() {
        let reply = HostReply::failed(
            1,
            "",
            "VCS ERROR V-16-1-10600 Cannot connect to VCS engine",
        );
        assert_eq!(
            RpcOutcome::classify(Some(&reply)),
            RpcOutcome::TransportError(HostCode::EngineUnreachable)
        );
    }

    #[test]
    fn test_classify_application_error() {
        let reply = HostReply::failed(2, "", "no such group");
        assert_eq!(
            RpcOutcome::classify(Some(&reply)),
            RpcOutcome::ApplicationError(
                ApplicationErrorKind::NonZeroRetcode(2),
                "no such group".to_string()
            )
        );
    }

    #[test]
    fn test_classify_structured_out() {
        let mut reply = HostReply::ok("");
        reply.data.out = serde_json::json!({"a": 1});
        let data = RpcOutcome::classify(Some(&reply)).ok().unwrap();
        assert_eq!(data.structured, Some(serde_json::json!({"a": 1})));
    }

    #[test]
    fn test_transport_errors_without_code() {
        let reply = HostReply::transport_error("execution expired");
        assert_eq!(
            RpcOutcome::classify(Some(&reply)),
            RpcOutcome::TransportError(HostCode::Unreachable)
        );
        let err = RpcOutcome::classify(Some(&reply))
            .into_result(AgentAction::HagrpList, "svc-1", &reply)
            .unwrap_err();
        assert!(err.is_unreachable());
    }
}

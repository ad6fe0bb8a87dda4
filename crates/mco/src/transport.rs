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

//! The fan-out transport contract and its `mco rpc` implementation.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use runtime::{CommandRunner, CommandSpec};
use serde::{Deserialize, Serialize};

use crate::action::AgentAction;
use crate::errors::{McoError, McoResult};

/// Extra seconds the transport waits beyond the agent side timeout.
pub const TRANSPORT_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McoRequest {
    pub action: AgentAction,
    pub hosts: Vec<String>,
    pub args: BTreeMap<String, String>,
    pub timeout: Duration,
}

impl McoRequest {
    pub fn new(action: AgentAction) -> Self {
        Self {
            action,
            hosts: Vec::new(),
            args: BTreeMap::new(),
            timeout: action.descriptor().default_timeout,
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.hosts.push(host.into());
        self
    }

    pub fn hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hosts.extend(hosts.into_iter().map(Into::into));
        self
    }

    pub fn arg(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.args.insert(key.into(), value.to_string());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Payload of a host reply.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReplyData {
    #[serde(default)]
    pub retcode: i32,
    /// Either plain text or a structured document, depending on the action.
    #[serde(default)]
    pub out: serde_json::Value,
    #[serde(default)]
    pub err: String,
    /// Fields some agents return beside `retcode/out/err`.
    #[serde(default, flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ReplyData {
    pub fn out_text(&self) -> String {
        match &self.out {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

/// One host's raw answer: transport level errors plus the agent payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HostReply {
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub data: ReplyData,
}

impl HostReply {
    pub fn ok(out: impl Into<String>) -> Self {
        Self {
            errors: Vec::new(),
            data: ReplyData {
                retcode: 0,
                out: serde_json::Value::String(out.into()),
                err: String::new(),
                extra: serde_json::Map::new(),
            },
        }
    }

    pub fn failed(retcode: i32, out: impl Into<String>, err: impl Into<String>) -> Self {
        Self {
            errors: Vec::new(),
            data: ReplyData {
                retcode,
                out: serde_json::Value::String(out.into()),
                err: err.into(),
                extra: serde_json::Map::new(),
            },
        }
    }

    pub fn structured(out: serde_json::Value) -> Self {
        Self {
            errors: Vec::new(),
            data: ReplyData {
                retcode: 0,
                out,
                ..Default::default()
            },
        }
    }

    pub fn transport_error(message: impl Into<String>) -> Self {
        Self {
            errors: vec![message.into()],
            data: ReplyData::default(),
        }
    }
}

/// Delivers a request to every target host and returns the replies keyed by
/// host. Hosts that did not answer are absent from the map.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    async fn call(&self, request: &McoRequest) -> McoResult<BTreeMap<String, HostReply>>;
}

/// Drives the `mco rpc` command line client in JSON mode.
#[derive(Debug, Clone)]
pub struct McoCliTransport {
    runner: Arc<dyn CommandRunner>,
    binary: String,
}

#[derive(Debug, Deserialize)]
struct CliReply {
    sender: String,
    #[serde(default)]
    statuscode: i32,
    #[serde(default)]
    statusmsg: String,
    #[serde(default)]
    data: ReplyData,
}

impl McoCliTransport {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            binary: "mco".to_string(),
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn command(&self, request: &McoRequest) -> CommandSpec {
        let descriptor = request.action.descriptor();
        let mut spec = CommandSpec::new(&self.binary)
            .args(["rpc", "--json", "--no-progress"])
            .arg("--timeout")
            .arg(request.timeout.as_secs().to_string());
        for host in &request.hosts {
            spec = spec.arg("-I").arg(host.clone());
        }
        spec = spec.arg(descriptor.agent.name()).arg(descriptor.method);
        for (k, v) in &request.args {
            spec = spec.arg(format!("{k}={v}"));
        }
        spec.with_timeout(request.timeout + TRANSPORT_GRACE)
    }

    pub fn parse_output(stdout: &str) -> McoResult<BTreeMap<String, HostReply>> {
        let replies: Vec<CliReply> = serde_json::from_str(stdout)
            .map_err(|e| McoError::transport_failure(format!("invalid mco output: {e}")))?;
        Ok(replies
            .into_iter()
            .map(|r| {
                let errors = if r.statuscode != 0 {
                    vec![r.statusmsg]
                } else {
                    Vec::new()
                };
                (
                    r.sender,
                    HostReply {
                        errors,
                        data: r.data,
                    },
                )
            })
            .collect())
    }
}

#[async_trait]
impl Transport for McoCliTransport {
    async fn call(&self, request: &McoRequest) -> McoResult<BTreeMap<String, HostReply>> {
        let spec = self.command(request);
        tracing::debug!(action = %request.action, hosts = ?request.hosts, "mco call");
        let output = self.runner.run(&spec).await?;
        if !output.success() && output.stdout.trim().is_empty() {
            return Err(McoError::transport_failure(format!(
                "'{}' exited with {}: {}",
                spec.command_line(),
                output.code,
                output.stderr.trim()
            )));
        }
        Self::parse_output(&output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line() {
        let transport = McoCliTransport::new(Arc::new(runtime::LocalRunner));
        let request = McoRequest::new(AgentAction::HagrpWait)
            .host("db-1")
            .arg("group_name", "Grp_CS_db_cluster_postgres")
            .arg("state", "ONLINE")
            .with_timeout(Duration::from_secs(30));
        let spec = transport.command(&request);
        assert_eq!(
            spec.command_line(),
            "mco rpc --json --no-progress --timeout 30 -I db-1 vcs_cmd_api hagrp_wait \
             group_name=Grp_CS_db_cluster_postgres state=ONLINE"
        );
        assert_eq!(spec.timeout, Duration::from_secs(35));
    }

    #[test]
    fn test_parse_output() {
        let raw = r#"[
            {"sender": "db-1", "statuscode": 0, "statusmsg": "OK",
             "data": {"retcode": 0, "out": "fine", "err": ""}},
            {"sender": "db-2", "statuscode": 1, "statusmsg": "execution expired",
             "data": {}}
        ]"#;
        let replies = McoCliTransport::parse_output(raw).unwrap();
        assert_eq!(replies["db-1"].data.out_text(), "fine");
        assert!(replies["db-1"].errors.is_empty());
        assert_eq!(replies["db-2"].errors, vec!["execution expired".to_string()]);
        assert!(McoCliTransport::parse_output("not json").is_err());
    }
}

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

//! Subprocess execution with mandatory timeouts.

use std::fmt;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::errors::{RuntimeError, RuntimeResult};

/// Default bound for commands that do not name their own timeout.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
    pub stdin: Option<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
            stdin: None,
        }
    }

    /// Splits a simple whitespace separated command line.
    pub fn shell_words(line: &str) -> Self {
        let mut parts = line.split_whitespace();
        let program = parts.next().unwrap_or_default().to_string();
        Self {
            program,
            args: parts.map(str::to_string).collect(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
            stdin: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == 0
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync + fmt::Debug {
    async fn run(&self, spec: &CommandSpec) -> RuntimeResult<CommandOutput>;

    /// Runs the command and turns a non-zero exit into an error.
    async fn run_checked(&self, spec: &CommandSpec) -> RuntimeResult<CommandOutput> {
        let output = self.run(spec).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(RuntimeError::CommandFailed {
                command: spec.command_line(),
                code: output.code,
                stderr: if output.stderr.is_empty() {
                    output.stdout
                } else {
                    output.stderr
                },
            })
        }
    }
}

/// Runs commands on the local host.
#[derive(Debug, Default, Clone)]
pub struct LocalRunner;

#[async_trait]
impl CommandRunner for LocalRunner {
    async fn run(&self, spec: &CommandSpec) -> RuntimeResult<CommandOutput> {
        tracing::debug!(command = %spec, timeout = ?spec.timeout, "executing");
        let mut child = tokio::process::Command::new(&spec.program)
            .args(&spec.args)
            .stdin(if spec.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RuntimeError::Spawn {
                command: spec.command_line(),
                source,
            })?;

        if let (Some(input), Some(mut stdin)) = (spec.stdin.as_ref(), child.stdin.take()) {
            stdin
                .write_all(input.as_bytes())
                .await
                .map_err(|source| RuntimeError::Spawn {
                    command: spec.command_line(),
                    source,
                })?;
        }

        // kill_on_drop terminates the child when the timeout drops the future
        match tokio::time::timeout(spec.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let result = CommandOutput {
                    code: output.status.code().unwrap_or(-1),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                };
                tracing::trace!(command = %spec, code = result.code, "finished");
                Ok(result)
            }
            Ok(Err(source)) => Err(RuntimeError::Spawn {
                command: spec.command_line(),
                source,
            }),
            Err(_) => {
                tracing::error!(command = %spec, timeout = ?spec.timeout, "command timed out");
                Err(RuntimeError::CommandTimeout {
                    command: spec.command_line(),
                    timeout: spec.timeout,
                })
            }
        }
    }
}

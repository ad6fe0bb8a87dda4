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

//! Scripted command runner used by tests across the workspace.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::command::{CommandOutput, CommandRunner, CommandSpec};
use crate::errors::{RuntimeError, RuntimeResult};

#[derive(Debug)]
struct Rule {
    needle: String,
    // the last response repeats once the queue is down to one entry
    responses: VecDeque<RuntimeResult<CommandOutput>>,
}

/// Answers commands by substring match on the command line. Unmatched
/// commands succeed with empty output. Every call is recorded.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, needle: impl Into<String>, output: CommandOutput) -> Self {
        self.push(needle.into(), Ok(output));
        self
    }

    pub fn on_timeout(self, needle: impl Into<String>) -> Self {
        let needle = needle.into();
        let err = RuntimeError::CommandTimeout {
            command: needle.clone(),
            timeout: std::time::Duration::from_secs(0),
        };
        self.push(needle, Err(err));
        self
    }

    fn push(&self, needle: String, response: RuntimeResult<CommandOutput>) {
        if let Ok(mut rules) = self.rules.lock() {
            match rules.iter_mut().find(|r| r.needle == needle) {
                Some(rule) => rule.responses.push_back(response),
                None => rules.push(Rule {
                    needle,
                    responses: VecDeque::from([response]),
                }),
            }
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|c| c.iter().map(CommandSpec::command_line).collect())
            .unwrap_or_default()
    }

    pub fn called(&self, needle: &str) -> bool {
        self.calls().iter().any(|c| c.contains(needle))
    }

    pub fn count(&self, needle: &str) -> usize {
        self.calls().iter().filter(|c| c.contains(needle)).count()
    }
}

fn clone_response(r: &RuntimeResult<CommandOutput>) -> RuntimeResult<CommandOutput> {
    match r {
        Ok(out) => Ok(out.clone()),
        Err(RuntimeError::CommandTimeout { command, timeout }) => Err(RuntimeError::CommandTimeout {
            command: command.clone(),
            timeout: *timeout,
        }),
        Err(other) => Err(RuntimeError::corrupt("scripted", other.to_string())),
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> RuntimeResult<CommandOutput> {
        let line = spec.command_line();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(spec.clone());
        }
        let mut rules = match self.rules.lock() {
            Ok(r) => r,
            Err(_) => return Ok(CommandOutput::default()),
        };
        match rules.iter_mut().find(|r| line.contains(&r.needle)) {
            Some(rule) if rule.responses.len() > 1 => rule
                .responses
                .pop_front()
                .unwrap_or_else(|| Ok(CommandOutput::default())),
            Some(rule) => rule
                .responses
                .front()
                .map(clone_response)
                .unwrap_or_else(|| Ok(CommandOutput::default())),
            None => Ok(CommandOutput::default()),
        }
    }
}

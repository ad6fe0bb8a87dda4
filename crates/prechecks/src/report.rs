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

//! Per check outcomes and the printed report.

use model::ExitCode;

use crate::action::PrecheckAction;
use crate::errors::PrecheckError;

/// How a check that did not fail finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Passed(String),
    /// The check does not apply to this deployment.
    Skipped(String),
}

impl CheckOutcome {
    pub fn passed(message: impl Into<String>) -> Self {
        Self::Passed(message.into())
    }

    pub fn skipped(message: impl Into<String>) -> Self {
        Self::Skipped(message.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Passed,
    Skipped,
    Failed(ExitCode),
}

/// One executed check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub action: PrecheckAction,
    pub status: CheckStatus,
    /// The outcome message, or one reason per line for a failure.
    pub lines: Vec<String>,
}

impl CheckResult {
    pub fn from_outcome(action: PrecheckAction, outcome: CheckOutcome) -> Self {
        let (status, message) = match outcome {
            CheckOutcome::Passed(m) => (CheckStatus::Passed, m),
            CheckOutcome::Skipped(m) => (CheckStatus::Skipped, m),
        };
        Self {
            action,
            status,
            lines: vec![message],
        }
    }

    pub fn from_error(action: PrecheckAction, error: &PrecheckError) -> Self {
        Self {
            action,
            status: CheckStatus::Failed(error.exit_code()),
            lines: error.reasons(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, CheckStatus::Failed(_))
    }

    /// The printed block: a single line for a pass or a skip, the FAILED
    /// heading followed by the reasons for a failure.
    pub fn render(&self) -> Vec<String> {
        match self.status {
            CheckStatus::Passed => self.lines.iter().map(|l| format!("PASSED: {l}")).collect(),
            CheckStatus::Skipped => self.lines.iter().map(|l| format!("SKIPPED: {l}")).collect(),
            CheckStatus::Failed(code) => {
                let mut block = vec![format!("FAILED: {} ({})", self.action, code.name())];
                block.extend(self.lines.iter().map(|l| format!("    {l}")));
                block
            }
        }
    }
}

/// Results of a precheck run in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrecheckReport {
    pub results: Vec<CheckResult>,
    /// Printed last when every check of a full run passed.
    pub summary: Option<String>,
}

impl PrecheckReport {
    pub fn push(&mut self, result: CheckResult) {
        self.results.push(result);
    }

    pub fn failure(&self) -> Option<&CheckResult> {
        self.results.iter().find(|r| r.is_failed())
    }

    pub fn succeeded(&self) -> bool {
        self.failure().is_none()
    }

    pub fn exit_code(&self) -> ExitCode {
        match self.failure().map(|r| &r.status) {
            Some(CheckStatus::Failed(code)) => *code,
            _ => ExitCode::Ok,
        }
    }

    pub fn lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self.results.iter().flat_map(CheckResult::render).collect();
        if let Some(summary) = &self.summary {
            lines.push(summary.clone());
        }
        lines
    }
}

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

//! Operator confirmation, injected by the entry point.

use std::io::{BufRead, Write};

/// Asks the operator to confirm a risky step.
///
/// A strong confirmation requires the literal answer `YES`; a normal one
/// accepts `y` or `yes` in any case.
pub trait Confirm: Send + Sync + std::fmt::Debug {
    fn confirm(&self, prompt: &str, strong: bool) -> bool;
}

/// Prompts on stdout and reads the answer from stdin.
#[derive(Debug, Default, Clone)]
pub struct Interactive;

impl Interactive {
    pub fn accepts(answer: &str, strong: bool) -> bool {
        let answer = answer.trim();
        if strong {
            answer == "YES"
        } else {
            matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes")
        }
    }
}

impl Confirm for Interactive {
    fn confirm(&self, prompt: &str, strong: bool) -> bool {
        let hint = if strong { "(type YES to continue)" } else { "[y/N]" };
        let mut stdout = std::io::stdout();
        if write!(stdout, "{prompt} {hint}: ").and_then(|_| stdout.flush()).is_err() {
            return false;
        }
        let mut answer = String::new();
        match std::io::stdin().lock().read_line(&mut answer) {
            Ok(_) => Self::accepts(&answer, strong),
            Err(e) => {
                tracing::warn!(error = %e, "could not read confirmation");
                false
            }
        }
    }
}

/// Non-interactive approval (`--assumeyes`).
#[derive(Debug, Default, Clone)]
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, prompt: &str, _strong: bool) -> bool {
        tracing::info!(prompt, "assuming yes");
        true
    }
}

/// Declines every prompt.
#[derive(Debug, Default, Clone)]
pub struct AssumeNo;

impl Confirm for AssumeNo {
    fn confirm(&self, prompt: &str, _strong: bool) -> bool {
        tracing::info!(prompt, "assuming no");
        false
    }
}

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

//! Blocking watch over a running plan.

use std::sync::Arc;
use std::time::Duration;

use runtime::Deadline;

use crate::api::ModelApi;
use crate::errors::{LitpError, LitpResult};
use crate::plan::{PlanState, PlanView};

const RESUME_POLL: Duration = Duration::from_secs(2);

/// Polls the plan until it reaches a terminal state, logging task
/// transitions as they happen.
///
/// Dropping the future between polls abandons the watch without touching
/// the plan; a later monitor picks up where this one left off.
#[derive(Debug, Clone)]
pub struct PlanMonitor {
    model: Arc<dyn ModelApi>,
    poll_interval: Duration,
    start_timeout: Duration,
}

impl PlanMonitor {
    pub fn new(model: Arc<dyn ModelApi>) -> Self {
        Self {
            model,
            poll_interval: Duration::from_secs(10),
            start_timeout: Duration::from_secs(300),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// How long a plan may sit in `initial` (or in `failed` after a resume
    /// request) before the monitor gives up.
    pub fn with_start_timeout(mut self, timeout: Duration) -> Self {
        self.start_timeout = timeout;
        self
    }

    fn log_begin(view: &PlanView) {
        tracing::info!(target: "enminst::litp", "{}", view.overview());
        tracing::info!(target: "enminst::litp", "RUN_PLAN BEGIN");
        for task in view.tasks.iter().filter(|t| t.state.eq_ignore_ascii_case("running")) {
            tracing::info!(target: "enminst::litp", phase = %task.phase, "{task}");
        }
    }

    fn log_failed(view: &PlanView) {
        let mut failed = view.failed_tasks().peekable();
        if failed.peek().is_none() {
            tracing::error!(target: "enminst::litp", "The plan has failed but no tasks marked as Failed!");
        } else {
            tracing::info!(target: "enminst::litp", "The plan has failed, failed tasks are:");
            for task in failed {
                tracing::info!(target: "enminst::litp", phase = %task.phase, "{task}");
            }
        }
        tracing::info!(target: "enminst::litp", "{}", view.overview());
    }

    /// Watches the plan. With `resume` set, a plan still reporting `failed`
    /// is given `start_timeout` to pick the resume request up.
    pub async fn monitor(&self, resume: bool) -> LitpResult<()> {
        let mut previous: Option<PlanView> = None;
        let mut start_wait: Option<Deadline> = None;
        let mut resume_wait: Option<Deadline> = None;
        let mut awaiting_resume = resume;

        loop {
            let view = self.model.plan_view().await?;
            let mut changed = false;
            match &previous {
                None => Self::log_begin(&view),
                Some(before) => {
                    for (task, from) in view.changes_since(before) {
                        changed = true;
                        tracing::info!(
                            target: "enminst::litp",
                            phase = %task.phase,
                            "Task: {from}>{}  Item: {}  Info: {}",
                            task.state,
                            task.item,
                            task.description
                        );
                    }
                }
            }
            let first = previous.is_none();

            match view.state {
                PlanState::Initial => {
                    let deadline = start_wait.get_or_insert_with(|| Deadline::after(self.start_timeout));
                    if deadline.expired() {
                        tracing::info!(target: "enminst::litp", "RUN_PLAN END");
                        return Err(LitpError::PlanStartTimeout {
                            state: "Initial".into(),
                            timeout: self.start_timeout,
                        });
                    }
                    tracing::info!(target: "enminst::litp", "Waiting for plan to switch from Initial state.");
                    deadline.sleep(self.poll_interval).await;
                }
                PlanState::Successful => {
                    if !first {
                        tracing::info!(target: "enminst::litp", "RUN_PLAN END");
                        tracing::info!(target: "enminst::litp", "{}", view.overview());
                    }
                    tracing::info!(target: "enminst::litp", "Plan completed successfully.");
                    return Ok(());
                }
                PlanState::Failed if awaiting_resume => {
                    let deadline = resume_wait.get_or_insert_with(|| Deadline::after(self.start_timeout));
                    if deadline.expired() {
                        tracing::info!(target: "enminst::litp", "RUN_PLAN END");
                        return Err(LitpError::PlanStartTimeout {
                            state: "Failed".into(),
                            timeout: self.start_timeout,
                        });
                    }
                    tracing::info!(target: "enminst::litp", "Waiting for plan to switch from Failed state.");
                    deadline.sleep(RESUME_POLL).await;
                }
                PlanState::Failed => {
                    tracing::info!(target: "enminst::litp", "RUN_PLAN END");
                    Self::log_failed(&view);
                    return Err(LitpError::PlanFailed);
                }
                PlanState::Running => {
                    awaiting_resume = false;
                    if changed {
                        tracing::info!(target: "enminst::litp", "{}", view.overview());
                    }
                    tokio::time::sleep(self.poll_interval).await;
                }
                PlanState::Stopping | PlanState::Stopped => {
                    tracing::info!(target: "enminst::litp", "RUN_PLAN END");
                    tracing::info!(target: "enminst::litp", "{}", view.overview());
                    return Err(LitpError::PlanStopped);
                }
                PlanState::Invalid => {
                    return Err(LitpError::UnknownPlanState(view.state.to_string()));
                }
            }
            previous = Some(view);
        }
    }
}

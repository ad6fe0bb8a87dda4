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

//! Plan states and the task view of a plan.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;

use crate::errors::{LitpError, LitpResult};

/// The only plan name the tooling creates.
pub const PLAN_NAME: &str = "plan";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlanState {
    Initial,
    Running,
    Stopping,
    Stopped,
    Failed,
    Successful,
    Invalid,
}

impl PlanState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanState::Initial => "initial",
            PlanState::Running => "running",
            PlanState::Stopping => "stopping",
            PlanState::Stopped => "stopped",
            PlanState::Failed => "failed",
            PlanState::Successful => "successful",
            PlanState::Invalid => "invalid",
        }
    }

    /// Running or stopping: the engine is still executing tasks.
    pub fn is_running(&self) -> bool {
        matches!(self, PlanState::Running | PlanState::Stopping)
    }
}

impl FromStr for PlanState {
    type Err = LitpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "initial" => Ok(PlanState::Initial),
            "running" => Ok(PlanState::Running),
            "stopping" => Ok(PlanState::Stopping),
            "stopped" => Ok(PlanState::Stopped),
            "failed" => Ok(PlanState::Failed),
            "successful" => Ok(PlanState::Successful),
            "invalid" => Ok(PlanState::Invalid),
            _ => Err(LitpError::UnknownPlanState(s.to_string())),
        }
    }
}

impl fmt::Display for PlanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for plan creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanOptions {
    /// Skip lock/unlock tasks; limited to `no_lock_clusters` when non-empty.
    pub no_lock_tasks: bool,
    pub no_lock_clusters: Vec<String>,
}

impl PlanOptions {
    pub fn no_lock_tasks(clusters: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            no_lock_tasks: true,
            no_lock_clusters: clusters.into_iter().map(Into::into).collect(),
        }
    }

    pub fn body(&self) -> Value {
        let mut body = serde_json::json!({"id": PLAN_NAME, "type": "plan"});
        if self.no_lock_tasks {
            body["no-lock-tasks"] = Value::from("True");
            if !self.no_lock_clusters.is_empty() {
                body["no-lock-tasks-list"] = Value::from(self.no_lock_clusters.clone());
            }
        }
        body
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanTask {
    pub phase: String,
    pub id: String,
    pub state: String,
    pub description: String,
    /// Model path of the item the task was generated from.
    pub item: String,
}

impl fmt::Display for PlanTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task: {}  Item: {}  Info: {}", self.state, self.item, self.description)
    }
}

/// A plan as read with full recursion: its state and every task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanView {
    pub state: PlanState,
    pub tasks: Vec<PlanTask>,
}

#[derive(Debug, Deserialize)]
struct RawNode {
    #[serde(default)]
    id: String,
    #[serde(rename = "item-type-name", default)]
    item_type: String,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    properties: BTreeMap<String, Value>,
    #[serde(rename = "_links", default)]
    links: Option<Value>,
    #[serde(rename = "_embedded", default)]
    embedded: Option<RawEmbedded>,
}

#[derive(Debug, Deserialize)]
struct RawEmbedded {
    #[serde(default)]
    item: Vec<RawNode>,
}

impl RawNode {
    fn children(&self) -> &[RawNode] {
        self.embedded.as_ref().map(|e| e.item.as_slice()).unwrap_or(&[])
    }
}

fn rel_path(links: Option<&Value>, rest_root: &str) -> String {
    let href = links
        .and_then(|l| l["rel"]["href"].as_str())
        .unwrap_or_default();
    match href.find(rest_root) {
        Some(pos) => href[pos + rest_root.len()..].to_string(),
        None => href.to_string(),
    }
}

fn collect_tasks(node: &RawNode, phase: Option<&str>, rest_root: &str, out: &mut Vec<PlanTask>) {
    let phase = if node.item_type == "phase" {
        Some(node.id.as_str())
    } else {
        phase
    };
    if node.item_type == "task" {
        out.push(PlanTask {
            phase: phase.unwrap_or("-").to_string(),
            id: node.id.clone(),
            state: node.state.clone().unwrap_or_default(),
            description: node.description.clone().unwrap_or_default(),
            item: rel_path(node.links.as_ref(), rest_root),
        });
    }
    for child in node.children() {
        collect_tasks(child, phase, rest_root, out);
    }
}

impl PlanView {
    /// Parses a recursively fetched plan document. The plan root carries its
    /// state either as an attribute or as a property.
    pub fn from_json(value: Value, rest_root: &str) -> LitpResult<Self> {
        let root: RawNode = serde_json::from_value(value)
            .map_err(|e| LitpError::decode(format!("/plans/{PLAN_NAME}"), e.to_string()))?;
        let raw_state = root
            .state
            .clone()
            .or_else(|| root.properties.get("state").and_then(|v| v.as_str()).map(str::to_string))
            .ok_or_else(|| LitpError::decode(format!("/plans/{PLAN_NAME}"), "plan without state"))?;
        let mut tasks = Vec::new();
        collect_tasks(&root, None, rest_root, &mut tasks);
        Ok(Self {
            state: raw_state.parse()?,
            tasks,
        })
    }

    pub fn state_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for task in &self.tasks {
            *counts.entry(task.state.as_str()).or_insert(0) += 1;
        }
        counts
    }

    /// Phases that hold at least one running task, numerically sorted.
    pub fn active_phases(&self) -> Vec<u32> {
        let mut phases: Vec<u32> = self
            .tasks
            .iter()
            .filter(|t| t.state.eq_ignore_ascii_case("running"))
            .filter_map(|t| t.phase.parse().ok())
            .collect();
        phases.sort_unstable();
        phases.dedup();
        phases
    }

    pub fn failed_tasks(&self) -> impl Iterator<Item = &PlanTask> {
        self.tasks.iter().filter(|t| t.state.eq_ignore_ascii_case("failed"))
    }

    pub fn phase_count(&self) -> usize {
        let mut phases: Vec<&str> = self.tasks.iter().map(|t| t.phase.as_str()).collect();
        phases.sort_unstable();
        phases.dedup();
        phases.len()
    }

    /// Tasks whose state differs from the same task in `previous`, with the
    /// previous state.
    pub fn changes_since<'a>(&'a self, previous: &'a PlanView) -> Vec<(&'a PlanTask, &'a str)> {
        self.tasks
            .iter()
            .filter_map(|task| {
                previous
                    .tasks
                    .iter()
                    .find(|p| p.phase == task.phase && p.id == task.id)
                    .filter(|p| p.state != task.state)
                    .map(|p| (task, p.state.as_str()))
            })
            .collect()
    }

    /// One line overview: phase totals, active phases and task counts.
    pub fn overview(&self) -> String {
        let counts = self.state_counts();
        let active = self.active_phases();
        let mut parts = vec![
            format!("Total Phases: {}", self.phase_count()),
            format!(
                "Active Phase(s): {}",
                if active.is_empty() {
                    "-".to_string()
                } else {
                    active.iter().map(u32::to_string).collect::<Vec<_>>().join(", ")
                }
            ),
            format!("PlanState: {}", self.state),
            format!("TotalTasks: {}", self.tasks.len()),
        ];
        for state in ["Initial", "Running", "Success", "Failed", "Stopped"] {
            parts.push(format!("{state}: {}", counts.get(state).copied().unwrap_or(0)));
        }
        parts.join(" | ")
    }
}

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

//! Persisted progress of an upgrade run.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{ModelError, ModelResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    InfrastructurePlan,
    UpgradePlan,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::InfrastructurePlan => "infrastructure_plan",
            Stage::UpgradePlan => "upgrade_plan",
        }
    }
}

impl FromStr for Stage {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "infrastructure_plan" => Ok(Stage::InfrastructurePlan),
            "upgrade_plan" => Ok(Stage::UpgradePlan),
            other => Err(ModelError::unknown("stage", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageState {
    Start,
    End,
    Failed,
}

impl StageState {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageState::Start => "start",
            StageState::End => "end",
            StageState::Failed => "failed",
        }
    }
}

impl FromStr for StageState {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "start" => Ok(StageState::Start),
            "end" => Ok(StageState::End),
            "failed" => Ok(StageState::Failed),
            other => Err(ModelError::unknown("stage state", other)),
        }
    }
}

/// The single `stage:state` line of the stage file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub state: StageState,
}

impl StageRecord {
    pub fn new(stage: Stage, state: StageState) -> Self {
        Self { stage, state }
    }

    pub fn parse(line: &str) -> ModelResult<Self> {
        let (stage, state) = line
            .trim()
            .split_once(':')
            .ok_or_else(|| ModelError::malformed("stage record", line))?;
        Ok(Self {
            stage: stage.parse()?,
            state: state.parse()?,
        })
    }

    pub fn is(&self, stage: Stage, state: StageState) -> bool {
        self.stage == stage && self.state == state
    }
}

impl fmt::Display for StageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.stage.as_str(), self.state.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_record() {
        let rec = StageRecord::parse("upgrade_plan:failed\n").unwrap();
        assert!(rec.is(Stage::UpgradePlan, StageState::Failed));
        assert_eq!(rec.to_string(), "upgrade_plan:failed");
        assert!(StageRecord::parse("upgrade_plan").is_err());
        assert!(StageRecord::parse("upgrade_plan:paused").is_err());
    }
}

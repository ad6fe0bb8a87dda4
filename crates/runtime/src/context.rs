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

use std::sync::Arc;

use crate::command::{CommandRunner, LocalRunner};
use crate::config::Config;
use crate::confirm::{Confirm, Interactive};
use crate::platform::Platform;
use crate::pool::WorkerPool;
use crate::state::RunStateStore;

/// Everything a component needs from its environment, created once by the
/// entry point and passed into each component constructor.
#[derive(Debug, Clone)]
pub struct RuntimeContext {
    pub config: Arc<Config>,
    pub platform: Arc<Platform>,
    pub confirm: Arc<dyn Confirm>,
    pub runner: Arc<dyn CommandRunner>,
    pub state: RunStateStore,
}

impl RuntimeContext {
    pub fn new(config: Config, platform: Platform) -> Self {
        let state = RunStateStore::new(config.runtime_dir.clone());
        Self {
            config: Arc::new(config),
            platform: Arc::new(platform),
            confirm: Arc::new(Interactive),
            runner: Arc::new(LocalRunner),
            state,
        }
    }

    pub fn with_confirm(mut self, confirm: Arc<dyn Confirm>) -> Self {
        self.confirm = confirm;
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_state(mut self, state: RunStateStore) -> Self {
        self.state = state;
        self
    }

    pub fn worker_pool(&self) -> WorkerPool {
        WorkerPool::per_cpu(self.config.worker_multiplier)
    }
}

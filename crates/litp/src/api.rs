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

//! The model engine contract consumed by the rest of the tooling.

use std::collections::BTreeMap;

use async_trait::async_trait;
use model::item::DeploymentItem;

use crate::errors::{LitpError, LitpResult};
use crate::plan::{PlanOptions, PlanState, PlanView};

/// Path fragment the engine prefixes to every item link.
pub const REST_ROOT: &str = "/litp/rest/v1";

pub type Properties = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaintenanceStatus {
    pub enabled: bool,
    pub status: Option<String>,
}

/// Verbs of the deployment model engine.
///
/// [`crate::LitpClient`] talks to the real engine over REST;
/// [`crate::testing::FakeModel`] keeps a tree in memory for tests.
#[async_trait]
pub trait ModelApi: Send + Sync + std::fmt::Debug {
    /// The item at `path` with its direct children.
    async fn get(&self, path: &str) -> LitpResult<DeploymentItem>;

    /// The item at `path` with every descendant.
    async fn get_tree(&self, path: &str) -> LitpResult<DeploymentItem>;

    async fn create(
        &self,
        parent: &str,
        id: &str,
        item_type: &str,
        properties: &Properties,
    ) -> LitpResult<String>;

    async fn inherit(&self, path: &str, source: &str, properties: &Properties) -> LitpResult<()>;

    async fn update(&self, path: &str, properties: &Properties) -> LitpResult<()>;

    /// Removes one property. Returns false when the item or property is absent.
    async fn delete_property(&self, path: &str, name: &str) -> LitpResult<bool>;

    /// Removes an item. Returns false when it does not exist.
    async fn delete_path(&self, path: &str) -> LitpResult<bool>;

    /// Marks the item (or everything below it) for a package upgrade.
    async fn upgrade(&self, path: &str) -> LitpResult<()>;

    async fn load_xml(&self, parent: &str, document: &str, merge: bool) -> LitpResult<()>;

    async fn export_xml(&self, path: &str) -> LitpResult<String>;

    async fn create_plan(&self, options: &PlanOptions) -> LitpResult<()>;

    async fn set_plan_state(&self, state: PlanState, resume: bool) -> LitpResult<()>;

    async fn delete_plan(&self) -> LitpResult<()>;

    /// State of the current plan, `None` when no plan exists.
    async fn plan_state(&self) -> LitpResult<Option<PlanState>>;

    async fn plan_view(&self) -> LitpResult<PlanView>;

    async fn create_snapshot(&self, name: &str) -> LitpResult<()>;

    async fn remove_snapshot(&self, name: &str, force: bool) -> LitpResult<()>;

    async fn restore_snapshot(&self, name: &str, force: bool) -> LitpResult<()>;

    async fn list_snapshots(&self) -> LitpResult<Vec<String>>;

    /// Rolls the model back to its last applied state.
    async fn restore_model(&self) -> LitpResult<()>;

    async fn maintenance(&self) -> LitpResult<MaintenanceStatus>;

    async fn disable_maintenance_mode(&self) -> LitpResult<()>;

    async fn get_children(&self, path: &str) -> LitpResult<Vec<DeploymentItem>> {
        Ok(self.get(path).await?.children)
    }

    async fn exists(&self, path: &str) -> LitpResult<bool> {
        match self.get(path).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn run_plan(&self, resume: bool) -> LitpResult<()> {
        tracing::info!(target: "enminst::litp", resume, "litp run_plan");
        self.set_plan_state(PlanState::Running, resume).await
    }

    async fn stop_plan(&self) -> LitpResult<()> {
        tracing::info!(target: "enminst::litp", "litp stop_plan");
        self.set_plan_state(PlanState::Stopped, false).await
    }

    async fn is_plan_running(&self) -> LitpResult<bool> {
        Ok(self.plan_state().await?.is_some_and(|s| s.is_running()))
    }

    async fn is_in_maintenance_mode(&self) -> LitpResult<bool> {
        Ok(self.maintenance().await?.enabled)
    }

    /// Creates the plan, treating "no tasks generated" as success. Returns
    /// whether a plan now exists.
    async fn create_plan_if_needed(&self, options: &PlanOptions) -> LitpResult<bool> {
        match self.create_plan(options).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_do_nothing_plan() => {
                tracing::info!(target: "enminst::litp", "no tasks were generated, model is in sync");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

/// Fails with a Conflict error unless `path` is free.
pub(crate) fn conflict(path: &str) -> LitpError {
    LitpError::api(
        "POST",
        path,
        409,
        vec![crate::errors::LitpMessage {
            kind: "ItemExistsError".into(),
            message: format!("Path {path} already exists"),
        }],
    )
}

pub(crate) fn not_found(method: &str, path: &str) -> LitpError {
    LitpError::api(
        method,
        path,
        404,
        vec![crate::errors::LitpMessage {
            kind: "InvalidLocationError".into(),
            message: "Not found".into(),
        }],
    )
}

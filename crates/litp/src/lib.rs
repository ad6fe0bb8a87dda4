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

//! Client for the LITP deployment model engine.
//!
//! [`ModelApi`] is the contract the rest of the tooling programs against.
//! [`LitpClient`] implements it over the engine's REST interface;
//! [`testing::FakeModel`] keeps a tree in memory. [`PlanMonitor`] watches a
//! running plan and [`tree`] holds read helpers over the deployment tree.
//! [`crypt`] reads passwords out of the engine's encrypted password store.

pub mod api;
pub mod client;
pub mod crypt;
pub mod errors;
pub mod monitor;
pub mod plan;
pub mod testing;
pub mod tree;

pub use api::{MaintenanceStatus, ModelApi, Properties, REST_ROOT};
pub use client::LitpClient;
pub use crypt::{LitpPasswordStore, PasswordStore};
pub use errors::{LitpError, LitpErrorKind, LitpMessage, LitpResult};
pub use monitor::PlanMonitor;
pub use plan::{PLAN_NAME, PlanOptions, PlanState, PlanTask, PlanView};

/// Builds a property map from literal pairs.
pub fn props<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Properties {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

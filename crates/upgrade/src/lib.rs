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

//! Upgrade orchestration for an ENM deployment.
//!
//! [`UpgradeOrchestrator`] drives a run from argument validation to the post
//! upgrade housekeeping. The modules below hold the individual steps: OS
//! patching of the management server, ISO imports, deployment description
//! handling, model changes and the gossip router migration.

pub mod args;
pub mod dbgroups;
pub mod errors;
pub mod gossip;
pub mod hardware;
pub mod iso;
pub mod keys;
pub mod model_update;
pub mod orchestrator;
pub mod patching;
pub mod paths;
pub mod post;
pub mod sed;
pub mod site_sync;
pub mod xml;

pub use args::UpgradeArgs;
pub use errors::{UpgradeError, UpgradeResult};
pub use gossip::{ConsulClient, GossipTimings};
pub use hardware::{BladeUsage, USAGE_HEADERS};
pub use orchestrator::{UpgradeOrchestrator, UpgradeOutcome};
pub use paths::UpgradePaths;
pub use xml::DeploymentDescription;

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

//! Upgrade prerequisite checks.
//!
//! Each [`PrecheckAction`] inspects one aspect of the deployment: the
//! model, the directory and search services, the storage layout of the
//! nodes and files on the management server. Some checks also repair what
//! they find, after asking the operator where a reboot or unmount is
//! involved. [`PrecheckEngine::run`] executes the requested actions in
//! order and stops at the first failure.

pub mod action;
pub mod checks;
pub mod engine;
pub mod errors;
pub mod locations;
pub mod properties;
pub mod report;

pub use action::{ActionPlan, PrecheckAction, resolve};
pub use engine::{ALL_PASSED, PrecheckEngine, RebootTimings};
pub use errors::{Failure, FailureKind, PrecheckError, PrecheckResult};
pub use locations::{Locations, PuppetTimeoutFiles};
pub use report::{CheckOutcome, CheckResult, CheckStatus, PrecheckReport};

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

//! Process plumbing shared by every ENM lifecycle component.
//!
//! Nothing in here reads configuration or touches the filesystem on
//! construction. The entry point loads a [`Config`], detects the
//! [`Platform`] once, builds a [`RuntimeContext`] and hands it down.

pub mod command;
pub mod config;
pub mod confirm;
pub mod context;
pub mod errors;
pub mod logging;
pub mod mount;
pub mod platform;
pub mod pool;
pub mod report;
pub mod state;
pub mod testing;
pub mod timing;

pub use command::{CommandOutput, CommandRunner, CommandSpec, LocalRunner};
pub use config::Config;
pub use confirm::{AssumeNo, AssumeYes, Confirm, Interactive};
pub use context::RuntimeContext;
pub use errors::{RuntimeError, RuntimeResult};
pub use platform::{Platform, VirtualProvider};
pub use pool::WorkerPool;
pub use state::RunStateStore;
pub use timing::Deadline;

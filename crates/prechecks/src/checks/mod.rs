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

//! The individual checks, grouped by what they inspect. Each is an
//! `impl PrecheckEngine` block dispatched from the engine.

mod grub;
mod lms;
mod model_sync;
pub mod opendj;
pub mod search;
mod san;
mod site;
mod storage;

pub use opendj::{ReplicationRow, evaluate_replication, parse_replication_rows};
pub use search::unhealthy_indices;

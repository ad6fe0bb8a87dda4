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

//! VCS control plane: status views of the clustered service groups and
//! their systems, and the verbs that move groups between states.
//!
//! The modelled deployment ([`Inventory`]) decides which groups and
//! systems exist; the live state comes from the `enminst` and `vcs_cmd_api`
//! agents on the peer nodes. [`Vcs`] joins the two.

pub mod control;
pub mod errors;
pub mod filter;
pub mod inventory;
pub mod status;

pub use control::{ActionGroup, Vcs, cluster_from_group};
pub use errors::{VcsError, VcsResult};
pub use filter::{GroupFilter, Pattern};
pub use inventory::{Inventory, ModelledCluster, ModelledGroup, VcsDefaults};
pub use status::{HistoryLine, ViewType, check_groups, check_systems};

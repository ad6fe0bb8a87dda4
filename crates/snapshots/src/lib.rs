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

//! Snapshot coordinator for ENM deployments.
//!
//! A snapshot of a deployment spans the management server's logical
//! volumes, the node local volumes, the SAN LUNs, the NAS file systems and
//! the deployment model. [`SnapshotCoordinator`] sequences those tiers for
//! create, list, validate, remove and restore; [`PowerOrder`] decides the
//! order nodes go down and come back up around a restore.

pub mod blades;
pub mod coordinator;
pub mod discovery;
pub mod errors;
pub mod power;
pub mod selector;
pub mod services;

pub use blades::BladeInventory;
pub use coordinator::{DEPLOYMENT_SNAPSHOT, SnapshotCoordinator, SnapshotListing};
pub use discovery::{SanArray, StorageDiscovery};
pub use errors::{SnapshotError, SnapshotResult};
pub use power::{NodePower, PowerOrder, PowerTimings, ShutdownOrder, StartOrder};
pub use selector::SnapType;
pub use services::{LmsServices, Neo4jHooks};

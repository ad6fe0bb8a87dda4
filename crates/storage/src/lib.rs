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

//! Snapshot primitives for the four storage tiers of an ENM deployment.
//!
//! Every tier implements [`SnapshotTier`]: the management server's own
//! logical volumes ([`LmsLvmTier`]), the node-local volumes of the peer
//! servers ([`NodeLvmTier`]), the SAN LUNs ([`SanTier`]) and the NAS file
//! systems ([`NasTier`]). Vendor access sits behind [`SanApi`] and
//! [`NasApi`] so the coordinator can be driven against fakes.

pub mod errors;
pub mod lvm;
pub mod nas;
pub mod peer;
pub mod san;
pub mod testing;
pub mod tier;

pub use errors::{StorageError, StorageResult};
pub use lvm::{LmsLvmTier, SnappableVolume};
pub use nas::{NasApi, NasConsole, NasCredentials, NasTier, NasType};
pub use peer::NodeLvmTier;
pub use san::{HostLun, SanApi, SanCredentials, SanTier, SanType, san_adapter};
pub use tier::{SnapshotRecord, SnapshotTier, TierKind};

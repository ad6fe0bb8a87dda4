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

//! Node power driver.
//!
//! [`PowerDriver`] powers blades on and off, reads their power state and
//! arranges one-shot PXE boots. It talks to the blade's BMC through a
//! [`BmcAdapter`]: [`RedfishAdapter`] for bare metal, [`CloudAdapter`] when
//! the cloud power tool is installed. [`select_adapter`] makes that choice.

pub mod adapter;
pub mod cloud;
pub mod driver;
pub mod errors;
pub mod redfish;
pub mod testing;

pub use adapter::{BmcAdapter, PowerState, ResetOutcome, ResetType, Session, select_adapter};
pub use cloud::CloudAdapter;
pub use driver::{PowerChange, PowerDriver};
pub use errors::{BmcError, BmcResult};
pub use redfish::RedfishAdapter;

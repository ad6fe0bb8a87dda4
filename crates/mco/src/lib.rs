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

//! Peer executor: typed fan-out RPC to the nodes of an ENM deployment.
//!
//! Every agent method the tooling may call is a variant of
//! [`AgentAction`]; the action table maps it to the agent and method names
//! the transport understands. Per-host replies are classified into an
//! [`RpcOutcome`], separating host-state signals ([`HostCode`]) from
//! genuine application failures.

pub mod action;
pub mod agents;
pub mod client;
pub mod errors;
pub mod host_code;
pub mod outcome;
pub mod testing;
pub mod transport;

pub use action::{Agent, AgentAction};
pub use agents::{
    EnminstAgent, FileManagerAgent, PrecheckAgent, PuppetAgent, PuppetStatus, StateRow,
    VcsCmdApiAgent,
};
pub use client::{HostResult, Mco};
pub use errors::{McoError, McoResult};
pub use host_code::HostCode;
pub use outcome::{ApplicationErrorKind, HostData, RpcOutcome};
pub use transport::{HostReply, McoCliTransport, McoRequest, ReplyData, Transport};

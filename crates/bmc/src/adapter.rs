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

//! The adapter contract every BMC backend satisfies.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use model::blade::BladeCredential;
use runtime::CommandRunner;
use serde::{Deserialize, Serialize};

use crate::cloud::CloudAdapter;
use crate::errors::BmcResult;
use crate::redfish::RedfishAdapter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerState {
    On,
    Off,
}

impl PowerState {
    pub fn from_redfish(value: &str) -> Option<PowerState> {
        match value {
            "On" | "PoweringOn" => Some(PowerState::On),
            "Off" | "PoweringOff" => Some(PowerState::Off),
            _ => None,
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PowerState::On => "on",
            PowerState::Off => "off",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetType {
    On,
    ForceOff,
}

impl ResetType {
    pub fn as_str(self) -> &'static str {
        match self {
            ResetType::On => "On",
            ResetType::ForceOff => "ForceOff",
        }
    }

    pub fn target(self) -> PowerState {
        match self {
            ResetType::On => PowerState::On,
            ResetType::ForceOff => PowerState::Off,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    Done,
    /// The BMC reported the system is already in the requested state.
    AlreadyInState,
}

/// An authenticated BMC session. Backends without sessions leave the
/// token empty.
#[derive(Clone)]
pub struct Session {
    pub credential: BladeCredential,
    pub token: Option<String>,
    pub location: Option<String>,
}

impl Session {
    pub fn new(credential: &BladeCredential) -> Self {
        Self {
            credential: credential.clone(),
            token: None,
            location: None,
        }
    }

    pub fn address(&self) -> &str {
        &self.credential.iloaddress
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("address", &self.credential.iloaddress)
            .field("location", &self.location)
            .finish()
    }
}

#[async_trait]
pub trait BmcAdapter: Send + Sync + fmt::Debug {
    async fn login(&self, credential: &BladeCredential) -> BmcResult<Session>;

    async fn logout(&self, session: &Session) -> BmcResult<()>;

    async fn power_state(&self, session: &Session) -> BmcResult<PowerState>;

    async fn reset(&self, session: &Session, reset: ResetType) -> BmcResult<ResetOutcome>;

    /// Boots from the network on the next power on only.
    async fn set_pxe_once(&self, session: &Session) -> BmcResult<()>;
}

fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::metadata(path)
            .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        path.is_file()
    }
}

/// Uses the cloud power tool when `sentinel` exists and is executable,
/// otherwise Redfish.
pub fn select_adapter(
    sentinel: &Path,
    runner: Arc<dyn CommandRunner>,
) -> BmcResult<Arc<dyn BmcAdapter>> {
    if is_executable(sentinel) {
        tracing::debug!(tool = %sentinel.display(), "using cloud power adapter");
        Ok(Arc::new(CloudAdapter::new(runner, sentinel)))
    } else {
        Ok(Arc::new(RedfishAdapter::new()?))
    }
}

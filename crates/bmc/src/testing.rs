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

//! In-memory BMC used by tests across the workspace.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use model::blade::BladeCredential;

use crate::adapter::{BmcAdapter, PowerState, ResetOutcome, ResetType, Session};
use crate::errors::{BmcError, BmcResult};

#[derive(Debug, Default)]
struct Blade {
    state: Option<PowerState>,
    // status reads left before a pending reset takes effect
    pending: Option<(PowerState, u32)>,
    pxe: bool,
}

/// Blades keyed by BMC address. A reset takes effect after `lag` status
/// reads. Unknown addresses fail login with invalid credentials.
#[derive(Debug, Default)]
pub struct FakeBmc {
    blades: Mutex<BTreeMap<String, Blade>>,
    lag: u32,
    sessions: AtomicI64,
    resets: Mutex<Vec<(String, ResetType)>>,
    broken: Mutex<BTreeSet<String>>,
}

impl FakeBmc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn powered(self, address: impl Into<String>, state: PowerState) -> Self {
        if let Ok(mut blades) = self.blades.lock() {
            blades.entry(address.into()).or_default().state = Some(state);
        }
        self
    }

    pub fn lag(mut self, reads: u32) -> Self {
        self.lag = reads;
        self
    }

    /// Makes every reset on `address` fail.
    pub fn broken(self, address: impl Into<String>) -> Self {
        if let Ok(mut broken) = self.broken.lock() {
            broken.insert(address.into());
        }
        self
    }

    pub fn state(&self, address: &str) -> Option<PowerState> {
        self.blades.lock().ok()?.get(address)?.state
    }

    pub fn resets(&self) -> Vec<(String, ResetType)> {
        self.resets.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn pxe_requested(&self, address: &str) -> bool {
        self.blades
            .lock()
            .ok()
            .and_then(|b| b.get(address).map(|b| b.pxe))
            .unwrap_or(false)
    }

    pub fn open_sessions(&self) -> i64 {
        self.sessions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BmcAdapter for FakeBmc {
    async fn login(&self, credential: &BladeCredential) -> BmcResult<Session> {
        let known = self
            .blades
            .lock()
            .map(|b| b.contains_key(&credential.iloaddress))
            .unwrap_or(false);
        if !known {
            return Err(BmcError::InvalidCredentials {
                address: credential.iloaddress.clone(),
            });
        }
        self.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Session::new(credential))
    }

    async fn logout(&self, _session: &Session) -> BmcResult<()> {
        self.sessions.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    async fn power_state(&self, session: &Session) -> BmcResult<PowerState> {
        let mut blades = self
            .blades
            .lock()
            .map_err(|_| BmcError::protocol(session.address(), "poisoned"))?;
        let blade = blades.entry(session.address().to_string()).or_default();
        if let Some((target, left)) = blade.pending {
            if left == 0 {
                blade.state = Some(target);
                blade.pending = None;
            } else {
                blade.pending = Some((target, left - 1));
            }
        }
        blade
            .state
            .ok_or_else(|| BmcError::protocol(session.address(), "no power state"))
    }

    async fn reset(&self, session: &Session, reset: ResetType) -> BmcResult<ResetOutcome> {
        let address = session.address().to_string();
        if self.broken.lock().map(|b| b.contains(&address)).unwrap_or(false) {
            return Err(BmcError::http("reset", address, 500, "broken"));
        }
        if let Ok(mut resets) = self.resets.lock() {
            resets.push((address.clone(), reset));
        }
        let mut blades = self
            .blades
            .lock()
            .map_err(|_| BmcError::protocol(&address, "poisoned"))?;
        let blade = blades.entry(address).or_default();
        if blade.state == Some(reset.target()) {
            return Ok(ResetOutcome::AlreadyInState);
        }
        if self.lag == 0 {
            blade.state = Some(reset.target());
        } else {
            blade.pending = Some((reset.target(), self.lag - 1));
        }
        Ok(ResetOutcome::Done)
    }

    async fn set_pxe_once(&self, session: &Session) -> BmcResult<()> {
        let mut blades = self
            .blades
            .lock()
            .map_err(|_| BmcError::protocol(session.address(), "poisoned"))?;
        blades.entry(session.address().to_string()).or_default().pxe = true;
        Ok(())
    }
}

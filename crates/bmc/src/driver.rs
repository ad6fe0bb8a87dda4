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

//! Power transitions built on a [`BmcAdapter`].
//!
//! Every adapter call runs inside its own session; the session is released
//! on every exit path. Power state read back from the BMC is the
//! authoritative signal for idempotence.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use model::blade::BladeCredential;
use runtime::Deadline;

use crate::adapter::{BmcAdapter, PowerState, ResetType, Session};
use crate::errors::{BmcError, BmcResult};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerChange {
    Changed,
    /// The node was already in the requested state.
    WasAlready,
}

#[derive(Debug, Clone)]
pub struct PowerDriver {
    adapter: Arc<dyn BmcAdapter>,
    poll_interval: Duration,
    settle_delay: Duration,
}

impl PowerDriver {
    pub fn new(adapter: Arc<dyn BmcAdapter>) -> Self {
        Self {
            adapter,
            poll_interval: DEFAULT_POLL_INTERVAL,
            settle_delay: Duration::from_secs(30),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Delay between the steps of a PXE boot.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    async fn with_session<T, F, Fut>(&self, credential: &BladeCredential, f: F) -> BmcResult<T>
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = BmcResult<T>>,
    {
        let session = self.adapter.login(credential).await?;
        let result = f(session.clone()).await;
        if let Err(e) = self.adapter.logout(&session).await {
            tracing::warn!(address = session.address(), error = %e, "logout failed");
        }
        result
    }

    pub async fn power_state(&self, credential: &BladeCredential) -> BmcResult<PowerState> {
        let adapter = self.adapter.clone();
        self.with_session(credential, |s| async move { adapter.power_state(&s).await })
            .await
    }

    pub async fn is_on(&self, credential: &BladeCredential) -> BmcResult<bool> {
        Ok(self.power_state(credential).await? == PowerState::On)
    }

    async fn reset(&self, credential: &BladeCredential, reset: ResetType) -> BmcResult<()> {
        let adapter = self.adapter.clone();
        let outcome = self
            .with_session(credential, |s| async move { adapter.reset(&s, reset).await })
            .await?;
        tracing::debug!(node = %credential.hostname, reset = reset.as_str(), outcome = ?outcome, "reset issued");
        Ok(())
    }

    async fn wait_for(
        &self,
        node: &str,
        credential: &BladeCredential,
        target: PowerState,
        timeout: Duration,
    ) -> BmcResult<()> {
        let deadline = Deadline::after(timeout);
        loop {
            if self.power_state(credential).await? == target {
                return Ok(());
            }
            if deadline.expired() {
                return Err(BmcError::Timeout {
                    node: node.to_string(),
                    target,
                    timeout,
                });
            }
            deadline.sleep(self.poll_interval).await;
        }
    }

    /// Forces a node off and waits for the BMC to report it off.
    pub async fn power_off(
        &self,
        node: &str,
        credential: &BladeCredential,
        timeout: Duration,
    ) -> BmcResult<PowerChange> {
        if self.power_state(credential).await? == PowerState::Off {
            tracing::info!(node, "system is already powered off");
            return Ok(PowerChange::WasAlready);
        }
        tracing::info!(node, "powering off system");
        self.reset(credential, ResetType::ForceOff).await?;
        self.wait_for(node, credential, PowerState::Off, timeout)
            .await?;
        Ok(PowerChange::Changed)
    }

    /// Powers a node on. A node that is already on is an error unless
    /// `ignore_if_on` is set.
    pub async fn power_on(
        &self,
        node: &str,
        credential: &BladeCredential,
        timeout: Duration,
        ignore_if_on: bool,
    ) -> BmcResult<PowerChange> {
        if self.power_state(credential).await? == PowerState::On {
            if !ignore_if_on {
                return Err(BmcError::AlreadyOn {
                    node: node.to_string(),
                });
            }
            tracing::info!(node, "system is already powered on");
            return Ok(PowerChange::WasAlready);
        }
        tracing::info!(node, "powering on system");
        self.reset(credential, ResetType::On).await?;
        self.wait_for(node, credential, PowerState::On, timeout)
            .await?;
        Ok(PowerChange::Changed)
    }

    /// Force off, one-shot PXE boot source, power on; each step is followed
    /// by the settle delay.
    pub async fn pxe_boot(&self, node: &str, credential: &BladeCredential) -> BmcResult<()> {
        self.reset(credential, ResetType::ForceOff).await?;
        tokio::time::sleep(self.settle_delay).await;
        let adapter = self.adapter.clone();
        self.with_session(credential, |s| async move { adapter.set_pxe_once(&s).await })
            .await?;
        tokio::time::sleep(self.settle_delay).await;
        self.reset(credential, ResetType::On).await?;
        tokio::time::sleep(self.settle_delay).await;
        tracing::info!(node, "PXE boot requested");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBmc;

    fn credential(address: &str) -> BladeCredential {
        BladeCredential {
            cluster: "svc_cluster".into(),
            hostname: "svc-1".into(),
            username: "root".into(),
            iloaddress: address.into(),
            password: "pw".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_power_off_waits_for_off() {
        let bmc = Arc::new(FakeBmc::new().powered("10.0.0.1", PowerState::On).lag(2));
        let driver = PowerDriver::new(bmc.clone());
        let change = driver
            .power_off("svc-1", &credential("10.0.0.1"), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(change, PowerChange::Changed);
        assert_eq!(bmc.state("10.0.0.1"), Some(PowerState::Off));
        assert_eq!(bmc.open_sessions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_power_off_already_off() {
        let bmc = Arc::new(FakeBmc::new().powered("10.0.0.1", PowerState::Off));
        let driver = PowerDriver::new(bmc.clone());
        let change = driver
            .power_off("svc-1", &credential("10.0.0.1"), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(change, PowerChange::WasAlready);
        assert!(bmc.resets().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_power_off_times_out() {
        let bmc = Arc::new(FakeBmc::new().powered("10.0.0.1", PowerState::On).lag(1000));
        let driver = PowerDriver::new(bmc.clone());
        let err = driver
            .power_off("svc-1", &credential("10.0.0.1"), Duration::from_secs(10))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(bmc.open_sessions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_power_on_refuses_running_node() {
        let bmc = Arc::new(FakeBmc::new().powered("10.0.0.1", PowerState::On));
        let driver = PowerDriver::new(bmc);
        let err = driver
            .power_on("svc-1", &credential("10.0.0.1"), Duration::from_secs(10), false)
            .await
            .unwrap_err();
        assert!(matches!(err, BmcError::AlreadyOn { .. }));
        let ok = driver
            .power_on("svc-1", &credential("10.0.0.1"), Duration::from_secs(10), true)
            .await
            .unwrap();
        assert_eq!(ok, PowerChange::WasAlready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pxe_boot_sequence() {
        let bmc = Arc::new(FakeBmc::new().powered("10.0.0.1", PowerState::On));
        let driver = PowerDriver::new(bmc.clone()).with_settle_delay(Duration::from_secs(30));
        driver.pxe_boot("svc-1", &credential("10.0.0.1")).await.unwrap();
        assert_eq!(
            bmc.resets(),
            vec![
                ("10.0.0.1".to_string(), ResetType::ForceOff),
                ("10.0.0.1".to_string(), ResetType::On)
            ]
        );
        assert!(bmc.pxe_requested("10.0.0.1"));
    }
}

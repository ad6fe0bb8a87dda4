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

//! Power control through the cloud power tool.
//!
//! Cloud deployments ship a Redfish compatible command line tool instead of
//! real BMCs. It is stateless, so sessions carry no token.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use model::blade::BladeCredential;
use runtime::{CommandOutput, CommandRunner, CommandSpec};

use crate::adapter::{BmcAdapter, PowerState, ResetOutcome, ResetType, Session};
use crate::errors::{BmcError, BmcResult};

#[derive(Debug, Clone)]
pub struct CloudAdapter {
    runner: Arc<dyn CommandRunner>,
    tool: PathBuf,
}

impl CloudAdapter {
    pub fn new(runner: Arc<dyn CommandRunner>, tool: &Path) -> Self {
        Self {
            runner,
            tool: tool.to_path_buf(),
        }
    }

    pub fn command(&self, credential: &BladeCredential, verb: &[&str]) -> CommandSpec {
        CommandSpec::new(self.tool.to_string_lossy())
            .arg("-r")
            .arg(credential.iloaddress.clone())
            .arg("-u")
            .arg(credential.username.clone())
            .arg("-p")
            .arg(credential.password.clone())
            .args(verb.iter().copied())
    }

    async fn run(&self, credential: &BladeCredential, verb: &[&str]) -> BmcResult<CommandOutput> {
        let output = self.runner.run(&self.command(credential, verb)).await?;
        if output.success() {
            return Ok(output);
        }
        let message = format!("{} {}", output.stdout.trim(), output.stderr.trim());
        let address = credential.iloaddress.clone();
        if message.contains("InvalidOperationForSystemState") {
            return Err(BmcError::InvalidOperationForSystemState { address, message });
        }
        if message.to_lowercase().contains("invalid credentials") {
            return Err(BmcError::InvalidCredentials { address });
        }
        Err(BmcError::Cloud {
            address,
            message: message.trim().to_string(),
        })
    }
}

/// Reads the power state from either a JSON system resource or plain text.
pub fn parse_power_state(stdout: &str) -> Option<PowerState> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(stdout) {
        if let Some(state) = value["PowerState"].as_str() {
            return PowerState::from_redfish(state);
        }
    }
    PowerState::from_redfish(stdout.trim())
}

#[async_trait]
impl BmcAdapter for CloudAdapter {
    async fn login(&self, credential: &BladeCredential) -> BmcResult<Session> {
        self.run(credential, &["login"]).await?;
        Ok(Session::new(credential))
    }

    async fn logout(&self, _session: &Session) -> BmcResult<()> {
        Ok(())
    }

    async fn power_state(&self, session: &Session) -> BmcResult<PowerState> {
        let output = self.run(&session.credential, &["status"]).await?;
        parse_power_state(&output.stdout).ok_or_else(|| {
            BmcError::protocol(
                session.address(),
                format!("unknown power state '{}'", output.stdout.trim()),
            )
        })
    }

    async fn reset(&self, session: &Session, reset: ResetType) -> BmcResult<ResetOutcome> {
        match self
            .run(&session.credential, &["reset", reset.as_str()])
            .await
        {
            Ok(_) => Ok(ResetOutcome::Done),
            Err(e) if e.is_invalid_for_state() => Ok(ResetOutcome::AlreadyInState),
            Err(e) => Err(e),
        }
    }

    async fn set_pxe_once(&self, session: &Session) -> BmcResult<()> {
        self.run(&session.credential, &["pxe-once"]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use runtime::testing::ScriptedRunner;

    use super::*;

    fn credential() -> BladeCredential {
        BladeCredential {
            cluster: "db_cluster".into(),
            hostname: "db-1".into(),
            username: "root".into(),
            iloaddress: "10.0.0.1".into(),
            password: "pw".into(),
        }
    }

    #[test]
    fn test_parse_power_state() {
        assert_eq!(parse_power_state("On\n"), Some(PowerState::On));
        assert_eq!(
            parse_power_state(r#"{"PowerState": "Off"}"#),
            Some(PowerState::Off)
        );
        assert_eq!(parse_power_state("garbage"), None);
    }

    #[tokio::test]
    async fn test_reset_already_in_state() {
        let runner = Arc::new(
            ScriptedRunner::new()
                .on("reset ForceOff", CommandOutput::failed(1, "InvalidOperationForSystemState"))
                .on("status", CommandOutput::ok("Off")),
        );
        let adapter = CloudAdapter::new(runner.clone(), Path::new("/opt/tool"));
        let session = adapter.login(&credential()).await.unwrap();
        assert_eq!(
            adapter.reset(&session, ResetType::ForceOff).await.unwrap(),
            ResetOutcome::AlreadyInState
        );
        assert_eq!(adapter.power_state(&session).await.unwrap(), PowerState::Off);
        assert!(runner.called("/opt/tool -r 10.0.0.1 -u root -p pw login"));
    }
}

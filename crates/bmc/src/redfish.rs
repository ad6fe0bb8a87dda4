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

//! Redfish BMC adapter.

use std::time::Duration;

use async_trait::async_trait;
use model::blade::BladeCredential;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tryhard::RetryFutureConfig;

use crate::adapter::{BmcAdapter, PowerState, ResetOutcome, ResetType, Session};
use crate::errors::{BmcError, BmcResult};

pub const SESSIONS_PATH: &str = "/redfish/v1/SessionService/Sessions/";
pub const SYSTEM_PATH: &str = "/redfish/v1/Systems/1";
pub const RESET_PATH: &str = "/redfish/v1/Systems/1/Actions/ComputerSystem.Reset/";
const AUTH_HEADER: &str = "X-Auth-Token";

#[derive(Debug, Clone)]
pub struct RedfishAdapter {
    client: reqwest::Client,
    scheme: String,
    retries: u32,
    retry_delay: Duration,
}

#[derive(Debug, Deserialize)]
struct SystemResource {
    #[serde(rename = "PowerState")]
    power_state: Option<String>,
}

impl RedfishAdapter {
    pub fn new() -> BmcResult<Self> {
        // BMCs present self-signed certificates
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| BmcError::protocol("-", format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            scheme: "https".to_string(),
            retries: 2,
            retry_delay: Duration::from_secs(1),
        })
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn with_retries(mut self, retries: u32, delay: Duration) -> Self {
        self.retries = retries;
        self.retry_delay = delay;
        self
    }

    fn url(&self, address: &str, path: &str) -> String {
        format!("{}://{}{}", self.scheme, address, path)
    }

    // Sends with retries on connection level failures. HTTP error statuses
    // are returned to the caller untouched.
    async fn send(
        &self,
        method: Method,
        url: &str,
        address: &str,
        token: Option<&str>,
        body: Option<&serde_json::Value>,
    ) -> BmcResult<reqwest::Response> {
        let config = RetryFutureConfig::new(self.retries).exponential_backoff(self.retry_delay);
        let mut attempt = 0;
        tryhard::retry_fn(|| {
            attempt += 1;
            tracing::trace!(%method, url, attempt, "redfish request");
            let mut request = self.client.request(method.clone(), url);
            if let Some(token) = token {
                request = request.header(AUTH_HEADER, token);
            }
            if let Some(body) = body {
                request = request.json(body);
            }
            request.send()
        })
        .with_config(config)
        .await
        .map_err(|e| {
            if e.is_decode() {
                BmcError::DecompressResponse {
                    address: address.to_string(),
                    message: e.to_string(),
                }
            } else {
                BmcError::RetriesExhausted {
                    address: address.to_string(),
                    message: e.to_string(),
                }
            }
        })
    }

    async fn read_json(address: &str, response: reqwest::Response) -> BmcResult<serde_json::Value> {
        let bytes = response.bytes().await.map_err(|e| BmcError::DecompressResponse {
            address: address.to_string(),
            message: e.to_string(),
        })?;
        // some BMCs answer in ISO-8859-1
        let text = String::from_utf8_lossy(&bytes);
        serde_json::from_str(&text).map_err(|e| BmcError::protocol(address, e.to_string()))
    }

    async fn error_message(response: reqwest::Response) -> String {
        let text = response.text().await.unwrap_or_default();
        error_message_from_body(&text)
    }
}

/// The vendor message of a Redfish error body, or the raw body.
pub fn error_message_from_body(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.to_string();
    };
    let info = &value["error"]["@Message.ExtendedInfo"][0];
    info["Message"]
        .as_str()
        .or_else(|| info["MessageId"].as_str())
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl BmcAdapter for RedfishAdapter {
    async fn login(&self, credential: &BladeCredential) -> BmcResult<Session> {
        let address = credential.iloaddress.as_str();
        let body = json!({"UserName": credential.username, "Password": credential.password});
        let response = self
            .send(
                Method::POST,
                &self.url(address, SESSIONS_PATH),
                address,
                None,
                Some(&body),
            )
            .await?;
        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                tracing::error!(address, "invalid credentials provided for BMC");
                return Err(BmcError::InvalidCredentials {
                    address: address.to_string(),
                });
            }
            s if !s.is_success() => {
                let status = s.as_u16();
                return Err(BmcError::http(
                    "login",
                    address,
                    status,
                    Self::error_message(response).await,
                ));
            }
            _ => {}
        }
        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let token = header(AUTH_HEADER)
            .ok_or_else(|| BmcError::protocol(address, "session response without X-Auth-Token"))?;
        let location = header("Location");
        let mut session = Session::new(credential);
        session.token = Some(token);
        session.location = location;
        Ok(session)
    }

    // A failed logout only leaves a stale session on the BMC.
    async fn logout(&self, session: &Session) -> BmcResult<()> {
        let Some(location) = &session.location else {
            return Ok(());
        };
        let url = if location.starts_with("http") {
            location.clone()
        } else {
            self.url(session.address(), location)
        };
        match self
            .send(Method::DELETE, &url, session.address(), session.token.as_deref(), None)
            .await
        {
            Ok(r) if r.status().is_success() => {}
            Ok(r) => tracing::error!(
                address = session.address(),
                status = r.status().as_u16(),
                "log out: bad request error, invalid session resource"
            ),
            Err(e) => tracing::error!(address = session.address(), error = %e, "log out failed"),
        }
        Ok(())
    }

    async fn power_state(&self, session: &Session) -> BmcResult<PowerState> {
        let address = session.address();
        let response = self
            .send(
                Method::GET,
                &self.url(address, SYSTEM_PATH),
                address,
                session.token.as_deref(),
                None,
            )
            .await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(BmcError::http(
                "power status",
                address,
                status,
                Self::error_message(response).await,
            ));
        }
        let value = Self::read_json(address, response).await?;
        let system: SystemResource =
            serde_json::from_value(value).map_err(|e| BmcError::protocol(address, e.to_string()))?;
        let raw = system
            .power_state
            .ok_or_else(|| BmcError::protocol(address, "system resource without PowerState"))?;
        tracing::debug!(address, power_state = %raw, "get power status: success");
        PowerState::from_redfish(&raw)
            .ok_or_else(|| BmcError::protocol(address, format!("unknown PowerState '{raw}'")))
    }

    async fn reset(&self, session: &Session, reset: ResetType) -> BmcResult<ResetOutcome> {
        let address = session.address();
        let body = json!({"ResetType": reset.as_str()});
        let response = self
            .send(
                Method::POST,
                &self.url(address, RESET_PATH),
                address,
                session.token.as_deref(),
                Some(&body),
            )
            .await?;
        let status = response.status();
        if status.is_success() {
            tracing::debug!(address, reset = reset.as_str(), "power outcome: success");
            return Ok(ResetOutcome::Done);
        }
        let body = response.text().await.unwrap_or_default();
        let message = error_message_from_body(&body);
        if status == StatusCode::BAD_REQUEST && body.contains("InvalidOperationForSystemState") {
            tracing::debug!(
                address,
                reset = reset.as_str(),
                "power outcome: system is already in the requested state"
            );
            return Ok(ResetOutcome::AlreadyInState);
        }
        Err(BmcError::http(
            format!("power {}", reset.as_str()),
            address,
            status.as_u16(),
            message,
        ))
    }

    async fn set_pxe_once(&self, session: &Session) -> BmcResult<()> {
        let address = session.address();
        let body = json!({
            "Boot": {
                "BootSourceOverrideTarget": "Pxe",
                "BootSourceOverrideEnabled": "Once",
            }
        });
        let response = self
            .send(
                Method::PATCH,
                &self.url(address, SYSTEM_PATH),
                address,
                session.token.as_deref(),
                Some(&body),
            )
            .await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(BmcError::http(
                "set pxe boot",
                address,
                status,
                Self::error_message(response).await,
            ));
        }
        Ok(())
    }
}

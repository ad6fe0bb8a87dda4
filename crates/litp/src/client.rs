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

//! REST client for the deployment model engine.

use std::time::Duration;

use async_trait::async_trait;
use model::item::{DeploymentItem, HalItem};
use reqwest::{Method, StatusCode, header};
use runtime::Config;
use serde::Deserialize;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use tryhard::RetryFutureConfig;

use crate::api::{MaintenanceStatus, ModelApi, Properties, REST_ROOT, conflict};
use crate::errors::{LitpError, LitpMessage, LitpResult};
use crate::plan::{PLAN_NAME, PlanOptions, PlanState, PlanView};

const XML_ROOT: &str = "/litp/xml";
const UPGRADE_PATH: &str = "/litp/upgrade";
const MAINTENANCE_PATH: &str = "/litp/maintenance";
const RESTORE_MODEL_PATH: &str = "/litp/restore_model";
const SNAPSHOTS_PATH: &str = "/snapshots";
const CONTENT_TYPE_XML: &str = "application/xml";
const RECURSE_ALL: &str = "recurse_depth=1000";

#[derive(Debug, Clone)]
enum Body {
    Empty,
    Json(Value),
    Xml(String),
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    messages: Vec<LitpMessage>,
}

#[derive(Clone)]
pub struct LitpClient {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: Option<String>,
    retries: u32,
    retry_delay: Duration,
}

impl std::fmt::Debug for LitpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LitpClient")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl LitpClient {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: Option<String>,
    ) -> LitpResult<Self> {
        // litpd serves a self-signed certificate on the management server
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| LitpError::Request {
                method: "-".into(),
                path: "-".into(),
                message: format!("cannot build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password,
            retries: 3,
            retry_delay: Duration::from_secs(2),
        })
    }

    /// Builds a client from the run configuration, reading the password file
    /// when one is configured.
    pub fn from_config(config: &Config) -> LitpResult<Self> {
        let password = match &config.litp_password_file {
            Some(path) => Some(
                std::fs::read_to_string(path)
                    .map_err(|e| LitpError::Credentials(format!("{}: {e}", path.display())))?
                    .trim()
                    .to_string(),
            ),
            None => None,
        };
        Self::new(&config.litp_url, &config.litp_user, password)
    }

    pub fn with_retries(mut self, retries: u32, delay: Duration) -> Self {
        self.retries = retries;
        self.retry_delay = delay;
        self
    }

    fn rest(path: &str) -> String {
        format!("{REST_ROOT}{path}")
    }

    async fn request(&self, method: Method, url_path: &str, body: Body) -> LitpResult<reqwest::Response> {
        let url = format!("{}{}", self.base_url, url_path);
        tracing::debug!(target: "enminst::litp", %method, path = url_path, "HTTPS request");
        let config = RetryFutureConfig::new(self.retries).exponential_backoff(self.retry_delay);
        let response = tryhard::retry_fn(|| {
            let mut request = self
                .client
                .request(method.clone(), &url)
                .basic_auth(&self.username, self.password.as_deref());
            request = match &body {
                Body::Empty => request,
                Body::Json(v) => request.json(v),
                Body::Xml(doc) => request
                    .header(header::CONTENT_TYPE, CONTENT_TYPE_XML)
                    .body(doc.clone()),
            };
            request.send()
        })
        .with_config(config)
        .await
        .map_err(|e| LitpError::Request {
            method: method.to_string(),
            path: url_path.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        let messages = match serde_json::from_str::<ErrorBody>(&text) {
            Ok(b) if !b.messages.is_empty() => b.messages,
            _ => vec![LitpMessage {
                kind: if status == StatusCode::UNAUTHORIZED {
                    "Unauthorized".into()
                } else {
                    String::new()
                },
                message: text,
            }],
        };
        let err = LitpError::api(method.as_str(), url_path, status.as_u16(), messages);
        tracing::debug!(target: "enminst::litp", error = %err, "request failed");
        Err(err)
    }

    async fn json(&self, method: Method, url_path: &str, body: Body) -> LitpResult<Value> {
        let response = self.request(method, url_path, body).await?;
        let text = response
            .text()
            .await
            .map_err(|e| LitpError::decode(url_path, e.to_string()))?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| LitpError::decode(url_path, e.to_string()))
    }

    async fn fetch_item(&self, url_path: &str) -> LitpResult<DeploymentItem> {
        let value = self.json(Method::GET, url_path, Body::Empty).await?;
        let hal: HalItem =
            serde_json::from_value(value).map_err(|e| LitpError::decode(url_path, e.to_string()))?;
        Ok(hal.into_item(REST_ROOT)?)
    }

    async fn put_properties(&self, path: &str, properties: Value) -> LitpResult<()> {
        self.json(
            Method::PUT,
            &Self::rest(path),
            Body::Json(json!({"properties": properties})),
        )
        .await
        .map(|_| ())
    }
}

/// Properties map as a JSON object.
fn properties_json(properties: &Properties) -> Value {
    Value::Object(
        properties
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
            .collect(),
    )
}

// A unique token per upgrade request; the engine only checks that it changes.
fn upgrade_hash() -> String {
    let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Nanos, true);
    let digest = Sha256::digest(now.as_bytes());
    hex::encode(&digest[..16])
}

#[async_trait]
impl ModelApi for LitpClient {
    async fn get(&self, path: &str) -> LitpResult<DeploymentItem> {
        self.fetch_item(&Self::rest(path)).await
    }

    async fn get_tree(&self, path: &str) -> LitpResult<DeploymentItem> {
        self.fetch_item(&format!("{}?{RECURSE_ALL}", Self::rest(path)))
            .await
    }

    async fn create(
        &self,
        parent: &str,
        id: &str,
        item_type: &str,
        properties: &Properties,
    ) -> LitpResult<String> {
        let path = format!("{}/{id}", parent.trim_end_matches('/'));
        if self.exists(&path).await? {
            return Err(conflict(&path));
        }
        tracing::info!(target: "enminst::litp", path = %path, item_type, "litp create");
        let mut body = json!({"id": id, "type": item_type});
        if !properties.is_empty() {
            body["properties"] = properties_json(properties);
        }
        self.json(Method::POST, &Self::rest(parent), Body::Json(body))
            .await?;
        Ok(path)
    }

    async fn inherit(&self, path: &str, source: &str, properties: &Properties) -> LitpResult<()> {
        let (parent, id) = path
            .rsplit_once('/')
            .ok_or_else(|| LitpError::decode(path, "not an item path"))?;
        tracing::info!(target: "enminst::litp", path, source, "litp inherit");
        let mut body = json!({"id": id, "inherit": source});
        if !properties.is_empty() {
            body["properties"] = properties_json(properties);
        }
        self.json(Method::POST, &Self::rest(parent), Body::Json(body))
            .await
            .map(|_| ())
    }

    async fn update(&self, path: &str, properties: &Properties) -> LitpResult<()> {
        tracing::info!(target: "enminst::litp", path, ?properties, "litp update");
        self.put_properties(path, properties_json(properties)).await
    }

    async fn delete_property(&self, path: &str, name: &str) -> LitpResult<bool> {
        let item = match self.get(path).await {
            Ok(item) => item,
            Err(e) if e.is_not_found() => return Ok(false),
            Err(e) => return Err(e),
        };
        if item.property(name).is_none() {
            return Ok(false);
        }
        tracing::info!(target: "enminst::litp", path, property = name, "litp update -d");
        let mut cleared = serde_json::Map::new();
        cleared.insert(name.to_string(), Value::Null);
        self.put_properties(path, Value::Object(cleared)).await?;
        Ok(true)
    }

    async fn delete_path(&self, path: &str) -> LitpResult<bool> {
        if !self.exists(path).await? {
            return Ok(false);
        }
        tracing::info!(target: "enminst::litp", path, "litp remove");
        self.json(Method::DELETE, &Self::rest(path), Body::Empty)
            .await?;
        Ok(true)
    }

    async fn upgrade(&self, path: &str) -> LitpResult<()> {
        tracing::info!(target: "enminst::litp", path, "litp upgrade");
        let body = json!({"path": path, "hash": upgrade_hash()});
        self.json(Method::POST, UPGRADE_PATH, Body::Json(body))
            .await
            .map(|_| ())
    }

    async fn load_xml(&self, parent: &str, document: &str, merge: bool) -> LitpResult<()> {
        let mut url = format!("{XML_ROOT}{parent}");
        if merge {
            url.push_str("?merge=true");
        }
        tracing::info!(target: "enminst::litp", parent, merge, "litp load");
        self.request(Method::POST, &url, Body::Xml(document.trim().to_string()))
            .await
            .map(|_| ())
    }

    async fn export_xml(&self, path: &str) -> LitpResult<String> {
        let url = format!("{XML_ROOT}{path}");
        let response = self.request(Method::GET, &url, Body::Empty).await?;
        response
            .text()
            .await
            .map_err(|e| LitpError::decode(url, e.to_string()))
    }

    async fn create_plan(&self, options: &PlanOptions) -> LitpResult<()> {
        tracing::info!(target: "enminst::litp", ?options, "litp create_plan");
        self.json(Method::POST, &Self::rest("/plans"), Body::Json(options.body()))
            .await
            .map(|_| ())
    }

    async fn set_plan_state(&self, state: PlanState, resume: bool) -> LitpResult<()> {
        let mut properties = json!({"state": state.as_str()});
        if resume && state == PlanState::Running {
            properties["resume"] = Value::from("true");
        }
        self.put_properties(&format!("/plans/{PLAN_NAME}"), properties)
            .await
    }

    async fn delete_plan(&self) -> LitpResult<()> {
        tracing::info!(target: "enminst::litp", "litp remove_plan");
        self.json(Method::DELETE, &Self::rest(&format!("/plans/{PLAN_NAME}")), Body::Empty)
            .await
            .map(|_| ())
    }

    async fn plan_state(&self) -> LitpResult<Option<PlanState>> {
        let path = Self::rest(&format!("/plans/{PLAN_NAME}"));
        let value = match self.json(Method::GET, &path, Body::Empty).await {
            Ok(v) => v,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        let raw = value["properties"]["state"]
            .as_str()
            .or_else(|| value["state"].as_str())
            .ok_or_else(|| LitpError::decode(&path, "plan without state"))?;
        Ok(Some(raw.parse()?))
    }

    async fn plan_view(&self) -> LitpResult<PlanView> {
        let path = format!("{}?{RECURSE_ALL}", Self::rest(&format!("/plans/{PLAN_NAME}")));
        let value = self.json(Method::GET, &path, Body::Empty).await?;
        PlanView::from_json(value, REST_ROOT)
    }

    async fn create_snapshot(&self, name: &str) -> LitpResult<()> {
        tracing::info!(target: "enminst::litp", name, "litp create_snapshot");
        self.json(
            Method::POST,
            &Self::rest(&format!("{SNAPSHOTS_PATH}/{name}")),
            Body::Json(json!({"type": "snapshot-base"})),
        )
        .await
        .map(|_| ())
    }

    async fn remove_snapshot(&self, name: &str, force: bool) -> LitpResult<()> {
        tracing::info!(target: "enminst::litp", name, force, "litp remove_snapshot");
        self.put_properties(
            &format!("{SNAPSHOTS_PATH}/{name}"),
            json!({"action": "remove", "force": force.to_string()}),
        )
        .await
    }

    async fn restore_snapshot(&self, name: &str, force: bool) -> LitpResult<()> {
        tracing::info!(target: "enminst::litp", name, force, "litp restore_snapshot");
        self.put_properties(
            &format!("{SNAPSHOTS_PATH}/{name}"),
            json!({"action": "restore", "force": force.to_string()}),
        )
        .await
    }

    async fn list_snapshots(&self) -> LitpResult<Vec<String>> {
        Ok(self
            .get_children(SNAPSHOTS_PATH)
            .await?
            .into_iter()
            .map(|i| i.id)
            .collect())
    }

    async fn restore_model(&self) -> LitpResult<()> {
        tracing::info!(target: "enminst::litp", "litp restore_model");
        self.put_properties(RESTORE_MODEL_PATH, json!({"update_trigger": "yes"}))
            .await
    }

    async fn maintenance(&self) -> LitpResult<MaintenanceStatus> {
        let item = self.get(MAINTENANCE_PATH).await?;
        Ok(MaintenanceStatus {
            enabled: item.property("enabled") == Some("true"),
            status: item.property("status").map(str::to_string),
        })
    }

    async fn disable_maintenance_mode(&self) -> LitpResult<()> {
        tracing::info!(target: "enminst::litp", "disabling litp maintenance mode");
        self.put_properties(MAINTENANCE_PATH, json!({"enabled": "false"}))
            .await
    }
}

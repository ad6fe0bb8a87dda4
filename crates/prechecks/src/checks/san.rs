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

use std::sync::Arc;

use litp::tree;
use snapshots::StorageDiscovery;
use snapshots::discovery::STORAGE_PROVIDERS;
use storage::{SanApi, san_adapter};

use crate::engine::PrecheckEngine;
use crate::errors::{FailureKind, PrecheckError, PrecheckResult};
use crate::report::CheckOutcome;

// Unity XT NAS servers must run on their home storage processor.
const BALANCED_NAS_TYPE: &str = "unityxt";

impl PrecheckEngine {
    async fn san_api(&self) -> PrecheckResult<Option<Arc<dyn SanApi>>> {
        if let Some(san) = &self.san {
            return Ok(Some(san.clone()));
        }
        let discovery = StorageDiscovery::new(self.model.clone(), self.passwords.clone());
        Ok(discovery
            .san()
            .await?
            .map(|array| san_adapter(array.credentials, self.ctx.runner.clone())))
    }

    /// NAS server names of every Unity XT file service in the model.
    async fn unity_nas_servers(&self) -> PrecheckResult<Vec<String>> {
        let services = tree::items_by_type(self.model.as_ref(), STORAGE_PROVIDERS, "sfs-service", false).await?;
        Ok(services
            .iter()
            .filter(|s| s.property("nas_type") == Some(BALANCED_NAS_TYPE))
            .filter_map(|s| s.child("virtual_servers"))
            .flat_map(|v| v.children.iter())
            .filter_map(|v| v.property("name").map(str::to_string))
            .collect())
    }

    pub(crate) async fn san_alert_check(&self) -> PrecheckResult<CheckOutcome> {
        if let Some(skip) = self.virtual_skip() {
            return Ok(skip);
        }
        let Some(san) = self.san_api().await? else {
            return Ok(CheckOutcome::skipped("No SAN in the deployment"));
        };
        let alerts = san.critical_alerts().await?;
        if !alerts.is_empty() {
            return Err(PrecheckError::checks(FailureKind::SanAlertCheckFailed, alerts));
        }

        let nas_servers = self.unity_nas_servers().await?;
        if !nas_servers.is_empty() {
            tracing::debug!(target: "enminst::prechecks", servers = ?nas_servers, "checking NAS server placement");
            let unbalanced = san.unbalanced_nas_servers(&nas_servers).await?;
            if !unbalanced.is_empty() {
                return Err(PrecheckError::check(
                    FailureKind::NasServerImbalance,
                    format!("NAS servers not on their home storage processor: {}", unbalanced.join(", ")),
                ));
            }
        }
        Ok(CheckOutcome::passed("No critical SAN alerts"))
    }
}

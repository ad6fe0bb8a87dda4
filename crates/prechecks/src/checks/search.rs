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

use crate::engine::{DB_CLUSTER, PrecheckEngine};
use crate::errors::{FailureKind, PrecheckError, PrecheckResult};
use crate::report::CheckOutcome;

/// Names of the indices whose health is yellow or red in a
/// `_cat/indices?v` listing. A listing with nothing but its header means
/// the indices could not be read.
pub fn unhealthy_indices(listing: &str) -> PrecheckResult<Vec<String>> {
    let rows: Vec<&str> = listing.lines().filter(|l| !l.trim().is_empty()).collect();
    if rows.is_empty() || (rows.len() < 2 && rows[0].trim_start().starts_with("health ")) {
        return Err(PrecheckError::check(
            FailureKind::CouldNotRetrieveElasticsearchIndices,
            "the index listing holds no indices",
        ));
    }
    Ok(rows
        .iter()
        .filter(|row| {
            let row = row.trim().to_lowercase();
            row.starts_with("yellow ") || row.starts_with("red ")
        })
        .filter_map(|row| row.split_whitespace().nth(2).map(str::to_string))
        .collect())
}

impl PrecheckEngine {
    pub(crate) async fn elasticsearch_status_check(&self) -> PrecheckResult<CheckOutcome> {
        let instances = self.service_instances(DB_CLUSTER, Some("elasticsearch")).await?;
        let Some(online) = instances.iter().find(|g| g.is_online()) else {
            return Err(PrecheckError::check(
                FailureKind::ElasticsearchStatusCheckFailed,
                "Elasticsearch is not ONLINE on any db node",
            ));
        };
        tracing::info!(target: "enminst::prechecks", system = %online.system, "Elasticsearch is online");

        let url = format!(
            "{}/_cat/indices?v",
            self.ctx.config.elasticsearch_url.trim_end_matches('/')
        );
        let unreadable = |e: reqwest::Error| {
            PrecheckError::check(
                FailureKind::CouldNotRetrieveElasticsearchIndices,
                format!("GET {url} failed: {e}"),
            )
        };
        let listing = self
            .http
            .get(&url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(unreadable)?
            .text()
            .await
            .map_err(unreadable)?;

        let unhealthy = unhealthy_indices(&listing)?;
        if !unhealthy.is_empty() {
            return Err(PrecheckError::check(
                FailureKind::ElasticsearchStatusCheckFailed,
                format!("indices not green: {}", unhealthy.join(", ")),
            ));
        }
        Ok(CheckOutcome::passed("Elasticsearch indices are healthy"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unhealthy_indices() {
        let listing = "health status index        uuid pri rep\n\
                       green  open   enm_logs-1   abc  1   1\n\
                       yellow open   enm_logs-2   def  1   1\n\
                       RED    open   enm_audit    ghi  1   1\n";
        assert_eq!(unhealthy_indices(listing).unwrap(), vec!["enm_logs-2", "enm_audit"]);
    }

    #[test]
    fn test_header_only_listing_is_unreadable() {
        let err = unhealthy_indices("health status index uuid pri rep\n").unwrap_err();
        assert!(err.has_failure(FailureKind::CouldNotRetrieveElasticsearchIndices));
        assert!(unhealthy_indices("").is_err());
    }
}

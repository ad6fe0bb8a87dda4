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

//! Layered configuration: compiled defaults, then an optional TOML file, then
//! `ENMINST_` prefixed environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use crate::errors::RuntimeResult;

pub const DEFAULT_CONFIG_PATH: &str = "/opt/ericsson/enminst/etc/enminst.toml";
pub const ENV_PREFIX: &str = "ENMINST_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding every persisted run state file.
    pub runtime_dir: PathBuf,
    pub log_dir: PathBuf,
    pub litp_url: String,
    pub litp_user: String,
    /// File containing the model engine password; never logged.
    pub litp_password_file: Option<PathBuf>,
    pub consul_url: String,
    pub elasticsearch_url: String,
    pub snapshot_prefix: String,
    pub lvm_snap_percent: u32,
    /// Snapshot usage (percent) at or beyond which validation fails.
    pub lvm_usage_tolerance: f64,
    pub cloud_bmc_sentinel: PathBuf,
    pub neo4j_pre_snapshot_script: PathBuf,
    pub neo4j_post_remove_script: PathBuf,
    #[serde(with = "humantime_serde")]
    pub plan_poll_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub plan_start_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub power_off_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub power_settle_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub start_nodes_sleep: Duration,
    #[serde(with = "humantime_serde")]
    pub removed_blade_settle: Duration,
    #[serde(with = "humantime_serde")]
    pub puppet_wait_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub healthcheck_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub healthcheck_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub vcs_default_timeout: Duration,
    pub vcs_default_retries: u32,
    #[serde(with = "humantime_serde")]
    pub nic_wait_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub command_timeout: Duration,
    pub worker_multiplier: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            runtime_dir: PathBuf::from("/opt/ericsson/enminst/runtime"),
            log_dir: PathBuf::from("/var/log"),
            litp_url: "https://localhost:9999".to_string(),
            litp_user: "litp-admin".to_string(),
            litp_password_file: None,
            consul_url: "http://ms-1:8500/v1/kv/".to_string(),
            elasticsearch_url: "http://elasticsearch:9200".to_string(),
            snapshot_prefix: "Snapshot".to_string(),
            lvm_snap_percent: 100,
            lvm_usage_tolerance: 90.0,
            cloud_bmc_sentinel: PathBuf::from("/opt/ericsson/nms/litp/bin/redfishtool.cloud"),
            neo4j_pre_snapshot_script: PathBuf::from(
                "/opt/ericsson/enminst/bin/neo4j_pre_snapshot.sh",
            ),
            neo4j_post_remove_script: PathBuf::from(
                "/opt/ericsson/enminst/bin/neo4j_post_snapshot_remove.sh",
            ),
            plan_poll_interval: Duration::from_secs(10),
            plan_start_timeout: Duration::from_secs(300),
            power_off_timeout: Duration::from_secs(60),
            power_settle_delay: Duration::from_secs(30),
            start_nodes_sleep: Duration::from_secs(300),
            removed_blade_settle: Duration::from_secs(85),
            puppet_wait_timeout: Duration::from_secs(1800),
            healthcheck_timeout: Duration::from_secs(5400),
            healthcheck_interval: Duration::from_secs(600),
            vcs_default_timeout: Duration::from_secs(600),
            vcs_default_retries: 3,
            nic_wait_timeout: Duration::from_secs(300),
            command_timeout: Duration::from_secs(3600),
            worker_multiplier: 3,
        }
    }
}

impl Config {
    /// Loads the configuration. A missing file at the default location is
    /// not an error; an explicitly named file must exist.
    pub fn load(path: Option<&Path>) -> RuntimeResult<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        match path {
            Some(p) => figment = figment.merge(Toml::file_exact(p)),
            None => figment = figment.merge(Toml::file(DEFAULT_CONFIG_PATH)),
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX)).extract()?)
    }

    pub fn litp_rest_url(&self) -> String {
        format!("{}/litp/rest/v1", self.litp_url.trim_end_matches('/'))
    }

    pub fn log_file(&self) -> PathBuf {
        self.log_dir.join("enminst.log")
    }
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.snapshot_prefix, "Snapshot");
        assert_eq!(config.vcs_default_timeout, Duration::from_secs(600));
        assert_eq!(config.litp_rest_url(), "https://localhost:9999/litp/rest/v1");
    }

    #[test]
    fn test_file_then_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "enminst.toml",
                r#"
                    runtime_dir = "/tmp/runtime"
                    plan_poll_interval = "2s"
                    vcs_default_retries = 5
                "#,
            )?;
            jail.set_env("ENMINST_VCS_DEFAULT_RETRIES", "7");
            let config = Config::load(Some(Path::new("enminst.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.runtime_dir, PathBuf::from("/tmp/runtime"));
            assert_eq!(config.plan_poll_interval, Duration::from_secs(2));
            assert_eq!(config.vcs_default_retries, 7);
            assert_eq!(config.lvm_snap_percent, 100);
            Ok(())
        });
    }

    #[test]
    fn test_explicit_missing_file_fails() {
        Jail::expect_with(|_jail| {
            assert!(Config::load(Some(Path::new("missing.toml"))).is_err());
            Ok(())
        });
    }
}

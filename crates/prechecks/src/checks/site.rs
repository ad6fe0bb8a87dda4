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

//! Checks driven by site engineering documents and files on the
//! management server.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::StatusCode;
use runtime::CommandSpec;

use crate::engine::PrecheckEngine;
use crate::errors::{FailureKind, PrecheckError, PrecheckResult};
use crate::locations::endpoint;
use crate::properties::{IniLookup, ini_value, read_properties};
use crate::report::CheckOutcome;

static FALLBACK_IP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^fb_dpmediation_.*_ip_internal$|^fb_dpmediation_internal$").expect("static regex is valid")
});
static ILO_IP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r".*_ilo_IP$").expect("static regex is valid"));
static VERSION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d\.\d*\.\d*").expect("static regex is valid"));

// Seed files are only used by releases before this one.
const SEED_FILE_RELEASE: (u32, u32, u32) = (2, 19, 117);
const OMBS_SECTION: &str = "precondition";
const OMBS_LOCK_OPTION: &str = "system_backup_lock_file";
const OMBS_LOCK_CONTENT: &str = "Existence of this file prevents the ENM system backup\n";
const OMBS_OWNER: &str = "brsadm:brsadm";

/// The `x.y.z` release in the first line of the version file.
pub(crate) fn parse_release(line: &str) -> Option<(u32, u32, u32)> {
    let found = VERSION_RE.find(line)?.as_str();
    let mut parts = found.split('.').map(|p| p.parse::<u32>().unwrap_or(0));
    Some((parts.next()?, parts.next().unwrap_or(0), parts.next().unwrap_or(0)))
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

impl PrecheckEngine {
    async fn probe(&self, url: &str) -> Result<StatusCode, reqwest::Error> {
        Ok(self.http.get(url).send().await?.status())
    }

    pub(crate) async fn check_fallback_status(&self) -> PrecheckResult<CheckOutcome> {
        let sed = &self.locations.fallback_sed;
        if !exists(sed).await {
            return Ok(CheckOutcome::passed("No fallback deployment, skipping"));
        }
        let props = read_properties(sed).await?;
        let failed = |reason: String| PrecheckError::check(FailureKind::FallbackStatusCheckFailed, reason);
        let mut probed = 0;
        for (key, ip) in props.iter().filter(|(k, _)| FALLBACK_IP_RE.is_match(k)) {
            if ip.is_empty() {
                return Err(failed(format!("cannot find the IP of {key} in {}", sed.display())));
            }
            let health = endpoint(&self.locations.fallback_health_url, ip);
            let healthy = match self.probe(&health).await {
                Ok(StatusCode::OK) => true,
                Ok(status) => {
                    tracing::warn!(target: "enminst::prechecks", url = %health, %status, "fallback health probe");
                    let seeds = endpoint(&self.locations.fallback_seed_nodes_url, ip);
                    matches!(self.probe(&seeds).await, Ok(StatusCode::OK))
                }
                Err(e) => return Err(failed(format!("{health} is unreachable: {e}"))),
            };
            if !healthy {
                return Err(failed(format!("fallback mediation on {ip} is not healthy")));
            }
            probed += 1;
        }
        tracing::info!(target: "enminst::prechecks", probed, "fallback mediation probed");
        Ok(CheckOutcome::passed("Fallback mediation is healthy"))
    }

    pub(crate) async fn remove_seed_file_after_check(&self) -> PrecheckResult<CheckOutcome> {
        let seed = &self.locations.seed_conf;
        if exists(seed).await {
            let path = &self.locations.enm_version;
            let unreadable = |reason: String| PrecheckError::check(FailureKind::EnmVersionUnreadable, reason);
            let text = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| unreadable(format!("{}: {e}", path.display())))?;
            let first = text.lines().next().unwrap_or_default();
            let release = parse_release(first)
                .ok_or_else(|| unreadable(format!("no release in '{first}' of {}", path.display())))?;
            if release < SEED_FILE_RELEASE && self.is_rack().await? {
                tokio::fs::remove_file(seed)
                    .await
                    .map_err(|e| PrecheckError::io(seed, e))?;
                tracing::info!(target: "enminst::prechecks", path = %seed.display(), ?release, "removed seed file");
            } else {
                tracing::info!(target: "enminst::prechecks", path = %seed.display(), ?release, "seed file retained");
            }
        }
        Ok(CheckOutcome::passed("Checking of ENM version completed"))
    }

    pub(crate) async fn check_https_port_ilo_available(&self) -> PrecheckResult<CheckOutcome> {
        let sed = &self.locations.ilo_sed;
        if !exists(sed).await {
            return Ok(CheckOutcome::skipped(format!("{} not found", sed.display())));
        }
        let props = read_properties(sed).await?;
        let consoles: Vec<(&String, &String)> = props
            .iter()
            .filter(|(k, v)| ILO_IP_RE.is_match(k) && !v.is_empty())
            .collect();
        if consoles.is_empty() {
            return Ok(CheckOutcome::skipped("No iLO addresses in the site document"));
        }
        let mut reasons = Vec::new();
        for (key, ip) in consoles {
            let node = key.strip_suffix("_ilo_IP").unwrap_or(key);
            let url = endpoint(&self.locations.ilo_url, ip);
            if let Err(e) = self.probe(&url).await {
                tracing::error!(target: "enminst::prechecks", node, %url, error = %e, "iLO unreachable");
                reasons.push(format!("HTTPS port of the iLO of {node} ({ip}) is not available"));
            }
        }
        if !reasons.is_empty() {
            return Err(PrecheckError::checks(FailureKind::HttpsPortUnavailableOnIlo, reasons));
        }
        Ok(CheckOutcome::passed("HTTPS port available on every iLO"))
    }

    /// The OMBS backup is held off by creating its lock file.
    pub(crate) async fn deactivate_ombs_backup(&self) -> PrecheckResult<CheckOutcome> {
        let conf = &self.locations.bos_conf;
        let invalid = |reason: String| PrecheckError::check(FailureKind::OmbsBackupConfigInvalid, reason);
        let text = tokio::fs::read_to_string(conf)
            .await
            .map_err(|e| invalid(format!("{}: {e}", conf.display())))?;
        let lock_file = match ini_value(&text, OMBS_SECTION, OMBS_LOCK_OPTION) {
            IniLookup::Found(v) if !v.is_empty() => v,
            IniLookup::Found(_) => {
                return Err(invalid(format!("{OMBS_LOCK_OPTION} is empty in {}", conf.display())));
            }
            IniLookup::NoOption => {
                return Err(invalid(format!("no {OMBS_LOCK_OPTION} in [{OMBS_SECTION}] of {}", conf.display())));
            }
            IniLookup::NoSection => {
                return Err(invalid(format!("no [{OMBS_SECTION}] section in {}", conf.display())));
            }
        };
        let lock = Path::new(&lock_file);
        if exists(lock).await {
            return Ok(CheckOutcome::passed("OMBS backup is inactive"));
        }
        tokio::fs::write(lock, OMBS_LOCK_CONTENT)
            .await
            .map_err(|e| PrecheckError::io(lock, e))?;
        let chown = CommandSpec::new("chown").args([OMBS_OWNER, lock_file.as_str()]);
        if let Err(e) = self.run_local(chown).await {
            tracing::warn!(target: "enminst::prechecks", path = %lock_file, error = %e, "cannot hand the lock file to the backup user");
        }
        Ok(CheckOutcome::passed("OMBS backup deactivated"))
    }
}

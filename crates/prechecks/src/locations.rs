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

//! Files and endpoints the checks read, write or probe.

use std::path::PathBuf;

/// Replaced by the node address in the endpoint templates.
pub const IP_PLACEHOLDER: &str = "{ip}";

/// The puppet timeout settings that are raised when shorter.
#[derive(Debug, Clone)]
pub struct PuppetTimeoutFiles {
    pub puppet_conf: PathBuf,
    pub litp_puppet_manifest: PathBuf,
    pub puppet_manager: PathBuf,
    pub rpc_commands: PathBuf,
}

impl Default for PuppetTimeoutFiles {
    fn default() -> Self {
        Self {
            puppet_conf: "/etc/puppet/puppet.conf".into(),
            litp_puppet_manifest: "/opt/ericsson/nms/litp/etc/puppet/modules/litp/manifests/litp_puppet_conf.pp"
                .into(),
            puppet_manager: "/opt/ericsson/nms/litp/lib/litp/core/puppet_manager.py".into(),
            rpc_commands: "/opt/ericsson/nms/litp/lib/litp/core/rpc_commands.py".into(),
        }
    }
}

/// Every location a precheck touches. Tests point these at a scratch
/// directory and a mock HTTP server.
#[derive(Debug, Clone)]
pub struct Locations {
    pub global_properties: PathBuf,
    pub opendj_passkey: PathBuf,
    pub iso_mount_dir: PathBuf,
    pub puppet_timeouts: PuppetTimeoutFiles,
    pub fallback_sed: PathBuf,
    /// Primary fallback health probe.
    pub fallback_health_url: String,
    /// Probed when the primary probe does not answer 200.
    pub fallback_seed_nodes_url: String,
    pub seed_conf: PathBuf,
    pub enm_version: PathBuf,
    pub ilo_sed: PathBuf,
    pub ilo_url: String,
    pub bos_conf: PathBuf,
}

impl Default for Locations {
    fn default() -> Self {
        Self {
            global_properties: "/ericsson/tor/data/global.properties".into(),
            opendj_passkey: "/ericsson/tor/data/idenmgmt/opendj_passkey".into(),
            iso_mount_dir: "/mnt".into(),
            puppet_timeouts: PuppetTimeoutFiles::default(),
            fallback_sed: "/ericsson/tor/data/fallback/fallback.sed".into(),
            fallback_health_url: "http://{ip}:8080/mediationservice/res/health".into(),
            fallback_seed_nodes_url: "http://{ip}:8558/enm-dp-akka-cluster/bootstrap/seed-nodes".into(),
            seed_conf: "/ericsson/tor/data/domainProxy/seed.conf".into(),
            enm_version: "/etc/enm-version".into(),
            ilo_sed: "/software/vol1/ansible_tmp_sed.txt".into(),
            ilo_url: "https://{ip}".into(),
            bos_conf: "/opt/ericsson/itpf/bur/etc/bos.conf".into(),
        }
    }
}

/// Fills the address into an endpoint template.
pub fn endpoint(template: &str, ip: &str) -> String {
    template.replace(IP_PLACEHOLDER, ip)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint() {
        let locations = Locations::default();
        assert_eq!(
            endpoint(&locations.fallback_health_url, "10.1.2.3"),
            "http://10.1.2.3:8080/mediationservice/res/health"
        );
        assert_eq!(endpoint(&locations.ilo_url, "10.1.2.4"), "https://10.1.2.4");
    }
}

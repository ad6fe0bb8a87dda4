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

//! Facts about the host that are detected once at start-up.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Hypervisor the LMS runs on, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VirtualProvider {
    Vmware,
    VirtualBox,
    Kvm,
    Qemu,
    RedHat,
}

impl VirtualProvider {
    /// Matches DMI vendor/product strings case-insensitively.
    pub fn detect(dmi: &str) -> Option<Self> {
        let dmi = dmi.to_lowercase();
        [
            ("vmware", VirtualProvider::Vmware),
            ("virtualbox", VirtualProvider::VirtualBox),
            ("kvm", VirtualProvider::Kvm),
            ("qemu", VirtualProvider::Qemu),
            ("red hat", VirtualProvider::RedHat),
        ]
        .into_iter()
        .find(|(needle, _)| dmi.contains(needle))
        .map(|(_, provider)| provider)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub virtual_provider: Option<VirtualProvider>,
    pub hostname: String,
    pub kernel_release: String,
    pub rhel_release: Option<String>,
    /// Whether the data persistence service runs on Neo4j rather than Versant.
    pub dps_uses_neo4j: bool,
}

impl Default for Platform {
    fn default() -> Self {
        Self {
            virtual_provider: None,
            hostname: "ms-1".to_string(),
            kernel_release: String::new(),
            rhel_release: None,
            dps_uses_neo4j: true,
        }
    }
}

const DMI_SYS_VENDOR: &str = "/sys/class/dmi/id/sys_vendor";
const DMI_PRODUCT_NAME: &str = "/sys/class/dmi/id/product_name";
const REDHAT_RELEASE: &str = "/etc/redhat-release";
const DPS_PERSISTENCE_PROVIDER: &str = "/ericsson/tor/data/global.properties";

impl Platform {
    /// Detects the platform from the running host.
    pub fn detect() -> Self {
        let dmi = [DMI_SYS_VENDOR, DMI_PRODUCT_NAME]
            .iter()
            .filter_map(|p| std::fs::read_to_string(p).ok())
            .collect::<Vec<_>>()
            .join(" ");
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "ms-1".to_string());
        let kernel_release = uname::uname().map(|u| u.release).unwrap_or_default();
        let rhel_release = std::fs::read_to_string(REDHAT_RELEASE)
            .ok()
            .map(|s| s.trim().to_string());
        let dps_uses_neo4j = Self::read_dps_provider(Path::new(DPS_PERSISTENCE_PROVIDER));
        let platform = Self {
            virtual_provider: VirtualProvider::detect(&dmi),
            hostname,
            kernel_release,
            rhel_release,
            dps_uses_neo4j,
        };
        tracing::debug!(platform = ?platform, "detected platform");
        platform
    }

    /// Reads `dps_persistence_provider` from the global properties file.
    /// Neo4j is the default when the property is absent.
    pub fn read_dps_provider(path: &Path) -> bool {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse_dps_provider(&content),
            Err(_) => true,
        }
    }

    pub fn parse_dps_provider(content: &str) -> bool {
        content
            .lines()
            .filter_map(|l| l.split_once('='))
            .find(|(k, _)| k.trim() == "dps_persistence_provider")
            .map(|(_, v)| v.trim().eq_ignore_ascii_case("neo4j"))
            .unwrap_or(true)
    }

    pub fn is_virtual(&self) -> bool {
        self.virtual_provider.is_some()
    }

    pub fn with_virtual_provider(mut self, provider: Option<VirtualProvider>) -> Self {
        self.virtual_provider = provider;
        self
    }

    pub fn with_dps_uses_neo4j(mut self, neo4j: bool) -> Self {
        self.dps_uses_neo4j = neo4j;
        self
    }

    pub fn with_kernel_release(mut self, release: impl Into<String>) -> Self {
        self.kernel_release = release.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_provider() {
        assert_eq!(VirtualProvider::detect("VMware, Inc. VMware7,1"), Some(VirtualProvider::Vmware));
        assert_eq!(VirtualProvider::detect("QEMU Standard PC"), Some(VirtualProvider::Qemu));
        assert_eq!(VirtualProvider::detect("Red Hat KVM"), Some(VirtualProvider::Kvm));
        assert_eq!(VirtualProvider::detect("HPE ProLiant BL460c Gen10"), None);
    }

    #[test]
    fn test_dps_provider() {
        assert!(Platform::parse_dps_provider("a=b\ndps_persistence_provider=neo4j\n"));
        assert!(!Platform::parse_dps_provider("dps_persistence_provider = versant"));
        assert!(Platform::parse_dps_provider(""));
    }
}

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

//! The closed set of prechecks an operator can request.

use std::str::FromStr;

use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use crate::errors::{PrecheckError, PrecheckResult};

/// One precheck. Declaration order is the order a full run executes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum PrecheckAction {
    StorageSetupCheck,
    SanAlertCheck,
    CheckLvmConfNonDbNodes,
    CheckGrubCfgLvs,
    LitpModelSynchronizedCheck,
    ElasticSearchStatusCheck,
    OpendjReplicationCheck,
    UnmountIsoImageCheck,
    RemovePackages,
    ApplyPuppetTimeouts,
    CheckFallbackStatus,
    RemoveSeedFileAfterCheck,
    CheckHttpsPortIloAvailable,
    DeactivateOmbsBackup,
    RestartPuppetServices,
    /// Every check above except [`PrecheckAction::DeactivateOmbsBackup`].
    UpgradePrerequisitesCheck,
}

impl PrecheckAction {
    /// Accepts the snake_case name or its kebab-case spelling.
    pub fn parse(name: &str) -> PrecheckResult<Self> {
        Self::from_str(&name.trim().replace('-', "_"))
            .map_err(|_| PrecheckError::Usage(format!("Unknown precheck action '{name}'")))
    }

    /// Heading printed before the check runs.
    pub fn heading(self) -> &'static str {
        match self {
            Self::StorageSetupCheck => "Checking the disk storage setup of the database nodes",
            Self::SanAlertCheck => "Checking the SAN for critical alerts",
            Self::CheckLvmConfNonDbNodes => "Applying the LVM filters on the non database nodes",
            Self::CheckGrubCfgLvs => "Checking the logical volumes in grub.cfg",
            Self::LitpModelSynchronizedCheck => "Checking the model is synchronised with the deployment",
            Self::ElasticSearchStatusCheck => "Checking the Elasticsearch indices",
            Self::OpendjReplicationCheck => "Checking OpenDJ replication",
            Self::UnmountIsoImageCheck => "Checking for a mounted ISO image",
            Self::RemovePackages => "Removing obsolete packages",
            Self::ApplyPuppetTimeouts => "Checking the puppet timeout values are long enough",
            Self::CheckFallbackStatus => "Checking the fallback deployment",
            Self::RemoveSeedFileAfterCheck => "Checking the Domain Proxy seed file",
            Self::CheckHttpsPortIloAvailable => "Checking the HTTPS port of every iLO is available",
            Self::DeactivateOmbsBackup => "Deactivating the OMBS backup",
            Self::RestartPuppetServices => "Restarting the puppet services",
            Self::UpgradePrerequisitesCheck => "Running all upgrade prerequisite checks",
        }
    }

    /// Every individual check a full prerequisite run covers.
    pub fn prerequisites() -> Vec<Self> {
        Self::iter()
            .filter(|a| !matches!(a, Self::UpgradePrerequisitesCheck | Self::DeactivateOmbsBackup))
            .collect()
    }
}

/// The checks a request resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionPlan {
    pub actions: Vec<PrecheckAction>,
    /// A full prerequisite run prints a summary once every check passed.
    pub summary: bool,
}

/// Resolves the requested actions. No actions, or a request naming the
/// full prerequisite check, runs every prerequisite. OMBS deactivation
/// named with others runs on its own. Otherwise the request order is kept
/// without duplicates.
pub fn resolve(requested: &[PrecheckAction]) -> ActionPlan {
    if requested.is_empty() || requested.contains(&PrecheckAction::UpgradePrerequisitesCheck) {
        return ActionPlan {
            actions: PrecheckAction::prerequisites(),
            summary: true,
        };
    }
    if requested.contains(&PrecheckAction::DeactivateOmbsBackup) {
        return ActionPlan {
            actions: vec![PrecheckAction::DeactivateOmbsBackup],
            summary: false,
        };
    }
    let mut actions = Vec::with_capacity(requested.len());
    for action in requested {
        if !actions.contains(action) {
            actions.push(*action);
        }
    }
    ActionPlan {
        actions,
        summary: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_both_spellings() {
        assert_eq!(
            PrecheckAction::parse("opendj_replication_check").unwrap(),
            PrecheckAction::OpendjReplicationCheck
        );
        assert_eq!(
            PrecheckAction::parse("check-https-port-ilo-available").unwrap(),
            PrecheckAction::CheckHttpsPortIloAvailable
        );
        assert_eq!(PrecheckAction::SanAlertCheck.to_string(), "san_alert_check");
        assert!(matches!(
            PrecheckAction::parse("reboot_everything"),
            Err(PrecheckError::Usage(_))
        ));
    }

    #[test]
    fn test_prerequisites_skip_ombs() {
        let all = PrecheckAction::prerequisites();
        assert_eq!(all.len(), 14);
        assert_eq!(all[0], PrecheckAction::StorageSetupCheck);
        assert_eq!(all[13], PrecheckAction::RestartPuppetServices);
        assert!(!all.contains(&PrecheckAction::DeactivateOmbsBackup));
    }

    #[test]
    fn test_resolve() {
        let plan = resolve(&[]);
        assert!(plan.summary);
        assert_eq!(plan.actions, PrecheckAction::prerequisites());

        let plan = resolve(&[PrecheckAction::SanAlertCheck, PrecheckAction::DeactivateOmbsBackup]);
        assert_eq!(plan.actions, vec![PrecheckAction::DeactivateOmbsBackup]);
        assert!(!plan.summary);

        let plan = resolve(&[
            PrecheckAction::OpendjReplicationCheck,
            PrecheckAction::SanAlertCheck,
            PrecheckAction::OpendjReplicationCheck,
        ]);
        assert_eq!(
            plan.actions,
            vec![PrecheckAction::OpendjReplicationCheck, PrecheckAction::SanAlertCheck]
        );
    }
}

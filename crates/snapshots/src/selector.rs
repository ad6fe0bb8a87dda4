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

//! Which snapshots an action addresses.

use storage::TierKind;
use strum_macros::{Display, EnumIter, EnumString};

/// The `--snap_type` of a snapshot action. `lvm` covers the management
/// server volumes and the node local volumes together; `litp` (also
/// accepted as `deployment`) is the snapshot of the deployment model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SnapType {
    Lvm,
    San,
    Nas,
    #[strum(to_string = "litp", serialize = "deployment")]
    Litp,
    All,
}

impl SnapType {
    /// Storage tiers addressed, in create order.
    pub fn tiers(self) -> Vec<TierKind> {
        match self {
            SnapType::Lvm => vec![TierKind::LmsLvm, TierKind::NodeLvm],
            SnapType::San => vec![TierKind::San],
            SnapType::Nas => vec![TierKind::Nas],
            SnapType::Litp => Vec::new(),
            SnapType::All => TierKind::all().to_vec(),
        }
    }

    pub fn includes(self, tier: TierKind) -> bool {
        self.tiers().contains(&tier)
    }

    pub fn includes_deployment(self) -> bool {
        matches!(self, SnapType::Litp | SnapType::All)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_parse_and_display() {
        assert_eq!(SnapType::from_str("lvm").unwrap(), SnapType::Lvm);
        assert_eq!(SnapType::from_str("deployment").unwrap(), SnapType::Litp);
        assert_eq!(SnapType::from_str("ALL").unwrap(), SnapType::All);
        assert!(SnapType::from_str("vnx").is_err());
        let names: Vec<String> = SnapType::iter().map(|t| t.to_string()).collect();
        assert_eq!(names, vec!["lvm", "san", "nas", "litp", "all"]);
    }

    #[test]
    fn test_tiers() {
        assert!(SnapType::Lvm.includes(TierKind::NodeLvm));
        assert!(!SnapType::Lvm.includes(TierKind::San));
        assert!(SnapType::Litp.tiers().is_empty());
        assert!(SnapType::All.includes_deployment());
        assert!(!SnapType::Nas.includes_deployment());
        assert_eq!(SnapType::All.tiers().first(), Some(&TierKind::LmsLvm));
    }
}

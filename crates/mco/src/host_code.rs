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

//! Vendor codes the tooling recognises in peer replies.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static VCS_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"V-16-\d+-\d+").expect("static regex is valid"));

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HostCode {
    /// The host did not answer the transport at all.
    Unreachable,
    /// V-16-1-10600: the VCS engine on the host cannot be contacted.
    EngineUnreachable,
    /// V-16-1-10805: a `hagrp -wait` expired.
    WaitTimedOut,
    /// V-16-1-10011: no answer from node, typically powered off.
    NoAnswerFromNode,
    /// V-16-1-40229: group already online on the system.
    AlreadyOnline,
    /// V-16-1-40156: group is busy onlining on another system.
    BusyOnlining,
    /// V-16-1-40200 / V-16-1-40206: already frozen.
    AlreadyFrozen,
    /// V-16-1-40201, 40204, 40205, 40207: not frozen.
    NotFrozen,
    /// V-16-1-10191: group not online on the system.
    GroupNotOnline,
    /// V-16-1-10446: node not running.
    NodeNotRunning,
    /// V-16-1-10447: uptime event.
    UptimeEvent,
    /// V-16-1-10206: configuration already writable/read-only.
    ConfigUnchanged,
    /// Any other vendor code.
    Other(String),
}

impl HostCode {
    pub fn from_vendor(code: &str) -> HostCode {
        match code {
            "V-16-1-10600" => HostCode::EngineUnreachable,
            "V-16-1-10805" => HostCode::WaitTimedOut,
            "V-16-1-10011" => HostCode::NoAnswerFromNode,
            "V-16-1-40229" => HostCode::AlreadyOnline,
            "V-16-1-40156" => HostCode::BusyOnlining,
            "V-16-1-40200" | "V-16-1-40206" => HostCode::AlreadyFrozen,
            "V-16-1-40201" | "V-16-1-40204" | "V-16-1-40205" | "V-16-1-40207" => {
                HostCode::NotFrozen
            }
            "V-16-1-10191" => HostCode::GroupNotOnline,
            "V-16-1-10446" => HostCode::NodeNotRunning,
            "V-16-1-10447" => HostCode::UptimeEvent,
            "V-16-1-10206" => HostCode::ConfigUnchanged,
            other => HostCode::Other(other.to_string()),
        }
    }

    /// Finds the first vendor code in `out`, then in `err`.
    pub fn classify(out: &str, err: &str) -> Option<HostCode> {
        VCS_CODE_RE
            .find(out)
            .or_else(|| VCS_CODE_RE.find(err))
            .map(|m| HostCode::from_vendor(m.as_str()))
    }

    pub fn vendor_code(&self) -> Option<&str> {
        match self {
            HostCode::Unreachable => None,
            HostCode::EngineUnreachable => Some("V-16-1-10600"),
            HostCode::WaitTimedOut => Some("V-16-1-10805"),
            HostCode::NoAnswerFromNode => Some("V-16-1-10011"),
            HostCode::AlreadyOnline => Some("V-16-1-40229"),
            HostCode::BusyOnlining => Some("V-16-1-40156"),
            HostCode::AlreadyFrozen => Some("V-16-1-40200"),
            HostCode::NotFrozen => Some("V-16-1-40201"),
            HostCode::GroupNotOnline => Some("V-16-1-10191"),
            HostCode::NodeNotRunning => Some("V-16-1-10446"),
            HostCode::UptimeEvent => Some("V-16-1-10447"),
            HostCode::ConfigUnchanged => Some("V-16-1-10206"),
            HostCode::Other(code) => Some(code),
        }
    }
}

impl fmt::Display for HostCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.vendor_code() {
            Some(code) => write!(f, "{self:?} ({code})"),
            None => write!(f, "{self:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_prefers_stdout() {
        assert_eq!(
            HostCode::classify(
                "VCS WARNING V-16-1-40229 Group is already online",
                "VCS ERROR V-16-1-10600 Cannot connect"
            ),
            Some(HostCode::AlreadyOnline)
        );
        assert_eq!(
            HostCode::classify("", "VCS ERROR V-16-1-10600 Cannot connect to VCS engine"),
            Some(HostCode::EngineUnreachable)
        );
        assert_eq!(HostCode::classify("all good", ""), None);
    }

    #[test]
    fn test_frozen_codes() {
        assert_eq!(HostCode::from_vendor("V-16-1-40206"), HostCode::AlreadyFrozen);
        assert_eq!(HostCode::from_vendor("V-16-1-40205"), HostCode::NotFrozen);
        assert_eq!(
            HostCode::from_vendor("V-16-1-99999"),
            HostCode::Other("V-16-1-99999".to_string())
        );
    }
}

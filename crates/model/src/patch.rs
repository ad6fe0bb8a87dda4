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

//! Markers recording which OS patch bundles were applied to the LMS.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::{ModelError, ModelResult};

static CXP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"CXP(\d{7})").expect("static regex is valid"));

/// One line of `ms_os_patched`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatchMarker {
    /// Patches applied in a run that had no deployment model argument.
    WithoutModel,
    /// Patch bundle identified by CXP number and bundle version.
    WithCxp { cxp: String, version: String },
}

impl PatchMarker {
    pub fn with_cxp(cxp: impl Into<String>, version: impl Into<String>) -> Self {
        PatchMarker::WithCxp {
            cxp: cxp.into(),
            version: version.into(),
        }
    }

    pub fn parse(line: &str) -> ModelResult<Self> {
        let line = line.trim();
        if line == "patch_without_model" {
            return Ok(PatchMarker::WithoutModel);
        }
        let rest = line
            .strip_prefix("patch_with_CXP")
            .ok_or_else(|| ModelError::malformed("patch marker", line))?;
        // Markers written before versions were recorded carry no version.
        let (cxp, version) = rest.split_once(':').unwrap_or((rest, ""));
        if cxp.is_empty() || !cxp.chars().all(|c| c.is_ascii_digit()) {
            return Err(ModelError::malformed("patch marker", line));
        }
        Ok(PatchMarker::with_cxp(cxp, version))
    }
}

impl fmt::Display for PatchMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchMarker::WithoutModel => f.write_str("patch_without_model"),
            PatchMarker::WithCxp { cxp, version } => write!(f, "patch_with_CXP{cxp}:{version}"),
        }
    }
}

/// Extracts the CXP number and version from a patch bundle file name such as
/// `RHEL79_OS_Patch_Set_CXP9041797-1.23.4.tar.gz`.
pub fn parse_patch_file_name(file_name: &str) -> Option<(String, String)> {
    let caps = CXP_RE.captures(file_name)?;
    let cxp = caps.get(1)?.as_str().to_string();
    let end = caps.get(0)?.end();
    let tail = &file_name[end..];
    let version = tail
        .trim_start_matches(['-', '_'])
        .trim_end_matches(".tar.gz")
        .trim_end_matches(".tar")
        .trim_end_matches(".iso")
        .to_string();
    Some((cxp, version))
}

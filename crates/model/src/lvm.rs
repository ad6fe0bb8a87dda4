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

//! Logical volume rows as reported by `lvs`.

use serde::{Deserialize, Serialize};

use crate::errors::{ModelError, ModelResult};

/// Columns requested from `lvs`, in order.
pub const LV_COLUMNS: &str =
    "lv_name,lv_tags,lv_attr,lv_path,vg_name,origin,lv_snapshot_invalid,snap_percent,lv_time";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalVolume {
    pub lv_name: String,
    pub lv_tags: String,
    pub lv_attr: String,
    pub lv_path: String,
    pub vg_name: String,
    pub origin: String,
    pub lv_snapshot_invalid: String,
    pub snap_percent: Option<f64>,
    pub lv_time: String,
}

impl LogicalVolume {
    /// Parses one `--separator , --unquoted --noheadings` line.
    pub fn parse(line: &str) -> ModelResult<Self> {
        let parts: Vec<&str> = line.trim().split(',').collect();
        if parts.len() < 9 {
            return Err(ModelError::malformed("lvs row", line));
        }
        let snap_percent = match parts[7].trim() {
            "" => None,
            v => Some(
                v.parse::<f64>()
                    .map_err(|_| ModelError::malformed("snap_percent", v))?,
            ),
        };
        Ok(Self {
            lv_name: parts[0].trim().to_string(),
            lv_tags: parts[1].trim().to_string(),
            lv_attr: parts[2].trim().to_string(),
            lv_path: parts[3].trim().to_string(),
            vg_name: parts[4].trim().to_string(),
            origin: parts[5].trim().to_string(),
            lv_snapshot_invalid: parts[6].trim().to_string(),
            snap_percent,
            // lv_time contains no separators but be lenient anyway
            lv_time: parts[8..].join(",").trim().to_string(),
        })
    }

    /// Parses full `lvs` output, skipping LVM's harmless descriptor warnings.
    pub fn parse_output(output: &str) -> ModelResult<Vec<Self>> {
        output
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter(|l| !l.contains("File descriptor") && !l.contains("Input/output error"))
            .map(Self::parse)
            .collect()
    }

    pub fn is_snapshot(&self) -> bool {
        self.lv_attr.starts_with('s')
    }

    pub fn is_origin(&self) -> bool {
        self.lv_attr.starts_with('o')
    }

    /// Swap, log and software volumes are never snapped.
    pub fn is_excluded(&self) -> bool {
        let name = self.lv_name.to_lowercase();
        name.contains("swap") || name.contains("log") || name.contains("software")
    }

    pub fn is_invalid_snapshot(&self) -> bool {
        !self.lv_snapshot_invalid.is_empty()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.lv_tags.split(',').any(|t| t.trim() == tag)
    }
}

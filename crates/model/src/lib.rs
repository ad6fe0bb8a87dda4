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

//! Describes the data model shared by the ENM lifecycle tooling.
//!
//! The types here cover the deployment tree read from the model engine, the
//! live VCS view of service groups and systems, the persisted upgrade stage,
//! blade credentials used for power control, and the exit codes every
//! command line surface reports.
//!
//! The module should only contain data definitions and associated helper
//! functions, but no actual business logic.

pub mod blade;
pub mod errors;
pub mod exit_code;
pub mod item;
pub mod lvm;
pub mod patch;
pub mod stage;
pub mod table;
pub mod vcs;

pub use errors::{ModelError, ModelResult};
pub use exit_code::ExitCode;
pub use table::TableRow;

/// Splits a comma separated model property into its trimmed, non-empty parts.
pub fn split_list_property(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list_property() {
        assert_eq!(
            split_list_property("svc-1, svc-2,,"),
            vec!["svc-1".to_string(), "svc-2".to_string()]
        );
        assert!(split_list_property("").is_empty());
    }
}

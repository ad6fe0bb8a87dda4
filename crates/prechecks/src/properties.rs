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

//! Readers for the flat configuration files found on the management
//! server: `key=value` property files (site engineering documents,
//! `global.properties`) and INI style files.

use std::collections::BTreeMap;
use std::path::Path;

use crate::errors::{PrecheckError, PrecheckResult};

/// Parses `key=value` lines. Blank lines and `#` comments are skipped;
/// the value is everything after the first `=`.
pub fn parse_properties(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|l| l.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

pub async fn read_properties(path: &Path) -> PrecheckResult<BTreeMap<String, String>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| PrecheckError::io(path, e))?;
    Ok(parse_properties(&text))
}

/// Errors of an INI lookup, worded for the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IniLookup {
    Found(String),
    NoSection,
    NoOption,
}

/// Looks up `option` in `[section]`. Both `=` and `:` separate names from
/// values; `#` and `;` start comments.
pub fn ini_value(text: &str, section: &str, option: &str) -> IniLookup {
    let mut in_section = false;
    let mut seen_section = false;
    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            in_section = name.trim() == section;
            seen_section |= in_section;
            continue;
        }
        if !in_section {
            continue;
        }
        let split = line
            .find(['=', ':'])
            .map(|i| (line[..i].trim(), line[i + 1..].trim()));
        if let Some((key, value)) = split
            && key.eq_ignore_ascii_case(option)
        {
            return IniLookup::Found(value.to_string());
        }
    }
    if seen_section {
        IniLookup::NoOption
    } else {
        IniLookup::NoSection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_properties() {
        let props = parse_properties(
            "# site\nCOM_INF_LDAP_ROOT_SUFFIX=dc=enm,dc=com\n\nLDAP_ADMIN_PASSWORD = U2FsdGVk==\nbroken line\n",
        );
        assert_eq!(props["COM_INF_LDAP_ROOT_SUFFIX"], "dc=enm,dc=com");
        assert_eq!(props["LDAP_ADMIN_PASSWORD"], "U2FsdGVk==");
        assert_eq!(props.len(), 2);
    }

    #[test]
    fn test_ini_value() {
        let text = "[general]\nname = x\n\n[precondition]\n; lock\nsystem_backup_lock_file: /var/tmp/lock\n";
        assert_eq!(
            ini_value(text, "precondition", "system_backup_lock_file"),
            IniLookup::Found("/var/tmp/lock".into())
        );
        assert_eq!(ini_value(text, "precondition", "other"), IniLookup::NoOption);
        assert_eq!(ini_value(text, "missing", "name"), IniLookup::NoSection);
    }
}

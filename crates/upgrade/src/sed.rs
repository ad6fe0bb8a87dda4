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

//! Site parameters: the SED, the runtime working copy and the encrypted
//! passwords, and their substitution into a deployment description.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use runtime::{CommandRunner, CommandSpec};

use crate::errors::{UpgradeError, UpgradeResult};

/// The runtime copy of site parameters, kept beside the other run state.
pub const WORKING_CFG: &str = "enminst_working.cfg";

const FILE_PREFIX: &str = "file://";
const ENCRYPTED_SUFFIX: &str = "_encrypted";
const IMAGE_MARKER: &str = "_image";

/// Site password to the passkey file that encrypts it.
pub const PASSWORD_PASSKEYS: [(&str, &str); 9] = [
    ("openidm_admin_password", "openidm_passkey"),
    ("com_inf_ldap_admin_access_password", "ssoldap_passkey"),
    ("ldap_admin_password", "opendj_passkey"),
    ("postgresql01_admin_password", "postgresql01_passkey"),
    ("default_security_admin_password", "secadmin_passkey"),
    ("neo4j_admin_user_password", "neo4j_passkey"),
    ("neo4j_dps_user_password", "neo4j_passkey"),
    ("neo4j_reader_user_password", "neo4j_passkey"),
    ("neo4j_ddc_user_password", "neo4j_passkey"),
];

static LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.*?)=(.*)$").expect("static regex is valid"));
static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"%%[^%]*%%").expect("static regex is valid"));

/// Merged `key=value` parameters. Later sources win.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteParameters {
    values: BTreeMap<String, String>,
}

impl SiteParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads one parameter file. Blank lines, comments and empty values are
    /// skipped; a `file://` value is replaced by the content of that file.
    pub fn read_file(&mut self, path: &Path) -> UpgradeResult<()> {
        let text = std::fs::read_to_string(path).map_err(|e| UpgradeError::io(path, e))?;
        for (key, value) in parse_lines(&text) {
            let value = match value.strip_prefix(FILE_PREFIX) {
                Some(file) => {
                    tracing::info!(target: "enminst::upgrade", file, "reading parameter value from file");
                    std::fs::read_to_string(file)
                        .map_err(|e| UpgradeError::io(file, e))?
                        .trim()
                        .to_string()
                }
                None => value,
            };
            self.values.insert(key, value);
        }
        Ok(())
    }

    pub fn load(paths: &[&Path]) -> UpgradeResult<Self> {
        let mut params = Self::new();
        for path in paths {
            params.read_file(path)?;
        }
        Ok(params)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn require(&self, key: &str) -> UpgradeResult<&str> {
        self.get(key)
            .ok_or_else(|| UpgradeError::parameter(format!("parameter '{key}' is not set")))
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn extend(&mut self, other: BTreeMap<String, String>) {
        self.values.extend(other);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Replaces every `%%key%%` in `template`. Placeholders left over are
    /// returned as the error.
    pub fn substitute(&self, template: &str) -> Result<String, Vec<String>> {
        let mut out = template.to_string();
        for (key, value) in &self.values {
            out = out.replace(&format!("%%{key}%%"), value);
        }
        let mut outstanding: Vec<String> = PLACEHOLDER_RE
            .find_iter(&out)
            .map(|m| m.as_str().to_string())
            .collect();
        if outstanding.is_empty() {
            return Ok(out);
        }
        outstanding.sort();
        outstanding.dedup();
        Err(outstanding)
    }

    /// Substitutes `template` and writes the result to `output`.
    pub fn substitute_file(&self, template: &Path, output: &Path) -> UpgradeResult<()> {
        let text = std::fs::read_to_string(template).map_err(|e| UpgradeError::io(template, e))?;
        let populated = self.substitute(&text).map_err(|unresolved| {
            for p in &unresolved {
                tracing::error!(target: "enminst::upgrade", parameter = %p, "parameter not substituted");
            }
            UpgradeError::Substitution {
                path: template.to_path_buf(),
                unresolved,
            }
        })?;
        std::fs::write(output, populated).map_err(|e| UpgradeError::io(output, e))?;
        tracing::info!(target: "enminst::upgrade", output = %output.display(), "fully populated deployment description written");
        Ok(())
    }
}

/// `key=value` pairs of a parameter file, in file order.
pub fn parse_lines(text: &str) -> Vec<(String, String)> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|l| LINE_RE.captures(l))
        .filter_map(|c| {
            let key = c.get(1)?.as_str().to_string();
            let value = c.get(2)?.as_str().to_string();
            (!value.is_empty()).then_some((key, value))
        })
        .collect()
}

/// Encrypts the site passwords with their passkeys. Returns
/// `<password>_encrypted` entries for every password the parameters hold.
pub async fn encrypt_passwords(
    runner: &dyn CommandRunner,
    params: &SiteParameters,
    passkey_dir: &Path,
) -> UpgradeResult<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    for (name, passkey) in PASSWORD_PASSKEYS {
        let Some(clear) = params.get(name) else {
            tracing::debug!(target: "enminst::upgrade", name, "password not in site parameters");
            continue;
        };
        let kfile = passkey_dir.join(passkey);
        if !kfile.exists() {
            return Err(UpgradeError::parameter(format!(
                "passkey {} for {name} not found",
                kfile.display()
            )));
        }
        let spec = CommandSpec::new("openssl")
            .args(["enc", "-aes-128-cbc", "-salt", "-a", "-kfile"])
            .arg(kfile.display().to_string())
            .with_stdin(format!("{clear}\n"));
        let output = runner.run_checked(&spec).await?;
        out.insert(format!("{name}{ENCRYPTED_SUFFIX}"), output.stdout.trim().to_string());
    }
    tracing::info!(target: "enminst::upgrade", count = out.len(), "site passwords encrypted");
    Ok(out)
}

/// The runtime working copy of the site parameters, edited in place.
#[derive(Debug, Clone)]
pub struct WorkingConfig {
    path: PathBuf,
    lines: Vec<String>,
}

impl WorkingConfig {
    /// Opens the file, starting empty when it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> UpgradeResult<Self> {
        let path = path.into();
        let lines = match std::fs::read_to_string(&path) {
            Ok(text) => text.lines().map(str::to_string).collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(UpgradeError::io(&path, e)),
        };
        Ok(Self { path, lines })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines
            .iter()
            .filter_map(|l| l.split_once('='))
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    /// Sets `key`, replacing an existing line or appending a new one.
    pub fn set(&mut self, key: &str, value: &str) {
        let line = format!("{key}={value}");
        match self.lines.iter_mut().find(|l| l.split_once('=').is_some_and(|(k, _)| k == key)) {
            Some(existing) => *existing = line,
            None => self.lines.push(line),
        }
    }

    /// Records the qcow2 images of a new ENM ISO. The key of an image is
    /// its file name up to the first underscore; legacy `*_image` entries
    /// are dropped.
    pub fn set_images<'a>(&mut self, images: impl IntoIterator<Item = &'a str>) {
        for image in images.into_iter().filter(|i| i.ends_with(".qcow2")) {
            let name = image.split('_').next().unwrap_or(image);
            self.set(name, image);
        }
        self.lines.retain(|l| !l.contains(IMAGE_MARKER));
    }

    pub fn save(&self) -> UpgradeResult<()> {
        let mut text = self.lines.join("\n");
        text.push('\n');
        std::fs::write(&self.path, text).map_err(|e| UpgradeError::io(&self.path, e))
    }
}

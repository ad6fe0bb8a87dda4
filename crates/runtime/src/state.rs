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

//! Owner of every file persisted under the runtime directory.
//!
//! Writes go to a temporary file in the same directory and are renamed over
//! the target, so a crash leaves either the old or the new content.

use std::io::Write;
use std::path::{Path, PathBuf};

use model::blade::BladeInfo;
use model::patch::PatchMarker;
use model::stage::StageRecord;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::errors::{RuntimeError, RuntimeResult};

pub const STAGE_FILE: &str = "upgrade_enm_stage_data.txt";
pub const PARAMS_FILE: &str = "upgrade_enm_params.txt";
pub const SNAPSHOT_INDICATOR: &str = "upgrade_snapshots_taken";
pub const MS_OS_PATCHED: &str = "ms_os_patched";
pub const RHEL_COPIED: &str = "rhel_copied";
pub const BLADE_INFO: &str = "blade_info";
pub const REMOVED_BLADES_INFO: &str = "removed_blades_info";
pub const LMS_VOL_BKUP: &str = "lms_vol_list_bkup.txt";
pub const NODE_VOL_BKUP: &str = "node_vol_list_bkup.txt";
pub const NAS_FS_BKUP: &str = "nas_fs_list_bkup.txt";
pub const NAS_SHARES_BKUP: &str = "nas_shares_list_bkup.txt";
pub const SAN_LUNS_BKUP: &str = "san_lun_list_bkup.txt";
pub const PREVIOUS_XML: &str = "previous_enm_deployment.xml";
pub const RUNTIME_XML: &str = "enm_deployment.xml";

#[derive(Debug, Clone)]
pub struct RunStateStore {
    dir: PathBuf,
}

impl RunStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Creates the runtime directory if it is missing.
    pub fn configure(&self) -> RuntimeResult<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| RuntimeError::io(&self.dir, e))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).exists()
    }

    pub fn write_atomic(&self, name: &str, content: &[u8]) -> RuntimeResult<()> {
        let target = self.path(name);
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .map_err(|e| RuntimeError::io(&self.dir, e))?;
        tmp.write_all(content)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| RuntimeError::io(tmp.path(), e))?;
        tmp.persist(&target)
            .map_err(|e| RuntimeError::io(&target, e.error))?;
        tracing::debug!(file = %target.display(), "persisted");
        Ok(())
    }

    pub fn read_string(&self, name: &str) -> RuntimeResult<Option<String>> {
        let path = self.path(name);
        match std::fs::read_to_string(&path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RuntimeError::io(path, e)),
        }
    }

    /// Removes a file; returns whether it existed.
    pub fn remove(&self, name: &str) -> RuntimeResult<bool> {
        let path = self.path(name);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(file = %path.display(), "removed");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(RuntimeError::io(path, e)),
        }
    }

    pub fn save_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> RuntimeResult<()> {
        let data = serde_json::to_vec_pretty(value)
            .map_err(|e| RuntimeError::corrupt(self.path(name), e.to_string()))?;
        self.write_atomic(name, &data)
    }

    pub fn load_json<T: DeserializeOwned>(&self, name: &str) -> RuntimeResult<Option<T>> {
        match self.read_string(name)? {
            None => Ok(None),
            Some(s) => serde_json::from_str(&s)
                .map(Some)
                .map_err(|e| RuntimeError::corrupt(self.path(name), e.to_string())),
        }
    }

    // Upgrade stage

    pub fn stage(&self) -> RuntimeResult<Option<StageRecord>> {
        match self.read_string(STAGE_FILE)? {
            None => Ok(None),
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) => Ok(Some(StageRecord::parse(&s)?)),
        }
    }

    pub fn set_stage(&self, record: StageRecord) -> RuntimeResult<()> {
        tracing::info!(stage = %record, "persisting upgrade stage");
        self.write_atomic(STAGE_FILE, record.to_string().as_bytes())
    }

    pub fn clear_stage(&self) -> RuntimeResult<bool> {
        self.remove(STAGE_FILE)
    }

    // Persisted upgrade arguments

    pub fn save_params<T: Serialize>(&self, params: &T) -> RuntimeResult<()> {
        self.save_json(PARAMS_FILE, params)
    }

    pub fn load_params<T: DeserializeOwned>(&self) -> RuntimeResult<Option<T>> {
        self.load_json(PARAMS_FILE)
    }

    pub fn clear_params(&self) -> RuntimeResult<bool> {
        self.remove(PARAMS_FILE)
    }

    // Snapshot indicator

    pub fn snapshot_indicator_exists(&self) -> bool {
        self.exists(SNAPSHOT_INDICATOR)
    }

    pub fn create_snapshot_indicator(&self) -> RuntimeResult<()> {
        self.write_atomic(SNAPSHOT_INDICATOR, b"")
    }

    pub fn remove_snapshot_indicator(&self) -> RuntimeResult<bool> {
        self.remove(SNAPSHOT_INDICATOR)
    }

    // OS patch markers

    pub fn patch_markers(&self) -> RuntimeResult<Vec<PatchMarker>> {
        let content = self.read_string(MS_OS_PATCHED)?.unwrap_or_default();
        content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| PatchMarker::parse(l).map_err(RuntimeError::from))
            .collect()
    }

    pub fn has_patch_marker(&self, marker: &PatchMarker) -> RuntimeResult<bool> {
        Ok(self.patch_markers()?.contains(marker))
    }

    pub fn append_patch_marker(&self, marker: &PatchMarker) -> RuntimeResult<()> {
        let mut markers = self.patch_markers()?;
        if markers.contains(marker) {
            return Ok(());
        }
        markers.push(marker.clone());
        let content: String = markers.iter().map(|m| format!("{m}\n")).collect();
        self.write_atomic(MS_OS_PATCHED, content.as_bytes())
    }

    // Blade credentials

    pub fn load_blade_info(&self, name: &str) -> RuntimeResult<Option<BladeInfo>> {
        self.load_json(name)
    }

    pub fn save_blade_info(&self, name: &str, info: &BladeInfo) -> RuntimeResult<()> {
        self.save_json(name, info)
    }
}

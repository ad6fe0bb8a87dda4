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

//! LVM snapshots of the management server's own volumes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use litp::ModelApi;
use model::item::ItemState;
use model::lvm::{LV_COLUMNS, LogicalVolume};
use runtime::state::LMS_VOL_BKUP;
use runtime::{CommandRunner, CommandSpec, RunStateStore, RuntimeError};

use crate::errors::{StorageError, StorageResult};
use crate::tier::{LEGACY_SNAPSHOT_TAG, SNAPSHOT_TAG, SnapshotRecord, SnapshotTier, TierKind, report_problems};

pub const MS_VOLUME_GROUPS: &str = "/ms/storage_profile/volume_groups";

/// Share of the free space handed to snapshots when the volume group is
/// too small for full size snapshots.
const SHORT_VG_PERCENT: u64 = 90;

/// Snapshot size when `vg_root` has room for a full copy of every volume.
const FULL_SNAP_PERCENT: u32 = 100;

/// Grub configuration and the copy saved beside it when snapshots are
/// taken, most specific layout first.
pub const GRUB_FILES: [(&str, &str); 3] = [
    ("/boot/efi/EFI/redhat/grub.cfg", "/boot/efi/EFI/redhat/grub.cfg.org"),
    ("/boot/grub/grub.conf", "/boot/grub/grub.conf.org"),
    ("/boot/grub2/grub.cfg", "/boot/grub2/grub.cfg.org"),
];

/// A volume in scope for snapshotting.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SnappableVolume {
    pub lv_name: String,
    pub lv_path: String,
    /// Snapshot size as a percentage of the origin.
    pub snap_size: u32,
}

impl SnappableVolume {
    pub fn snap_name(&self, prefix: &str) -> String {
        format!("{prefix}_{}", self.lv_name)
    }
}

fn tag_args(tag: &str) -> [String; 2] {
    [format!("@{tag}"), format!("@{LEGACY_SNAPSHOT_TAG}")]
}

fn lvs(tag: Option<&str>) -> CommandSpec {
    let spec = CommandSpec::new("lvs").args(["-o", LV_COLUMNS]);
    let spec = match tag {
        Some(tag) => spec.args(tag_args(tag)),
        None => spec,
    };
    spec.args(["--noheadings", "--separator", ",", "--unquoted"])
}

fn lvcreate(volume: &SnappableVolume, tag: &str, prefix: &str, percent: u32) -> CommandSpec {
    CommandSpec::new("lvcreate")
        .args(["-s", "--addtag", tag])
        .arg("-l")
        .arg(format!("{percent}%ORIGIN"))
        .arg("-n")
        .arg(volume.snap_name(prefix))
        .arg(volume.lv_path.clone())
}

// Integer part of an LVM size such as `1234.56m`.
fn megabytes(value: &str) -> Option<u64> {
    let value = value.trim().trim_end_matches(['m', 'M']);
    value.split('.').next()?.trim().parse().ok()
}

/// Snapshot percentage to use when the root volume group has `free` MB
/// left and the volumes add up to `total` MB.
pub fn snap_percent_for(free: u64, total: u64, default: u32) -> u32 {
    if total > 0 && free <= total {
        (SHORT_VG_PERCENT * free / total) as u32
    } else {
        default
    }
}

fn output_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Locates the grub file pairs on the local host.
#[derive(Debug, Clone)]
pub struct GrubFiles {
    candidates: Vec<(PathBuf, PathBuf)>,
}

impl Default for GrubFiles {
    fn default() -> Self {
        Self::new(
            GRUB_FILES
                .iter()
                .map(|(f, s)| (PathBuf::from(f), PathBuf::from(s))),
        )
    }
}

impl GrubFiles {
    pub fn new(candidates: impl IntoIterator<Item = (PathBuf, PathBuf)>) -> Self {
        Self {
            candidates: candidates.into_iter().collect(),
        }
    }

    /// The first pair whose live grub file exists.
    pub fn current(&self) -> Option<(&Path, &Path)> {
        self.candidates
            .iter()
            .find(|(file, _)| file.exists())
            .map(|(f, s)| (f.as_path(), s.as_path()))
    }

    /// The first pair whose saved copy exists.
    pub fn saved(&self) -> Option<(&Path, &Path)> {
        self.candidates
            .iter()
            .find(|(_, save)| save.exists())
            .map(|(f, s)| (f.as_path(), s.as_path()))
    }
}

async fn copy(from: &Path, to: &Path) -> StorageResult<()> {
    tokio::fs::copy(from, to)
        .await
        .map_err(|e| RuntimeError::io(from, e))?;
    Ok(())
}

/// Snapshots of the management server volumes whose modelled file system
/// has a non-zero `snap_size`.
#[derive(Debug, Clone)]
pub struct LmsLvmTier {
    runner: Arc<dyn CommandRunner>,
    model: Arc<dyn ModelApi>,
    state: RunStateStore,
    prefix: String,
    tag: String,
    snap_percent: Option<u32>,
    usage_tolerance: f64,
    grub: GrubFiles,
}

impl LmsLvmTier {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        model: Arc<dyn ModelApi>,
        state: RunStateStore,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            model,
            state,
            prefix: prefix.into(),
            tag: SNAPSHOT_TAG.to_string(),
            snap_percent: None,
            usage_tolerance: 90.0,
            grub: GrubFiles::default(),
        }
    }

    /// Overrides the per file system `snap_size` for every volume.
    pub fn with_snap_percent(mut self, percent: Option<u32>) -> Self {
        self.snap_percent = percent;
        self
    }

    pub fn with_usage_tolerance(mut self, tolerance: f64) -> Self {
        self.usage_tolerance = tolerance;
        self
    }

    pub fn with_grub_files(mut self, grub: GrubFiles) -> Self {
        self.grub = grub;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Management server volumes the model asks to be snapped. File
    /// systems still in Initial do not exist yet and are skipped; any other
    /// state than Applied refuses the snapshot.
    pub async fn snappable_volumes(&self) -> StorageResult<Vec<SnappableVolume>> {
        let groups = self.model.get_tree(MS_VOLUME_GROUPS).await?;
        let mut volumes = Vec::new();
        let mut not_applied = Vec::new();
        for vg in &groups.children {
            let vg_name = vg.require_property("volume_group_name")?;
            let Some(file_systems) = vg.child("file_systems") else {
                continue;
            };
            for fs in &file_systems.children {
                match fs.state {
                    ItemState::Initial => continue,
                    ItemState::Applied => {}
                    _ => not_applied.push(fs.id.clone()),
                }
                let snap_size = fs.int_property("snap_size")?.unwrap_or(0);
                if snap_size == 0 {
                    continue;
                }
                let lv_name = format!("{}_{}", vg.id, fs.id);
                volumes.push(SnappableVolume {
                    lv_path: format!("/dev/{vg_name}/{lv_name}"),
                    lv_name,
                    snap_size: snap_size.clamp(0, 100) as u32,
                });
            }
        }
        if !not_applied.is_empty() {
            return Err(StorageError::ModelState(format!(
                "file system(s) '{}' are not in Applied state",
                not_applied.join(", ")
            )));
        }
        Ok(volumes)
    }

    /// Every volume on the server, excluding swap, log and software volumes.
    pub async fn volumes(&self) -> StorageResult<Vec<LogicalVolume>> {
        self.list_volumes(None).await
    }

    async fn list_volumes(&self, tag: Option<&str>) -> StorageResult<Vec<LogicalVolume>> {
        let output = self.runner.run_checked(&lvs(tag)).await?;
        Ok(LogicalVolume::parse_output(&output.stdout)?
            .into_iter()
            .filter(|v| !v.is_excluded())
            .collect())
    }

    /// Snapshots carrying the upgrade tag.
    pub async fn snapshots(&self) -> StorageResult<Vec<LogicalVolume>> {
        Ok(self
            .list_volumes(Some(&self.tag))
            .await?
            .into_iter()
            .filter(LogicalVolume::is_snapshot)
            .collect())
    }

    /// Snapshot percentage that fits in the free space of `vg_root`,
    /// `default` when everything fits.
    pub async fn fitting_snap_percent(&self, default: u32) -> StorageResult<u32> {
        let free = self
            .runner
            .run_checked(&CommandSpec::shell_words("vgs --units m -o vg_free vg_root --noheadings"))
            .await?;
        let free = megabytes(&free.stdout).ok_or_else(|| {
            StorageError::adapter(TierKind::LmsLvm, "vgs", format!("unexpected output '{}'", free.stdout.trim()))
        })?;
        let sizes = self
            .runner
            .run_checked(&CommandSpec::shell_words("lvs --units m -o lv_size --noheadings"))
            .await?;
        let total: u64 = sizes.stdout.lines().filter_map(megabytes).sum();
        tracing::debug!(target: "enminst::snapshots", free, total, "volume group space");
        Ok(snap_percent_for(free, total, default))
    }

    /// Problems with a set of snapshots: invalidated or too full.
    pub(crate) fn snapshot_problems(
        snapshots: &[LogicalVolume],
        node: &str,
        tolerance: f64,
    ) -> Vec<String> {
        let mut problems = Vec::new();
        for snap in snapshots {
            if snap.is_invalid_snapshot() {
                problems.push(format!(
                    "{node} : Snapshot {} : {}",
                    snap.lv_name, snap.lv_snapshot_invalid
                ));
            } else if let Some(usage) = snap.snap_percent.filter(|u| *u >= tolerance) {
                problems.push(format!(
                    "{node} : Snapshot {} usage {usage}% reached the {tolerance}% tolerance",
                    snap.lv_name
                ));
            } else {
                tracing::info!(target: "enminst::snapshots", node, snapshot = %snap.lv_name, "snapshot valid");
            }
        }
        problems
    }
}

#[async_trait]
impl SnapshotTier for LmsLvmTier {
    fn kind(&self) -> TierKind {
        TierKind::LmsLvm
    }

    async fn create(&self) -> StorageResult<()> {
        let existing = self.snapshots().await?;
        if !existing.is_empty() {
            return Err(StorageError::SnapshotsExist {
                tier: TierKind::LmsLvm,
                names: existing.into_iter().map(|v| v.lv_name).collect(),
            });
        }
        tracing::info!(target: "enminst::snapshots", "reading available LMS logical volumes");
        let volumes = self.snappable_volumes().await?;
        let names: Vec<String> = volumes.iter().map(|v| v.lv_name.clone()).collect();
        tracing::info!(
            target: "enminst::snapshots",
            volumes = %names.join(", "),
            tag = %self.tag,
            "creating LMS snapshots"
        );
        let ceiling = match self.snap_percent {
            None if !volumes.is_empty() => self.fitting_snap_percent(FULL_SNAP_PERCENT).await?,
            _ => FULL_SNAP_PERCENT,
        };
        if ceiling == 0 {
            return Err(StorageError::adapter(
                TierKind::LmsLvm,
                "vgs",
                "no free space left in vg_root for snapshots",
            ));
        }
        if ceiling < FULL_SNAP_PERCENT {
            tracing::warn!(target: "enminst::snapshots", percent = ceiling, "vg_root is short of free space, snapshot sizes reduced");
        }
        for volume in &volumes {
            let percent = self.snap_percent.unwrap_or(volume.snap_size.min(ceiling));
            let output = self
                .runner
                .run_checked(&lvcreate(volume, &self.tag, &self.prefix, percent))
                .await
                .map_err(|e| {
                    StorageError::adapter(
                        TierKind::LmsLvm,
                        format!("snapshot of {}", volume.lv_name),
                        e,
                    )
                })?;
            for line in output_lines(&output.stdout) {
                tracing::info!(target: "enminst::snapshots", "{line}");
            }
        }
        self.state.save_json(LMS_VOL_BKUP, &names)?;
        match self.grub.current() {
            Some((file, save)) => {
                copy(file, save).await?;
                tracing::info!(target: "enminst::snapshots", from = %file.display(), to = %save.display(), "saved grub file");
            }
            None => tracing::warn!(target: "enminst::snapshots", "no grub file found to save"),
        }
        Ok(())
    }

    async fn list(&self) -> StorageResult<Vec<SnapshotRecord>> {
        Ok(self
            .snapshots()
            .await?
            .into_iter()
            .map(|s| {
                SnapshotRecord::new(TierKind::LmsLvm, s.origin.clone(), s.lv_name.clone())
                    .with_created(s.lv_time.clone())
                    .with_usage(s.snap_percent)
            })
            .collect())
    }

    async fn validate(&self) -> StorageResult<()> {
        tracing::info!(target: "enminst::snapshots", "validating LMS snapshots");
        let snapshots = self.snapshots().await?;
        if snapshots.is_empty() {
            return Err(StorageError::NoSnapshots {
                tier: TierKind::LmsLvm,
            });
        }
        let mut problems = Self::snapshot_problems(&snapshots, "LMS", self.usage_tolerance);
        let expected: Vec<String> = match self.state.load_json(LMS_VOL_BKUP)? {
            Some(names) => names,
            None => self
                .volumes()
                .await?
                .into_iter()
                .filter(|v| v.lv_attr.starts_with(['-', 'o']))
                .map(|v| v.lv_name)
                .collect(),
        };
        for name in expected {
            if !snapshots.iter().any(|s| s.origin == name) {
                problems.push(format!("LMS : Snapshot for volume {name} not found"));
            }
        }
        if self.grub.current().is_none() || self.grub.saved().is_none() {
            problems.push("Grub files do not exist on LMS to restore".to_string());
        }
        report_problems(TierKind::LmsLvm, problems)
    }

    async fn restore(&self) -> StorageResult<()> {
        if let Some((file, save)) = self.grub.saved() {
            tracing::info!(target: "enminst::snapshots", file = %save.display(), "restoring grub file on LMS");
            copy(save, file).await?;
        }
        tracing::info!(target: "enminst::snapshots", tag = %self.tag, "restoring LMS snapshots");
        let output = self
            .runner
            .run_checked(
                &CommandSpec::new("lvconvert")
                    .arg("--merge")
                    .args(tag_args(&self.tag)),
            )
            .await
            .map_err(|e| StorageError::restore(TierKind::LmsLvm, e.to_string()))?;
        let lines = output_lines(&output.stdout);
        if lines.is_empty() {
            tracing::info!(target: "enminst::snapshots", "no snapshots found for restore");
        }
        for line in lines {
            tracing::info!(target: "enminst::snapshots", "LMS : {line}");
        }
        Ok(())
    }

    async fn remove(&self) -> StorageResult<()> {
        tracing::info!(target: "enminst::snapshots", tag = %self.tag, "deleting LMS snapshots");
        let output = self
            .runner
            .run_checked(&CommandSpec::new("lvremove").arg("-f").args(tag_args(&self.tag)))
            .await?;
        let lines = output_lines(&output.stdout);
        if lines.is_empty() {
            tracing::info!(target: "enminst::snapshots", "LMS : no LV snapshots found to delete");
        }
        for line in lines {
            tracing::info!(target: "enminst::snapshots", "LMS : {line}");
        }
        if let Some((_, save)) = self.grub.saved() {
            tracing::info!(target: "enminst::snapshots", file = %save.display(), "removing the LMS backup grub file");
            tokio::fs::remove_file(save)
                .await
                .map_err(|e| RuntimeError::io(save, e))?;
        }
        self.state.remove(LMS_VOL_BKUP)?;
        Ok(())
    }
}

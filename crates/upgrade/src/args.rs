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

//! Upgrade arguments and the rules for combining them.

use std::path::{Path, PathBuf};

use model::patch::PatchMarker;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::{UpgradeError, UpgradeResult};

pub const MAX_OS_PATCHES: usize = 3;

/// One upgrade invocation. Persisted as the params file so a resumed run
/// sees the same inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpgradeArgs {
    pub os_patch: Vec<PathBuf>,
    pub litp_iso: Option<PathBuf>,
    pub enm_iso: Option<PathBuf>,
    pub rhel7_9_iso: Option<PathBuf>,
    pub sed_file: Option<PathBuf>,
    pub model_xml: Option<PathBuf>,
    pub lvm_snapsize: Option<u32>,
    pub regenerate_keys: bool,
    pub noreboot: bool,
    pub internal_model: bool,
    pub expansion_upgrade: bool,
    pub resume: bool,
    pub disable_hc: bool,
    pub disable_hcs: Vec<String>,
    pub assumeyes: bool,
    pub verbose: bool,
}

impl UpgradeArgs {
    fn has_main_params(&self) -> bool {
        self.lvm_snapsize.is_some()
            || self.regenerate_keys
            || self.disable_hc
            || !self.disable_hcs.is_empty()
            || !self.os_patch.is_empty()
            || self.litp_iso.is_some()
            || self.noreboot
            || self.sed_file.is_some()
            || self.model_xml.is_some()
            || self.enm_iso.is_some()
            || self.rhel7_9_iso.is_some()
            || self.internal_model
            || self.expansion_upgrade
    }

    fn has_artifact(&self) -> bool {
        !self.os_patch.is_empty()
            || self.litp_iso.is_some()
            || self.enm_iso.is_some()
            || self.sed_file.is_some()
            || self.model_xml.is_some()
            || self.rhel7_9_iso.is_some()
    }

    /// Site values are pushed straight into the model, without a plan.
    pub fn is_internal_model(&self) -> bool {
        self.internal_model && self.sed_file.is_some()
    }

    /// A new description with no software to import.
    pub fn is_model_only(&self) -> bool {
        self.model_xml.is_some()
            && self.sed_file.is_some()
            && self.os_patch.is_empty()
            && self.litp_iso.is_none()
            && self.enm_iso.is_none()
    }

    /// Checks the combination against the rules of a run. `previous`
    /// holds the patch markers left by earlier runs.
    pub fn validate(&self, previous: &[PatchMarker]) -> UpgradeResult<()> {
        if self.resume {
            if self.has_main_params() {
                return Err(UpgradeError::usage(
                    "--resume parameter invalidly used with other parameters",
                ));
            }
            return Ok(());
        }
        if !self.has_artifact() {
            return Err(UpgradeError::usage(
                "at least one of --patch_rhel, --litp_iso, --enm_iso, --sed, --model or --rhel7_9_iso is required",
            ));
        }
        if self.rhel7_9_iso.is_some() && self.os_patch.is_empty() {
            return Err(UpgradeError::usage(
                "RHEL upgrade requires OS Patch (--patch_rhel) option to be supplied",
            ));
        }
        if self.noreboot && self.os_patch.is_empty() {
            return Err(UpgradeError::usage("Option noreboot is allowed only if OS_PATCH is set"));
        }
        if self.os_patch.len() > MAX_OS_PATCHES {
            return Err(UpgradeError::usage(format!(
                "at most {MAX_OS_PATCHES} OS patch files may be supplied"
            )));
        }
        check_duplicate_patches(&self.os_patch)?;
        if self.sed_file.is_some() != self.model_xml.is_some() && !self.internal_model {
            return Err(UpgradeError::usage("Upgrade requires both SED and Model XML options"));
        }
        if self.model_xml.is_some() && previous.first() == Some(&PatchMarker::WithoutModel) {
            return Err(UpgradeError::usage(
                "Upgrade was previously ran with --patch_rhel argument without --model. \
                 Upgrade requires model and sed args to be removed to complete OS patch upgrade of blades.",
            ));
        }
        let internal_conflict = self.enm_iso.is_some()
            || self.litp_iso.is_some()
            || self.lvm_snapsize.is_some()
            || self.model_xml.is_some()
            || self.noreboot
            || !self.os_patch.is_empty()
            || self.regenerate_keys
            || self.resume;
        if self.internal_model && internal_conflict {
            return Err(UpgradeError::usage(
                "--internal_model_only used invalidly with other parameters",
            ));
        }
        Ok(())
    }
}

fn file_digest(path: &Path) -> UpgradeResult<String> {
    let bytes = std::fs::read(path).map_err(|e| UpgradeError::io(path, e))?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Rejects patch files with identical content.
pub fn check_duplicate_patches(patches: &[PathBuf]) -> UpgradeResult<()> {
    if patches.len() < 2 {
        return Ok(());
    }
    let mut seen: Vec<(String, &PathBuf)> = Vec::new();
    for patch in patches {
        let digest = file_digest(patch)?;
        if let Some((_, first)) = seen.iter().find(|(d, _)| *d == digest) {
            return Err(UpgradeError::DuplicatePatch {
                first: (*first).clone(),
                second: patch.clone(),
            });
        }
        seen.push((digest, patch));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_model() -> UpgradeArgs {
        UpgradeArgs {
            sed_file: Some("/tmp/sed.txt".into()),
            model_xml: Some("/tmp/dd.xml".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_resume_excludes_artifacts() {
        let args = UpgradeArgs {
            resume: true,
            ..Default::default()
        };
        assert!(args.validate(&[]).is_ok());

        let args = UpgradeArgs {
            resume: true,
            enm_iso: Some("/tmp/enm.iso".into()),
            ..Default::default()
        };
        assert!(args.validate(&[]).unwrap_err().is_usage());
    }

    #[test]
    fn test_resume_excludes_rhel_iso_and_expansion() {
        let args = UpgradeArgs {
            resume: true,
            rhel7_9_iso: Some("/tmp/rhel79.iso".into()),
            ..Default::default()
        };
        let err = args.validate(&[]).unwrap_err();
        assert!(err.is_usage());
        assert_eq!(err.exit_code(), model::ExitCode::InvalidUsage);

        let args = UpgradeArgs {
            resume: true,
            expansion_upgrade: true,
            ..Default::default()
        };
        assert!(args.validate(&[]).unwrap_err().is_usage());
    }

    #[test]
    fn test_needs_an_artifact() {
        let err = UpgradeArgs::default().validate(&[]).unwrap_err();
        assert!(err.is_usage());
    }

    #[test]
    fn test_sed_and_model_go_together() {
        let args = UpgradeArgs {
            sed_file: Some("/tmp/sed.txt".into()),
            ..Default::default()
        };
        assert!(args.validate(&[]).is_err());
        assert!(with_model().validate(&[]).is_ok());

        let internal = UpgradeArgs {
            sed_file: Some("/tmp/sed.txt".into()),
            internal_model: true,
            ..Default::default()
        };
        assert!(internal.validate(&[]).is_ok());
        assert!(internal.is_internal_model());
        assert!(!internal.is_model_only());
    }

    #[test]
    fn test_internal_model_conflicts() {
        let args = UpgradeArgs {
            sed_file: Some("/tmp/sed.txt".into()),
            internal_model: true,
            regenerate_keys: true,
            ..Default::default()
        };
        assert!(args.validate(&[]).unwrap_err().is_usage());
    }

    #[test]
    fn test_rhel_and_noreboot_need_a_patch() {
        let rhel = UpgradeArgs {
            rhel7_9_iso: Some("/tmp/rhel.iso".into()),
            ..Default::default()
        };
        assert!(rhel.validate(&[]).is_err());

        let noreboot = UpgradeArgs {
            noreboot: true,
            ..with_model()
        };
        assert!(noreboot.validate(&[]).is_err());
    }

    #[test]
    fn test_model_rejected_after_patch_without_model() {
        let err = with_model().validate(&[PatchMarker::WithoutModel]).unwrap_err();
        assert!(err.is_usage());
        assert!(with_model()
            .validate(&[PatchMarker::with_cxp("9041797", "1.2.1")])
            .is_ok());
    }

    #[test]
    fn test_duplicate_patches_by_content() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.tar.gz");
        let b = dir.path().join("b.tar.gz");
        let c = dir.path().join("c.tar.gz");
        std::fs::write(&a, b"patch one").unwrap();
        std::fs::write(&b, b"patch two").unwrap();
        std::fs::write(&c, b"patch one").unwrap();

        assert!(check_duplicate_patches(&[a.clone(), b.clone()]).is_ok());
        let err = check_duplicate_patches(&[a.clone(), b, c.clone()]).unwrap_err();
        assert!(matches!(err, UpgradeError::DuplicatePatch { ref first, ref second } if *first == a && *second == c));
    }

    #[test]
    fn test_too_many_patches() {
        let args = UpgradeArgs {
            os_patch: vec!["/a".into(), "/b".into(), "/c".into(), "/d".into()],
            ..Default::default()
        };
        assert!(args.validate(&[]).unwrap_err().is_usage());
    }
}

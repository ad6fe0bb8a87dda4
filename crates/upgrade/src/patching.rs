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

//! OS patch bundles on the management server.
//!
//! A bundle is an ISO image or a gzipped tarball holding a RHEL package
//! set and a `RHEL_OS_Patch_Set_CXP*` rpm that names it. Each bundle is
//! imported into the updates repository once; the marker file remembers
//! which bundle versions are done so a run repeated after the reboot skips
//! them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use mco::PuppetAgent;
use model::patch::{PatchMarker, parse_patch_file_name};
use once_cell::sync::Lazy;
use regex::Regex;
use runtime::mount::IsoMount;
use runtime::state::RHEL_COPIED;
use runtime::{CommandRunner, CommandSpec, RunStateStore};
use snapshots::SnapshotError;
use snapshots::services::wait_puppet_quiesced;

use crate::errors::{UpgradeError, UpgradeResult};
use crate::paths::UpgradePaths;

const ISO_FILE_TYPE: &str = "ISO 9660 CD-ROM filesystem data";
const TGZ_FILE_TYPE: &str = "gzip compressed data";
const CONFIG_SCRIPT: &str = "RHEL/config_patches.sh";
const PATCH_SET_RPM: &str = "RHEL_OS_Patch_Set_CXP*";
const RHEL_RELEASE: &str = "7.9";
/// `yum check-update` exit status when updates are available.
const UPDATES_AVAILABLE: i32 = 100;
const PUPPET_POLL: Duration = Duration::from_secs(3);

static CXP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#""cxp":\s*"(\d+)""#).expect("static regex is valid"));
static RHEL_VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""rhel_version":\s*"(\d+\.\d+)""#).expect("static regex is valid"));
static KERNEL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^kernel-(\S+)").expect("static regex is valid"));

fn yum(args: &[&str]) -> CommandSpec {
    CommandSpec::new("yum").args(["-y", "--disablerepo=*", "--enablerepo=UPDATES"]).args(args.iter().copied())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleKind {
    Iso,
    Tarball,
}

/// What the patch set rpm says about its bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleInfo {
    pub cxp: String,
    pub version: String,
    pub rhel_version: String,
}

impl BundleInfo {
    pub fn marker(&self) -> PatchMarker {
        PatchMarker::with_cxp(&self.cxp, &self.version)
    }
}

/// Reads the CXP number and RHEL version from the patch set rpm's payload;
/// the bundle version comes from the rpm file name.
pub fn parse_bundle_info(rpm_path: &str, payload: &str) -> Option<BundleInfo> {
    let cxp = CXP_RE.captures(payload)?.get(1)?.as_str().to_string();
    let rhel_version = RHEL_VERSION_RE.captures(payload)?.get(1)?.as_str().to_string();
    let file_name = Path::new(rpm_path).file_name()?.to_string_lossy().into_owned();
    let version = parse_patch_file_name(&file_name)
        .map(|(_, v)| v.trim_end_matches(".rpm").trim_end_matches(".noarch").to_string())
        .unwrap_or_default();
    Some(BundleInfo {
        cxp,
        version,
        rhel_version,
    })
}

/// Release of the newest installed kernel from `rpm -q --last kernel`.
pub fn last_kernel_release(rpm_output: &str) -> Option<&str> {
    let first = rpm_output.lines().next()?;
    Some(KERNEL_RE.captures(first)?.get(1)?.as_str())
}

fn find_packages_dir(root: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(root).ok()?;
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    for dir in &dirs {
        if dir.file_name().is_some_and(|n| n.eq_ignore_ascii_case("packages")) {
            return Some(dir.clone());
        }
    }
    dirs.iter().find_map(|d| find_packages_dir(d))
}

// Keeps the unpacked bundle alive: an ISO stays mounted and an extracted
// tarball stays on disk until dropped.
#[derive(Debug)]
enum Unpacked {
    Mounted(IsoMount),
    Extracted(tempfile::TempDir),
}

impl Unpacked {
    fn path(&self) -> &Path {
        match self {
            Unpacked::Mounted(m) => m.path(),
            Unpacked::Extracted(d) => d.path(),
        }
    }
}

/// Result of applying the patch bundles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchOutcome {
    pub imported: Vec<BundleInfo>,
    pub skipped: Vec<BundleInfo>,
    pub packages_upgraded: bool,
    pub reboot_required: bool,
}

#[derive(Debug)]
pub struct OsPatcher<'a> {
    runner: &'a dyn CommandRunner,
    state: &'a RunStateStore,
    paths: &'a UpgradePaths,
    kernel_release: &'a str,
}

impl<'a> OsPatcher<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        state: &'a RunStateStore,
        paths: &'a UpgradePaths,
        kernel_release: &'a str,
    ) -> Self {
        Self {
            runner,
            state,
            paths,
            kernel_release,
        }
    }

    pub async fn bundle_kind(&self, file: &Path) -> UpgradeResult<BundleKind> {
        let out = self
            .runner
            .run_checked(&CommandSpec::new("file").arg("-b").arg(file.display().to_string()))
            .await?;
        if out.stdout.contains(ISO_FILE_TYPE) {
            Ok(BundleKind::Iso)
        } else if out.stdout.contains(TGZ_FILE_TYPE) {
            Ok(BundleKind::Tarball)
        } else {
            Err(UpgradeError::patch(file, "file type is neither .tar.gz nor .iso"))
        }
    }

    async fn unpack(&self, file: &Path) -> UpgradeResult<Unpacked> {
        match self.bundle_kind(file).await? {
            BundleKind::Iso => Ok(Unpacked::Mounted(IsoMount::mount(self.runner, file).await?)),
            BundleKind::Tarball => {
                let dir = tempfile::Builder::new()
                    .prefix("os_patch_")
                    .tempdir()
                    .map_err(|e| UpgradeError::io(std::env::temp_dir(), e))?;
                tracing::debug!(target: "enminst::upgrade", patch = %file.display(), dir = %dir.path().display(), "extracting");
                self.runner
                    .run_checked(
                        &CommandSpec::new("tar")
                            .arg("-xzf")
                            .arg(file.display().to_string())
                            .arg("-C")
                            .arg(dir.path().display().to_string()),
                    )
                    .await?;
                Ok(Unpacked::Extracted(dir))
            }
        }
    }

    async fn run_config_script(&self, root: &Path) -> UpgradeResult<()> {
        let script = root.join(CONFIG_SCRIPT);
        if !script.is_file() {
            return Ok(());
        }
        let out = self
            .runner
            .run_checked(&CommandSpec::new(script.display().to_string()))
            .await?;
        tracing::info!(target: "enminst::upgrade", output = %out.stdout.trim(), "patch config script finished");
        Ok(())
    }

    async fn bundle_info(&self, file: &Path, root: &Path) -> UpgradeResult<(String, BundleInfo)> {
        let out = self
            .runner
            .run_checked(
                &CommandSpec::new("find")
                    .arg(root.join("RHEL").display().to_string())
                    .args(["-name", PATCH_SET_RPM]),
            )
            .await?;
        let Some(rpm) = out.stdout.lines().map(str::trim).find(|l| !l.is_empty()) else {
            return Err(UpgradeError::patch(file, "no RHEL_OS_Patch_Set rpm in the bundle"));
        };
        let payload = self
            .runner
            .run_checked(&CommandSpec::new("sh").arg("-c").arg(format!("rpm2cpio {rpm} | cpio -i --to-stdout")))
            .await?;
        let info = parse_bundle_info(rpm, &payload.stdout)
            .ok_or_else(|| UpgradeError::patch(file, "patch set rpm carries no CXP number or RHEL version"))?;
        Ok((rpm.to_string(), info))
    }

    fn updates_repo(&self, rhel_version: &str) -> PathBuf {
        self.paths
            .yum_repo_root
            .join(rhel_version)
            .join("updates/x86_64/Packages")
    }

    async fn import(&self, file: &Path, root: &Path, info: &BundleInfo) -> UpgradeResult<()> {
        let packages = find_packages_dir(root)
            .ok_or_else(|| UpgradeError::patch(file, "no packages directory in the bundle"))?;
        let repo = self.updates_repo(&info.rhel_version);
        std::fs::create_dir_all(&repo).map_err(|e| UpgradeError::io(&repo, e))?;
        tracing::info!(target: "enminst::upgrade", cxp = %info.cxp, version = %info.version, repo = %repo.display(), "importing patch packages");
        self.runner
            .run_checked(
                &CommandSpec::new("/usr/bin/litp")
                    .arg("import")
                    .arg(packages.display().to_string())
                    .arg(repo.display().to_string()),
            )
            .await?;
        Ok(())
    }

    /// Copies the RHEL DVD into the OS repository once.
    pub async fn copy_rhel_iso(&self, iso: &Path) -> UpgradeResult<()> {
        if self.state.exists(RHEL_COPIED) {
            tracing::info!(target: "enminst::upgrade", "RHEL ISO already copied");
            return Ok(());
        }
        let os = self.paths.yum_repo_root.join(RHEL_RELEASE).join("os/x86_64");
        let updates = self.updates_repo(RHEL_RELEASE);
        for dir in [&os, &updates] {
            std::fs::create_dir_all(dir).map_err(|e| UpgradeError::io(dir, e))?;
        }
        let mount = IsoMount::mount(self.runner, iso).await?;
        self.runner
            .run_checked(
                &CommandSpec::new("rsync")
                    .arg("-rtd")
                    .arg(format!("{}/", mount.path().display()))
                    .arg(os.display().to_string()),
            )
            .await?;
        for repo in [os.join("Packages"), updates] {
            self.runner
                .run_checked(&CommandSpec::new("createrepo").arg("-C").arg(repo.display().to_string()))
                .await?;
        }
        drop(mount);
        self.state.write_atomic(RHEL_COPIED, RHEL_RELEASE.as_bytes())?;
        tracing::info!(target: "enminst::upgrade", iso = %iso.display(), "RHEL ISO copied");
        Ok(())
    }

    /// Imports every bundle not applied yet, then upgrades the management
    /// server's packages from the updates repository.
    pub async fn apply(&self, patches: &[PathBuf], with_model: bool) -> UpgradeResult<PatchOutcome> {
        let mut outcome = PatchOutcome::default();
        for file in patches {
            tracing::info!(target: "enminst::upgrade", patch = %file.display(), "unpacking patch file");
            let unpacked = self.unpack(file).await?;
            self.run_config_script(unpacked.path()).await?;
            let (_, info) = self.bundle_info(file, unpacked.path()).await?;
            if !info.version.is_empty() && self.state.has_patch_marker(&info.marker())? {
                tracing::info!(target: "enminst::upgrade", cxp = %info.cxp, version = %info.version, "patch already applied, skipping");
                outcome.skipped.push(info);
                continue;
            }
            self.import(file, unpacked.path(), &info).await?;
            outcome.imported.push(info);
        }

        if !outcome.imported.is_empty() {
            self.runner.run_checked(&CommandSpec::new("puppet").args(["agent", "--disable"])).await?;
            let upgraded = self.upgrade_packages().await;
            self.runner.run_checked(&CommandSpec::new("puppet").args(["agent", "--enable"])).await?;
            outcome.packages_upgraded = upgraded?;

            if !with_model && self.state.patch_markers()?.is_empty() {
                self.state.append_patch_marker(&PatchMarker::WithoutModel)?;
            }
            for info in &outcome.imported {
                self.state.append_patch_marker(&info.marker())?;
            }
        }
        outcome.reboot_required = self.reboot_required().await?;
        Ok(outcome)
    }

    async fn upgrade_packages(&self) -> UpgradeResult<bool> {
        self.runner.run_checked(&CommandSpec::new("yum").args(["clean", "all"])).await?;
        let check = self.runner.run(&yum(&["check-update"])).await?;
        match check.code {
            0 => {
                tracing::info!(target: "enminst::upgrade", "OS patches are up to date, no update needed");
                Ok(false)
            }
            UPDATES_AVAILABLE => {
                tracing::info!(target: "enminst::upgrade", "yum is upgrading packages");
                self.runner.run_checked(&yum(&["upgrade"])).await?;
                Ok(true)
            }
            code => Err(runtime::RuntimeError::CommandFailed {
                command: yum(&["check-update"]).command_line(),
                code,
                stderr: check.stderr,
            }
            .into()),
        }
    }

    /// Whether the newest installed kernel differs from the running one.
    pub async fn reboot_required(&self) -> UpgradeResult<bool> {
        let out = self
            .runner
            .run_checked(&CommandSpec::new("/bin/rpm").args(["-q", "--last", "kernel"]))
            .await?;
        match last_kernel_release(&out.stdout) {
            Some(last) if last == self.kernel_release => {
                tracing::info!(target: "enminst::upgrade", kernel = %last, "reboot is not required, kernel release has not changed");
                Ok(false)
            }
            Some(last) => {
                tracing::warn!(target: "enminst::upgrade", running = %self.kernel_release, installed = %last, "reboot is required to update the kernel");
                Ok(true)
            }
            None => {
                tracing::warn!(target: "enminst::upgrade", "unable to determine the release of the last installed kernel");
                Ok(true)
            }
        }
    }
}

/// Reboots the management server once puppet is quiet on the nodes. With
/// `noreboot` the operator is told to do it.
pub async fn handle_reboot(
    runner: &dyn CommandRunner,
    puppet: &PuppetAgent,
    puppet_timeout: Duration,
    noreboot: bool,
) -> UpgradeResult<()> {
    const NEXT_STEP: &str = "Please continue the upgrade after restart to propagate the updates to peer nodes";
    puppet.disable(&[], "OS patches applied on the management server").await?;
    if noreboot {
        tracing::warn!(target: "enminst::upgrade", "Please shutdown the system manually. {NEXT_STEP}");
        return Ok(());
    }
    match wait_puppet_quiesced(puppet, puppet_timeout, PUPPET_POLL).await {
        Ok(()) => {}
        Err(SnapshotError::PuppetBusy { hosts, .. }) => {
            tracing::warn!(target: "enminst::upgrade", hosts = ?hosts, "puppet run did not finish in time");
        }
        Err(e) => return Err(e.into()),
    }
    tracing::info!(target: "enminst::upgrade", "Shutting down the system. {NEXT_STEP}");
    runner.run_checked(&CommandSpec::new("/sbin/shutdown").args(["-r", "now"])).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mco::Mco;
    use mco::testing::MockTransport;
    use runtime::CommandOutput;
    use runtime::testing::ScriptedRunner;
    use std::sync::Arc;

    const RPM: &str = "/tmp/x/RHEL/RHEL_OS_Patch_Set_CXP9041797-1.23.4.rpm";
    const PAYLOAD: &str = r#"  "rhel_version": "7.9",
  "cxp": "9041797","#;

    #[test]
    fn test_parse_bundle_info() {
        let info = parse_bundle_info(RPM, PAYLOAD).unwrap();
        assert_eq!(
            info,
            BundleInfo {
                cxp: "9041797".into(),
                version: "1.23.4".into(),
                rhel_version: "7.9".into(),
            }
        );
        assert_eq!(info.marker().to_string(), "patch_with_CXP9041797:1.23.4");
        assert!(parse_bundle_info(RPM, "{}").is_none());
    }

    #[test]
    fn test_last_kernel_release() {
        let out = "kernel-3.10.0-1160.102.1.el7.x86_64   Tue 01 Aug 2023\nkernel-3.10.0-1160.el7.x86_64  Mon";
        assert_eq!(last_kernel_release(out), Some("3.10.0-1160.102.1.el7.x86_64"));
        assert_eq!(last_kernel_release(""), None);
    }

    #[test]
    fn test_find_packages_dir() {
        let dir = tempfile::tempdir().unwrap();
        let packages = dir.path().join("RHEL/RHEL7.9/Packages");
        std::fs::create_dir_all(&packages).unwrap();
        std::fs::create_dir_all(dir.path().join("RHEL/docs")).unwrap();
        assert_eq!(find_packages_dir(dir.path()), Some(packages));
    }

    fn tarball_runner() -> ScriptedRunner {
        ScriptedRunner::new()
            .on("file -b", CommandOutput::ok("gzip compressed data, from Unix"))
            .on("find", CommandOutput::ok(format!("{RPM}\n")))
            .on("rpm2cpio", CommandOutput::ok(PAYLOAD))
            .on("rpm -q --last kernel", CommandOutput::ok("kernel-3.10.0-1160.el7.x86_64  Mon"))
    }

    #[tokio::test]
    async fn test_applied_bundle_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let state = RunStateStore::new(dir.path());
        state
            .append_patch_marker(&PatchMarker::with_cxp("9041797", "1.23.4"))
            .unwrap();
        let paths = UpgradePaths::rooted(dir.path());
        let runner = tarball_runner();
        let patcher = OsPatcher::new(&runner, &state, &paths, "3.10.0-1160.el7.x86_64");

        let outcome = patcher.apply(&[PathBuf::from("/tmp/patch.tar.gz")], true).await.unwrap();

        assert_eq!(outcome.skipped.len(), 1);
        assert!(outcome.imported.is_empty());
        assert!(!outcome.reboot_required);
        assert!(!runner.called("litp import"));
        assert!(!runner.called("yum"));
    }

    #[tokio::test]
    async fn test_unknown_file_type_fails() {
        let dir = tempfile::tempdir().unwrap();
        let state = RunStateStore::new(dir.path());
        let paths = UpgradePaths::rooted(dir.path());
        let runner = ScriptedRunner::new().on("file -b", CommandOutput::ok("ASCII text"));
        let patcher = OsPatcher::new(&runner, &state, &paths, "3.10");
        let err = patcher.apply(&[PathBuf::from("/tmp/notes.txt")], true).await.unwrap_err();
        assert!(matches!(err, UpgradeError::PatchFile { .. }));
    }

    #[tokio::test]
    async fn test_updates_available_upgrades_packages() {
        let dir = tempfile::tempdir().unwrap();
        let state = RunStateStore::new(dir.path());
        let paths = UpgradePaths::rooted(dir.path());
        let runner = ScriptedRunner::new().on("check-update", CommandOutput::failed(100, ""));
        let patcher = OsPatcher::new(&runner, &state, &paths, "3.10");
        assert!(patcher.upgrade_packages().await.unwrap());
        assert!(runner.called("yum -y --disablerepo=* --enablerepo=UPDATES upgrade"));

        let runner = ScriptedRunner::new().on("check-update", CommandOutput::failed(1, "repo broken"));
        let patcher = OsPatcher::new(&runner, &state, &paths, "3.10");
        assert!(patcher.upgrade_packages().await.is_err());
    }

    #[tokio::test]
    async fn test_kernel_change_requires_reboot() {
        let dir = tempfile::tempdir().unwrap();
        let state = RunStateStore::new(dir.path());
        let paths = UpgradePaths::rooted(dir.path());
        let runner = ScriptedRunner::new().on(
            "rpm -q --last kernel",
            CommandOutput::ok("kernel-3.10.0-1160.102.1.el7.x86_64  Tue"),
        );
        let patcher = OsPatcher::new(&runner, &state, &paths, "3.10.0-1160.el7.x86_64");
        assert!(patcher.reboot_required().await.unwrap());
    }

    #[tokio::test]
    async fn test_noreboot_leaves_system_up() {
        let runner = ScriptedRunner::new();
        let transport = Arc::new(MockTransport::new());
        let puppet = PuppetAgent::new(Mco::new(transport.clone()));
        handle_reboot(&runner, &puppet, Duration::from_secs(1), true).await.unwrap();
        assert!(!runner.called("shutdown"));
        assert!(transport.called(mco::AgentAction::PuppetDisable));
    }

    #[tokio::test]
    async fn test_reboot_after_puppet_quiet() {
        let runner = ScriptedRunner::new();
        let transport = Arc::new(MockTransport::new());
        let puppet = PuppetAgent::new(Mco::new(transport.clone()));
        handle_reboot(&runner, &puppet, Duration::from_secs(1), false).await.unwrap();
        assert!(runner.called("/sbin/shutdown -r now"));
    }
}

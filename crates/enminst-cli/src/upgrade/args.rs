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

use std::path::PathBuf;

use clap::Parser;
use upgrade::UpgradeArgs;

#[derive(Parser, Debug, Clone)]
pub struct Cmd {
    #[clap(long = "sed", help = "Site engineering document with the site values")]
    pub sed: Option<PathBuf>,

    #[clap(long = "model", help = "Deployment description XML of the new model")]
    pub model: Option<PathBuf>,

    #[clap(long = "enm_iso", help = "ENM ISO to import")]
    pub enm_iso: Option<PathBuf>,

    #[clap(long = "litp_iso", help = "LITP ISO to import")]
    pub litp_iso: Option<PathBuf>,

    #[clap(
        long = "patch_rhel",
        num_args = 1..=3,
        help = "One to three OS patch set tarballs"
    )]
    pub patch_rhel: Vec<PathBuf>,

    #[clap(long = "rhel7_9_iso", help = "RHEL 7.9 ISO, requires --patch_rhel")]
    pub rhel7_9_iso: Option<PathBuf>,

    #[clap(long = "lvm_snapsize", help = "LVM snapshot size as a percentage of the volume")]
    pub lvm_snapsize: Option<u32>,

    #[clap(long = "regenerate_keys", help = "Regenerate the VM SSH keys")]
    pub regenerate_keys: bool,

    #[clap(long = "noreboot", help = "Do not reboot the management server after OS patching")]
    pub noreboot: bool,

    #[clap(
        long = "internal_model_only",
        help = "Push the site values of --sed into the deployment model without a plan"
    )]
    pub internal_model_only: bool,

    #[clap(long = "expansion_upgrade", help = "Allow the new model to add nodes or clusters")]
    pub expansion_upgrade: bool,

    #[clap(long = "resume", help = "Resume a failed upgrade plan")]
    pub resume: bool,

    #[clap(long = "disable_hc", help = "Skip the pre-upgrade health checks")]
    pub disable_hc: bool,

    #[clap(
        long = "disable_hcs",
        value_delimiter = ',',
        help = "Comma separated health checks to skip"
    )]
    pub disable_hcs: Vec<String>,
}

impl Cmd {
    pub fn into_upgrade_args(self, assumeyes: bool, verbose: bool) -> UpgradeArgs {
        UpgradeArgs {
            os_patch: self.patch_rhel,
            litp_iso: self.litp_iso,
            enm_iso: self.enm_iso,
            rhel7_9_iso: self.rhel7_9_iso,
            sed_file: self.sed,
            model_xml: self.model,
            lvm_snapsize: self.lvm_snapsize,
            regenerate_keys: self.regenerate_keys,
            noreboot: self.noreboot,
            internal_model: self.internal_model_only,
            expansion_upgrade: self.expansion_upgrade,
            resume: self.resume,
            disable_hc: self.disable_hc,
            disable_hcs: self.disable_hcs,
            assumeyes,
            verbose,
        }
    }
}

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

use std::sync::Arc;

use bmc::BmcAdapter;
use litp::{LitpClient, LitpPasswordStore, ModelApi, PasswordStore};
use mco::{Mco, McoCliTransport};
use runtime::{AssumeYes, Config, Confirm, Interactive, Platform, RuntimeContext};
use vcs::Vcs;

use crate::cfg::cli_options::CliOptions;
use crate::errors::CliResult;
use crate::output::OutputFormat;

/// Clients shared by every command, built once from the configuration.
#[derive(Debug, Clone)]
pub struct CliContext {
    pub runtime: RuntimeContext,
    pub model: Arc<dyn ModelApi>,
    pub mco: Mco,
    pub bmc: Arc<dyn BmcAdapter>,
    pub passwords: Arc<dyn PasswordStore>,
    pub format: OutputFormat,
    pub assumeyes: bool,
    pub verbose: bool,
}

impl CliContext {
    pub fn build(options: &CliOptions, config: Config, platform: Platform) -> CliResult<Self> {
        let confirm: Arc<dyn Confirm> = if options.assumeyes {
            Arc::new(AssumeYes)
        } else {
            Arc::new(Interactive)
        };
        let runtime = RuntimeContext::new(config, platform).with_confirm(confirm);
        let model: Arc<dyn ModelApi> = Arc::new(LitpClient::from_config(&runtime.config)?);
        let mco = Mco::new(Arc::new(McoCliTransport::new(runtime.runner.clone())));
        let bmc = bmc::select_adapter(&runtime.config.cloud_bmc_sentinel, runtime.runner.clone())?;
        tracing::debug!(
            target: "enminst::cli",
            litp = %runtime.config.litp_rest_url(),
            virtual_provider = ?runtime.platform.virtual_provider,
            "clients ready"
        );
        Ok(Self {
            model,
            mco,
            bmc,
            passwords: Arc::new(LitpPasswordStore::default()),
            format: options.format,
            assumeyes: options.assumeyes,
            verbose: options.verbose > 0,
            runtime,
        })
    }

    pub fn vcs(&self) -> Vcs {
        Vcs::from_context(&self.runtime, self.model.clone(), self.mco.clone())
    }

    /// Asks the operator, answering yes by itself under `--assumeyes`.
    pub fn confirm(&self, prompt: &str, strong: bool) -> bool {
        self.runtime.confirm.confirm(prompt, strong)
    }
}

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

use model::ExitCode;

/// Every failure a command can end with. The CLI is the only place that
/// turns one of these into a process exit status.
#[derive(thiserror::Error, Debug)]
pub enum EnminstCliError {
    #[error("{0}")]
    Usage(String),

    #[error("{0}")]
    Declined(String),

    #[error("{check} failed ({})", .code.name())]
    PrecheckFailed { check: String, code: ExitCode },

    #[error(transparent)]
    Upgrade(#[from] upgrade::UpgradeError),

    #[error(transparent)]
    Snapshot(#[from] snapshots::SnapshotError),

    #[error(transparent)]
    Vcs(#[from] vcs::VcsError),

    #[error(transparent)]
    Precheck(#[from] prechecks::PrecheckError),

    #[error(transparent)]
    Litp(#[from] litp::LitpError),

    #[error(transparent)]
    Bmc(#[from] bmc::BmcError),

    #[error(transparent)]
    Mco(#[from] mco::McoError),

    #[error(transparent)]
    Runtime(#[from] runtime::RuntimeError),

    #[error("I/O error: {0}")]
    IOError(#[from] std::io::Error),

    #[error("Error while handling json: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Error while handling yaml: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("{0}")]
    EyreReport(eyre::Report),
}

impl From<eyre::Report> for EnminstCliError {
    fn from(report: eyre::Report) -> Self {
        EnminstCliError::EyreReport(report)
    }
}

impl EnminstCliError {
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Usage(_) => ExitCode::InvalidUsage,
            Self::Declined(_) => ExitCode::Error,
            Self::PrecheckFailed { code, .. } => *code,
            Self::Upgrade(e) => e.exit_code(),
            Self::Snapshot(e) => e.exit_code(),
            Self::Vcs(e) => e.exit_code(),
            Self::Precheck(e) => e.exit_code(),
            Self::Litp(e) => e.exit_code(),
            Self::Bmc(e) => e.exit_code(),
            Self::Mco(e) => e.exit_code(),
            Self::Runtime(e) => e.exit_code(),
            Self::IOError(_) | Self::JsonError(_) | Self::YamlError(_) | Self::EyreReport(_) => {
                ExitCode::Error
            }
        }
    }
}

pub type CliResult<T> = Result<T, EnminstCliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(EnminstCliError::usage("bad").exit_code(), ExitCode::InvalidUsage);
        assert_eq!(
            EnminstCliError::from(vcs::VcsError::usage("bad view")).exit_code(),
            ExitCode::InvalidUsage
        );
        let failed = EnminstCliError::PrecheckFailed {
            check: "san_alert_check".to_string(),
            code: ExitCode::Error,
        };
        assert_eq!(failed.to_string(), "san_alert_check failed (ERROR)");
        assert_eq!(
            EnminstCliError::from(eyre::eyre!("boom")).exit_code(),
            ExitCode::Error
        );
    }
}

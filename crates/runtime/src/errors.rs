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

// src/errors.rs
// Errors raised by the runtime plumbing: config loading, persisted state,
// subprocesses and mounts.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuntimeError {
    // Configuration could not be assembled from defaults, file and env.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    // Reading or writing a persisted run state file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // A persisted file exists but its content could not be understood.
    #[error("Corrupt state file {path}: {message}")]
    CorruptState { path: PathBuf, message: String },

    // A subprocess could not be spawned at all.
    #[error("Failed to execute '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    // A subprocess ran past its deadline and was killed.
    #[error("Command '{command}' timed out after {timeout:?}")]
    CommandTimeout { command: String, timeout: Duration },

    // A subprocess exited non-zero where success was required.
    #[error("Command '{command}' failed with exit code {code}: {stderr}")]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    // Mounting or unmounting an image failed.
    #[error("Mount error for {path}: {message}")]
    Mount { path: PathBuf, message: String },

    // The operator declined a confirmation prompt.
    #[error("Operation cancelled by user")]
    Cancelled,

    #[error(transparent)]
    Model(#[from] model::ModelError),
}

impl RuntimeError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn corrupt(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::CorruptState {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::CommandTimeout { .. })
    }

    pub fn exit_code(&self) -> model::ExitCode {
        match self {
            Self::CommandTimeout { .. } => model::ExitCode::Timeout,
            _ => model::ExitCode::Error,
        }
    }
}

impl From<figment::Error> for RuntimeError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;

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
// Errors raised while parsing persisted or reported data into model types.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    // A string did not name a known state, stage or type.
    #[error("Unknown {kind} value: '{value}'")]
    UnknownValue { kind: &'static str, value: String },

    // A record (stage line, lvs row, patch marker) had the wrong shape.
    #[error("Malformed {kind}: '{value}'")]
    Malformed { kind: &'static str, value: String },

    // A required property is missing on a deployment item.
    #[error("Item {path} has no property '{property}'")]
    MissingProperty { path: String, property: String },

    // A property exists but is not an integer.
    #[error("Item {path} property '{property}' is not an integer: '{value}'")]
    NotAnInteger {
        path: String,
        property: String,
        value: String,
    },
}

impl ModelError {
    pub fn unknown(kind: &'static str, value: impl Into<String>) -> Self {
        Self::UnknownValue {
            kind,
            value: value.into(),
        }
    }

    pub fn malformed(kind: &'static str, value: impl Into<String>) -> Self {
        Self::Malformed {
            kind,
            value: value.into(),
        }
    }
}

pub type ModelResult<T> = Result<T, ModelError>;

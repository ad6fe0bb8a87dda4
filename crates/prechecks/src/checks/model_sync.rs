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

use litp::PlanOptions;

use crate::engine::PrecheckEngine;
use crate::errors::{FailureKind, PrecheckError, PrecheckResult};
use crate::report::CheckOutcome;

pub const MODEL_SYNCHRONISED: &str = "Model is synchronised";

impl PrecheckEngine {
    /// A plan with no changes to make proves the model and the deployment
    /// agree. A plan that could be created is removed again.
    pub(crate) async fn model_synchronized_check(&self) -> PrecheckResult<CheckOutcome> {
        if let Some(skip) = self.virtual_skip() {
            return Ok(skip);
        }
        match self.model.create_plan(&PlanOptions::default()).await {
            Err(e) if e.is_do_nothing_plan() => Ok(CheckOutcome::passed(MODEL_SYNCHRONISED)),
            Err(e) => Err(e.into()),
            Ok(()) => {
                if let Err(e) = self.model.delete_plan().await {
                    tracing::warn!(target: "enminst::prechecks", error = %e, "unable to remove the precheck plan");
                }
                Err(PrecheckError::check(
                    FailureKind::ModelNotSynchronised,
                    "The model has changes that are not applied to the deployment",
                ))
            }
        }
    }
}

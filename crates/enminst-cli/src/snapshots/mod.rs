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

pub mod args;
pub mod cmds;

#[cfg(test)]
mod tests;

pub use args::Cmd;

use crate::cfg::dispatch::Dispatch;
use crate::cfg::runtime::CliContext;
use crate::errors::CliResult;

impl Dispatch for Cmd {
    async fn dispatch(self, ctx: CliContext) -> CliResult<()> {
        match self {
            Cmd::Create(args) => cmds::create(args, &ctx).await,
            Cmd::List(args) => cmds::list(args, &ctx).await,
            Cmd::Validate(args) => cmds::validate(args, &ctx).await,
            Cmd::Restore(args) => cmds::restore(args, &ctx).await,
            Cmd::Remove(args) => cmds::remove(args, &ctx).await,
        }
    }
}

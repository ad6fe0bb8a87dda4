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
        let vcs = ctx.vcs();
        match self {
            Cmd::Groups(args) => cmds::groups(args, &ctx).await,
            Cmd::Systems(args) => cmds::systems(args, &ctx).await,
            Cmd::Online(args) => cmds::online(args, &vcs).await,
            Cmd::Offline(args) => cmds::offline(args, &vcs).await,
            Cmd::Restart(args) => cmds::restart(args, &vcs).await,
            Cmd::Switch(args) => cmds::switch(args, &vcs).await,
            Cmd::Clear(args) => cmds::clear(args, &vcs).await,
            Cmd::History(args) => cmds::history(args, &ctx).await,
            Cmd::Freeze(args) => cmds::freeze(args, &vcs).await,
            Cmd::Unfreeze(args) => cmds::unfreeze(args, &vcs).await,
            Cmd::Lock(args) => cmds::lock(args, &vcs).await,
            Cmd::Unlock(args) => cmds::unlock(args, &vcs).await,
        }
    }
}

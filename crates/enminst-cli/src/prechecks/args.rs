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

use clap::Parser;
use prechecks::PrecheckAction;

fn parse_action(value: &str) -> Result<PrecheckAction, String> {
    PrecheckAction::parse(value).map_err(|e| e.to_string())
}

#[derive(Parser, Debug, Clone)]
pub struct Cmd {
    #[clap(
        long = "action",
        value_delimiter = ',',
        value_parser = parse_action,
        help = "Checks to run, every upgrade prerequisite check when omitted"
    )]
    pub actions: Vec<PrecheckAction>,
}

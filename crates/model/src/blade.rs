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

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// BMC access details of one blade, as persisted in `blade_info` and
/// `removed_blades_info`. The password is the decrypted value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BladeCredential {
    pub cluster: String,
    pub hostname: String,
    pub username: String,
    pub iloaddress: String,
    pub password: String,
}

impl std::fmt::Debug for BladeCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BladeCredential")
            .field("cluster", &self.cluster)
            .field("hostname", &self.hostname)
            .field("username", &self.username)
            .field("iloaddress", &self.iloaddress)
            .field("password", &"********")
            .finish()
    }
}

/// Blade credentials keyed by system id.
pub type BladeInfo = BTreeMap<String, BladeCredential>;

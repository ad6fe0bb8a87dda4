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

//! Scripted transport used by tests across the workspace.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::action::AgentAction;
use crate::errors::McoResult;
use crate::transport::{HostReply, McoRequest, Transport};

// Key for host specific scripts; `None` host applies to every host.
type ScriptKey = (AgentAction, Option<String>);

/// Answers per (action, host). Scripted replies are consumed in order and
/// the last one repeats. Unscripted calls succeed with empty output unless
/// the host was marked silent.
#[derive(Debug, Default)]
pub struct MockTransport {
    scripts: Mutex<BTreeMap<String, VecDeque<HostReply>>>,
    silent: Mutex<BTreeSet<String>>,
    calls: Mutex<Vec<McoRequest>>,
}

fn key_string(key: &ScriptKey) -> String {
    match &key.1 {
        Some(host) => format!("{}@{host}", key.0),
        None => format!("{}@*", key.0),
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, action: AgentAction, host: impl Into<String>, reply: HostReply) -> Self {
        self.push((action, Some(host.into())), reply);
        self
    }

    /// Scripts a reply for every host targeted by `action`.
    pub fn reply_all(self, action: AgentAction, reply: HostReply) -> Self {
        self.push((action, None), reply);
        self
    }

    /// Marks a host as never answering any action.
    pub fn silent(self, host: impl Into<String>) -> Self {
        if let Ok(mut silent) = self.silent.lock() {
            silent.insert(host.into());
        }
        self
    }

    fn push(&self, key: ScriptKey, reply: HostReply) {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts.entry(key_string(&key)).or_default().push_back(reply);
        }
    }

    fn next(&self, key: &ScriptKey) -> Option<HostReply> {
        let mut scripts = self.scripts.lock().ok()?;
        let queue = scripts.get_mut(&key_string(key))?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }

    pub fn calls(&self) -> Vec<McoRequest> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn calls_for(&self, action: AgentAction) -> Vec<McoRequest> {
        self.calls()
            .into_iter()
            .filter(|c| c.action == action)
            .collect()
    }

    pub fn count(&self, action: AgentAction) -> usize {
        self.calls_for(action).len()
    }

    pub fn called(&self, action: AgentAction) -> bool {
        self.count(action) > 0
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn call(&self, request: &McoRequest) -> McoResult<BTreeMap<String, HostReply>> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request.clone());
        }
        let silent = self.silent.lock().map(|s| s.clone()).unwrap_or_default();
        let mut replies = BTreeMap::new();
        for host in &request.hosts {
            if silent.contains(host) {
                continue;
            }
            let reply = self
                .next(&(request.action, Some(host.clone())))
                .or_else(|| self.next(&(request.action, None)))
                .unwrap_or_else(|| HostReply::ok(""));
            replies.insert(host.clone(), reply);
        }
        Ok(replies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sequence_then_repeat() {
        let mock = MockTransport::new()
            .reply(AgentAction::HagrpState, "svc-1", HostReply::ok("OFFLINE"))
            .reply(AgentAction::HagrpState, "svc-1", HostReply::ok("ONLINE"))
            .silent("svc-3");
        let request = McoRequest::new(AgentAction::HagrpState).hosts(["svc-1", "svc-3"]);
        let first = mock.call(&request).await.unwrap();
        assert_eq!(first["svc-1"].data.out_text(), "OFFLINE");
        assert!(!first.contains_key("svc-3"));
        for _ in 0..2 {
            let next = mock.call(&request).await.unwrap();
            assert_eq!(next["svc-1"].data.out_text(), "ONLINE");
        }
        assert_eq!(mock.count(AgentAction::HagrpState), 3);
    }
}

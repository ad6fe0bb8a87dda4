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

//! In-memory model engine used by tests across the workspace.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use model::item::{DeploymentItem, ItemState};

use crate::api::{MaintenanceStatus, ModelApi, Properties, conflict, not_found};
use crate::crypt::PasswordStore;
use crate::errors::{LitpError, LitpErrorKind, LitpMessage, LitpResult};
use crate::plan::{PlanOptions, PlanState, PlanView};

#[derive(Debug)]
struct Inner {
    root: DeploymentItem,
    plan: Option<VecDeque<PlanState>>,
    plan_script: Vec<PlanState>,
    do_nothing_plan: bool,
    snapshots: Vec<String>,
    maintenance: bool,
    maintenance_status: Option<String>,
    exported_xml: String,
    failures: BTreeMap<String, LitpErrorKind>,
    calls: Vec<String>,
}

/// A deployment tree held in memory.
///
/// Intermediate items are created on demand as Applied collections. Plan
/// states are scripted: every plan read pops the next state and the last
/// one repeats.
#[derive(Debug)]
pub struct FakeModel {
    inner: Mutex<Inner>,
}

impl Default for FakeModel {
    fn default() -> Self {
        Self::new()
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn find<'a>(root: &'a DeploymentItem, path: &str) -> Option<&'a DeploymentItem> {
    segments(path)
        .into_iter()
        .try_fold(root, |item, id| item.child(id))
}

fn find_mut<'a>(root: &'a mut DeploymentItem, path: &str) -> Option<&'a mut DeploymentItem> {
    let mut item = root;
    for id in segments(path) {
        item = item.children.iter_mut().find(|c| c.id == id)?;
    }
    Some(item)
}

fn ensure<'a>(root: &'a mut DeploymentItem, path: &str) -> &'a mut DeploymentItem {
    let mut item = root;
    let mut current = String::new();
    for id in segments(path) {
        current.push('/');
        current.push_str(id);
        let pos = match item.children.iter().position(|c| c.id == id) {
            Some(pos) => pos,
            None => {
                item.children
                    .push(DeploymentItem::new(current.clone(), "collection", ItemState::Applied));
                item.children.len() - 1
            }
        };
        item = &mut item.children[pos];
    }
    item
}

fn shallow(item: &DeploymentItem) -> DeploymentItem {
    DeploymentItem {
        children: item
            .children
            .iter()
            .map(|c| DeploymentItem {
                children: Vec::new(),
                ..c.clone()
            })
            .collect(),
        ..item.clone()
    }
}

fn render(properties: &Properties) -> String {
    properties
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

impl FakeModel {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                root: DeploymentItem::new("/", "root", ItemState::Applied),
                plan: None,
                plan_script: vec![PlanState::Successful],
                do_nothing_plan: false,
                snapshots: Vec::new(),
                maintenance: false,
                maintenance_status: None,
                exported_xml: String::new(),
                failures: BTreeMap::new(),
                calls: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Adds (or replaces) an item, creating missing parents.
    pub fn with_item(self, path: &str, item_type: &str, state: ItemState, properties: &[(&str, &str)]) -> Self {
        {
            let mut inner = self.lock();
            let item = ensure(&mut inner.root, path);
            item.item_type = item_type.to_string();
            item.state = state;
            for (k, v) in properties {
                item.properties.insert((*k).to_string(), (*v).to_string());
            }
        }
        self
    }

    /// Adds a node under `/deployments/enm/clusters/<cluster>/nodes`.
    pub fn with_node(self, cluster: &str, node: &str, hostname: &str) -> Self {
        self.with_item(
            &format!("/deployments/enm/clusters/{cluster}/nodes/{node}"),
            "node",
            ItemState::Applied,
            &[("hostname", hostname)],
        )
    }

    /// Adds a clustered service under `/deployments/enm/clusters/<cluster>/services`.
    pub fn with_service(self, cluster: &str, service: &str, state: ItemState, properties: &[(&str, &str)]) -> Self {
        self.with_item(
            &format!("/deployments/enm/clusters/{cluster}/services/{service}"),
            "vcs-clustered-service",
            state,
            properties,
        )
    }

    pub fn with_snapshot(self, name: &str) -> Self {
        self.lock().snapshots.push(name.to_string());
        self
    }

    /// A plan already exists and reports these states.
    pub fn with_plan(self, states: &[PlanState]) -> Self {
        {
            let mut inner = self.lock();
            inner.plan = Some(states.iter().copied().collect());
            inner.plan_script = states.to_vec();
        }
        self
    }

    /// States a newly created plan reports.
    pub fn with_plan_script(self, states: &[PlanState]) -> Self {
        self.lock().plan_script = states.to_vec();
        self
    }

    pub fn with_do_nothing_plan(self) -> Self {
        self.lock().do_nothing_plan = true;
        self
    }

    pub fn with_maintenance(self, enabled: bool) -> Self {
        self.lock().maintenance = enabled;
        self
    }

    /// Job status the maintenance item reports, such as `Done`.
    pub fn with_maintenance_status(self, status: &str) -> Self {
        self.lock().maintenance_status = Some(status.to_string());
        self
    }

    pub fn with_exported_xml(self, xml: &str) -> Self {
        self.lock().exported_xml = xml.to_string();
        self
    }

    /// Makes every call whose record starts with `prefix` fail with `kind`.
    pub fn fail(self, prefix: &str, kind: LitpErrorKind) -> Self {
        self.lock().failures.insert(prefix.to_string(), kind);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn called(&self, prefix: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(prefix))
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn snapshots(&self) -> Vec<String> {
        self.lock().snapshots.clone()
    }

    pub fn has_plan(&self) -> bool {
        self.lock().plan.is_some()
    }

    pub fn item(&self, path: &str) -> Option<DeploymentItem> {
        find(&self.lock().root, path).cloned()
    }

    // Records a mutating call, failing it when scripted to.
    fn record(&self, call: String) -> LitpResult<()> {
        let mut inner = self.lock();
        let failure = inner
            .failures
            .iter()
            .find(|(prefix, _)| call.starts_with(prefix.as_str()))
            .map(|(_, kind)| *kind);
        inner.calls.push(call.clone());
        match failure {
            None => Ok(()),
            Some(kind) => {
                let status = match kind {
                    LitpErrorKind::NotFound => 404,
                    LitpErrorKind::Conflict => 409,
                    LitpErrorKind::MaintenanceMode => 503,
                    _ => 422,
                };
                Err(LitpError::api(
                    "FAKE",
                    call,
                    status,
                    vec![LitpMessage {
                        kind: kind.to_string(),
                        message: "scripted failure".into(),
                    }],
                ))
            }
        }
    }

    fn next_plan_state(&self) -> Option<PlanState> {
        let mut inner = self.lock();
        let queue = inner.plan.as_mut()?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().copied()
        }
    }
}

#[async_trait]
impl ModelApi for FakeModel {
    async fn get(&self, path: &str) -> LitpResult<DeploymentItem> {
        find(&self.lock().root, path)
            .map(shallow)
            .ok_or_else(|| not_found("GET", path))
    }

    async fn get_tree(&self, path: &str) -> LitpResult<DeploymentItem> {
        find(&self.lock().root, path)
            .cloned()
            .ok_or_else(|| not_found("GET", path))
    }

    async fn create(&self, parent: &str, id: &str, item_type: &str, properties: &Properties) -> LitpResult<String> {
        let path = format!("{}/{id}", parent.trim_end_matches('/'));
        self.record(format!("create {path} {item_type} {}", render(properties)))?;
        let mut inner = self.lock();
        let parent_item = find_mut(&mut inner.root, parent).ok_or_else(|| not_found("POST", parent))?;
        if parent_item.child(id).is_some() {
            return Err(conflict(&path));
        }
        let mut item = DeploymentItem::new(path.clone(), item_type, ItemState::Initial);
        item.properties = properties.clone();
        parent_item.children.push(item);
        Ok(path)
    }

    async fn inherit(&self, path: &str, source: &str, properties: &Properties) -> LitpResult<()> {
        self.record(format!("inherit {path} {source} {}", render(properties)))?;
        let mut inner = self.lock();
        let item = ensure(&mut inner.root, path);
        item.state = ItemState::Initial;
        item.properties.extend(properties.clone());
        Ok(())
    }

    async fn update(&self, path: &str, properties: &Properties) -> LitpResult<()> {
        self.record(format!("update {path} {}", render(properties)))?;
        let mut inner = self.lock();
        let item = find_mut(&mut inner.root, path).ok_or_else(|| not_found("PUT", path))?;
        item.properties.extend(properties.clone());
        if item.state == ItemState::Applied {
            item.state = ItemState::Updated;
        }
        Ok(())
    }

    async fn delete_property(&self, path: &str, name: &str) -> LitpResult<bool> {
        self.record(format!("delete_property {path} {name}"))?;
        let mut inner = self.lock();
        Ok(find_mut(&mut inner.root, path)
            .and_then(|item| item.properties.remove(name))
            .is_some())
    }

    async fn delete_path(&self, path: &str) -> LitpResult<bool> {
        self.record(format!("delete_path {path}"))?;
        let mut inner = self.lock();
        let Some((parent, id)) = path.rsplit_once('/') else {
            return Ok(false);
        };
        let Some(parent_item) = find_mut(&mut inner.root, parent) else {
            return Ok(false);
        };
        let before = parent_item.children.len();
        parent_item.children.retain(|c| c.id != id);
        Ok(parent_item.children.len() != before)
    }

    async fn upgrade(&self, path: &str) -> LitpResult<()> {
        self.record(format!("upgrade {path}"))
    }

    async fn load_xml(&self, parent: &str, document: &str, merge: bool) -> LitpResult<()> {
        self.record(format!("load_xml {parent} merge={merge} bytes={}", document.len()))
    }

    async fn export_xml(&self, path: &str) -> LitpResult<String> {
        self.record(format!("export_xml {path}"))?;
        Ok(self.lock().exported_xml.clone())
    }

    async fn create_plan(&self, options: &PlanOptions) -> LitpResult<()> {
        self.record(format!("create_plan no_lock_tasks={}", options.no_lock_tasks))?;
        let mut inner = self.lock();
        if inner.do_nothing_plan {
            return Err(LitpError::api(
                "POST",
                "/plans",
                422,
                vec![LitpMessage {
                    kind: "DoNothingPlanError".into(),
                    message: "Create plan failed: no tasks were generated".into(),
                }],
            ));
        }
        let script = inner.plan_script.clone();
        inner.plan = Some(std::iter::once(PlanState::Initial).chain(script).collect());
        Ok(())
    }

    async fn set_plan_state(&self, state: PlanState, resume: bool) -> LitpResult<()> {
        self.record(format!("set_plan_state {state} resume={resume}"))?;
        if self.lock().plan.is_none() {
            return Err(not_found("PUT", "/plans/plan"));
        }
        // a run request moves a freshly created plan past its initial state
        if state == PlanState::Running {
            let mut inner = self.lock();
            if let Some(queue) = inner.plan.as_mut() {
                if queue.len() > 1 && queue.front() == Some(&PlanState::Initial) {
                    queue.pop_front();
                }
            }
        }
        Ok(())
    }

    async fn delete_plan(&self) -> LitpResult<()> {
        self.record("delete_plan".to_string())?;
        self.lock().plan = None;
        Ok(())
    }

    async fn plan_state(&self) -> LitpResult<Option<PlanState>> {
        Ok(self.next_plan_state())
    }

    async fn plan_view(&self) -> LitpResult<PlanView> {
        let state = self
            .next_plan_state()
            .ok_or_else(|| not_found("GET", "/plans/plan"))?;
        Ok(PlanView {
            state,
            tasks: Vec::new(),
        })
    }

    async fn create_snapshot(&self, name: &str) -> LitpResult<()> {
        self.record(format!("create_snapshot {name}"))?;
        let mut inner = self.lock();
        if inner.snapshots.iter().any(|s| s == name) {
            return Err(conflict(&format!("/snapshots/{name}")));
        }
        inner.snapshots.push(name.to_string());
        Ok(())
    }

    async fn remove_snapshot(&self, name: &str, force: bool) -> LitpResult<()> {
        self.record(format!("remove_snapshot {name} force={force}"))?;
        let mut inner = self.lock();
        let before = inner.snapshots.len();
        inner.snapshots.retain(|s| s != name);
        if inner.snapshots.len() == before {
            return Err(not_found("PUT", &format!("/snapshots/{name}")));
        }
        Ok(())
    }

    async fn restore_snapshot(&self, name: &str, force: bool) -> LitpResult<()> {
        self.record(format!("restore_snapshot {name} force={force}"))?;
        if !self.lock().snapshots.iter().any(|s| s == name) {
            return Err(not_found("PUT", &format!("/snapshots/{name}")));
        }
        Ok(())
    }

    async fn list_snapshots(&self) -> LitpResult<Vec<String>> {
        Ok(self.snapshots())
    }

    async fn restore_model(&self) -> LitpResult<()> {
        self.record("restore_model".to_string())
    }

    async fn maintenance(&self) -> LitpResult<MaintenanceStatus> {
        let inner = self.lock();
        Ok(MaintenanceStatus {
            enabled: inner.maintenance,
            status: inner.maintenance_status.clone(),
        })
    }

    async fn disable_maintenance_mode(&self) -> LitpResult<()> {
        self.record("disable_maintenance_mode".to_string())?;
        self.lock().maintenance = false;
        Ok(())
    }
}

/// Password store answering from a fixed `(key, user) -> password` table.
#[derive(Debug, Default)]
pub struct FakePasswords {
    entries: BTreeMap<(String, String), String>,
}

impl FakePasswords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, username: &str, password: &str) -> Self {
        self.entries
            .insert((key.to_string(), username.to_string()), password.to_string());
        self
    }
}

impl PasswordStore for FakePasswords {
    fn password(&self, key: &str, username: &str) -> LitpResult<String> {
        self.entries
            .get(&(key.to_string(), username.to_string()))
            .cloned()
            .ok_or_else(|| LitpError::Credentials(format!("no password for {username} under {key}")))
    }
}

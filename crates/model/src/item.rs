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

//! Items of the deployment tree as reported by the model engine.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{ModelError, ModelResult};

/// Prefix the model engine puts on the type name of inherited items.
pub const INHERITED_TYPE_PREFIX: &str = "reference-to-";

/// Lifecycle state of a deployment item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemState {
    Initial,
    Applied,
    Updated,
    ForRemoval,
    Removed,
}

impl ItemState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemState::Initial => "Initial",
            ItemState::Applied => "Applied",
            ItemState::Updated => "Updated",
            ItemState::ForRemoval => "ForRemoval",
            ItemState::Removed => "Removed",
        }
    }
}

impl FromStr for ItemState {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Initial" => Ok(ItemState::Initial),
            "Applied" => Ok(ItemState::Applied),
            "Updated" => Ok(ItemState::Updated),
            "ForRemoval" => Ok(ItemState::ForRemoval),
            "Removed" => Ok(ItemState::Removed),
            other => Err(ModelError::unknown("item state", other)),
        }
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single node of the deployment tree.
///
/// Children are kept in the order the engine returned them; use
/// [`DeploymentItem::child`] for id based access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentItem {
    pub path: String,
    pub id: String,
    pub item_type: String,
    pub state: ItemState,
    pub properties: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DeploymentItem>,
}

impl DeploymentItem {
    pub fn new(path: impl Into<String>, item_type: impl Into<String>, state: ItemState) -> Self {
        let path = path.into();
        let id = path.rsplit('/').next().unwrap_or_default().to_string();
        Self {
            path,
            id,
            item_type: item_type.into(),
            state,
            properties: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: DeploymentItem) -> Self {
        self.children.push(child);
        self
    }

    /// Type name with any inheritance prefix removed.
    pub fn base_type(&self) -> &str {
        self.item_type
            .strip_prefix(INHERITED_TYPE_PREFIX)
            .unwrap_or(&self.item_type)
    }

    pub fn is_inherited(&self) -> bool {
        self.item_type.starts_with(INHERITED_TYPE_PREFIX)
    }

    pub fn is_initial(&self) -> bool {
        self.state == ItemState::Initial
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    pub fn require_property(&self, name: &str) -> ModelResult<&str> {
        self.property(name)
            .ok_or_else(|| ModelError::MissingProperty {
                path: self.path.clone(),
                property: name.to_string(),
            })
    }

    /// Integer property, `None` when absent.
    pub fn int_property(&self, name: &str) -> ModelResult<Option<i64>> {
        match self.property(name) {
            None => Ok(None),
            Some(value) => value
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| ModelError::NotAnInteger {
                    path: self.path.clone(),
                    property: name.to_string(),
                    value: value.to_string(),
                }),
        }
    }

    pub fn child(&self, id: &str) -> Option<&DeploymentItem> {
        self.children.iter().find(|c| c.id == id)
    }

    /// Depth first walk over this item and all of its descendants.
    pub fn walk(&self) -> Vec<&DeploymentItem> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.walk());
        }
        out
    }
}

/// Wire shape of an item in the engine's HAL+JSON representation.
#[derive(Debug, Clone, Deserialize)]
pub struct HalItem {
    pub id: String,
    #[serde(rename = "item-type-name", default)]
    pub item_type_name: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
    #[serde(rename = "_links", default)]
    pub links: Option<HalLinks>,
    #[serde(rename = "_embedded", default)]
    pub embedded: Option<HalEmbedded>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HalLinks {
    #[serde(rename = "self")]
    pub self_link: Option<HalHref>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HalHref {
    pub href: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HalEmbedded {
    #[serde(default)]
    pub item: Vec<HalItem>,
}

impl HalItem {
    /// Path of the item relative to the REST root, taken from the self link.
    pub fn path(&self, rest_root: &str) -> String {
        match self.links.as_ref().and_then(|l| l.self_link.as_ref()) {
            Some(link) => match link.href.find(rest_root) {
                Some(pos) => {
                    let p = &link.href[pos + rest_root.len()..];
                    if p.is_empty() { "/".to_string() } else { p.to_string() }
                }
                None => link.href.clone(),
            },
            None => format!("/{}", self.id),
        }
    }

    pub fn into_item(self, rest_root: &str) -> ModelResult<DeploymentItem> {
        let path = self.path(rest_root);
        let state = match self.state.as_deref() {
            Some(s) => s.parse()?,
            None => ItemState::Applied,
        };
        let properties = self
            .properties
            .into_iter()
            .filter_map(|(k, v)| match v {
                serde_json::Value::Null => None,
                serde_json::Value::String(s) => Some((k, s)),
                other => Some((k, other.to_string())),
            })
            .collect();
        let children = match self.embedded {
            Some(e) => e
                .item
                .into_iter()
                .map(|i| i.into_item(rest_root))
                .collect::<ModelResult<Vec<_>>>()?,
            None => Vec::new(),
        };
        Ok(DeploymentItem {
            path,
            id: self.id,
            item_type: self.item_type_name,
            state,
            properties,
            children,
        })
    }
}

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

//! Reader for deployment description XML.
//!
//! An element carrying an `id` attribute is a model item; its model path is
//! built from the ids of its ancestors, the document root excluded. A leaf
//! element without an id is a property of the enclosing item. `-inherit`
//! elements are items inherited from the `source_path` attribute.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use model::item::{DeploymentItem, ItemState};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::errors::{UpgradeError, UpgradeResult};

const INHERIT_SUFFIX: &str = "-inherit";
pub const GOSSIP_ROUTER_SERVICE: &str = "gossiprouter_clustered_service";

/// One item of a deployment description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlItem {
    pub path: String,
    pub id: String,
    /// Element name without the `-inherit` suffix.
    pub item_type: String,
    pub source_path: Option<String>,
    pub properties: BTreeMap<String, String>,
    pub children: Vec<XmlItem>,
}

impl XmlItem {
    pub fn is_inherited(&self) -> bool {
        self.source_path.is_some()
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    /// Every item below this one, depth first.
    pub fn descendants(&self) -> Vec<&XmlItem> {
        let mut out = Vec::new();
        for child in &self.children {
            out.push(child);
            out.extend(child.descendants());
        }
        out
    }

    pub fn descendants_of_type(&self, item_type: &str) -> Vec<&XmlItem> {
        self.descendants()
            .into_iter()
            .filter(|i| i.item_type == item_type)
            .collect()
    }

    pub fn parent_path(&self) -> &str {
        match self.path.rsplit_once('/') {
            Some(("", _)) | None => "/",
            Some((parent, _)) => parent,
        }
    }
}

enum Frame {
    Item(XmlItem),
    Property { name: String, text: String },
}

/// A parsed deployment description.
#[derive(Debug, Clone)]
pub struct DeploymentDescription {
    source: PathBuf,
    root: XmlItem,
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attributes(e: &BytesStart<'_>) -> Result<BTreeMap<String, String>, String> {
    let mut out = BTreeMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|e| e.to_string())?.into_owned();
        out.insert(key, value);
    }
    Ok(out)
}

fn item_path(stack: &[Frame], id: &str) -> String {
    let mut ids: Vec<&str> = stack
        .iter()
        .filter_map(|f| match f {
            Frame::Item(i) => Some(i.id.as_str()),
            Frame::Property { .. } => None,
        })
        .skip(1)
        .collect();
    ids.push(id);
    format!("/{}", ids.join("/"))
}

fn open_frame(stack: &[Frame], e: &BytesStart<'_>) -> Result<Frame, String> {
    let name = local_name(e);
    let attrs = attributes(e)?;
    let Some(id) = attrs.get("id") else {
        return Ok(Frame::Property { name, text: String::new() });
    };
    let path = if stack.is_empty() { "/".to_string() } else { item_path(stack, id) };
    let (item_type, source_path) = match name.strip_suffix(INHERIT_SUFFIX) {
        Some(base) => (base.to_string(), attrs.get("source_path").cloned()),
        None => (name, None),
    };
    Ok(Frame::Item(XmlItem {
        path,
        id: id.clone(),
        item_type,
        source_path,
        properties: BTreeMap::new(),
        children: Vec::new(),
    }))
}

// Attaches a finished frame to its parent; returns the root when the stack
// empties.
fn close_frame(stack: &mut Vec<Frame>, frame: Frame) -> Option<XmlItem> {
    match (frame, stack.last_mut()) {
        (Frame::Item(item), Some(Frame::Item(parent))) => parent.children.push(item),
        (Frame::Item(item), None) => return Some(item),
        (Frame::Property { name, text }, Some(Frame::Item(parent))) => {
            let text = text.trim();
            if !text.is_empty() {
                parent.properties.insert(name, text.to_string());
            }
        }
        // Nested below a property or outside any item: not part of the model.
        _ => {}
    }
    None
}

impl DeploymentDescription {
    pub fn parse(source: impl Into<PathBuf>, xml: &str) -> UpgradeResult<Self> {
        let source = source.into();
        let fail = |message: String| UpgradeError::xml(&source, message);

        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);
        let mut stack: Vec<Frame> = Vec::new();
        let mut root = None;
        loop {
            match reader.read_event().map_err(|e| fail(e.to_string()))? {
                Event::Start(e) => {
                    let frame = open_frame(&stack, &e).map_err(fail)?;
                    stack.push(frame);
                }
                Event::Empty(e) => {
                    let frame = open_frame(&stack, &e).map_err(fail)?;
                    if let Some(item) = close_frame(&mut stack, frame) {
                        root = Some(item);
                    }
                }
                Event::Text(t) => {
                    if let Some(Frame::Property { text, .. }) = stack.last_mut() {
                        text.push_str(&t.unescape().map_err(|e| fail(e.to_string()))?);
                    }
                }
                Event::CData(c) => {
                    if let Some(Frame::Property { text, .. }) = stack.last_mut() {
                        text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                    }
                }
                Event::End(_) => {
                    let frame = stack.pop().ok_or_else(|| fail("unbalanced end tag".to_string()))?;
                    if let Some(item) = close_frame(&mut stack, frame) {
                        root = Some(item);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }
        let root = root.ok_or_else(|| fail("no model items found".to_string()))?;
        Ok(Self { source, root })
    }

    pub fn load(path: &Path) -> UpgradeResult<Self> {
        let xml = std::fs::read_to_string(path).map_err(|e| UpgradeError::io(path, e))?;
        Self::parse(path, &xml)
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn root(&self) -> &XmlItem {
        &self.root
    }

    pub fn items(&self) -> Vec<&XmlItem> {
        self.root.descendants()
    }

    pub fn items_of_type(&self, item_type: &str) -> Vec<&XmlItem> {
        self.root.descendants_of_type(item_type)
    }

    pub fn item(&self, path: &str) -> Option<&XmlItem> {
        self.items().into_iter().find(|i| i.path == path)
    }

    /// vcs-cluster id to the number of nodes the description gives it.
    pub fn cluster_node_counts(&self) -> BTreeMap<String, usize> {
        self.items_of_type("vcs-cluster")
            .into_iter()
            .map(|c| (c.id.clone(), c.descendants_of_type("node").len()))
            .collect()
    }

    /// Whether a clustered service with this id is described.
    pub fn has_clustered_service(&self, id: &str) -> bool {
        self.items_of_type("vcs-clustered-service")
            .iter()
            .any(|s| s.id.eq_ignore_ascii_case(id))
    }

    /// Node id to hostname for the peer nodes and the management server.
    pub fn hostnames(&self) -> BTreeMap<String, String> {
        self.items_of_type("node")
            .into_iter()
            .chain(self.items_of_type("ms"))
            .filter_map(|n| Some((n.id.clone(), n.property("hostname")?.to_string())))
            .collect()
    }

    /// The items as model items with their children detached.
    pub fn to_model_items(&self) -> Vec<DeploymentItem> {
        self.items()
            .into_iter()
            .map(|i| DeploymentItem {
                path: i.path.clone(),
                id: i.id.clone(),
                item_type: i.item_type.clone(),
                state: ItemState::Initial,
                properties: i.properties.clone(),
                children: Vec::new(),
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) const SAMPLE: &str = r#"<?xml version='1.0' encoding='utf-8'?>
<litp:root xmlns:litp="http://www.ericsson.com/litp" id="root">
  <litp:root-deployments-collection id="deployments">
    <litp:deployment id="enm">
      <litp:deployment-clusters-collection id="clusters">
        <litp:vcs-cluster id="db_cluster">
          <cluster_id>4801</cluster_id>
          <litp:cluster-nodes-collection id="nodes">
            <litp:node id="db-1"><hostname>ieatrcxb1</hostname></litp:node>
            <litp:node id="db-2"><hostname>ieatrcxb2</hostname></litp:node>
          </litp:cluster-nodes-collection>
          <litp:cluster-services-collection id="services">
            <litp:vcs-clustered-service id="gossiprouter_clustered_service">
              <active>2</active>
              <name>gossiprouter</name>
              <node_list>db-1,db-2</node_list>
              <standby>0</standby>
              <litp:clustered-service-applications-collection id="applications">
                <litp:vm-service-inherit source_path="/software/services/gossiprouter" id="gossiprouter">
                  <hostnames>gossip-1,gossip-2</hostnames>
                </litp:vm-service-inherit>
              </litp:clustered-service-applications-collection>
            </litp:vcs-clustered-service>
          </litp:cluster-services-collection>
        </litp:vcs-cluster>
        <litp:vcs-cluster id="svc_cluster">
          <litp:cluster-nodes-collection id="nodes">
            <litp:node id="svc-1"><hostname>ieatrcxb3</hostname></litp:node>
          </litp:cluster-nodes-collection>
        </litp:vcs-cluster>
      </litp:deployment-clusters-collection>
    </litp:deployment>
  </litp:root-deployments-collection>
  <litp:software id="software">
    <litp:software-services-collection id="services">
      <litp:vm-service id="gossiprouter">
        <cpus>2</cpus>
        <ram>2048M</ram>
        <image_name>jboss</image_name>
      </litp:vm-service>
    </litp:software-services-collection>
  </litp:software>
  <litp:infrastructure id="infrastructure">
    <litp:storage id="storage">
      <litp:storage-storage_profiles-collection id="storage_profiles">
        <litp:storage-profile id="sp1">
          <litp:storage-profile-volume_groups-collection id="volume_groups">
            <litp:volume-group id="vg1">
              <litp:volume-group-file_systems-collection id="file_systems">
                <litp:file-system id="root"><size>70G</size><snap_size>100</snap_size><type>ext4</type></litp:file-system>
              </litp:volume-group-file_systems-collection>
            </litp:volume-group>
          </litp:storage-profile-volume_groups-collection>
        </litp:storage-profile>
      </litp:storage-storage_profiles-collection>
    </litp:storage>
  </litp:infrastructure>
</litp:root>
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DeploymentDescription {
        DeploymentDescription::parse("/tmp/dd.xml", SAMPLE).unwrap()
    }

    #[test]
    fn test_paths_and_properties() {
        let dd = sample();
        let node = dd.item("/deployments/enm/clusters/db_cluster/nodes/db-2").unwrap();
        assert_eq!(node.item_type, "node");
        assert_eq!(node.property("hostname"), Some("ieatrcxb2"));
        assert_eq!(node.parent_path(), "/deployments/enm/clusters/db_cluster/nodes");

        let fs = dd
            .item("/infrastructure/storage/storage_profiles/sp1/volume_groups/vg1/file_systems/root")
            .unwrap();
        assert_eq!(fs.property("size"), Some("70G"));
        assert_eq!(fs.property("snap_size"), Some("100"));
    }

    #[test]
    fn test_inherited_items() {
        let dd = sample();
        let vm = dd
            .item("/deployments/enm/clusters/db_cluster/services/gossiprouter_clustered_service/applications/gossiprouter")
            .unwrap();
        assert_eq!(vm.item_type, "vm-service");
        assert!(vm.is_inherited());
        assert_eq!(vm.source_path.as_deref(), Some("/software/services/gossiprouter"));
    }

    #[test]
    fn test_topology_helpers() {
        let dd = sample();
        let counts = dd.cluster_node_counts();
        assert_eq!(counts.get("db_cluster"), Some(&2));
        assert_eq!(counts.get("svc_cluster"), Some(&1));
        assert!(dd.has_clustered_service(GOSSIP_ROUTER_SERVICE));
        assert_eq!(dd.hostnames().get("svc-1").map(String::as_str), Some("ieatrcxb3"));
        assert_eq!(dd.items_of_type("file-system").len(), 1);
    }

    #[test]
    fn test_model_items_skip_root() {
        let dd = sample();
        let items = dd.to_model_items();
        assert!(items.iter().all(|i| i.path != "/"));
        assert!(items.iter().any(|i| i.path == "/software/services/gossiprouter"));
    }

    #[test]
    fn test_malformed_document() {
        let err = DeploymentDescription::parse("/tmp/bad.xml", "<litp:root id=\"root\"><a></b>").unwrap_err();
        assert!(matches!(err, UpgradeError::Xml { .. }));
        assert!(DeploymentDescription::parse("/tmp/empty.xml", "<nothing/>").is_err());
    }
}

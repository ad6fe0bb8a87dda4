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

//! User supplied filters. Every filter is a regular expression searched
//! anywhere in the value; an absent filter matches everything.

use model::TableRow;
use model::vcs::{GroupStatusRow, SystemStatusRow};
use regex::Regex;

use crate::errors::{VcsError, VcsResult};

/// One filter expression, optionally a comma separated list of
/// alternatives as accepted by the column filters (`-t`, `-a`, `-b`).
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    alternatives: Vec<Matcher>,
}

#[derive(Debug, Clone)]
enum Matcher {
    Search(Regex),
    Exact(String),
}

impl Matcher {
    fn is_match(&self, text: &str) -> bool {
        match self {
            Matcher::Search(regex) => regex.is_match(text),
            Matcher::Exact(name) => name == text,
        }
    }
}

impl Pattern {
    pub fn new(filter: &str) -> VcsResult<Self> {
        Ok(Self {
            source: filter.to_string(),
            alternatives: vec![Matcher::Search(compile(filter)?)],
        })
    }

    pub fn any_of(filters: &str) -> VcsResult<Self> {
        Ok(Self {
            source: filters.to_string(),
            alternatives: filters
                .split(',')
                .filter(|f| !f.is_empty())
                .map(|f| compile(f).map(Matcher::Search))
                .collect::<VcsResult<_>>()?,
        })
    }

    /// A filter matching exactly the given name.
    pub fn exact(name: &str) -> Self {
        Self {
            source: name.to_string(),
            alternatives: vec![Matcher::Exact(name.to_string())],
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.alternatives.iter().any(|r| r.is_match(text))
    }
}

fn compile(filter: &str) -> VcsResult<Regex> {
    Regex::new(filter).map_err(|source| VcsError::InvalidFilter {
        filter: filter.to_string(),
        source,
    })
}

/// True when there is no filter or it matches.
pub fn matches(filter: Option<&Pattern>, text: &str) -> bool {
    filter.is_none_or(|f| f.is_match(text))
}

/// True when there is no filter or it matches any of the values.
pub fn matches_any<'a>(filter: Option<&Pattern>, values: impl IntoIterator<Item = &'a str>) -> bool {
    match filter {
        None => true,
        Some(f) => values.into_iter().any(|v| f.is_match(v)),
    }
}

/// Selection used by the status views and the group verbs.
#[derive(Debug, Clone, Default)]
pub struct GroupFilter {
    pub cluster: Option<Pattern>,
    pub group: Option<Pattern>,
    pub system: Option<Pattern>,
    /// Availability type column (`-t`).
    pub avail_type: Option<Pattern>,
    /// GroupState column (`-a`).
    pub group_state: Option<Pattern>,
    /// ServiceState column (`-b`).
    pub service_state: Option<Pattern>,
}

impl GroupFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cluster(mut self, cluster: Pattern) -> Self {
        self.cluster = Some(cluster);
        self
    }

    pub fn with_group(mut self, group: Pattern) -> Self {
        self.group = Some(group);
        self
    }

    pub fn with_system(mut self, system: Pattern) -> Self {
        self.system = Some(system);
        self
    }

    pub fn with_avail_type(mut self, avail_type: Pattern) -> Self {
        self.avail_type = Some(avail_type);
        self
    }

    pub fn with_group_state(mut self, group_state: Pattern) -> Self {
        self.group_state = Some(group_state);
        self
    }

    pub fn with_service_state(mut self, service_state: Pattern) -> Self {
        self.service_state = Some(service_state);
        self
    }

    /// Applies the column filters to joined rows.
    pub fn retain_rows(&self, rows: &mut Vec<GroupStatusRow>) {
        rows.retain(|row| {
            matches(self.system.as_ref(), &row.system)
                && matches(self.avail_type.as_ref(), &row.cell("HAType"))
                && matches(self.group_state.as_ref(), &row.cell("GroupState"))
                && matches(self.service_state.as_ref(), &row.cell("ServiceState"))
        });
    }

    /// Applies the state filter (`-b`) to system rows.
    pub fn retain_systems(&self, rows: &mut Vec<SystemStatusRow>) {
        rows.retain(|row| matches(self.service_state.as_ref(), &row.cell("State")));
    }
}

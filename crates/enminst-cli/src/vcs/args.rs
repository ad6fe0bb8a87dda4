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

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::{ArgGroup, Args, Parser};
use vcs::{GroupFilter, Pattern, VcsResult, ViewType};

fn parse_view_type(value: &str) -> Result<ViewType, String> {
    ViewType::from_str(value).map_err(|e| e.to_string())
}

fn pattern(value: Option<&str>) -> VcsResult<Option<Pattern>> {
    value.map(Pattern::new).transpose()
}

#[derive(Parser, Debug)]
pub enum Cmd {
    #[clap(about = "Show the state of the service groups")]
    Groups(Groups),
    #[clap(about = "Show the state of the cluster systems")]
    Systems(Systems),
    #[clap(about = "Online service groups and wait for them to come up")]
    Online(Online),
    #[clap(about = "Offline service groups and wait for them to go down")]
    Offline(GroupTarget),
    #[clap(about = "Offline then online service groups")]
    Restart(Online),
    #[clap(about = "Switch failover service groups to their standby system")]
    Switch(GroupTarget),
    #[clap(about = "Clear FAULTED service groups")]
    Clear(Clear),
    #[clap(about = "Show the engine history of service groups")]
    History(History),
    #[clap(about = "Freeze service groups or systems")]
    Freeze(Freeze),
    #[clap(about = "Unfreeze service groups or systems")]
    Unfreeze(Unfreeze),
    #[clap(about = "Evacuate and persistently freeze a system")]
    Lock(Lock),
    #[clap(about = "Unfreeze a locked system and online its groups")]
    Unlock(Lock),
}

/// Row selection shared by the report commands.
#[derive(Args, Debug, Clone, Default)]
pub struct Filters {
    #[clap(short = 'g', long = "group", help = "Group name, a regular expression")]
    pub group: Option<String>,

    #[clap(short = 'c', long = "cluster", help = "Cluster name, a regular expression")]
    pub cluster: Option<String>,

    #[clap(short = 's', long = "system", help = "System name, a regular expression")]
    pub system: Option<String>,

    #[clap(short = 't', long = "type", help = "Availability types, comma separated")]
    pub avail_type: Option<String>,

    #[clap(short = 'a', long = "group_state", help = "Group states, comma separated")]
    pub group_state: Option<String>,

    #[clap(short = 'b', long = "service_state", help = "Service states, comma separated")]
    pub service_state: Option<String>,
}

impl Filters {
    pub fn group_filter(&self) -> VcsResult<GroupFilter> {
        let mut filter = GroupFilter::new();
        if let Some(group) = pattern(self.group.as_deref())? {
            filter = filter.with_group(group);
        }
        if let Some(cluster) = pattern(self.cluster.as_deref())? {
            filter = filter.with_cluster(cluster);
        }
        if let Some(system) = pattern(self.system.as_deref())? {
            filter = filter.with_system(system);
        }
        if let Some(types) = &self.avail_type {
            filter = filter.with_avail_type(Pattern::any_of(types)?);
        }
        if let Some(states) = &self.group_state {
            filter = filter.with_group_state(Pattern::any_of(states)?);
        }
        if let Some(states) = &self.service_state {
            filter = filter.with_service_state(Pattern::any_of(states)?);
        }
        Ok(filter)
    }
}

/// Presentation of a report.
#[derive(Args, Debug, Clone)]
pub struct Report {
    #[clap(long, help = "Comma separated columns to sort on, the last one first")]
    pub sort: Option<String>,

    #[clap(long, help = "Also write the report to this CSV file")]
    pub csv: Option<PathBuf>,

    #[clap(
        long = "vt",
        default_value = "v",
        value_parser = parse_view_type,
        help = "Names as known to VCS (v), as modelled (m) or both (x)"
    )]
    pub view: ViewType,
}

#[derive(Parser, Debug, Clone)]
pub struct Groups {
    #[clap(flatten)]
    pub filters: Filters,

    #[clap(flatten)]
    pub report: Report,

    #[clap(long, help = "Add how long each group has been online")]
    pub uptime: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct Systems {
    #[clap(short = 'c', long = "cluster", help = "Cluster name, a regular expression")]
    pub cluster: Option<String>,

    #[clap(short = 's', long = "system", help = "System name, a regular expression")]
    pub system: Option<String>,

    #[clap(short = 'b', long = "state", help = "System states, comma separated")]
    pub state: Option<String>,

    #[clap(flatten)]
    pub report: Report,
}

/// The groups an action applies to.
#[derive(Parser, Debug, Clone)]
pub struct GroupTarget {
    #[clap(short = 'g', long = "group", help = "Group name, a regular expression")]
    pub group: String,

    #[clap(short = 's', long = "system", help = "Only act on this system")]
    pub system: Option<String>,

    #[clap(short = 'c', long = "cluster", help = "Cluster name, derived from the group when omitted")]
    pub cluster: Option<String>,

    #[clap(short = 'm', long = "timeout", help = "Seconds to wait for the new state")]
    pub timeout: Option<u64>,
}

impl GroupTarget {
    pub fn patterns(&self) -> VcsResult<(Pattern, Option<Pattern>, Option<Pattern>)> {
        Ok((
            Pattern::new(&self.group)?,
            pattern(self.system.as_deref())?,
            pattern(self.cluster.as_deref())?,
        ))
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }
}

#[derive(Parser, Debug, Clone)]
pub struct Online {
    #[clap(flatten)]
    pub target: GroupTarget,

    #[clap(long, help = "Clear FAULTED groups before onlining them")]
    pub autoclear: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct Clear {
    #[clap(short = 'g', long = "group", help = "Group name, a regular expression")]
    pub group: Option<String>,

    #[clap(short = 's', long = "system", help = "System name, a regular expression")]
    pub system: Option<String>,

    #[clap(short = 'c', long = "cluster", help = "Cluster name, a regular expression")]
    pub cluster: Option<String>,
}

impl Clear {
    pub fn patterns(&self) -> VcsResult<(Option<Pattern>, Option<Pattern>, Option<Pattern>)> {
        Ok((
            pattern(self.group.as_deref())?,
            pattern(self.system.as_deref())?,
            pattern(self.cluster.as_deref())?,
        ))
    }
}

#[derive(Parser, Debug, Clone)]
pub struct History {
    #[clap(short = 'g', long = "group", help = "Group name, a regular expression")]
    pub group: Option<String>,

    #[clap(short = 'c', long = "cluster", help = "Cluster name, a regular expression")]
    pub cluster: Option<String>,

    #[clap(short = 's', long = "system", help = "System name, a regular expression")]
    pub system: Option<String>,

    #[clap(long, help = "Comma separated columns to sort on, Date sorts by time across groups")]
    pub sort: Option<String>,

    #[clap(long, help = "Also write the history to this CSV file")]
    pub csv: Option<PathBuf>,
}

impl History {
    pub fn group_filter(&self) -> VcsResult<GroupFilter> {
        Filters {
            group: self.group.clone(),
            cluster: self.cluster.clone(),
            system: self.system.clone(),
            ..Default::default()
        }
        .group_filter()
    }

    pub fn sort_by_date(&self) -> bool {
        self.sort.as_deref().is_some_and(|k| k.trim().eq_ignore_ascii_case("date"))
    }
}

#[derive(Parser, Debug, Clone)]
#[clap(group(ArgGroup::new("target").required(true).multiple(true).args(["group", "system"])))]
pub struct Freeze {
    #[clap(short = 'g', long = "group", help = "Group name, a regular expression")]
    pub group: Option<String>,

    #[clap(short = 's', long = "system", help = "System name, a regular expression")]
    pub system: Option<String>,

    #[clap(short = 'p', long = "persistent", help = "Keep the freeze across restarts")]
    pub persistent: bool,

    #[clap(long, help = "Move the groups of a frozen system elsewhere first")]
    pub evacuate: bool,
}

#[derive(Parser, Debug, Clone)]
#[clap(group(ArgGroup::new("target").required(true).multiple(true).args(["group", "system"])))]
pub struct Unfreeze {
    #[clap(short = 'g', long = "group", help = "Group name, a regular expression")]
    pub group: Option<String>,

    #[clap(short = 's', long = "system", help = "System name, a regular expression")]
    pub system: Option<String>,

    #[clap(short = 'p', long = "persistent", help = "Remove a persistent freeze")]
    pub persistent: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct Lock {
    #[clap(short = 's', long = "system", help = "System name")]
    pub system: String,

    #[clap(short = 'm', long = "timeout", help = "Seconds to wait for groups to move")]
    pub timeout: Option<u64>,
}

impl Lock {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }
}

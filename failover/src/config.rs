// Failover: Shortest-Path Flow Control for OpenFlow Networks
// Copyright (C) 2021  Tibor Schneider
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! # Controller Configuration
//!
//! This module contains the two configuration documents of the controller, both of which can be
//! read from JSON files:
//!
//! - [`ControllerConfig`]: Behaviour of the controller (rule priority, table-miss behaviour, ...).
//!   Every field is optional and falls back to its default.
//! - [`TopologyDescription`]: The static topology (switches, links with their ports and weights)
//!   and the hosts expected in the network.
//!
//! # Example
//!
//! ```rust
//! use failover::config::TopologyDescription;
//!
//! fn main() -> Result<(), failover::Error> {
//!     let desc = TopologyDescription::from_json(r#"{
//!         "switches": ["s1", "s2"],
//!         "links": [{ "a": "s1:2", "b": "s2:2", "weight": 3 }],
//!         "hosts": [
//!             { "name": "h1", "mac": "00:00:00:00:00:01", "attachment": "s1:1" },
//!             { "name": "h2", "mac": "00:00:00:00:00:02", "attachment": "s2:1" }
//!         ]
//!     }"#)?;
//!     let topology = desc.build()?;
//!     assert_eq!(topology.num_switches(), 2);
//!     assert_eq!(topology.num_links(), 1);
//!     Ok(())
//! }
//! ```

use crate::error::Error;
use crate::topology::Topology;
use crate::types::{
    DatapathId, Endpoint, LinkWeight, MacAddr, PortNo, TopologyError, DEFAULT_LINK_WEIGHT,
};

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default priority of the installed flow rules
pub const DEFAULT_FLOW_PRIORITY: u16 = 10;

/// What a switch does with packets that match no flow rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableMiss {
    /// Send the packet to the controller, which learns hosts and installs paths.
    Controller,
    /// Flood the packet out of every port. The switch never contacts the controller for unknown
    /// traffic, and no paths are installed. Only safe on loop-free topologies.
    Flood,
}

/// # Controller Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Priority of the rules installed for flows. Must be above the table-miss priority (0).
    pub flow_priority: u16,
    /// Table-miss behaviour installed on every switch when it connects
    pub table_miss: TableMiss,
    /// Flood packets with an unknown destination out of all edge ports
    pub flood_unknown: bool,
    /// When a link comes up, move active flows to a strictly cheaper path, if there is one.
    pub reroute_on_link_up: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            flow_priority: DEFAULT_FLOW_PRIORITY,
            table_miss: TableMiss::Controller,
            flood_unknown: true,
            reroute_on_link_up: true,
        }
    }
}

impl ControllerConfig {
    /// Parse the configuration from a JSON string
    pub fn from_json(s: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(s)?)
    }

    /// Read the configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::from_json(&fs::read_to_string(path)?)
    }
}

/// Link in a topology description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkDescription {
    /// First endpoint
    pub a: Endpoint,
    /// Second endpoint
    pub b: Endpoint,
    /// Weight, defaults to 1
    #[serde(default = "default_weight")]
    pub weight: LinkWeight,
}

/// Host in a topology description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostDescription {
    /// Name of the host, e.g., `h1`
    pub name: String,
    /// MAC address of the host
    pub mac: MacAddr,
    /// Port at which the host is attached
    pub attachment: Endpoint,
}

/// # Topology Description
/// Static description of a network: all switches, all links between them, and the hosts. The
/// hosts are not used by the controller (which learns them from traffic), but by tools that drive
/// a simulated network.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TopologyDescription {
    /// All switches
    pub switches: Vec<DatapathId>,
    /// All links
    #[serde(default)]
    pub links: Vec<LinkDescription>,
    /// Hosts of the network
    #[serde(default)]
    pub hosts: Vec<HostDescription>,
}

impl TopologyDescription {
    /// Parse the description from a JSON string
    pub fn from_json(s: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(s)?)
    }

    /// Read the description from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// Serialize the description as pretty-printed JSON
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Build the topology. All links start down, and all switches disconnected.
    pub fn build(&self) -> Result<Topology, TopologyError> {
        let mut topology = Topology::new();
        for dpid in self.switches.iter() {
            topology.add_switch(*dpid);
        }
        for link in self.links.iter() {
            topology.add_link(link.a, link.b, link.weight)?;
        }
        Ok(topology)
    }

    /// Returns the host with the given name
    pub fn host(&self, name: &str) -> Option<&HostDescription> {
        self.hosts.iter().find(|h| h.name == name)
    }

    /// All ports of the switch used either by a link or by a host, in ascending order.
    pub fn ports_of(&self, dpid: DatapathId) -> Vec<PortNo> {
        let mut ports = self
            .links
            .iter()
            .flat_map(|l| vec![l.a, l.b])
            .chain(self.hosts.iter().map(|h| h.attachment))
            .filter(|e| e.dpid == dpid)
            .map(|e| e.port)
            .collect::<Vec<_>>();
        ports.sort_unstable();
        ports.dedup();
        ports
    }
}

fn default_weight() -> LinkWeight {
    DEFAULT_LINK_WEIGHT
}

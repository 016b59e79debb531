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

//! # Topology Model
//!
//! The topology is a static, undirected graph of switches and links. Every link connects two
//! [`Endpoint`]s, i.e., a port on each of the two switches. Next to the static structure, the
//! topology keeps track of the live facts reported by the switches: which switches are connected,
//! and which of their ports are active. The status of a link is derived from these facts by the
//! [`LinkStateMonitor`](crate::link_state::LinkStateMonitor), which is the only component allowed
//! to change it.
//!
//! Structural changes (adding or removing switches or links) increment the structure version,
//! such that cached paths can cheaply be checked for staleness.
//!
//! ```rust
//! use failover::topology::Topology;
//! use failover::{DatapathId, Endpoint, TopologyError};
//!
//! fn main() -> Result<(), TopologyError> {
//!     let mut t = Topology::new();
//!     let s1 = DatapathId(1);
//!     let s2 = DatapathId(2);
//!     t.add_switch(s1);
//!     t.add_switch(s2);
//!     let link = t.add_link(Endpoint::new(s1, 2), Endpoint::new(s2, 2), 1)?;
//!
//!     // new links are down until both switches have reported the ports as active
//!     assert!(!t.link(link).unwrap().is_up());
//!     assert!(t.neighbors(s1)?.is_empty());
//!     Ok(())
//! }
//! ```

use crate::types::{
    DatapathId, Endpoint, LinkId, LinkStatus, LinkWeight, PortNo, TopologyError, TopologyGraph,
};

use log::*;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// # Link
/// Undirected connection between two switch ports. The link stores both endpoints, its weight,
/// and its current operational status.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    a: Endpoint,
    b: Endpoint,
    weight: LinkWeight,
    status: LinkStatus,
}

impl Link {
    /// Returns both endpoints of the link
    pub fn endpoints(&self) -> (Endpoint, Endpoint) {
        (self.a, self.b)
    }

    /// Returns the weight of the link
    pub fn weight(&self) -> LinkWeight {
        self.weight
    }

    /// Returns the current status of the link
    pub fn status(&self) -> LinkStatus {
        self.status
    }

    /// Returns true if the link is currently up
    pub fn is_up(&self) -> bool {
        self.status.is_up()
    }

    /// Returns the endpoint of the link on the given switch.
    pub fn end_on(&self, dpid: DatapathId) -> Option<Endpoint> {
        if self.a.dpid == dpid {
            Some(self.a)
        } else if self.b.dpid == dpid {
            Some(self.b)
        } else {
            None
        }
    }

    /// Returns the opposite endpoint of `end`, or `None` if `end` is not part of this link.
    pub fn peer(&self, end: Endpoint) -> Option<Endpoint> {
        if self.a == end {
            Some(self.b)
        } else if self.b == end {
            Some(self.a)
        } else {
            None
        }
    }

    /// Returns true if the link connects the two endpoints (in any order)
    pub fn connects(&self, x: Endpoint, y: Endpoint) -> bool {
        (self.a == x && self.b == y) || (self.a == y && self.b == x)
    }

    /// Returns true if the given endpoint is one of the two ends of this link
    pub fn touches(&self, end: Endpoint) -> bool {
        self.a == end || self.b == end
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <-> {} (weight {}, {})", self.a, self.b, self.weight, self.status)
    }
}

/// Switch as seen by the topology model
#[derive(Debug, Clone, PartialEq)]
pub struct Switch {
    dpid: DatapathId,
    node: NodeIndex<u32>,
    ports: BTreeSet<PortNo>,
    connected: bool,
}

impl Switch {
    /// Datapath id of the switch
    pub fn dpid(&self) -> DatapathId {
        self.dpid
    }

    /// Returns true if the switch has a live connection to the controller
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Returns true if the switch reported the port as active
    pub fn is_port_active(&self, port: PortNo) -> bool {
        self.ports.contains(&port)
    }

    /// Iterate over all active ports, in ascending order
    pub fn active_ports(&self) -> impl Iterator<Item = PortNo> + '_ {
        self.ports.iter().copied()
    }
}

/// Usable adjacency of a switch, as returned by [`Topology::neighbors`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbor {
    /// The adjacent switch
    pub dpid: DatapathId,
    /// Port on the local switch
    pub local_port: PortNo,
    /// Port on the adjacent switch
    pub remote_port: PortNo,
    /// Weight of the link
    pub weight: LinkWeight,
    /// The link itself
    pub link: LinkId,
}

/// # Topology
/// Graph of all switches and links, along with the live port and connection state.
#[derive(Debug, Clone)]
pub struct Topology {
    graph: TopologyGraph,
    switches: HashMap<DatapathId, Switch>,
    ports: HashMap<Endpoint, LinkId>,
    structure_version: u64,
}

impl Default for Topology {
    fn default() -> Self {
        Self::new()
    }
}

impl Topology {
    /// Generate an empty topology
    pub fn new() -> Self {
        Self {
            graph: TopologyGraph::with_capacity(0, 0),
            switches: HashMap::new(),
            ports: HashMap::new(),
            structure_version: 0,
        }
    }

    /// Register a switch. Registering a switch twice has no effect. Returns true if the switch was
    /// not known before. The switch starts disconnected, with no active ports.
    pub fn add_switch(&mut self, dpid: DatapathId) -> bool {
        if self.switches.contains_key(&dpid) {
            return false;
        }
        let node = self.graph.add_node(dpid);
        self.switches
            .insert(dpid, Switch { dpid, node, ports: BTreeSet::new(), connected: false });
        self.structure_version += 1;
        debug!("Registered switch {}", dpid);
        true
    }

    /// Add a link between two registered switches. The link starts in the `Down` state. Each port
    /// can only be part of a single link.
    pub fn add_link(
        &mut self,
        a: Endpoint,
        b: Endpoint,
        weight: LinkWeight,
    ) -> Result<LinkId, TopologyError> {
        if a.dpid == b.dpid {
            return Err(TopologyError::SelfLoop(a.dpid));
        }
        let node_a = self.node(a.dpid)?;
        let node_b = self.node(b.dpid)?;
        for end in [a, b].iter() {
            if self.ports.contains_key(end) {
                return Err(TopologyError::PortInUse(*end));
            }
        }
        let link = Link { a, b, weight, status: LinkStatus::Down };
        let id = self.graph.add_edge(node_a, node_b, link);
        self.ports.insert(a, id);
        self.ports.insert(b, id);
        self.structure_version += 1;
        debug!("Added link {} <-> {} with weight {}", a, b, weight);
        Ok(id)
    }

    /// Remove the link between the two endpoints, returning it.
    pub fn remove_link(&mut self, a: Endpoint, b: Endpoint) -> Result<Link, TopologyError> {
        let id = self.find_link(a, b).ok_or(TopologyError::UnknownLink(a, b))?;
        let link = self.graph.remove_edge(id).ok_or(TopologyError::UnknownLink(a, b))?;
        self.ports.remove(&link.a);
        self.ports.remove(&link.b);
        self.structure_version += 1;
        debug!("Removed link {} <-> {}", a, b);
        Ok(link)
    }

    /// Returns all usable adjacencies of the switch, i.e., all neighbors reachable over a link
    /// that is currently up. The result is ordered by neighbor id and local port.
    pub fn neighbors(&self, dpid: DatapathId) -> Result<Vec<Neighbor>, TopologyError> {
        let node = self.node(dpid)?;
        let mut result = self
            .graph
            .edges(node)
            .filter(|e| e.weight().is_up())
            .filter_map(|e| {
                let link = e.weight();
                let local = link.end_on(dpid)?;
                let remote = link.peer(local)?;
                Some(Neighbor {
                    dpid: remote.dpid,
                    local_port: local.port,
                    remote_port: remote.port,
                    weight: link.weight,
                    link: e.id(),
                })
            })
            .collect::<Vec<_>>();
        result.sort_by_key(|n| (n.dpid, n.local_port));
        Ok(result)
    }

    /// Returns all links incident to the switch, regardless of their status.
    pub fn incident_links(&self, dpid: DatapathId) -> Result<Vec<LinkId>, TopologyError> {
        let node = self.node(dpid)?;
        let mut links = self.graph.edges(node).map(|e| e.id()).collect::<Vec<_>>();
        links.sort();
        Ok(links)
    }

    /// Returns a reference to the switch, or `None` if it is not registered.
    pub fn switch(&self, dpid: DatapathId) -> Option<&Switch> {
        self.switches.get(&dpid)
    }

    /// Returns a sorted vector of all registered switches
    pub fn switches(&self) -> Vec<DatapathId> {
        let mut switches = self.switches.keys().copied().collect::<Vec<_>>();
        switches.sort();
        switches
    }

    /// Returns a reference to the link, or `None` if it does not exist.
    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.graph.edge_weight(id)
    }

    /// Returns the ids of all links, in ascending order.
    pub fn links(&self) -> Vec<LinkId> {
        let mut links = self.graph.edge_indices().collect::<Vec<_>>();
        links.sort();
        links
    }

    /// Returns the link that uses the given port, if any.
    pub fn link_at(&self, end: Endpoint) -> Option<LinkId> {
        self.ports.get(&end).copied()
    }

    /// Returns the link connecting the two endpoints, if any.
    pub fn find_link(&self, a: Endpoint, b: Endpoint) -> Option<LinkId> {
        self.link_at(a).filter(|id| self.link(*id).map(|l| l.connects(a, b)).unwrap_or(false))
    }

    /// Returns the link between two switches with the lowest weight (and lowest id on a tie),
    /// regardless of its status.
    pub fn link_between(&self, x: DatapathId, y: DatapathId) -> Option<LinkId> {
        let node = self.switches.get(&x)?.node;
        self.graph
            .edges(node)
            .filter(|e| e.weight().end_on(y).is_some())
            .min_by_key(|e| (e.weight().weight, e.id()))
            .map(|e| e.id())
    }

    /// A port is an edge port if it is not part of any link, i.e., it may connect to a host.
    pub fn is_edge_port(&self, end: Endpoint) -> bool {
        !self.ports.contains_key(&end)
    }

    /// Returns true if the switch is connected and reported the port as active.
    pub fn is_port_active(&self, end: Endpoint) -> bool {
        self.switches
            .get(&end.dpid)
            .map(|s| s.connected && s.is_port_active(end.port))
            .unwrap_or(false)
    }

    /// Returns true if the switch is registered and connected
    pub fn is_connected(&self, dpid: DatapathId) -> bool {
        self.switches.get(&dpid).map(|s| s.connected).unwrap_or(false)
    }

    /// Returns all active edge ports of all connected switches, ordered by switch and port.
    pub fn active_edge_ports(&self) -> Vec<Endpoint> {
        self.switches()
            .into_iter()
            .filter_map(|dpid| self.switches.get(&dpid))
            .filter(|s| s.connected)
            .flat_map(|s| s.active_ports().map(move |port| Endpoint::new(s.dpid, port)))
            .filter(|end| self.is_edge_port(*end))
            .collect()
    }

    /// Number of registered switches
    pub fn num_switches(&self) -> usize {
        self.switches.len()
    }

    /// Number of links
    pub fn num_links(&self) -> usize {
        self.graph.edge_count()
    }

    /// Version counter of the structure. It is incremented whenever a switch or a link is added
    /// or removed, but not when the status of a link changes.
    pub fn structure_version(&self) -> u64 {
        self.structure_version
    }

    /// Mark the switch as connected and replace its set of active ports.
    pub(crate) fn set_connected(
        &mut self,
        dpid: DatapathId,
        ports: impl IntoIterator<Item = PortNo>,
    ) -> Result<(), TopologyError> {
        let switch = self.switches.get_mut(&dpid).ok_or(TopologyError::UnknownSwitch(dpid))?;
        switch.connected = true;
        switch.ports = ports.into_iter().collect();
        Ok(())
    }

    /// Mark the switch as disconnected. All of its ports are considered inactive.
    pub(crate) fn set_disconnected(&mut self, dpid: DatapathId) -> Result<(), TopologyError> {
        let switch = self.switches.get_mut(&dpid).ok_or(TopologyError::UnknownSwitch(dpid))?;
        switch.connected = false;
        switch.ports.clear();
        Ok(())
    }

    /// Set a single port active or inactive. Returns true if the port state changed.
    pub(crate) fn set_port(&mut self, end: Endpoint, active: bool) -> Result<bool, TopologyError> {
        let switch =
            self.switches.get_mut(&end.dpid).ok_or(TopologyError::UnknownSwitch(end.dpid))?;
        Ok(if active { switch.ports.insert(end.port) } else { switch.ports.remove(&end.port) })
    }

    /// Change the status of a link. Returns the previous status.
    pub(crate) fn set_link_status(&mut self, id: LinkId, status: LinkStatus) -> Option<LinkStatus> {
        let link = self.graph.edge_weight_mut(id)?;
        Some(std::mem::replace(&mut link.status, status))
    }

    fn node(&self, dpid: DatapathId) -> Result<NodeIndex<u32>, TopologyError> {
        self.switches.get(&dpid).map(|s| s.node).ok_or(TopologyError::UnknownSwitch(dpid))
    }
}

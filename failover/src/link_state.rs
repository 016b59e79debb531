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

//! # Link-State Monitor
//!
//! The monitor consumes connection and port signals of the switches, records them in the
//! [`Topology`], and derives the status of every affected link. A link is up if and only if
//! both switches are connected, both ports are active, and the link was not administratively
//! marked down. Every status flip is reported as a [`LinkChange`], which the controller forwards
//! to the path computer (to invalidate cached routes) and uses to reroute the flows over that
//! link.
//!
//! The monitor reflects the last known signal only. It does not retry anything, and it does not
//! dampen flapping ports.

use crate::openflow::SwitchFeatures;
use crate::topology::Topology;
use crate::types::{DatapathId, Endpoint, LinkId, LinkStatus, TopologyError};

use log::*;
use std::collections::HashSet;

/// Signal about the liveness of a switch or a port
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkSignal {
    /// The switch connected and reported its active ports
    ConnectionUp(SwitchFeatures),
    /// The connection to the switch was lost
    ConnectionLost(DatapathId),
    /// A port became active
    PortUp(Endpoint),
    /// A port went down
    PortDown(Endpoint),
}

/// Status transition of a single link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkChange {
    /// The link that changed
    pub link: LinkId,
    /// Both endpoints of the link
    pub endpoints: (Endpoint, Endpoint),
    /// Status before the change
    pub from: LinkStatus,
    /// Status after the change
    pub to: LinkStatus,
}

impl LinkChange {
    /// Returns true if the link went down
    pub fn is_down(&self) -> bool {
        self.to == LinkStatus::Down
    }

    /// Returns true if the link came up
    pub fn is_up(&self) -> bool {
        self.to == LinkStatus::Up
    }
}

/// # Link-State Monitor
/// Derives the link status from the signals of the switches. See the [module](self) documentation.
#[derive(Debug, Clone, Default)]
pub struct LinkStateMonitor {
    admin_down: HashSet<LinkId>,
}

impl LinkStateMonitor {
    /// Create a new monitor without any administrative overrides
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a signal, and return all link status transitions it caused.
    ///
    /// A switch which connects but is not yet registered in the topology is added to it. All other
    /// signals for unknown switches fail with `TopologyError::UnknownSwitch`. A port-up signal for
    /// a switch without a live connection is ignored.
    pub fn handle_signal(
        &mut self,
        topology: &mut Topology,
        signal: LinkSignal,
    ) -> Result<Vec<LinkChange>, TopologyError> {
        let affected: Vec<LinkId> = match signal {
            LinkSignal::ConnectionUp(features) => {
                let dpid = features.dpid;
                topology.add_switch(dpid);
                topology.set_connected(dpid, features.ports)?;
                topology.incident_links(dpid)?
            }
            LinkSignal::ConnectionLost(dpid) => {
                topology.set_disconnected(dpid)?;
                topology.incident_links(dpid)?
            }
            LinkSignal::PortUp(end) => {
                if topology.switch(end.dpid).is_none() {
                    return Err(TopologyError::UnknownSwitch(end.dpid));
                }
                if !topology.is_connected(end.dpid) {
                    debug!("Ignoring port up on {}, switch is not connected", end);
                    return Ok(Vec::new());
                }
                topology.set_port(end, true)?;
                topology.link_at(end).into_iter().collect()
            }
            LinkSignal::PortDown(end) => {
                topology.set_port(end, false)?;
                topology.link_at(end).into_iter().collect()
            }
        };
        Ok(self.reevaluate(topology, affected))
    }

    /// Administratively mark the link between `a` and `b` down. The link stays down, regardless of
    /// the port signals, until [`LinkStateMonitor::clear_mark`] is called. Returns the change, if
    /// the link was up before.
    pub fn mark_down(
        &mut self,
        topology: &mut Topology,
        a: Endpoint,
        b: Endpoint,
    ) -> Result<Option<LinkChange>, TopologyError> {
        let link = topology.find_link(a, b).ok_or(TopologyError::UnknownLink(a, b))?;
        if !self.admin_down.insert(link) {
            debug!("Link {} <-> {} is already marked down", a, b);
        }
        Ok(self.reevaluate(topology, vec![link]).pop())
    }

    /// Remove the administrative down mark of the link between `a` and `b`, and re-derive its
    /// status.
    pub fn clear_mark(
        &mut self,
        topology: &mut Topology,
        a: Endpoint,
        b: Endpoint,
    ) -> Result<Option<LinkChange>, TopologyError> {
        let link = topology.find_link(a, b).ok_or(TopologyError::UnknownLink(a, b))?;
        self.admin_down.remove(&link);
        Ok(self.reevaluate(topology, vec![link]).pop())
    }

    /// Re-derive the status of a single link, e.g., after it was added to the topology.
    pub fn refresh(&mut self, topology: &mut Topology, link: LinkId) -> Option<LinkChange> {
        self.reevaluate(topology, vec![link]).pop()
    }

    /// Forget everything about a link that was removed from the topology. Link ids may be reused
    /// by the topology, so a stale mark would apply to a new link.
    pub fn forget(&mut self, link: LinkId) {
        self.admin_down.remove(&link);
    }

    /// Returns true if the link was administratively marked down
    pub fn is_marked_down(&self, link: LinkId) -> bool {
        self.admin_down.contains(&link)
    }

    /// Derive the status of all given links, and apply the ones that changed.
    fn reevaluate(&self, topology: &mut Topology, links: Vec<LinkId>) -> Vec<LinkChange> {
        let mut changes = Vec::new();
        for id in links {
            let (endpoints, from) = match topology.link(id) {
                Some(link) => (link.endpoints(), link.status()),
                None => continue,
            };
            let to = self.derive_status(topology, id, endpoints);
            if from == to {
                continue;
            }
            topology.set_link_status(id, to);
            info!("Link {} <-> {} is {}", endpoints.0, endpoints.1, to);
            changes.push(LinkChange { link: id, endpoints, from, to });
        }
        changes
    }

    fn derive_status(
        &self,
        topology: &Topology,
        id: LinkId,
        (a, b): (Endpoint, Endpoint),
    ) -> LinkStatus {
        let marked = self.admin_down.contains(&id);
        if !marked && topology.is_port_active(a) && topology.is_port_active(b) {
            LinkStatus::Up
        } else {
            LinkStatus::Down
        }
    }
}

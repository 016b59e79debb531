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

//! # Forwarding State
//!
//! Follows a packet through the flow tables of simulated switches, hop by hop over the links of
//! the topology. This is used to check the data plane that results from the installed rules: a
//! packet is either delivered at an edge port, or it ends in a black hole, in a forwarding loop,
//! or at the controller.

use crate::connection::SwitchHandle;
use crate::openflow::{Action, PseudoPort};
use crate::topology::Topology;
use crate::types::{DatapathId, Endpoint, MacAddr};

use log::*;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Successful delivery of a traced packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Switches traversed, in order
    pub switches: Vec<DatapathId>,
    /// Edge port at which the packet leaves the network
    pub egress: Endpoint,
}

/// Reasons why a traced packet was not delivered. Every variant carries the switches traversed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TraceError {
    /// No entry matched, or the packet was sent over a link that is down
    #[error("Black hole occurred! path: {0:?}")]
    BlackHole(Vec<DatapathId>),
    /// The packet entered the same switch on the same port twice
    #[error("Forwarding Loop occurred! path: {0:?}")]
    ForwardingLoop(Vec<DatapathId>),
    /// The packet matched the table-miss entry and was sent to the controller
    #[error("Packet sent to the controller at the end of path {0:?}")]
    SentToController(Vec<DatapathId>),
    /// The packet matched a flood entry
    #[error("Packet flooded at the end of path {0:?}")]
    Flooded(Vec<DatapathId>),
}

/// Follow a packet from `src` to `dst` entering the network at `ingress`.
pub fn trace_packet(
    topology: &Topology,
    switches: &HashMap<DatapathId, SwitchHandle>,
    ingress: Endpoint,
    src: MacAddr,
    dst: MacAddr,
) -> Result<Delivery, TraceError> {
    let mut visited: HashSet<Endpoint> = HashSet::new();
    let mut path: Vec<DatapathId> = Vec::new();
    let mut current = ingress;
    loop {
        path.push(current.dpid);
        if !visited.insert(current) {
            trace!("Forwarding loop detected: {:?}", path);
            return Err(TraceError::ForwardingLoop(path));
        }
        let actions = match switches.get(&current.dpid) {
            Some(handle) => handle.lookup(current.port, src, dst),
            None => None,
        };
        let out_port = match actions.as_ref().and_then(|a| a.first()) {
            Some(Action::Output(PseudoPort::Physical(p))) => *p,
            Some(Action::Output(PseudoPort::Controller)) => {
                return Err(TraceError::SentToController(path))
            }
            Some(Action::Output(PseudoPort::Flood)) => return Err(TraceError::Flooded(path)),
            None => {
                trace!("Black hole detected: {:?}", path);
                return Err(TraceError::BlackHole(path));
            }
        };
        let out = Endpoint::new(current.dpid, out_port);
        if topology.is_edge_port(out) {
            return Ok(Delivery { switches: path, egress: out });
        }
        current = match topology.link_at(out).and_then(|id| topology.link(id)) {
            Some(link) if link.is_up() => match link.peer(out) {
                Some(next) => next,
                None => return Err(TraceError::BlackHole(path)),
            },
            _ => return Err(TraceError::BlackHole(path)),
        };
    }
}

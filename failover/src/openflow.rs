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

//! # OpenFlow messages
//!
//! Minimal model of the OpenFlow 1.0 messages exchanged between the controller and the switches.
//! The session layer (TCP connection, handshake, wire encoding) is not part of this crate; it
//! hands the controller the already decoded inbound records ([`SwitchFeatures`], [`PortStatus`],
//! [`PacketIn`]) and accepts the outbound [`OfMessage`]s through a
//! [`SwitchConnection`](crate::connection::SwitchConnection).

use crate::types::{DatapathId, Endpoint, MacAddr, PortNo};

/// Priority of the table-miss entry, which is installed on every switch when it connects.
pub const TABLE_MISS_PRIORITY: u16 = 0;

/// Features reported by a switch when it connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchFeatures {
    /// Datapath id of the switch
    pub dpid: DatapathId,
    /// All ports which are currently active (link detected and not administratively down)
    pub ports: Vec<PortNo>,
}

/// Asynchronous port status message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortStatus {
    /// The port whose state changed
    pub endpoint: Endpoint,
    /// New state of the port
    pub up: bool,
}

/// Packet sent to the controller by a switch, because no flow entry matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketIn {
    /// Switch that received the packet
    pub dpid: DatapathId,
    /// Port at which the packet was received
    pub in_port: PortNo,
    /// Ethernet source address
    pub src: MacAddr,
    /// Ethernet destination address
    pub dst: MacAddr,
    /// Buffer id, if the switch buffered the packet
    pub buffer_id: Option<u32>,
    /// Raw packet (or the part of it which was not buffered)
    pub data: Vec<u8>,
}

/// Match fields of a flow entry. `None` is a wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Match {
    /// Ingress port
    pub in_port: Option<PortNo>,
    /// Ethernet source address
    pub dl_src: Option<MacAddr>,
    /// Ethernet destination address
    pub dl_dst: Option<MacAddr>,
}

impl Match {
    /// Match that wildcards every field.
    pub fn match_all() -> Self {
        Self::default()
    }

    /// Exact match on ingress port, source and destination.
    pub fn exact(in_port: PortNo, src: MacAddr, dst: MacAddr) -> Self {
        Self { in_port: Some(in_port), dl_src: Some(src), dl_dst: Some(dst) }
    }

    /// Check whether a packet with the given header fields would match.
    pub fn matches(&self, in_port: PortNo, src: MacAddr, dst: MacAddr) -> bool {
        self.in_port.map(|p| p == in_port).unwrap_or(true)
            && self.dl_src.map(|m| m == src).unwrap_or(true)
            && self.dl_dst.map(|m| m == dst).unwrap_or(true)
    }

    /// Check whether every field fixed by `self` is fixed to the same value in `other`.
    pub fn covers(&self, other: &Match) -> bool {
        self.in_port.map(|p| other.in_port == Some(p)).unwrap_or(true)
            && self.dl_src.map(|m| other.dl_src == Some(m)).unwrap_or(true)
            && self.dl_dst.map(|m| other.dl_dst == Some(m)).unwrap_or(true)
    }
}

/// Output port of an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PseudoPort {
    /// A physical port of the switch
    Physical(PortNo),
    /// All ports except the ingress port (and ports disabled for flooding)
    Flood,
    /// Send the packet to the controller
    Controller,
}

/// Action applied to matching packets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Output the packet on the given port
    Output(PseudoPort),
}

/// Command of a flow modification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowModCommand {
    /// Add a new flow entry, replacing an entry with identical match and priority
    Add,
    /// Delete every entry whose match is covered by the given match, at any priority
    Delete,
    /// Delete the entry with identical match and priority
    DeleteStrict,
}

/// Flow table modification
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlowMod {
    /// What to do
    pub command: FlowModCommand,
    /// Match of the entry
    pub pattern: Match,
    /// Priority of the entry
    pub priority: u16,
    /// Actions, empty for deletions
    pub actions: Vec<Action>,
}

impl FlowMod {
    /// Flow modification adding an entry
    pub fn add_flow(priority: u16, pattern: Match, actions: Vec<Action>) -> Self {
        Self { command: FlowModCommand::Add, pattern, priority, actions }
    }

    /// Flow modification removing exactly the entry with the given match and priority
    pub fn delete_strict(priority: u16, pattern: Match) -> Self {
        Self { command: FlowModCommand::DeleteStrict, pattern, priority, actions: Vec::new() }
    }

    /// Flow modification clearing the whole flow table
    pub fn delete_all() -> Self {
        Self {
            command: FlowModCommand::Delete,
            pattern: Match::match_all(),
            priority: 0,
            actions: Vec::new(),
        }
    }
}

/// Instructs the switch to send out a packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketOut {
    /// Buffer of the packet on the switch, if it was buffered
    pub buffer_id: Option<u32>,
    /// Port at which the packet originally arrived
    pub in_port: Option<PortNo>,
    /// Raw packet, if it was not buffered
    pub data: Vec<u8>,
    /// Actions to apply
    pub actions: Vec<Action>,
}

impl PacketOut {
    /// Send the packet from a `PacketIn` out on a single physical port.
    pub fn forward(packet: &PacketIn, port: PortNo) -> Self {
        Self {
            buffer_id: packet.buffer_id,
            in_port: Some(packet.in_port),
            data: packet.data.clone(),
            actions: vec![Action::Output(PseudoPort::Physical(port))],
        }
    }
}

/// Outbound message from the controller to a switch
#[derive(Debug, Clone, PartialEq)]
pub enum OfMessage {
    /// Flow table modification
    FlowMod(FlowMod),
    /// Packet to be sent out by the switch
    PacketOut(PacketOut),
}

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

//! Module for defining events

use crate::openflow::{PacketIn, PortStatus, SwitchFeatures};
use crate::types::DatapathId;

use std::collections::VecDeque;
use std::fmt;

/// Event delivered by the OpenFlow session layer. Switch-connect events hand the connection over
/// to the controller, which owns it from then on.
pub enum Event<C> {
    /// A switch connected, and reported its features
    SwitchConnected(SwitchFeatures, C),
    /// The connection to a switch was closed
    SwitchDisconnected(DatapathId),
    /// A port of a switch changed its state
    PortStatus(PortStatus),
    /// A switch sent a packet to the controller
    PacketIn(PacketIn),
}

/// Kind of an [`Event`], used as the key of the dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// [`Event::SwitchConnected`]
    SwitchConnected,
    /// [`Event::SwitchDisconnected`]
    SwitchDisconnected,
    /// [`Event::PortStatus`]
    PortStatus,
    /// [`Event::PacketIn`]
    PacketIn,
}

impl<C> Event<C> {
    /// Returns the kind of the event
    pub fn kind(&self) -> EventKind {
        match self {
            Event::SwitchConnected(_, _) => EventKind::SwitchConnected,
            Event::SwitchDisconnected(_) => EventKind::SwitchDisconnected,
            Event::PortStatus(_) => EventKind::PortStatus,
            Event::PacketIn(_) => EventKind::PacketIn,
        }
    }

    /// Returns the switch from which the event originates
    pub fn dpid(&self) -> DatapathId {
        match self {
            Event::SwitchConnected(features, _) => features.dpid,
            Event::SwitchDisconnected(dpid) => *dpid,
            Event::PortStatus(status) => status.endpoint.dpid,
            Event::PacketIn(packet) => packet.dpid,
        }
    }
}

impl<C> fmt::Debug for Event<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::SwitchConnected(features, _) => {
                f.debug_tuple("SwitchConnected").field(features).finish()
            }
            Event::SwitchDisconnected(dpid) => {
                f.debug_tuple("SwitchDisconnected").field(dpid).finish()
            }
            Event::PortStatus(status) => f.debug_tuple("PortStatus").field(status).finish(),
            Event::PacketIn(packet) => f.debug_tuple("PacketIn").field(packet).finish(),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::SwitchConnected => write!(f, "switch-connected"),
            EventKind::SwitchDisconnected => write!(f, "switch-disconnected"),
            EventKind::PortStatus => write!(f, "port-status"),
            EventKind::PacketIn => write!(f, "packet-in"),
        }
    }
}

/// Event queue, processed in arrival order.
pub(crate) type EventQueue<C> = VecDeque<Event<C>>;

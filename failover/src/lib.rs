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

#![deny(missing_docs)]

//! # Failover: Shortest-Path Flow Control for OpenFlow Networks
//! This is a library for a reactive OpenFlow 1.0 controller. The controller learns the location of
//! the hosts from the traffic they send, installs shortest-path forwarding rules for every pair
//! of communicating hosts, and moves these flows to an alternative path as soon as a link on
//! their current path fails.
//!
//! ## Structure
//!
//! This library is structured in the following way:
//!
//! - **[`Topology`](topology::Topology)**: Model of the switches, their ports, and the links
//!   between them. The status of a link is never set directly, but derived by the
//!   [`LinkStateMonitor`](link_state::LinkStateMonitor) from the connection and port signals of
//!   the switches.
//!
//! - **[`PathComputer`](path::PathComputer)**: Dijkstra's shortest path over all links which are
//!   up, with a deterministic tie-break and a lazily invalidated cache.
//!
//! - **[`FlowInstaller`](flow::FlowInstaller)**: Turns paths into per-switch forwarding rules,
//!   installs them from the egress towards the ingress, and rolls back partial installations.
//!
//! - **[`Controller`](controller::Controller)**: The event loop, dispatching switch connections,
//!   port status changes and packet-ins to their handlers.
//!
//! - **[`SwitchConnection`](connection::SwitchConnection)**: The outbound side of the OpenFlow
//!   session. The [`SimulatedSwitch`](connection::SimulatedSwitch) keeps a flow table in memory,
//!   which is used to [trace](forwarding::trace_packet) packets through the network.
//!
//! - **[`Config`](config)**: Controller configuration and static topology descriptions, both
//!   read from JSON.
//!
//! - **[`ExampleNetworks`](example_networks)**: Prepared topologies, and random meshes of
//!   arbitrary size.
//!
//! ## Usage
//!
//! ```
//! use failover::config::ControllerConfig;
//! use failover::connection::SimulatedSwitch;
//! use failover::controller::Controller;
//! use failover::event::Event;
//! use failover::example_networks::{ExampleNetwork, Square};
//! use failover::forwarding::trace_packet;
//! use failover::openflow::{PacketIn, PortStatus, SwitchFeatures};
//! use failover::{DatapathId, Endpoint, Error};
//! use std::collections::HashMap;
//!
//! fn main() -> Result<(), Error> {
//!     let desc = Square::description();
//!     let mut controller = Controller::new(desc.build()?, ControllerConfig::default());
//!
//!     let mut handles = HashMap::new();
//!     for dpid in desc.switches.iter() {
//!         let switch = SimulatedSwitch::new(*dpid);
//!         handles.insert(*dpid, switch.handle());
//!         let features = SwitchFeatures { dpid: *dpid, ports: desc.ports_of(*dpid) };
//!         controller.push_event(Event::SwitchConnected(features, switch));
//!     }
//!
//!     let h1 = desc.host("h1").unwrap().clone();
//!     let h4 = desc.host("h4").unwrap().clone();
//!     controller.push_event(Event::PacketIn(PacketIn {
//!         dpid: h4.attachment.dpid,
//!         in_port: h4.attachment.port,
//!         src: h4.mac,
//!         dst: h1.mac,
//!         buffer_id: None,
//!         data: Vec::new(),
//!     }));
//!     controller.push_event(Event::PacketIn(PacketIn {
//!         dpid: h1.attachment.dpid,
//!         in_port: h1.attachment.port,
//!         src: h1.mac,
//!         dst: h4.mac,
//!         buffer_id: None,
//!         data: Vec::new(),
//!     }));
//!
//!     // the link between s1 and s2 fails
//!     let s1 = DatapathId(1);
//!     let endpoint = Endpoint::new(s1, 2);
//!     controller.push_event(Event::PortStatus(PortStatus { endpoint, up: false }));
//!     assert!(controller.do_queue().is_empty());
//!
//!     // traffic from h1 to h4 now takes the lower path
//!     let delivery = trace_packet(controller.topology(), &handles, h1.attachment, h1.mac, h4.mac)
//!         .unwrap();
//!     assert_eq!(delivery.switches, vec![DatapathId(1), DatapathId(3), DatapathId(4)]);
//!     assert_eq!(delivery.egress, h4.attachment);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod controller;
mod error;
pub mod event;
pub mod example_networks;
pub mod flow;
pub mod forwarding;
pub mod link_state;
pub mod openflow;
pub mod path;
pub mod printer;
pub mod topology;
mod types;

#[cfg(test)]
mod test;

pub use error::Error;
pub use types::*;

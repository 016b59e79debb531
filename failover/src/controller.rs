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

//! # Controller Core
//!
//! The controller owns all state: the topology, the link-state monitor, the path computer, the
//! flow installer, the learned hosts, and the connections to the switches. Events are processed
//! one at a time, strictly in arrival order, and every handler runs to completion before the next
//! event is taken from the queue. Hence, no locks are needed.
//!
//! Events are dispatched by their [`EventKind`]:
//!
//! | Event                | Handler                                                             |
//! |----------------------|---------------------------------------------------------------------|
//! | switch connected     | store the connection, clear the flow table, install table-miss     |
//! | switch disconnected  | drop the connection, update the link state, reroute affected flows |
//! | port status          | update the link state, reroute affected flows                      |
//! | packet in            | learn the source host, flood or install the path to the destination |
//!
//! Errors of a handler are logged, and the affected flow is left unrouted. The controller never
//! forwards traffic over a guessed path, and it never retries on its own. A later packet-in for
//! the same flow triggers the computation again.
//!
//! ```rust
//! use failover::config::ControllerConfig;
//! use failover::connection::SimulatedSwitch;
//! use failover::controller::Controller;
//! use failover::event::Event;
//! use failover::example_networks::{ExampleNetwork, Triangle};
//! use failover::openflow::{PacketIn, SwitchFeatures};
//! use failover::{DatapathId, FlowKey};
//!
//! fn main() -> Result<(), failover::Error> {
//!     let desc = Triangle::description();
//!     let mut controller = Controller::new(desc.build()?, ControllerConfig::default());
//!
//!     // all switches connect
//!     for dpid in desc.switches.iter() {
//!         let features = SwitchFeatures { dpid: *dpid, ports: desc.ports_of(*dpid) };
//!         controller.push_event(Event::SwitchConnected(features, SimulatedSwitch::new(*dpid)));
//!     }
//!
//!     // h1 talks to h2, and h2 answers
//!     let h1 = desc.host("h1").unwrap();
//!     let h2 = desc.host("h2").unwrap();
//!     for (src, dst) in vec![(h1, h2), (h2, h1)] {
//!         controller.push_event(Event::PacketIn(PacketIn {
//!             dpid: src.attachment.dpid,
//!             in_port: src.attachment.port,
//!             src: src.mac,
//!             dst: dst.mac,
//!             buffer_id: None,
//!             data: Vec::new(),
//!         }));
//!     }
//!     assert!(controller.do_queue().is_empty());
//!
//!     let flow = controller.flows().get(FlowKey::new(h2.mac, h1.mac)).unwrap();
//!     assert_eq!(flow.path.switches(), vec![DatapathId(2), DatapathId(1)]);
//!     Ok(())
//! }
//! ```

use crate::config::{ControllerConfig, TableMiss};
use crate::connection::{Connections, SwitchConnection};
use crate::event::{Event, EventKind, EventQueue};
use crate::flow::FlowInstaller;
use crate::link_state::{LinkChange, LinkSignal, LinkStateMonitor};
use crate::openflow::{
    Action, FlowMod, Match, OfMessage, PacketIn, PacketOut, PortStatus, PseudoPort,
    TABLE_MISS_PRIORITY,
};
use crate::path::PathComputer;
use crate::printer;
use crate::topology::Topology;
use crate::types::{
    ControllerError, DatapathId, Endpoint, FlowKey, LinkId, LinkWeight, MacAddr, PathError,
    TopologyError,
};

use log::*;
use std::collections::{BTreeMap, HashMap};

/// Handler of a single event kind
pub type Handler<C> = fn(&mut Controller<C>, Event<C>) -> Result<(), ControllerError>;

/// Host learned by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Host {
    /// MAC address of the host
    pub mac: MacAddr,
    /// Edge port at which the host was first seen
    pub attachment: Endpoint,
}

/// # Controller
/// Event-driven flow controller. See the [module](self) documentation.
#[derive(Debug)]
pub struct Controller<C> {
    config: ControllerConfig,
    topology: Topology,
    monitor: LinkStateMonitor,
    paths: PathComputer,
    flows: FlowInstaller,
    hosts: HashMap<MacAddr, Host>,
    connections: Connections<C>,
    queue: EventQueue<C>,
    num_events: usize,
}

impl<C: SwitchConnection> Controller<C> {
    /// Create a controller for the given topology. All switches of the topology are expected to
    /// be disconnected.
    pub fn new(topology: Topology, config: ControllerConfig) -> Self {
        let flows = FlowInstaller::new(config.flow_priority);
        Self {
            config,
            topology,
            monitor: LinkStateMonitor::new(),
            paths: PathComputer::new(),
            flows,
            hosts: HashMap::new(),
            connections: Connections::new(),
            queue: EventQueue::new(),
            num_events: 0,
        }
    }

    /// Enqueue an event. It is processed by the next call to [`Controller::do_queue`].
    pub fn push_event(&mut self, event: Event<C>) {
        self.queue.push_back(event);
    }

    /// Process all enqueued events in arrival order. Errors of the individual events are logged
    /// and returned, but they do not stop the processing of the queue.
    pub fn do_queue(&mut self) -> Vec<ControllerError> {
        let mut errors = Vec::new();
        while let Some(event) = self.queue.pop_front() {
            let (kind, dpid) = (event.kind(), event.dpid());
            if let Err(e) = self.handle_event(event) {
                warn!("Error while handling {} event from {}: {}", kind, dpid, e);
                errors.push(e);
            }
        }
        errors
    }

    /// Process a single event right away, bypassing the queue.
    pub fn handle_event(&mut self, event: Event<C>) -> Result<(), ControllerError> {
        self.num_events += 1;
        trace!("{}", printer::event(&event));
        let handler = Self::dispatch(event.kind());
        handler(self, event)
    }

    /// Dispatch table, mapping each kind of event to its handler.
    pub fn dispatch(kind: EventKind) -> Handler<C> {
        match kind {
            EventKind::SwitchConnected => Self::on_switch_connected,
            EventKind::SwitchDisconnected => Self::on_switch_disconnected,
            EventKind::PortStatus => Self::on_port_status,
            EventKind::PacketIn => Self::on_packet_in,
        }
    }

    /// Add a link to the topology at runtime. The link comes up right away if both of its ports
    /// are active. Fails with `PortInUse` if a learned host is attached to one of the ports.
    pub fn add_link(
        &mut self,
        a: Endpoint,
        b: Endpoint,
        weight: LinkWeight,
    ) -> Result<LinkId, ControllerError> {
        if let Some(host) = self.hosts.values().find(|h| h.attachment == a || h.attachment == b) {
            return Err(TopologyError::PortInUse(host.attachment).into());
        }
        let id = self.topology.add_link(a, b, weight)?;
        let changes = self.monitor.refresh(&mut self.topology, id);
        self.react(changes.into_iter().collect(), Vec::new());
        Ok(id)
    }

    /// Remove a link from the topology at runtime, and reroute all flows that used it.
    pub fn remove_link(&mut self, a: Endpoint, b: Endpoint) -> Result<(), ControllerError> {
        let id = self.topology.find_link(a, b).ok_or(TopologyError::UnknownLink(a, b))?;
        let affected = self.flows.flows_using_link(id);
        self.topology.remove_link(a, b)?;
        self.monitor.forget(id);
        info!("Removed link {} <-> {}, rerouting {} flows", a, b, affected.len());
        self.react(Vec::new(), affected);
        Ok(())
    }

    /// Administratively take down the link between `a` and `b`, and reroute the affected flows.
    pub fn mark_link_down(&mut self, a: Endpoint, b: Endpoint) -> Result<(), ControllerError> {
        let changes = self.monitor.mark_down(&mut self.topology, a, b)?;
        self.react(changes.into_iter().collect(), Vec::new());
        Ok(())
    }

    /// Remove the administrative down mark of the link between `a` and `b`.
    pub fn clear_link_mark(&mut self, a: Endpoint, b: Endpoint) -> Result<(), ControllerError> {
        let changes = self.monitor.clear_mark(&mut self.topology, a, b)?;
        self.react(changes.into_iter().collect(), Vec::new());
        Ok(())
    }

    /// Returns a reference to the topology
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Returns a reference to the flow installer, containing all active flows.
    pub fn flows(&self) -> &FlowInstaller {
        &self.flows
    }

    /// Returns a reference to the path computer
    pub fn paths(&self) -> &PathComputer {
        &self.paths
    }

    /// Returns the configuration
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Returns the learned host, if any
    pub fn host(&self, mac: MacAddr) -> Option<&Host> {
        self.hosts.get(&mac)
    }

    /// Returns all learned hosts, ordered by their MAC address
    pub fn hosts(&self) -> Vec<Host> {
        let mut hosts = self.hosts.values().copied().collect::<Vec<_>>();
        hosts.sort_by_key(|h| h.mac);
        hosts
    }

    /// Returns true if the controller holds a connection to the switch
    pub fn is_connected(&self, dpid: DatapathId) -> bool {
        self.connections.contains_key(&dpid)
    }

    /// Returns the connection to the switch, if any
    pub fn connection(&self, dpid: DatapathId) -> Option<&C> {
        self.connections.get(&dpid)
    }

    /// Number of events handled so far
    pub fn num_events(&self) -> usize {
        self.num_events
    }

    /// Number of events waiting in the queue
    pub fn num_pending(&self) -> usize {
        self.queue.len()
    }

    fn on_switch_connected(&mut self, event: Event<C>) -> Result<(), ControllerError> {
        let (features, connection) = match event {
            Event::SwitchConnected(features, connection) => (features, connection),
            e => return Err(ControllerError::InvalidEvent(e.kind())),
        };
        let dpid = features.dpid;
        info!("Switch {} has connected", dpid);

        // a fresh connection comes with an empty flow table
        let affected = if self.connections.insert(dpid, connection).is_some() {
            warn!("Switch {} was already connected, replacing the old connection", dpid);
            self.flows.flows_via_switch(dpid)
        } else {
            Vec::new()
        };
        // entries left over from an earlier session are not tracked anymore
        let cleared = self.send(dpid, OfMessage::FlowMod(FlowMod::delete_all()));
        let signal = LinkSignal::ConnectionUp(features);
        let changes = self.monitor.handle_signal(&mut self.topology, signal)?;
        self.react(changes, affected);
        cleared.and(self.install_table_miss(dpid))
    }

    fn on_switch_disconnected(&mut self, event: Event<C>) -> Result<(), ControllerError> {
        let dpid = match event {
            Event::SwitchDisconnected(dpid) => dpid,
            e => return Err(ControllerError::InvalidEvent(e.kind())),
        };
        if self.connections.remove(&dpid).is_none() {
            return Err(ControllerError::UnknownSwitch(dpid));
        }
        info!("Switch {} has disconnected", dpid);

        let signal = LinkSignal::ConnectionLost(dpid);
        let changes = self.monitor.handle_signal(&mut self.topology, signal)?;
        let affected = self.flows.flows_via_switch(dpid);
        self.react(changes, affected);
        Ok(())
    }

    fn on_port_status(&mut self, event: Event<C>) -> Result<(), ControllerError> {
        let PortStatus { endpoint, up } = match event {
            Event::PortStatus(status) => status,
            e => return Err(ControllerError::InvalidEvent(e.kind())),
        };
        if !self.connections.contains_key(&endpoint.dpid) {
            return Err(ControllerError::UnknownSwitch(endpoint.dpid));
        }
        debug!("Port {} is {}", endpoint, if up { "up" } else { "down" });

        let (signal, affected) = if up {
            (LinkSignal::PortUp(endpoint), Vec::new())
        } else {
            (LinkSignal::PortDown(endpoint), self.flows.flows_using_port(endpoint))
        };
        let changes = self.monitor.handle_signal(&mut self.topology, signal)?;
        self.react(changes, affected);
        Ok(())
    }

    fn on_packet_in(&mut self, event: Event<C>) -> Result<(), ControllerError> {
        let packet = match event {
            Event::PacketIn(packet) => packet,
            e => return Err(ControllerError::InvalidEvent(e.kind())),
        };
        if !self.connections.contains_key(&packet.dpid) {
            return Err(ControllerError::UnknownSwitch(packet.dpid));
        }

        self.learn(packet.src, Endpoint::new(packet.dpid, packet.in_port));

        if !self.hosts.contains_key(&packet.dst) {
            if self.config.flood_unknown {
                self.flood(&packet);
            } else {
                debug!("Dropping packet to unknown host {}", packet.dst);
            }
            return Ok(());
        }

        let key = FlowKey::new(packet.src, packet.dst);
        if self.flows.get(key).is_none() {
            if let Err(e) = self.route_flow(key) {
                debug!("Dropping packet of flow {}", key);
                return Err(e);
            }
        }

        // forward the packet along the path, if it arrived on the path
        let hop = self.flows.get(key).and_then(|f| f.path.hop_on(packet.dpid)).copied();
        match hop {
            Some(hop) if hop.in_port == packet.in_port => {
                let msg = OfMessage::PacketOut(PacketOut::forward(&packet, hop.out_port));
                self.send(packet.dpid, msg)
            }
            _ => {
                debug!("Packet of flow {} arrived off its path at {}, dropping", key, packet.dpid);
                Ok(())
            }
        }
    }

    /// Learn the attachment of a host, if the packet entered the network at an edge port.
    fn learn(&mut self, mac: MacAddr, ingress: Endpoint) {
        if !self.topology.is_edge_port(ingress) {
            return;
        }
        match self.hosts.get(&mac) {
            Some(host) if host.attachment != ingress => {
                debug!("Host {} seen at {}, but attached at {}", mac, ingress, host.attachment)
            }
            Some(_) => {}
            None => {
                info!("Learned host {} at {}", mac, ingress);
                self.hosts.insert(mac, Host { mac, attachment: ingress });
            }
        }
    }

    /// Send the packet out of all active edge ports, except the one where it entered.
    fn flood(&mut self, packet: &PacketIn) {
        let ingress = Endpoint::new(packet.dpid, packet.in_port);
        let mut ports: BTreeMap<DatapathId, Vec<Action>> = BTreeMap::new();
        for end in self.topology.active_edge_ports() {
            if end != ingress && self.connections.contains_key(&end.dpid) {
                let action = Action::Output(PseudoPort::Physical(end.port));
                ports.entry(end.dpid).or_default().push(action);
            }
        }
        debug!("Flooding packet to unknown host {} on {} switches", packet.dst, ports.len());
        for (dpid, actions) in ports {
            let at_ingress = dpid == packet.dpid;
            let msg = OfMessage::PacketOut(PacketOut {
                buffer_id: if at_ingress { packet.buffer_id } else { None },
                in_port: if at_ingress { Some(packet.in_port) } else { None },
                data: packet.data.clone(),
                actions,
            });
            if let Err(e) = self.send(dpid, msg) {
                warn!("Cannot flood packet on {}: {}", dpid, e);
            }
        }
    }

    /// Compute the path of the flow and install it.
    fn route_flow(&mut self, key: FlowKey) -> Result<(), ControllerError> {
        let src = self.hosts.get(&key.src).ok_or(PathError::UnknownHost(key.src))?.attachment;
        let dst = self.hosts.get(&key.dst).ok_or(PathError::UnknownHost(key.dst))?.attachment;
        let path = self.paths.path(&self.topology, key, src, dst)?;
        debug!("Path for flow {}: {}", key, printer::path(&path));
        self.flows.install(&self.topology, path, &mut self.connections)?;
        Ok(())
    }

    /// Delete the rules of the flow, and install it on a new path if there is one.
    fn reroute(&mut self, key: FlowKey) {
        self.flows.remove(key, &mut self.connections);
        match self.route_flow(key) {
            Ok(()) => info!("Rerouted flow {}", key),
            Err(e) => warn!("Flow {} is left unrouted: {}", key, e),
        }
    }

    /// Move every active flow to a strictly cheaper path, if one exists.
    fn reoptimize(&mut self) {
        let candidates = self
            .flows
            .flows()
            .map(|(key, flow)| (*key, flow.path.cost))
            .collect::<Vec<_>>();
        for (key, cost) in candidates {
            let (src, dst) = match (self.hosts.get(&key.src), self.hosts.get(&key.dst)) {
                (Some(s), Some(d)) => (s.attachment, d.attachment),
                _ => continue,
            };
            let better = match self.paths.path(&self.topology, key, src, dst) {
                Ok(path) if path.cost < cost => path,
                _ => continue,
            };
            info!("Moving flow {} to a cheaper path: {}", key, printer::path(&better));
            if let Err(e) = self.flows.install(&self.topology, better, &mut self.connections) {
                warn!("Flow {} is left unrouted: {}", key, e);
            }
        }
    }

    /// Propagate link changes to the path computer, and reroute all affected flows.
    fn react(&mut self, changes: Vec<LinkChange>, mut affected: Vec<FlowKey>) {
        for change in changes.iter() {
            self.paths.invalidate(change);
            if change.is_down() {
                affected.extend(self.flows.flows_using_link(change.link));
            }
        }
        affected.sort();
        affected.dedup();
        for key in affected {
            self.reroute(key);
        }
        if self.config.reroute_on_link_up && changes.iter().any(|c| c.is_up()) {
            self.reoptimize();
        }
    }

    /// Install the table-miss entry on a switch.
    fn install_table_miss(&mut self, dpid: DatapathId) -> Result<(), ControllerError> {
        let port = match self.config.table_miss {
            TableMiss::Controller => PseudoPort::Controller,
            TableMiss::Flood => PseudoPort::Flood,
        };
        let flow_mod =
            FlowMod::add_flow(TABLE_MISS_PRIORITY, Match::match_all(), vec![Action::Output(port)]);
        self.send(dpid, OfMessage::FlowMod(flow_mod))
    }

    fn send(&mut self, dpid: DatapathId, msg: OfMessage) -> Result<(), ControllerError> {
        let connection =
            self.connections.get_mut(&dpid).ok_or(ControllerError::UnknownSwitch(dpid))?;
        connection.send(msg).map_err(|e| ControllerError::SendError(dpid, e))
    }
}


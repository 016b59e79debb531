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

use crate::config::{ControllerConfig, HostDescription, TableMiss, TopologyDescription};
use crate::connection::{SimulatedSwitch, SwitchHandle};
use crate::controller::Controller;
use crate::event::{Event, EventKind};
use crate::example_networks::{ExampleNetwork, Square, Triangle};
use crate::forwarding::{trace_packet, Delivery, TraceError};
use crate::openflow::{
    Action, Match, PacketIn, PortStatus, PseudoPort, SwitchFeatures, TABLE_MISS_PRIORITY,
};
use crate::{
    ControllerError, DatapathId, Endpoint, FlowKey, InstallError, MacAddr, PathError, TopologyError,
};
use lazy_static::lazy_static;
use maplit::{hashmap, hashset};
use std::collections::{HashMap, HashSet};

lazy_static! {
    static ref S1: DatapathId = DatapathId(1);
    static ref S2: DatapathId = DatapathId(2);
    static ref S3: DatapathId = DatapathId(3);
    static ref S4: DatapathId = DatapathId(4);
}

struct Net {
    controller: Controller<SimulatedSwitch>,
    handles: HashMap<DatapathId, SwitchHandle>,
    desc: TopologyDescription,
}

impl Net {
    fn host(&self, name: &str) -> HostDescription {
        self.desc.host(name).unwrap().clone()
    }

    fn connect(&mut self, dpid: DatapathId) {
        let switch = SimulatedSwitch::new(dpid);
        self.handles.insert(dpid, switch.handle());
        let features = SwitchFeatures { dpid, ports: self.desc.ports_of(dpid) };
        self.controller.push_event(Event::SwitchConnected(features, switch));
    }

    /// The switch connects again, keeping the flow table of its earlier session.
    fn reconnect(&mut self, dpid: DatapathId) {
        let switch = self.handles[&dpid].reconnect();
        let features = SwitchFeatures { dpid, ports: self.desc.ports_of(dpid) };
        self.controller.push_event(Event::SwitchConnected(features, switch));
    }

    fn ping(&mut self, from: &str, to: &str) {
        let src = self.host(from);
        let dst = self.host(to);
        self.controller.push_event(Event::PacketIn(PacketIn {
            dpid: src.attachment.dpid,
            in_port: src.attachment.port,
            src: src.mac,
            dst: dst.mac,
            buffer_id: None,
            data: vec![0xca, 0xfe],
        }));
    }

    fn port(&mut self, dpid: DatapathId, port: u16, up: bool) {
        let endpoint = Endpoint::new(dpid, port);
        self.controller.push_event(Event::PortStatus(PortStatus { endpoint, up }));
    }

    fn run(&mut self) -> Vec<ControllerError> {
        self.controller.do_queue()
    }

    fn trace(&self, from: &str, to: &str) -> Result<Delivery, TraceError> {
        let src = self.host(from);
        let dst = self.host(to);
        trace_packet(self.controller.topology(), &self.handles, src.attachment, src.mac, dst.mac)
    }

    /// Number of flow entries on the switch, without the table-miss entry.
    fn num_rules(&self, dpid: DatapathId) -> usize {
        self.handles[&dpid]
            .flow_table()
            .iter()
            .filter(|e| e.priority != TABLE_MISS_PRIORITY)
            .count()
    }

    fn total_rules(&self) -> usize {
        self.desc.switches.iter().map(|s| self.num_rules(*s)).sum()
    }
}

/// Network with all switches connected, and no host learned yet.
fn get_net<N: ExampleNetwork>(config: ControllerConfig) -> Net {
    let desc = N::description();
    let controller = Controller::new(desc.build().unwrap(), config);
    let mut net = Net { controller, handles: HashMap::new(), desc };
    for dpid in net.desc.switches.clone() {
        net.connect(dpid);
    }
    assert_eq!(net.run(), vec![]);
    net
}

/// Triangle, where both hosts have talked to each other
fn get_triangle_with_flows() -> Net {
    let mut net = get_net::<Triangle>(ControllerConfig::default());
    net.ping("h1", "h2");
    net.ping("h2", "h1");
    net.ping("h1", "h2");
    assert_eq!(net.run(), vec![]);
    net
}

#[test]
fn test_connect_installs_table_miss() {
    let net = get_net::<Triangle>(ControllerConfig::default());
    for dpid in net.desc.switches.iter() {
        assert!(net.controller.is_connected(*dpid));
        let table = net.handles[dpid].flow_table();
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].priority, TABLE_MISS_PRIORITY);
        assert_eq!(table[0].pattern, Match::match_all());
        assert_eq!(table[0].actions, vec![Action::Output(PseudoPort::Controller)]);
    }
    assert!(net.controller.topology().links().iter().all(|l| {
        net.controller.topology().link(*l).unwrap().is_up()
    }));
    assert_eq!(net.controller.num_events(), 3);
}

#[test]
fn test_flood_table_miss() {
    let config = ControllerConfig { table_miss: TableMiss::Flood, ..Default::default() };
    let net = get_net::<Triangle>(config);
    let table = net.handles[&*S3].flow_table();
    assert_eq!(table[0].actions, vec![Action::Output(PseudoPort::Flood)]);
    assert_eq!(net.trace("h1", "h2"), Err(TraceError::Flooded(vec![*S1])));
}

#[test]
fn test_unknown_destination_is_flooded() {
    let mut net = get_net::<Triangle>(ControllerConfig::default());
    net.ping("h1", "h2");
    assert_eq!(net.run(), vec![]);

    let h1 = net.host("h1");
    assert_eq!(net.controller.host(h1.mac).map(|h| h.attachment), Some(h1.attachment));
    assert!(net.controller.host(MacAddr::from_u32(2)).is_none());
    assert_eq!(net.controller.flows().num_flows(), 0);

    // the only other edge port is where h2 lives
    assert!(net.handles[&*S1].packets_out().is_empty());
    assert!(net.handles[&*S3].packets_out().is_empty());
    let out = net.handles[&*S2].packets_out();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].actions, vec![Action::Output(PseudoPort::Physical(1))]);
    assert_eq!(out[0].data, vec![0xca, 0xfe]);
    assert_eq!(out[0].in_port, None);
}

#[test]
fn test_no_flooding() {
    let config = ControllerConfig { flood_unknown: false, ..Default::default() };
    let mut net = get_net::<Triangle>(config);
    net.ping("h1", "h2");
    assert_eq!(net.run(), vec![]);
    assert!(net.handles.values().all(|h| h.packets_out().is_empty()));
}

#[test]
fn test_shortest_path_installed() {
    let net = get_triangle_with_flows();
    let hosts: HashSet<(MacAddr, Endpoint)> =
        net.controller.hosts().into_iter().map(|h| (h.mac, h.attachment)).collect();
    assert_eq!(
        hosts,
        hashset! {
            (MacAddr::from_u32(1), Endpoint::new(*S1, 1)),
            (MacAddr::from_u32(2), Endpoint::new(*S2, 1)),
        }
    );
    assert_eq!(net.controller.flows().num_flows(), 2);
    let h1 = net.host("h1");
    let h2 = net.host("h2");

    let there = net.trace("h1", "h2").unwrap();
    assert_eq!(there.switches, vec![*S1, *S2]);
    assert_eq!(there.egress, h2.attachment);
    let back = net.trace("h2", "h1").unwrap();
    assert_eq!(back.switches, vec![*S2, *S1]);
    assert_eq!(back.egress, h1.attachment);

    assert_eq!(net.num_rules(*S1), 2);
    assert_eq!(net.num_rules(*S2), 2);
    assert_eq!(net.num_rules(*S3), 0);

    // the packet that triggered the installation was forwarded along the path
    let out = net.handles[&*S2].packets_out();
    assert_eq!(out.last().unwrap().actions, vec![Action::Output(PseudoPort::Physical(2))]);
    assert_eq!(out.last().unwrap().in_port, Some(1));
}

#[test]
fn test_failover_to_backup_path() {
    let mut net = get_triangle_with_flows();
    net.port(*S1, 2, false);
    assert_eq!(net.run(), vec![]);

    assert_eq!(net.trace("h1", "h2").unwrap().switches, vec![*S1, *S3, *S2]);
    assert_eq!(net.trace("h2", "h1").unwrap().switches, vec![*S2, *S3, *S1]);
    let paths: HashMap<FlowKey, Vec<DatapathId>> =
        net.controller.flows().flows().map(|(k, f)| (*k, f.path.switches())).collect();
    assert_eq!(
        paths,
        hashmap! {
            FlowKey::new(MacAddr::from_u32(1), MacAddr::from_u32(2)) => vec![*S1, *S3, *S2],
            FlowKey::new(MacAddr::from_u32(2), MacAddr::from_u32(1)) => vec![*S2, *S3, *S1],
        }
    );
    // no rule references the failed link anymore
    assert_eq!(net.total_rules(), 6);
    assert!(net.controller.flows().flows_using_port(Endpoint::new(*S1, 2)).is_empty());
    assert!(net.controller.flows().flows_using_port(Endpoint::new(*S2, 2)).is_empty());
}

#[test]
fn test_failure_off_path_keeps_flows() {
    let mut net = get_triangle_with_flows();
    let before = net.handles[&*S1].num_messages();
    net.port(*S3, 1, false);
    assert_eq!(net.run(), vec![]);
    assert_eq!(net.handles[&*S1].num_messages(), before);
    assert_eq!(net.trace("h1", "h2").unwrap().switches, vec![*S1, *S2]);
}

#[test]
fn test_no_path_leaves_flows_unrouted() {
    let mut net = get_triangle_with_flows();
    net.port(*S1, 2, false);
    net.port(*S1, 3, false);
    assert_eq!(net.run(), vec![]);

    assert_eq!(net.controller.flows().num_flows(), 0);
    assert_eq!(net.total_rules(), 0);
    // packets go to the controller
    assert_eq!(net.trace("h1", "h2"), Err(TraceError::SentToController(vec![*S1])));

    net.ping("h1", "h2");
    assert_eq!(net.run(), vec![ControllerError::PathError(PathError::NoPath(*S1, *S2))]);
    assert_eq!(net.controller.flows().num_flows(), 0);
}

#[test]
fn test_reroute_on_link_up() {
    let mut net = get_net::<Square>(ControllerConfig::default());
    net.ping("h1", "h4");
    net.ping("h4", "h1");
    net.ping("h1", "h4");
    assert_eq!(net.run(), vec![]);
    assert_eq!(net.trace("h1", "h4").unwrap().switches, vec![*S1, *S2, *S4]);

    net.port(*S2, 1, false);
    assert_eq!(net.run(), vec![]);
    assert_eq!(net.trace("h1", "h4").unwrap().switches, vec![*S1, *S3, *S4]);
    assert_eq!(net.trace("h4", "h1").unwrap().switches, vec![*S4, *S3, *S1]);

    net.port(*S2, 1, true);
    assert_eq!(net.run(), vec![]);
    assert_eq!(net.trace("h1", "h4").unwrap().switches, vec![*S1, *S2, *S4]);
    assert_eq!(net.trace("h4", "h1").unwrap().switches, vec![*S4, *S2, *S1]);
    assert_eq!(net.num_rules(*S3), 0);
}

#[test]
fn test_stay_on_backup_path() {
    let config = ControllerConfig { reroute_on_link_up: false, ..Default::default() };
    let mut net = get_net::<Square>(config);
    net.ping("h4", "h1");
    net.ping("h1", "h4");
    net.port(*S2, 1, false);
    net.port(*S2, 1, true);
    assert_eq!(net.run(), vec![]);
    assert_eq!(net.trace("h1", "h4").unwrap().switches, vec![*S1, *S3, *S4]);
}

#[test]
fn test_switch_disconnect() {
    let mut net = get_triangle_with_flows();
    net.controller.push_event(Event::SwitchDisconnected(*S2));
    assert_eq!(net.run(), vec![]);

    assert!(!net.controller.is_connected(*S2));
    assert!(net.controller.connection(*S2).is_none());
    // h2 is attached at s2, so no flow can be routed
    assert_eq!(net.controller.flows().num_flows(), 0);
    assert_eq!(net.num_rules(*S1), 0);
    assert!(net.controller.topology().links().iter().all(|l| {
        let link = net.controller.topology().link(*l).unwrap();
        link.is_up() != link.end_on(*S2).is_some()
    }));

    // the switch comes back with a fresh flow table
    net.connect(*S2);
    net.ping("h1", "h2");
    assert_eq!(net.run(), vec![]);
    assert_eq!(net.trace("h1", "h2").unwrap().switches, vec![*S1, *S2]);
}

#[test]
fn test_disconnect_of_transit_switch() {
    let mut net = get_triangle_with_flows();
    net.port(*S1, 2, false);
    net.controller.push_event(Event::SwitchDisconnected(*S3));
    assert_eq!(net.run(), vec![]);
    assert_eq!(net.controller.flows().num_flows(), 0);
    // the rules on s3 cannot be deleted anymore
    assert_eq!(net.num_rules(*S1), 0);
    assert_eq!(net.num_rules(*S2), 0);
    assert_eq!(net.num_rules(*S3), 2);
    net.port(*S1, 2, true);
    net.ping("h1", "h2");
    assert_eq!(net.run(), vec![]);
    assert_eq!(net.trace("h1", "h2").unwrap().switches, vec![*S1, *S2]);
}

#[test]
fn test_reconnect_clears_stale_rules() {
    let mut net = get_triangle_with_flows();
    net.port(*S1, 2, false);
    net.controller.push_event(Event::SwitchDisconnected(*S3));
    assert_eq!(net.run(), vec![]);
    assert_eq!(net.num_rules(*S3), 2);

    net.reconnect(*S3);
    assert_eq!(net.run(), vec![]);
    assert!(net.controller.flows().rules_on(*S3).is_empty());
    let table = net.handles[&*S3].flow_table();
    assert_eq!(table.len(), 1);
    assert_eq!(table[0].priority, TABLE_MISS_PRIORITY);

    net.ping("h1", "h2");
    assert_eq!(net.run(), vec![]);
    assert_eq!(net.trace("h1", "h2").unwrap().switches, vec![*S1, *S3, *S2]);
    assert_eq!(net.num_rules(*S3), 1);
    assert_eq!(net.controller.flows().rules_on(*S3).len(), 1);
}

#[test]
fn test_events_for_unknown_switch() {
    let mut net = get_triangle_with_flows();
    let s9 = DatapathId(9);
    net.controller.push_event(Event::SwitchDisconnected(s9));
    net.port(s9, 1, false);
    net.controller.push_event(Event::PacketIn(PacketIn {
        dpid: s9,
        in_port: 1,
        src: MacAddr::from_u32(1),
        dst: MacAddr::from_u32(2),
        buffer_id: None,
        data: Vec::new(),
    }));
    let unknown = || ControllerError::UnknownSwitch(s9);
    assert_eq!(net.run(), vec![unknown(), unknown(), unknown()]);
    assert_eq!(net.controller.flows().num_flows(), 2);
}

#[test]
fn test_install_failure_is_rolled_back() {
    let mut net = get_net::<Triangle>(ControllerConfig::default());
    net.ping("h2", "h1");
    assert_eq!(net.run(), vec![]);
    // the flow h1 -> h2 is installed at s2, then at s1
    net.handles[&*S1].reject_adds_after(0);
    net.ping("h1", "h2");
    assert_eq!(
        net.run(),
        vec![ControllerError::InstallFailure(InstallError::SwitchRejected(
            *S1,
            String::from("flow table full")
        ))]
    );
    assert_eq!(net.total_rules(), 0);
    let key = FlowKey::new(MacAddr::from_u32(1), MacAddr::from_u32(2));
    assert!(net.controller.flows().get(key).is_none());

    // the next packet retries
    net.handles[&*S1].heal();
    net.ping("h1", "h2");
    assert_eq!(net.run(), vec![]);
    assert_eq!(net.trace("h1", "h2").unwrap().switches, vec![*S1, *S2]);
}

#[test]
fn test_hosts_learned_on_edge_ports_only() {
    let mut net = get_net::<Triangle>(ControllerConfig::default());
    net.controller.push_event(Event::PacketIn(PacketIn {
        dpid: *S3,
        in_port: 1,
        src: MacAddr::from_u32(0x99),
        dst: MacAddr::from_u32(1),
        buffer_id: Some(7),
        data: Vec::new(),
    }));
    assert_eq!(net.run(), vec![]);
    assert!(net.controller.host(MacAddr::from_u32(0x99)).is_none());
    assert!(net.controller.hosts().is_empty());

    // a host is never moved
    net.ping("h1", "h2");
    net.controller.push_event(Event::PacketIn(PacketIn {
        dpid: *S3,
        in_port: 3,
        src: MacAddr::from_u32(1),
        dst: MacAddr::from_u32(2),
        buffer_id: None,
        data: Vec::new(),
    }));
    assert_eq!(net.run(), vec![]);
    let h1 = net.controller.host(MacAddr::from_u32(1)).unwrap();
    assert_eq!(h1.attachment, Endpoint::new(*S1, 1));
}

#[test]
fn test_admin_mark_down() {
    let mut net = get_triangle_with_flows();
    let a = Endpoint::new(*S1, 2);
    let b = Endpoint::new(*S2, 2);
    net.controller.mark_link_down(a, b).unwrap();
    assert_eq!(net.trace("h1", "h2").unwrap().switches, vec![*S1, *S3, *S2]);

    // port signals do not override the mark
    net.port(*S1, 2, false);
    net.port(*S1, 2, true);
    assert_eq!(net.run(), vec![]);
    assert_eq!(net.trace("h1", "h2").unwrap().switches, vec![*S1, *S3, *S2]);

    net.controller.clear_link_mark(a, b).unwrap();
    assert_eq!(net.trace("h1", "h2").unwrap().switches, vec![*S1, *S2]);

    let c = Endpoint::new(*S3, 2);
    assert!(net.controller.mark_link_down(a, c).is_err());
}

#[test]
fn test_dispatch_table() {
    type C = SimulatedSwitch;
    let mut net = get_net::<Triangle>(ControllerConfig::default());
    // passing an event to the handler of another kind is refused
    let handler = Controller::<C>::dispatch(EventKind::PortStatus);
    assert_eq!(
        handler(&mut net.controller, Event::SwitchDisconnected(*S1)),
        Err(ControllerError::InvalidEvent(EventKind::SwitchDisconnected))
    );
    assert!(net.controller.is_connected(*S1));
}

#[test]
fn test_events_in_arrival_order() {
    let mut net = get_triangle_with_flows();
    // the link fails and recovers before the controller gets to process it
    net.port(*S1, 2, false);
    net.port(*S1, 2, true);
    assert_eq!(net.controller.num_pending(), 2);
    assert_eq!(net.run(), vec![]);
    assert_eq!(net.controller.num_pending(), 0);
    assert_eq!(net.trace("h1", "h2").unwrap().switches, vec![*S1, *S2]);
}

#[test]
fn test_runtime_link_changes() {
    let mut net = get_triangle_with_flows();
    let a = Endpoint::new(*S1, 2);
    let b = Endpoint::new(*S2, 2);

    net.controller.remove_link(b, a).unwrap();
    assert_eq!(net.controller.topology().num_links(), 2);
    assert_eq!(net.trace("h1", "h2").unwrap().switches, vec![*S1, *S3, *S2]);
    assert_eq!(net.trace("h2", "h1").unwrap().switches, vec![*S2, *S3, *S1]);
    assert_eq!(
        net.controller.remove_link(a, b),
        Err(ControllerError::TopologyError(TopologyError::UnknownLink(a, b)))
    );

    // the link is added again, with both ports still active
    let id = net.controller.add_link(a, b, 1).unwrap();
    assert!(net.controller.topology().link(id).unwrap().is_up());
    assert_eq!(net.trace("h1", "h2").unwrap().switches, vec![*S1, *S2]);
    assert_eq!(net.total_rules(), 4);
}

#[test]
fn test_stale_connection_is_replaced() {
    let mut net = get_triangle_with_flows();
    // s1 reconnects without a disconnect notification, and has lost all of its rules
    net.connect(*S1);
    assert_eq!(net.run(), vec![]);
    assert!(net.controller.is_connected(*S1));
    assert_eq!(net.num_rules(*S1), 2);
    assert_eq!(net.controller.flows().num_flows(), 2);
    assert_eq!(net.trace("h1", "h2").unwrap().switches, vec![*S1, *S2]);
    assert_eq!(net.trace("h2", "h1").unwrap().switches, vec![*S2, *S1]);
}

#[test]
fn test_link_on_host_port_is_refused() {
    let mut net = get_triangle_with_flows();
    let h2 = net.host("h2").attachment;
    let free = Endpoint::new(*S3, 3);
    let refused = Err(ControllerError::TopologyError(TopologyError::PortInUse(h2)));
    assert_eq!(net.controller.add_link(h2, free, 1), refused);
    assert_eq!(net.controller.add_link(free, h2, 1), refused);
    assert_eq!(net.controller.topology().num_links(), 3);
    assert_eq!(net.controller.host(MacAddr::from_u32(2)).unwrap().attachment, h2);
    assert_eq!(net.controller.flows().num_flows(), 2);
    assert_eq!(net.trace("h1", "h2").unwrap().switches, vec![*S1, *S2]);

    // before any host was learned there, the port can be used for a link
    let mut net = get_net::<Triangle>(ControllerConfig::default());
    assert!(net.controller.add_link(h2, free, 1).is_ok());
    assert_eq!(net.controller.topology().num_links(), 4);
}

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

//! # Helper (printer) functions
//! Module containing helper functions to get formatted strings and print information about the
//! topology, the computed paths and the flow tables of the switches.

use crate::connection::{FlowEntry, SwitchHandle};
use crate::event::Event;
use crate::flow::FlowInstaller;
use crate::openflow::{Action, Match, PseudoPort};
use crate::path::{Path, Route};
use crate::topology::Topology;

use itertools::Itertools;

/// Returns a formatted string of a match. Wildcarded fields are omitted, and a match without any
/// field is printed as `*`.
pub fn pattern(m: &Match) -> String {
    let mut fields: Vec<String> = Vec::new();
    if let Some(port) = m.in_port {
        fields.push(format!("in_port={}", port));
    }
    if let Some(src) = m.dl_src {
        fields.push(format!("dl_src={}", src));
    }
    if let Some(dst) = m.dl_dst {
        fields.push(format!("dl_dst={}", dst));
    }
    if fields.is_empty() {
        String::from("*")
    } else {
        fields.join(",")
    }
}

/// Returns a formatted string of a single action
pub fn action(a: &Action) -> String {
    match a {
        Action::Output(PseudoPort::Physical(port)) => format!("output:{}", port),
        Action::Output(PseudoPort::Flood) => String::from("output:FLOOD"),
        Action::Output(PseudoPort::Controller) => String::from("output:CONTROLLER"),
    }
}

/// Returns a formatted string of a list of actions. An empty list means drop.
pub fn actions(actions: &[Action]) -> String {
    if actions.is_empty() {
        String::from("drop")
    } else {
        actions.iter().map(action).join(",")
    }
}

/// Returns a formatted string of an entry in a flow table, similar to `ovs-ofctl dump-flows`.
pub fn flow_entry(entry: &FlowEntry) -> String {
    format!(
        "priority={} {} actions={}",
        entry.priority,
        pattern(&entry.pattern),
        actions(&entry.actions)
    )
}

/// Get a vector of strings, one for each entry in the flow table of the switch, ordered by
/// decreasing priority.
pub fn flow_table(switch: &SwitchHandle) -> Vec<String> {
    switch.flow_table().iter().map(flow_entry).collect()
}

/// Returns a formatted string of a route, e.g., `s1 -> s3 -> s2 (cost 2)`.
pub fn route(route: &Route) -> String {
    format!("{} (cost {})", route.switches.iter().join(" -> "), route.cost)
}

/// Returns a formatted string of a path, including the ingress and egress port at every hop,
/// e.g., `s1[1>3] -> s3[1>2] -> s2[3>1] (cost 2)`.
pub fn path(path: &Path) -> String {
    format!(
        "{} (cost {})",
        path.hops
            .iter()
            .map(|h| format!("{}[{}>{}]", h.dpid, h.in_port, h.out_port))
            .join(" -> "),
        path.cost
    )
}

/// Returns a formatted string of an event
pub fn event<C>(event: &Event<C>) -> String {
    match event {
        Event::SwitchConnected(features, _) => format!(
            "{} connected with ports [{}]",
            features.dpid,
            features.ports.iter().join(", ")
        ),
        Event::SwitchDisconnected(dpid) => format!("{} disconnected", dpid),
        Event::PortStatus(status) => {
            format!("port {} is {}", status.endpoint, if status.up { "up" } else { "down" })
        }
        Event::PacketIn(p) => {
            format!("packet-in at {}:{} from {} to {}", p.dpid, p.in_port, p.src, p.dst)
        }
    }
}

/// Get a vector of strings, one for each link of the topology.
pub fn topology(topology: &Topology) -> Vec<String> {
    topology.links().into_iter().filter_map(|id| topology.link(id)).map(|l| l.to_string()).collect()
}

/// Get a vector of strings, one for each active flow.
pub fn flows(flows: &FlowInstaller) -> Vec<String> {
    flows.flows().map(|(key, flow)| format!("{}: {}", key, path(&flow.path))).collect()
}

/// Print the flow table of the switch
pub fn print_flow_table(switch: &SwitchHandle) {
    println!("Flow table of {}:", switch.dpid());
    for line in flow_table(switch) {
        println!("    {}", line);
    }
}

/// Print all links of the topology with their status
pub fn print_topology(t: &Topology) {
    println!("Topology with {} switches and {} links:", t.num_switches(), t.num_links());
    for line in topology(t) {
        println!("    {}", line);
    }
}

/// Print all active flows
pub fn print_flows(f: &FlowInstaller) {
    println!("{} active flows:", f.num_flows());
    for line in flows(f) {
        println!("    {}", line);
    }
}

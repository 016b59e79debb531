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

//! # Flow Installer
//!
//! Translates a [`Path`] into one [`FlowRule`] per hop and pushes them to the switches. The
//! installer owns the bookkeeping of all active flows: for every [`FlowKey`], there is at most one
//! active set of rules.
//!
//! ## Consistency
//!
//! - Before installing, the installer checks that every link of the path is up, and that every
//!   port referenced by a hop is active.
//! - Rules are installed starting at the egress switch, such that packets are never forwarded
//!   onto a switch that does not yet know the flow.
//! - If any hop fails (the switch rejects the rule, or the connection drops), every hop installed
//!   so far is deleted again. The flow ends up without any rule instead of with a partial path,
//!   which could cause loops or black holes.
//! - Replacing the rules of a flow deletes the old rules before the new ones are installed. There
//!   is a brief window without any rule (packets go to the controller), but never a state where
//!   both the old and the new rules are active.

use crate::connection::{Connections, SwitchConnection};
use crate::openflow::{Action, FlowMod, Match, OfMessage, PseudoPort};
use crate::path::{Hop, Path};
use crate::topology::Topology;
use crate::types::{DatapathId, Endpoint, FlowKey, InstallError, LinkId, PortNo};

use log::*;
use std::collections::BTreeMap;

/// Forwarding rule for a single hop of a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowRule {
    /// Switch on which the rule is installed
    pub dpid: DatapathId,
    /// Match on ingress port, source and destination host
    pub pattern: Match,
    /// Port to which matching packets are sent
    pub out_port: PortNo,
    /// Priority of the rule
    pub priority: u16,
}

impl FlowRule {
    /// Rule for a single hop of the flow `key`.
    pub fn for_hop(key: FlowKey, hop: &Hop, priority: u16) -> Self {
        Self {
            dpid: hop.dpid,
            pattern: Match::exact(hop.in_port, key.src, key.dst),
            out_port: hop.out_port,
            priority,
        }
    }

    /// Flow modification that installs this rule
    pub fn add_message(&self) -> OfMessage {
        OfMessage::FlowMod(FlowMod::add_flow(
            self.priority,
            self.pattern,
            vec![Action::Output(PseudoPort::Physical(self.out_port))],
        ))
    }

    /// Flow modification that deletes this rule
    pub fn delete_message(&self) -> OfMessage {
        OfMessage::FlowMod(FlowMod::delete_strict(self.priority, self.pattern))
    }

    /// Returns true if the rule matches on or outputs to the given port.
    pub fn references_port(&self, end: Endpoint) -> bool {
        self.dpid == end.dpid
            && (self.out_port == end.port || self.pattern.in_port == Some(end.port))
    }
}

/// Installed flow: the path, and the rules that implement it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveFlow {
    /// Path of the flow
    pub path: Path,
    /// One rule per hop, in the order of the path
    pub rules: Vec<FlowRule>,
}

/// # Flow Installer
/// Installs, replaces and removes the rules of all flows. See the [module](self) documentation.
#[derive(Debug, Clone)]
pub struct FlowInstaller {
    priority: u16,
    flows: BTreeMap<FlowKey, ActiveFlow>,
}

impl FlowInstaller {
    /// Create an installer which installs all rules with the given priority.
    pub fn new(priority: u16) -> Self {
        Self { priority, flows: BTreeMap::new() }
    }

    /// Install the path of a flow. The path must only use links which are up, and ports which are
    /// active. Existing rules of the same flow are deleted before the new ones are installed. On
    /// failure, all hops which were already installed are rolled back, and the flow has no active
    /// rules.
    pub fn install<C: SwitchConnection>(
        &mut self,
        topology: &Topology,
        path: Path,
        connections: &mut Connections<C>,
    ) -> Result<(), InstallError> {
        let key = path.key;
        Self::validate(topology, &path)?;

        if self.remove(key, connections).is_some() {
            debug!("Deleted the previous rules of flow {}", key);
        }

        let priority = self.priority;
        let rules =
            path.hops.iter().map(|hop| FlowRule::for_hop(key, hop, priority)).collect::<Vec<_>>();

        // install from the egress towards the ingress
        let mut installed: Vec<FlowRule> = Vec::with_capacity(rules.len());
        for rule in rules.iter().rev() {
            match send(connections, rule.dpid, rule.add_message()) {
                Ok(()) => installed.push(*rule),
                Err(e) => {
                    warn!("Cannot install flow {} on {}: {}. Rolling back", key, rule.dpid, e);
                    delete_rules(&installed, connections);
                    return Err(e);
                }
            }
        }

        info!("Installed flow {} over {} hops with cost {}", key, rules.len(), path.cost);
        self.flows.insert(key, ActiveFlow { path, rules });
        Ok(())
    }

    /// Remove a flow and delete all of its rules. Rules on switches which cannot be reached are
    /// abandoned. Returns the removed flow, or `None` if the flow was not active.
    pub fn remove<C: SwitchConnection>(
        &mut self,
        key: FlowKey,
        connections: &mut Connections<C>,
    ) -> Option<ActiveFlow> {
        let flow = self.flows.remove(&key)?;
        delete_rules(&flow.rules, connections);
        debug!("Removed flow {}", key);
        Some(flow)
    }

    /// Returns the active flow, if any.
    pub fn get(&self, key: FlowKey) -> Option<&ActiveFlow> {
        self.flows.get(&key)
    }

    /// Iterate over all active flows, ordered by their key.
    pub fn flows(&self) -> impl Iterator<Item = (&FlowKey, &ActiveFlow)> {
        self.flows.iter()
    }

    /// Number of active flows
    pub fn num_flows(&self) -> usize {
        self.flows.len()
    }

    /// All rules installed on the given switch.
    pub fn rules_on(&self, dpid: DatapathId) -> Vec<FlowRule> {
        self.flows
            .values()
            .flat_map(|f| f.rules.iter())
            .filter(|r| r.dpid == dpid)
            .copied()
            .collect()
    }

    /// All flows whose path uses the link
    pub fn flows_using_link(&self, link: LinkId) -> Vec<FlowKey> {
        self.select(|f| f.path.uses_link(link))
    }

    /// All flows with a rule that matches on or outputs to the port
    pub fn flows_using_port(&self, end: Endpoint) -> Vec<FlowKey> {
        self.select(|f| f.rules.iter().any(|r| r.references_port(end)))
    }

    /// All flows whose path traverses the switch
    pub fn flows_via_switch(&self, dpid: DatapathId) -> Vec<FlowKey> {
        self.select(|f| f.path.traverses(dpid))
    }

    /// Priority of the installed rules
    pub fn priority(&self) -> u16 {
        self.priority
    }

    fn select<F: Fn(&ActiveFlow) -> bool>(&self, f: F) -> Vec<FlowKey> {
        self.flows.iter().filter(|(_, flow)| f(flow)).map(|(k, _)| *k).collect()
    }

    /// Check that the path only uses links which are up, and ports which are active.
    fn validate(topology: &Topology, path: &Path) -> Result<(), InstallError> {
        let is_up = |id: &LinkId| topology.link(*id).map(|l| l.is_up()).unwrap_or(false);
        if let Some(link) = path.links.iter().find(|id| !is_up(*id)) {
            return Err(InstallError::StaleLinkReference(*link));
        }
        for hop in path.hops.iter() {
            for port in [hop.in_port, hop.out_port].iter() {
                let end = Endpoint::new(hop.dpid, *port);
                if !topology.is_port_active(end) {
                    return Err(InstallError::InactivePort(end));
                }
            }
        }
        Ok(())
    }
}

/// Send a message to a switch, translating the errors.
fn send<C: SwitchConnection>(
    connections: &mut Connections<C>,
    dpid: DatapathId,
    msg: OfMessage,
) -> Result<(), InstallError> {
    let connection = connections.get_mut(&dpid).ok_or(InstallError::NotConnected(dpid))?;
    connection.send(msg).map_err(|e| InstallError::from_connection(dpid, e))
}

/// Delete the rules, ignoring switches that cannot be reached.
fn delete_rules<C: SwitchConnection>(rules: &[FlowRule], connections: &mut Connections<C>) {
    for rule in rules {
        if let Err(e) = send(connections, rule.dpid, rule.delete_message()) {
            debug!("Abandoning rule on {}: {}", rule.dpid, e);
        }
    }
}

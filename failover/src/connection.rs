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

//! # Switch Connections
//!
//! The controller talks to switches only through the [`SwitchConnection`] trait. The connection
//! handles are owned by the [`Controller`](crate::controller::Controller); all other components
//! borrow them for the duration of a single call.
//!
//! This module also provides [`SimulatedSwitch`], an in-memory datapath that applies the flow
//! modifications to its own flow table. It is used by the launcher and the tests. A
//! [`SwitchHandle`] shares the state with the simulated switch, such that the flow table can be
//! inspected (and faults can be injected) after the connection was handed to the controller.

use crate::openflow::{Action, FlowMod, FlowModCommand, Match, OfMessage, PacketOut};
use crate::types::{ConnectionError, DatapathId, MacAddr, PortNo};

use log::*;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Outbound channel to a single switch.
pub trait SwitchConnection {
    /// Send a message to the switch. The call returns an error if the switch rejects the message,
    /// or if the connection dropped.
    fn send(&mut self, msg: OfMessage) -> Result<(), ConnectionError>;
}

impl<C: SwitchConnection + ?Sized> SwitchConnection for Box<C> {
    fn send(&mut self, msg: OfMessage) -> Result<(), ConnectionError> {
        (**self).send(msg)
    }
}

/// All connections, indexed by the datapath id of the switch.
pub type Connections<C> = HashMap<DatapathId, C>;

/// Entry of the flow table of a simulated switch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowEntry {
    /// Match fields
    pub pattern: Match,
    /// Priority
    pub priority: u16,
    /// Actions
    pub actions: Vec<Action>,
}

#[derive(Debug, Default)]
struct SwitchState {
    table: Vec<FlowEntry>,
    packets_out: Vec<PacketOut>,
    num_messages: usize,
    accept_adds: Option<usize>,
    closed: bool,
}

/// In-memory switch, applying flow modifications to its own flow table.
#[derive(Debug)]
pub struct SimulatedSwitch {
    dpid: DatapathId,
    state: Rc<RefCell<SwitchState>>,
}

impl SimulatedSwitch {
    /// Create a new switch with an empty flow table
    pub fn new(dpid: DatapathId) -> Self {
        Self { dpid, state: Rc::new(RefCell::new(SwitchState::default())) }
    }

    /// Datapath id of the switch
    pub fn dpid(&self) -> DatapathId {
        self.dpid
    }

    /// Get a handle to inspect the switch state and to inject faults.
    pub fn handle(&self) -> SwitchHandle {
        SwitchHandle { dpid: self.dpid, state: self.state.clone() }
    }
}

impl SwitchConnection for SimulatedSwitch {
    fn send(&mut self, msg: OfMessage) -> Result<(), ConnectionError> {
        let mut state = self.state.borrow_mut();
        if state.closed {
            return Err(ConnectionError::Disconnected);
        }
        state.num_messages += 1;
        match msg {
            OfMessage::FlowMod(FlowMod {
                command: FlowModCommand::Add,
                pattern,
                priority,
                actions,
            }) => {
                if let Some(budget) = state.accept_adds.as_mut() {
                    if *budget == 0 {
                        trace!("{} rejects flow entry {:?}", self.dpid, pattern);
                        return Err(ConnectionError::Rejected("flow table full".to_string()));
                    }
                    *budget -= 1;
                }
                state.table.retain(|e| !(e.pattern == pattern && e.priority == priority));
                state.table.push(FlowEntry { pattern, priority, actions });
            }
            OfMessage::FlowMod(FlowMod { command: FlowModCommand::Delete, pattern, .. }) => {
                state.table.retain(|e| !pattern.covers(&e.pattern));
            }
            OfMessage::FlowMod(FlowMod {
                command: FlowModCommand::DeleteStrict,
                pattern,
                priority,
                ..
            }) => {
                state.table.retain(|e| !(e.pattern == pattern && e.priority == priority));
            }
            OfMessage::PacketOut(packet) => state.packets_out.push(packet),
        }
        Ok(())
    }
}

/// Shared handle to the state of a [`SimulatedSwitch`].
#[derive(Debug, Clone)]
pub struct SwitchHandle {
    dpid: DatapathId,
    state: Rc<RefCell<SwitchState>>,
}

impl SwitchHandle {
    /// Datapath id of the switch
    pub fn dpid(&self) -> DatapathId {
        self.dpid
    }

    /// Copy of the flow table, ordered by descending priority, then in insertion order.
    pub fn flow_table(&self) -> Vec<FlowEntry> {
        let mut table = self.state.borrow().table.clone();
        table.sort_by(|a, b| b.priority.cmp(&a.priority));
        table
    }

    /// Number of entries in the flow table
    pub fn num_entries(&self) -> usize {
        self.state.borrow().table.len()
    }

    /// All packets the controller asked the switch to send out
    pub fn packets_out(&self) -> Vec<PacketOut> {
        self.state.borrow().packets_out.clone()
    }

    /// Number of messages the switch has accepted, including rejected flow modifications
    pub fn num_messages(&self) -> usize {
        self.state.borrow().num_messages
    }

    /// Actions of the highest priority entry matching the packet, or `None` on a table miss.
    pub fn lookup(&self, in_port: PortNo, src: MacAddr, dst: MacAddr) -> Option<Vec<Action>> {
        self.flow_table()
            .into_iter()
            .find(|e| e.pattern.matches(in_port, src, dst))
            .map(|e| e.actions)
    }

    /// Accept only the next `n` added flow entries; every further addition is rejected until
    /// [`SwitchHandle::heal`] is called. Deletions are always accepted.
    pub fn reject_adds_after(&self, n: usize) {
        self.state.borrow_mut().accept_adds = Some(n);
    }

    /// Drop the connection. Every further message fails with `ConnectionError::Disconnected`.
    pub fn disconnect(&self) {
        self.state.borrow_mut().closed = true;
    }

    /// Open a new connection to the same switch. The flow table is kept, and all injected faults
    /// are removed.
    pub fn reconnect(&self) -> SimulatedSwitch {
        self.heal();
        SimulatedSwitch { dpid: self.dpid, state: self.state.clone() }
    }

    /// Remove all injected faults
    pub fn heal(&self) {
        let mut state = self.state.borrow_mut();
        state.accept_adds = None;
        state.closed = false;
    }
}

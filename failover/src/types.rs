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

//! Module containing all type definitions

use crate::event::EventKind;
use crate::topology::Link;
use petgraph::prelude::*;
use petgraph::stable_graph::StableGraph;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

type IndexType = u32;

/// OpenFlow datapath identifier of a switch. Switches are named after their datapath id, following
/// the mininet convention (`s1` has the datapath id 1).
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DatapathId(pub u64);

/// OpenFlow 1.0 port number
pub type PortNo = u16;

/// Link weight used by the path computation. Links default to a weight of 1.
pub type LinkWeight = u32;

/// Default weight of a link, if nothing else is configured
pub const DEFAULT_LINK_WEIGHT: LinkWeight = 1;

/// Link identification (and index into the topology graph)
pub type LinkId = EdgeIndex<IndexType>;

/// Topology graph. Nodes are switches, edges are the links between them.
pub type TopologyGraph = StableGraph<DatapathId, Link, Undirected, IndexType>;

/// Ethernet address of a host. Hosts are identified by their MAC address.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddr(pub [u8; 6]);

/// A port on a specific switch. Links connect two endpoints, and hosts are attached to one.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Endpoint {
    /// Switch on which the port lives
    pub dpid: DatapathId,
    /// Port number on that switch
    pub port: PortNo,
}

impl Endpoint {
    /// Create a new endpoint
    pub fn new(dpid: DatapathId, port: PortNo) -> Self {
        Self { dpid, port }
    }
}

/// Operational status of a link
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
pub enum LinkStatus {
    /// Both ends are live, the link may carry traffic
    Up,
    /// At least one end is down, or its switch is disconnected
    Down,
}

impl LinkStatus {
    /// Returns true if the status is `LinkStatus::Up`
    pub fn is_up(&self) -> bool {
        matches!(self, Self::Up)
    }
}

/// Identifies one unidirectional flow between two hosts. Every `FlowKey` has at most one active
/// set of flow rules.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy)]
pub struct FlowKey {
    /// Source host
    pub src: MacAddr,
    /// Destination host
    pub dst: MacAddr,
}

impl FlowKey {
    /// Create a new flow key
    pub fn new(src: MacAddr, dst: MacAddr) -> Self {
        Self { src, dst }
    }

    /// The flow in the opposite direction
    pub fn reverse(&self) -> Self {
        Self { src: self.dst, dst: self.src }
    }
}

impl fmt::Display for DatapathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.dpid, self.port)
    }
}

impl MacAddr {
    /// Address with the two upper octets set to zero, and `n` in the lower four octets.
    pub const fn from_u32(n: u32) -> Self {
        let b = n.to_be_bytes();
        Self([0, 0, b[0], b[1], b[2], b[3]])
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        write!(f, "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}", b[0], b[1], b[2], b[3], b[4], b[5])
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.src, self.dst)
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
        }
    }
}

impl FromStr for DatapathId {
    type Err = ParseError;

    /// Accepts the mininet name (`s3`), a decimal number (`3`) or a hex number (`0x3`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parsed = if let Some(hex) = s.strip_prefix("0x") {
            u64::from_str_radix(hex, 16)
        } else {
            s.strip_prefix('s').unwrap_or(s).parse::<u64>()
        };
        parsed.map(DatapathId).map_err(|_| ParseError::InvalidDatapathId(s.to_string()))
    }
}

impl FromStr for Endpoint {
    type Err = ParseError;

    /// Parses endpoints of the form `s1:2`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().splitn(2, ':');
        let dpid = parts.next().unwrap_or_default().parse::<DatapathId>()?;
        let port = parts
            .next()
            .and_then(|p| p.parse::<PortNo>().ok())
            .ok_or_else(|| ParseError::InvalidEndpoint(s.to_string()))?;
        Ok(Self { dpid, port })
    }
}

impl FromStr for MacAddr {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let octets = s.trim().split(':').collect::<Vec<_>>();
        if octets.len() != 6 {
            return Err(ParseError::InvalidMacAddr(s.to_string()));
        }
        let mut addr = [0u8; 6];
        for (byte, octet) in addr.iter_mut().zip(octets) {
            *byte = u8::from_str_radix(octet, 16)
                .map_err(|_| ParseError::InvalidMacAddr(s.to_string()))?;
        }
        Ok(MacAddr(addr))
    }
}

macro_rules! string_conversions {
    ($($t:ty),*) => {
        $(
            impl TryFrom<String> for $t {
                type Error = ParseError;

                fn try_from(s: String) -> Result<Self, Self::Error> {
                    s.parse()
                }
            }

            impl From<$t> for String {
                fn from(x: $t) -> String {
                    x.to_string()
                }
            }
        )*
    };
}

string_conversions!(DatapathId, Endpoint, MacAddr);

/// Errors while parsing identifiers from strings
#[derive(Error, Debug, PartialEq)]
pub enum ParseError {
    /// The datapath id is neither a switch name nor a number
    #[error("Invalid datapath id: {0}")]
    InvalidDatapathId(String),
    /// The endpoint is not of the form `s1:2`
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
    /// The MAC address is not of the form `00:00:00:00:00:01`
    #[error("Invalid MAC address: {0}")]
    InvalidMacAddr(String),
}

/// Topology Errors
#[derive(Error, Debug, PartialEq)]
pub enum TopologyError {
    /// The switch was never registered in the topology
    #[error("Switch {0} is not registered in the topology")]
    UnknownSwitch(DatapathId),
    /// There is no link between the two endpoints
    #[error("No link between {0} and {1}")]
    UnknownLink(Endpoint, Endpoint),
    /// The port is already used by another link
    #[error("Port {0} is already used by another link")]
    PortInUse(Endpoint),
    /// Both ends of the link are on the same switch
    #[error("Cannot connect switch {0} to itself")]
    SelfLoop(DatapathId),
}

/// Path computation errors
#[derive(Error, Debug, PartialEq)]
pub enum PathError {
    /// Source or destination switch is not part of the topology
    #[error("Switch {0} is not registered in the topology")]
    UnknownSwitch(DatapathId),
    /// The destination cannot be reached over links which are up
    #[error("No path from {0} to {1}")]
    NoPath(DatapathId, DatapathId),
    /// The host was never learned
    #[error("Host {0} is not known")]
    UnknownHost(MacAddr),
    /// The port at which the host is attached is currently down
    #[error("Host attachment {0} is not active")]
    InactiveAttachment(Endpoint),
}

/// Errors reported by a switch connection when sending a message
#[derive(Error, Debug, PartialEq, Clone)]
pub enum ConnectionError {
    /// The switch refused the message
    #[error("Message rejected: {0}")]
    Rejected(String),
    /// The connection dropped while sending
    #[error("Connection is closed")]
    Disconnected,
}

/// Flow installation errors
#[derive(Error, Debug, PartialEq)]
pub enum InstallError {
    /// The switch rejected a flow modification
    #[error("Switch {0} rejected the flow modification: {1}")]
    SwitchRejected(DatapathId, String),
    /// The connection to the switch dropped during the installation
    #[error("Connection to switch {0} was lost during installation")]
    ConnectionLost(DatapathId),
    /// There is no connection to the switch
    #[error("Switch {0} is not connected")]
    NotConnected(DatapathId),
    /// The path uses a link which is currently down
    #[error("Path uses link {0:?} which is down")]
    StaleLinkReference(LinkId),
    /// A hop of the path references a port that is not active
    #[error("Path references port {0} which is not active")]
    InactivePort(Endpoint),
}

impl InstallError {
    /// Translate the error of a connection into an installation error for the given switch.
    pub fn from_connection(dpid: DatapathId, error: ConnectionError) -> Self {
        match error {
            ConnectionError::Rejected(reason) => Self::SwitchRejected(dpid, reason),
            ConnectionError::Disconnected => Self::ConnectionLost(dpid),
        }
    }
}

/// Controller Errors
#[derive(Error, Debug, PartialEq)]
pub enum ControllerError {
    /// An event referenced a switch that is not connected
    #[error("Switch {0} is not connected")]
    UnknownSwitch(DatapathId),
    /// Error in the topology model
    #[error("Topology Error: {0}")]
    TopologyError(#[from] TopologyError),
    /// The path could not be computed
    #[error("Path Error: {0}")]
    PathError(#[from] PathError),
    /// The flow could not be installed
    #[error("Install Failure: {0}")]
    InstallFailure(#[from] InstallError),
    /// The switch did not accept a message that is not part of a flow installation
    #[error("Cannot send message to {0}: {1}")]
    SendError(DatapathId, ConnectionError),
    /// The event was passed to a handler of another kind
    #[error("Cannot handle the event: {0}")]
    InvalidEvent(EventKind),
}

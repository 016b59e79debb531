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

//! Networks for testing and for the launcher

use crate::config::TopologyDescription;
use crate::topology::Topology;
use crate::types::TopologyError;

mod triangle;
pub use triangle::Triangle;

mod square;
pub use square::Square;

mod random;
pub use random::random_mesh;

/// Trait for easier access to example networks.
pub trait ExampleNetwork {
    /// Get the static description of the network, including the hosts.
    fn description() -> TopologyDescription;

    /// Get the topology, with all switches disconnected and all links down.
    fn topology() -> Result<Topology, TopologyError> {
        Self::description().build()
    }
}

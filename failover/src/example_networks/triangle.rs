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

//! # Triangle Network

use super::ExampleNetwork;
use crate::config::{HostDescription, LinkDescription, TopologyDescription};
use crate::types::{DatapathId, Endpoint, MacAddr};

/// # Triangle
///
/// Three switches connected in a ring, with one host on `s1` and one on `s2`. The direct link
/// `s1 -- s2` is the shortest path between the two hosts, and `s1 -- s3 -- s2` is the backup.
///
/// ```text
///   h1                    h2
///    |1                   1|
///   s1 2 ------------- 2 s2
///     3                 3
///      \               /
///       1 --- s3 --- 2
/// ```
pub struct Triangle {}

impl ExampleNetwork for Triangle {
    fn description() -> TopologyDescription {
        let s1 = DatapathId(1);
        let s2 = DatapathId(2);
        let s3 = DatapathId(3);
        let link = |a: Endpoint, b: Endpoint| LinkDescription { a, b, weight: 1 };
        TopologyDescription {
            switches: vec![s1, s2, s3],
            links: vec![
                link(Endpoint::new(s1, 2), Endpoint::new(s2, 2)),
                link(Endpoint::new(s1, 3), Endpoint::new(s3, 1)),
                link(Endpoint::new(s3, 2), Endpoint::new(s2, 3)),
            ],
            hosts: vec![
                HostDescription {
                    name: String::from("h1"),
                    mac: MacAddr::from_u32(1),
                    attachment: Endpoint::new(s1, 1),
                },
                HostDescription {
                    name: String::from("h2"),
                    mac: MacAddr::from_u32(2),
                    attachment: Endpoint::new(s2, 1),
                },
            ],
        }
    }
}

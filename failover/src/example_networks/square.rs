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

//! # Square Network

use super::ExampleNetwork;
use crate::config::{HostDescription, LinkDescription, TopologyDescription};
use crate::types::{DatapathId, Endpoint, MacAddr};

/// # Square
///
/// Four switches in a ring with unequal link weights. The host `h1` is attached to `s1`, and `h4`
/// to `s4`. The upper path `s1 -- s2 -- s4` has cost 2, the lower path `s1 -- s3 -- s4` has
/// cost 4.
///
/// ```text
///         1      1
///   s1 -------- s2
///    |           |
///  2 |           | 1
///    |     2     |
///   s3 -------- s4
/// ```
///
/// | Link          | Weight |
/// |---------------|--------|
/// | s1:2 -- s2:1  | 1      |
/// | s2:2 -- s4:1  | 1      |
/// | s1:3 -- s3:1  | 2      |
/// | s3:2 -- s4:2  | 2      |
pub struct Square {}

impl ExampleNetwork for Square {
    fn description() -> TopologyDescription {
        let s = |i: u64| DatapathId(i);
        let e = |i: u64, port: u16| Endpoint::new(DatapathId(i), port);
        TopologyDescription {
            switches: vec![s(1), s(2), s(3), s(4)],
            links: vec![
                LinkDescription { a: e(1, 2), b: e(2, 1), weight: 1 },
                LinkDescription { a: e(2, 2), b: e(4, 1), weight: 1 },
                LinkDescription { a: e(1, 3), b: e(3, 1), weight: 2 },
                LinkDescription { a: e(3, 2), b: e(4, 2), weight: 2 },
            ],
            hosts: vec![
                HostDescription {
                    name: String::from("h1"),
                    mac: MacAddr::from_u32(1),
                    attachment: e(1, 1),
                },
                HostDescription {
                    name: String::from("h4"),
                    mac: MacAddr::from_u32(4),
                    attachment: e(4, 3),
                },
            ],
        }
    }
}

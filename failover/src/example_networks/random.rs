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

//! # Random Mesh Networks

use crate::config::{HostDescription, LinkDescription, TopologyDescription};
use crate::types::{DatapathId, Endpoint, MacAddr};

use rand::prelude::*;
use std::collections::HashMap;

/// Generate a random connected network with `n` switches `s1` to `sn`, and one host `h{i}` on
/// port 1 of every switch `s{i}`. First, every switch `s{i}` (for `i > 1`) is connected to a
/// randomly chosen switch with smaller index, which makes the network connected. Then,
/// `extra_links` additional links are added between random pairs of distinct switches. All links
/// get a random weight between 1 and 5.
///
/// The same `seed` always produces the same network.
pub fn random_mesh(n: usize, extra_links: usize, seed: u64) -> TopologyDescription {
    let mut rng = StdRng::seed_from_u64(seed);
    let switches = (1..=n as u64).map(DatapathId).collect::<Vec<_>>();

    // port 1 is reserved for the host
    let mut next_port: HashMap<DatapathId, u16> = switches.iter().map(|s| (*s, 2)).collect();
    let mut take_port = |dpid: DatapathId| -> Endpoint {
        let port = next_port.entry(dpid).or_insert(2);
        *port += 1;
        Endpoint::new(dpid, *port - 1)
    };

    let mut pairs: Vec<(DatapathId, DatapathId)> = Vec::new();
    for i in 1..n {
        let j = rng.gen_range(0, i);
        pairs.push((switches[i], switches[j]));
    }
    if n > 1 {
        for _ in 0..extra_links {
            let i = rng.gen_range(0, n);
            let mut j = rng.gen_range(0, n - 1);
            if j >= i {
                j += 1;
            }
            pairs.push((switches[i], switches[j]));
        }
    }

    let mut links = Vec::with_capacity(pairs.len());
    for (x, y) in pairs {
        let weight = rng.gen_range(1, 6);
        links.push(LinkDescription { a: take_port(x), b: take_port(y), weight });
    }

    let hosts = switches
        .iter()
        .map(|s| HostDescription {
            name: format!("h{}", s.0),
            mac: MacAddr::from_u32(s.0 as u32),
            attachment: Endpoint::new(*s, 1),
        })
        .collect();

    TopologyDescription { switches, links, hosts }
}

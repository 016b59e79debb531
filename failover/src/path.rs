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

//! # Path Computer
//!
//! Computes minimum-weight routes between switches using Dijkstra's algorithm, and expands them
//! into host-to-host [`Path`]s. Only links which are currently up are considered.
//!
//! The algorithm uses a binary heap keyed by the cumulative weight and the switch id. When two
//! candidates reach a switch with the same cost, the one whose predecessor has the lower switch id
//! (and then the lower link id) is kept. Hence, the result is fully deterministic: recomputing a
//! route on an unchanged topology always yields the same sequence of hops.
//!
//! Routes are computed lazily by the [`PathComputer`], i.e., only when a flow needs them, and they
//! are cached afterwards. A cached route is dropped when a link it uses goes down, when any link
//! comes up (which may shorten any route), or when the structure of the topology changes.

use crate::link_state::LinkChange;
use crate::printer;
use crate::topology::Topology;
use crate::types::{DatapathId, Endpoint, FlowKey, LinkId, LinkWeight, PathError, PortNo};

use log::*;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// Switch-level result of the path computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Switches from the source to the destination, both included.
    pub switches: Vec<DatapathId>,
    /// Links between consecutive switches. `links[i]` connects `switches[i]` and `switches[i+1]`.
    pub links: Vec<LinkId>,
    /// Sum of the weights of all links
    pub cost: LinkWeight,
}

/// Single hop of a path: the packet enters `dpid` at `in_port`, and leaves it at `out_port`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hop {
    /// Switch of the hop
    pub dpid: DatapathId,
    /// Ingress port
    pub in_port: PortNo,
    /// Egress port
    pub out_port: PortNo,
}

/// # Path
/// Host-to-host path of a single flow. A path is never modified. If the topology changes, a new
/// path is computed and replaces the old one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    /// Flow which uses this path
    pub key: FlowKey,
    /// Hops, starting at the switch of the source host
    pub hops: Vec<Hop>,
    /// All links used by the path
    pub links: Vec<LinkId>,
    /// Cost of the path
    pub cost: LinkWeight,
}

impl Path {
    /// Expand a route into a host-to-host path, where the source host is attached at `src` and
    /// the destination host at `dst`.
    pub fn from_route(
        topology: &Topology,
        key: FlowKey,
        route: &Route,
        src: Endpoint,
        dst: Endpoint,
    ) -> Result<Self, PathError> {
        let no_path = || PathError::NoPath(src.dpid, dst.dpid);
        if route.switches.first() != Some(&src.dpid) || route.switches.last() != Some(&dst.dpid) {
            return Err(no_path());
        }
        let port_on = |link: LinkId, dpid: DatapathId| -> Result<PortNo, PathError> {
            topology.link(link).and_then(|l| l.end_on(dpid)).map(|e| e.port).ok_or_else(no_path)
        };
        let last = route.switches.len() - 1;
        let mut hops = Vec::with_capacity(route.switches.len());
        for (i, dpid) in route.switches.iter().copied().enumerate() {
            let in_port = if i == 0 { src.port } else { port_on(route.links[i - 1], dpid)? };
            let out_port = if i == last { dst.port } else { port_on(route.links[i], dpid)? };
            hops.push(Hop { dpid, in_port, out_port });
        }
        Ok(Self { key, hops, links: route.links.clone(), cost: route.cost })
    }

    /// Switches traversed by the path
    pub fn switches(&self) -> Vec<DatapathId> {
        self.hops.iter().map(|h| h.dpid).collect()
    }

    /// Returns true if the path uses the link
    pub fn uses_link(&self, link: LinkId) -> bool {
        self.links.contains(&link)
    }

    /// Returns true if any hop of the path enters or leaves through the given port
    pub fn uses_port(&self, end: Endpoint) -> bool {
        self.hops
            .iter()
            .any(|h| h.dpid == end.dpid && (h.in_port == end.port || h.out_port == end.port))
    }

    /// Returns true if the path traverses the switch
    pub fn traverses(&self, dpid: DatapathId) -> bool {
        self.hops.iter().any(|h| h.dpid == dpid)
    }

    /// Returns the hop on the given switch, if the path traverses it.
    pub fn hop_on(&self, dpid: DatapathId) -> Option<&Hop> {
        self.hops.iter().find(|h| h.dpid == dpid)
    }
}

/// Compute the minimum-weight route from `src` to `dst` over all links that are up.
///
/// Fails with `PathError::UnknownSwitch` if either switch is not registered, and with
/// `PathError::NoPath` if the destination cannot be reached.
pub fn dijkstra(topology: &Topology, src: DatapathId, dst: DatapathId) -> Result<Route, PathError> {
    for dpid in [src, dst].iter() {
        if topology.switch(*dpid).is_none() {
            return Err(PathError::UnknownSwitch(*dpid));
        }
    }

    let mut dist: HashMap<DatapathId, LinkWeight> = HashMap::new();
    let mut pred: HashMap<DatapathId, (DatapathId, LinkId)> = HashMap::new();
    let mut done: HashSet<DatapathId> = HashSet::new();
    let mut heap: BinaryHeap<Reverse<(LinkWeight, DatapathId)>> = BinaryHeap::new();

    dist.insert(src, 0);
    heap.push(Reverse((0, src)));

    while let Some(Reverse((cost, current))) = heap.pop() {
        if !done.insert(current) {
            continue;
        }
        if current == dst {
            break;
        }
        let neighbors =
            topology.neighbors(current).map_err(|_| PathError::UnknownSwitch(current))?;
        for n in neighbors {
            if done.contains(&n.dpid) {
                continue;
            }
            let new_cost = cost.saturating_add(n.weight);
            let relax = match dist.get(&n.dpid) {
                None => true,
                Some(old) if new_cost < *old => true,
                // equal cost: keep the lowest predecessor, to be deterministic
                Some(old) if new_cost == *old => {
                    pred.get(&n.dpid).map(|p| (current, n.link) < *p).unwrap_or(false)
                }
                _ => false,
            };
            if relax {
                dist.insert(n.dpid, new_cost);
                pred.insert(n.dpid, (current, n.link));
                heap.push(Reverse((new_cost, n.dpid)));
            }
        }
    }

    if !done.contains(&dst) {
        return Err(PathError::NoPath(src, dst));
    }

    // walk back from the destination
    let mut switches = vec![dst];
    let mut links = Vec::new();
    let mut current = dst;
    while current != src {
        let (prev, link) = *pred.get(&current).ok_or(PathError::NoPath(src, dst))?;
        switches.push(prev);
        links.push(link);
        current = prev;
    }
    switches.reverse();
    links.reverse();
    let cost = dist.get(&dst).copied().unwrap_or_default();

    Ok(Route { switches, links, cost })
}

#[derive(Debug, Clone)]
struct CachedRoute {
    route: Route,
    structure_version: u64,
}

/// # Path Computer
/// Lazy, cached route computation. See the [module](self) documentation.
#[derive(Debug, Clone, Default)]
pub struct PathComputer {
    cache: HashMap<(DatapathId, DatapathId), CachedRoute>,
    num_computations: usize,
}

impl PathComputer {
    /// Create a path computer with an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the route between the two switches, from the cache if it is still valid.
    pub fn route(
        &mut self,
        topology: &Topology,
        src: DatapathId,
        dst: DatapathId,
    ) -> Result<Route, PathError> {
        let version = topology.structure_version();
        if let Some(cached) = self.cache.get(&(src, dst)) {
            if cached.structure_version == version {
                return Ok(cached.route.clone());
            }
            trace!("Cached route {} -> {} is stale", src, dst);
        }
        self.num_computations += 1;
        let route = match dijkstra(topology, src, dst) {
            Ok(route) => route,
            Err(e) => {
                self.cache.remove(&(src, dst));
                return Err(e);
            }
        };
        debug!("Computed route {}", printer::route(&route));
        self.cache
            .insert((src, dst), CachedRoute { route: route.clone(), structure_version: version });
        Ok(route)
    }

    /// Compute the path for the flow `key`, whose source host is attached at `src`, and whose
    /// destination host is attached at `dst`. Both attachment ports must be active.
    pub fn path(
        &mut self,
        topology: &Topology,
        key: FlowKey,
        src: Endpoint,
        dst: Endpoint,
    ) -> Result<Path, PathError> {
        for end in [src, dst].iter() {
            if !topology.is_port_active(*end) {
                return Err(PathError::InactiveAttachment(*end));
            }
        }
        let route = self.route(topology, src.dpid, dst.dpid)?;
        Path::from_route(topology, key, &route, src, dst)
    }

    /// Invalidate all cached routes affected by the link change.
    pub fn invalidate(&mut self, change: &LinkChange) {
        let before = self.cache.len();
        if change.is_down() {
            self.cache.retain(|_, c| !c.route.links.contains(&change.link));
        } else {
            self.cache.clear();
        }
        trace!("Invalidated {} cached routes", before - self.cache.len());
    }

    /// Drop all cached routes
    pub fn invalidate_all(&mut self) {
        self.cache.clear();
    }

    /// Number of routes currently cached
    pub fn num_cached(&self) -> usize {
        self.cache.len()
    }

    /// Number of times Dijkstra was run (cache misses)
    pub fn num_computations(&self) -> usize {
        self.num_computations
    }
}

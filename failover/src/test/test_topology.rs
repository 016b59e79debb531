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

use crate::topology::Topology;
use crate::{DatapathId, Endpoint, LinkStatus, TopologyError};
use lazy_static::lazy_static;

lazy_static! {
    static ref S1: DatapathId = DatapathId(1);
    static ref S2: DatapathId = DatapathId(2);
    static ref S3: DatapathId = DatapathId(3);
}

fn e(dpid: DatapathId, port: u16) -> Endpoint {
    Endpoint::new(dpid, port)
}

/// # Test topology
///
/// ```text
/// s1 2 --- 1 s2 2 --- 1 s3
/// ```
fn get_test_topo() -> Topology {
    let mut t = Topology::new();
    assert!(t.add_switch(*S1));
    assert!(t.add_switch(*S2));
    assert!(t.add_switch(*S3));
    t.add_link(e(*S1, 2), e(*S2, 1), 1).unwrap();
    t.add_link(e(*S2, 2), e(*S3, 1), 5).unwrap();
    t
}

#[test]
fn test_add_switch_twice() {
    let mut t = get_test_topo();
    let version = t.structure_version();
    assert!(!t.add_switch(*S1));
    assert_eq!(t.num_switches(), 3);
    assert_eq!(t.structure_version(), version);
    assert_eq!(t.switches(), vec![*S1, *S2, *S3]);
}

#[test]
fn test_links_start_down() {
    let t = get_test_topo();
    assert_eq!(t.num_links(), 2);
    for id in t.links() {
        assert_eq!(t.link(id).unwrap().status(), LinkStatus::Down);
    }
    assert!(!t.is_connected(*S1));
    assert!(!t.is_port_active(e(*S1, 2)));
    assert_eq!(t.neighbors(*S2), Ok(vec![]));
}

#[test]
fn test_add_link_errors() {
    let mut t = get_test_topo();
    assert_eq!(t.add_link(e(*S1, 3), e(*S1, 4), 1), Err(TopologyError::SelfLoop(*S1)));
    assert_eq!(t.add_link(e(*S1, 2), e(*S3, 3), 1), Err(TopologyError::PortInUse(e(*S1, 2))));
    assert_eq!(
        t.add_link(e(*S1, 3), e(DatapathId(9), 1), 1),
        Err(TopologyError::UnknownSwitch(DatapathId(9)))
    );
    assert_eq!(t.num_links(), 2);
}

#[test]
fn test_find_link() {
    let t = get_test_topo();
    let id = t.find_link(e(*S1, 2), e(*S2, 1)).unwrap();
    assert_eq!(t.find_link(e(*S2, 1), e(*S1, 2)), Some(id));
    assert_eq!(t.link_at(e(*S2, 1)), Some(id));
    assert_eq!(t.find_link(e(*S1, 2), e(*S3, 1)), None);
    assert_eq!(t.link_between(*S2, *S1), Some(id));
    assert_eq!(t.link_between(*S1, *S3), None);

    let link = t.link(id).unwrap();
    assert_eq!(link.peer(e(*S1, 2)), Some(e(*S2, 1)));
    assert_eq!(link.end_on(*S2), Some(e(*S2, 1)));
    assert_eq!(link.end_on(*S3), None);
    assert!(link.touches(e(*S2, 1)));
    assert!(!link.touches(e(*S2, 2)));
}

#[test]
fn test_parallel_links() {
    let mut t = get_test_topo();
    let heavy = t.find_link(e(*S2, 2), e(*S3, 1)).unwrap();
    let light = t.add_link(e(*S2, 3), e(*S3, 2), 2).unwrap();
    assert_eq!(t.link_between(*S2, *S3), Some(light));
    assert_eq!(t.incident_links(*S3), Ok(vec![heavy, light]));
}

#[test]
fn test_remove_link() {
    let mut t = get_test_topo();
    let version = t.structure_version();
    let link = t.remove_link(e(*S2, 1), e(*S1, 2)).unwrap();
    assert_eq!(link.endpoints(), (e(*S1, 2), e(*S2, 1)));
    assert!(t.structure_version() > version);
    assert_eq!(t.num_links(), 1);
    assert!(t.is_edge_port(e(*S1, 2)));
    assert_eq!(
        t.remove_link(e(*S1, 2), e(*S2, 1)),
        Err(TopologyError::UnknownLink(e(*S1, 2), e(*S2, 1)))
    );
    // the port can be reused
    assert!(t.add_link(e(*S1, 2), e(*S3, 2), 1).is_ok());
}

#[test]
fn test_neighbors_only_up() {
    let mut t = get_test_topo();
    let l12 = t.find_link(e(*S1, 2), e(*S2, 1)).unwrap();
    t.set_link_status(l12, LinkStatus::Up);
    let n = t.neighbors(*S2).unwrap();
    assert_eq!(n.len(), 1);
    assert_eq!(n[0].dpid, *S1);
    assert_eq!(n[0].local_port, 1);
    assert_eq!(n[0].remote_port, 2);
    assert_eq!(n[0].weight, 1);
    assert_eq!(n[0].link, l12);
    assert_eq!(t.neighbors(*S3), Ok(vec![]));
    assert_eq!(t.neighbors(DatapathId(9)), Err(TopologyError::UnknownSwitch(DatapathId(9))));
}

#[test]
fn test_active_edge_ports() {
    let mut t = get_test_topo();
    t.set_connected(*S1, vec![1, 2]).unwrap();
    t.set_connected(*S2, vec![1, 2, 3, 4]).unwrap();
    assert_eq!(t.active_edge_ports(), vec![e(*S1, 1), e(*S2, 3), e(*S2, 4)]);

    t.set_port(e(*S2, 4), false).unwrap();
    t.set_disconnected(*S1).unwrap();
    assert_eq!(t.active_edge_ports(), vec![e(*S2, 3)]);
    assert!(!t.is_port_active(e(*S1, 1)));
}

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

//! # Failover Launcher
//!
//! Runs the controller against a network of simulated switches. All switches connect, every pair
//! of hosts exchanges traffic, and then the given ports fail (and optionally recover). After every
//! step, the active flows and the path taken by the traffic between all hosts are printed. Set
//! `RUST_LOG` to see what the controller does.

use failover::config::{ControllerConfig, HostDescription, TopologyDescription};
use failover::connection::{SimulatedSwitch, SwitchHandle};
use failover::controller::Controller;
use failover::event::Event;
use failover::example_networks::{ExampleNetwork, Triangle};
use failover::forwarding::trace_packet;
use failover::openflow::{PacketIn, PortStatus, SwitchFeatures};
use failover::{printer, DatapathId, Endpoint};

use clap::Parser;
use itertools::Itertools;
use log::*;
use std::collections::HashMap;
use std::error::Error;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn Error>> {
    // run clap
    let args = CommandLineArguments::parse();

    // initialize the env logger
    pretty_env_logger::init();

    let desc = match args.topology.as_ref() {
        Some(file) => TopologyDescription::from_file(file)?,
        None => Triangle::description(),
    };
    let config = match args.config.as_ref() {
        Some(file) => ControllerConfig::from_file(file)?,
        None => ControllerConfig::default(),
    };
    info!(
        "Starting with {} switches, {} links and {} hosts",
        desc.switches.len(),
        desc.links.len(),
        desc.hosts.len()
    );

    let mut sim = Simulation::new(desc, config)?;
    sim.start();
    sim.report("Initial state");

    if args.fail.is_empty() {
        return Ok(());
    }

    for end in args.fail.iter() {
        sim.set_port(*end, false);
    }
    sim.run();
    sim.report(&format!("After failing {}", args.fail.iter().join(", ")));

    if args.restore {
        for end in args.fail.iter() {
            sim.set_port(*end, true);
        }
        sim.run();
        sim.report(&format!("After restoring {}", args.fail.iter().join(", ")));
    }

    Ok(())
}

/// Controller together with the simulated switches it manages
struct Simulation {
    desc: TopologyDescription,
    controller: Controller<SimulatedSwitch>,
    handles: HashMap<DatapathId, SwitchHandle>,
}

impl Simulation {
    fn new(desc: TopologyDescription, config: ControllerConfig) -> Result<Self, failover::Error> {
        let controller = Controller::new(desc.build()?, config);
        Ok(Self { desc, controller, handles: HashMap::new() })
    }

    /// Connect all switches, and let every pair of hosts exchange traffic.
    fn start(&mut self) {
        for dpid in self.desc.switches.clone() {
            let switch = SimulatedSwitch::new(dpid);
            self.handles.insert(dpid, switch.handle());
            let features = SwitchFeatures { dpid, ports: self.desc.ports_of(dpid) };
            self.controller.push_event(Event::SwitchConnected(features, switch));
        }
        self.run();

        // every host announces itself first, such that the controller knows all destinations
        let hosts = self.desc.hosts.clone();
        let next = hosts.iter().cycle().skip(1);
        for (a, b) in hosts.iter().zip(next).filter(|(a, b)| a.mac != b.mac) {
            self.send(a, b);
        }
        for a in hosts.iter() {
            for b in hosts.iter().filter(|b| b.mac != a.mac) {
                self.send(a, b);
            }
        }
        self.run();
    }

    fn send(&mut self, src: &HostDescription, dst: &HostDescription) {
        self.controller.push_event(Event::PacketIn(PacketIn {
            dpid: src.attachment.dpid,
            in_port: src.attachment.port,
            src: src.mac,
            dst: dst.mac,
            buffer_id: None,
            data: Vec::new(),
        }));
    }

    fn set_port(&mut self, endpoint: Endpoint, up: bool) {
        self.controller.push_event(Event::PortStatus(PortStatus { endpoint, up }));
    }

    fn run(&mut self) {
        let errors = self.controller.do_queue();
        if !errors.is_empty() {
            warn!("{} events could not be handled", errors.len());
        }
    }

    fn report(&self, title: &str) {
        println!("\n{}", title);
        println!("{}", "=".repeat(title.len()));
        printer::print_topology(self.controller.topology());
        printer::print_flows(self.controller.flows());
        for dpid in self.desc.switches.iter() {
            if let Some(handle) = self.handles.get(dpid) {
                printer::print_flow_table(handle);
            }
        }
        println!("Traffic:");
        for a in self.desc.hosts.iter() {
            for b in self.desc.hosts.iter().filter(|b| b.mac != a.mac) {
                let result = trace_packet(
                    self.controller.topology(),
                    &self.handles,
                    a.attachment,
                    a.mac,
                    b.mac,
                );
                match result {
                    Ok(delivery) => {
                        let hops = delivery.switches.iter().join(" -> ");
                        println!("    {} -> {}: {}", a.name, b.name, hops)
                    }
                    Err(e) => println!("    {} -> {}: {}", a.name, b.name, e),
                }
            }
        }
    }
}


/// Run the failover controller on a simulated network, fail some ports, and show how the flows
/// are moved to their backup paths.
#[derive(Parser, Debug)]
#[clap(name = "Failover (Simulation)", author = "Tibor Schneider")]
struct CommandLineArguments {
    /// JSON file describing the topology. Uses the triangle network if omitted.
    #[clap(short = 't', long)]
    topology: Option<PathBuf>,
    /// JSON file with the controller configuration. Uses the defaults if omitted.
    #[clap(short = 'c', long)]
    config: Option<PathBuf>,
    /// Port to take down, e.g., `s1:2`. Can be given multiple times.
    #[clap(short = 'f', long = "fail")]
    fail: Vec<Endpoint>,
    /// Bring the failed ports back up afterwards
    #[clap(short = 'r', long)]
    restore: bool,
}

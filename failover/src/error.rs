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

//! Module containing all error types

use crate::types::{ControllerError, ParseError, TopologyError};
use thiserror::Error;

/// Main error type
#[derive(Debug, Error)]
pub enum Error {
    /// Error propagated from the controller
    #[error("Controller Error: {0}")]
    ControllerError(#[from] ControllerError),
    /// The topology cannot be built
    #[error("Topology Error: {0}")]
    TopologyError(#[from] TopologyError),
    /// An identifier cannot be parsed
    #[error("Parse Error: {0}")]
    ParseError(#[from] ParseError),
    /// The configuration file is not valid JSON, or does not describe a valid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(#[from] serde_json::Error),
    /// The configuration file cannot be read
    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),
}

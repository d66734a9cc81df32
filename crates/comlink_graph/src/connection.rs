// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection (edge) definitions for the graph.

use crate::id::{NodeId, PinId};
use serde::{Deserialize, Serialize};

/// A directed edge from an output pin to an input pin.
///
/// Stored on the node that owns the source pin and nowhere else.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    /// Output pin the edge leaves from
    pub source: PinId,
    /// Input pin the edge arrives at
    pub destination: PinId,
    /// Display name; empty when unnamed
    #[serde(default)]
    pub name: String,
}

impl Connection {
    /// Create a new unnamed connection
    pub fn new(source: PinId, destination: PinId) -> Self {
        Self {
            source,
            destination,
            name: String::new(),
        }
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Check if this connection involves a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.source.node() == node_id || self.destination.node() == node_id
    }

    /// Check if this connection involves a specific pin
    pub fn involves_pin(&self, pin_id: PinId) -> bool {
        self.source == pin_id || self.destination == pin_id
    }
}

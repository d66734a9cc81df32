// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph commands for undo/redo support.
//!
//! Every structural edit of a [`Graph`] is a [`GraphCommand`]. Each variant
//! carries exactly the state it needs to revert itself: values that move
//! between the command and the graph (nodes, detached connections, swapped
//! pin lists) or old values captured when the command is built (pin names and
//! types).

use crate::connection::Connection;
use crate::graph::{ConnectOutcome, ConnectionError, DetachedConnection, Graph, GraphError};
use crate::id::{NodeId, PinId, PinSide};
use crate::node::Node;
use crate::pin::{type_color, Pin, PinKind};
use comlink_history::Command;
use std::collections::HashMap;

/// Error type for command execution
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// The connection engine refused the edit
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// The node set could not be changed
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Pin not found
    #[error("Pin not found: {0}")]
    PinNotFound(PinId),

    /// Invalid operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl CommandError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }
}

/// Insert one node
#[derive(Debug, Clone)]
pub struct CreateNode {
    node_id: NodeId,
    /// Present while the node is outside the graph
    node: Option<Node>,
}

/// Remove nodes, remembering where each one was
#[derive(Debug, Clone)]
pub struct DeleteNodes {
    node_ids: Vec<NodeId>,
    /// Removed nodes with their former positions, in removal order
    removed: Vec<(usize, Node)>,
}

/// Connect two pins
#[derive(Debug, Clone)]
pub struct CreateConnection {
    a: PinId,
    b: PinId,
    /// What the engine did, while applied
    outcome: Option<ConnectOutcome>,
}

/// Remove the connection between two pins
#[derive(Debug, Clone)]
pub struct Disconnect {
    a: PinId,
    b: PinId,
    /// The removed connection, while applied
    detached: Option<DetachedConnection>,
}

/// Remove a fixed set of connections
#[derive(Debug, Clone)]
pub struct DeleteConnections {
    connections: Vec<Connection>,
    /// Connections actually removed, in removal order
    detached: Vec<DetachedConnection>,
}

/// Replace a node's output pins and outgoing connections in one step
#[derive(Debug, Clone)]
pub struct SetOutputsAndConnections {
    node_id: NodeId,
    /// The lists not currently in the graph; swapped on apply and revert
    outputs: Vec<Pin>,
    connections: Vec<Connection>,
}

/// Rename a pin
#[derive(Debug, Clone)]
pub struct SetPinName {
    pin: PinId,
    old_name: String,
    new_name: String,
}

/// Rename and retype a typed pin; the owning node takes the new type color
#[derive(Debug, Clone)]
pub struct SetPinType {
    pin: PinId,
    old_name: String,
    new_name: String,
    old_type: String,
    new_type: String,
    old_node_color: u32,
}

/// Several commands undone and redone as one
#[derive(Debug, Clone)]
pub struct Batch {
    description: String,
    commands: Vec<GraphCommand>,
}

/// A reversible graph edit
#[derive(Debug, Clone)]
pub enum GraphCommand {
    /// Insert one node
    CreateNode(CreateNode),
    /// Remove nodes
    DeleteNodes(DeleteNodes),
    /// Connect two pins
    CreateConnection(CreateConnection),
    /// Disconnect two pins
    Disconnect(Disconnect),
    /// Remove connections
    DeleteConnections(DeleteConnections),
    /// Replace a node's outputs and outgoing connections
    SetOutputsAndConnections(SetOutputsAndConnections),
    /// Rename a pin
    SetPinName(SetPinName),
    /// Rename and retype a typed pin
    SetPinType(SetPinType),
    /// Group of commands
    Batch(Batch),
}

impl GraphCommand {
    /// Insert `node` at the end of the graph
    pub fn create_node(node: Node) -> Self {
        Self::CreateNode(CreateNode {
            node_id: node.id,
            node: Some(node),
        })
    }

    /// Remove nodes. Connections on other nodes pointing at them are not
    /// touched; delete those first (see [`GraphCommand::delete_nodes_with_connections`]).
    pub fn delete_nodes(node_ids: impl IntoIterator<Item = NodeId>) -> Self {
        Self::DeleteNodes(DeleteNodes {
            node_ids: node_ids.into_iter().collect(),
            removed: Vec::new(),
        })
    }

    /// Remove nodes together with every connection that touches them
    pub fn delete_nodes_with_connections(graph: &Graph, node_ids: &[NodeId]) -> Self {
        let connections = graph
            .connections()
            .filter(|c| node_ids.iter().any(|&id| c.involves_node(id)))
            .cloned()
            .collect();
        Self::batch(
            "Delete Nodes",
            vec![
                Self::delete_connections(connections),
                Self::delete_nodes(node_ids.iter().copied()),
            ],
        )
    }

    /// Connect two pins, given in either order
    pub fn create_connection(a: PinId, b: PinId) -> Self {
        Self::CreateConnection(CreateConnection { a, b, outcome: None })
    }

    /// Remove these connections
    pub fn delete_connections(connections: Vec<Connection>) -> Self {
        Self::DeleteConnections(DeleteConnections {
            connections,
            detached: Vec::new(),
        })
    }

    /// Disconnect two pins given in either order; nothing happens if they are not connected
    pub fn disconnect(a: PinId, b: PinId) -> Self {
        Self::Disconnect(Disconnect { a, b, detached: None })
    }

    /// Remove every connection with an end at `pin`
    pub fn clear_connections(graph: &Graph, pin: PinId) -> Self {
        Self::delete_connections(graph.connections_touching(pin).cloned().collect())
    }

    /// Replace the outputs and outgoing connections of a node
    pub fn set_outputs_and_connections(node_id: NodeId, outputs: Vec<Pin>, connections: Vec<Connection>) -> Self {
        Self::SetOutputsAndConnections(SetOutputsAndConnections {
            node_id,
            outputs,
            connections,
        })
    }

    /// Rename a pin, capturing its current name
    pub fn set_pin_name(graph: &Graph, pin: PinId, name: impl Into<String>) -> Result<Self, CommandError> {
        let current = graph.pin(pin).ok_or(CommandError::PinNotFound(pin))?;
        Ok(Self::SetPinName(SetPinName {
            pin,
            old_name: current.pin.name().to_string(),
            new_name: name.into(),
        }))
    }

    /// Rename and retype a typed pin, capturing its current name, type and node color
    pub fn set_pin_type(
        graph: &Graph,
        pin: PinId,
        name: impl Into<String>,
        type_tag: impl Into<String>,
    ) -> Result<Self, CommandError> {
        let current = graph.pin(pin).ok_or(CommandError::PinNotFound(pin))?;
        let old_type = current
            .pin
            .type_tag()
            .ok_or_else(|| CommandError::invalid(format!("Pin {pin} is not a typed pin")))?;
        Ok(Self::SetPinType(SetPinType {
            pin,
            old_name: current.pin.name().to_string(),
            new_name: name.into(),
            old_type: old_type.to_string(),
            new_type: type_tag.into(),
            old_node_color: current.node.color,
        }))
    }

    /// Group commands into one undo step
    pub fn batch(description: impl Into<String>, commands: Vec<GraphCommand>) -> Self {
        Self::Batch(Batch {
            description: description.into(),
            commands,
        })
    }
}

impl Command<Graph> for GraphCommand {
    type Error = CommandError;

    fn description(&self) -> &str {
        match self {
            Self::CreateNode(_) => "Create Node",
            Self::DeleteNodes(_) => "Delete Nodes",
            Self::CreateConnection(_) => "Create Connection",
            Self::Disconnect(_) => "Disconnect",
            Self::DeleteConnections(_) => "Delete Connections",
            Self::SetOutputsAndConnections(_) => "Edit Outputs",
            Self::SetPinName(_) => "Rename Pin",
            Self::SetPinType(_) => "Change Pin Type",
            Self::Batch(batch) => batch.description.as_str(),
        }
    }

    fn apply(&mut self, graph: &mut Graph) -> Result<(), CommandError> {
        match self {
            Self::CreateNode(cmd) => cmd.apply(graph),
            Self::DeleteNodes(cmd) => cmd.apply(graph),
            Self::CreateConnection(cmd) => cmd.apply(graph),
            Self::Disconnect(cmd) => cmd.apply(graph),
            Self::DeleteConnections(cmd) => cmd.apply(graph),
            Self::SetOutputsAndConnections(cmd) => cmd.apply(graph),
            Self::SetPinName(cmd) => cmd.set(graph, false),
            Self::SetPinType(cmd) => cmd.apply(graph),
            Self::Batch(cmd) => cmd.apply(graph),
        }
    }

    fn revert(&mut self, graph: &mut Graph) -> Result<(), CommandError> {
        match self {
            Self::CreateNode(cmd) => cmd.revert(graph),
            Self::DeleteNodes(cmd) => cmd.revert(graph),
            Self::CreateConnection(cmd) => cmd.revert(graph),
            Self::Disconnect(cmd) => cmd.revert(graph),
            Self::DeleteConnections(cmd) => cmd.revert(graph),
            Self::SetOutputsAndConnections(cmd) => cmd.swap(graph),
            Self::SetPinName(cmd) => cmd.set(graph, true),
            Self::SetPinType(cmd) => cmd.revert(graph),
            Self::Batch(cmd) => cmd.revert(graph),
        }
    }
}

impl CreateNode {
    fn apply(&mut self, graph: &mut Graph) -> Result<(), CommandError> {
        if graph.node(self.node_id).is_some() {
            return Err(GraphError::DuplicateNode(self.node_id).into());
        }
        let node = self
            .node
            .take()
            .ok_or_else(|| CommandError::invalid("Node is already in the graph"))?;
        graph.insert_node(node)?;
        Ok(())
    }

    fn revert(&mut self, graph: &mut Graph) -> Result<(), CommandError> {
        let (_, node) = graph
            .remove_node(self.node_id)
            .ok_or(CommandError::NodeNotFound(self.node_id))?;
        self.node = Some(node);
        Ok(())
    }
}

impl DeleteNodes {
    fn apply(&mut self, graph: &mut Graph) -> Result<(), CommandError> {
        for &node_id in &self.node_ids {
            match graph.remove_node(node_id) {
                Some(removed) => self.removed.push(removed),
                None => {
                    self.revert(graph)?;
                    return Err(CommandError::NodeNotFound(node_id));
                }
            }
        }
        Ok(())
    }

    fn revert(&mut self, graph: &mut Graph) -> Result<(), CommandError> {
        while let Some((index, node)) = self.removed.pop() {
            graph.insert_node_at(index, node)?;
        }
        Ok(())
    }
}

impl CreateConnection {
    fn apply(&mut self, graph: &mut Graph) -> Result<(), CommandError> {
        self.outcome = Some(graph.create_connection(self.a, self.b)?);
        Ok(())
    }

    fn revert(&mut self, graph: &mut Graph) -> Result<(), CommandError> {
        let outcome = self
            .outcome
            .take()
            .ok_or_else(|| CommandError::invalid("Connection was never created"))?;
        let created = &outcome.connection;
        if graph.detach_connection(created.source, created.destination).is_none() {
            return Err(CommandError::invalid(format!(
                "Connection {} -> {} is missing",
                created.source, created.destination
            )));
        }
        for displaced in outcome.displaced.into_iter().rev() {
            graph.attach_connection(displaced)?;
        }
        Ok(())
    }
}

impl Disconnect {
    fn apply(&mut self, graph: &mut Graph) -> Result<(), CommandError> {
        self.detached = graph.remove_connection(self.a, self.b)?;
        if self.detached.is_none() {
            tracing::debug!("{} and {} were not connected", self.a, self.b);
        }
        Ok(())
    }

    fn revert(&mut self, graph: &mut Graph) -> Result<(), CommandError> {
        if let Some(detached) = self.detached.take() {
            graph.attach_connection(detached)?;
        }
        Ok(())
    }
}

impl DeleteConnections {
    fn apply(&mut self, graph: &mut Graph) -> Result<(), CommandError> {
        for connection in &self.connections {
            match graph.detach_connection(connection.source, connection.destination) {
                Some(detached) => self.detached.push(detached),
                None => tracing::debug!(
                    "Connection {} -> {} already gone",
                    connection.source,
                    connection.destination
                ),
            }
        }
        Ok(())
    }

    fn revert(&mut self, graph: &mut Graph) -> Result<(), CommandError> {
        while let Some(detached) = self.detached.pop() {
            graph.attach_connection(detached)?;
        }
        Ok(())
    }
}

impl SetOutputsAndConnections {
    fn apply(&mut self, graph: &mut Graph) -> Result<(), CommandError> {
        self.check(graph)?;
        self.swap(graph)
    }

    /// Exchange the node's lists with the ones held here
    fn swap(&mut self, graph: &mut Graph) -> Result<(), CommandError> {
        let node = graph
            .node_mut(self.node_id)
            .ok_or(CommandError::NodeNotFound(self.node_id))?;
        std::mem::swap(&mut node.outputs, &mut self.outputs);
        std::mem::swap(&mut node.connections, &mut self.connections);
        Ok(())
    }

    /// Make sure the incoming lists keep every graph invariant
    fn check(&self, graph: &Graph) -> Result<(), CommandError> {
        let node = graph
            .node(self.node_id)
            .ok_or(CommandError::NodeNotFound(self.node_id))?;

        for (index, pin) in self.outputs.iter().enumerate() {
            let expected = u16::try_from(index).map(|i| PinId::new(node.id, PinSide::Output, i));
            if pin.side() != PinSide::Output || expected != Ok(pin.id()) {
                return Err(CommandError::invalid(format!(
                    "Output {index} has id {} and kind {:?}",
                    pin.id(),
                    pin.kind()
                )));
            }
        }

        let mut fan_out: HashMap<PinId, usize> = HashMap::new();
        let mut fan_in: HashMap<PinId, usize> = HashMap::new();
        for connection in &self.connections {
            let source = (connection.source.node() == node.id)
                .then(|| self.outputs.get(usize::from(connection.source.index())))
                .flatten()
                .filter(|_| connection.source.side() == PinSide::Output)
                .ok_or(CommandError::PinNotFound(connection.source))?;
            let destination = graph
                .pin(connection.destination)
                .ok_or(CommandError::PinNotFound(connection.destination))?
                .pin;

            if destination.side() != PinSide::Input || !destination.can_connect_to(source) {
                return Err(ConnectionError::Incompatible {
                    output: connection.source,
                    input: connection.destination,
                }
                .into());
            }
            if source.kind() == PinKind::FlowOutput {
                *fan_out.entry(connection.source).or_default() += 1;
            }
            if destination.kind() == PinKind::TypedInput {
                *fan_in.entry(connection.destination).or_default() += 1;
            }
        }

        if let Some((&pin, _)) = fan_out.iter().find(|&(_, &count)| count > 1) {
            return Err(ConnectionError::PinOccupied(pin).into());
        }
        for (&pin, &count) in &fan_in {
            let from_elsewhere = graph
                .connections_to(pin)
                .filter(|c| c.source.node() != node.id)
                .count();
            if count + from_elsewhere > 1 {
                return Err(ConnectionError::PinOccupied(pin).into());
            }
        }
        Ok(())
    }
}

impl SetPinName {
    fn set(&self, graph: &mut Graph, old: bool) -> Result<(), CommandError> {
        let name = if old { &self.old_name } else { &self.new_name };
        let pin = graph.pin_mut(self.pin).ok_or(CommandError::PinNotFound(self.pin))?;
        pin.set_name(name.as_str());
        Ok(())
    }
}

impl SetPinType {
    fn apply(&mut self, graph: &mut Graph) -> Result<(), CommandError> {
        let current = graph.pin(self.pin).ok_or(CommandError::PinNotFound(self.pin))?;
        if current.pin.type_tag() != Some(self.new_type.as_str()) && graph.connections_touching(self.pin).next().is_some() {
            return Err(CommandError::invalid(format!(
                "Pin {} is connected; clear its connections before changing its type",
                self.pin
            )));
        }
        self.write(graph, &self.new_name, &self.new_type, type_color(&self.new_type))
    }

    fn revert(&mut self, graph: &mut Graph) -> Result<(), CommandError> {
        self.write(graph, &self.old_name, &self.old_type, self.old_node_color)
    }

    fn write(&self, graph: &mut Graph, name: &str, type_tag: &str, node_color: u32) -> Result<(), CommandError> {
        let pin = graph.pin_mut(self.pin).ok_or(CommandError::PinNotFound(self.pin))?;
        let typed = pin
            .as_typed_mut()
            .ok_or_else(|| CommandError::invalid(format!("Pin {} is not a typed pin", self.pin)))?;
        typed.name = name.to_string();
        typed.set_type_tag(type_tag);

        if let Some(node) = graph.node_mut(self.pin.node()) {
            node.color = node_color;
        }
        Ok(())
    }
}

impl Batch {
    fn apply(&mut self, graph: &mut Graph) -> Result<(), CommandError> {
        for applied in 0..self.commands.len() {
            if let Err(err) = self.commands[applied].apply(graph) {
                for command in self.commands[..applied].iter_mut().rev() {
                    command.revert(graph)?;
                }
                return Err(err);
            }
        }
        Ok(())
    }

    fn revert(&mut self, graph: &mut Graph) -> Result<(), CommandError> {
        for command in self.commands.iter_mut().rev() {
            command.revert(graph)?;
        }
        Ok(())
    }
}

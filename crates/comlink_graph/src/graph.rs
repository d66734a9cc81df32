// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure and its connection-legality engine.
//!
//! The graph owns its nodes in insertion order; each node owns its outgoing
//! connections. Structural mutators are crate-private so that, outside this
//! crate, a graph only changes through [`crate::command::GraphCommand`]s or
//! whole-graph replacement by the codec.

use crate::connection::Connection;
use crate::id::{NodeId, PinId, PinSide};
use crate::node::Node;
use crate::pin::{Pin, PinKind};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// What to do when a connection targets an occupied flow output or typed input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionPolicy {
    /// Refuse the new connection and report the occupied pin
    #[default]
    Reject,
    /// Remove the occupying connection and add the new one
    Replace,
}

/// A resolved pin together with the node that owns it
#[derive(Debug, Clone, Copy)]
pub struct PinRef<'a> {
    /// Owning node
    pub node: &'a Node,
    /// The pin
    pub pin: &'a Pin,
}

/// A connection taken out of a node's list, with the slot it occupied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetachedConnection {
    /// Node whose list held the connection
    pub owner: NodeId,
    /// Position in that list
    pub index: usize,
    /// The connection itself
    pub connection: Connection,
}

/// Result of a successful connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOutcome {
    /// The connection that was added
    pub connection: Connection,
    /// Connections removed to make room ([`ConnectionPolicy::Replace`] only), in removal order
    pub displaced: Vec<DetachedConnection>,
}

/// Error when creating or removing a connection
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    /// Pin (or its node) does not exist
    #[error("Pin not found: {0}")]
    PinNotFound(PinId),

    /// Both pins are inputs or both are outputs
    #[error("Cannot connect {a} and {b}: pins must be one input and one output")]
    InvalidDirection {
        /// First pin
        a: PinId,
        /// Second pin
        b: PinId,
    },

    /// Pin kinds or type tags do not match
    #[error("Incompatible pins: {output} -> {input}")]
    Incompatible {
        /// Output side
        output: PinId,
        /// Input side
        input: PinId,
    },

    /// Flow output or typed input already connected
    #[error("Pin already connected: {0}")]
    PinOccupied(PinId),
}

impl ConnectionError {
    /// Whether this is an expected user-level rejection rather than a caller bug
    pub fn is_rejection(&self) -> bool {
        !matches!(self, Self::InvalidDirection { .. })
    }
}

/// Error when changing the node set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// A node with this id already exists
    #[error("Duplicate node: {0}")]
    DuplicateNode(NodeId),

    /// No node with this id
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Insert position past the end of the node list
    #[error("Node index {index} out of range (len {len})")]
    IndexOutOfRange {
        /// Requested position
        index: usize,
        /// Node count
        len: usize,
    },
}

/// A broken graph invariant, as reported by [`Graph::validate`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    /// A connection endpoint does not resolve
    #[error("Connection {} -> {} has dangling endpoint {pin}", .connection.source, .connection.destination)]
    DanglingEndpoint {
        /// The connection
        connection: Connection,
        /// Endpoint that failed to resolve
        pin: PinId,
    },

    /// A connection stored on a node that does not own its source
    #[error("Connection {} -> {} stored on node {owner}", .connection.source, .connection.destination)]
    MisplacedConnection {
        /// Node holding the connection
        owner: NodeId,
        /// The connection
        connection: Connection,
    },

    /// Source is not an output, destination is not an input, or kinds mismatch
    #[error("Connection {} -> {} joins incompatible pins", .connection.source, .connection.destination)]
    Incompatible {
        /// The connection
        connection: Connection,
    },

    /// Flow output with several outgoing connections
    #[error("Flow output {pin} has {count} outgoing connections")]
    FanOut {
        /// The flow output
        pin: PinId,
        /// Outgoing connection count
        count: usize,
    },

    /// Typed input with several incoming connections
    #[error("Typed input {pin} has {count} incoming connections")]
    FanIn {
        /// The typed input
        pin: PinId,
        /// Incoming connection count
        count: usize,
    },

    /// Pin whose id does not match its node, side or index
    #[error("Pin {pin} is stored at the wrong address on node {node}")]
    MisaddressedPin {
        /// Node holding the pin
        node: NodeId,
        /// The pin's id
        pin: PinId,
    },
}

/// A node graph
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(into = "GraphRepr", try_from = "GraphRepr")]
pub struct Graph {
    /// Nodes by ID, in insertion order
    nodes: IndexMap<NodeId, Node>,
    /// Occupied-pin behavior for new connections
    policy: ConnectionPolicy,
}

/// Serialized shape of a graph: the node list without the redundant keys
#[derive(Serialize, Deserialize)]
#[serde(rename = "Graph")]
struct GraphRepr {
    #[serde(default)]
    policy: ConnectionPolicy,
    nodes: Vec<Node>,
}

impl From<Graph> for GraphRepr {
    fn from(graph: Graph) -> Self {
        Self {
            policy: graph.policy,
            nodes: graph.nodes.into_values().collect(),
        }
    }
}

impl TryFrom<GraphRepr> for Graph {
    type Error = GraphError;

    fn try_from(repr: GraphRepr) -> Result<Self, Self::Error> {
        Graph::from_nodes(repr.nodes, repr.policy)
    }
}

/// Order-sensitive: two graphs are equal when they hold equal nodes in the same order
impl PartialEq for Graph {
    fn eq(&self, other: &Self) -> bool {
        self.policy == other.policy
            && self.nodes.len() == other.nodes.len()
            && self.nodes.values().eq(other.nodes.values())
    }
}

impl Graph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty graph with a connection policy
    pub fn with_policy(policy: ConnectionPolicy) -> Self {
        Self {
            nodes: IndexMap::new(),
            policy,
        }
    }

    /// Bulk-build a graph from nodes in order. Fails on duplicate ids.
    pub fn from_nodes(
        nodes: impl IntoIterator<Item = Node>,
        policy: ConnectionPolicy,
    ) -> Result<Self, GraphError> {
        let mut graph = Self::with_policy(policy);
        for node in nodes {
            graph.insert_node(node)?;
        }
        Ok(graph)
    }

    /// Occupied-pin policy in effect
    pub fn policy(&self) -> ConnectionPolicy {
        self.policy
    }

    /// Change the occupied-pin policy for future connections
    pub fn set_policy(&mut self, policy: ConnectionPolicy) {
        self.policy = policy;
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Position of a node in iteration order
    pub fn index_of(&self, node_id: NodeId) -> Option<usize> {
        self.nodes.get_index_of(&node_id)
    }

    /// Get all nodes in order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all node IDs in order
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Append a node
    pub(crate) fn insert_node(&mut self, node: Node) -> Result<(), GraphError> {
        let index = self.nodes.len();
        self.insert_node_at(index, node)
    }

    /// Insert a node at a position in iteration order
    pub(crate) fn insert_node_at(&mut self, index: usize, node: Node) -> Result<(), GraphError> {
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::DuplicateNode(node.id));
        }
        if index > self.nodes.len() {
            return Err(GraphError::IndexOutOfRange {
                index,
                len: self.nodes.len(),
            });
        }
        self.nodes.shift_insert(index, node.id, node);
        Ok(())
    }

    /// Remove a node, returning its former position. Connections stored on
    /// other nodes that point at it are left as they are.
    pub(crate) fn remove_node(&mut self, node_id: NodeId) -> Option<(usize, Node)> {
        self.nodes
            .shift_remove_full(&node_id)
            .map(|(index, _, node)| (index, node))
    }

    /// Get a mutable node by ID
    pub(crate) fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    // ------------------------------------------------------------------
    // Pins
    // ------------------------------------------------------------------

    /// Resolve a pin id to its node and pin
    pub fn pin(&self, pin_id: PinId) -> Option<PinRef<'_>> {
        let node = self.nodes.get(&pin_id.node())?;
        let pin = node.pin(pin_id)?;
        Some(PinRef { node, pin })
    }

    /// Mutable access to a resolved pin
    pub(crate) fn pin_mut(&mut self, pin_id: PinId) -> Option<&mut Pin> {
        self.nodes.get_mut(&pin_id.node())?.pin_mut(pin_id)
    }

    // ------------------------------------------------------------------
    // Connections
    // ------------------------------------------------------------------

    /// Get all connections, in node order then list order
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.nodes.values().flat_map(|node| node.connections.iter())
    }

    /// Get the number of connections
    pub fn connection_count(&self) -> usize {
        self.nodes.values().map(|node| node.connections.len()).sum()
    }

    /// Get connections leaving a pin
    pub fn connections_from(&self, pin_id: PinId) -> impl Iterator<Item = &Connection> {
        self.connections().filter(move |c| c.source == pin_id)
    }

    /// Get connections arriving at a pin
    pub fn connections_to(&self, pin_id: PinId) -> impl Iterator<Item = &Connection> {
        self.connections().filter(move |c| c.destination == pin_id)
    }

    /// Get connections with either end at a pin
    pub fn connections_touching(&self, pin_id: PinId) -> impl Iterator<Item = &Connection> {
        self.connections().filter(move |c| c.involves_pin(pin_id))
    }

    /// Whether any connection arrives at this pin
    pub fn has_source(&self, pin_id: PinId) -> bool {
        self.connections_to(pin_id).next().is_some()
    }

    /// Whether any connection leaves this pin
    pub fn has_destination(&self, pin_id: PinId) -> bool {
        self.connections_from(pin_id).next().is_some()
    }

    /// Check whether `a` and `b` could be connected right now, without connecting them
    pub fn can_connect(&self, a: PinId, b: PinId) -> Result<(), ConnectionError> {
        self.plan_connection(a, b).map(|_| ())
    }

    /// Resolve both pins and order them as (output, input)
    fn orient(&self, a: PinId, b: PinId) -> Result<((PinId, &Pin), (PinId, &Pin)), ConnectionError> {
        let pin_a = self.pin(a).ok_or(ConnectionError::PinNotFound(a))?.pin;
        let pin_b = self.pin(b).ok_or(ConnectionError::PinNotFound(b))?.pin;

        match (pin_a.side(), pin_b.side()) {
            (PinSide::Output, PinSide::Input) => Ok(((a, pin_a), (b, pin_b))),
            (PinSide::Input, PinSide::Output) => Ok(((b, pin_b), (a, pin_a))),
            _ => Err(ConnectionError::InvalidDirection { a, b }),
        }
    }

    /// Validate a connection and list the connections it would displace
    fn plan_connection(&self, a: PinId, b: PinId) -> Result<(Connection, Vec<Connection>), ConnectionError> {
        let ((source, source_pin), (destination, destination_pin)) = self.orient(a, b)?;

        if !destination_pin.can_connect_to(source_pin) {
            return Err(ConnectionError::Incompatible {
                output: source,
                input: destination,
            });
        }

        let (occupied_pin, occupying): (PinId, Vec<Connection>) = match (source_pin.kind(), destination_pin.kind()) {
            (PinKind::FlowOutput, _) => (source, self.connections_from(source).cloned().collect()),
            (_, PinKind::TypedInput) => (destination, self.connections_to(destination).cloned().collect()),
            _ => (destination, Vec::new()),
        };

        if !occupying.is_empty() && self.policy == ConnectionPolicy::Reject {
            return Err(ConnectionError::PinOccupied(occupied_pin));
        }

        Ok((Connection::new(source, destination), occupying))
    }

    /// Connect two pins given in either order
    pub(crate) fn create_connection(&mut self, a: PinId, b: PinId) -> Result<ConnectOutcome, ConnectionError> {
        let (connection, occupying) = match self.plan_connection(a, b) {
            Ok(plan) => plan,
            Err(err) => {
                tracing::debug!("Connection {a} <-> {b} rejected: {err}");
                return Err(err);
            }
        };

        let displaced: Vec<_> = occupying
            .iter()
            .filter_map(|old| self.detach_connection(old.source, old.destination))
            .collect();

        let owner = connection.source.node();
        let node = self
            .nodes
            .get_mut(&owner)
            .ok_or(ConnectionError::PinNotFound(connection.source))?;
        node.connections.push(connection.clone());

        Ok(ConnectOutcome { connection, displaced })
    }

    /// Disconnect two pins given in either order. `Ok(None)` if they were not connected.
    pub(crate) fn remove_connection(
        &mut self,
        a: PinId,
        b: PinId,
    ) -> Result<Option<DetachedConnection>, ConnectionError> {
        let ((source, _), (destination, _)) = self.orient(a, b)?;
        Ok(self.detach_connection(source, destination))
    }

    /// Connection between two pins given in either order, if there is one
    pub fn connection_between(&self, a: PinId, b: PinId) -> Result<Option<&Connection>, ConnectionError> {
        let ((source, _), (destination, _)) = self.orient(a, b)?;
        Ok(self
            .connections_from(source)
            .find(|c| c.destination == destination))
    }

    /// Take a connection out of whichever node stores it
    pub(crate) fn detach_connection(&mut self, source: PinId, destination: PinId) -> Option<DetachedConnection> {
        let matches = |c: &Connection| c.source == source && c.destination == destination;

        let owner = self
            .nodes
            .get(&source.node())
            .filter(|node| node.connections.iter().any(matches))
            .map(|node| node.id)
            .or_else(|| {
                self.nodes
                    .values()
                    .find(|node| node.connections.iter().any(matches))
                    .map(|node| node.id)
            })?;

        let node = self.nodes.get_mut(&owner)?;
        let index = node.connections.iter().position(matches)?;
        let connection = node.connections.remove(index);
        Some(DetachedConnection { owner, index, connection })
    }

    /// Put a detached connection back in its slot (clamped to the list end)
    pub(crate) fn attach_connection(&mut self, detached: DetachedConnection) -> Result<(), GraphError> {
        let node = self
            .nodes
            .get_mut(&detached.owner)
            .ok_or(GraphError::NodeNotFound(detached.owner))?;
        let index = detached.index.min(node.connections.len());
        node.connections.insert(index, detached.connection);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Invariants
    // ------------------------------------------------------------------

    /// Check every graph invariant and report each violation found
    pub fn validate(&self) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();
        let mut out_degree: IndexMap<PinId, usize> = IndexMap::new();
        let mut in_degree: IndexMap<PinId, usize> = IndexMap::new();

        for node in self.nodes.values() {
            violations.extend(node.misaddressed_pins().map(|pin| InvariantViolation::MisaddressedPin {
                node: node.id,
                pin: pin.id(),
            }));

            for connection in &node.connections {
                if connection.source.node() != node.id {
                    violations.push(InvariantViolation::MisplacedConnection {
                        owner: node.id,
                        connection: connection.clone(),
                    });
                }

                let source = self.pin(connection.source);
                let destination = self.pin(connection.destination);
                let (source, destination) = match (source, destination) {
                    (Some(s), Some(d)) => (s.pin, d.pin),
                    (s, _) => {
                        let pin = if s.is_none() { connection.source } else { connection.destination };
                        violations.push(InvariantViolation::DanglingEndpoint {
                            connection: connection.clone(),
                            pin,
                        });
                        continue;
                    }
                };

                if source.side() != PinSide::Output || !destination.can_connect_to(source) {
                    violations.push(InvariantViolation::Incompatible {
                        connection: connection.clone(),
                    });
                }
                if source.kind() == PinKind::FlowOutput {
                    *out_degree.entry(connection.source).or_default() += 1;
                }
                if destination.kind() == PinKind::TypedInput {
                    *in_degree.entry(connection.destination).or_default() += 1;
                }
            }
        }

        violations.extend(
            out_degree
                .into_iter()
                .filter(|&(_, count)| count > 1)
                .map(|(pin, count)| InvariantViolation::FanOut { pin, count }),
        );
        violations.extend(
            in_degree
                .into_iter()
                .filter(|&(_, count)| count > 1)
                .map(|(pin, count)| InvariantViolation::FanIn { pin, count }),
        );
        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::IdGenerator;
    use crate::testing::{sample_node, FLAG, FLOW, VALUE};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn graph_with(count: usize, policy: ConnectionPolicy) -> (Graph, Vec<NodeId>) {
        let mut ids = IdGenerator::seeded(7);
        let mut graph = Graph::with_policy(policy);
        let mut node_ids = Vec::new();
        for i in 0..count {
            let node = sample_node(&mut ids, &format!("N{i}"));
            node_ids.push(node.id);
            graph.insert_node(node).unwrap();
        }
        (graph, node_ids)
    }

    #[test]
    fn test_pin_lookup() {
        let (mut graph, ids) = graph_with(2, ConnectionPolicy::Reject);
        let found = graph.pin(PinId::input(ids[1], VALUE)).unwrap();
        assert_eq!(found.node.id, ids[1]);
        assert_eq!(found.pin.type_tag(), Some("Int"));

        assert!(graph.pin(PinId::input(ids[1], 99)).is_none());
        graph.remove_node(ids[1]);
        assert!(graph.pin(PinId::input(ids[1], VALUE)).is_none());
    }

    #[test]
    fn test_connect_either_order() {
        let (mut graph, ids) = graph_with(2, ConnectionPolicy::Reject);
        let out = PinId::output(ids[0], FLOW);
        let input = PinId::input(ids[1], FLOW);

        let outcome = graph.create_connection(input, out).unwrap();
        assert_eq!(outcome.connection.source, out);
        assert_eq!(outcome.connection.destination, input);
        assert!(outcome.displaced.is_empty());

        // Stored on the source's node only
        assert_eq!(graph.node(ids[0]).unwrap().connections.len(), 1);
        assert!(graph.node(ids[1]).unwrap().connections.is_empty());
        assert!(graph.has_destination(out));
        assert!(graph.has_source(input));
        assert!(!graph.has_source(out));
    }

    #[test]
    fn test_rejects_same_direction() {
        let (mut graph, ids) = graph_with(2, ConnectionPolicy::Reject);
        let a = PinId::input(ids[0], FLOW);
        let b = PinId::input(ids[1], FLOW);
        assert_eq!(
            graph.create_connection(a, b),
            Err(ConnectionError::InvalidDirection { a, b })
        );
        let a = PinId::output(ids[0], FLOW);
        let b = PinId::output(ids[1], FLOW);
        assert!(matches!(graph.remove_connection(a, b), Err(ConnectionError::InvalidDirection { .. })));
        assert!(!ConnectionError::InvalidDirection { a, b }.is_rejection());
    }

    #[test]
    fn test_rejects_incompatible() {
        let (mut graph, ids) = graph_with(2, ConnectionPolicy::Reject);
        // Int output into Bool input, given input first
        let output = PinId::output(ids[0], VALUE);
        let input = PinId::input(ids[1], FLAG);
        let err = graph.create_connection(input, output).unwrap_err();
        assert_eq!(err, ConnectionError::Incompatible { output, input });
        assert_eq!(err.to_string(), format!("Incompatible pins: {output} -> {input}"));
        assert!(std::error::Error::source(&err).is_none());
        // Flow output into typed input
        let result = graph.create_connection(PinId::output(ids[0], FLOW), PinId::input(ids[1], VALUE));
        assert!(matches!(result, Err(ConnectionError::Incompatible { .. })));
        // Missing pin
        let missing = PinId::input(ids[1], 40);
        assert_eq!(
            graph.create_connection(PinId::output(ids[0], FLOW), missing),
            Err(ConnectionError::PinNotFound(missing))
        );
        assert_eq!(graph.connection_count(), 0);
    }

    #[test]
    fn test_flow_output_fan_out_reject() {
        let (mut graph, ids) = graph_with(3, ConnectionPolicy::Reject);
        let out = PinId::output(ids[0], FLOW);
        graph.create_connection(out, PinId::input(ids[1], FLOW)).unwrap();
        assert_eq!(
            graph.create_connection(out, PinId::input(ids[2], FLOW)),
            Err(ConnectionError::PinOccupied(out))
        );
        assert!(graph.has_destination(out));
        assert_eq!(graph.connections_from(out).count(), 1);
        assert_eq!(graph.connections_from(out).next().unwrap().destination, PinId::input(ids[1], FLOW));
    }

    #[test]
    fn test_flow_output_fan_out_replace() {
        let (mut graph, ids) = graph_with(3, ConnectionPolicy::Replace);
        let out = PinId::output(ids[0], FLOW);
        graph.create_connection(out, PinId::input(ids[1], FLOW)).unwrap();
        let outcome = graph.create_connection(out, PinId::input(ids[2], FLOW)).unwrap();
        assert_eq!(outcome.displaced.len(), 1);
        assert_eq!(outcome.displaced[0].connection.destination, PinId::input(ids[1], FLOW));
        assert_eq!(graph.connections_from(out).count(), 1);
        assert_eq!(graph.connections_from(out).next().unwrap().destination, PinId::input(ids[2], FLOW));
    }

    #[test]
    fn test_flow_input_accepts_many() {
        let (mut graph, ids) = graph_with(3, ConnectionPolicy::Reject);
        let input = PinId::input(ids[2], FLOW);
        graph.create_connection(PinId::output(ids[0], FLOW), input).unwrap();
        graph.create_connection(PinId::output(ids[1], FLOW), input).unwrap();
        assert_eq!(graph.connections_to(input).count(), 2);
    }

    #[test]
    fn test_typed_input_fan_in() {
        let (mut graph, ids) = graph_with(3, ConnectionPolicy::Reject);
        let input = PinId::input(ids[2], VALUE);
        graph.create_connection(PinId::output(ids[0], VALUE), input).unwrap();
        assert_eq!(
            graph.create_connection(PinId::output(ids[1], VALUE), input),
            Err(ConnectionError::PinOccupied(input))
        );
        // Typed outputs fan out freely
        graph.create_connection(PinId::output(ids[0], VALUE), PinId::input(ids[1], VALUE)).unwrap();
        assert_eq!(graph.connections_from(PinId::output(ids[0], VALUE)).count(), 2);

        graph.set_policy(ConnectionPolicy::Replace);
        graph.create_connection(PinId::output(ids[1], VALUE), input).unwrap();
        assert_eq!(graph.connections_to(input).count(), 1);
        assert_eq!(graph.connections_to(input).next().unwrap().source, PinId::output(ids[1], VALUE));
    }

    #[test]
    fn test_remove_connection() {
        let (mut graph, ids) = graph_with(2, ConnectionPolicy::Reject);
        let out = PinId::output(ids[0], VALUE);
        let input = PinId::input(ids[1], VALUE);
        graph.create_connection(out, input).unwrap();
        assert_eq!(
            graph.connection_between(input, out),
            Ok(Some(&Connection::new(out, input)))
        );

        let removed = graph.remove_connection(input, out).unwrap().unwrap();
        assert_eq!(removed.owner, ids[0]);
        assert_eq!(removed.index, 0);
        assert_eq!(graph.connection_count(), 0);
        assert_eq!(graph.remove_connection(out, input), Ok(None));
    }

    #[test]
    fn test_can_connect_does_not_mutate() {
        let (graph, ids) = graph_with(2, ConnectionPolicy::Reject);
        assert!(graph.can_connect(PinId::output(ids[0], FLOW), PinId::input(ids[1], FLOW)).is_ok());
        assert_eq!(graph.connection_count(), 0);
    }

    #[test]
    fn test_dangling_reference_after_node_removal() {
        let (mut graph, ids) = graph_with(2, ConnectionPolicy::Reject);
        let out = PinId::output(ids[0], FLOW);
        let input = PinId::input(ids[1], FLOW);
        graph.create_connection(out, input).unwrap();

        graph.remove_node(ids[1]);
        assert!(graph.pin(input).is_none());
        assert_eq!(graph.remove_connection(out, input), Err(ConnectionError::PinNotFound(input)));
        assert!(matches!(
            graph.validate().as_slice(),
            [InvariantViolation::DanglingEndpoint { pin, .. }] if *pin == input
        ));

        // Detaching by value still works
        assert!(graph.detach_connection(out, input).is_some());
        assert!(graph.validate().is_empty());
    }

    #[test]
    fn test_node_order_and_duplicates() {
        let (mut graph, ids) = graph_with(3, ConnectionPolicy::Reject);
        let (index, node) = graph.remove_node(ids[1]).unwrap();
        assert_eq!(index, 1);
        assert_eq!(graph.node_ids().collect::<Vec<_>>(), vec![ids[0], ids[2]]);

        graph.insert_node_at(index, node.clone()).unwrap();
        assert_eq!(graph.node_ids().collect::<Vec<_>>(), ids);
        assert_eq!(graph.insert_node(node), Err(GraphError::DuplicateNode(ids[1])));
    }

    #[test]
    fn test_equality_is_order_sensitive() {
        let (graph, ids) = graph_with(2, ConnectionPolicy::Reject);
        let mut reordered = graph.clone();
        let (_, node) = reordered.remove_node(ids[0]).unwrap();
        reordered.insert_node(node).unwrap();
        assert_ne!(graph, reordered);
        assert_eq!(graph, graph.clone());
    }

    #[test]
    fn test_random_edits_keep_invariants() {
        for policy in [ConnectionPolicy::Reject, ConnectionPolicy::Replace] {
            let (mut graph, ids) = graph_with(5, policy);
            let mut rng = ChaCha8Rng::seed_from_u64(1234);
            let pins: Vec<PinId> = ids
                .iter()
                .flat_map(|&node| {
                    (0..3).flat_map(move |i| [PinId::input(node, i), PinId::output(node, i)])
                })
                .collect();

            for _ in 0..2000 {
                let a = pins[rng.gen_range(0..pins.len())];
                let b = pins[rng.gen_range(0..pins.len())];
                if rng.gen_bool(0.7) {
                    let _ = graph.create_connection(a, b);
                } else {
                    let _ = graph.remove_connection(a, b);
                }
                assert_eq!(graph.validate(), Vec::new(), "policy {policy:?}");
            }
            assert!(graph.connection_count() > 0);
        }
    }
}

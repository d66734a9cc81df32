// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared fixtures for unit tests.

use crate::id::{IdGenerator, PinSide};
use crate::node::{Node, NodeKind};
use crate::pin::Pin;

/// Index of the flow pin on each side of [`sample_node`]
pub(crate) const FLOW: u16 = 0;
/// Index of the `Int` pin on each side of [`sample_node`]
pub(crate) const VALUE: u16 = 1;
/// Index of the `Bool` pin on each side of [`sample_node`]
pub(crate) const FLAG: u16 = 2;

/// Node with a flow, an `Int` and a `Bool` pin on each side
pub(crate) fn sample_node(ids: &mut IdGenerator, name: &str) -> Node {
    let mut node = Node::new(ids.next_node_id(), NodeKind::VariableSet, name).with_position(10.0, -4.5);
    node.push_pin(PinSide::Input, |id| Pin::flow_input(id, "In"));
    node.push_pin(PinSide::Input, |id| Pin::typed_input(id, "Count", "Int"));
    node.push_pin(PinSide::Input, |id| Pin::typed_input(id, "Flag", "Bool"));
    node.push_pin(PinSide::Output, |id| Pin::flow_output(id, "Out"));
    node.push_pin(PinSide::Output, |id| Pin::typed_output(id, "Count", "Int"));
    node.push_pin(PinSide::Output, |id| Pin::typed_output(id, "Flag", "Bool"));
    node
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the graph.

use crate::connection::Connection;
use crate::id::{NodeId, PinId, PinSide};
use crate::pin::Pin;
use serde::{Deserialize, Serialize};

/// Most pins a node can hold on one side; a pin index is a `u16`
pub const MAX_PINS_PER_SIDE: usize = u16::MAX as usize + 1;

/// Node type category, stored in the top byte of a [`NodeKind`] code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeCategory {
    /// Entry and exit points of a conversation
    Control,
    /// Branching on conditions
    Flow,
    /// Spoken lines and player choices
    Dialogue,
    /// Variables, constants and events of the host application
    Interop,
}

impl NodeCategory {
    /// Category bits of the wire code
    pub const fn bits(self) -> u32 {
        match self {
            Self::Control => 0x0100_0000,
            Self::Flow => 0x0200_0000,
            Self::Dialogue => 0x0300_0000,
            Self::Interop => 0x0400_0000,
        }
    }
}

/// Node kind discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Conversation start, triggered by interacting
    Interact,
    /// Conversation end
    Exit,
    /// Two-way branch on a boolean condition
    Branch,
    /// Player picks one of several options
    PlayerDialogue,
    /// A line spoken by a character
    NpcDialogue,
    /// Read a host variable
    VariableGet,
    /// Write a host variable
    VariableSet,
    /// Literal value
    ConstantRead,
    /// Fire a host event
    TriggerEvent,
}

/// Error for a node kind code that names no known kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Unknown node kind: {0:#010x}")]
pub struct UnknownNodeKind(pub u32);

impl NodeKind {
    /// Every known kind, in code order
    pub const ALL: [NodeKind; 9] = [
        Self::Interact,
        Self::Exit,
        Self::Branch,
        Self::PlayerDialogue,
        Self::NpcDialogue,
        Self::VariableGet,
        Self::VariableSet,
        Self::ConstantRead,
        Self::TriggerEvent,
    ];

    /// Category this kind belongs to
    pub const fn category(self) -> NodeCategory {
        match self {
            Self::Interact | Self::Exit => NodeCategory::Control,
            Self::Branch => NodeCategory::Flow,
            Self::PlayerDialogue | Self::NpcDialogue => NodeCategory::Dialogue,
            Self::VariableGet | Self::VariableSet | Self::ConstantRead | Self::TriggerEvent => {
                NodeCategory::Interop
            }
        }
    }

    /// Wire code: category bits OR a per-category ordinal
    pub const fn code(self) -> u32 {
        let ordinal = match self {
            Self::Interact | Self::Branch | Self::PlayerDialogue | Self::VariableGet => 0x1,
            Self::Exit | Self::NpcDialogue | Self::VariableSet => 0x2,
            Self::ConstantRead => 0x3,
            Self::TriggerEvent => 0x4,
        };
        self.category().bits() | ordinal
    }
}

impl TryFrom<u32> for NodeKind {
    type Error = UnknownNodeKind;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.code() == code)
            .ok_or(UnknownNodeKind(code))
    }
}

/// A node instance in the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Node kind
    pub kind: NodeKind,
    /// Display name
    pub name: String,
    /// Display color (ARGB)
    pub color: u32,
    /// Position in the graph UI
    pub position: [f32; 2],
    /// Input pins; position is the pin's index
    pub inputs: Vec<Pin>,
    /// Output pins; position is the pin's index
    pub outputs: Vec<Pin>,
    /// Outgoing connections, each sourced at one of this node's outputs
    pub connections: Vec<Connection>,
}

impl Node {
    /// Create an empty node with no pins
    pub fn new(id: NodeId, kind: NodeKind, name: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            name: name.into(),
            color: 0xFFFF_FFFF,
            position: [0.0, 0.0],
            inputs: Vec::new(),
            outputs: Vec::new(),
            connections: Vec::new(),
        }
    }

    /// Set the position
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = [x, y];
        self
    }

    /// Set the display color
    pub fn with_color(mut self, color: u32) -> Self {
        self.color = color;
        self
    }

    /// Id the next pin appended to `side` will have, or `None` once the side
    /// holds [`MAX_PINS_PER_SIDE`] pins
    pub fn next_pin_id(&self, side: PinSide) -> Option<PinId> {
        let index = u16::try_from(self.pins(side).len()).ok()?;
        Some(PinId::new(self.id, side, index))
    }

    /// Append a pin built from the id it will occupy; returns that id.
    ///
    /// Returns `None` and leaves the node unchanged when the side is full.
    pub fn push_pin(&mut self, side: PinSide, build: impl FnOnce(PinId) -> Pin) -> Option<PinId> {
        let id = self.next_pin_id(side)?;
        let pin = build(id);
        match side {
            PinSide::Input => self.inputs.push(pin),
            PinSide::Output => self.outputs.push(pin),
        }
        Some(id)
    }

    /// Pin list for a side
    pub fn pins(&self, side: PinSide) -> &[Pin] {
        match side {
            PinSide::Input => &self.inputs,
            PinSide::Output => &self.outputs,
        }
    }

    /// Get an input pin by index
    pub fn input(&self, index: usize) -> Option<&Pin> {
        self.inputs.get(index)
    }

    /// Get an output pin by index
    pub fn output(&self, index: usize) -> Option<&Pin> {
        self.outputs.get(index)
    }

    /// Get a pin by ID; the id is decoded, not searched for
    pub fn pin(&self, pin_id: PinId) -> Option<&Pin> {
        if pin_id.node() != self.id {
            return None;
        }
        self.pins(pin_id.side()).get(usize::from(pin_id.index()))
    }

    /// Mutable access to a pin by ID
    pub fn pin_mut(&mut self, pin_id: PinId) -> Option<&mut Pin> {
        if pin_id.node() != self.id {
            return None;
        }
        let index = usize::from(pin_id.index());
        match pin_id.side() {
            PinSide::Input => self.inputs.get_mut(index),
            PinSide::Output => self.outputs.get_mut(index),
        }
    }

    /// Get all pins, inputs first
    pub fn all_pins(&self) -> impl Iterator<Item = &Pin> {
        self.inputs.iter().chain(self.outputs.iter())
    }

    /// Pins whose id disagrees with where they are stored
    pub fn misaddressed_pins(&self) -> impl Iterator<Item = &Pin> {
        let inputs = self.inputs.iter().enumerate().map(|(i, p)| (PinSide::Input, i, p));
        let outputs = self.outputs.iter().enumerate().map(|(i, p)| (PinSide::Output, i, p));
        inputs.chain(outputs).filter_map(move |(side, index, pin)| {
            let id = pin.id();
            let consistent = id.node() == self.id
                && id.side() == side
                && pin.side() == side
                && usize::from(id.index()) == index;
            (!consistent).then_some(pin)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_codes_round_trip() {
        for kind in NodeKind::ALL {
            assert_eq!(NodeKind::try_from(kind.code()), Ok(kind));
        }
        assert_eq!(NodeKind::Branch.code(), 0x0200_0001);
        assert_eq!(NodeKind::TriggerEvent.code(), 0x0400_0004);
        assert_eq!(NodeKind::try_from(0x0500_0001), Err(UnknownNodeKind(0x0500_0001)));
    }

    #[test]
    fn test_pin_addressing() {
        let id = NodeId::from_bytes([3; 8]);
        let mut node = Node::new(id, NodeKind::Branch, "Branch");
        let flow = node.push_pin(PinSide::Input, |pin| Pin::flow_input(pin, "")).unwrap();
        let cond = node.push_pin(PinSide::Input, |pin| Pin::typed_input(pin, "Condition", "Z")).unwrap();
        let out = node.push_pin(PinSide::Output, |pin| Pin::flow_output(pin, "True")).unwrap();

        assert_eq!(flow, PinId::input(id, 0));
        assert_eq!(cond, PinId::input(id, 1));
        assert_eq!(out, PinId::output(id, 0));
        assert_eq!(node.pin(cond).and_then(Pin::type_tag), Some("Z"));
        assert!(node.pin(PinId::output(id, 1)).is_none());
        assert!(node.pin(PinId::input(NodeId::from_bytes([4; 8]), 0)).is_none());
        assert_eq!(node.misaddressed_pins().count(), 0);

        node.inputs.swap(0, 1);
        assert_eq!(node.misaddressed_pins().count(), 2);
    }

    #[test]
    fn test_push_pin_stops_at_capacity() {
        let id = NodeId::from_bytes([5; 8]);
        let mut node = Node::new(id, NodeKind::PlayerDialogue, "Player Dialogue");
        for _ in 0..MAX_PINS_PER_SIDE {
            assert!(node.push_pin(PinSide::Output, |pin| Pin::flow_output(pin, "")).is_some());
        }
        let last = PinId::output(id, u16::MAX);
        assert_eq!(node.outputs.last().map(Pin::id), Some(last));

        assert_eq!(node.next_pin_id(PinSide::Output), None);
        assert_eq!(node.push_pin(PinSide::Output, |pin| Pin::flow_output(pin, "")), None);
        assert_eq!(node.outputs.len(), MAX_PINS_PER_SIDE);
        assert_eq!(node.misaddressed_pins().count(), 0);

        // The other side is unaffected
        assert_eq!(node.next_pin_id(PinSide::Input), Some(PinId::input(id, 0)));
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pin definitions for node inputs/outputs.

use crate::id::{PinId, PinSide};
use serde::{Deserialize, Serialize};

/// Color given to flow pins unless overridden (opaque white)
pub const DEFAULT_FLOW_COLOR: u32 = 0xFFFF_FFFF;

/// Seed and multiplier of the type-tag color hash
const TYPE_HASH_SEED: u32 = 618_258_791;

/// Derive a display color from a type tag.
///
/// Stable across runs and platforms: hashes the UTF-16 code units of the tag,
/// keeps 24 bits and forces full opacity.
pub fn type_color(type_tag: &str) -> u32 {
    let hash = type_tag.encode_utf16().fold(TYPE_HASH_SEED, |acc, unit| {
        acc.wrapping_add(u32::from(unit)).wrapping_mul(TYPE_HASH_SEED)
    });
    (hash & 0x00FF_FFFF) | 0xFF00_0000
}

/// The four pin capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PinKind {
    /// Receives control flow
    FlowInput,
    /// Passes control flow on; at most one outgoing connection
    FlowOutput,
    /// Receives a typed value; at most one incoming connection
    TypedInput,
    /// Provides a typed value
    TypedOutput,
}

impl PinKind {
    /// Pin list this kind belongs in
    pub fn side(self) -> PinSide {
        match self {
            Self::FlowInput | Self::TypedInput => PinSide::Input,
            Self::FlowOutput | Self::TypedOutput => PinSide::Output,
        }
    }

    /// Whether pins of this kind carry a type tag
    pub fn is_typed(self) -> bool {
        matches!(self, Self::TypedInput | Self::TypedOutput)
    }
}

/// Untyped control-flow pin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowPin {
    /// Pin ID
    pub id: PinId,
    /// Display name
    pub name: String,
    /// Display color (ARGB)
    pub color: u32,
}

/// Value pin; its color always follows its type tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedPin {
    /// Pin ID
    pub id: PinId,
    /// Display name
    pub name: String,
    type_tag: String,
}

impl TypedPin {
    /// Type tag used for connection matching
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// Change the type tag (and with it the color)
    pub fn set_type_tag(&mut self, type_tag: impl Into<String>) {
        self.type_tag = type_tag.into();
    }

    /// Display color derived from the type tag
    pub fn color(&self) -> u32 {
        type_color(&self.type_tag)
    }
}

/// A connection endpoint on a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pin {
    /// Flow input
    FlowInput(FlowPin),
    /// Flow output
    FlowOutput(FlowPin),
    /// Typed input
    TypedInput(TypedPin),
    /// Typed output
    TypedOutput(TypedPin),
}

impl Pin {
    /// Create a flow input pin
    pub fn flow_input(id: PinId, name: impl Into<String>) -> Self {
        Self::FlowInput(FlowPin {
            id,
            name: name.into(),
            color: DEFAULT_FLOW_COLOR,
        })
    }

    /// Create a flow output pin
    pub fn flow_output(id: PinId, name: impl Into<String>) -> Self {
        Self::FlowOutput(FlowPin {
            id,
            name: name.into(),
            color: DEFAULT_FLOW_COLOR,
        })
    }

    /// Create a typed input pin
    pub fn typed_input(id: PinId, name: impl Into<String>, type_tag: impl Into<String>) -> Self {
        Self::TypedInput(TypedPin {
            id,
            name: name.into(),
            type_tag: type_tag.into(),
        })
    }

    /// Create a typed output pin
    pub fn typed_output(id: PinId, name: impl Into<String>, type_tag: impl Into<String>) -> Self {
        Self::TypedOutput(TypedPin {
            id,
            name: name.into(),
            type_tag: type_tag.into(),
        })
    }

    /// Override the color of a flow pin. Typed pins keep their derived color.
    pub fn with_color(mut self, color: u32) -> Self {
        if let Self::FlowInput(pin) | Self::FlowOutput(pin) = &mut self {
            pin.color = color;
        }
        self
    }

    /// Capability of this pin
    pub fn kind(&self) -> PinKind {
        match self {
            Self::FlowInput(_) => PinKind::FlowInput,
            Self::FlowOutput(_) => PinKind::FlowOutput,
            Self::TypedInput(_) => PinKind::TypedInput,
            Self::TypedOutput(_) => PinKind::TypedOutput,
        }
    }

    /// Pin ID
    pub fn id(&self) -> PinId {
        match self {
            Self::FlowInput(pin) | Self::FlowOutput(pin) => pin.id,
            Self::TypedInput(pin) | Self::TypedOutput(pin) => pin.id,
        }
    }

    /// Re-address the pin (used when a node's pin list is rebuilt)
    pub fn set_id(&mut self, id: PinId) {
        match self {
            Self::FlowInput(pin) | Self::FlowOutput(pin) => pin.id = id,
            Self::TypedInput(pin) | Self::TypedOutput(pin) => pin.id = id,
        }
    }

    /// Display name
    pub fn name(&self) -> &str {
        match self {
            Self::FlowInput(pin) | Self::FlowOutput(pin) => &pin.name,
            Self::TypedInput(pin) | Self::TypedOutput(pin) => &pin.name,
        }
    }

    /// Rename the pin
    pub fn set_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        match self {
            Self::FlowInput(pin) | Self::FlowOutput(pin) => pin.name = name,
            Self::TypedInput(pin) | Self::TypedOutput(pin) => pin.name = name,
        }
    }

    /// Display color (ARGB)
    pub fn color(&self) -> u32 {
        match self {
            Self::FlowInput(pin) | Self::FlowOutput(pin) => pin.color,
            Self::TypedInput(pin) | Self::TypedOutput(pin) => pin.color(),
        }
    }

    /// Type tag, for typed pins only
    pub fn type_tag(&self) -> Option<&str> {
        self.as_typed().map(TypedPin::type_tag)
    }

    /// Typed pin payload, if this is a typed pin
    pub fn as_typed(&self) -> Option<&TypedPin> {
        match self {
            Self::TypedInput(pin) | Self::TypedOutput(pin) => Some(pin),
            Self::FlowInput(_) | Self::FlowOutput(_) => None,
        }
    }

    /// Mutable typed pin payload, if this is a typed pin
    pub fn as_typed_mut(&mut self) -> Option<&mut TypedPin> {
        match self {
            Self::TypedInput(pin) | Self::TypedOutput(pin) => Some(pin),
            Self::FlowInput(_) | Self::FlowOutput(_) => None,
        }
    }

    /// Pin list this pin belongs in
    pub fn side(&self) -> PinSide {
        self.kind().side()
    }

    /// Whether this is an input pin
    pub fn is_input(&self) -> bool {
        self.side() == PinSide::Input
    }

    /// Check if a connection to another pin is valid
    pub fn can_connect_to(&self, other: &Pin) -> bool {
        match (self, other) {
            (Self::FlowInput(_), Self::FlowOutput(_)) | (Self::FlowOutput(_), Self::FlowInput(_)) => true,
            (Self::TypedInput(a), Self::TypedOutput(b)) | (Self::TypedOutput(a), Self::TypedInput(b)) => {
                a.type_tag == b.type_tag
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::NodeId;

    fn node() -> NodeId {
        NodeId::from_bytes([7; 8])
    }

    #[test]
    fn test_type_color_is_deterministic() {
        assert_eq!(type_color("Bool"), type_color("Bool"));
        assert_eq!(type_color("Bool"), 0xFFEC_B295);
        assert_eq!(type_color("Int"), 0xFF4E_2E0A);
        assert_eq!(type_color("Z"), 0xFFAD_75A7);
        assert_eq!(type_color(""), 0xFFD9_E167);
    }

    #[test]
    fn test_type_colors_differ() {
        let tags = ["Bool", "Int", "Float", "String", "Z"];
        for (i, a) in tags.iter().enumerate() {
            for b in &tags[i + 1..] {
                assert_ne!(type_color(a), type_color(b), "{a} vs {b}");
            }
        }
    }

    #[test]
    fn test_typed_color_follows_tag() {
        let mut a = Pin::typed_input(PinId::input(node(), 0), "a", "Int");
        let b = Pin::typed_output(PinId::output(node(), 0), "b", "Int").with_color(0x1234_5678);
        assert_eq!(a.color(), b.color());
        assert_eq!(a.color(), type_color("Int"));

        if let Some(typed) = a.as_typed_mut() {
            typed.set_type_tag("Bool");
        }
        assert_eq!(a.color(), type_color("Bool"));
    }

    #[test]
    fn test_connect_truth_table() {
        let flow_in = Pin::flow_input(PinId::input(node(), 0), "");
        let flow_out = Pin::flow_output(PinId::output(node(), 0), "");
        let int_in = Pin::typed_input(PinId::input(node(), 1), "", "Int");
        let int_out = Pin::typed_output(PinId::output(node(), 1), "", "Int");
        let bool_out = Pin::typed_output(PinId::output(node(), 2), "", "Bool");

        let pins = [&flow_in, &flow_out, &int_in, &int_out];
        let expected = [
            [false, true, false, false],
            [true, false, false, false],
            [false, false, false, true],
            [false, false, true, false],
        ];
        for (i, a) in pins.iter().enumerate() {
            for (j, b) in pins.iter().enumerate() {
                assert_eq!(a.can_connect_to(b), expected[i][j], "{:?} -> {:?}", a.kind(), b.kind());
            }
        }

        assert!(!int_in.can_connect_to(&bool_out));
        assert!(!bool_out.can_connect_to(&int_in));
    }

    #[test]
    fn test_flow_color_override() {
        let pin = Pin::flow_output(PinId::output(node(), 0), "Next");
        assert_eq!(pin.color(), DEFAULT_FLOW_COLOR);
        assert_eq!(pin.with_color(0xFF00_FF00).color(), 0xFF00_FF00);
    }
}

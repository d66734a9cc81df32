// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node and pin identifiers.
//!
//! A [`NodeId`] is 8 random bytes compared structurally. A [`PinId`] is the
//! owning node's id plus a 3-byte local suffix (side, big-endian index), so a
//! pin id alone says which node owns the pin and where to find it.

use rand::RngCore;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Length of a node identifier in bytes
pub const NODE_ID_LEN: usize = 8;

/// Length of a pin's local suffix in bytes
pub const PIN_LOCAL_ID_LEN: usize = 3;

/// Error when parsing an identifier from text or raw bytes
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdParseError {
    /// Wrong number of bytes
    #[error("Expected {expected} id bytes, got {found}")]
    Length {
        /// Required byte count
        expected: usize,
        /// Byte count supplied
        found: usize,
    },

    /// Non-hex character in text form
    #[error("Invalid hex digit in id: {0:?}")]
    Hex(String),

    /// Side byte other than input/output
    #[error("Invalid pin side: {0}")]
    Side(u8),

    /// Pin id text without the node/local separator
    #[error("Malformed pin id: {0:?}")]
    Malformed(String),
}

/// Unique identifier for a node
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId([u8; NODE_ID_LEN]);

impl NodeId {
    /// Build an id from raw bytes
    pub const fn from_bytes(bytes: [u8; NODE_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Build an id from a byte slice of exactly [`NODE_ID_LEN`] bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, IdParseError> {
        let bytes: [u8; NODE_ID_LEN] = bytes.try_into().map_err(|_| IdParseError::Length {
            expected: NODE_ID_LEN,
            found: bytes.len(),
        })?;
        Ok(Self(bytes))
    }

    /// Draw a fresh id from a random source. Collisions are not checked.
    pub fn generate<R: RngCore + ?Sized>(rng: &mut R) -> Self {
        let mut bytes = [0u8; NODE_ID_LEN];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Raw bytes of the id
    pub fn as_bytes(&self) -> &[u8; NODE_ID_LEN] {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_hex(f, &self.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({self})")
    }
}

impl FromStr for NodeId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_slice(&parse_hex(s)?)
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Which pin list of a node a pin lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PinSide {
    /// Input pin list
    Input = 0,
    /// Output pin list
    Output = 1,
}

impl PinSide {
    /// Wire byte for this side
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for PinSide {
    type Error = IdParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Input),
            1 => Ok(Self::Output),
            other => Err(IdParseError::Side(other)),
        }
    }
}

/// Unique identifier for a pin: owning node plus side and index
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PinId {
    node: NodeId,
    side: PinSide,
    index: u16,
}

impl PinId {
    /// Address the `index`-th pin on `side` of `node`
    pub const fn new(node: NodeId, side: PinSide, index: u16) -> Self {
        Self { node, side, index }
    }

    /// Shorthand for an input pin id
    pub const fn input(node: NodeId, index: u16) -> Self {
        Self::new(node, PinSide::Input, index)
    }

    /// Shorthand for an output pin id
    pub const fn output(node: NodeId, index: u16) -> Self {
        Self::new(node, PinSide::Output, index)
    }

    /// Rebuild a pin id from its node and 3-byte local suffix
    pub fn from_local_bytes(node: NodeId, local: &[u8]) -> Result<Self, IdParseError> {
        let [side, hi, lo]: [u8; PIN_LOCAL_ID_LEN] =
            local.try_into().map_err(|_| IdParseError::Length {
                expected: PIN_LOCAL_ID_LEN,
                found: local.len(),
            })?;
        Ok(Self::new(node, PinSide::try_from(side)?, u16::from_be_bytes([hi, lo])))
    }

    /// The 3-byte local suffix: side byte then big-endian index
    pub fn local_bytes(&self) -> [u8; PIN_LOCAL_ID_LEN] {
        let [hi, lo] = self.index.to_be_bytes();
        [self.side.as_byte(), hi, lo]
    }

    /// Node owning the pin
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Pin list the pin lives in
    pub fn side(&self) -> PinSide {
        self.side
    }

    /// Position in that pin list
    pub fn index(&self) -> u16 {
        self.index
    }
}

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.node)?;
        write_hex(f, &self.local_bytes())
    }
}

impl fmt::Debug for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PinId({self})")
    }
}

impl FromStr for PinId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (node, local) = s
            .split_once(':')
            .ok_or_else(|| IdParseError::Malformed(s.to_string()))?;
        Self::from_local_bytes(node.parse()?, &parse_hex(local)?)
    }
}

impl Serialize for PinId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PinId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Seedable source of node identifiers
#[derive(Debug, Clone)]
pub struct IdGenerator {
    rng: ChaCha8Rng,
}

impl IdGenerator {
    /// Generator with a fixed seed; the same seed yields the same id sequence
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Generator seeded from the operating system
    pub fn from_entropy() -> Self {
        Self {
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    /// Draw the next node id
    pub fn next_node_id(&mut self) -> NodeId {
        NodeId::generate(&mut self.rng)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::from_entropy()
    }
}

fn write_hex(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    for byte in bytes {
        write!(f, "{byte:02X}")?;
    }
    Ok(())
}

fn parse_hex(s: &str) -> Result<Vec<u8>, IdParseError> {
    if s.len() % 2 != 0 || !s.is_ascii() {
        return Err(IdParseError::Hex(s.to_string()));
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| IdParseError::Hex(s.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_structural_equality() {
        let a = NodeId::from_bytes([1, 2, 3, 4, 5, 6, 7, 8]);
        let b = NodeId::from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));

        let pa = PinId::output(a, 3);
        let pb = PinId::from_local_bytes(b, &[1, 0, 3]).unwrap();
        assert_eq!(pa, pb);
        assert_eq!(hash_of(&pa), hash_of(&pb));
        assert_ne!(pa, PinId::input(a, 3));
    }

    #[test]
    fn test_fresh_ids_differ() {
        let mut ids = IdGenerator::from_entropy();
        assert_ne!(ids.next_node_id(), ids.next_node_id());
    }

    #[test]
    fn test_seeded_generator_is_reproducible() {
        let mut a = IdGenerator::seeded(42);
        let mut b = IdGenerator::seeded(42);
        for _ in 0..16 {
            assert_eq!(a.next_node_id(), b.next_node_id());
        }
        assert_ne!(IdGenerator::seeded(1).next_node_id(), IdGenerator::seeded(2).next_node_id());
    }

    #[test]
    fn test_pin_local_bytes_round_trip() {
        let node = NodeId::from_bytes([0xAB; NODE_ID_LEN]);
        for side in [PinSide::Input, PinSide::Output] {
            for index in 0..=u16::MAX {
                let pin = PinId::new(node, side, index);
                let back = PinId::from_local_bytes(node, &pin.local_bytes()).unwrap();
                assert_eq!(back.side(), side);
                assert_eq!(back.index(), index);
                assert_eq!(back.node(), node);
            }
        }
    }

    #[test]
    fn test_local_bytes_are_big_endian() {
        let pin = PinId::input(NodeId::from_bytes([0; NODE_ID_LEN]), 0x0102);
        assert_eq!(pin.local_bytes(), [0, 0x01, 0x02]);
    }

    #[test]
    fn test_rejects_bad_bytes() {
        assert_eq!(
            NodeId::from_slice(&[1, 2, 3]),
            Err(IdParseError::Length { expected: NODE_ID_LEN, found: 3 })
        );
        let node = NodeId::from_bytes([0; NODE_ID_LEN]);
        assert_eq!(PinId::from_local_bytes(node, &[2, 0, 0]), Err(IdParseError::Side(2)));
        assert!(PinId::from_local_bytes(node, &[0, 0]).is_err());
    }

    #[test]
    fn test_text_form() {
        let node = NodeId::from_bytes([0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF]);
        assert_eq!(node.to_string(), "0123456789ABCDEF");
        assert_eq!("0123456789abcdef".parse::<NodeId>().unwrap(), node);

        let pin = PinId::output(node, 2);
        assert_eq!(pin.to_string(), "0123456789ABCDEF:010002");
        assert_eq!(pin.to_string().parse::<PinId>().unwrap(), pin);

        assert!("xyz".parse::<NodeId>().is_err());
        assert!("0123456789ABCDEF".parse::<PinId>().is_err());
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Binary project format.
//!
//! # Layout
//!
//! All numbers are little-endian.
//!
//! ```text
//! magic      7 bytes  "COMLINK"
//! version    i32      1
//! flags      u8       HAS_GRAPH
//! node count i32
//! node       kind u32, node id, x f32, y f32, color u32, name
//!            input count i32, pins
//!            output count i32, pins
//!            connection count i32, connections
//! pin        kind u8 (0 flow, 1 typed), pin id, color u32, name, [typed] type tag
//! connection name, source pin id, destination pin id
//! node id    i32 length (8) + bytes
//! pin id     node id + i32 length (3) + side byte + big-endian u16 index
//! string     7-bit varint byte length + UTF-8
//! ```
//!
//! Typed pin colors are written for other readers but ignored on load; they
//! are always derived from the type tag.

use crate::connection::Connection;
use crate::graph::{ConnectionPolicy, Graph};
use crate::id::{NodeId, PinId, PinSide, NODE_ID_LEN, PIN_LOCAL_ID_LEN};
use crate::node::{Node, NodeKind};
use crate::pin::Pin;
use std::io::{self, Read, Write};

/// File signature
pub const MAGIC: &[u8; 7] = b"COMLINK";
/// Only format version written and accepted
pub const FORMAT_VERSION: i32 = 1;
/// Flag: a graph section follows the header
pub const FLAG_HAS_GRAPH: u8 = 0b01;
/// Flag: a history section follows the graph (reserved, never written)
pub const FLAG_HAS_HISTORY: u8 = 0b10;

const PIN_KIND_FLOW: u8 = 0;
const PIN_KIND_TYPED: u8 = 1;

/// Largest element count accepted for any list
const MAX_COUNT: usize = 1 << 20;
/// Largest string accepted, in bytes
const MAX_STRING_LEN: usize = 16 << 20;

/// Error reading or writing a project file
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Underlying reader or writer failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The data does not start with the file signature
    #[error("Not a Comlink project: bad magic")]
    BadMagic,

    /// Version other than [`FORMAT_VERSION`]
    #[error("Unsupported format version: {0}")]
    UnsupportedVersion(i32),

    /// Flags other than [`FLAG_HAS_GRAPH`]
    #[error("Unsupported flags: {0:#010b}")]
    UnsupportedFlags(u8),

    /// Data ended in the middle of a value
    #[error("Unexpected end of data")]
    Truncated,

    /// A value is out of range or malformed
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl CodecError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidData(message.into())
    }
}

/// Write a graph as a complete project file
pub fn write_graph<W: Write>(writer: W, graph: &Graph) -> Result<(), CodecError> {
    let mut out = Encoder { inner: writer };
    out.bytes(MAGIC)?;
    out.i32(FORMAT_VERSION)?;
    out.u8(FLAG_HAS_GRAPH)?;

    out.count(graph.node_count())?;
    for node in graph.nodes() {
        out.node(node)?;
    }
    out.inner.flush()?;
    Ok(())
}

/// Read a project file. Nothing is returned unless the whole graph decodes.
pub fn read_graph<R: Read>(reader: R, policy: ConnectionPolicy) -> Result<Graph, CodecError> {
    let mut input = Decoder { inner: reader };

    let mut magic = [0u8; 7];
    input.fill(&mut magic).map_err(|err| match err {
        CodecError::Truncated => CodecError::BadMagic,
        other => other,
    })?;
    if &magic != MAGIC {
        return Err(CodecError::BadMagic);
    }
    let version = input.i32()?;
    if version != FORMAT_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }
    let flags = input.u8()?;
    if flags != FLAG_HAS_GRAPH {
        return Err(CodecError::UnsupportedFlags(flags));
    }

    let count = input.count()?;
    let mut nodes = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        nodes.push(input.node()?);
    }
    Graph::from_nodes(nodes, policy).map_err(|err| CodecError::invalid(err.to_string()))
}

/// Encode a graph into a byte vector
pub fn encode(graph: &Graph) -> Result<Vec<u8>, CodecError> {
    let mut bytes = Vec::new();
    write_graph(&mut bytes, graph)?;
    Ok(bytes)
}

/// Decode a complete project from bytes; trailing bytes are an error
pub fn decode(mut bytes: &[u8], policy: ConnectionPolicy) -> Result<Graph, CodecError> {
    let graph = read_graph(&mut bytes, policy)?;
    if !bytes.is_empty() {
        return Err(CodecError::invalid(format!("{} trailing bytes", bytes.len())));
    }
    Ok(graph)
}

struct Encoder<W> {
    inner: W,
}

impl<W: Write> Encoder<W> {
    fn bytes(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        self.inner.write_all(bytes)?;
        Ok(())
    }

    fn u8(&mut self, value: u8) -> Result<(), CodecError> {
        self.bytes(&[value])
    }

    fn i32(&mut self, value: i32) -> Result<(), CodecError> {
        self.bytes(&value.to_le_bytes())
    }

    fn u32(&mut self, value: u32) -> Result<(), CodecError> {
        self.bytes(&value.to_le_bytes())
    }

    fn f32(&mut self, value: f32) -> Result<(), CodecError> {
        self.bytes(&value.to_le_bytes())
    }

    fn count(&mut self, len: usize) -> Result<(), CodecError> {
        let len = i32::try_from(len).map_err(|_| CodecError::invalid(format!("Count {len} too large")))?;
        self.i32(len)
    }

    fn string(&mut self, value: &str) -> Result<(), CodecError> {
        let mut len = u32::try_from(value.len())
            .ok()
            .filter(|&len| len <= i32::MAX as u32)
            .ok_or_else(|| CodecError::invalid("String too long"))?;
        while len >= 0x80 {
            self.u8((len & 0x7F) as u8 | 0x80)?;
            len >>= 7;
        }
        self.u8(len as u8)?;
        self.bytes(value.as_bytes())
    }

    fn node_id(&mut self, id: NodeId) -> Result<(), CodecError> {
        self.count(NODE_ID_LEN)?;
        self.bytes(id.as_bytes())
    }

    fn pin_id(&mut self, id: PinId) -> Result<(), CodecError> {
        self.node_id(id.node())?;
        self.count(PIN_LOCAL_ID_LEN)?;
        self.bytes(&id.local_bytes())
    }

    fn pin(&mut self, pin: &Pin) -> Result<(), CodecError> {
        self.u8(if pin.kind().is_typed() { PIN_KIND_TYPED } else { PIN_KIND_FLOW })?;
        self.pin_id(pin.id())?;
        self.u32(pin.color())?;
        self.string(pin.name())?;
        if let Some(type_tag) = pin.type_tag() {
            self.string(type_tag)?;
        }
        Ok(())
    }

    fn node(&mut self, node: &Node) -> Result<(), CodecError> {
        self.u32(node.kind.code())?;
        self.node_id(node.id)?;
        self.f32(node.position[0])?;
        self.f32(node.position[1])?;
        self.u32(node.color)?;
        self.string(&node.name)?;

        for pins in [&node.inputs, &node.outputs] {
            self.count(pins.len())?;
            for pin in pins {
                self.pin(pin)?;
            }
        }

        self.count(node.connections.len())?;
        for connection in &node.connections {
            self.string(&connection.name)?;
            self.pin_id(connection.source)?;
            self.pin_id(connection.destination)?;
        }
        Ok(())
    }
}

struct Decoder<R> {
    inner: R,
}

impl<R: Read> Decoder<R> {
    fn fill(&mut self, buf: &mut [u8]) -> Result<(), CodecError> {
        self.inner.read_exact(buf).map_err(|err| match err.kind() {
            io::ErrorKind::UnexpectedEof => CodecError::Truncated,
            _ => CodecError::Io(err),
        })
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut buf = [0u8; N];
        self.fill(&mut buf)?;
        Ok(buf)
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.array::<1>()?[0])
    }

    fn i32(&mut self) -> Result<i32, CodecError> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn f32(&mut self) -> Result<f32, CodecError> {
        Ok(f32::from_le_bytes(self.array()?))
    }

    fn count(&mut self) -> Result<usize, CodecError> {
        let count = self.i32()?;
        usize::try_from(count)
            .ok()
            .filter(|&count| count <= MAX_COUNT)
            .ok_or_else(|| CodecError::invalid(format!("Count out of range: {count}")))
    }

    fn string(&mut self) -> Result<String, CodecError> {
        let mut len: u32 = 0;
        let mut shift = 0;
        loop {
            let byte = self.u8()?;
            if shift == 28 && byte > 0x0F {
                return Err(CodecError::invalid("String length prefix overflows"));
            }
            len |= u32::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }

        let len = usize::try_from(len)
            .ok()
            .filter(|&len| len <= MAX_STRING_LEN)
            .ok_or_else(|| CodecError::invalid(format!("String length out of range: {len}")))?;
        let mut buf = Vec::new();
        (&mut self.inner).take(len as u64).read_to_end(&mut buf)?;
        if buf.len() != len {
            return Err(CodecError::Truncated);
        }
        String::from_utf8(buf).map_err(|err| CodecError::invalid(format!("String is not UTF-8: {err}")))
    }

    fn expect_len(&mut self, expected: usize, what: &str) -> Result<(), CodecError> {
        let len = self.i32()?;
        if usize::try_from(len).ok() != Some(expected) {
            return Err(CodecError::invalid(format!("{what} length {len}, expected {expected}")));
        }
        Ok(())
    }

    fn node_id(&mut self) -> Result<NodeId, CodecError> {
        self.expect_len(NODE_ID_LEN, "Node id")?;
        Ok(NodeId::from_bytes(self.array()?))
    }

    fn pin_id(&mut self) -> Result<PinId, CodecError> {
        let node = self.node_id()?;
        self.expect_len(PIN_LOCAL_ID_LEN, "Pin id")?;
        let local: [u8; PIN_LOCAL_ID_LEN] = self.array()?;
        PinId::from_local_bytes(node, &local).map_err(|err| CodecError::invalid(err.to_string()))
    }

    fn pin(&mut self, node: NodeId, side: PinSide, index: usize) -> Result<Pin, CodecError> {
        let kind = self.u8()?;
        let id = self.pin_id()?;
        let color = self.u32()?;
        let name = self.string()?;

        if id.node() != node || id.side() != side || usize::from(id.index()) != index {
            return Err(CodecError::invalid(format!(
                "Pin {id} stored as {side:?} {index} of node {node}"
            )));
        }

        match (kind, side) {
            (PIN_KIND_FLOW, PinSide::Input) => Ok(Pin::flow_input(id, name).with_color(color)),
            (PIN_KIND_FLOW, PinSide::Output) => Ok(Pin::flow_output(id, name).with_color(color)),
            (PIN_KIND_TYPED, PinSide::Input) => Ok(Pin::typed_input(id, name, self.string()?)),
            (PIN_KIND_TYPED, PinSide::Output) => Ok(Pin::typed_output(id, name, self.string()?)),
            (other, _) => Err(CodecError::invalid(format!("Unknown pin kind: {other}"))),
        }
    }

    fn node(&mut self) -> Result<Node, CodecError> {
        let code = self.u32()?;
        let kind = NodeKind::try_from(code).map_err(|err| CodecError::invalid(err.to_string()))?;
        let id = self.node_id()?;
        let x = self.f32()?;
        let y = self.f32()?;
        let color = self.u32()?;
        let name = self.string()?;
        let mut node = Node::new(id, kind, name).with_position(x, y).with_color(color);

        for side in [PinSide::Input, PinSide::Output] {
            let count = self.count()?;
            let mut pins = Vec::with_capacity(count.min(64));
            for index in 0..count {
                pins.push(self.pin(id, side, index)?);
            }
            match side {
                PinSide::Input => node.inputs = pins,
                PinSide::Output => node.outputs = pins,
            }
        }

        let count = self.count()?;
        for _ in 0..count {
            let name = self.string()?;
            let source = self.pin_id()?;
            let destination = self.pin_id()?;
            node.connections.push(Connection::new(source, destination).with_name(name));
        }
        Ok(node)
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Dialogue node graph for `Comlink`.
//!
//! ## Architecture
//!
//! - [`Graph`] owns [`Node`]s in insertion order; each node owns its pins and
//!   the [`Connection`]s leaving its outputs.
//! - The graph's connection engine enforces pin compatibility, at most one
//!   connection per flow output and at most one per typed input.
//! - Every edit is a [`GraphCommand`] run through a
//!   [`comlink_history::CommandStack`], so it can be undone and redone.
//! - [`codec`] reads and writes the binary project file; [`Project`] ties a
//!   graph, its history and its file together.

pub mod codec;
pub mod command;
pub mod connection;
pub mod dialogue;
pub mod graph;
pub mod id;
pub mod node;
pub mod pin;
pub mod project;
pub mod settings;

#[cfg(test)]
mod testing;

pub use codec::CodecError;
pub use command::{CommandError, GraphCommand};
pub use connection::Connection;
pub use graph::{ConnectionError, ConnectionPolicy, Graph, GraphError, InvariantViolation};
pub use id::{IdGenerator, NodeId, PinId, PinSide};
pub use node::{Node, NodeCategory, NodeKind, MAX_PINS_PER_SIDE};
pub use pin::{type_color, Pin, PinKind};
pub use project::{Project, ProjectError};
pub use settings::{EditorSettings, SettingsError};

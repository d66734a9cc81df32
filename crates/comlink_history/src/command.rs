// SPDX-License-Identifier: MIT OR Apache-2.0
//! The reversible command abstraction.

/// A reversible unit of mutation over a subject of type `T`.
///
/// `revert` must leave the subject observably identical to its state before
/// the matching `apply`. Both take `&mut self` so a command can capture the
/// state it overwrites while applying, and hand it back while reverting.
pub trait Command<T> {
    /// Error raised when the command cannot run against the subject
    type Error: std::error::Error;

    /// Get a description of this command
    fn description(&self) -> &str;

    /// Apply the command to the subject
    fn apply(&mut self, subject: &mut T) -> Result<(), Self::Error>;

    /// Undo a previous `apply` on the same subject
    fn revert(&mut self, subject: &mut T) -> Result<(), Self::Error>;
}

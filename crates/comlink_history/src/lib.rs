// SPDX-License-Identifier: MIT OR Apache-2.0
//! Reversible command log for `Comlink`.
//!
//! A [`CommandStack`] owns a single subject and two stacks of commands. Every
//! mutation of the subject goes through [`CommandStack::apply_command`], which
//! runs the command and records it so it can be reverted later. History is
//! linear: applying a new command after an undo discards the redo branch.

pub mod command;
pub mod stack;

pub use command::Command;
pub use stack::{CommandStack, StackConfig};

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Two-stack undo/redo log over a single owned subject.

use crate::command::Command;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// History limits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackConfig {
    /// Maximum number of undoable commands kept; `None` keeps everything
    #[serde(default)]
    pub max_depth: Option<usize>,
}

/// Undo/redo log owning the subject it mutates
#[derive(Debug)]
pub struct CommandStack<T, C> {
    /// The single subject every command runs against
    subject: T,
    /// Applied commands, newest at the back
    undo_stack: VecDeque<C>,
    /// Reverted commands, newest at the back
    redo_stack: Vec<C>,
    /// History limits
    config: StackConfig,
}

impl<T, C> CommandStack<T, C>
where
    C: Command<T>,
{
    /// Create an empty history over a subject
    pub fn new(subject: T) -> Self {
        Self::with_config(subject, StackConfig::default())
    }

    /// Create with custom history limits
    pub fn with_config(subject: T, config: StackConfig) -> Self {
        Self {
            subject,
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            config,
        }
    }

    /// Apply a command and record it for undo.
    ///
    /// On failure nothing is recorded and the redo branch is kept.
    pub fn apply_command(&mut self, mut command: C) -> Result<(), C::Error> {
        command.apply(&mut self.subject)?;
        tracing::debug!("Applied command: {}", command.description());

        self.redo_stack.clear();
        self.undo_stack.push_back(command);

        if let Some(max_depth) = self.config.max_depth {
            while self.undo_stack.len() > max_depth {
                if let Some(old) = self.undo_stack.pop_front() {
                    tracing::debug!("History full, dropping: {}", old.description());
                }
            }
        }

        Ok(())
    }

    /// Revert the most recent command. Returns `Ok(false)` when there is nothing to undo.
    pub fn undo(&mut self) -> Result<bool, C::Error> {
        let Some(mut command) = self.undo_stack.pop_back() else {
            return Ok(false);
        };

        match command.revert(&mut self.subject) {
            Ok(()) => {
                tracing::debug!("Undo: {}", command.description());
                self.redo_stack.push(command);
                Ok(true)
            }
            Err(err) => {
                tracing::warn!("Undo of '{}' failed: {err}", command.description());
                self.undo_stack.push_back(command);
                Err(err)
            }
        }
    }

    /// Re-apply the most recently undone command. Returns `Ok(false)` when there is nothing to redo.
    pub fn redo(&mut self) -> Result<bool, C::Error> {
        let Some(mut command) = self.redo_stack.pop() else {
            return Ok(false);
        };

        match command.apply(&mut self.subject) {
            Ok(()) => {
                tracing::debug!("Redo: {}", command.description());
                self.undo_stack.push_back(command);
                Ok(true)
            }
            Err(err) => {
                tracing::warn!("Redo of '{}' failed: {err}", command.description());
                self.redo_stack.push(command);
                Err(err)
            }
        }
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Get undo stack depth
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Get redo stack depth
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Get description of next undo command
    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.back().map(|command| command.description())
    }

    /// Get description of next redo command
    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.last().map(|command| command.description())
    }

    /// Drop all history, keeping the subject as it is
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Swap in a new subject and start a fresh history
    pub fn replace_subject(&mut self, subject: T) -> T {
        self.clear();
        std::mem::replace(&mut self.subject, subject)
    }

    /// The subject commands run against
    pub fn subject(&self) -> &T {
        &self.subject
    }

    /// History limits in effect
    pub fn config(&self) -> StackConfig {
        self.config
    }

    /// Consume the stack, returning the subject
    pub fn into_subject(self) -> T {
        self.subject
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editor settings, stored as RON.

use crate::graph::{ConnectionPolicy, Graph};
use comlink_history::StackConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current settings format version
pub const SETTINGS_FORMAT_VERSION: u32 = 1;

/// Settings file name
pub const SETTINGS_FILE_NAME: &str = "comlink.ron";

/// Undo steps kept unless configured otherwise
pub const DEFAULT_HISTORY_DEPTH: usize = 100;

/// Error loading or saving settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// File could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid settings RON
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Settings could not be written as RON
    #[error("Serialize error: {0}")]
    Serialize(#[from] ron::Error),

    /// File written by a newer version
    #[error("Settings version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version in the file
        found: u32,
        /// Newest version this build reads
        supported: u32,
    },
}

/// Editor behavior settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSettings {
    /// Format version
    pub version: u32,
    /// What happens when a connection targets an occupied pin
    pub connection_policy: ConnectionPolicy,
    /// Undo history limits
    pub history: StackConfig,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_FORMAT_VERSION,
            connection_policy: ConnectionPolicy::default(),
            history: StackConfig {
                max_depth: Some(DEFAULT_HISTORY_DEPTH),
            },
        }
    }
}

impl EditorSettings {
    /// Load settings; a missing file gives the defaults
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No settings at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(err) => return Err(err.into()),
        };

        let settings: EditorSettings = ron::from_str(&content)?;
        if settings.version > SETTINGS_FORMAT_VERSION {
            return Err(SettingsError::UnsupportedVersion {
                found: settings.version,
                supported: SETTINGS_FORMAT_VERSION,
            });
        }
        Ok(settings)
    }

    /// Save settings
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        std::fs::write(path, to_ron_string(self)?)?;
        Ok(())
    }
}

/// Pretty RON text of any serializable value
pub fn to_ron_string<T: Serialize>(value: &T) -> Result<String, ron::Error> {
    let config = ron::ser::PrettyConfig::default()
        .struct_names(true)
        .enumerate_arrays(false);
    ron::ser::to_string_pretty(value, config)
}

/// Pretty RON dump of a graph, for inspection
pub fn graph_to_ron(graph: &Graph) -> Result<String, ron::Error> {
    to_ron_string(graph)
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Open dialogue project: a graph, its edit history and where it lives on disk.

use crate::codec::{self, CodecError};
use crate::command::{CommandError, GraphCommand};
use crate::dialogue;
use crate::graph::Graph;
use crate::id::{IdGenerator, NodeId};
use crate::node::NodeKind;
use crate::settings::EditorSettings;
use comlink_history::CommandStack;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// Project file extension
pub const PROJECT_FILE_EXTENSION: &str = "comlink";

/// Error opening, editing or saving a project
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    /// File could not be opened, written or renamed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File contents are not a valid project
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// An edit was refused
    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    /// Save requested before the project has a file
    #[error("Project has no file path; use save_as")]
    NoPath,
}

/// A graph being edited
pub struct Project {
    /// Graph and its undo/redo history
    history: CommandStack<Graph, GraphCommand>,
    /// File the project was loaded from or last saved to
    path: Option<PathBuf>,
    /// Source of ids for new nodes
    ids: IdGenerator,
    /// Whether the graph changed since the last load or save
    dirty: bool,
}

impl Project {
    /// Create an unsaved, empty project
    pub fn new_empty(settings: &EditorSettings) -> Self {
        Self::with_graph(Graph::with_policy(settings.connection_policy), None, settings)
    }

    fn with_graph(graph: Graph, path: Option<PathBuf>, settings: &EditorSettings) -> Self {
        Self {
            history: CommandStack::with_config(graph, settings.history),
            path,
            ids: IdGenerator::default(),
            dirty: false,
        }
    }

    /// Open a project file. Invariant violations in the file are logged, not fatal.
    pub fn load(path: &Path, settings: &EditorSettings) -> Result<Self, ProjectError> {
        let file = File::open(path)?;
        let graph = codec::read_graph(BufReader::new(file), settings.connection_policy)?;

        for violation in graph.validate() {
            tracing::warn!("{}: {violation}", path.display());
        }
        tracing::info!(
            "Opened project {} ({} nodes, {} connections)",
            path.display(),
            graph.node_count(),
            graph.connection_count()
        );
        Ok(Self::with_graph(graph, Some(path.to_path_buf()), settings))
    }

    /// Save to the current file
    pub fn save(&mut self) -> Result<(), ProjectError> {
        let path = self.path.clone().ok_or(ProjectError::NoPath)?;
        self.save_as(&path)
    }

    /// Save to `path` and make it the current file.
    ///
    /// Writes a sibling temporary file first and renames it over `path`, so a
    /// failed save leaves any existing file untouched.
    pub fn save_as(&mut self, path: &Path) -> Result<(), ProjectError> {
        let temp_path = temp_path_for(path);
        let written = File::create(&temp_path)
            .map_err(ProjectError::from)
            .and_then(|file| {
                let mut writer = BufWriter::new(file);
                codec::write_graph(&mut writer, self.graph())?;
                writer.into_inner().map_err(|err| err.into_error())?.sync_all()?;
                Ok(())
            })
            .and_then(|()| std::fs::rename(&temp_path, path).map_err(ProjectError::from));

        if let Err(err) = written {
            if let Err(cleanup) = std::fs::remove_file(&temp_path) {
                tracing::debug!("Could not remove {}: {cleanup}", temp_path.display());
            }
            return Err(err);
        }

        self.path = Some(path.to_path_buf());
        self.dirty = false;
        tracing::info!("Saved project to {}", path.display());
        Ok(())
    }

    /// The graph
    pub fn graph(&self) -> &Graph {
        self.history.subject()
    }

    /// Edit history
    pub fn history(&self) -> &CommandStack<Graph, GraphCommand> {
        &self.history
    }

    /// Current file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether there are changes since the last load or save
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Id source for building new nodes
    pub fn ids_mut(&mut self) -> &mut IdGenerator {
        &mut self.ids
    }

    /// Apply an edit and record it for undo
    pub fn apply(&mut self, command: GraphCommand) -> Result<(), ProjectError> {
        self.history.apply_command(command)?;
        self.dirty = true;
        Ok(())
    }

    /// Undo the last edit; `false` if there was none
    pub fn undo(&mut self) -> Result<bool, ProjectError> {
        let undone = self.history.undo()?;
        self.dirty |= undone;
        Ok(undone)
    }

    /// Redo the last undone edit; `false` if there was none
    pub fn redo(&mut self) -> Result<bool, ProjectError> {
        let redone = self.history.redo()?;
        self.dirty |= redone;
        Ok(redone)
    }

    /// Add a default node of `kind` at a position
    pub fn add_node(&mut self, kind: NodeKind, x: f32, y: f32) -> Result<NodeId, ProjectError> {
        let node = dialogue::create(kind, &mut self.ids).with_position(x, y);
        let node_id = node.id;
        self.apply(GraphCommand::create_node(node))?;
        Ok(node_id)
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(std::ffi::OsStr::to_os_string).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ConnectionPolicy;
    use crate::id::PinId;
    use comlink_history::StackConfig;

    fn project_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join(format!("conversation.{PROJECT_FILE_EXTENSION}"))
    }

    fn wired_project() -> (Project, NodeId, NodeId) {
        let mut project = Project::new_empty(&EditorSettings::default());
        let start = project.add_node(NodeKind::Interact, 0.0, 0.0).unwrap();
        let end = project.add_node(NodeKind::Exit, 200.0, 0.0).unwrap();
        project
            .apply(GraphCommand::create_connection(PinId::output(start, 0), PinId::input(end, 0)))
            .unwrap();
        (project, start, end)
    }

    #[test]
    fn test_new_empty_project() {
        let project = Project::new_empty(&EditorSettings::default());
        assert!(project.graph().is_empty());
        assert!(project.path().is_none());
        assert!(!project.is_dirty());
        assert!(!project.history().can_undo());
    }

    #[test]
    fn test_save_requires_path() {
        let mut project = Project::new_empty(&EditorSettings::default());
        assert!(matches!(project.save(), Err(ProjectError::NoPath)));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = project_path(&dir);
        let (mut project, _, _) = wired_project();
        assert!(project.is_dirty());

        project.save_as(&path).unwrap();
        assert!(!project.is_dirty());
        assert_eq!(project.path(), Some(path.as_path()));
        assert!(!temp_path_for(&path).exists());

        let loaded = Project::load(&path, &EditorSettings::default()).unwrap();
        assert_eq!(loaded.graph(), project.graph());
        assert!(!loaded.is_dirty());
        assert!(!loaded.history().can_undo());
    }

    #[test]
    fn test_dirty_tracking() {
        let dir = tempfile::tempdir().unwrap();
        let (mut project, _, _) = wired_project();
        project.save_as(&project_path(&dir)).unwrap();

        assert!(project.undo().unwrap());
        assert!(project.is_dirty());
        project.save().unwrap();
        assert!(!project.is_dirty());

        // Nothing to redo after a save does not make the project dirty
        assert!(project.redo().unwrap());
        project.save().unwrap();
        assert!(!project.redo().unwrap());
        assert!(!project.is_dirty());
    }

    #[test]
    fn test_failed_load_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = project_path(&dir);
        std::fs::write(&path, b"NOTCOMLINK").unwrap();
        assert!(matches!(
            Project::load(&path, &EditorSettings::default()),
            Err(ProjectError::Codec(CodecError::BadMagic))
        ));
        assert!(matches!(
            Project::load(&dir.path().join("missing.comlink"), &EditorSettings::default()),
            Err(ProjectError::Io(_))
        ));
    }

    #[test]
    fn test_failed_save_keeps_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = project_path(&dir);
        let (mut project, _, _) = wired_project();
        project.save_as(&path).unwrap();
        let saved = std::fs::read(&path).unwrap();

        let unwritable = dir.path().join("no-such-dir").join("x.comlink");
        assert!(matches!(project.save_as(&unwritable), Err(ProjectError::Io(_))));
        assert_eq!(project.path(), Some(path.as_path()));
        assert_eq!(std::fs::read(&path).unwrap(), saved);
    }

    #[test]
    fn test_settings_flow_into_project() {
        let settings = EditorSettings {
            connection_policy: ConnectionPolicy::Replace,
            history: StackConfig { max_depth: Some(2) },
            ..Default::default()
        };
        let mut project = Project::new_empty(&settings);
        let start = project.add_node(NodeKind::Interact, 0.0, 0.0).unwrap();
        let a = project.add_node(NodeKind::Exit, 0.0, 0.0).unwrap();
        let b = project.add_node(NodeKind::Exit, 0.0, 0.0).unwrap();
        assert_eq!(project.history().undo_depth(), 2);

        let out = PinId::output(start, 0);
        project.apply(GraphCommand::create_connection(out, PinId::input(a, 0))).unwrap();
        project.apply(GraphCommand::create_connection(out, PinId::input(b, 0))).unwrap();
        let graph = project.graph();
        assert_eq!(graph.policy(), ConnectionPolicy::Replace);
        assert_eq!(graph.connections_from(out).count(), 1);
        assert_eq!(graph.connections_from(out).next().unwrap().destination, PinId::input(b, 0));
    }

    #[test]
    fn test_rejected_edit_is_not_recorded() {
        let (mut project, start, _) = wired_project();
        let other = project.add_node(NodeKind::Exit, 0.0, 0.0).unwrap();
        let depth = project.history().undo_depth();

        let result = project.apply(GraphCommand::create_connection(PinId::output(start, 0), PinId::input(other, 0)));
        assert!(matches!(result, Err(ProjectError::Command(CommandError::Connection(_)))));
        assert_eq!(project.history().undo_depth(), depth);
    }
}

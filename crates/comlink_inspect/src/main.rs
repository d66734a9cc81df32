// SPDX-License-Identifier: MIT OR Apache-2.0
//! `Comlink` project inspector.
//!
//! Loads a dialogue project, logs a summary of its graph and any broken
//! invariants, and optionally dumps the graph as RON. Can also write a small
//! sample conversation to start from.
//!
//! ```bash
//! comlink-inspect show conversation.comlink --ron
//! comlink-inspect sample conversation.comlink
//! ```

use clap::{Parser, Subcommand};
use comlink_graph::dialogue::{self, DialogueOption};
use comlink_graph::settings::{self, SETTINGS_FILE_NAME};
use comlink_graph::{EditorSettings, GraphCommand, NodeKind, PinId, Project};
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Log filter used when `RUST_LOG` is unset
const DEFAULT_LOG_DIRECTIVES: &str = "comlink_inspect=debug,comlink_graph=debug,comlink_history=debug";

#[derive(Parser)]
#[command(name = "comlink-inspect")]
#[command(about = "Inspect Comlink dialogue projects", long_about = None)]
struct Cli {
    /// Editor settings file
    #[arg(long, global = true, default_value = SETTINGS_FILE_NAME)]
    settings: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a project file
    Show {
        /// Project file
        file: PathBuf,

        /// Print the whole graph as RON
        #[arg(long)]
        ron: bool,
    },

    /// Write a sample conversation
    Sample {
        /// Output project file
        out: PathBuf,
    },
}

fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_DIRECTIVES));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let settings = EditorSettings::load(&cli.settings)?;
    match cli.command {
        Commands::Show { file, ron } => show(&file, &settings, ron),
        Commands::Sample { out } => sample(&out, &settings),
    }
}

fn show(path: &Path, settings: &EditorSettings, ron: bool) -> Result<(), Box<dyn std::error::Error>> {
    let project = Project::load(path, settings)?;
    let graph = project.graph();

    for node in graph.nodes() {
        tracing::info!(
            "{} {:?} \"{}\" at ({}, {}): {} in, {} out, {} connections",
            node.id,
            node.kind,
            node.name,
            node.position[0],
            node.position[1],
            node.inputs.len(),
            node.outputs.len(),
            node.connections.len()
        );
    }

    let violations = graph.validate();
    if violations.is_empty() {
        tracing::info!("Graph is consistent");
    } else {
        tracing::warn!("{} invariant violations", violations.len());
    }

    if ron {
        println!("{}", settings::graph_to_ron(graph)?);
    }
    Ok(())
}

fn sample(path: &Path, settings: &EditorSettings) -> Result<(), Box<dyn std::error::Error>> {
    let mut project = Project::new_empty(settings);

    let start = project.add_node(NodeKind::Interact, 0.0, 0.0)?;
    let greeting = dialogue::npc_dialogue(project.ids_mut(), "Need a hand?").with_position(200.0, 0.0);
    let greeting_id = greeting.id;
    project.apply(GraphCommand::create_node(greeting))?;
    let choice = project.add_node(NodeKind::PlayerDialogue, 400.0, 0.0)?;
    let reward = dialogue::trigger_event(project.ids_mut(), "give_reward").with_position(600.0, -80.0);
    let reward_id = reward.id;
    project.apply(GraphCommand::create_node(reward))?;
    let end = project.add_node(NodeKind::Exit, 800.0, 0.0)?;

    let options = [DialogueOption::new("Yes, please"), DialogueOption::new("No, thanks")];
    let edit = dialogue::edit_player_options(project.graph(), choice, &options)?;
    project.apply(edit)?;

    for (from, to) in [
        (PinId::output(start, 0), PinId::input(greeting_id, 0)),
        (PinId::output(greeting_id, 0), PinId::input(choice, 0)),
        (PinId::output(choice, 0), PinId::input(reward_id, 0)),
        (PinId::output(reward_id, 0), PinId::input(end, 0)),
        (PinId::output(choice, 1), PinId::input(end, 0)),
    ] {
        project.apply(GraphCommand::create_connection(from, to))?;
    }

    project.save_as(path)?;
    tracing::info!(
        "Wrote {} nodes and {} connections",
        project.graph().node_count(),
        project.graph().connection_count()
    );
    Ok(())
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Dialogue node catalogue.
//!
//! Builds each [`NodeKind`] with its default name, color and pins, and edits
//! the option list of player dialogue nodes.

use crate::command::{CommandError, GraphCommand};
use crate::connection::Connection;
use crate::graph::Graph;
use crate::id::{IdGenerator, NodeId, PinId, PinSide};
use crate::node::{Node, NodeKind};
use crate::pin::{type_color, Pin};

/// Type tag of the condition pin on branch nodes
pub const BRANCH_CONDITION_TYPE: &str = "Z";
/// Type tag of the condition pin on player dialogue nodes
pub const BOOL_TYPE: &str = "Bool";
/// Label given to a newly added player option
pub const DEFAULT_OPTION_TEXT: &str = "Dialogue Option";

const INTERACT_COLOR: u32 = 0xFF32_CD32;
const EXIT_COLOR: u32 = 0xFFCD_5C5C;
const BRANCH_COLOR: u32 = 0xFFFF_8C00;
const PLAYER_DIALOGUE_COLOR: u32 = 0xFFFF_8C00;
const NPC_DIALOGUE_COLOR: u32 = 0xFF93_70DB;
const TRIGGER_EVENT_COLOR: u32 = 0xFFBD_B76B;

fn flow_in(node: &mut Node) {
    node.push_pin(PinSide::Input, |id| Pin::flow_input(id, ""));
}

fn flow_out(node: &mut Node, name: &str) {
    node.push_pin(PinSide::Output, |id| Pin::flow_output(id, name));
}

/// Conversation entry point
pub fn interact(ids: &mut IdGenerator) -> Node {
    let mut node = Node::new(ids.next_node_id(), NodeKind::Interact, "Interact").with_color(INTERACT_COLOR);
    flow_out(&mut node, "");
    node
}

/// Conversation end
pub fn exit(ids: &mut IdGenerator) -> Node {
    let mut node = Node::new(ids.next_node_id(), NodeKind::Exit, "Exit").with_color(EXIT_COLOR);
    flow_in(&mut node);
    node
}

/// Two-way branch on a condition
pub fn branch(ids: &mut IdGenerator) -> Node {
    let mut node = Node::new(ids.next_node_id(), NodeKind::Branch, "Branch").with_color(BRANCH_COLOR);
    flow_in(&mut node);
    node.push_pin(PinSide::Input, |id| {
        Pin::typed_input(id, "Condition", BRANCH_CONDITION_TYPE)
    });
    flow_out(&mut node, "True");
    flow_out(&mut node, "False");
    node
}

/// Player choice, starting with two options
pub fn player_dialogue(ids: &mut IdGenerator) -> Node {
    let mut node = Node::new(ids.next_node_id(), NodeKind::PlayerDialogue, "Player Dialogue")
        .with_color(PLAYER_DIALOGUE_COLOR);
    flow_in(&mut node);
    node.push_pin(PinSide::Input, |id| Pin::typed_input(id, "Condition", BOOL_TYPE));
    flow_out(&mut node, "True");
    flow_out(&mut node, "False");
    node
}

/// Line spoken by a character; the single output carries the text
pub fn npc_dialogue(ids: &mut IdGenerator, text: &str) -> Node {
    let mut node =
        Node::new(ids.next_node_id(), NodeKind::NpcDialogue, "NPC Dialogue").with_color(NPC_DIALOGUE_COLOR);
    flow_in(&mut node);
    flow_out(&mut node, text);
    node
}

/// Read a host variable
pub fn variable_get(ids: &mut IdGenerator, variable: &str, type_tag: &str) -> Node {
    let mut node =
        Node::new(ids.next_node_id(), NodeKind::VariableGet, "Read Variable").with_color(type_color(type_tag));
    node.push_pin(PinSide::Output, |id| Pin::typed_output(id, variable, type_tag));
    node
}

/// Write a host variable
pub fn variable_set(ids: &mut IdGenerator, variable: &str, type_tag: &str) -> Node {
    let name = format!("Set Variable - {type_tag}");
    let mut node = Node::new(ids.next_node_id(), NodeKind::VariableSet, name).with_color(type_color(type_tag));
    flow_in(&mut node);
    node.push_pin(PinSide::Input, |id| Pin::typed_input(id, variable, type_tag));
    flow_out(&mut node, "");
    node
}

/// Literal value; the output pin is named by the serialized value
pub fn constant_read(ids: &mut IdGenerator, value: &str, type_tag: &str) -> Node {
    let mut node =
        Node::new(ids.next_node_id(), NodeKind::ConstantRead, "Constant").with_color(type_color(type_tag));
    node.push_pin(PinSide::Output, |id| Pin::typed_output(id, value, type_tag));
    node
}

/// Fire a host event; the output pin is named by the event
pub fn trigger_event(ids: &mut IdGenerator, event: &str) -> Node {
    let mut node =
        Node::new(ids.next_node_id(), NodeKind::TriggerEvent, "Trigger Event").with_color(TRIGGER_EVENT_COLOR);
    flow_in(&mut node);
    flow_out(&mut node, event);
    node
}

/// Default node of a kind, as the editor's "add node" menu creates it
pub fn create(kind: NodeKind, ids: &mut IdGenerator) -> Node {
    match kind {
        NodeKind::Interact => interact(ids),
        NodeKind::Exit => exit(ids),
        NodeKind::Branch => branch(ids),
        NodeKind::PlayerDialogue => player_dialogue(ids),
        NodeKind::NpcDialogue => npc_dialogue(ids, ""),
        NodeKind::VariableGet => variable_get(ids, "variable", BOOL_TYPE),
        NodeKind::VariableSet => variable_set(ids, "variable", BOOL_TYPE),
        NodeKind::ConstantRead => constant_read(ids, "false", BOOL_TYPE),
        NodeKind::TriggerEvent => trigger_event(ids, "event"),
    }
}

/// One entry in a player dialogue option list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogueOption {
    /// Output index this option had before editing; `None` for a new option
    pub origin: Option<u16>,
    /// Label shown to the player
    pub text: String,
}

impl DialogueOption {
    /// A newly added option
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            origin: None,
            text: text.into(),
        }
    }
}

/// Current options of a player dialogue node, keyed by their output index
pub fn dialogue_options(node: &Node) -> Vec<DialogueOption> {
    node.outputs
        .iter()
        .map(|pin| DialogueOption {
            origin: Some(pin.id().index()),
            text: pin.name().to_string(),
        })
        .collect()
}

/// Build the command that gives a player dialogue node a new option list.
///
/// Options are renumbered in list order. Connections leaving an option that
/// survives (matched by `origin`) follow it to its new index; connections of
/// dropped options are removed.
pub fn edit_player_options(
    graph: &Graph,
    node_id: NodeId,
    options: &[DialogueOption],
) -> Result<GraphCommand, CommandError> {
    let node = graph.node(node_id).ok_or(CommandError::NodeNotFound(node_id))?;
    if node.kind != NodeKind::PlayerDialogue {
        return Err(CommandError::InvalidOperation(format!(
            "Node {node_id} is a {:?}, not a player dialogue",
            node.kind
        )));
    }

    let mut outputs = Vec::with_capacity(options.len());
    let mut connections = Vec::new();
    for (index, option) in options.iter().enumerate() {
        let index = u16::try_from(index)
            .map_err(|_| CommandError::InvalidOperation(format!("Too many options: {}", options.len())))?;
        let pin = PinId::output(node_id, index);
        outputs.push(Pin::flow_output(pin, option.text.as_str()));

        let Some(origin) = option.origin else {
            continue;
        };
        connections.extend(
            node.connections
                .iter()
                .filter(|c| c.source == PinId::output(node_id, origin))
                .map(|c| Connection::new(pin, c.destination).with_name(c.name.as_str())),
        );
    }

    tracing::debug!(
        "Editing options of {node_id}: {} -> {} outputs, {} connections kept",
        node.outputs.len(),
        outputs.len(),
        connections.len()
    );
    Ok(GraphCommand::set_outputs_and_connections(node_id, outputs, connections))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pin::PinKind;
    use comlink_history::Command;

    #[test]
    fn test_factories_build_well_formed_nodes() {
        let mut ids = IdGenerator::seeded(11);
        for kind in NodeKind::ALL {
            let node = create(kind, &mut ids);
            assert_eq!(node.kind, kind);
            assert_eq!(node.misaddressed_pins().count(), 0, "{kind:?}");
            assert!(node.connections.is_empty());
        }
    }

    #[test]
    fn test_factory_shapes() {
        let mut ids = IdGenerator::seeded(12);

        let node = branch(&mut ids);
        assert_eq!(node.color, 0xFFFF_8C00);
        assert_eq!(node.inputs[1].type_tag(), Some("Z"));
        let names: Vec<_> = node.outputs.iter().map(Pin::name).collect();
        assert_eq!(names, ["True", "False"]);

        let node = variable_set(&mut ids, "gold", "Int");
        assert_eq!(node.name, "Set Variable - Int");
        assert_eq!(node.color, type_color("Int"));
        assert_eq!(node.inputs[1].name(), "gold");
        assert_eq!(node.outputs[0].kind(), PinKind::FlowOutput);

        let node = constant_read(&mut ids, "42", "Int");
        assert!(node.inputs.is_empty());
        assert_eq!(node.outputs[0].name(), "42");

        let node = interact(&mut ids);
        assert!(node.inputs.is_empty());
        assert_eq!(node.outputs.len(), 1);
        assert!(exit(&mut ids).outputs.is_empty());
    }

    #[test]
    fn test_edit_player_options_keeps_surviving_connections() {
        let mut ids = IdGenerator::seeded(13);
        let choice = player_dialogue(&mut ids);
        let yes = exit(&mut ids);
        let no = npc_dialogue(&mut ids, "Too bad.");
        let (choice_id, yes_in, no_in) = (choice.id, PinId::input(yes.id, 0), PinId::input(no.id, 0));

        let mut graph = Graph::from_nodes([choice, yes, no], Default::default()).unwrap();
        GraphCommand::create_connection(PinId::output(choice_id, 0), yes_in)
            .apply(&mut graph)
            .unwrap();
        GraphCommand::create_connection(PinId::output(choice_id, 1), no_in)
            .apply(&mut graph)
            .unwrap();

        // Drop "True", keep "False" renamed and moved to the front, add a new one
        let mut options = dialogue_options(graph.node(choice_id).unwrap());
        options.remove(0);
        options[0].text = "No thanks".into();
        options.push(DialogueOption::new(DEFAULT_OPTION_TEXT));

        let before = graph.clone();
        let mut command = edit_player_options(&graph, choice_id, &options).unwrap();
        command.apply(&mut graph).unwrap();

        let node = graph.node(choice_id).unwrap();
        let names: Vec<_> = node.outputs.iter().map(Pin::name).collect();
        assert_eq!(names, ["No thanks", DEFAULT_OPTION_TEXT]);
        assert_eq!(node.connections, vec![Connection::new(PinId::output(choice_id, 0), no_in)]);
        assert!(!graph.has_source(yes_in));
        assert!(graph.validate().is_empty());

        command.revert(&mut graph).unwrap();
        assert_eq!(graph, before);
    }

    #[test]
    fn test_edit_player_options_requires_player_dialogue() {
        let mut ids = IdGenerator::seeded(14);
        let node = branch(&mut ids);
        let node_id = node.id;
        let graph = Graph::from_nodes([node], Default::default()).unwrap();
        assert!(matches!(
            edit_player_options(&graph, node_id, &[]),
            Err(CommandError::InvalidOperation(_))
        ));
        assert!(matches!(
            edit_player_options(&graph, NodeId::from_bytes([0; 8]), &[]),
            Err(CommandError::NodeNotFound(_))
        ));
    }
}

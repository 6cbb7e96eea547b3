//! Serializable state mutations
//!
//! The session actor receives mutations as values; the CLI reads them from
//! JSON scripts.

use mkb_common::ids::{ComponentId, SectionId};
use mkb_common::model::SectionType;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    InitComponent {
        id: ComponentId,
        #[serde(rename = "type")]
        component_type: String,
        #[serde(default)]
        data: Value,
    },
    AddComponent {
        #[serde(rename = "type")]
        component_type: String,
        #[serde(default)]
        data: Value,
    },
    UpdateComponent {
        id: ComponentId,
        patch: Map<String, Value>,
    },
    RemoveComponent {
        id: ComponentId,
    },
    MoveComponent {
        id: ComponentId,
        direction: Direction,
    },
    Reorder {
        from: usize,
        to: usize,
    },
    DuplicateComponent {
        id: ComponentId,
    },
    AddSection {
        section_type: SectionType,
    },
    InitSection {
        section_id: SectionId,
        section_type: SectionType,
    },
    RemoveSection {
        section_id: SectionId,
    },
    AssignToSection {
        component_id: ComponentId,
        section_id: SectionId,
        #[serde(default = "first_column")]
        column: u8,
    },
    UnassignFromSection {
        component_id: ComponentId,
    },
    UpdateGlobalSettings {
        patch: Map<String, Value>,
    },
    /// Applied atomically with a single notification
    Batch {
        mutations: Vec<Mutation>,
    },
}

fn first_column() -> u8 {
    1
}

/// Result of applying a [`Mutation`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Done,
    /// ID of a created component
    Component(ComponentId),
    /// ID of a created section
    Section(SectionId),
    /// Whether a conditional change happened (edge moves, unassign)
    Changed(bool),
    Batch(Vec<Outcome>),
}

impl Outcome {
    pub fn component_id(&self) -> Option<&ComponentId> {
        match self {
            Outcome::Component(id) => Some(id),
            _ => None,
        }
    }

    pub fn section_id(&self) -> Option<&SectionId> {
        match self {
            Outcome::Section(id) => Some(id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_script_format() {
        let ops: Vec<Mutation> = serde_json::from_value(json!([
            {"op": "init_component", "id": "h1", "type": "hero", "data": {"title": "Hi"}},
            {"op": "move_component", "id": "h1", "direction": "down"},
            {"op": "assign_to_section", "component_id": "h1", "section_id": "s1"},
            {"op": "batch", "mutations": [{"op": "remove_component", "id": "h1"}]}
        ]))
        .unwrap();

        assert_eq!(ops.len(), 4);
        assert_eq!(
            ops[1],
            Mutation::MoveComponent {
                id: "h1".into(),
                direction: Direction::Down
            }
        );
        assert!(matches!(ops[2], Mutation::AssignToSection { column: 1, .. }));
    }
}

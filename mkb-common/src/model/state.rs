//! The root aggregate and its persisted JSON shape

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::component::{ComponentProps, ComponentRecord};
use super::section::Section;
use crate::ids::{ComponentId, SectionId};

/// Version stamped on every saved state
pub const STATE_VERSION: &str = "2.2.0";

/// Everything the builder persists for one media kit
///
/// Invariants (checked by [`MediaKitState::violations`], restored by
/// [`MediaKitState::normalize`]):
/// - `layout` and `components` keys are in 1:1 correspondence
/// - every section slot references an existing component
/// - a component occupies at most one section slot
/// - slot columns are within the section's column count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "StoredState", from = "StoredState")]
pub struct MediaKitState {
    pub components: HashMap<ComponentId, ComponentRecord>,
    pub layout: Vec<ComponentId>,
    pub sections: Vec<Section>,
    pub global_settings: Map<String, Value>,
    pub version: String,
}

impl Default for MediaKitState {
    fn default() -> Self {
        Self {
            components: HashMap::new(),
            layout: Vec::new(),
            sections: Vec::new(),
            global_settings: Map::new(),
            version: STATE_VERSION.to_string(),
        }
    }
}

/// One broken invariant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// Layout lists an ID with no component record
    OrphanLayoutEntry(ComponentId),
    /// Component record missing from layout
    ComponentNotInLayout(ComponentId),
    /// Same ID listed more than once in layout
    DuplicateLayoutEntry(ComponentId),
    /// Section slot references a missing component
    DanglingSectionRef { section_id: SectionId, component_id: ComponentId },
    /// Component occupies more than one section slot
    MultipleSlots { section_id: SectionId, component_id: ComponentId },
    /// Slot column outside `1..=columns`
    ColumnOutOfRange { section_id: SectionId, component_id: ComponentId, column: u8 },
    /// Two sections share an ID
    DuplicateSection(SectionId),
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::OrphanLayoutEntry(id) => write!(f, "layout references missing component {}", id),
            Violation::ComponentNotInLayout(id) => write!(f, "component {} is not in layout", id),
            Violation::DuplicateLayoutEntry(id) => write!(f, "component {} appears in layout more than once", id),
            Violation::DanglingSectionRef { section_id, component_id } => {
                write!(f, "section {} references missing component {}", section_id, component_id)
            }
            Violation::MultipleSlots { section_id, component_id } => {
                write!(f, "component {} has an extra slot in section {}", component_id, section_id)
            }
            Violation::ColumnOutOfRange { section_id, component_id, column } => write!(
                f,
                "component {} sits in column {} which section {} does not have",
                component_id, column, section_id
            ),
            Violation::DuplicateSection(id) => write!(f, "section id {} is used more than once", id),
        }
    }
}

impl MediaKitState {
    pub fn component(&self, id: &ComponentId) -> Option<&ComponentRecord> {
        self.components.get(id)
    }

    pub fn section(&self, id: &SectionId) -> Option<&Section> {
        self.sections.iter().find(|s| &s.section_id == id)
    }

    pub fn section_mut(&mut self, id: &SectionId) -> Option<&mut Section> {
        self.sections.iter_mut().find(|s| &s.section_id == id)
    }

    /// Section and column holding `component_id`, if any
    pub fn placement_of(&self, component_id: &ComponentId) -> Option<(&SectionId, u8)> {
        self.sections
            .iter()
            .find_map(|s| s.column_of(component_id).map(|c| (&s.section_id, c)))
    }

    /// Records in layout order
    pub fn ordered_components(&self) -> impl Iterator<Item = &ComponentRecord> {
        self.layout.iter().filter_map(|id| self.components.get(id))
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty() && self.sections.is_empty()
    }

    /// List every broken invariant without changing anything
    pub fn violations(&self) -> Vec<Violation> {
        let mut found = Vec::new();

        let mut seen = HashSet::new();
        for id in &self.layout {
            if !seen.insert(id) {
                found.push(Violation::DuplicateLayoutEntry(id.clone()));
            } else if !self.components.contains_key(id) {
                found.push(Violation::OrphanLayoutEntry(id.clone()));
            }
        }

        let mut missing: Vec<&ComponentId> = self
            .components
            .keys()
            .filter(|id| !seen.contains(id))
            .collect();
        missing.sort();
        found.extend(missing.into_iter().map(|id| Violation::ComponentNotInLayout(id.clone())));

        let mut section_ids = HashSet::new();
        let mut placed = HashSet::new();
        for section in &self.sections {
            if !section_ids.insert(&section.section_id) {
                found.push(Violation::DuplicateSection(section.section_id.clone()));
            }
            let columns = section.column_count();
            for slot in &section.components {
                if !self.components.contains_key(&slot.component_id) {
                    found.push(Violation::DanglingSectionRef {
                        section_id: section.section_id.clone(),
                        component_id: slot.component_id.clone(),
                    });
                } else if !placed.insert(&slot.component_id) {
                    found.push(Violation::MultipleSlots {
                        section_id: section.section_id.clone(),
                        component_id: slot.component_id.clone(),
                    });
                } else if slot.column == 0 || slot.column > columns {
                    found.push(Violation::ColumnOutOfRange {
                        section_id: section.section_id.clone(),
                        component_id: slot.component_id.clone(),
                        column: slot.column,
                    });
                }
            }
        }

        found
    }

    /// Restore every invariant, returning what had to be repaired.
    ///
    /// Used at the load boundary only; mutations reject bad input up front.
    pub fn normalize(&mut self) -> Vec<Violation> {
        let repaired = self.violations();
        if repaired.is_empty() {
            return repaired;
        }

        let mut seen = HashSet::new();
        let components = &self.components;
        self.layout
            .retain(|id| components.contains_key(id) && seen.insert(id.clone()));

        let mut missing: Vec<ComponentId> = self
            .components
            .keys()
            .filter(|id| !seen.contains(*id))
            .cloned()
            .collect();
        missing.sort();
        self.layout.extend(missing);

        let mut section_ids = HashSet::new();
        self.sections.retain(|s| section_ids.insert(s.section_id.clone()));

        let mut placed = HashSet::new();
        for section in &mut self.sections {
            let columns = section.column_count();
            section.components.retain_mut(|slot| {
                if !components.contains_key(&slot.component_id) || !placed.insert(slot.component_id.clone()) {
                    return false;
                }
                if slot.column == 0 || slot.column > columns {
                    slot.column = columns;
                }
                true
            });
        }

        for v in &repaired {
            tracing::warn!("Repaired media kit state: {}", v);
        }
        repaired
    }
}

// ========================================
// Persisted shape
// ========================================

/// `{type, data}` as stored under `components`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredComponent {
    #[serde(rename = "type", default)]
    component_type: String,
    #[serde(default, alias = "props")]
    data: Value,
}

/// WordPress's PHP side encodes an empty object as `[]`
fn components_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, StoredComponent>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum MapOrList {
        Map(BTreeMap<String, StoredComponent>),
        List(Vec<Value>),
    }

    match MapOrList::deserialize(deserializer)? {
        MapOrList::Map(map) => Ok(map),
        MapOrList::List(list) if list.is_empty() => Ok(BTreeMap::new()),
        MapOrList::List(_) => Err(serde::de::Error::custom(
            "components must be an object keyed by component id",
        )),
    }
}

fn settings_map<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

fn default_version() -> String {
    STATE_VERSION.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredState {
    #[serde(default, deserialize_with = "components_map")]
    components: BTreeMap<String, StoredComponent>,
    #[serde(default)]
    layout: Vec<ComponentId>,
    #[serde(default)]
    sections: Vec<Section>,
    #[serde(
        rename = "globalSettings",
        alias = "global_settings",
        default,
        deserialize_with = "settings_map"
    )]
    global_settings: Map<String, Value>,
    #[serde(default = "default_version")]
    version: String,
}

impl From<MediaKitState> for StoredState {
    fn from(state: MediaKitState) -> Self {
        let components = state
            .components
            .into_values()
            .map(|record| {
                let stored = StoredComponent {
                    component_type: record.component_type().to_string(),
                    data: Value::Object(record.props.to_data()),
                };
                (record.id.as_str().to_string(), stored)
            })
            .collect();

        StoredState {
            components,
            layout: state.layout,
            sections: state.sections,
            global_settings: state.global_settings,
            version: state.version,
        }
    }
}

impl From<StoredState> for MediaKitState {
    fn from(stored: StoredState) -> Self {
        let components = stored
            .components
            .into_iter()
            .map(|(id, c)| {
                let id = ComponentId::new(id);
                let component_type = if c.component_type.is_empty() {
                    "unknown"
                } else {
                    c.component_type.as_str()
                };
                let props = ComponentProps::from_parts_lenient(component_type, c.data);
                (id.clone(), ComponentRecord::new(id, props))
            })
            .collect();

        MediaKitState {
            components,
            layout: stored.layout,
            sections: stored.sections,
            global_settings: stored.global_settings,
            version: stored.version,
        }
    }
}

//! Layout sections: regions that own components across one or more columns

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::{ComponentId, SectionId};

/// Section layout presets
///
/// Types this model has no preset for are kept verbatim as `Other` so they
/// survive a load/save round trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SectionType {
    #[default]
    FullWidth,
    TwoColumn,
    ThreeColumn,
    MainSidebar,
    SidebarMain,
    Grid,
    Hero,
    Other(String),
}

impl SectionType {
    /// Number of columns the preset provides
    pub fn default_columns(&self) -> u8 {
        match self {
            SectionType::FullWidth | SectionType::Hero | SectionType::Other(_) => 1,
            SectionType::TwoColumn | SectionType::MainSidebar | SectionType::SidebarMain => 2,
            SectionType::ThreeColumn | SectionType::Grid => 3,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SectionType::FullWidth => "full_width",
            SectionType::TwoColumn => "two_column",
            SectionType::ThreeColumn => "three_column",
            SectionType::MainSidebar => "main_sidebar",
            SectionType::SidebarMain => "sidebar_main",
            SectionType::Grid => "grid",
            SectionType::Hero => "hero",
            SectionType::Other(raw) => raw,
        }
    }
}

impl From<String> for SectionType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "full_width" => SectionType::FullWidth,
            "two_column" => SectionType::TwoColumn,
            "three_column" => SectionType::ThreeColumn,
            "main_sidebar" => SectionType::MainSidebar,
            "sidebar_main" => SectionType::SidebarMain,
            "grid" => SectionType::Grid,
            "hero" => SectionType::Hero,
            _ => SectionType::Other(raw),
        }
    }
}

impl From<SectionType> for String {
    fn from(section_type: SectionType) -> Self {
        match section_type {
            SectionType::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for SectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Largest column count honoured from a persisted `layout.columns`
const MAX_COLUMNS: u64 = 12;

fn is_zero(n: &u8) -> bool {
    *n == 0
}

fn default_column() -> u8 {
    1
}

/// Older payloads list bare component IDs instead of slot objects
#[derive(Deserialize)]
#[serde(untagged)]
enum RawSlot {
    Bare(ComponentId),
    Full {
        component_id: ComponentId,
        #[serde(default = "default_column")]
        column: u8,
    },
}

impl From<RawSlot> for SectionSlot {
    fn from(raw: RawSlot) -> Self {
        match raw {
            RawSlot::Bare(component_id) => SectionSlot { component_id, column: 1 },
            RawSlot::Full { component_id, column } => SectionSlot { component_id, column },
        }
    }
}

/// One component placed in a section column (columns are 1-based)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawSlot")]
pub struct SectionSlot {
    pub component_id: ComponentId,
    pub column: u8,
}

/// A layout region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub section_id: SectionId,
    #[serde(default)]
    pub section_type: SectionType,
    /// Slots in display order; within a column, earlier slots render first
    #[serde(default)]
    pub components: Vec<SectionSlot>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub columns: u8,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub section_options: Value,
    /// Persisted fields the builder does not interpret (`layout`,
    /// `created_at`, ...), written back unchanged
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Section {
    pub fn new(section_id: SectionId, section_type: SectionType) -> Self {
        Self {
            columns: section_type.default_columns(),
            section_id,
            section_type,
            components: Vec::new(),
            section_options: Value::Null,
            extra: Map::new(),
        }
    }

    /// Column count: `columns`, else the persisted `layout.columns`, else
    /// the preset
    pub fn column_count(&self) -> u8 {
        if self.columns != 0 {
            return self.columns;
        }
        self.extra
            .get("layout")
            .and_then(|layout| layout.get("columns"))
            .and_then(Value::as_u64)
            .filter(|n| (1..=MAX_COLUMNS).contains(n))
            .and_then(|n| u8::try_from(n).ok())
            .unwrap_or_else(|| self.section_type.default_columns())
    }

    pub fn contains(&self, component_id: &ComponentId) -> bool {
        self.components.iter().any(|s| &s.component_id == component_id)
    }

    pub fn column_of(&self, component_id: &ComponentId) -> Option<u8> {
        self.components
            .iter()
            .find(|s| &s.component_id == component_id)
            .map(|s| s.column)
    }

    /// Component IDs placed in `column`, in display order
    pub fn column_members(&self, column: u8) -> impl Iterator<Item = &ComponentId> {
        self.components
            .iter()
            .filter(move |s| s.column == column)
            .map(|s| &s.component_id)
    }

    /// Drop the slot for `component_id`; returns whether one existed
    pub fn detach(&mut self, component_id: &ComponentId) -> bool {
        let before = self.components.len();
        self.components.retain(|s| &s.component_id != component_id);
        before != self.components.len()
    }
}

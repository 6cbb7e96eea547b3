//! Component Registry
//!
//! Maps a component type name to the renderer that turns its record into
//! markup, plus an advisory field schema for editor forms.
//!
//! The registry is built once at startup and shared behind an `Arc`; lookups
//! never mutate it.

use std::collections::HashMap;
use std::sync::Arc;

use mkb_common::model::ComponentRecord;
use serde::Serialize;
use thiserror::Error;

use crate::dom::VNode;

/// Why a renderer could not produce markup
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The record's data does not have the shape this renderer expects
    #[error("expected {expected} data, found {found}")]
    PropsMismatch { expected: String, found: String },

    /// Renderer-specific failure
    #[error("{0}")]
    Failed(String),
}

/// Kind of editor input a field maps to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    TextArea,
    Url,
    Email,
    Boolean,
    Number { min: i64, max: i64 },
    Select { options: Vec<String> },
    List,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSchema {
    /// Key in the component's data object
    pub name: String,
    pub label: String,
    #[serde(flatten)]
    pub kind: FieldKind,
}

impl FieldSchema {
    pub fn new(name: &str, label: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            kind,
        }
    }
}

/// Advisory description of a component type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentSchema {
    pub component_type: String,
    pub name: String,
    pub description: String,
    pub fields: Vec<FieldSchema>,
}

/// Turns a component record into markup
///
/// Implementations must be pure: the same record always yields the same
/// tree, and nothing outside the returned tree is touched.
pub trait ComponentRenderer: Send + Sync {
    fn render(&self, record: &ComponentRecord) -> Result<VNode, RenderError>;

    /// Field schema for editor forms
    fn schema(&self) -> Option<ComponentSchema> {
        None
    }
}

impl<F> ComponentRenderer for F
where
    F: Fn(&ComponentRecord) -> Result<VNode, RenderError> + Send + Sync,
{
    fn render(&self, record: &ComponentRecord) -> Result<VNode, RenderError> {
        self(record)
    }
}

/// Type name to renderer lookup
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    renderers: HashMap<String, Arc<dyn ComponentRenderer>>,
    /// Registration order, for listing
    order: Vec<String>,
}

impl ComponentRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in component type
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        crate::components::register_builtin(&mut registry);
        registry
    }

    /// Register `renderer` for `component_type`, returning the renderer it
    /// replaced, if any.
    pub fn register<R>(&mut self, component_type: &str, renderer: R) -> Option<Arc<dyn ComponentRenderer>>
    where
        R: ComponentRenderer + 'static,
    {
        let previous = self
            .renderers
            .insert(component_type.to_string(), Arc::new(renderer));
        match previous {
            Some(previous) => {
                tracing::debug!("Replaced renderer for component type {}", component_type);
                Some(previous)
            }
            None => {
                self.order.push(component_type.to_string());
                None
            }
        }
    }

    pub fn get(&self, component_type: &str) -> Option<Arc<dyn ComponentRenderer>> {
        self.renderers.get(component_type).cloned()
    }

    pub fn contains(&self, component_type: &str) -> bool {
        self.renderers.contains_key(component_type)
    }

    /// Registered type names in registration order
    pub fn types(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn schema(&self, component_type: &str) -> Option<ComponentSchema> {
        self.renderers.get(component_type)?.schema()
    }

    /// Schemas of every registered type that provides one
    pub fn schemas(&self) -> Vec<ComponentSchema> {
        self.order.iter().filter_map(|t| self.schema(t)).collect()
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("types", &self.order)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mkb_common::model::{ComponentProps, BUILTIN_TYPES};

    fn shout(record: &ComponentRecord) -> Result<VNode, RenderError> {
        Ok(VNode::element("h1").text(record.id.as_str().to_uppercase()).into())
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = ComponentRegistry::new();
        assert!(registry.register("shout", shout).is_none());
        assert!(registry.contains("shout"));
        assert!(registry.get("nonexistent").is_none());

        let record = ComponentRecord::new("abc".into(), ComponentProps::default_for("shout").unwrap());
        let vnode = registry.get("shout").unwrap().render(&record).unwrap();
        assert_eq!(vnode.text_content(), "ABC");
    }

    #[test]
    fn test_reregister_replaces() {
        let mut registry = ComponentRegistry::new();
        registry.register("x", shout);
        assert!(registry.register("x", shout).is_some());
        assert_eq!(registry.types(), &["x".to_string()]);
    }

    #[test]
    fn test_builtin_types_registered_with_schemas() {
        let registry = ComponentRegistry::with_builtin();
        for ty in BUILTIN_TYPES {
            assert!(registry.contains(ty), "missing {}", ty);
            let schema = registry.schema(ty).expect("builtin types carry a schema");
            assert_eq!(schema.component_type, *ty);
            assert!(!schema.fields.is_empty());
        }
        assert_eq!(registry.schemas().len(), BUILTIN_TYPES.len());
    }
}

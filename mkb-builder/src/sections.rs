//! Section/Layout Integration
//!
//! Keeps the derived component → (section, column) map and, after every
//! render pass, moves component nodes into the container for their
//! assignment:
//!
//! ```text
//! div.gmkb-sections
//! └── div.gmkb-section.gmkb-section--two_column[data-section-id]
//!     └── div.gmkb-section__content.gmkb-section__content--2-col
//!         ├── div.gmkb-section__column[data-column="1"]
//!         └── div.gmkb-section__column[data-column="2"]
//! ```
//!
//! Dangling references are never repaired here: the state manager rejects
//! them when the mutation happens.

use std::collections::HashMap;

use mkb_common::ids::{ComponentId, SectionId};
use mkb_common::model::{MediaKitState, Section, SectionType};
use tracing::debug;

use crate::dom::{Document, NodeId, VNode};
use crate::error::Result;
use crate::render::{reorder_children, Hosts, Renderer, COMPONENT_ID_ATTR};

pub const SECTION_CLASS: &str = "gmkb-section";
pub const SECTION_CONTENT_CLASS: &str = "gmkb-section__content";
pub const COLUMN_CLASS: &str = "gmkb-section__column";

/// What one placement pass changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlacementReport {
    pub sections_created: usize,
    pub sections_removed: usize,
    /// Component nodes moved between containers or within one
    pub moved: usize,
}

#[derive(Debug)]
struct SectionContainer {
    node: NodeId,
    content: NodeId,
    section_type: SectionType,
    /// Column nodes, index 0 is column 1
    columns: Vec<NodeId>,
}

#[derive(Debug, Default)]
pub struct SectionIntegration {
    placements: HashMap<ComponentId, (SectionId, u8)>,
    containers: HashMap<SectionId, SectionContainer>,
}

impl SectionIntegration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the component → (section, column) map
    pub fn sync(&mut self, state: &MediaKitState) {
        self.placements.clear();
        for section in &state.sections {
            for slot in &section.components {
                self.placements
                    .insert(slot.component_id.clone(), (section.section_id.clone(), slot.column));
            }
        }
    }

    pub fn placement(&self, component_id: &ComponentId) -> Option<(&SectionId, u8)> {
        self.placements.get(component_id).map(|(s, c)| (s, *c))
    }

    /// Column node for a section column, if the container exists
    pub fn column_node(&self, section_id: &SectionId, column: u8) -> Option<NodeId> {
        let container = self.containers.get(section_id)?;
        container.columns.get(usize::from(column).checked_sub(1)?).copied()
    }

    pub fn container_node(&self, section_id: &SectionId) -> Option<NodeId> {
        self.containers.get(section_id).map(|c| c.node)
    }

    /// Re-verify placement after a render pass
    pub fn on_render_complete(
        &mut self,
        doc: &mut Document,
        state: &MediaKitState,
        renderer: &Renderer,
    ) -> Result<PlacementReport> {
        self.sync(state);
        let mut report = PlacementReport::default();
        let Some(hosts) = renderer.hosts() else {
            return Ok(report);
        };

        // Containers, in section order
        let mut section_nodes = Vec::with_capacity(state.sections.len());
        for section in &state.sections {
            if self.ensure_container(doc, section, hosts)? {
                report.sections_created += 1;
            }
            if let Some(container) = self.containers.get(&section.section_id) {
                section_nodes.push(container.node);
            }
        }
        reorder_children(doc, hosts.sections, &section_nodes)?;

        // Fill columns in slot order
        for section in &state.sections {
            for column in 1..=section.column_count() {
                let Some(column_node) = self.column_node(&section.section_id, column) else {
                    continue;
                };
                let desired: Vec<NodeId> = section
                    .column_members(column)
                    .filter_map(|id| renderer.node_of(id))
                    .collect();
                report.moved += reorder_children(doc, column_node, &desired)?;
            }
        }

        // Everything unassigned goes back to the components host
        let unsectioned: Vec<NodeId> = state
            .layout
            .iter()
            .filter(|id| !self.placements.contains_key(*id))
            .filter_map(|id| renderer.node_of(id))
            .collect();
        report.moved += reorder_children(doc, hosts.components, &unsectioned)?;

        // Containers for removed sections
        let stale: Vec<SectionId> = self
            .containers
            .keys()
            .filter(|id| state.section(id).is_none())
            .cloned()
            .collect();
        for section_id in stale {
            if let Some(container) = self.containers.remove(&section_id) {
                Self::evacuate(doc, container.node, hosts.components)?;
                doc.remove(container.node)?;
                report.sections_removed += 1;
            }
        }

        if report != PlacementReport::default() {
            debug!(
                "Section placement: {} created, {} removed, {} moved",
                report.sections_created, report.sections_removed, report.moved
            );
        }
        Ok(report)
    }

    /// Create or update the container for `section`. Returns true if created.
    fn ensure_container(&mut self, doc: &mut Document, section: &Section, hosts: Hosts) -> Result<bool> {
        let wanted_columns = usize::from(section.column_count());

        if let Some(container) = self.containers.get_mut(&section.section_id) {
            if doc.contains(container.node) {
                if container.section_type != section.section_type {
                    doc.remove_class(
                        container.node,
                        &format!("{}--{}", SECTION_CLASS, container.section_type.as_str()),
                    )?;
                    doc.add_class(
                        container.node,
                        &format!("{}--{}", SECTION_CLASS, section.section_type.as_str()),
                    )?;
                    doc.set_attr(container.node, "data-section-type", section.section_type.as_str())?;
                    container.section_type = section.section_type.clone();
                }
                while container.columns.len() > wanted_columns {
                    if let Some(column) = container.columns.pop() {
                        Self::evacuate(doc, column, hosts.components)?;
                        doc.remove(column)?;
                    }
                }
                while container.columns.len() < wanted_columns {
                    let number = container.columns.len() + 1;
                    let column = doc.mount(container.content, &column_markup(number))?;
                    container.columns.push(column);
                }
                doc.set_attr(
                    container.content,
                    "class",
                    &format!("{0} {0}--{1}-col", SECTION_CONTENT_CLASS, wanted_columns),
                )?;
                return Ok(false);
            }
        }

        let node = doc.build(&container_markup(section, wanted_columns));
        let content = doc
            .children(node)
            .first()
            .copied()
            .unwrap_or(node);
        let columns = doc.element_children(content);
        doc.append_child(hosts.sections, node)?;
        self.containers.insert(
            section.section_id.clone(),
            SectionContainer {
                node,
                content,
                section_type: section.section_type.clone(),
                columns,
            },
        );
        Ok(true)
    }

    /// Move component nodes out of `container` into `host`
    fn evacuate(doc: &mut Document, container: NodeId, host: NodeId) -> Result<()> {
        let nodes: Vec<NodeId> = doc
            .descendants(container)
            .into_iter()
            .filter(|n| *n != container && doc.attr(*n, COMPONENT_ID_ATTR).is_some())
            .collect();
        for node in nodes {
            if doc.is_inclusive_ancestor(container, node) {
                doc.append_child(host, node)?;
            }
        }
        Ok(())
    }
}

fn column_markup(number: usize) -> VNode {
    VNode::element("div")
        .class(COLUMN_CLASS)
        .attr("data-column", number.to_string())
        .into()
}

fn container_markup(section: &Section, columns: usize) -> VNode {
    let column_nodes = (1..=columns).map(column_markup);
    VNode::element("div")
        .class(SECTION_CLASS)
        .class(format!("{}--{}", SECTION_CLASS, section.section_type.as_str()))
        .attr("data-section-id", section.section_id.as_str())
        .attr("data-section-type", section.section_type.as_str())
        .child(
            VNode::element("div")
                .class(SECTION_CONTENT_CLASS)
                .class(format!("{}--{}-col", SECTION_CONTENT_CLASS, columns))
                .children(column_nodes),
        )
        .into()
}

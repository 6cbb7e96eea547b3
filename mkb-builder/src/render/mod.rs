//! Component Renderer
//!
//! Projects `MediaKitState` onto the preview document. Each pass diffs the
//! desired component set and order against the nodes it already owns and
//! applies only the needed creations, removals, content refreshes and moves.
//! The preview is never cleared wholesale.
//!
//! Layout of the preview root:
//!
//! ```text
//! div#media-kit-preview
//! ├── div.gmkb-sections      section containers (see `sections`)
//! └── div.gmkb-components    components without a section, in layout order
//! ```

mod diff;
mod scheduler;

pub use diff::{longest_increasing_subsequence, reorder_children};
pub use scheduler::{RenderPhase, RenderScheduler};

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use mkb_common::events::{BuilderEvent, EventBus};
use mkb_common::ids::ComponentId;
use mkb_common::model::{ComponentProps, ComponentRecord, MediaKitState};
use tracing::{debug, warn};

use crate::controls::ControlsManager;
use crate::dom::{Document, NodeId, VNode};
use crate::error::Result;
use crate::registry::{ComponentRegistry, RenderError};

pub const COMPONENT_CLASS: &str = "gmkb-component";
pub const CONTENT_CLASS: &str = "gmkb-component__content";
pub const ERROR_CLASS: &str = "gmkb-component--error";
pub const COMPONENTS_HOST_CLASS: &str = "gmkb-components";
pub const SECTIONS_HOST_CLASS: &str = "gmkb-sections";
pub const COMPONENT_ID_ATTR: &str = "data-component-id";

/// What one reconcile pass changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderReport {
    pub revision: u64,
    pub added: usize,
    pub removed: usize,
    pub moved: usize,
    pub updated: usize,
    /// Nodes currently showing an error placeholder
    pub placeholders: usize,
}

impl RenderReport {
    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.removed == 0 && self.moved == 0 && self.updated == 0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Hosts {
    pub sections: NodeId,
    pub components: NodeId,
}

#[derive(Debug)]
struct RenderedNode {
    node: NodeId,
    /// Props the content was rendered from; `None` forces a refresh
    props: Option<ComponentProps>,
    ok: bool,
}

pub struct Renderer {
    registry: Arc<ComponentRegistry>,
    controls: ControlsManager,
    events: EventBus,
    nodes: HashMap<ComponentId, RenderedNode>,
    hosts: Option<Hosts>,
    passes: u64,
}

impl Renderer {
    pub fn new(registry: Arc<ComponentRegistry>, controls: ControlsManager, events: EventBus) -> Self {
        Self {
            registry,
            controls,
            events,
            nodes: HashMap::new(),
            hosts: None,
            passes: 0,
        }
    }

    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    /// Number of reconcile passes run so far
    pub fn passes(&self) -> u64 {
        self.passes
    }

    pub fn hosts(&self) -> Option<Hosts> {
        self.hosts
    }

    /// Node owned for `id`, if rendered
    pub fn node_of(&self, id: &ComponentId) -> Option<NodeId> {
        self.nodes.get(id).map(|n| n.node)
    }

    /// Create the host containers, adopting any already in the document.
    ///
    /// Component nodes found in the document (server-rendered markup) are
    /// adopted so they are refreshed instead of duplicated; repeats of an ID
    /// beyond the first are removed.
    pub fn mount(&mut self, doc: &mut Document) -> Result<Hosts> {
        if let Some(hosts) = self.hosts.filter(|h| doc.contains(h.sections) && doc.contains(h.components)) {
            return Ok(hosts);
        }

        let root = doc.root();
        let sections = match doc.find_by_class(SECTIONS_HOST_CLASS).first() {
            Some(node) => *node,
            None => doc.mount(root, &VNode::element("div").class(SECTIONS_HOST_CLASS).into())?,
        };
        let components = match doc.find_by_class(COMPONENTS_HOST_CLASS).first() {
            Some(node) => *node,
            None => doc.mount(root, &VNode::element("div").class(COMPONENTS_HOST_CLASS).into())?,
        };

        let mut adopted = 0;
        for node in doc.find_by_class(COMPONENT_CLASS) {
            let Some(id) = doc.attr(node, COMPONENT_ID_ATTR).map(ComponentId::new) else {
                continue;
            };
            if self.nodes.contains_key(&id) {
                warn!("Removing duplicate node for component {}", id);
                doc.remove(node)?;
                continue;
            }
            if !doc.is_inclusive_ancestor(sections, node) {
                doc.append_child(components, node)?;
            }
            self.nodes.insert(
                id,
                RenderedNode {
                    node,
                    props: None,
                    ok: true,
                },
            );
            adopted += 1;
        }
        if adopted > 0 {
            debug!("Adopted {} existing component nodes", adopted);
        }

        let hosts = Hosts { sections, components };
        self.hosts = Some(hosts);
        Ok(hosts)
    }

    /// Reconcile the document with `state`
    pub fn render(&mut self, doc: &mut Document, state: &MediaKitState, revision: u64) -> Result<RenderReport> {
        let hosts = self.mount(doc)?;
        let mut report = RenderReport {
            revision,
            ..RenderReport::default()
        };

        // Drop nodes for removed components, and forget nodes someone else freed
        let stale: Vec<ComponentId> = self
            .nodes
            .iter()
            .filter(|(id, n)| !state.components.contains_key(*id) || !doc.contains(n.node))
            .map(|(id, _)| id.clone())
            .collect();
        for id in stale {
            if let Some(rendered) = self.nodes.remove(&id) {
                if doc.contains(rendered.node) {
                    doc.remove(rendered.node)?;
                    report.removed += 1;
                }
            }
        }

        let mut rendered_events = Vec::new();
        for record in state.ordered_components() {
            match self.nodes.get_mut(&record.id) {
                Some(existing) if existing.props.as_ref() == Some(&record.props) => {}
                Some(existing) => {
                    let ok = Self::refresh(&self.registry, doc, existing.node, record)?;
                    self.controls.attach_controls(doc, existing.node, &record.id)?;
                    existing.props = Some(record.props.clone());
                    existing.ok = ok;
                    report.updated += 1;
                    rendered_events.push((record, ok));
                }
                None => {
                    let (node, ok) = self.create(doc, record)?;
                    doc.append_child(hosts.components, node)?;
                    self.nodes.insert(
                        record.id.clone(),
                        RenderedNode {
                            node,
                            props: Some(record.props.clone()),
                            ok,
                        },
                    );
                    report.added += 1;
                    rendered_events.push((record, ok));
                }
            }
        }

        // Order the nodes sitting in the components host; sectioned nodes
        // are placed by section integration.
        let desired: Vec<NodeId> = state
            .layout
            .iter()
            .filter_map(|id| self.node_of(id))
            .filter(|node| doc.parent(*node) == Some(hosts.components))
            .collect();
        report.moved = reorder_children(doc, hosts.components, &desired)?;
        report.placeholders = self.nodes.values().filter(|n| !n.ok).count();

        self.passes += 1;
        for (record, ok) in rendered_events {
            self.events.emit_lossy(BuilderEvent::ComponentRendered {
                component_id: record.id.clone(),
                component_type: record.component_type().to_string(),
                ok,
            });
        }
        self.events.emit_lossy(BuilderEvent::RenderComplete {
            revision,
            added: report.added,
            removed: report.removed,
            moved: report.moved,
            updated: report.updated,
        });

        debug_assert!(state
            .layout
            .iter()
            .all(|id| doc.count_with_attr(COMPONENT_ID_ATTR, id.as_str()) <= 1));
        debug!(
            "Render pass {} (rev {}): +{} -{} ~{} moved {}",
            self.passes, revision, report.added, report.removed, report.updated, report.moved
        );
        Ok(report)
    }

    /// Build the wrapper element for a new component
    fn create(&self, doc: &mut Document, record: &ComponentRecord) -> Result<(NodeId, bool)> {
        let component_type = record.component_type();
        let wrapper: VNode = VNode::element("div")
            .class(COMPONENT_CLASS)
            .class(format!("{}--{}", COMPONENT_CLASS, component_type))
            .attr(COMPONENT_ID_ATTR, record.id.as_str())
            .attr("data-component-type", component_type)
            .child(VNode::element("div").class(CONTENT_CLASS))
            .into();
        let node = doc.build(&wrapper);
        let ok = Self::refresh(&self.registry, doc, node, record)?;
        self.controls.attach_controls(doc, node, &record.id)?;
        Ok((node, ok))
    }

    /// Replace the wrapper's content with freshly rendered markup
    fn refresh(
        registry: &ComponentRegistry,
        doc: &mut Document,
        wrapper: NodeId,
        record: &ComponentRecord,
    ) -> Result<bool> {
        let content = match doc
            .children(wrapper)
            .iter()
            .copied()
            .find(|c| doc.has_class(*c, CONTENT_CLASS))
        {
            Some(content) => content,
            None => {
                let content = doc.build(&VNode::element("div").class(CONTENT_CLASS).into());
                let first = doc.children(wrapper).first().copied();
                doc.insert_before(wrapper, content, first)?;
                content
            }
        };
        doc.clear_children(content)?;

        let (markup, ok) = match render_content(registry, record) {
            Ok(markup) => (markup, true),
            Err(e) => {
                warn!(
                    "Rendering {} component {} failed: {}",
                    record.component_type(),
                    record.id,
                    e
                );
                (error_placeholder(record.component_type(), &e), false)
            }
        };
        doc.mount(content, &markup)?;

        if ok {
            doc.remove_class(wrapper, ERROR_CLASS)?;
            doc.remove_attr(wrapper, "data-render-error")?;
        } else {
            doc.add_class(wrapper, ERROR_CLASS)?;
            doc.set_attr(wrapper, "data-render-error", "true")?;
        }
        Ok(ok)
    }
}

/// Run the registered renderer, containing both errors and panics
fn render_content(registry: &ComponentRegistry, record: &ComponentRecord) -> std::result::Result<VNode, RenderError> {
    let renderer = registry
        .get(record.component_type())
        .ok_or_else(|| RenderError::Failed("component type is not registered".to_string()))?;

    match catch_unwind(AssertUnwindSafe(|| renderer.render(record))) {
        Ok(result) => result,
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "renderer panicked".to_string());
            Err(RenderError::Failed(reason))
        }
    }
}

/// Visible stand-in for a component that could not be rendered
pub fn error_placeholder(component_type: &str, error: &RenderError) -> VNode {
    VNode::element("div")
        .class("gmkb-component__error")
        .attr("role", "alert")
        .child(VNode::element("strong").text(format!("Error rendering {}", component_type)))
        .child(VNode::element("p").class("gmkb-component__error-detail").text(error.to_string()))
        .into()
}

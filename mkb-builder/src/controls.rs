//! Controls Manager
//!
//! Adds the move/edit/duplicate/delete toolbar to component wrappers and
//! turns clicks on it into `*-requested` events. Controls are input only:
//! nothing here touches the media kit state.
//!
//! Each request is announced on the event bus for observers and queued on a
//! dedicated channel for whoever carries it out, so a lagging bus receiver
//! never loses a click.

use mkb_common::events::{BuilderEvent, ControlAction, EventBus};
use mkb_common::ids::ComponentId;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::dom::{Document, DomResult, NodeId, VNode};

pub const CONTROLS_CLASS: &str = "component-controls";

/// A control click waiting to be carried out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlRequest {
    pub action: ControlAction,
    pub component_id: ComponentId,
}

#[derive(Clone)]
pub struct ControlsManager {
    events: EventBus,
    requests: mpsc::UnboundedSender<ControlRequest>,
}

impl ControlsManager {
    pub fn new(events: EventBus, requests: mpsc::UnboundedSender<ControlRequest>) -> Self {
        Self { events, requests }
    }

    fn controls_markup(component_id: &ComponentId) -> VNode {
        let buttons = ControlAction::ALL.into_iter().map(|action| {
            VNode::element("button")
                .class("component-control")
                .class(format!("component-control--{}", action.as_str()))
                .attr("type", "button")
                .attr("data-action", action.as_str())
                .attr("title", action.label())
        });
        VNode::element("div")
            .class(CONTROLS_CLASS)
            .attr("data-controls-for", component_id.as_str())
            .children(buttons)
            .into()
    }

    /// Ensure `element` has exactly one controls block for `component_id`.
    ///
    /// Calling this again on the same element is a no-op; extra blocks left
    /// by anything else are removed.
    pub fn attach_controls(
        &self,
        doc: &mut Document,
        element: NodeId,
        component_id: &ComponentId,
    ) -> DomResult<NodeId> {
        let existing: Vec<NodeId> = doc
            .children(element)
            .iter()
            .copied()
            .filter(|c| doc.has_class(*c, CONTROLS_CLASS))
            .collect();

        if let Some((&first, extra)) = existing.split_first() {
            for node in extra {
                doc.remove(*node)?;
            }
            if doc.attr(first, "data-controls-for") != Some(component_id.as_str()) {
                doc.set_attr(first, "data-controls-for", component_id.as_str())?;
            }
            return Ok(first);
        }

        debug!("Attaching controls to {}", component_id);
        doc.mount(element, &Self::controls_markup(component_id))
    }

    /// Resolve a click on `target` to a control request and dispatch it.
    ///
    /// Returns `None` when the click did not land on a control button.
    pub fn handle_click(&self, doc: &Document, target: NodeId) -> Option<BuilderEvent> {
        let mut button = Some(target);
        let action = loop {
            let node = button?;
            if let Some(action) = doc.attr(node, "data-action").and_then(ControlAction::parse) {
                break action;
            }
            button = doc.parent(node);
        };

        let mut cursor = button.and_then(|b| doc.parent(b));
        let component_id = loop {
            let node = cursor?;
            if let Some(id) = doc
                .attr(node, "data-controls-for")
                .or_else(|| doc.attr(node, "data-component-id"))
            {
                break ComponentId::new(id);
            }
            cursor = doc.parent(node);
        };

        Some(self.dispatch(action, component_id))
    }

    /// Queue the request for `action` on `component_id` and announce it
    pub fn dispatch(&self, action: ControlAction, component_id: ComponentId) -> BuilderEvent {
        let event = BuilderEvent::control_request(action, component_id.clone());
        debug!("Dispatching {}", event.dom_event_name());
        if self.requests.send(ControlRequest { action, component_id }).is_err() {
            warn!("No handler for {}; request dropped", event.dom_event_name());
        }
        self.events.emit_lossy(event.clone());
        event
    }

    /// The `data-action` button for `action` inside `element`'s controls
    pub fn button(&self, doc: &Document, element: NodeId, action: ControlAction) -> Option<NodeId> {
        let controls = doc
            .children(element)
            .iter()
            .copied()
            .find(|c| doc.has_class(*c, CONTROLS_CLASS))?;
        doc.find_in(controls, "data-action", action.as_str())
    }
}

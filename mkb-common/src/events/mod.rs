//! Event types for the builder event system
//!
//! Provides the shared event definitions and the `EventBus` that carries them
//! between the controls, the state-mutation handlers, the renderer and the
//! persistence layer.

mod control_types;

pub use control_types::{ControlAction, NotificationLevel};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::ids::ComponentId;

/// Builder event types
///
/// Each variant corresponds to one `gmkb:*` document event; see
/// [`BuilderEvent::dom_event_name`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BuilderEvent {
    /// Edit button clicked
    ///
    /// Triggers:
    /// - Session: select the component for the edit panel
    ComponentEditRequested {
        component_id: ComponentId,
    },

    /// Duplicate button clicked
    ///
    /// Triggers:
    /// - Session: duplicate the component right after the original
    ComponentDuplicateRequested {
        component_id: ComponentId,
    },

    /// Delete button clicked
    ///
    /// Triggers:
    /// - Session: remove the component and its section slot
    ComponentDeleteRequested {
        component_id: ComponentId,
    },

    /// Move-up button clicked
    ComponentMoveUpRequested {
        component_id: ComponentId,
    },

    /// Move-down button clicked
    ComponentMoveDownRequested {
        component_id: ComponentId,
    },

    /// A component node was created or refreshed
    ///
    /// `ok` is false when the node holds an error placeholder.
    ComponentRendered {
        component_id: ComponentId,
        component_type: String,
        ok: bool,
    },

    /// A reconcile pass finished
    ///
    /// Triggers:
    /// - Section integration: re-verify node placement
    RenderComplete {
        /// State revision that was rendered
        revision: u64,
        added: usize,
        removed: usize,
        moved: usize,
        updated: usize,
    },

    /// The state manager committed a change
    ///
    /// Emitted once per mutation, or once per batch.
    StateChanged {
        revision: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A component was selected for editing
    ComponentSelected {
        component_id: ComponentId,
    },

    /// Save request accepted and sent
    SaveStarted {
        revision: u64,
    },

    /// Save acknowledged by WordPress
    SaveCompleted {
        revision: u64,
        message: String,
    },

    /// Save failed
    SaveFailed {
        error: String,
        /// Whether trying again later may succeed
        retryable: bool,
    },

    /// Short user-facing toast
    Notification {
        level: NotificationLevel,
        message: String,
    },
}

impl BuilderEvent {
    /// Control request for `action` on `component_id`
    pub fn control_request(action: ControlAction, component_id: ComponentId) -> Self {
        match action {
            ControlAction::Edit => BuilderEvent::ComponentEditRequested { component_id },
            ControlAction::Duplicate => BuilderEvent::ComponentDuplicateRequested { component_id },
            ControlAction::Delete => BuilderEvent::ComponentDeleteRequested { component_id },
            ControlAction::MoveUp => BuilderEvent::ComponentMoveUpRequested { component_id },
            ControlAction::MoveDown => BuilderEvent::ComponentMoveDownRequested { component_id },
        }
    }

    /// Inverse of [`control_request`](Self::control_request)
    pub fn as_control_request(&self) -> Option<(ControlAction, &ComponentId)> {
        match self {
            BuilderEvent::ComponentEditRequested { component_id } => Some((ControlAction::Edit, component_id)),
            BuilderEvent::ComponentDuplicateRequested { component_id } => {
                Some((ControlAction::Duplicate, component_id))
            }
            BuilderEvent::ComponentDeleteRequested { component_id } => Some((ControlAction::Delete, component_id)),
            BuilderEvent::ComponentMoveUpRequested { component_id } => Some((ControlAction::MoveUp, component_id)),
            BuilderEvent::ComponentMoveDownRequested { component_id } => {
                Some((ControlAction::MoveDown, component_id))
            }
            _ => None,
        }
    }

    /// Name of the matching document event
    pub fn dom_event_name(&self) -> &'static str {
        match self {
            BuilderEvent::ComponentEditRequested { .. } => "gmkb:component-edit-requested",
            BuilderEvent::ComponentDuplicateRequested { .. } => "gmkb:component-duplicate-requested",
            BuilderEvent::ComponentDeleteRequested { .. } => "gmkb:component-delete-requested",
            BuilderEvent::ComponentMoveUpRequested { .. } => "gmkb:component-move-up-requested",
            BuilderEvent::ComponentMoveDownRequested { .. } => "gmkb:component-move-down-requested",
            BuilderEvent::ComponentRendered { .. } => "gmkb:component-rendered",
            BuilderEvent::RenderComplete { .. } => "gmkb:render-complete",
            BuilderEvent::StateChanged { .. } => "gmkb:state-changed",
            BuilderEvent::ComponentSelected { .. } => "gmkb:component-selected",
            BuilderEvent::SaveStarted { .. } => "gmkb:save-started",
            BuilderEvent::SaveCompleted { .. } => "gmkb:save-completed",
            BuilderEvent::SaveFailed { .. } => "gmkb:save-failed",
            BuilderEvent::Notification { .. } => "gmkb:notification",
        }
    }

    /// `{componentId}` style detail payload carried by the document event
    pub fn detail(&self) -> serde_json::Value {
        match self.as_control_request() {
            Some((_, component_id)) => serde_json::json!({ "componentId": component_id }),
            None => serde_json::to_value(self).unwrap_or(serde_json::Value::Null),
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus for the builder
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use mkb_common::events::{BuilderEvent, EventBus};
/// use mkb_common::ids::ComponentId;
///
/// let event_bus = EventBus::new(64);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(BuilderEvent::ComponentDeleteRequested {
///     component_id: ComponentId::new("hero-1"),
/// });
///
/// let received = rx.try_recv().unwrap();
/// assert_eq!(received.dom_event_name(), "gmkb:component-delete-requested");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BuilderEvent>,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// * `capacity` - Number of events to buffer before the oldest are dropped
    ///   for lagging subscribers
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<BuilderEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: BuilderEvent) {
        let _ = self.tx.send(event);
    }
}

//! Builder core
//!
//! Wires the state manager, renderer, section integration and controls into
//! the one-directional loop:
//!
//! ```text
//! click ─▶ control event ─▶ mutation ─▶ notification ─▶ scheduled render
//!                                                         └─▶ section placement
//! ```
//!
//! Everything here is synchronous. The session actor owns a `Builder` and
//! drives it from commands, timers and bus events.

use std::sync::Arc;

use mkb_common::config::BuilderConfig;
use mkb_common::events::{BuilderEvent, ControlAction, EventBus, NotificationLevel};
use mkb_common::ids::ComponentId;
use mkb_common::model::MediaKitState;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::autosave::AutosavePolicy;
use crate::controls::{ControlRequest, ControlsManager};
use crate::dom::{Document, NodeId};
use crate::error::{Error, Result};
use crate::registry::ComponentRegistry;
use crate::render::{RenderReport, RenderScheduler, Renderer};
use crate::sections::{PlacementReport, SectionIntegration};
use crate::state::{ChangeCause, Direction, Mutation, Outcome, StateManager};

/// Result of one render-and-place pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassReport {
    pub render: RenderReport,
    pub placement: PlacementReport,
}

pub struct Builder {
    events: EventBus,
    state: StateManager,
    changes: watch::Receiver<(u64, ChangeCause)>,
    document: Document,
    renderer: Renderer,
    controls: ControlsManager,
    requests: mpsc::UnboundedReceiver<ControlRequest>,
    sections: SectionIntegration,
    scheduler: RenderScheduler,
    autosave: AutosavePolicy,
    selected: Option<ComponentId>,
}

impl Builder {
    pub fn new(config: &BuilderConfig, registry: ComponentRegistry) -> Self {
        Self::with_state(config, registry, MediaKitState::default())
    }

    pub fn with_state(config: &BuilderConfig, registry: ComponentRegistry, state: MediaKitState) -> Self {
        let events = EventBus::new(config.event_bus_capacity);
        let mut manager = StateManager::with_state(state, config.history.max_entries);

        let (tx, changes) = watch::channel((manager.revision(), ChangeCause::Load));
        let bus = events.clone();
        manager.subscribe(move |change| {
            tx.send_replace((change.revision, change.cause));
            bus.emit_lossy(BuilderEvent::StateChanged {
                revision: change.revision,
                timestamp: mkb_common::time::now(),
            });
        });

        let (request_tx, requests) = mpsc::unbounded_channel();
        let controls = ControlsManager::new(events.clone(), request_tx);
        let renderer = Renderer::new(Arc::new(registry), controls.clone(), events.clone());

        let mut builder = Self {
            events,
            state: manager,
            changes,
            document: Document::new(&config.render.container_id),
            renderer,
            controls,
            requests,
            sections: SectionIntegration::new(),
            scheduler: RenderScheduler::new(config.render.debounce()),
            autosave: AutosavePolicy::new(&config.autosave),
            selected: None,
        };
        // The initial state still needs a first render
        builder.scheduler.request(Instant::now());
        builder
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn state(&self) -> &StateManager {
        &self.state
    }

    pub fn snapshot(&self) -> Arc<MediaKitState> {
        self.state.get_state()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn sections(&self) -> &SectionIntegration {
        &self.sections
    }

    pub fn scheduler(&self) -> &RenderScheduler {
        &self.scheduler
    }

    pub fn selected(&self) -> Option<&ComponentId> {
        self.selected.as_ref()
    }

    // ========================================
    // Mutations
    // ========================================

    /// Run `f` against the state manager, then pick up any notification it caused
    pub fn mutate<T>(&mut self, f: impl FnOnce(&mut StateManager) -> Result<T>) -> Result<T> {
        let result = f(&mut self.state);
        self.poll_changes(Instant::now());
        result
    }

    pub fn apply(&mut self, mutation: Mutation) -> Result<Outcome> {
        self.mutate(|state| state.apply(mutation))
    }

    pub fn undo(&mut self) -> bool {
        self.mutate(|state| Ok(state.undo())).unwrap_or(false)
    }

    pub fn redo(&mut self) -> bool {
        self.mutate(|state| Ok(state.redo())).unwrap_or(false)
    }

    /// Replace the whole state (after a load). Unsaved edits to the old
    /// state are discarded, so a pending autosave is cancelled.
    pub fn load_state(&mut self, state: MediaKitState) {
        self.selected = None;
        self.state.load_state(state);
        self.autosave.clear();
        self.poll_changes(Instant::now());
    }

    /// Turn a pending notification into a render request. Returns the cause.
    fn poll_changes(&mut self, now: Instant) -> Option<ChangeCause> {
        if !self.changes.has_changed().unwrap_or(false) {
            return None;
        }
        let (revision, cause) = *self.changes.borrow_and_update();
        debug!("Notified of revision {} ({:?})", revision, cause);

        if self.selected.as_ref().is_some_and(|id| self.state.get_state().component(id).is_none()) {
            self.selected = None;
        }
        self.scheduler.request(now);
        if cause != ChangeCause::Load {
            self.autosave.mark_dirty(now);
        }
        Some(cause)
    }

    // ========================================
    // Rendering
    // ========================================

    pub fn next_render_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    /// Render if the coalescing window has elapsed
    pub fn render_if_due(&mut self, now: Instant) -> Result<Option<PassReport>> {
        if self.scheduler.is_due(now) {
            self.flush()
        } else {
            Ok(None)
        }
    }

    /// Run the pending render now, without waiting for its deadline
    pub fn flush(&mut self) -> Result<Option<PassReport>> {
        if !self.scheduler.begin() {
            return Ok(None);
        }
        let state = self.state.get_state();
        let result = self
            .renderer
            .render(&mut self.document, &state, self.state.revision())
            .and_then(|render| {
                let placement = self
                    .sections
                    .on_render_complete(&mut self.document, &state, &self.renderer)?;
                Ok(PassReport { render, placement })
            });
        self.scheduler.finish(Instant::now());
        result.map(Some)
    }

    pub fn html(&self) -> String {
        self.document.to_html(self.document.root())
    }

    pub fn node_of(&self, id: &ComponentId) -> Option<NodeId> {
        self.renderer.node_of(id)
    }

    // ========================================
    // Controls
    // ========================================

    /// Simulate a click on a node in the preview
    pub fn click(&self, target: NodeId) -> Option<BuilderEvent> {
        self.controls.handle_click(&self.document, target)
    }

    /// Click the `action` button of a rendered component
    pub fn click_control(&self, component_id: &ComponentId, action: ControlAction) -> Result<BuilderEvent> {
        let button = self
            .node_of(component_id)
            .and_then(|node| self.controls.button(&self.document, node, action))
            .ok_or_else(|| Error::ComponentNotFound(component_id.clone()))?;
        self.click(button)
            .ok_or_else(|| Error::ComponentNotFound(component_id.clone()))
    }

    /// Wait for the next queued control request
    pub async fn next_control_request(&mut self) -> Option<ControlRequest> {
        self.requests.recv().await
    }

    /// Carry out every queued control request. Each failure is surfaced as a
    /// toast; the first one is returned after the queue is empty.
    pub fn process_control_requests(&mut self) -> Result<usize> {
        let mut handled = 0;
        let mut first_error = None;
        while let Ok(request) = self.requests.try_recv() {
            handled += 1;
            if let Err(e) = self.handle_control_request(request.action, &request.component_id) {
                self.notify_error(&e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(handled),
        }
    }

    pub fn handle_control_request(&mut self, action: ControlAction, component_id: &ComponentId) -> Result<()> {
        debug!("Handling {} for {}", action, component_id);
        match action {
            ControlAction::Edit => {
                if self.state.get_state().component(component_id).is_none() {
                    return Err(Error::ComponentNotFound(component_id.clone()));
                }
                self.selected = Some(component_id.clone());
                self.events.emit_lossy(BuilderEvent::ComponentSelected {
                    component_id: component_id.clone(),
                });
                Ok(())
            }
            ControlAction::Duplicate => self.mutate(|s| s.duplicate_component(component_id)).map(|_| ()),
            ControlAction::Delete => {
                self.mutate(|s| s.remove_component(component_id))?;
                info!("Deleted component {}", component_id);
                Ok(())
            }
            ControlAction::MoveUp => self.mutate(|s| s.move_component(component_id, Direction::Up)).map(|_| ()),
            ControlAction::MoveDown => self
                .mutate(|s| s.move_component(component_id, Direction::Down))
                .map(|_| ()),
        }
    }

    /// Surface a failed operation as a toast
    pub fn notify_error(&self, error: &Error) {
        warn!("Operation failed: {}", error);
        self.events.emit_lossy(BuilderEvent::Notification {
            level: NotificationLevel::Error,
            message: error.user_message(),
        });
    }

    // ========================================
    // Autosave
    // ========================================

    pub fn autosave_due(&self) -> Option<Instant> {
        self.autosave.due_at()
    }

    pub fn is_dirty(&self) -> bool {
        self.autosave.is_dirty()
    }

    /// A save of the current snapshot is starting
    pub fn begin_save(&mut self) -> (u64, Arc<MediaKitState>) {
        self.autosave.clear();
        (self.state.revision(), self.state.get_state())
    }

    /// A save failed; the state is unsaved again
    pub fn save_failed(&mut self, now: Instant) {
        self.autosave.mark_dirty(now);
    }
}

impl std::fmt::Debug for Builder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("state", &self.state)
            .field("phase", &self.scheduler.phase())
            .field("selected", &self.selected)
            .finish()
    }
}

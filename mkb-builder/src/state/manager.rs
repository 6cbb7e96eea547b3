//! State Manager
//!
//! Sole owner of the live `MediaKitState`. Every mutation validates its input
//! first and only then changes the state, so a failed call leaves the state
//! exactly as it was. Committed changes bump the revision and notify
//! subscribers synchronously.
//!
//! Batches collect any number of mutations into one commit: one history
//! entry, one notification. If the batch body fails, the state rolls back to
//! where the batch started and nobody is notified.

use std::sync::Arc;

use mkb_common::ids::{ComponentId, SectionId};
use mkb_common::model::{ComponentProps, ComponentRecord, MediaKitState, Section, SectionSlot, SectionType};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::history::History;
use super::mutation::{Direction, Mutation, Outcome};
use crate::error::{Error, Result};

pub type SubscriptionId = u64;

/// What produced a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeCause {
    Mutation,
    Batch { mutations: usize },
    Undo,
    Redo,
    Load,
}

/// Passed to every subscriber after a commit
#[derive(Debug, Clone)]
pub struct StateChange {
    pub revision: u64,
    pub state: Arc<MediaKitState>,
    pub cause: ChangeCause,
}

type Listener = Box<dyn FnMut(&StateChange) + Send>;

#[derive(Debug)]
struct BatchFrame {
    snapshot: Arc<MediaKitState>,
    mutations: usize,
}

pub struct StateManager {
    state: Arc<MediaKitState>,
    revision: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: SubscriptionId,
    batch: Option<BatchFrame>,
    history: History,
}

impl StateManager {
    pub fn new(max_history: usize) -> Self {
        Self::with_state(MediaKitState::default(), max_history)
    }

    /// Start from a loaded state, repairing any broken invariants
    pub fn with_state(mut state: MediaKitState, max_history: usize) -> Self {
        state.normalize();
        Self {
            state: Arc::new(state),
            revision: 0,
            listeners: Vec::new(),
            next_subscription: 1,
            batch: None,
            history: History::new(max_history),
        }
    }

    /// Current snapshot; cheap to clone and never changes underneath the caller
    pub fn get_state(&self) -> Arc<MediaKitState> {
        Arc::clone(&self.state)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn in_batch(&self) -> bool {
        self.batch.is_some()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // ========================================
    // Subscriptions
    // ========================================

    /// Register a listener called after every commit
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&StateChange) + Send + 'static,
    {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        before != self.listeners.len()
    }

    fn notify(&mut self, cause: ChangeCause) {
        self.revision += 1;
        let change = StateChange {
            revision: self.revision,
            state: Arc::clone(&self.state),
            cause,
        };
        debug!("State revision {} ({:?})", self.revision, cause);
        for (_, listener) in &mut self.listeners {
            listener(&change);
        }
    }

    /// Apply an already validated change
    fn commit(&mut self, apply: impl FnOnce(&mut MediaKitState)) {
        let before = self.batch.is_none().then(|| Arc::clone(&self.state));
        apply(Arc::make_mut(&mut self.state));
        debug_assert!(
            self.state.violations().is_empty(),
            "mutation broke an invariant: {:?}",
            self.state.violations()
        );

        if let Some(frame) = self.batch.as_mut() {
            frame.mutations += 1;
        } else if let Some(before) = before {
            self.history.record(before);
            self.notify(ChangeCause::Mutation);
        }
    }

    // ========================================
    // Batches
    // ========================================

    /// Run `body` as one atomic change.
    ///
    /// Subscribers see a single notification however many mutations the body
    /// performs (none if it performs none). A nested batch joins the outer
    /// one's notification and undo step, but still rolls back on its own: if
    /// it fails, only its mutations are undone and the outer body may carry on.
    pub fn batch_update<T, F>(&mut self, body: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        if let Some(frame) = self.batch.as_ref() {
            let snapshot = Arc::clone(&self.state);
            let mutations = frame.mutations;
            let result = body(self);
            if let Err(e) = &result {
                warn!("Nested batch rolled back: {}", e);
                self.state = snapshot;
                if let Some(frame) = self.batch.as_mut() {
                    frame.mutations = mutations;
                }
            }
            return result;
        }

        self.batch = Some(BatchFrame {
            snapshot: Arc::clone(&self.state),
            mutations: 0,
        });
        let result = body(self);
        let Some(frame) = self.batch.take() else {
            return result;
        };

        match result {
            Ok(value) => {
                if frame.mutations > 0 {
                    self.history.record(frame.snapshot);
                    self.notify(ChangeCause::Batch {
                        mutations: frame.mutations,
                    });
                }
                Ok(value)
            }
            Err(e) => {
                warn!("Batch rolled back after {} mutations: {}", frame.mutations, e);
                self.state = frame.snapshot;
                Err(e)
            }
        }
    }

    // ========================================
    // Component operations
    // ========================================

    fn require_component(&self, id: &ComponentId) -> Result<&ComponentRecord> {
        self.state
            .component(id)
            .ok_or_else(|| Error::ComponentNotFound(id.clone()))
    }

    fn require_section(&self, id: &SectionId) -> Result<&Section> {
        self.state
            .section(id)
            .ok_or_else(|| Error::SectionNotFound(id.clone()))
    }

    fn layout_index(&self, id: &ComponentId) -> Result<usize> {
        self.state
            .layout
            .iter()
            .position(|c| c == id)
            .ok_or_else(|| Error::ComponentNotFound(id.clone()))
    }

    /// Add a component under a caller-chosen ID, at the end of the layout
    pub fn init_component(&mut self, id: ComponentId, component_type: &str, data: Value) -> Result<ComponentId> {
        if self.state.components.contains_key(&id) {
            warn!("Rejected duplicate component id {}", id);
            return Err(Error::DuplicateId(id));
        }
        let props = ComponentProps::from_parts(component_type, data)?;
        let record = ComponentRecord::new(id.clone(), props);

        self.commit(|state| {
            state.layout.push(record.id.clone());
            state.components.insert(record.id.clone(), record);
        });
        debug!("Added {} component {}", component_type, id);
        Ok(id)
    }

    /// Add a component with a freshly generated ID
    pub fn add_component(&mut self, component_type: &str, data: Value) -> Result<ComponentId> {
        let id = self.fresh_component_id(component_type);
        self.init_component(id, component_type, data)
    }

    fn fresh_component_id(&self, component_type: &str) -> ComponentId {
        loop {
            let id = ComponentId::generate(component_type);
            if !self.state.components.contains_key(&id) {
                return id;
            }
        }
    }

    /// Shallow-merge `patch` into the component's data
    ///
    /// A patch that leaves the data unchanged commits nothing.
    pub fn update_component(&mut self, id: &ComponentId, patch: &Map<String, Value>) -> Result<()> {
        let record = self.require_component(id)?;
        let props = record.props.patched(patch)?;
        if props == record.props {
            debug!("Update of {} changed nothing", id);
            return Ok(());
        }

        self.commit(|state| {
            if let Some(record) = state.components.get_mut(id) {
                record.props = props;
            }
        });
        Ok(())
    }

    /// Remove the component from the layout and from any section slot
    pub fn remove_component(&mut self, id: &ComponentId) -> Result<ComponentRecord> {
        let record = self.require_component(id)?.clone();
        self.commit(|state| {
            state.components.remove(id);
            state.layout.retain(|c| c != id);
            for section in &mut state.sections {
                section.detach(id);
            }
        });
        debug!("Removed component {}", id);
        Ok(record)
    }

    /// Swap with the neighbour in `direction`. Returns false (and commits
    /// nothing) when already at that edge.
    pub fn move_component(&mut self, id: &ComponentId, direction: Direction) -> Result<bool> {
        let index = self.layout_index(id)?;
        let target = match direction {
            Direction::Up if index == 0 => return Ok(false),
            Direction::Up => index - 1,
            Direction::Down if index + 1 >= self.state.layout.len() => return Ok(false),
            Direction::Down => index + 1,
        };

        let section_swap = self.section_neighbour(id, direction);
        self.commit(|state| {
            state.layout.swap(index, target);
            if let Some((section_id, a, b)) = section_swap {
                if let Some(section) = state.section_mut(&section_id) {
                    section.components.swap(a, b);
                }
            }
        });
        Ok(true)
    }

    /// Slot indices to swap so a sectioned component also moves within its column
    fn section_neighbour(&self, id: &ComponentId, direction: Direction) -> Option<(SectionId, usize, usize)> {
        let section = self.state.sections.iter().find(|s| s.contains(id))?;
        let slot = section.components.iter().position(|s| &s.component_id == id)?;
        let column = section.components[slot].column;
        let neighbour = match direction {
            Direction::Up => section.components[..slot].iter().rposition(|s| s.column == column),
            Direction::Down => section.components[slot + 1..]
                .iter()
                .position(|s| s.column == column)
                .map(|p| p + slot + 1),
        }?;
        Some((section.section_id.clone(), slot, neighbour))
    }

    /// Move the layout entry at `from` to position `to`
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.state.layout.len();
        for index in [from, to] {
            if index >= len {
                return Err(Error::PositionOutOfRange { index, len });
            }
        }
        if from == to {
            return Ok(());
        }
        self.commit(|state| {
            let id = state.layout.remove(from);
            state.layout.insert(to, id);
        });
        Ok(())
    }

    /// Copy a component; the copy lands right after the original, in the
    /// same section column when the original is sectioned.
    pub fn duplicate_component(&mut self, id: &ComponentId) -> Result<ComponentId> {
        let original = self.require_component(id)?;
        let props = original.props.clone();
        let new_id = self.fresh_component_id(original.component_type());
        let index = self.layout_index(id)?;
        let placement = self
            .state
            .sections
            .iter()
            .enumerate()
            .find_map(|(i, s)| {
                s.components
                    .iter()
                    .position(|slot| &slot.component_id == id)
                    .map(|slot| (i, slot, s.components[slot].column))
            });

        let record = ComponentRecord::new(new_id.clone(), props);
        self.commit(|state| {
            state.layout.insert(index + 1, new_id.clone());
            state.components.insert(new_id.clone(), record);
            if let Some((section, slot, column)) = placement {
                state.sections[section].components.insert(
                    slot + 1,
                    SectionSlot {
                        component_id: new_id.clone(),
                        column,
                    },
                );
            }
        });
        debug!("Duplicated {} as {}", id, new_id);
        Ok(new_id)
    }

    // ========================================
    // Section operations
    // ========================================

    pub fn add_section(&mut self, section_type: SectionType) -> Result<SectionId> {
        let id = loop {
            let id = SectionId::generate();
            if self.state.section(&id).is_none() {
                break id;
            }
        };
        self.init_section(id.clone(), section_type)?;
        Ok(id)
    }

    /// Add an empty section under a caller-chosen ID
    pub fn init_section(&mut self, section_id: SectionId, section_type: SectionType) -> Result<()> {
        if self.state.section(&section_id).is_some() {
            return Err(Error::DuplicateSectionId(section_id));
        }
        self.commit(|state| state.sections.push(Section::new(section_id, section_type)));
        Ok(())
    }

    /// Remove a section; its components stay in the layout, unsectioned
    pub fn remove_section(&mut self, section_id: &SectionId) -> Result<Section> {
        let section = self.require_section(section_id)?.clone();
        self.commit(|state| state.sections.retain(|s| &s.section_id != section_id));
        Ok(section)
    }

    /// Place a component in a section column, taking it out of any other slot
    pub fn assign_to_section(&mut self, component_id: &ComponentId, section_id: &SectionId, column: u8) -> Result<()> {
        self.require_component(component_id)?;
        let section = self.require_section(section_id)?;
        if column == 0 || column > section.column_count() {
            return Err(Error::InvalidColumn {
                section_id: section_id.clone(),
                column,
            });
        }
        if section.column_of(component_id) == Some(column) {
            return Err(Error::AlreadyInSection {
                component_id: component_id.clone(),
                section_id: section_id.clone(),
            });
        }

        self.commit(|state| {
            for section in &mut state.sections {
                section.detach(component_id);
            }
            if let Some(section) = state.section_mut(section_id) {
                section.components.push(SectionSlot {
                    component_id: component_id.clone(),
                    column,
                });
            }
        });
        Ok(())
    }

    /// Take a component out of its section. Returns false if it had none.
    pub fn unassign_from_section(&mut self, component_id: &ComponentId) -> Result<bool> {
        self.require_component(component_id)?;
        if self.state.placement_of(component_id).is_none() {
            return Ok(false);
        }
        self.commit(|state| {
            for section in &mut state.sections {
                section.detach(component_id);
            }
        });
        Ok(true)
    }

    /// Shallow-merge into `globalSettings`
    pub fn update_global_settings(&mut self, patch: &Map<String, Value>) -> Result<()> {
        let unchanged = patch
            .iter()
            .all(|(k, v)| self.state.global_settings.get(k) == Some(v));
        if unchanged {
            return Ok(());
        }
        self.commit(|state| {
            for (key, value) in patch {
                state.global_settings.insert(key.clone(), value.clone());
            }
        });
        Ok(())
    }

    // ========================================
    // Whole-state operations
    // ========================================

    /// Replace the state wholesale (after a load); clears history
    pub fn load_state(&mut self, mut state: MediaKitState) {
        let repaired = state.normalize();
        if !repaired.is_empty() {
            warn!("Loaded state needed {} repairs", repaired.len());
        }
        info!(
            "Loaded media kit: {} components, {} sections",
            state.components.len(),
            state.sections.len()
        );
        self.state = Arc::new(state);
        self.history.clear();
        self.notify(ChangeCause::Load);
    }

    pub fn undo(&mut self) -> bool {
        if self.batch.is_some() {
            return false;
        }
        match self.history.undo(Arc::clone(&self.state)) {
            Some(previous) => {
                self.state = previous;
                self.notify(ChangeCause::Undo);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        if self.batch.is_some() {
            return false;
        }
        match self.history.redo(Arc::clone(&self.state)) {
            Some(next) => {
                self.state = next;
                self.notify(ChangeCause::Redo);
                true
            }
            None => false,
        }
    }

    /// Apply a mutation value
    pub fn apply(&mut self, mutation: Mutation) -> Result<Outcome> {
        match mutation {
            Mutation::InitComponent {
                id,
                component_type,
                data,
            } => self.init_component(id, &component_type, data).map(Outcome::Component),
            Mutation::AddComponent { component_type, data } => {
                self.add_component(&component_type, data).map(Outcome::Component)
            }
            Mutation::UpdateComponent { id, patch } => self.update_component(&id, &patch).map(|_| Outcome::Done),
            Mutation::RemoveComponent { id } => self.remove_component(&id).map(|_| Outcome::Done),
            Mutation::MoveComponent { id, direction } => self.move_component(&id, direction).map(Outcome::Changed),
            Mutation::Reorder { from, to } => self.reorder(from, to).map(|_| Outcome::Done),
            Mutation::DuplicateComponent { id } => self.duplicate_component(&id).map(Outcome::Component),
            Mutation::AddSection { section_type } => self.add_section(section_type).map(Outcome::Section),
            Mutation::InitSection {
                section_id,
                section_type,
            } => self
                .init_section(section_id.clone(), section_type)
                .map(|_| Outcome::Section(section_id)),
            Mutation::RemoveSection { section_id } => self.remove_section(&section_id).map(|_| Outcome::Done),
            Mutation::AssignToSection {
                component_id,
                section_id,
                column,
            } => self
                .assign_to_section(&component_id, &section_id, column)
                .map(|_| Outcome::Done),
            Mutation::UnassignFromSection { component_id } => {
                self.unassign_from_section(&component_id).map(Outcome::Changed)
            }
            Mutation::UpdateGlobalSettings { patch } => self.update_global_settings(&patch).map(|_| Outcome::Done),
            Mutation::Batch { mutations } => self.batch_update(|manager| {
                mutations
                    .into_iter()
                    .map(|m| manager.apply(m))
                    .collect::<Result<Vec<_>>>()
                    .map(Outcome::Batch)
            }),
        }
    }
}

impl std::fmt::Debug for StateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateManager")
            .field("revision", &self.revision)
            .field("components", &self.state.components.len())
            .field("listeners", &self.listeners.len())
            .field("in_batch", &self.batch.is_some())
            .finish()
    }
}

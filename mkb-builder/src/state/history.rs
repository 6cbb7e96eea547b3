//! Undo/redo snapshots
//!
//! Snapshots are `Arc`s of whole states. The state manager mutates through
//! `Arc::make_mut`, so a snapshot only costs a deep copy when the next
//! mutation happens while the snapshot is still held.

use std::collections::VecDeque;
use std::sync::Arc;

use mkb_common::model::MediaKitState;

#[derive(Debug)]
pub struct History {
    undo: VecDeque<Arc<MediaKitState>>,
    redo: Vec<Arc<MediaKitState>>,
    max_entries: usize,
}

impl History {
    pub fn new(max_entries: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// Record the state as it was before a committed change
    pub fn record(&mut self, before: Arc<MediaKitState>) {
        self.undo.push_back(before);
        while self.undo.len() > self.max_entries {
            self.undo.pop_front();
        }
        self.redo.clear();
    }

    /// Step back: returns the state to restore, stashing `current` for redo
    pub fn undo(&mut self, current: Arc<MediaKitState>) -> Option<Arc<MediaKitState>> {
        let previous = self.undo.pop_back()?;
        self.redo.push(current);
        Some(previous)
    }

    pub fn redo(&mut self, current: Arc<MediaKitState>) -> Option<Arc<MediaKitState>> {
        let next = self.redo.pop()?;
        self.undo.push_back(current);
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

//! In-process bridge
//!
//! Stores the serialized JSON exactly as it would be sent to WordPress, so a
//! load goes through the same decoding path as a real one. Used by the CLI's
//! offline mode and by tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use mkb_common::model::{decode_wordpress_state, MediaKitState};
use tracing::debug;

use super::{PersistenceBridge, SaveReceipt};
use crate::error::{Error, Result};

#[derive(Debug, Default)]
pub struct MemoryBridge {
    post_id: u64,
    posts: Mutex<HashMap<u64, String>>,
    /// Number of upcoming saves that fail
    fail_saves: AtomicUsize,
    /// Number of upcoming saves that are refused outright
    reject_saves: AtomicUsize,
    delay: Option<Duration>,
    saves: AtomicUsize,
}

impl MemoryBridge {
    pub fn new(post_id: u64) -> Self {
        Self {
            post_id,
            ..Self::default()
        }
    }

    /// Hold each save for `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make the next `count` saves fail with a bridge error
    pub fn fail_next_saves(&self, count: usize) {
        self.fail_saves.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` saves fail as WordPress does for a stale nonce
    pub fn reject_next_saves(&self, count: usize) {
        self.reject_saves.store(count, Ordering::SeqCst);
    }

    /// Seed a post with a raw stored payload
    pub fn insert_raw(&self, post_id: u64, json: impl Into<String>) {
        if let Ok(mut posts) = self.posts.lock() {
            posts.insert(post_id, json.into());
        }
    }

    /// Raw stored payload for a post
    pub fn raw(&self, post_id: u64) -> Option<String> {
        self.posts.lock().ok()?.get(&post_id).cloned()
    }

    /// Successful saves so far
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PersistenceBridge for MemoryBridge {
    async fn save(&self, state: &MediaKitState) -> Result<SaveReceipt> {
        let payload = serde_json::to_string(state)?;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if countdown(&self.reject_saves) {
            return Err(Error::Rejected("Invalid nonce".into()));
        }
        if countdown(&self.fail_saves) {
            return Err(Error::Bridge("simulated save failure".into()));
        }

        self.posts
            .lock()
            .map_err(|_| Error::Bridge("post store poisoned".into()))?
            .insert(self.post_id, payload);
        self.saves.fetch_add(1, Ordering::SeqCst);
        debug!("Stored post {} in memory", self.post_id);
        Ok(SaveReceipt::for_state(state, "Media kit saved successfully"))
    }

    async fn load(&self, post_id: u64) -> Result<MediaKitState> {
        let Some(raw) = self.raw(post_id) else {
            return Ok(MediaKitState::default());
        };
        let value: serde_json::Value = serde_json::from_str(&raw)?;
        Ok(decode_wordpress_state(value)?
            .map(|(state, _)| state)
            .unwrap_or_default())
    }
}

/// Take one from `counter` if it is above zero
fn countdown(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

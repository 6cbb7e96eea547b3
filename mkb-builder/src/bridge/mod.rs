//! WordPress persistence bridge
//!
//! The builder treats persistence as a network collaborator behind
//! [`PersistenceBridge`]. Retries are the caller's business (see
//! [`crate::autosave`]); a bridge makes exactly one attempt per call.

mod memory;
mod wordpress;

pub use memory::MemoryBridge;
pub use wordpress::WordPressBridge;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mkb_common::model::MediaKitState;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Acknowledgement of a successful save
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveReceipt {
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub components_count: usize,
    pub sections_count: usize,
}

impl SaveReceipt {
    /// Receipt describing `state`, for bridges that do not report counts
    pub fn for_state(state: &MediaKitState, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            timestamp: mkb_common::time::now(),
            components_count: state.components.len(),
            sections_count: state.sections.len(),
        }
    }
}

#[async_trait]
pub trait PersistenceBridge: Send + Sync {
    /// Persist `state` for the bridge's post
    async fn save(&self, state: &MediaKitState) -> Result<SaveReceipt>;

    /// Fetch the saved state for `post_id`; an empty state if nothing is saved
    async fn load(&self, post_id: u64) -> Result<MediaKitState>;
}

//! Autosave scheduling and save exclusion
//!
//! - [`SaveGuard`] admits one save at a time; a second caller gets
//!   [`Error::AlreadySaving`] immediately instead of queueing.
//! - [`AutosavePolicy`] decides when a dirty state should be saved: after a
//!   quiet period with no further changes, but no later than a maximum
//!   interval after the first unsaved change.
//! - [`save_with_retry`] retries retryable failures with linear backoff.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mkb_common::config::AutosaveConfig;
use mkb_common::model::MediaKitState;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::bridge::{PersistenceBridge, SaveReceipt};
use crate::error::{Error, Result};

/// Admits at most one in-flight save
#[derive(Debug, Clone, Default)]
pub struct SaveGuard {
    busy: Arc<AtomicBool>,
}

/// Held for the duration of a save; releases the guard on drop
#[derive(Debug)]
pub struct SaveTicket {
    busy: Arc<AtomicBool>,
}

impl SaveGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Result<SaveTicket> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::AlreadySaving)?;
        Ok(SaveTicket {
            busy: Arc::clone(&self.busy),
        })
    }

    pub fn is_saving(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for SaveTicket {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Quiet-period debounce with a max-interval ceiling
#[derive(Debug, Clone)]
pub struct AutosavePolicy {
    enabled: bool,
    quiet_period: Duration,
    max_interval: Duration,
    first_change: Option<Instant>,
    last_change: Option<Instant>,
}

impl AutosavePolicy {
    pub fn new(config: &AutosaveConfig) -> Self {
        Self {
            enabled: config.enabled,
            quiet_period: config.quiet_period(),
            max_interval: config.max_interval(),
            first_change: None,
            last_change: None,
        }
    }

    pub fn mark_dirty(&mut self, now: Instant) {
        self.first_change.get_or_insert(now);
        self.last_change = Some(now);
    }

    pub fn is_dirty(&self) -> bool {
        self.last_change.is_some()
    }

    /// When the next autosave should start, if one is pending
    pub fn due_at(&self) -> Option<Instant> {
        if !self.enabled {
            return None;
        }
        let quiet = self.last_change? + self.quiet_period;
        let ceiling = self.first_change? + self.max_interval;
        Some(quiet.min(ceiling))
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.due_at().is_some_and(|due| now >= due)
    }

    /// Called when a save of the current state starts
    pub fn clear(&mut self) {
        self.first_change = None;
        self.last_change = None;
    }
}

/// Bounded retry with linear backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &AutosaveConfig) -> Self {
        Self {
            attempts: config.retry_attempts.max(1),
            delay: config.retry_delay(),
        }
    }

    pub fn once() -> Self {
        Self {
            attempts: 1,
            delay: Duration::ZERO,
        }
    }

    /// Wait before attempt number `attempt` (1-based; the first never waits)
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.delay * attempt.saturating_sub(1)
    }
}

/// Save through `bridge`, retrying failures that may succeed later
pub async fn save_with_retry(
    bridge: &dyn PersistenceBridge,
    state: &MediaKitState,
    retry: RetryPolicy,
) -> Result<SaveReceipt> {
    let mut attempt = 1;
    loop {
        match bridge.save(state).await {
            Ok(receipt) => {
                if attempt > 1 {
                    debug!("Save succeeded on attempt {}", attempt);
                }
                return Ok(receipt);
            }
            Err(e) if e.is_retryable() && attempt < retry.attempts => {
                attempt += 1;
                let wait = retry.backoff(attempt);
                warn!("Save failed ({}), retrying in {:?}", e, wait);
                tokio::time::sleep(wait).await;
            }
            Err(e) => return Err(e),
        }
    }
}

//! Render debounce state machine
//!
//! ```text
//!            request                 deadline             finish
//!   Idle ────────────▶ Scheduled ───────────▶ Rendering ─────────▶ Idle
//!                         ▲                      │
//!                         │ finish      request  ▼
//!                         └──────────────── RenderQueued
//! ```
//!
//! A single pending slot: any number of requests inside the coalescing
//! window, or while a render is running, collapse into one render.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPhase {
    Idle,
    /// A render will run at `deadline`
    Scheduled { deadline: Instant },
    Rendering,
    /// A change arrived while rendering; another render follows
    RenderQueued,
}

#[derive(Debug)]
pub struct RenderScheduler {
    phase: RenderPhase,
    window: Duration,
    /// Requests absorbed into an already pending render
    coalesced: u64,
}

impl RenderScheduler {
    pub fn new(window: Duration) -> Self {
        Self {
            phase: RenderPhase::Idle,
            window,
            coalesced: 0,
        }
    }

    pub fn phase(&self) -> RenderPhase {
        self.phase
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn coalesced(&self) -> u64 {
        self.coalesced
    }

    /// Note that the state changed. Returns true if this request opened a
    /// new pending render rather than joining one.
    pub fn request(&mut self, now: Instant) -> bool {
        match self.phase {
            RenderPhase::Idle => {
                self.phase = RenderPhase::Scheduled {
                    deadline: now + self.window,
                };
                true
            }
            RenderPhase::Rendering => {
                self.phase = RenderPhase::RenderQueued;
                true
            }
            RenderPhase::Scheduled { .. } | RenderPhase::RenderQueued => {
                self.coalesced += 1;
                false
            }
        }
    }

    /// When the pending render should run
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.phase {
            RenderPhase::Scheduled { deadline } => Some(deadline),
            _ => None,
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        matches!(self.phase, RenderPhase::Scheduled { deadline } if now >= deadline)
    }

    /// Enter `Rendering`. Returns false if nothing was pending.
    ///
    /// Starting before the deadline is allowed, for explicit flushes.
    pub fn begin(&mut self) -> bool {
        match self.phase {
            RenderPhase::Scheduled { .. } => {
                self.phase = RenderPhase::Rendering;
                true
            }
            _ => false,
        }
    }

    /// Leave `Rendering`; a queued request becomes a new pending render
    pub fn finish(&mut self, now: Instant) {
        self.phase = match self.phase {
            RenderPhase::RenderQueued => RenderPhase::Scheduled {
                deadline: now + self.window,
            },
            _ => RenderPhase::Idle,
        };
    }
}

//! Per-session aggregation state and the shared session store.
//!
//! One `Session` tracks one in-progress report for one (owner, conversation)
//! pair. The store is a coarse map of `session_id → Arc<SessionSlot>`; entry
//! creation and lookup go through the map's `RwLock`, while every mutation of
//! a session's fields happens under that slot's own `tokio::sync::Mutex`.
//! The slot lock is held across the full finalization call, so at most one
//! transition is in flight per session at any time.

pub mod events;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

// ─── Session model ───────────────────────────────────────────────────────────

/// Aggregation mode of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// No report in progress; waiting for a trigger phrase.
    Idle,
    /// Trigger fired; fragments are being accumulated.
    Collecting,
    /// Accumulated text has been handed to the finalizer.
    Finalizing,
}

/// One in-progress report. Field mutation requires the owning slot's lock.
#[derive(Debug)]
pub struct Session {
    pub session_id: String,
    pub owner_id: String,
    pub mode: SessionMode,
    /// Ordered concatenation of admitted fragment texts. Append-only.
    pub accumulated_text: String,
    pub fragment_count: u32,
    /// Monotonic clock — basis for idle-time queries.
    pub last_activity_at: Instant,
    pub created_at: DateTime<Utc>,
}

impl Session {
    fn new(owner_id: &str, session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            owner_id: owner_id.to_string(),
            mode: SessionMode::Idle,
            accumulated_text: String::new(),
            fragment_count: 0,
            last_activity_at: Instant::now(),
            created_at: Utc::now(),
        }
    }

    /// Record activity (transition or admitted fragment).
    pub fn touch(&mut self) {
        self.last_activity_at = Instant::now();
    }

    /// Time since the last transition or admitted fragment.
    pub fn idle_for(&self) -> Duration {
        self.last_activity_at.elapsed()
    }

    /// Return to `Idle`, clearing accumulated content.
    /// Upholds: `mode == Idle` ⇒ empty text and zero fragment count.
    pub fn reset(&mut self) {
        self.mode = SessionMode::Idle;
        self.accumulated_text.clear();
        self.fragment_count = 0;
        self.touch();
    }
}

// ─── Slot ────────────────────────────────────────────────────────────────────

/// Map entry for one session: the exclusive lock plus a lock-free flag that
/// lets the live path route batches to the drop-and-report-`processing`
/// answer without queueing on a lock held across a finalizer call.
#[derive(Debug)]
pub struct SessionSlot {
    pub session: Mutex<Session>,
    finalizing: AtomicBool,
}

impl SessionSlot {
    fn new(owner_id: &str, session_id: &str) -> Self {
        Self {
            session: Mutex::new(Session::new(owner_id, session_id)),
            finalizing: AtomicBool::new(false),
        }
    }

    /// True while a finalizer invocation is in flight for this session.
    pub fn is_finalizing(&self) -> bool {
        self.finalizing.load(Ordering::Acquire)
    }

    pub(crate) fn set_finalizing(&self, value: bool) {
        self.finalizing.store(value, Ordering::Release);
    }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// Keyed map of session slots. Entry creation/lookup is low-contention and
/// uses the coarse map lock; per-session mutation uses the slot lock.
#[derive(Debug, Default)]
pub struct SessionStore {
    slots: RwLock<HashMap<String, Arc<SessionSlot>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the slot for `session_id`, creating it lazily (mode `Idle`) on
    /// first sight.
    pub async fn get_or_create(&self, owner_id: &str, session_id: &str) -> Arc<SessionSlot> {
        if let Some(slot) = self.slots.read().await.get(session_id) {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write().await;
        // Re-check: another request may have created it between locks.
        Arc::clone(
            slots
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(SessionSlot::new(owner_id, session_id))),
        )
    }

    pub async fn get(&self, session_id: &str) -> Option<Arc<SessionSlot>> {
        self.slots.read().await.get(session_id).cloned()
    }

    /// Snapshot of all slots — taken by the sweeper so it never holds the map
    /// lock while waiting on a per-session lock.
    pub async fn snapshot(&self) -> Vec<(String, Arc<SessionSlot>)> {
        self.slots
            .read()
            .await
            .iter()
            .map(|(id, slot)| (id.clone(), Arc::clone(slot)))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }
}

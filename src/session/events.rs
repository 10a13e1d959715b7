//! Structured session-transition events.
//!
//! Every state-machine decision emits a `SessionEvent` on a broadcast
//! channel instead of narrating to stdout, so tests and future consumers can
//! assert on transitions without parsing log text.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

/// What happened to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// Trigger phrase fired; session entered `Collecting`.
    CollectingStarted,
    /// A live batch was appended while `Collecting`.
    FragmentAdmitted,
    /// Finalizer accepted the report; session reset to `Idle`.
    Finalized,
    /// Session reset to `Idle` without creating anything.
    Discarded,
    /// Finalizer errored; session still reset to `Idle`.
    FinalizeFailed,
    /// Batch arrived while `Finalizing` and was dropped.
    BatchDropped,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionEvent {
    pub session_id: String,
    pub transition: Transition,
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// Broadcasts session events to all subscribers.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<SessionEvent>,
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }

    /// Emit an event. No subscribers is fine — the send result is ignored.
    pub fn emit(&self, session_id: &str, transition: Transition, reason: impl Into<String>) {
        let _ = self.tx.send(SessionEvent {
            session_id: session_id.to_string(),
            transition,
            reason: reason.into(),
            at: Utc::now(),
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_emitted_events() {
        let events = EventBroadcaster::new();
        let mut rx = events.subscribe();

        events.emit("s-1", Transition::CollectingStarted, "trigger phrase");
        let ev = rx.recv().await.expect("event");
        assert_eq!(ev.session_id, "s-1");
        assert_eq!(ev.transition, Transition::CollectingStarted);
        assert_eq!(ev.reason, "trigger phrase");
    }

    #[test]
    fn emit_without_subscribers_does_not_panic() {
        let events = EventBroadcaster::new();
        events.emit("s-1", Transition::Discarded, "abandoned");
    }
}

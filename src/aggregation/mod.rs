//! The per-session aggregation state machine.
//!
//! Consumes one batch of transcript fragments plus current session state and
//! decides among {keep collecting, discard, finalize}. All decisions for a
//! session happen under that session's slot lock; the lock is held across the
//! finalizer call so a concurrent path can never double-submit. Batches that
//! arrive while a session is `Finalizing` are dropped, never queued — an
//! explicit policy that bounds handler latency.

pub mod sweeper;

use crate::classifier::CompletenessClassifier;
use crate::finalizer::Finalizer;
use crate::session::events::{EventBroadcaster, Transition};
use crate::session::{Session, SessionMode, SessionSlot, SessionStore};
use crate::trigger::TriggerDetector;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

// ─── Runtime config ──────────────────────────────────────────────────────────

/// Resolved aggregation thresholds. Built from `AggregationSettings`; the
/// state machine reads these and never hard-codes a number.
#[derive(Debug, Clone)]
pub struct AggregationConfig {
    pub min_fragments: u32,
    pub target_fragments: u32,
    pub max_fragments: u32,
    pub min_discard_len: usize,
    pub idle_timeout: Duration,
    pub sweep_period: Duration,
    pub abandon_timeout: Duration,
    pub finalize_timeout: Duration,
}

impl From<&crate::config::AggregationSettings> for AggregationConfig {
    fn from(s: &crate::config::AggregationSettings) -> Self {
        Self {
            min_fragments: s.min_fragments,
            target_fragments: s.target_fragments,
            max_fragments: s.max_fragments,
            min_discard_len: s.min_discard_len,
            idle_timeout: s.idle_timeout(),
            sweep_period: s.sweep_period(),
            abandon_timeout: s.abandon_timeout(),
            finalize_timeout: s.finalize_timeout(),
        }
    }
}

// ─── Batch outcome ───────────────────────────────────────────────────────────

/// What one inbound batch (or sweep-driven finalize) produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchStatus {
    /// Session is `Idle` and no trigger fired.
    Listening,
    /// Session is `Collecting` with this many admitted fragments.
    Collecting(u32),
    /// Session is mid-finalization; the batch was dropped.
    Processing,
    /// Finalizer accepted the report.
    Finalized { message: String },
    /// Session reset without creating anything. A message is present when the
    /// user should be told (generator rejection), absent for silent discards.
    Discarded { message: Option<String> },
    /// Finalizer errored; session was still reset.
    Failed { message: String },
}

impl BatchStatus {
    /// Label used in events and logs (`collecting_3`, `listening`, ...).
    pub fn label(&self) -> String {
        match self {
            Self::Listening => "listening".to_string(),
            Self::Collecting(n) => format!("collecting_{n}"),
            Self::Processing => "processing".to_string(),
            Self::Finalized { .. } => "finalized".to_string(),
            Self::Discarded { .. } => "discarded".to_string(),
            Self::Failed { .. } => "failed".to_string(),
        }
    }
}

// ─── Aggregator ──────────────────────────────────────────────────────────────

pub struct Aggregator {
    config: AggregationConfig,
    store: SessionStore,
    trigger: TriggerDetector,
    classifier: Arc<dyn CompletenessClassifier>,
    finalizer: Arc<dyn Finalizer>,
    events: EventBroadcaster,
}

impl Aggregator {
    pub fn new(
        config: AggregationConfig,
        trigger: TriggerDetector,
        classifier: Arc<dyn CompletenessClassifier>,
        finalizer: Arc<dyn Finalizer>,
    ) -> Self {
        Self {
            config,
            store: SessionStore::new(),
            trigger,
            classifier,
            finalizer,
            events: EventBroadcaster::new(),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn events(&self) -> &EventBroadcaster {
        &self.events
    }

    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    /// Feed one batch of fragment texts into the session.
    ///
    /// `segments` is the ordered list of raw texts from one webhook delivery;
    /// empty/whitespace-only entries contribute nothing. An entirely empty
    /// batch is a no-op that just reports the current state.
    pub async fn ingest(&self, owner_id: &str, session_id: &str, segments: &[String]) -> BatchStatus {
        let batch_text = segments
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        let slot = self.store.get_or_create(owner_id, session_id).await;

        // Drop-and-report path: never queue behind an in-flight finalization.
        if slot.is_finalizing() {
            self.events
                .emit(session_id, Transition::BatchDropped, "finalizing");
            return BatchStatus::Processing;
        }

        let mut session = slot.session.lock().await;
        if batch_text.is_empty() {
            return self.current_status(&session);
        }

        match session.mode {
            // The flag check above races benignly with a finalize that starts
            // after it; the lock settles it, and the mode check here catches
            // the remaining window.
            SessionMode::Finalizing => {
                self.events
                    .emit(session_id, Transition::BatchDropped, "finalizing");
                BatchStatus::Processing
            }
            SessionMode::Idle => self.handle_idle(&mut session, &batch_text),
            SessionMode::Collecting => {
                self.handle_collecting(&slot, &mut session, &batch_text).await
            }
        }
    }

    fn current_status(&self, session: &Session) -> BatchStatus {
        match session.mode {
            SessionMode::Idle => BatchStatus::Listening,
            SessionMode::Collecting => BatchStatus::Collecting(session.fragment_count),
            SessionMode::Finalizing => BatchStatus::Processing,
        }
    }

    fn handle_idle(&self, session: &mut Session, batch_text: &str) -> BatchStatus {
        if !self.trigger.detect(batch_text) {
            return BatchStatus::Listening;
        }

        // Seed with the text after the trigger phrase; if the phrase ended
        // the utterance, keep the whole batch so nothing is lost.
        let seed = self
            .trigger
            .extract_content(batch_text)
            .unwrap_or(batch_text)
            .to_string();
        session.mode = SessionMode::Collecting;
        session.accumulated_text = seed;
        session.fragment_count = 1;
        session.touch();

        info!(session_id = %session.session_id, "trigger fired, collecting");
        self.events.emit(
            &session.session_id,
            Transition::CollectingStarted,
            "trigger phrase",
        );
        BatchStatus::Collecting(1)
    }

    async fn handle_collecting(
        &self,
        slot: &SessionSlot,
        session: &mut Session,
        batch_text: &str,
    ) -> BatchStatus {
        if !session.accumulated_text.is_empty() {
            session.accumulated_text.push(' ');
        }
        session.accumulated_text.push_str(batch_text);
        session.fragment_count += 1;
        session.touch();

        let n = session.fragment_count;
        self.events.emit(
            &session.session_id,
            Transition::FragmentAdmitted,
            format!("collecting_{n}"),
        );

        let cfg = &self.config;
        if n < cfg.min_fragments {
            return BatchStatus::Collecting(n);
        }
        if n < cfg.target_fragments {
            // Baseline quality window: no classifier call yet.
            return BatchStatus::Collecting(n);
        }
        if n >= cfg.max_fragments {
            // Safety bound against unbounded collection.
            return self.finalize_locked(slot, session, "max fragments reached").await;
        }

        let verdict = self
            .classifier
            .classify(&session.accumulated_text, n)
            .await;

        if verdict.is_complete {
            return self.finalize_locked(slot, session, "classifier judged complete").await;
        }
        if !verdict.is_on_topic {
            if session.accumulated_text.trim().len() < cfg.min_discard_len {
                // Near-empty plus drift: the trigger was accidental.
                info!(session_id = %session.session_id, "discarding accidental trigger");
                session.reset();
                self.events.emit(
                    &session.session_id,
                    Transition::Discarded,
                    "off-topic with no usable content",
                );
                return BatchStatus::Discarded { message: None };
            }
            // The speaker moved on but left usable content behind.
            return self
                .finalize_locked(slot, session, "off-topic with usable content")
                .await;
        }

        BatchStatus::Collecting(n)
    }

    /// The finalize action. Caller holds the slot lock; it stays held across
    /// the full finalizer call. On every outcome the session resets to
    /// `Idle` — a session is never left stuck in `Finalizing`.
    async fn finalize_locked(
        &self,
        slot: &SessionSlot,
        session: &mut Session,
        reason: &str,
    ) -> BatchStatus {
        session.mode = SessionMode::Finalizing;
        session.touch();
        slot.set_finalizing(true);

        let session_id = session.session_id.clone();
        let owner_id = session.owner_id.clone();
        let text = session.accumulated_text.clone();
        info!(session_id = %session_id, fragments = session.fragment_count, reason, "finalizing");

        let result = tokio::time::timeout(
            self.config.finalize_timeout,
            self.finalizer.finalize(&owner_id, &text),
        )
        .await;

        slot.set_finalizing(false);
        session.reset();

        match result {
            Ok(Ok(outcome)) if outcome.accepted => {
                self.events
                    .emit(&session_id, Transition::Finalized, reason);
                BatchStatus::Finalized {
                    message: outcome.details,
                }
            }
            Ok(Ok(outcome)) => {
                self.events
                    .emit(&session_id, Transition::Discarded, "finalizer rejection");
                BatchStatus::Discarded {
                    message: Some(outcome.details),
                }
            }
            Ok(Err(e)) => {
                warn!(session_id = %session_id, "finalize failed: {e:#}");
                self.events
                    .emit(&session_id, Transition::FinalizeFailed, "finalizer error");
                BatchStatus::Failed {
                    message: "The report could not be submitted. Nothing was created."
                        .to_string(),
                }
            }
            Err(_) => {
                warn!(session_id = %session_id, "finalize timed out");
                self.events
                    .emit(&session_id, Transition::FinalizeFailed, "finalizer timeout");
                BatchStatus::Failed {
                    message: "The report could not be submitted. Nothing was created."
                        .to_string(),
                }
            }
        }
    }

    /// One sweep over all sessions: force-finalize stalled collectors past
    /// the idle timeout, discard abandoned under-minimum sessions. Returns
    /// the number of sessions finalized. Sessions whose lock is held (a live
    /// transition in flight) are skipped — the next tick will see them.
    pub async fn sweep_once(&self) -> usize {
        let mut finalized = 0;
        for (session_id, slot) in self.store.snapshot().await {
            if slot.is_finalizing() {
                continue;
            }
            let Ok(mut session) = slot.session.try_lock() else {
                continue;
            };
            if session.mode != SessionMode::Collecting {
                continue;
            }

            let idle = session.idle_for();
            if session.fragment_count >= self.config.min_fragments
                && idle > self.config.idle_timeout
            {
                info!(
                    session_id = %session_id,
                    idle_secs = idle.as_secs(),
                    "idle timeout, finalizing stalled session"
                );
                self.finalize_locked(&slot, &mut session, "idle timeout").await;
                finalized += 1;
            } else if session.fragment_count < self.config.min_fragments
                && idle > self.config.abandon_timeout
            {
                info!(session_id = %session_id, "abandoned below minimum, discarding");
                session.reset();
                self.events
                    .emit(&session_id, Transition::Discarded, "abandoned");
            }
        }
        finalized
    }
}

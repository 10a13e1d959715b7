//! Completeness classification of accumulated transcript text.
//!
//! The aggregation state machine asks one question between the TARGET and MAX
//! fragment thresholds: is this enough to build a report, and is the speaker
//! still on topic? The production implementation asks an LLM; the trait is
//! infallible by contract — every transport or parse failure collapses to
//! "keep collecting" inside the adapter, so the state machine never branches
//! on classifier errors.

use crate::llm::ChatClient;
use async_trait::async_trait;
use tracing::{debug, warn};

/// Judgement over the accumulated text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletenessVerdict {
    /// Enough content has arrived to hand off to the generator.
    pub is_complete: bool,
    /// The speaker is still describing the same item.
    pub is_on_topic: bool,
    /// Short explanation, for events and logs only.
    pub reason: String,
}

impl CompletenessVerdict {
    /// The fallback applied on any adapter failure: keep collecting.
    pub fn keep_collecting(reason: impl Into<String>) -> Self {
        Self {
            is_complete: false,
            is_on_topic: true,
            reason: reason.into(),
        }
    }
}

#[async_trait]
pub trait CompletenessClassifier: Send + Sync {
    /// Must not fail, even on empty or nonsensical input.
    async fn classify(&self, accumulated_text: &str, fragment_count: u32) -> CompletenessVerdict;
}

// ─── LLM-backed implementation ───────────────────────────────────────────────

const CLASSIFY_SYSTEM_PROMPT: &str = "\
You are analyzing voice transcripts to decide whether enough information has \
accumulated to file a report, and whether the speaker is still on topic.

Answer TWO questions about the accumulated speech:

1. Is this enough to create a report?
   - YES for anything that could be a problem, feature, or feedback, even a hint.
   - NO only for pure gibberish like \"test test test\" or \"check check check\".
   - Be very lenient: almost always YES.
2. Is the speaker still talking about the same item?
   - YES for anything possibly related to software, apps, or the topic so far.
   - NO only for clearly personal conversation (dinner, groceries, weather).
   - Be very lenient: almost always YES.

Respond in EXACTLY this format:
COMPLETE: yes/no
ON_TOPIC: yes/no
REASON: brief explanation";

pub struct LlmClassifier {
    chat: ChatClient,
}

impl LlmClassifier {
    pub fn new(chat: ChatClient) -> Self {
        Self { chat }
    }
}

#[async_trait]
impl CompletenessClassifier for LlmClassifier {
    async fn classify(&self, accumulated_text: &str, fragment_count: u32) -> CompletenessVerdict {
        let user = format!(
            "Fragments collected: {fragment_count}\nAccumulated text: {accumulated_text}\n\nAnalyze:"
        );
        match self.chat.complete(CLASSIFY_SYSTEM_PROMPT, &user, 100, 0.2).await {
            Ok(raw) => {
                let verdict = parse_verdict(&raw);
                debug!(
                    fragment_count,
                    is_complete = verdict.is_complete,
                    is_on_topic = verdict.is_on_topic,
                    reason = %verdict.reason,
                    "completeness verdict"
                );
                verdict
            }
            Err(e) => {
                warn!("completeness check failed, continuing collection: {e}");
                CompletenessVerdict::keep_collecting("check failed")
            }
        }
    }
}

/// Parse the `COMPLETE:`/`ON_TOPIC:`/`REASON:` protocol. Tolerates case and
/// surrounding prose; anything unrecognized reads as "no".
fn parse_verdict(raw: &str) -> CompletenessVerdict {
    let lowered = raw.to_lowercase();
    let is_complete = lowered.contains("complete: yes");
    let is_on_topic = lowered.contains("on_topic: yes");
    let reason = raw
        .lines()
        .find_map(|line| line.trim().strip_prefix("REASON:"))
        .map(|r| r.trim().to_string())
        .unwrap_or_default();
    CompletenessVerdict {
        is_complete,
        is_on_topic,
        reason,
    }
}

//! Finalization: turn accumulated transcript text into a tracker issue.
//!
//! The state machine only sees the trait; the production pipeline is
//! generate report → select labels → submit issue. A generator judgement of
//! "not an actionable item" is a rejection (`accepted = false`), which the
//! state machine reports as a discard — never as an error.

mod generator;
mod labels;

use crate::llm::ChatClient;
use crate::storage::OwnerStore;
use crate::tracker::TrackerClient;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use generator::GeneratedReport;

/// Terminal result of one finalization.
#[derive(Debug, Clone)]
pub struct FinalizeOutcome {
    /// False means the content was judged not to be a valid item.
    pub accepted: bool,
    /// Human-readable confirmation or explanation.
    pub details: String,
}

#[async_trait]
pub trait Finalizer: Send + Sync {
    /// Hand off the accumulated text. `Err` means the finalize attempt itself
    /// failed (credentials, tracker outage); the caller still resets the
    /// session either way.
    async fn finalize(&self, owner_id: &str, accumulated_text: &str) -> Result<FinalizeOutcome>;
}

// ─── Production implementation ───────────────────────────────────────────────

pub struct ReportFinalizer {
    chat: ChatClient,
    tracker: TrackerClient,
    owners: OwnerStore,
    footer: String,
}

impl ReportFinalizer {
    pub fn new(chat: ChatClient, tracker: TrackerClient, owners: OwnerStore, footer: &str) -> Self {
        Self {
            chat,
            tracker,
            owners,
            footer: footer.to_string(),
        }
    }
}

#[async_trait]
impl Finalizer for ReportFinalizer {
    async fn finalize(&self, owner_id: &str, accumulated_text: &str) -> Result<FinalizeOutcome> {
        let owner = self
            .owners
            .get(owner_id)
            .await?
            .ok_or_else(|| anyhow!("owner {owner_id} has no record on file"))?;
        let token = owner
            .tracker_token
            .as_deref()
            .ok_or_else(|| anyhow!("owner {owner_id} has no tracker credentials configured"))?;
        let repo = owner
            .repo
            .as_deref()
            .ok_or_else(|| anyhow!("owner {owner_id} has no target repository configured"))?;

        let (title, description) =
            match generator::generate_report(&self.chat, accumulated_text).await {
                GeneratedReport::NotAnIssue => {
                    info!(owner_id, "generator rejected accumulated text");
                    return Ok(FinalizeOutcome {
                        accepted: false,
                        details: "No report created — the captured speech did not describe an \
                                  actionable item."
                            .to_string(),
                    });
                }
                GeneratedReport::Report { title, body } => (title, body),
            };

        let selected = labels::select_labels(
            &self.chat,
            &self.tracker,
            token,
            repo,
            &title,
            &description,
        )
        .await;

        let body = format!("{description}\n\n---\n*{}*", self.footer);
        let issue = self
            .tracker
            .create_issue(token, repo, &title, &body, &selected)
            .await?;

        let mut details = format!(
            "Issue created! #{} — {}\nRepository: {}",
            issue.number, issue.title, repo
        );
        if !selected.is_empty() {
            details.push_str(&format!("\nLabels: {}", selected.join(", ")));
        }
        details.push_str(&format!("\nURL: {}", issue.html_url));

        Ok(FinalizeOutcome {
            accepted: true,
            details,
        })
    }
}

// Shared helper so both submodules log through one path.
pub(crate) fn log_llm_fallback(stage: &str, err: &dyn std::fmt::Display) {
    warn!("{stage} failed, falling back: {err}");
}

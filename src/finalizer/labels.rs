//! Label selection for created issues.
//!
//! The LLM picks from the repository's real label set; everything it answers
//! is validated against that set before use. Any failure in this stage —
//! label fetch, LLM call, unusable answer — yields an empty list. Labels are
//! decoration; they never block issue creation.

use crate::llm::ChatClient;
use crate::retry;
use crate::tracker::TrackerClient;
use std::time::Duration;

const MAX_LABELS: usize = 3;

const LABEL_SYSTEM_PROMPT: &str = "\
You label tracker issues. Given an issue title, description, and the list of \
labels available in the repository, select the most appropriate labels.

Rules:
1. Only use labels from the provided list — never invent new ones.
2. Select 1-3 labels; prefer 1-2.
3. Copy label names exactly as they appear in the list.
4. Answer with the chosen names, comma-separated, and nothing else.
5. If nothing fits, answer \"none\".";

pub(crate) async fn select_labels(
    chat: &ChatClient,
    tracker: &TrackerClient,
    token: &str,
    repo: &str,
    title: &str,
    description: &str,
) -> Vec<String> {
    // Label listing is idempotent — safe to retry.
    let available = match retry::with_backoff(2, Duration::from_millis(300), || {
        tracker.list_labels(token, repo)
    })
    .await
    {
        Ok(labels) if !labels.is_empty() => labels,
        Ok(_) => return Vec::new(),
        Err(e) => {
            super::log_llm_fallback("label listing", &e);
            return Vec::new();
        }
    };

    let user = format!(
        "Available labels (copy these EXACTLY): {}\n\nIssue Title: {title}\nIssue Description: {description}\n\nSelect the most appropriate labels:",
        available.join(", ")
    );
    match chat.complete(LABEL_SYSTEM_PROMPT, &user, 50, 0.1).await {
        Ok(raw) => validate_labels(&raw, &available),
        Err(e) => {
            super::log_llm_fallback("label selection", &e);
            Vec::new()
        }
    }
}

/// Keep only answers that resolve to a real label: exact match first, then
/// case-insensitive, then with spaces and hyphens unified. At most three.
pub(crate) fn validate_labels(raw: &str, available: &[String]) -> Vec<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("none") {
        return Vec::new();
    }

    let mut valid = Vec::new();
    for candidate in raw.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        let resolved = available
            .iter()
            .find(|a| a.as_str() == candidate)
            .or_else(|| {
                available
                    .iter()
                    .find(|a| a.eq_ignore_ascii_case(candidate))
            })
            .or_else(|| {
                let normalized = normalize_label(candidate);
                available.iter().find(|a| normalize_label(a) == normalized)
            });
        if let Some(label) = resolved {
            if !valid.contains(label) {
                valid.push(label.clone());
            }
        }
        if valid.len() >= MAX_LABELS {
            break;
        }
    }
    valid
}

fn normalize_label(label: &str) -> String {
    label.to_lowercase().replace(' ', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn avail(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn exact_matches_pass_through() {
        let labels = validate_labels("bug, enhancement", &avail(&["bug", "enhancement", "docs"]));
        assert_eq!(labels, vec!["bug", "enhancement"]);
    }

    #[test]
    fn case_insensitive_match_uses_repo_casing() {
        let labels = validate_labels("BUG", &avail(&["bug", "iOS"]));
        assert_eq!(labels, vec!["bug"]);
        let labels = validate_labels("ios", &avail(&["bug", "iOS"]));
        assert_eq!(labels, vec!["iOS"]);
    }

    #[test]
    fn space_hyphen_normalization_matches() {
        let labels = validate_labels("feature request", &avail(&["feature-request"]));
        assert_eq!(labels, vec!["feature-request"]);
        let labels = validate_labels("Feature-Request", &avail(&["Feature Request"]));
        assert_eq!(labels, vec!["Feature Request"]);
    }

    #[test]
    fn unknown_labels_are_dropped() {
        let labels = validate_labels("bug, made-up-label", &avail(&["bug"]));
        assert_eq!(labels, vec!["bug"]);
    }

    #[test]
    fn none_answer_yields_empty() {
        assert!(validate_labels("none", &avail(&["bug"])).is_empty());
        assert!(validate_labels("  NONE  ", &avail(&["bug"])).is_empty());
        assert!(validate_labels("", &avail(&["bug"])).is_empty());
    }

    #[test]
    fn at_most_three_labels_survive() {
        let labels = validate_labels("a, b, c, d", &avail(&["a", "b", "c", "d"]));
        assert_eq!(labels.len(), 3);
    }

    #[test]
    fn duplicates_collapse() {
        let labels = validate_labels("bug, Bug, BUG", &avail(&["bug"]));
        assert_eq!(labels, vec!["bug"]);
    }
}

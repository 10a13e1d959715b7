//! Report generation from raw transcript text.
//!
//! The LLM rewrites noisy voice transcripts into a titled report, or answers
//! `NOT_AN_ISSUE` for accidental triggers. When the LLM is unreachable the
//! fallback formats the raw text locally — finalization degrades, it does not
//! fail.

use crate::llm::ChatClient;
use once_cell::sync::Lazy;
use regex::Regex;

const MAX_TITLE_LEN: usize = 100;

const GENERATE_SYSTEM_PROMPT: &str = "\
You format voice-transcript feedback as tracker issues. The speaker said a \
trigger phrase and then described a problem, feature, or piece of feedback.

Validation — be very lenient, create an issue unless truly impossible:
- Answer NOT_AN_ISSUE only for meaningless gibberish (\"test test test\") or \
clearly personal conversation (groceries, dinner plans).
- Any hint of a problem, feature, or idea: create the issue.

Voice transcripts contain recognition errors; use context to infer the \
intended technical meaning. Remove filler words, fix grammar, keep the \
speaker's intent. Title at most 80 characters. Description as plain \
paragraphs separated by blank lines, no markdown headings.

Respond EXACTLY as either:
NOT_AN_ISSUE

or:
TITLE: <concise title>
DESCRIPTION: <clean paragraph description>";

/// Generator output: a rejection or a formatted report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum GeneratedReport {
    NotAnIssue,
    Report { title: String, body: String },
}

pub(crate) async fn generate_report(chat: &ChatClient, accumulated_text: &str) -> GeneratedReport {
    let user = format!("Voice transcript after the trigger phrase: {accumulated_text}\n\nGenerate the issue:");
    match chat.complete(GENERATE_SYSTEM_PROMPT, &user, 300, 0.3).await {
        Ok(raw) => parse_report(&raw, accumulated_text),
        Err(e) => {
            super::log_llm_fallback("report generation", &e);
            GeneratedReport::Report {
                title: "User feedback report".to_string(),
                body: clean_content(accumulated_text),
            }
        }
    }
}

/// Parse the `TITLE:`/`DESCRIPTION:` protocol. A missing title means the
/// model did not produce a usable report — treated like a rejection. A
/// missing description falls back to the source text.
pub(crate) fn parse_report(raw: &str, source_text: &str) -> GeneratedReport {
    if raw.contains("NOT_AN_ISSUE") {
        return GeneratedReport::NotAnIssue;
    }

    let mut title = String::new();
    let mut description = String::new();
    let mut in_description = false;

    for line in raw.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("TITLE:") {
            title = rest.trim().to_string();
            in_description = false;
        } else if let Some(rest) = trimmed.strip_prefix("DESCRIPTION:") {
            description = rest.trim().to_string();
            in_description = true;
        } else if in_description {
            if !description.is_empty() {
                description.push('\n');
            }
            description.push_str(trimmed);
        }
    }

    if title.is_empty() {
        return GeneratedReport::NotAnIssue;
    }
    if title.len() > MAX_TITLE_LEN {
        title = title
            .char_indices()
            .take_while(|(i, _)| *i < MAX_TITLE_LEN - 3)
            .map(|(_, c)| c)
            .collect::<String>()
            + "...";
    }
    if description.trim().is_empty() {
        description = source_text.to_string();
    }

    GeneratedReport::Report {
        title,
        body: description.trim().to_string(),
    }
}

static WHITESPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

const FILLER_WORDS: &[&str] = &["um", "uh", "like", "you know", "so", "yeah", "basically"];

/// Local cleanup used when the generator LLM is unavailable: collapse
/// whitespace, drop filler words, capitalize the first letter.
pub(crate) fn clean_content(content: &str) -> String {
    let collapsed = WHITESPACE_RUNS.replace_all(content, " ");
    let cleaned: Vec<&str> = collapsed
        .split(' ')
        .filter(|w| {
            let bare = w.to_lowercase();
            let bare = bare.trim_end_matches(['.', ',', '!', '?']);
            !bare.is_empty() && !FILLER_WORDS.contains(&bare)
        })
        .collect();
    let mut out = cleaned.join(" ").trim().to_string();
    if let Some(first) = out.chars().next() {
        if first.is_lowercase() {
            let upper: String = first.to_uppercase().collect();
            out.replace_range(..first.len_utf8(), &upper);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_title_and_multiline_description() {
        let raw = "TITLE: App crashes on photo upload\n\
                   DESCRIPTION: The app crashes during uploads.\n\
                   \n\
                   Happens every time on iPhone.";
        match parse_report(raw, "src") {
            GeneratedReport::Report { title, body } => {
                assert_eq!(title, "App crashes on photo upload");
                assert!(body.starts_with("The app crashes during uploads."));
                assert!(body.contains("Happens every time on iPhone."));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn not_an_issue_is_a_rejection() {
        assert_eq!(parse_report("NOT_AN_ISSUE", "src"), GeneratedReport::NotAnIssue);
        assert_eq!(
            parse_report("NOT_AN_ISSUE\nthis is just testing", "src"),
            GeneratedReport::NotAnIssue
        );
    }

    #[test]
    fn missing_title_is_a_rejection() {
        assert_eq!(
            parse_report("DESCRIPTION: something without a title", "src"),
            GeneratedReport::NotAnIssue
        );
    }

    #[test]
    fn missing_description_falls_back_to_source_text() {
        match parse_report("TITLE: Just a title", "the original words") {
            GeneratedReport::Report { body, .. } => assert_eq!(body, "the original words"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn overlong_title_is_clamped() {
        let raw = format!("TITLE: {}\nDESCRIPTION: d", "x".repeat(150));
        match parse_report(&raw, "src") {
            GeneratedReport::Report { title, .. } => {
                assert_eq!(title.len(), MAX_TITLE_LEN);
                assert!(title.ends_with("..."));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn clean_content_drops_fillers_and_capitalizes() {
        let out = clean_content("um the app  like crashes   you uh know on save");
        assert_eq!(out, "The app crashes you know on save");
    }

    #[test]
    fn clean_content_handles_empty_input() {
        assert_eq!(clean_content(""), "");
        assert_eq!(clean_content("   "), "");
    }
}

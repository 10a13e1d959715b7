//! Trigger-phrase detection over incoming transcript text.
//!
//! A fixed, case-insensitive phrase set marks the start of a report
//! ("report a bug", "file an issue", ...). Detection and content extraction
//! are pure functions: no I/O, no shared state, safe from any thread.
//!
//! Matching runs over a *normalized* view of the text (lowercased, trimmed,
//! internal whitespace runs collapsed to a single space) so that
//! `"Create Issue: foo"` and `"create   issue: foo"` behave identically.
//! Extraction returns a slice of the ORIGINAL text, which requires mapping
//! normalized byte offsets back to original byte offsets.

/// Default trigger phrases. Order matters: when two phrases start at the same
/// offset, the earlier entry in this list wins.
pub const DEFAULT_TRIGGER_PHRASES: &[&str] = &[
    // Feedback variations
    "feedback post",
    "post feedback",
    "submit feedback",
    "send feedback",
    "give feedback",
    "product feedback",
    "app feedback",
    // Issue variations
    "create issue",
    "create an issue",
    "report issue",
    "report an issue",
    "file issue",
    "file an issue",
    "new issue",
    "open issue",
    "post issue",
    "submit issue",
    "log issue",
    // Bug variations
    "report bug",
    "report a bug",
    "create bug",
    "file bug",
    "post bug",
    "bug report",
    "found a bug",
    "found bug",
    // Tracker specific
    "github issue",
    "github post",
    "github bug",
    // General reporting
    "create ticket",
    "file ticket",
    "report problem",
    "problem report",
];

/// Stateless phrase matcher over incoming text.
#[derive(Debug, Clone)]
pub struct TriggerDetector {
    /// Phrases, pre-normalized, in stable priority order.
    phrases: Vec<String>,
}

impl Default for TriggerDetector {
    fn default() -> Self {
        Self::new(DEFAULT_TRIGGER_PHRASES.iter().map(|p| p.to_string()))
    }
}

impl TriggerDetector {
    pub fn new(phrases: impl IntoIterator<Item = String>) -> Self {
        let phrases = phrases
            .into_iter()
            .map(|p| normalize(&p))
            .filter(|p| !p.is_empty())
            .collect();
        Self { phrases }
    }

    /// True iff any trigger phrase occurs as a substring of the normalized text.
    pub fn detect(&self, text: &str) -> bool {
        let normalized = normalize(text);
        self.phrases.iter().any(|p| normalized.contains(p.as_str()))
    }

    /// Return the original (non-normalized) text following the end of the
    /// earliest-occurring trigger phrase, trimmed. `None` if no phrase is
    /// found or the remainder is empty after trimming.
    pub fn extract_content<'a>(&self, text: &'a str) -> Option<&'a str> {
        let (normalized, end_offsets) = normalize_with_offsets(text);

        // Earliest starting offset wins; ties resolve to list order because
        // only a strictly smaller offset replaces the current best.
        let mut best: Option<(usize, &str)> = None;
        for phrase in &self.phrases {
            if let Some(idx) = normalized.find(phrase.as_str()) {
                if best.map_or(true, |(b, _)| idx < b) {
                    best = Some((idx, phrase.as_str()));
                }
            }
        }
        let (start, phrase) = best?;

        // Original offset just past the last byte of the matched phrase.
        let resume = end_offsets[start + phrase.len() - 1];
        let remainder = text[resume..].trim();
        if remainder.is_empty() {
            None
        } else {
            Some(remainder)
        }
    }
}

/// Lowercase, trim, and collapse internal whitespace runs to a single space.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for word in text.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        for c in word.chars() {
            out.extend(c.to_lowercase());
        }
    }
    out
}

/// Normalize and record, for every byte of the normalized string, the byte
/// offset in the original text just PAST the source character it came from.
/// A collapsed space maps to the end of the whitespace run it replaced, so
/// resuming after a match never lands inside skipped whitespace.
fn normalize_with_offsets(text: &str) -> (String, Vec<usize>) {
    let mut out = String::with_capacity(text.len());
    let mut end_offsets = Vec::with_capacity(text.len());
    let mut pending_space = false;

    for (off, ch) in text.char_indices() {
        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
            // The space stands for the run before `ch`; resume at `ch`.
            end_offsets.push(off);
        }
        pending_space = false;
        let src_end = off + ch.len_utf8();
        for lc in ch.to_lowercase() {
            let start = out.len();
            out.push(lc);
            for _ in start..out.len() {
                end_offsets.push(src_end);
            }
        }
    }
    (out, end_offsets)
}

// rest/routes/transcripts.rs — the transcript webhook.
//
// Each delivery is an independent request: an ordered array of segment
// objects addressed to (owner_id, session_id). The handler never answers
// with a hard failure — malformed payloads are acknowledged and ignored, and
// only terminal aggregation outcomes carry a user-visible message.

use axum::{
    body::Bytes,
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use crate::aggregation::BatchStatus;
use crate::AppContext;

/// One transcribed fragment. Timing/speaker metadata is accepted and ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct Segment {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub speaker: Option<String>,
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub end: Option<f64>,
}

/// Webhook body: `{"segments": [...]}`; a bare array is the implicit wrapper.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TranscriptPayload {
    Wrapped { segments: Vec<Segment> },
    Bare(Vec<Segment>),
}

impl TranscriptPayload {
    pub fn into_segments(self) -> Vec<Segment> {
        match self {
            Self::Wrapped { segments } => segments,
            Self::Bare(segments) => segments,
        }
    }
}

pub async fn ingest_transcript(
    State(ctx): State<Arc<AppContext>>,
    Path((owner_id, session_id)): Path<(String, String)>,
    body: Bytes,
) -> Json<Value> {
    // Malformed input: acknowledge without mutating anything.
    let Ok(payload) = serde_json::from_slice::<TranscriptPayload>(&body) else {
        debug!(%session_id, "unparseable transcript payload, ignoring");
        return Json(json!({ "status": "ok" }));
    };

    let texts: Vec<String> = payload
        .into_segments()
        .into_iter()
        .map(|s| s.text)
        .collect();

    let status = ctx.aggregator.ingest(&owner_id, &session_id, &texts).await;
    debug!(%session_id, status = %status.label(), "batch processed");

    match status {
        BatchStatus::Finalized { message }
        | BatchStatus::Failed { message }
        | BatchStatus::Discarded {
            message: Some(message),
        } => Json(json!({ "message": message, "session_id": session_id })),
        _ => Json(json!({ "status": "ok" })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapped_payload_parses() {
        let payload: TranscriptPayload =
            serde_json::from_str(r#"{"segments": [{"text": "hello"}, {"text": "world"}]}"#)
                .expect("parse");
        let segments = payload.into_segments();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "hello");
    }

    #[test]
    fn bare_array_is_implicit_wrapper() {
        let payload: TranscriptPayload =
            serde_json::from_str(r#"[{"text": "hello"}]"#).expect("parse");
        assert_eq!(payload.into_segments()[0].text, "hello");
    }

    #[test]
    fn extra_segment_fields_are_tolerated() {
        let payload: TranscriptPayload = serde_json::from_str(
            r#"{"segments": [{"text": "hi", "speaker": "SPEAKER_0", "start": 1.5, "end": 2.0, "is_user": true}]}"#,
        )
        .expect("parse");
        let segments = payload.into_segments();
        assert_eq!(segments[0].speaker.as_deref(), Some("SPEAKER_0"));
    }

    #[test]
    fn garbage_does_not_parse() {
        assert!(serde_json::from_str::<TranscriptPayload>(r#"{"foo": 1}"#).is_err());
        assert!(serde_json::from_str::<TranscriptPayload>("not json").is_err());
    }

    #[test]
    fn segment_without_text_defaults_to_empty() {
        let payload: TranscriptPayload =
            serde_json::from_str(r#"{"segments": [{"speaker": "A"}]}"#).expect("parse");
        assert_eq!(payload.into_segments()[0].text, "");
    }
}

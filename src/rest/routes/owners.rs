// rest/routes/owners.rs — owner settings routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::AppContext;

#[derive(Debug, Deserialize)]
pub struct UpsertOwnerRequest {
    pub tracker_token: Option<String>,
    pub repo: Option<String>,
}

pub async fn upsert_owner(
    State(ctx): State<Arc<AppContext>>,
    Path(owner_id): Path<String>,
    Json(body): Json<UpsertOwnerRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match ctx
        .owners
        .upsert(&owner_id, body.tracker_token.as_deref(), body.repo.as_deref())
        .await
    {
        Ok(row) => Ok(Json(json!({
            "owner_id": row.owner_id,
            "repo": row.repo,
            "has_token": row.tracker_token.is_some(),
        }))),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )),
    }
}

pub async fn setup_check(
    State(ctx): State<Arc<AppContext>>,
    Path(owner_id): Path<String>,
) -> Json<Value> {
    let complete = ctx
        .owners
        .is_setup_complete(&owner_id)
        .await
        .unwrap_or(false);
    Json(json!({ "is_setup_completed": complete }))
}

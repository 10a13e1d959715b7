// rest/mod.rs — Public REST API server.
//
// Axum HTTP server, local only by default.
//
// Endpoints:
//   POST /api/v1/transcripts/{owner_id}/{session_id}   (webhook input)
//   PUT  /api/v1/owners/{owner_id}
//   GET  /api/v1/owners/{owner_id}/setup
//   GET  /api/v1/health

pub mod routes;

use anyhow::Result;
use axum::{
    routing::{get, post, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::AppContext;

pub async fn start_rest_server(ctx: Arc<AppContext>) -> Result<()> {
    let bind = format!("{}:{}", ctx.config.bind_address, ctx.config.port);
    let addr: SocketAddr = bind.parse()?;

    let router = build_router(ctx);

    info!("REST API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        // Health (no auth)
        .route("/api/v1/health", get(routes::health::health))
        // Transcript webhook
        .route(
            "/api/v1/transcripts/{owner_id}/{session_id}",
            post(routes::transcripts::ingest_transcript),
        )
        // Owner settings
        .route(
            "/api/v1/owners/{owner_id}",
            put(routes::owners::upsert_owner),
        )
        .route(
            "/api/v1/owners/{owner_id}/setup",
            get(routes::owners::setup_check),
        )
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}

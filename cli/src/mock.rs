//! Local stand-in for the pairing endpoint.
//!
//! Answers every pairing with the same placeholder element, which is enough to
//! exercise a client end to end without touching the real game.

use anyhow::{Context, Result};
use axum::extract::Query;
use axum::routing::get;
use axum::{Json, Router};
use craft_client::PAIR_PATH;
use craft_types::PairResponse;
use serde::Deserialize;
use tokio::net::TcpListener;

#[derive(Debug, Deserialize)]
struct PairQuery {
    first: String,
    second: String,
}

fn mock_result() -> PairResponse {
    PairResponse::new("???", "🌌", false)
}

async fn pair(Query(query): Query<PairQuery>) -> Json<PairResponse> {
    let result = mock_result();
    tracing::info!(first = %query.first, second = %query.second, "[mock] pair");
    Json(result)
}

fn router() -> Router {
    Router::new().route(PAIR_PATH, get(pair))
}

/// Bind `host:port` and serve until Ctrl+C.
pub async fn run(host: &str, port: u16) -> Result<()> {
    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    println!("Mock server listening on http://{addr}");
    println!("Press Ctrl+C to stop.");

    axum::serve(listener, router())
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for Ctrl+C: {e}");
            }
        })
        .await
        .context("mock server failed")
}

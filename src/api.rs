//! Read-only HTTP interface over the income ledger

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::ledger::IncomeLedger;

#[derive(Clone)]
struct AppState {
    ledger: Arc<dyn IncomeLedger>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Deserialize)]
struct IncomeQuery {
    chain_id: Option<String>,
}

/// Store failures surface as 500 with the message as plain text
struct ApiError(Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!("Income query failed: {}", self.0);
        (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string()).into_response()
    }
}

pub fn router(ledger: Arc<dyn IncomeLedger>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/income", get(income))
        .with_state(AppState { ledger })
}

/// Bind the HTTP listener; an address in use or not permitted is an error
pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Io(format!("Failed to bind HTTP server on {}: {}", addr, e)))?;
    info!(?addr, "HTTP server listening");
    Ok(listener)
}

/// Serve until `shutdown` is cancelled
pub async fn serve(
    ledger: Arc<dyn IncomeLedger>,
    addr: SocketAddr,
    shutdown: CancellationToken,
) -> Result<()> {
    let listener = bind(addr).await?;
    serve_on(listener, ledger, shutdown).await
}

/// Serve on an already bound listener
pub async fn serve_on(
    listener: TcpListener,
    ledger: Arc<dyn IncomeLedger>,
    shutdown: CancellationToken,
) -> Result<()> {
    axum::serve(listener, router(ledger))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| Error::Io(format!("HTTP server failed: {}", e)))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn income(
    State(state): State<AppState>,
    Query(query): Query<IncomeQuery>,
) -> std::result::Result<Response, ApiError> {
    let records = match query.chain_id.as_deref() {
        Some(chain_id) => state.ledger.list_by_chain(chain_id).await,
        None => state.ledger.list_all().await,
    }
    .map_err(ApiError)?;
    Ok(Json(records).into_response())
}

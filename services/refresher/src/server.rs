//! HTTP server for scheduler status and the store read interface.
//!
//! Provides endpoints for:
//! - Service health checks
//! - Per-source scheduler state and refresh counters
//! - Published dataset summaries across sources
//! - Full canonical datasets as JSON

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use forecast_common::{CanonicalDataset, SourceId};
use forecast_store::ForecastStore;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::scheduler::{Scheduler, SourceStatus};

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub service: String,
    pub sources: Vec<SourceStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastSummary {
    pub reference_time: DateTime<Utc>,
    pub steps: usize,
    pub first_valid_time: Option<DateTime<Utc>>,
    pub last_valid_time: Option<DateTime<Utc>>,
    pub variables: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastsResponse {
    pub sources: Vec<ForecastEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastEntry {
    pub source: String,
    pub forecast: Option<ForecastSummary>,
}

pub struct ServerState {
    pub store: Arc<ForecastStore>,
    pub scheduler: Arc<Scheduler>,
}

/// Create the status/read API router.
pub fn create_router(state: Arc<ServerState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/forecasts", get(forecasts_handler))
        .route("/forecasts/:source", get(forecast_handler))
        .layer(cors)
        .layer(Extension(state))
}

/// GET /health - Health check endpoint
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "refresher"
    }))
}

/// GET /status - Per-source scheduler state
async fn status_handler(Extension(state): Extension<Arc<ServerState>>) -> impl IntoResponse {
    Json(StatusResponse {
        service: "refresher".to_string(),
        sources: state.scheduler.status_report(),
    })
}

/// GET /forecasts - Summaries of every published dataset
async fn forecasts_handler(Extension(state): Extension<Arc<ServerState>>) -> impl IntoResponse {
    let sources = SourceId::all()
        .iter()
        .map(|&source| ForecastEntry {
            source: source.to_string(),
            forecast: state.store.get(source).map(|ds| summarize(&ds)),
        })
        .collect();

    Json(ForecastsResponse { sources })
}

/// GET /forecasts/:source - Full canonical dataset
async fn forecast_handler(
    Extension(state): Extension<Arc<ServerState>>,
    Path(source): Path<String>,
) -> impl IntoResponse {
    let source: SourceId = match source.parse() {
        Ok(source) => source,
        Err(_) => {
            return (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "error": format!("unknown source: {}", source) })),
            )
                .into_response();
        }
    };

    match state.store.get(source) {
        Some(dataset) => Json(dataset.as_ref()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": format!("no dataset published yet for {}", source)
            })),
        )
            .into_response(),
    }
}

fn summarize(dataset: &CanonicalDataset) -> ForecastSummary {
    ForecastSummary {
        reference_time: dataset.forecast_reference_time,
        steps: dataset.steps.len(),
        first_valid_time: dataset.valid_times.first().copied(),
        last_valid_time: dataset.valid_times.last().copied(),
        variables: dataset
            .variable_names()
            .into_iter()
            .map(String::from)
            .collect(),
    }
}

/// Start the HTTP server.
pub async fn run_server(state: Arc<ServerState>, port: u16) -> anyhow::Result<()> {
    let app = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    info!(port = port, "Starting refresher status server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

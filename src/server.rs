//! HTTP server for Waypoint query navigation

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::engine::NavEngine;
use crate::error::WaypointError;
use crate::indexer::now_secs;
use crate::types::{
    Corpus, EntryType, FeedbackRating, FeedbackRecord, IntentCategory, OrchestrationDecision,
    Query, QueryFilters, QueryStats,
};

/// Simplified HTTP request structure
#[derive(Debug, Deserialize)]
pub struct QueryRequestHttp {
    pub query: String,
    pub limit: Option<usize>,
    pub corpus: Option<Corpus>,
    pub entry_type: Option<EntryType>,
    pub explain: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct QueryResponseHttp {
    pub report: String,
    pub intent: IntentCategory,
    pub confidence: f32,
    pub degraded: bool,
    pub stats: QueryStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decisions: Option<Vec<OrchestrationDecision>>,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequestHttp {
    pub query: String,
    pub intent: IntentCategory,
    pub components_used: Vec<String>,
    pub rating: FeedbackRating,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub details: Option<String>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

async fn query_handler(
    State(engine): State<Arc<NavEngine>>,
    Json(req): Json<QueryRequestHttp>,
) -> Result<Json<QueryResponseHttp>, (StatusCode, Json<ErrorResponse>)> {
    info!("Received query request: '{}'", req.query);

    let mut query = Query::new(req.query);
    if let Some(limit) = req.limit {
        query.limit = limit.clamp(1, 50);
    }
    query.filters = QueryFilters {
        entry_type: req.entry_type,
        corpus: req.corpus,
    };

    match engine.answer(query).await {
        Ok(outcome) => {
            info!(
                "Query successful: {} findings in {}ms",
                outcome.stats.components_run, outcome.stats.elapsed_ms
            );
            let explain = req.explain.unwrap_or(true);
            Ok(Json(QueryResponseHttp {
                report: outcome.report.text,
                intent: outcome.report.intent.category,
                confidence: outcome.report.intent.confidence,
                degraded: outcome.report.degraded,
                stats: outcome.stats,
                decisions: explain.then_some(outcome.decisions),
            }))
        }
        Err(e) => {
            error!("Query failed: {:?}", e);
            let status = if matches!(e, WaypointError::MalformedQuery(_)) {
                StatusCode::BAD_REQUEST
            } else if e.is_infrastructure() {
                StatusCode::SERVICE_UNAVAILABLE
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            Err((
                status,
                Json(ErrorResponse {
                    error: "Query failed".to_string(),
                    details: Some(e.to_string()),
                }),
            ))
        }
    }
}

async fn feedback_handler(
    State(engine): State<Arc<NavEngine>>,
    Json(req): Json<FeedbackRequestHttp>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    let record = FeedbackRecord {
        query_text: req.query,
        intent_category: req.intent,
        components_used: req.components_used,
        rating: req.rating,
        timestamp: now_secs(),
    };

    match engine.record_feedback(record).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) => {
            error!("Feedback recording failed: {:?}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Feedback recording failed".to_string(),
                    details: Some(e.to_string()),
                }),
            ))
        }
    }
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "waypoint".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Create and configure the HTTP server
pub fn create_router(engine: Arc<NavEngine>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/query", post(query_handler))
        .route("/feedback", post(feedback_handler))
        .with_state(engine)
}

/// Run the HTTP server
pub async fn run_server(engine: Arc<NavEngine>, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    info!("Starting Waypoint server on {}", addr);

    let app = create_router(engine);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

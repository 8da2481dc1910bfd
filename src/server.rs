//! HTTP surface of the portal gateway.
//!
//! One route per portal function. Handlers own every degraded-payload
//! decision: the clients below them only return `Result`s, and whatever
//! happens upstream the caller receives a well-formed JSON envelope.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::config::Config;
use crate::explainer::{ExplainerClient, ExplainerError};
use crate::heidi::{HeidiClient, HeidiError};
use crate::models::{parse_timestamp, AiSummary, Document, TranscriptEnvelope};
use crate::{timeline, transcript};

const MISSING_HEIDI_CONFIG: &str = "Missing Heidi API configuration";
const MISSING_GEMINI_CONFIG: &str = "GEMINI_API_KEY is not configured";

/// Immutable per-process state; nothing here is mutated across requests.
#[derive(Clone, Default)]
pub struct AppState {
    pub heidi: Option<Arc<HeidiClient>>,
    pub explainer: Option<Arc<ExplainerClient>>,
}

impl AppState {
    pub fn from_config(config: &Config) -> Self {
        let heidi = config.heidi.as_ref().and_then(|cfg| {
            match HeidiClient::new(cfg) {
                Ok(client) => Some(Arc::new(client)),
                Err(e) => {
                    error!("Heidi client unavailable: {}", e);
                    None
                }
            }
        });

        let explainer = config.gemini.as_ref().and_then(|cfg| {
            match ExplainerClient::new(cfg) {
                Ok(client) => Some(Arc::new(client)),
                Err(e) => {
                    error!("Explainer client unavailable: {}", e);
                    None
                }
            }
        });

        Self { heidi, explainer }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/transcript", post(transcript_handler))
        .route("/explain", post(explain_handler))
        .route("/timeline", get(timeline_handler))
        .route("/documents", get(documents_handler))
        .route("/profile", get(profile_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranscriptRequest {
    #[serde(default)]
    session_id: String,
}

async fn transcript_handler(
    State(state): State<AppState>,
    Json(request): Json<TranscriptRequest>,
) -> Response {
    if request.session_id.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "sessionId is required" })),
        )
            .into_response();
    }

    let Some(heidi) = state.heidi.as_ref() else {
        return degraded_transcript(StatusCode::INTERNAL_SERVER_ERROR, MISSING_HEIDI_CONFIG)
            .into_response();
    };

    info!("Processing transcript for session {}", request.session_id);

    match transcript::summarize_session(heidi, &request.session_id).await {
        Ok(result) => (
            StatusCode::OK,
            Json(TranscriptEnvelope {
                error: None,
                transcript: result.transcript,
                consult_note: result.consult_note,
                ai_summary: result.ai_summary,
                raw_ai_response: Some(result.raw_response),
            }),
        )
            .into_response(),
        Err(err) => {
            error!("Error in transcript pipeline: {}", err);
            degraded_transcript(upstream_status(&err), &err.to_string()).into_response()
        }
    }
}

fn upstream_status(err: &HeidiError) -> StatusCode {
    match err {
        HeidiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn degraded_transcript(status: StatusCode, message: &str) -> (StatusCode, Json<TranscriptEnvelope>) {
    (
        status,
        Json(TranscriptEnvelope {
            error: Some(message.to_string()),
            transcript: "Error fetching transcript".to_string(),
            consult_note: "Error fetching consult note".to_string(),
            ai_summary: AiSummary::unavailable(),
            raw_ai_response: None,
        }),
    )
}

#[derive(Debug, Deserialize)]
struct ExplainRequest {
    #[serde(default)]
    query: String,
    context: Option<Value>,
}

async fn explain_handler(
    State(state): State<AppState>,
    Json(request): Json<ExplainRequest>,
) -> Response {
    if request.query.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": "query is required", "explanation": null })),
        )
            .into_response();
    }

    let Some(explainer) = state.explainer.as_ref() else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": MISSING_GEMINI_CONFIG, "explanation": null })),
        )
            .into_response();
    };

    match explainer.explain(&request.query, request.context.as_ref()).await {
        Ok(explanation) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "explanation": explanation,
                "query": request.query,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            })),
        )
            .into_response(),
        Err(err) => {
            error!("Error in health explainer: {}", err);
            let status = match err {
                ExplainerError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                ExplainerError::PaymentRequired => StatusCode::PAYMENT_REQUIRED,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (
                status,
                Json(json!({ "success": false, "error": err.to_string(), "explanation": null })),
            )
                .into_response()
        }
    }
}

async fn timeline_handler(State(state): State<AppState>) -> Response {
    let Some(heidi) = state.heidi.as_ref() else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": MISSING_HEIDI_CONFIG, "timeline": [] })),
        )
            .into_response();
    };

    let events = timeline::build_timeline(heidi).await;
    let total = events.len();
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "timeline": events,
            "metadata": {
                "totalEvents": total,
                "fetchedAt": chrono::Utc::now().to_rfc3339(),
            },
        })),
    )
        .into_response()
}

async fn documents_handler(State(state): State<AppState>) -> Response {
    let Some(heidi) = state.heidi.as_ref() else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": MISSING_HEIDI_CONFIG, "documents": [] })),
        )
            .into_response();
    };

    match heidi.documents().await {
        Ok(mut documents) => {
            sort_documents(&mut documents);
            let total = documents.len();
            info!("Fetched {} documents", total);
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "documents": documents,
                    "metadata": {
                        "totalDocuments": total,
                        "fetchedAt": chrono::Utc::now().to_rfc3339(),
                    },
                })),
            )
                .into_response()
        }
        Err(err) => {
            error!("Error fetching documents: {}", err);
            (
                upstream_status(&err),
                Json(json!({ "success": false, "error": err.to_string(), "documents": [] })),
            )
                .into_response()
        }
    }
}

/// Newest first; undated documents sink to the end.
fn sort_documents(documents: &mut [Document]) {
    documents.sort_by(|a, b| {
        let key = |d: &Document| d.date.as_deref().and_then(parse_timestamp);
        key(b).cmp(&key(a))
    });
}

async fn profile_handler(State(state): State<AppState>) -> Response {
    let Some(heidi) = state.heidi.as_ref() else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": MISSING_HEIDI_CONFIG, "profile": null })),
        )
            .into_response();
    };

    match heidi.patient_profile().await {
        Ok(profile) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "profile": profile,
                "metadata": { "fetchedAt": chrono::Utc::now().to_rfc3339() },
            })),
        )
            .into_response(),
        Err(err) => {
            error!("Error fetching patient profile: {}", err);
            (
                upstream_status(&err),
                Json(json!({ "success": false, "error": err.to_string(), "profile": null })),
            )
                .into_response()
        }
    }
}

async fn health_handler() -> Json<Value> {
    Json(json!({
        "healthy": true,
        "service": "portal-service",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

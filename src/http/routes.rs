//! HTTP route definitions

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::catalog::{CardDefinition, CardKind};
use crate::store::{MatchResult, SavedDeck, StoreError};
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/cards", get(cards_handler))
        .route("/matches/recent", get(recent_matches_handler))
        .route("/profiles/:profile_id/decks", get(decks_handler))
        .route("/ws", get(ws_handler));

    router
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.client_origins))
        .with_state(state)
}

/// Allowed origins from config, any origin when none are configured
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if allowed.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(allowed)
    }
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_matches: usize,
    players_in_matches: usize,
    queue_size: usize,
    connected_sessions: usize,
    persistent_storage: bool,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let queue_size = state.matchmaking.queue_size().await;

    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        active_matches: state.match_registry.active_matches(),
        players_in_matches: state.match_registry.total_players(),
        queue_size,
        connected_sessions: state.sessions.len(),
        persistent_storage: state.profile_store.is_persistent(),
    })
}

// ============================================================================
// Catalog and deck endpoints
// ============================================================================

async fn cards_handler() -> Json<Vec<CardDefinition>> {
    Json(CardKind::catalog())
}

async fn decks_handler(
    State(state): State<AppState>,
    Path(profile_id): Path<Uuid>,
) -> Result<Json<Vec<SavedDeck>>, AppError> {
    let profile = state.profile_store.get_profile(profile_id).await?;
    if profile.is_none() {
        return Err(AppError::NotFound(format!("profile {}", profile_id)));
    }
    let decks = state.deck_store.load_decks(profile_id).await?;
    Ok(Json(decks))
}

#[derive(Deserialize)]
struct RecentQuery {
    #[serde(default = "default_recent_limit")]
    limit: usize,
}

fn default_recent_limit() -> usize {
    20
}

async fn recent_matches_handler(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<MatchResult>>, AppError> {
    if query.limit == 0 || query.limit > 100 {
        return Err(AppError::BadRequest("limit must be 1 to 100".to_string()));
    }
    Ok(Json(state.results.recent(query.limit)))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            e if e.is_unavailable() => AppError::Unavailable(e.to_string()),
            StoreError::ProfileNotFound(id) => AppError::NotFound(format!("profile {}", id)),
            e @ (StoreError::InvalidUsername
            | StoreError::UsernameTaken
            | StoreError::InvalidDeck(_)) => AppError::BadRequest(e.to_string()),
            e => AppError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

// HTTP routes for the interview API.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::{Json, Router};
use mockview_app::controller::{HintRequest, HintResponse, SessionController, StartRequest, SubmitRequest};
use mockview_core::config::ServerConfig;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::auth::{AuthUser, TokenVerifier};
use crate::error::ApiError;

/// Shared by the HTTP router and the WebSocket server.
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<SessionController>,
    pub verifier: Arc<dyn TokenVerifier>,
}

pub fn router(state: AppState, server: &ServerConfig) -> Router {
    let interview = Router::new()
        .route("/start", post(start_session))
        .route("/hint", post(request_hint))
        .route("/submit", post(submit_solution))
        .route("/history", get(history))
        .route("/{id}", get(session));

    Router::new()
        .route("/health", get(health))
        .nest(&server.api_prefix, interview)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&server.allowed_origins))
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    if allowed_origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {origin:?}");
                None
            }
        })
        .collect();
    cors.allow_origin(origins)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn start_session(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<StartRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload?;
    let session = state.controller.start_session(&user_id, req).await?;
    Ok(Json(json!({ "session": session })))
}

async fn request_hint(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<HintRequest>, JsonRejection>,
) -> Result<Json<HintResponse>, ApiError> {
    let Json(req) = payload?;
    let hint = state
        .controller
        .request_hint(&user_id, &req.session_id)
        .await?;
    Ok(Json(hint))
}

async fn submit_solution(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload?;
    let session = state.controller.submit_solution(&user_id, req).await?;
    Ok(Json(json!({ "session": session })))
}

async fn history(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Value>, ApiError> {
    let sessions = state.controller.get_history(&user_id).await?;
    Ok(Json(json!({ "sessions": sessions })))
}

async fn session(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let session = state.controller.get_session(&user_id, &id).await?;
    Ok(Json(json!({ "session": session })))
}

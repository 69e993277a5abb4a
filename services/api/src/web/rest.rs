//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints. Each editing
//! surface in the browser posts its current fragment at save time; the
//! engine assembles and persists one coherent snapshot from them.

use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;
use writing_project_core::collect::StaticCollector;
use writing_project_core::domain::ProjectDocument;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// Fragments posted by the client at save time, keyed by surface name.
/// A `BTreeMap` keeps the merge order deterministic (sorted by name).
#[derive(Deserialize)]
pub struct SaveRequest {
    #[serde(default)]
    pub fragments: BTreeMap<String, Value>,
}

#[derive(Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// The response payload for one chat turn.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub assistant_reply: String,
    pub project: ProjectDocument,
}

//=========================================================================================
// Header Helpers
//=========================================================================================

fn user_id_from_headers(headers: &HeaderMap) -> Result<Uuid, (StatusCode, String)> {
    let user_id_str = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                "x-user-id header is required".to_string(),
            )
        })?;

    Uuid::parse_str(user_id_str).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            "Invalid x-user-id format".to_string(),
        )
    })
}

fn instructions_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-activity-instructions")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .filter(|s| !s.is_empty())
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Service liveness probe.
pub async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "message": "Writing project API is running",
    }))
}

/// Advisory probe of the assistant collaborator.
pub async fn assistant_health_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    let available = app_state.assistant.health().await.unwrap_or(false);
    Json(json!({ "available": available }))
}

/// Loads the project for this (activity, user), creating a fresh one when
/// nothing is stored yet.
pub async fn get_project_handler(
    State(app_state): State<Arc<AppState>>,
    Path(activity_id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = user_id_from_headers(&headers)?;
    let instructions = instructions_from_headers(&headers);
    let manager = app_state.manager(&activity_id, user_id, instructions).await;
    Ok(Json(manager.store().get()))
}

/// Accepts the surfaces' current fragments, assembles one snapshot and saves it.
pub async fn save_project_handler(
    State(app_state): State<Arc<AppState>>,
    Path(activity_id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<SaveRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = user_id_from_headers(&headers)?;
    let manager = app_state.manager(&activity_id, user_id, None).await;

    for (name, fragment) in payload.fragments {
        manager.register_module(Box::new(StaticCollector::new(name, fragment)));
    }

    match manager.save_project().await {
        Ok(()) => Ok(Json(manager.store().get())),
        Err(e) => {
            error!(activity = %activity_id, error = %e, "failed to save project");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to save project".to_string(),
            ))
        }
    }
}

/// One chat turn: user message in, assistant reply plus the reconciled
/// document out.
pub async fn chat_handler(
    State(app_state): State<Arc<AppState>>,
    Path(activity_id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<ChatRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = user_id_from_headers(&headers)?;
    if payload.message.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "message must not be empty".to_string()));
    }
    let manager = app_state.manager(&activity_id, user_id, None).await;

    match manager.send_chat_message(&payload.message).await {
        Ok(reply) => Ok(Json(ChatResponse {
            assistant_reply: reply,
            project: manager.store().get(),
        })),
        Err(e) => {
            error!(activity = %activity_id, error = %e, "chat turn failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to process chat message".to_string(),
            ))
        }
    }
}

/// Seeds the plan outline from a named template.
pub async fn load_template_handler(
    State(app_state): State<Arc<AppState>>,
    Path((activity_id, template_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = user_id_from_headers(&headers)?;
    let manager = app_state.manager(&activity_id, user_id, None).await;

    match manager.load_template(&template_id).await {
        Ok(()) => Ok(Json(manager.store().get())),
        Err(writing_project_core::ports::PortError::NotFound(_)) => Err((
            StatusCode::NOT_FOUND,
            format!("Unknown template '{template_id}'"),
        )),
        Err(e) => {
            error!(activity = %activity_id, error = %e, "failed to load template");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load template".to_string(),
            ))
        }
    }
}

/// Deletes the stored record and drops the in-memory session.
pub async fn delete_project_handler(
    State(app_state): State<Arc<AppState>>,
    Path(activity_id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = user_id_from_headers(&headers)?;

    match app_state.store.delete(&activity_id, user_id).await {
        Ok(()) => {
            app_state.drop_session(&activity_id, user_id).await;
            Ok(StatusCode::NO_CONTENT)
        }
        Err(e) => {
            error!(activity = %activity_id, error = %e, "failed to delete project");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to delete project".to_string(),
            ))
        }
    }
}

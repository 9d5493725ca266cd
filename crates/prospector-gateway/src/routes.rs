//! API route handlers for the gateway.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use prospector_core::types::{CompanyContext, ConnectionStatus, MessageType};
use prospector_store::NewProfile;

use super::server::AppState;

fn err(status: StatusCode, message: impl std::fmt::Display) -> (StatusCode, Json<Value>) {
    (status, Json(json!({"ok": false, "error": message.to_string()})))
}

fn internal(e: impl std::fmt::Display) -> (StatusCode, Json<Value>) {
    err(StatusCode::INTERNAL_SERVER_ERROR, e)
}

type ApiResult = std::result::Result<Json<Value>, (StatusCode, Json<Value>)>;

/// Health check endpoint.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "prospector-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

// ─── Profiles ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ProfileBody {
    pub name: String,
    pub profile_url: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
}

impl From<ProfileBody> for NewProfile {
    fn from(b: ProfileBody) -> Self {
        NewProfile {
            name: b.name,
            profile_url: b.profile_url,
            company: b.company,
            title: b.title,
            notes: b.notes,
            tags: b.tags,
        }
    }
}

pub async fn create_profile(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ProfileBody>,
) -> ApiResult {
    let profile = state
        .store
        .insert_profile(&body.into())
        .map_err(|e| err(StatusCode::BAD_REQUEST, e))?;
    Ok(Json(json!({"ok": true, "profile": profile})))
}

pub async fn import_profiles(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Vec<ProfileBody>>,
) -> ApiResult {
    let rows = body.into_iter().map(Into::into).collect();
    let outcome = state.store.import_profiles(rows).map_err(internal)?;
    Ok(Json(json!({"ok": true, "result": outcome})))
}

#[derive(Debug, Deserialize)]
pub struct ProfileFilter {
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub skip: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

pub async fn list_profiles(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<ProfileFilter>,
) -> ApiResult {
    let status = match filter.status.as_deref() {
        Some(s) => Some(
            ConnectionStatus::parse(s)
                .ok_or_else(|| err(StatusCode::BAD_REQUEST, format!("unknown status '{s}'")))?,
        ),
        None => None,
    };
    let rows = state
        .store
        .list_profiles(
            filter.company.as_deref(),
            status,
            filter.skip.unwrap_or(0),
            filter.limit.unwrap_or(100),
        )
        .map_err(internal)?;
    let profiles: Vec<Value> = rows
        .into_iter()
        .map(|(profile, status)| {
            json!({
                "profile": profile,
                "connection_status": status,
            })
        })
        .collect();
    Ok(Json(json!({"ok": true, "profiles": profiles})))
}

pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult {
    match state.store.get_profile(id).map_err(internal)? {
        Some(profile) => Ok(Json(json!({"ok": true, "profile": profile}))),
        None => Err(err(StatusCode::NOT_FOUND, format!("profile {id} not found"))),
    }
}

pub async fn delete_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult {
    if state.store.delete_profile(id).map_err(internal)? {
        Ok(Json(json!({"ok": true})))
    } else {
        Err(err(StatusCode::NOT_FOUND, format!("profile {id} not found")))
    }
}

// ─── Connections ───────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct StartBody {
    #[serde(default)]
    pub profile_ids: Option<Vec<i64>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RetryBody {
    #[serde(default)]
    pub connection_ids: Option<Vec<i64>>,
}

/// Admit and launch outreach. Returns immediately with the admission
/// result and a run id the caller can poll. Body `{}` means "all
/// eligible profiles".
pub async fn start_connections(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StartBody>,
) -> ApiResult {
    let ticket = state
        .engine
        .start_connections(body.profile_ids)
        .await
        .map_err(internal)?;
    Ok(Json(json!({"ok": true, "result": ticket})))
}

pub async fn retry_connections(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RetryBody>,
) -> ApiResult {
    let ticket = state
        .engine
        .retry_connections(body.connection_ids)
        .await
        .map_err(internal)?;
    Ok(Json(json!({"ok": true, "result": ticket})))
}

#[derive(Debug, Deserialize)]
pub struct ConnectionFilter {
    #[serde(default)]
    pub status: Option<String>,
}

pub async fn list_connections(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<ConnectionFilter>,
) -> ApiResult {
    let status = match filter.status.as_deref() {
        Some(s) => Some(
            ConnectionStatus::parse(s)
                .ok_or_else(|| err(StatusCode::BAD_REQUEST, format!("unknown status '{s}'")))?,
        ),
        None => None,
    };
    let connections = state.store.list_connections(status).map_err(internal)?;
    Ok(Json(json!({"ok": true, "connections": connections})))
}

pub async fn get_connection(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult {
    match state.store.get_connection_view(id).map_err(internal)? {
        Some(connection) => Ok(Json(json!({"ok": true, "connection": connection}))),
        None => Err(err(StatusCode::NOT_FOUND, format!("connection {id} not found"))),
    }
}

pub async fn list_runs(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({"ok": true, "runs": state.engine.runs().list()}))
}

pub async fn get_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult {
    match state.engine.runs().get(&id) {
        Some(run) => Ok(Json(json!({"ok": true, "run": run}))),
        None => Err(err(StatusCode::NOT_FOUND, format!("run {id} not found"))),
    }
}

// ─── Messages ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MessageFilter {
    #[serde(default)]
    pub connection_id: Option<i64>,
    #[serde(default)]
    pub message_type: Option<String>,
}

pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<MessageFilter>,
) -> ApiResult {
    let message_type = match filter.message_type.as_deref() {
        Some(t) => Some(
            MessageType::parse(t)
                .ok_or_else(|| err(StatusCode::BAD_REQUEST, format!("unknown type '{t}'")))?,
        ),
        None => None,
    };
    let messages = state
        .store
        .list_messages(filter.connection_id, message_type)
        .map_err(internal)?;
    Ok(Json(json!({"ok": true, "messages": messages})))
}

pub async fn get_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult {
    match state.store.get_message_view(id).map_err(internal)? {
        Some(message) => Ok(Json(json!({"ok": true, "message": message}))),
        None => Err(err(StatusCode::NOT_FOUND, format!("message {id} not found"))),
    }
}

#[derive(Debug, Deserialize)]
pub struct SendFollowupBody {
    pub connection_id: i64,
}

/// Operator-triggered follow-up outside the scheduled path.
pub async fn send_followup(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SendFollowupBody>,
) -> ApiResult {
    match state.engine.send_followup_now(body.connection_id).await {
        Ok(message) => Ok(Json(json!({"ok": true, "message": message}))),
        Err(prospector_core::ProspectorError::NotFound(e)) => {
            Err(err(StatusCode::NOT_FOUND, e))
        }
        Err(prospector_core::ProspectorError::InvalidInput(e)) => {
            Err(err(StatusCode::BAD_REQUEST, e))
        }
        Err(e) => Err(internal(e)),
    }
}

// ─── Campaign ──────────────────────────────────────────────────

pub async fn stats(State(state): State<Arc<AppState>>) -> ApiResult {
    let stats = state.store.stats().map_err(internal)?;
    Ok(Json(json!({"ok": true, "stats": stats})))
}

pub async fn get_settings(State(state): State<Arc<AppState>>) -> ApiResult {
    let context = state.store.company_context().map_err(internal)?;
    Ok(Json(json!({"ok": true, "settings": context})))
}

pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CompanyContext>,
) -> ApiResult {
    state.store.update_company_context(&body).map_err(internal)?;
    Ok(Json(json!({"ok": true, "settings": body})))
}

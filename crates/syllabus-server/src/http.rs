// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP surface over the bulk creator and the record store.
//!
//! | Method | Path | Result |
//! |--------|------|--------|
//! | `GET` | `/health` | `{healthy, version, uptimeMs}` |
//! | `POST` | `/api/{collection}/batch` | batch result |
//! | `GET` | `/api/{collection}/{id}` | one record |
//! | `GET` | `/api/{collection}?limit=&offset=` | records visible to the caller |
//!
//! The caller identity comes from headers set by an upstream gateway:
//! `x-caller-sub`, `x-caller-groups` (comma list) and `x-caller-issuer`.
//! Without a subject, an `x-api-key` that matches a configured key puts the
//! caller on the guest path.

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};
use uuid::Uuid;

use syllabus_core::authz::{self, AuthRule, Operation, ReadScope};
use syllabus_core::schema::{self, Course, Major, Student, Todo, University};
use syllabus_core::store::ListFilter;
use syllabus_core::{BatchRequest, BulkCreator, CallerKind, CoreError, Entity, Identity};

/// Subject of an authenticated caller.
pub const CALLER_SUB_HEADER: &str = "x-caller-sub";
/// Comma-separated groups of an authenticated caller.
pub const CALLER_GROUPS_HEADER: &str = "x-caller-groups";
/// Issuer of the caller's subject.
pub const CALLER_ISSUER_HEADER: &str = "x-caller-issuer";
/// Key for the guest path.
pub const API_KEY_HEADER: &str = "x-api-key";

const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 500;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    creator: Arc<BulkCreator>,
    api_keys: Arc<Vec<String>>,
    started_at: Instant,
}

impl AppState {
    /// State over `creator`, accepting `api_keys` on the guest path.
    pub fn new(creator: BulkCreator, api_keys: Vec<String>) -> Self {
        Self {
            creator: Arc::new(creator),
            api_keys: Arc::new(api_keys),
            started_at: Instant::now(),
        }
    }

    /// The bulk creator behind the batch endpoint.
    pub fn creator(&self) -> &BulkCreator {
        &self.creator
    }

    fn identity(&self, headers: &HeaderMap) -> Identity {
        identity_from_headers(headers, &self.api_keys)
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("creator", &self.creator)
            .field("api_keys", &"...")
            .finish()
    }
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/api/{collection}", get(handle_list))
        .route("/api/{collection}/batch", post(handle_batch))
        .route("/api/{collection}/{id}", get(handle_get))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Derive the caller identity from request headers.
pub fn identity_from_headers(headers: &HeaderMap, api_keys: &[String]) -> Identity {
    if let Some(subject) = header_value(headers, CALLER_SUB_HEADER) {
        let mut identity = Identity::authenticated(subject);
        if let Some(groups) = header_value(headers, CALLER_GROUPS_HEADER) {
            identity = identity.with_groups(
                groups
                    .split(',')
                    .map(str::trim)
                    .filter(|g| !g.is_empty()),
            );
        }
        if let Some(issuer) = header_value(headers, CALLER_ISSUER_HEADER) {
            identity = identity.with_issuer(issuer);
        }
        return identity;
    }

    if let Some(key) = header_value(headers, API_KEY_HEADER)
        && api_keys.iter().any(|k| k == key)
    {
        return Identity::guest();
    }

    Identity::anonymous()
}

// ============================================================================
// Errors
// ============================================================================

/// Error rendered as `{code, message}` with a matching status.
#[derive(Debug)]
pub enum ApiError {
    /// Error raised by the core crate.
    Core(CoreError),
    /// The path names no schema collection.
    UnknownCollection(String),
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self::Core(err)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// HTTP status for a core error.
pub fn status_for(err: &CoreError) -> StatusCode {
    match err {
        CoreError::ValidationError { .. } => StatusCode::BAD_REQUEST,
        CoreError::AuthenticationRequired => StatusCode::UNAUTHORIZED,
        CoreError::Forbidden { .. } => StatusCode::FORBIDDEN,
        CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        CoreError::ItemConflict { .. } => StatusCode::CONFLICT,
        CoreError::InfrastructureError { .. } => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Core(err) => (
                status_for(&err),
                ErrorBody {
                    code: err.error_code().to_string(),
                    message: err.to_string(),
                },
            ),
            Self::UnknownCollection(name) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    code: "UNKNOWN_COLLECTION".to_string(),
                    message: format!("Unknown collection '{}'", name),
                },
            ),
        };

        if status.is_server_error() {
            error!(code = %body.code, "{}", body.message);
        } else {
            debug!(code = %body.code, status = status.as_u16(), "{}", body.message);
        }

        (status, axum::Json(body)).into_response()
    }
}

fn rules_for(collection: &str) -> Result<&'static [AuthRule], ApiError> {
    schema::auth_rules_for(collection)
        .ok_or_else(|| ApiError::UnknownCollection(collection.to_string()))
}

/// Anonymous callers are asked to authenticate; known callers are refused.
fn read_denied(identity: &Identity, collection: &str) -> ApiError {
    if identity.kind == CallerKind::Anonymous {
        return CoreError::AuthenticationRequired.into();
    }
    CoreError::Forbidden {
        collection: collection.to_string(),
        operation: Operation::Read.to_string(),
    }
    .into()
}

// ============================================================================
// GET /health
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    healthy: bool,
    version: &'static str,
    uptime_ms: u64,
}

async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    let healthy = match state.creator.store().health_check().await {
        Ok(healthy) => healthy,
        Err(e) => {
            error!(backend = state.creator.store().backend(), "Health check failed: {}", e);
            false
        }
    };
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = HealthResponse {
        healthy,
        version: env!("CARGO_PKG_VERSION"),
        uptime_ms: u64::try_from(state.started_at.elapsed().as_millis()).unwrap_or(u64::MAX),
    };
    (status, axum::Json(body))
}

// ============================================================================
// POST /api/{collection}/batch
// ============================================================================

async fn handle_batch(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let identity = state.identity(&headers);
    match collection.as_str() {
        Todo::COLLECTION => create::<Todo>(&state, &body, &identity).await,
        University::COLLECTION => create::<University>(&state, &body, &identity).await,
        Major::COLLECTION => create::<Major>(&state, &body, &identity).await,
        Course::COLLECTION => create::<Course>(&state, &body, &identity).await,
        Student::COLLECTION => create::<Student>(&state, &body, &identity).await,
        _ => Err(ApiError::UnknownCollection(collection)),
    }
}

async fn create<E: Entity>(
    state: &AppState,
    body: &[u8],
    identity: &Identity,
) -> Result<Response, ApiError> {
    // Identity and authorization come before the body is looked at.
    state.creator.authorize_create::<E>(identity)?;

    // Only the envelope is decoded here. Items that do not fit the entity
    // become per-item failures.
    let request: BatchRequest<serde_json::Value> = serde_json::from_slice(body)
        .map_err(|e| CoreError::validation("requests", e.to_string()))?;

    let result = state
        .creator
        .create_batch_json::<E>(request.requests, identity)
        .await?;

    Ok(axum::Json(result).into_response())
}

// ============================================================================
// GET /api/{collection}/{id}
// ============================================================================

async fn handle_get(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let rules = rules_for(&collection)?;
    let identity = state.identity(&headers);

    let not_found = || CoreError::NotFound {
        collection: collection.clone(),
        id: id.clone(),
    };
    let record_id = Uuid::parse_str(&id).map_err(|_| not_found())?;

    let item = state
        .creator
        .store()
        .get(&collection, record_id)
        .await
        .map_err(CoreError::from)?
        .ok_or_else(not_found)?;

    if !authz::authorize(rules, &identity, Operation::Read, item.owner.as_deref()) {
        return Err(read_denied(&identity, &collection));
    }

    Ok(axum::Json(item.body).into_response())
}

// ============================================================================
// GET /api/{collection}?limit=&offset=
// ============================================================================

#[derive(Debug, Deserialize)]
struct ListParams {
    limit: Option<i64>,
    offset: Option<i64>,
}

async fn handle_list(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(params): Query<ListParams>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let rules = rules_for(&collection)?;
    let identity = state.identity(&headers);

    let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    if !(1..=MAX_LIST_LIMIT).contains(&limit) {
        return Err(CoreError::validation(
            "limit",
            format!("must be between 1 and {}", MAX_LIST_LIMIT),
        )
        .into());
    }
    let offset = params.offset.unwrap_or(0);
    if offset < 0 {
        return Err(CoreError::validation("offset", "must not be negative").into());
    }

    let owner = match authz::read_scope(rules, &identity) {
        ReadScope::All => None,
        ReadScope::Owned(subject) => Some(subject),
        ReadScope::Denied => return Err(read_denied(&identity, &collection)),
    };

    let filter = ListFilter {
        owner,
        limit,
        offset,
    };
    let items = state
        .creator
        .store()
        .list(&collection, &filter)
        .await
        .map_err(CoreError::from)?;

    let records: Vec<serde_json::Value> = items.into_iter().map(|item| item.body).collect();
    Ok(axum::Json(records).into_response())
}

// SPDX-License-Identifier: EUPL-1.2

//! Axum route handlers for applications.
//!
//! ## Endpoints
//!
//! - `GET  /health`                       — Health check
//! - `POST /applications`                 — Submit a hosting request (developer)
//! - `GET  /applications`                 — List (filterable by stage/status/search)
//! - `GET  /applications/queue`           — Open applications awaiting the caller's role
//! - `GET  /applications/summary`         — Counts per stage/status/checklist
//! - `GET  /applications/:id`             — Get one application
//! - `POST /applications/:id/approve`     — Approve at the current stage
//! - `POST /applications/:id/reject`      — Reject (terminal)
//! - `POST /applications/:id/escalate`    — Escalate from the HOD stage

use crate::{
    db::AppState,
    error::WorkflowError,
    models::{
        Actor, Application, ApplicationFilter, ApplicationQuery, ApplicationView, Role,
        Stage, Status, StatusSummary, SubmitRequest, TransitionRequest,
    },
    workflow::{parse_internet_facing, Submission},
};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

// ── Health ────────────────────────────────────────────────────────────────────

/// `GET /health` — Health check
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "hosting-portal",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ── Scope helpers ─────────────────────────────────────────────────────────────

/// Developers only ever see their own submissions.
pub(crate) fn read_scope(actor: &Actor) -> Option<String> {
    (actor.role == Role::Developer).then(|| actor.identity.clone())
}

/// Hide applications outside the caller's read scope as if they did not exist.
pub(crate) fn ensure_visible(actor: &Actor, app: &Application) -> Result<(), WorkflowError> {
    match read_scope(actor) {
        Some(owner) if owner != app.submitted_by => Err(WorkflowError::NotFound(app.id)),
        _ => Ok(()),
    }
}

/// Dashboard dropdowns send `all` for "no filter".
fn parse_filter<T>(raw: Option<&str>) -> Result<Option<T>, WorkflowError>
where
    T: std::str::FromStr<Err = String>,
{
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) if v.eq_ignore_ascii_case("all") => Ok(None),
        Some(v) => v.parse().map(Some).map_err(WorkflowError::Validation),
    }
}

// ── Submit ────────────────────────────────────────────────────────────────────

/// `POST /applications` — Submit a new hosting request.
///
/// Body: `{ "artifact_ref": "blob://…", "checklist": { … }, "internet_facing": "yes" }`
pub async fn submit_application(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(req): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<ApplicationView>), WorkflowError> {
    let submission = Submission {
        internet_facing: parse_internet_facing(req.internet_facing.as_deref())?,
        artifact_ref: req.artifact_ref,
        artifact_name: req.artifact_name,
        checklist: req.checklist,
    };

    let app = state.engine.submit(&actor, submission).await?;
    Ok((StatusCode::CREATED, Json(app.into())))
}

// ── List ──────────────────────────────────────────────────────────────────────

/// `GET /applications` — List applications, most recently updated first.
pub async fn list_applications(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Query(q): Query<ApplicationQuery>,
) -> Result<Json<Value>, WorkflowError> {
    let limit = q.limit.unwrap_or(50).clamp(1, 200);
    let offset = q.offset.unwrap_or(0).max(0);

    let filter = ApplicationFilter {
        stage: parse_filter::<Stage>(q.stage.as_deref())?,
        status: parse_filter::<Status>(q.status.as_deref())?,
        search_text: q.search.filter(|s| !s.trim().is_empty()),
        submitted_by: read_scope(&actor),
        limit: Some(limit),
        offset,
    };

    let applications: Vec<ApplicationView> = state
        .engine
        .list(&filter)
        .await?
        .into_iter()
        .map(ApplicationView::from)
        .collect();

    Ok(Json(json!({
        "count": applications.len(),
        "offset": offset,
        "applications": applications,
    })))
}

/// `GET /applications/queue` — Open applications waiting on the caller's role.
pub async fn review_queue(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Value>, WorkflowError> {
    let applications: Vec<ApplicationView> = state
        .engine
        .queue(&actor)
        .await?
        .into_iter()
        .map(ApplicationView::from)
        .collect();

    Ok(Json(json!({
        "role": actor.role,
        "count": applications.len(),
        "applications": applications,
    })))
}

/// `GET /applications/summary` — Global application status counts.
pub async fn status_summary(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<StatusSummary>, WorkflowError> {
    let scope = ApplicationFilter {
        submitted_by: read_scope(&actor),
        ..Default::default()
    };
    Ok(Json(state.engine.summary(&scope).await?))
}

// ── Get one ───────────────────────────────────────────────────────────────────

/// `GET /applications/:id` — Get a single application.
pub async fn get_application(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<ApplicationView>, WorkflowError> {
    let app = state.engine.get(id).await?;
    ensure_visible(&actor, &app)?;
    Ok(Json(app.into()))
}

// ── Transitions ───────────────────────────────────────────────────────────────

/// An empty body means no remarks and no version precondition; anything else
/// must be a well-formed [`TransitionRequest`].
fn transition_request(body: &[u8]) -> Result<TransitionRequest, WorkflowError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(TransitionRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| WorkflowError::Validation(format!("invalid transition body: {e}")))
}

/// `POST /applications/:id/approve` — Approve at the current stage.
///
/// Body (optional): `{ "remarks": "...", "expected_version": 3 }`
pub async fn approve_application(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<ApplicationView>, WorkflowError> {
    let req = transition_request(&body)?;
    let app = state
        .engine
        .approve(&actor, id, req.remarks, req.expected_version)
        .await?;
    Ok(Json(app.into()))
}

/// `POST /applications/:id/reject` — Reject; the application becomes terminal.
pub async fn reject_application(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<ApplicationView>, WorkflowError> {
    let req = transition_request(&body)?;
    let app = state
        .engine
        .reject(&actor, id, req.remarks, req.expected_version)
        .await?;
    Ok(Json(app.into()))
}

/// `POST /applications/:id/escalate` — Escalate from the HOD stage.
pub async fn escalate_application(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<ApplicationView>, WorkflowError> {
    let req = transition_request(&body)?;
    let app = state
        .engine
        .escalate(&actor, id, req.remarks, req.expected_version)
        .await?;
    Ok(Json(app.into()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

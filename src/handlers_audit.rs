// SPDX-License-Identifier: EUPL-1.2

//! Handlers for the audit trail.
//!
//! ## Endpoints
//!
//! - `GET  /applications/:id/audit` — Audit trail of one application
//! - `GET  /audit`                  — Ledger query (filterable by actor/action/date range)

use crate::{
    db::AppState,
    error::WorkflowError,
    handlers::ensure_visible,
    models::{Actor, AuditAction, AuditEntry, AuditEntryView, AuditFilter, AuditQuery},
};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

fn views(entries: Vec<AuditEntry>) -> Vec<AuditEntryView> {
    entries.into_iter().map(AuditEntryView::from).collect()
}

// ── Per application ───────────────────────────────────────────────────────────

/// `GET /applications/:id/audit` — Recorded actions on one application, oldest first.
///
/// Admins and the submitting developer see the whole trail; stage reviewers
/// see their own entries, as on `GET /audit`.
pub async fn application_audit(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, WorkflowError> {
    let app = state.engine.get(id).await?;
    ensure_visible(&actor, &app)?;

    let entries = views(state.ledger.query_application_scoped(&actor, id).await?);

    Ok(Json(json!({
        "application_id": id,
        "application_name": app.name,
        "count": entries.len(),
        "entries": entries,
    })))
}

// ── Ledger query ──────────────────────────────────────────────────────────────

/// `GET /audit` — Query the ledger within the caller's audit scope.
pub async fn query_audit(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Query(q): Query<AuditQuery>,
) -> Result<Json<Value>, WorkflowError> {
    if let (Some(from), Some(to)) = (q.from, q.to) {
        if from > to {
            return Err(WorkflowError::Validation(
                "'from' must not be after 'to'".into(),
            ));
        }
    }

    let action = match q.action.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(a) if a.eq_ignore_ascii_case("all") => None,
        Some(a) => Some(a.parse::<AuditAction>().map_err(WorkflowError::Validation)?),
    };

    let filter = AuditFilter {
        actor: q.actor.filter(|a| !a.trim().is_empty()),
        action,
        from: q.from,
        to: q.to,
        application_owner: None,
    };

    let entries = views(state.ledger.query_scoped(&actor, filter).await?);

    Ok(Json(json!({
        "count": entries.len(),
        "entries": entries,
    })))
}

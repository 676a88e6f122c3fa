// SPDX-License-Identifier: EUPL-1.2

//! Error types for the Hosting Portal.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::store::StoreError;

/// Errors surfaced by the workflow engine, the ledger and the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Application not found: {0}")]
    NotFound(Uuid),

    #[error("Application {0} was modified concurrently; reload and retry")]
    ConcurrentModification(Uuid),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl WorkflowError {
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::Validation(_) => "validation",
            WorkflowError::InvalidTransition(_) => "invalid_transition",
            WorkflowError::NotFound(_) => "not_found",
            WorkflowError::ConcurrentModification(_) => "concurrent_modification",
            WorkflowError::Persistence(_) => "persistence",
            WorkflowError::Unauthenticated(_) => "unauthenticated",
            WorkflowError::Forbidden(_) => "forbidden",
        }
    }
}

impl From<StoreError> for WorkflowError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Stale(id) => WorkflowError::ConcurrentModification(id),
            other => WorkflowError::Persistence(other.to_string()),
        }
    }
}

impl IntoResponse for WorkflowError {
    fn into_response(self) -> Response {
        let status = match &self {
            WorkflowError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            WorkflowError::InvalidTransition(_) => StatusCode::CONFLICT,
            WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
            WorkflowError::ConcurrentModification(_) => StatusCode::CONFLICT,
            WorkflowError::Persistence(e) => {
                tracing::error!("Persistence failure: {e}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            WorkflowError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            WorkflowError::Forbidden(_) => StatusCode::FORBIDDEN,
        };

        (
            status,
            Json(json!({ "error": self.to_string(), "kind": self.kind() })),
        )
            .into_response()
    }
}

// SPDX-License-Identifier: EUPL-1.2

//! Hosting Portal — approval workflow for application-hosting requests.
//!
//! A developer submits a WAR artifact with its security checklist; the request
//! then passes reviewer → HOD → DTG → CDT → hosting, any of whom may reject,
//! and the HOD may escalate. Every transition is recorded in an append-only
//! audit ledger.

pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod handlers_audit;
pub mod ledger;
pub mod models;
pub mod routing;
pub mod store;
pub mod workflow;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use db::AppState;

/// Build the HTTP router over `state`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/applications",
            get(handlers::list_applications).post(handlers::submit_application),
        )
        .route("/applications/queue", get(handlers::review_queue))
        .route("/applications/summary", get(handlers::status_summary))
        .route("/applications/:id", get(handlers::get_application))
        .route("/applications/:id/approve", post(handlers::approve_application))
        .route("/applications/:id/reject", post(handlers::reject_application))
        .route("/applications/:id/escalate", post(handlers::escalate_application))
        .route("/applications/:id/audit", get(handlers_audit::application_audit))
        .route("/audit", get(handlers_audit::query_audit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

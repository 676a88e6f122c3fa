// SPDX-License-Identifier: EUPL-1.2

//! Hosting Portal — approval workflow server.
//!
//! See [`hosting_portal::handlers`] and [`hosting_portal::handlers_audit`] for
//! the endpoints, and [`hosting_portal::config`] for the environment it reads.

use std::sync::Arc;

use hosting_portal::{config::Config, router, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "hosting_portal=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        "Escalations route to the {} stage{}",
        config.routing.escalation.target,
        config
            .routing
            .escalation
            .handler
            .as_deref()
            .map(|h| format!(" (handler: {h})"))
            .unwrap_or_default()
    );

    let state = Arc::new(AppState::connect(&config).await?);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!("Hosting Portal listening on http://{}", config.listen_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

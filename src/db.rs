// SPDX-License-Identifier: EUPL-1.2

//! Persistence backend selection, Redis cache, and application state.

use std::sync::Arc;

use ed25519_dalek::VerifyingKey;
use sqlx::PgPool;

use crate::{
    auth,
    cache::ApplicationCache,
    config::Config,
    ledger::AuditLedger,
    routing::Routing,
    store::{MemoryStore, PgStore, WorkflowStore},
    workflow::WorkflowEngine,
};

/// Shared application state injected into every Axum handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: WorkflowEngine,
    pub ledger: AuditLedger,
    /// Identity-provider key for `X-Portal-Signature`.
    /// When `None`, identity headers are trusted as sent (local dev only).
    pub identity_key: Option<VerifyingKey>,
}

impl AppState {
    /// Assemble state over any store.
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        routing: Routing,
        cache: ApplicationCache,
        identity_key: Option<VerifyingKey>,
    ) -> Self {
        Self {
            engine: WorkflowEngine::new(store.clone(), routing, cache),
            ledger: AuditLedger::new(store),
            identity_key,
        }
    }

    /// In-memory store, no cache.
    pub fn in_memory(routing: Routing, identity_key: Option<VerifyingKey>) -> Self {
        Self::new(
            Arc::new(MemoryStore::new()),
            routing,
            ApplicationCache::disabled(),
            identity_key,
        )
    }

    /// Connect to PostgreSQL (or fall back to memory when unset) and Redis (optional).
    pub async fn connect(config: &Config) -> anyhow::Result<Self> {
        let identity_key = match &config.identity_public_key {
            Some(key) => {
                let key = auth::decode_public_key(key)
                    .map_err(|e| anyhow::anyhow!("IDENTITY_PUBLIC_KEY: {e}"))?;
                tracing::info!("IDENTITY_PUBLIC_KEY set — identity assertions are verified");
                Some(key)
            }
            None => {
                tracing::warn!("IDENTITY_PUBLIC_KEY not set — identity headers are trusted (dev mode)");
                None
            }
        };

        let store: Arc<dyn WorkflowStore> = match &config.database_url {
            Some(url) => {
                let pool = PgPool::connect(url).await?;
                tracing::info!("Hosting Portal connected to database");

                sqlx::migrate!("./migrations").run(&pool).await?;
                tracing::info!("Migrations applied");

                Arc::new(PgStore::new(pool))
            }
            None => {
                tracing::warn!("DATABASE_URL not set — using in-memory store, state is lost on exit");
                Arc::new(MemoryStore::new())
            }
        };

        let cache = ApplicationCache::connect(config.redis_url.as_deref()).await;

        Ok(Self::new(store, config.routing.clone(), cache, identity_key))
    }
}

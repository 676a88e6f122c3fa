// SPDX-License-Identifier: EUPL-1.2

//! Persistence substrate for applications and the audit ledger.
//!
//! Backends are transactional per application: [`WorkflowStore::commit_transition`]
//! applies a compare-and-swap on the application's `(stage, status, version)`
//! snapshot and appends the audit entry in the same commit, so readers see
//! either both changes or neither.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    Application, ApplicationFilter, AuditEntry, AuditFilter, NewAuditEntry, Snapshot,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The stored application no longer matches the snapshot a transition was planned on.
    #[error("stale snapshot for application {0}")]
    Stale(Uuid),

    #[error("application {0} already exists")]
    Duplicate(Uuid),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn insert_application(&self, app: &Application) -> Result<(), StoreError>;

    async fn fetch_application(&self, id: Uuid) -> Result<Option<Application>, StoreError>;

    /// Ordered by `updated_at` descending.
    async fn list_applications(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<Application>, StoreError>;

    /// Replace the application matching `expected` with `next` and append `entry`, atomically.
    async fn commit_transition(
        &self,
        expected: &Snapshot,
        next: &Application,
        entry: NewAuditEntry,
    ) -> Result<AuditEntry, StoreError>;

    async fn append_audit(&self, entry: NewAuditEntry) -> Result<AuditEntry, StoreError>;

    /// Ordered by timestamp, then insertion.
    async fn audit_for_application(&self, id: Uuid) -> Result<Vec<AuditEntry>, StoreError>;

    /// Ordered by timestamp, then insertion.
    async fn audit_entries(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, StoreError>;
}

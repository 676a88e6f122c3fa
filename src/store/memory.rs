// SPDX-License-Identifier: EUPL-1.2

//! In-memory store for local development and tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{StoreError, WorkflowStore};
use crate::models::{
    Application, ApplicationFilter, AuditEntry, AuditFilter, NewAuditEntry, Snapshot,
};

#[derive(Debug, Default)]
struct Inner {
    applications: HashMap<Uuid, Application>,
    audit: Vec<AuditEntry>,
}

impl Inner {
    fn push_audit(&mut self, entry: NewAuditEntry) -> AuditEntry {
        let sequence = self.audit.len() as i64 + 1;
        let entry = AuditEntry::sequenced(entry, sequence);
        self.audit.push(entry.clone());
        entry
    }

    fn owned_by(&self, application_id: Uuid, owner: &str) -> bool {
        self.applications
            .get(&application_id)
            .is_some_and(|app| app.submitted_by == owner)
    }
}

/// Applications and ledger behind one lock; a commit holds the write half.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted_by_time(mut entries: Vec<AuditEntry>) -> Vec<AuditEntry> {
    entries.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then(a.sequence.cmp(&b.sequence))
    });
    entries
}

#[async_trait]
impl WorkflowStore for MemoryStore {
    async fn insert_application(&self, app: &Application) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.applications.contains_key(&app.id) {
            return Err(StoreError::Duplicate(app.id));
        }
        inner.applications.insert(app.id, app.clone());
        Ok(())
    }

    async fn fetch_application(&self, id: Uuid) -> Result<Option<Application>, StoreError> {
        Ok(self.inner.read().await.applications.get(&id).cloned())
    }

    async fn list_applications(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<Application>, StoreError> {
        let inner = self.inner.read().await;
        let mut apps: Vec<Application> = inner
            .applications
            .values()
            .filter(|app| filter.matches(app))
            .cloned()
            .collect();
        apps.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));

        let offset = usize::try_from(filter.offset).unwrap_or(0);
        let limit = filter
            .limit
            .and_then(|l| usize::try_from(l).ok())
            .unwrap_or(usize::MAX);
        Ok(apps.into_iter().skip(offset).take(limit).collect())
    }

    async fn commit_transition(
        &self,
        expected: &Snapshot,
        next: &Application,
        entry: NewAuditEntry,
    ) -> Result<AuditEntry, StoreError> {
        let mut inner = self.inner.write().await;
        let current = inner
            .applications
            .get_mut(&expected.id)
            .ok_or(StoreError::Stale(expected.id))?;
        if current.snapshot() != *expected {
            return Err(StoreError::Stale(expected.id));
        }
        *current = next.clone();
        Ok(inner.push_audit(entry))
    }

    async fn append_audit(&self, entry: NewAuditEntry) -> Result<AuditEntry, StoreError> {
        Ok(self.inner.write().await.push_audit(entry))
    }

    async fn audit_for_application(&self, id: Uuid) -> Result<Vec<AuditEntry>, StoreError> {
        let inner = self.inner.read().await;
        let entries = inner
            .audit
            .iter()
            .filter(|e| e.application_id == id)
            .cloned()
            .collect();
        Ok(sorted_by_time(entries))
    }

    async fn audit_entries(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, StoreError> {
        let inner = self.inner.read().await;
        let entries = inner
            .audit
            .iter()
            .filter(|e| filter.matches_entry(e))
            .filter(|e| {
                filter
                    .application_owner
                    .as_deref()
                    .map_or(true, |owner| inner.owned_by(e.application_id, owner))
            })
            .cloned()
            .collect();
        Ok(sorted_by_time(entries))
    }
}

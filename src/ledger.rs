// SPDX-License-Identifier: EUPL-1.2

//! Append-only audit ledger.
//!
//! The ledger has no update or delete operations. Transition entries are
//! written by the workflow engine inside the same commit as the state change;
//! [`AuditLedger::record`] is the standalone append for anything else.

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    error::WorkflowError,
    models::{Actor, AuditEntry, AuditFilter, NewAuditEntry, Role},
    store::WorkflowStore,
};

#[derive(Clone)]
pub struct AuditLedger {
    store: Arc<dyn WorkflowStore>,
}

impl AuditLedger {
    pub fn new(store: Arc<dyn WorkflowStore>) -> Self {
        Self { store }
    }

    /// Append one entry. Fails only on a storage fault.
    pub async fn record(&self, entry: NewAuditEntry) -> Result<AuditEntry, WorkflowError> {
        let recorded = self.store.append_audit(entry).await?;
        tracing::info!(
            "Audit #{}: {} {} by {}",
            recorded.sequence,
            recorded.application_id,
            recorded.action,
            recorded.performed_by()
        );
        Ok(recorded)
    }

    /// Every entry for one application, oldest first.
    pub async fn query_by_application(&self, id: Uuid) -> Result<Vec<AuditEntry>, WorkflowError> {
        Ok(self.store.audit_for_application(id).await?)
    }

    /// One application's trail narrowed the way [`AuditLedger::query_scoped`]
    /// narrows the ledger: stage reviewers see only the entries they recorded.
    /// Whether a developer owns the application is the caller's check.
    pub async fn query_application_scoped(
        &self,
        actor: &Actor,
        id: Uuid,
    ) -> Result<Vec<AuditEntry>, WorkflowError> {
        let mut entries = self.query_by_application(id).await?;
        if actor.role.stage().is_some() {
            entries.retain(|e| e.actor.identity == actor.identity);
        }
        Ok(entries)
    }

    /// Entries matching `filter`, oldest first.
    pub async fn query_all(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, WorkflowError> {
        Ok(self.store.audit_entries(filter).await?)
    }

    /// `query_all` narrowed to what `actor` may read: admins see everything,
    /// developers see entries on their own applications, reviewers of every
    /// stage see the entries they recorded.
    pub async fn query_scoped(
        &self,
        actor: &Actor,
        filter: AuditFilter,
    ) -> Result<Vec<AuditEntry>, WorkflowError> {
        let filter = match actor.role {
            Role::Admin => filter,
            Role::Developer => AuditFilter {
                application_owner: Some(actor.identity.clone()),
                ..filter
            },
            _ => {
                if filter
                    .actor
                    .as_deref()
                    .is_some_and(|requested| requested != actor.identity)
                {
                    return Err(WorkflowError::Forbidden(
                        "only admins may query other actors' audit entries".into(),
                    ));
                }
                AuditFilter {
                    actor: Some(actor.identity.clone()),
                    ..filter
                }
            }
        };
        self.query_all(&filter).await
    }
}

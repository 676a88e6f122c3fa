// SPDX-License-Identifier: EUPL-1.2

//! PostgreSQL store. Schema lives in `migrations/`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{StoreError, WorkflowStore};
use crate::models::{
    Actor, Application, ApplicationFilter, AuditEntry, AuditFilter, Checklist, NewAuditEntry,
    Snapshot,
};

const APPLICATION_COLUMNS: &str = "id, name, artifact_ref, submitted_by, internet_facing,
     secure_guidelines, peer_review, password_policy, firewall_policy, pt_report, audit_trail,
     stage, status, current_approver, escalation_handler, version, created_at, updated_at";

const AUDIT_COLUMNS: &str = "a.sequence, a.id, a.application_id, a.application_name, a.action,
     a.actor_identity, a.actor_role, a.on_behalf_of, a.timestamp, a.remarks";

#[derive(Debug, sqlx::FromRow)]
struct ApplicationRow {
    id: Uuid,
    name: String,
    artifact_ref: String,
    submitted_by: String,
    internet_facing: bool,
    secure_guidelines: bool,
    peer_review: bool,
    password_policy: bool,
    firewall_policy: bool,
    pt_report: bool,
    audit_trail: bool,
    stage: String,
    status: String,
    current_approver: Option<String>,
    escalation_handler: Option<String>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ApplicationRow> for Application {
    type Error = StoreError;

    fn try_from(r: ApplicationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            stage: r.stage.parse().map_err(StoreError::Corrupt)?,
            status: r.status.parse().map_err(StoreError::Corrupt)?,
            id: r.id,
            name: r.name,
            artifact_ref: r.artifact_ref,
            submitted_by: r.submitted_by,
            internet_facing: r.internet_facing,
            checklist: Checklist {
                secure_guidelines: r.secure_guidelines,
                peer_review: r.peer_review,
                password_policy: r.password_policy,
                firewall_policy: r.firewall_policy,
                pt_report: r.pt_report,
                audit_trail: r.audit_trail,
            },
            current_approver: r.current_approver,
            escalation_handler: r.escalation_handler,
            version: r.version,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AuditRow {
    sequence: i64,
    id: Uuid,
    application_id: Uuid,
    application_name: String,
    action: String,
    actor_identity: String,
    actor_role: String,
    on_behalf_of: Option<String>,
    timestamp: DateTime<Utc>,
    remarks: Option<String>,
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = StoreError;

    fn try_from(r: AuditRow) -> Result<Self, Self::Error> {
        Ok(Self {
            action: r.action.parse().map_err(StoreError::Corrupt)?,
            actor: Actor {
                identity: r.actor_identity,
                role: r.actor_role.parse().map_err(StoreError::Corrupt)?,
            },
            on_behalf_of: r
                .on_behalf_of
                .map(|s| s.parse())
                .transpose()
                .map_err(StoreError::Corrupt)?,
            id: r.id,
            sequence: r.sequence,
            application_id: r.application_id,
            application_name: r.application_name,
            timestamp: r.timestamp,
            remarks: r.remarks,
        })
    }
}

fn into_entries(rows: Vec<AuditRow>) -> Result<Vec<AuditEntry>, StoreError> {
    rows.into_iter().map(AuditEntry::try_from).collect()
}

async fn insert_audit(
    conn: &mut PgConnection,
    entry: NewAuditEntry,
) -> Result<AuditEntry, StoreError> {
    let sequence: i64 = sqlx::query_scalar(
        "INSERT INTO audit_entries
           (id, application_id, application_name, action, actor_identity, actor_role,
            on_behalf_of, timestamp, remarks)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         RETURNING sequence",
    )
    .bind(entry.id)
    .bind(entry.application_id)
    .bind(&entry.application_name)
    .bind(entry.action.as_str())
    .bind(&entry.actor.identity)
    .bind(entry.actor.role.as_str())
    .bind(entry.on_behalf_of.map(|s| s.as_str()))
    .bind(entry.timestamp)
    .bind(&entry.remarks)
    .fetch_one(conn)
    .await?;

    Ok(AuditEntry::sequenced(entry, sequence))
}

/// Store backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkflowStore for PgStore {
    async fn insert_application(&self, app: &Application) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO applications
               (id, name, artifact_ref, submitted_by, internet_facing,
                secure_guidelines, peer_review, password_policy, firewall_policy, pt_report,
                audit_trail, stage, status, current_approver, escalation_handler, version,
                created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(app.id)
        .bind(&app.name)
        .bind(&app.artifact_ref)
        .bind(&app.submitted_by)
        .bind(app.internet_facing)
        .bind(app.checklist.secure_guidelines)
        .bind(app.checklist.peer_review)
        .bind(app.checklist.password_policy)
        .bind(app.checklist.firewall_policy)
        .bind(app.checklist.pt_report)
        .bind(app.checklist.audit_trail)
        .bind(app.stage.as_str())
        .bind(app.status.as_str())
        .bind(&app.current_approver)
        .bind(&app.escalation_handler)
        .bind(app.version)
        .bind(app.created_at)
        .bind(app.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Duplicate(app.id));
        }
        Ok(())
    }

    async fn fetch_application(&self, id: Uuid) -> Result<Option<Application>, StoreError> {
        let row = sqlx::query_as::<_, ApplicationRow>(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Application::try_from).transpose()
    }

    async fn list_applications(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<Application>, StoreError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications WHERE TRUE"
        ));
        if let Some(stage) = filter.stage {
            qb.push(" AND stage = ").push_bind(stage.as_str());
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(owner) = &filter.submitted_by {
            qb.push(" AND submitted_by = ").push_bind(owner.clone());
        }
        if let Some(text) = &filter.search_text {
            qb.push(" AND STRPOS(LOWER(name), LOWER(")
                .push_bind(text.clone())
                .push(")) > 0");
        }
        qb.push(" ORDER BY updated_at DESC, id");
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ").push_bind(limit);
        }
        qb.push(" OFFSET ").push_bind(filter.offset);

        let rows = qb
            .build_query_as::<ApplicationRow>()
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Application::try_from).collect()
    }

    async fn commit_transition(
        &self,
        expected: &Snapshot,
        next: &Application,
        entry: NewAuditEntry,
    ) -> Result<AuditEntry, StoreError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE applications
             SET stage = $1, status = $2, current_approver = $3, escalation_handler = $4,
                 version = $5, updated_at = $6
             WHERE id = $7 AND stage = $8 AND status = $9 AND version = $10",
        )
        .bind(next.stage.as_str())
        .bind(next.status.as_str())
        .bind(&next.current_approver)
        .bind(&next.escalation_handler)
        .bind(next.version)
        .bind(next.updated_at)
        .bind(expected.id)
        .bind(expected.stage.as_str())
        .bind(expected.status.as_str())
        .bind(expected.version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            // Dropping `tx` rolls back.
            return Err(StoreError::Stale(expected.id));
        }

        let recorded = insert_audit(&mut *tx, entry).await?;
        tx.commit().await?;
        Ok(recorded)
    }

    async fn append_audit(&self, entry: NewAuditEntry) -> Result<AuditEntry, StoreError> {
        let mut conn = self.pool.acquire().await?;
        insert_audit(&mut *conn, entry).await
    }

    async fn audit_for_application(&self, id: Uuid) -> Result<Vec<AuditEntry>, StoreError> {
        let rows = sqlx::query_as::<_, AuditRow>(&format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_entries a
             WHERE a.application_id = $1
             ORDER BY a.timestamp, a.sequence"
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        into_entries(rows)
    }

    async fn audit_entries(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, StoreError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_entries a
             JOIN applications p ON p.id = a.application_id
             WHERE TRUE"
        ));
        if let Some(actor) = &filter.actor {
            qb.push(" AND a.actor_identity = ").push_bind(actor.clone());
        }
        if let Some(action) = filter.action {
            qb.push(" AND a.action = ").push_bind(action.as_str());
        }
        if let Some(from) = filter.from {
            qb.push(" AND a.timestamp >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            qb.push(" AND a.timestamp <= ").push_bind(to);
        }
        if let Some(owner) = &filter.application_owner {
            qb.push(" AND p.submitted_by = ").push_bind(owner.clone());
        }
        qb.push(" ORDER BY a.timestamp, a.sequence");

        let rows = qb.build_query_as::<AuditRow>().fetch_all(&self.pool).await?;
        into_entries(rows)
    }
}

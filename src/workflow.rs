// SPDX-License-Identifier: EUPL-1.2

//! The approval workflow engine.
//!
//! Pipeline: `reviewer → hod → dtg → cdt → hosting → hosted`. Any review stage
//! may reject (terminal); the HOD may escalate, which routes the application
//! per [`EscalationPolicy`](crate::routing::EscalationPolicy). An admin may act
//! at any stage; such actions are audited as taken on behalf of that stage.
//!
//! Every transition is planned against a snapshot of the application and
//! committed with a compare-and-swap; a lost race fails with
//! [`WorkflowError::ConcurrentModification`] and leaves no audit entry behind.

use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Duration, SubsecRound, Utc};
use regex::Regex;
use uuid::Uuid;

use crate::{
    cache::ApplicationCache,
    error::WorkflowError,
    models::{
        Actor, Application, ApplicationFilter, AuditAction, Checklist, ChecklistStatus,
        NewAuditEntry, Role, Stage, Status, StatusSummary,
    },
    routing::Routing,
    store::WorkflowStore,
};

const DEFAULT_APPLICATION_NAME: &str = "New Application";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Approve,
    Reject,
    Escalate,
}

impl Transition {
    fn verb(self) -> &'static str {
        match self {
            Transition::Approve => "approve",
            Transition::Reject => "reject",
            Transition::Escalate => "escalate",
        }
    }
}

/// Validated submission input.
#[derive(Debug, Clone)]
pub struct Submission {
    pub artifact_ref: String,
    pub artifact_name: Option<String>,
    pub checklist: Checklist,
    pub internet_facing: Option<bool>,
}

/// Parse the portal's `"yes"` / `"no"` answer; blank means unanswered.
pub fn parse_internet_facing(answer: Option<&str>) -> Result<Option<bool>, WorkflowError> {
    match answer.map(|a| a.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") => Ok(None),
        Some("yes") | Some("true") => Ok(Some(true)),
        Some("no") | Some("false") => Ok(Some(false)),
        Some(other) => Err(WorkflowError::Validation(format!(
            "internet_facing must be 'yes' or 'no', got '{other}'"
        ))),
    }
}

/// `Employee Portal.war` → `Employee Portal`; blank → `New Application`.
pub fn application_name(artifact_name: &str) -> String {
    static WAR_FILE: OnceLock<Regex> = OnceLock::new();
    let re = WAR_FILE.get_or_init(|| {
        Regex::new(r"(?i)^(?:.*[/\\])?(?P<stem>[^/\\]*?)(?:\.war)?$").expect("static regex")
    });

    re.captures(artifact_name.trim())
        .and_then(|c| c.name("stem"))
        .map(|m| m.as_str().trim())
        .filter(|stem| !stem.is_empty())
        .unwrap_or(DEFAULT_APPLICATION_NAME)
        .to_string()
}

/// Strictly after `previous`, at the storage layer's microsecond precision.
fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now().trunc_subsecs(6);
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

fn normalize_remarks(remarks: Option<String>) -> Option<String> {
    remarks
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
}

/// Owns application state and enforces legal transitions.
#[derive(Clone)]
pub struct WorkflowEngine {
    store: Arc<dyn WorkflowStore>,
    routing: Arc<Routing>,
    cache: ApplicationCache,
}

impl WorkflowEngine {
    pub fn new(store: Arc<dyn WorkflowStore>, routing: Routing, cache: ApplicationCache) -> Self {
        Self {
            store,
            routing: Arc::new(routing),
            cache,
        }
    }

    // ── Submit ────────────────────────────────────────────────────────────────

    /// Create an application and hand it to the reviewer queue.
    ///
    /// Submission is not an audited action; it is logged only.
    pub async fn submit(
        &self,
        actor: &Actor,
        submission: Submission,
    ) -> Result<Application, WorkflowError> {
        if actor.role != Role::Developer {
            return Err(WorkflowError::InvalidTransition(format!(
                "only developers may submit applications, not {}",
                actor.role
            )));
        }

        let artifact_ref = submission.artifact_ref.trim();
        if artifact_ref.is_empty() {
            return Err(WorkflowError::Validation("Please upload a WAR file".into()));
        }
        let internet_facing = submission.internet_facing.ok_or_else(|| {
            WorkflowError::Validation(
                "Please select if the application is internet facing".into(),
            )
        })?;
        if submission.checklist.completed() == 0 {
            return Err(WorkflowError::Validation(
                "Please complete at least one checklist item".into(),
            ));
        }

        let name = application_name(
            submission
                .artifact_name
                .as_deref()
                .unwrap_or(artifact_ref),
        );
        let now = Utc::now().trunc_subsecs(6);
        let mut app = Application {
            id: Uuid::new_v4(),
            name,
            artifact_ref: artifact_ref.to_string(),
            submitted_by: actor.identity.clone(),
            internet_facing,
            checklist: submission.checklist,
            stage: Stage::Reviewer,
            status: Status::Pending,
            current_approver: None,
            escalation_handler: None,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        app.current_approver = self.routing.current_approver(&app);

        self.store.insert_application(&app).await?;

        tracing::info!(
            "Application {} '{}' submitted by {} ({} of {} checklist items)",
            app.id,
            app.name,
            app.submitted_by,
            app.checklist.completed(),
            Checklist::ITEMS
        );
        Ok(app)
    }

    // ── Transitions ───────────────────────────────────────────────────────────

    pub async fn approve(
        &self,
        actor: &Actor,
        id: Uuid,
        remarks: Option<String>,
        expected_version: Option<i64>,
    ) -> Result<Application, WorkflowError> {
        self.transition(actor, id, Transition::Approve, remarks, expected_version)
            .await
    }

    pub async fn reject(
        &self,
        actor: &Actor,
        id: Uuid,
        remarks: Option<String>,
        expected_version: Option<i64>,
    ) -> Result<Application, WorkflowError> {
        self.transition(actor, id, Transition::Reject, remarks, expected_version)
            .await
    }

    pub async fn escalate(
        &self,
        actor: &Actor,
        id: Uuid,
        remarks: Option<String>,
        expected_version: Option<i64>,
    ) -> Result<Application, WorkflowError> {
        self.transition(actor, id, Transition::Escalate, remarks, expected_version)
            .await
    }

    async fn transition(
        &self,
        actor: &Actor,
        id: Uuid,
        transition: Transition,
        remarks: Option<String>,
        expected_version: Option<i64>,
    ) -> Result<Application, WorkflowError> {
        let current = self
            .store
            .fetch_application(id)
            .await?
            .ok_or(WorkflowError::NotFound(id))?;

        let (next, entry) = self.plan(actor, &current, transition, remarks)?;

        // Only a transition that would otherwise succeed can lose to a stale precondition.
        if expected_version.is_some_and(|v| v != current.version) {
            return Err(WorkflowError::ConcurrentModification(id));
        }

        let recorded = self
            .store
            .commit_transition(&current.snapshot(), &next, entry)
            .await?;
        self.cache.put(&next).await;

        match (recorded.action, recorded.on_behalf_of) {
            (_, Some(stage)) => tracing::warn!(
                "Admin override: {} {} application {} at stage {}",
                actor.identity,
                recorded.action,
                id,
                stage
            ),
            (AuditAction::Rejected | AuditAction::Escalated, None) => tracing::warn!(
                "Application {} {} by {} ({})",
                id,
                recorded.action,
                actor.identity,
                actor.role
            ),
            _ => tracing::info!(
                "Application {} {} by {} ({}), now at {}/{}",
                id,
                recorded.action,
                actor.identity,
                actor.role,
                next.stage,
                next.status
            ),
        }
        Ok(next)
    }

    /// Decide whether `actor` may apply `transition` to `current`, and compute
    /// the resulting application and audit entry. Pure; nothing is committed.
    pub fn plan(
        &self,
        actor: &Actor,
        current: &Application,
        transition: Transition,
        remarks: Option<String>,
    ) -> Result<(Application, NewAuditEntry), WorkflowError> {
        if current.status.is_terminal() {
            return Err(WorkflowError::InvalidTransition(format!(
                "application {} is {} and accepts no further transitions",
                current.id, current.status
            )));
        }

        let on_behalf_of = self.authorize(actor, current, transition)?;

        let mut next = current.clone();
        let action = match transition {
            Transition::Approve => match current.stage.next() {
                Some(stage) => {
                    next.stage = stage;
                    next.status = Status::Pending;
                    next.escalation_handler = None;
                    AuditAction::Approved
                }
                None => {
                    next.status = Status::Hosted;
                    next.escalation_handler = None;
                    AuditAction::Hosted
                }
            },
            Transition::Reject => {
                next.status = Status::Rejected;
                next.escalation_handler = None;
                AuditAction::Rejected
            }
            Transition::Escalate => {
                let policy = &self.routing.escalation;
                next.stage = policy.target;
                next.status = Status::Escalated;
                next.escalation_handler = policy.handler.clone();
                AuditAction::Escalated
            }
        };

        next.version = current.version + 1;
        next.updated_at = next_timestamp(current.updated_at);
        next.current_approver = self.routing.current_approver(&next);

        let entry = NewAuditEntry {
            id: Uuid::new_v4(),
            application_id: current.id,
            application_name: current.name.clone(),
            action,
            actor: actor.clone(),
            on_behalf_of,
            timestamp: next.updated_at,
            remarks: normalize_remarks(remarks),
        };
        Ok((next, entry))
    }

    /// Role/stage check. Returns the stage an admin is acting on behalf of.
    fn authorize(
        &self,
        actor: &Actor,
        current: &Application,
        transition: Transition,
    ) -> Result<Option<Stage>, WorkflowError> {
        if transition == Transition::Escalate && current.stage != Stage::Hod {
            return Err(WorkflowError::InvalidTransition(format!(
                "only applications at the hod stage can be escalated; {} is at {}",
                current.id, current.stage
            )));
        }

        if actor.role == Role::Admin {
            return Ok(Some(current.stage));
        }

        let required = current.stage.required_role();
        if actor.role != required {
            return Err(WorkflowError::InvalidTransition(format!(
                "a {} cannot {} application {} at the {} stage (requires {})",
                actor.role,
                transition.verb(),
                current.id,
                current.stage,
                required
            )));
        }

        if let Some(handler) = &current.escalation_handler {
            if *handler != actor.identity {
                return Err(WorkflowError::InvalidTransition(format!(
                    "application {} is escalated to {handler}",
                    current.id
                )));
            }
        }

        Ok(None)
    }

    // ── Reads ─────────────────────────────────────────────────────────────────

    pub async fn get(&self, id: Uuid) -> Result<Application, WorkflowError> {
        if let Some(app) = self.cache.get(id).await {
            return Ok(app);
        }
        let app = self
            .store
            .fetch_application(id)
            .await?
            .ok_or(WorkflowError::NotFound(id))?;
        self.cache.put(&app).await;
        Ok(app)
    }

    /// Most recently updated first.
    pub async fn list(&self, filter: &ApplicationFilter) -> Result<Vec<Application>, WorkflowError> {
        Ok(self.store.list_applications(filter).await?)
    }

    /// Non-terminal applications waiting on `actor`'s role; everything open for admins.
    pub async fn queue(&self, actor: &Actor) -> Result<Vec<Application>, WorkflowError> {
        let stage = match (actor.role, actor.role.stage()) {
            (Role::Admin, _) => None,
            (_, Some(stage)) => Some(stage),
            (role, None) => {
                return Err(WorkflowError::Forbidden(format!(
                    "the {role} role has no review queue"
                )))
            }
        };

        let apps = self
            .store
            .list_applications(&ApplicationFilter {
                stage,
                ..Default::default()
            })
            .await?;

        Ok(apps
            .into_iter()
            .filter(|app| !app.status.is_terminal())
            .filter(|app| {
                actor.role == Role::Admin
                    || app
                        .escalation_handler
                        .as_deref()
                        .map_or(true, |handler| handler == actor.identity)
            })
            .collect())
    }

    /// Counts per stage, status and checklist completeness within `scope`.
    pub async fn summary(&self, scope: &ApplicationFilter) -> Result<StatusSummary, WorkflowError> {
        let apps = self
            .store
            .list_applications(&ApplicationFilter {
                limit: None,
                offset: 0,
                ..scope.clone()
            })
            .await?;

        let mut summary = StatusSummary {
            total: apps.len(),
            ..Default::default()
        };
        for app in &apps {
            *summary.by_stage.entry(app.stage).or_default() += 1;
            *summary.by_status.entry(app.status.as_str()).or_default() += 1;
            let checklist = match app.checklist.status() {
                ChecklistStatus::Complete => "complete",
                ChecklistStatus::Partial => "partial",
                ChecklistStatus::Incomplete => "incomplete",
            };
            *summary.by_checklist.entry(checklist).or_default() += 1;
        }
        Ok(summary)
    }
}

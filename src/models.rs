// SPDX-License-Identifier: EUPL-1.2

//! Domain models for the Hosting Portal.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Roles & stages ────────────────────────────────────────────────────────────

/// The single role an authenticated identity holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Developer,
    Reviewer,
    Hod,
    Dtg,
    Cdt,
    Hosting,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Developer => "developer",
            Role::Reviewer => "reviewer",
            Role::Hod => "hod",
            Role::Dtg => "dtg",
            Role::Cdt => "cdt",
            Role::Hosting => "hosting",
            Role::Admin => "admin",
        }
    }

    /// Label used in audit trails, e.g. `HOD - Dr. Sarah Johnson`.
    pub fn label(self) -> &'static str {
        match self {
            Role::Developer => "Developer",
            Role::Reviewer => "Reviewer",
            Role::Hod => "HOD",
            Role::Dtg => "DTG",
            Role::Cdt => "CDT",
            Role::Hosting => "Hosting",
            Role::Admin => "Admin",
        }
    }

    /// The pipeline stage this role acts at, if any.
    pub fn stage(self) -> Option<Stage> {
        match self {
            Role::Reviewer => Some(Stage::Reviewer),
            Role::Hod => Some(Stage::Hod),
            Role::Dtg => Some(Stage::Dtg),
            Role::Cdt => Some(Stage::Cdt),
            Role::Hosting => Some(Stage::Hosting),
            Role::Developer | Role::Admin => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "developer" => Ok(Role::Developer),
            "reviewer" => Ok(Role::Reviewer),
            "hod" => Ok(Role::Hod),
            "dtg" => Ok(Role::Dtg),
            "cdt" => Ok(Role::Cdt),
            "hosting" => Ok(Role::Hosting),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Position in the approval pipeline, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Reviewer,
    Hod,
    Dtg,
    Cdt,
    Hosting,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Reviewer,
        Stage::Hod,
        Stage::Dtg,
        Stage::Cdt,
        Stage::Hosting,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Reviewer => "reviewer",
            Stage::Hod => "hod",
            Stage::Dtg => "dtg",
            Stage::Cdt => "cdt",
            Stage::Hosting => "hosting",
        }
    }

    /// The role that must act at this stage.
    pub fn required_role(self) -> Role {
        match self {
            Stage::Reviewer => Role::Reviewer,
            Stage::Hod => Role::Hod,
            Stage::Dtg => Role::Dtg,
            Stage::Cdt => Role::Cdt,
            Stage::Hosting => Role::Hosting,
        }
    }

    /// The stage after this one; `None` at `hosting`.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Reviewer => Some(Stage::Hod),
            Stage::Hod => Some(Stage::Dtg),
            Stage::Dtg => Some(Stage::Cdt),
            Stage::Cdt => Some(Stage::Hosting),
            Stage::Hosting => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown stage '{s}'"))
    }
}

/// Disposition of an application at its current stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Escalated,
    Rejected,
    Hosted,
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::Pending,
        Status::Escalated,
        Status::Rejected,
        Status::Hosted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Escalated => "escalated",
            Status::Rejected => "rejected",
            Status::Hosted => "hosted",
        }
    }

    /// Terminal applications accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Rejected | Status::Hosted)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown status '{s}'"))
    }
}

/// `(stage, status)` collapsed into the state reported to dashboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    UnderReviewerReview,
    UnderHodReview,
    UnderDtgReview,
    UnderCdtReview,
    UnderHostingReview,
    Escalated,
    Rejected,
    Hosted,
}

impl WorkflowState {
    pub fn of(stage: Stage, status: Status) -> Self {
        match (status, stage) {
            (Status::Rejected, _) => WorkflowState::Rejected,
            (Status::Hosted, _) => WorkflowState::Hosted,
            (Status::Escalated, _) => WorkflowState::Escalated,
            (Status::Pending, Stage::Reviewer) => WorkflowState::UnderReviewerReview,
            (Status::Pending, Stage::Hod) => WorkflowState::UnderHodReview,
            (Status::Pending, Stage::Dtg) => WorkflowState::UnderDtgReview,
            (Status::Pending, Stage::Cdt) => WorkflowState::UnderCdtReview,
            (Status::Pending, Stage::Hosting) => WorkflowState::UnderHostingReview,
        }
    }
}

// ── Checklist ─────────────────────────────────────────────────────────────────

/// Security checklist completed by the developer at submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Checklist {
    pub secure_guidelines: bool,
    pub peer_review: bool,
    pub password_policy: bool,
    pub firewall_policy: bool,
    pub pt_report: bool,
    pub audit_trail: bool,
}

impl Checklist {
    pub const ITEMS: usize = 6;

    pub fn completed(&self) -> usize {
        [
            self.secure_guidelines,
            self.peer_review,
            self.password_policy,
            self.firewall_policy,
            self.pt_report,
            self.audit_trail,
        ]
        .into_iter()
        .filter(|done| *done)
        .count()
    }

    pub fn status(&self) -> ChecklistStatus {
        match self.completed() {
            0 => ChecklistStatus::Incomplete,
            Self::ITEMS => ChecklistStatus::Complete,
            _ => ChecklistStatus::Partial,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecklistStatus {
    Complete,
    Partial,
    Incomplete,
}

// ── Actor ─────────────────────────────────────────────────────────────────────

/// An authenticated caller, as asserted by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub identity: String,
    pub role: Role,
}

impl Actor {
    pub fn new(identity: impl Into<String>, role: Role) -> Self {
        Self {
            identity: identity.into(),
            role,
        }
    }
}

// ── Application ───────────────────────────────────────────────────────────────

/// One submitted hosting request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: Uuid,
    pub name: String,
    /// Opaque blob-store reference to the uploaded WAR file.
    pub artifact_ref: String,
    pub submitted_by: String,
    pub internet_facing: bool,
    pub checklist: Checklist,
    pub stage: Stage,
    pub status: Status,
    /// `None` once the application is terminal.
    pub current_approver: Option<String>,
    /// Designated escalation handler; only they (or an admin) may act while set.
    pub escalation_handler: Option<String>,
    /// Incremented on every committed transition.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            id: self.id,
            stage: self.stage,
            status: self.status,
            version: self.version,
        }
    }

    pub fn state(&self) -> WorkflowState {
        WorkflowState::of(self.stage, self.status)
    }
}

/// The precondition a transition was planned against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub id: Uuid,
    pub stage: Stage,
    pub status: Status,
    pub version: i64,
}

/// Response body for every application-returning endpoint.
#[derive(Debug, Serialize)]
pub struct ApplicationView {
    pub id: Uuid,
    pub name: String,
    pub artifact_ref: String,
    pub submitted_by: String,
    pub internet_facing: bool,
    pub checklist: Checklist,
    pub checklist_status: ChecklistStatus,
    pub checklist_completed: usize,
    pub stage: Stage,
    pub status: Status,
    pub state: WorkflowState,
    pub current_approver: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalation_handler: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Application> for ApplicationView {
    fn from(a: Application) -> Self {
        Self {
            checklist_status: a.checklist.status(),
            checklist_completed: a.checklist.completed(),
            state: a.state(),
            id: a.id,
            name: a.name,
            artifact_ref: a.artifact_ref,
            submitted_by: a.submitted_by,
            internet_facing: a.internet_facing,
            checklist: a.checklist,
            stage: a.stage,
            status: a.status,
            current_approver: a.current_approver,
            escalation_handler: a.escalation_handler,
            version: a.version,
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}

// ── Audit ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Approved,
    Rejected,
    Escalated,
    Hosted,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::Approved => "approved",
            AuditAction::Rejected => "rejected",
            AuditAction::Escalated => "escalated",
            AuditAction::Hosted => "hosted",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approved" => Ok(AuditAction::Approved),
            "rejected" => Ok(AuditAction::Rejected),
            "escalated" => Ok(AuditAction::Escalated),
            "hosted" => Ok(AuditAction::Hosted),
            other => Err(format!("unknown audit action '{other}'")),
        }
    }
}

/// An audit record before the ledger has sequenced it.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub id: Uuid,
    pub application_id: Uuid,
    pub application_name: String,
    pub action: AuditAction,
    pub actor: Actor,
    /// Set when an admin acted in place of the stage's role.
    pub on_behalf_of: Option<Stage>,
    pub timestamp: DateTime<Utc>,
    pub remarks: Option<String>,
}

/// One immutable, sequenced ledger record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub id: Uuid,
    /// Ledger insertion order; breaks timestamp ties.
    pub sequence: i64,
    pub application_id: Uuid,
    pub application_name: String,
    pub action: AuditAction,
    pub actor: Actor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_behalf_of: Option<Stage>,
    pub timestamp: DateTime<Utc>,
    pub remarks: Option<String>,
}

impl AuditEntry {
    pub fn sequenced(entry: NewAuditEntry, sequence: i64) -> Self {
        Self {
            id: entry.id,
            sequence,
            application_id: entry.application_id,
            application_name: entry.application_name,
            action: entry.action,
            actor: entry.actor,
            on_behalf_of: entry.on_behalf_of,
            timestamp: entry.timestamp,
            remarks: entry.remarks,
        }
    }

    /// `Reviewer - jane`, or `Admin - root on behalf of HOD` for overrides.
    pub fn performed_by(&self) -> String {
        match self.on_behalf_of {
            Some(stage) => format!(
                "{} - {} on behalf of {}",
                self.actor.role.label(),
                self.actor.identity,
                stage.required_role().label()
            ),
            None => format!("{} - {}", self.actor.role.label(), self.actor.identity),
        }
    }
}

/// Response body for audit endpoints.
#[derive(Debug, Serialize)]
pub struct AuditEntryView {
    #[serde(flatten)]
    pub entry: AuditEntry,
    pub performed_by: String,
}

impl From<AuditEntry> for AuditEntryView {
    fn from(entry: AuditEntry) -> Self {
        Self {
            performed_by: entry.performed_by(),
            entry,
        }
    }
}

// ── Filters ───────────────────────────────────────────────────────────────────

/// Conjunctive application filter. `submitted_by` carries the caller's read scope.
#[derive(Debug, Clone, Default)]
pub struct ApplicationFilter {
    pub stage: Option<Stage>,
    pub status: Option<Status>,
    pub search_text: Option<String>,
    pub submitted_by: Option<String>,
    pub limit: Option<i64>,
    pub offset: i64,
}

impl ApplicationFilter {
    pub fn matches(&self, app: &Application) -> bool {
        self.stage.map_or(true, |stage| app.stage == stage)
            && self.status.map_or(true, |status| app.status == status)
            && self
                .submitted_by
                .as_deref()
                .map_or(true, |owner| app.submitted_by == owner)
            && self.search_text.as_deref().map_or(true, |text| {
                app.name.to_lowercase().contains(&text.to_lowercase())
            })
    }
}

/// Conjunctive ledger filter; `from`/`to` are inclusive.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub actor: Option<String>,
    pub action: Option<AuditAction>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Restricts to entries on applications submitted by this identity.
    pub application_owner: Option<String>,
}

impl AuditFilter {
    /// Matches everything except `application_owner`, which needs the application record.
    pub fn matches_entry(&self, entry: &AuditEntry) -> bool {
        self.actor
            .as_deref()
            .map_or(true, |actor| entry.actor.identity == actor)
            && self.action.map_or(true, |action| entry.action == action)
            && self.from.map_or(true, |from| entry.timestamp >= from)
            && self.to.map_or(true, |to| entry.timestamp <= to)
    }
}

// ── Requests ──────────────────────────────────────────────────────────────────

/// Request body for `POST /applications`.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    /// Opaque blob-store reference returned by the upload service.
    pub artifact_ref: String,
    /// Original file name, e.g. `Employee Portal.war`; defaults to the last segment of `artifact_ref`.
    pub artifact_name: Option<String>,
    #[serde(default)]
    pub checklist: Checklist,
    /// `"yes"` or `"no"`.
    pub internet_facing: Option<String>,
}

/// Optional body for approve/reject/escalate.
#[derive(Debug, Default, Deserialize)]
pub struct TransitionRequest {
    pub remarks: Option<String>,
    /// Fail with a conflict unless the application is still at this version.
    pub expected_version: Option<i64>,
}

/// Query string for `GET /applications`.
#[derive(Debug, Default, Deserialize)]
pub struct ApplicationQuery {
    pub stage: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Query string for `GET /audit`.
#[derive(Debug, Default, Deserialize)]
pub struct AuditQuery {
    pub actor: Option<String>,
    pub action: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Response for `GET /applications/summary`.
#[derive(Debug, Default, Serialize)]
pub struct StatusSummary {
    pub total: usize,
    pub by_stage: std::collections::BTreeMap<Stage, usize>,
    pub by_status: std::collections::BTreeMap<&'static str, usize>,
    pub by_checklist: std::collections::BTreeMap<&'static str, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_order_ends_at_hosting() {
        let mut stage = Stage::Reviewer;
        let mut visited = vec![stage];
        while let Some(next) = stage.next() {
            visited.push(next);
            stage = next;
        }
        assert_eq!(visited, Stage::ALL.to_vec());
    }

    #[test]
    fn every_stage_requires_its_own_role() {
        for stage in Stage::ALL {
            assert_eq!(stage.required_role().stage(), Some(stage));
        }
        assert_eq!(Role::Admin.stage(), None);
        assert_eq!(Role::Developer.stage(), None);
    }

    #[test]
    fn checklist_status_thresholds() {
        let mut checklist = Checklist::default();
        assert_eq!(checklist.status(), ChecklistStatus::Incomplete);

        checklist.secure_guidelines = true;
        assert_eq!(checklist.status(), ChecklistStatus::Partial);

        checklist = Checklist {
            secure_guidelines: true,
            peer_review: true,
            password_policy: true,
            firewall_policy: true,
            pt_report: true,
            audit_trail: true,
        };
        assert_eq!(checklist.completed(), 6);
        assert_eq!(checklist.status(), ChecklistStatus::Complete);
    }

    #[test]
    fn enums_parse_case_insensitively() {
        assert_eq!("HOD".parse::<Role>().unwrap(), Role::Hod);
        assert_eq!("Dtg".parse::<Stage>().unwrap(), Stage::Dtg);
        assert_eq!("hosted".parse::<Status>().unwrap(), Status::Hosted);
        assert!("approved".parse::<Status>().is_err());
        assert!("developer".parse::<Stage>().is_err());
    }

    #[test]
    fn effective_state_collapses_stage_and_status() {
        assert_eq!(
            WorkflowState::of(Stage::Hod, Status::Pending),
            WorkflowState::UnderHodReview
        );
        assert_eq!(
            WorkflowState::of(Stage::Dtg, Status::Escalated),
            WorkflowState::Escalated
        );
        assert_eq!(
            WorkflowState::of(Stage::Hosting, Status::Hosted),
            WorkflowState::Hosted
        );
    }

    #[test]
    fn performed_by_mentions_override_stage() {
        let entry = AuditEntry {
            id: Uuid::new_v4(),
            sequence: 1,
            application_id: Uuid::new_v4(),
            application_name: "Employee Portal".into(),
            action: AuditAction::Approved,
            actor: Actor::new("root", Role::Admin),
            on_behalf_of: Some(Stage::Hod),
            timestamp: Utc::now(),
            remarks: None,
        };
        assert_eq!(entry.performed_by(), "Admin - root on behalf of HOD");

        let entry = AuditEntry {
            actor: Actor::new("jane", Role::Reviewer),
            on_behalf_of: None,
            ..entry
        };
        assert_eq!(entry.performed_by(), "Reviewer - jane");
    }

    #[test]
    fn filter_is_a_conjunction() {
        let app = Application {
            id: Uuid::new_v4(),
            name: "Employee Portal v2.1".into(),
            artifact_ref: "blob://a".into(),
            submitted_by: "dev".into(),
            internet_facing: true,
            checklist: Checklist::default(),
            stage: Stage::Hod,
            status: Status::Pending,
            current_approver: None,
            escalation_handler: None,
            version: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let filter = ApplicationFilter {
            stage: Some(Stage::Hod),
            search_text: Some("portal".into()),
            ..Default::default()
        };
        assert!(filter.matches(&app));

        let filter = ApplicationFilter {
            stage: Some(Stage::Hod),
            status: Some(Status::Rejected),
            ..Default::default()
        };
        assert!(!filter.matches(&app));
    }
}

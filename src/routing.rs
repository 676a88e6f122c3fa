// SPDX-License-Identifier: EUPL-1.2

//! Who acts next: per-stage approver queues and the escalation policy.

use std::collections::HashMap;

use crate::models::{Application, Stage};

/// Where an application escalated by the HOD goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscalationPolicy {
    /// Stage the escalated application is routed to; never `hod`.
    pub target: Stage,
    /// When set, only this identity (or an admin) may act on the escalated application.
    pub handler: Option<String>,
}

impl EscalationPolicy {
    pub fn new(target: Stage, handler: Option<String>) -> Result<Self, String> {
        if target == Stage::Hod {
            return Err("escalation cannot route back to the hod stage".into());
        }
        Ok(Self { target, handler })
    }
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            target: Stage::Dtg,
            handler: None,
        }
    }
}

/// Approver queues per stage, plus the escalation policy.
#[derive(Debug, Clone, Default)]
pub struct Routing {
    approvers: HashMap<Stage, String>,
    pub escalation: EscalationPolicy,
}

impl Routing {
    pub fn new(approvers: HashMap<Stage, String>, escalation: EscalationPolicy) -> Self {
        Self {
            approvers,
            escalation,
        }
    }

    /// Configured approver for `stage`, else `<stage>-pool`.
    pub fn approver_for(&self, stage: Stage) -> String {
        self.approvers
            .get(&stage)
            .cloned()
            .unwrap_or_else(|| format!("{stage}-pool"))
    }

    /// `currentApprover` as derived from stage, status and any escalation handler.
    pub fn current_approver(&self, app: &Application) -> Option<String> {
        if app.status.is_terminal() {
            return None;
        }
        app.escalation_handler
            .clone()
            .or_else(|| Some(self.approver_for(app.stage)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hod_is_not_an_escalation_target() {
        assert!(EscalationPolicy::new(Stage::Hod, None).is_err());
        assert!(EscalationPolicy::new(Stage::Reviewer, None).is_ok());
        assert_eq!(EscalationPolicy::default().target, Stage::Dtg);
    }

    #[test]
    fn unconfigured_stages_fall_back_to_pool() {
        let routing = Routing::new(
            HashMap::from([(Stage::Hod, "Dr. Sarah Johnson".to_string())]),
            EscalationPolicy::default(),
        );
        assert_eq!(routing.approver_for(Stage::Hod), "Dr. Sarah Johnson");
        assert_eq!(routing.approver_for(Stage::Cdt), "cdt-pool");
    }
}

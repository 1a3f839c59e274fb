//! Lifecycle mutations, shared by persisted and auto decisions.
//!
//! A [`Mutation`] knows which lifecycle action it is, how to validate its
//! arguments, how to change a decision, and what goes in the audit entry.
//! Where the result is written differs by origin and lives elsewhere.

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};

use towerline_core::{
    check_transition, AuditAction, DecisionContract, DecisionStatus, Domain, LifecycleAction,
    TransitionMode,
};

use crate::error::EngineError;

/// Longest snooze accepted, one year.
pub const MAX_SNOOZE_HOURS: i64 = 24 * 366;

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Decide {
        action_type: String,
        comment: Option<String>,
    },
    Dismiss {
        reason: String,
        comment: Option<String>,
    },
    Snooze {
        hours: i64,
    },
    Escalate {
        reason: Option<String>,
    },
    Reassign {
        target: Domain,
        reason: Option<String>,
    },
    AssignOwner {
        user_id: String,
    },
}

impl Mutation {
    pub fn action(&self) -> LifecycleAction {
        match self {
            Mutation::Decide { .. } => LifecycleAction::Decide,
            Mutation::Dismiss { .. } => LifecycleAction::Dismiss,
            Mutation::Snooze { .. } => LifecycleAction::Snooze,
            Mutation::Escalate { .. } => LifecycleAction::Escalate,
            Mutation::Reassign { .. } => LifecycleAction::Reassign,
            Mutation::AssignOwner { .. } => LifecycleAction::AssignOwner,
        }
    }

    /// Argument checks that do not depend on the decision.
    pub fn validate(&self) -> Result<(), EngineError> {
        match self {
            Mutation::Decide { action_type, .. } if action_type.trim().is_empty() => Err(
                EngineError::InvalidRequest("decide requires an action type".into()),
            ),
            Mutation::Snooze { hours } if *hours <= 0 => Err(EngineError::InvalidRequest(
                format!("snooze hours must be positive, got {hours}"),
            )),
            Mutation::Snooze { hours } if *hours > MAX_SNOOZE_HOURS => {
                Err(EngineError::InvalidRequest(format!(
                    "snooze hours must be at most {MAX_SNOOZE_HOURS}, got {hours}"
                )))
            }
            Mutation::Reassign { target, .. } if !Domain::OPERATIONAL.contains(target) => Err(
                EngineError::InvalidRequest(format!("cannot reassign to {target}")),
            ),
            Mutation::AssignOwner { user_id } if user_id.trim().is_empty() => Err(
                EngineError::InvalidRequest("assign_owner requires a user id".into()),
            ),
            _ => Ok(()),
        }
    }

    /// Apply to `decision` in place. Returns the status it left.
    pub fn apply(
        &self,
        decision: &mut DecisionContract,
        ctx: &ApplyContext<'_>,
    ) -> Result<DecisionStatus, EngineError> {
        self.validate()?;
        if let Mutation::Reassign { target, .. } = self {
            if *target == decision.domain {
                return Err(EngineError::InvalidReassign {
                    from: decision.domain,
                    to: *target,
                });
            }
        }

        let wake_at = match self {
            Mutation::Snooze { hours } => Some(snooze_until(ctx.now, *hours)?),
            _ => None,
        };

        let from = decision.status;
        let to = check_transition(from, self.action(), ctx.mode)?;
        if from.is_terminal() {
            tracing::warn!(
                decision_id = %decision.id,
                from = %from,
                action = %self.action(),
                "mutating a decision that is already terminal"
            );
        }

        decision.status = to;
        decision.updated_at = ctx.now;
        match self {
            Mutation::Decide { action_type, .. } => {
                decision.decision_outcome = Some(action_type.clone());
                decision.decided_by = ctx.actor.map(str::to_string);
                decision.decided_at = Some(ctx.now);
                decision.snoozed_until = None;
            }
            Mutation::Dismiss { .. } => {
                decision.decision_outcome = Some(DecisionStatus::Dismissed.as_str().to_string());
                decision.decided_by = ctx.actor.map(str::to_string);
                decision.decided_at = Some(ctx.now);
                decision.snoozed_until = None;
            }
            Mutation::Snooze { .. } => {
                decision.snoozed_until = wake_at;
            }
            Mutation::Escalate { .. } => {
                decision.escalated_to = Some(ctx.escalated_to.to_string());
                decision.snoozed_until = None;
            }
            Mutation::Reassign { target, .. } => {
                decision.domain = *target;
                decision.owner_role = target.default_owner_role().to_string();
                decision.owner_user_id = None;
                decision.escalated_to = None;
                decision.snoozed_until = None;
            }
            Mutation::AssignOwner { user_id } => {
                decision.owner_user_id = Some(user_id.clone());
            }
        }
        Ok(from)
    }

    /// The human-supplied part of the audit entry for this mutation.
    pub fn audit_action(&self, decision: &DecisionContract, actor: Option<&str>) -> AuditAction {
        let mut audit = AuditAction {
            action_type: self.action().as_str().to_string(),
            actor: actor.map(str::to_string),
            ..Default::default()
        };
        match self {
            Mutation::Decide {
                action_type,
                comment,
            } => {
                audit.action_type = action_type.clone();
                audit.action_label = decision.action_by_type(action_type).map(|a| a.label.clone());
                audit.comment = comment.clone();
            }
            Mutation::Dismiss { reason, comment } => {
                audit.dismiss_reason = Some(reason.clone());
                audit.comment = comment.clone();
            }
            Mutation::Snooze { hours } => {
                audit.action_label = Some(format!("Snoozed {hours}h"));
            }
            Mutation::Escalate { reason } => {
                audit.comment = reason.clone();
            }
            Mutation::Reassign { target, reason } => {
                audit.action_label = Some(format!("Reassigned to {target}"));
                audit.comment = reason.clone();
            }
            Mutation::AssignOwner { user_id } => {
                audit.action_label = Some(format!("Assigned to {user_id}"));
            }
        }
        audit
    }
}

fn snooze_until(now: OffsetDateTime, hours: i64) -> Result<OffsetDateTime, EngineError> {
    hours
        .checked_mul(3600)
        .and_then(|secs| now.checked_add(Duration::seconds(secs)))
        .ok_or_else(|| EngineError::InvalidRequest(format!("snooze of {hours}h is out of range")))
}

/// The mutation API surface. Implementors supply `apply`; the named
/// operations are shorthands for building the matching [`Mutation`].
///
/// Every successful call performs one write and appends one audit entry.
#[async_trait]
pub trait DecisionLifecycle: Send + Sync {
    async fn apply(
        &self,
        tenant_id: &str,
        id: &str,
        mutation: Mutation,
        actor: Option<&str>,
    ) -> Result<DecisionContract, EngineError>;

    async fn decide(
        &self,
        tenant_id: &str,
        id: &str,
        action_type: &str,
        comment: Option<&str>,
        actor: Option<&str>,
    ) -> Result<DecisionContract, EngineError> {
        let mutation = Mutation::Decide {
            action_type: action_type.to_string(),
            comment: comment.map(str::to_string),
        };
        self.apply(tenant_id, id, mutation, actor).await
    }

    async fn dismiss(
        &self,
        tenant_id: &str,
        id: &str,
        reason: &str,
        comment: Option<&str>,
        actor: Option<&str>,
    ) -> Result<DecisionContract, EngineError> {
        let mutation = Mutation::Dismiss {
            reason: reason.to_string(),
            comment: comment.map(str::to_string),
        };
        self.apply(tenant_id, id, mutation, actor).await
    }

    async fn snooze(
        &self,
        tenant_id: &str,
        id: &str,
        hours: i64,
        actor: Option<&str>,
    ) -> Result<DecisionContract, EngineError> {
        self.apply(tenant_id, id, Mutation::Snooze { hours }, actor)
            .await
    }

    async fn escalate(
        &self,
        tenant_id: &str,
        id: &str,
        reason: Option<&str>,
        actor: Option<&str>,
    ) -> Result<DecisionContract, EngineError> {
        let mutation = Mutation::Escalate {
            reason: reason.map(str::to_string),
        };
        self.apply(tenant_id, id, mutation, actor).await
    }

    async fn reassign(
        &self,
        tenant_id: &str,
        id: &str,
        target: Domain,
        reason: Option<&str>,
        actor: Option<&str>,
    ) -> Result<DecisionContract, EngineError> {
        let mutation = Mutation::Reassign {
            target,
            reason: reason.map(str::to_string),
        };
        self.apply(tenant_id, id, mutation, actor).await
    }

    async fn assign_owner(
        &self,
        tenant_id: &str,
        id: &str,
        user_id: &str,
        actor: Option<&str>,
    ) -> Result<DecisionContract, EngineError> {
        let mutation = Mutation::AssignOwner {
            user_id: user_id.to_string(),
        };
        self.apply(tenant_id, id, mutation, actor).await
    }
}

/// Ambient inputs to [`Mutation::apply`].
#[derive(Debug, Clone, Copy)]
pub struct ApplyContext<'a> {
    pub actor: Option<&'a str>,
    pub now: OffsetDateTime,
    pub mode: TransitionMode,
    pub escalated_to: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use time::macros::datetime;
    use towerline_core::builder::{create_decision, create_evidence, DecisionParams};
    use towerline_core::Grain;

    const NOW: OffsetDateTime = datetime!(2025-03-01 09:00 UTC);

    fn decision() -> DecisionContract {
        create_decision(
            DecisionParams {
                id: Some("d1".into()),
                tenant_id: "t1".into(),
                domain: Domain::Fdp,
                decision_type: "SKU_STOP".into(),
                entity_type: Grain::Sku,
                entity_id: "SKU-1".into(),
                entity_name: String::new(),
                metric_code: "sku_margin_percent".into(),
                metric_version: None,
                period: "2025-02".into(),
                title: "Stop SKU-1".into(),
                problem_statement: String::new(),
                severity: towerline_core::Severity::High,
                owner_role: None,
                impact_amount: Decimal::from(-100),
                deadline_at: NOW,
                facts: vec![],
                actions: vec![],
                evidence: create_evidence(Default::default(), NOW).unwrap(),
            },
            NOW,
        )
        .unwrap()
    }

    fn ctx(mode: TransitionMode) -> ApplyContext<'static> {
        ApplyContext {
            actor: Some("alice"),
            now: NOW + Duration::hours(1),
            mode,
            escalated_to: "CONTROL_TOWER",
        }
    }

    #[test]
    fn decide_records_outcome() {
        let mut d = decision();
        let m = Mutation::Decide {
            action_type: "STOP".into(),
            comment: None,
        };
        let from = m.apply(&mut d, &ctx(TransitionMode::Permissive)).unwrap();
        assert_eq!(from, DecisionStatus::Open);
        assert_eq!(d.status, DecisionStatus::Decided);
        assert_eq!(d.decision_outcome.as_deref(), Some("STOP"));
        assert_eq!(d.decided_by.as_deref(), Some("alice"));
        assert_eq!(d.updated_at, NOW + Duration::hours(1));
    }

    #[test]
    fn snooze_must_be_positive() {
        let mut d = decision();
        let err = Mutation::Snooze { hours: 0 }
            .apply(&mut d, &ctx(TransitionMode::Permissive))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidRequest(_)));
        assert_eq!(d.status, DecisionStatus::Open);
    }

    #[test]
    fn snooze_rejects_huge_durations() {
        let mut d = decision();
        for hours in [MAX_SNOOZE_HOURS + 1, 10_000_000_000, i64::MAX] {
            let err = Mutation::Snooze { hours }
                .apply(&mut d, &ctx(TransitionMode::Permissive))
                .unwrap_err();
            assert!(matches!(err, EngineError::InvalidRequest(_)));
        }
        assert_eq!(d.status, DecisionStatus::Open);
        assert_eq!(d.snoozed_until, None);

        Mutation::Snooze {
            hours: MAX_SNOOZE_HOURS,
        }
        .apply(&mut d, &ctx(TransitionMode::Permissive))
        .unwrap();
        assert_eq!(d.status, DecisionStatus::Snoozed);
    }

    #[test]
    fn snooze_past_the_calendar_end_is_rejected() {
        assert!(matches!(
            snooze_until(datetime!(9999-12-01 00:00 UTC), MAX_SNOOZE_HOURS),
            Err(EngineError::InvalidRequest(_))
        ));
    }

    #[test]
    fn snooze_sets_wakeup() {
        let mut d = decision();
        Mutation::Snooze { hours: 6 }
            .apply(&mut d, &ctx(TransitionMode::Permissive))
            .unwrap();
        assert_eq!(d.snoozed_until, Some(NOW + Duration::hours(7)));
    }

    #[test]
    fn reassign_moves_domain() {
        let mut d = decision();
        Mutation::Reassign {
            target: Domain::Mdp,
            reason: None,
        }
        .apply(&mut d, &ctx(TransitionMode::Permissive))
        .unwrap();
        assert_eq!(d.domain, Domain::Mdp);
        assert_eq!(d.owner_role, "CMO");
        assert_eq!(d.card_type(), "MDP_SKU_STOP");

        let err = Mutation::Reassign {
            target: Domain::Mdp,
            reason: None,
        }
        .apply(&mut d, &ctx(TransitionMode::Permissive))
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidReassign { .. }));

        let err = Mutation::Reassign {
            target: Domain::ControlTower,
            reason: None,
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidRequest(_)));
    }

    #[test]
    fn strict_mode_refuses_reopening() {
        let mut d = decision();
        d.status = DecisionStatus::Dismissed;
        let err = Mutation::Snooze { hours: 1 }
            .apply(&mut d, &ctx(TransitionMode::Strict))
            .unwrap_err();
        assert!(matches!(err, EngineError::Transition(_)));
        assert_eq!(d.status, DecisionStatus::Dismissed);
    }

    #[test]
    fn audit_action_carries_reason() {
        let d = decision();
        let a = Mutation::Dismiss {
            reason: "seasonal".into(),
            comment: Some("ok".into()),
        }
        .audit_action(&d, Some("bob"));
        assert_eq!(a.action_type, "DISMISS");
        assert_eq!(a.dismiss_reason.as_deref(), Some("seasonal"));
        assert_eq!(a.actor.as_deref(), Some("bob"));
    }
}

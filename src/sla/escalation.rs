//! Escalation scanning: decides when an open ticket must move up a
//! responsibility tier and emits exactly one event per threshold crossing.
//!
//! Eligibility is a function of wall-clock age, not effective time: a paused
//! ticket still ages toward escalation. The compliance evaluator accounts for
//! pauses; this scanner intentionally does not, matching the established
//! escalation policy.

use crate::shared::models::schema::{support_tickets, ticket_escalations};
use crate::shared::models::{TicketPriority, TicketStatus};
use crate::shared::state::AppState;
use crate::sla::error::SlaError;
use crate::config::EscalationConfig;
use crate::notifications::{spawn_delivery, EscalationEvent};
use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Bool};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use uuid::Uuid;

/// Advisory lock key for the scanner; only one instance scans at a time.
const SCAN_LOCK_KEY: i64 = 0x5e5c_a1a7;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = ticket_escalations)]
pub struct TicketEscalation {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub level: i32,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationState {
    NotEligible,
    Eligible,
    Ready,
    /// Already at the maximum tier; escalating further is a no-op.
    Escalated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscalationCandidate {
    pub ticket_id: Uuid,
    pub current_assignee: Option<Uuid>,
    pub escalation_ready_at: DateTime<Utc>,
    pub next_level: i32,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct EscalationDecision {
    pub state: EscalationState,
    /// Present exactly when `state == Ready`.
    pub candidate: Option<EscalationCandidate>,
}

/// Pure escalation decision for one ticket as of `now`.
///
/// Tier `n` becomes ready at `created_at + n * threshold`, so a ticket that
/// keeps exceeding its threshold climbs one tier per crossing until
/// `max_level`.
pub fn evaluate_ticket(
    ticket_id: Uuid,
    assignee_id: Option<Uuid>,
    status: TicketStatus,
    priority: TicketPriority,
    created_at: DateTime<Utc>,
    current_level: i32,
    config: &EscalationConfig,
    now: DateTime<Utc>,
) -> EscalationDecision {
    if status.is_terminal() {
        return EscalationDecision {
            state: EscalationState::NotEligible,
            candidate: None,
        };
    }
    let Some(threshold_hours) = config.threshold_hours(priority) else {
        return EscalationDecision {
            state: EscalationState::NotEligible,
            candidate: None,
        };
    };
    if current_level >= config.max_level {
        return EscalationDecision {
            state: EscalationState::Escalated,
            candidate: None,
        };
    }

    let next_level = current_level + 1;
    let ready_hours = threshold_hours * i64::from(next_level);
    let escalation_ready_at = created_at + Duration::hours(ready_hours);
    if now < escalation_ready_at {
        return EscalationDecision {
            state: EscalationState::Eligible,
            candidate: None,
        };
    }

    EscalationDecision {
        state: EscalationState::Ready,
        candidate: Some(EscalationCandidate {
            ticket_id,
            current_assignee: assignee_id,
            escalation_ready_at,
            next_level,
            reason: format!(
                "Chamado de prioridade {} sem resolução há mais de {}h",
                priority.as_str(),
                ready_hours
            ),
        }),
    }
}

/// Records the escalation in the audit log. Returns false when the marker
/// already existed, which means another run decided this crossing first.
pub fn fire_escalation(
    conn: &mut PgConnection,
    candidate: &EscalationCandidate,
    now: DateTime<Utc>,
) -> Result<bool, SlaError> {
    let row = TicketEscalation {
        id: Uuid::new_v4(),
        ticket_id: candidate.ticket_id,
        level: candidate.next_level,
        reason: candidate.reason.clone(),
        created_at: now,
    };
    let inserted = diesel::insert_into(ticket_escalations::table)
        .values(&row)
        .on_conflict((ticket_escalations::ticket_id, ticket_escalations::level))
        .do_nothing()
        .execute(conn)?;
    Ok(inserted == 1)
}

pub fn list_escalations(
    conn: &mut PgConnection,
    ticket_id: Uuid,
) -> Result<Vec<TicketEscalation>, SlaError> {
    let rows = ticket_escalations::table
        .filter(ticket_escalations::ticket_id.eq(ticket_id))
        .order(ticket_escalations::level.asc())
        .load(conn)?;
    Ok(rows)
}

#[derive(QueryableByName)]
struct AdvisoryLock {
    #[diesel(sql_type = Bool)]
    acquired: bool,
}

fn try_scan_lock(conn: &mut PgConnection) -> Result<bool, SlaError> {
    let row: AdvisoryLock = diesel::sql_query("SELECT pg_try_advisory_lock($1) AS acquired")
        .bind::<BigInt, _>(SCAN_LOCK_KEY)
        .get_result(conn)?;
    Ok(row.acquired)
}

fn release_scan_lock(conn: &mut PgConnection) -> Result<(), SlaError> {
    diesel::sql_query("SELECT pg_advisory_unlock($1) AS acquired")
        .bind::<BigInt, _>(SCAN_LOCK_KEY)
        .get_result::<AdvisoryLock>(conn)?;
    Ok(())
}

/// Background worker that periodically scans open tickets for escalation
/// candidates and publishes one event per crossing.
pub struct EscalationMonitor {
    state: Arc<AppState>,
}

impl EscalationMonitor {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let period = self.state.config.escalation.poll_interval_secs;
            info!("Escalation monitor started (every {period}s)");
            let mut tick = tokio::time::interval(StdDuration::from_secs(period));
            loop {
                tick.tick().await;
                if let Err(e) = self.scan() {
                    error!("Escalation scan failed: {e}");
                }
            }
        })
    }

    fn scan(&self) -> Result<(), SlaError> {
        let mut conn = self
            .state
            .conn
            .get()
            .map_err(|e| SlaError::Database(e.to_string()))?;

        if !try_scan_lock(&mut conn)? {
            debug!("Escalation scan skipped, another instance holds the lock");
            return Ok(());
        }
        let result = self.scan_locked(&mut conn);
        if let Err(e) = release_scan_lock(&mut conn) {
            warn!("Failed to release escalation scan lock: {e}");
        }
        result
    }

    fn scan_locked(&self, conn: &mut PgConnection) -> Result<(), SlaError> {
        let config = &self.state.config.escalation;
        let eligible: Vec<String> = config
            .thresholds_hours
            .keys()
            .map(|p| p.as_str().to_string())
            .collect();
        if eligible.is_empty() {
            return Ok(());
        }

        let tickets: Vec<(Uuid, Option<Uuid>, String, String, DateTime<Utc>)> =
            support_tickets::table
                .filter(support_tickets::status.ne_all(vec!["resolved", "closed"]))
                .filter(support_tickets::priority.eq_any(eligible))
                .select((
                    support_tickets::id,
                    support_tickets::assignee_id,
                    support_tickets::status,
                    support_tickets::priority,
                    support_tickets::created_at,
                ))
                .load(conn)?;

        let levels: HashMap<Uuid, i32> = ticket_escalations::table
            .group_by(ticket_escalations::ticket_id)
            .select((
                ticket_escalations::ticket_id,
                diesel::dsl::max(ticket_escalations::level),
            ))
            .load::<(Uuid, Option<i32>)>(conn)?
            .into_iter()
            .map(|(id, level)| (id, level.unwrap_or(0)))
            .collect();

        let now = Utc::now();
        for (id, assignee_id, status, priority, created_at) in tickets {
            let (Some(status), Some(priority)) =
                (TicketStatus::parse(&status), TicketPriority::parse(&priority))
            else {
                warn!("Ticket {id} has unrecognized status/priority, skipping");
                continue;
            };
            let current_level = levels.get(&id).copied().unwrap_or(0);
            let decision = evaluate_ticket(
                id,
                assignee_id,
                status,
                priority,
                created_at,
                current_level,
                config,
                now,
            );
            let Some(candidate) = decision.candidate else {
                continue;
            };
            if !fire_escalation(conn, &candidate, now)? {
                continue;
            }
            info!(
                "Ticket {id} escalated to level {} ({})",
                candidate.next_level, candidate.reason
            );
            // Decided, not delivered: the marker above is authoritative and
            // is never rolled back on publish failure. Delivery runs on its
            // own task so the scan never waits on the gateway.
            let event = EscalationEvent::ready(id, candidate.next_level, candidate.reason.clone());
            let notify = &self.state.config.notifications;
            let _ = spawn_delivery(
                Arc::clone(&self.state.publisher),
                event,
                notify.max_retries,
                StdDuration::from_millis(notify.retry_backoff_ms),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap()
    }

    fn config() -> EscalationConfig {
        EscalationConfig {
            poll_interval_secs: 60,
            max_level: 3,
            thresholds_hours: HashMap::from([
                (TicketPriority::Critical, 4),
                (TicketPriority::High, 24),
            ]),
        }
    }

    fn decide(
        status: TicketStatus,
        priority: TicketPriority,
        current_level: i32,
        age_hours: i64,
    ) -> EscalationDecision {
        evaluate_ticket(
            Uuid::new_v4(),
            None,
            status,
            priority,
            t0(),
            current_level,
            &config(),
            t0() + Duration::hours(age_hours),
        )
    }

    #[test]
    fn test_terminal_tickets_are_not_eligible() {
        let d = decide(TicketStatus::Resolved, TicketPriority::Critical, 0, 100);
        assert_eq!(d.state, EscalationState::NotEligible);
        assert!(d.candidate.is_none());
    }

    #[test]
    fn test_priority_outside_policy_is_not_eligible() {
        let d = decide(TicketStatus::Open, TicketPriority::Medium, 0, 100);
        assert_eq!(d.state, EscalationState::NotEligible);
    }

    #[test]
    fn test_eligible_before_threshold() {
        let d = decide(TicketStatus::Open, TicketPriority::Critical, 0, 3);
        assert_eq!(d.state, EscalationState::Eligible);
        assert!(d.candidate.is_none());
    }

    #[test]
    fn test_ready_exactly_at_threshold() {
        // Readiness is `now >= ready_at`, no slack, no randomness.
        let d = decide(TicketStatus::Open, TicketPriority::Critical, 0, 4);
        assert_eq!(d.state, EscalationState::Ready);
        let c = d.candidate.unwrap();
        assert_eq!(c.next_level, 1);
        assert_eq!(c.escalation_ready_at, t0() + Duration::hours(4));
    }

    #[test]
    fn test_paused_ticket_still_ages_on_wall_clock() {
        let d = decide(TicketStatus::Paused, TicketPriority::Critical, 0, 5);
        assert_eq!(d.state, EscalationState::Ready);
    }

    #[test]
    fn test_high_priority_uses_its_own_threshold() {
        assert_eq!(
            decide(TicketStatus::Open, TicketPriority::High, 0, 23).state,
            EscalationState::Eligible
        );
        assert_eq!(
            decide(TicketStatus::Open, TicketPriority::High, 0, 24).state,
            EscalationState::Ready
        );
    }

    #[test]
    fn test_next_tier_requires_another_crossing() {
        let d = decide(TicketStatus::Open, TicketPriority::Critical, 1, 7);
        assert_eq!(d.state, EscalationState::Eligible);

        let d = decide(TicketStatus::Open, TicketPriority::Critical, 1, 8);
        assert_eq!(d.state, EscalationState::Ready);
        let c = d.candidate.unwrap();
        assert_eq!(c.next_level, 2);
        assert_eq!(c.escalation_ready_at, t0() + Duration::hours(8));
    }

    #[test]
    fn test_max_tier_is_a_silent_no_op() {
        let d = decide(TicketStatus::Open, TicketPriority::Critical, 3, 1000);
        assert_eq!(d.state, EscalationState::Escalated);
        assert!(d.candidate.is_none());
    }

    #[test]
    fn test_decision_is_deterministic_for_fixed_now() {
        let a = decide(TicketStatus::Open, TicketPriority::Critical, 0, 6);
        let b = decide(TicketStatus::Open, TicketPriority::Critical, 0, 6);
        assert_eq!(a.state, b.state);
        assert_eq!(
            a.candidate.unwrap().escalation_ready_at,
            b.candidate.unwrap().escalation_ready_at
        );
    }
}

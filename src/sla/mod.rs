pub mod compliance;
pub mod elapsed;
pub mod error;
pub mod escalation;
pub mod pause;
pub mod rules;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::warn;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::shared::models::schema::support_tickets;
use crate::shared::models::{TicketPriority, TicketStatus};
use crate::shared::state::AppState;
use crate::tickets::SupportTicket;
use compliance::{format_deadline, format_hours, format_minutes, ComplianceResult};
use error::SlaError;
use rules::{RuleSet, SlaRule, TicketSlaPolicy};

/// The SLA report consumed by ticket detail views and dashboards. Field
/// names and formats are a stable contract with the frontend.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlaReport {
    pub response_time: String,
    pub resolution_time: String,
    pub hours_elapsed: String,
    pub minutes_elapsed: i64,
    pub status: String,
    pub is_compliant: bool,
    pub paused_time: String,
    pub effective_time: String,
    pub sla_deadline: String,
}

impl SlaReport {
    pub fn build(rule: Option<&SlaRule>, result: &ComplianceResult) -> Self {
        Self {
            response_time: rule.map_or_else(|| "-".to_string(), |r| format_hours(r.response_time_hours)),
            resolution_time: rule
                .map_or_else(|| "-".to_string(), |r| format_hours(r.resolution_time_hours)),
            hours_elapsed: format_minutes(result.elapsed_minutes),
            minutes_elapsed: result.elapsed_minutes,
            status: result.status_label().to_string(),
            is_compliant: result.is_compliant,
            paused_time: format_minutes(result.paused_minutes),
            effective_time: format_minutes(result.effective_minutes),
            sla_deadline: result
                .sla_deadline
                .map_or_else(|| "-".to_string(), format_deadline),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PauseTicketRequest {
    pub reason: String,
    pub expected_return_at: Option<DateTime<Utc>>,
    pub paused_by: Option<Uuid>,
}

fn get_conn(
    state: &AppState,
) -> Result<diesel::r2d2::PooledConnection<diesel::r2d2::ConnectionManager<PgConnection>>, SlaError>
{
    state
        .conn
        .get()
        .map_err(|e| SlaError::Database(e.to_string()))
}

fn load_ticket(conn: &mut PgConnection, id: Uuid) -> Result<SupportTicket, SlaError> {
    support_tickets::table
        .filter(support_tickets::id.eq(id))
        .first(conn)
        .map_err(|e| match e {
            diesel::result::Error::NotFound => SlaError::NotFound(format!("Ticket {id} not found")),
            other => other.into(),
        })
}

pub async fn get_ticket_sla(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SlaReport>, SlaError> {
    let mut conn = get_conn(&state)?;
    let ticket = load_ticket(&mut conn, id)?;

    let status = TicketStatus::parse(&ticket.status).unwrap_or(TicketStatus::Open);
    let rules = RuleSet::load(&mut conn)?;
    let rule = TicketPriority::parse(&ticket.priority).and_then(|p| rules.resolve(p));

    let records = pause::list_pauses(&mut conn, id)?;
    let intervals: Vec<elapsed::PauseInterval> = records.iter().map(Into::into).collect();

    let now = Utc::now();
    let time = elapsed::compute(ticket.created_at, ticket.resolved_at, &intervals, now);
    if time.clock_skew {
        warn!("Ticket {id} has end time before creation, elapsed clamped to zero");
    }

    let result = compliance::evaluate(status, ticket.created_at, rule, &time);
    Ok(Json(SlaReport::build(rule, &result)))
}

pub async fn pause_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<PauseTicketRequest>,
) -> Result<Json<pause::PauseRecord>, SlaError> {
    let mut conn = get_conn(&state)?;
    let record = pause::record_pause(
        &mut conn,
        id,
        req.reason,
        req.expected_return_at,
        req.paused_by,
        Utc::now(),
    )?;
    Ok(Json(record))
}

pub async fn resume_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<pause::PauseRecord>, SlaError> {
    let mut conn = get_conn(&state)?;
    let record = pause::record_resume(&mut conn, id, Utc::now())?;
    Ok(Json(record))
}

pub async fn list_ticket_pauses(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<pause::PauseRecord>>, SlaError> {
    let mut conn = get_conn(&state)?;
    Ok(Json(pause::list_pauses(&mut conn, id)?))
}

pub async fn list_ticket_escalations(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<escalation::TicketEscalation>>, SlaError> {
    let mut conn = get_conn(&state)?;
    Ok(Json(escalation::list_escalations(&mut conn, id)?))
}

pub async fn get_sla_policies(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<TicketSlaPolicy>>, SlaError> {
    let mut conn = get_conn(&state)?;
    Ok(Json(rules::list_policies(&mut conn)?))
}

pub fn configure_sla_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tickets/:id/sla", get(get_ticket_sla))
        .route("/api/tickets/:id/pause", post(pause_ticket))
        .route("/api/tickets/:id/resume", post(resume_ticket))
        .route("/api/tickets/:id/pauses", get(list_ticket_pauses))
        .route("/api/tickets/:id/escalations", get(list_ticket_escalations))
        .route("/api/sla/policies", get(get_sla_policies))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sla::elapsed::ElapsedTime;
    use chrono::TimeZone;

    #[test]
    fn test_report_wire_shape() {
        let rule = SlaRule {
            response_time_hours: 1,
            resolution_time_hours: 8,
        };
        let created = Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap();
        let time = ElapsedTime {
            elapsed_minutes: 135,
            paused_minutes: 0,
            effective_minutes: 135,
            clock_skew: false,
        };
        let result = compliance::evaluate(TicketStatus::Open, created, Some(&rule), &time);
        let report = SlaReport::build(Some(&rule), &result);
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["responseTime"], "1h");
        assert_eq!(json["resolutionTime"], "8h");
        assert_eq!(json["hoursElapsed"], "2h 15min");
        assert_eq!(json["minutesElapsed"], 135);
        assert_eq!(json["status"], compliance::STATUS_BREACHED);
        assert_eq!(json["isCompliant"], false);
        assert_eq!(json["pausedTime"], "0min");
        assert_eq!(json["effectiveTime"], "2h 15min");
        assert_eq!(json["slaDeadline"], "10/03/2026 10:00");
    }

    #[test]
    fn test_report_without_rule() {
        let time = ElapsedTime {
            elapsed_minutes: 30,
            paused_minutes: 0,
            effective_minutes: 30,
            clock_skew: false,
        };
        let created = Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap();
        let result = compliance::evaluate(TicketStatus::Open, created, None, &time);
        let report = SlaReport::build(None, &result);
        assert_eq!(report.status, compliance::STATUS_UNDEFINED);
        assert!(report.is_compliant);
        assert_eq!(report.response_time, "-");
        assert_eq!(report.sla_deadline, "-");
    }
}

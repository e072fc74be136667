//! The pause ledger: an append-mostly audit trail of pause/resume intervals.
//!
//! A ticket has at most one open pause at a time. Both mutations run inside a
//! transaction that locks the ticket row first, so two concurrent requests
//! cannot both pass the invariant check.

use crate::shared::models::schema::{support_tickets, ticket_pause_records};
use crate::shared::models::TicketStatus;
use crate::sla::elapsed::PauseInterval;
use crate::sla::error::SlaError;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = ticket_pause_records)]
pub struct PauseRecord {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub paused_at: DateTime<Utc>,
    pub resumed_at: Option<DateTime<Utc>>,
    pub expected_return_at: Option<DateTime<Utc>>,
    pub reason: String,
    pub paused_by: Option<Uuid>,
}

impl From<&PauseRecord> for PauseInterval {
    fn from(record: &PauseRecord) -> Self {
        Self {
            paused_at: record.paused_at,
            resumed_at: record.resumed_at,
            expected_return_at: record.expected_return_at,
        }
    }
}

fn ensure_can_pause(open_pauses: i64) -> Result<(), SlaError> {
    if open_pauses > 0 {
        return Err(SlaError::AlreadyPaused);
    }
    Ok(())
}

fn ensure_open_pause(open: Option<PauseRecord>) -> Result<PauseRecord, SlaError> {
    open.ok_or(SlaError::NoOpenPause)
}

/// The ledger requires `resumed_at` strictly after `paused_at`; a resume
/// landing on the pause instant is nudged past it.
fn resume_instant(paused_at: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    now.max(paused_at + chrono::Duration::microseconds(1))
}

fn lock_ticket(conn: &mut PgConnection, ticket_id: Uuid) -> Result<(), SlaError> {
    support_tickets::table
        .filter(support_tickets::id.eq(ticket_id))
        .select(support_tickets::id)
        .for_update()
        .first::<Uuid>(conn)
        .map_err(|e| match e {
            diesel::result::Error::NotFound => {
                SlaError::NotFound(format!("Ticket {ticket_id} not found"))
            }
            other => other.into(),
        })?;
    Ok(())
}

pub fn record_pause(
    conn: &mut PgConnection,
    ticket_id: Uuid,
    reason: String,
    expected_return_at: Option<DateTime<Utc>>,
    paused_by: Option<Uuid>,
    now: DateTime<Utc>,
) -> Result<PauseRecord, SlaError> {
    conn.transaction(|conn| {
        lock_ticket(conn, ticket_id)?;

        let open_pauses: i64 = ticket_pause_records::table
            .filter(ticket_pause_records::ticket_id.eq(ticket_id))
            .filter(ticket_pause_records::resumed_at.is_null())
            .count()
            .get_result(conn)?;
        ensure_can_pause(open_pauses)?;

        let record = PauseRecord {
            id: Uuid::new_v4(),
            ticket_id,
            paused_at: now,
            resumed_at: None,
            expected_return_at,
            reason,
            paused_by,
        };
        diesel::insert_into(ticket_pause_records::table)
            .values(&record)
            .execute(conn)?;

        diesel::update(support_tickets::table.filter(support_tickets::id.eq(ticket_id)))
            .set((
                support_tickets::status.eq(TicketStatus::Paused.as_str()),
                support_tickets::updated_at.eq(now),
            ))
            .execute(conn)?;

        Ok(record)
    })
}

pub fn record_resume(
    conn: &mut PgConnection,
    ticket_id: Uuid,
    now: DateTime<Utc>,
) -> Result<PauseRecord, SlaError> {
    conn.transaction(|conn| {
        lock_ticket(conn, ticket_id)?;

        let open: Option<PauseRecord> = ticket_pause_records::table
            .filter(ticket_pause_records::ticket_id.eq(ticket_id))
            .filter(ticket_pause_records::resumed_at.is_null())
            .order(ticket_pause_records::paused_at.desc())
            .first(conn)
            .optional()?;
        let open = ensure_open_pause(open)?;

        let resumed_at = resume_instant(open.paused_at, now);
        let record: PauseRecord =
            diesel::update(ticket_pause_records::table.filter(ticket_pause_records::id.eq(open.id)))
                .set(ticket_pause_records::resumed_at.eq(Some(resumed_at)))
                .get_result(conn)?;

        diesel::update(support_tickets::table.filter(support_tickets::id.eq(ticket_id)))
            .set((
                support_tickets::status.eq(TicketStatus::InProgress.as_str()),
                support_tickets::updated_at.eq(now),
            ))
            .execute(conn)?;

        Ok(record)
    })
}

/// Full pause history for a ticket, oldest first. The ledger is never
/// deleted from; closed records are the audit trail.
pub fn list_pauses(conn: &mut PgConnection, ticket_id: Uuid) -> Result<Vec<PauseRecord>, SlaError> {
    let records = ticket_pause_records::table
        .filter(ticket_pause_records::ticket_id.eq(ticket_id))
        .order(ticket_pause_records::paused_at.asc())
        .load(conn)?;
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn open_record(paused_at: DateTime<Utc>) -> PauseRecord {
        PauseRecord {
            id: Uuid::new_v4(),
            ticket_id: Uuid::new_v4(),
            paused_at,
            resumed_at: None,
            expected_return_at: None,
            reason: "Aguardando cliente".to_string(),
            paused_by: None,
        }
    }

    #[test]
    fn test_pause_with_open_record_always_fails() {
        assert!(matches!(ensure_can_pause(1), Err(SlaError::AlreadyPaused)));
        assert!(matches!(ensure_can_pause(5), Err(SlaError::AlreadyPaused)));
        assert!(ensure_can_pause(0).is_ok());
    }

    #[test]
    fn test_resume_without_open_record_always_fails() {
        assert!(matches!(ensure_open_pause(None), Err(SlaError::NoOpenPause)));

        let paused_at = Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap();
        let record = open_record(paused_at);
        let id = record.id;
        assert_eq!(ensure_open_pause(Some(record)).unwrap().id, id);
    }

    #[test]
    fn test_resume_is_strictly_after_pause() {
        let paused_at = Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap();

        // Same-instant resume still produces a strictly later timestamp.
        assert!(resume_instant(paused_at, paused_at) > paused_at);
        // Skewed clocks cannot produce a resume before the pause.
        assert!(resume_instant(paused_at, paused_at - Duration::hours(1)) > paused_at);

        let later = paused_at + Duration::minutes(30);
        assert_eq!(resume_instant(paused_at, later), later);
    }
}

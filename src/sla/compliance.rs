//! Compliance classification over the calculator output.
//!
//! Status is derived on every call from (ticket, rule, pauses, now); nothing
//! here is persisted, so stored and actual state cannot drift.

use crate::shared::models::TicketStatus;
use crate::sla::elapsed::ElapsedTime;
use crate::sla::rules::SlaRule;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

pub const STATUS_WITHIN: &str = "Dentro do SLA";
pub const STATUS_BREACHED: &str = "Fora do SLA";
pub const STATUS_UNDEFINED: &str = "SLA não definido";

/// Consumption band against the SLA limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ComplianceBand {
    Normal,
    Warning,
    Critical,
    Violated,
}

impl ComplianceBand {
    fn classify(percentage: f64) -> Self {
        if percentage >= 100.0 {
            Self::Violated
        } else if percentage >= 80.0 {
            Self::Critical
        } else if percentage >= 60.0 {
            Self::Warning
        } else {
            Self::Normal
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ComplianceResult {
    pub elapsed_minutes: i64,
    pub paused_minutes: i64,
    pub effective_minutes: i64,
    pub percentage: f64,
    /// None when no rule resolves for the ticket's priority.
    pub band: Option<ComplianceBand>,
    pub is_compliant: bool,
    pub sla_limit_minutes: Option<i64>,
    pub sla_deadline: Option<DateTime<Utc>>,
    pub clock_skew: bool,
}

impl ComplianceResult {
    /// The pt-BR status label exposed on the query API.
    pub fn status_label(&self) -> &'static str {
        match self.band {
            None => STATUS_UNDEFINED,
            Some(_) if self.is_compliant => STATUS_WITHIN,
            Some(_) => STATUS_BREACHED,
        }
    }
}

/// Classifies effective time against the rule resolved for the ticket.
///
/// Resolved tickets are measured against the resolution limit, everything
/// else against the response limit. Pausing pushes the deadline outward by
/// exactly the paused duration. A missing rule degrades to compliant with no
/// band, so dashboards keep rendering.
pub fn evaluate(
    status: TicketStatus,
    created_at: DateTime<Utc>,
    rule: Option<&SlaRule>,
    time: &ElapsedTime,
) -> ComplianceResult {
    let Some(rule) = rule else {
        return ComplianceResult {
            elapsed_minutes: time.elapsed_minutes,
            paused_minutes: time.paused_minutes,
            effective_minutes: time.effective_minutes,
            percentage: 0.0,
            band: None,
            is_compliant: true,
            sla_limit_minutes: None,
            sla_deadline: None,
            clock_skew: time.clock_skew,
        };
    };

    let limit_hours = if status == TicketStatus::Resolved {
        rule.resolution_time_hours
    } else {
        rule.response_time_hours
    };
    let limit_minutes = i64::from(limit_hours) * 60;
    let percentage = if limit_minutes > 0 {
        time.effective_minutes as f64 / limit_minutes as f64 * 100.0
    } else {
        0.0
    };

    ComplianceResult {
        elapsed_minutes: time.elapsed_minutes,
        paused_minutes: time.paused_minutes,
        effective_minutes: time.effective_minutes,
        percentage,
        band: Some(ComplianceBand::classify(percentage)),
        is_compliant: time.effective_minutes <= limit_minutes,
        sla_limit_minutes: Some(limit_minutes),
        sla_deadline: Some(created_at + Duration::minutes(limit_minutes + time.paused_minutes)),
        clock_skew: time.clock_skew,
    }
}

/// Renders minutes as `"2h 15min"`, `"45min"` or `"0min"`.
pub fn format_minutes(minutes: i64) -> String {
    let minutes = minutes.max(0);
    let hours = minutes / 60;
    let rest = minutes % 60;
    if hours > 0 && rest > 0 {
        format!("{hours}h {rest}min")
    } else if hours > 0 {
        format!("{hours}h")
    } else {
        format!("{rest}min")
    }
}

pub fn format_hours(hours: i32) -> String {
    format!("{hours}h")
}

/// `dd/MM/yyyy HH:mm`, the format the dashboards already expect.
pub fn format_deadline(deadline: DateTime<Utc>) -> String {
    deadline.format("%d/%m/%Y %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sla::elapsed;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap()
    }

    fn rule(response: i32, resolution: i32) -> SlaRule {
        SlaRule {
            response_time_hours: response,
            resolution_time_hours: resolution,
        }
    }

    fn time(elapsed: i64, paused: i64) -> ElapsedTime {
        ElapsedTime {
            elapsed_minutes: elapsed,
            paused_minutes: paused,
            effective_minutes: (elapsed - paused).max(0),
            clock_skew: false,
        }
    }

    #[test]
    fn test_band_boundaries() {
        assert_eq!(ComplianceBand::classify(0.0), ComplianceBand::Normal);
        assert_eq!(ComplianceBand::classify(59.9), ComplianceBand::Normal);
        assert_eq!(ComplianceBand::classify(60.0), ComplianceBand::Warning);
        assert_eq!(ComplianceBand::classify(79.9), ComplianceBand::Warning);
        assert_eq!(ComplianceBand::classify(80.0), ComplianceBand::Critical);
        assert_eq!(ComplianceBand::classify(99.9), ComplianceBand::Critical);
        assert_eq!(ComplianceBand::classify(100.0), ComplianceBand::Violated);
    }

    #[test]
    fn test_open_ticket_uses_response_limit() {
        let r = rule(1, 8);
        let result = evaluate(TicketStatus::Open, t0(), Some(&r), &time(59, 0));
        assert_eq!(result.sla_limit_minutes, Some(60));
        assert!((result.percentage - 98.33).abs() < 0.01);
        assert_eq!(result.band, Some(ComplianceBand::Critical));
        assert!(result.is_compliant);
    }

    #[test]
    fn test_violation_past_the_limit() {
        let r = rule(1, 8);
        let result = evaluate(TicketStatus::Open, t0(), Some(&r), &time(61, 0));
        assert!(result.percentage > 100.0);
        assert_eq!(result.band, Some(ComplianceBand::Violated));
        assert!(!result.is_compliant);
        assert_eq!(result.status_label(), STATUS_BREACHED);
    }

    #[test]
    fn test_resolved_ticket_uses_resolution_limit() {
        let r = rule(1, 8);
        let result = evaluate(TicketStatus::Resolved, t0(), Some(&r), &time(540, 120));
        assert_eq!(result.sla_limit_minutes, Some(480));
        assert_eq!(result.effective_minutes, 420);
        assert!(result.is_compliant);
        assert_eq!(result.status_label(), STATUS_WITHIN);
    }

    #[test]
    fn test_pause_pushes_deadline_outward() {
        let r = rule(1, 8);
        let result = evaluate(TicketStatus::Open, t0(), Some(&r), &time(90, 30));
        // 60min limit + 30min paused
        assert_eq!(result.sla_deadline, Some(t0() + Duration::minutes(90)));
    }

    #[test]
    fn test_missing_rule_degrades_gracefully() {
        let result = evaluate(TicketStatus::Open, t0(), None, &time(10_000, 0));
        assert_eq!(result.band, None);
        assert!(result.is_compliant);
        assert_eq!(result.status_label(), STATUS_UNDEFINED);
        assert_eq!(result.sla_deadline, None);
    }

    #[test]
    fn test_percentage_non_decreasing_in_now() {
        let r = rule(2, 8);
        let mut last = -1.0;
        for minutes in [0, 30, 60, 90, 200, 500] {
            let result = evaluate(TicketStatus::Open, t0(), Some(&r), &time(minutes, 15));
            assert!(result.percentage >= last);
            last = result.percentage;
        }
    }

    #[test]
    fn test_duration_formatting() {
        assert_eq!(format_minutes(0), "0min");
        assert_eq!(format_minutes(45), "45min");
        assert_eq!(format_minutes(120), "2h");
        assert_eq!(format_minutes(135), "2h 15min");
        assert_eq!(format_hours(8), "8h");
    }

    #[test]
    fn test_deadline_formatting() {
        let deadline = Utc.with_ymd_and_hms(2026, 3, 10, 17, 5, 0).unwrap();
        assert_eq!(format_deadline(deadline), "10/03/2026 17:05");
    }
}

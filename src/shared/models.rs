use serde::{Deserialize, Serialize};

/// Ticket lifecycle status as stored in `support_tickets.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Paused,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(Self::Open),
            "in_progress" => Some(Self::InProgress),
            "paused" => Some(Self::Paused),
            "resolved" => Some(Self::Resolved),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Paused => "paused",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
        }
    }

    /// Resolved and closed tickets no longer accrue SLA time or escalate.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Closed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl TicketPriority {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

pub mod schema {
    diesel::table! {
        support_tickets (id) {
            id -> Uuid,
            ticket_number -> Varchar,
            subject -> Varchar,
            description -> Nullable<Text>,
            status -> Varchar,
            priority -> Varchar,
            department_id -> Nullable<Uuid>,
            assignee_id -> Nullable<Uuid>,
            created_at -> Timestamptz,
            resolved_at -> Nullable<Timestamptz>,
            closed_at -> Nullable<Timestamptz>,
            updated_at -> Timestamptz,
        }
    }

    diesel::table! {
        ticket_sla_policies (id) {
            id -> Uuid,
            priority -> Varchar,
            response_time_hours -> Int4,
            resolution_time_hours -> Int4,
            is_active -> Bool,
            created_at -> Timestamptz,
        }
    }

    diesel::table! {
        ticket_pause_records (id) {
            id -> Uuid,
            ticket_id -> Uuid,
            paused_at -> Timestamptz,
            resumed_at -> Nullable<Timestamptz>,
            expected_return_at -> Nullable<Timestamptz>,
            reason -> Text,
            paused_by -> Nullable<Uuid>,
        }
    }

    diesel::table! {
        ticket_escalations (id) {
            id -> Uuid,
            ticket_id -> Uuid,
            level -> Int4,
            reason -> Text,
            created_at -> Timestamptz,
        }
    }

    diesel::joinable!(ticket_pause_records -> support_tickets (ticket_id));
    diesel::joinable!(ticket_escalations -> support_tickets (ticket_id));

    diesel::allow_tables_to_appear_in_same_query!(
        support_tickets,
        ticket_sla_policies,
        ticket_pause_records,
        ticket_escalations,
    );
}

use crate::shared::models::schema::ticket_sla_policies;
use crate::shared::models::TicketPriority;
use crate::sla::error::SlaError;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = ticket_sla_policies)]
pub struct TicketSlaPolicy {
    pub id: Uuid,
    pub priority: String,
    pub response_time_hours: i32,
    pub resolution_time_hours: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Time limits applicable to a single ticket, resolved from its priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlaRule {
    pub response_time_hours: i32,
    pub resolution_time_hours: i32,
}

/// The resolved rule table. A priority with no entry is a legitimate state
/// ("SLA não definido"), never an error.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: HashMap<TicketPriority, SlaRule>,
}

impl RuleSet {
    pub fn from_policies(policies: &[TicketSlaPolicy]) -> Self {
        let mut rules = HashMap::new();
        for policy in policies.iter().filter(|p| p.is_active) {
            let Some(priority) = TicketPriority::parse(&policy.priority) else {
                continue;
            };
            rules.insert(
                priority,
                SlaRule {
                    response_time_hours: policy.response_time_hours,
                    resolution_time_hours: policy.resolution_time_hours,
                },
            );
        }
        Self { rules }
    }

    pub fn load(conn: &mut PgConnection) -> Result<Self, SlaError> {
        let policies: Vec<TicketSlaPolicy> = ticket_sla_policies::table
            .filter(ticket_sla_policies::is_active.eq(true))
            .order(ticket_sla_policies::priority.asc())
            .load(conn)?;
        Ok(Self::from_policies(&policies))
    }

    pub fn resolve(&self, priority: TicketPriority) -> Option<&SlaRule> {
        self.rules.get(&priority)
    }
}

pub fn list_policies(conn: &mut PgConnection) -> Result<Vec<TicketSlaPolicy>, SlaError> {
    let policies = ticket_sla_policies::table
        .filter(ticket_sla_policies::is_active.eq(true))
        .order(ticket_sla_policies::priority.asc())
        .load(conn)?;
    Ok(policies)
}

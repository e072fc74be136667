use crate::shared::models::TicketPriority;
use anyhow::{bail, Context, Result};
use dotenvy::dotenv;
use std::collections::HashMap;
use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub notifications: NotificationConfig,
    pub escalation: EscalationConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct NotificationConfig {
    /// Realtime gateway endpoint; when unset, events are logged and dropped.
    pub webhook_url: Option<String>,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Clone)]
pub struct EscalationConfig {
    pub poll_interval_secs: u64,
    /// Highest responsibility tier a ticket can be escalated to.
    pub max_level: i32,
    /// Hours a ticket may stay open before escalating, per priority.
    /// Priorities absent from the map are not escalation-eligible.
    pub thresholds_hours: HashMap<TicketPriority, i64>,
}

impl EscalationConfig {
    pub fn threshold_hours(&self, priority: TicketPriority) -> Option<i64> {
        self.thresholds_hours.get(&priority).copied()
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        dotenv().ok();

        let thresholds_spec = env::var("ESCALATION_THRESHOLDS")
            .unwrap_or_else(|_| "critical=4,high=24".to_string());

        Ok(Self {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("SERVER_PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .context("SERVER_PORT must be a port number")?,
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").context("DATABASE_URL is required")?,
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .context("DATABASE_MAX_CONNECTIONS must be an integer")?,
            },
            notifications: NotificationConfig {
                webhook_url: env::var("NOTIFY_WEBHOOK_URL").ok(),
                max_retries: env::var("NOTIFY_RETRIES")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()
                    .context("NOTIFY_RETRIES must be an integer")?,
                retry_backoff_ms: env::var("NOTIFY_RETRY_BACKOFF_MS")
                    .unwrap_or_else(|_| "500".to_string())
                    .parse()
                    .context("NOTIFY_RETRY_BACKOFF_MS must be an integer")?,
            },
            escalation: EscalationConfig {
                poll_interval_secs: env::var("ESCALATION_POLL_SECS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()
                    .context("ESCALATION_POLL_SECS must be an integer")?,
                max_level: env::var("ESCALATION_MAX_LEVEL")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()
                    .context("ESCALATION_MAX_LEVEL must be an integer")?,
                thresholds_hours: parse_thresholds(&thresholds_spec)?,
            },
        })
    }
}

/// Parses `"critical=4,high=24"` into a priority -> hours map.
pub fn parse_thresholds(spec: &str) -> Result<HashMap<TicketPriority, i64>> {
    let mut map = HashMap::new();
    for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let Some((priority, hours)) = entry.split_once('=') else {
            bail!("Invalid escalation threshold entry: {entry}");
        };
        let Some(priority) = TicketPriority::parse(priority.trim()) else {
            bail!("Unknown priority in escalation thresholds: {priority}");
        };
        let hours: i64 = hours
            .trim()
            .parse()
            .with_context(|| format!("Invalid hour value in threshold entry: {entry}"))?;
        if hours <= 0 {
            bail!("Escalation threshold must be positive: {entry}");
        }
        map.insert(priority, hours);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_thresholds_reference_policy() {
        let map = parse_thresholds("critical=4,high=24").unwrap();
        assert_eq!(map.get(&TicketPriority::Critical), Some(&4));
        assert_eq!(map.get(&TicketPriority::High), Some(&24));
        assert_eq!(map.get(&TicketPriority::Medium), None);
    }

    #[test]
    fn test_parse_thresholds_whitespace_and_empty_entries() {
        let map = parse_thresholds(" critical = 4 , high=24 ,").unwrap();
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_parse_thresholds_rejects_bad_input() {
        assert!(parse_thresholds("critical").is_err());
        assert!(parse_thresholds("urgent=4").is_err());
        assert!(parse_thresholds("high=abc").is_err());
        assert!(parse_thresholds("high=0").is_err());
    }
}

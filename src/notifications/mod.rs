use async_trait::async_trait;
use log::{error, info, warn};
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Event produced when a ticket crosses an escalation threshold. Consumed by
/// the realtime gateway, which fans it out to connected dashboards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub ticket_id: Uuid,
    pub next_level: i32,
    pub reason: String,
}

impl EscalationEvent {
    pub fn ready(ticket_id: Uuid, next_level: i32, reason: String) -> Self {
        Self {
            event_type: "escalation_ready".to_string(),
            ticket_id,
            next_level,
            reason,
        }
    }
}

#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    async fn publish(&self, event: &EscalationEvent) -> anyhow::Result<()>;
}

/// Posts events to the realtime gateway over HTTP.
pub struct WebhookPublisher {
    client: reqwest::Client,
    url: String,
}

impl WebhookPublisher {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl NotificationPublisher for WebhookPublisher {
    async fn publish(&self, event: &EscalationEvent) -> anyhow::Result<()> {
        let response = self.client.post(&self.url).json(event).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("Gateway returned {}", response.status());
        }
        Ok(())
    }
}

/// Used when no gateway is configured; events are logged and dropped.
pub struct LogPublisher;

#[async_trait]
impl NotificationPublisher for LogPublisher {
    async fn publish(&self, event: &EscalationEvent) -> anyhow::Result<()> {
        info!(
            "Escalation event (no gateway configured): ticket {} -> level {}",
            event.ticket_id, event.next_level
        );
        Ok(())
    }
}

/// Bounded fire-and-forget delivery: the event is already recorded as decided
/// by the caller, so permanent failure here is logged, never propagated.
pub async fn publish_with_retry(
    publisher: &dyn NotificationPublisher,
    event: &EscalationEvent,
    max_attempts: u32,
    initial_backoff: Duration,
) -> bool {
    let mut backoff = initial_backoff;
    for attempt in 1..=max_attempts.max(1) {
        match publisher.publish(event).await {
            Ok(()) => return true,
            Err(e) => {
                warn!(
                    "Publish attempt {attempt}/{max_attempts} failed for ticket {}: {e}",
                    event.ticket_id
                );
            }
        }
        if attempt < max_attempts {
            tokio::time::sleep(backoff).await;
            backoff *= 2;
        }
    }
    false
}

/// Hands the event to its own task and returns immediately; the caller's
/// tick never waits on delivery. Failure logging happens inside the task.
pub fn spawn_delivery(
    publisher: Arc<dyn NotificationPublisher>,
    event: EscalationEvent,
    max_attempts: u32,
    initial_backoff: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let delivered =
            publish_with_retry(publisher.as_ref(), &event, max_attempts, initial_backoff).await;
        if !delivered {
            error!(
                "Dropping escalation event for ticket {} after {max_attempts} attempts",
                event.ticket_id
            );
        }
    })
}

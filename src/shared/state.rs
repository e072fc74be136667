use crate::config::AppConfig;
use crate::notifications::NotificationPublisher;
use crate::shared::utils::DbPool;
use std::sync::Arc;

pub struct AppState {
    pub conn: DbPool,
    pub config: AppConfig,
    pub publisher: Arc<dyn NotificationPublisher>,
}

impl Clone for AppState {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            config: self.config.clone(),
            publisher: Arc::clone(&self.publisher),
        }
    }
}

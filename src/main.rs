use deskserver::config::AppConfig;
use deskserver::notifications::{LogPublisher, NotificationPublisher, WebhookPublisher};
use deskserver::shared::state::AppState;
use deskserver::shared::utils::create_conn;
use deskserver::sla::escalation::EscalationMonitor;
use log::info;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = AppConfig::load()?;
    let conn = create_conn(&config.database.url, config.database.max_connections)?;

    let publisher: Arc<dyn NotificationPublisher> =
        match config.notifications.webhook_url.clone() {
            Some(url) => Arc::new(WebhookPublisher::new(url)),
            None => Arc::new(LogPublisher),
        };

    let state = Arc::new(AppState {
        conn,
        config: config.clone(),
        publisher,
    });

    let monitor = Arc::new(EscalationMonitor::new(Arc::clone(&state)));
    let _monitor_handle = monitor.spawn();

    let app = deskserver::api_router::configure_api_routes()
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("deskserver listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

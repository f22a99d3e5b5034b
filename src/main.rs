use std::sync::Arc;

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::EnvFilter;

use notifications::channels::in_app::{InAppChannelSender, InAppHub};
use notifications::channels::nats::{ensure_stream, NatsChannelSender};
use notifications::config::AppConfig;
use notifications::delivery::http::router;
use notifications::repository::postgres::{create_pool, PostgresNotificationRepository};
use notifications::telemetry::{self, TelemetryConfig};
use notifications::usecase::dispatcher::DeliveryDispatcher;
use notifications::usecase::jwt::JwtService;
use notifications::usecase::notifications::NotificationsUseCase;
use notifications::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("failed to load configuration")?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // Initialize tracing subscriber with optional OpenTelemetry layer
    let tracer_provider = if config.telemetry_enabled {
        let provider = telemetry::init_telemetry_with_subscriber(&TelemetryConfig::from(&config), env_filter)
            .map_err(|e| anyhow::anyhow!("failed to initialize telemetry: {e}"))?;
        Some(provider)
    } else {
        telemetry::init_subscriber_without_telemetry(env_filter);
        None
    };

    tracing::info!("starting the notifications service");

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")?;
    metrics_process::Collector::default().describe();
    tracing::info!("prometheus metrics initialized");

    tracing::info!("config loaded, telemetry_enabled={}", config.telemetry_enabled);

    let pool = create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("failed to create database pool")?;
    tracing::info!("database pool created");

    sqlx::migrate!().run(&pool).await?;
    tracing::info!("database migrations applied");

    // Email and push go out through NATS; without it those channels record failures
    let nats_client = match async_nats::connect(&config.nats_url).await {
        Ok(client) => {
            tracing::info!(nats_url = %config.nats_url, "connected to NATS");
            if let Err(e) = ensure_stream(&client).await {
                tracing::error!(error = %e, "failed to create NATS JetStream stream");
            }
            Some(client)
        }
        Err(e) => {
            tracing::warn!(error = %e, nats_url = %config.nats_url, "failed to connect to NATS, email and push delivery will be unavailable");
            None
        }
    };

    let in_app_hub = InAppHub::new();
    let dispatcher = DeliveryDispatcher::new(
        NatsChannelSender::email(nats_client.clone()),
        NatsChannelSender::push(nats_client),
        InAppChannelSender::new(in_app_hub.clone()),
    );
    let notifications_usecase =
        NotificationsUseCase::new(PostgresNotificationRepository::new(pool), dispatcher);

    let shared_state = Arc::new(AppState {
        notifications_usecase,
        jwt_service: JwtService::new(config.jwt_secret),
        in_app_hub,
        metrics_handle,
        dispatch_batch_limit: config.dispatch_batch_limit,
    });

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!("notifications service running on {}", config.listen_addr);
    axum::serve(listener, router(shared_state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(provider) = tracer_provider {
        telemetry::shutdown_telemetry(provider);
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown signal received");
}

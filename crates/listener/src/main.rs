//! `gw-listener` -- network notification listener daemon.
//!
//! Opens a dedicated Postgres session, `LISTEN`s on the configured
//! channels, and dispatches the map actions carried by incoming
//! notifications onto an in-process event bus, which it logs.
//!
//! # Environment variables
//!
//! | Variable                | Required | Default        | Description                         |
//! |-------------------------|----------|----------------|-------------------------------------|
//! | `DATABASE_URL`          | yes      | --             | Postgres URL                        |
//! | `NOTIFY_CHANNELS`       | no       | `current_user` | Comma-separated channel names       |
//! | `LOG_FORMAT`            | no       | `text`         | `text` or `json`                    |
//! | `SHUTDOWN_TIMEOUT_SECS` | no       | `5`            | Max wait for the poll loop to stop  |

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gw_db::PgNotifyConnection;
use gw_events::{EventBus, EventLog};
use gw_listener::config::{ListenerConfig, LogFormat};
use gw_notify::{builtin_registry, Dispatcher};

/// How long to wait for the event log to flush after the bus closes.
const EVENT_LOG_DRAIN: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = ListenerConfig::from_env().context("Invalid configuration")?;
    init_tracing(config.log_format);

    // --- Database ---
    let mut connection = PgNotifyConnection::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    connection
        .health_check()
        .await
        .context("Database health check failed")?;
    tracing::info!("Database health check passed");

    let channels = match config.channels.clone() {
        Some(channels) => channels,
        None => vec![connection
            .current_user()
            .await
            .context("Failed to resolve current_user for the default channel")?],
    };

    // --- Event bus ---
    let bus = Arc::new(EventBus::default());
    let log_handle = tokio::spawn(EventLog::run(bus.subscribe()));

    // --- Dispatcher ---
    let registry = Arc::new(builtin_registry(Arc::clone(&bus)));
    tracing::info!(actions = ?registry.names(), "Action handlers registered");

    let dispatcher = Dispatcher::new(connection, registry);
    dispatcher.start_listening(channels.iter().cloned()).await;
    tracing::info!(?channels, "Notification listener started");

    shutdown_signal().await;

    // --- Shutdown ---
    if tokio::time::timeout(config.shutdown_timeout, dispatcher.stop_listening(channels))
        .await
        .is_err()
    {
        tracing::warn!("Timed out unsubscribing, stopping poll loop");
        dispatcher.shutdown().await;
    }
    tracing::info!("Notification dispatcher stopped");

    // The registry's handlers hold the remaining bus handles.
    drop(dispatcher);
    drop(bus);
    match tokio::time::timeout(EVENT_LOG_DRAIN, log_handle).await {
        Ok(Ok(logged)) => tracing::info!(logged, "Event log stopped"),
        Ok(Err(e)) => tracing::error!(error = %e, "Event log task failed"),
        Err(_) => tracing::warn!("Timed out waiting for event log"),
    }

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let json = format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gw_listener=info,gw_notify=info,gw_events=info".into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

/// Wait for SIGINT or (on Unix) SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::signal;

use stars_expiry_notifier::config::Settings;
use stars_expiry_notifier::postgres;
use stars_expiry_notifier::server::{create_app, AppState};
use stars_expiry_notifier::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new().context("failed to load configuration")?;

    let _telemetry = init_telemetry(&settings.otel)?;
    tracing::info!(
        unit_id = %settings.registry.org_unit_id,
        warning_days = settings.notify.expiry_warning_days,
        backend = %settings.database.backend,
        "Configuration loaded"
    );

    // Optional PostgreSQL pool shared by both stores
    let pool = if settings.database.backend == "postgres" {
        let pool = postgres::connect(&settings.database).await?;
        postgres::ensure_schema(&pool).await?;
        Some(pool)
    } else {
        None
    };

    let state = AppState::from_settings(settings.clone(), pool).await?;
    tracing::info!("Application state initialized");

    let app = create_app(state);

    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal_handler() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}

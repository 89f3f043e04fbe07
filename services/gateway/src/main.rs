// PotSplit Gateway Service
// HTTP entry point for event sessions, settlement and payment links

use potsplit_gateway::{app, config::GatewayConfig};
use potsplit_sessions::{spawn_expiry_sweeper, SessionService};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_level(true)
        .with_line_number(true)
        .init();

    info!("Starting PotSplit Gateway Service");

    let config = GatewayConfig::from_env()?;
    info!(
        data_dir = ?config.sessions.data_dir,
        retention_hours = config.sessions.retention_hours,
        export_path = ?config.sessions.export_path,
        "Loaded configuration"
    );

    let service = Arc::new(SessionService::open(&config.sessions)?);
    let sweeper = spawn_expiry_sweeper(service.clone(), config.sessions.sweep_interval());

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Gateway listening on: {}", bind_addr);
    info!("   POST  /sessions - Create session");
    info!("   GET   /sessions/:id - Get session");
    info!("   GET   /sessions/:id/players - List players");
    info!("   POST  /sessions/:id/players - Add player");
    info!("   PATCH /sessions/:id/players/:index - Update player");
    info!("   POST  /sessions/:id/settle - Compute settlement");
    info!("   POST  /sessions/:id/execute-settlements - Payment links");
    info!("   POST  /sessions/:id/complete - Mark settled and export");
    info!("   GET   /health - Health check");
    info!("   GET   /metrics - Prometheus metrics");

    axum::serve(listener, app(service))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    sweeper.abort();
    Ok(())
}

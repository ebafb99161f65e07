use std::time::Duration;

use browser_relay::{app, build_state_from_env, retention};
use monlight_core::envutil::init_tracing;
use tokio::net::TcpListener;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let healthcheck_port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8083);
    monlight_core::health::maybe_healthcheck_and_exit(healthcheck_port);

    init_tracing();

    let state = build_state_from_env().await?;
    let retention_pool = state.pool.clone();
    let retention_days = state.config.retention_days;
    tokio::spawn(retention::run_forever(
        retention_pool,
        retention_days,
        Duration::from_secs(24 * 60 * 60),
    ));

    let port = state.config.port;
    let app = app(state);
    let addr: std::net::SocketAddr = ([0, 0, 0, 0], port).into();
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "browser-relay listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

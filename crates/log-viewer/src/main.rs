use log_viewer::poller::PollerConfig;
use log_viewer::{app, build_state_from_env, poller};
use monlight_core::envutil::init_tracing;
use tokio::net::TcpListener;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let healthcheck_port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8081);
    monlight_core::health::maybe_healthcheck_and_exit(healthcheck_port);

    init_tracing();

    let state = build_state_from_env().await?;

    let poller_cfg = PollerConfig {
        log_sources: state.config.log_sources.clone(),
        containers: state.config.containers.clone(),
        poll_interval: state.config.poll_interval,
        max_entries: state.config.max_entries,
    };
    tokio::spawn(poller::run_forever(
        state.pool.clone(),
        state.tail_registry.clone(),
        poller_cfg,
    ));

    let port = state.config.port;
    let app = app(state);
    let addr: std::net::SocketAddr = ([0, 0, 0, 0], port).into();
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "log-viewer listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

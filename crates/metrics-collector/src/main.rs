use metrics_collector::retention::RetentionConfig;
use metrics_collector::{app, build_state_from_env, retention, rollup};
use monlight_core::envutil::init_tracing;
use tokio::net::TcpListener;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let healthcheck_port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8082);
    monlight_core::health::maybe_healthcheck_and_exit(healthcheck_port);

    init_tracing();

    let state = build_state_from_env().await?;

    let minute_pool = state.pool.clone();
    let interval = state.config.aggregation_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(err) = rollup::minute::run_once(&minute_pool).await {
                tracing::warn!(error = %err, "minute rollup failed, will retry next interval");
            }
        }
    });

    let hour_pool = state.pool.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(3600));
        loop {
            ticker.tick().await;
            if let Err(err) = rollup::hour::run_once(&hour_pool).await {
                tracing::warn!(error = %err, "hourly rollup failed, will retry next interval");
            }
        }
    });

    let retention_pool = state.pool.clone();
    let retention_cfg = RetentionConfig {
        raw_seconds: state.config.retention_raw_seconds,
        minute_seconds: state.config.retention_minute_seconds,
        hourly_seconds: state.config.retention_hourly_seconds,
    };
    tokio::spawn(retention::run_forever(
        retention_pool,
        retention_cfg,
        std::time::Duration::from_secs(24 * 60 * 60),
    ));

    let port = state.config.port;
    let app = app(state);
    let addr: std::net::SocketAddr = ([0, 0, 0, 0], port).into();
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "metrics-collector listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

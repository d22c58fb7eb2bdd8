use tasksync::config::RelayConfig;
use tasksync::server::{RelayListener, RelayServer};
use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
pub async fn main() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tasksync=debug"));

    fmt::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_ansi(true)
        .init();

    let config = RelayConfig::from_env();
    let server = RelayServer::new();
    server.start_sweep(config.sweep_interval);

    let listener = RelayListener::bind(server.clone(), config.addr())
        .await
        .expect("Failed to bind to address");

    tokio::select! {
        _ = listener.run() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    server.shutdown().await;
}

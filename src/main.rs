//! Gateway binary entrypoint (spec.md §6 "Process lifecycle", §9 "Exit
//! codes"): load configuration, start the schema watcher, and serve HTTP
//! until the process is signalled to stop.

use std::process::ExitCode;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use gateway::cluster::ClusterRegistry;
use gateway::config::GatewayConfig;

const EXIT_CONFIG: u8 = 2;
const EXIT_BIND: u8 = 3;
const EXIT_WATCHER: u8 = 4;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match GatewayConfig::from_env() {
        Ok(config) => Arc::new(config),
        Err(err) => {
            eprintln!("configuration error: {err}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let registry = Arc::new(ClusterRegistry::new());
    let watch_dir = std::path::PathBuf::from(&config.openapi_definitions_path);

    if let Err(err) = gateway::watcher::initial_walk(&watch_dir, &registry, &config).await {
        tracing::error!(%err, "initial schema walk failed");
        return ExitCode::from(EXIT_WATCHER);
    }

    let watcher_registry = registry.clone();
    let watcher_config = config.clone();
    let watcher_handle = tokio::spawn(async move { gateway::watcher::run(watch_dir, watcher_registry, watcher_config).await });

    let routes = gateway::http::routes(registry, config.clone());
    let addr = ([0, 0, 0, 0], config.port);
    let bound = warp::serve(routes).try_bind_ephemeral(addr);
    let (_addr, server) = match bound {
        Ok(bound) => bound,
        Err(err) => {
            tracing::error!(%err, "failed to bind HTTP listener");
            return ExitCode::from(EXIT_BIND);
        }
    };

    tokio::select! {
        _ = server => {
            tracing::info!("HTTP server stopped");
            ExitCode::SUCCESS
        }
        result = watcher_handle => {
            match result {
                Ok(Ok(())) => ExitCode::SUCCESS,
                Ok(Err(err)) => {
                    tracing::error!(%err, "schema watcher terminated");
                    ExitCode::from(EXIT_WATCHER)
                }
                Err(err) => {
                    tracing::error!(%err, "schema watcher task panicked");
                    ExitCode::from(EXIT_WATCHER)
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received shutdown signal");
            ExitCode::SUCCESS
        }
    }
}

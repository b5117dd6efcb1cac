use anyhow::Result;
use chrono::Utc;
use fabmon_alarm::engine::AlarmEngine;
use fabmon_alarm::snapshot::HttpSnapshotSource;
use fabmon_storage::store::SqliteAlarmStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::time::{interval, Duration};
use tracing_subscriber::EnvFilter;

use fabmon_server::app;
use fabmon_server::config;
use fabmon_server::seed;
use fabmon_server::state::AppState;

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  fabmon-server [config.toml]                        Start the server");
    eprintln!("  fabmon-server init-alarms <config.toml> <seed.json>  Load alarm types and configs from a seed file");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("fabmon=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("init-alarms") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("init-alarms requires <config.toml> and <seed.json> arguments")
            })?;
            let seed_path = args.get(3).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("init-alarms requires <seed.json> argument")
            })?;
            run_init_alarms(config_path, seed_path)
        }
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        _ => {
            let config_path = args
                .get(1)
                .map(|s| s.as_str())
                .unwrap_or("config/server.toml");
            run_server(config_path).await
        }
    }
}

/// Load alarm types and configurations from a JSON seed file.
fn run_init_alarms(config_path: &str, seed_path: &str) -> Result<()> {
    let config = config::ServerConfig::load(config_path)?;
    let store = SqliteAlarmStore::open(std::path::Path::new(&config.database.data_dir))?;
    seed::init_from_seed_file(&store, seed_path)
}

async fn run_server(config_path: &str) -> Result<()> {
    let config = config::ServerConfig::load(config_path)?;

    tracing::info!(
        http_port = config.http_port,
        data_dir = %config.database.data_dir,
        snapshot_url = %config.telemetry.snapshot_url,
        "fabmon-server starting"
    );

    let store = Arc::new(SqliteAlarmStore::open(std::path::Path::new(
        &config.database.data_dir,
    ))?);

    // Seed built-in alarm types (only when the store has none)
    if let Err(e) = seed::init_default_types(store.as_ref()) {
        tracing::error!(error = %e, "Failed to initialize default alarm types");
    }

    let source = HttpSnapshotSource::new(
        config.telemetry.snapshot_url.clone(),
        config.telemetry.timeout_secs,
    )?;
    let engine = Arc::new(AlarmEngine::new(store.clone(), Box::new(source)));

    let state = AppState {
        engine: engine.clone(),
        store: store.clone(),
        start_time: Utc::now(),
        config: Arc::new(config.clone()),
    };

    // HTTP server
    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let app = app::build_http_app(state);
    let http_listener = tokio::net::TcpListener::bind(http_addr).await?;
    let http_server = axum::serve(http_listener, app);

    // Periodic poll task
    let poll_handle = if config.poll.enabled {
        let poll_engine = engine.clone();
        let tick_secs = config.poll.interval_secs.max(1);
        Some(tokio::spawn(async move {
            let mut tick = interval(Duration::from_secs(tick_secs));
            loop {
                tick.tick().await;
                match poll_engine.run_poll_cycle().await {
                    Ok(outcome) if !outcome.results.is_empty() || !outcome.failures.is_empty() => {
                        tracing::info!(
                            firing = outcome.results.len(),
                            failed = outcome.failures.len(),
                            "Scheduled poll cycle finished"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => tracing::error!(error = %e, "Scheduled poll cycle failed"),
                }
            }
        }))
    } else {
        tracing::info!("Scheduled polling disabled");
        None
    };

    tracing::info!(http = %http_addr, "Server started");

    tokio::select! {
        result = http_server.with_graceful_shutdown(async { signal::ctrl_c().await.ok(); }) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server error");
            }
        }
        _ = signal::ctrl_c() => {
            tracing::info!("Shutting down gracefully");
        }
    }

    if let Some(h) = poll_handle {
        h.abort();
    }
    tracing::info!("Server stopped");

    Ok(())
}

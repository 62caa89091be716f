//! Main entry point for the snapvault HTTP server binary

use anyhow::Result;
use snapvault_core::{create_app_with_config, run_server, AppConfig, AppState, StorageBackend, SystemClock};
use std::{net::SocketAddr, sync::Arc};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    info!("Configuration loaded successfully");
    info!("Server will bind to: {}", config.bind_address());
    info!("Database URL: {}", config.database.url);

    config.create_directories()
        .map_err(|e| anyhow::anyhow!("Failed to create directories: {}", e))?;

    let addr: SocketAddr = config.bind_address().parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address: {}", e))?;

    let state = AppState::from_config(&config, Arc::new(SystemClock))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize application state: {}", e))?;

    state.ensure_bootstrap_account(&config)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create bootstrap account: {}", e))?;

    info!("App: {} v{}", state.app_name, state.version);
    info!(
        "Blob storage: {}",
        match config.files.backend {
            StorageBackend::Local => format!("local ({})", config.files.upload_dir.display()),
            StorageBackend::Memory => "in-memory".to_string(),
        }
    );

    let app = create_app_with_config(state, &config);

    run_server(app, addr).await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            let default_level = if cfg!(debug_assertions) {
                "debug"
            } else {
                "info"
            };

            format!(
                "{crate_name}={level},snapvault_core={level},tower_http=debug,axum=debug",
                crate_name = env!("CARGO_CRATE_NAME").replace('-', "_"),
                level = default_level
            ).into()
        });

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let is_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    if is_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.pretty())
            .init();
    }
}

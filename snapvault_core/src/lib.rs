//! Core library for the snapvault file vault: bearer-token auth, upload
//! validation, file registry and the HTTP routes that expose them.

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod files;
pub mod handlers;
pub mod middleware;

#[cfg(test)]
pub(crate) mod test_support;

pub use auth::{AuthService, Clock, SystemClock, TokenConfig, TokenService, UserId, UserRepository};
pub use config::{AppConfig, StorageBackend};
pub use database::{get_database_pool, run_migrations, DatabaseManager};
pub use error::{AppError, Result};
pub use files::{BlobStore, FileRegistry, FileRepository, LocalBlobStore, MemoryBlobStore};
pub use handlers::routes::create_routes;
pub use middleware::auth::{require_bearer_auth, AuthUser};
pub use middleware::cors::cors_layer_from_config;

use axum::{extract::DefaultBodyLimit, Router};
use std::{net::SocketAddr, sync::Arc};
use tokio::signal;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub app_name: String,
    pub version: String,
    pub db: DatabaseManager,
    pub auth_service: AuthService,
    pub file_registry: FileRegistry,
}

impl AppState {
    pub fn new(db: DatabaseManager, auth_service: AuthService, file_registry: FileRegistry) -> Self {
        Self {
            app_name: "snapvault".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            db,
            auth_service,
            file_registry,
        }
    }

    /// Connects, migrates and wires every service from `config`.
    pub async fn from_config(config: &AppConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let pool = get_database_pool(&config.database.url, config.database.max_connections).await?;
        run_migrations(&pool).await?;

        let token_config = TokenConfig::from_auth_config(&config.auth)?;
        let token_service = Arc::new(TokenService::new(token_config, clock.clone()));
        let auth_service = AuthService::new(Arc::new(UserRepository::new(pool.clone())), token_service)
            .with_password_min_length(config.auth.password_min_length);

        let blobs: Arc<dyn BlobStore> = match config.files.backend {
            StorageBackend::Local => Arc::new(LocalBlobStore::new(
                config.files.upload_dir.clone(),
                config.files.public_base_url.clone(),
            )),
            StorageBackend::Memory => {
                Arc::new(MemoryBlobStore::new(config.files.public_base_url.clone()))
            }
        };
        let file_registry = FileRegistry::new(Arc::new(FileRepository::new(pool.clone())), blobs, clock);

        Ok(Self::new(DatabaseManager::new(pool), auth_service, file_registry))
    }

    /// Registers the configured bootstrap account if it is missing.
    pub async fn ensure_bootstrap_account(&self, config: &AppConfig) -> Result<()> {
        if let (Some(email), Some(password)) = (
            config.auth.bootstrap_email.as_deref(),
            config.auth.bootstrap_password.as_deref(),
        ) {
            let user = self.auth_service.ensure_user(email, password).await?;
            info!(user_id = %user.id, "Bootstrap account ready");
        }
        Ok(())
    }

    /// Deletes an account with everything it owns. Files go first so no
    /// stored bytes outlive their metadata; the user row goes last.
    pub async fn remove_account(&self, id: UserId) -> Result<usize> {
        let removed = self.file_registry.remove_owner(id).await?;
        self.auth_service.delete_user(id).await?;
        info!(user_id = %id, files = removed, "Account removed");
        Ok(removed)
    }
}

pub fn create_app(state: AppState) -> Router {
    create_app_with_config(state, &AppConfig::default())
}

pub fn create_app_with_config(state: AppState, config: &AppConfig) -> Router {
    Router::new()
        .merge(create_routes(state.clone()))
        .layer(DefaultBodyLimit::max(config.server.max_request_bytes))
        .layer(middleware::cors::cors_layer_from_config(&config.cors))
        .layer(middleware::logging::logging_layer())
        .with_state(state)
}

pub async fn run_server(app: Router, addr: SocketAddr) -> Result<()> {
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}

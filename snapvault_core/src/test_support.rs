use std::sync::Arc;

use tempfile::TempDir;

use crate::auth::{CreateUserRequest, CredentialStore, LoginResponse, SystemClock, User};
use crate::config::{AppConfig, StorageBackend};
use crate::AppState;

pub const TEST_PASSWORD: &str = "correct horse battery";

pub fn test_config(dir: &TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    config.database.url = format!("sqlite:{}", dir.path().join("test.db").display());
    config.database.max_connections = 2;
    config.auth.jwt_secret = "test-secret-0123456789abcdef0123456789".to_string();
    config.files.backend = StorageBackend::Memory;
    config
}

pub async fn test_state() -> (AppState, TempDir) {
    let dir = TempDir::new().unwrap();
    let state = AppState::from_config(&test_config(&dir), Arc::new(SystemClock))
        .await
        .unwrap();
    (state, dir)
}

pub async fn seed_user(state: &AppState, email: &str) -> (User, LoginResponse) {
    let summary = state
        .auth_service
        .register_user(CreateUserRequest {
            email: email.to_string(),
            password: TEST_PASSWORD.to_string(),
        })
        .await
        .unwrap();
    let user = state
        .auth_service
        .credentials()
        .find_by_id(summary.id)
        .await
        .unwrap()
        .unwrap();
    let session = state.auth_service.issue_session(&user).unwrap();
    (user, session)
}

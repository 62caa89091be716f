use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::auth::MIN_SECRET_LEN;

/// Development-only secret shipped in the defaults. `validate` warns when it
/// is still in use.
pub const DEVELOPMENT_JWT_SECRET: &str = "snapvault-development-secret-change-me";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub files: FileConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound on a request body. Kept above the upload ceiling so an
    /// oversize file reaches the validator.
    pub max_request_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub issuer: String,
    pub access_token_ttl_hours: i64,
    pub refresh_token_ttl_days: i64,
    pub password_min_length: usize,
    pub bootstrap_email: Option<String>,
    pub bootstrap_password: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("access_token_ttl_hours", &self.access_token_ttl_hours)
            .field("refresh_token_ttl_days", &self.refresh_token_ttl_days)
            .field("password_min_length", &self.password_min_length)
            .field("bootstrap_email", &self.bootstrap_email)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Local,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub backend: StorageBackend,
    pub upload_dir: PathBuf,
    /// Prefix for blob URLs. Empty means URLs are relative to this server.
    pub public_base_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Empty allows any origin without credentials.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            max_request_bytes: 8 * 1024 * 1024,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:./snapvault.db".to_string(),
            max_connections: 10,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEVELOPMENT_JWT_SECRET.to_string(),
            issuer: crate::auth::DEFAULT_ISSUER.to_string(),
            access_token_ttl_hours: 24,
            refresh_token_ttl_days: 7,
            password_min_length: crate::auth::DEFAULT_PASSWORD_MIN_LENGTH,
            bootstrap_email: None,
            bootstrap_password: None,
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            upload_dir: PathBuf::from("./uploads"),
            public_base_url: String::new(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&AppConfig::default())?);

        if std::path::Path::new("config.toml").exists() {
            builder = builder.add_source(File::with_name("config"));
        }

        builder = builder.add_source(
            Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("cors.allowed_origins")
                .try_parsing(true),
        );

        let app_config: AppConfig = builder.build()?.try_deserialize()?;

        app_config.validate()?;

        Ok(app_config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message("Server port cannot be 0".to_string()));
        }

        if self.database.url.is_empty() {
            return Err(ConfigError::Message(
                "Database URL cannot be empty".to_string(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Message(
                "Database max connections must be greater than 0".to_string(),
            ));
        }

        if self.auth.jwt_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Message(format!(
                "JWT secret must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }

        if self.auth.jwt_secret == DEVELOPMENT_JWT_SECRET {
            tracing::warn!("Using default JWT secret - change this in production!");
        }

        if self.auth.access_token_ttl_hours <= 0 {
            return Err(ConfigError::Message(
                "Access token TTL must be positive".to_string(),
            ));
        }

        let access_ttl = chrono::Duration::try_hours(self.auth.access_token_ttl_hours).ok_or_else(|| {
            ConfigError::Message("Access token TTL is out of range".to_string())
        })?;
        let refresh_ttl = self
            .auth
            .refresh_token_ttl_days
            .checked_mul(24)
            .and_then(chrono::Duration::try_hours)
            .ok_or_else(|| ConfigError::Message("Refresh token TTL is out of range".to_string()))?;

        if refresh_ttl <= access_ttl {
            return Err(ConfigError::Message(
                "Refresh token TTL must be longer than the access token TTL".to_string(),
            ));
        }

        if self.auth.password_min_length < 6 {
            return Err(ConfigError::Message(
                "Password minimum length must be at least 6".to_string(),
            ));
        }

        if self.auth.bootstrap_email.is_some() != self.auth.bootstrap_password.is_some() {
            return Err(ConfigError::Message(
                "Bootstrap email and password must be set together".to_string(),
            ));
        }

        if self.server.max_request_bytes <= crate::files::MAX_UPLOAD_SIZE {
            return Err(ConfigError::Message(
                "Max request size must exceed the upload size limit".to_string(),
            ));
        }

        Ok(())
    }

    pub fn create_directories(&self) -> Result<(), std::io::Error> {
        if self.files.backend == StorageBackend::Local {
            std::fs::create_dir_all(&self.files.upload_dir)?;
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

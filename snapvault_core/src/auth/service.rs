use std::sync::Arc;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;

use crate::auth::errors::{AuthError, TokenError};
use crate::auth::jwt::TokenService;
use crate::auth::models::{
    CreateUserRequest, LoginRequest, LoginResponse, TokenSubject, User, UserId, UserSummary,
};
use crate::auth::password::hash_password;
use crate::auth::repository::CredentialStore;
use crate::error::{AppError, Result};

pub const DEFAULT_PASSWORD_MIN_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 128;
const MAX_EMAIL_LENGTH: usize = 254;

lazy_static! {
    static ref EMAIL_PATTERN: Regex =
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email pattern compiles");
}

#[derive(Debug)]
pub enum LoginOutcome {
    Authenticated(User),
    InvalidCredentials,
}

#[derive(Clone)]
pub struct AuthService {
    credentials: Arc<dyn CredentialStore>,
    tokens: Arc<TokenService>,
    password_min_length: usize,
}

impl AuthService {
    pub fn new(credentials: Arc<dyn CredentialStore>, tokens: Arc<TokenService>) -> Self {
        Self {
            credentials,
            tokens,
            password_min_length: DEFAULT_PASSWORD_MIN_LENGTH,
        }
    }

    pub fn with_password_min_length(mut self, min: usize) -> Self {
        self.password_min_length = min;
        self
    }

    pub fn token_service(&self) -> &TokenService {
        &self.tokens
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    pub async fn register_user(&self, request: CreateUserRequest) -> Result<UserSummary> {
        self.validate_email_format(&request.email)?;
        self.validate_password(&request.password)?;

        if self.credentials.find_by_email(&request.email).await?.is_some() {
            return Err(AppError::BadRequest("Email already exists".to_string()));
        }

        let password_hash = hash_password(&request.password)?;
        let user = self
            .credentials
            .create_user(&request.email, &password_hash)
            .await?;

        tracing::info!(user_id = %user.id, "registered user");
        Ok(UserSummary::from(&user))
    }

    /// Registers the account unless a user with that email already exists.
    pub async fn ensure_user(&self, email: &str, password: &str) -> Result<UserSummary> {
        if let Some(user) = self.credentials.find_by_email(email).await? {
            tracing::debug!(user_id = %user.id, "bootstrap account already present");
            return Ok(UserSummary::from(&user));
        }

        self.register_user(CreateUserRequest {
            email: email.to_string(),
            password: password.to_string(),
        })
        .await
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<LoginOutcome> {
        if request.email.trim().is_empty() || request.password.is_empty() {
            return Ok(LoginOutcome::InvalidCredentials);
        }

        match self
            .credentials
            .verify(&request.email, &request.password)
            .await?
        {
            Some(user) => {
                tracing::info!(user_id = %user.id, "login succeeded");
                Ok(LoginOutcome::Authenticated(user))
            }
            None => {
                tracing::info!("login rejected");
                Ok(LoginOutcome::InvalidCredentials)
            }
        }
    }

    /// Mints a fresh access/refresh pair for `user` in the login payload shape.
    pub fn issue_session(&self, user: &User) -> std::result::Result<LoginResponse, TokenError> {
        let pair = self
            .tokens
            .issue_access_and_refresh(&TokenSubject::from(user), self.tokens.now())?;

        Ok(LoginResponse {
            success: true,
            user: UserSummary::from(user),
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.tokens.access_token_ttl_seconds(),
        })
    }

    /// Verifies `token` against the service clock and loads its subject.
    pub async fn authenticate(&self, token: &str) -> Result<User> {
        let claims = self.tokens.verify(token, self.tokens.now())?;

        match self.credentials.find_by_id(claims.subject()).await? {
            Some(user) => Ok(user),
            None => Err(AuthError::SubjectMissing.into()),
        }
    }

    /// `Ok(None)` when the token checks out but its user has been deleted.
    pub async fn resolve_user(&self, token: &str, now: DateTime<Utc>) -> Result<Option<UserId>> {
        let claims = self.tokens.verify(token, now)?;
        let user = self.credentials.find_by_id(claims.subject()).await?;
        Ok(user.map(|u| u.id))
    }

    /// Drops the credential row only. `AppState::remove_account` also takes
    /// the owner's stored files.
    pub async fn delete_user(&self, id: UserId) -> Result<()> {
        self.credentials.delete_user(id).await?;
        tracing::info!(user_id = %id, "deleted user");
        Ok(())
    }

    fn validate_password(&self, password: &str) -> Result<()> {
        if password.trim().is_empty() {
            return Err(AppError::BadRequest("Password cannot be empty".to_string()));
        }

        if password.len() < self.password_min_length {
            return Err(AppError::BadRequest(format!(
                "Password must be at least {} characters long",
                self.password_min_length
            )));
        }

        if password.len() > MAX_PASSWORD_LENGTH {
            return Err(AppError::BadRequest(format!(
                "Password cannot be longer than {} characters",
                MAX_PASSWORD_LENGTH
            )));
        }

        Ok(())
    }

    fn validate_email_format(&self, email: &str) -> Result<()> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AppError::BadRequest("Email cannot be empty".to_string()));
        }

        if email.len() > MAX_EMAIL_LENGTH {
            return Err(AppError::BadRequest("Email address too long".to_string()));
        }

        let (local_part, domain_part) = email
            .split_once('@')
            .ok_or_else(|| AppError::BadRequest("Email must contain @ symbol".to_string()))?;

        if local_part.starts_with('.') || local_part.ends_with('.') || local_part.contains("..") {
            return Err(AppError::BadRequest("Invalid email format".to_string()));
        }

        if domain_part.starts_with('.') || domain_part.starts_with('-') {
            return Err(AppError::BadRequest("Invalid email format".to_string()));
        }

        if !EMAIL_PATTERN.is_match(email) {
            return Err(AppError::BadRequest("Invalid email format".to_string()));
        }

        Ok(())
    }
}

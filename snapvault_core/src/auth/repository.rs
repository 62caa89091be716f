use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::auth::models::{User, UserId};
use crate::auth::password::verify_password;
use crate::error::{AppError, Result};

/// Holder of user records and their password hashes.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Returns the user when `password` matches the stored hash for `email`.
    async fn verify(&self, email: &str, password: &str) -> Result<Option<User>>;
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn create_user(&self, email: &str, password_hash: &str) -> Result<User>;
    async fn delete_user(&self, id: UserId) -> Result<()>;
}

#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn user_from_row(row: &SqliteRow) -> Result<User> {
    let created_at: String = row.get("created_at");

    Ok(User {
        id: UserId::new(row.get("id")),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| AppError::Database(format!("Failed to parse created_at: {}", e)))?
            .with_timezone(&Utc),
    })
}

#[async_trait]
impl CredentialStore for UserRepository {
    async fn verify(&self, email: &str, password: &str) -> Result<Option<User>> {
        let Some(user) = self.find_by_email(email).await? else {
            return Ok(None);
        };

        if verify_password(password, &user.password_hash)? {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, email, password_hash, created_at FROM users WHERE id = ?")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to get user by ID: {}", e)))?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, email, password_hash, created_at FROM users WHERE email = ?")
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to get user by email: {}", e)))?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn create_user(&self, email: &str, password_hash: &str) -> Result<User> {
        let now = Utc::now();
        let email = normalize_email(email);

        let result = sqlx::query(
            r#"
            INSERT INTO users (email, password_hash, created_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&email)
        .bind(password_hash)
        .bind(now.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::BadRequest("Email already exists".to_string())
            }
            other => AppError::Database(format!("Failed to create user: {}", other)),
        })?;

        Ok(User {
            id: UserId::new(result.last_insert_rowid()),
            email,
            password_hash: password_hash.to_string(),
            created_at: now,
        })
    }

    async fn delete_user(&self, id: UserId) -> Result<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id.get())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete user: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        Ok(())
    }
}

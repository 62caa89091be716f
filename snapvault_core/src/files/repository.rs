use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::models::{FileListQuery, NewUploadedFile, UploadedFile};
use crate::auth::UserId;
use crate::error::{AppError, Result};

#[async_trait]
pub trait FileRepositoryTrait: Send + Sync {
    async fn insert(&self, file: &NewUploadedFile) -> Result<UploadedFile>;
    /// Newest first. `query` narrows the owner's records and never widens them.
    async fn list_for_owner(&self, owner: UserId, query: &FileListQuery) -> Result<Vec<UploadedFile>>;
    async fn find_by_storage_key(&self, storage_key: &str) -> Result<Option<UploadedFile>>;
    /// Deletes every record of `owner` and returns what was removed.
    async fn delete_for_owner(&self, owner: UserId) -> Result<Vec<UploadedFile>>;
}

#[derive(Clone)]
pub struct FileRepository {
    pool: SqlitePool,
}

impl FileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const FILE_COLUMNS: &str = "id, user_id, filename, size, content_type, storage_key, created_at";

pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn file_from_row(row: &SqliteRow) -> Result<UploadedFile> {
    Ok(UploadedFile {
        id: row.get("id"),
        owner: UserId::new(row.get("user_id")),
        filename: row.get("filename"),
        size: row.get("size"),
        content_type: row.get("content_type"),
        storage_key: row.get("storage_key"),
        created_at: DateTime::parse_from_rfc3339(&row.get::<String, _>("created_at"))
            .map_err(|e| AppError::Database(format!("Invalid datetime: {}", e)))?
            .with_timezone(&Utc),
    })
}

#[async_trait]
impl FileRepositoryTrait for FileRepository {
    async fn insert(&self, file: &NewUploadedFile) -> Result<UploadedFile> {
        let result = sqlx::query(
            r#"
            INSERT INTO uploaded_files (user_id, filename, size, content_type, storage_key, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(file.owner.get())
        .bind(&file.filename)
        .bind(file.size)
        .bind(&file.content_type)
        .bind(&file.storage_key)
        .bind(format_timestamp(file.created_at))
        .execute(&self.pool)
        .await?;

        Ok(UploadedFile {
            id: result.last_insert_rowid(),
            owner: file.owner,
            filename: file.filename.clone(),
            size: file.size,
            content_type: file.content_type.clone(),
            storage_key: file.storage_key.clone(),
            created_at: file.created_at,
        })
    }

    async fn list_for_owner(&self, owner: UserId, query: &FileListQuery) -> Result<Vec<UploadedFile>> {
        let mut sql = format!("SELECT {} FROM uploaded_files WHERE user_id = ?", FILE_COLUMNS);

        if query.content_type.is_some() {
            sql.push_str(" AND content_type = ?");
        }

        sql.push_str(" ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?");

        let mut query_builder = sqlx::query(&sql).bind(owner.get());

        if let Some(ref content_type) = query.content_type {
            query_builder = query_builder.bind(content_type.to_lowercase());
        }

        let rows = query_builder
            .bind(query.limit())
            .bind(query.offset())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(file_from_row).collect()
    }

    async fn find_by_storage_key(&self, storage_key: &str) -> Result<Option<UploadedFile>> {
        let sql = format!("SELECT {} FROM uploaded_files WHERE storage_key = ?1", FILE_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(storage_key)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(file_from_row).transpose()
    }

    async fn delete_for_owner(&self, owner: UserId) -> Result<Vec<UploadedFile>> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {} FROM uploaded_files WHERE user_id = ?1", FILE_COLUMNS);
        let rows = sqlx::query(&sql)
            .bind(owner.get())
            .fetch_all(&mut *tx)
            .await?;
        let removed = rows.iter().map(file_from_row).collect::<Result<Vec<_>>>()?;

        sqlx::query("DELETE FROM uploaded_files WHERE user_id = ?1")
            .bind(owner.get())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(removed)
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::UserId;

/// An upload as it arrives, before anything has been stored.
#[derive(Debug, Clone)]
pub struct UploadCandidate {
    pub filename: String,
    pub content_type: String,
    /// Declared size. Set from `data` by `new`.
    pub size_bytes: u64,
    pub data: Vec<u8>,
}

impl UploadCandidate {
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            size_bytes: data.len() as u64,
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedFile {
    pub id: i64,
    pub owner: UserId,
    pub filename: String,
    pub size: i64,
    pub content_type: String,
    pub storage_key: String,
    pub created_at: DateTime<Utc>,
}

impl UploadedFile {
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

#[derive(Debug, Clone)]
pub struct NewUploadedFile {
    pub owner: UserId,
    pub filename: String,
    pub size: i64,
    pub content_type: String,
    pub storage_key: String,
    pub created_at: DateTime<Utc>,
}

/// Narrowing filters for a listing. The owner is never part of it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileListQuery {
    pub content_type: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl FileListQuery {
    pub const MAX_LIMIT: i64 = 200;

    /// `-1` is SQLite for "no limit".
    pub fn limit(&self) -> i64 {
        self.limit.map_or(-1, |l| l.clamp(1, Self::MAX_LIMIT))
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// One entry of `GET /api/files`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileResponse {
    pub id: i64,
    pub filename: String,
    pub size: i64,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
    pub download_url: String,
    pub preview_url: Option<String>,
}

/// Body of a successful `POST /api/files`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub filename: String,
    pub id: i64,
    pub size: i64,
    pub content_type: String,
    pub upload_timestamp: DateTime<Utc>,
}

impl From<&UploadedFile> for UploadResponse {
    fn from(file: &UploadedFile) -> Self {
        Self {
            filename: file.filename.clone(),
            id: file.id,
            size: file.size,
            content_type: file.content_type.clone(),
            upload_timestamp: file.created_at,
        }
    }
}

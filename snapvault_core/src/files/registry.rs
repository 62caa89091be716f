use std::sync::Arc;

use super::blob::{is_safe_key, storage_key_for, BlobStore, Disposition};
use super::models::{FileListQuery, FileResponse, NewUploadedFile, UploadCandidate, UploadedFile};
use super::repository::FileRepositoryTrait;
use super::validation::{UploadRules, UploadValidator};
use crate::auth::{Clock, UserId};
use crate::error::{AppError, Result};

/// Binds validated uploads to their owners. Bytes go to the blob store,
/// metadata to the repository.
#[derive(Clone)]
pub struct FileRegistry {
    repository: Arc<dyn FileRepositoryTrait>,
    blobs: Arc<dyn BlobStore>,
    validator: UploadValidator,
    clock: Arc<dyn Clock>,
}

impl FileRegistry {
    pub fn new(
        repository: Arc<dyn FileRepositoryTrait>,
        blobs: Arc<dyn BlobStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            blobs,
            validator: UploadValidator::new(),
            clock,
        }
    }

    pub fn rules(&self) -> UploadRules {
        self.validator.rules()
    }

    /// Validates, stores the bytes, then records the metadata. A rejected
    /// candidate touches no storage. If the metadata write fails the stored
    /// bytes are removed again.
    pub async fn create(
        &self,
        owner: UserId,
        candidate: Option<&UploadCandidate>,
    ) -> Result<UploadedFile> {
        let accepted = self.validator.validate(candidate).map_err(|e| {
            tracing::info!(user_id = %owner, kind = e.kind(), "upload rejected");
            e
        })?;
        let candidate = candidate.ok_or(AppError::InternalServerError)?;

        let now = self.clock.now();
        let storage_key = storage_key_for(now, &accepted.extension);

        self.blobs
            .put(&storage_key, &candidate.data)
            .await
            .map_err(|e| {
                tracing::error!(storage_key = %storage_key, "blob write failed: {}", e);
                AppError::Persistence(e.to_string())
            })?;

        let record = NewUploadedFile {
            owner,
            filename: candidate.filename.clone(),
            size: candidate.size_bytes as i64,
            content_type: accepted.content_type,
            storage_key: storage_key.clone(),
            created_at: now,
        };

        match self.repository.insert(&record).await {
            Ok(file) => {
                tracing::info!(
                    user_id = %owner,
                    file_id = file.id,
                    storage_key = %storage_key,
                    size = file.size,
                    "upload stored"
                );
                Ok(file)
            }
            Err(e) => {
                tracing::error!(storage_key = %storage_key, "metadata write failed: {}", e);
                if let Err(cleanup) = self.blobs.delete(&storage_key).await {
                    tracing::error!(storage_key = %storage_key, "orphaned blob left behind: {}", cleanup);
                }
                Err(AppError::Persistence(e.to_string()))
            }
        }
    }

    /// Every file of `owner`, newest first.
    pub async fn list_for(&self, owner: UserId) -> Result<Vec<UploadedFile>> {
        self.list_for_with(owner, &FileListQuery::default()).await
    }

    pub async fn list_for_with(
        &self,
        owner: UserId,
        query: &FileListQuery,
    ) -> Result<Vec<UploadedFile>> {
        self.repository.list_for_owner(owner, query).await
    }

    pub fn download_url(&self, file: &UploadedFile) -> String {
        self.blobs.url_for(&file.storage_key, Disposition::Attachment)
    }

    /// Only images get a preview.
    pub fn preview_url(&self, file: &UploadedFile) -> Option<String> {
        file.is_image()
            .then(|| self.blobs.url_for(&file.storage_key, Disposition::Inline))
    }

    pub fn describe(&self, file: &UploadedFile) -> FileResponse {
        FileResponse {
            id: file.id,
            filename: file.filename.clone(),
            size: file.size,
            content_type: file.content_type.clone(),
            created_at: file.created_at,
            download_url: self.download_url(file),
            preview_url: self.preview_url(file),
        }
    }

    /// Metadata and bytes for a storage key, if both exist.
    pub async fn open_blob(&self, storage_key: &str) -> Result<Option<(UploadedFile, Vec<u8>)>> {
        if !is_safe_key(storage_key) {
            return Err(AppError::BadRequest("Invalid storage key".to_string()));
        }

        let Some(file) = self.repository.find_by_storage_key(storage_key).await? else {
            return Ok(None);
        };

        Ok(self.blobs.get(storage_key).await?.map(|data| (file, data)))
    }

    /// Drops every record and blob of `owner`. Returns how many files went.
    pub async fn remove_owner(&self, owner: UserId) -> Result<usize> {
        let removed = self.repository.delete_for_owner(owner).await?;

        for file in &removed {
            if let Err(e) = self.blobs.delete(&file.storage_key).await {
                tracing::warn!(storage_key = %file.storage_key, "failed to delete blob: {}", e);
            }
        }

        tracing::info!(user_id = %owner, count = removed.len(), "removed owner files");
        Ok(removed.len())
    }
}

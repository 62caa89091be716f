use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use parking_lot::RwLock;
use serde::Deserialize;
use tokio::fs as async_fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::{AppError, Result};

/// How a blob URL asks the browser to treat the bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    #[default]
    Attachment,
    Inline,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Attachment => "attachment",
            Disposition::Inline => "inline",
        }
    }
}

/// Durable byte storage plus URL derivation for stored uploads.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Writes all of `data` under `key`. Either the whole blob becomes
    /// readable or none of it does.
    async fn put(&self, key: &str, data: &[u8]) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    /// Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
    fn url_for(&self, key: &str, disposition: Disposition) -> String;
}

/// `YYYY/MM/<uuid><ext>`, where `extension` already carries its dot.
pub fn storage_key_for(now: DateTime<Utc>, extension: &str) -> String {
    format!(
        "{}/{:02}/{}{}",
        now.year(),
        now.month(),
        Uuid::new_v4(),
        extension
    )
}

/// Relative, slash-separated, and free of `.`/`..` segments.
pub fn is_safe_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('/')
        && key.split('/').all(|segment| {
            !segment.is_empty()
                && segment != "."
                && segment != ".."
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        })
}

fn blob_url(base: &str, key: &str, disposition: Disposition) -> String {
    format!(
        "{}/blobs/{}?disposition={}",
        base.trim_end_matches('/'),
        key,
        disposition.as_str()
    )
}

fn ensure_safe_key(key: &str) -> Result<()> {
    if is_safe_key(key) {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!("Invalid storage key: {}", key)))
    }
}

#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        ensure_safe_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            async_fs::create_dir_all(parent).await?;
        }

        let tmp_path = path.with_extension(format!("tmp-{}", Uuid::new_v4()));
        let written = async {
            let mut file = async_fs::File::create(&tmp_path).await?;
            file.write_all(data).await?;
            file.sync_all().await?;
            async_fs::rename(&tmp_path, &path).await
        }
        .await;

        if let Err(e) = written {
            let _ = async_fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        tracing::debug!(storage_key = key, bytes = data.len(), "stored blob");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match async_fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match async_fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn url_for(&self, key: &str, disposition: Disposition) -> String {
        blob_url(&self.public_base_url, key, disposition)
    }
}

#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    public_base_url: String,
}

impl MemoryBlobStore {
    pub fn new(public_base_url: impl Into<String>) -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            public_base_url: public_base_url.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        ensure_safe_key(key)?;
        self.blobs.write().insert(key.to_string(), data.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        ensure_safe_key(key)?;
        Ok(self.blobs.read().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        ensure_safe_key(key)?;
        self.blobs.write().remove(key);
        Ok(())
    }

    fn url_for(&self, key: &str, disposition: Disposition) -> String {
        blob_url(&self.public_base_url, key, disposition)
    }
}

use serde::Serialize;
use thiserror::Error;

use super::models::UploadCandidate;

/// Largest accepted upload, 2 MiB.
pub const MAX_UPLOAD_SIZE: usize = 2 * 1024 * 1024;

pub const ALLOWED_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".svg", ".txt", ".md", ".csv",
];

pub const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/svg+xml",
    "text/plain",
    "text/markdown",
    "text/csv",
];

/// Why an upload was refused. The display text is what the client sees.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No file provided")]
    NoFile,

    #[error("File is too large. Maximum size allowed is 2MB.")]
    TooLarge { size: u64, max_size: u64 },

    #[error("File type not allowed. Allowed types: {}", ALLOWED_EXTENSIONS.join(", "))]
    TypeNotAllowed { filename: String, content_type: String },
}

impl ValidationError {
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::NoFile => "no_file",
            ValidationError::TooLarge { .. } => "too_large",
            ValidationError::TypeNotAllowed { .. } => "type_not_allowed",
        }
    }
}

/// A candidate that passed every check, with its normalized type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedUpload {
    pub extension: String,
    pub content_type: String,
}

/// The admission rules in a form a client can mirror.
#[derive(Debug, Clone, Serialize)]
pub struct UploadRules {
    pub max_size_bytes: usize,
    pub allowed_extensions: Vec<&'static str>,
    pub allowed_content_types: Vec<&'static str>,
}

impl Default for UploadRules {
    fn default() -> Self {
        Self {
            max_size_bytes: MAX_UPLOAD_SIZE,
            allowed_extensions: ALLOWED_EXTENSIONS.to_vec(),
            allowed_content_types: ALLOWED_CONTENT_TYPES.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UploadValidator;

impl UploadValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn rules(&self) -> UploadRules {
        UploadRules::default()
    }

    /// Checks run in order and the first failure wins: presence, size,
    /// extension, then declared content type.
    pub fn validate(
        &self,
        candidate: Option<&UploadCandidate>,
    ) -> Result<AcceptedUpload, ValidationError> {
        let candidate = match candidate {
            Some(c) if c.size_bytes > 0 => c,
            _ => return Err(ValidationError::NoFile),
        };

        if candidate.size_bytes > MAX_UPLOAD_SIZE as u64 {
            return Err(ValidationError::TooLarge {
                size: candidate.size_bytes,
                max_size: MAX_UPLOAD_SIZE as u64,
            });
        }

        let type_not_allowed = || ValidationError::TypeNotAllowed {
            filename: candidate.filename.clone(),
            content_type: candidate.content_type.clone(),
        };

        let extension = extension_of(&candidate.filename).ok_or_else(type_not_allowed)?;
        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(type_not_allowed());
        }

        let content_type = normalize_content_type(&candidate.content_type).ok_or_else(type_not_allowed)?;
        if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
            return Err(type_not_allowed());
        }

        Ok(AcceptedUpload {
            extension,
            content_type,
        })
    }
}

/// `.ext` of the lower-cased filename, taken after the last dot.
pub fn extension_of(filename: &str) -> Option<String> {
    let lowered = filename.to_lowercase();
    let (_, ext) = lowered.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(format!(".{}", ext))
}

/// Lower-cased `type/subtype` with any parameters dropped.
fn normalize_content_type(content_type: &str) -> Option<String> {
    content_type
        .trim()
        .parse::<mime::Mime>()
        .ok()
        .map(|m| m.essence_str().to_lowercase())
}

use thiserror::Error;

use crate::error::AppError;

/// Why a presented bearer token was not accepted.
///
/// The gateway renders every variant as the same unauthorized response;
/// the variant itself only travels to logs and tests.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("no bearer token presented")]
    MissingToken,

    #[error("token is not a well-formed JWT")]
    Malformed,

    #[error("token signature does not match")]
    BadSignature,

    #[error("token has expired")]
    Expired,

    #[error("token subject no longer exists")]
    SubjectMissing,
}

impl AuthError {
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::Malformed => "malformed",
            AuthError::BadSignature => "bad_signature",
            AuthError::Expired => "expired",
            AuthError::SubjectMissing => "subject_missing",
        }
    }
}

/// Failures while minting a token. These are programming or configuration
/// errors, never a property of the caller's request.
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("cannot issue a token without a subject")]
    MissingSubject,

    #[error("token lifetime must be positive, got {0} seconds")]
    InvalidLifetime(i64),

    #[error("token lifetime out of range: {0}")]
    LifetimeOutOfRange(String),

    #[error("signing secret must be at least {min} bytes, got {actual}")]
    WeakSecret { min: usize, actual: usize },

    #[error("failed to encode token: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        tracing::error!("Token issue failed: {}", err);
        AppError::Other(anyhow::Error::new(err))
    }
}

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::clock::Clock;
use crate::auth::errors::{AuthError, TokenError};
use crate::auth::models::{AccessClaims, TokenKind, TokenPair, TokenSubject};
use crate::config::AuthConfig;

pub const DEFAULT_ISSUER: &str = "snapvault";
pub const MIN_SECRET_LEN: usize = 32;

/// HMAC key material. Loaded once at startup and never mutated; rotating it
/// means building a new `TokenService`.
#[derive(Clone)]
pub struct SigningSecret(Arc<str>);

impl SigningSecret {
    pub fn new(secret: impl Into<String>) -> Result<Self, TokenError> {
        let secret = secret.into();
        if secret.len() < MIN_SECRET_LEN {
            return Err(TokenError::WeakSecret {
                min: MIN_SECRET_LEN,
                actual: secret.len(),
            });
        }
        Ok(Self(Arc::from(secret)))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl std::fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningSecret(<redacted>)")
    }
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub secret: SigningSecret,
    pub issuer: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
}

impl TokenConfig {
    pub fn new(secret: SigningSecret) -> Self {
        Self {
            secret,
            issuer: DEFAULT_ISSUER.to_string(),
            access_token_ttl: Duration::hours(24),
            refresh_token_ttl: Duration::days(7),
        }
    }

    pub fn from_auth_config(config: &AuthConfig) -> Result<Self, TokenError> {
        let access_token_ttl = Duration::try_hours(config.access_token_ttl_hours).ok_or(
            TokenError::LifetimeOutOfRange(format!("{} hours", config.access_token_ttl_hours)),
        )?;
        let refresh_token_ttl = Duration::try_days(config.refresh_token_ttl_days).ok_or(
            TokenError::LifetimeOutOfRange(format!("{} days", config.refresh_token_ttl_days)),
        )?;

        Ok(Self {
            secret: SigningSecret::new(config.jwt_secret.clone())?,
            issuer: config.issuer.clone(),
            access_token_ttl,
            refresh_token_ttl,
        })
    }
}

/// Issues and verifies HS256 JWTs. Holds no mutable state.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    access_token_ttl: Duration,
    refresh_token_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    pub fn new(config: TokenConfig, clock: Arc<dyn Clock>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the injected clock in `verify`.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.set_issuer(&[config.issuer.as_str()]);

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            issuer: config.issuer,
            access_token_ttl: config.access_token_ttl,
            refresh_token_ttl: config.refresh_token_ttl,
            clock,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn ttl_for(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_token_ttl,
            TokenKind::Refresh => self.refresh_token_ttl,
        }
    }

    pub fn access_token_ttl_seconds(&self) -> i64 {
        self.access_token_ttl.num_seconds()
    }

    pub fn issue(
        &self,
        subject: &TokenSubject,
        kind: TokenKind,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        self.issue_claims(subject, kind, now, ttl).map(|(token, _)| token)
    }

    /// Two independent tokens with the configured lifetimes. Nothing binds
    /// the refresh token to the access token it was issued with.
    pub fn issue_access_and_refresh(
        &self,
        subject: &TokenSubject,
        now: DateTime<Utc>,
    ) -> Result<TokenPair, TokenError> {
        let (access_token, access_claims) =
            self.issue_claims(subject, TokenKind::Access, now, self.access_token_ttl)?;
        let (refresh_token, refresh_claims) =
            self.issue_claims(subject, TokenKind::Refresh, now, self.refresh_token_ttl)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_claims,
            refresh_claims,
        })
    }

    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<AccessClaims, AuthError> {
        let token = strip_scheme(token);
        parse_structure(token)?;

        let claims = decode::<AccessClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    AuthError::BadSignature
                }
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Malformed,
            })?;

        if claims.is_expired_at(now) {
            return Err(AuthError::Expired);
        }

        Ok(claims)
    }

    fn issue_claims(
        &self,
        subject: &TokenSubject,
        kind: TokenKind,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<(String, AccessClaims), TokenError> {
        if !subject.user_id.is_valid() || subject.email.trim().is_empty() {
            return Err(TokenError::MissingSubject);
        }

        let lifetime = ttl.num_seconds();
        if lifetime <= 0 {
            return Err(TokenError::InvalidLifetime(lifetime));
        }

        let iat = now.timestamp();
        let claims = AccessClaims {
            user_id: subject.user_id,
            email: subject.email.clone(),
            exp: iat + lifetime,
            iat,
            iss: self.issuer.clone(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)?;

        tracing::debug!(
            user_id = %subject.user_id,
            kind = %kind,
            exp = claims.exp,
            "issued token"
        );

        Ok((token, claims))
    }
}

/// Three segments, a JOSE header, and a payload carrying the full claim set.
/// Runs before the signature check so an unreadable token is `Malformed`
/// whatever its signature segment holds.
fn parse_structure(token: &str) -> Result<(), AuthError> {
    let mut segments = token.split('.');
    let (Some(_), Some(payload), Some(_), None) =
        (segments.next(), segments.next(), segments.next(), segments.next())
    else {
        return Err(AuthError::Malformed);
    };

    decode_header(token).map_err(|_| AuthError::Malformed)?;

    let payload = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| AuthError::Malformed)?;
    serde_json::from_slice::<AccessClaims>(&payload)
        .map(|_| ())
        .map_err(|_| AuthError::Malformed)
}

/// Drops a leading `Bearer` scheme, matched case-insensitively.
fn strip_scheme(token: &str) -> &str {
    let token = token.trim();
    match token.split_once(char::is_whitespace) {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim_start(),
        _ => token,
    }
}

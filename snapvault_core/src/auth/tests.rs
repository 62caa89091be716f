use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use tempfile::TempDir;

use crate::auth::{
    AuthError, AuthService, Clock, CreateUserRequest, CredentialStore, LoginOutcome, LoginRequest,
    ManualClock, SigningSecret, TokenConfig, TokenError, TokenKind, TokenService, TokenSubject,
    UserId, UserRepository,
};
use crate::database::{get_database_pool, run_migrations};
use crate::error::AppError;

const SECRET: &str = "auth-tests-secret-0123456789abcdef0123";

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 2, 1, 8, 30, 0).unwrap(),
    ))
}

fn token_service(secret: &str, clock: Arc<ManualClock>) -> TokenService {
    TokenService::new(TokenConfig::new(SigningSecret::new(secret).unwrap()), clock)
}

fn subject(id: i64) -> TokenSubject {
    TokenSubject {
        user_id: UserId::new(id),
        email: format!("user{}@example.com", id),
    }
}

async fn auth_service() -> (AuthService, Arc<ManualClock>, TempDir) {
    let dir = TempDir::new().unwrap();
    let database_url = format!("sqlite:{}", dir.path().join("auth.db").display());
    let pool = get_database_pool(&database_url, 2).await.unwrap();
    run_migrations(&pool).await.unwrap();

    let clock = clock();
    let service = AuthService::new(
        Arc::new(UserRepository::new(pool)),
        Arc::new(token_service(SECRET, clock.clone())),
    );
    (service, clock, dir)
}

fn register_request(email: &str) -> CreateUserRequest {
    CreateUserRequest {
        email: email.to_string(),
        password: "correct horse battery".to_string(),
    }
}

/// Replaces one character of segment `segment` at `index`.
fn tamper(token: &str, segment: usize, index: usize) -> String {
    let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
    let mut chars: Vec<char> = parts[segment].chars().collect();
    chars[index] = if chars[index] == 'A' { 'B' } else { 'A' };
    parts[segment] = chars.into_iter().collect();
    parts.join(".")
}

#[test]
fn test_issue_then_verify_returns_subject() {
    let clock = clock();
    let tokens = token_service(SECRET, clock.clone());
    let now = clock.now();

    for id in [1, 42, i64::MAX] {
        let token = tokens
            .issue(&subject(id), TokenKind::Access, now, Duration::minutes(15))
            .unwrap();
        let claims = tokens.verify(&token, now).unwrap();
        assert_eq!(claims.subject(), UserId::new(id));
        assert_eq!(claims.iss, "snapvault");
        assert_eq!(claims.iat, now.timestamp());
        assert_eq!(claims.exp, now.timestamp() + 15 * 60);
        assert!(claims.expires_at().unwrap() > claims.issued_at().unwrap());
    }
}

#[test]
fn test_expiry_boundary() {
    let clock = clock();
    let tokens = token_service(SECRET, clock.clone());
    let now = clock.now();
    let ttl = Duration::hours(1);
    let token = tokens.issue(&subject(7), TokenKind::Access, now, ttl).unwrap();

    assert!(tokens.verify(&token, now + ttl - Duration::seconds(1)).is_ok());
    assert_eq!(tokens.verify(&token, now + ttl), Err(AuthError::Expired));
    assert_eq!(
        tokens.verify(&token, now + ttl + Duration::days(1)),
        Err(AuthError::Expired)
    );
}

#[test]
fn test_payload_is_the_documented_claim_set() {
    let clock = clock();
    let tokens = token_service(SECRET, clock.clone());
    let token = tokens
        .issue(&subject(42), TokenKind::Access, clock.now(), Duration::hours(24))
        .unwrap();

    assert_eq!(token.split('.').count(), 3);
    let header = jsonwebtoken::decode_header(&token).unwrap();
    assert_eq!(header.alg, jsonwebtoken::Algorithm::HS256);
}

#[test]
fn test_tampering_never_verifies() {
    let clock = clock();
    let tokens = token_service(SECRET, clock.clone());
    let now = clock.now();
    let token = tokens
        .issue(&subject(42), TokenKind::Access, now, Duration::hours(1))
        .unwrap();

    let segments: Vec<&str> = token.split('.').collect();
    for segment in [1, 2] {
        for index in 0..segments[segment].len() {
            let forged = tamper(&token, segment, index);
            if forged == token {
                continue;
            }
            match tokens.verify(&forged, now) {
                Err(AuthError::BadSignature) | Err(AuthError::Malformed) => {}
                other => panic!("segment {} index {} verified as {:?}", segment, index, other),
            }
        }
    }
}

#[test]
fn test_wrong_secret_is_bad_signature() {
    let clock = clock();
    let issuer = token_service(SECRET, clock.clone());
    let verifier = token_service("a-different-secret-0123456789abcdef", clock.clone());
    let token = issuer
        .issue(&subject(1), TokenKind::Access, clock.now(), Duration::hours(1))
        .unwrap();

    assert_eq!(verifier.verify(&token, clock.now()), Err(AuthError::BadSignature));
}

#[test]
fn test_malformed_inputs() {
    let clock = clock();
    let tokens = token_service(SECRET, clock.clone());
    let now = clock.now();

    for input in ["", "Bearer ", "garbage", "a.b", "a.b.c", "Bearer not.a.jwt"] {
        assert_eq!(tokens.verify(input, now), Err(AuthError::Malformed), "{:?}", input);
    }
}

#[test]
fn test_unreadable_payload_is_malformed_before_signature() {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    let clock = clock();
    let tokens = token_service(SECRET, clock.clone());
    let now = clock.now();
    let token = tokens
        .issue(&subject(42), TokenKind::Access, now, Duration::hours(1))
        .unwrap();
    let segments: Vec<&str> = token.split('.').collect();
    let with_payload = |payload: &str| format!("{}.{}.{}", segments[0], payload, segments[2]);

    let missing_claims = URL_SAFE_NO_PAD.encode(br#"{"user_id":42}"#);
    for payload in ["!!!not-base64!!!", "bm90LWpzb24", missing_claims.as_str()] {
        assert_eq!(
            tokens.verify(&with_payload(payload), now),
            Err(AuthError::Malformed),
            "{:?}",
            payload
        );
    }

    assert_eq!(
        tokens.verify(&format!("{}.{}.{}.x", segments[0], segments[1], segments[2]), now),
        Err(AuthError::Malformed)
    );

    // A readable payload with a foreign signature is still a signature failure.
    let other = URL_SAFE_NO_PAD.encode(
        serde_json::to_vec(&serde_json::json!({
            "user_id": 7,
            "email": "user7@example.com",
            "exp": now.timestamp() + 3600,
            "iat": now.timestamp(),
            "iss": "snapvault",
        }))
        .unwrap(),
    );
    assert_eq!(tokens.verify(&with_payload(&other), now), Err(AuthError::BadSignature));
}

#[test]
fn test_scheme_prefix_is_optional_and_case_insensitive() {
    let clock = clock();
    let tokens = token_service(SECRET, clock.clone());
    let now = clock.now();
    let token = tokens
        .issue(&subject(3), TokenKind::Access, now, Duration::hours(1))
        .unwrap();

    for presented in [
        token.clone(),
        format!("Bearer {}", token),
        format!("bearer {}", token),
        format!("BEARER  {}", token),
    ] {
        assert_eq!(tokens.verify(&presented, now).unwrap().subject(), UserId::new(3));
    }
}

#[test]
fn test_refresh_outlives_access() {
    let clock = clock();
    let tokens = token_service(SECRET, clock.clone());
    let pair = tokens
        .issue_access_and_refresh(&subject(9), clock.now())
        .unwrap();

    assert!(pair.refresh_claims.exp > pair.access_claims.exp);
    assert_eq!(pair.access_claims.exp - pair.access_claims.iat, 24 * 3600);
    assert_eq!(pair.refresh_claims.exp - pair.refresh_claims.iat, 7 * 24 * 3600);

    // Both verify on their own; nothing ties them together.
    assert!(tokens.verify(&pair.access_token, clock.now()).is_ok());
    assert!(tokens.verify(&pair.refresh_token, clock.now()).is_ok());
}

#[test]
fn test_issue_without_subject_is_an_error() {
    let clock = clock();
    let tokens = token_service(SECRET, clock.clone());
    let now = clock.now();

    let no_id = TokenSubject {
        user_id: UserId::new(0),
        email: "x@example.com".to_string(),
    };
    assert!(matches!(
        tokens.issue(&no_id, TokenKind::Access, now, Duration::hours(1)),
        Err(TokenError::MissingSubject)
    ));

    let no_email = TokenSubject {
        user_id: UserId::new(5),
        email: "  ".to_string(),
    };
    assert!(matches!(
        tokens.issue(&no_email, TokenKind::Access, now, Duration::hours(1)),
        Err(TokenError::MissingSubject)
    ));

    assert!(matches!(
        tokens.issue(&subject(5), TokenKind::Access, now, Duration::zero()),
        Err(TokenError::InvalidLifetime(0))
    ));
}

#[tokio::test]
async fn test_register_and_login() {
    let (service, _clock, _dir) = auth_service().await;

    let user = service
        .register_user(register_request("Alice@Example.com"))
        .await
        .unwrap();
    assert_eq!(user.email, "alice@example.com");

    let outcome = service
        .login(&LoginRequest {
            email: "alice@example.com".to_string(),
            password: "correct horse battery".to_string(),
        })
        .await
        .unwrap();
    let LoginOutcome::Authenticated(logged_in) = outcome else {
        panic!("expected successful login");
    };
    assert_eq!(logged_in.id, user.id);

    let response = service.issue_session(&logged_in).unwrap();
    assert!(response.success);
    assert_eq!(response.token_type, "Bearer");
    assert_eq!(response.expires_in, 86400);
    assert_eq!(response.user, user);
}

#[tokio::test]
async fn test_login_rejections() {
    let (service, _clock, _dir) = auth_service().await;
    service.register_user(register_request("bob@example.com")).await.unwrap();

    for (email, password) in [
        ("bob@example.com", "wrong password"),
        ("nobody@example.com", "correct horse battery"),
        ("", ""),
    ] {
        let outcome = service
            .login(&LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            })
            .await
            .unwrap();
        assert!(matches!(outcome, LoginOutcome::InvalidCredentials));
    }
}

#[tokio::test]
async fn test_registration_validation() {
    let (service, _clock, _dir) = auth_service().await;

    assert!(service.register_user(register_request("not-an-email")).await.is_err());
    assert!(service
        .register_user(CreateUserRequest {
            email: "short@example.com".to_string(),
            password: "abc".to_string(),
        })
        .await
        .is_err());

    service.register_user(register_request("dup@example.com")).await.unwrap();
    let duplicate = service.register_user(register_request("DUP@example.com")).await;
    assert!(matches!(duplicate, Err(AppError::BadRequest(_))));
}

#[tokio::test]
async fn test_ensure_user_is_idempotent() {
    let (service, _clock, _dir) = auth_service().await;

    let first = service.ensure_user("admin@example.com", "bootstrap-password").await.unwrap();
    let second = service.ensure_user("admin@example.com", "bootstrap-password").await.unwrap();
    assert_eq!(first.id, second.id);
}

#[tokio::test]
async fn test_authenticate_and_resolve_user() {
    let (service, clock, _dir) = auth_service().await;
    let summary = service.register_user(register_request("carol@example.com")).await.unwrap();
    let user = service.credentials().find_by_id(summary.id).await.unwrap().unwrap();
    let session = service.issue_session(&user).unwrap();

    let header = format!("Bearer {}", session.access_token);
    assert_eq!(service.authenticate(&header).await.unwrap().id, summary.id);
    assert_eq!(
        service.resolve_user(&header, clock.now()).await.unwrap(),
        Some(summary.id)
    );

    clock.advance(Duration::hours(24));
    assert!(matches!(
        service.authenticate(&header).await,
        Err(AppError::Unauthorized(AuthError::Expired))
    ));
}

#[tokio::test]
async fn test_deleted_subject() {
    let (service, clock, _dir) = auth_service().await;
    let summary = service.register_user(register_request("dave@example.com")).await.unwrap();
    let user = service.credentials().find_by_id(summary.id).await.unwrap().unwrap();
    let session = service.issue_session(&user).unwrap();

    service.delete_user(summary.id).await.unwrap();

    assert_eq!(
        service.resolve_user(&session.access_token, clock.now()).await.unwrap(),
        None
    );
    assert!(matches!(
        service.authenticate(&session.access_token).await,
        Err(AppError::Unauthorized(AuthError::SubjectMissing))
    ));
}

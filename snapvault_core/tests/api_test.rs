use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, TimeZone, Utc};
use serde_json::{json, Value};
use snapvault_core::auth::ManualClock;
use snapvault_core::{create_app_with_config, AppConfig, AppState, StorageBackend};
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "snapvault-test-boundary";
const EMAIL: &str = "owner@example.com";
const PASSWORD: &str = "correct horse battery";

struct TestApp {
    router: Router,
    clock: Arc<ManualClock>,
    _dir: TempDir,
}

impl TestApp {
    async fn new() -> Self {
        let dir = TempDir::new().unwrap();

        let mut config = AppConfig::default();
        config.database.url = format!("sqlite:{}", dir.path().join("api.db").display());
        config.database.max_connections = 2;
        config.auth.jwt_secret = "api-test-secret-0123456789abcdef0123".to_string();
        config.auth.bootstrap_email = Some(EMAIL.to_string());
        config.auth.bootstrap_password = Some(PASSWORD.to_string());
        config.files.backend = StorageBackend::Memory;
        config.validate().unwrap();

        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 4, 2, 10, 0, 0).unwrap(),
        ));
        let state = AppState::from_config(&config, clock.clone()).await.unwrap();
        state.ensure_bootstrap_account(&config).await.unwrap();
        state
            .auth_service
            .ensure_user("other@example.com", PASSWORD)
            .await
            .unwrap();

        Self {
            router: create_app_with_config(state, &config),
            clock,
            _dir: dir,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>, axum::http::HeaderMap) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec(), headers)
    }

    async fn send_json(&self, request: Request<Body>) -> (StatusCode, Value) {
        let (status, body, _) = self.send(request).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn login(&self, email: &str) -> String {
        let (status, body) = self
            .send_json(json_request(
                Method::POST,
                "/sessions",
                json!({ "email": email, "password": PASSWORD }),
            ))
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["access_token"].as_str().unwrap().to_string()
    }

    async fn upload(&self, token: &str, filename: &str, content_type: &str, data: &[u8]) -> (StatusCode, Value) {
        self.send_json(upload_request(token, multipart_body("file", filename, content_type, data)))
            .await
    }
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn authed(method: Method, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

fn multipart_body(field: &str, filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload_request(token: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/files")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_login_upload_list() {
    let app = TestApp::new().await;

    let (status, session) = app
        .send_json(json_request(
            Method::POST,
            "/sessions",
            json!({ "email": "Owner@Example.com", "password": PASSWORD }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["success"], true);
    assert_eq!(session["user"]["email"], EMAIL);
    assert_eq!(session["token_type"], "Bearer");
    assert_eq!(session["expires_in"], 86400);
    assert!(session["refresh_token"].is_string());
    let token = session["access_token"].as_str().unwrap();

    let (status, created) = app.upload(token, "a.txt", "text/plain", b"hi").await;
    assert_eq!(status, StatusCode::CREATED, "{}", created);
    assert_eq!(created["filename"], "a.txt");
    assert_eq!(created["size"], 2);
    assert_eq!(created["content_type"], "text/plain");
    assert!(created["id"].is_i64());
    assert!(created["upload_timestamp"].is_string());

    let (status, files) = app.send_json(authed(Method::GET, "/api/files", token)).await;
    assert_eq!(status, StatusCode::OK);
    let files = files.as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["filename"], "a.txt");
    assert_eq!(files[0]["id"], created["id"]);
    assert!(files[0]["download_url"]
        .as_str()
        .unwrap()
        .ends_with("?disposition=attachment"));
    assert!(files[0]["preview_url"].is_null());
}

#[tokio::test]
async fn test_images_get_preview_and_blobs_are_served() {
    let app = TestApp::new().await;
    let token = app.login(EMAIL).await;

    let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    let (status, _) = app.upload(&token, "Cat.PNG", "image/png", &png).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, files) = app.send_json(authed(Method::GET, "/api/files", &token)).await;
    let file = &files[0];
    let preview = file["preview_url"].as_str().unwrap();
    assert!(preview.starts_with("/blobs/"));
    assert!(preview.ends_with("?disposition=inline"));

    let download = file["download_url"].as_str().unwrap();
    let (status, body, headers) = app
        .send(Request::builder().uri(download).body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, png.to_vec());
    assert_eq!(headers[header::CONTENT_TYPE], "image/png");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"Cat.PNG\""
    );

    let (status, _, _) = app
        .send(Request::builder().uri("/blobs/2026/04/missing.png").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_rejections_name_the_reason() {
    let app = TestApp::new().await;
    let token = app.login(EMAIL).await;

    let (status, body) = app.upload(&token, "photo.bmp", "image/bmp", b"BM....").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "File type not allowed. Allowed types: .jpg, .jpeg, .png, .gif, .svg, .txt, .md, .csv"
    );

    let (status, body) = app.upload(&token, "empty.txt", "text/plain", b"").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file provided");

    let (status, body) = app
        .send_json(upload_request(
            &token,
            multipart_body("attachment", "a.txt", "text/plain", b"hi"),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file provided");

    let big = vec![b'x'; 2 * 1024 * 1024 + 1];
    let (status, body) = app.upload(&token, "big.txt", "text/plain", &big).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "File is too large. Maximum size allowed is 2MB.");

    let exact = vec![b'x'; 2 * 1024 * 1024];
    let (status, _) = app.upload(&token, "exact.txt", "text/plain", &exact).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, files) = app.send_json(authed(Method::GET, "/api/files", &token)).await;
    assert_eq!(files.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unauthorized_requests_share_one_response() {
    let app = TestApp::new().await;
    let token = app.login(EMAIL).await;

    let missing = Request::builder().uri("/api/files").body(Body::empty()).unwrap();
    let forged = authed(Method::GET, "/api/files", &format!("{}x", token));
    let garbage = authed(Method::GET, "/api/files", "garbage");
    let upload_without_token = Request::builder()
        .method(Method::POST)
        .uri("/api/files")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body("file", "a.txt", "text/plain", b"hi")))
        .unwrap();

    for request in [missing, forged, garbage, upload_without_token] {
        let (status, body) = app.send_json(request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid or expired token");
    }
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let app = TestApp::new().await;
    let token = app.login(EMAIL).await;

    app.clock.advance(Duration::hours(24) - Duration::seconds(1));
    let (status, _) = app.send_json(authed(Method::GET, "/api/files", &token)).await;
    assert_eq!(status, StatusCode::OK);

    app.clock.advance(Duration::seconds(1));
    let (status, body) = app.send_json(authed(Method::GET, "/api/files", &token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid or expired token");
}

#[tokio::test]
async fn test_owners_never_see_each_other() {
    let app = TestApp::new().await;
    let owner = app.login(EMAIL).await;
    let other = app.login("other@example.com").await;

    let (status, _) = app.upload(&owner, "mine.csv", "text/csv", b"a,b\n1,2").await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, files) = app.send_json(authed(Method::GET, "/api/files", &other)).await;
    assert!(files.as_array().unwrap().is_empty());

    let (_, files) = app
        .send_json(authed(Method::GET, "/api/files?content_type=text/csv", &other))
        .await;
    assert!(files.as_array().unwrap().is_empty());

    let (_, files) = app
        .send_json(authed(Method::GET, "/api/files?content_type=text/csv", &owner))
        .await;
    assert_eq!(files.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_session_endpoints() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send_json(json_request(
            Method::POST,
            "/sessions",
            json!({ "email": EMAIL, "password": "wrong" }),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "success": false, "error": "Invalid email or password" }));

    let (status, body) = app
        .send_json(Request::builder().uri("/sessions").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "success": false, "error": "Not authenticated" }));

    let token = app.login(EMAIL).await;
    let (status, body) = app.send_json(authed(Method::GET, "/sessions", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], EMAIL);
    assert!(body["access_token"].is_string());

    let (status, body) = app.send_json(authed(Method::DELETE, "/sessions", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "message": "Logged out successfully" }));

    // No revocation: the token keeps working after logout.
    let (status, _) = app.send_json(authed(Method::GET, "/api/files", &token)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_health_and_rules() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send_json(Request::builder().uri("/up").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, rules) = app
        .send_json(Request::builder().uri("/api/files/rules").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rules["max_size_bytes"], 2_097_152);
    assert_eq!(rules["allowed_extensions"].as_array().unwrap().len(), 8);
    assert!(rules["allowed_content_types"]
        .as_array()
        .unwrap()
        .contains(&json!("text/markdown")));
}

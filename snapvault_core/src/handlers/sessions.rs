use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::auth::{LoginOutcome, LoginRequest, User};
use crate::error::Result;
use crate::middleware::auth::extract_bearer;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SessionFailure {
    pub success: bool,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

fn failure(status: StatusCode, error: &str) -> Response {
    (
        status,
        Json(SessionFailure {
            success: false,
            error: error.to_string(),
        }),
    )
        .into_response()
}

fn session_payload(state: &AppState, user: &User) -> Response {
    match state.auth_service.issue_session(user) {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            tracing::error!(user_id = %user.id, "Token issue failed: {}", e);
            failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to generate authentication token",
            )
        }
    }
}

/// `POST /sessions`
pub async fn create_session(
    State(state): State<AppState>,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::debug!("Unreadable login body: {}", rejection.body_text());
            LoginRequest::default()
        }
    };

    match state.auth_service.login(&request).await? {
        LoginOutcome::Authenticated(user) => Ok(session_payload(&state, &user)),
        LoginOutcome::InvalidCredentials => Ok(failure(
            StatusCode::UNAUTHORIZED,
            "Invalid email or password",
        )),
    }
}

/// `GET /sessions`: the bearer's user with a fresh token pair.
pub async fn show_session(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let token = match extract_bearer(&headers) {
        Ok(token) => token,
        Err(_) => return failure(StatusCode::UNAUTHORIZED, "Not authenticated"),
    };

    match state.auth_service.authenticate(token).await {
        Ok(user) => session_payload(&state, &user),
        Err(e) => {
            tracing::debug!("Session lookup rejected: {}", e);
            failure(StatusCode::UNAUTHORIZED, "Not authenticated")
        }
    }
}

/// `DELETE /sessions`. Tokens stay valid until they expire.
pub async fn destroy_session() -> Json<MessageResponse> {
    Json(MessageResponse {
        success: true,
        message: "Logged out successfully".to_string(),
    })
}

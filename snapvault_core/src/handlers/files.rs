use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use crate::{
    error::{AppError, Result},
    files::{Disposition, FileListQuery, FileResponse, UploadCandidate, UploadResponse, UploadRules},
    middleware::auth::AuthUser,
    AppState,
};

/// `GET /api/files`. The owner always comes from the token.
pub async fn list_files(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<FileListQuery>,
) -> Result<Json<Vec<FileResponse>>> {
    let files = state
        .file_registry
        .list_for_with(auth_user.user_id, &query)
        .await?;

    Ok(Json(
        files
            .iter()
            .map(|file| state.file_registry.describe(file))
            .collect(),
    ))
}

/// `POST /api/files` with a multipart `file` field.
pub async fn upload_file(
    State(state): State<AppState>,
    auth_user: AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    let mut candidate: Option<UploadCandidate> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::BadRequest(format!("Failed to read multipart field: {}", e))
    })? {
        if field.name() != Some("file") {
            continue;
        }

        // A plain form value named `file` is not an upload.
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };

        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        let data = field.bytes().await.map_err(|e| {
            AppError::BadRequest(format!("Failed to read file data: {}", e))
        })?;

        candidate = Some(UploadCandidate::new(filename, content_type, data.to_vec()));
        break;
    }

    let file = state
        .file_registry
        .create(auth_user.user_id, candidate.as_ref())
        .await?;

    Ok((StatusCode::CREATED, Json(UploadResponse::from(&file))))
}

/// `GET /api/files/rules`
pub async fn upload_rules(State(state): State<AppState>) -> Json<UploadRules> {
    Json(state.file_registry.rules())
}

#[derive(Debug, Default, Deserialize)]
pub struct BlobQuery {
    #[serde(default)]
    pub disposition: Disposition,
}

/// `GET /blobs/*key`
pub async fn serve_blob(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<BlobQuery>,
) -> Result<Response> {
    let (file, data) = state
        .file_registry
        .open_blob(&key)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

    let mut headers = HeaderMap::new();

    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&file.content_type)
            .unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );

    headers.insert(
        header::CONTENT_DISPOSITION,
        content_disposition(query.disposition, &file.filename)?,
    );

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );

    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("private, max-age=3600"),
    );

    Ok((StatusCode::OK, headers, data).into_response())
}

fn content_disposition(disposition: Disposition, filename: &str) -> Result<HeaderValue> {
    let safe_name: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_graphic() && c != '"' && c != '\\' || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();

    HeaderValue::from_str(&format!(
        "{}; filename=\"{}\"",
        disposition.as_str(),
        safe_name
    ))
    .map_err(|e| AppError::Other(e.into()))
}

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use super::{files, health, sessions};
use crate::middleware::auth::require_bearer_auth;
use crate::AppState;

pub fn create_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/api/files", get(files::list_files).post(files::upload_file))
        .route_layer(middleware::from_fn_with_state(state, require_bearer_auth));

    Router::new()
        .route("/up", get(health::handle_up))
        .route(
            "/sessions",
            post(sessions::create_session)
                .get(sessions::show_session)
                .delete(sessions::destroy_session),
        )
        .route("/api/files/rules", get(files::upload_rules))
        .route("/blobs/*key", get(files::serve_blob))
        .merge(protected)
}

pub mod auth;
pub mod convert;
pub mod error;
pub mod flash;
pub mod messages;
pub mod middleware;
pub mod pins;
pub mod search;
pub mod social;
pub mod storage;
pub mod views;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::error;

use pinboard_db::Database;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::{load_session, require_auth};
use crate::storage::UPLOADS_URL_PREFIX;

/// Whole-request cap for pin uploads.
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Run a blocking store call off the async runtime.
pub(crate) async fn with_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.into())
        })?
        .map_err(ApiError::from)
}

pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(auth::root))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/signup", get(auth::signup_page).post(auth::signup));

    let protected_routes = Router::new()
        .route("/logout", get(auth::logout))
        .route("/dashboard", get(pins::dashboard))
        .route(
            "/upload",
            post(pins::upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/profile", get(pins::profile))
        .route("/pin/{id}/like", post(social::toggle_like))
        .route("/pin/{id}/save", post(social::toggle_save))
        .route("/messages/send", post(messages::send_message))
        .route("/api/messages_for/{user_id}", get(messages::messages_for))
        .route("/api/contacts", get(messages::contacts))
        .route("/api/pins", get(pins::feed))
        .route("/api/search_users", get(search::search_users))
        .route_layer(axum::middleware::from_fn(require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .nest_service(UPLOADS_URL_PREFIX, ServeDir::new(state.uploads.dir()))
        .nest_service("/static", ServeDir::new(&state.static_dir))
        .layer(axum::middleware::from_fn_with_state(state.clone(), load_session))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

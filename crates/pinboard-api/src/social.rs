use axum::{
    Extension, Json,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{CookieJar, WithRejection};
use tracing::debug;

use pinboard_types::api::{LikeToggleResponse, SaveToggleResponse};
use pinboard_types::models::CurrentUser;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::Ajax;
use crate::with_db;

/// POST /pin/{id}/like
pub async fn toggle_like(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    WithRejection(Path(pin_id), _): WithRejection<Path<i64>, ApiError>,
    Ajax(ajax): Ajax,
    jar: CookieJar,
) -> Response {
    let uid = user.id;
    let result = with_db(&state, move |db| {
        if !db.pin_exists(pin_id)? {
            return Ok(None);
        }
        db.toggle_like(uid, pin_id).map(Some)
    })
    .await
    .and_then(|r| r.ok_or_else(|| ApiError::not_found("Pin not found.")));

    match result {
        Ok((liked, like_count)) => {
            debug!("User {} {} pin {}", user.username, if liked { "liked" } else { "unliked" }, pin_id);
            respond(ajax, Json(LikeToggleResponse { ok: true, liked, like_count }))
        }
        Err(e) if ajax => e.into_response(),
        Err(e) => e.into_flash_redirect(jar, "/dashboard"),
    }
}

/// POST /pin/{id}/save
pub async fn toggle_save(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    WithRejection(Path(pin_id), _): WithRejection<Path<i64>, ApiError>,
    Ajax(ajax): Ajax,
    jar: CookieJar,
) -> Response {
    let uid = user.id;
    let result = with_db(&state, move |db| {
        if !db.pin_exists(pin_id)? {
            return Ok(None);
        }
        db.toggle_save(uid, pin_id).map(Some)
    })
    .await
    .and_then(|r| r.ok_or_else(|| ApiError::not_found("Pin not found.")));

    match result {
        Ok(saved) => {
            debug!("User {} {} pin {}", user.username, if saved { "saved" } else { "unsaved" }, pin_id);
            respond(ajax, Json(SaveToggleResponse { ok: true, saved }))
        }
        Err(e) if ajax => e.into_response(),
        Err(e) => e.into_flash_redirect(jar, "/dashboard"),
    }
}

/// AJAX callers get the new state; plain form posts go back to the feed.
fn respond(ajax: bool, body: impl IntoResponse) -> Response {
    if ajax {
        body.into_response()
    } else {
        Redirect::to("/dashboard").into_response()
    }
}

use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, Uri, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::{debug, warn};

use pinboard_types::api::Claims;
use pinboard_types::models::{CurrentUser, Flash};

use crate::auth::{AppState, SESSION_COOKIE};
use crate::error::ApiError;
use crate::{flash, with_db};

/// Resolve the session cookie into `Option<CurrentUser>` and attach it to the
/// request. Runs on every route; a bad or stale cookie just means anonymous.
pub async fn load_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let current_user = match jar.get(SESSION_COOKIE) {
        Some(cookie) => resolve_session(&state, cookie.value()).await,
        None => None,
    };

    req.extensions_mut().insert(current_user);
    next.run(req).await
}

async fn resolve_session(state: &AppState, token: &str) -> Option<CurrentUser> {
    let claims = match decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.session_secret.as_bytes()),
        &Validation::default(),
    ) {
        Ok(data) => data.claims,
        Err(e) => {
            debug!("Ignoring invalid session cookie: {}", e);
            return None;
        }
    };

    let user_id = claims.sub;
    match with_db(state, move |db| db.get_user_by_id(user_id)).await {
        Ok(Some(user)) => Some(CurrentUser {
            id: user.id,
            username: user.username,
        }),
        Ok(None) => None,
        Err(e) => {
            warn!("Session lookup failed for user {}: {}", user_id, e);
            None
        }
    }
}

/// Gate for signed-in routes. Pages bounce to `/login` with a flash; JSON
/// callers get a 401 envelope. On success the bare `CurrentUser` is inserted
/// for handlers to extract.
pub async fn require_auth(jar: CookieJar, mut req: Request, next: Next) -> Response {
    let current_user = req.extensions().get::<Option<CurrentUser>>().cloned().flatten();

    match current_user {
        Some(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        None if is_ajax(req.headers(), req.uri()) => {
            ApiError::Unauthorized("Please log in to access this page.".into()).into_response()
        }
        None => {
            let jar = flash::push(jar, Flash::info("Please log in to access this page."));
            (jar, Redirect::to("/login")).into_response()
        }
    }
}

/// Whether the caller expects a JSON envelope rather than a page or redirect.
pub fn is_ajax(headers: &HeaderMap, uri: &Uri) -> bool {
    let requested_with = headers
        .get("x-requested-with")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"));

    let accepts_json = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json"));

    requested_with || accepts_json || uri.path().starts_with("/api/")
}

/// Extractor form of [`is_ajax`].
#[derive(Debug, Clone, Copy)]
pub struct Ajax(pub bool);

impl<S> FromRequestParts<S> for Ajax
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Ajax(is_ajax(&parts.headers, &parts.uri)))
    }
}

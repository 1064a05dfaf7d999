use axum::{
    Extension, Json,
    extract::{Query, State},
};
use axum_extra::extract::WithRejection;

use pinboard_types::api::{SearchQuery, SearchResponse};
use pinboard_types::models::CurrentUser;

use crate::auth::AppState;
use crate::convert::user_summary;
use crate::error::ApiError;
use crate::with_db;

const MAX_RESULTS: u32 = 10;

/// GET /api/search_users?q=: username substring lookup for the share and
/// new-chat pickers.
pub async fn search_users(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    WithRejection(Query(query), _): WithRejection<Query<SearchQuery>, ApiError>,
) -> Result<Json<SearchResponse>, ApiError> {
    let q = query.q.trim().to_string();
    if q.is_empty() {
        return Ok(Json(SearchResponse { ok: true, results: vec![] }));
    }

    let me = user.id;
    let rows = with_db(&state, move |db| db.search_users(&q, me, MAX_RESULTS)).await?;

    Ok(Json(SearchResponse {
        ok: true,
        results: rows.into_iter().map(user_summary).collect(),
    }))
}

use axum::{
    Extension, Json,
    extract::{Multipart, Query, State, multipart::MultipartError},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{CookieJar, WithRejection};
use serde::Serialize;
use tera::Context;
use tracing::{info, warn};

use pinboard_types::api::{DashboardQuery, FeedResponse, PinResponse, UploadResponse, UserSummary};
use pinboard_types::models::{CurrentUser, Flash};

use crate::auth::AppState;
use crate::convert::{message_response, pin_response, user_summary};
use crate::error::ApiError;
use crate::middleware::Ajax;
use crate::storage::image_extension;
use crate::{flash, views, with_db};

const MAX_TITLE_CHARS: usize = 140;

/// GET /dashboard: home feed, or the messages tab with `?tab=messages`.
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    WithRejection(Query(query), _): WithRejection<Query<DashboardQuery>, ApiError>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    let messages_tab = query.tab.as_deref() == Some("messages");
    let viewer = user.id;
    let chat_with = query.chat_with.filter(|_| messages_tab);

    let (pins, contacts, chat) = with_db(&state, move |db| {
        let pins = db.list_feed(viewer)?;
        let contacts = db.get_contacts(viewer)?;
        let chat = match chat_with {
            Some(other) => db
                .get_user_by_id(other)?
                .map(|u| -> anyhow::Result<_> { Ok((u.id, u.username, db.get_conversation(viewer, other)?)) })
                .transpose()?,
            None => None,
        };
        Ok((pins, contacts, chat))
    })
    .await?;

    if chat_with.is_some() && chat.is_none() {
        let jar = flash::push(jar, Flash::danger("User not found."));
        return Ok((jar, Redirect::to("/dashboard?tab=messages")).into_response());
    }

    let pins: Vec<PinResponse> = pins.into_iter().map(pin_response).collect();
    let contacts: Vec<UserSummary> = contacts.into_iter().map(user_summary).collect();

    let mut ctx = Context::new();
    ctx.insert("active_tab", if messages_tab { "messages" } else { "home" });
    ctx.insert("pins", &pins);
    ctx.insert("contacts", &contacts);

    match chat {
        Some((id, username, rows)) => {
            let messages: Vec<_> = rows.into_iter().map(|m| message_response(m, viewer)).collect();
            ctx.insert("chat_user", &UserSummary { id, username });
            ctx.insert("chat_user_id", &id);
            ctx.insert("messages", &messages);
        }
        None => {
            ctx.insert("chat_user", &None::<UserSummary>);
            ctx.insert("chat_user_id", &0);
            ctx.insert("messages", &Vec::<()>::new());
        }
    }

    let page = views::render_page(&state.templates, jar, "dashboard.html", ctx, Some(&user), vec![])?;
    Ok(page.into_response())
}

/// GET /api/pins: the feed as JSON for polling clients.
pub async fn feed(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<FeedResponse>, ApiError> {
    let viewer = user.id;
    let rows = with_db(&state, move |db| db.list_feed(viewer)).await?;

    Ok(Json(FeedResponse {
        ok: true,
        pins: rows.into_iter().map(pin_response).collect(),
    }))
}

#[derive(Serialize)]
struct ProfileSection {
    heading: &'static str,
    pins: Vec<PinResponse>,
}

/// GET /profile: the signed-in user's own, liked and saved pins.
pub async fn profile(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    let uid = user.id;
    let (own, liked, saved) = with_db(&state, move |db| {
        Ok((
            db.list_pins_by_author(uid, uid)?,
            db.list_liked_pins(uid)?,
            db.list_saved_pins(uid)?,
        ))
    })
    .await?;

    let section = |heading, rows: Vec<_>| ProfileSection {
        heading,
        pins: rows.into_iter().map(pin_response).collect(),
    };
    let sections = vec![
        section("Your pins", own),
        section("Liked", liked),
        section("Saved", saved),
    ];

    let mut ctx = Context::new();
    ctx.insert("sections", &sections);

    let page = views::render_page(&state.templates, jar, "profile.html", ctx, Some(&user), vec![])?;
    Ok(page.into_response())
}

/// Parsed multipart body of an upload.
#[derive(Default)]
struct UploadForm {
    title: String,
    description: String,
    image_name: String,
    image: Vec<u8>,
}

/// POST /upload: multipart pin upload.
pub async fn upload(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Ajax(ajax): Ajax,
    jar: CookieJar,
    multipart: Multipart,
) -> Response {
    match create_pin(&state, &user, multipart).await {
        Ok(pin) if ajax => (StatusCode::CREATED, Json(UploadResponse { ok: true, pin })).into_response(),
        Ok(_) => {
            let jar = flash::push(jar, Flash::success("Pin uploaded!"));
            (jar, Redirect::to("/dashboard")).into_response()
        }
        Err(e) if ajax => e.into_response(),
        Err(e) => e.into_flash_redirect(jar, "/dashboard"),
    }
}

async fn create_pin(state: &AppState, user: &CurrentUser, multipart: Multipart) -> Result<PinResponse, ApiError> {
    let form = read_upload_form(multipart).await?;

    let title = form.title.trim().to_string();
    if title.is_empty() || form.image_name.is_empty() {
        return Err(ApiError::validation("Title and image are required."));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(ApiError::validation("Title must be at most 140 characters."));
    }
    let ext = image_extension(&form.image_name).inspect_err(|_| {
        warn!("Rejected upload '{}' from {}", form.image_name, user.username);
    })?;

    let filename = state.uploads.save(&ext, &form.image).await?;

    let description = Some(form.description.trim().to_string()).filter(|d| !d.is_empty());
    let (uid, stored) = (user.id, filename.clone());
    let inserted = with_db(state, move |db| {
        let pin_id = db.create_pin(uid, &title, description.as_deref(), &stored)?;
        db.get_pin(pin_id, uid)?
            .ok_or_else(|| anyhow::anyhow!("pin {} vanished after insert", pin_id))
    })
    .await;

    let row = match inserted {
        Ok(row) => row,
        Err(e) => {
            state.uploads.delete(&filename).await;
            return Err(e);
        }
    };

    info!("User {} uploaded pin {} ({} bytes)", user.username, row.id, form.image.len());
    Ok(pin_response(row))
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => form.title = field.text().await.map_err(multipart_error)?,
            "description" => form.description = field.text().await.map_err(multipart_error)?,
            "image" => {
                form.image_name = field.file_name().unwrap_or_default().to_string();
                form.image = field.bytes().await.map_err(multipart_error)?.to_vec();
            }
            // `tags` and anything else are accepted and ignored.
            _ => {}
        }
    }

    Ok(form)
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge("Image is too large (max 5 MB).".into())
    } else {
        ApiError::validation(format!("Malformed upload: {}", err.body_text()))
    }
}

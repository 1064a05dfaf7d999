use axum::{
    Extension, Form, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{CookieJar, WithRejection};
use tracing::info;

use pinboard_types::api::{
    ContactsResponse, ConversationResponse, MessageResponse, SendMessageForm, SendMessageResponse,
};
use pinboard_types::models::{CurrentUser, Flash};

use crate::auth::AppState;
use crate::convert::{message_response, user_summary};
use crate::error::ApiError;
use crate::middleware::Ajax;
use crate::{flash, with_db};

/// A validated send request.
#[derive(Debug, PartialEq, Eq)]
struct Outgoing {
    recipient_id: i64,
    text: Option<String>,
    pin_id: Option<i64>,
}

/// POST /messages/send: direct message, optionally sharing a pin.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Ajax(ajax): Ajax,
    jar: CookieJar,
    WithRejection(Form(form), _): WithRejection<Form<SendMessageForm>, ApiError>,
) -> Response {
    let recipient_hint = form.recipient_id.trim().to_string();

    match send(&state, &user, form).await {
        Ok(message) if ajax => {
            (StatusCode::CREATED, Json(SendMessageResponse { ok: true, message })).into_response()
        }
        Ok(message) => {
            let jar = flash::push(jar, Flash::success("Message sent."));
            let to = format!("/dashboard?tab=messages&chat_with={}", message.recipient_id);
            (jar, Redirect::to(&to)).into_response()
        }
        Err(e) if ajax => e.into_response(),
        Err(e) => {
            let to = match recipient_hint.parse::<i64>() {
                Ok(id) => format!("/dashboard?tab=messages&chat_with={}", id),
                Err(_) => "/dashboard?tab=messages".to_string(),
            };
            e.into_flash_redirect(jar, &to)
        }
    }
}

async fn send(state: &AppState, user: &CurrentUser, form: SendMessageForm) -> Result<MessageResponse, ApiError> {
    let outgoing = validate(user.id, form)?;
    let sender = user.id;

    let row = with_db(state, move |db| {
        if db.get_user_by_id(outgoing.recipient_id)?.is_none() {
            return Ok(Err(ApiError::not_found("User not found.")));
        }
        if let Some(pin_id) = outgoing.pin_id {
            if !db.pin_exists(pin_id)? {
                return Ok(Err(ApiError::not_found("Pin not found.")));
            }
        }

        let id = db.insert_message(sender, outgoing.recipient_id, outgoing.text.as_deref(), outgoing.pin_id)?;
        let row = db
            .get_message(id)?
            .ok_or_else(|| anyhow::anyhow!("message {} vanished after insert", id))?;
        Ok(Ok(row))
    })
    .await??;

    info!(
        "User {} messaged user {}{}",
        user.username,
        row.recipient_id,
        if row.pin.is_some() { " (shared pin)" } else { "" }
    );
    Ok(message_response(row, sender))
}

fn validate(sender_id: i64, form: SendMessageForm) -> Result<Outgoing, ApiError> {
    let recipient = form.recipient_id.trim();
    if recipient.is_empty() {
        return Err(ApiError::validation("Recipient is required."));
    }
    let recipient_id: i64 = recipient
        .parse()
        .map_err(|_| ApiError::validation("Invalid recipient."))?;

    let pin_id = match form.pin_id.trim() {
        "" => None,
        raw => Some(raw.parse::<i64>().map_err(|_| ApiError::validation("Invalid pin."))?),
    };

    let text = Some(form.text.trim().to_string()).filter(|t| !t.is_empty());

    if recipient_id == sender_id {
        return Err(ApiError::validation("You cannot message yourself."));
    }
    if text.is_none() && pin_id.is_none() {
        return Err(ApiError::validation("Message cannot be empty."));
    }

    Ok(Outgoing { recipient_id, text, pin_id })
}

/// GET /api/messages_for/{user_id}: the conversation with one user, oldest first.
pub async fn messages_for(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    WithRejection(Path(other_id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<Json<ConversationResponse>, ApiError> {
    let me = user.id;
    let (other, rows) = with_db(&state, move |db| {
        let Some(other) = db.get_user_by_id(other_id)? else {
            return Ok(None);
        };
        Ok(Some((other, db.get_conversation(me, other_id)?)))
    })
    .await?
    .ok_or_else(|| ApiError::not_found("User not found."))?;

    Ok(Json(ConversationResponse {
        ok: true,
        other_user_id: other.id,
        other_username: other.username,
        messages: rows.into_iter().map(|m| message_response(m, me)).collect(),
    }))
}

/// GET /api/contacts: everyone the user has exchanged messages with.
pub async fn contacts(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ContactsResponse>, ApiError> {
    let me = user.id;
    let rows = with_db(&state, move |db| db.get_contacts(me)).await?;

    Ok(Json(ContactsResponse {
        ok: true,
        contacts: rows.into_iter().map(user_summary).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(recipient: &str, text: &str, pin: &str) -> SendMessageForm {
        SendMessageForm {
            recipient_id: recipient.into(),
            text: text.into(),
            pin_id: pin.into(),
        }
    }

    #[test]
    fn pin_only_message_is_valid() {
        let out = validate(1, form("2", "", "9")).unwrap();
        assert_eq!(out, Outgoing { recipient_id: 2, text: None, pin_id: Some(9) });
    }

    #[test]
    fn blank_text_and_no_pin_is_empty() {
        let err = validate(1, form("2", "   ", "")).unwrap_err();
        assert_eq!(err.to_string(), "Message cannot be empty.");
    }

    #[test]
    fn self_message_is_rejected() {
        let err = validate(3, form("3", "hi", "")).unwrap_err();
        assert_eq!(err.to_string(), "You cannot message yourself.");
    }

    #[test]
    fn bad_ids_are_validation_errors() {
        assert_eq!(validate(1, form("", "hi", "")).unwrap_err().to_string(), "Recipient is required.");
        assert_eq!(validate(1, form("abc", "hi", "")).unwrap_err().to_string(), "Invalid recipient.");
        assert_eq!(validate(1, form("2", "hi", "x")).unwrap_err().to_string(), "Invalid pin.");
    }

    #[test]
    fn text_is_trimmed() {
        let out = validate(1, form(" 2 ", "  hello ", "")).unwrap();
        assert_eq!(out.text.as_deref(), Some("hello"));
    }
}

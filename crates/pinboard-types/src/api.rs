use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// -- Session claims --

/// Claims carried by the signed session cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub exp: usize,
}

// -- Auth forms --

/// Fields are defaulted so a missing input surfaces as a flash message
/// instead of an extractor rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SignupForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

// -- Pins --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinResponse {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub image_url: String,
    pub author_id: i64,
    pub author_username: String,
    pub created_at: DateTime<Utc>,
    pub like_count: i64,
    pub liked: bool,
    pub saved: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeedResponse {
    pub ok: bool,
    pub pins: Vec<PinResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub ok: bool,
    pub pin: PinResponse,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LikeToggleResponse {
    pub ok: bool,
    pub liked: bool,
    pub like_count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SaveToggleResponse {
    pub ok: bool,
    pub saved: bool,
}

// -- Messages --

/// Raw form body of `POST /messages/send`. Empty strings mean "not given";
/// the handler parses the ids.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SendMessageForm {
    pub recipient_id: String,
    pub text: String,
    pub pin_id: String,
}

/// A pin attached to a chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedPin {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub image_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: i64,
    pub from_me: bool,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub text: Option<String>,
    pub pin: Option<SharedPin>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub ok: bool,
    pub message: MessageResponse,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub ok: bool,
    pub other_user_id: i64,
    pub other_username: String,
    pub messages: Vec<MessageResponse>,
}

// -- Users --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContactsResponse {
    pub ok: bool,
    pub contacts: Vec<UserSummary>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchQuery {
    pub q: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub ok: bool,
    pub results: Vec<UserSummary>,
}

// -- Pages --

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    pub tab: Option<String>,
    pub chat_with: Option<i64>,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
}

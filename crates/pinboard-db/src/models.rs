//! Rows as the store hands them to handlers.
//! Kept apart from the pinboard-types API models so the store stays free of HTTP shapes.

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: String,
}

pub struct UserSummaryRow {
    pub id: i64,
    pub username: String,
}

/// A pin joined with its author and annotated for one viewing user.
pub struct PinRow {
    pub id: i64,
    pub user_id: i64,
    pub author_username: String,
    pub title: String,
    pub description: Option<String>,
    pub image_filename: String,
    pub created_at: String,
    pub like_count: i64,
    pub liked: bool,
    pub saved: bool,
}

pub struct SharedPinRow {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub image_filename: String,
}

pub struct MessageRow {
    pub id: i64,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub text: Option<String>,
    pub created_at: String,
    pub pin: Option<SharedPinRow>,
}

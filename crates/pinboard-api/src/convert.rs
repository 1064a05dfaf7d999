//! Row → wire conversions.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

use pinboard_db::models::{MessageRow, PinRow, UserSummaryRow};
use pinboard_types::api::{MessageResponse, PinResponse, SharedPin, UserSummary};

use crate::storage::image_url;

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS.SSS" without timezone;
/// they are always UTC.
pub fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f").map(|ndt| ndt.and_utc()))
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

pub fn pin_response(row: PinRow) -> PinResponse {
    PinResponse {
        id: row.id,
        title: row.title,
        description: row.description,
        image_url: image_url(&row.image_filename),
        author_id: row.user_id,
        author_username: row.author_username,
        created_at: parse_timestamp(&row.created_at),
        like_count: row.like_count,
        liked: row.liked,
        saved: row.saved,
    }
}

pub fn message_response(row: MessageRow, viewer_id: i64) -> MessageResponse {
    MessageResponse {
        id: row.id,
        from_me: row.sender_id == viewer_id,
        sender_id: row.sender_id,
        recipient_id: row.recipient_id,
        text: row.text,
        pin: row.pin.map(|p| SharedPin {
            id: p.id,
            title: p.title,
            description: p.description,
            image_url: image_url(&p.image_filename),
        }),
        created_at: parse_timestamp(&row.created_at),
    }
}

pub fn user_summary(row: UserSummaryRow) -> UserSummary {
    UserSummary {
        id: row.id,
        username: row.username,
    }
}

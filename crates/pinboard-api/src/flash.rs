//! One-shot flash messages.
//!
//! Pending flashes live in a cookie as base64url-encoded JSON. A form handler
//! pushes onto the list before redirecting; the next rendered page takes the
//! list and clears the cookie.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use tracing::warn;

use pinboard_types::models::Flash;

pub const FLASH_COOKIE: &str = "pinboard_flash";

pub fn push(jar: CookieJar, flash: Flash) -> CookieJar {
    let mut pending = jar.get(FLASH_COOKIE).map(|c| decode(c.value())).unwrap_or_default();
    pending.push(flash);

    jar.add(
        Cookie::build((FLASH_COOKIE, encode(&pending)))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax),
    )
}

/// Remove and return every pending flash.
pub fn take(jar: CookieJar) -> (CookieJar, Vec<Flash>) {
    match jar.get(FLASH_COOKIE) {
        Some(cookie) => {
            let flashes = decode(cookie.value());
            (jar.remove(Cookie::build(FLASH_COOKIE).path("/")), flashes)
        }
        None => (jar, Vec::new()),
    }
}

fn encode(flashes: &[Flash]) -> String {
    // Serializing plain structs cannot fail.
    B64.encode(serde_json::to_vec(flashes).unwrap_or_default())
}

fn decode(raw: &str) -> Vec<Flash> {
    let parsed = B64
        .decode(raw)
        .map_err(anyhow::Error::from)
        .and_then(|bytes| serde_json::from_slice(&bytes).map_err(anyhow::Error::from));

    match parsed {
        Ok(flashes) => flashes,
        Err(e) => {
            warn!("Discarding unreadable flash cookie: {}", e);
            Vec::new()
        }
    }
}

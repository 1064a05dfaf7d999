use crate::models::{MessageRow, PinRow, SharedPinRow, UserRow, UserSummaryRow};
use crate::Database;
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

/// Pin columns plus per-viewer annotations. `?1` is always the viewer id.
const PIN_SELECT: &str = "
    SELECT p.id, p.user_id, u.username, p.title, p.description, p.image_filename, p.created_at,
           (SELECT COUNT(*) FROM likes l WHERE l.pin_id = p.id),
           EXISTS(SELECT 1 FROM likes l WHERE l.pin_id = p.id AND l.user_id = ?1),
           EXISTS(SELECT 1 FROM saved_pins s WHERE s.pin_id = p.id AND s.user_id = ?1)
    FROM pins p
    JOIN users u ON u.id = p.user_id";

const MESSAGE_SELECT: &str = "
    SELECT m.id, m.sender_id, m.recipient_id, m.text, m.created_at,
           p.id, p.title, p.description, p.image_filename
    FROM messages m
    LEFT JOIN pins p ON p.id = m.pin_id";

impl Database {
    // -- Users --

    pub fn create_user(&self, username: &str, email: &str, password_hash: &str) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (username, email, password_hash) VALUES (?1, ?2, ?3)",
                (username, email, password_hash),
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", id))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email = ?1", email))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username = ?1", username))
    }

    /// Case-insensitive substring match on username, excluding `exclude_id`.
    pub fn search_users(&self, query: &str, exclude_id: i64, limit: u32) -> Result<Vec<UserSummaryRow>> {
        let pattern = format!("%{}%", escape_like(query));
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, username FROM users
                 WHERE id != ?1 AND username LIKE ?2 ESCAPE '\\'
                 ORDER BY username COLLATE NOCASE
                 LIMIT ?3",
            )?;
            let rows = stmt
                .query_map(params![exclude_id, pattern, limit], map_user_summary)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Pins --

    pub fn create_pin(
        &self,
        user_id: i64,
        title: &str,
        description: Option<&str>,
        image_filename: &str,
    ) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO pins (user_id, title, description, image_filename) VALUES (?1, ?2, ?3, ?4)",
                params![user_id, title, description, image_filename],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn pin_exists(&self, pin_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row("SELECT 1 FROM pins WHERE id = ?1", [pin_id], |_| Ok(()))
                .optional()?;
            Ok(found.is_some())
        })
    }

    pub fn get_pin(&self, pin_id: i64, viewer_id: i64) -> Result<Option<PinRow>> {
        self.with_conn(|conn| {
            let sql = format!("{PIN_SELECT} WHERE p.id = ?2");
            let row = conn
                .query_row(&sql, params![viewer_id, pin_id], map_pin)
                .optional()?;
            Ok(row)
        })
    }

    /// Every pin, newest first.
    pub fn list_feed(&self, viewer_id: i64) -> Result<Vec<PinRow>> {
        self.with_conn(|conn| {
            let sql = format!("{PIN_SELECT} ORDER BY p.created_at DESC, p.id DESC");
            query_pins(conn, &sql, params![viewer_id])
        })
    }

    pub fn list_pins_by_author(&self, author_id: i64, viewer_id: i64) -> Result<Vec<PinRow>> {
        self.with_conn(|conn| {
            let sql = format!("{PIN_SELECT} WHERE p.user_id = ?2 ORDER BY p.created_at DESC, p.id DESC");
            query_pins(conn, &sql, params![viewer_id, author_id])
        })
    }

    /// Pins the user liked, most recently liked first.
    pub fn list_liked_pins(&self, user_id: i64) -> Result<Vec<PinRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{PIN_SELECT}
                 JOIN likes lk ON lk.pin_id = p.id AND lk.user_id = ?1
                 ORDER BY lk.created_at DESC, lk.id DESC"
            );
            query_pins(conn, &sql, params![user_id])
        })
    }

    /// Pins the user saved, most recently saved first.
    pub fn list_saved_pins(&self, user_id: i64) -> Result<Vec<PinRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{PIN_SELECT}
                 JOIN saved_pins sv ON sv.pin_id = p.id AND sv.user_id = ?1
                 ORDER BY sv.created_at DESC, sv.id DESC"
            );
            query_pins(conn, &sql, params![user_id])
        })
    }

    // -- Likes / saves --

    /// Toggle a like: removes it if present, inserts it otherwise.
    /// Returns (liked, like_count) after the change.
    ///
    /// The insert is a plain INSERT, so a duplicate racing in fails on the
    /// UNIQUE(user_id, pin_id) constraint instead of double-inserting.
    pub fn toggle_like(&self, user_id: i64, pin_id: i64) -> Result<(bool, i64)> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let liked = toggle_row(&tx, "likes", user_id, pin_id)?;
            let count: i64 =
                tx.query_row("SELECT COUNT(*) FROM likes WHERE pin_id = ?1", [pin_id], |r| r.get(0))?;
            tx.commit()?;
            Ok((liked, count))
        })
    }

    /// Toggle a save. Returns whether the pin is saved afterwards.
    pub fn toggle_save(&self, user_id: i64, pin_id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let saved = toggle_row(&tx, "saved_pins", user_id, pin_id)?;
            tx.commit()?;
            Ok(saved)
        })
    }

    // -- Messages --

    pub fn insert_message(
        &self,
        sender_id: i64,
        recipient_id: i64,
        text: Option<&str>,
        pin_id: Option<i64>,
    ) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO messages (sender_id, recipient_id, text, pin_id) VALUES (?1, ?2, ?3, ?4)",
                params![sender_id, recipient_id, text, pin_id],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_message(&self, id: i64) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!("{MESSAGE_SELECT} WHERE m.id = ?1");
            let row = conn.query_row(&sql, [id], map_message).optional()?;
            Ok(row)
        })
    }

    /// All messages exchanged between two users, oldest first.
    pub fn get_conversation(&self, user_a: i64, user_b: i64) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{MESSAGE_SELECT}
                 WHERE (m.sender_id = ?1 AND m.recipient_id = ?2)
                    OR (m.sender_id = ?2 AND m.recipient_id = ?1)
                 ORDER BY m.created_at ASC, m.id ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![user_a, user_b], map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Distinct users the given user has sent to or received from,
    /// most recent exchange first.
    pub fn get_contacts(&self, user_id: i64) -> Result<Vec<UserSummaryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.username
                 FROM users u
                 JOIN (
                     SELECT CASE WHEN sender_id = ?1 THEN recipient_id ELSE sender_id END AS other_id,
                            MAX(created_at) AS last_at,
                            MAX(id) AS last_id
                     FROM messages
                     WHERE sender_id = ?1 OR recipient_id = ?1
                     GROUP BY other_id
                 ) c ON c.other_id = u.id
                 WHERE u.id != ?1
                 ORDER BY c.last_at DESC, c.last_id DESC",
            )?;
            let rows = stmt
                .query_map([user_id], map_user_summary)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_user<P: rusqlite::ToSql>(conn: &Connection, filter: &str, value: P) -> Result<Option<UserRow>> {
    let sql = format!("SELECT id, username, email, password_hash, created_at FROM users WHERE {filter}");
    let row = conn
        .query_row(&sql, [value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
                password_hash: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_pins(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<PinRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, map_pin)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Delete the (user, pin) row from `table` if present, else insert it.
/// Returns true when the row exists afterwards.
fn toggle_row(conn: &Connection, table: &str, user_id: i64, pin_id: i64) -> Result<bool> {
    let removed = conn.execute(
        &format!("DELETE FROM {table} WHERE user_id = ?1 AND pin_id = ?2"),
        [user_id, pin_id],
    )?;
    if removed > 0 {
        return Ok(false);
    }

    conn.execute(
        &format!("INSERT INTO {table} (user_id, pin_id) VALUES (?1, ?2)"),
        [user_id, pin_id],
    )?;
    Ok(true)
}

fn map_pin(row: &Row<'_>) -> rusqlite::Result<PinRow> {
    Ok(PinRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        author_username: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        image_filename: row.get(5)?,
        created_at: row.get(6)?,
        like_count: row.get(7)?,
        liked: row.get(8)?,
        saved: row.get(9)?,
    })
}

fn map_message(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    let pin = match row.get::<_, Option<i64>>(5)? {
        Some(id) => Some(SharedPinRow {
            id,
            title: row.get(6)?,
            description: row.get(7)?,
            image_filename: row.get(8)?,
        }),
        None => None,
    };

    Ok(MessageRow {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        recipient_id: row.get(2)?,
        text: row.get(3)?,
        created_at: row.get(4)?,
        pin,
    })
}

fn map_user_summary(row: &Row<'_>) -> rusqlite::Result<UserSummaryRow> {
    Ok(UserSummaryRow {
        id: row.get(0)?,
        username: row.get(1)?,
    })
}

/// Escape LIKE wildcards so user input matches literally (escape char `\`).
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::is_unique_violation;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn user(db: &Database, name: &str) -> i64 {
        db.create_user(name, &format!("{name}@example.com"), "hash").unwrap()
    }

    #[test]
    fn duplicate_username_is_unique_violation() {
        let db = db();
        user(&db, "alice");
        let err = db.create_user("alice", "other@example.com", "hash").unwrap_err();
        assert!(is_unique_violation(&err));

        let err = db.create_user("alice2", "alice@example.com", "hash").unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn overlong_username_or_email_is_refused_by_store() {
        let db = db();
        assert!(db.create_user(&"u".repeat(65), "long@example.com", "hash").is_err());
        let email = format!("{}@example.com", "e".repeat(120));
        assert!(db.create_user("shortname", &email, "hash").is_err());
        assert!(db.create_user(&"u".repeat(64), "ok@example.com", "hash").is_ok());
    }

    #[test]
    fn lookup_by_email_and_username() {
        let db = db();
        let id = user(&db, "bob");
        assert_eq!(db.get_user_by_email("bob@example.com").unwrap().unwrap().id, id);
        assert_eq!(db.get_user_by_username("bob").unwrap().unwrap().email, "bob@example.com");
        assert!(db.get_user_by_email("nobody@example.com").unwrap().is_none());
        assert!(db.get_user_by_id(id + 100).unwrap().is_none());
    }

    #[test]
    fn feed_is_newest_first_with_annotations() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let first = db.create_pin(alice, "first", None, "a.png").unwrap();
        let second = db.create_pin(bob, "second", Some("desc"), "b.png").unwrap();

        db.toggle_like(alice, first).unwrap();
        db.toggle_save(alice, second).unwrap();

        let feed = db.list_feed(alice).unwrap();
        assert_eq!(feed.iter().map(|p| p.id).collect::<Vec<_>>(), vec![second, first]);
        assert_eq!(feed[0].author_username, "bob");
        assert!(feed[0].saved && !feed[0].liked);
        assert!(feed[1].liked && !feed[1].saved);
        assert_eq!(feed[1].like_count, 1);

        // annotations are per viewer
        let feed = db.list_feed(bob).unwrap();
        assert!(feed.iter().all(|p| !p.liked && !p.saved));
        assert_eq!(feed[1].like_count, 1);
    }

    #[test]
    fn toggle_like_twice_restores_state() {
        let db = db();
        let alice = user(&db, "alice");
        let pin = db.create_pin(alice, "pin", None, "a.png").unwrap();

        assert_eq!(db.toggle_like(alice, pin).unwrap(), (true, 1));
        assert_eq!(db.toggle_like(alice, pin).unwrap(), (false, 0));
        assert!(!db.get_pin(pin, alice).unwrap().unwrap().liked);
    }

    #[test]
    fn duplicate_like_insert_is_rejected_by_store() {
        let db = db();
        let alice = user(&db, "alice");
        let pin = db.create_pin(alice, "pin", None, "a.png").unwrap();

        let insert = |db: &Database| {
            db.with_conn_mut(|conn| {
                conn.execute("INSERT INTO likes (user_id, pin_id) VALUES (?1, ?2)", [alice, pin])?;
                Ok(())
            })
        };
        insert(&db).unwrap();
        let err = insert(&db).unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn profile_lists() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let own = db.create_pin(alice, "own", None, "a.png").unwrap();
        let liked = db.create_pin(bob, "liked", None, "b.png").unwrap();
        let saved = db.create_pin(bob, "saved", None, "c.png").unwrap();
        db.toggle_like(alice, liked).unwrap();
        db.toggle_save(alice, saved).unwrap();

        let ids = |rows: Vec<PinRow>| rows.into_iter().map(|p| p.id).collect::<Vec<_>>();
        assert_eq!(ids(db.list_pins_by_author(alice, alice).unwrap()), vec![own]);
        assert_eq!(ids(db.list_liked_pins(alice).unwrap()), vec![liked]);
        assert_eq!(ids(db.list_saved_pins(alice).unwrap()), vec![saved]);
        assert!(db.list_liked_pins(bob).unwrap().is_empty());
    }

    #[test]
    fn conversation_is_oldest_first_both_directions() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let carol = user(&db, "carol");
        let pin = db.create_pin(carol, "pin", Some("d"), "p.gif").unwrap();

        let m1 = db.insert_message(alice, bob, Some("hi"), None).unwrap();
        let m2 = db.insert_message(bob, alice, None, Some(pin)).unwrap();
        db.insert_message(alice, carol, Some("elsewhere"), None).unwrap();

        let convo = db.get_conversation(bob, alice).unwrap();
        assert_eq!(convo.iter().map(|m| m.id).collect::<Vec<_>>(), vec![m1, m2]);
        let shared = convo[1].pin.as_ref().unwrap();
        assert_eq!(shared.id, pin);
        assert_eq!(shared.image_filename, "p.gif");
        assert!(convo[0].pin.is_none());
    }

    #[test]
    fn message_constraints_hold_in_store() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        assert!(db.insert_message(alice, bob, None, None).is_err());
        assert!(db.insert_message(alice, alice, Some("me"), None).is_err());
    }

    #[test]
    fn contacts_come_from_history_in_both_directions() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let carol = user(&db, "carol");
        user(&db, "dave");

        db.insert_message(alice, bob, Some("1"), None).unwrap();
        db.insert_message(carol, alice, Some("2"), None).unwrap();
        db.insert_message(bob, alice, Some("3"), None).unwrap();

        let contacts: Vec<_> = db.get_contacts(alice).unwrap().into_iter().map(|c| c.username).collect();
        assert_eq!(contacts, vec!["bob", "carol"]);
        assert_eq!(db.get_contacts(carol).unwrap().len(), 1);
    }

    #[test]
    fn search_is_case_insensitive_capped_and_excludes_self() {
        let db = db();
        let me = user(&db, "Alfred");
        for i in 0..12 {
            user(&db, &format!("val{i:02}"));
        }
        user(&db, "SALLY");
        user(&db, "bob");

        let hits = db.search_users("al", me, 10).unwrap();
        assert_eq!(hits.len(), 10);
        assert!(hits.iter().all(|u| u.username.to_lowercase().contains("al")));
        assert!(hits.iter().all(|u| u.id != me));

        let hits = db.search_users("sal", me, 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].username, "SALLY");
    }

    #[test]
    fn search_treats_wildcards_literally() {
        let db = db();
        let me = user(&db, "me");
        user(&db, "under_score");
        user(&db, "underXscore");

        let hits = db.search_users("r_s", me, 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].username, "under_score");
        assert!(db.search_users("%", me, 10).unwrap().is_empty());
    }
}

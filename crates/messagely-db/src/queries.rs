use crate::models::{MessageRow, NewUser, ParticipantRow, ReadRow, UserRow, UserSummaryRow};
use crate::Database;
use anyhow::Result;
use rusqlite::{Connection, ErrorCode};

impl Database {
    // -- Users --

    /// Insert a user. Returns `None` when the username is already taken.
    pub fn create_user(&self, user: &NewUser<'_>) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "INSERT INTO users (username, password, first_name, last_name, phone, join_at, last_login_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, datetime('now'), datetime('now'))
                 ON CONFLICT(username) DO NOTHING
                 RETURNING username, first_name, last_name, phone, join_at, last_login_at",
                rusqlite::params![
                    user.username,
                    user.password_hash,
                    user.first_name,
                    user.last_name,
                    user.phone,
                ],
                map_user,
            )
            .optional()
        })
    }

    pub fn get_password_hash(&self, username: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT password FROM users WHERE username = ?1",
                [username],
                |row| row.get(0),
            )
            .optional()
        })
    }

    /// Returns false if no such user.
    pub fn touch_last_login(&self, username: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET last_login_at = datetime('now') WHERE username = ?1",
                [username],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn list_users(&self) -> Result<Vec<UserSummaryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT username, first_name, last_name FROM users ORDER BY username",
            )?;

            let rows = stmt
                .query_map([], |row| {
                    Ok(UserSummaryRow {
                        username: row.get(0)?,
                        first_name: row.get(1)?,
                        last_name: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn get_user(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT username, first_name, last_name, phone, join_at, last_login_at
                 FROM users WHERE username = ?1",
                [username],
                map_user,
            )
            .optional()
        })
    }

    pub fn get_participant(&self, username: &str) -> Result<Option<ParticipantRow>> {
        self.with_conn(|conn| query_participant(conn, username))
    }

    // -- Reset codes --

    /// Store a reset code valid for `ttl_secs`, replacing any earlier code.
    /// Returns false if no such user.
    pub fn set_reset_code(&self, username: &str, code: &str, ttl_secs: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users
                 SET reset_code = ?2, reset_code_expires_at = datetime('now', '+' || ?3 || ' seconds')
                 WHERE username = ?1",
                rusqlite::params![username, code, ttl_secs],
            )?;
            Ok(changed > 0)
        })
    }

    /// Swap in a new password hash iff `code` is the user's live reset code,
    /// clearing the code in the same statement. Returns false when the code
    /// is missing, wrong or expired.
    pub fn redeem_reset_code(&self, username: &str, code: &str, password_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users
                 SET password = ?3, reset_code = NULL, reset_code_expires_at = NULL
                 WHERE username = ?1
                   AND reset_code IS NOT NULL
                   AND reset_code = ?2
                   AND reset_code_expires_at > datetime('now')",
                rusqlite::params![username, code, password_hash],
            )?;
            Ok(changed > 0)
        })
    }

    // -- Messages --

    /// Insert a message. Returns `None` when the insert is rejected by a
    /// constraint (unknown sender or recipient).
    pub fn insert_message(&self, from_username: &str, to_username: &str, body: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let result = conn.query_row(
                "INSERT INTO messages (from_username, to_username, body, sent_at)
                 VALUES (?1, ?2, ?3, datetime('now'))
                 RETURNING id, from_username, to_username, body, sent_at, read_at",
                rusqlite::params![from_username, to_username, body],
                map_message,
            );

            match result {
                Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => Ok(None),
                other => other.optional(),
            }
        })
    }

    /// Stamp `read_at` on first call; later calls keep the original stamp.
    pub fn mark_read(&self, id: i64) -> Result<Option<ReadRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "UPDATE messages SET read_at = COALESCE(read_at, datetime('now'))
                 WHERE id = ?1
                 RETURNING id, read_at",
                [id],
                |row| {
                    Ok(ReadRow {
                        id: row.get(0)?,
                        read_at: row.get(1)?,
                    })
                },
            )
            .optional()
        })
    }

    pub fn get_message(&self, id: i64) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, from_username, to_username, body, sent_at, read_at
                 FROM messages WHERE id = ?1",
                [id],
                map_message,
            )
            .optional()
        })
    }

    pub fn messages_from(&self, username: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            query_messages(
                conn,
                "SELECT id, from_username, to_username, body, sent_at, read_at
                 FROM messages WHERE from_username = ?1 ORDER BY id",
                username,
            )
        })
    }

    pub fn messages_to(&self, username: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            query_messages(
                conn,
                "SELECT id, from_username, to_username, body, sent_at, read_at
                 FROM messages WHERE to_username = ?1 ORDER BY id",
                username,
            )
        })
    }
}

fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        username: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        phone: row.get(3)?,
        join_at: row.get(4)?,
        last_login_at: row.get(5)?,
    })
}

fn map_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        from_username: row.get(1)?,
        to_username: row.get(2)?,
        body: row.get(3)?,
        sent_at: row.get(4)?,
        read_at: row.get(5)?,
    })
}

fn query_participant(conn: &Connection, username: &str) -> Result<Option<ParticipantRow>> {
    let mut stmt =
        conn.prepare("SELECT username, first_name, last_name, phone FROM users WHERE username = ?1")?;

    let row = stmt
        .query_row([username], |row| {
            Ok(ParticipantRow {
                username: row.get(0)?,
                first_name: row.get(1)?,
                last_name: row.get(2)?,
                phone: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_messages(conn: &Connection, sql: &str, username: &str) -> Result<Vec<MessageRow>> {
    let mut stmt = conn.prepare(sql)?;

    let rows = stmt
        .query_map([username], map_message)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_with_users(names: &[&str]) -> Database {
        let db = Database::open_in_memory().unwrap();
        for name in names {
            let created = db
                .create_user(&NewUser {
                    username: name,
                    password_hash: "hash",
                    first_name: "First",
                    last_name: "Last",
                    phone: "+15550000000",
                })
                .unwrap();
            assert!(created.is_some());
        }
        db
    }

    #[test]
    fn duplicate_username_yields_no_row() {
        let db = db_with_users(&["bob"]);
        let again = db
            .create_user(&NewUser {
                username: "bob",
                password_hash: "other",
                first_name: "Robert",
                last_name: "Dup",
                phone: "+15551111111",
            })
            .unwrap();
        assert!(again.is_none());
        assert_eq!(db.get_password_hash("bob").unwrap().as_deref(), Some("hash"));
    }

    #[test]
    fn registration_sets_join_and_login_timestamps() {
        let db = db_with_users(&["bob"]);
        let user = db.get_user("bob").unwrap().unwrap();
        assert!(!user.join_at.is_empty());
        assert_eq!(user.last_login_at.as_deref(), Some(user.join_at.as_str()));
    }

    #[test]
    fn touch_last_login_reports_missing_user() {
        let db = db_with_users(&["bob"]);
        assert!(db.touch_last_login("bob").unwrap());
        assert!(!db.touch_last_login("nobody").unwrap());
    }

    #[test]
    fn reset_code_redeems_once() {
        let db = db_with_users(&["bob"]);
        assert!(db.set_reset_code("bob", "123456", 600).unwrap());

        assert!(!db.redeem_reset_code("bob", "654321", "new-hash").unwrap());
        assert!(db.redeem_reset_code("bob", "123456", "new-hash").unwrap());
        assert!(!db.redeem_reset_code("bob", "123456", "newer-hash").unwrap());

        assert_eq!(db.get_password_hash("bob").unwrap().as_deref(), Some("new-hash"));
    }

    #[test]
    fn expired_reset_code_is_rejected() {
        let db = db_with_users(&["bob"]);
        assert!(db.set_reset_code("bob", "123456", 0).unwrap());
        assert!(!db.redeem_reset_code("bob", "123456", "new-hash").unwrap());
        assert_eq!(db.get_password_hash("bob").unwrap().as_deref(), Some("hash"));
    }

    #[test]
    fn reset_code_for_unknown_user() {
        let db = db_with_users(&[]);
        assert!(!db.set_reset_code("ghost", "123456", 600).unwrap());
    }

    #[test]
    fn message_to_unknown_user_is_rejected() {
        let db = db_with_users(&["bob"]);
        assert!(db.insert_message("bob", "ghost", "hello?").unwrap().is_none());
    }

    #[test]
    fn mark_read_keeps_first_timestamp() {
        let db = db_with_users(&["bob", "alice"]);
        let msg = db.insert_message("bob", "alice", "hi").unwrap().unwrap();
        assert!(msg.read_at.is_none());

        let first = db.mark_read(msg.id).unwrap().unwrap();
        // Backdate so a second stamp would be visibly different
        db.with_conn(|conn| {
            conn.execute(
                "UPDATE messages SET read_at = '2000-01-01 00:00:00' WHERE id = ?1",
                [msg.id],
            )?;
            Ok(())
        })
        .unwrap();
        let second = db.mark_read(msg.id).unwrap().unwrap();

        assert_eq!(first.id, msg.id);
        assert_eq!(second.read_at, "2000-01-01 00:00:00");
        assert!(db.mark_read(msg.id + 100).unwrap().is_none());
    }

    #[test]
    fn listings_are_ordered_by_id() {
        let db = db_with_users(&["bob", "alice", "carol"]);
        let first = db.insert_message("bob", "alice", "one").unwrap().unwrap();
        db.insert_message("carol", "alice", "two").unwrap().unwrap();
        let third = db.insert_message("bob", "carol", "three").unwrap().unwrap();

        let sent: Vec<i64> = db.messages_from("bob").unwrap().iter().map(|m| m.id).collect();
        assert_eq!(sent, vec![first.id, third.id]);

        let inbox: Vec<String> = db.messages_to("alice").unwrap().into_iter().map(|m| m.body).collect();
        assert_eq!(inbox, vec!["one", "two"]);

        assert!(db.messages_to("bob").unwrap().is_empty());
    }

    #[test]
    fn list_users_sorted() {
        let db = db_with_users(&["carol", "alice", "bob"]);
        let names: Vec<String> = db.list_users().unwrap().into_iter().map(|u| u.username).collect();
        assert_eq!(names, vec!["alice", "bob", "carol"]);
    }
}

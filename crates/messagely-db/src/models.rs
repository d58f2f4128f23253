/// Database row types — these map directly to SQLite rows.
/// Distinct from messagely-types API models to keep the DB layer independent.
/// Timestamps stay as SQLite `datetime('now')` text; the API layer parses them.

pub struct NewUser<'a> {
    pub username: &'a str,
    pub password_hash: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub phone: &'a str,
}

pub struct UserRow {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub join_at: String,
    pub last_login_at: Option<String>,
}

pub struct UserSummaryRow {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

pub struct ParticipantRow {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
}

pub struct MessageRow {
    pub id: i64,
    pub from_username: String,
    pub to_username: String,
    pub body: String,
    pub sent_at: String,
    pub read_at: Option<String>,
}

pub struct ReadRow {
    pub id: i64,
    pub read_at: String,
}

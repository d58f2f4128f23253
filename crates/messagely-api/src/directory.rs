use std::sync::Arc;

use futures_util::future::try_join_all;
use tracing::info;

use messagely_db::Database;
use messagely_db::models::NewUser;
use messagely_types::api::RegisterRequest;
use messagely_types::models::{Participant, ReceivedMessage, SentMessage, UserProfile, UserSummary};

use crate::convert;
use crate::credentials::{CredentialStore, validate_password};
use crate::error::ApiError;
use crate::run_blocking;

/// User records and the per-user message views built on top of them.
#[derive(Clone)]
pub struct UserDirectory {
    db: Arc<Database>,
    credentials: CredentialStore,
}

impl UserDirectory {
    pub fn new(db: Arc<Database>, credentials: CredentialStore) -> Self {
        Self { db, credentials }
    }

    /// Create a user and return its public profile.
    pub async fn register(&self, req: RegisterRequest) -> Result<UserProfile, ApiError> {
        validate_registration(&req)?;

        let db = self.db.clone();
        let credentials = self.credentials.clone();
        let row = run_blocking(move || {
            let password_hash = credentials.hash(&req.password)?;
            db.create_user(&NewUser {
                username: &req.username,
                password_hash: &password_hash,
                first_name: req.first_name.trim(),
                last_name: req.last_name.trim(),
                phone: req.phone.trim(),
            })?
            .ok_or_else(|| ApiError::RegistrationFailed(req.username.clone()))
        })
        .await?;

        info!("Registered user {}", row.username);
        Ok(convert::user_profile(row))
    }

    /// True only for a known user with a matching password. Leaves
    /// `last_login_at` alone; see [`Self::update_login_timestamp`].
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<bool, ApiError> {
        let db = self.db.clone();
        let credentials = self.credentials.clone();
        let (username, password) = (username.to_string(), password.to_string());

        run_blocking(move || {
            let Some(hash) = db.get_password_hash(&username)? else {
                return Ok(false);
            };
            Ok(credentials.verify(&password, &hash))
        })
        .await
    }

    pub async fn update_login_timestamp(&self, username: &str) -> Result<(), ApiError> {
        let db = self.db.clone();
        let user = username.to_string();
        if !run_blocking(move || Ok(db.touch_last_login(&user)?)).await? {
            return Err(no_such_user(username));
        }
        Ok(())
    }

    pub async fn all(&self) -> Result<Vec<UserSummary>, ApiError> {
        let db = self.db.clone();
        let rows = run_blocking(move || Ok(db.list_users()?)).await?;
        Ok(rows.into_iter().map(convert::user_summary).collect())
    }

    pub async fn get(&self, username: &str) -> Result<UserProfile, ApiError> {
        let db = self.db.clone();
        let user = username.to_string();
        let row = run_blocking(move || db.get_user(&user)?.ok_or_else(|| no_such_user(&user))).await?;
        Ok(convert::user_profile(row))
    }

    /// Messages sent by `username`, oldest first, each with its recipient.
    pub async fn messages_from(&self, username: &str) -> Result<Vec<SentMessage>, ApiError> {
        let db = self.db.clone();
        let user = username.to_string();
        let rows = run_blocking(move || {
            ensure_user(&db, &user)?;
            Ok(db.messages_from(&user)?)
        })
        .await?;

        let recipients = self
            .resolve_participants(rows.iter().map(|row| row.to_username.clone()).collect())
            .await?;

        Ok(rows
            .into_iter()
            .zip(recipients)
            .map(|(row, to_user)| SentMessage {
                id: row.id,
                to_user,
                sent_at: convert::timestamp(&row.sent_at, "sent_at"),
                read_at: row.read_at.as_deref().map(|t| convert::timestamp(t, "read_at")),
                body: row.body,
            })
            .collect())
    }

    /// Messages addressed to `username`, oldest first, each with its sender.
    pub async fn messages_to(&self, username: &str) -> Result<Vec<ReceivedMessage>, ApiError> {
        let db = self.db.clone();
        let user = username.to_string();
        let rows = run_blocking(move || {
            ensure_user(&db, &user)?;
            Ok(db.messages_to(&user)?)
        })
        .await?;

        let senders = self
            .resolve_participants(rows.iter().map(|row| row.from_username.clone()).collect())
            .await?;

        Ok(rows
            .into_iter()
            .zip(senders)
            .map(|(row, from_user)| ReceivedMessage {
                id: row.id,
                from_user,
                sent_at: convert::timestamp(&row.sent_at, "sent_at"),
                read_at: row.read_at.as_deref().map(|t| convert::timestamp(t, "read_at")),
                body: row.body,
            })
            .collect())
    }

    /// Look up every username concurrently. Output position `i` belongs to
    /// input position `i` regardless of which lookup finishes first; the
    /// first failure aborts the batch.
    async fn resolve_participants(&self, usernames: Vec<String>) -> Result<Vec<Participant>, ApiError> {
        let lookups = usernames.into_iter().map(|username| {
            let db = self.db.clone();
            run_blocking(move || {
                db.get_participant(&username)?
                    .map(convert::participant)
                    .ok_or(ApiError::ParticipantNotFound(username))
            })
        });

        try_join_all(lookups).await
    }
}

fn ensure_user(db: &Database, username: &str) -> Result<(), ApiError> {
    match db.get_participant(username)? {
        Some(_) => Ok(()),
        None => Err(no_such_user(username)),
    }
}

fn no_such_user(username: &str) -> ApiError {
    ApiError::NotFound(format!("No such user: {}", username))
}

fn validate_registration(req: &RegisterRequest) -> Result<(), ApiError> {
    if req.username.len() < 3 || req.username.len() > 32 {
        return Err(ApiError::BadRequest("Username must be 3 to 32 characters".into()));
    }
    if req.username.chars().any(char::is_whitespace) {
        return Err(ApiError::BadRequest("Username must not contain whitespace".into()));
    }
    validate_password(&req.password)?;

    for (field, value) in [
        ("first_name", &req.first_name),
        ("last_name", &req.last_name),
        ("phone", &req.phone),
    ] {
        if value.trim().is_empty() {
            return Err(ApiError::BadRequest(format!("{} is required", field)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::config::PasswordConfig;

    fn directory() -> UserDirectory {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let params = PasswordConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        };
        let credentials = CredentialStore::new(db.clone(), &params, Duration::from_secs(600)).unwrap();
        UserDirectory::new(db, credentials)
    }

    fn registration(username: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            password: password.into(),
            first_name: "Test".into(),
            last_name: username.into(),
            phone: "+15550002222".into(),
        }
    }

    #[tokio::test]
    async fn register_then_authenticate() {
        let users = directory();
        let profile = users.register(registration("bob", "password123")).await.unwrap();
        assert_eq!(profile.username, "bob");

        let json = serde_json::to_value(&profile).unwrap();
        assert!(json.get("password").is_none());

        assert!(users.authenticate("bob", "password123").await.unwrap());
        assert!(!users.authenticate("bob", "password124").await.unwrap());
        assert!(!users.authenticate("nobody", "password123").await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_registration_fails() {
        let users = directory();
        users.register(registration("bob", "password123")).await.unwrap();
        let again = users.register(registration("bob", "different456")).await;
        assert!(matches!(again, Err(ApiError::RegistrationFailed(name)) if name == "bob"));
    }

    #[tokio::test]
    async fn invalid_registration_is_bad_request() {
        let users = directory();
        for req in [
            registration("bo", "password123"),
            registration("bob", "short"),
            registration("bob smith", "password123"),
            RegisterRequest { phone: " ".into(), ..registration("bob", "password123") },
        ] {
            assert!(matches!(users.register(req).await, Err(ApiError::BadRequest(_))));
        }
    }

    #[tokio::test]
    async fn login_timestamp_requires_existing_user() {
        let users = directory();
        users.register(registration("bob", "password123")).await.unwrap();
        users.update_login_timestamp("bob").await.unwrap();
        assert!(matches!(users.update_login_timestamp("ghost").await, Err(ApiError::NotFound(_))));
    }

    fn backdate_last_login(users: &UserDirectory, username: &str) -> chrono::DateTime<chrono::Utc> {
        users
            .db
            .with_conn(|conn| {
                conn.execute(
                    "UPDATE users SET last_login_at = '2000-01-01 00:00:00' WHERE username = ?1",
                    [username],
                )?;
                Ok(())
            })
            .unwrap();
        "2000-01-01T00:00:00Z".parse().unwrap()
    }

    #[tokio::test]
    async fn authenticate_leaves_last_login_alone() {
        let users = directory();
        users.register(registration("bob", "password123")).await.unwrap();
        let backdated = backdate_last_login(&users, "bob");

        assert!(users.authenticate("bob", "password123").await.unwrap());
        assert!(!users.authenticate("bob", "wrong-password").await.unwrap());

        assert_eq!(users.get("bob").await.unwrap().last_login_at, Some(backdated));
    }

    #[tokio::test]
    async fn login_timestamp_moves_forward() {
        let users = directory();
        users.register(registration("bob", "password123")).await.unwrap();
        let backdated = backdate_last_login(&users, "bob");

        users.update_login_timestamp("bob").await.unwrap();

        let last_login = users.get("bob").await.unwrap().last_login_at.unwrap();
        assert!(last_login > backdated);
    }

    #[tokio::test]
    async fn empty_listings_are_ok() {
        let users = directory();
        assert!(users.all().await.unwrap().is_empty());

        users.register(registration("bob", "password123")).await.unwrap();
        assert!(users.messages_from("bob").await.unwrap().is_empty());
        assert!(users.messages_to("bob").await.unwrap().is_empty());

        assert!(matches!(users.messages_to("ghost").await, Err(ApiError::NotFound(_))));
        assert!(matches!(users.get("ghost").await, Err(ApiError::NotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn fan_out_preserves_message_order() {
        let users = directory();
        let names = ["alice", "carol", "dave", "erin", "frank"];
        users.register(registration("bob", "password123")).await.unwrap();
        for name in names {
            users.register(registration(name, "password123")).await.unwrap();
        }

        for round in 0..4 {
            for name in names {
                users
                    .db
                    .insert_message("bob", name, &format!("{} #{}", name, round))
                    .unwrap()
                    .unwrap();
                users.db.insert_message(name, "bob", "reply").unwrap().unwrap();
            }
        }

        let sent = users.messages_from("bob").await.unwrap();
        assert_eq!(sent.len(), names.len() * 4);
        for (i, message) in sent.iter().enumerate() {
            let expected = names[i % names.len()];
            assert_eq!(message.to_user.username, expected);
            assert_eq!(message.body, format!("{} #{}", expected, i / names.len()));
        }
        assert!(sent.windows(2).all(|w| w[0].id < w[1].id));

        let received = users.messages_to("bob").await.unwrap();
        let senders: Vec<&str> = received.iter().map(|m| m.from_user.username.as_str()).collect();
        let expected: Vec<&str> = (0..4).flat_map(|_| names).collect();
        assert_eq!(senders, expected);
    }
}

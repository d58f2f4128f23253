use std::sync::Arc;

use tracing::info;

use messagely_db::Database;
use messagely_types::models::{CreatedMessage, MessageDetail, ReadReceipt};

use crate::convert;
use crate::error::ApiError;
use crate::run_blocking;
use crate::sms::SmsClient;

#[derive(Clone)]
pub struct MessageStore {
    db: Arc<Database>,
    sms: SmsClient,
}

impl MessageStore {
    pub fn new(db: Arc<Database>, sms: SmsClient) -> Self {
        Self { db, sms }
    }

    pub async fn create(&self, from_username: &str, to_username: &str, body: &str) -> Result<CreatedMessage, ApiError> {
        if body.trim().is_empty() {
            return Err(ApiError::BadRequest("Message body must not be empty".into()));
        }

        let db = self.db.clone();
        let (from, to, body) = (from_username.to_string(), to_username.to_string(), body.to_string());
        let row = run_blocking(move || db.insert_message(&from, &to, &body)?.ok_or(ApiError::CreateFailed)).await?;

        info!("Message {} sent from {} to {}", row.id, row.from_username, row.to_username);
        Ok(convert::created_message(row))
    }

    /// Stamps `read_at` once; repeat calls return the original stamp.
    pub async fn mark_read(&self, id: i64) -> Result<ReadReceipt, ApiError> {
        let db = self.db.clone();
        let row = run_blocking(move || db.mark_read(id)?.ok_or_else(|| no_such_message(id))).await?;
        Ok(convert::read_receipt(row))
    }

    /// Message row, then sender, then recipient: three sequential reads with
    /// no transaction around them.
    pub async fn get(&self, id: i64) -> Result<MessageDetail, ApiError> {
        let db = self.db.clone();
        run_blocking(move || {
            let message = db.get_message(id)?.ok_or_else(|| no_such_message(id))?;

            let from_user = db
                .get_participant(&message.from_username)?
                .ok_or_else(|| ApiError::ParticipantNotFound(message.from_username.clone()))?;

            let to_user = db
                .get_participant(&message.to_username)?
                .ok_or_else(|| ApiError::ParticipantNotFound(message.to_username.clone()))?;

            Ok(MessageDetail {
                id: message.id,
                from_user: convert::participant(from_user),
                to_user: convert::participant(to_user),
                sent_at: convert::timestamp(&message.sent_at, "sent_at"),
                read_at: message.read_at.as_deref().map(|t| convert::timestamp(t, "read_at")),
                body: message.body,
            })
        })
        .await
    }

    pub async fn send_sms(&self, body: &str, from_phone: &str, to_phone: &str) -> Result<String, ApiError> {
        self.sms
            .send(body, from_phone, to_phone)
            .await
            .map_err(|e| ApiError::DeliveryFailed(format!("{:#}", e)))
    }
}

fn no_such_message(id: i64) -> ApiError {
    ApiError::NotFound(format!("No message with id {}", id))
}

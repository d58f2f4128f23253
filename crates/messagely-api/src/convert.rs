//! Row → API model conversions.

use chrono::{DateTime, Utc};
use tracing::warn;

use messagely_db::models::{MessageRow, ParticipantRow, ReadRow, UserRow, UserSummaryRow};
use messagely_types::models::{
    CreatedMessage, Participant, ReadReceipt, UserProfile, UserSummary,
};

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
/// Parse as naive UTC; fall back to RFC 3339 for rows written by other tools.
pub(crate) fn timestamp(raw: &str, column: &str) -> DateTime<Utc> {
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|ndt| ndt.and_utc())
        .or_else(|_| raw.parse::<DateTime<Utc>>())
        .unwrap_or_else(|e| {
            warn!("Corrupt {} '{}': {}", column, raw, e);
            DateTime::default()
        })
}

pub(crate) fn user_summary(row: UserSummaryRow) -> UserSummary {
    UserSummary {
        username: row.username,
        first_name: row.first_name,
        last_name: row.last_name,
    }
}

pub(crate) fn user_profile(row: UserRow) -> UserProfile {
    UserProfile {
        join_at: timestamp(&row.join_at, "join_at"),
        last_login_at: row.last_login_at.as_deref().map(|t| timestamp(t, "last_login_at")),
        username: row.username,
        first_name: row.first_name,
        last_name: row.last_name,
        phone: row.phone,
    }
}

pub(crate) fn participant(row: ParticipantRow) -> Participant {
    Participant {
        username: row.username,
        first_name: row.first_name,
        last_name: row.last_name,
        phone: row.phone,
    }
}

pub(crate) fn created_message(row: MessageRow) -> CreatedMessage {
    CreatedMessage {
        id: row.id,
        sent_at: timestamp(&row.sent_at, "sent_at"),
        from_username: row.from_username,
        to_username: row.to_username,
        body: row.body,
    }
}

pub(crate) fn read_receipt(row: ReadRow) -> ReadReceipt {
    ReadReceipt {
        id: row.id,
        read_at: timestamp(&row.read_at, "read_at"),
    }
}

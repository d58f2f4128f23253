use serde::{Deserialize, Serialize};

use crate::models::ReadReceipt;

// -- JWT Claims --

/// Session token claims. `username` is the only identity claim; `iat`/`exp`
/// bound the session lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub username: String,
    pub iat: usize,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResetResponse {
    pub sid: String,
}

/// Reset codes arrive either as a JSON string or a bare number.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ResetCodeInput {
    Number(u64),
    Text(String),
}

impl ResetCodeInput {
    pub fn normalized(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.trim().to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdatePasswordRequest {
    pub username: String,
    #[serde(rename = "resetCode")]
    pub reset_code: ResetCodeInput,
    #[serde(rename = "newPassword")]
    pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusMessage {
    pub message: String,
}

// -- Messages --

/// `from_username` is optional; when present it must match the caller.
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub from_username: Option<String>,
    pub to_username: String,
    pub body: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadResponse {
    pub message: ReadReceipt,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    pub status: u16,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

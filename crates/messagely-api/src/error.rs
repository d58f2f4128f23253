use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{debug, error, warn};

use messagely_types::api::{ErrorBody, ErrorResponse};

#[derive(Error, Debug)]
pub enum ApiError {
    /// Bad, missing or foreign token, and failed ownership checks. All of
    /// these render identically.
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("User registration failed: username '{0}' is taken")]
    RegistrationFailed(String),

    #[error("Unable to create new message")]
    CreateFailed,

    #[error("Invalid or expired reset code")]
    InvalidResetCode,

    #[error("Unable to find message participant '{0}'")]
    ParticipantNotFound(String),

    /// Provider detail is logged, not returned.
    #[error("SMS delivery failed")]
    DeliveryFailed(String),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) | Self::ParticipantNotFound(_) => StatusCode::NOT_FOUND,
            Self::RegistrationFailed(_) => StatusCode::CONFLICT,
            Self::CreateFailed | Self::InvalidResetCode | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::DeliveryFailed(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Extractor detail names internal types; log it, answer with a fixed message.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!("Rejected JSON body: {}", rejection.body_text());
        Self::BadRequest("Invalid JSON request body".into())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        debug!("Rejected path parameters: {}", rejection.body_text());
        Self::BadRequest("Invalid path parameter".into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match &self {
            Self::Internal(e) => {
                error!("Internal error: {:#}", e);
                "Internal Server Error".to_string()
            }
            Self::DeliveryFailed(detail) => {
                error!("SMS delivery failed: {}", detail);
                self.to_string()
            }
            Self::ParticipantNotFound(username) => {
                warn!("Message references missing user '{}'", username);
                self.to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorResponse {
            error: ErrorBody {
                message,
                status: status.as_u16(),
            },
        };

        (status, Json(body)).into_response()
    }
}

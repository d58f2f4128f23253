use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::WithRejection;
use tracing::{info, warn};

use messagely_db::Database;
use messagely_types::api::{
    LoginRequest, RegisterRequest, ResetRequest, ResetResponse, StatusMessage, TokenResponse,
    UpdatePasswordRequest,
};

use crate::config::AppConfig;
use crate::credentials::CredentialStore;
use crate::directory::UserDirectory;
use crate::error::ApiError;
use crate::message_store::MessageStore;
use crate::sms::SmsClient;
use crate::tokens::TokenService;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub config: AppConfig,
    pub tokens: TokenService,
    pub credentials: CredentialStore,
    pub users: UserDirectory,
    pub messages: MessageStore,
}

impl AppStateInner {
    /// Wire every component from one configuration value.
    pub fn new(config: AppConfig, db: Database, sms: SmsClient) -> anyhow::Result<AppState> {
        let db = Arc::new(db);
        let credentials = CredentialStore::new(db.clone(), &config.password, config.reset_code_ttl)?;

        Ok(Arc::new(Self {
            tokens: TokenService::new(&config.jwt_secret, config.token_ttl),
            users: UserDirectory::new(db.clone(), credentials.clone()),
            messages: MessageStore::new(db, sms),
            credentials,
            config,
        }))
    }
}

/// POST /auth/register — create the user and log them straight in.
pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<RegisterRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.users.register(req).await?;
    let token = state.tokens.issue(&user.username)?;

    Ok((StatusCode::CREATED, Json(TokenResponse { token })))
}

/// POST /auth/login — verify credentials, stamp last login, hand out a token.
pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> Result<Json<TokenResponse>, ApiError> {
    if !state.users.authenticate(&req.username, &req.password).await? {
        warn!("Failed login for {}", req.username);
        return Err(ApiError::Unauthorized);
    }

    state.users.update_login_timestamp(&req.username).await?;
    let token = state.tokens.issue(&req.username)?;

    info!("{} logged in", req.username);
    Ok(Json(TokenResponse { token }))
}

/// POST /auth/reset — text the user a fresh reset code.
pub async fn reset(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<ResetRequest>, ApiError>,
) -> Result<Json<ResetResponse>, ApiError> {
    let user = state.users.get(&req.username).await?;
    let code = state.credentials.issue_reset_code(&user.username).await?;

    let sid = state
        .messages
        .send_sms(
            &format!("Your reset code is: {}", code),
            &state.config.sms.from_number,
            &user.phone,
        )
        .await?;

    Ok(Json(ResetResponse { sid }))
}

/// POST /auth/update — swap the password if the reset code matches.
pub async fn update_password(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<UpdatePasswordRequest>, ApiError>,
) -> Result<Json<StatusMessage>, ApiError> {
    state
        .credentials
        .redeem_reset_code(&req.username, &req.reset_code.normalized(), &req.new_password)
        .await?;

    Ok(Json(StatusMessage {
        message: "Password Updated".into(),
    }))
}

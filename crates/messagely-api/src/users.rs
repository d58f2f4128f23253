use axum::{
    Json,
    extract::{Path, State},
};
use axum_extra::extract::WithRejection;

use messagely_types::models::{ReceivedMessage, SentMessage, UserProfile, UserSummary};

use crate::auth::AppState;
use crate::error::ApiError;

/// GET /users
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserSummary>>, ApiError> {
    Ok(Json(state.users.all().await?))
}

/// GET /users/{username}
pub async fn get_user(
    State(state): State<AppState>,
    WithRejection(Path(username), _): WithRejection<Path<String>, ApiError>,
) -> Result<Json<UserProfile>, ApiError> {
    Ok(Json(state.users.get(&username).await?))
}

/// GET /users/{username}/to
pub async fn messages_to(
    State(state): State<AppState>,
    WithRejection(Path(username), _): WithRejection<Path<String>, ApiError>,
) -> Result<Json<Vec<ReceivedMessage>>, ApiError> {
    Ok(Json(state.users.messages_to(&username).await?))
}

/// GET /users/{username}/from
pub async fn messages_from(
    State(state): State<AppState>,
    WithRejection(Path(username), _): WithRejection<Path<String>, ApiError>,
) -> Result<Json<Vec<SentMessage>>, ApiError> {
    Ok(Json(state.users.messages_from(&username).await?))
}

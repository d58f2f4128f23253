use axum::{
    body::{Body, to_bytes},
    extract::{Query, RawPathParams, Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use serde::Deserialize;
use tracing::debug;

use messagely_types::api::Claims;
use messagely_types::models::MessageDetail;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::message_store::MessageStore;

/// Largest JSON body buffered while looking for `_token`.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[derive(Deserialize)]
struct TokenField {
    #[serde(rename = "_token")]
    token: Option<String>,
}

/// Require a valid token; the verified claims go into request extensions
/// for handlers to pick up with `Extension<Claims>`.
pub async fn ensure_logged_in(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (mut req, claims) = authenticate(&state, req).await?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Like [`ensure_logged_in`], and the token's user must be the `username`
/// path parameter. A mismatch looks exactly like a bad token.
pub async fn ensure_correct_user(
    State(state): State<AppState>,
    params: RawPathParams,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (mut req, claims) = authenticate(&state, req).await?;

    let path_user = params
        .iter()
        .find(|(key, _)| *key == "username")
        .map(|(_, value)| value);
    if path_user != Some(claims.username.as_str()) {
        debug!("{} tried to act as {:?}", claims.username, path_user);
        return Err(ApiError::Unauthorized);
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// The caller is the sender or the recipient.
pub fn is_correct_message_user(username: &str, message: &MessageDetail) -> bool {
    username == message.to_user.username || username == message.from_user.username
}

/// The caller is the recipient of message `id`. Lookup failures (including
/// a missing message) are errors, not `false`.
pub async fn is_receiving_message_user(messages: &MessageStore, username: &str, id: i64) -> Result<bool, ApiError> {
    let message = messages.get(id).await?;
    Ok(username == message.to_user.username)
}

/// Try the Authorization header, then `_token` in the JSON body, then `_token`
/// in the query string; the first one that verifies is used, so an invalid
/// header does not hide a valid `_token`. The body is buffered and put back
/// so the handler still sees it.
async fn authenticate(state: &AppState, req: Request) -> Result<(Request, Claims), ApiError> {
    let (parts, body) = req.into_parts();

    let bytes = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|_| ApiError::BadRequest("Request body too large".into()))?;

    let header_token = parts
        .headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string());
    let body_token = serde_json::from_slice::<TokenField>(&bytes)
        .ok()
        .and_then(|field| field.token);
    let query_token = Query::<TokenField>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(field)| field.token);

    let claims = [header_token, body_token, query_token]
        .into_iter()
        .flatten()
        .find_map(|token| state.tokens.verify(&token).ok())
        .ok_or(ApiError::Unauthorized)?;

    Ok((Request::from_parts(parts, Body::from(bytes)), claims))
}

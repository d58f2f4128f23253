pub mod auth;
pub mod config;
pub mod credentials;
pub mod directory;
pub mod error;
pub mod message_store;
pub mod messages;
pub mod middleware;
pub mod routes;
pub mod sms;
pub mod tokens;
pub mod users;

mod convert;

use tracing::error;

use crate::error::ApiError;

/// Run blocking store/hash work off the async runtime.
pub(crate) async fn run_blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(anyhow::anyhow!("blocking task failed: {}", e))
    })?
}

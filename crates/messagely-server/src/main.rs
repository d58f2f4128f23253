use std::net::SocketAddr;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use messagely_api::auth::AppStateInner;
use messagely_api::config::AppConfig;
use messagely_api::routes;
use messagely_api::sms::SmsClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "messagely=debug,messagely_api=debug,messagely_db=info,tower_http=debug".into()),
        )
        .init();

    // Config
    let config = AppConfig::from_env()?;

    // Init database and SMS provider
    let db = messagely_db::Database::open(&config.db_path)?;
    let sms = SmsClient::from_config(&config.sms)?;

    let addr: SocketAddr = config.address().parse()?;
    let state = AppStateInner::new(config, db, sms)?;

    let app = routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("messagely listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

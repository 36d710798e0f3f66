use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use workdesk::{config::ServerConfig, context::AppContext, error::ApiResult, server};

/// How often expired refresh tokens are swept from storage
const TOKEN_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> ApiResult<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "workdesk=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    let ctx = AppContext::new(config).await?;

    // Background sweep of expired refresh tokens
    let sessions = ctx.sessions.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TOKEN_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            match sessions.clean_expired_tokens().await {
                Ok(0) => {}
                Ok(n) => tracing::info!("Removed {} expired refresh tokens", n),
                Err(e) => tracing::warn!("Refresh token sweep failed: {}", e),
            }
        }
    });

    server::serve(ctx).await
}

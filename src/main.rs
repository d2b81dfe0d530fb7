/// ROTA media service
///
/// Serves the media upload, document caching and static file endpoints of
/// the ROTA admin backend.
use anyhow::Context;
use rota_media::{server, AppContext, MediaConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration (also reads .env before the log filter is chosen)
    let config = MediaConfig::from_env().context("Failed to load configuration")?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("rota_media={0},tower_http={0}", config.logging.level).into()
    });
    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    // Create application context
    let ctx = AppContext::new(config).context("Failed to initialize media storage")?;

    // Start server
    server::serve(ctx).await?;

    Ok(())
}

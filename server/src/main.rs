//! Tablesync Server - serves tables over REST for tablesync clients.

use tablesync_server::config::Config;
use tablesync_server::{build_app, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tablesync_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!(
        "Starting Tablesync Server on {}:{} ({} storage, base /{})",
        config.host,
        config.port,
        config.storage.as_str(),
        config.base_path
    );

    let addr = format!("{}:{}", config.host, config.port);
    let app = build_app(AppState::from_config(config));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
